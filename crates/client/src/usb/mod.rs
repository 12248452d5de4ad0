//! USB device bindings
//!
//! Concrete rusb-backed transports behind the [`UsbTransport`] capability
//! interface.

pub mod blink1;
pub mod bulk;
pub mod transport;

pub use blink1::Blink1Transport;
pub use bulk::BulkTransport;
pub use transport::{
    DeviceError, DeviceIdentity, SharedTransport, TransferMode, UsbTransport,
};

use rusb::{Context, Device, UsbContext};

/// Find the first device matching the configured vendor and product ID.
pub(crate) fn find_device(
    context: &Context,
    vendor_id: u16,
    product_id: u16,
) -> transport::Result<Device<Context>> {
    for device in context.devices()?.iter() {
        if let Ok(descriptor) = device.device_descriptor() {
            if descriptor.vendor_id() == vendor_id && descriptor.product_id() == product_id {
                return Ok(device);
            }
        }
    }
    Err(DeviceError::NotFound)
}
