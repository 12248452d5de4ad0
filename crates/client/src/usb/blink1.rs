//! blink(1) control-transfer transport
//!
//! The blink(1) is driven entirely through HID class requests on the default
//! control pipe; there is no streamed endpoint traffic and no acknowledgement
//! handshake. Liveness polling asks the firmware for its version and treats
//! any reply as alive.

use crate::usb::find_device;
use crate::usb::transport::{
    DeviceError, DeviceIdentity, Result, TRANSFER_TIMEOUT, UsbTransport,
};
use rusb::{Context, DeviceHandle, Direction, Recipient, RequestType, UsbContext};
use tracing::debug;

/// Feature report length of every blink(1) exchange.
const REPORT_SIZE: usize = 8;
/// HID SET_REPORT class request.
const SET_REPORT: u8 = 0x09;
/// HID GET_REPORT class request.
const GET_REPORT: u8 = 0x01;
/// wValue selecting feature report 1.
const FEATURE_REPORT_1: u16 = (3 << 8) | 0x01;
/// 0x76 = 'v' asks the firmware for its version.
const VERSION_QUERY: [u8; 9] = [0x00, 0x76, 0, 0, 0, 0, 0, 0, 0];

/// Transport for the blink(1) RGB indicator.
pub struct Blink1Transport {
    identity: DeviceIdentity,
    handle: Option<DeviceHandle<Context>>,
}

impl Blink1Transport {
    /// Create a transport bound to the given identity. The device need not
    /// be present until [`UsbTransport::open`] is called.
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            handle: None,
        }
    }

    fn open_handle(&self) -> Result<&DeviceHandle<Context>> {
        self.handle.as_ref().ok_or(DeviceError::NotOpen)
    }
}

impl UsbTransport for Blink1Transport {
    fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let context = Context::new()?;
        let device = find_device(&context, self.identity.vendor_id, self.identity.product_id)?;
        let handle = device.open()?;

        let interface_number = self.identity.interface_number;
        // Kernel driver detach and configuration selection are best-effort;
        // the control pipe works even when they fail. Ignore and continue.
        if handle.kernel_driver_active(interface_number).unwrap_or(false) {
            if let Err(e) = handle.detach_kernel_driver(interface_number) {
                debug!(
                    "Could not detach kernel driver from interface {}: {}",
                    interface_number, e
                );
            }
        }
        if let Err(e) = handle.set_active_configuration(1) {
            debug!("Could not set the active configuration: {}", e);
        }

        self.handle = Some(handle);
        debug!(
            "Opened device (vid_{:04x}, pid_{:04x})",
            self.identity.vendor_id, self.identity.product_id
        );
        Ok(())
    }

    fn close(&mut self) {
        if self.handle.take().is_some() {
            debug!("Closed device");
        }
    }

    fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    fn vendor_id(&self) -> u16 {
        self.identity.vendor_id
    }

    fn product_id(&self) -> u16 {
        self.identity.product_id
    }

    fn packet_size(&self) -> Result<usize> {
        Ok(REPORT_SIZE)
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let handle = self.open_handle()?;
        let request_type = rusb::request_type(Direction::Out, RequestType::Class, Recipient::Interface);
        let written = handle.write_control(
            request_type,
            SET_REPORT,
            FEATURE_REPORT_1,
            0,
            data,
            TRANSFER_TIMEOUT,
        )?;
        if written != data.len() {
            return Err(DeviceError::ShortTransfer {
                actual: written,
                expected: data.len(),
            });
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let handle = self.open_handle()?;
        let request_type = rusb::request_type(Direction::In, RequestType::Class, Recipient::Interface);
        let mut buffer = vec![0u8; REPORT_SIZE];
        let received = handle.read_control(
            request_type,
            GET_REPORT,
            FEATURE_REPORT_1,
            0,
            &mut buffer,
            TRANSFER_TIMEOUT,
        )?;
        buffer.truncate(received);
        Ok(buffer)
    }

    fn poll(&mut self) -> Result<bool> {
        self.send(&VERSION_QUERY)?;
        let response = self.receive()?;
        Ok(!response.is_empty())
    }
}
