//! USB transport capability interface
//!
//! A transport is the object a [`crate::controller::DeviceController`] and a
//! polling monitor drive: open/close lifecycle, identity, raw send/receive,
//! and a liveness poll. Concrete bindings live in [`crate::usb::bulk`] and
//! [`crate::usb::blink1`].

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Timeout applied to individual USB transfers.
pub(crate) const TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

/// Errors raised by USB transport operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// No device with the configured identity is present
    #[error("device could not be found")]
    NotFound,

    /// The operation requires an open device
    #[error("the device is not open")]
    NotOpen,

    /// Packet size is negotiated from endpoint descriptors on open
    #[error("packet size only available while the device is open")]
    PacketSizeUnavailable,

    /// The configured interface has no usable endpoint pair
    #[error("no usable endpoints on interface {0}")]
    NoEndpoints(u8),

    /// A transfer moved fewer bytes than requested
    #[error("short transfer: {actual} of {expected} bytes")]
    ShortTransfer { actual: usize, expected: usize },

    /// Underlying USB stack error
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
}

/// Type alias for transport results
pub type Result<T> = std::result::Result<T, DeviceError>;

impl From<DeviceError> for common::Error {
    fn from(e: DeviceError) -> Self {
        common::Error::Device(e.to_string())
    }
}

/// How commands are delivered to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferMode {
    /// Streamed request/acknowledge transfers against an endpoint pair.
    #[default]
    Raw,
    /// One-shot control transfers with no acknowledgement.
    Control,
}

/// Identity of the peripheral to bind to; supplied once at construction.
///
/// Usage page and usage select the HID collection on rawhid-style firmware;
/// transports that address endpoints directly carry them without reading
/// them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub interface_number: u8,
    pub usage_page: u16,
    pub usage: u16,
}

/// Capability set required of any concrete device binding.
pub trait UsbTransport: Send {
    /// Open the device for communication. Opening an open device is a no-op.
    fn open(&mut self) -> Result<()>;

    /// Close the device. Closing a closed device is a no-op.
    fn close(&mut self);

    /// Whether the device is open for communication.
    fn is_open(&self) -> bool;

    /// The configured vendor ID.
    fn vendor_id(&self) -> u16;

    /// The configured product ID.
    fn product_id(&self) -> u16;

    /// The report/packet size for sending data.
    fn packet_size(&self) -> Result<usize>;

    /// Send raw data.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Receive raw data.
    fn receive(&mut self) -> Result<Vec<u8>>;

    /// Challenge the device and report whether it responded alive.
    fn poll(&mut self) -> Result<bool>;
}

/// Shared handle to a transport.
///
/// The controller holds one; a polling monitor may hold the only other. All
/// transfer traffic serializes through the mutex.
pub type SharedTransport = Arc<Mutex<dyn UsbTransport>>;
