//! Endpoint-pair transport
//!
//! Drives rawhid-style build light firmware over the first IN/OUT endpoint
//! pair of the configured interface, dispatching bulk or interrupt transfers
//! by descriptor type. Liveness polling runs the challenge/response
//! handshake the firmware answers.

use crate::usb::find_device;
use crate::usb::transport::{
    DeviceError, DeviceIdentity, Result, TRANSFER_TIMEOUT, UsbTransport,
};
use protocol::{get_challenge_request, is_challenge_response, strip};
use rusb::{ConfigDescriptor, Context, DeviceHandle, Direction, TransferType, UsbContext};
use tracing::debug;

struct Endpoint {
    address: u8,
    max_packet_size: usize,
    transfer_type: TransferType,
}

struct OpenDevice {
    handle: DeviceHandle<Context>,
    endpoint_in: Endpoint,
    endpoint_out: Endpoint,
}

/// Transport for devices exposing an IN/OUT endpoint pair.
pub struct BulkTransport {
    identity: DeviceIdentity,
    device: Option<OpenDevice>,
}

impl BulkTransport {
    /// Create a transport bound to the given identity. The device need not
    /// be present until [`UsbTransport::open`] is called.
    pub fn new(identity: DeviceIdentity) -> Self {
        Self {
            identity,
            device: None,
        }
    }

    fn open_device(&self) -> Result<OpenDevice> {
        let context = Context::new()?;
        let device = find_device(&context, self.identity.vendor_id, self.identity.product_id)?;
        let interface_number = self.identity.interface_number;

        let config = device.config_descriptor(0)?;
        let (endpoint_in, endpoint_out) = find_endpoints(&config, interface_number)?;

        let handle = device.open()?;

        // Kernel driver detach and configuration selection can fail on hosts
        // where no driver is bound or the configuration is already active;
        // the device is usable either way. Ignore and continue.
        if handle.kernel_driver_active(interface_number).unwrap_or(false) {
            if let Err(e) = handle.detach_kernel_driver(interface_number) {
                debug!(
                    "Could not detach kernel driver from interface {}: {}",
                    interface_number, e
                );
            }
        }
        if let Err(e) = handle.set_active_configuration(config.number()) {
            debug!("Could not set the active configuration: {}", e);
        }

        handle.claim_interface(interface_number)?;

        Ok(OpenDevice {
            handle,
            endpoint_in,
            endpoint_out,
        })
    }
}

impl UsbTransport for BulkTransport {
    fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }
        self.device = Some(self.open_device()?);
        debug!(
            "Opened device (vid_{:04x}, pid_{:04x})",
            self.identity.vendor_id, self.identity.product_id
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(device) = self.device.take() {
            let interface_number = self.identity.interface_number;
            if let Err(e) = device.handle.release_interface(interface_number) {
                debug!("Could not release interface {}: {}", interface_number, e);
            }
            // Restore the device to kernel control where a driver wants it.
            if let Err(e) = device.handle.attach_kernel_driver(interface_number) {
                debug!(
                    "Could not reattach kernel driver (may not have been detached): {}",
                    e
                );
            }
            debug!("Closed device");
        }
    }

    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn vendor_id(&self) -> u16 {
        self.identity.vendor_id
    }

    fn product_id(&self) -> u16 {
        self.identity.product_id
    }

    fn packet_size(&self) -> Result<usize> {
        match &self.device {
            Some(device) => Ok(device.endpoint_in.max_packet_size),
            None => Err(DeviceError::PacketSizeUnavailable),
        }
    }

    fn send(&mut self, data: &[u8]) -> Result<()> {
        let device = self.device.as_ref().ok_or(DeviceError::NotOpen)?;
        let endpoint = &device.endpoint_out;
        let written = match endpoint.transfer_type {
            TransferType::Interrupt => {
                device
                    .handle
                    .write_interrupt(endpoint.address, data, TRANSFER_TIMEOUT)?
            }
            _ => device
                .handle
                .write_bulk(endpoint.address, data, TRANSFER_TIMEOUT)?,
        };
        if written != data.len() {
            return Err(DeviceError::ShortTransfer {
                actual: written,
                expected: data.len(),
            });
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<Vec<u8>> {
        let device = self.device.as_ref().ok_or(DeviceError::NotOpen)?;
        let endpoint = &device.endpoint_in;
        let expected = endpoint.max_packet_size;
        let mut buffer = vec![0u8; expected];
        let received = match endpoint.transfer_type {
            TransferType::Interrupt => {
                device
                    .handle
                    .read_interrupt(endpoint.address, &mut buffer, TRANSFER_TIMEOUT)?
            }
            _ => device
                .handle
                .read_bulk(endpoint.address, &mut buffer, TRANSFER_TIMEOUT)?,
        };
        if received != expected {
            return Err(DeviceError::ShortTransfer {
                actual: received,
                expected,
            });
        }
        Ok(buffer)
    }

    fn poll(&mut self) -> Result<bool> {
        self.send(get_challenge_request().as_bytes())?;
        let response = self.receive()?;
        debug!("Challenge response: {:?}", strip(&response));
        Ok(is_challenge_response(&response))
    }
}

/// Pick the first IN and OUT endpoints of the configured interface.
fn find_endpoints(config: &ConfigDescriptor, interface_number: u8) -> Result<(Endpoint, Endpoint)> {
    let interface = config
        .interfaces()
        .find(|interface| interface.number() == interface_number)
        .ok_or(DeviceError::NoEndpoints(interface_number))?;
    let descriptor = interface
        .descriptors()
        .next()
        .ok_or(DeviceError::NoEndpoints(interface_number))?;

    let mut endpoint_in = None;
    let mut endpoint_out = None;
    for endpoint in descriptor.endpoint_descriptors() {
        let info = Endpoint {
            address: endpoint.address(),
            max_packet_size: endpoint.max_packet_size() as usize,
            transfer_type: endpoint.transfer_type(),
        };
        match endpoint.direction() {
            Direction::In if endpoint_in.is_none() => endpoint_in = Some(info),
            Direction::Out if endpoint_out.is_none() => endpoint_out = Some(info),
            _ => {}
        }
    }

    match (endpoint_in, endpoint_out) {
        (Some(endpoint_in), Some(endpoint_out)) => Ok((endpoint_in, endpoint_out)),
        _ => Err(DeviceError::NoEndpoints(interface_number)),
    }
}
