//! Build lights USB device controller
//!
//! Owns the transport and the presence monitor, and keeps handler authors
//! out of the open/close business: the monitor's add callback always opens
//! the transport before the user handler runs, and the remove callback
//! always closes it first.

use crate::monitor::{DeviceMonitor, EventHandler, EventHandlers};
use crate::usb::transport::Result as DeviceResult;
use crate::usb::{SharedTransport, TransferMode};
use protocol::strip;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Acknowledgement token the firmware returns for an understood command.
const ACK: &str = "ack";

/// Device-facing lifecycle manager.
pub struct DeviceController {
    transport: SharedTransport,
    transfer_mode: TransferMode,
    monitor: Box<dyn DeviceMonitor>,
    handlers: Arc<EventHandlers>,
    running: AtomicBool,
    run_lock: Mutex<()>,
}

impl DeviceController {
    /// Create a controller around a transport and a presence monitor.
    ///
    /// The monitor's callbacks are wrapped so that the transport is opened
    /// before any registered add handler runs and closed before any remove
    /// handler runs.
    pub fn new(
        transport: SharedTransport,
        transfer_mode: TransferMode,
        monitor: Box<dyn DeviceMonitor>,
    ) -> Self {
        let handlers = Arc::new(EventHandlers::default());

        let add_transport = Arc::clone(&transport);
        let add_handlers = Arc::clone(&handlers);
        monitor.set_add_event_handler(Arc::new(move || {
            let opened = add_transport.lock().unwrap().open();
            if let Err(e) = opened {
                // The device can vanish again between the event and the open.
                warn!("Could not open the added device: {}", e);
                return;
            }
            add_handlers.fire_add();
        }));

        let remove_transport = Arc::clone(&transport);
        let remove_handlers = Arc::clone(&handlers);
        monitor.set_remove_event_handler(Arc::new(move || {
            remove_transport.lock().unwrap().close();
            remove_handlers.fire_remove();
        }));

        Self {
            transport,
            transfer_mode,
            monitor,
            handlers,
            running: AtomicBool::new(false),
            run_lock: Mutex::new(()),
        }
    }

    /// Set the handler invoked after a device was connected and opened.
    pub fn set_add_event_handler(&self, handler: EventHandler) {
        debug!("Setting a new add event handler");
        self.handlers.set_add(handler);
    }

    /// Set the handler invoked after a device was disconnected and closed.
    pub fn set_remove_event_handler(&self, handler: EventHandler) {
        debug!("Setting a new remove event handler");
        self.handlers.set_remove(handler);
    }

    /// Start the device controller.
    ///
    /// Tries to open the transport (the device may simply not be plugged in
    /// yet, so failure is logged and swallowed), invokes the add handler if
    /// the open succeeded, then starts the presence monitor. Calling while
    /// already running warns and returns.
    pub fn start(&self) -> DeviceResult<()> {
        info!("Device controller starting");
        let _guard = self.run_lock.lock().unwrap();
        if self.running.load(Ordering::Acquire) {
            warn!("Device controller already started");
            return Ok(());
        }

        self.open_transport();
        if self.transport.lock().unwrap().is_open() {
            self.handlers.fire_add();
        }
        self.running.store(true, Ordering::Release);
        self.monitor.start()?;

        info!("Device controller started");
        Ok(())
    }

    /// Stop the device controller: monitor first, then the transport.
    /// Calling while already stopped warns and returns.
    pub fn stop(&self) {
        info!("Device controller stopping");
        let _guard = self.run_lock.lock().unwrap();
        if !self.running.load(Ordering::Acquire) {
            warn!("Device controller already stopped");
            return;
        }

        self.monitor.stop();
        self.close_transport();
        self.running.store(false, Ordering::Release);
        info!("Device controller stopped");
    }

    /// Whether the controller is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Send a command to the USB device.
    ///
    /// In raw mode the command is NUL-padded to the transport's packet size,
    /// sent, and acknowledged: the result is true iff the device answered
    /// `ack`. In control mode the command goes out as-is with no
    /// acknowledgement. Transfer faults never propagate; they report as
    /// false.
    pub fn send(&self, command: &[u8]) -> bool {
        match self.transfer_mode {
            TransferMode::Raw => self.send_raw(command),
            TransferMode::Control => self.send_control(command),
        }
    }

    fn send_raw(&self, command: &[u8]) -> bool {
        let mut transport = self.transport.lock().unwrap();
        if !transport.is_open() {
            return false;
        }
        let packet_size = match transport.packet_size() {
            Ok(size) => size,
            Err(e) => {
                debug!("No packet size available: {}", e);
                return false;
            }
        };

        let mut data = command.to_vec();
        if data.len() < packet_size {
            data.resize(packet_size, 0);
        }
        debug!("Sending data ({} bytes)", data.len());

        let reply = transport.send(&data).and_then(|()| transport.receive());
        match reply {
            Ok(reply) => {
                debug!("Received data ({} bytes)", reply.len());
                strip(&reply) == ACK
            }
            Err(e) => {
                debug!("Transfer failed: {}", e);
                false
            }
        }
    }

    fn send_control(&self, command: &[u8]) -> bool {
        let sent = self.transport.lock().unwrap().send(command);
        match sent {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not send command: {}", e);
                false
            }
        }
    }

    fn open_transport(&self) {
        let mut transport = self.transport.lock().unwrap();
        info!(
            "Trying to open device (vid_{:04x}, pid_{:04x})",
            transport.vendor_id(),
            transport.product_id()
        );
        if let Err(e) = transport.open() {
            // Not necessarily a fault; the device may not be plugged in yet.
            debug!("Could not open device: {}", e);
        }
    }

    fn close_transport(&self) {
        info!("Closing device");
        let mut transport = self.transport.lock().unwrap();
        if transport.is_open() {
            transport.close();
        }
    }
}
