//! Device presence monitors
//!
//! Two interchangeable implementations detect when the configured device is
//! plugged in or pulled: [`HotplugMonitor`] subscribes to USB hotplug events,
//! [`PollingMonitor`] wakes on a fixed interval and drives the transport's
//! open/poll cycle itself. Both dispatch to registered add/remove handlers on
//! their own background thread.

use crate::usb::SharedTransport;
use crate::usb::transport::Result as DeviceResult;
use rusb::{Context, Device, Hotplug, HotplugBuilder, Registration, UsbContext};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Handler invoked when the monitored device appears or disappears.
pub type EventHandler = Arc<dyn Fn() + Send + Sync + 'static>;

/// How long the hotplug event loop blocks per iteration before re-checking
/// its running flag.
const EVENT_TIMEOUT: Duration = Duration::from_millis(100);

/// Registered add/remove handler slots, shared with the monitor thread.
#[derive(Default)]
pub(crate) struct EventHandlers {
    add: Mutex<Option<EventHandler>>,
    remove: Mutex<Option<EventHandler>>,
}

impl EventHandlers {
    pub(crate) fn set_add(&self, handler: EventHandler) {
        *self.add.lock().unwrap() = Some(handler);
    }

    pub(crate) fn set_remove(&self, handler: EventHandler) {
        *self.remove.lock().unwrap() = Some(handler);
    }

    /// Invoke the add handler, if one is registered.
    pub(crate) fn fire_add(&self) {
        let handler = self.add.lock().unwrap().clone();
        match handler {
            Some(handler) => handler(),
            None => debug!("No add event handler registered"),
        }
    }

    /// Invoke the remove handler, if one is registered.
    pub(crate) fn fire_remove(&self) {
        let handler = self.remove.lock().unwrap().clone();
        match handler {
            Some(handler) => handler(),
            None => debug!("No remove event handler registered"),
        }
    }
}

/// Interface for detecting device connects and disconnects.
///
/// Handlers are invoked synchronously on the monitor's own thread; they must
/// not call back into the monitor's `start`/`stop`.
pub trait DeviceMonitor: Send + Sync {
    /// Register the handler invoked when the device is connected.
    fn set_add_event_handler(&self, handler: EventHandler);

    /// Register the handler invoked when the device is disconnected.
    fn set_remove_event_handler(&self, handler: EventHandler);

    /// Start the monitor. Starting a running monitor warns and returns.
    fn start(&self) -> DeviceResult<()>;

    /// Stop the monitor and join its thread. Stopping a stopped monitor
    /// warns and returns.
    fn stop(&self);

    /// Whether the monitor is running.
    fn is_running(&self) -> bool;
}

/// Event-driven monitor over USB hotplug notifications.
pub struct HotplugMonitor {
    vendor_id: u16,
    product_id: u16,
    handlers: Arc<EventHandlers>,
    running: Arc<AtomicBool>,
    run_lock: Mutex<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl HotplugMonitor {
    /// Create a monitor for the given vendor and product ID.
    pub fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            handlers: Arc::new(EventHandlers::default()),
            running: Arc::new(AtomicBool::new(false)),
            run_lock: Mutex::new(()),
            thread: Mutex::new(None),
        }
    }
}

impl DeviceMonitor for HotplugMonitor {
    fn set_add_event_handler(&self, handler: EventHandler) {
        debug!("Setting a new add event handler");
        self.handlers.set_add(handler);
    }

    fn set_remove_event_handler(&self, handler: EventHandler) {
        debug!("Setting a new remove event handler");
        self.handlers.set_remove(handler);
    }

    fn start(&self) -> DeviceResult<()> {
        info!("Device monitor starting");
        let _guard = self.run_lock.lock().unwrap();
        if self.running.load(Ordering::Acquire) {
            warn!("Device monitor already started");
            return Ok(());
        }

        // The hotplug subscription lives entirely on the monitor thread; the
        // channel reports whether registration succeeded before start returns.
        let (ready_sender, ready) = mpsc::channel();
        self.running.store(true, Ordering::Release);
        let running = Arc::clone(&self.running);
        let handlers = Arc::clone(&self.handlers);
        let vendor_id = self.vendor_id;
        let product_id = self.product_id;
        let handle = thread::Builder::new()
            .name("device-monitor".to_string())
            .spawn(move || {
                let context = match Context::new() {
                    Ok(context) => context,
                    Err(e) => {
                        let _ = ready_sender.send(Err(e));
                        return;
                    }
                };
                let callback = HotplugCallback {
                    vendor_id,
                    product_id,
                    handlers,
                };
                let registration = match HotplugBuilder::new()
                    .enumerate(false)
                    .register(&context, Box::new(callback))
                {
                    Ok(registration) => registration,
                    Err(e) => {
                        let _ = ready_sender.send(Err(e));
                        return;
                    }
                };
                let _ = ready_sender.send(Ok(()));
                event_loop(context, registration, running);
            })
            .expect("Failed to spawn device monitor thread");

        match ready.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                return Err(e.into());
            }
            Err(_) => {
                self.running.store(false, Ordering::Release);
                let _ = handle.join();
                return Err(rusb::Error::Other.into());
            }
        }
        *self.thread.lock().unwrap() = Some(handle);

        info!("Device monitor started");
        Ok(())
    }

    fn stop(&self) {
        info!("Device monitor stopping");
        let _guard = self.run_lock.lock().unwrap();
        if !self.running.load(Ordering::Acquire) {
            warn!("Device monitor already stopped");
            return;
        }
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        info!("Device monitor stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Hotplug subscription callback: filter by identity, dispatch handlers.
struct HotplugCallback {
    vendor_id: u16,
    product_id: u16,
    handlers: Arc<EventHandlers>,
}

impl HotplugCallback {
    fn matches(&self, device: &Device<Context>) -> bool {
        let descriptor = match device.device_descriptor() {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!("Could not read the event device's descriptor: {}", e);
                return false;
            }
        };
        debug!(
            "Device event for vid_{:04x}, pid_{:04x}",
            descriptor.vendor_id(),
            descriptor.product_id()
        );
        if descriptor.vendor_id() != self.vendor_id || descriptor.product_id() != self.product_id {
            debug!(
                "Device does not match the required VID and PID (vid_{:04x}, pid_{:04x})",
                self.vendor_id, self.product_id
            );
            return false;
        }
        true
    }
}

impl Hotplug<Context> for HotplugCallback {
    fn device_arrived(&mut self, device: Device<Context>) {
        if self.matches(&device) {
            self.handlers.fire_add();
        }
    }

    fn device_left(&mut self, device: Device<Context>) {
        if self.matches(&device) {
            self.handlers.fire_remove();
        }
    }
}

/// Drive libusb event handling until the running flag clears.
fn event_loop(context: Context, registration: Registration<Context>, running: Arc<AtomicBool>) {
    while running.load(Ordering::Acquire) {
        match context.handle_events(Some(EVENT_TIMEOUT)) {
            Ok(()) => {}
            Err(rusb::Error::Interrupted) => debug!("USB event handling interrupted"),
            Err(e) => {
                warn!("Error handling USB events: {}", e);
                thread::sleep(EVENT_TIMEOUT);
            }
        }
    }
    drop(registration);
}

/// Polling monitor for hosts without usable hotplug support.
///
/// Owns a handle to the transport it watches: an open transport is
/// challenge-polled each interval, a closed one gets an open attempt. Open
/// failures are swallowed (the device is simply absent) and retried on the
/// next fixed interval.
pub struct PollingMonitor {
    transport: SharedTransport,
    interval: Duration,
    handlers: Arc<EventHandlers>,
    running: Arc<AtomicBool>,
    run_lock: Mutex<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl PollingMonitor {
    /// Create a monitor polling `transport` every `interval`.
    pub fn new(transport: SharedTransport, interval: Duration) -> Self {
        Self {
            transport,
            interval,
            handlers: Arc::new(EventHandlers::default()),
            running: Arc::new(AtomicBool::new(false)),
            run_lock: Mutex::new(()),
            thread: Mutex::new(None),
        }
    }
}

impl DeviceMonitor for PollingMonitor {
    fn set_add_event_handler(&self, handler: EventHandler) {
        debug!("Setting a new add event handler");
        self.handlers.set_add(handler);
    }

    fn set_remove_event_handler(&self, handler: EventHandler) {
        debug!("Setting a new remove event handler");
        self.handlers.set_remove(handler);
    }

    fn start(&self) -> DeviceResult<()> {
        info!("Device monitor starting");
        let _guard = self.run_lock.lock().unwrap();
        if self.running.load(Ordering::Acquire) {
            warn!("Device monitor already started");
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        let transport = Arc::clone(&self.transport);
        let handlers = Arc::clone(&self.handlers);
        let running = Arc::clone(&self.running);
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("device-poller".to_string())
            .spawn(move || poll_loop(transport, handlers, running, interval))
            .expect("Failed to spawn device poller thread");
        *self.thread.lock().unwrap() = Some(handle);

        info!("Device monitor started");
        Ok(())
    }

    fn stop(&self) {
        info!("Device monitor stopping");
        let _guard = self.run_lock.lock().unwrap();
        if !self.running.load(Ordering::Acquire) {
            warn!("Device monitor already stopped");
            return;
        }
        self.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        info!("Device monitor stopped");
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Polling thread: open-to-closed fires remove, closed-to-open fires add.
fn poll_loop(
    transport: SharedTransport,
    handlers: Arc<EventHandlers>,
    running: Arc<AtomicBool>,
    interval: Duration,
) {
    while running.load(Ordering::Acquire) {
        let is_open = transport.lock().unwrap().is_open();
        if is_open {
            debug!("Device open, polling");
            let alive = transport.lock().unwrap().poll().unwrap_or_else(|e| {
                debug!("Poll failed: {}", e);
                false
            });
            if !alive {
                transport.lock().unwrap().close();
                handlers.fire_remove();
            }
        } else {
            debug!("Trying to open device");
            // Bind the result first: handlers re-lock the transport, so the
            // guard must be gone before they fire.
            let opened = transport.lock().unwrap().open();
            match opened {
                Ok(()) => handlers.fire_add(),
                // Still absent; retry next interval.
                Err(e) => debug!("Could not open device: {}", e),
            }
        }
        debug!("Sleeping for {:?}", interval);
        thread::sleep(interval);
    }
}
