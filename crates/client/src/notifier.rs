//! Notifier client orchestration
//!
//! Composes the TCP [`Listener`] receiving server pushes with the
//! [`DeviceController`] driving the local hardware. Inbound frames decode to
//! requests, translate through the configured device protocol, and go out
//! over the controller; device add events trigger registration with the
//! notification server, retried on a timer until a send gets through.

use crate::config::UsbProtocol;
use crate::controller::DeviceController;
use common::net;
use common::{Listener, Result};
use protocol::{Request, decode, encode, translate, translate_for_blink1};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Construction parameters for a [`NotifierClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// User this client represents.
    pub username: String,
    /// Address the client listens on; also the host it registers.
    pub address: String,
    /// Port the client listens on (0 binds an ephemeral port).
    pub port: u16,
    /// Notification server address.
    pub server_address: String,
    /// Notification server port.
    pub server_port: u16,
    /// Delay before a failed registration is retried.
    pub retry_period: Duration,
    /// Device protocol the translated commands speak.
    pub usb_protocol: UsbProtocol,
}

/// Notifier client for receiving events from the notification server.
pub struct NotifierClient {
    inner: Arc<ClientInner>,
    listener: Listener,
    running: AtomicBool,
    run_lock: Mutex<()>,
}

impl NotifierClient {
    /// Create a client around a device controller.
    ///
    /// Wires the controller's add event to registration and its remove event
    /// to cancelling any pending registration retry: once the device is
    /// gone, registering again is pointless until it returns.
    pub fn new(options: ClientOptions, controller: Arc<DeviceController>) -> Self {
        let inner = Arc::new(ClientInner {
            username: options.username,
            address: options.address.clone(),
            server_address: options.server_address,
            server_port: options.server_port,
            retry_period: options.retry_period,
            usb_protocol: options.usb_protocol,
            controller: Arc::clone(&controller),
            retry_timer: Mutex::new(None),
        });

        let handler = Arc::downgrade(&inner);
        let listener = Listener::new(
            options.address,
            options.port,
            Some(Box::new(move |data: &[u8]| {
                if let Some(inner) = handler.upgrade() {
                    inner.handle_data(data);
                }
            })),
        );

        let on_add = Arc::downgrade(&inner);
        controller.set_add_event_handler(Arc::new(move || {
            debug!("Device add event");
            if let Some(inner) = on_add.upgrade() {
                inner.register();
            }
        }));

        let on_remove = Arc::downgrade(&inner);
        controller.set_remove_event_handler(Arc::new(move || {
            debug!("Device remove event");
            if let Some(inner) = on_remove.upgrade() {
                inner.stop_retry_timer();
            }
        }));

        Self {
            inner,
            listener,
            running: AtomicBool::new(false),
            run_lock: Mutex::new(()),
        }
    }

    /// Start the client: controller, listener, then drive the indicators to
    /// their "down" pattern since no state is known yet. Calling while
    /// already running warns and returns.
    pub fn start(&self) -> Result<()> {
        info!("Client starting (version {})", env!("CARGO_PKG_VERSION"));
        let _guard = self.run_lock.lock().unwrap();
        if self.running.load(Ordering::Acquire) {
            warn!("Client already started");
            return Ok(());
        }

        self.inner.controller.start()?;
        self.listener.start()?;
        // Status is unknown on start-up.
        self.inner.handle_request(&Request::status(false));
        self.running.store(true, Ordering::Release);

        info!("Client started");
        Ok(())
    }

    /// Stop the client. Calling while already stopped warns and returns.
    pub fn stop(&self) {
        info!("Client stopping");
        let _guard = self.run_lock.lock().unwrap();
        if !self.running.load(Ordering::Acquire) {
            warn!("Client already stopped");
            return;
        }

        self.inner.stop_retry_timer();
        // Status is unknown after shutdown.
        self.inner.handle_request(&Request::status(false));
        self.inner.controller.stop();
        self.listener.stop();
        self.running.store(false, Ordering::Release);

        info!("Client stopped");
    }

    /// Whether the client is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// The port the listener actually bound, once started.
    pub fn listener_port(&self) -> u16 {
        self.listener.port()
    }

    /// Register this notifier client with the server.
    pub fn register(&self) {
        self.inner.register();
    }
}

/// State shared with the listener handler, the controller's event handlers,
/// and the retry timer.
struct ClientInner {
    username: String,
    address: String,
    server_address: String,
    server_port: u16,
    retry_period: Duration,
    usb_protocol: UsbProtocol,
    controller: Arc<DeviceController>,
    retry_timer: Mutex<Option<RetryTimer>>,
}

impl ClientInner {
    /// Register with the server; a failed send schedules exactly one retry.
    ///
    /// Cancelling any pending retry first coalesces bursts of add events
    /// into a single live timer.
    fn register(self: &Arc<Self>) {
        self.stop_retry_timer();
        info!(
            "Registering user {} with host {}",
            self.username, self.address
        );
        let request = Request::registration(self.address.clone(), self.username.clone());
        let command = match encode(&request) {
            Ok(command) => command,
            Err(e) => {
                error!("Could not encode the registration request: {}", e);
                return;
            }
        };

        debug!(
            "Registering with {} on port {}",
            self.server_address, self.server_port
        );
        if let Err(e) = net::send(&self.server_address, self.server_port, command.as_bytes()) {
            warn!(
                "Could not register ({}); will retry in {:?}",
                e, self.retry_period
            );
            self.start_retry_timer();
        }
    }

    fn start_retry_timer(self: &Arc<Self>) {
        debug!("Starting a new registration timer");
        let inner = Arc::downgrade(self);
        let timer = RetryTimer::schedule(self.retry_period, move || {
            if let Some(inner) = inner.upgrade() {
                inner.register();
            }
        });
        *self.retry_timer.lock().unwrap() = Some(timer);
    }

    fn stop_retry_timer(&self) {
        if let Some(timer) = self.retry_timer.lock().unwrap().take() {
            debug!("Stopping the registration timer");
            timer.cancel();
        }
    }

    /// Handle raw data received from the notification server.
    ///
    /// Decode failures are logged and dropped; inbound protocol errors must
    /// never take the listener down.
    fn handle_data(&self, data: &[u8]) {
        debug!("Data received: {:?}", String::from_utf8_lossy(data));
        match decode(data) {
            Ok(request) => self.handle_request(&request),
            Err(e) => error!("Dropping request that could not be decoded: {}", e),
        }
    }

    /// Translate a request and forward it to the device.
    ///
    /// Translation and delivery failures are logged and swallowed; an
    /// untranslatable request must never stop the client.
    fn handle_request(&self, request: &Request) {
        let delivered = match self.usb_protocol {
            UsbProtocol::DasBlinkenLichten => match translate(request) {
                Ok(command) => Some(self.controller.send(command.as_bytes())),
                Err(e) => {
                    error!("Cannot translate request: {}", e);
                    None
                }
            },
            UsbProtocol::Blink1 => match translate_for_blink1(request) {
                Ok(Some(command)) => Some(self.controller.send(&command)),
                Ok(None) => {
                    debug!("Request has no device command");
                    None
                }
                Err(e) => {
                    error!("Cannot translate request: {}", e);
                    None
                }
            },
        };
        if delivered == Some(false) {
            warn!("Device command was not delivered");
        }
    }
}

/// One-shot cancellable timer backing registration retries.
///
/// At most one exists per client; replacing or cancelling it drops the
/// sender, which ends the parked thread without firing.
struct RetryTimer {
    cancel: mpsc::Sender<()>,
}

impl RetryTimer {
    fn schedule(delay: Duration, callback: impl FnOnce() + Send + 'static) -> Self {
        let (cancel, signal) = mpsc::channel();
        thread::Builder::new()
            .name("registration-retry".to_string())
            .spawn(move || {
                if matches!(signal.recv_timeout(delay), Err(RecvTimeoutError::Timeout)) {
                    callback();
                }
            })
            .expect("Failed to spawn registration retry thread");
        Self { cancel }
    }

    fn cancel(&self) {
        let _ = self.cancel.send(());
    }
}
