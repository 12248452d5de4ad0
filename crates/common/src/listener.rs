//! TCP listener for pushed notification frames
//!
//! A minimal accept loop: one bounded read per connection, no keep-alive, no
//! partial-frame reassembly. The notification server and the client both use
//! this to receive `!`-terminated request frames.
//!
//! The accept call blocks without a timeout, so `stop()` unblocks it by
//! making a loopback connection to the listening socket. A cancellable or
//! timeout-based accept could replace this; the self-connection is the
//! documented trade-off of keeping the loop free of polling.

use crate::net;
use protocol::packets;
use std::io::Read;
use std::net::TcpListener as TcpSocket;
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Handler invoked with the bytes received on each accepted connection.
pub type DataHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// Signal pair the accept loop uses to tell `start()` it is accepting.
type AcceptingSignal = Arc<(Mutex<bool>, Condvar)>;

/// How long `start()` waits between re-checks for the loop to come up.
const STARTUP_RECHECK: Duration = Duration::from_secs(10);

/// A socket server listener.
pub struct Listener {
    address: String,
    port: u16,
    bound_port: AtomicU16,
    handler: Option<Arc<DataHandler>>,
    running: Arc<AtomicBool>,
    run_lock: Mutex<()>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl Listener {
    /// Create a listener for `address:port`.
    ///
    /// Port 0 binds an ephemeral port; the actually-bound port is available
    /// from [`Listener::port`] once started. `handler` receives the payload
    /// of every accepted connection that carried data.
    pub fn new(address: impl Into<String>, port: u16, handler: Option<DataHandler>) -> Self {
        Self {
            address: address.into(),
            port,
            bound_port: AtomicU16::new(port),
            handler: handler.map(Arc::new),
            running: Arc::new(AtomicBool::new(false)),
            run_lock: Mutex::new(()),
            thread: Mutex::new(None),
        }
    }

    /// Start the listener.
    ///
    /// Binds, spawns the accept loop, and blocks until the loop has reached
    /// its accept call: once this returns, the socket is ready to accept.
    /// Calling while already running warns and returns.
    pub fn start(&self) -> crate::Result<()> {
        info!("Listener starting");
        let _guard = self.run_lock.lock().unwrap();
        if self.running.load(Ordering::Acquire) {
            warn!("Listener already started");
            return Ok(());
        }

        info!(
            "Listener will listen to IP address {} on port {}",
            self.address, self.port
        );
        let socket = TcpSocket::bind((self.address.as_str(), self.port))?;
        self.bound_port
            .store(socket.local_addr()?.port(), Ordering::Release);

        let accepting: AcceptingSignal = Arc::new((Mutex::new(false), Condvar::new()));
        self.running.store(true, Ordering::Release);

        let running = Arc::clone(&self.running);
        let handler = self.handler.clone();
        let signal = Arc::clone(&accepting);
        let handle = thread::Builder::new()
            .name("listener".to_string())
            .spawn(move || accept_loop(socket, running, handler, signal))
            .expect("Failed to spawn listener thread");
        *self.thread.lock().unwrap() = Some(handle);

        let (entered, condvar) = &*accepting;
        let mut guard = entered.lock().unwrap();
        while !*guard {
            let (next, _) = condvar.wait_timeout(guard, STARTUP_RECHECK).unwrap();
            guard = next;
        }

        info!("Listener started");
        Ok(())
    }

    /// Stop the listener.
    ///
    /// Clears the running flag, bumps the loop out of its blocking accept
    /// with a loopback connection, then joins the loop and releases the
    /// socket. Calling while already stopped warns and returns.
    pub fn stop(&self) {
        info!("Listener stopping");
        let _guard = self.run_lock.lock().unwrap();
        if !self.running.load(Ordering::Acquire) {
            warn!("Listener already stopped");
            return;
        }
        self.running.store(false, Ordering::Release);

        debug!("Bumping the accept loop with a loopback connection");
        if let Err(e) = net::send(&self.address, self.port(), &[]) {
            warn!("Could not unblock the accept loop: {}", e);
        }

        if let Some(handle) = self.thread.lock().unwrap().take() {
            let _ = handle.join();
        }
        info!("Listener stopped");
    }

    /// The port actually bound, once started.
    pub fn port(&self) -> u16 {
        self.bound_port.load(Ordering::Acquire)
    }

    /// Whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

/// Main listener loop: accept, one bounded read, hand off, close.
fn accept_loop(
    socket: TcpSocket,
    running: Arc<AtomicBool>,
    handler: Option<Arc<DataHandler>>,
    accepting: AcceptingSignal,
) {
    while running.load(Ordering::Acquire) {
        {
            let (entered, condvar) = &*accepting;
            let mut guard = entered.lock().unwrap();
            if !*guard {
                *guard = true;
                condvar.notify_all();
            }
        }

        debug!("Waiting for connection");
        let (mut stream, peer) = match socket.accept() {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("Accept failed: {}", e);
                break;
            }
        };
        info!("New connection from {} accepted", peer.ip());

        // One read per connection is the full contract; anything beyond
        // MAX_SIZE truncates silently.
        let mut buffer = vec![0u8; packets::MAX_SIZE];
        match stream.read(&mut buffer) {
            Ok(received) if received > 0 => {
                if let Some(handler) = &handler {
                    handler(&buffer[..received]);
                }
            }
            Ok(_) => {}
            Err(e) => warn!("Failed to read from connection: {}", e),
        }

        drop(stream);
        info!("Connection closed");
    }
}
