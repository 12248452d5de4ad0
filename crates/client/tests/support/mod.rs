//! Test doubles for controller, monitor and notifier tests
//!
//! Both mocks hand out a cloneable handle so tests can inspect and steer
//! state after the object itself moved into the component under test.

#![allow(dead_code)]

use client::monitor::{DeviceMonitor, EventHandler};
use client::usb::transport::{DeviceError, Result as DeviceResult};
use client::usb::{SharedTransport, UsbTransport};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Packet size reported by the mock transport.
pub const MOCK_PACKET_SIZE: usize = 64;

/// Vendor ID of the mock device.
pub const MOCK_VENDOR_ID: u16 = 0x16c0;

/// Product ID of the mock device.
pub const MOCK_PRODUCT_ID: u16 = 0x0486;

struct MockTransportState {
    open: bool,
    fail_open: bool,
    fail_send: bool,
    poll_alive: bool,
    poll_error: bool,
    sent: Vec<Vec<u8>>,
    replies: VecDeque<Vec<u8>>,
    open_calls: usize,
    close_calls: usize,
}

impl Default for MockTransportState {
    fn default() -> Self {
        Self {
            open: false,
            fail_open: false,
            fail_send: false,
            poll_alive: true,
            poll_error: false,
            sent: Vec::new(),
            replies: VecDeque::new(),
            open_calls: 0,
            close_calls: 0,
        }
    }
}

/// Inspection and steering handle for a [`MockTransport`].
#[derive(Clone, Default)]
pub struct MockTransportHandle {
    state: Arc<Mutex<MockTransportState>>,
}

impl MockTransportHandle {
    pub fn set_fail_open(&self, fail: bool) {
        self.state.lock().unwrap().fail_open = fail;
    }

    pub fn set_fail_send(&self, fail: bool) {
        self.state.lock().unwrap().fail_send = fail;
    }

    pub fn set_poll_alive(&self, alive: bool) {
        self.state.lock().unwrap().poll_alive = alive;
    }

    pub fn set_poll_error(&self, error: bool) {
        self.state.lock().unwrap().poll_error = error;
    }

    /// Queue a reply for the next receive instead of the default `ack`.
    pub fn push_reply(&self, reply: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .replies
            .push_back(reply.to_vec());
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.state.lock().unwrap().sent.len()
    }

    pub fn open_calls(&self) -> usize {
        self.state.lock().unwrap().open_calls
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().unwrap().close_calls
    }
}

/// In-memory transport double. Replies `ack` (NUL-padded to the packet
/// size) unless a reply was queued.
pub struct MockTransport {
    state: Arc<Mutex<MockTransportState>>,
}

/// Create a shared mock transport plus its handle.
pub fn mock_transport() -> (SharedTransport, MockTransportHandle) {
    let handle = MockTransportHandle::default();
    let transport: SharedTransport = Arc::new(Mutex::new(MockTransport {
        state: Arc::clone(&handle.state),
    }));
    (transport, handle)
}

impl UsbTransport for MockTransport {
    fn open(&mut self) -> DeviceResult<()> {
        let mut state = self.state.lock().unwrap();
        state.open_calls += 1;
        if state.open {
            return Ok(());
        }
        if state.fail_open {
            return Err(DeviceError::NotFound);
        }
        state.open = true;
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.close_calls += 1;
        state.open = false;
    }

    fn is_open(&self) -> bool {
        self.state.lock().unwrap().open
    }

    fn vendor_id(&self) -> u16 {
        MOCK_VENDOR_ID
    }

    fn product_id(&self) -> u16 {
        MOCK_PRODUCT_ID
    }

    fn packet_size(&self) -> DeviceResult<usize> {
        if !self.is_open() {
            return Err(DeviceError::PacketSizeUnavailable);
        }
        Ok(MOCK_PACKET_SIZE)
    }

    fn send(&mut self, data: &[u8]) -> DeviceResult<()> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(DeviceError::NotOpen);
        }
        if state.fail_send {
            return Err(DeviceError::Usb(rusb::Error::Io));
        }
        state.sent.push(data.to_vec());
        Ok(())
    }

    fn receive(&mut self) -> DeviceResult<Vec<u8>> {
        let mut state = self.state.lock().unwrap();
        if !state.open {
            return Err(DeviceError::NotOpen);
        }
        Ok(state.replies.pop_front().unwrap_or_else(|| {
            let mut ack = b"ack".to_vec();
            ack.resize(MOCK_PACKET_SIZE, 0);
            ack
        }))
    }

    fn poll(&mut self) -> DeviceResult<bool> {
        let state = self.state.lock().unwrap();
        if state.poll_error {
            return Err(DeviceError::Usb(rusb::Error::Io));
        }
        Ok(state.poll_alive)
    }
}

#[derive(Default)]
struct MockMonitorState {
    add: Mutex<Option<EventHandler>>,
    remove: Mutex<Option<EventHandler>>,
    running: AtomicBool,
    start_calls: AtomicUsize,
}

/// Handle for firing events into a [`MockMonitor`] after it moved into a
/// controller.
#[derive(Clone, Default)]
pub struct MockMonitorHandle {
    state: Arc<MockMonitorState>,
}

impl MockMonitorHandle {
    /// Invoke the registered add handler, as a hotplug event would.
    pub fn fire_add(&self) {
        let handler = self.state.add.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    /// Invoke the registered remove handler, as a hotplug event would.
    pub fn fire_remove(&self) {
        let handler = self.state.remove.lock().unwrap().clone();
        if let Some(handler) = handler {
            handler();
        }
    }

    pub fn is_running(&self) -> bool {
        self.state.running.load(Ordering::SeqCst)
    }

    pub fn start_calls(&self) -> usize {
        self.state.start_calls.load(Ordering::SeqCst)
    }
}

/// Monitor double; never spawns a thread, events are fired by tests.
pub struct MockMonitor {
    handle: MockMonitorHandle,
}

/// Create a mock monitor plus its handle.
pub fn mock_monitor() -> (MockMonitor, MockMonitorHandle) {
    let handle = MockMonitorHandle::default();
    (
        MockMonitor {
            handle: handle.clone(),
        },
        handle,
    )
}

impl DeviceMonitor for MockMonitor {
    fn set_add_event_handler(&self, handler: EventHandler) {
        *self.handle.state.add.lock().unwrap() = Some(handler);
    }

    fn set_remove_event_handler(&self, handler: EventHandler) {
        *self.handle.state.remove.lock().unwrap() = Some(handler);
    }

    fn start(&self) -> DeviceResult<()> {
        self.handle.state.start_calls.fetch_add(1, Ordering::SeqCst);
        self.handle.state.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&self) {
        self.handle.state.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.handle.is_running()
    }
}

/// Spin until `predicate` holds or `timeout` elapses.
pub fn wait_until(predicate: impl Fn() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if predicate() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    predicate()
}
