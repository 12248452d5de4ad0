//! Integration tests for the device controller
//!
//! Run with: `cargo test -p client --test controller_tests`

mod support;

use client::controller::DeviceController;
use client::monitor::EventHandler;
use client::usb::TransferMode;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use support::{MOCK_PACKET_SIZE, mock_monitor, mock_transport};

fn counting_handler() -> (EventHandler, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    (
        Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }),
        count,
    )
}

mod lifecycle {
    use super::*;

    #[test]
    fn test_start_opens_device_and_fires_add_handler() {
        let (transport, device) = mock_transport();
        let (monitor, monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        let (handler, added) = counting_handler();
        controller.set_add_event_handler(handler);

        controller.start().unwrap();

        assert!(controller.is_running());
        assert!(device.is_open());
        assert!(monitor_handle.is_running());
        assert_eq!(added.load(Ordering::SeqCst), 1);

        controller.stop();
    }

    #[test]
    fn test_start_with_absent_device_is_swallowed() {
        let (transport, device) = mock_transport();
        device.set_fail_open(true);
        let (monitor, monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        let (handler, added) = counting_handler();
        controller.set_add_event_handler(handler);

        // The device not being plugged in yet is not a start failure.
        controller.start().unwrap();

        assert!(controller.is_running());
        assert!(!device.is_open());
        assert!(monitor_handle.is_running());
        assert_eq!(added.load(Ordering::SeqCst), 0);

        controller.stop();
    }

    #[test]
    fn test_start_is_idempotent() {
        let (transport, _device) = mock_transport();
        let (monitor, monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));

        controller.start().unwrap();
        controller.start().unwrap();

        assert!(controller.is_running());
        assert_eq!(monitor_handle.start_calls(), 1);

        controller.stop();
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (transport, _device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));

        controller.start().unwrap();
        controller.stop();
        assert!(!controller.is_running());

        controller.stop();
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_without_start_is_a_noop() {
        let (transport, _device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));

        controller.stop();
        assert!(!controller.is_running());
    }

    #[test]
    fn test_stop_closes_device_and_monitor() {
        let (transport, device) = mock_transport();
        let (monitor, monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));

        controller.start().unwrap();
        assert!(device.is_open());

        controller.stop();
        assert!(!device.is_open());
        assert!(!monitor_handle.is_running());
        assert!(!controller.is_running());
    }
}

mod events {
    use super::*;

    #[test]
    fn test_add_event_opens_device_before_handler() {
        let (transport, device) = mock_transport();
        device.set_fail_open(true);
        let (monitor, monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        let (handler, added) = counting_handler();
        controller.set_add_event_handler(handler);
        controller.start().unwrap();
        assert_eq!(added.load(Ordering::SeqCst), 0);

        device.set_fail_open(false);
        monitor_handle.fire_add();

        assert!(device.is_open());
        assert_eq!(added.load(Ordering::SeqCst), 1);

        controller.stop();
    }

    #[test]
    fn test_add_event_with_failed_open_skips_handler() {
        let (transport, device) = mock_transport();
        device.set_fail_open(true);
        let (monitor, monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        let (handler, added) = counting_handler();
        controller.set_add_event_handler(handler);
        controller.start().unwrap();

        // The device vanished again before it could be opened.
        monitor_handle.fire_add();

        assert!(!device.is_open());
        assert_eq!(added.load(Ordering::SeqCst), 0);

        controller.stop();
    }

    #[test]
    fn test_remove_event_closes_device_before_handler() {
        let (transport, device) = mock_transport();
        let (monitor, monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        let (handler, removed) = counting_handler();
        controller.set_remove_event_handler(handler);
        controller.start().unwrap();
        assert!(device.is_open());

        monitor_handle.fire_remove();

        assert!(!device.is_open());
        assert_eq!(removed.load(Ordering::SeqCst), 1);

        controller.stop();
    }
}

mod raw_send {
    use super::*;

    #[test]
    fn test_send_fails_fast_when_closed() {
        let (transport, device) = mock_transport();
        device.set_fail_open(true);
        let (monitor, _monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        controller.start().unwrap();

        assert!(!controller.send(b"yellow=on\n"));
        assert_eq!(device.sent_count(), 0);

        controller.stop();
    }

    #[test]
    fn test_send_pads_command_and_checks_ack() {
        let (transport, device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        controller.start().unwrap();

        assert!(controller.send(b"yellow=on\n"));

        let sent = device.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].len(), MOCK_PACKET_SIZE);
        assert!(sent[0].starts_with(b"yellow=on\n"));
        assert!(sent[0][b"yellow=on\n".len()..].iter().all(|&b| b == 0));

        controller.stop();
    }

    #[test]
    fn test_send_with_non_ack_reply_reports_false() {
        let (transport, device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        controller.start().unwrap();

        device.push_reply(b"nak\0\0\0");
        assert!(!controller.send(b"yellow=on\n"));

        controller.stop();
    }

    #[test]
    fn test_send_accepts_padded_ack() {
        let (transport, device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        controller.start().unwrap();

        device.push_reply(b"ack\0\0\0\0\0");
        assert!(controller.send(b"red=on\n"));

        controller.stop();
    }

    #[test]
    fn test_send_io_fault_reports_false() {
        let (transport, device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller = DeviceController::new(transport, TransferMode::Raw, Box::new(monitor));
        controller.start().unwrap();

        device.set_fail_send(true);
        assert!(!controller.send(b"yellow=on\n"));

        controller.stop();
    }
}

mod control_send {
    use super::*;

    #[test]
    fn test_send_is_one_shot_and_unpadded() {
        let (transport, device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller =
            DeviceController::new(transport, TransferMode::Control, Box::new(monitor));
        controller.start().unwrap();

        let command = [0x01, 0x63, 255, 150, 0, 0, 100, 0];
        assert!(controller.send(&command));

        let sent = device.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], command);

        controller.stop();
    }

    #[test]
    fn test_send_fault_reports_false() {
        let (transport, device) = mock_transport();
        let (monitor, _monitor_handle) = mock_monitor();
        let controller =
            DeviceController::new(transport, TransferMode::Control, Box::new(monitor));
        controller.start().unwrap();

        device.set_fail_send(true);
        assert!(!controller.send(&[0x01, 0x63, 0, 0, 0, 0, 100, 0]));

        controller.stop();
    }
}
