//! Integration tests for configuration parsing
//!
//! Run with: `cargo test -p client --test config_tests`

use client::config::{ClientConfig, DeviceClass, MonitorClass, UsbProtocol};
use client::usb::TransferMode;
use std::time::Duration;
use tempfile::tempdir;

const FULL_CONFIG: &str = r#"
[client]
address = "192.168.1.50"
port = 9290
username = "alice"
registration_retry_period_secs = 10
log_level = "debug"

[server]
address = "ci.example.com"
port = 9191

[device]
vendor_id = 0x27b8
product_id = 0x01ed
interface_number = 0
usage_page = 0xff00
usage = 0x0001
class = "Blink1"
usb_protocol = "Blink1"
usb_transfer_mode = "Control"

[monitor]
class = "Polling"
polling_period_secs = 2
"#;

#[test]
fn test_defaults() {
    let config = ClientConfig::default();

    assert_eq!(config.client.address, "127.0.0.1");
    assert_eq!(config.client.port, 9192);
    assert_eq!(config.client.username, "");
    assert_eq!(config.client.registration_retry_period_secs, 5);
    assert_eq!(config.client.log_level, "info");

    assert_eq!(config.server.address, "127.0.0.1");
    assert_eq!(config.server.port, 9191);

    assert_eq!(config.device.vendor_id, 0x16c0);
    assert_eq!(config.device.product_id, 0x0486);
    assert_eq!(config.device.interface_number, 1);
    assert_eq!(config.device.usage_page, 0xffc9);
    assert_eq!(config.device.usage, 0x0004);
    assert_eq!(config.device.class, DeviceClass::Bulk);
    assert_eq!(config.device.usb_protocol, UsbProtocol::DasBlinkenLichten);
    assert_eq!(config.device.usb_transfer_mode, TransferMode::Raw);

    assert_eq!(config.monitor.class, MonitorClass::Hotplug);
    assert_eq!(config.monitor.polling_period_secs, 1);
}

#[test]
fn test_empty_config_parses_to_defaults() {
    let config: ClientConfig = toml::from_str("").unwrap();
    assert_eq!(config.client.port, 9192);
    assert_eq!(config.device.vendor_id, 0x16c0);
    assert_eq!(config.monitor.class, MonitorClass::Hotplug);
}

#[test]
fn test_full_config_parses() {
    let config: ClientConfig = toml::from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.client.address, "192.168.1.50");
    assert_eq!(config.client.port, 9290);
    assert_eq!(config.client.username, "alice");
    assert_eq!(config.client.registration_retry_period_secs, 10);
    assert_eq!(config.client.log_level, "debug");

    assert_eq!(config.server.address, "ci.example.com");
    assert_eq!(config.server.port, 9191);

    assert_eq!(config.device.vendor_id, 0x27b8);
    assert_eq!(config.device.product_id, 0x01ed);
    assert_eq!(config.device.interface_number, 0);
    assert_eq!(config.device.class, DeviceClass::Blink1);
    assert_eq!(config.device.usb_protocol, UsbProtocol::Blink1);
    assert_eq!(config.device.usb_transfer_mode, TransferMode::Control);

    assert_eq!(config.monitor.class, MonitorClass::Polling);
    assert_eq!(config.monitor.polling_period_secs, 2);
}

#[test]
fn test_partial_section_uses_field_defaults() {
    let config: ClientConfig = toml::from_str(
        r#"
[client]
username = "bob"

[device]
vendor_id = 0x1234
"#,
    )
    .unwrap();

    assert_eq!(config.client.username, "bob");
    assert_eq!(config.client.port, 9192);
    assert_eq!(config.device.vendor_id, 0x1234);
    assert_eq!(config.device.product_id, 0x0486);
}

#[test]
fn test_invalid_selector_is_rejected() {
    let result: Result<ClientConfig, _> = toml::from_str(
        r#"
[device]
class = "TeensyRawhid"
"#,
    );
    assert!(result.is_err());
}

#[test]
fn test_save_and_load_roundtrip() {
    let directory = tempdir().unwrap();
    let path = directory.path().join("nested").join("client.toml");

    let mut config = ClientConfig::default();
    config.client.username = "alice".to_string();
    config.device.usb_protocol = UsbProtocol::Blink1;
    config.save(&path).unwrap();

    let loaded = ClientConfig::load(Some(path)).unwrap();
    assert_eq!(loaded.client.username, "alice");
    assert_eq!(loaded.device.usb_protocol, UsbProtocol::Blink1);
    assert_eq!(loaded.client.port, 9192);
}

#[test]
fn test_load_missing_file_fails() {
    let directory = tempdir().unwrap();
    let path = directory.path().join("absent.toml");
    assert!(ClientConfig::load(Some(path)).is_err());
}

#[test]
fn test_derived_values() {
    let config: ClientConfig = toml::from_str(FULL_CONFIG).unwrap();

    assert_eq!(config.retry_period(), Duration::from_secs(10));
    assert_eq!(config.polling_period(), Duration::from_secs(2));

    let identity = config.identity();
    assert_eq!(identity.vendor_id, 0x27b8);
    assert_eq!(identity.product_id, 0x01ed);
    assert_eq!(identity.interface_number, 0);

    let options = config.client_options();
    assert_eq!(options.username, "alice");
    assert_eq!(options.address, "192.168.1.50");
    assert_eq!(options.port, 9290);
    assert_eq!(options.server_address, "ci.example.com");
    assert_eq!(options.server_port, 9191);
    assert_eq!(options.retry_period, Duration::from_secs(10));
    assert_eq!(options.usb_protocol, UsbProtocol::Blink1);
}
