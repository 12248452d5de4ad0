//! Client configuration management

use crate::notifier::ClientOptions;
use crate::usb::{DeviceIdentity, TransferMode};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub client: ClientSettings,
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default)]
    pub device: DeviceSettings,
    #[serde(default)]
    pub monitor: MonitorSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSettings {
    /// Address the client listens on and registers as its host.
    #[serde(default = "ClientSettings::default_address")]
    pub address: String,
    /// Port the client listens on.
    #[serde(default = "ClientSettings::default_port")]
    pub port: u16,
    /// User this client represents.
    #[serde(default)]
    pub username: String,
    /// Seconds between registration attempts after a failure.
    #[serde(default = "ClientSettings::default_retry_period")]
    pub registration_retry_period_secs: u64,
    /// Default log filter when RUST_LOG is not set.
    #[serde(default = "ClientSettings::default_log_level")]
    pub log_level: String,
}

impl ClientSettings {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        9192
    }

    fn default_retry_period() -> u64 {
        5
    }

    fn default_log_level() -> String {
        "info".to_string()
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
            username: String::new(),
            registration_retry_period_secs: Self::default_retry_period(),
            log_level: Self::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Notification server address.
    #[serde(default = "ServerSettings::default_address")]
    pub address: String,
    /// Notification server port.
    #[serde(default = "ServerSettings::default_port")]
    pub port: u16,
}

impl ServerSettings {
    fn default_address() -> String {
        "127.0.0.1".to_string()
    }

    fn default_port() -> u16 {
        9191
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            port: Self::default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSettings {
    #[serde(default = "DeviceSettings::default_vendor_id")]
    pub vendor_id: u16,
    #[serde(default = "DeviceSettings::default_product_id")]
    pub product_id: u16,
    #[serde(default = "DeviceSettings::default_interface_number")]
    pub interface_number: u8,
    #[serde(default = "DeviceSettings::default_usage_page")]
    pub usage_page: u16,
    #[serde(default = "DeviceSettings::default_usage")]
    pub usage: u16,
    /// Concrete transport binding.
    #[serde(default)]
    pub class: DeviceClass,
    /// Device command protocol.
    #[serde(default)]
    pub usb_protocol: UsbProtocol,
    /// Transfer mode the controller drives the transport with.
    #[serde(default)]
    pub usb_transfer_mode: TransferMode,
}

impl DeviceSettings {
    fn default_vendor_id() -> u16 {
        0x16c0
    }

    fn default_product_id() -> u16 {
        0x0486
    }

    fn default_interface_number() -> u8 {
        1
    }

    fn default_usage_page() -> u16 {
        0xffc9
    }

    fn default_usage() -> u16 {
        0x0004
    }
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            vendor_id: Self::default_vendor_id(),
            product_id: Self::default_product_id(),
            interface_number: Self::default_interface_number(),
            usage_page: Self::default_usage_page(),
            usage: Self::default_usage(),
            class: DeviceClass::default(),
            usb_protocol: UsbProtocol::default(),
            usb_transfer_mode: TransferMode::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Presence detection strategy.
    #[serde(default)]
    pub class: MonitorClass,
    /// Seconds between iterations of the polling monitor.
    #[serde(default = "MonitorSettings::default_polling_period")]
    pub polling_period_secs: u64,
}

impl MonitorSettings {
    fn default_polling_period() -> u64 {
        1
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            class: MonitorClass::default(),
            polling_period_secs: Self::default_polling_period(),
        }
    }
}

/// Concrete transport selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceClass {
    /// Endpoint-pair device (rawhid-style build light firmware).
    #[default]
    Bulk,
    /// blink(1) control-transfer device.
    Blink1,
}

/// Presence detection strategy selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MonitorClass {
    /// Subscribe to USB hotplug events.
    #[default]
    Hotplug,
    /// Poll the transport on a fixed interval.
    Polling,
}

/// Device command protocol selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UsbProtocol {
    /// Newline-terminated `led=state` text lines.
    #[default]
    DasBlinkenLichten,
    /// Fixed 8-byte fade-to-RGB reports.
    Blink1,
}

impl ClientConfig {
    /// Default configuration file location.
    pub fn default_path() -> PathBuf {
        if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("build-light").join("client.toml")
        } else {
            PathBuf::from("/etc/build-light/client.toml")
        }
    }

    /// Load configuration from `path`, or from the default location.
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let path = path.unwrap_or_else(Self::default_path);
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load from the default location, falling back to built-in defaults.
    pub fn load_or_default() -> Self {
        Self::load(None).unwrap_or_default()
    }

    /// Save configuration to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let contents =
            toml::to_string_pretty(self).context("Failed to serialize configuration")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Identity of the device to bind to.
    pub fn identity(&self) -> DeviceIdentity {
        DeviceIdentity {
            vendor_id: self.device.vendor_id,
            product_id: self.device.product_id,
            interface_number: self.device.interface_number,
            usage_page: self.device.usage_page,
            usage: self.device.usage,
        }
    }

    /// Delay before a failed registration is retried.
    pub fn retry_period(&self) -> Duration {
        Duration::from_secs(self.client.registration_retry_period_secs)
    }

    /// Interval between polling monitor iterations.
    pub fn polling_period(&self) -> Duration {
        Duration::from_secs(self.monitor.polling_period_secs)
    }

    /// Construction parameters for the notifier client.
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            username: self.client.username.clone(),
            address: self.client.address.clone(),
            port: self.client.port,
            server_address: self.server.address.clone(),
            server_port: self.server.port,
            retry_period: self.retry_period(),
            usb_protocol: self.device.usb_protocol,
        }
    }
}
