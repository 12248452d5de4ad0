//! Build light notifier client
//!
//! Receives status events pushed by a notification server and drives a USB
//! build light accordingly, registering itself with the server whenever the
//! device is plugged in.

use anyhow::{Context, Result};
use clap::Parser;
use client::config::{ClientConfig, DeviceClass, MonitorClass};
use client::controller::DeviceController;
use client::monitor::{DeviceMonitor, HotplugMonitor, PollingMonitor};
use client::notifier::NotifierClient;
use client::usb::{Blink1Transport, BulkTransport, SharedTransport};
use common::setup_logging;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "build-light-client")]
#[command(
    author,
    version,
    about = "Build light notifier client - drive a USB indicator from server pushes"
)]
#[command(long_about = "
Bridges a notification server to a USB build light. The client listens for
pushed status events (build active, attention required, server up/down),
translates them into device commands, and registers itself with the server
whenever the configured device is plugged in.

EXAMPLES:
    # Run with default config
    build-light-client

    # Run with custom config
    build-light-client --config /path/to/client.toml

    # Run with debug logging
    build-light-client --log-level debug

CONFIGURATION:
    The client looks for configuration files in the following order:
    1. Path specified with --config
    2. ~/.config/build-light/client.toml
    3. Built-in defaults
")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<std::path::PathBuf>,

    /// Save default configuration to default location and exit
    #[arg(long)]
    save_config: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.save_config {
        let config = ClientConfig::default();
        let path = ClientConfig::default_path();
        config.save(&path).context("Failed to save configuration")?;
        println!("Configuration saved to: {}", path.display());
        return Ok(());
    }

    let config = if let Some(ref path) = args.config {
        ClientConfig::load(Some(path.clone())).context("Failed to load configuration")?
    } else {
        ClientConfig::load_or_default()
    };

    let log_level = args
        .log_level
        .unwrap_or_else(|| config.client.log_level.clone());
    setup_logging(&log_level).context("Failed to set up logging")?;

    let identity = config.identity();
    let transport: SharedTransport = match config.device.class {
        DeviceClass::Bulk => Arc::new(Mutex::new(BulkTransport::new(identity))),
        DeviceClass::Blink1 => Arc::new(Mutex::new(Blink1Transport::new(identity))),
    };

    let monitor: Box<dyn DeviceMonitor> = match config.monitor.class {
        MonitorClass::Hotplug => Box::new(HotplugMonitor::new(
            identity.vendor_id,
            identity.product_id,
        )),
        MonitorClass::Polling => Box::new(PollingMonitor::new(
            Arc::clone(&transport),
            config.polling_period(),
        )),
    };

    let controller = Arc::new(DeviceController::new(
        transport,
        config.device.usb_transfer_mode,
        monitor,
    ));
    let notifier = NotifierClient::new(config.client_options(), controller);

    notifier.start().context("Failed to start the client")?;

    // The shutdown signal is owned here and handed to the handler explicitly;
    // the main thread parks on the channel until Ctrl-C arrives.
    let (shutdown, parked) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = shutdown.send(());
    })
    .context("Failed to set the Ctrl-C handler")?;

    info!("Press Ctrl-C to stop");
    let _ = parked.recv();

    notifier.stop();
    Ok(())
}
