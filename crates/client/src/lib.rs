//! Build light notifier client library
//!
//! Bridges the notification server's control channel to a physical USB
//! indicator device. The [`notifier::NotifierClient`] composes a TCP listener
//! for pushed requests with a [`controller::DeviceController`] that owns the
//! USB transport and a device presence monitor; decoded requests are
//! translated into device commands and driven out over USB, and the client
//! registers itself with the server whenever the device is plugged in.

pub mod config;
pub mod controller;
pub mod monitor;
pub mod notifier;
pub mod usb;
