//! Common utilities for the build light notifier
//!
//! This crate provides the runtime plumbing shared between the notifier
//! client and the notification server: the TCP listener that receives pushed
//! requests, the one-shot send helper for outbound frames, error handling,
//! and logging setup.

pub mod error;
pub mod listener;
pub mod logging;
pub mod net;

pub use error::{Error, Result};
pub use listener::{DataHandler, Listener};
pub use logging::setup_logging;
