//! Domain requests exchanged with the notification server
//!
//! A [`Request`] is a decoded, validated notification intent. Requests are
//! created by [`crate::decode`] or constructed locally by the client, consumed
//! once by encoding or translation, then discarded.

use crate::error::{ProtocolError, Result};

/// A notification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Register a user and host with the notification server.
    Registration {
        /// Host the client listens on.
        hostname: String,
        /// User the client represents.
        username: String,
    },

    /// Whether any builds are currently active.
    BuildActive {
        /// True if at least one build is running.
        active: bool,
    },

    /// Whether and what kind of attention the user's builds need.
    ///
    /// Invariant: `priority` implies `required`. Use [`Request::attention`]
    /// to construct; it rejects the contradictory combination.
    Attention {
        /// True if attention is required.
        required: bool,
        /// True if the required attention is priority attention.
        priority: bool,
    },

    /// Whether a client or server is up or down.
    Status {
        /// True if up.
        up: bool,
    },
}

impl Request {
    /// Create a registration request.
    pub fn registration(hostname: impl Into<String>, username: impl Into<String>) -> Self {
        Request::Registration {
            hostname: hostname.into(),
            username: username.into(),
        }
    }

    /// Create a build-active request.
    pub fn build_active(active: bool) -> Self {
        Request::BuildActive { active }
    }

    /// Create an attention request.
    ///
    /// Fails with [`ProtocolError::PriorityWithoutAttention`] when `priority`
    /// is set without `required`; the invariant holds from construction, not
    /// at translation time.
    pub fn attention(required: bool, priority: bool) -> Result<Self> {
        if priority && !required {
            return Err(ProtocolError::PriorityWithoutAttention);
        }
        Ok(Request::Attention { required, priority })
    }

    /// Create a status request.
    pub fn status(up: bool) -> Self {
        Request::Status { up }
    }

    /// The integer type tag used on the wire.
    pub fn type_id(&self) -> u32 {
        match self {
            Request::Registration { .. } => 1,
            Request::Attention { .. } => 2,
            Request::BuildActive { .. } => 3,
            Request::Status { .. } => 4,
        }
    }

    /// Short variant name, for error messages and logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            Request::Registration { .. } => "registration",
            Request::Attention { .. } => "attention",
            Request::BuildActive { .. } => "build-active",
            Request::Status { .. } => "status",
        }
    }
}
