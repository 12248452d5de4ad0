//! Protocol error types

use thiserror::Error;

/// Invalid-request conditions raised by decoding, encoding and translation.
///
/// Every variant is surfaced synchronously to the caller and is never
/// retried: a request that fails here was malformed, ambiguous, or asked the
/// codec for a direction the protocol does not have.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Request data did not end with the packet terminator
    #[error("request data is not terminated")]
    UnterminatedPacket,

    /// Request data was not valid UTF-8
    #[error("request data is not valid UTF-8")]
    NonUtf8,

    /// A field was not a `key=value` pair
    #[error("malformed field: {0:?}")]
    MalformedField(String),

    /// The same key appeared more than once in one packet
    #[error("ambiguous or duplicate field: {0:?}")]
    DuplicateField(String),

    /// The type tag field was missing or not numeric
    #[error("no or invalid request type id")]
    InvalidTypeId,

    /// The numeric type tag matched no decodable request variant
    #[error("cannot decode a request of type id {0}")]
    UnknownTypeId(u32),

    /// A field required by the tagged variant was absent
    #[error("missing field: {0}")]
    MissingField(&'static str),

    /// A boolean field did not parse as an integer
    #[error("invalid boolean field {field}: {value:?}")]
    InvalidBool { field: &'static str, value: String },

    /// The request variant has no client-to-server encoding
    #[error("cannot encode a {0} request")]
    UnsupportedEncode(&'static str),

    /// The request variant has no device command translation
    #[error("cannot translate a {0} request")]
    UnsupportedTranslate(&'static str),

    /// Only a down status is meaningful to the device
    #[error("only a client or server down request can be translated")]
    UntranslatableStatus,

    /// Priority attention without required attention is contradictory
    #[error("priority only valid if attention is required")]
    PriorityWithoutAttention,
}

/// Type alias for protocol results
pub type Result<T> = std::result::Result<T, ProtocolError>;
