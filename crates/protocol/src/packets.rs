//! Packet framing constants shared by the server and device protocols.

/// Maximum size of a single request frame, in bytes.
pub const MAX_SIZE: usize = 1024;

/// Separates `key=value` pairs within a packet.
pub const COMMAND_SEPARATOR: char = ';';

/// Separates a key from its value.
pub const FIELD_SEPARATOR: char = '=';

/// Terminates a client/server request packet.
pub const TERMINATOR: char = '!';

/// Terminates a single LED command line sent to the device.
pub const ALT_TERMINATOR: char = '\n';

/// Liveness challenge sent to the device.
pub const CHALLENGE_REQUEST: &str = "bistdudasblinkenlichten";

/// Expected response to the liveness challenge.
pub const CHALLENGE_RESPONSE: &str = "ichbindasblinkenlichten";
