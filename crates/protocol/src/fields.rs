//! Wire field keys.

/// Numeric request type tag; present in every request packet.
pub const REQUEST_TYPE_ID: &str = "requesttypeid";

/// User to register with the notification server.
pub const USERNAME: &str = "username";

/// Host the registered user listens on.
pub const HOSTNAME: &str = "hostname";

/// Red LED.
pub const RED_LED: &str = "red";

/// Green LED.
pub const GREEN_LED: &str = "green";

/// Blue LED.
pub const BLUE_LED: &str = "blue";

/// Yellow LED.
pub const YELLOW_LED: &str = "yellow";

/// Server or client up/down status.
pub const SERVER_STATUS: &str = "status";

/// Whether any builds are active.
pub const BUILDS_ACTIVE: &str = "buildsactive";

/// Whether attention is required.
pub const ATTENTION_REQUIRED: &str = "attention";

/// Whether required attention is priority attention.
pub const ATTENTION_PRIORITY: &str = "priority";
