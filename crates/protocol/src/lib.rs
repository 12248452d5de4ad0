//! Wire protocol for the build light notifier
//!
//! This crate defines the line-based notification protocol spoken between the
//! notifier client and the notification server, and the translation of
//! decoded requests into USB device commands. It is pure: no I/O, no state.
//!
//! # Request packets
//!
//! A request is a flat set of `key=value` fields separated by `;` and
//! terminated by `!`:
//!
//! ```text
//! requesttypeid=4;status=1!
//! ```
//!
//! # Example
//!
//! ```
//! use protocol::{Request, decode, encode};
//!
//! let request = decode(b"requesttypeid=4;status=0!").unwrap();
//! assert!(matches!(request, Request::Status { up: false }));
//!
//! let wire = encode(&Request::registration("myhost", "me")).unwrap();
//! assert!(wire.ends_with('!'));
//! ```
//!
//! # Device commands
//!
//! Two device protocol variants exist. The DasBlinkenLichten variant speaks
//! newline-terminated `led=state` lines; the blink(1) variant speaks a fixed
//! 8-byte fade-to-RGB report. See [`translate`] and [`translate_for_blink1`].

pub mod codec;
pub mod error;
pub mod fields;
pub mod packets;
pub mod request;
pub mod translate;

pub use codec::{decode, encode, get_challenge_request, is_challenge_response, strip};
pub use error::{ProtocolError, Result};
pub use request::Request;
pub use translate::{BLINK1_COMMAND_LEN, translate, translate_for_blink1};
