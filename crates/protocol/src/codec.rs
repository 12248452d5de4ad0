//! Request packet encoding and decoding
//!
//! Decodes raw bytes received from the notification server into a [`Request`]
//! and encodes client-originated requests for the wire. The two directions
//! are asymmetric: registration and status requests encode but do not decode,
//! since the server never pushes them back to a client.

use crate::error::{ProtocolError, Result};
use crate::fields;
use crate::packets;
use crate::request::Request;
use std::collections::HashMap;

/// Decode data received from the notification server.
///
/// The payload must be a `!`-terminated packet of unique `key=value` pairs
/// with a numeric `requesttypeid` field:
///
/// ```
/// use protocol::{Request, decode};
///
/// let request = decode(b"requesttypeid=3;buildsactive=1!").unwrap();
/// assert_eq!(request, Request::BuildActive { active: true });
/// ```
pub fn decode(data: &[u8]) -> Result<Request> {
    let packet = decompose(data)?;
    let type_id = packet
        .get(fields::REQUEST_TYPE_ID)
        .and_then(|value| value.parse::<u32>().ok())
        .ok_or(ProtocolError::InvalidTypeId)?;

    match type_id {
        2 => {
            let required = bool_field(&packet, fields::ATTENTION_REQUIRED)?;
            let priority = bool_field(&packet, fields::ATTENTION_PRIORITY)?;
            Request::attention(required, priority)
        }
        3 => Ok(Request::build_active(bool_field(
            &packet,
            fields::BUILDS_ACTIVE,
        )?)),
        4 => Ok(Request::status(bool_field(&packet, fields::SERVER_STATUS)?)),
        other => Err(ProtocolError::UnknownTypeId(other)),
    }
}

/// Encode a request for transmission to the notification server.
///
/// Only registration and status requests travel client-to-server; any other
/// variant fails with [`ProtocolError::UnsupportedEncode`]. Field order is
/// deterministic: the type tag always leads.
pub fn encode(request: &Request) -> Result<String> {
    match request {
        Request::Registration { hostname, username } => Ok(assemble_command(
            &[
                (fields::REQUEST_TYPE_ID, request.type_id().to_string()),
                (fields::HOSTNAME, hostname.clone()),
                (fields::USERNAME, username.clone()),
            ],
            packets::TERMINATOR,
        )),
        Request::Status { up } => Ok(assemble_command(
            &[
                (fields::REQUEST_TYPE_ID, request.type_id().to_string()),
                (fields::SERVER_STATUS, u32::from(*up).to_string()),
            ],
            packets::TERMINATOR,
        )),
        other => Err(ProtocolError::UnsupportedEncode(other.type_name())),
    }
}

/// The request used to challenge the USB device during liveness polling.
pub fn get_challenge_request() -> String {
    let mut request = String::from(packets::CHALLENGE_REQUEST);
    request.push(packets::ALT_TERMINATOR);
    request
}

/// Check whether a challenge response received from the USB device is valid.
///
/// Device replies arrive in fixed-size reports, so trailing NUL padding and
/// whitespace are stripped before comparison.
pub fn is_challenge_response(data: &[u8]) -> bool {
    strip(data) == packets::CHALLENGE_RESPONSE
}

/// Strip surrounding whitespace and NUL padding from raw device data.
pub fn strip(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_matches(|c: char| c.is_whitespace() || c == '\0')
        .to_string()
}

/// Decompose a raw packet into its key-value fields.
fn decompose(data: &[u8]) -> Result<HashMap<String, String>> {
    let text = std::str::from_utf8(data).map_err(|_| ProtocolError::NonUtf8)?;
    if !text.ends_with(packets::TERMINATOR) {
        return Err(ProtocolError::UnterminatedPacket);
    }

    let mut packet = HashMap::new();
    let body = text.trim_end_matches(packets::TERMINATOR);
    for part in body.split(packets::COMMAND_SEPARATOR) {
        let (key, value) = part
            .split_once(packets::FIELD_SEPARATOR)
            .ok_or_else(|| ProtocolError::MalformedField(part.to_string()))?;
        if packet
            .insert(key.to_string(), value.to_string())
            .is_some()
        {
            return Err(ProtocolError::DuplicateField(key.to_string()));
        }
    }
    Ok(packet)
}

/// Parse a boolean field: an integer string, non-zero meaning true.
fn bool_field(packet: &HashMap<String, String>, field: &'static str) -> Result<bool> {
    let value = packet
        .get(field)
        .ok_or(ProtocolError::MissingField(field))?;
    let numeric = value
        .parse::<i64>()
        .map_err(|_| ProtocolError::InvalidBool {
            field,
            value: value.clone(),
        })?;
    Ok(numeric != 0)
}

/// Assemble key-value pairs into a terminated packet, in the given order.
pub(crate) fn assemble_command(pairs: &[(&str, String)], terminator: char) -> String {
    let mut command = String::new();
    for (index, (key, value)) in pairs.iter().enumerate() {
        if index > 0 {
            command.push(packets::COMMAND_SEPARATOR);
        }
        command.push_str(key);
        command.push(packets::FIELD_SEPARATOR);
        command.push_str(value);
    }
    command.push(terminator);
    command
}
