//! Translation of requests into USB device commands
//!
//! Two divergent device protocols are supported. The DasBlinkenLichten
//! firmware takes newline-terminated `led=state` text lines, one per LED
//! change. The blink(1) takes a single fixed binary fade-to-RGB report and
//! has no OFF representation: an LED change is expressed by fading the one
//! RGB LED to the color of whichever state is on.

use crate::codec::assemble_command;
use crate::error::{ProtocolError, Result};
use crate::fields;
use crate::packets;
use crate::request::Request;

/// LED switched on.
const ON: &str = "on";
/// LED switched off.
const OFF: &str = "off";
/// LED blinking an SOS pattern.
const SOS: &str = "sos";

/// Length of a blink(1) command report.
pub const BLINK1_COMMAND_LEN: usize = 8;

/// Report ID of every blink(1) command.
const BLINK1_REPORT_ID: u8 = 0x01;
/// 0x63 = 'c' fades to an RGB color; 0x6e = 'n' would set it immediately.
const BLINK1_FADE_TO_RGB: u8 = 0x63;
/// Fade duration for every transition.
const FADE_MILLIS: u16 = 100;
/// The single RGB LED driven by this translation.
const LED_INDEX: u8 = 0;

struct Rgb(u8, u8, u8);

const RED: Rgb = Rgb(255, 0, 0);
const GREEN: Rgb = Rgb(0, 255, 0);
const BLUE: Rgb = Rgb(0, 0, 255);
const YELLOW: Rgb = Rgb(255, 150, 0);

/// Translate a request into DasBlinkenLichten LED command lines.
///
/// An up status fails with [`ProtocolError::UntranslatableStatus`]: when a
/// server comes up the client registers and receives the latest state, so
/// there is nothing to display. A down status switches every indicator on.
///
/// ```
/// use protocol::{Request, translate};
///
/// assert_eq!(
///     translate(&Request::BuildActive { active: true }).unwrap(),
///     "yellow=on\n"
/// );
/// ```
pub fn translate(request: &Request) -> Result<String> {
    match request {
        Request::Status { up } => {
            if *up {
                return Err(ProtocolError::UntranslatableStatus);
            }
            let mut command = led_command(fields::RED_LED, ON);
            command.push_str(&led_command(fields::GREEN_LED, ON));
            command.push_str(&led_command(fields::YELLOW_LED, ON));
            Ok(command)
        }
        Request::BuildActive { active } => Ok(led_command(
            fields::YELLOW_LED,
            if *active { ON } else { OFF },
        )),
        Request::Attention { required, priority } => {
            // required && !priority is unreachable here only in the priority
            // position; the contradictory combination is rejected at
            // construction time.
            let (red_state, green_state) = match (*required, *priority) {
                (true, true) => (SOS, OFF),
                (true, false) => (ON, OFF),
                (false, _) => (OFF, ON),
            };
            let mut command = led_command(fields::RED_LED, red_state);
            command.push_str(&led_command(fields::GREEN_LED, green_state));
            Ok(command)
        }
        other => Err(ProtocolError::UnsupportedTranslate(other.type_name())),
    }
}

/// Translate a request into a blink(1) fade-to-RGB command.
///
/// Returns `Ok(None)` when the request has no representation: the blink(1)
/// command set only expresses an ON transition, so an inactive build-active
/// request emits nothing rather than an explicit off. Only the first ON
/// state maps to a color; compound multi-LED states are not representable
/// with the single LED at index 0.
pub fn translate_for_blink1(request: &Request) -> Result<Option<[u8; BLINK1_COMMAND_LEN]>> {
    let color = match request {
        Request::Attention { required, priority } => {
            // No distinct SOS treatment yet; priority attention shows as red.
            if *required || *priority { RED } else { GREEN }
        }
        Request::BuildActive { active } => {
            if !*active {
                return Ok(None);
            }
            YELLOW
        }
        Request::Status { up } => {
            if *up {
                return Err(ProtocolError::UntranslatableStatus);
            }
            BLUE
        }
        other => return Err(ProtocolError::UnsupportedTranslate(other.type_name())),
    };
    Ok(Some(fade_to_rgb(color)))
}

/// Assemble a single `led=state` command line.
fn led_command(led: &str, state: &str) -> String {
    assemble_command(&[(led, state.to_string())], packets::ALT_TERMINATOR)
}

fn fade_to_rgb(Rgb(red, green, blue): Rgb) -> [u8; BLINK1_COMMAND_LEN] {
    let fade_high = (FADE_MILLIS >> 8) as u8;
    let fade_low = (FADE_MILLIS & 0x00ff) as u8;
    [
        BLINK1_REPORT_ID,
        BLINK1_FADE_TO_RGB,
        red,
        green,
        blue,
        fade_high,
        fade_low,
        LED_INDEX,
    ]
}
