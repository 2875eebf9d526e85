//! The textual device frame protocol.
//!
//! Frames are `alp://`-prefixed slash-separated tokens, divided on the
//! wire by a single byte. Commands go to the device (`ppsw`, `ppin`),
//! read events come from it (`dred`, `ared`).

use crate::pin::{DigitalState, PinEvent, PinId, PinKind};

pub(crate) mod codec;

/// The single sentinel byte appended after each frame on the wire.
pub const FRAME_DIVIDER: u8 = b'\n';

const PREFIX: &str = "alp://";
const POWER_PIN_SWITCH: &str = "ppsw";
const POWER_PIN_INTENSITY: &str = "ppin";
const DIGITAL_READ: &str = "dred";
const ANALOG_READ: &str = "ared";

/// The frame switching a digital pin high or low.
pub fn power_pin_switch(pin: PinId, state: DigitalState) -> Vec<u8> {
    format!(
        "{PREFIX}{POWER_PIN_SWITCH}/{}/{}",
        pin.index,
        state.wire_value()
    )
    .into_bytes()
}

/// The frame setting an analog pin intensity.
pub fn power_pin_intensity(pin: PinId, intensity: i32) -> Vec<u8> {
    format!("{PREFIX}{POWER_PIN_INTENSITY}/{}/{intensity}", pin.index).into_bytes()
}

/// Try to interpret a frame as a pin state change.
///
/// Frames which are not read events (or not even valid UTF-8) yield
/// `None`. They may still be meaningful to a relay observer, so callers
/// should not discard the raw frame on a `None`.
pub fn parse_event(frame: &[u8]) -> Option<PinEvent> {
    let text = std::str::from_utf8(frame).ok()?;

    let mut parts = text.strip_prefix(PREFIX)?.split('/');

    let kind = match parts.next()? {
        DIGITAL_READ => PinKind::Digital,
        ANALOG_READ => PinKind::Analog,
        _ => return None,
    };
    let index = parts.next()?.parse().ok()?;
    let value = parts.next()?.parse().ok()?;

    if parts.next().is_some() {
        return None;
    }

    Some(PinEvent {
        pin: PinId { kind, index },
        value,
    })
}
