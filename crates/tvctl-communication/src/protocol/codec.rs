//! Wire codec
//!
//! Pure functions between [`Command`]/[`AckFrame`] and bytes.

use super::{AckFrame, AckStatus, Command, BROADCAST_ID, COMMAND_TERMINATOR};
use tvctl_core::{ProtocolError, MAX_VOLUME};

/// Left-pad an argument with `'0'` to two characters
pub fn pad_argument(argument: &str) -> String {
    format!("{:0>2}", argument)
}

/// Encode a command as `"<code> 00 <argument>\r"`
pub fn encode(command: &Command) -> Vec<u8> {
    format!(
        "{} {} {}{}",
        command.code,
        BROADCAST_ID,
        pad_argument(&command.argument),
        COMMAND_TERMINATOR
    )
    .into_bytes()
}

/// Decode one inbound frame (terminator already stripped)
///
/// The frame is `"<code> <id> <status><payload>"`. Surrounding whitespace
/// left over from earlier frames is ignored, as is anything after a further
/// space.
pub fn decode(raw: &[u8]) -> Result<AckFrame, ProtocolError> {
    let malformed = |reason: &str| ProtocolError::MalformedFrame {
        frame: String::from_utf8_lossy(raw).into_owned(),
        reason: reason.to_string(),
    };

    let text = std::str::from_utf8(raw).map_err(|_| malformed("not valid ASCII"))?;
    let text = text.trim_matches(|c: char| c.is_ascii_whitespace());

    let mut parts = text.split(' ');
    let (code, device_id, status_and_payload) = match (parts.next(), parts.next(), parts.next())
    {
        (Some(code), Some(id), Some(rest)) if !code.is_empty() => (code, id, rest),
        _ => return Err(malformed("expected three space-separated fields")),
    };

    let status = status_and_payload
        .get(..2)
        .ok_or_else(|| malformed("status field shorter than two characters"))?;
    let payload = &status_and_payload[2..];

    Ok(AckFrame {
        code: code.to_string(),
        device_id: device_id.to_string(),
        status: AckStatus::from_wire(status),
        payload: payload.to_string(),
    })
}

/// Render a volume level as the two hex digits the set expects
///
/// The level is rounded to the nearest integer and clamped to `0..=64`.
pub fn encode_volume_level(level: f64) -> String {
    let level = if level.is_nan() {
        0.0
    } else {
        level.round().clamp(0.0, f64::from(MAX_VOLUME))
    };
    format!("{:02X}", level as u8)
}

/// Interpret a power ack payload; only a value of exactly 1 means on
pub fn parse_power_payload(payload: &str) -> bool {
    payload.trim().parse::<i64>().map(|v| v == 1).unwrap_or(false)
}

/// Interpret a volume ack payload as base-16
///
/// Values above 64 are clamped.
pub fn parse_volume_payload(payload: &str) -> Result<u8, ProtocolError> {
    let value = u32::from_str_radix(payload.trim(), 16).map_err(|_| {
        ProtocolError::InvalidPayload {
            code: super::DeviceCode::Volume.as_str().to_string(),
            payload: payload.to_string(),
        }
    })?;

    if value > u32::from(MAX_VOLUME) {
        tracing::warn!("Volume {:#x} out of range, clamping to {}", value, MAX_VOLUME);
        return Ok(MAX_VOLUME);
    }
    Ok(value as u8)
}
