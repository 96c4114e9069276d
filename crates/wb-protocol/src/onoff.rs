//! On/off token helpers shared by relay payloads and the HTTP surface.

use crate::error::{ProtocolError, ProtocolResult};

/// Parse an "on"/"off" token (case-insensitive).
pub fn parse_on_off(token: &str) -> ProtocolResult<bool> {
    match token.to_ascii_lowercase().as_str() {
        "on" => Ok(true),
        "off" => Ok(false),
        _ => Err(ProtocolError::InvalidOnOff(token.to_string())),
    }
}

/// Render a relay state as its "on"/"off" token.
pub fn format_on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tokens() {
        assert!(parse_on_off("on").unwrap());
        assert!(!parse_on_off("off").unwrap());
        assert!(parse_on_off("ON").unwrap());
        assert!(parse_on_off("1").is_err());
        assert!(parse_on_off("").is_err());
    }

    #[test]
    fn format_round_trip() {
        assert!(parse_on_off(format_on_off(true)).unwrap());
        assert!(!parse_on_off(format_on_off(false)).unwrap());
    }
}
