//! Per-source payload parsing.
//!
//! Every parser returns [`SourceError::Malformed`] on a payload it does not
//! recognize, so a bad response only disqualifies the source that sent it.

use serde::Deserialize;

use crate::types::{ResponseFormat, SourceError};

#[derive(Deserialize)]
struct DecimalArrayPayload {
    #[serde(default)]
    success: bool,
    data: Vec<u8>,
}

#[derive(Deserialize)]
struct LfdPayload {
    qrn: String,
    length: usize,
}

fn malformed(msg: impl Into<String>) -> SourceError {
    SourceError::Malformed(msg.into())
}

/// Parse exactly two hex digits into a byte.
pub fn parse_hex_byte(s: &str) -> Result<u8, SourceError> {
    let s = s.trim();
    if s.len() != 2 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(malformed(format!("expected 2 hex digits, got {s:?}")));
    }
    u8::from_str_radix(s, 16).map_err(|e| malformed(e.to_string()))
}

/// Parse exactly eight `0`/`1` characters into a byte.
pub fn parse_binary_digits(s: &str) -> Result<u8, SourceError> {
    let s = s.trim();
    if s.len() != 8 || !s.chars().all(|c| c == '0' || c == '1') {
        return Err(malformed(format!("expected 8 binary digits, got {s:?}")));
    }
    u8::from_str_radix(s, 2).map_err(|e| malformed(e.to_string()))
}

/// Parse `{"success": true, "data": [N, ...]}` and return the first element.
pub fn parse_decimal_array(body: &str) -> Result<u8, SourceError> {
    let payload: DecimalArrayPayload =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid JSON array payload: {e}")))?;

    if !payload.success {
        return Err(malformed("payload reports success=false"));
    }

    payload
        .data
        .first()
        .copied()
        .ok_or_else(|| malformed("payload data is empty"))
}

/// Parse the LfD response `{"qrn": "hh", "length": 1}`.
pub fn parse_lfd_hex(body: &str) -> Result<u8, SourceError> {
    let payload: LfdPayload =
        serde_json::from_str(body).map_err(|e| malformed(format!("invalid LfD payload: {e}")))?;

    if payload.length != 1 {
        return Err(malformed(format!(
            "expected length 1, got {}",
            payload.length
        )));
    }

    parse_hex_byte(&payload.qrn)
}

/// Parse the relay envelope.
pub fn parse_envelope(body: &str) -> Result<u8, SourceError> {
    parse_decimal_array(body)
}

/// Parse a response body according to its source's format.
pub fn parse_payload(format: ResponseFormat, body: &str) -> Result<u8, SourceError> {
    match format {
        ResponseFormat::BinaryDigits => parse_binary_digits(body),
        ResponseFormat::DecimalArray => parse_decimal_array(body),
        ResponseFormat::HexJson => parse_lfd_hex(body),
        ResponseFormat::Envelope => parse_envelope(body),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_byte() {
        assert_eq!(parse_hex_byte("00").unwrap(), 0);
        assert_eq!(parse_hex_byte("7f").unwrap(), 127);
        assert_eq!(parse_hex_byte("FF").unwrap(), 255);
        assert_eq!(parse_hex_byte(" a3\n").unwrap(), 0xa3);
    }

    #[test]
    fn test_hex_byte_rejects_bad_input() {
        for bad in ["", "f", "fff", "zz", "+f", "0x"] {
            assert!(
                matches!(parse_hex_byte(bad), Err(SourceError::Malformed(_))),
                "{bad:?} should be malformed"
            );
        }
    }

    #[test]
    fn test_binary_digits() {
        assert_eq!(parse_binary_digits("00000000").unwrap(), 0);
        assert_eq!(parse_binary_digits("00000001").unwrap(), 1);
        assert_eq!(parse_binary_digits("10000000").unwrap(), 128);
        assert_eq!(parse_binary_digits("11111111").unwrap(), 255);
        assert_eq!(parse_binary_digits("01010101\n").unwrap(), 85);
    }

    #[test]
    fn test_binary_digits_rejects_wrong_length_or_alphabet() {
        for bad in ["", "0101010", "010101010", "0101201a", "<html>ok"] {
            assert!(parse_binary_digits(bad).is_err(), "{bad:?} should be malformed");
        }
    }

    #[test]
    fn test_decimal_array() {
        let body = r#"{"type":"uint8","length":1,"data":[200],"success":true}"#;
        assert_eq!(parse_decimal_array(body).unwrap(), 200);
    }

    #[test]
    fn test_decimal_array_rejects_failures() {
        let cases = [
            r#"{"success":false,"data":[1]}"#,
            r#"{"success":true,"data":[]}"#,
            r#"{"success":true,"data":[256]}"#,
            r#"{"success":true,"data":[-1]}"#,
            r#"{"success":true,"data":["12"]}"#,
            r#"{"data":[1]}"#,
            "not json",
        ];
        for body in cases {
            assert!(parse_decimal_array(body).is_err(), "{body} should be malformed");
        }
    }

    #[test]
    fn test_lfd_hex() {
        assert_eq!(parse_lfd_hex(r#"{"qrn":"c4","length":1}"#).unwrap(), 0xc4);
        assert!(parse_lfd_hex(r#"{"qrn":"c4d1","length":2}"#).is_err());
        assert!(parse_lfd_hex(r#"{"qrn":"","length":1}"#).is_err());
        assert!(parse_lfd_hex(r#"{"length":1}"#).is_err());
    }

    #[test]
    fn test_parse_payload_dispatch() {
        assert_eq!(parse_payload(ResponseFormat::BinaryDigits, "00000011").unwrap(), 3);
        assert_eq!(
            parse_payload(ResponseFormat::Envelope, r#"{"success":true,"data":[9],"length":1,"type":"uint8_lfd"}"#)
                .unwrap(),
            9
        );
        assert!(parse_payload(ResponseFormat::HexJson, "00000011").is_err());
    }
}
