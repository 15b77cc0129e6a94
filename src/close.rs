//! Close code constants and close-frame payload validation (core §3, §4.7).
//! Grounded on `WsBase.h`'s `WsCloseCode` enum in
//! `examples/original_source/galay-http/protoc/websocket/WsBase.h`.

use crate::error::Error;
use crate::utf8;

pub const NORMAL: u16 = 1000;
pub const GOING_AWAY: u16 = 1001;
pub const PROTOCOL_ERROR: u16 = 1002;
pub const UNSUPPORTED_DATA: u16 = 1003;
pub const NO_STATUS_RECEIVED: u16 = 1005; // reserved: never on wire
pub const ABNORMAL_CLOSURE: u16 = 1006; // reserved: never on wire
pub const INVALID_PAYLOAD: u16 = 1007;
pub const POLICY_VIOLATION: u16 = 1008;
pub const MESSAGE_TOO_BIG: u16 = 1009;
pub const MANDATORY_EXTENSION: u16 = 1010;
pub const INTERNAL_ERROR: u16 = 1011;
pub const SERVICE_RESTART: u16 = 1012;
pub const TRY_AGAIN_LATER: u16 = 1013;
pub const BAD_GATEWAY: u16 = 1014;
pub const TLS_HANDSHAKE: u16 = 1015; // reserved: never on wire

/// Codes that RFC 6455 §7.4.1 reserves and that MUST NOT appear on the wire.
fn is_reserved(code: u16) -> bool {
    matches!(
        code,
        NO_STATUS_RECEIVED | ABNORMAL_CLOSURE | TLS_HANDSHAKE | 1004
    )
}

/// True if `code` is legal to place in an outbound or inbound Close frame
/// payload (core §3: "<1000 or in reserved ranges are rejected").
pub fn valid_on_wire(code: u16) -> bool {
    if code < 1000 || is_reserved(code) {
        return false;
    }
    // 1016..=2999 is reserved by the RFC for future WebSocket-protocol use;
    // 3000..=4999 is open to applications and extensions.
    !(1016..=2999).contains(&code)
}

/// Parses and validates a Close frame's payload (core §4.7). `Ok(None)`
/// means an empty payload (no code given, implies 1005 locally but 1005
/// itself must never be sent). `validate_utf8` gates whether the reason
/// bytes are checked for UTF-8 validity.
pub fn parse_payload(payload: &[u8], validate_utf8: bool) -> Result<Option<(u16, String)>, Error> {
    if payload.is_empty() {
        return Ok(None);
    }
    if payload.len() == 1 {
        return Err(Error::CloseFrameInvalid);
    }
    let code = u16::from_be_bytes([payload[0], payload[1]]);
    if !valid_on_wire(code) {
        return Err(Error::CloseFrameInvalid);
    }
    let reason_bytes = &payload[2..];
    let reason = if validate_utf8 {
        utf8::validate_complete(reason_bytes).map_err(|_| Error::CloseFrameInvalid)?;
        String::from_utf8_lossy(reason_bytes).into_owned()
    } else {
        String::from_utf8_lossy(reason_bytes).into_owned()
    };
    Ok(Some((code, reason)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_is_legal() {
        assert_eq!(parse_payload(&[], true).unwrap(), None);
    }

    #[test]
    fn single_byte_payload_is_invalid() {
        assert!(parse_payload(&[0x03], true).is_err());
    }

    #[test]
    fn reserved_codes_are_rejected() {
        for code in [NO_STATUS_RECEIVED, ABNORMAL_CLOSURE, TLS_HANDSHAKE, 1004] {
            let mut payload = code.to_be_bytes().to_vec();
            payload.extend_from_slice(b"why");
            assert!(parse_payload(&payload, true).is_err(), "{code} should be rejected");
        }
    }

    #[test]
    fn normal_code_with_reason_round_trips() {
        let mut payload = NORMAL.to_be_bytes().to_vec();
        payload.extend_from_slice(b"bye");
        let (code, reason) = parse_payload(&payload, true).unwrap().unwrap();
        assert_eq!(code, NORMAL);
        assert_eq!(reason, "bye");
    }

    #[test]
    fn non_utf8_reason_is_rejected_when_validating() {
        let mut payload = NORMAL.to_be_bytes().to_vec();
        payload.extend_from_slice(&[0xff, 0xfe]);
        assert!(parse_payload(&payload, true).is_err());
    }
}
