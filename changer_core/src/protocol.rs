//! Line protocol codec for the MDB serial bridge.
//!
//! Commands are short ASCII strings; replies carrying data start with the
//! frame marker `p,` followed by ASCII hex. `ACK`/`NACK` after the marker are
//! handshake words, not data.

use crate::coin_map::CoinType;
use crate::error::{ChangerError, CoinOpError, ErrorKind, Result};

pub const FRAME: &str = "p,";
pub const ACK: &str = "ACK";
pub const NACK: &str = "NACK";

/// Largest quantity one dispense command can carry (one nibble).
pub const MAX_BATCH: u32 = 15;
/// Highest wire-level coin type nibble.
pub const MAX_RAW_TYPE: u8 = 15;

pub const ENABLE_MASTER: &str = "M,1";
pub const RESET: &str = "R,08";
pub const SETUP: &str = "R,09";
pub const EXPANSION: &str = "R,0F,00";
pub const FEATURE_ENABLE: &str = "R,0F,0100000000";
pub const TUBE_STATUS: &str = "R,0A";
pub const COIN_TYPE_ENABLE: &str = "R,0C,001F0000";
pub const INHIBIT: &str = "R,0C,00000000";
pub const POLL: &str = "R,0B";
pub const DISPENSE_PREFIX: &str = "R,0D,";

/// Pack `quantity` (high nibble) and `raw_type` (low nibble) into one byte.
pub fn dispense_byte(raw_type: u8, quantity: u8) -> Result<u8> {
    if raw_type > MAX_RAW_TYPE {
        return Err(ChangerError::new(ErrorKind::Range {
            coin_type: raw_type.saturating_add(1),
        }));
    }
    if quantity == 0 || u32::from(quantity) > MAX_BATCH {
        return Err(CoinOpError::InvalidQuantity(u32::from(quantity)).into());
    }
    Ok((quantity << 4) | raw_type)
}

/// Inverse of [`dispense_byte`]: `(raw_type, quantity)`.
#[inline]
pub fn split_dispense_byte(b: u8) -> (u8, u8) {
    (b & 0x0F, b >> 4)
}

pub fn encode_dispense(raw_type: u8, quantity: u8) -> Result<String> {
    let b = dispense_byte(raw_type, quantity)?;
    Ok(format!("{DISPENSE_PREFIX}{b:02X}"))
}

/// Dispense command for a business-level coin type.
pub fn dispense_command(coin_type: CoinType, quantity: u8) -> Result<String> {
    encode_dispense(coin_type.raw()?, quantity)
}

/// Decode an ASCII-hex payload into bytes.
///
/// Separators (commas, whitespace, `:` and `-`) are ignored and an odd digit
/// count is left-padded with `0`. Decoding stops at the first group that is
/// not valid hex, so garbage yields a short or empty result instead of an error.
pub fn decode_hex_payload(payload: &str) -> Vec<u8> {
    let mut digits: Vec<u8> = payload
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && !matches!(b, b',' | b':' | b'-'))
        .collect();
    if digits.len() % 2 == 1 {
        digits.insert(0, b'0');
    }
    let mut out = Vec::with_capacity(digits.len() / 2);
    for pair in digits.chunks_exact(2) {
        match (hex_val(pair[0]), hex_val(pair[1])) {
            (Some(hi), Some(lo)) => out.push((hi << 4) | lo),
            _ => break,
        }
    }
    out
}

#[inline]
fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

/// Data carried by a reply line, or `None` for handshakes, empty and foreign lines.
pub fn frame_payload(line: &str) -> Option<&str> {
    let payload = line.trim().strip_prefix(FRAME)?.trim();
    if payload.eq_ignore_ascii_case(ACK) || payload.eq_ignore_ascii_case(NACK) {
        return None;
    }
    Some(payload)
}

pub fn is_payload_frame(line: &str) -> bool {
    frame_payload(line).is_some()
}

pub fn is_ack(line: &str) -> bool {
    line.trim()
        .strip_prefix(FRAME)
        .is_some_and(|p| p.trim().eq_ignore_ascii_case(ACK))
}

pub fn is_nack(line: &str) -> bool {
    line.trim()
        .strip_prefix(FRAME)
        .is_some_and(|p| p.trim().eq_ignore_ascii_case(NACK))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispense_byte_packs_nibbles() {
        assert_eq!(dispense_byte(0, 1).unwrap(), 0x10);
        assert_eq!(dispense_byte(2, 15).unwrap(), 0xF2);
        assert_eq!(encode_dispense(4, 3).unwrap(), "R,0D,34");
    }

    #[test]
    fn dispense_byte_rejects_out_of_range() {
        assert!(matches!(
            dispense_byte(16, 1).unwrap_err().kind,
            ErrorKind::Range { coin_type: 17 }
        ));
        assert!(dispense_byte(0, 0).is_err());
        assert!(dispense_byte(0, 16).is_err());
    }

    #[test]
    fn decode_stops_at_first_bad_group() {
        assert_eq!(decode_hex_payload("51 0A"), vec![0x51, 0x0A]);
        assert_eq!(decode_hex_payload("1,2,3"), vec![0x01, 0x23]);
        assert_eq!(decode_hex_payload("51ZZ0A"), vec![0x51]);
        assert!(decode_hex_payload("").is_empty());
        assert!(decode_hex_payload("ZZ").is_empty());
    }

    #[test]
    fn frames_exclude_handshakes() {
        assert_eq!(frame_payload("p,5103\r"), Some("5103"));
        assert_eq!(frame_payload("p,ack"), None);
        assert_eq!(frame_payload("p,NACK"), None);
        assert_eq!(frame_payload("x,5103"), None);
        assert_eq!(frame_payload(""), None);
        assert!(is_ack("p,ACK"));
        assert!(is_nack(" p,nack "));
        assert!(!is_ack("p,NACK"));
    }
}
