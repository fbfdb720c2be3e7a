//! Response codec for the remote-control service.
//!
//! The service answers the same command differently depending on the link:
//!
//! ```text
//! WiFi: ASCII hex digits terminated by '\n'
//!       pointerAll   -> "000000001234ABCD\n"   (big-endian u64)
//!       peekAbsolute -> "0A0B0C0D\n"           (2 digits per byte)
//!
//! USB:  [len:4 LE][payload:len]
//!       pointerAll   -> [08 00 00 00][u64 LE]
//!       peekAbsolute -> [len][raw bytes]
//! ```
//!
//! Outbound USB commands use the same length prefix.  Large reads and writes
//! are split into chunks no bigger than the per-link transfer limit.

use thiserror::Error;
use tracing::trace;

/// Largest payload the service accepts in one WiFi peek/poke.
pub const SOCKET_MAX_TRANSFER: usize = 0x1C0;

/// Largest payload the service accepts in one USB peek/poke.
pub const USB_MAX_TRANSFER: usize = 0xE000;

/// Size of the little-endian length prefix on USB frames.
pub const USB_LENGTH_PREFIX: usize = 4;

/// Errors produced while decoding a service response.
#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    /// The hex text has an odd number of digits.
    #[error("hex response has odd length {0}")]
    OddHexLength(usize),

    /// A byte in the hex text is not `[0-9A-Fa-f]`.
    #[error("invalid hex digit 0x{byte:02X} at index {index}")]
    InvalidHexDigit { index: usize, byte: u8 },

    /// The decoded payload does not have the expected size.
    #[error("unexpected response length: expected {expected} bytes, got {actual}")]
    UnexpectedLength { expected: usize, actual: usize },
}

// ── Hex text (WiFi) ───────────────────────────────────────────────────────────

/// Encodes bytes as upper-case hex digits without a prefix.
pub fn encode_hex(bytes: &[u8]) -> String {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(DIGITS[(byte >> 4) as usize] as char);
        out.push(DIGITS[(byte & 0x0F) as usize] as char);
    }
    out
}

/// Decodes a hex response line.  Trailing `\r`/`\n` are ignored.
///
/// # Errors
///
/// Returns [`CodecError`] if the text has an odd length or a non-hex digit.
pub fn decode_hex(text: &[u8]) -> Result<Vec<u8>, CodecError> {
    let text = trim_line_ending(text);
    if text.len() % 2 != 0 {
        return Err(CodecError::OddHexLength(text.len()));
    }

    let mut out = Vec::with_capacity(text.len() / 2);
    for (pair_index, pair) in text.chunks_exact(2).enumerate() {
        let hi = hex_value(pair[0]).ok_or(CodecError::InvalidHexDigit {
            index: pair_index * 2,
            byte: pair[0],
        })?;
        let lo = hex_value(pair[1]).ok_or(CodecError::InvalidHexDigit {
            index: pair_index * 2 + 1,
            byte: pair[1],
        })?;
        out.push((hi << 4) | lo);
    }
    Ok(out)
}

/// Decodes a `peekAbsolute` reply received over WiFi.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedLength`] if the reply does not hold
/// exactly `length` bytes.
pub fn decode_peek_hex(text: &[u8], length: usize) -> Result<Vec<u8>, CodecError> {
    let bytes = decode_hex(text)?;
    expect_len(&bytes, length)?;
    Ok(bytes)
}

/// Decodes a `pointerAll` reply received over WiFi (big-endian hex).
///
/// # Errors
///
/// Returns [`CodecError`] if the reply is not 8 bytes of valid hex.
pub fn decode_pointer_hex(text: &[u8]) -> Result<u64, CodecError> {
    let bytes = decode_hex(text)?;
    let raw: [u8; 8] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| CodecError::UnexpectedLength {
            expected: 8,
            actual: bytes.len(),
        })?;
    let address = u64::from_be_bytes(raw);
    trace!("decoded pointer reply 0x{address:X}");
    Ok(address)
}

// ── Length-prefixed frames (USB) ──────────────────────────────────────────────

/// Prefixes `payload` with its length as a little-endian `u32`.
pub fn frame_usb(payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(USB_LENGTH_PREFIX + payload.len());
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
    buf
}

/// Reads the payload length from a USB response header.
pub fn usb_payload_len(header: [u8; USB_LENGTH_PREFIX]) -> usize {
    u32::from_le_bytes(header) as usize
}

/// Decodes a `pointerAll` reply received over USB (little-endian).
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedLength`] if the payload is not 8 bytes.
pub fn decode_pointer_le(payload: &[u8]) -> Result<u64, CodecError> {
    let raw: [u8; 8] = payload
        .try_into()
        .map_err(|_| CodecError::UnexpectedLength {
            expected: 8,
            actual: payload.len(),
        })?;
    Ok(u64::from_le_bytes(raw))
}

// ── Chunking ──────────────────────────────────────────────────────────────────

/// Splits `length` bytes starting at `address` into `(address, len)` pieces
/// of at most `max` bytes each.
pub fn transfer_chunks(address: u64, length: usize, max: usize) -> Vec<(u64, usize)> {
    let mut chunks = Vec::with_capacity(length.div_ceil(max.max(1)));
    let mut done = 0usize;
    while done < length {
        let len = (length - done).min(max);
        chunks.push((address + done as u64, len));
        done += len;
    }
    chunks
}

/// Checks that a decoded payload has exactly `expected` bytes.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedLength`] on mismatch.
pub fn expect_len(bytes: &[u8], expected: usize) -> Result<(), CodecError> {
    if bytes.len() != expected {
        return Err(CodecError::UnexpectedLength {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

fn trim_line_ending(mut text: &[u8]) -> &[u8] {
    while let [rest @ .., b'\r' | b'\n'] = text {
        text = rest;
    }
    text
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_hex_is_upper_case_without_prefix() {
        assert_eq!(encode_hex(&[0x00, 0x0F, 0xA0, 0xFF]), "000FA0FF");
    }

    #[test]
    fn test_decode_hex_ignores_trailing_line_ending() {
        // Arrange
        let line = b"0A0b\r\n";

        // Act
        let bytes = decode_hex(line).unwrap();

        // Assert
        assert_eq!(bytes, vec![0x0A, 0x0B]);
    }

    #[test]
    fn test_decode_hex_rejects_odd_length() {
        assert_eq!(decode_hex(b"ABC\n"), Err(CodecError::OddHexLength(3)));
    }

    #[test]
    fn test_decode_hex_reports_position_of_bad_digit() {
        assert_eq!(
            decode_hex(b"0AZ1"),
            Err(CodecError::InvalidHexDigit { index: 2, byte: b'Z' })
        );
    }

    #[test]
    fn test_decode_pointer_hex_is_big_endian() {
        // Arrange
        let line = b"000000001234ABCD\n";

        // Act
        let address = decode_pointer_hex(line).unwrap();

        // Assert
        assert_eq!(address, 0x1234_ABCD);
    }

    #[test]
    fn test_decode_pointer_hex_rejects_short_reply() {
        assert_eq!(
            decode_pointer_hex(b"1234\n"),
            Err(CodecError::UnexpectedLength { expected: 8, actual: 2 })
        );
    }

    #[test]
    fn test_decode_peek_hex_checks_requested_length() {
        assert_eq!(decode_peek_hex(b"01020304\n", 4).unwrap(), vec![1, 2, 3, 4]);
        assert!(decode_peek_hex(b"0102\n", 4).is_err());
    }

    #[test]
    fn test_frame_usb_prefixes_little_endian_length() {
        let framed = frame_usb(b"click A");
        assert_eq!(&framed[..4], &[7, 0, 0, 0]);
        assert_eq!(&framed[4..], b"click A");
    }

    #[test]
    fn test_usb_payload_len_reads_little_endian() {
        assert_eq!(usb_payload_len([0x00, 0x01, 0x00, 0x00]), 256);
    }

    #[test]
    fn test_decode_pointer_le() {
        let payload = 0x0000_0080_1234_5678u64.to_le_bytes();
        assert_eq!(decode_pointer_le(&payload).unwrap(), 0x0000_0080_1234_5678);
        assert!(decode_pointer_le(&payload[..7]).is_err());
    }

    #[test]
    fn test_transfer_chunks_splits_at_limit() {
        // Arrange / Act
        let chunks = transfer_chunks(0x1000, 0x1C0 * 2 + 4, SOCKET_MAX_TRANSFER);

        // Assert
        assert_eq!(
            chunks,
            vec![(0x1000, 0x1C0), (0x11C0, 0x1C0), (0x1380, 4)]
        );
    }

    #[test]
    fn test_transfer_chunks_empty_for_zero_length() {
        assert!(transfer_chunks(0x1000, 0, SOCKET_MAX_TRANSFER).is_empty());
    }
}
