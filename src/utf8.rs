//! C3: streaming UTF-8 validation across frame boundaries (RFC 3629).
//!
//! Holds up to one partially-consumed multi-byte sequence across calls to
//! `feed`, so a Text message split across continuation frames can be
//! validated incrementally instead of buffering the whole message first.

use crate::error::Error;

#[derive(Debug, Default)]
pub struct Utf8Validator {
    /// The lead byte of a sequence still being consumed; only meaningful
    /// while `remaining > 0`.
    first_byte: u8,
    /// Continuation bytes still expected before the current sequence closes.
    remaining: u8,
    /// Continuation bytes already consumed for the current sequence.
    consumed: u8,
}

impl Utf8Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk of bytes. Returns `Err(Error::InvalidUtf8)` as
    /// soon as the grammar is violated.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<(), Error> {
        for &b in bytes {
            if self.remaining == 0 {
                match b {
                    0x00..=0x7F => {}
                    0xC2..=0xDF => {
                        self.first_byte = b;
                        self.remaining = 1;
                        self.consumed = 0;
                    }
                    0xE0..=0xEF => {
                        self.first_byte = b;
                        self.remaining = 2;
                        self.consumed = 0;
                    }
                    0xF0..=0xF4 => {
                        self.first_byte = b;
                        self.remaining = 3;
                        self.consumed = 0;
                    }
                    // 0x80-0xBF: unexpected continuation byte as a lead byte.
                    // 0xC0, 0xC1: always overlong two-byte lead bytes.
                    // 0xF5-0xFF: always out of Unicode's range.
                    _ => return Err(Error::InvalidUtf8),
                }
            } else {
                let valid = if self.consumed == 0 {
                    // Second byte of the sequence: restrict its range per
                    // lead byte to reject overlong encodings, surrogate
                    // halves, and codepoints above U+10FFFF without needing
                    // to assemble the full codepoint.
                    match self.first_byte {
                        0xE0 => (0xA0..=0xBF).contains(&b),
                        0xED => (0x80..=0x9F).contains(&b),
                        0xF0 => (0x90..=0xBF).contains(&b),
                        0xF4 => (0x80..=0x8F).contains(&b),
                        _ => (0x80..=0xBF).contains(&b),
                    }
                } else {
                    (0x80..=0xBF).contains(&b)
                };
                if !valid {
                    return Err(Error::InvalidUtf8);
                }
                self.consumed += 1;
                self.remaining -= 1;
            }
        }
        Ok(())
    }

    /// Call once the final chunk of the stream has been fed. Errors if a
    /// multi-byte sequence was left incomplete (truncated at end-of-stream).
    pub fn finalize(&self) -> Result<(), Error> {
        if self.remaining != 0 {
            Err(Error::InvalidUtf8)
        } else {
            Ok(())
        }
    }
}

/// Convenience one-shot validation of a complete, non-streamed buffer.
pub fn validate_complete(bytes: &[u8]) -> Result<(), Error> {
    let mut v = Utf8Validator::new();
    v.feed(bytes)?;
    v.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ascii_and_multibyte() {
        assert!(validate_complete("hello".as_bytes()).is_ok());
        assert!(validate_complete("héllo wörld".as_bytes()).is_ok());
        assert!(validate_complete("日本語".as_bytes()).is_ok());
        assert!(validate_complete("\u{1F600}".as_bytes()).is_ok());
    }

    #[test]
    fn rejects_overlong_encoding() {
        // Overlong encoding of U+002F ('/') as a 2-byte sequence.
        assert!(validate_complete(&[0xC0, 0xAF]).is_err());
        assert!(validate_complete(&[0xC1, 0xBF]).is_err());
        // Overlong 3-byte encoding via E0 80 xx.
        assert!(validate_complete(&[0xE0, 0x80, 0x80]).is_err());
    }

    #[test]
    fn rejects_surrogate_halves() {
        // U+D800 encoded as a (forbidden) 3-byte sequence.
        assert!(validate_complete(&[0xED, 0xA0, 0x80]).is_err());
    }

    #[test]
    fn rejects_codepoints_above_max() {
        // F4 90 80 80 would decode to U+110000, one past the max.
        assert!(validate_complete(&[0xF4, 0x90, 0x80, 0x80]).is_err());
        // F5 is never a valid lead byte.
        assert!(validate_complete(&[0xF5, 0x80, 0x80, 0x80]).is_err());
    }

    #[test]
    fn rejects_truncated_sequence_at_finalize() {
        let mut v = Utf8Validator::new();
        v.feed(&[0xE2, 0x82]).unwrap(); // first two bytes of '€', missing the third
        assert!(v.finalize().is_err());
    }

    #[test]
    fn streaming_across_many_feeds_matches_whole_buffer() {
        let text = "the quick brown 狐 jumps over the lazy 犬".as_bytes();
        let mut v = Utf8Validator::new();
        for chunk in text.chunks(3) {
            v.feed(chunk).unwrap();
        }
        assert!(v.finalize().is_ok());
    }
}
