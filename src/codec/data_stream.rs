//! Big-endian primitive readers and writers shared by all marshallers.
//!
//! Strings use the modified UTF-8 form with a 16-bit length prefix: the
//! NUL character takes two bytes and characters outside the basic
//! multilingual plane are written as two three-byte surrogates.

use bytes::{Buf, BufMut, BytesMut};

use super::error::ProtocolError;

/// Largest encoded length a 16-bit string prefix can describe.
pub const MAX_UTF_LENGTH: usize = u16::MAX as usize;

/// Cursor over the payload of a single frame.
#[derive(Debug)]
pub struct DataInput<'a> {
    buf: &'a [u8],
    start: usize,
}

impl<'a> DataInput<'a> {
    /// Creates a reader over `buf`.
    #[must_use]
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            start: buf.len(),
        }
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize { self.buf.len() }

    /// Returns how many bytes have been consumed.
    #[must_use]
    pub fn position(&self) -> usize { self.start - self.buf.len() }

    fn ensure_remaining(&self, needed: usize) -> Result<(), ProtocolError> {
        if self.buf.len() < needed {
            return Err(ProtocolError::Truncated {
                needed,
                remaining: self.buf.len(),
            });
        }
        Ok(())
    }

    /// Reads an unsigned byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        self.ensure_remaining(1)?;
        Ok(self.buf.get_u8())
    }

    /// Reads a signed byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_i8(&mut self) -> Result<i8, ProtocolError> {
        self.ensure_remaining(1)?;
        Ok(self.buf.get_i8())
    }

    /// Reads a boolean stored as a whole byte.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> { Ok(self.read_u8()? != 0) }

    /// Reads a big-endian `i16`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_i16(&mut self) -> Result<i16, ProtocolError> {
        self.ensure_remaining(2)?;
        Ok(self.buf.get_i16())
    }

    /// Reads a big-endian `u16`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        self.ensure_remaining(2)?;
        Ok(self.buf.get_u16())
    }

    /// Reads a big-endian `i32`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_i32(&mut self) -> Result<i32, ProtocolError> {
        self.ensure_remaining(4)?;
        Ok(self.buf.get_i32())
    }

    /// Reads a big-endian `i64`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_i64(&mut self) -> Result<i64, ProtocolError> {
        self.ensure_remaining(8)?;
        Ok(self.buf.get_i64())
    }

    /// Reads a big-endian IEEE 754 `f32`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_f32(&mut self) -> Result<f32, ProtocolError> {
        self.ensure_remaining(4)?;
        Ok(self.buf.get_f32())
    }

    /// Reads a big-endian IEEE 754 `f64`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when the frame is exhausted.
    pub fn read_f64(&mut self) -> Result<f64, ProtocolError> {
        self.ensure_remaining(8)?;
        Ok(self.buf.get_f64())
    }

    /// Borrows the next `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when fewer than `len` bytes remain.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        self.ensure_remaining(len)?;
        let (head, tail) = self.buf.split_at(len);
        self.buf = tail;
        Ok(head)
    }

    /// Copies the next `len` bytes into a vector.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] when fewer than `len` bytes remain.
    pub fn read_vec(&mut self, len: usize) -> Result<Vec<u8>, ProtocolError> {
        self.read_slice(len).map(<[u8]>::to_vec)
    }

    /// Reads a string with a 16-bit length prefix in modified UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] or [`ProtocolError::InvalidUtf`].
    pub fn read_utf(&mut self) -> Result<String, ProtocolError> {
        let len = usize::from(self.read_u16()?);
        decode_modified_utf8(self.read_slice(len)?)
    }

    /// Reads a string with a 32-bit length prefix in modified UTF-8.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidLength`] for a negative prefix,
    /// otherwise as [`read_utf`](Self::read_utf).
    pub fn read_big_utf(&mut self) -> Result<String, ProtocolError> {
        let len = self.read_i32()?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::InvalidLength {
            what: "string",
            len,
        })?;
        decode_modified_utf8(self.read_slice(len)?)
    }
}

/// Returns the number of bytes `value` occupies in modified UTF-8.
#[must_use]
pub fn modified_utf8_len(value: &str) -> usize {
    value
        .encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007F => 1,
            0x0000 | 0x0080..=0x07FF => 2,
            _ => 3,
        })
        .sum()
}

/// Appends the modified UTF-8 encoding of `value` without a length prefix.
pub fn encode_modified_utf8(value: &str, dst: &mut BytesMut) {
    for unit in value.encode_utf16() {
        match unit {
            0x0001..=0x007F => dst.put_u8(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                dst.put_u8(0xC0 | ((unit >> 6) & 0x1F) as u8);
                dst.put_u8(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                dst.put_u8(0xE0 | ((unit >> 12) & 0x0F) as u8);
                dst.put_u8(0x80 | ((unit >> 6) & 0x3F) as u8);
                dst.put_u8(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
}

/// Decodes modified UTF-8 bytes into a Rust string.
///
/// # Errors
///
/// Returns [`ProtocolError::InvalidUtf`] for malformed sequences or unpaired
/// surrogates.
pub fn decode_modified_utf8(bytes: &[u8]) -> Result<String, ProtocolError> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut rest = bytes;
    while let Some((&lead, tail)) = rest.split_first() {
        match lead {
            0x00..=0x7F => {
                units.push(u16::from(lead));
                rest = tail;
            }
            0xC0..=0xDF => {
                let [b, tail @ ..] = tail else {
                    return Err(ProtocolError::InvalidUtf);
                };
                units.push(u16::from(lead & 0x1F) << 6 | continuation(*b)?);
                rest = tail;
            }
            0xE0..=0xEF => {
                let [b, c, tail @ ..] = tail else {
                    return Err(ProtocolError::InvalidUtf);
                };
                units.push(
                    u16::from(lead & 0x0F) << 12 | continuation(*b)? << 6 | continuation(*c)?,
                );
                rest = tail;
            }
            _ => return Err(ProtocolError::InvalidUtf),
        }
    }
    String::from_utf16(&units).map_err(|_| ProtocolError::InvalidUtf)
}

fn continuation(byte: u8) -> Result<u16, ProtocolError> {
    if byte & 0xC0 == 0x80 {
        Ok(u16::from(byte & 0x3F))
    } else {
        Err(ProtocolError::InvalidUtf)
    }
}

/// Writes `value` with a 16-bit length prefix in modified UTF-8.
///
/// # Errors
///
/// Returns [`ProtocolError::StringTooLong`] if the encoding exceeds
/// [`MAX_UTF_LENGTH`] bytes.
pub fn put_utf(dst: &mut BytesMut, value: &str) -> Result<(), ProtocolError> {
    let len = modified_utf8_len(value);
    let prefix = u16::try_from(len).map_err(|_| ProtocolError::StringTooLong { len })?;
    dst.reserve(2 + len);
    dst.put_u16(prefix);
    encode_modified_utf8(value, dst);
    Ok(())
}

/// Writes `value` with a 32-bit length prefix in modified UTF-8.
///
/// # Errors
///
/// Returns [`ProtocolError::StringTooLong`] if the encoding exceeds
/// `i32::MAX` bytes.
pub fn put_big_utf(dst: &mut BytesMut, value: &str) -> Result<(), ProtocolError> {
    let len = modified_utf8_len(value);
    let prefix = i32::try_from(len).map_err(|_| ProtocolError::StringTooLong { len })?;
    dst.reserve(4 + len);
    dst.put_i32(prefix);
    encode_modified_utf8(value, dst);
    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("plain", &b"plain"[..])]
    #[case("\0", &[0xC0, 0x80][..])]
    #[case("\u{e9}", &[0xC3, 0xA9][..])]
    #[case("\u{20ac}", &[0xE2, 0x82, 0xAC][..])]
    #[case("\u{1F600}", &[0xED, 0xA0, 0xBD, 0xED, 0xB8, 0x80][..])]
    fn encodes_modified_utf8(#[case] value: &str, #[case] expected: &[u8]) {
        let mut buf = BytesMut::new();
        encode_modified_utf8(value, &mut buf);
        assert_eq!(&buf[..], expected);
        assert_eq!(modified_utf8_len(value), expected.len());
        assert_eq!(decode_modified_utf8(expected).expect("decode"), value);
    }

    #[test]
    fn rejects_dangling_lead_byte() {
        assert_eq!(
            decode_modified_utf8(&[b'a', 0xE2, 0x82]),
            Err(ProtocolError::InvalidUtf)
        );
    }

    #[test]
    fn rejects_overlong_strings() {
        let value = "x".repeat(MAX_UTF_LENGTH + 1);
        let mut buf = BytesMut::new();
        assert_eq!(
            put_utf(&mut buf, &value),
            Err(ProtocolError::StringTooLong {
                len: MAX_UTF_LENGTH + 1
            })
        );
    }

    #[test]
    fn reads_primitives_in_network_order() {
        let bytes = [0x01, 0x02, 0xFF, 0xFF, 0xFF, 0xFE, 0x00, 0x03, b'a', b'b', b'c'];
        let mut input = DataInput::new(&bytes);
        assert_eq!(input.read_u16().expect("u16"), 0x0102);
        assert_eq!(input.read_i32().expect("i32"), -2);
        assert_eq!(input.read_utf().expect("utf"), "abc");
        assert_eq!(input.remaining(), 0);
        assert_eq!(input.position(), bytes.len());
    }

    #[test]
    fn reports_truncation() {
        let mut input = DataInput::new(&[0x00, 0x01]);
        assert_eq!(
            input.read_i64(),
            Err(ProtocolError::Truncated {
                needed: 8,
                remaining: 2
            })
        );
    }
}
