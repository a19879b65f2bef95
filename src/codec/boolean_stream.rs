//! Bit-packed boolean side channel used by tight encoding.
//!
//! Bits are packed least-significant first. The stream is preceded by a
//! variable length prefix: one byte below 64, `0xC0` plus a byte below 256,
//! otherwise `0x80` plus a big-endian `u16`.

use bytes::{BufMut, BytesMut};

use super::{data_stream::DataInput, error::ProtocolError};

const SHORT_MARKER: u8 = 0x80;
const BYTE_MARKER: u8 = 0xC0;

/// Packed boolean flags written beside a tight-encoded body.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BooleanStream {
    data: Vec<u8>,
    array_pos: usize,
    bit_pos: u8,
}

impl BooleanStream {
    /// Creates an empty stream ready for writing.
    #[must_use]
    pub fn new() -> Self { Self::default() }

    /// Appends a flag.
    pub fn write_bool(&mut self, value: bool) {
        if self.bit_pos == 0 {
            self.data.push(0);
        }
        if value && let Some(last) = self.data.last_mut() {
            *last |= 1 << self.bit_pos;
        }
        self.advance();
    }

    /// Reads the next flag.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BooleanStreamExhausted`] once every packed
    /// byte has been consumed.
    pub fn read_bool(&mut self) -> Result<bool, ProtocolError> {
        let byte = self
            .data
            .get(self.array_pos)
            .copied()
            .ok_or(ProtocolError::BooleanStreamExhausted)?;
        let value = (byte >> self.bit_pos) & 1 == 1;
        self.advance();
        Ok(value)
    }

    fn advance(&mut self) {
        self.bit_pos += 1;
        if self.bit_pos == 8 {
            self.bit_pos = 0;
            self.array_pos += 1;
        }
    }

    /// Number of packed bytes, excluding the length prefix.
    #[must_use]
    pub fn len(&self) -> usize { self.data.len() }

    /// Returns `true` if no flag has been written.
    #[must_use]
    pub fn is_empty(&self) -> bool { self.data.is_empty() }

    /// Size of the stream on the wire, including its length prefix.
    #[must_use]
    pub fn marshalled_size(&self) -> usize {
        let len = self.data.len();
        let prefix = if len < 64 {
            1
        } else if len < 256 {
            2
        } else {
            3
        };
        prefix + len
    }

    /// Writes the length prefix followed by the packed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidLength`] if more than 65535 bytes of
    /// flags were written.
    pub fn marshal(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let len = self.data.len();
        dst.reserve(self.marshalled_size());
        if let Ok(short) = u8::try_from(len) {
            if short < 64 {
                dst.put_u8(short);
            } else {
                dst.put_u8(BYTE_MARKER);
                dst.put_u8(short);
            }
        } else {
            let wide = u16::try_from(len).map_err(|_| ProtocolError::InvalidLength {
                what: "boolean stream",
                len: i32::try_from(len).unwrap_or(i32::MAX),
            })?;
            dst.put_u8(SHORT_MARKER);
            dst.put_u16(wide);
        }
        dst.put_slice(&self.data);
        Ok(())
    }

    /// Reads a stream previously written by [`marshal`](Self::marshal).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] if the input ends early.
    pub fn unmarshal(input: &mut DataInput<'_>) -> Result<Self, ProtocolError> {
        let len = match input.read_u8()? {
            BYTE_MARKER => usize::from(input.read_u8()?),
            SHORT_MARKER => usize::from(input.read_u16()?),
            short => usize::from(short),
        };
        Ok(Self {
            data: input.read_vec(len)?,
            array_pos: 0,
            bit_pos: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    fn written(flags: &[bool]) -> BytesMut {
        let mut stream = BooleanStream::new();
        for &flag in flags {
            stream.write_bool(flag);
        }
        let mut buf = BytesMut::new();
        stream.marshal(&mut buf).expect("marshal");
        assert_eq!(buf.len(), stream.marshalled_size());
        buf
    }

    #[test]
    fn packs_least_significant_bit_first() {
        let buf = written(&[true, false, true, true, false, false, false, false, true]);
        assert_eq!(&buf[..], &[2, 0b0000_1101, 0b0000_0001]);
    }

    #[rstest]
    #[case(63 * 8, &[63][..])]
    #[case(64 * 8, &[0xC0, 64][..])]
    #[case(256 * 8, &[0x80, 0x01, 0x00][..])]
    fn length_prefix_widens(#[case] flags: usize, #[case] prefix: &[u8]) {
        let buf = written(&vec![false; flags]);
        assert_eq!(&buf[..prefix.len()], prefix);
    }

    #[test]
    fn reading_past_the_end_fails() {
        let buf = written(&[true]);
        let mut input = DataInput::new(&buf);
        let mut stream = BooleanStream::unmarshal(&mut input).expect("unmarshal");
        assert!(stream.read_bool().expect("first"));
        for _ in 1..8 {
            assert!(!stream.read_bool().expect("padding"));
        }
        assert_eq!(
            stream.read_bool(),
            Err(ProtocolError::BooleanStreamExhausted)
        );
    }

    proptest! {
        #[test]
        fn preserves_flag_sequences(flags in proptest::collection::vec(any::<bool>(), 0..3000)) {
            let buf = written(&flags);
            let mut input = DataInput::new(&buf);
            let mut stream = BooleanStream::unmarshal(&mut input).expect("unmarshal");
            for flag in flags {
                prop_assert_eq!(stream.read_bool().expect("flag"), flag);
            }
            prop_assert_eq!(input.remaining(), 0);
        }
    }
}
