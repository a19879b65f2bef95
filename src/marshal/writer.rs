//! Field writer used by every marshaller.
//!
//! Tight encoding is produced in one pass: flags go to a [`BooleanStream`]
//! and field bytes to a separate body buffer, then [`DataWriter::finish`]
//! emits the type tag, the stream and the body in that order. Loose encoding
//! writes everything to the body.

use bytes::{BufMut, BytesMut};

use super::{EncodingOptions, Marshal, cache::MarshalCache};
use crate::{
    codec::{
        BooleanStream,
        CodecError,
        ProtocolError,
        data_stream::{encode_modified_utf8, modified_utf8_len, put_utf},
    },
    commands::{BrokerError, CommandHeader, DataStructure},
};

/// Longest string tight encoding accepts, in encoded bytes.
const MAX_TIGHT_STRING: usize = i16::MAX as usize - 1;

/// Accumulates the encoded fields of one frame.
pub struct DataWriter<'a> {
    options: EncodingOptions,
    cache: &'a mut MarshalCache,
    flags: BooleanStream,
    body: BytesMut,
}

impl<'a> DataWriter<'a> {
    #[must_use]
    pub fn new(options: EncodingOptions, cache: &'a mut MarshalCache) -> Self {
        Self {
            options,
            cache,
            flags: BooleanStream::new(),
            body: BytesMut::new(),
        }
    }

    /// Active wire format version, used to gate fields.
    #[must_use]
    pub fn version(&self) -> u32 { self.options.version }

    #[must_use]
    pub fn is_tight(&self) -> bool { self.options.tight_encoding }

    /// Writes the type tag and the accumulated fields to `dst`.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Protocol`] if the boolean stream overflows;
    /// `dst` is not touched in that case.
    pub fn finish(self, tag: u8, dst: &mut BytesMut) -> Result<(), CodecError> {
        let size = 1 + self.flags.marshalled_size() + self.body.len();
        let mut frame = BytesMut::with_capacity(size);
        frame.put_u8(tag);
        if self.options.tight_encoding {
            self.flags.marshal(&mut frame)?;
        }
        frame.put_slice(&self.body);
        dst.unsplit(frame);
        Ok(())
    }

    pub fn write_bool(&mut self, value: bool) {
        if self.options.tight_encoding {
            self.flags.write_bool(value);
        } else {
            self.body.put_u8(u8::from(value));
        }
    }

    pub fn write_u8(&mut self, value: u8) { self.body.put_u8(value); }

    pub fn write_i8(&mut self, value: i8) { self.body.put_i8(value); }

    pub fn write_i16(&mut self, value: i16) { self.body.put_i16(value); }

    pub fn write_i32(&mut self, value: i32) { self.body.put_i32(value); }

    /// Writes a `u32` reinterpreted as the signed wire integer.
    pub fn write_u32(&mut self, value: u32) { self.body.put_i32(value.cast_signed()); }

    /// Writes a long. Tight encoding spends two flags to select a 0, 2, 4
    /// or 8 byte representation.
    pub fn write_i64(&mut self, value: i64) {
        if !self.options.tight_encoding {
            self.body.put_i64(value);
            return;
        }
        let bits = value.cast_unsigned();
        if bits == 0 {
            self.flags.write_bool(false);
            self.flags.write_bool(false);
        } else if bits & 0xFFFF_FFFF_FFFF_0000 == 0 {
            self.flags.write_bool(false);
            self.flags.write_bool(true);
            self.body.put_u16(bits as u16);
        } else if bits & 0xFFFF_FFFF_0000_0000 == 0 {
            self.flags.write_bool(true);
            self.flags.write_bool(false);
            self.body.put_u32(bits as u32);
        } else {
            self.flags.write_bool(true);
            self.flags.write_bool(true);
            self.body.put_i64(value);
        }
    }

    /// Writes an optional string.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StringTooLong`] when the encoded form does
    /// not fit its length prefix.
    pub fn write_string(&mut self, value: Option<&str>) -> Result<(), CodecError> {
        self.write_bool(value.is_some());
        let Some(value) = value else {
            return Ok(());
        };
        if !self.options.tight_encoding {
            put_utf(&mut self.body, value)?;
            return Ok(());
        }
        let len = modified_utf8_len(value);
        if len > MAX_TIGHT_STRING {
            return Err(ProtocolError::StringTooLong { len }.into());
        }
        let ascii = value.bytes().all(|b| (0x01..=0x7F).contains(&b));
        self.flags.write_bool(ascii);
        self.body.put_u16(len as u16);
        encode_modified_utf8(value, &mut self.body);
        Ok(())
    }

    /// Writes an optional length-prefixed byte array.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidLength`] for arrays longer than
    /// `i32::MAX`.
    pub fn write_bytes(&mut self, value: Option<&[u8]>) -> Result<(), CodecError> {
        self.write_bool(value.is_some());
        if let Some(value) = value {
            let len = i32::try_from(value.len()).map_err(|_| ProtocolError::InvalidLength {
                what: "byte array",
                len: i32::MAX,
            })?;
            self.body.put_i32(len);
            self.body.put_slice(value);
        }
        Ok(())
    }

    /// Writes a fixed-size byte array with no prefix.
    pub fn write_const_bytes(&mut self, value: &[u8]) { self.body.put_slice(value); }

    /// Writes an optional polymorphic reference: presence flag, type tag,
    /// then the value's fields.
    ///
    /// # Errors
    ///
    /// Propagates failures from the nested marshaller.
    pub fn write_nested<T: Marshal + ?Sized>(&mut self, value: Option<&T>) -> Result<(), CodecError> {
        self.write_bool(value.is_some());
        let Some(value) = value else {
            return Ok(());
        };
        if self.options.tight_encoding && value.is_marshal_aware() {
            // No pre-marshalled form is ever reused.
            self.flags.write_bool(false);
        }
        self.body.put_u8(value.data_structure_type());
        value.marshal(self)
    }

    /// Writes a reference through the marshal cache.
    ///
    /// With caching enabled a flag says whether the value is new, followed by
    /// its 16-bit index; only new values are followed by their fields.
    ///
    /// # Errors
    ///
    /// Propagates failures from the nested marshaller.
    pub fn write_cached<T>(&mut self, value: Option<&T>) -> Result<(), CodecError>
    where
        T: Marshal + Clone + Into<DataStructure>,
    {
        if !self.options.cache_enabled {
            return self.write_nested(value);
        }
        let key = value.cloned().map(Into::into);
        if let Some(index) = self.cache.lookup(&key) {
            self.write_bool(false);
            self.body.put_i16(index);
            return Ok(());
        }
        self.write_bool(true);
        let index_at = self.body.len();
        self.body.put_i16(0);
        self.write_nested(value)?;
        let index = self.cache.insert(key);
        self.body[index_at..index_at + 2].copy_from_slice(&index.to_be_bytes());
        Ok(())
    }

    /// Writes an array of references; an empty slice is written as null.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidLength`] for more than `i16::MAX`
    /// elements, or propagates element failures.
    pub fn write_array<T: Marshal>(&mut self, values: &[T]) -> Result<(), CodecError> {
        self.write_bool(!values.is_empty());
        if values.is_empty() {
            return Ok(());
        }
        let count = i16::try_from(values.len()).map_err(|_| ProtocolError::InvalidLength {
            what: "array",
            len: i32::try_from(values.len()).unwrap_or(i32::MAX),
        })?;
        self.body.put_i16(count);
        for value in values {
            self.write_nested(Some(value))?;
        }
        Ok(())
    }

    /// Writes a broker error. Stack frames and the cause chain are only
    /// written when stack traces are enabled.
    ///
    /// # Errors
    ///
    /// Propagates string encoding failures.
    pub fn write_throwable(&mut self, error: Option<&BrokerError>) -> Result<(), CodecError> {
        self.write_bool(error.is_some());
        let Some(error) = error else {
            return Ok(());
        };
        self.write_string(error.exception_class.as_deref())?;
        self.write_string(error.message.as_deref())?;
        if self.options.stack_trace_enabled {
            let frames = i16::try_from(error.stack_trace.len()).map_err(|_| {
                ProtocolError::InvalidLength {
                    what: "stack trace",
                    len: i32::try_from(error.stack_trace.len()).unwrap_or(i32::MAX),
                }
            })?;
            self.body.put_i16(frames);
            for frame in &error.stack_trace {
                self.write_string(frame.declaring_class.as_deref())?;
                self.write_string(frame.method_name.as_deref())?;
                self.write_string(frame.file_name.as_deref())?;
                self.write_i32(frame.line_number);
            }
            self.write_throwable(error.cause.as_deref())?;
        }
        Ok(())
    }

    /// Writes the command id and response flag shared by every command.
    pub fn write_command_header(&mut self, header: &CommandHeader) {
        self.write_u32(header.command_id);
        self.write_bool(header.response_required);
    }
}
