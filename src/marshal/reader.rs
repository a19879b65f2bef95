//! Field reader mirroring [`DataWriter`](super::DataWriter).

use super::{
    EncodingOptions,
    cache::UnmarshalCache,
    registry::{MarshallerEntry, MarshallerRegistry},
};
use crate::{
    codec::{BooleanStream, CodecError, DataInput, ProtocolError, data_stream::decode_modified_utf8},
    commands::{BrokerError, CommandHeader, DataStructure, StackTraceElement},
};

/// Decodes the fields of one frame.
pub struct DataReader<'a> {
    options: EncodingOptions,
    registry: &'a MarshallerRegistry,
    cache: &'a mut UnmarshalCache,
    input: DataInput<'a>,
    flags: BooleanStream,
}

fn short_name<T>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

impl<'a> DataReader<'a> {
    /// Creates a reader positioned after the top-level type tag. In tight
    /// mode the boolean stream is read immediately.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::Truncated`] if the boolean stream is cut short.
    pub fn new(
        options: EncodingOptions,
        registry: &'a MarshallerRegistry,
        cache: &'a mut UnmarshalCache,
        mut input: DataInput<'a>,
    ) -> Result<Self, CodecError> {
        let flags = if options.tight_encoding {
            BooleanStream::unmarshal(&mut input)?
        } else {
            BooleanStream::new()
        };
        Ok(Self {
            options,
            registry,
            cache,
            input,
            flags,
        })
    }

    #[must_use]
    pub fn version(&self) -> u32 { self.options.version }

    #[must_use]
    pub fn is_tight(&self) -> bool { self.options.tight_encoding }

    /// Bytes left unread in the frame.
    #[must_use]
    pub fn remaining(&self) -> usize { self.input.remaining() }

    fn entry(&self, tag: u8) -> Result<&'a MarshallerEntry, CodecError> {
        let registry = self.registry;
        registry.lookup(tag).ok_or_else(|| {
            ProtocolError::UnknownDataType {
                tag,
                version: self.options.version,
            }
            .into()
        })
    }

    /// Decodes a top-level value of type `tag` using the registered
    /// marshaller.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnknownDataType`] for unregistered tags.
    pub fn read_tagged(&mut self, tag: u8) -> Result<DataStructure, CodecError> {
        self.entry(tag)?.decode(self)
    }

    /// # Errors
    ///
    /// Fails when the flags or the frame are exhausted.
    pub fn read_bool(&mut self) -> Result<bool, CodecError> {
        if self.options.tight_encoding {
            Ok(self.flags.read_bool()?)
        } else {
            Ok(self.input.read_bool()?)
        }
    }

    /// # Errors
    ///
    /// Fails when the frame is exhausted.
    pub fn read_u8(&mut self) -> Result<u8, CodecError> { Ok(self.input.read_u8()?) }

    /// # Errors
    ///
    /// Fails when the frame is exhausted.
    pub fn read_i8(&mut self) -> Result<i8, CodecError> { Ok(self.input.read_i8()?) }

    /// # Errors
    ///
    /// Fails when the frame is exhausted.
    pub fn read_i16(&mut self) -> Result<i16, CodecError> { Ok(self.input.read_i16()?) }

    /// # Errors
    ///
    /// Fails when the frame is exhausted.
    pub fn read_i32(&mut self) -> Result<i32, CodecError> { Ok(self.input.read_i32()?) }

    /// Reads the signed wire integer reinterpreted as `u32`.
    ///
    /// # Errors
    ///
    /// Fails when the frame is exhausted.
    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        Ok(self.input.read_i32()?.cast_unsigned())
    }

    /// Reads a long, honouring the tight size selector.
    ///
    /// # Errors
    ///
    /// Fails when the flags or the frame are exhausted.
    pub fn read_i64(&mut self) -> Result<i64, CodecError> {
        if !self.options.tight_encoding {
            return Ok(self.input.read_i64()?);
        }
        let value = match (self.flags.read_bool()?, self.flags.read_bool()?) {
            (false, false) => 0,
            (false, true) => i64::from(self.input.read_u16()?),
            (true, false) => i64::from(self.input.read_i32()?.cast_unsigned()),
            (true, true) => self.input.read_i64()?,
        };
        Ok(value)
    }

    /// # Errors
    ///
    /// Fails on truncation or malformed modified UTF-8.
    pub fn read_string(&mut self) -> Result<Option<String>, CodecError> {
        if !self.read_bool()? {
            return Ok(None);
        }
        if !self.options.tight_encoding {
            return Ok(Some(self.input.read_utf()?));
        }
        if self.flags.read_bool()? {
            let len = self.input.read_i16()?;
            let len = usize::try_from(len).map_err(|_| ProtocolError::InvalidLength {
                what: "string",
                len: i32::from(len),
            })?;
            Ok(Some(decode_modified_utf8(self.input.read_slice(len)?)?))
        } else {
            Ok(Some(self.input.read_utf()?))
        }
    }

    /// # Errors
    ///
    /// Fails on truncation or a negative length.
    pub fn read_bytes(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        if !self.read_bool()? {
            return Ok(None);
        }
        let len = self.input.read_i32()?;
        let len = usize::try_from(len).map_err(|_| ProtocolError::InvalidLength {
            what: "byte array",
            len,
        })?;
        Ok(Some(self.input.read_vec(len)?))
    }

    /// # Errors
    ///
    /// Fails when fewer than `N` bytes remain.
    pub fn read_const_bytes<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0; N];
        out.copy_from_slice(self.input.read_slice(N)?);
        Ok(out)
    }

    /// Reads an optional polymorphic reference of any registered type.
    ///
    /// # Errors
    ///
    /// Fails on unknown tags or malformed nested fields.
    pub fn read_nested_any(&mut self) -> Result<Option<DataStructure>, CodecError> {
        if !self.read_bool()? {
            return Ok(None);
        }
        let tag = self.input.read_u8()?;
        let entry = self.entry(tag)?;
        if self.options.tight_encoding && entry.is_marshal_aware() && self.flags.read_bool()? {
            // A pre-marshalled form: its own size, tag and boolean stream.
            self.input.read_i32()?;
            self.input.read_u8()?;
            let nested = BooleanStream::unmarshal(&mut self.input)?;
            let outer = std::mem::replace(&mut self.flags, nested);
            let decoded = entry.decode(self);
            self.flags = outer;
            return decoded.map(Some);
        }
        entry.decode(self).map(Some)
    }

    /// Reads an optional reference that must decode to `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnexpectedType`] when the reference holds a
    /// different type.
    pub fn read_nested<T>(&mut self) -> Result<Option<T>, CodecError>
    where
        T: TryFrom<DataStructure, Error = DataStructure>,
    {
        self.read_nested_any()?.map(Self::expect_type).transpose()
    }

    fn expect_type<T>(value: DataStructure) -> Result<T, CodecError>
    where
        T: TryFrom<DataStructure, Error = DataStructure>,
    {
        T::try_from(value).map_err(|other| {
            ProtocolError::UnexpectedType {
                expected: short_name::<T>(),
                found: other.data_structure_type(),
            }
            .into()
        })
    }

    /// Reads a cached reference of any registered type.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CacheMiss`] for references to unannounced
    /// indices.
    pub fn read_cached_any(&mut self) -> Result<Option<DataStructure>, CodecError> {
        if !self.options.cache_enabled {
            return self.read_nested_any();
        }
        let is_new = self.read_bool()?;
        let index = self.input.read_i16()?;
        if is_new {
            let value = self.read_nested_any()?;
            self.cache.set(index, value.clone())?;
            Ok(value)
        } else {
            Ok(self.cache.get(index)?)
        }
    }

    /// Reads a cached reference that must decode to `T`.
    ///
    /// # Errors
    ///
    /// As [`read_cached_any`](Self::read_cached_any), plus
    /// [`ProtocolError::UnexpectedType`].
    pub fn read_cached<T>(&mut self) -> Result<Option<T>, CodecError>
    where
        T: TryFrom<DataStructure, Error = DataStructure>,
    {
        self.read_cached_any()?.map(Self::expect_type).transpose()
    }

    /// Reads an array of references; null reads as empty.
    ///
    /// # Errors
    ///
    /// Fails on a negative count or malformed elements.
    pub fn read_array<T>(&mut self) -> Result<Vec<T>, CodecError>
    where
        T: TryFrom<DataStructure, Error = DataStructure>,
    {
        if !self.read_bool()? {
            return Ok(Vec::new());
        }
        let count = self.input.read_i16()?;
        let count = usize::try_from(count).map_err(|_| ProtocolError::InvalidLength {
            what: "array",
            len: i32::from(count),
        })?;
        let mut values = Vec::with_capacity(count.min(self.input.remaining()));
        for _ in 0..count {
            if let Some(value) = self.read_nested()? {
                values.push(value);
            }
        }
        Ok(values)
    }

    /// Reads a broker error written by
    /// [`DataWriter::write_throwable`](super::DataWriter::write_throwable).
    ///
    /// # Errors
    ///
    /// Fails on truncation or malformed strings.
    pub fn read_throwable(&mut self) -> Result<Option<BrokerError>, CodecError> {
        if !self.read_bool()? {
            return Ok(None);
        }
        let mut error = BrokerError {
            exception_class: self.read_string()?,
            message: self.read_string()?,
            ..BrokerError::default()
        };
        if self.options.stack_trace_enabled {
            let frames = self.input.read_i16()?;
            let frames = usize::try_from(frames).map_err(|_| ProtocolError::InvalidLength {
                what: "stack trace",
                len: i32::from(frames),
            })?;
            for _ in 0..frames {
                error.stack_trace.push(StackTraceElement {
                    declaring_class: self.read_string()?,
                    method_name: self.read_string()?,
                    file_name: self.read_string()?,
                    line_number: self.read_i32()?,
                });
            }
            error.cause = self.read_throwable()?.map(Box::new);
        }
        Ok(Some(error))
    }

    /// # Errors
    ///
    /// Fails when the flags or the frame are exhausted.
    pub fn read_command_header(&mut self) -> Result<CommandHeader, CodecError> {
        Ok(CommandHeader {
            command_id: self.read_u32()?,
            response_required: self.read_bool()?,
        })
    }
}
