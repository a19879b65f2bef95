//! OpenWire framing and the codec primitives beneath it.
//!
//! Every command travels in a frame of the form
//! `[i32 size][type tag][fields]`, sizes big-endian. A zero size carries no
//! command and acts as a keep-alive. [`OpenWireCodec`] hands out a
//! [`Decoder`] and an [`Encoder`] for the two halves of a connection; each
//! owns the reference cache for its direction and follows the
//! [`WireFormatState`] so that a completed handshake switches both halves
//! to the negotiated settings.
//!
//! # Error Handling
//!
//! Failures are reported as [`CodecError`], split into framing, protocol,
//! I/O and EOF conditions. See the [`error`] module for details.

use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

pub mod boolean_stream;
pub mod data_stream;
pub mod error;
pub mod primitive_map;

pub use boolean_stream::BooleanStream;
pub use data_stream::DataInput;
pub use error::{CodecError, EofError, FramingError, ProtocolError};
pub use primitive_map::{PrimitiveMap, PrimitiveValue};

use crate::{
    commands::Command,
    marshal::{MarshalCache, UnmarshalCache},
    wire_format::{OpenWireFormat, WireFormatState},
};

/// Size of the frame length prefix.
pub const LENGTH_HEADER_SIZE: usize = 4;

/// One unit read from or written to the wire.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    Command(Command),
    /// A zero-length frame.
    Empty,
}

/// Factory for the decoder and encoder of one connection.
#[derive(Clone, Debug)]
pub struct OpenWireCodec {
    state: Arc<WireFormatState>,
}

impl OpenWireCodec {
    #[must_use]
    pub fn new(state: Arc<WireFormatState>) -> Self { Self { state } }

    #[must_use]
    pub fn state(&self) -> &Arc<WireFormatState> { &self.state }

    #[must_use]
    pub fn decoder(&self) -> OpenWireDecoder {
        let (format, generation) = self.state.current();
        OpenWireDecoder {
            state: Arc::clone(&self.state),
            format,
            generation,
            cache: UnmarshalCache::new(),
        }
    }

    #[must_use]
    pub fn encoder(&self) -> OpenWireEncoder {
        let (format, generation) = self.state.current();
        let cache = MarshalCache::new(format.config().cache_size);
        OpenWireEncoder {
            state: Arc::clone(&self.state),
            format,
            generation,
            cache,
        }
    }
}

/// Inbound half: splits frames and decodes commands.
pub struct OpenWireDecoder {
    state: Arc<WireFormatState>,
    format: Arc<OpenWireFormat>,
    generation: u64,
    cache: UnmarshalCache,
}

impl OpenWireDecoder {
    fn refresh(&mut self) {
        if self.state.generation() != self.generation {
            (self.format, self.generation) = self.state.current();
            self.cache.clear();
        }
    }

    /// Reads and validates the size prefix, if complete.
    fn frame_size(&self, src: &BytesMut) -> Result<Option<usize>, CodecError> {
        let Some(header) = src.get(..LENGTH_HEADER_SIZE) else {
            return Ok(None);
        };
        let mut header = header;
        let size = header.get_i32();
        let size = usize::try_from(size).map_err(|_| FramingError::InvalidLength(size))?;
        let max = self.format.config().max_frame_size;
        if size > max {
            return Err(FramingError::OversizedFrame { size, max }.into());
        }
        Ok(Some(size))
    }
}

impl Decoder for OpenWireDecoder {
    type Item = Frame;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.refresh();
        let Some(size) = self.frame_size(src)? else {
            return Ok(None);
        };
        let total = LENGTH_HEADER_SIZE + size;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(LENGTH_HEADER_SIZE);
        let payload = src.split_to(size);
        if payload.is_empty() {
            return Ok(Some(Frame::Empty));
        }
        let command = self.format.unmarshal(&payload, &mut self.cache)?;
        Ok(Some(Frame::Command(command)))
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        // Clean close: no data remaining at frame boundary
        if src.is_empty() {
            return Ok(None);
        }
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None => Err(build_eof_error(src)),
        }
    }
}

/// Describes a stream that ended inside a frame.
///
/// - [`EofError::MidHeader`]: fewer than four bytes of the size prefix
///   arrived.
/// - [`EofError::MidFrame`]: the prefix arrived but the payload was cut
///   short.
fn build_eof_error(src: &BytesMut) -> CodecError {
    let bytes_received = src.len();
    let expected = src
        .get(..LENGTH_HEADER_SIZE)
        .and_then(|slice| <[u8; LENGTH_HEADER_SIZE]>::try_from(slice).ok())
        .map(|bytes| i32::from_be_bytes(bytes).max(0).cast_unsigned() as usize);

    match expected {
        Some(expected) => CodecError::Eof(EofError::MidFrame {
            bytes_received: bytes_received.saturating_sub(LENGTH_HEADER_SIZE),
            expected,
        }),
        None => CodecError::Eof(EofError::MidHeader {
            bytes_received,
            header_size: LENGTH_HEADER_SIZE,
        }),
    }
}

/// Outbound half: encodes commands and writes the size prefix.
pub struct OpenWireEncoder {
    state: Arc<WireFormatState>,
    format: Arc<OpenWireFormat>,
    generation: u64,
    cache: MarshalCache,
}

impl OpenWireEncoder {
    fn refresh(&mut self) {
        if self.state.generation() != self.generation {
            (self.format, self.generation) = self.state.current();
            self.cache = MarshalCache::new(self.format.config().cache_size);
        }
    }
}

impl Encoder<Frame> for OpenWireEncoder {
    type Error = CodecError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.refresh();
        let Frame::Command(command) = item else {
            dst.put_i32(0);
            return Ok(());
        };
        let mut payload = BytesMut::new();
        self.format.marshal(&command, &mut self.cache, &mut payload)?;
        let max = self.format.config().max_frame_size;
        if payload.len() > max {
            return Err(FramingError::OversizedFrame {
                size: payload.len(),
                max,
            }
            .into());
        }
        let size = i32::try_from(payload.len()).map_err(|_| FramingError::OversizedFrame {
            size: payload.len(),
            max: i32::MAX.cast_unsigned() as usize,
        })?;
        dst.reserve(LENGTH_HEADER_SIZE + payload.len());
        dst.put_i32(size);
        dst.put_slice(&payload);
        Ok(())
    }
}

impl Encoder<Command> for OpenWireEncoder {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        Encoder::<Frame>::encode(self, Frame::Command(item), dst)
    }
}

#[cfg(test)]
mod tests;
