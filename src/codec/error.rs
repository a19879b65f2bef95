//! Error types for the codec layer.
//!
//! The taxonomy separates framing errors (the size prefix and frame
//! boundaries), protocol errors (anything wrong inside an extracted frame),
//! I/O errors, and EOF conditions.
//!
//! # Error Categories
//!
//! - [`FramingError`]: Problems with the 4-byte size prefix or the frame length.
//! - [`ProtocolError`]: Malformed payloads, unknown type tags, cache misses,
//!   unsupported versions, and similar semantic violations.
//! - [`EofError`]: End-of-stream conditions distinguishing clean closure from premature
//!   disconnection.
//! - [`CodecError`]: Top-level enum wrapping all categories plus I/O errors.
//!
//! OpenWire frames carry no resynchronisation marker and the marshal caches
//! on both peers evolve frame by frame, so a frame that fails to decode
//! leaves the stream in an unknown state. Every codec error is therefore
//! fatal to the connection; [`CodecError::should_disconnect`] reports `false`
//! only for the clean close at a frame boundary.

use std::io;

use thiserror::Error;

/// Framing-level errors occurring while reading or writing the size prefix.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Frame length prefix indicates size exceeding configured maximum.
    #[error("frame exceeds max length: {size} > {max}")]
    OversizedFrame {
        /// Actual frame size indicated by the length prefix.
        size: usize,
        /// Maximum allowed frame size.
        max: usize,
    },

    /// Frame length prefix is negative.
    #[error("invalid frame length {0}")]
    InvalidLength(i32),
}

/// Protocol-level errors occurring after successful frame extraction.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// No marshaller is registered for the tag at the active version.
    #[error("unknown data structure type {tag} for wire format version {version}")]
    UnknownDataType {
        /// Type tag read from the frame.
        tag: u8,
        /// Active wire format version.
        version: u32,
    },

    /// The frame carried the null type where a command was required.
    #[error("top-level frame carries the null type")]
    NullTopLevelCommand,

    /// A nested field decoded to a data structure of the wrong kind.
    #[error("expected {expected}, found data structure type {found}")]
    UnexpectedType {
        /// Human-readable name of the expected kind.
        expected: &'static str,
        /// Type tag actually decoded.
        found: u8,
    },

    /// Wire format version outside the supported range.
    #[error("unsupported wire format version: {version}")]
    UnsupportedVersion {
        /// Version number that was rejected.
        version: u32,
    },

    /// Encoded string exceeds the 16-bit length limit.
    #[error("encoded string too long: {len} bytes")]
    StringTooLong {
        /// Encoded length in bytes.
        len: usize,
    },

    /// String bytes are not valid modified UTF-8.
    #[error("malformed modified UTF-8 input")]
    InvalidUtf,

    /// A cached reference pointed at an unpopulated cache slot.
    #[error("no cached value at index {index}")]
    CacheMiss {
        /// Cache index read from the frame.
        index: i16,
    },

    /// Unknown value type inside a primitive map.
    #[error("unknown primitive map value type {code}")]
    InvalidPrimitiveType {
        /// Value type code read from the stream.
        code: u8,
    },

    /// `WireFormatInfo` did not start with the `ActiveMQ` magic.
    #[error("invalid wire format magic {found:?}")]
    InvalidMagic {
        /// Bytes found in place of the magic.
        found: [u8; 8],
    },

    /// Negative length for a byte array, string or array field.
    #[error("invalid {what} length {len}")]
    InvalidLength {
        /// Field kind being decoded.
        what: &'static str,
        /// Length read from the stream.
        len: i32,
    },

    /// The frame ended before a field was complete.
    #[error("truncated frame: need {needed} more bytes, have {remaining}")]
    Truncated {
        /// Bytes required by the field.
        needed: usize,
        /// Bytes left in the frame.
        remaining: usize,
    },

    /// The boolean stream ran out of bits.
    #[error("boolean stream exhausted")]
    BooleanStreamExhausted,

    /// A registry already holds a marshaller for the tag.
    #[error("duplicate marshaller for data structure type {tag}")]
    DuplicateTag {
        /// Tag registered twice.
        tag: u8,
    },
}

/// EOF handling variants distinguishing normal vs. premature closure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// Clean EOF at frame boundary.
    #[error("connection closed cleanly at frame boundary")]
    CleanClose,

    /// EOF received after the size prefix but before the frame completed.
    #[error("premature EOF: {bytes_received} bytes of {expected} byte frame received")]
    MidFrame {
        /// Bytes received before EOF.
        bytes_received: usize,
        /// Expected total frame size.
        expected: usize,
    },

    /// EOF received while reading the size prefix.
    #[error("premature EOF during header: {bytes_received} of {header_size} header bytes")]
    MidHeader {
        /// Header bytes received before EOF.
        bytes_received: usize,
        /// Expected header size.
        header_size: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use openwire::codec::{CodecError, ProtocolError};
///
/// let err = CodecError::Protocol(ProtocolError::NullTopLevelCommand);
/// assert!(err.should_disconnect());
/// assert_eq!(err.error_type(), "protocol");
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing layer error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Protocol layer error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns true if this error represents a clean connection close.
    ///
    /// # Examples
    ///
    /// ```
    /// use openwire::codec::{CodecError, EofError};
    ///
    /// assert!(CodecError::Eof(EofError::CleanClose).is_clean_close());
    /// ```
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Eof(EofError::CleanClose)) }

    /// Returns true if the connection must be torn down.
    #[must_use]
    pub fn should_disconnect(&self) -> bool { !self.is_clean_close() }

    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of: `"framing"`, `"protocol"`, `"io"`, or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Protocol(_) => "protocol",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Protocol(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
