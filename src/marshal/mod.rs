//! Per-type marshallers and the machinery they share.
//!
//! Every concrete type implements [`Marshal`] by writing its declared fields
//! in wire order through a [`DataWriter`], and is decoded by a function
//! registered under its type tag in a [`MarshallerRegistry`]. Both sides
//! consult the active [`EncodingOptions`] to gate version-dependent fields
//! and to choose between tight and loose encoding.

pub mod cache;
mod commands;
mod ids;
mod messages;
pub mod reader;
pub mod registry;
mod responses;
pub mod writer;

pub use cache::{MarshalCache, UnmarshalCache};
pub use reader::DataReader;
pub use registry::{MarshallerEntry, MarshallerFactory, MarshallerRegistry};
pub use writer::DataWriter;

use crate::{
    codec::CodecError,
    commands::{Command, DataStructure},
};

/// Settings that shape the encoding of every field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncodingOptions {
    pub version: u32,
    pub tight_encoding: bool,
    pub cache_enabled: bool,
    pub stack_trace_enabled: bool,
}

impl EncodingOptions {
    /// Loose encoding without caching, as used before negotiation.
    #[must_use]
    pub fn loose(version: u32) -> Self {
        Self {
            version,
            tight_encoding: false,
            cache_enabled: false,
            stack_trace_enabled: false,
        }
    }
}

/// Encodes a value's fields. The type tag is written by the caller.
pub trait Marshal {
    /// Wire type tag of this value.
    fn data_structure_type(&self) -> u8;

    /// Writes the fields in wire order.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] if a field cannot be encoded.
    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError>;

    /// Whether tight encoding reserves a flag for a pre-marshalled form.
    fn is_marshal_aware(&self) -> bool { false }
}

/// Decodes a value whose type tag has already been consumed.
pub trait Unmarshal: Sized {
    /// Reads the fields in wire order.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError`] for truncated or malformed input.
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError>;
}

pub(crate) fn decode<T>(input: &mut DataReader<'_>) -> Result<DataStructure, CodecError>
where
    T: Unmarshal + Into<DataStructure>,
{
    T::unmarshal(input).map(Into::into)
}

impl Marshal for DataStructure {
    fn data_structure_type(&self) -> u8 { DataStructure::data_structure_type(self) }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        match self {
            Self::ConnectionId(v) => v.marshal(out),
            Self::SessionId(v) => v.marshal(out),
            Self::ConsumerId(v) => v.marshal(out),
            Self::ProducerId(v) => v.marshal(out),
            Self::BrokerId(v) => v.marshal(out),
            Self::MessageId(v) => v.marshal(out),
            Self::TransactionId(v) => v.marshal(out),
            Self::Destination(v) => v.marshal(out),
            Self::Command(v) => v.marshal(out),
        }
    }

    fn is_marshal_aware(&self) -> bool {
        matches!(self, Self::Command(c) if c.is_marshal_aware())
    }
}

impl Marshal for Command {
    fn data_structure_type(&self) -> u8 { Command::data_structure_type(self) }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        match self {
            Self::WireFormatInfo(c) => c.marshal(out),
            Self::BrokerInfo(c) => c.marshal(out),
            Self::ConnectionInfo(c) => c.marshal(out),
            Self::SessionInfo(c) => c.marshal(out),
            Self::ConsumerInfo(c) => c.marshal(out),
            Self::ProducerInfo(c) => c.marshal(out),
            Self::TransactionInfo(c) => c.marshal(out),
            Self::RemoveInfo(c) => c.marshal(out),
            Self::KeepAliveInfo(c) => c.marshal(out),
            Self::ShutdownInfo(c) => c.marshal(out),
            Self::ConnectionError(c) => c.marshal(out),
            Self::MessagePull(c) => c.marshal(out),
            Self::MessageDispatch(c) => c.marshal(out),
            Self::MessageAck(c) => c.marshal(out),
            Self::Message(c) => c.marshal(out),
            Self::Response(c) => c.marshal(out),
        }
    }

    fn is_marshal_aware(&self) -> bool { self.is_message() }
}
