//! Messages and the commands that move them.

use bytes::{Bytes, BytesMut};

use super::{
    CommandHeader,
    DataStructure,
    destination::Destination,
    ids::{BrokerId, ConsumerId, MessageId, ProducerId, TransactionId},
    type_tag,
};
use crate::codec::{
    DataInput,
    PrimitiveMap,
    ProtocolError,
    data_stream::put_big_utf,
    primitive_map::{marshal_primitive_map, unmarshal_primitive_map},
};

/// Body flavour of a [`Message`], selecting its wire type tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MessageKind {
    #[default]
    Message,
    Bytes,
    Map,
    Object,
    Stream,
    Text,
}

impl MessageKind {
    /// Every kind, in tag order.
    pub const ALL: [Self; 6] = [
        Self::Message,
        Self::Bytes,
        Self::Map,
        Self::Object,
        Self::Stream,
        Self::Text,
    ];

    #[must_use]
    pub fn data_structure_type(self) -> u8 {
        match self {
            Self::Message => type_tag::MESSAGE,
            Self::Bytes => type_tag::BYTES_MESSAGE,
            Self::Map => type_tag::MAP_MESSAGE,
            Self::Object => type_tag::OBJECT_MESSAGE,
            Self::Stream => type_tag::STREAM_MESSAGE,
            Self::Text => type_tag::TEXT_MESSAGE,
        }
    }
}

/// A message travelling between producer, broker and consumer.
///
/// `content` and `marshalled_properties` hold the encoded body and
/// property map; [`Message::text`] and [`Message::properties`] decode them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Message {
    pub header: CommandHeader,
    pub kind: MessageKind,
    pub producer_id: Option<ProducerId>,
    pub destination: Option<Destination>,
    pub transaction_id: Option<TransactionId>,
    pub original_destination: Option<Destination>,
    pub message_id: Option<MessageId>,
    pub original_transaction_id: Option<TransactionId>,
    pub group_id: Option<String>,
    pub group_sequence: i32,
    pub correlation_id: Option<String>,
    pub persistent: bool,
    pub expiration: i64,
    pub priority: i8,
    pub reply_to: Option<Destination>,
    pub timestamp: i64,
    pub message_type: Option<String>,
    pub content: Option<Bytes>,
    pub marshalled_properties: Option<Bytes>,
    pub data_structure: Option<Box<DataStructure>>,
    pub target_consumer_id: Option<ConsumerId>,
    pub compressed: bool,
    pub redelivery_counter: i32,
    pub broker_path: Vec<BrokerId>,
    pub arrival: i64,
    pub user_id: Option<String>,
    pub received_by_df_bridge: bool,
    pub droppable: bool,
    pub cluster: Vec<BrokerId>,
    pub broker_in_time: i64,
    pub broker_out_time: i64,
}

impl Message {
    /// Default JMS priority.
    pub const DEFAULT_PRIORITY: i8 = 4;

    /// Creates an empty message of the given kind addressed to `destination`.
    #[must_use]
    pub fn new(kind: MessageKind, destination: Destination) -> Self {
        Self {
            kind,
            destination: Some(destination),
            priority: Self::DEFAULT_PRIORITY,
            ..Self::default()
        }
    }

    /// Creates a text message carrying `text`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StringTooLong`] if `text` cannot be encoded.
    pub fn with_text(destination: Destination, text: &str) -> Result<Self, ProtocolError> {
        let mut message = Self::new(MessageKind::Text, destination);
        message.set_text(Some(text))?;
        Ok(message)
    }

    /// Replaces the text body.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::StringTooLong`] if `text` cannot be encoded.
    pub fn set_text(&mut self, text: Option<&str>) -> Result<(), ProtocolError> {
        self.content = match text {
            Some(text) => {
                let mut buf = BytesMut::new();
                put_big_utf(&mut buf, text)?;
                Some(buf.freeze())
            }
            None => None,
        };
        Ok(())
    }

    /// Decodes the text body written by [`set_text`](Self::set_text).
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if the content is not a length-prefixed
    /// modified UTF-8 string.
    pub fn text(&self) -> Result<Option<String>, ProtocolError> {
        self.content
            .as_ref()
            .map(|content| DataInput::new(content).read_big_utf())
            .transpose()
    }

    /// Replaces the marshalled property map.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] if a key or value cannot be encoded.
    pub fn set_properties(&mut self, properties: &PrimitiveMap) -> Result<(), ProtocolError> {
        let mut buf = BytesMut::new();
        marshal_primitive_map(Some(properties), &mut buf)?;
        self.marshalled_properties = Some(buf.freeze());
        Ok(())
    }

    /// Decodes the marshalled property map.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError`] for a malformed map.
    pub fn properties(&self) -> Result<Option<PrimitiveMap>, ProtocolError> {
        match &self.marshalled_properties {
            Some(raw) => unmarshal_primitive_map(&mut DataInput::new(raw)),
            None => Ok(None),
        }
    }
}

/// Acknowledges one or more delivered messages.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessageAck {
    pub header: CommandHeader,
    pub destination: Option<Destination>,
    pub transaction_id: Option<TransactionId>,
    pub consumer_id: Option<ConsumerId>,
    pub ack_type: u8,
    pub first_message_id: Option<MessageId>,
    pub last_message_id: Option<MessageId>,
    pub message_count: i32,
}

impl MessageAck {
    pub const DELIVERED: u8 = 0;
    pub const POISON: u8 = 1;
    pub const STANDARD: u8 = 2;
    pub const REDELIVERED: u8 = 3;
    pub const INDIVIDUAL: u8 = 4;
    pub const UNMATCHED: u8 = 5;
}

/// Pulls a message for a zero-prefetch consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessagePull {
    pub header: CommandHeader,
    pub consumer_id: Option<ConsumerId>,
    pub destination: Option<Destination>,
    pub timeout: i64,
    pub correlation_id: Option<String>,
    pub message_id: Option<MessageId>,
}

/// Delivers a message to a consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessageDispatch {
    pub header: CommandHeader,
    pub consumer_id: Option<ConsumerId>,
    pub destination: Option<Destination>,
    pub message: Option<Box<Message>>,
    pub redelivery_counter: i32,
}
