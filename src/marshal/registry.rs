//! Tag-indexed marshaller tables, one per protocol version.

use std::{collections::BTreeMap, fmt, sync::Arc};

use super::{
    DataReader,
    decode,
    ids::unmarshal_destination,
    messages::unmarshal_message,
    responses::unmarshal_response,
};
use crate::{
    codec::{CodecError, ProtocolError},
    commands::{
        BrokerId,
        BrokerInfo,
        ConnectionError,
        ConnectionId,
        ConnectionInfo,
        ConsumerId,
        ConsumerInfo,
        DataStructure,
        DestinationKind,
        KeepAliveInfo,
        LocalTransactionId,
        MessageAck,
        MessageDispatch,
        MessageId,
        MessageKind,
        MessagePull,
        ProducerId,
        ProducerInfo,
        RemoveInfo,
        SessionId,
        SessionInfo,
        ShutdownInfo,
        TransactionInfo,
        WireFormatInfo,
        XaTransactionId,
        type_tag,
    },
};

/// Lowest protocol version this codec speaks.
pub const MIN_VERSION: u32 = 1;
/// Highest protocol version this codec speaks.
pub const MAX_VERSION: u32 = 6;

/// Decodes the fields of one type; the tag has already been consumed.
pub type DecodeFn = fn(&mut DataReader<'_>) -> Result<DataStructure, CodecError>;

/// Registration record for one wire type.
#[derive(Clone, Copy)]
pub struct MarshallerEntry {
    tag: u8,
    name: &'static str,
    marshal_aware: bool,
    decode: DecodeFn,
}

impl MarshallerEntry {
    #[must_use]
    pub const fn new(tag: u8, name: &'static str, decode: DecodeFn) -> Self {
        Self {
            tag,
            name,
            marshal_aware: false,
            decode,
        }
    }

    /// Marks the type as carrying a pre-marshalled flag in tight encoding.
    #[must_use]
    pub const fn marshal_aware(mut self) -> Self {
        self.marshal_aware = true;
        self
    }

    #[must_use]
    pub fn tag(&self) -> u8 { self.tag }

    #[must_use]
    pub fn name(&self) -> &'static str { self.name }

    #[must_use]
    pub fn is_marshal_aware(&self) -> bool { self.marshal_aware }

    /// Runs the decode function against `reader`.
    ///
    /// # Errors
    ///
    /// Propagates failures from the field decoders.
    pub fn decode(&self, reader: &mut DataReader<'_>) -> Result<DataStructure, CodecError> {
        (self.decode)(reader)
    }
}

impl fmt::Debug for MarshallerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshallerEntry")
            .field("tag", &self.tag)
            .field("name", &self.name)
            .field("marshal_aware", &self.marshal_aware)
            .finish_non_exhaustive()
    }
}

fn message_entry(tag: u8, name: &'static str, decode: DecodeFn) -> MarshallerEntry {
    MarshallerEntry::new(tag, name, decode).marshal_aware()
}

/// Every type known to the codec. All of them exist from version 1 onwards;
/// later versions only add fields.
fn builtin_entries() -> Vec<MarshallerEntry> {
    vec![
        MarshallerEntry::new(type_tag::WIREFORMAT_INFO, "WireFormatInfo", decode::<WireFormatInfo>),
        MarshallerEntry::new(type_tag::BROKER_INFO, "BrokerInfo", decode::<BrokerInfo>),
        MarshallerEntry::new(type_tag::CONNECTION_INFO, "ConnectionInfo", decode::<ConnectionInfo>),
        MarshallerEntry::new(type_tag::SESSION_INFO, "SessionInfo", decode::<SessionInfo>),
        MarshallerEntry::new(type_tag::CONSUMER_INFO, "ConsumerInfo", decode::<ConsumerInfo>),
        MarshallerEntry::new(type_tag::PRODUCER_INFO, "ProducerInfo", decode::<ProducerInfo>),
        MarshallerEntry::new(
            type_tag::TRANSACTION_INFO,
            "TransactionInfo",
            decode::<TransactionInfo>,
        ),
        MarshallerEntry::new(type_tag::KEEP_ALIVE_INFO, "KeepAliveInfo", decode::<KeepAliveInfo>),
        MarshallerEntry::new(type_tag::SHUTDOWN_INFO, "ShutdownInfo", decode::<ShutdownInfo>),
        MarshallerEntry::new(type_tag::REMOVE_INFO, "RemoveInfo", decode::<RemoveInfo>),
        MarshallerEntry::new(
            type_tag::CONNECTION_ERROR,
            "ConnectionError",
            decode::<ConnectionError>,
        ),
        MarshallerEntry::new(type_tag::MESSAGE_PULL, "MessagePull", decode::<MessagePull>),
        MarshallerEntry::new(
            type_tag::MESSAGE_DISPATCH,
            "MessageDispatch",
            decode::<MessageDispatch>,
        ),
        MarshallerEntry::new(type_tag::MESSAGE_ACK, "MessageAck", decode::<MessageAck>),
        message_entry(type_tag::MESSAGE, "Message", |r| {
            unmarshal_message(r, MessageKind::Message).map(Into::into)
        }),
        message_entry(type_tag::BYTES_MESSAGE, "BytesMessage", |r| {
            unmarshal_message(r, MessageKind::Bytes).map(Into::into)
        }),
        message_entry(type_tag::MAP_MESSAGE, "MapMessage", |r| {
            unmarshal_message(r, MessageKind::Map).map(Into::into)
        }),
        message_entry(type_tag::OBJECT_MESSAGE, "ObjectMessage", |r| {
            unmarshal_message(r, MessageKind::Object).map(Into::into)
        }),
        message_entry(type_tag::STREAM_MESSAGE, "StreamMessage", |r| {
            unmarshal_message(r, MessageKind::Stream).map(Into::into)
        }),
        message_entry(type_tag::TEXT_MESSAGE, "TextMessage", |r| {
            unmarshal_message(r, MessageKind::Text).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::RESPONSE, "Response", |r| {
            unmarshal_response(r, type_tag::RESPONSE).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::EXCEPTION_RESPONSE, "ExceptionResponse", |r| {
            unmarshal_response(r, type_tag::EXCEPTION_RESPONSE).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::DATA_RESPONSE, "DataResponse", |r| {
            unmarshal_response(r, type_tag::DATA_RESPONSE).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::INTEGER_RESPONSE, "IntegerResponse", |r| {
            unmarshal_response(r, type_tag::INTEGER_RESPONSE).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::QUEUE, "Queue", |r| {
            unmarshal_destination(r, DestinationKind::Queue).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::TOPIC, "Topic", |r| {
            unmarshal_destination(r, DestinationKind::Topic).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::TEMP_QUEUE, "TempQueue", |r| {
            unmarshal_destination(r, DestinationKind::TempQueue).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::TEMP_TOPIC, "TempTopic", |r| {
            unmarshal_destination(r, DestinationKind::TempTopic).map(Into::into)
        }),
        MarshallerEntry::new(type_tag::MESSAGE_ID, "MessageId", decode::<MessageId>),
        MarshallerEntry::new(
            type_tag::LOCAL_TRANSACTION_ID,
            "LocalTransactionId",
            decode::<LocalTransactionId>,
        ),
        MarshallerEntry::new(
            type_tag::XA_TRANSACTION_ID,
            "XaTransactionId",
            decode::<XaTransactionId>,
        ),
        MarshallerEntry::new(type_tag::CONNECTION_ID, "ConnectionId", decode::<ConnectionId>),
        MarshallerEntry::new(type_tag::SESSION_ID, "SessionId", decode::<SessionId>),
        MarshallerEntry::new(type_tag::CONSUMER_ID, "ConsumerId", decode::<ConsumerId>),
        MarshallerEntry::new(type_tag::PRODUCER_ID, "ProducerId", decode::<ProducerId>),
        MarshallerEntry::new(type_tag::BROKER_ID, "BrokerId", decode::<BrokerId>),
    ]
}

/// Marshallers for one protocol version, indexed by type tag.
pub struct MarshallerRegistry {
    version: u32,
    entries: Box<[Option<MarshallerEntry>; 256]>,
}

impl MarshallerRegistry {
    /// Creates an empty registry for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedVersion`] outside the supported
    /// range.
    pub fn empty(version: u32) -> Result<Self, ProtocolError> {
        if !(MIN_VERSION..=MAX_VERSION).contains(&version) {
            return Err(ProtocolError::UnsupportedVersion { version });
        }
        Ok(Self {
            version,
            entries: Box::new([None; 256]),
        })
    }

    /// Creates a registry holding every built-in type.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedVersion`] outside the supported
    /// range.
    ///
    /// # Examples
    ///
    /// ```
    /// use openwire::marshal::MarshallerRegistry;
    ///
    /// let registry = MarshallerRegistry::for_version(6).expect("supported");
    /// assert_eq!(registry.lookup(1).map(|e| e.name()), Some("WireFormatInfo"));
    /// assert!(MarshallerRegistry::for_version(7).is_err());
    /// ```
    pub fn for_version(version: u32) -> Result<Self, ProtocolError> {
        let mut registry = Self::empty(version)?;
        for entry in builtin_entries() {
            registry.register(entry)?;
        }
        Ok(registry)
    }

    /// Adds an entry.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::DuplicateTag`] if the tag is taken.
    pub fn register(&mut self, entry: MarshallerEntry) -> Result<(), ProtocolError> {
        let slot = &mut self.entries[usize::from(entry.tag)];
        if slot.is_some() {
            return Err(ProtocolError::DuplicateTag { tag: entry.tag });
        }
        *slot = Some(entry);
        Ok(())
    }

    #[must_use]
    pub fn version(&self) -> u32 { self.version }

    #[must_use]
    pub fn lookup(&self, tag: u8) -> Option<&MarshallerEntry> {
        self.entries[usize::from(tag)].as_ref()
    }

    /// Registered tags in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = u8> + '_ {
        self.entries.iter().flatten().map(MarshallerEntry::tag)
    }

    #[must_use]
    pub fn len(&self) -> usize { self.entries.iter().flatten().count() }

    #[must_use]
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl fmt::Debug for MarshallerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MarshallerRegistry")
            .field("version", &self.version)
            .field("types", &self.len())
            .finish()
    }
}

/// Shared registries for every supported version, built once.
#[derive(Debug)]
pub struct MarshallerFactory {
    registries: BTreeMap<u32, Arc<MarshallerRegistry>>,
}

impl MarshallerFactory {
    /// Builds a registry for each supported version.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::DuplicateTag`] if the built-in table is
    /// inconsistent.
    pub fn new() -> Result<Self, ProtocolError> {
        let registries = (MIN_VERSION..=MAX_VERSION)
            .map(|v| MarshallerRegistry::for_version(v).map(|r| (v, Arc::new(r))))
            .collect::<Result<_, _>>()?;
        Ok(Self { registries })
    }

    /// Registry for `version`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedVersion`] for unknown versions.
    pub fn registry(&self, version: u32) -> Result<Arc<MarshallerRegistry>, ProtocolError> {
        self.registries
            .get(&version)
            .cloned()
            .ok_or(ProtocolError::UnsupportedVersion { version })
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn builtin_tags_are_unique() {
        let registry = MarshallerRegistry::for_version(MAX_VERSION).expect("registry");
        assert_eq!(registry.len(), builtin_entries().len());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = MarshallerRegistry::for_version(1).expect("registry");
        let err = registry
            .register(MarshallerEntry::new(type_tag::QUEUE, "Again", decode::<BrokerId>))
            .expect_err("duplicate");
        assert_eq!(err, ProtocolError::DuplicateTag { tag: type_tag::QUEUE });
    }

    #[rstest]
    #[case(0)]
    #[case(7)]
    fn unsupported_versions_are_rejected(#[case] version: u32) {
        assert_eq!(
            MarshallerRegistry::for_version(version).expect_err("unsupported"),
            ProtocolError::UnsupportedVersion { version }
        );
    }

    #[test]
    fn only_messages_are_marshal_aware() {
        let registry = MarshallerRegistry::for_version(6).expect("registry");
        let aware: Vec<u8> = registry
            .tags()
            .filter(|t| registry.lookup(*t).is_some_and(MarshallerEntry::is_marshal_aware))
            .collect();
        assert_eq!(aware, (type_tag::MESSAGE..=type_tag::TEXT_MESSAGE).collect::<Vec<_>>());
    }

    #[test]
    fn factory_shares_registries() {
        let factory = MarshallerFactory::new().expect("factory");
        let a = factory.registry(3).expect("v3");
        let b = factory.registry(3).expect("v3");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(factory.registry(9).is_err());
    }
}
