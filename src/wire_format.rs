//! The OpenWire format: top-level command (un)marshalling.
//!
//! [`OpenWireFormat`] turns one command into the payload of one frame and
//! back, dispatching through the registry for its negotiated version.
//! Reference caches are owned by the caller, one per direction, so the
//! format itself is immutable and can be shared. [`WireFormatState`] holds
//! the format currently in force on a connection and lets the handshake
//! swap in the negotiated one.

use std::sync::{
    Arc,
    PoisonError,
    RwLock,
    atomic::{AtomicU64, Ordering},
};

use bytes::BytesMut;

pub mod config;

pub use config::{DEFAULT_MAX_FRAME_SIZE, WireFormatConfig};

use crate::{
    codec::{CodecError, DataInput, ProtocolError},
    commands::{Command, WireFormatInfo, type_tag},
    marshal::{
        DataReader,
        DataWriter,
        EncodingOptions,
        Marshal,
        MarshalCache,
        MarshallerFactory,
        MarshallerRegistry,
        UnmarshalCache,
    },
};

/// Encoder and decoder of top-level commands for one set of settings.
#[derive(Debug)]
pub struct OpenWireFormat {
    config: WireFormatConfig,
    preferred: WireFormatConfig,
    factory: Arc<MarshallerFactory>,
    registry: Arc<MarshallerRegistry>,
}

impl OpenWireFormat {
    /// Creates a format that uses `config` until a handshake completes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnsupportedVersion`] if `config.version` has
    /// no registry.
    pub fn new(
        config: WireFormatConfig,
        factory: Arc<MarshallerFactory>,
    ) -> Result<Self, ProtocolError> {
        let registry = factory.registry(config.version)?;
        Ok(Self {
            config,
            preferred: config,
            factory,
            registry,
        })
    }

    /// Settings currently in force.
    #[must_use]
    pub fn config(&self) -> &WireFormatConfig { &self.config }

    #[must_use]
    pub fn version(&self) -> u32 { self.config.version }

    /// Handshake advertising the local preferences.
    #[must_use]
    pub fn preferred_info(&self) -> WireFormatInfo { self.preferred.to_info() }

    /// Encoding used for `tag`. Handshakes are always loose and uncached
    /// because the peer cannot know the negotiated settings yet.
    fn options_for(&self, tag: u8) -> EncodingOptions {
        if tag == type_tag::WIREFORMAT_INFO {
            EncodingOptions::loose(self.config.version)
        } else {
            self.config.encoding_options()
        }
    }

    /// Appends the tag and fields of `command` to `dst`. The frame size
    /// prefix is the caller's concern.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Protocol`] if a field cannot be encoded; `dst`
    /// and the cache are left untouched in that case.
    pub fn marshal(
        &self,
        command: &Command,
        cache: &mut MarshalCache,
        dst: &mut BytesMut,
    ) -> Result<(), CodecError> {
        let tag = command.data_structure_type();
        let options = self.options_for(tag);
        if options.cache_enabled {
            cache.evict();
        }
        cache.begin_frame();
        let mut writer = DataWriter::new(options, cache);
        let encoded = command
            .marshal(&mut writer)
            .and_then(|()| writer.finish(tag, dst));
        if encoded.is_ok() {
            cache.commit_frame();
        } else {
            cache.rollback_frame();
        }
        encoded
    }

    /// Decodes one frame payload into a command.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::NullTopLevelCommand`] for a leading null
    /// tag, [`ProtocolError::UnknownDataType`] for unregistered tags and
    /// other protocol errors for malformed fields. Nothing is returned for a
    /// partially decoded frame.
    pub fn unmarshal(
        &self,
        payload: &[u8],
        cache: &mut UnmarshalCache,
    ) -> Result<Command, CodecError> {
        let mut input = DataInput::new(payload);
        let tag = input.read_u8()?;
        if tag == type_tag::NULL {
            return Err(ProtocolError::NullTopLevelCommand.into());
        }
        let mut reader = DataReader::new(self.options_for(tag), &self.registry, cache, input)?;
        let decoded = reader.read_tagged(tag)?;
        if reader.remaining() > 0 {
            tracing::trace!(tag, trailing = reader.remaining(), "ignoring trailing frame bytes");
        }
        Command::try_from(decoded).map_err(|other| {
            ProtocolError::UnexpectedType {
                expected: "Command",
                found: other.data_structure_type(),
            }
            .into()
        })
    }

    /// Returns the format agreed with a peer that advertised `peer`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidMagic`] for a foreign handshake or
    /// [`ProtocolError::UnsupportedVersion`] if the agreed version has no
    /// registry.
    pub fn renegotiate(&self, peer: &WireFormatInfo) -> Result<Self, ProtocolError> {
        let config = self.preferred.negotiate(peer)?;
        let registry = self.factory.registry(config.version)?;
        Ok(Self {
            config,
            preferred: self.preferred,
            factory: Arc::clone(&self.factory),
            registry,
        })
    }
}

/// The format in force on one connection.
///
/// Each replacement bumps a generation counter; codecs compare it to the
/// generation they last saw and reset their caches when it moves.
#[derive(Debug)]
pub struct WireFormatState {
    current: RwLock<Arc<OpenWireFormat>>,
    generation: AtomicU64,
}

impl WireFormatState {
    #[must_use]
    pub fn new(format: OpenWireFormat) -> Self {
        Self {
            current: RwLock::new(Arc::new(format)),
            generation: AtomicU64::new(0),
        }
    }

    /// Format in force and its generation.
    #[must_use]
    pub fn current(&self) -> (Arc<OpenWireFormat>, u64) {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        (Arc::clone(&guard), self.generation.load(Ordering::Acquire))
    }

    #[must_use]
    pub fn generation(&self) -> u64 { self.generation.load(Ordering::Acquire) }

    /// Installs `format` for every later frame.
    pub fn replace(&self, format: OpenWireFormat) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(format);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};

    use super::*;
    use crate::commands::{
        ConnectionId,
        ConnectionInfo,
        ConsumerId,
        ConsumerInfo,
        Destination,
        KeepAliveInfo,
        Message,
        MessageDispatch,
        MessageKind,
        ProducerId,
        ProducerInfo,
        SessionId,
    };

    fn session() -> SessionId { SessionId::new(&ConnectionId::new("ID:c"), 1) }

    #[fixture]
    fn factory() -> Arc<MarshallerFactory> { Arc::new(MarshallerFactory::new().expect("factory")) }

    fn round_trip(format: &OpenWireFormat, command: &Command) -> (Command, usize) {
        let mut out_cache = MarshalCache::new(format.config().cache_size);
        let mut in_cache = UnmarshalCache::new();
        let mut buf = BytesMut::new();
        format
            .marshal(command, &mut out_cache, &mut buf)
            .expect("marshal");
        let decoded = format.unmarshal(&buf, &mut in_cache).expect("unmarshal");
        (decoded, buf.len())
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn consumer_info_round_trips(factory: Arc<MarshallerFactory>, #[case] tight: bool) {
        let config = WireFormatConfig::default().with_tight_encoding(tight);
        let format = OpenWireFormat::new(config, factory).expect("format");
        let consumer = ConsumerId::new(&session(), 2);
        let mut command = Command::from(ConsumerInfo::new(consumer, Destination::queue("orders")));
        command.set_command_id(9);
        command.set_response_required(true);
        let (decoded, _) = round_trip(&format, &command);
        assert_eq!(decoded, command);
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn tight_messages_round_trip_at_top_level_and_nested(
        factory: Arc<MarshallerFactory>,
        #[case] cache: bool,
    ) {
        let config = WireFormatConfig::default()
            .with_tight_encoding(true)
            .with_cache(cache);
        let format = OpenWireFormat::new(config, factory).expect("format");
        let mut message = Message::new(MessageKind::Text, Destination::queue("q"));
        message.header.command_id = 4;
        message.header.response_required = true;
        let command = Command::from(message.clone());
        let (decoded, _) = round_trip(&format, &command);
        assert_eq!(decoded, command);

        let dispatch = Command::from(MessageDispatch {
            consumer_id: Some(ConsumerId::new(&session(), 1)),
            destination: Some(Destination::queue("q")),
            message: Some(Box::new(message)),
            redelivery_counter: 2,
            ..MessageDispatch::default()
        });
        let (decoded, _) = round_trip(&format, &dispatch);
        assert_eq!(decoded, dispatch);
    }

    #[rstest]
    fn failed_frames_do_not_leak_cache_entries(factory: Arc<MarshallerFactory>) {
        let format = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("format");
        let mut out_cache = MarshalCache::new(format.config().cache_size);
        let mut in_cache = UnmarshalCache::new();
        let connection = ConnectionId::new("ID:c1");

        let oversized = Command::from(ConnectionInfo {
            client_id: Some("x".repeat(70_000)),
            ..ConnectionInfo::new(connection.clone())
        });
        let mut buf = BytesMut::new();
        let err = format
            .marshal(&oversized, &mut out_cache, &mut buf)
            .expect_err("client id too long");
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::StringTooLong { len: 70_000 })
        ));
        assert!(buf.is_empty());
        assert!(out_cache.is_empty());

        let valid = Command::from(ConnectionInfo::new(connection));
        format
            .marshal(&valid, &mut out_cache, &mut buf)
            .expect("marshal");
        let decoded = format.unmarshal(&buf, &mut in_cache).expect("peer decodes");
        assert_eq!(decoded, valid);
    }

    #[rstest]
    fn tight_encoding_is_smaller(factory: Arc<MarshallerFactory>) {
        let loose = OpenWireFormat::new(WireFormatConfig::default(), Arc::clone(&factory))
            .expect("loose");
        let tight = OpenWireFormat::new(
            WireFormatConfig::default().with_tight_encoding(true),
            factory,
        )
        .expect("tight");
        let mut info = ProducerInfo::new(ProducerId::new(&session(), 1));
        info.destination = Some(Destination::topic("prices"));
        let command = Command::from(info);
        let (_, loose_len) = round_trip(&loose, &command);
        let (_, tight_len) = round_trip(&tight, &command);
        assert!(tight_len < loose_len, "tight {tight_len} >= loose {loose_len}");
    }

    #[rstest]
    fn handshake_is_loose_even_when_tight(factory: Arc<MarshallerFactory>) {
        let config = WireFormatConfig::default().with_tight_encoding(true);
        let tight = OpenWireFormat::new(config, Arc::clone(&factory)).expect("tight");
        let loose = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("loose");
        let info = Command::from(tight.preferred_info());
        let mut buf = BytesMut::new();
        tight
            .marshal(&info, &mut MarshalCache::new(16), &mut buf)
            .expect("marshal");
        let decoded = loose
            .unmarshal(&buf, &mut UnmarshalCache::new())
            .expect("a loose reader understands it");
        assert_eq!(decoded, info);
    }

    #[rstest]
    fn null_top_level_tag_is_rejected(factory: Arc<MarshallerFactory>) {
        let format = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("format");
        let err = format
            .unmarshal(&[0], &mut UnmarshalCache::new())
            .expect_err("null command");
        assert!(matches!(err, CodecError::Protocol(ProtocolError::NullTopLevelCommand)));
    }

    #[rstest]
    fn unknown_tag_is_rejected(factory: Arc<MarshallerFactory>) {
        let format = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("format");
        let err = format
            .unmarshal(&[99, 0, 0, 0, 0, 0], &mut UnmarshalCache::new())
            .expect_err("unknown tag");
        assert!(matches!(
            err,
            CodecError::Protocol(ProtocolError::UnknownDataType { tag: 99, version: 6 })
        ));
    }

    #[rstest]
    fn truncated_payload_is_rejected(factory: Arc<MarshallerFactory>) {
        let format = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("format");
        let mut buf = BytesMut::new();
        format
            .marshal(&KeepAliveInfo::default().into(), &mut MarshalCache::new(8), &mut buf)
            .expect("marshal");
        let err = format
            .unmarshal(&buf[..buf.len() - 1], &mut UnmarshalCache::new())
            .expect_err("truncated");
        assert!(matches!(err, CodecError::Protocol(ProtocolError::Truncated { .. })));
    }

    #[rstest]
    fn renegotiation_selects_the_lower_version(factory: Arc<MarshallerFactory>) {
        let format = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("format");
        let peer = WireFormatConfig::default().with_version(3).to_info();
        let negotiated = format.renegotiate(&peer).expect("renegotiate");
        assert_eq!(negotiated.version(), 3);
        assert_eq!(negotiated.preferred_info().version, 6);
    }

    #[rstest]
    fn state_generation_moves_on_replace(factory: Arc<MarshallerFactory>) {
        let format = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("format");
        let next = format
            .renegotiate(&WireFormatConfig::default().with_version(2).to_info())
            .expect("renegotiate");
        let state = WireFormatState::new(format);
        assert_eq!(state.generation(), 0);
        state.replace(next);
        let (current, generation) = state.current();
        assert_eq!(generation, 1);
        assert_eq!(current.version(), 2);
    }
}
