//! Round-trip laws for the OpenWire codec across versions and encodings.
//!
//! Values generated here only use fields every protocol version carries, so
//! decoding must reproduce them exactly whichever version is active.

use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use futures::{SinkExt, StreamExt};
use openwire::{
    Command,
    Frame,
    MarshallerFactory,
    OpenWireCodec,
    OpenWireFormat,
    WireFormatConfig,
    WireFormatState,
    commands::{
        BrokerError,
        ConnectionId,
        ConsumerId,
        ConsumerInfo,
        Destination,
        LocalTransactionId,
        Message,
        MessageAck,
        MessageDispatch,
        MessageId,
        MessageKind,
        ProducerId,
        ProducerInfo,
        RemoveInfo,
        Response,
        SessionId,
        TransactionId,
    },
    marshal::{MarshalCache, UnmarshalCache},
};
use proptest::prelude::*;
use rstest::{fixture, rstest};
use tokio_util::codec::{FramedRead, FramedWrite};

#[fixture]
fn factory() -> Arc<MarshallerFactory> { Arc::new(MarshallerFactory::new().expect("factory")) }

fn format(factory: &Arc<MarshallerFactory>, version: u32, tight: bool, cache: bool) -> OpenWireFormat {
    let config = WireFormatConfig::default()
        .with_version(version)
        .with_tight_encoding(tight)
        .with_cache(cache);
    OpenWireFormat::new(config, Arc::clone(factory)).expect("format")
}

fn name() -> impl Strategy<Value = String> { "\\PC{0,24}" }

fn destination() -> impl Strategy<Value = Destination> {
    (any::<bool>(), "[a-z.]{1,16}").prop_map(|(topic, name)| {
        if topic {
            Destination::topic(name)
        } else {
            Destination::queue(name)
        }
    })
}

fn session() -> impl Strategy<Value = SessionId> {
    (name(), any::<i64>()).prop_map(|(conn, id)| SessionId::new(&ConnectionId::new(conn), id))
}

fn producer_id() -> impl Strategy<Value = ProducerId> {
    (session(), any::<i64>()).prop_map(|(session, id)| ProducerId::new(&session, id))
}

fn consumer_id() -> impl Strategy<Value = ConsumerId> {
    (session(), any::<i64>()).prop_map(|(session, id)| ConsumerId::new(&session, id))
}

fn message() -> impl Strategy<Value = Message> {
    (
        producer_id(),
        destination(),
        any::<i64>(),
        proptest::option::of(proptest::collection::vec(any::<u8>(), 0..64)),
        proptest::option::of(name()),
        any::<bool>(),
        any::<i8>(),
    )
        .prop_map(|(producer, dest, seq, body, correlation, persistent, priority)| {
            let mut message = Message::new(MessageKind::Bytes, dest);
            message.message_id = Some(MessageId::new(&producer, seq));
            message.producer_id = Some(producer);
            message.content = body.map(Bytes::from);
            message.correlation_id = correlation;
            message.persistent = persistent;
            message.priority = priority;
            message
        })
}

fn command() -> impl Strategy<Value = Command> {
    let body = prop_oneof![
        (producer_id(), proptest::option::of(destination())).prop_map(|(id, dest)| {
            let mut info = ProducerInfo::new(id);
            info.destination = dest;
            Command::from(info)
        }),
        (consumer_id(), destination(), any::<i32>(), proptest::option::of(name())).prop_map(
            |(id, dest, prefetch, selector)| {
                let mut info = ConsumerInfo::new(id, dest);
                info.prefetch_size = prefetch;
                info.selector = selector;
                Command::from(info)
            }
        ),
        consumer_id().prop_map(|id| Command::from(RemoveInfo::new(id))),
        message().prop_map(Command::from),
        (consumer_id(), message()).prop_map(|(consumer, message)| {
            Command::from(MessageDispatch {
                consumer_id: Some(consumer),
                destination: message.destination.clone(),
                message: Some(Box::new(message)),
                ..MessageDispatch::default()
            })
        }),
        (consumer_id(), producer_id(), any::<i64>(), any::<i32>()).prop_map(
            |(consumer, producer, txn, count)| {
                Command::from(MessageAck {
                    consumer_id: Some(consumer),
                    transaction_id: Some(TransactionId::Local(LocalTransactionId {
                        value: txn,
                        connection_id: Some(ConnectionId::new("ID:txn")),
                    })),
                    last_message_id: Some(MessageId::new(&producer, 1)),
                    ack_type: MessageAck::STANDARD,
                    message_count: count,
                    ..MessageAck::default()
                })
            }
        ),
        (any::<u32>(), name()).prop_map(|(id, text)| {
            Command::from(Response::exception(id, BrokerError::new("java.lang.Exception", text)))
        }),
    ];
    (body, any::<u32>(), any::<bool>()).prop_map(|(mut command, id, required)| {
        command.set_command_id(id);
        command.set_response_required(required);
        command
    })
}

proptest! {
    #[test]
    fn commands_survive_every_encoding(
        commands in proptest::collection::vec(command(), 1..6),
        version in 1u32..=6,
        tight in any::<bool>(),
        cache in any::<bool>(),
    ) {
        let factory = factory();
        let format = format(&factory, version, tight, cache);
        let mut out_cache = MarshalCache::new(format.config().cache_size);
        let mut in_cache = UnmarshalCache::new();
        // One cache pair per stream: later frames may refer back to earlier ones.
        for command in &commands {
            let mut buf = BytesMut::new();
            format.marshal(command, &mut out_cache, &mut buf).expect("marshal");
            let decoded = format.unmarshal(&buf, &mut in_cache).expect("unmarshal");
            prop_assert_eq!(&decoded, command);
        }
    }
}

#[rstest]
fn cached_references_shrink_repeated_frames(factory: Arc<MarshallerFactory>) {
    let format = format(&factory, 6, true, true);
    let session = SessionId::new(&ConnectionId::new("ID:cache"), 1);
    let info = Command::from(ProducerInfo {
        destination: Some(Destination::queue("a.rather.long.destination.name")),
        ..ProducerInfo::new(ProducerId::new(&session, 1))
    });
    let mut out_cache = MarshalCache::new(16);
    let mut in_cache = UnmarshalCache::new();
    let mut first = BytesMut::new();
    format.marshal(&info, &mut out_cache, &mut first).expect("marshal");
    let mut second = BytesMut::new();
    format.marshal(&info, &mut out_cache, &mut second).expect("marshal");
    assert!(second.len() < first.len());
    assert_eq!(format.unmarshal(&first, &mut in_cache).expect("first"), info);
    assert_eq!(format.unmarshal(&second, &mut in_cache).expect("second"), info);
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(5)]
fn version_gated_fields_are_dropped_on_older_versions(
    factory: Arc<MarshallerFactory>,
    #[case] version: u32,
) {
    let format = format(&factory, version, false, false);
    let mut info = ProducerInfo::new(ProducerId::new(
        &SessionId::new(&ConnectionId::new("ID:v"), 1),
        1,
    ));
    info.dispatch_async = true;
    info.window_size = 4096;
    let mut buf = BytesMut::new();
    format
        .marshal(&info.clone().into(), &mut MarshalCache::new(8), &mut buf)
        .expect("marshal");
    let Command::ProducerInfo(decoded) = format
        .unmarshal(&buf, &mut UnmarshalCache::new())
        .expect("unmarshal")
    else {
        panic!("expected ProducerInfo");
    };
    assert_eq!(decoded.dispatch_async, version >= 2);
    assert_eq!(decoded.window_size, if version >= 3 { 4096 } else { 0 });
}

#[rstest]
#[tokio::test]
async fn frames_flow_through_a_stream(factory: Arc<MarshallerFactory>) {
    let state = Arc::new(WireFormatState::new(format(&factory, 6, true, true)));
    let codec = OpenWireCodec::new(state);
    let (client, server) = tokio::io::duplex(4096);
    let mut writer = FramedWrite::new(client, codec.encoder());
    let mut reader = FramedRead::new(server, codec.decoder());

    let message = Command::from(Message {
        content: Some(Bytes::from_static(b"payload")),
        ..Message::new(MessageKind::Bytes, Destination::queue("q"))
    });
    writer.send(Frame::Empty).await.expect("send empty");
    writer.send(message.clone()).await.expect("send message");
    drop(writer);

    assert_eq!(reader.next().await.expect("frame").expect("decode"), Frame::Empty);
    assert_eq!(
        reader.next().await.expect("frame").expect("decode"),
        Frame::Command(message)
    );
    assert!(reader.next().await.is_none());
}
