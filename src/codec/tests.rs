//! Unit tests for the OpenWire frame codec.
//!
//! Covers framing, keep-alive frames, size limits, EOF handling and the
//! switch to negotiated settings.

use std::io;

use bytes::{BufMut, BytesMut};
use rstest::{fixture, rstest};
use tokio_util::codec::{Decoder, Encoder};

use super::*;
use crate::{
    commands::{Destination, KeepAliveInfo, ProducerId, ProducerInfo, SessionId, ConnectionId},
    marshal::MarshallerFactory,
    wire_format::WireFormatConfig,
};

fn codec_with(config: WireFormatConfig) -> OpenWireCodec {
    let factory = Arc::new(MarshallerFactory::new().expect("factory"));
    let format = OpenWireFormat::new(config, factory).expect("format");
    OpenWireCodec::new(Arc::new(WireFormatState::new(format)))
}

#[fixture]
fn codec() -> OpenWireCodec { codec_with(WireFormatConfig::default()) }

fn producer_info() -> Command {
    let session = SessionId::new(&ConnectionId::new("ID:test"), 1);
    let mut info = ProducerInfo::new(ProducerId::new(&session, 1));
    info.destination = Some(Destination::queue("q"));
    info.into()
}

#[rstest]
fn command_round_trips_through_frames(codec: OpenWireCodec) {
    let mut encoder = codec.encoder();
    let mut decoder = codec.decoder();
    let mut buf = BytesMut::new();

    encoder
        .encode(producer_info(), &mut buf)
        .expect("encode should succeed");
    let size = usize::try_from(i32::from_be_bytes(buf[..4].try_into().expect("prefix")))
        .expect("positive size");
    assert_eq!(size + LENGTH_HEADER_SIZE, buf.len());

    let frame = decoder
        .decode(&mut buf)
        .expect("decode should succeed")
        .expect("expected a frame");
    assert_eq!(frame, Frame::Command(producer_info()));
    assert!(buf.is_empty());
}

#[rstest]
fn partial_frames_wait_for_more_bytes(codec: OpenWireCodec) {
    let mut encoder = codec.encoder();
    let mut decoder = codec.decoder();
    let mut full = BytesMut::new();
    encoder
        .encode(Command::from(KeepAliveInfo::default()), &mut full)
        .expect("encode");

    let mut buf = BytesMut::from(&full[..full.len() - 1]);
    assert!(decoder.decode(&mut buf).expect("no error").is_none());
    buf.put_slice(&full[full.len() - 1..]);
    assert!(decoder.decode(&mut buf).expect("no error").is_some());
}

#[rstest]
fn zero_length_frame_is_a_keep_alive(codec: OpenWireCodec) {
    let mut encoder = codec.encoder();
    let mut decoder = codec.decoder();
    let mut buf = BytesMut::new();
    encoder.encode(Frame::Empty, &mut buf).expect("encode");
    assert_eq!(&buf[..], &[0, 0, 0, 0]);
    assert_eq!(decoder.decode(&mut buf).expect("decode"), Some(Frame::Empty));
}

#[rstest]
#[case::negative(-1)]
#[case::oversized(1_000)]
fn bad_size_prefixes_are_framing_errors(#[case] size: i32) {
    let codec = codec_with(WireFormatConfig::default().with_max_frame_size(512));
    let mut decoder = codec.decoder();
    let mut buf = BytesMut::new();
    buf.put_i32(size);

    let err = decoder.decode(&mut buf).expect_err("framing error");
    assert!(matches!(err, CodecError::Framing(_)), "got {err:?}");
    assert!(err.should_disconnect());
}

#[test]
fn oversized_commands_are_not_written() {
    let codec = codec_with(WireFormatConfig::default().with_max_frame_size(8));
    let mut encoder = codec.encoder();
    let mut buf = BytesMut::new();

    let err = encoder.encode(producer_info(), &mut buf).expect_err("too big");
    assert!(matches!(err, CodecError::Framing(FramingError::OversizedFrame { max: 8, .. })));
    assert!(buf.is_empty());
}

#[rstest]
fn decode_eof_with_empty_buffer_returns_none(codec: OpenWireCodec) {
    let mut decoder = codec.decoder();
    let mut buf = BytesMut::new();

    let result = decoder.decode_eof(&mut buf);
    assert!(
        matches!(result, Ok(None)),
        "clean close should return Ok(None), got {result:?}"
    );
}

#[rstest]
#[case::partial_header(&[0x00, 0x10], "header")]
#[case::partial_payload(&[0x00, 0x00, 0x00, 0x10, 0x01, 0x02, 0x03, 0x04], "16")]
fn decode_eof_error_cases(
    codec: OpenWireCodec,
    #[case] initial_buffer: &[u8],
    #[case] expected_substring: &str,
) {
    let mut decoder = codec.decoder();
    let mut buf = BytesMut::from(initial_buffer);

    let err = decoder.decode_eof(&mut buf).expect_err("expected error");
    assert!(matches!(err, CodecError::Eof(_)));
    assert!(
        err.to_string().contains(expected_substring),
        "error message should contain '{expected_substring}', got: {err}"
    );
    assert_eq!(io::Error::from(err).kind(), io::ErrorKind::UnexpectedEof);
}

#[rstest]
fn replacing_the_format_switches_both_halves(codec: OpenWireCodec) {
    let mut encoder = codec.encoder();
    let mut decoder = codec.decoder();
    let (current, _) = codec.state().current();
    let peer = WireFormatConfig::default().with_tight_encoding(true);
    let mut preferred = *current.config();
    preferred.tight_encoding_enabled = true;
    let tight = OpenWireFormat::new(preferred, Arc::new(MarshallerFactory::new().expect("f")))
        .expect("format")
        .renegotiate(&peer.to_info())
        .expect("renegotiate");
    codec.state().replace(tight);

    let mut buf = BytesMut::new();
    encoder.encode(producer_info(), &mut buf).expect("encode");
    let frame = decoder.decode(&mut buf).expect("decode").expect("frame");
    assert_eq!(frame, Frame::Command(producer_info()));
    assert!(codec.state().current().0.config().tight_encoding_enabled);
}
