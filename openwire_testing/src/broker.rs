//! The broker end of an in-memory connection.

use std::{sync::Arc, time::Duration};

use futures::{SinkExt, StreamExt};
use openwire::{
    Command,
    Frame,
    MarshallerFactory,
    OpenWireCodec,
    OpenWireFormat,
    WireFormatConfig,
    WireFormatState,
    codec::{OpenWireDecoder, OpenWireEncoder},
    commands::{Response, WireFormatInfo},
};
use tokio::io::{DuplexStream, ReadHalf, WriteHalf};
use tokio_util::codec::{FramedRead, FramedWrite};

const BUFFER: usize = 64 * 1024;

/// Reads and writes OpenWire frames as a broker would.
///
/// Methods panic on protocol failures so tests fail at the offending step.
pub struct ScriptedBroker {
    state: Arc<WireFormatState>,
    reader: FramedRead<ReadHalf<DuplexStream>, OpenWireDecoder>,
    writer: FramedWrite<WriteHalf<DuplexStream>, OpenWireEncoder>,
}

impl ScriptedBroker {
    /// Returns the client end of a duplex stream and a broker advertising
    /// `config` on the other end.
    #[must_use]
    pub fn pair(config: WireFormatConfig) -> (DuplexStream, Self) {
        let (client, server) = tokio::io::duplex(BUFFER);
        let factory = Arc::new(MarshallerFactory::new().expect("marshaller factory"));
        let format = OpenWireFormat::new(config, factory).expect("broker wire format");
        let state = Arc::new(WireFormatState::new(format));
        let codec = OpenWireCodec::new(Arc::clone(&state));
        let (read_half, write_half) = tokio::io::split(server);
        let broker = Self {
            reader: FramedRead::new(read_half, codec.decoder()),
            writer: FramedWrite::new(write_half, codec.encoder()),
            state,
        };
        (client, broker)
    }

    /// Settings the broker is currently using.
    #[must_use]
    pub fn wire_format(&self) -> WireFormatConfig { *self.state.current().0.config() }

    /// Receives the client's handshake, answers with the broker's own and
    /// switches to the agreed format. Returns the client's handshake.
    pub async fn handshake(&mut self) -> WireFormatInfo {
        let Command::WireFormatInfo(client) = self.recv().await else {
            panic!("expected WireFormatInfo as the first frame");
        };
        let (format, _) = self.state.current();
        self.send(format.preferred_info()).await;
        let agreed = format.renegotiate(&client).expect("negotiate");
        self.state.replace(agreed);
        client
    }

    /// Next frame, or `None` once the client hangs up.
    pub async fn recv_frame(&mut self) -> Option<Frame> {
        self.reader
            .next()
            .await
            .map(|frame| frame.expect("client sent a malformed frame"))
    }

    /// Next command, skipping empty frames.
    pub async fn recv(&mut self) -> Command {
        loop {
            match self.recv_frame().await.expect("client closed the connection") {
                Frame::Command(command) => return command,
                Frame::Empty => {}
            }
        }
    }

    /// Next command if one arrives within `wait`.
    pub async fn try_recv(&mut self, wait: Duration) -> Option<Command> {
        tokio::time::timeout(wait, self.recv()).await.ok()
    }

    pub async fn send(&mut self, command: impl Into<Command>) {
        self.writer
            .send(command.into())
            .await
            .expect("send to client");
    }

    /// Writes a zero-length frame.
    pub async fn send_empty(&mut self) {
        self.writer.send(Frame::Empty).await.expect("send empty frame");
    }

    /// Writes raw bytes, bypassing the encoder.
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        use tokio::io::AsyncWriteExt;
        self.writer
            .get_mut()
            .write_all(bytes)
            .await
            .expect("write raw bytes");
    }

    /// Acknowledges `request`.
    pub async fn respond(&mut self, request: &Command) {
        self.send(Response::ack(request.command_id())).await;
    }

    /// Drops both halves, closing the connection.
    pub fn hang_up(self) { drop(self); }
}
