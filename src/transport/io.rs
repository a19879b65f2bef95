//! The base transport: OpenWire frames over a byte stream.

use std::{
    any::Any,
    sync::{
        Arc,
        Mutex as StdMutex,
        PoisonError,
        Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::{
    io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf},
    sync::Mutex,
};
use tokio_util::{
    codec::{FramedRead, FramedWrite},
    sync::CancellationToken,
    task::TaskTracker,
};

use super::{
    Transport,
    TransportError,
    TransportListener,
    filter::{Lifecycle, LifecycleCell, ListenerSlot},
};
use crate::{
    codec::{CodecError, Frame, OpenWireCodec, OpenWireDecoder, OpenWireEncoder},
    commands::Command,
    metrics::{self, Direction},
};

/// Any stream a transport can run over.
pub trait IoStream: AsyncRead + AsyncWrite + Send + 'static {}
impl<T> IoStream for T where T: AsyncRead + AsyncWrite + Send + 'static {}

type BoxedStream = Box<dyn IoStream + Unpin>;
type Reader = FramedRead<ReadHalf<BoxedStream>, OpenWireDecoder>;
type Writer = FramedWrite<WriteHalf<BoxedStream>, OpenWireEncoder>;

/// Reads frames on a background task and writes them under a lock.
///
/// The reader task owns the decoder and its inbound cache; the writer owns
/// the encoder and its outbound cache. Failures of the stream are reported
/// through [`TransportListener::on_exception`] and flip
/// [`is_connected`](Transport::is_connected).
pub struct IoTransport {
    this: Weak<Self>,
    lifecycle: LifecycleCell,
    listener: ListenerSlot,
    reader: StdMutex<Option<Reader>>,
    writer: Mutex<Option<Writer>>,
    connected: AtomicBool,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl IoTransport {
    /// Wraps `stream`, encoding and decoding with `codec`.
    #[must_use]
    pub fn new<S>(stream: S, codec: &OpenWireCodec) -> Arc<Self>
    where
        S: IoStream + Unpin,
    {
        let boxed: BoxedStream = Box::new(stream);
        let (read_half, write_half) = tokio::io::split(boxed);
        let reader = FramedRead::new(read_half, codec.decoder());
        let writer = FramedWrite::new(write_half, codec.encoder());
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            lifecycle: LifecycleCell::default(),
            listener: ListenerSlot::default(),
            reader: StdMutex::new(Some(reader)),
            writer: Mutex::new(Some(writer)),
            connected: AtomicBool::new(true),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    /// Writes a zero-length frame.
    ///
    /// # Errors
    ///
    /// As [`Transport::oneway`].
    pub async fn send_empty_frame(&self) -> Result<(), TransportError> {
        self.write(Frame::Empty).await
    }

    async fn write(&self, frame: Frame) -> Result<(), TransportError> {
        self.lifecycle.ensure_open()?;
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(TransportError::Closed)?;
        match writer.send(frame).await {
            Ok(()) => {
                metrics::inc_frames(Direction::Outbound);
                Ok(())
            }
            Err(err) => {
                metrics::inc_errors(err.error_type());
                if matches!(err, CodecError::Io(_)) {
                    self.connected.store(false, Ordering::Release);
                }
                Err(err.into())
            }
        }
    }

    async fn read_loop(self: Arc<Self>, mut reader: Reader) {
        loop {
            let next = tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                next = reader.next() => next,
            };
            match next {
                Some(Ok(Frame::Command(command))) => {
                    metrics::inc_frames(Direction::Inbound);
                    tracing::trace!(command = command.name(), id = command.command_id(), "received");
                    self.listener.fire_command(command);
                }
                Some(Ok(Frame::Empty)) => {
                    metrics::inc_frames(Direction::Inbound);
                    tracing::trace!("received empty frame");
                }
                Some(Err(err)) => {
                    metrics::inc_errors(err.error_type());
                    tracing::warn!(error = %err, kind = err.error_type(), "failed to read frame");
                    self.fail(TransportError::Codec(err));
                    break;
                }
                None => {
                    tracing::debug!("peer closed the connection");
                    self.fail(TransportError::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "peer closed the connection",
                    )));
                    break;
                }
            }
        }
    }

    fn fail(&self, error: TransportError) {
        self.connected.store(false, Ordering::Release);
        if matches!(self.lifecycle.get(), Lifecycle::Running) {
            log::warn!("transport failed: {error}");
            self.listener.fire_exception(&error);
        }
    }

    async fn shutdown(&self) {
        self.shutdown.cancel();
        self.tracker.close();
        self.connected.store(false, Ordering::Release);
        if let Some(mut writer) = self.writer.lock().await.take()
            && let Err(err) = SinkExt::<Frame>::close(&mut writer).await
        {
            tracing::debug!(error = %err, "error closing stream");
        }
    }
}

#[async_trait]
impl Transport for IoTransport {
    async fn oneway(&self, command: Command) -> Result<(), TransportError> {
        if self.lifecycle.get() != Lifecycle::Running {
            self.lifecycle.ensure_open()?;
            return Err(TransportError::NotStarted);
        }
        self.write(Frame::Command(command)).await
    }

    fn set_transport_listener(&self, listener: Arc<dyn TransportListener>) {
        self.listener.set(listener);
    }

    fn transport_listener(&self) -> Option<Arc<dyn TransportListener>> { self.listener.get() }

    async fn start(&self) -> Result<(), TransportError> {
        self.lifecycle.ensure_startable()?;
        if self.listener.get().is_none() {
            return Err(TransportError::NoListener);
        }
        let reader = self
            .reader
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let (Some(reader), Some(this)) = (reader, self.this.upgrade()) else {
            // Already started once.
            return Ok(());
        };
        self.lifecycle.advance(Lifecycle::Running);
        self.tracker.spawn(this.read_loop(reader));
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> {
        if self.lifecycle.advance(Lifecycle::Stopped) != Lifecycle::Closed {
            self.shutdown().await;
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.lifecycle.advance(Lifecycle::Closed) != Lifecycle::Closed {
            self.shutdown().await;
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.lifecycle.get() != Lifecycle::Closed && self.connected.load(Ordering::Acquire)
    }

    fn is_closed(&self) -> bool { self.lifecycle.get() == Lifecycle::Closed }

    fn next(&self) -> Option<&dyn Transport> { None }

    fn as_any(&self) -> &dyn Any { self }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        commands::KeepAliveInfo,
        marshal::MarshallerFactory,
        wire_format::{OpenWireFormat, WireFormatConfig, WireFormatState},
    };

    struct Ignore;

    impl TransportListener for Ignore {
        fn on_command(&self, _command: Command) {}

        fn on_exception(&self, _error: &TransportError) {}
    }

    fn transport() -> (Arc<IoTransport>, tokio::io::DuplexStream) {
        let factory = Arc::new(MarshallerFactory::new().expect("factory"));
        let format = OpenWireFormat::new(WireFormatConfig::default(), factory).expect("format");
        let codec = OpenWireCodec::new(Arc::new(WireFormatState::new(format)));
        let (client, server) = tokio::io::duplex(1024);
        (IoTransport::new(client, &codec), server)
    }

    #[tokio::test]
    async fn writes_need_a_started_transport() {
        let (io, _server) = transport();
        assert!(matches!(
            io.oneway(KeepAliveInfo::default().into()).await,
            Err(TransportError::NotStarted)
        ));
        assert!(matches!(io.start().await, Err(TransportError::NoListener)));
        io.set_transport_listener(Arc::new(Ignore));
        io.start().await.expect("start");
        io.oneway(KeepAliveInfo::default().into()).await.expect("oneway");
        io.send_empty_frame().await.expect("empty frame");
    }

    #[tokio::test]
    async fn close_is_terminal() {
        let (io, _server) = transport();
        io.set_transport_listener(Arc::new(Ignore));
        io.start().await.expect("start");
        io.close().await.expect("close");
        assert!(io.is_closed());
        assert!(!io.is_connected());
        assert!(matches!(
            io.oneway(KeepAliveInfo::default().into()).await,
            Err(TransportError::Closed)
        ));
        io.close().await.expect("second close");
    }

    #[tokio::test]
    async fn stopped_transports_refuse_to_restart() {
        let (io, _server) = transport();
        io.set_transport_listener(Arc::new(Ignore));
        io.start().await.expect("start");
        io.stop().await.expect("stop");
        assert!(matches!(io.start().await, Err(TransportError::Stopped)));
        assert!(matches!(
            io.oneway(KeepAliveInfo::default().into()).await,
            Err(TransportError::NotStarted)
        ));
    }
}
