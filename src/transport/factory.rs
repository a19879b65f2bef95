//! Assembles transport chains.

use std::{future::Future, io, sync::Arc, time::Duration};

use tokio::net::TcpStream;

use super::{
    InactivityMonitor,
    IoTransport,
    LoggingTransport,
    ResponseCorrelator,
    Transport,
    TransportConfig,
    TransportError,
    WireFormatNegotiator,
    io::IoStream,
};
use crate::{
    codec::{CodecError, OpenWireCodec},
    marshal::MarshallerFactory,
    wire_format::{OpenWireFormat, WireFormatState},
};

/// Builds the standard chain over TCP or any byte stream.
///
/// The factory owns the marshaller registries; every chain it builds shares
/// them.
#[derive(Clone, Debug)]
pub struct TransportFactory {
    marshallers: Arc<MarshallerFactory>,
}

impl TransportFactory {
    /// # Errors
    ///
    /// Returns [`TransportError::Codec`] if the built-in registries are
    /// inconsistent.
    pub fn new() -> Result<Self, TransportError> {
        let marshallers = MarshallerFactory::new().map_err(CodecError::from)?;
        Ok(Self::with_marshallers(Arc::new(marshallers)))
    }

    #[must_use]
    pub fn with_marshallers(marshallers: Arc<MarshallerFactory>) -> Self { Self { marshallers } }

    #[must_use]
    pub fn marshallers(&self) -> &Arc<MarshallerFactory> { &self.marshallers }

    /// Connects to the broker named by `uri` and builds the chain. The
    /// chain is not started.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Config`] for a bad URI,
    /// [`TransportError::Io`] if the connection fails, with
    /// [`io::ErrorKind::TimedOut`] if it does not complete within the
    /// configured connect timeout.
    pub async fn connect(&self, uri: &str) -> Result<Arc<ResponseCorrelator>, TransportError> {
        let config = TransportConfig::from_uri(uri)?;
        self.connect_with(&config).await
    }

    /// As [`connect`](Self::connect) with explicit settings.
    ///
    /// # Errors
    ///
    /// As [`connect`](Self::connect).
    pub async fn connect_with(
        &self,
        config: &TransportConfig,
    ) -> Result<Arc<ResponseCorrelator>, TransportError> {
        let address = config.address();
        let stream = connect_within(config.connect_timeout, TcpStream::connect(&address)).await?;
        stream.set_nodelay(config.tcp_no_delay)?;
        tracing::debug!(%address, "connected");
        self.compose(stream, config)
    }

    /// Builds the chain over an established stream:
    ///
    /// ```text
    /// IoTransport -> [LoggingTransport] -> WireFormatNegotiator
    ///             -> [InactivityMonitor] -> ResponseCorrelator
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Codec`] if the configured version has no
    /// registry.
    pub fn compose<S>(
        &self,
        stream: S,
        config: &TransportConfig,
    ) -> Result<Arc<ResponseCorrelator>, TransportError>
    where
        S: IoStream + Unpin,
    {
        let format = OpenWireFormat::new(config.wire_format, Arc::clone(&self.marshallers))
            .map_err(CodecError::from)?;
        let state = Arc::new(WireFormatState::new(format));
        let codec = OpenWireCodec::new(Arc::clone(&state));

        let mut chain: Arc<dyn Transport> = IoTransport::new(stream, &codec);
        if config.command_tracing {
            chain = LoggingTransport::new(chain);
        }
        chain = WireFormatNegotiator::with_timeout(
            chain,
            Arc::clone(&state),
            config.negotiate_timeout,
        );
        if config.use_inactivity_monitor {
            chain = InactivityMonitor::new(chain, state);
        }
        Ok(ResponseCorrelator::with_timeout(chain, config.request_timeout))
    }
}

/// Awaits `connect`, giving up after `limit` if one is set.
async fn connect_within<T>(
    limit: Option<Duration>,
    connect: impl Future<Output = io::Result<T>>,
) -> io::Result<T> {
    let Some(limit) = limit else {
        return connect.await;
    };
    tokio::time::timeout(limit, connect).await.unwrap_or_else(|_| {
        Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("connection not established within {limit:?}"),
        ))
    })
}
