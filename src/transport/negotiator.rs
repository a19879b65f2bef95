//! Wire format handshake filter.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::sync::watch;

use super::{
    Transport,
    TransportError,
    TransportListener,
    filter::{Lifecycle, TransportFilter, forward_filter_accessors, wrap},
};
use crate::{
    commands::{Command, WireFormatInfo},
    wire_format::{WireFormatConfig, WireFormatState},
};

/// Default wait for the peer's handshake.
pub const DEFAULT_NEGOTIATE_TIMEOUT: Duration = Duration::from_millis(15_000);

/// Progress of the handshake.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NegotiationStatus {
    Pending,
    Complete,
    Failed(String),
}

/// Sends the local [`WireFormatInfo`] on start and installs the agreed
/// format when the peer's arrives.
///
/// Outbound commands other than the handshake are held until negotiation
/// completes, for at most the negotiate timeout.
pub struct WireFormatNegotiator {
    filter: TransportFilter,
    state: Arc<WireFormatState>,
    negotiate_timeout: Duration,
    status: watch::Sender<NegotiationStatus>,
}

impl WireFormatNegotiator {
    #[must_use]
    pub fn new(next: Arc<dyn Transport>, state: Arc<WireFormatState>) -> Arc<Self> {
        Self::with_timeout(next, state, DEFAULT_NEGOTIATE_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(
        next: Arc<dyn Transport>,
        state: Arc<WireFormatState>,
        negotiate_timeout: Duration,
    ) -> Arc<Self> {
        wrap(&next, |_| Self {
            filter: TransportFilter::new(Arc::clone(&next)),
            state,
            negotiate_timeout,
            status: watch::Sender::new(NegotiationStatus::Pending),
        })
    }

    #[must_use]
    pub fn status(&self) -> NegotiationStatus { self.status.borrow().clone() }

    #[must_use]
    pub fn is_negotiated(&self) -> bool { *self.status.borrow() == NegotiationStatus::Complete }

    /// Settings in force: the local preferences before the handshake, the
    /// agreed ones after.
    #[must_use]
    pub fn wire_format(&self) -> WireFormatConfig { *self.state.current().0.config() }

    /// Waits until the handshake has completed.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Negotiation`] if the handshake failed or did
    /// not finish within the negotiate timeout.
    pub async fn wait_for_negotiation(&self) -> Result<(), TransportError> {
        let mut status = self.status.subscribe();
        let waited = tokio::time::timeout(
            self.negotiate_timeout,
            status.wait_for(|s| *s != NegotiationStatus::Pending),
        )
        .await;
        let outcome = match waited {
            Err(_) => {
                return Err(TransportError::Negotiation(format!(
                    "no WireFormatInfo received within {:?}",
                    self.negotiate_timeout
                )));
            }
            Ok(Err(_)) => return Err(TransportError::Closed),
            Ok(Ok(current)) => current.clone(),
        };
        match outcome {
            NegotiationStatus::Failed(reason) => Err(TransportError::Negotiation(reason)),
            _ => Ok(()),
        }
    }

    fn fail_pending(&self, reason: &str) {
        self.status.send_if_modified(|status| {
            if *status == NegotiationStatus::Pending {
                *status = NegotiationStatus::Failed(reason.to_owned());
                true
            } else {
                false
            }
        });
    }

    fn negotiate(&self, peer: &WireFormatInfo) -> Result<(), TransportError> {
        let (current, _) = self.state.current();
        let agreed = current
            .renegotiate(peer)
            .map_err(|err| TransportError::Negotiation(err.to_string()))?;
        let config = agreed.config();
        tracing::debug!(
            version = config.version,
            tight_encoding = config.tight_encoding_enabled,
            cache_enabled = config.cache_enabled,
            max_inactivity_ms = config.max_inactivity_duration.as_millis(),
            "wire format negotiated"
        );
        self.state.replace(agreed);
        self.status.send_replace(NegotiationStatus::Complete);
        Ok(())
    }
}

#[async_trait]
impl Transport for WireFormatNegotiator {
    async fn oneway(&self, command: Command) -> Result<(), TransportError> {
        self.filter.ensure_open()?;
        if !command.is_wire_format_info() {
            self.wait_for_negotiation().await?;
        }
        self.filter.next().oneway(command).await
    }

    async fn start(&self) -> Result<(), TransportError> {
        let first = self.filter.lifecycle() == Lifecycle::Created;
        self.filter.start().await?;
        if first {
            let info = self.state.current().0.preferred_info();
            tracing::debug!(version = info.version, "sending WireFormatInfo");
            self.filter.next().oneway(info.into()).await?;
        }
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> { self.filter.stop().await }

    async fn close(&self) -> Result<(), TransportError> {
        self.fail_pending("transport closed before negotiation completed");
        self.filter.close().await
    }

    forward_filter_accessors!();
}

impl TransportListener for WireFormatNegotiator {
    fn on_command(&self, command: Command) {
        if let Command::WireFormatInfo(info) = &command {
            if let Err(error) = self.negotiate(info) {
                log::warn!("{error}");
                self.fail_pending(&error.to_string());
                self.filter.listener().fire_exception(&error);
                return;
            }
        }
        self.filter.listener().fire_command(command);
    }

    fn on_exception(&self, error: &TransportError) {
        self.fail_pending(&error.to_string());
        self.filter.listener().fire_exception(error);
    }

    fn transport_interrupted(&self) { self.filter.listener().fire_interrupted(); }

    fn transport_resumed(&self) { self.filter.listener().fire_resumed(); }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use futures::{SinkExt, StreamExt};
    use tokio_util::codec::{FramedRead, FramedWrite};
    use tracing_test::traced_test;

    use super::*;
    use crate::{
        codec::{Frame, OpenWireCodec},
        commands::KeepAliveInfo,
        marshal::MarshallerFactory,
        transport::IoTransport,
        wire_format::{OpenWireFormat, WireFormatConfig},
    };

    #[derive(Default)]
    struct Errors(Mutex<Vec<String>>);

    impl TransportListener for Errors {
        fn on_command(&self, _command: Command) {}

        fn on_exception(&self, error: &TransportError) {
            self.0.lock().expect("errors").push(error.to_string());
        }
    }

    fn state(config: WireFormatConfig) -> Arc<WireFormatState> {
        let factory = Arc::new(MarshallerFactory::new().expect("factory"));
        Arc::new(WireFormatState::new(
            OpenWireFormat::new(config, factory).expect("format"),
        ))
    }

    #[traced_test]
    #[tokio::test]
    async fn handshake_installs_the_agreed_format() {
        let (client, server) = tokio::io::duplex(4096);
        let client_state = state(WireFormatConfig::default().with_tight_encoding(true));
        let io = IoTransport::new(client, &OpenWireCodec::new(Arc::clone(&client_state)));
        let negotiator = WireFormatNegotiator::new(io, Arc::clone(&client_state));
        negotiator.set_transport_listener(Arc::new(Errors::default()));
        negotiator.start().await.expect("start");

        let server_codec = OpenWireCodec::new(state(WireFormatConfig::default().with_version(4)));
        let (read_half, write_half) = tokio::io::split(server);
        let mut server_in = FramedRead::new(read_half, server_codec.decoder());
        let mut server_out = FramedWrite::new(write_half, server_codec.encoder());

        let Some(Ok(Frame::Command(Command::WireFormatInfo(advertised)))) = server_in.next().await
        else {
            panic!("expected the client's WireFormatInfo");
        };
        assert!(advertised.tight_encoding_enabled());
        assert!(!negotiator.is_negotiated());

        let reply = WireFormatConfig::default().with_version(4).to_info();
        server_out.send(Command::from(reply)).await.expect("reply");
        negotiator.wait_for_negotiation().await.expect("negotiated");

        let agreed = negotiator.wire_format();
        assert_eq!(agreed.version, 4);
        assert!(!agreed.tight_encoding_enabled);
        assert_eq!(client_state.generation(), 1);
        assert!(logs_contain("wire format negotiated"));
        negotiator.close().await.expect("close");
    }

    #[tokio::test]
    async fn close_releases_waiting_senders() {
        let (client, _server) = tokio::io::duplex(4096);
        let shared = state(WireFormatConfig::default());
        let io = IoTransport::new(client, &OpenWireCodec::new(Arc::clone(&shared)));
        let negotiator = WireFormatNegotiator::new(io, shared);
        negotiator.set_transport_listener(Arc::new(Errors::default()));
        negotiator.start().await.expect("start");

        let waiting = {
            let negotiator = Arc::clone(&negotiator);
            tokio::spawn(async move { negotiator.oneway(KeepAliveInfo::default().into()).await })
        };
        tokio::task::yield_now().await;
        negotiator.close().await.expect("close");
        let result = waiting.await.expect("task");
        assert!(matches!(
            result,
            Err(TransportError::Negotiation(_) | TransportError::Closed)
        ));
    }
}
