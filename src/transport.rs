//! Transports: the chain that carries commands between client and broker.
//!
//! A chain starts at an [`IoTransport`] wrapping the byte stream and is
//! decorated by filters, each adding one concern. Calls travel down the
//! chain through [`Transport`]; inbound commands and failures travel up it
//! through [`TransportListener`]. The usual chain, as built by
//! [`TransportFactory`], is
//!
//! ```text
//! IoTransport -> [LoggingTransport] -> WireFormatNegotiator
//!             -> [InactivityMonitor] -> ResponseCorrelator
//! ```

use std::{any::Any, sync::Arc, time::Duration};

use async_trait::async_trait;
use url::Url;

pub mod config;
pub mod correlator;
pub mod error;
pub mod factory;
pub mod filter;
pub mod future_response;
pub mod inactivity;
pub mod io;
pub mod logging;
pub mod negotiator;

pub use config::TransportConfig;
pub use correlator::ResponseCorrelator;
pub use error::{ConfigError, TransportError};
pub use factory::TransportFactory;
pub use filter::TransportFilter;
pub use future_response::{FutureResponse, ResponseCallback};
pub use inactivity::InactivityMonitor;
pub use io::IoTransport;
pub use logging::LoggingTransport;
pub use negotiator::WireFormatNegotiator;

use crate::commands::{Command, Response};

/// Receives what a transport reads from the peer.
///
/// Callbacks run on the transport's reader task and must not block.
pub trait TransportListener: Send + Sync {
    /// A command arrived.
    fn on_command(&self, command: Command);

    /// The transport failed or the broker reported an error.
    fn on_exception(&self, error: &TransportError);

    fn transport_interrupted(&self) {}

    fn transport_resumed(&self) {}
}

/// One link of a transport chain.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Sends a command without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once the transport is closed, or
    /// the failure of the layers below.
    async fn oneway(&self, command: Command) -> Result<(), TransportError>;

    /// Sends a command and waits for its response. Only a chain with a
    /// [`ResponseCorrelator`] can answer requests.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unsupported`] when nothing in the chain
    /// correlates responses.
    async fn request(&self, command: Command) -> Result<Response, TransportError> {
        match self.next() {
            Some(next) => next.request(command).await,
            None => Err(TransportError::Unsupported("request")),
        }
    }

    /// As [`request`](Self::request), bounded by `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Timeout`] if no response arrives in time.
    async fn request_timeout(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        match self.next() {
            Some(next) => next.request_timeout(command, timeout).await,
            None => Err(TransportError::Unsupported("request")),
        }
    }

    fn set_transport_listener(&self, listener: Arc<dyn TransportListener>);

    fn transport_listener(&self) -> Option<Arc<dyn TransportListener>>;

    /// Starts the chain below and begins delivering to the listener.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoListener`] if no listener is set and
    /// [`TransportError::Stopped`] after [`stop`](Self::stop).
    async fn start(&self) -> Result<(), TransportError>;

    /// Stops delivery. A stopped transport cannot be restarted.
    ///
    /// # Errors
    ///
    /// Propagates failures from the layers below.
    async fn stop(&self) -> Result<(), TransportError>;

    /// Closes the chain. Further operations fail with
    /// [`TransportError::Closed`].
    ///
    /// # Errors
    ///
    /// Propagates failures from the layers below.
    async fn close(&self) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    fn is_closed(&self) -> bool;

    /// Reconnects to another broker.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Unsupported`] unless a link in the chain
    /// can reconnect.
    async fn reconnect(&self, uri: &Url) -> Result<(), TransportError> {
        match self.next() {
            Some(next) => next.reconnect(uri).await,
            None => Err(TransportError::Unsupported("reconnect")),
        }
    }

    /// The transport this one decorates, if any.
    fn next(&self) -> Option<&dyn Transport>;

    fn as_any(&self) -> &dyn Any;
}

impl dyn Transport {
    /// Walks the chain from `self` downwards and returns the first link of
    /// type `T`.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use openwire::transport::{InactivityMonitor, Transport, TransportFactory};
    ///
    /// # async fn example() -> Result<(), openwire::transport::TransportError> {
    /// let chain = TransportFactory::new()?.connect("tcp://localhost:61616").await?;
    /// let chain: &dyn Transport = chain.as_ref();
    /// let monitor = chain.narrow::<InactivityMonitor>();
    /// # let _ = monitor;
    /// # Ok(())
    /// # }
    /// ```
    #[must_use]
    pub fn narrow<T: Transport>(&self) -> Option<&T> {
        let mut link: Option<&dyn Transport> = Some(self);
        while let Some(current) = link {
            if let Some(found) = current.as_any().downcast_ref::<T>() {
                return Some(found);
            }
            link = current.next();
        }
        None
    }
}
