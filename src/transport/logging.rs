//! Command tracing filter.

use std::sync::Arc;

use async_trait::async_trait;

use super::{
    Transport,
    TransportError,
    TransportListener,
    filter::{TransportFilter, forward_filter_accessors, wrap},
};
use crate::commands::Command;

/// Logs every command passing through the chain at debug level.
///
/// Enabled with `transport.commandTracingEnabled=true`. Sent commands are
/// tagged `SEND`, received ones `RECV`.
pub struct LoggingTransport {
    filter: TransportFilter,
}

impl LoggingTransport {
    #[must_use]
    pub fn new(next: Arc<dyn Transport>) -> Arc<Self> {
        wrap(&next, |_| Self {
            filter: TransportFilter::new(Arc::clone(&next)),
        })
    }
}

#[async_trait]
impl Transport for LoggingTransport {
    async fn oneway(&self, command: Command) -> Result<(), TransportError> {
        tracing::debug!(
            command_id = command.command_id(),
            response_required = command.is_response_required(),
            "SEND: {command:?}"
        );
        self.filter.next().oneway(command).await
    }

    async fn start(&self) -> Result<(), TransportError> { self.filter.start().await }

    async fn stop(&self) -> Result<(), TransportError> { self.filter.stop().await }

    async fn close(&self) -> Result<(), TransportError> { self.filter.close().await }

    forward_filter_accessors!();
}

impl TransportListener for LoggingTransport {
    fn on_command(&self, command: Command) {
        tracing::debug!(command_id = command.command_id(), "RECV: {command:?}");
        self.filter.listener().fire_command(command);
    }

    fn on_exception(&self, error: &TransportError) {
        tracing::debug!("RECV exception: {error}");
        self.filter.listener().fire_exception(error);
    }

    fn transport_interrupted(&self) { self.filter.listener().fire_interrupted(); }

    fn transport_resumed(&self) { self.filter.listener().fire_resumed(); }
}
