//! Request/response correlation over an asynchronous command stream.
//!
//! [`ResponseCorrelator`] numbers every outgoing command, parks requests in
//! a table keyed by command id, and completes them when a response with the
//! matching correlation id arrives. Everything that is not a response flows
//! straight through to the listener. Responses may arrive in any order.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use super::{
    Transport,
    TransportError,
    TransportListener,
    filter::{TransportFilter, forward_filter_accessors, wrap},
    future_response::{FutureResponse, PendingRequests, ResponseCallback},
};
use crate::commands::{Command, Response};

/// Default wait for a response.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(3000);

/// Filter that turns the command stream into request/response calls.
pub struct ResponseCorrelator {
    filter: TransportFilter,
    next_command_id: AtomicU32,
    pending: Arc<PendingRequests>,
    request_timeout: Duration,
}

impl ResponseCorrelator {
    /// Wraps `next`, waiting [`DEFAULT_REQUEST_TIMEOUT`] for responses.
    #[must_use]
    pub fn new(next: Arc<dyn Transport>) -> Arc<Self> {
        Self::with_timeout(next, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Wraps `next`, waiting `request_timeout` for responses to
    /// [`Transport::request`].
    #[must_use]
    pub fn with_timeout(next: Arc<dyn Transport>, request_timeout: Duration) -> Arc<Self> {
        wrap(&next, |_| Self {
            filter: TransportFilter::new(Arc::clone(&next)),
            next_command_id: AtomicU32::new(1),
            pending: Arc::new(PendingRequests::default()),
            request_timeout,
        })
    }

    /// Issues the next command id.
    fn next_id(&self) -> u32 { self.next_command_id.fetch_add(1, Ordering::Relaxed) }

    /// Wait applied by [`Transport::request`].
    #[must_use]
    pub fn default_request_timeout(&self) -> Duration { self.request_timeout }

    /// Number of requests waiting for a response.
    #[must_use]
    pub fn pending_requests(&self) -> usize { self.pending.len() }

    /// Returns `true` if a request with `command_id` is waiting.
    #[must_use]
    pub fn is_pending(&self, command_id: u32) -> bool { self.pending.contains(command_id) }

    /// Sends `command` as a request and returns a handle to its response
    /// without waiting. `callback`, if given, runs on the reader task when
    /// the response arrives.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once closed, or the send failure;
    /// the request is withdrawn in both cases.
    pub async fn async_request(
        &self,
        mut command: Command,
        callback: Option<ResponseCallback>,
    ) -> Result<FutureResponse, TransportError> {
        self.filter.ensure_open()?;
        let command_id = self.next_id();
        command.set_command_id(command_id);
        command.set_response_required(true);
        let future = self.pending.register(command_id, callback);
        tracing::trace!(command_id, command = command.name(), "sending request");
        self.filter.next().oneway(command).await?;
        Ok(future)
    }
}

#[async_trait]
impl Transport for ResponseCorrelator {
    async fn oneway(&self, mut command: Command) -> Result<(), TransportError> {
        self.filter.ensure_open()?;
        command.set_command_id(self.next_id());
        command.set_response_required(false);
        self.filter.next().oneway(command).await
    }

    async fn request(&self, command: Command) -> Result<Response, TransportError> {
        Transport::request_timeout(self, command, self.request_timeout).await
    }

    async fn request_timeout(
        &self,
        command: Command,
        timeout: Duration,
    ) -> Result<Response, TransportError> {
        let future = self.async_request(command, None).await?;
        future.wait_timeout(timeout).await
    }

    async fn start(&self) -> Result<(), TransportError> { self.filter.start().await }

    async fn stop(&self) -> Result<(), TransportError> { self.filter.stop().await }

    /// Closes the chain. Waiting requests are left to time out.
    async fn close(&self) -> Result<(), TransportError> { self.filter.close().await }

    forward_filter_accessors!();
}

impl TransportListener for ResponseCorrelator {
    fn on_command(&self, command: Command) {
        let Command::Response(response) = command else {
            self.filter.listener().fire_command(command);
            return;
        };
        if response.is_exception() {
            // A null throwable still reports as an exception.
            let error = response.error().cloned().unwrap_or_default();
            tracing::warn!(
                correlation_id = response.correlation_id,
                %error,
                "broker returned an exception"
            );
            if self.pending.contains(response.correlation_id) {
                self.filter
                    .listener()
                    .fire_exception(&TransportError::Remote(error));
            }
        }
        if let Err(unmatched) = self.pending.fulfil(response) {
            tracing::debug!(
                correlation_id = unmatched.correlation_id,
                "dropping response with no pending request"
            );
        }
    }

    fn on_exception(&self, error: &TransportError) { self.filter.listener().fire_exception(error); }

    fn transport_interrupted(&self) { self.filter.listener().fire_interrupted(); }

    fn transport_resumed(&self) { self.filter.listener().fire_resumed(); }
}
