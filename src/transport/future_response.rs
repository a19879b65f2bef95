//! Pending request bookkeeping shared by the correlator and its futures.

use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use tokio::sync::oneshot;

use super::TransportError;
use crate::{commands::Response, metrics};

/// Invoked with the response before the waiter is woken.
pub type ResponseCallback = Box<dyn FnOnce(&Response) + Send + Sync>;

struct ResponseSlot {
    sender: oneshot::Sender<Response>,
    callback: Option<ResponseCallback>,
}

/// In-flight requests keyed by command id. At most one entry exists per id.
#[derive(Default)]
pub(crate) struct PendingRequests(DashMap<u32, ResponseSlot>);

impl PendingRequests {
    /// Registers `command_id` and returns the receiving end of its slot.
    pub(crate) fn register(
        self: &Arc<Self>,
        command_id: u32,
        callback: Option<ResponseCallback>,
    ) -> FutureResponse {
        let (sender, receiver) = oneshot::channel();
        let previous = self.0.insert(command_id, ResponseSlot { sender, callback });
        if previous.is_none() {
            metrics::inc_pending_requests();
        }
        FutureResponse {
            command_id,
            receiver: Some(receiver),
            pending: Arc::clone(self),
        }
    }

    /// Delivers `response` to the waiter registered under its correlation
    /// id. Returns the response back if nobody is waiting.
    pub(crate) fn fulfil(&self, response: Response) -> Result<(), Response> {
        let Some((_, slot)) = self.0.remove(&response.correlation_id) else {
            return Err(response);
        };
        metrics::dec_pending_requests();
        if let Some(callback) = slot.callback {
            callback(&response);
        }
        // A waiter that gave up has dropped its receiver.
        let _ = slot.sender.send(response);
        Ok(())
    }

    fn remove(&self, command_id: u32) {
        if self.0.remove(&command_id).is_some() {
            metrics::dec_pending_requests();
        }
    }

    pub(crate) fn contains(&self, command_id: u32) -> bool { self.0.contains_key(&command_id) }

    pub(crate) fn len(&self) -> usize { self.0.len() }
}

/// A response that has been requested but not necessarily delivered.
///
/// Dropping the future withdraws the request, so a late response to it is
/// treated as unmatched.
pub struct FutureResponse {
    command_id: u32,
    receiver: Option<oneshot::Receiver<Response>>,
    pending: Arc<PendingRequests>,
}

impl FutureResponse {
    /// Id of the command awaiting a response.
    #[must_use]
    pub fn command_id(&self) -> u32 { self.command_id }

    /// Waits without a bound for the response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoResponse`] if the request was withdrawn.
    pub async fn wait(mut self) -> Result<Response, TransportError> {
        let command_id = self.command_id;
        let receiver = self
            .receiver
            .take()
            .ok_or(TransportError::NoResponse { command_id })?;
        receiver
            .await
            .map_err(|_| TransportError::NoResponse { command_id })
    }

    /// Waits up to `timeout` for the response.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Timeout`] when the window elapses; the
    /// request is withdrawn in that case.
    pub async fn wait_timeout(self, timeout: Duration) -> Result<Response, TransportError> {
        let command_id = self.command_id;
        match tokio::time::timeout(timeout, self.wait()).await {
            Ok(result) => result,
            Err(_) => {
                metrics::inc_request_timeouts();
                Err(TransportError::Timeout {
                    command_id,
                    waited: timeout,
                })
            }
        }
    }

    /// Returns the response if it has already arrived.
    pub fn try_take(&mut self) -> Option<Response> {
        self.receiver.as_mut().and_then(|rx| rx.try_recv().ok())
    }
}

impl Drop for FutureResponse {
    fn drop(&mut self) { self.pending.remove(self.command_id); }
}

impl std::fmt::Debug for FutureResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FutureResponse")
            .field("command_id", &self.command_id)
            .finish_non_exhaustive()
    }
}
