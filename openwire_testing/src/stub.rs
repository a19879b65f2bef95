//! A bottom-of-chain transport that records writes.

use std::{
    any::Any,
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use openwire::{Command, Transport, TransportError, TransportListener};

/// Stands in for an [`IoTransport`](openwire::transport::IoTransport).
///
/// Sent commands are kept for inspection and inbound commands are injected
/// with [`deliver`](Self::deliver).
#[derive(Default)]
pub struct StubTransport {
    sent: Mutex<Vec<Command>>,
    listener: Mutex<Option<Arc<dyn TransportListener>>>,
    started: AtomicBool,
    closed: AtomicBool,
    fail_writes: AtomicBool,
}

impl StubTransport {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    #[must_use]
    pub fn sent(&self) -> Vec<Command> { self.sent.lock().expect("sent lock").clone() }

    #[must_use]
    pub fn is_started(&self) -> bool { self.started.load(Ordering::Acquire) }

    /// Makes every later `oneway` fail with a broken pipe.
    pub fn fail_writes(&self) { self.fail_writes.store(true, Ordering::Release); }

    /// Hands `command` to the registered listener as if read from the peer.
    pub fn deliver(&self, command: impl Into<Command>) {
        let listener = self.listener.lock().expect("listener lock").clone();
        listener.expect("no listener registered").on_command(command.into());
    }

    /// Reports `error` to the registered listener.
    pub fn fail(&self, error: &TransportError) {
        let listener = self.listener.lock().expect("listener lock").clone();
        listener.expect("no listener registered").on_exception(error);
    }
}

#[async_trait]
impl Transport for StubTransport {
    async fn oneway(&self, command: Command) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        self.sent.lock().expect("sent lock").push(command);
        Ok(())
    }

    fn set_transport_listener(&self, listener: Arc<dyn TransportListener>) {
        *self.listener.lock().expect("listener lock") = Some(listener);
    }

    fn transport_listener(&self) -> Option<Arc<dyn TransportListener>> {
        self.listener.lock().expect("listener lock").clone()
    }

    async fn start(&self) -> Result<(), TransportError> {
        self.started.store(true, Ordering::Release);
        Ok(())
    }

    async fn stop(&self) -> Result<(), TransportError> { Ok(()) }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }

    fn is_connected(&self) -> bool { !self.closed.load(Ordering::Acquire) }

    fn is_closed(&self) -> bool { self.closed.load(Ordering::Acquire) }

    fn next(&self) -> Option<&dyn Transport> { None }

    fn as_any(&self) -> &dyn Any { self }
}
