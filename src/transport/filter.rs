//! Shared plumbing for transports that decorate another transport.
//!
//! A concrete filter embeds a [`TransportFilter`], registers itself as the
//! listener of the transport it wraps, and overrides only the calls and
//! callbacks it cares about. Everything else is forwarded unchanged.

use std::sync::{
    Arc,
    PoisonError,
    RwLock,
    Weak,
    atomic::{AtomicU8, Ordering},
};

use super::{Transport, TransportError, TransportListener};
use crate::commands::Command;

/// Lifecycle of a transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Lifecycle {
    Created = 0,
    Running = 1,
    Stopped = 2,
    Closed = 3,
}

/// Atomic cell holding a [`Lifecycle`].
#[derive(Debug)]
pub struct LifecycleCell(AtomicU8);

impl Default for LifecycleCell {
    fn default() -> Self { Self(AtomicU8::new(Lifecycle::Created as u8)) }
}

impl LifecycleCell {
    #[must_use]
    pub fn get(&self) -> Lifecycle {
        match self.0.load(Ordering::Acquire) {
            0 => Lifecycle::Created,
            1 => Lifecycle::Running,
            2 => Lifecycle::Stopped,
            _ => Lifecycle::Closed,
        }
    }

    /// Moves to `next` unless already closed; returns the previous state.
    pub fn advance(&self, next: Lifecycle) -> Lifecycle {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == Lifecycle::Closed as u8 {
                return Lifecycle::Closed;
            }
            match self
                .0
                .compare_exchange(current, next as u8, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
        match current {
            0 => Lifecycle::Created,
            1 => Lifecycle::Running,
            _ => Lifecycle::Stopped,
        }
    }

    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once closed.
    pub fn ensure_open(&self) -> Result<(), TransportError> {
        if self.get() == Lifecycle::Closed {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    }

    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once closed and
    /// [`TransportError::Stopped`] once stopped.
    pub fn ensure_startable(&self) -> Result<(), TransportError> {
        match self.get() {
            Lifecycle::Closed => Err(TransportError::Closed),
            Lifecycle::Stopped => Err(TransportError::Stopped),
            Lifecycle::Created | Lifecycle::Running => Ok(()),
        }
    }
}

/// Slot holding the listener a transport reports to.
#[derive(Default)]
pub struct ListenerSlot(RwLock<Option<Arc<dyn TransportListener>>>);

impl ListenerSlot {
    pub fn set(&self, listener: Arc<dyn TransportListener>) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = Some(listener);
    }

    #[must_use]
    pub fn get(&self) -> Option<Arc<dyn TransportListener>> {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn fire_command(&self, command: Command) {
        match self.get() {
            Some(listener) => listener.on_command(command),
            None => tracing::debug!(command = command.name(), "no listener, dropping command"),
        }
    }

    pub fn fire_exception(&self, error: &TransportError) {
        match self.get() {
            Some(listener) => listener.on_exception(error),
            None => tracing::debug!(%error, "no listener, dropping exception"),
        }
    }

    pub fn fire_interrupted(&self) {
        if let Some(listener) = self.get() {
            listener.transport_interrupted();
        }
    }

    pub fn fire_resumed(&self) {
        if let Some(listener) = self.get() {
            listener.transport_resumed();
        }
    }
}

/// Base state of a filter: the wrapped transport, the listener above and
/// the lifecycle.
pub struct TransportFilter {
    next: Arc<dyn Transport>,
    listener: ListenerSlot,
    lifecycle: LifecycleCell,
}

impl TransportFilter {
    #[must_use]
    pub fn new(next: Arc<dyn Transport>) -> Self {
        Self {
            next,
            listener: ListenerSlot::default(),
            lifecycle: LifecycleCell::default(),
        }
    }

    /// The wrapped transport.
    #[must_use]
    pub fn next(&self) -> &Arc<dyn Transport> { &self.next }

    #[must_use]
    pub fn listener(&self) -> &ListenerSlot { &self.listener }

    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle { self.lifecycle.get() }

    /// # Errors
    ///
    /// Returns [`TransportError::Closed`] once closed.
    pub fn ensure_open(&self) -> Result<(), TransportError> { self.lifecycle.ensure_open() }

    /// Checks the listener and starts the wrapped transport.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoListener`] without a listener,
    /// [`TransportError::Closed`] or [`TransportError::Stopped`] once shut
    /// down, or the wrapped transport's failure.
    pub async fn start(&self) -> Result<(), TransportError> {
        self.lifecycle.ensure_startable()?;
        if self.listener.get().is_none() {
            return Err(TransportError::NoListener);
        }
        if self.lifecycle.advance(Lifecycle::Running) == Lifecycle::Running {
            return Ok(());
        }
        self.next.start().await
    }

    /// # Errors
    ///
    /// Propagates the wrapped transport's failure.
    pub async fn stop(&self) -> Result<(), TransportError> {
        if self.lifecycle.advance(Lifecycle::Stopped) == Lifecycle::Closed {
            return Ok(());
        }
        self.next.stop().await
    }

    /// Closes this link and the chain below it. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// Propagates the wrapped transport's failure.
    pub async fn close(&self) -> Result<(), TransportError> {
        if self.lifecycle.advance(Lifecycle::Closed) == Lifecycle::Closed {
            return Ok(());
        }
        self.next.close().await
    }

    #[must_use]
    pub fn is_closed(&self) -> bool { self.lifecycle() == Lifecycle::Closed || self.next.is_closed() }

    #[must_use]
    pub fn is_connected(&self) -> bool { !self.is_closed() && self.next.is_connected() }
}

/// Listener registered with the wrapped transport; forwards to the filter
/// without keeping it alive.
pub struct WeakListener<T>(Weak<T>);

impl<T> WeakListener<T> {
    #[must_use]
    pub fn new(target: Weak<T>) -> Self { Self(target) }
}

impl<T: TransportListener> TransportListener for WeakListener<T> {
    fn on_command(&self, command: Command) {
        if let Some(target) = self.0.upgrade() {
            target.on_command(command);
        }
    }

    fn on_exception(&self, error: &TransportError) {
        if let Some(target) = self.0.upgrade() {
            target.on_exception(error);
        }
    }

    fn transport_interrupted(&self) {
        if let Some(target) = self.0.upgrade() {
            target.transport_interrupted();
        }
    }

    fn transport_resumed(&self) {
        if let Some(target) = self.0.upgrade() {
            target.transport_resumed();
        }
    }
}

/// Builds a filter with [`Arc::new_cyclic`] and registers it as the
/// listener of `next`.
pub fn wrap<T, F>(next: &Arc<dyn Transport>, build: F) -> Arc<T>
where
    T: TransportListener + 'static,
    F: FnOnce(&Weak<T>) -> T,
{
    Arc::new_cyclic(|weak: &Weak<T>| {
        next.set_transport_listener(Arc::new(WeakListener::new(weak.clone())));
        build(weak)
    })
}

/// Implements the [`Transport`] methods every filter forwards to its
/// embedded [`TransportFilter`] in the field named `filter`.
macro_rules! forward_filter_accessors {
    () => {
        fn set_transport_listener(
            &self,
            listener: ::std::sync::Arc<dyn $crate::transport::TransportListener>,
        ) {
            self.filter.listener().set(listener);
        }

        fn transport_listener(
            &self,
        ) -> Option<::std::sync::Arc<dyn $crate::transport::TransportListener>> {
            self.filter.listener().get()
        }

        fn is_connected(&self) -> bool { self.filter.is_connected() }

        fn is_closed(&self) -> bool { self.filter.is_closed() }

        fn next(&self) -> Option<&dyn $crate::transport::Transport> {
            Some(self.filter.next().as_ref())
        }

        fn as_any(&self) -> &dyn ::std::any::Any { self }
    };
}

pub(crate) use forward_filter_accessors;

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(Lifecycle::Running, Lifecycle::Created)]
    #[case(Lifecycle::Stopped, Lifecycle::Created)]
    fn advance_reports_previous_state(#[case] next: Lifecycle, #[case] previous: Lifecycle) {
        let cell = LifecycleCell::default();
        assert_eq!(cell.advance(next), previous);
        assert_eq!(cell.get(), next);
    }

    #[test]
    fn closed_is_terminal() {
        let cell = LifecycleCell::default();
        cell.advance(Lifecycle::Closed);
        assert_eq!(cell.advance(Lifecycle::Running), Lifecycle::Closed);
        assert_eq!(cell.get(), Lifecycle::Closed);
        assert!(matches!(cell.ensure_open(), Err(TransportError::Closed)));
    }

    #[rstest]
    #[case(Lifecycle::Created, None)]
    #[case(Lifecycle::Running, None)]
    #[case(Lifecycle::Stopped, Some("stopped"))]
    #[case(Lifecycle::Closed, Some("closed"))]
    fn only_live_transports_can_start(#[case] state: Lifecycle, #[case] refusal: Option<&str>) {
        let cell = LifecycleCell::default();
        cell.advance(state);
        match (cell.ensure_startable(), refusal) {
            (Ok(()), None) => {}
            (Err(TransportError::Stopped), Some("stopped"))
            | (Err(TransportError::Closed), Some("closed")) => {}
            (outcome, expected) => panic!("{state:?}: got {outcome:?}, expected {expected:?}"),
        }
    }
}
