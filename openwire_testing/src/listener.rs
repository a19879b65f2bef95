//! A listener that remembers what it was told.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use openwire::{Command, TransportError, TransportListener};
use tokio::sync::Notify;

/// Records commands and errors delivered by a transport chain.
#[derive(Default)]
pub struct RecordingListener {
    commands: Mutex<Vec<Command>>,
    errors: Mutex<Vec<String>>,
    notify: Notify,
}

impl RecordingListener {
    #[must_use]
    pub fn new() -> Arc<Self> { Arc::new(Self::default()) }

    #[must_use]
    pub fn commands(&self) -> Vec<Command> { self.commands.lock().expect("commands lock").clone() }

    /// Error messages in delivery order.
    #[must_use]
    pub fn errors(&self) -> Vec<String> { self.errors.lock().expect("errors lock").clone() }

    /// Waits until `predicate` holds for the recorded commands.
    pub async fn wait_for_command<F>(&self, wait: Duration, predicate: F) -> Option<Command>
    where
        F: Fn(&Command) -> bool,
    {
        tokio::time::timeout(wait, async {
            loop {
                let notified = self.notify.notified();
                if let Some(found) = self.commands().into_iter().find(|c| predicate(c)) {
                    return found;
                }
                notified.await;
            }
        })
        .await
        .ok()
    }

    /// Waits until at least one error has been delivered.
    pub async fn wait_for_error(&self, wait: Duration) -> Option<String> {
        tokio::time::timeout(wait, async {
            loop {
                let notified = self.notify.notified();
                if let Some(first) = self.errors().into_iter().next() {
                    return first;
                }
                notified.await;
            }
        })
        .await
        .ok()
    }
}

impl TransportListener for RecordingListener {
    fn on_command(&self, command: Command) {
        self.commands.lock().expect("commands lock").push(command);
        self.notify.notify_waiters();
    }

    fn on_exception(&self, error: &TransportError) {
        self.errors.lock().expect("errors lock").push(error.to_string());
        self.notify.notify_waiters();
    }
}
