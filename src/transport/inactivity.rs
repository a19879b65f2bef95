//! Keep-alive and dead peer detection.
//!
//! Once the handshake has agreed a non-zero maximum inactivity duration the
//! monitor runs two timers. The write check sends a [`KeepAliveInfo`] when
//! nothing was written during its interval (a third of the maximum). The
//! read check fails the transport with
//! [`TransportError::InactivityTimeout`] when nothing was read during the
//! full maximum. Both start after the negotiated initial delay.

use std::{
    sync::{
        Arc,
        Weak,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{
    Transport,
    TransportError,
    TransportListener,
    filter::{TransportFilter, forward_filter_accessors, wrap},
};
use crate::{
    commands::{Command, KeepAliveInfo},
    metrics,
    wire_format::WireFormatState,
};

pub struct InactivityMonitor {
    this: Weak<Self>,
    filter: TransportFilter,
    state: Arc<WireFormatState>,
    command_received: AtomicBool,
    command_sent: AtomicBool,
    monitoring: AtomicBool,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl InactivityMonitor {
    /// Wraps `next`. Timers are armed by the peer's [`WireFormatInfo`]
    /// using the settings then in force in `state`.
    ///
    /// [`WireFormatInfo`]: crate::commands::WireFormatInfo
    #[must_use]
    pub fn new(next: Arc<dyn Transport>, state: Arc<WireFormatState>) -> Arc<Self> {
        wrap(&next, |this| Self {
            this: this.clone(),
            filter: TransportFilter::new(Arc::clone(&next)),
            state,
            command_received: AtomicBool::new(true),
            command_sent: AtomicBool::new(false),
            monitoring: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        })
    }

    /// Whether the timers are running.
    #[must_use]
    pub fn is_monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire) && !self.shutdown.is_cancelled()
    }

    fn start_monitoring(&self) {
        let config = *self.state.current().0.config();
        let max = config.max_inactivity_duration;
        if max.is_zero() {
            tracing::debug!("inactivity monitoring disabled by the negotiated settings");
            return;
        }
        if self.monitoring.swap(true, Ordering::AcqRel) {
            return;
        }
        let start = Instant::now() + config.max_inactivity_duration_initial_delay;
        tracing::debug!(
            max_inactivity_ms = max.as_millis(),
            initial_delay_ms = config.max_inactivity_duration_initial_delay.as_millis(),
            "starting inactivity monitor"
        );
        self.tracker.spawn(read_check(
            self.this.clone(),
            self.shutdown.clone(),
            start,
            max,
        ));
        self.tracker.spawn(write_check(
            self.this.clone(),
            self.shutdown.clone(),
            start,
            max / 3,
        ));
    }

    fn stop_monitoring(&self) {
        self.shutdown.cancel();
        self.tracker.close();
    }

    fn reply_to_keep_alive(&self) {
        let next = Arc::clone(self.filter.next());
        self.tracker.spawn(async move {
            if let Err(error) = next.oneway(KeepAliveInfo::default().into()).await {
                tracing::debug!(%error, "failed to answer keep-alive");
            }
        });
    }
}

async fn wait_tick(shutdown: &CancellationToken, ticks: &mut tokio::time::Interval) -> bool {
    tokio::select! {
        biased;
        () = shutdown.cancelled() => false,
        _ = ticks.tick() => true,
    }
}

async fn read_check(
    monitor: Weak<InactivityMonitor>,
    shutdown: CancellationToken,
    start: Instant,
    period: Duration,
) {
    let mut ticks = tokio::time::interval_at(start, period);
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    while wait_tick(&shutdown, &mut ticks).await {
        let Some(monitor) = monitor.upgrade() else {
            break;
        };
        if monitor.command_received.swap(false, Ordering::AcqRel) {
            continue;
        }
        let error = TransportError::InactivityTimeout { elapsed: period };
        log::warn!("{error}");
        metrics::inc_errors("inactivity");
        monitor.shutdown.cancel();
        monitor.filter.listener().fire_exception(&error);
        break;
    }
}

async fn write_check(
    monitor: Weak<InactivityMonitor>,
    shutdown: CancellationToken,
    start: Instant,
    period: Duration,
) {
    let mut ticks = tokio::time::interval_at(start, period.max(Duration::from_millis(1)));
    ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
    while wait_tick(&shutdown, &mut ticks).await {
        let Some(monitor) = monitor.upgrade() else {
            break;
        };
        if monitor.command_sent.swap(false, Ordering::AcqRel) {
            continue;
        }
        tracing::trace!("sending keep-alive");
        if let Err(error) = monitor.filter.next().oneway(KeepAliveInfo::default().into()).await {
            tracing::debug!(%error, "failed to send keep-alive");
        }
    }
}

#[async_trait]
impl Transport for InactivityMonitor {
    async fn oneway(&self, command: Command) -> Result<(), TransportError> {
        self.filter.ensure_open()?;
        self.command_sent.store(true, Ordering::Release);
        self.filter.next().oneway(command).await
    }

    async fn start(&self) -> Result<(), TransportError> { self.filter.start().await }

    async fn stop(&self) -> Result<(), TransportError> {
        self.stop_monitoring();
        self.filter.stop().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.stop_monitoring();
        self.filter.close().await
    }

    forward_filter_accessors!();
}

impl TransportListener for InactivityMonitor {
    fn on_command(&self, command: Command) {
        self.command_received.store(true, Ordering::Release);
        match &command {
            Command::KeepAliveInfo(probe) => {
                if probe.header.response_required {
                    self.reply_to_keep_alive();
                }
                return;
            }
            Command::WireFormatInfo(_) => self.start_monitoring(),
            _ => {}
        }
        self.filter.listener().fire_command(command);
    }

    fn on_exception(&self, error: &TransportError) {
        self.stop_monitoring();
        self.filter.listener().fire_exception(error);
    }

    fn transport_interrupted(&self) { self.filter.listener().fire_interrupted(); }

    fn transport_resumed(&self) { self.filter.listener().fire_resumed(); }
}
