//! Metric helpers for `openwire`.
//!
//! This module defines metric names and simple helper functions wrapping
//! the [`metrics`](https://docs.rs/metrics) crate. Without the `metrics`
//! feature the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

/// Name of the counter tracking frames sent and received.
pub const FRAMES_TOTAL: &str = "openwire_frames_total";
/// Name of the counter tracking error occurrences.
pub const ERRORS_TOTAL: &str = "openwire_errors_total";
/// Name of the counter tracking requests that timed out.
pub const REQUEST_TIMEOUTS_TOTAL: &str = "openwire_request_timeouts_total";
/// Name of the gauge tracking requests awaiting a response.
pub const PENDING_REQUESTS: &str = "openwire_pending_requests";

/// Direction of frame processing.
#[derive(Clone, Copy, Debug)]
pub enum Direction {
    /// Frames read from the broker.
    Inbound,
    /// Frames written to the broker.
    Outbound,
}

impl Direction {
    #[cfg_attr(not(feature = "metrics"), allow(dead_code))]
    fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

/// Record a frame for the given direction.
pub fn inc_frames(direction: Direction) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "direction" => direction.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = direction;
}

/// Record an error of the given kind, such as `"protocol"` or `"io"`.
pub fn inc_errors(kind: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "kind" => kind).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a request that received no response in time.
pub fn inc_request_timeouts() {
    #[cfg(feature = "metrics")]
    counter!(REQUEST_TIMEOUTS_TOTAL).increment(1);
}

/// Increment the pending requests gauge.
pub fn inc_pending_requests() {
    #[cfg(feature = "metrics")]
    gauge!(PENDING_REQUESTS).increment(1.0);
}

/// Decrement the pending requests gauge.
pub fn dec_pending_requests() {
    #[cfg(feature = "metrics")]
    gauge!(PENDING_REQUESTS).decrement(1.0);
}
