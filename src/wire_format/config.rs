//! Local wire format preferences and the settings agreed with a peer.

use std::time::Duration;

use crate::{
    codec::ProtocolError,
    commands::WireFormatInfo,
    marshal::{EncodingOptions, registry::MAX_VERSION},
};

/// Default cap on a single frame, in bytes.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Wire format settings.
///
/// Before the handshake these are the local preferences advertised to the
/// peer; afterwards they hold the negotiated values.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use openwire::wire_format::WireFormatConfig;
///
/// let config = WireFormatConfig::default()
///     .with_tight_encoding(true)
///     .with_max_inactivity_duration(Duration::from_secs(3));
/// assert_eq!(config.version, 6);
/// assert!(config.tight_encoding_enabled);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WireFormatConfig {
    pub version: u32,
    pub tight_encoding_enabled: bool,
    pub cache_enabled: bool,
    pub cache_size: usize,
    pub stack_trace_enabled: bool,
    pub tcp_no_delay_enabled: bool,
    pub max_inactivity_duration: Duration,
    pub max_inactivity_duration_initial_delay: Duration,
    pub max_frame_size: usize,
}

impl Default for WireFormatConfig {
    fn default() -> Self {
        Self {
            version: MAX_VERSION,
            tight_encoding_enabled: false,
            cache_enabled: true,
            cache_size: 1024,
            stack_trace_enabled: true,
            tcp_no_delay_enabled: true,
            max_inactivity_duration: Duration::from_millis(30_000),
            max_inactivity_duration_initial_delay: Duration::from_millis(10_000),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

fn millis(duration: Duration) -> i64 { i64::try_from(duration.as_millis()).unwrap_or(i64::MAX) }

fn from_millis(value: i64) -> Duration { Duration::from_millis(value.max(0).cast_unsigned()) }

impl WireFormatConfig {
    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    #[must_use]
    pub fn with_tight_encoding(mut self, enabled: bool) -> Self {
        self.tight_encoding_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, enabled: bool) -> Self {
        self.stack_trace_enabled = enabled;
        self
    }

    #[must_use]
    pub fn with_tcp_no_delay(mut self, enabled: bool) -> Self {
        self.tcp_no_delay_enabled = enabled;
        self
    }

    /// A zero duration disables inactivity monitoring.
    #[must_use]
    pub fn with_max_inactivity_duration(mut self, duration: Duration) -> Self {
        self.max_inactivity_duration = duration;
        self
    }

    #[must_use]
    pub fn with_max_inactivity_duration_initial_delay(mut self, delay: Duration) -> Self {
        self.max_inactivity_duration_initial_delay = delay;
        self
    }

    #[must_use]
    pub fn with_max_frame_size(mut self, bytes: usize) -> Self {
        self.max_frame_size = bytes;
        self
    }

    /// Field encoding selected by these settings.
    #[must_use]
    pub fn encoding_options(&self) -> EncodingOptions {
        EncodingOptions {
            version: self.version,
            tight_encoding: self.tight_encoding_enabled,
            cache_enabled: self.cache_enabled,
            stack_trace_enabled: self.stack_trace_enabled,
        }
    }

    /// Builds the handshake advertising these settings.
    #[must_use]
    pub fn to_info(&self) -> WireFormatInfo {
        let mut info = WireFormatInfo::new(self.version);
        info.set_stack_trace_enabled(self.stack_trace_enabled);
        info.set_cache_enabled(self.cache_enabled);
        info.set_cache_size(i32::try_from(self.cache_size).unwrap_or(i32::MAX));
        info.set_tcp_no_delay_enabled(self.tcp_no_delay_enabled);
        info.set_size_prefix_disabled(false);
        info.set_tight_encoding_enabled(self.tight_encoding_enabled);
        info.set_max_inactivity_duration(millis(self.max_inactivity_duration));
        info.set_max_inactivity_duration_initial_delay(millis(
            self.max_inactivity_duration_initial_delay,
        ));
        info.set_max_frame_size(i64::try_from(self.max_frame_size).unwrap_or(i64::MAX));
        info
    }

    /// Combines these preferences with the peer's advertisement.
    ///
    /// The lower version wins, a feature stays on only when both sides
    /// enable it, and sizes and durations take the smaller value. A property
    /// the peer omits reads as `false` or zero.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidMagic`] if `peer` is not an OpenWire
    /// handshake.
    pub fn negotiate(&self, peer: &WireFormatInfo) -> Result<Self, ProtocolError> {
        if !peer.is_valid() {
            return Err(ProtocolError::InvalidMagic { found: peer.magic });
        }
        let peer_cache = usize::try_from(peer.cache_size()).unwrap_or(0);
        let peer_frame = usize::try_from(peer.max_frame_size()).unwrap_or(0);
        Ok(Self {
            version: self.version.min(peer.version),
            tight_encoding_enabled: self.tight_encoding_enabled && peer.tight_encoding_enabled(),
            cache_enabled: self.cache_enabled && peer.cache_enabled(),
            cache_size: self.cache_size.min(peer_cache),
            stack_trace_enabled: self.stack_trace_enabled && peer.stack_trace_enabled(),
            tcp_no_delay_enabled: self.tcp_no_delay_enabled && peer.tcp_no_delay_enabled(),
            max_inactivity_duration: self
                .max_inactivity_duration
                .min(from_millis(peer.max_inactivity_duration())),
            max_inactivity_duration_initial_delay: self
                .max_inactivity_duration_initial_delay
                .min(from_millis(peer.max_inactivity_duration_initial_delay())),
            max_frame_size: if peer_frame == 0 {
                self.max_frame_size
            } else {
                self.max_frame_size.min(peer_frame)
            },
        })
    }
}
