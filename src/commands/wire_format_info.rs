//! The handshake command advertising each peer's wire format settings.

use super::CommandHeader;
use crate::codec::{PrimitiveMap, PrimitiveValue};

/// Magic prefix identifying an OpenWire handshake.
pub const MAGIC: [u8; 8] = *b"ActiveMQ";

/// Property names carried in the handshake map.
pub mod property {
    pub const STACK_TRACE_ENABLED: &str = "StackTraceEnabled";
    pub const CACHE_ENABLED: &str = "CacheEnabled";
    pub const CACHE_SIZE: &str = "CacheSize";
    pub const TCP_NO_DELAY_ENABLED: &str = "TcpNoDelayEnabled";
    pub const SIZE_PREFIX_DISABLED: &str = "SizePrefixDisabled";
    pub const TIGHT_ENCODING_ENABLED: &str = "TightEncodingEnabled";
    pub const MAX_INACTIVITY_DURATION: &str = "MaxInactivityDuration";
    // The misspelling is part of the protocol.
    pub const MAX_INACTIVITY_DURATION_INITIAL_DELAY: &str = "MaxInactivityDurationInitalDelay";
    pub const MAX_FRAME_SIZE: &str = "MaxFrameSize";
}

/// Wire format advertisement exchanged once at connection start.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct WireFormatInfo {
    pub header: CommandHeader,
    pub magic: [u8; 8],
    pub version: u32,
    pub properties: PrimitiveMap,
}

impl Default for WireFormatInfo {
    fn default() -> Self {
        Self {
            header: CommandHeader::default(),
            magic: MAGIC,
            version: 0,
            properties: PrimitiveMap::new(),
        }
    }
}

impl WireFormatInfo {
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Returns `true` if the magic prefix is intact.
    #[must_use]
    pub fn is_valid(&self) -> bool { self.magic == MAGIC }

    fn bool_property(&self, name: &str) -> bool {
        self.properties
            .get(name)
            .and_then(PrimitiveValue::as_bool)
            .unwrap_or(false)
    }

    fn long_property(&self, name: &str) -> i64 {
        self.properties
            .get(name)
            .and_then(PrimitiveValue::as_i64)
            .unwrap_or(0)
    }

    fn set(&mut self, name: &str, value: PrimitiveValue) {
        self.properties.insert(name.to_owned(), value);
    }

    #[must_use]
    pub fn stack_trace_enabled(&self) -> bool { self.bool_property(property::STACK_TRACE_ENABLED) }

    pub fn set_stack_trace_enabled(&mut self, value: bool) {
        self.set(property::STACK_TRACE_ENABLED, value.into());
    }

    #[must_use]
    pub fn cache_enabled(&self) -> bool { self.bool_property(property::CACHE_ENABLED) }

    pub fn set_cache_enabled(&mut self, value: bool) {
        self.set(property::CACHE_ENABLED, value.into());
    }

    #[must_use]
    pub fn cache_size(&self) -> i64 { self.long_property(property::CACHE_SIZE) }

    pub fn set_cache_size(&mut self, value: i32) { self.set(property::CACHE_SIZE, value.into()); }

    #[must_use]
    pub fn tcp_no_delay_enabled(&self) -> bool {
        self.bool_property(property::TCP_NO_DELAY_ENABLED)
    }

    pub fn set_tcp_no_delay_enabled(&mut self, value: bool) {
        self.set(property::TCP_NO_DELAY_ENABLED, value.into());
    }

    #[must_use]
    pub fn size_prefix_disabled(&self) -> bool {
        self.bool_property(property::SIZE_PREFIX_DISABLED)
    }

    pub fn set_size_prefix_disabled(&mut self, value: bool) {
        self.set(property::SIZE_PREFIX_DISABLED, value.into());
    }

    #[must_use]
    pub fn tight_encoding_enabled(&self) -> bool {
        self.bool_property(property::TIGHT_ENCODING_ENABLED)
    }

    pub fn set_tight_encoding_enabled(&mut self, value: bool) {
        self.set(property::TIGHT_ENCODING_ENABLED, value.into());
    }

    /// Maximum inactivity in milliseconds; `0` disables monitoring.
    #[must_use]
    pub fn max_inactivity_duration(&self) -> i64 {
        self.long_property(property::MAX_INACTIVITY_DURATION)
    }

    pub fn set_max_inactivity_duration(&mut self, millis: i64) {
        self.set(property::MAX_INACTIVITY_DURATION, millis.into());
    }

    #[must_use]
    pub fn max_inactivity_duration_initial_delay(&self) -> i64 {
        self.long_property(property::MAX_INACTIVITY_DURATION_INITIAL_DELAY)
    }

    pub fn set_max_inactivity_duration_initial_delay(&mut self, millis: i64) {
        self.set(property::MAX_INACTIVITY_DURATION_INITIAL_DELAY, millis.into());
    }

    #[must_use]
    pub fn max_frame_size(&self) -> i64 { self.long_property(property::MAX_FRAME_SIZE) }

    pub fn set_max_frame_size(&mut self, bytes: i64) {
        self.set(property::MAX_FRAME_SIZE, bytes.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_properties_read_as_defaults() {
        let info = WireFormatInfo::new(6);
        assert!(info.is_valid());
        assert!(!info.tight_encoding_enabled());
        assert_eq!(info.max_inactivity_duration(), 0);
    }

    #[test]
    fn setters_use_protocol_property_names() {
        let mut info = WireFormatInfo::new(6);
        info.set_max_inactivity_duration_initial_delay(10_000);
        info.set_cache_size(1024);
        assert_eq!(
            info.properties.get("MaxInactivityDurationInitalDelay"),
            Some(&PrimitiveValue::Long(10_000))
        );
        assert_eq!(info.cache_size(), 1024);
    }
}
