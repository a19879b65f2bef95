//! Transport settings and broker URI parsing.

use std::{str::FromStr, time::Duration};

use url::Url;

use super::{
    ConfigError,
    correlator::DEFAULT_REQUEST_TIMEOUT,
    negotiator::DEFAULT_NEGOTIATE_TIMEOUT,
};
use crate::wire_format::WireFormatConfig;

/// Port used when a URI names none.
pub const DEFAULT_PORT: u16 = 61616;

/// Settings for one transport chain.
///
/// # Examples
///
/// ```
/// use openwire::transport::TransportConfig;
///
/// let config = TransportConfig::from_uri(
///     "tcp://broker:61617?wireFormat.tightEncodingEnabled=true&transport.commandTracingEnabled=true",
/// )
/// .expect("valid URI");
/// assert_eq!(config.host, "broker");
/// assert_eq!(config.port, 61617);
/// assert!(config.wire_format.tight_encoding_enabled);
/// assert!(config.command_tracing);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransportConfig {
    pub host: String,
    pub port: u16,
    pub wire_format: WireFormatConfig,
    pub request_timeout: Duration,
    pub negotiate_timeout: Duration,
    pub command_tracing: bool,
    pub use_inactivity_monitor: bool,
    pub tcp_no_delay: bool,
    pub connect_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: DEFAULT_PORT,
            wire_format: WireFormatConfig::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            negotiate_timeout: DEFAULT_NEGOTIATE_TIMEOUT,
            command_tracing: false,
            use_inactivity_monitor: true,
            tcp_no_delay: true,
            connect_timeout: None,
        }
    }
}

fn parse<T: FromStr>(option: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        option: option.to_owned(),
        value: value.to_owned(),
    })
}

fn parse_millis(option: &str, value: &str) -> Result<Duration, ConfigError> {
    parse::<u64>(option, value).map(Duration::from_millis)
}

impl TransportConfig {
    /// Parses `tcp://host[:port][?option=value&...]`.
    ///
    /// Options prefixed `wireFormat.` tune the wire format; those prefixed
    /// `transport.` tune the chain.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for malformed URIs, schemes other than `tcp`,
    /// unknown options and unparsable values.
    pub fn from_uri(uri: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(uri)?;
        Self::from_url(&url)
    }

    /// As [`from_uri`](Self::from_uri) for an already parsed URL.
    ///
    /// # Errors
    ///
    /// As [`from_uri`](Self::from_uri).
    pub fn from_url(url: &Url) -> Result<Self, ConfigError> {
        if url.scheme() != "tcp" {
            return Err(ConfigError::UnsupportedScheme(url.scheme().to_owned()));
        }
        let host = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or(ConfigError::MissingHost)?;
        let mut config = Self {
            host: host.to_owned(),
            port: url.port().unwrap_or(DEFAULT_PORT),
            ..Self::default()
        };
        for (option, value) in url.query_pairs() {
            config.apply(&option, &value)?;
        }
        Ok(config)
    }

    /// Applies one URI option.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownOption`] or
    /// [`ConfigError::InvalidValue`].
    pub fn apply(&mut self, option: &str, value: &str) -> Result<(), ConfigError> {
        let wf = &mut self.wire_format;
        match option {
            "wireFormat.version" => wf.version = parse(option, value)?,
            "wireFormat.tightEncodingEnabled" => wf.tight_encoding_enabled = parse(option, value)?,
            "wireFormat.cacheEnabled" => wf.cache_enabled = parse(option, value)?,
            "wireFormat.cacheSize" => wf.cache_size = parse(option, value)?,
            "wireFormat.stackTraceEnabled" => wf.stack_trace_enabled = parse(option, value)?,
            "wireFormat.tcpNoDelayEnabled" => wf.tcp_no_delay_enabled = parse(option, value)?,
            "wireFormat.maxInactivityDuration" => {
                wf.max_inactivity_duration = parse_millis(option, value)?;
            }
            "wireFormat.maxInactivityDurationInitalDelay"
            | "wireFormat.maxInactivityDurationInitialDelay" => {
                wf.max_inactivity_duration_initial_delay = parse_millis(option, value)?;
            }
            "wireFormat.maxFrameSize" => wf.max_frame_size = parse(option, value)?,
            "transport.commandTracingEnabled" => self.command_tracing = parse(option, value)?,
            "transport.useInactivityMonitor" => {
                self.use_inactivity_monitor = parse(option, value)?;
            }
            "transport.tcpNoDelay" => self.tcp_no_delay = parse(option, value)?,
            "transport.connectTimeout" => {
                self.connect_timeout = Some(parse_millis(option, value)?);
            }
            "transport.requestTimeout" => self.request_timeout = parse_millis(option, value)?,
            "transport.negotiateTimeout" => self.negotiate_timeout = parse_millis(option, value)?,
            _ => return Err(ConfigError::UnknownOption(option.to_owned())),
        }
        Ok(())
    }

    #[must_use]
    pub fn with_wire_format(mut self, wire_format: WireFormatConfig) -> Self {
        self.wire_format = wire_format;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_negotiate_timeout(mut self, timeout: Duration) -> Self {
        self.negotiate_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_command_tracing(mut self, enabled: bool) -> Self {
        self.command_tracing = enabled;
        self
    }

    #[must_use]
    pub fn with_inactivity_monitor(mut self, enabled: bool) -> Self {
        self.use_inactivity_monitor = enabled;
        self
    }

    #[must_use]
    pub fn with_tcp_no_delay(mut self, enabled: bool) -> Self {
        self.tcp_no_delay = enabled;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// `host:port` to connect to.
    #[must_use]
    pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn defaults_without_options() {
        let config = TransportConfig::from_uri("tcp://localhost").expect("parse");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.request_timeout, Duration::from_millis(3000));
        assert_eq!(config.negotiate_timeout, Duration::from_millis(15_000));
        assert!(config.use_inactivity_monitor);
        assert_eq!(config.wire_format, WireFormatConfig::default());
    }

    #[test]
    fn wire_format_options_are_applied() {
        let config = TransportConfig::from_uri(
            "tcp://127.0.0.1:5000?wireFormat.version=3&wireFormat.cacheEnabled=false\
             &wireFormat.maxInactivityDuration=0&wireFormat.maxInactivityDurationInitalDelay=50",
        )
        .expect("parse");
        assert_eq!(config.address(), "127.0.0.1:5000");
        assert_eq!(config.wire_format.version, 3);
        assert!(!config.wire_format.cache_enabled);
        assert_eq!(config.wire_format.max_inactivity_duration, Duration::ZERO);
        assert_eq!(
            config.wire_format.max_inactivity_duration_initial_delay,
            Duration::from_millis(50)
        );
    }

    #[test]
    fn transport_options_are_applied() {
        let config = TransportConfig::from_uri(
            "tcp://h?transport.useInactivityMonitor=false&transport.requestTimeout=50\
             &transport.connectTimeout=10",
        )
        .expect("parse");
        assert!(!config.use_inactivity_monitor);
        assert_eq!(config.request_timeout, Duration::from_millis(50));
        assert_eq!(config.connect_timeout, Some(Duration::from_millis(10)));
    }

    #[rstest]
    #[case("ssl://h", ConfigError::UnsupportedScheme("ssl".into()))]
    #[case("tcp://h?bogus=1", ConfigError::UnknownOption("bogus".into()))]
    #[case(
        "tcp://h?wireFormat.version=six",
        ConfigError::InvalidValue { option: "wireFormat.version".into(), value: "six".into() }
    )]
    fn rejects_bad_uris(#[case] uri: &str, #[case] expected: ConfigError) {
        assert_eq!(TransportConfig::from_uri(uri), Err(expected));
    }

    #[test]
    fn rejects_unparsable_uri() {
        assert!(matches!(
            TransportConfig::from_uri("not a uri"),
            Err(ConfigError::InvalidUri(_))
        ));
    }
}
