//! Error types for transports and their configuration.

use std::{io, time::Duration};

use thiserror::Error;

use crate::{codec::CodecError, commands::BrokerError};

/// Errors reported by [`Transport`](super::Transport) operations and to
/// [`TransportListener::on_exception`](super::TransportListener::on_exception).
#[derive(Debug, Error)]
pub enum TransportError {
    /// The transport was closed.
    #[error("transport is closed")]
    Closed,

    /// An operation needed a started transport.
    #[error("transport has not been started")]
    NotStarted,

    /// `start` was called after `stop`.
    #[error("transport was stopped and cannot be restarted")]
    Stopped,

    /// `start` was called before a listener was registered.
    #[error("no transport listener registered")]
    NoListener,

    /// No response arrived within the wait window.
    #[error("no response to command {command_id} within {waited:?}")]
    Timeout {
        /// Id of the request that timed out.
        command_id: u32,
        /// How long the caller waited.
        waited: Duration,
    },

    /// The pending request was discarded before a response was delivered.
    #[error("request {command_id} was abandoned without a response")]
    NoResponse {
        /// Id of the abandoned request.
        command_id: u32,
    },

    /// Encoding or decoding failed.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The underlying stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The wire format handshake did not complete.
    #[error("wire format negotiation failed: {0}")]
    Negotiation(String),

    /// The operation is not supported by this transport chain.
    #[error("{0} is not supported by this transport")]
    Unsupported(&'static str),

    /// Nothing was read from the peer within the negotiated window.
    #[error("no data received from the peer for {elapsed:?}")]
    InactivityTimeout {
        /// Length of the silent period.
        elapsed: Duration,
    },

    /// The transport could not be configured.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The broker answered a request with an exception.
    #[error("broker error: {0}")]
    Remote(BrokerError),
}

impl TransportError {
    /// Returns `true` if the connection can keep being used after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::NoResponse { .. } | Self::Remote(_)
        )
    }
}

/// Errors raised while building a transport from a URI or options.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// The URI could not be parsed.
    #[error("invalid URI: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// The URI scheme has no transport.
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// The URI names no host.
    #[error("URI has no host")]
    MissingHost,

    /// An option was not recognised.
    #[error("unknown option {0:?}")]
    UnknownOption(String),

    /// An option value could not be parsed.
    #[error("invalid value {value:?} for option {option:?}")]
    InvalidValue {
        /// Option name as written in the URI.
        option: String,
        /// Offending value.
        value: String,
    },
}
