#![doc(html_root_url = "https://docs.rs/openwire/latest")]
//! Public API for the `openwire` library.
//!
//! This crate implements the client side of the ActiveMQ OpenWire protocol:
//! the command data model, the versioned binary marshallers and framing
//! codec, and the transport chain that negotiates the wire format, keeps the
//! connection alive and correlates requests with their responses.

pub mod codec;
pub mod commands;
pub mod marshal;
pub mod metrics;
pub mod transport;
pub mod wire_format;

pub use codec::{CodecError, Frame, OpenWireCodec};
pub use commands::{Command, DataStructure, Response};
pub use marshal::{MarshallerFactory, MarshallerRegistry};
pub use metrics::{Direction, ERRORS_TOTAL, FRAMES_TOTAL, PENDING_REQUESTS, REQUEST_TIMEOUTS_TOTAL};
pub use transport::{Transport, TransportError, TransportFactory, TransportListener};
pub use wire_format::{OpenWireFormat, WireFormatConfig, WireFormatState};
