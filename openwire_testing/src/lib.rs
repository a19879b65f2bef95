//! Utilities for exercising `openwire` transports in memory.
//!
//! [`ScriptedBroker`] plays the broker end of a `tokio::io::duplex` stream
//! so a full transport chain can be driven without a network.
//!
//! ```rust
//! use openwire::{Transport, TransportFactory, transport::TransportConfig};
//! use openwire_testing::{RecordingListener, ScriptedBroker};
//!
//! # async fn example() {
//! let (client, mut broker) = ScriptedBroker::pair(Default::default());
//! let chain = TransportFactory::new()
//!     .expect("factory")
//!     .compose(client, &TransportConfig::default())
//!     .expect("chain");
//! chain.set_transport_listener(RecordingListener::new());
//! chain.start().await.expect("start");
//! let advertised = broker.handshake().await;
//! assert_eq!(advertised.version, 6);
//! # }
//! ```

pub mod broker;
pub mod listener;
pub mod logging;
pub mod metrics;
pub mod stub;

pub use broker::ScriptedBroker;
pub use listener::RecordingListener;
pub use logging::{LoggerHandle, logger};
pub use metrics::{counter_value, gauge_value, recorder};
pub use stub::StubTransport;
