//! Connection, session, producer and consumer lifecycle commands.

use super::{
    BrokerError,
    CommandHeader,
    DataStructure,
    destination::Destination,
    ids::{BrokerId, ConnectionId, ConsumerId, ProducerId, SessionId, TransactionId},
};

/// Broker advertisement sent after a connection is accepted.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BrokerInfo {
    pub header: CommandHeader,
    pub broker_id: Option<BrokerId>,
    pub broker_url: Option<String>,
    pub peer_broker_infos: Vec<BrokerInfo>,
    pub broker_name: Option<String>,
    pub slave_broker: bool,
    pub master_broker: bool,
    pub fault_tolerant_configuration: bool,
    pub duplex_connection: bool,
    pub network_connection: bool,
    pub connection_id: i64,
    pub broker_upload_url: Option<String>,
    pub network_properties: Option<String>,
}

/// Opens a logical connection on the broker.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionInfo {
    pub header: CommandHeader,
    pub connection_id: Option<ConnectionId>,
    pub client_id: Option<String>,
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub broker_path: Vec<BrokerId>,
    pub broker_master_connector: bool,
    pub manageable: bool,
    pub client_master: bool,
    pub fault_tolerant: bool,
    pub failover_reconnect: bool,
}

impl ConnectionInfo {
    #[must_use]
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id: Some(connection_id),
            ..Self::default()
        }
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            header: CommandHeader::default(),
            connection_id: None,
            client_id: None,
            password: None,
            user_name: None,
            broker_path: Vec::new(),
            broker_master_connector: false,
            manageable: false,
            client_master: true,
            fault_tolerant: false,
            failover_reconnect: false,
        }
    }
}

/// Opens a session within a connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct SessionInfo {
    pub header: CommandHeader,
    pub session_id: Option<SessionId>,
}

impl SessionInfo {
    #[must_use]
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id: Some(session_id),
            ..Self::default()
        }
    }
}

/// Registers a message consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConsumerInfo {
    pub header: CommandHeader,
    pub consumer_id: Option<ConsumerId>,
    pub browser: bool,
    pub destination: Option<Destination>,
    pub prefetch_size: i32,
    pub maximum_pending_message_limit: i32,
    pub dispatch_async: bool,
    pub selector: Option<String>,
    pub subscription_name: Option<String>,
    pub no_local: bool,
    pub exclusive: bool,
    pub retroactive: bool,
    pub priority: i8,
    pub broker_path: Vec<BrokerId>,
    pub additional_predicate: Option<Box<DataStructure>>,
    pub network_subscription: bool,
    pub optimized_acknowledge: bool,
    pub no_range_acks: bool,
    pub network_consumer_path: Vec<ConsumerId>,
}

impl ConsumerInfo {
    /// Default number of messages the broker may push ahead of acks.
    pub const DEFAULT_PREFETCH: i32 = 1000;

    #[must_use]
    pub fn new(consumer_id: ConsumerId, destination: Destination) -> Self {
        Self {
            consumer_id: Some(consumer_id),
            destination: Some(destination),
            prefetch_size: Self::DEFAULT_PREFETCH,
            ..Self::default()
        }
    }
}

/// Registers a message producer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ProducerInfo {
    pub header: CommandHeader,
    pub producer_id: Option<ProducerId>,
    pub destination: Option<Destination>,
    pub broker_path: Vec<BrokerId>,
    pub dispatch_async: bool,
    pub window_size: i32,
}

impl ProducerInfo {
    #[must_use]
    pub fn new(producer_id: ProducerId) -> Self {
        Self {
            producer_id: Some(producer_id),
            ..Self::default()
        }
    }
}

/// Begins, commits or rolls back a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TransactionInfo {
    pub header: CommandHeader,
    pub connection_id: Option<ConnectionId>,
    pub transaction_id: Option<TransactionId>,
    pub transaction_type: u8,
}

impl TransactionInfo {
    pub const BEGIN: u8 = 0;
    pub const PREPARE: u8 = 1;
    pub const COMMIT_ONE_PHASE: u8 = 2;
    pub const COMMIT_TWO_PHASE: u8 = 3;
    pub const ROLLBACK: u8 = 4;
    pub const RECOVER: u8 = 5;
    pub const FORGET: u8 = 6;
    pub const END: u8 = 7;
}

/// Disposes of a connection, session, producer or consumer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RemoveInfo {
    pub header: CommandHeader,
    pub object_id: Option<DataStructure>,
    pub last_delivered_sequence_id: i64,
}

impl RemoveInfo {
    #[must_use]
    pub fn new(object_id: impl Into<DataStructure>) -> Self {
        Self {
            object_id: Some(object_id.into()),
            ..Self::default()
        }
    }
}

/// Keep-alive probe exchanged by the inactivity monitors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct KeepAliveInfo {
    pub header: CommandHeader,
}

/// Announces an orderly shutdown.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ShutdownInfo {
    pub header: CommandHeader,
}

/// Asynchronous error pushed by the broker for a whole connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ConnectionError {
    pub header: CommandHeader,
    pub exception: Option<BrokerError>,
    pub connection_id: Option<ConnectionId>,
}
