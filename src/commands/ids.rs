//! Identifier types for connections, sessions, producers, consumers,
//! messages and transactions.

use std::fmt;

use uuid::Uuid;

/// Identifies a client connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId {
    pub value: String,
}

impl ConnectionId {
    /// Wraps an existing identifier string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }

    /// Generates a fresh identifier of the form `ID:<uuid>`.
    #[must_use]
    pub fn generate() -> Self { Self::new(format!("ID:{}", Uuid::new_v4())) }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.value) }
}

/// Identifies a session within a connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId {
    pub connection_id: String,
    pub value: i64,
}

impl SessionId {
    /// Creates the `value`th session of `connection`.
    #[must_use]
    pub fn new(connection: &ConnectionId, value: i64) -> Self {
        Self {
            connection_id: connection.value.clone(),
            value,
        }
    }

    /// Returns the owning connection.
    #[must_use]
    pub fn parent_id(&self) -> ConnectionId { ConnectionId::new(self.connection_id.clone()) }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.connection_id, self.value)
    }
}

/// Identifies a consumer within a session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId {
    pub connection_id: String,
    pub session_id: i64,
    pub value: i64,
}

impl ConsumerId {
    /// Creates the `value`th consumer of `session`.
    #[must_use]
    pub fn new(session: &SessionId, value: i64) -> Self {
        Self {
            connection_id: session.connection_id.clone(),
            session_id: session.value,
            value,
        }
    }

    /// Returns the owning session.
    #[must_use]
    pub fn parent_id(&self) -> SessionId {
        SessionId {
            connection_id: self.connection_id.clone(),
            value: self.session_id,
        }
    }
}

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.connection_id, self.session_id, self.value)
    }
}

/// Identifies a producer within a session.
///
/// The field order mirrors the wire layout, which places the producer value
/// before the session value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProducerId {
    pub connection_id: String,
    pub value: i64,
    pub session_id: i64,
}

impl ProducerId {
    /// Creates the `value`th producer of `session`.
    #[must_use]
    pub fn new(session: &SessionId, value: i64) -> Self {
        Self {
            connection_id: session.connection_id.clone(),
            value,
            session_id: session.value,
        }
    }

    /// Returns the owning session.
    #[must_use]
    pub fn parent_id(&self) -> SessionId {
        SessionId {
            connection_id: self.connection_id.clone(),
            value: self.session_id,
        }
    }
}

impl fmt::Display for ProducerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.connection_id, self.session_id, self.value)
    }
}

/// Identifies a broker in a network of brokers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BrokerId {
    pub value: String,
}

impl BrokerId {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Identifies a message by producer and sequence numbers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct MessageId {
    pub producer_id: Option<ProducerId>,
    pub producer_sequence_id: i64,
    pub broker_sequence_id: i64,
}

impl MessageId {
    /// Creates the id of the `sequence`th message sent by `producer`.
    #[must_use]
    pub fn new(producer: &ProducerId, sequence: i64) -> Self {
        Self {
            producer_id: Some(producer.clone()),
            producer_sequence_id: sequence,
            broker_sequence_id: 0,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.producer_id {
            Some(producer) => write!(f, "{producer}:{}", self.producer_sequence_id),
            None => write!(f, "{}", self.producer_sequence_id),
        }
    }
}

/// A transaction scoped to one connection.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LocalTransactionId {
    pub value: i64,
    pub connection_id: Option<ConnectionId>,
}

/// A distributed (XA) transaction branch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct XaTransactionId {
    pub format_id: i32,
    pub global_transaction_id: Option<Vec<u8>>,
    pub branch_qualifier: Option<Vec<u8>>,
}

/// Either kind of transaction identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TransactionId {
    Local(LocalTransactionId),
    Xa(XaTransactionId),
}

impl From<LocalTransactionId> for TransactionId {
    fn from(value: LocalTransactionId) -> Self { Self::Local(value) }
}

impl From<XaTransactionId> for TransactionId {
    fn from(value: XaTransactionId) -> Self { Self::Xa(value) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_ids_inherit_their_parents() {
        let connection = ConnectionId::new("ID:test-1");
        let session = SessionId::new(&connection, 2);
        let consumer = ConsumerId::new(&session, 3);
        let producer = ProducerId::new(&session, 4);

        assert_eq!(consumer.parent_id(), session);
        assert_eq!(producer.parent_id(), session);
        assert_eq!(session.parent_id(), connection);
        assert_eq!(consumer.to_string(), "ID:test-1:2:3");
        assert_eq!(MessageId::new(&producer, 9).to_string(), "ID:test-1:2:4:9");
    }

    #[test]
    fn generated_connection_ids_are_unique() {
        let a = ConnectionId::generate();
        let b = ConnectionId::generate();
        assert!(a.value.starts_with("ID:"));
        assert_ne!(a, b);
    }
}
