//! OpenWire commands and the data structures they reference.
//!
//! The model is closed: [`DataStructure`] enumerates every type the codec can
//! carry and [`Command`] enumerates every command. Each variant reports its
//! wire type tag through `data_structure_type`, which is also the registry
//! key used for decoding.

pub mod destination;
pub mod ids;
pub mod info;
pub mod message;
pub mod response;
pub mod wire_format_info;

pub use destination::{Destination, DestinationKind};
pub use ids::{
    BrokerId,
    ConnectionId,
    ConsumerId,
    LocalTransactionId,
    MessageId,
    ProducerId,
    SessionId,
    TransactionId,
    XaTransactionId,
};
pub use info::{
    BrokerInfo,
    ConnectionError,
    ConnectionInfo,
    ConsumerInfo,
    KeepAliveInfo,
    ProducerInfo,
    RemoveInfo,
    SessionInfo,
    ShutdownInfo,
    TransactionInfo,
};
pub use message::{Message, MessageAck, MessageDispatch, MessageKind, MessagePull};
pub use response::{BrokerError, Response, ResponseBody, StackTraceElement};
pub use wire_format_info::WireFormatInfo;

/// Wire type tags. Each concrete type owns exactly one.
pub mod type_tag {
    pub const NULL: u8 = 0;
    pub const WIREFORMAT_INFO: u8 = 1;
    pub const BROKER_INFO: u8 = 2;
    pub const CONNECTION_INFO: u8 = 3;
    pub const SESSION_INFO: u8 = 4;
    pub const CONSUMER_INFO: u8 = 5;
    pub const PRODUCER_INFO: u8 = 6;
    pub const TRANSACTION_INFO: u8 = 7;
    pub const KEEP_ALIVE_INFO: u8 = 10;
    pub const SHUTDOWN_INFO: u8 = 11;
    pub const REMOVE_INFO: u8 = 12;
    pub const CONNECTION_ERROR: u8 = 16;
    pub const MESSAGE_PULL: u8 = 20;
    pub const MESSAGE_DISPATCH: u8 = 21;
    pub const MESSAGE_ACK: u8 = 22;
    pub const MESSAGE: u8 = 23;
    pub const BYTES_MESSAGE: u8 = 24;
    pub const MAP_MESSAGE: u8 = 25;
    pub const OBJECT_MESSAGE: u8 = 26;
    pub const STREAM_MESSAGE: u8 = 27;
    pub const TEXT_MESSAGE: u8 = 28;
    pub const RESPONSE: u8 = 30;
    pub const EXCEPTION_RESPONSE: u8 = 31;
    pub const DATA_RESPONSE: u8 = 32;
    pub const INTEGER_RESPONSE: u8 = 34;
    pub const QUEUE: u8 = 100;
    pub const TOPIC: u8 = 101;
    pub const TEMP_QUEUE: u8 = 102;
    pub const TEMP_TOPIC: u8 = 103;
    pub const MESSAGE_ID: u8 = 110;
    pub const LOCAL_TRANSACTION_ID: u8 = 111;
    pub const XA_TRANSACTION_ID: u8 = 112;
    pub const CONNECTION_ID: u8 = 120;
    pub const SESSION_ID: u8 = 121;
    pub const CONSUMER_ID: u8 = 122;
    pub const PRODUCER_ID: u8 = 123;
    pub const BROKER_ID: u8 = 124;
}

/// Fields shared by every command.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct CommandHeader {
    pub command_id: u32,
    pub response_required: bool,
}

/// Any value the codec can place in a nested reference.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DataStructure {
    ConnectionId(ConnectionId),
    SessionId(SessionId),
    ConsumerId(ConsumerId),
    ProducerId(ProducerId),
    BrokerId(BrokerId),
    MessageId(MessageId),
    TransactionId(TransactionId),
    Destination(Destination),
    Command(Box<Command>),
}

impl DataStructure {
    /// Wire type tag of the contained value.
    #[must_use]
    pub fn data_structure_type(&self) -> u8 {
        match self {
            Self::ConnectionId(_) => type_tag::CONNECTION_ID,
            Self::SessionId(_) => type_tag::SESSION_ID,
            Self::ConsumerId(_) => type_tag::CONSUMER_ID,
            Self::ProducerId(_) => type_tag::PRODUCER_ID,
            Self::BrokerId(_) => type_tag::BROKER_ID,
            Self::MessageId(_) => type_tag::MESSAGE_ID,
            Self::TransactionId(TransactionId::Local(_)) => type_tag::LOCAL_TRANSACTION_ID,
            Self::TransactionId(TransactionId::Xa(_)) => type_tag::XA_TRANSACTION_ID,
            Self::Destination(d) => d.kind.data_structure_type(),
            Self::Command(c) => c.data_structure_type(),
        }
    }
}

/// A top-level unit of wire communication.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    WireFormatInfo(WireFormatInfo),
    BrokerInfo(BrokerInfo),
    ConnectionInfo(ConnectionInfo),
    SessionInfo(SessionInfo),
    ConsumerInfo(ConsumerInfo),
    ProducerInfo(ProducerInfo),
    TransactionInfo(TransactionInfo),
    RemoveInfo(RemoveInfo),
    KeepAliveInfo(KeepAliveInfo),
    ShutdownInfo(ShutdownInfo),
    ConnectionError(ConnectionError),
    MessagePull(MessagePull),
    MessageDispatch(MessageDispatch),
    MessageAck(MessageAck),
    Message(Box<Message>),
    Response(Response),
}

impl Command {
    /// Shared header of the command.
    #[must_use]
    pub fn header(&self) -> &CommandHeader {
        match self {
            Self::WireFormatInfo(c) => &c.header,
            Self::BrokerInfo(c) => &c.header,
            Self::ConnectionInfo(c) => &c.header,
            Self::SessionInfo(c) => &c.header,
            Self::ConsumerInfo(c) => &c.header,
            Self::ProducerInfo(c) => &c.header,
            Self::TransactionInfo(c) => &c.header,
            Self::RemoveInfo(c) => &c.header,
            Self::KeepAliveInfo(c) => &c.header,
            Self::ShutdownInfo(c) => &c.header,
            Self::ConnectionError(c) => &c.header,
            Self::MessagePull(c) => &c.header,
            Self::MessageDispatch(c) => &c.header,
            Self::MessageAck(c) => &c.header,
            Self::Message(c) => &c.header,
            Self::Response(c) => &c.header,
        }
    }

    /// Mutable access to the shared header.
    pub fn header_mut(&mut self) -> &mut CommandHeader {
        match self {
            Self::WireFormatInfo(c) => &mut c.header,
            Self::BrokerInfo(c) => &mut c.header,
            Self::ConnectionInfo(c) => &mut c.header,
            Self::SessionInfo(c) => &mut c.header,
            Self::ConsumerInfo(c) => &mut c.header,
            Self::ProducerInfo(c) => &mut c.header,
            Self::TransactionInfo(c) => &mut c.header,
            Self::RemoveInfo(c) => &mut c.header,
            Self::KeepAliveInfo(c) => &mut c.header,
            Self::ShutdownInfo(c) => &mut c.header,
            Self::ConnectionError(c) => &mut c.header,
            Self::MessagePull(c) => &mut c.header,
            Self::MessageDispatch(c) => &mut c.header,
            Self::MessageAck(c) => &mut c.header,
            Self::Message(c) => &mut c.header,
            Self::Response(c) => &mut c.header,
        }
    }

    #[must_use]
    pub fn command_id(&self) -> u32 { self.header().command_id }

    pub fn set_command_id(&mut self, id: u32) { self.header_mut().command_id = id; }

    #[must_use]
    pub fn is_response_required(&self) -> bool { self.header().response_required }

    pub fn set_response_required(&mut self, required: bool) {
        self.header_mut().response_required = required;
    }

    /// Wire type tag of the command.
    #[must_use]
    pub fn data_structure_type(&self) -> u8 {
        match self {
            Self::WireFormatInfo(_) => type_tag::WIREFORMAT_INFO,
            Self::BrokerInfo(_) => type_tag::BROKER_INFO,
            Self::ConnectionInfo(_) => type_tag::CONNECTION_INFO,
            Self::SessionInfo(_) => type_tag::SESSION_INFO,
            Self::ConsumerInfo(_) => type_tag::CONSUMER_INFO,
            Self::ProducerInfo(_) => type_tag::PRODUCER_INFO,
            Self::TransactionInfo(_) => type_tag::TRANSACTION_INFO,
            Self::RemoveInfo(_) => type_tag::REMOVE_INFO,
            Self::KeepAliveInfo(_) => type_tag::KEEP_ALIVE_INFO,
            Self::ShutdownInfo(_) => type_tag::SHUTDOWN_INFO,
            Self::ConnectionError(_) => type_tag::CONNECTION_ERROR,
            Self::MessagePull(_) => type_tag::MESSAGE_PULL,
            Self::MessageDispatch(_) => type_tag::MESSAGE_DISPATCH,
            Self::MessageAck(_) => type_tag::MESSAGE_ACK,
            Self::Message(m) => m.kind.data_structure_type(),
            Self::Response(r) => r.data_structure_type(),
        }
    }

    #[must_use]
    pub fn is_response(&self) -> bool { matches!(self, Self::Response(_)) }

    #[must_use]
    pub fn is_message(&self) -> bool { matches!(self, Self::Message(_)) }

    #[must_use]
    pub fn is_message_dispatch(&self) -> bool { matches!(self, Self::MessageDispatch(_)) }

    #[must_use]
    pub fn is_wire_format_info(&self) -> bool { matches!(self, Self::WireFormatInfo(_)) }

    #[must_use]
    pub fn is_keep_alive(&self) -> bool { matches!(self, Self::KeepAliveInfo(_)) }

    #[must_use]
    pub fn is_broker_info(&self) -> bool { matches!(self, Self::BrokerInfo(_)) }

    #[must_use]
    pub fn is_shutdown_info(&self) -> bool { matches!(self, Self::ShutdownInfo(_)) }

    /// Short human-readable name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::WireFormatInfo(_) => "WireFormatInfo",
            Self::BrokerInfo(_) => "BrokerInfo",
            Self::ConnectionInfo(_) => "ConnectionInfo",
            Self::SessionInfo(_) => "SessionInfo",
            Self::ConsumerInfo(_) => "ConsumerInfo",
            Self::ProducerInfo(_) => "ProducerInfo",
            Self::TransactionInfo(_) => "TransactionInfo",
            Self::RemoveInfo(_) => "RemoveInfo",
            Self::KeepAliveInfo(_) => "KeepAliveInfo",
            Self::ShutdownInfo(_) => "ShutdownInfo",
            Self::ConnectionError(_) => "ConnectionError",
            Self::MessagePull(_) => "MessagePull",
            Self::MessageDispatch(_) => "MessageDispatch",
            Self::MessageAck(_) => "MessageAck",
            Self::Message(_) => "Message",
            Self::Response(r) if r.is_exception() => "ExceptionResponse",
            Self::Response(_) => "Response",
        }
    }
}

macro_rules! command_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Command {
                fn from(value: $variant) -> Self { Self::$variant(value) }
            }

            impl From<$variant> for DataStructure {
                fn from(value: $variant) -> Self { Self::Command(Box::new(value.into())) }
            }

            impl TryFrom<DataStructure> for $variant {
                type Error = DataStructure;

                fn try_from(value: DataStructure) -> Result<Self, Self::Error> {
                    match value {
                        DataStructure::Command(command) => match *command {
                            Command::$variant(inner) => Ok(inner),
                            other => Err(DataStructure::Command(Box::new(other))),
                        },
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

command_from!(
    WireFormatInfo,
    BrokerInfo,
    ConnectionInfo,
    SessionInfo,
    ConsumerInfo,
    ProducerInfo,
    TransactionInfo,
    RemoveInfo,
    KeepAliveInfo,
    ShutdownInfo,
    ConnectionError,
    MessagePull,
    MessageDispatch,
    MessageAck,
    Response,
);

impl From<Message> for Command {
    fn from(value: Message) -> Self { Self::Message(Box::new(value)) }
}

impl TryFrom<DataStructure> for Message {
    type Error = DataStructure;

    fn try_from(value: DataStructure) -> Result<Self, Self::Error> {
        match value {
            DataStructure::Command(command) => match *command {
                Command::Message(message) => Ok(*message),
                other => Err(DataStructure::Command(Box::new(other))),
            },
            other => Err(other),
        }
    }
}

impl From<Message> for DataStructure {
    fn from(value: Message) -> Self { Self::Command(Box::new(value.into())) }
}

impl From<Command> for DataStructure {
    fn from(value: Command) -> Self { Self::Command(Box::new(value)) }
}

impl TryFrom<DataStructure> for Command {
    type Error = DataStructure;

    fn try_from(value: DataStructure) -> Result<Self, Self::Error> {
        match value {
            DataStructure::Command(command) => Ok(*command),
            other => Err(other),
        }
    }
}

macro_rules! data_structure_from {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for DataStructure {
                fn from(value: $variant) -> Self { Self::$variant(value) }
            }

            impl TryFrom<DataStructure> for $variant {
                type Error = DataStructure;

                fn try_from(value: DataStructure) -> Result<Self, Self::Error> {
                    match value {
                        DataStructure::$variant(inner) => Ok(inner),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

data_structure_from!(
    ConnectionId,
    SessionId,
    ConsumerId,
    ProducerId,
    BrokerId,
    MessageId,
    TransactionId,
    Destination,
);

impl From<LocalTransactionId> for DataStructure {
    fn from(value: LocalTransactionId) -> Self { Self::TransactionId(value.into()) }
}

impl From<XaTransactionId> for DataStructure {
    fn from(value: XaTransactionId) -> Self { Self::TransactionId(value.into()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_accessors_cover_every_variant() {
        let mut command = Command::from(KeepAliveInfo::default());
        command.set_command_id(42);
        command.set_response_required(true);
        assert_eq!(command.command_id(), 42);
        assert!(command.is_response_required());
        assert!(command.is_keep_alive());
        assert_eq!(command.data_structure_type(), type_tag::KEEP_ALIVE_INFO);
    }

    #[test]
    fn data_structure_conversions_report_mismatches() {
        let value = DataStructure::from(Destination::queue("q"));
        assert_eq!(value.data_structure_type(), type_tag::QUEUE);
        let rejected = ConsumerId::try_from(value).expect_err("not a consumer id");
        assert_eq!(rejected.data_structure_type(), type_tag::QUEUE);

        let command = DataStructure::from(SessionInfo::default());
        assert_eq!(command.data_structure_type(), type_tag::SESSION_INFO);
        assert!(SessionInfo::try_from(command).is_ok());
    }

    #[test]
    fn messages_report_their_kind_tag() {
        let message = Message::new(MessageKind::Bytes, Destination::queue("q"));
        let command = Command::from(message);
        assert!(command.is_message());
        assert_eq!(command.data_structure_type(), type_tag::BYTES_MESSAGE);
    }
}
