//! Marshallers for identifiers and destinations.

use super::{DataReader, DataWriter, Marshal, Unmarshal};
use crate::{
    codec::CodecError,
    commands::{
        BrokerId,
        ConnectionId,
        ConsumerId,
        Destination,
        DestinationKind,
        LocalTransactionId,
        MessageId,
        ProducerId,
        SessionId,
        TransactionId,
        XaTransactionId,
        type_tag,
    },
};

impl Marshal for ConnectionId {
    fn data_structure_type(&self) -> u8 { type_tag::CONNECTION_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_string(Some(&self.value))
    }
}

impl Unmarshal for ConnectionId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value: input.read_string()?.unwrap_or_default(),
        })
    }
}

impl Marshal for SessionId {
    fn data_structure_type(&self) -> u8 { type_tag::SESSION_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_string(Some(&self.connection_id))?;
        out.write_i64(self.value);
        Ok(())
    }
}

impl Unmarshal for SessionId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            connection_id: input.read_string()?.unwrap_or_default(),
            value: input.read_i64()?,
        })
    }
}

impl Marshal for ConsumerId {
    fn data_structure_type(&self) -> u8 { type_tag::CONSUMER_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_string(Some(&self.connection_id))?;
        out.write_i64(self.session_id);
        out.write_i64(self.value);
        Ok(())
    }
}

impl Unmarshal for ConsumerId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            connection_id: input.read_string()?.unwrap_or_default(),
            session_id: input.read_i64()?,
            value: input.read_i64()?,
        })
    }
}

impl Marshal for ProducerId {
    fn data_structure_type(&self) -> u8 { type_tag::PRODUCER_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_string(Some(&self.connection_id))?;
        out.write_i64(self.value);
        out.write_i64(self.session_id);
        Ok(())
    }
}

impl Unmarshal for ProducerId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            connection_id: input.read_string()?.unwrap_or_default(),
            value: input.read_i64()?,
            session_id: input.read_i64()?,
        })
    }
}

impl Marshal for BrokerId {
    fn data_structure_type(&self) -> u8 { type_tag::BROKER_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_string(Some(&self.value))
    }
}

impl Unmarshal for BrokerId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value: input.read_string()?.unwrap_or_default(),
        })
    }
}

impl Marshal for MessageId {
    fn data_structure_type(&self) -> u8 { type_tag::MESSAGE_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_cached(self.producer_id.as_ref())?;
        out.write_i64(self.producer_sequence_id);
        out.write_i64(self.broker_sequence_id);
        Ok(())
    }
}

impl Unmarshal for MessageId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            producer_id: input.read_cached()?,
            producer_sequence_id: input.read_i64()?,
            broker_sequence_id: input.read_i64()?,
        })
    }
}

impl Marshal for LocalTransactionId {
    fn data_structure_type(&self) -> u8 { type_tag::LOCAL_TRANSACTION_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_i64(self.value);
        out.write_cached(self.connection_id.as_ref())
    }
}

impl Unmarshal for LocalTransactionId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            value: input.read_i64()?,
            connection_id: input.read_cached()?,
        })
    }
}

impl Marshal for XaTransactionId {
    fn data_structure_type(&self) -> u8 { type_tag::XA_TRANSACTION_ID }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_i32(self.format_id);
        out.write_bytes(self.global_transaction_id.as_deref())?;
        out.write_bytes(self.branch_qualifier.as_deref())
    }
}

impl Unmarshal for XaTransactionId {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            format_id: input.read_i32()?,
            global_transaction_id: input.read_bytes()?,
            branch_qualifier: input.read_bytes()?,
        })
    }
}

impl Marshal for TransactionId {
    fn data_structure_type(&self) -> u8 {
        match self {
            Self::Local(id) => id.data_structure_type(),
            Self::Xa(id) => id.data_structure_type(),
        }
    }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        match self {
            Self::Local(id) => id.marshal(out),
            Self::Xa(id) => id.marshal(out),
        }
    }
}

impl Marshal for Destination {
    fn data_structure_type(&self) -> u8 { self.kind.data_structure_type() }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_string(Some(&self.physical_name))
    }
}

pub(super) fn unmarshal_destination(
    input: &mut DataReader<'_>,
    kind: DestinationKind,
) -> Result<Destination, CodecError> {
    Ok(Destination {
        kind,
        physical_name: input.read_string()?.unwrap_or_default(),
    })
}
