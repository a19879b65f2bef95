//! Marshallers for messages and message flow commands.

use bytes::Bytes;

use super::{DataReader, DataWriter, Marshal, Unmarshal};
use crate::{
    codec::CodecError,
    commands::{Message, MessageAck, MessageDispatch, MessageKind, MessagePull, type_tag},
};

impl Marshal for Message {
    fn data_structure_type(&self) -> u8 { self.kind.data_structure_type() }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.producer_id.as_ref())?;
        out.write_cached(self.destination.as_ref())?;
        out.write_cached(self.transaction_id.as_ref())?;
        out.write_cached(self.original_destination.as_ref())?;
        out.write_nested(self.message_id.as_ref())?;
        out.write_cached(self.original_transaction_id.as_ref())?;
        out.write_string(self.group_id.as_deref())?;
        out.write_i32(self.group_sequence);
        out.write_string(self.correlation_id.as_deref())?;
        out.write_bool(self.persistent);
        out.write_i64(self.expiration);
        out.write_i8(self.priority);
        out.write_cached(self.reply_to.as_ref())?;
        out.write_i64(self.timestamp);
        out.write_string(self.message_type.as_deref())?;
        out.write_bytes(self.content.as_deref())?;
        out.write_bytes(self.marshalled_properties.as_deref())?;
        out.write_nested(self.data_structure.as_deref())?;
        out.write_cached(self.target_consumer_id.as_ref())?;
        out.write_bool(self.compressed);
        out.write_i32(self.redelivery_counter);
        out.write_array(&self.broker_path)?;
        out.write_i64(self.arrival);
        out.write_string(self.user_id.as_deref())?;
        out.write_bool(self.received_by_df_bridge);
        if out.version() >= 2 {
            out.write_bool(self.droppable);
        }
        if out.version() >= 3 {
            out.write_array(&self.cluster)?;
            out.write_i64(self.broker_in_time);
            out.write_i64(self.broker_out_time);
        }
        Ok(())
    }

    fn is_marshal_aware(&self) -> bool { true }
}

/// Decodes a message of the given kind. Every kind shares one layout.
pub(super) fn unmarshal_message(
    input: &mut DataReader<'_>,
    kind: MessageKind,
) -> Result<Message, CodecError> {
    let mut message = Message {
        header: input.read_command_header()?,
        kind,
        producer_id: input.read_cached()?,
        destination: input.read_cached()?,
        transaction_id: input.read_cached()?,
        original_destination: input.read_cached()?,
        message_id: input.read_nested()?,
        original_transaction_id: input.read_cached()?,
        group_id: input.read_string()?,
        group_sequence: input.read_i32()?,
        correlation_id: input.read_string()?,
        persistent: input.read_bool()?,
        expiration: input.read_i64()?,
        priority: input.read_i8()?,
        reply_to: input.read_cached()?,
        timestamp: input.read_i64()?,
        message_type: input.read_string()?,
        content: input.read_bytes()?.map(Bytes::from),
        marshalled_properties: input.read_bytes()?.map(Bytes::from),
        data_structure: input.read_nested_any()?.map(Box::new),
        target_consumer_id: input.read_cached()?,
        compressed: input.read_bool()?,
        redelivery_counter: input.read_i32()?,
        broker_path: input.read_array()?,
        arrival: input.read_i64()?,
        user_id: input.read_string()?,
        received_by_df_bridge: input.read_bool()?,
        ..Message::default()
    };
    if input.version() >= 2 {
        message.droppable = input.read_bool()?;
    }
    if input.version() >= 3 {
        message.cluster = input.read_array()?;
        message.broker_in_time = input.read_i64()?;
        message.broker_out_time = input.read_i64()?;
    }
    Ok(message)
}

impl Marshal for MessageAck {
    fn data_structure_type(&self) -> u8 { type_tag::MESSAGE_ACK }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.destination.as_ref())?;
        out.write_cached(self.transaction_id.as_ref())?;
        out.write_cached(self.consumer_id.as_ref())?;
        out.write_u8(self.ack_type);
        out.write_nested(self.first_message_id.as_ref())?;
        out.write_nested(self.last_message_id.as_ref())?;
        out.write_i32(self.message_count);
        Ok(())
    }
}

impl Unmarshal for MessageAck {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: input.read_command_header()?,
            destination: input.read_cached()?,
            transaction_id: input.read_cached()?,
            consumer_id: input.read_cached()?,
            ack_type: input.read_u8()?,
            first_message_id: input.read_nested()?,
            last_message_id: input.read_nested()?,
            message_count: input.read_i32()?,
        })
    }
}

impl Marshal for MessagePull {
    fn data_structure_type(&self) -> u8 { type_tag::MESSAGE_PULL }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.consumer_id.as_ref())?;
        out.write_cached(self.destination.as_ref())?;
        out.write_i64(self.timeout);
        if out.version() >= 3 {
            out.write_string(self.correlation_id.as_deref())?;
            out.write_nested(self.message_id.as_ref())?;
        }
        Ok(())
    }
}

impl Unmarshal for MessagePull {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        let mut pull = Self {
            header: input.read_command_header()?,
            consumer_id: input.read_cached()?,
            destination: input.read_cached()?,
            timeout: input.read_i64()?,
            ..Self::default()
        };
        if input.version() >= 3 {
            pull.correlation_id = input.read_string()?;
            pull.message_id = input.read_nested()?;
        }
        Ok(pull)
    }
}

impl Marshal for MessageDispatch {
    fn data_structure_type(&self) -> u8 { type_tag::MESSAGE_DISPATCH }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.consumer_id.as_ref())?;
        out.write_cached(self.destination.as_ref())?;
        out.write_nested(self.message.as_deref())?;
        out.write_i32(self.redelivery_counter);
        Ok(())
    }
}

impl Unmarshal for MessageDispatch {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: input.read_command_header()?,
            consumer_id: input.read_cached()?,
            destination: input.read_cached()?,
            message: input.read_nested::<Message>()?.map(Box::new),
            redelivery_counter: input.read_i32()?,
        })
    }
}
