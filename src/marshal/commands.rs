//! Marshallers for handshake and lifecycle commands.

use bytes::BytesMut;

use super::{DataReader, DataWriter, Marshal, Unmarshal};
use crate::{
    codec::{
        CodecError,
        DataInput,
        primitive_map::{marshal_primitive_map, unmarshal_primitive_map},
    },
    commands::{
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
        WireFormatInfo,
        type_tag,
    },
};

impl Marshal for WireFormatInfo {
    fn data_structure_type(&self) -> u8 { type_tag::WIREFORMAT_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_const_bytes(&self.magic);
        out.write_u32(self.version);
        if self.properties.is_empty() {
            return out.write_bytes(None);
        }
        let mut properties = BytesMut::new();
        marshal_primitive_map(Some(&self.properties), &mut properties)?;
        out.write_bytes(Some(&properties))
    }
}

impl Unmarshal for WireFormatInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        let magic = input.read_const_bytes::<8>()?;
        let version = input.read_u32()?;
        let properties = match input.read_bytes()? {
            Some(raw) => unmarshal_primitive_map(&mut DataInput::new(&raw))?.unwrap_or_default(),
            None => Default::default(),
        };
        Ok(Self {
            magic,
            version,
            properties,
            ..Self::default()
        })
    }
}

impl Marshal for BrokerInfo {
    fn data_structure_type(&self) -> u8 { type_tag::BROKER_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.broker_id.as_ref())?;
        out.write_string(self.broker_url.as_deref())?;
        out.write_array(&self.peer_broker_infos)?;
        out.write_string(self.broker_name.as_deref())?;
        out.write_bool(self.slave_broker);
        out.write_bool(self.master_broker);
        out.write_bool(self.fault_tolerant_configuration);
        if out.version() >= 2 {
            out.write_bool(self.duplex_connection);
            out.write_bool(self.network_connection);
            out.write_i64(self.connection_id);
        }
        if out.version() >= 3 {
            out.write_string(self.broker_upload_url.as_deref())?;
            out.write_string(self.network_properties.as_deref())?;
        }
        Ok(())
    }
}

impl Unmarshal for BrokerInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        let mut info = Self {
            header: input.read_command_header()?,
            broker_id: input.read_cached()?,
            broker_url: input.read_string()?,
            peer_broker_infos: input.read_array()?,
            broker_name: input.read_string()?,
            slave_broker: input.read_bool()?,
            master_broker: input.read_bool()?,
            fault_tolerant_configuration: input.read_bool()?,
            ..Self::default()
        };
        if input.version() >= 2 {
            info.duplex_connection = input.read_bool()?;
            info.network_connection = input.read_bool()?;
            info.connection_id = input.read_i64()?;
        }
        if input.version() >= 3 {
            info.broker_upload_url = input.read_string()?;
            info.network_properties = input.read_string()?;
        }
        Ok(info)
    }
}

impl Marshal for ConnectionInfo {
    fn data_structure_type(&self) -> u8 { type_tag::CONNECTION_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.connection_id.as_ref())?;
        out.write_string(self.client_id.as_deref())?;
        out.write_string(self.password.as_deref())?;
        out.write_string(self.user_name.as_deref())?;
        out.write_array(&self.broker_path)?;
        out.write_bool(self.broker_master_connector);
        out.write_bool(self.manageable);
        if out.version() >= 2 {
            out.write_bool(self.client_master);
        }
        if out.version() >= 6 {
            out.write_bool(self.fault_tolerant);
            out.write_bool(self.failover_reconnect);
        }
        Ok(())
    }
}

impl Unmarshal for ConnectionInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        let mut info = Self {
            header: input.read_command_header()?,
            connection_id: input.read_cached()?,
            client_id: input.read_string()?,
            password: input.read_string()?,
            user_name: input.read_string()?,
            broker_path: input.read_array()?,
            broker_master_connector: input.read_bool()?,
            manageable: input.read_bool()?,
            ..Self::default()
        };
        if input.version() >= 2 {
            info.client_master = input.read_bool()?;
        }
        if input.version() >= 6 {
            info.fault_tolerant = input.read_bool()?;
            info.failover_reconnect = input.read_bool()?;
        }
        Ok(info)
    }
}

impl Marshal for SessionInfo {
    fn data_structure_type(&self) -> u8 { type_tag::SESSION_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.session_id.as_ref())
    }
}

impl Unmarshal for SessionInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: input.read_command_header()?,
            session_id: input.read_cached()?,
        })
    }
}

impl Marshal for ConsumerInfo {
    fn data_structure_type(&self) -> u8 { type_tag::CONSUMER_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.consumer_id.as_ref())?;
        out.write_bool(self.browser);
        out.write_cached(self.destination.as_ref())?;
        out.write_i32(self.prefetch_size);
        out.write_i32(self.maximum_pending_message_limit);
        out.write_bool(self.dispatch_async);
        out.write_string(self.selector.as_deref())?;
        out.write_string(self.subscription_name.as_deref())?;
        out.write_bool(self.no_local);
        out.write_bool(self.exclusive);
        out.write_bool(self.retroactive);
        out.write_i8(self.priority);
        out.write_array(&self.broker_path)?;
        out.write_nested(self.additional_predicate.as_deref())?;
        out.write_bool(self.network_subscription);
        out.write_bool(self.optimized_acknowledge);
        out.write_bool(self.no_range_acks);
        if out.version() >= 4 {
            out.write_array(&self.network_consumer_path)?;
        }
        Ok(())
    }
}

impl Unmarshal for ConsumerInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        let mut info = Self {
            header: input.read_command_header()?,
            consumer_id: input.read_cached()?,
            browser: input.read_bool()?,
            destination: input.read_cached()?,
            prefetch_size: input.read_i32()?,
            maximum_pending_message_limit: input.read_i32()?,
            dispatch_async: input.read_bool()?,
            selector: input.read_string()?,
            subscription_name: input.read_string()?,
            no_local: input.read_bool()?,
            exclusive: input.read_bool()?,
            retroactive: input.read_bool()?,
            priority: input.read_i8()?,
            broker_path: input.read_array()?,
            additional_predicate: input.read_nested_any()?.map(Box::new),
            network_subscription: input.read_bool()?,
            optimized_acknowledge: input.read_bool()?,
            no_range_acks: input.read_bool()?,
            ..Self::default()
        };
        if input.version() >= 4 {
            info.network_consumer_path = input.read_array()?;
        }
        Ok(info)
    }
}

impl Marshal for ProducerInfo {
    fn data_structure_type(&self) -> u8 { type_tag::PRODUCER_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.producer_id.as_ref())?;
        out.write_cached(self.destination.as_ref())?;
        out.write_array(&self.broker_path)?;
        if out.version() >= 2 {
            out.write_bool(self.dispatch_async);
        }
        if out.version() >= 3 {
            out.write_i32(self.window_size);
        }
        Ok(())
    }
}

impl Unmarshal for ProducerInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        let mut info = Self {
            header: input.read_command_header()?,
            producer_id: input.read_cached()?,
            destination: input.read_cached()?,
            broker_path: input.read_array()?,
            ..Self::default()
        };
        if input.version() >= 2 {
            info.dispatch_async = input.read_bool()?;
        }
        if input.version() >= 3 {
            info.window_size = input.read_i32()?;
        }
        Ok(info)
    }
}

impl Marshal for TransactionInfo {
    fn data_structure_type(&self) -> u8 { type_tag::TRANSACTION_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.connection_id.as_ref())?;
        out.write_cached(self.transaction_id.as_ref())?;
        out.write_u8(self.transaction_type);
        Ok(())
    }
}

impl Unmarshal for TransactionInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: input.read_command_header()?,
            connection_id: input.read_cached()?,
            transaction_id: input.read_cached()?,
            transaction_type: input.read_u8()?,
        })
    }
}

impl Marshal for RemoveInfo {
    fn data_structure_type(&self) -> u8 { type_tag::REMOVE_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_cached(self.object_id.as_ref())?;
        if out.version() >= 5 {
            out.write_i64(self.last_delivered_sequence_id);
        }
        Ok(())
    }
}

impl Unmarshal for RemoveInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        let mut info = Self {
            header: input.read_command_header()?,
            object_id: input.read_cached_any()?,
            ..Self::default()
        };
        if input.version() >= 5 {
            info.last_delivered_sequence_id = input.read_i64()?;
        }
        Ok(info)
    }
}

impl Marshal for KeepAliveInfo {
    fn data_structure_type(&self) -> u8 { type_tag::KEEP_ALIVE_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        Ok(())
    }
}

impl Unmarshal for KeepAliveInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: input.read_command_header()?,
        })
    }
}

impl Marshal for ShutdownInfo {
    fn data_structure_type(&self) -> u8 { type_tag::SHUTDOWN_INFO }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        Ok(())
    }
}

impl Unmarshal for ShutdownInfo {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: input.read_command_header()?,
        })
    }
}

impl Marshal for ConnectionError {
    fn data_structure_type(&self) -> u8 { type_tag::CONNECTION_ERROR }

    fn marshal(&self, out: &mut DataWriter<'_>) -> Result<(), CodecError> {
        out.write_command_header(&self.header);
        out.write_throwable(self.exception.as_ref())?;
        out.write_nested(self.connection_id.as_ref())
    }
}

impl Unmarshal for ConnectionError {
    fn unmarshal(input: &mut DataReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            header: input.read_command_header()?,
            exception: input.read_throwable()?,
            connection_id: input.read_nested()?,
        })
    }
}
