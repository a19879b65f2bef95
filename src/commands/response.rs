//! Replies correlated to requests, and the remote error description they
//! may carry.

use std::fmt;

use super::{CommandHeader, DataStructure, type_tag};

/// One frame of a remote stack trace.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct StackTraceElement {
    pub declaring_class: Option<String>,
    pub method_name: Option<String>,
    pub file_name: Option<String>,
    pub line_number: i32,
}

/// Error reported by the broker, as carried by exception responses and
/// connection errors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BrokerError {
    pub exception_class: Option<String>,
    pub message: Option<String>,
    pub stack_trace: Vec<StackTraceElement>,
    pub cause: Option<Box<BrokerError>>,
}

impl BrokerError {
    #[must_use]
    pub fn new(exception_class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            exception_class: Some(exception_class.into()),
            message: Some(message.into()),
            ..Self::default()
        }
    }

    /// Returns a copy without stack frames or causes.
    #[must_use]
    pub fn without_stack_trace(&self) -> Self {
        Self {
            exception_class: self.exception_class.clone(),
            message: self.message.clone(),
            stack_trace: Vec::new(),
            cause: None,
        }
    }
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let class = self.exception_class.as_deref().unwrap_or("UnknownException");
        match &self.message {
            Some(message) => write!(f, "{class}: {message}"),
            None => f.write_str(class),
        }
    }
}

impl std::error::Error for BrokerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause
            .as_deref()
            .map(|cause| cause as &(dyn std::error::Error + 'static))
    }
}

/// Payload variants of a [`Response`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ResponseBody {
    /// Plain acknowledgement.
    #[default]
    Empty,
    /// The request failed on the broker.
    Exception(Option<BrokerError>),
    /// Result carried as a data structure.
    Data(Option<Box<DataStructure>>),
    /// Result carried as an integer.
    Integer(i32),
}

/// Reply to a command sent with `response_required` set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Response {
    pub header: CommandHeader,
    /// Command id of the request being answered.
    pub correlation_id: u32,
    pub body: ResponseBody,
}

impl Response {
    /// Plain acknowledgement of `correlation_id`.
    #[must_use]
    pub fn ack(correlation_id: u32) -> Self {
        Self {
            correlation_id,
            ..Self::default()
        }
    }

    /// Failure reply for `correlation_id`.
    #[must_use]
    pub fn exception(correlation_id: u32, error: BrokerError) -> Self {
        Self {
            correlation_id,
            body: ResponseBody::Exception(Some(error)),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_exception(&self) -> bool { matches!(self.body, ResponseBody::Exception(_)) }

    /// Returns the carried broker error, if this is an exception response.
    #[must_use]
    pub fn error(&self) -> Option<&BrokerError> {
        match &self.body {
            ResponseBody::Exception(error) => error.as_ref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn data_structure_type(&self) -> u8 {
        match self.body {
            ResponseBody::Empty => type_tag::RESPONSE,
            ResponseBody::Exception(_) => type_tag::EXCEPTION_RESPONSE,
            ResponseBody::Data(_) => type_tag::DATA_RESPONSE,
            ResponseBody::Integer(_) => type_tag::INTEGER_RESPONSE,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn display_and_source_follow_the_cause_chain() {
        let mut error = BrokerError::new("javax.jms.JMSException", "denied");
        error.cause = Some(Box::new(BrokerError::new("java.lang.SecurityException", "no")));
        assert_eq!(error.to_string(), "javax.jms.JMSException: denied");
        let source = error.source().expect("cause");
        assert_eq!(source.to_string(), "java.lang.SecurityException: no");
    }

    #[test]
    fn body_selects_type_tag() {
        assert_eq!(Response::ack(1).data_structure_type(), 30);
        let failed = Response::exception(1, BrokerError::new("E", "m"));
        assert!(failed.is_exception());
        assert_eq!(failed.data_structure_type(), 31);
        assert_eq!(failed.error().and_then(|e| e.message.as_deref()), Some("m"));
    }
}
