//! Queue and topic destinations.

use std::fmt;

use super::type_tag;

/// Kind of destination, which selects the wire type tag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DestinationKind {
    #[default]
    Queue,
    Topic,
    TempQueue,
    TempTopic,
}

impl DestinationKind {
    /// Wire type tag for this kind.
    #[must_use]
    pub fn data_structure_type(self) -> u8 {
        match self {
            Self::Queue => type_tag::QUEUE,
            Self::Topic => type_tag::TOPIC,
            Self::TempQueue => type_tag::TEMP_QUEUE,
            Self::TempTopic => type_tag::TEMP_TOPIC,
        }
    }

    fn scheme(self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Topic => "topic",
            Self::TempQueue => "temp-queue",
            Self::TempTopic => "temp-topic",
        }
    }
}

/// A named queue or topic on the broker.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Destination {
    pub kind: DestinationKind,
    pub physical_name: String,
}

impl Destination {
    #[must_use]
    pub fn new(kind: DestinationKind, physical_name: impl Into<String>) -> Self {
        Self {
            kind,
            physical_name: physical_name.into(),
        }
    }

    #[must_use]
    pub fn queue(name: impl Into<String>) -> Self { Self::new(DestinationKind::Queue, name) }

    #[must_use]
    pub fn topic(name: impl Into<String>) -> Self { Self::new(DestinationKind::Topic, name) }

    #[must_use]
    pub fn is_topic(&self) -> bool {
        matches!(self.kind, DestinationKind::Topic | DestinationKind::TempTopic)
    }

    #[must_use]
    pub fn is_temporary(&self) -> bool {
        matches!(
            self.kind,
            DestinationKind::TempQueue | DestinationKind::TempTopic
        )
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.kind.scheme(), self.physical_name)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(DestinationKind::Queue, 100, "queue://orders")]
    #[case(DestinationKind::Topic, 101, "topic://orders")]
    #[case(DestinationKind::TempQueue, 102, "temp-queue://orders")]
    #[case(DestinationKind::TempTopic, 103, "temp-topic://orders")]
    fn kinds_map_to_tags_and_schemes(
        #[case] kind: DestinationKind,
        #[case] tag: u8,
        #[case] shown: &str,
    ) {
        let destination = Destination::new(kind, "orders");
        assert_eq!(kind.data_structure_type(), tag);
        assert_eq!(destination.to_string(), shown);
    }
}
