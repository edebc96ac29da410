//! Newtype domain identifiers.
//!
//! Every domain concept that has an identity is represented as a distinct newtype
//! wrapping a primitive. This prevents accidentally passing an environment name
//! where a snapshot identifier is expected even though both are strings on the
//! wire.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EmptyIdentifier;

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display, and a
// TryFrom<String> that deserialisation goes through so empty values never
// slip in from the wire.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String")]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = EmptyIdentifier;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value).ok_or(EmptyIdentifier(stringify!($name)))
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Identifiers — String-backed (assigned upstream)
// ---------------------------------------------------------------------------

string_id! {
    /// Names a hosted application environment.
    ///
    /// This is the Kubernetes namespace / OpenShift project name the backup tool
    /// reports under, and the key the Lagoon API uses to look up an environment.
    EnvironmentName
}

string_id! {
    /// Identifies one physical restic snapshot.
    ///
    /// The same value is used as the `backupId` of the matching record in the
    /// Lagoon API, which makes it the sole de-duplication key.
    SnapshotId
}

// ---------------------------------------------------------------------------
// Identifiers — UUID-backed (internally generated)
// ---------------------------------------------------------------------------

/// Identifies one outbound event.
///
/// Generated fresh immediately before an event is handed to the publisher;
/// serialised as the envelope's `uuid` field so consumers can correlate logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Generates a new random event identifier.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying [`Uuid`].
    pub fn as_uuid(self) -> Uuid {
        self.0
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_ids_are_rejected() {
        assert!(EnvironmentName::new("").is_none());
        assert!(SnapshotId::new("").is_none());
        assert_eq!(SnapshotId::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn string_ids_serialise_as_plain_strings() {
        let id = SnapshotId::new("4f1c2a").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"4f1c2a\"");

        let back: SnapshotId = serde_json::from_str("\"4f1c2a\"").unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn empty_string_ids_are_rejected_on_the_wire() {
        let err = serde_json::from_str::<SnapshotId>("\"\"").unwrap_err();
        assert!(err.to_string().contains("SnapshotId must not be empty"));

        assert!(serde_json::from_str::<EnvironmentName>("\"\"").is_err());
    }

    #[test]
    fn event_ids_are_unique_v4_uuids() {
        let a = EventId::new_random();
        let b = EventId::new_random();
        assert_ne!(a, b);
        assert_eq!(a.as_uuid().get_version_num(), 4);
    }
}
