//! Typed, prefixed identifiers for every entity in the coordination core.
//!
//! Wire format is `<prefix>-<uuid>`, matching the ID format in the service
//! interface (`^([a-z]{2,4})-[0-9a-f-]{36}$`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error returned when parsing a prefixed id fails.
#[derive(Debug, thiserror::Error)]
#[error("invalid {expected}-prefixed id: {input}")]
pub struct IdParseError {
    expected: &'static str,
    input: String,
}

macro_rules! prefixed_id {
    ($name:ident, $prefix:literal) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}-{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let rest = s.strip_prefix(concat!($prefix, "-")).ok_or_else(|| IdParseError {
                    expected: $prefix,
                    input: s.to_string(),
                })?;
                let uuid = Uuid::parse_str(rest).map_err(|_| IdParseError {
                    expected: $prefix,
                    input: s.to_string(),
                })?;
                Ok(Self(uuid))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

prefixed_id!(MissionId, "msn");
prefixed_id!(SortieId, "srt");
prefixed_id!(WorkOrderId, "wo");
prefixed_id!(EventId, "evt");
prefixed_id!(CheckpointId, "chk");
prefixed_id!(ReservationId, "rsv");
prefixed_id!(LockId, "lck");
prefixed_id!(AssignmentId, "asg");
prefixed_id!(PatternId, "pat");
prefixed_id!(OutcomeId, "out");
prefixed_id!(PilotId, "plt");

/// Monotonically increasing per-stream sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Sequence(pub u64);

impl Sequence {
    pub const ZERO: Sequence = Sequence(0);

    pub fn next(self) -> Self {
        Sequence(self.0 + 1)
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_display_and_parse() {
        let id = MissionId::new();
        let rendered = id.to_string();
        assert!(rendered.starts_with("msn-"));
        let parsed: MissionId = rendered.parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_wrong_prefix() {
        let rendered = SortieId::new().to_string();
        assert!(rendered.parse::<WorkOrderId>().is_err());
    }

    #[test]
    fn sequence_is_strictly_increasing() {
        let a = Sequence::ZERO;
        let b = a.next();
        assert!(b > a);
        assert_eq!(b.0, 1);
    }
}
