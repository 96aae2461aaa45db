//! Newtype identifiers for the entity store.
//!
//! Per §9 ("Cyclic references"), Task↔Tool and TaskFile↔consumer relations
//! are naturally cyclic; we avoid raw pointer graphs by addressing every
//! entity through an integer id assigned by the State Store, the way an
//! arena or a relational primary key would.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! entity_id {
    ($name:ident) => {
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            pub fn new(id: i64) -> Self {
                Self(id)
            }

            pub fn value(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }
    };
}

entity_id!(ExecutionId);
entity_id!(StageId);
entity_id!(TaskId);
entity_id!(TaskFileId);
