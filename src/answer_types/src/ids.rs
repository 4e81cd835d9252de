//! Domain identifiers.
//!
//! The orchestrator juggles several `u64` ids at once (query, brand,
//! customer, execution, collector result) on the same call paths, so these
//! are newtypes rather than bare `u64`/type aliases: mixing up a `BrandId`
//! and a `CustomerId` would compile silently with aliases.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                $name(v)
            }
        }
    };
}

id_type!(QueryId);
id_type!(BrandId);
id_type!(CustomerId);
id_type!(ExecutionId);
id_type!(CollectorResultId);
