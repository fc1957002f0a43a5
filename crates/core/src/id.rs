//! Unique identifiers for ledger entities.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unique identifier for a customer record.
///
/// Customer ids are minted by the caller (or the CLI) and are stable for the
/// lifetime of the customer's progress aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CustomerId(Ulid);

impl CustomerId {
    /// Generate a new CustomerId
    pub fn new() -> Self {
        Self(Ulid::new())
    }

    /// Wrap an existing ULID.
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }
}

impl Default for CustomerId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CustomerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::str::FromStr for CustomerId {
    type Err = ulid::DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}
