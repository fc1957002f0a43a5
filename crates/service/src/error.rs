//! Service errors.

use ledger_core::{CustomerId, LedgerError};
use ledger_storage::StorageError;
use thiserror::Error;

/// Result type for ledger service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Error type for ledger service operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A domain rule rejected the operation
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The storage backend failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// No record exists for the customer
    #[error("customer {0} not found")]
    CustomerNotFound(CustomerId),

    /// A record already exists for the customer
    #[error("customer {0} is already enrolled")]
    AlreadyEnrolled(CustomerId),
}

impl ServiceError {
    /// Whether the error came from a domain rule rather than the backend.
    pub fn is_rule_violation(&self) -> bool {
        matches!(self, ServiceError::Ledger(_))
    }
}
