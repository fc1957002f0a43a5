//! Storage trait abstraction.

use async_trait::async_trait;
use ledger_core::CustomerId;
use ledger_progress::CustomerProgress;

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The stored record moved on since the caller loaded it
    #[error("revision conflict for customer {customer}: expected {expected}, found {found}")]
    Conflict {
        /// Customer whose record conflicted
        customer: CustomerId,
        /// Revision the caller's copy was loaded at
        expected: u64,
        /// Revision currently stored
        found: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Storage abstraction for customer progress records.
///
/// Saves are guarded by the aggregate's `revision`: a save succeeds only if
/// the stored revision still equals the one the copy was loaded at (zero for
/// a record that was never saved). Changes since the last `commit` can be
/// undone with `rollback`.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Customer operations ===

    /// Save a customer record (create or update) and return its new revision.
    async fn save_customer(&mut self, progress: &CustomerProgress) -> Result<u64>;

    /// Load a customer record by ID.
    async fn load_customer(&self, id: CustomerId) -> Result<Option<CustomerProgress>>;

    /// List all customer records, oldest enrollment first.
    async fn list_customers(&self) -> Result<Vec<CustomerProgress>>;

    /// Delete a customer record.
    async fn delete_customer(&mut self, id: CustomerId) -> Result<()>;

    // === Transaction support ===

    /// Commit pending changes with a message.
    async fn commit(&mut self, message: &str) -> Result<()>;

    /// Rollback pending changes.
    async fn rollback(&mut self) -> Result<()>;
}

/// Order customer records by enrollment time, then by id.
pub(crate) fn sort_customers(customers: &mut [CustomerProgress]) {
    customers.sort_by(|a, b| {
        a.enrolled_at
            .cmp(&b.enrolled_at)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
}
