//! In-memory storage, used by tests and short-lived tools.

use std::collections::HashMap;

use ledger_core::CustomerId;
use ledger_progress::CustomerProgress;
use tracing::{debug, warn};

use super::trait_::sort_customers;
use super::{Result, Storage, StorageError};

/// Storage backend that keeps customer records in a map.
///
/// `commit` snapshots the map and `rollback` restores the last snapshot.
#[derive(Debug, Default, Clone)]
pub struct MemoryStorage {
    records: HashMap<CustomerId, CustomerProgress>,
    committed: HashMap<CustomerId, CustomerProgress>,
}

impl MemoryStorage {
    /// Create empty storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, committed or not.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record is stored.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn save_customer(&mut self, progress: &CustomerProgress) -> Result<u64> {
        let id = progress.customer_id;
        let found = self.records.get(&id).map_or(0, |r| r.revision);
        if found != progress.revision {
            warn!(customer = %id, expected = progress.revision, found, "revision conflict");
            return Err(StorageError::Conflict {
                customer: id,
                expected: progress.revision,
                found,
            });
        }

        let mut record = progress.clone();
        record.revision = found + 1;
        let revision = record.revision;
        self.records.insert(id, record);

        debug!(customer = %id, revision, "saved customer record");
        Ok(revision)
    }

    async fn load_customer(&self, id: CustomerId) -> Result<Option<CustomerProgress>> {
        Ok(self.records.get(&id).cloned())
    }

    async fn list_customers(&self) -> Result<Vec<CustomerProgress>> {
        let mut customers: Vec<_> = self.records.values().cloned().collect();
        sort_customers(&mut customers);
        Ok(customers)
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<()> {
        self.records.remove(&id);
        Ok(())
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        debug!(records = self.records.len(), "commit: {message}");
        self.committed = self.records.clone();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.records = self.committed.clone();
        Ok(())
    }
}
