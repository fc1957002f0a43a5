//! JSON file storage implementation.
//!
//! Stores each customer as `customers/<id>.json` under the data directory and
//! keeps a small per-customer meta marker (`meta/customers/<id>.meta.json`,
//! version + updated_at) that backs the revision check. Files touched since
//! the last commit are journaled so a rollback can restore them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ledger_core::{CustomerId, Time};
use ledger_progress::CustomerProgress;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::trait_::sort_customers;
use super::{Result, Storage, StorageError};

const CUSTOMERS: &str = "customers";

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    /// Original contents of every file written since the last commit
    journal: Arc<Mutex<HashMap<PathBuf, Option<Vec<u8>>>>>,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the data and meta
    /// directories if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join(CUSTOMERS)).await?;
        fs::create_dir_all(root.join("meta").join(CUSTOMERS)).await?;

        Ok(Self {
            root,
            journal: Arc::new(Mutex::new(HashMap::new())),
        })
    }

    /// Data directory this storage writes to.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn customer_path(&self, id: CustomerId) -> PathBuf {
        self.root.join(CUSTOMERS).join(format!("{}.json", id))
    }

    fn meta_path(&self, id: CustomerId) -> PathBuf {
        self.root.join("meta").join(CUSTOMERS).join(format!("{}.meta.json", id))
    }

    /// Remember a file's current contents the first time it is touched in
    /// this transaction.
    async fn journal(&self, path: &Path) -> Result<()> {
        let mut journal = self.journal.lock().await;
        if journal.contains_key(path) {
            return Ok(());
        }
        let original = match fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        journal.insert(path.to_path_buf(), original);
        Ok(())
    }

    /// Stored version of a customer record, zero if none.
    async fn current_version(&self, id: CustomerId) -> Result<u64> {
        let meta: Option<serde_json::Value> = read_json(&self.meta_path(id)).await?;
        Ok(meta
            .and_then(|m| m.get("version").and_then(|v| v.as_u64()))
            .unwrap_or(0))
    }

    /// Check the caller's revision against the stored one and write the
    /// incremented version marker.
    async fn bump_version(&self, id: CustomerId, expected: u64, updated_at: Time) -> Result<u64> {
        let found = self.current_version(id).await?;
        if found != expected {
            warn!(customer = %id, expected, found, "revision conflict");
            return Err(StorageError::Conflict { customer: id, expected, found });
        }

        let version = found + 1;
        let path = self.meta_path(id);
        self.journal(&path).await?;
        let meta = serde_json::json!({"version": version, "updated_at": updated_at});
        fs::write(&path, serde_json::to_string_pretty(&meta)?.as_bytes()).await?;
        Ok(version)
    }

    /// Load a record and stamp it with the revision from its meta marker.
    async fn read_customer(&self, path: &Path) -> Result<Option<CustomerProgress>> {
        let Some(mut progress) = read_json::<CustomerProgress>(path).await? else {
            return Ok(None);
        };
        progress.revision = self.current_version(progress.customer_id).await?;
        Ok(Some(progress))
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_customer(&mut self, progress: &CustomerProgress) -> Result<u64> {
        let id = progress.customer_id;
        let revision = self.bump_version(id, progress.revision, progress.updated_at).await?;

        let mut record = progress.clone();
        record.revision = revision;

        let path = self.customer_path(id);
        self.journal(&path).await?;
        let json = serde_json::to_string_pretty(&record)?;
        fs::write(&path, json.as_bytes()).await?;

        debug!(customer = %id, revision, "saved customer record");
        Ok(revision)
    }

    async fn load_customer(&self, id: CustomerId) -> Result<Option<CustomerProgress>> {
        self.read_customer(&self.customer_path(id)).await
    }

    async fn list_customers(&self) -> Result<Vec<CustomerProgress>> {
        let mut customers = Vec::new();
        let mut rd = fs::read_dir(self.root.join(CUSTOMERS)).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            match self.read_customer(&path).await {
                Ok(Some(progress)) => customers.push(progress),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable customer record"),
            }
        }
        sort_customers(&mut customers);
        Ok(customers)
    }

    async fn delete_customer(&mut self, id: CustomerId) -> Result<()> {
        for path in [self.customer_path(id), self.meta_path(id)] {
            self.journal(&path).await?;
            remove_if_exists(&path).await?;
        }
        debug!(customer = %id, "deleted customer record");
        Ok(())
    }

    async fn commit(&mut self, message: &str) -> Result<()> {
        let mut journal = self.journal.lock().await;
        debug!(files = journal.len(), "commit: {message}");
        journal.clear();
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        let mut journal = self.journal.lock().await;
        for (path, original) in journal.drain() {
            match original {
                Some(bytes) => fs::write(&path, bytes).await?,
                None => remove_if_exists(&path).await?,
            }
        }
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}
