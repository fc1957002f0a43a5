//! Start eligibility: can a stage leave its idle status right now?

use ledger_core::{LedgerError, StageKey, StageStatus};

use crate::graph::DependencyGraph;

/// Result of checking a stage's prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// All prerequisites complete, ready to start
    Ready,
    /// Blocked by these incomplete prerequisites
    Blocked(Vec<StageKey>),
}

impl Resolution {
    /// Whether the stage may start.
    pub fn is_ready(&self) -> bool {
        matches!(self, Resolution::Ready)
    }
}

impl DependencyGraph {
    /// Check a stage's direct prerequisites against current statuses.
    ///
    /// `status_of` reports the status of any stage; a prerequisite whose
    /// status is unknown counts as blocking. O(out-degree).
    pub fn resolve<F>(&self, key: StageKey, status_of: F) -> Result<Resolution, LedgerError>
    where
        F: Fn(StageKey) -> Option<StageStatus>,
    {
        let i = self.position(key)?;

        let blocked: Vec<StageKey> = self
            .prerequisite_indices(i)
            .iter()
            .map(|&p| self.key_at(p))
            .filter(|pre| !status_of(*pre).is_some_and(|s| s.is_complete()))
            .collect();

        if blocked.is_empty() {
            Ok(Resolution::Ready)
        } else {
            Ok(Resolution::Blocked(blocked))
        }
    }

    /// Whether every prerequisite of `key` is complete.
    pub fn can_start<F>(&self, key: StageKey, status_of: F) -> Result<bool, LedgerError>
    where
        F: Fn(StageKey) -> Option<StageStatus>,
    {
        Ok(self.resolve(key, status_of)?.is_ready())
    }
}
