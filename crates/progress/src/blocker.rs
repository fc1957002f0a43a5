//! Blocker detection.
//!
//! Walks the prerequisite graph and sorts every idle stage into "ready to
//! start" or "blocked", naming the incomplete prerequisites of the latter.

use ledger_core::{StageKey, StageStatus};
use ledger_dependency::Resolution;
use serde::{Deserialize, Serialize};

use crate::aggregate::CustomerProgress;

/// An idle stage that cannot start yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageBlocker {
    /// The blocked stage
    pub stage: StageKey,
    /// Its current (idle) status
    pub status: StageStatus,
    /// Prerequisites that are not complete
    pub missing: Vec<StageKey>,
}

/// Result of blocker detection, in topological order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlockerReport {
    /// Idle stages whose prerequisites are all complete
    pub ready: Vec<StageKey>,
    /// Idle stages waiting on prerequisites
    pub blocked: Vec<StageBlocker>,
}

impl BlockerReport {
    /// Whether no idle stage is waiting on a prerequisite.
    pub fn is_clear(&self) -> bool {
        self.blocked.is_empty()
    }

    /// Stages waiting (directly) on `prerequisite`.
    pub fn waiting_on(&self, prerequisite: StageKey) -> impl Iterator<Item = StageKey> + '_ {
        self.blocked
            .iter()
            .filter(move |b| b.missing.contains(&prerequisite))
            .map(|b| b.stage)
    }
}

impl CustomerProgress {
    /// Detect which idle stages are ready and which are blocked.
    pub fn blockers(&self) -> BlockerReport {
        let mut report = BlockerReport::default();

        for key in self.graph().topological_order() {
            let Some(status) = self.status_of(key) else {
                continue;
            };
            if !status.is_idle() {
                continue;
            }

            match self.resolve(key) {
                Ok(Resolution::Ready) => report.ready.push(key),
                Ok(Resolution::Blocked(missing)) => report.blocked.push(StageBlocker {
                    stage: key,
                    status,
                    missing,
                }),
                // Every graph node is resolvable
                Err(_) => continue,
            }
        }

        report
    }
}
