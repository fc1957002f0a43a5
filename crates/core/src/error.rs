//! Domain errors raised by stage transitions and enrollment.

use crate::stage::{StageKey, StageStatus};

/// Errors that can occur in the progress ledger domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LedgerError {
    /// A stage cannot leave its idle status until its prerequisites complete
    #[error("cannot start {}: must complete {} first", .stage, join_keys(.missing))]
    PrerequisiteNotMet {
        /// Stage that was asked to move
        stage: StageKey,
        /// Prerequisites not yet complete
        missing: Vec<StageKey>,
    },

    /// The requested transition is not allowed from the current status
    #[error("cannot {} {} while it is {}", .action, .stage, .from)]
    InvalidTransition {
        /// Stage the transition was applied to
        stage: StageKey,
        /// Status the stage was in
        from: StageStatus,
        /// Verb of the rejected action
        action: &'static str,
    },

    /// Prerequisite wiring contains a cycle; enrollment is aborted
    #[error("cyclic stage dependency: {}", join_keys(.cycle))]
    CyclicDependency {
        /// Stages on the cycle, each listed once
        cycle: Vec<StageKey>,
    },

    /// A stage that is not part of this customer's enrollment
    #[error("stage {0} is not enrolled")]
    UnknownStage(StageKey),

    /// The same stage was listed twice in an enrollment plan
    #[error("stage {0} is enrolled twice")]
    DuplicateStage(StageKey),

    /// Text that does not name a track or stage
    #[error("unrecognised stage '{0}'")]
    UnrecognisedStage(String),

    /// Scores must be finite and not negative
    #[error("score {0} is not a finite, non-negative number")]
    InvalidScore(f64),

    /// No document of that name is on the stage's checklist
    #[error("{stage} has no document '{name}'")]
    UnknownDocument {
        /// Visa step whose checklist was searched
        stage: StageKey,
        /// Requested document name
        name: String,
    },

    /// The document is already on the stage's checklist
    #[error("{stage} already requires '{name}'")]
    DuplicateDocument {
        /// Visa step whose checklist was extended
        stage: StageKey,
        /// Document name
        name: String,
    },
}

fn join_keys(keys: &[StageKey]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
