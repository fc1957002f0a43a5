//! Track model - ordered stages of one progress domain and their credit tables.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::stage::{Stage, StageKey, StageStatus, TrainingStage};

/// Credit awarded per completed visa step.
pub const VISA_STEP_CREDIT: f64 = 100.0 / 7.0;

/// The three independent progress domains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackKind {
    /// Vocational training
    Training,
    /// English coursework
    English,
    /// Visa application pipeline
    Visa,
}

impl TrackKind {
    /// All tracks.
    pub const ALL: [TrackKind; 3] = [TrackKind::Training, TrackKind::English, TrackKind::Visa];

    /// Share of this track in the overall percentage (shares sum to 1).
    pub fn share(&self) -> f64 {
        match self {
            TrackKind::Training => 0.4,
            TrackKind::English => 0.3,
            TrackKind::Visa => 0.3,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackKind::Training => "training",
            TrackKind::English => "english",
            TrackKind::Visa => "visa",
        }
    }

    /// Status a stage of this track ends in when completed.
    ///
    /// `passed` is the outcome of the score check, `None` when the stage was
    /// completed without a score or has no pass threshold.
    pub fn completion_status(&self, passed: Option<bool>) -> StageStatus {
        match (self, passed) {
            (TrackKind::Training, Some(false)) => StageStatus::Failed,
            (TrackKind::Training, _) => StageStatus::Completed,
            (TrackKind::English, Some(true)) => StageStatus::Passed,
            (TrackKind::English, _) => StageStatus::Completed,
            (TrackKind::Visa, _) => StageStatus::Completed,
        }
    }
}

impl std::fmt::Display for TrackKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrackKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "training" => Ok(TrackKind::Training),
            "english" => Ok(TrackKind::English),
            "visa" => Ok(TrackKind::Visa),
            _ => Err(LedgerError::UnrecognisedStage(s.to_string())),
        }
    }
}

/// Percentage a stage contributes to its track in the given status.
pub fn stage_credit(key: StageKey, status: StageStatus) -> f64 {
    use StageStatus::*;

    match key {
        StageKey::Training(stage) => match (stage, status) {
            (TrainingStage::Theory, Completed) => 25.0,
            (TrainingStage::Theory, InProgress) => 12.5,
            (TrainingStage::Practical, Completed | HasSkill) => 30.0,
            (TrainingStage::Practical, InProgress) => 15.0,
            (TrainingStage::Video, Approved) => 20.0,
            (TrainingStage::Video, Completed) => 15.0,
            (TrainingStage::Video, InProgress) => 10.0,
            (TrainingStage::Internship, Completed) => 25.0,
            (TrainingStage::Internship, InProgress) => 12.5,
            _ => 0.0,
        },
        StageKey::English(_) => match status {
            Passed => 20.0,
            Completed => 15.0,
            InProgress => 10.0,
            _ => 0.0,
        },
        StageKey::Visa(_) => match status {
            Completed | Approved => VISA_STEP_CREDIT,
            _ => 0.0,
        },
    }
}

/// Highest credit a stage can earn; this is the stage's weight.
pub fn max_credit(key: StageKey) -> f64 {
    match key {
        StageKey::Training(TrainingStage::Theory) => 25.0,
        StageKey::Training(TrainingStage::Practical) => 30.0,
        StageKey::Training(TrainingStage::Video) => 20.0,
        StageKey::Training(TrainingStage::Internship) => 25.0,
        StageKey::English(_) => 20.0,
        StageKey::Visa(_) => VISA_STEP_CREDIT,
    }
}

/// An ordered collection of stages belonging to one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Which track this is
    pub kind: TrackKind,

    /// Stages in order
    pub stages: Vec<Stage>,
}

impl Track {
    /// Create an empty track.
    pub fn new(kind: TrackKind) -> Self {
        Self {
            kind,
            stages: Vec::new(),
        }
    }

    /// Weighted completion of this track, 0 to 100.
    pub fn percentage(&self) -> f64 {
        let total: f64 = self.stages.iter().map(Stage::credit).sum();
        total.clamp(0.0, 100.0)
    }

    /// Sum of stage weights (100 for a fully enrolled track).
    pub fn total_weight(&self) -> f64 {
        self.stages.iter().map(|s| s.weight).sum()
    }

    /// Look up a stage.
    pub fn stage(&self, key: StageKey) -> Option<&Stage> {
        self.stages.iter().find(|s| s.key == key)
    }

    /// Look up a stage mutably.
    pub fn stage_mut(&mut self, key: StageKey) -> Option<&mut Stage> {
        self.stages.iter_mut().find(|s| s.key == key)
    }

    /// Number of stages in a completion-equivalent status.
    pub fn completed_count(&self) -> usize {
        self.stages.iter().filter(|s| s.status.is_complete()).count()
    }

    /// Whether no stage of this track has been touched.
    pub fn is_untouched(&self) -> bool {
        self.stages.iter().all(|s| s.status == StageStatus::NotStarted)
    }
}
