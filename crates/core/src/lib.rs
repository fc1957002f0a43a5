//! Customer ledger core data models.
//!
//! This crate defines the stages, tracks and scores that make up a
//! customer's progress through training, English coursework and the visa
//! pipeline, together with the credit tables that turn stage statuses into
//! completion percentages.

#![warn(missing_docs)]

// Core identities
mod id;

// Stages and tracks
mod stage;
mod track;

// Scores, coursework and documents
mod score;
mod coursework;
mod document;

// Reference data
mod catalog;

mod error;

// Re-exports
pub use id::*;

pub use stage::{
    Stage, StageKey, StageStatus, Transition,
    TrainingStage, EnglishCourse, VisaStep,
};
pub use track::{Track, TrackKind, stage_credit, max_credit, VISA_STEP_CREDIT};
pub use score::{TestType, TestScore, ScoreSlots, TestScores, EnglishStatus, Grade, check_score};
pub use coursework::{Coursework, Exam};
pub use document::{Document, missing_documents};
pub use catalog::{
    JobCategory, VisaType, VisaCategory, StageTemplate,
    training_templates, english_templates, visa_templates,
};
pub use error::LedgerError;

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
