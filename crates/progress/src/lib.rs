//! Customer progress tracking.
//!
//! The `CustomerProgress` aggregate, enrollment plans, snapshots, blocker
//! detection and completion estimates.

#![warn(missing_docs)]

pub mod aggregate;
pub mod enrollment;
pub mod tracker;
pub mod blocker;
pub mod estimator;

pub use aggregate::CustomerProgress;
pub use enrollment::EnrollmentPlan;
pub use tracker::{ProgressSnapshot, TrackProgress};
pub use blocker::{BlockerReport, StageBlocker};
pub use estimator::{CompletionEstimate, CompletionEstimator};
