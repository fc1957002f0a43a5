//! Completion time estimation.

use chrono::{DateTime, TimeDelta, Utc};
use ledger_core::{Time, Track, TrackKind};
use serde::{Deserialize, Serialize};

use crate::aggregate::CustomerProgress;

/// Remaining work and a projected completion date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionEstimate {
    /// Planned training hours of stages not yet complete
    pub remaining_training_hours: f64,
    /// Planned English hours of courses not yet complete
    pub remaining_english_hours: f64,
    /// Processing days of visa steps not yet complete
    pub remaining_visa_days: u64,
    /// When everything is expected to be done, capped at the latest
    /// representable time
    pub estimated_completion: Time,
}

impl CompletionEstimate {
    /// Total study hours left across training and English.
    pub fn remaining_study_hours(&self) -> f64 {
        self.remaining_training_hours + self.remaining_english_hours
    }
}

/// Completion time estimator.
///
/// Training, English and visa run side by side, so the projection is the
/// longest of the three. Visa steps are processed one after another.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompletionEstimator {
    /// Study hours a customer puts in per week
    pub study_hours_per_week: f64,
}

impl CompletionEstimator {
    /// Create an estimator with a weekly study load.
    pub fn new(study_hours_per_week: f64) -> Self {
        Self { study_hours_per_week }
    }

    /// Estimate remaining work for a customer as of `at`.
    pub fn estimate(&self, progress: &CustomerProgress, at: Time) -> CompletionEstimate {
        let training = remaining_hours(progress.track(TrackKind::Training));
        let english = remaining_hours(progress.track(TrackKind::English));
        let visa_days = progress
            .track(TrackKind::Visa)
            .stages
            .iter()
            .filter(|s| !s.status.is_complete())
            .filter_map(|s| s.estimated_days)
            .map(u64::from)
            .fold(0, u64::saturating_add);

        let days = [
            self.study_days(training),
            self.study_days(english),
            visa_days,
        ]
        .into_iter()
        .max()
        .unwrap_or(0);

        CompletionEstimate {
            remaining_training_hours: training,
            remaining_english_hours: english,
            remaining_visa_days: visa_days,
            estimated_completion: days_after(at, days),
        }
    }

    /// Whole days needed to study `hours`; float-to-int conversion
    /// saturates, so absurd loads cannot overflow.
    fn study_days(&self, hours: f64) -> u64 {
        if !(hours > 0.0 && self.study_hours_per_week > 0.0) {
            return 0;
        }
        (hours / self.study_hours_per_week * 7.0).ceil() as u64
    }
}

impl Default for CompletionEstimator {
    fn default() -> Self {
        Self::new(20.0)
    }
}

fn days_after(at: Time, days: u64) -> Time {
    i64::try_from(days)
        .ok()
        .and_then(TimeDelta::try_days)
        .and_then(|delta| at.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn remaining_hours(track: &Track) -> f64 {
    track
        .stages
        .iter()
        .filter(|s| !s.status.is_complete())
        .filter_map(|s| s.planned_hours)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use ledger_core::{
        CustomerId, EnglishCourse, JobCategory, StageKey, StageTemplate, TrainingStage, VisaCategory,
        VisaStep, VisaType,
    };

    use crate::enrollment::EnrollmentPlan;

    fn t0() -> Time {
        Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
    }

    fn enrolled() -> CustomerProgress {
        CustomerProgress::enroll(
            CustomerId::new(),
            &JobCategory::new("CHEF", "Chef"),
            &VisaType::new("482", "Temporary Skill Shortage", VisaCategory::Work),
            t0(),
        )
        .unwrap()
    }

    #[test]
    fn test_fresh_enrollment_estimate() {
        let estimate = CompletionEstimator::default().estimate(&enrolled(), t0());

        // 40 + 120 + 20 + 4 weeks × 40
        assert_eq!(estimate.remaining_training_hours, 340.0);
        assert_eq!(estimate.remaining_english_hours, 250.0);
        assert_eq!(estimate.remaining_visa_days, 382);
        assert_eq!(estimate.remaining_study_hours(), 590.0);
        // 382 visa days outlast 340h / 20h per week = 119 days
        assert_eq!(estimate.estimated_completion, t0() + Duration::days(382));
    }

    #[test]
    fn test_completed_stages_drop_out() {
        let mut progress = enrolled();
        progress.complete(StageKey::Training(TrainingStage::Theory), None, t0()).unwrap();
        progress.complete(StageKey::English(EnglishCourse::Beginner), Some(6.0), t0()).unwrap();
        progress.complete(StageKey::Visa(VisaStep::Checklist), None, t0()).unwrap();

        let estimate = CompletionEstimator::default().estimate(&progress, t0());
        assert_eq!(estimate.remaining_training_hours, 300.0);
        assert_eq!(estimate.remaining_english_hours, 210.0);
        assert_eq!(estimate.remaining_visa_days, 375);
    }

    #[test]
    fn test_heavy_study_load_is_the_bottleneck() {
        let estimator = CompletionEstimator::new(1.0);
        let estimate = estimator.estimate(&enrolled(), t0());
        // 340h at 1h per week
        assert_eq!(estimate.estimated_completion, t0() + Duration::days(340 * 7));
    }

    #[test]
    fn test_tiny_study_load_saturates() {
        let estimate = CompletionEstimator::new(1e-6).estimate(&enrolled(), t0());
        assert_eq!(estimate.estimated_completion, DateTime::<Utc>::MAX_UTC);
        assert_eq!(estimate.remaining_training_hours, 340.0);

        for load in [0.0, -5.0, f64::NAN] {
            let estimate = CompletionEstimator::new(load).estimate(&enrolled(), t0());
            assert_eq!(estimate.estimated_completion, t0() + Duration::days(382));
        }
    }

    #[test]
    fn test_huge_visa_processing_times_saturate() {
        let job = JobCategory::new("CHEF", "Chef");
        let visa_type = VisaType::new("482", "Temporary Skill Shortage", VisaCategory::Work);
        let templates = VisaStep::ALL
            .iter()
            .map(|step| StageTemplate {
                estimated_days: Some(u32::MAX),
                ..StageTemplate::new(StageKey::Visa(*step))
            })
            .collect();
        let plan = EnrollmentPlan::standard(&job, &visa_type).with_templates(TrackKind::Visa, templates);
        let progress = CustomerProgress::enroll_with(CustomerId::new(), plan, t0()).unwrap();

        let estimate = CompletionEstimator::default().estimate(&progress, t0());
        assert_eq!(estimate.remaining_visa_days, 7 * u64::from(u32::MAX));
        assert_eq!(estimate.estimated_completion, DateTime::<Utc>::MAX_UTC);
    }
}
