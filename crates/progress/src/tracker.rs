//! Progress snapshots.

use ledger_core::{CustomerId, EnglishStatus, Grade, StageKey, StageStatus, TestType, Time, TrackKind};
use serde::{Deserialize, Serialize};

use crate::aggregate::CustomerProgress;
use crate::blocker::BlockerReport;
use crate::estimator::{CompletionEstimate, CompletionEstimator};

/// Progress of one track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackProgress {
    /// Which track
    pub kind: TrackKind,

    /// Weighted completion, 0 to 100
    pub percentage: f64,

    /// Stages in a complete-equivalent status
    pub completed_stages: usize,

    /// Stages in the track
    pub total_stages: usize,
}

/// A snapshot of a customer's progress at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Customer the snapshot describes
    pub customer_id: CustomerId,

    /// When snapshot was taken
    pub timestamp: Time,

    /// Weighted overall completion, 0 to 100
    pub overall_percentage: f64,

    /// Per-track progress in track order
    pub tracks: Vec<TrackProgress>,

    /// Overall English standing
    pub english_status: EnglishStatus,

    /// Latest PTE overall score (zero if none)
    pub latest_pte: f64,

    /// Latest IELTS overall score (zero if none)
    pub latest_ielts: f64,

    /// Letter grades of scored training stages
    pub training_grades: Vec<(StageKey, Grade)>,

    /// Attendance rate of every course that has been started
    pub attendance: Vec<(StageKey, f64)>,

    /// Required documents still outstanding, per unfinished visa step
    pub missing_documents: Vec<(StageKey, Vec<String>)>,

    /// Ready and blocked stages
    pub blockers: BlockerReport,

    /// Remaining work
    pub estimate: CompletionEstimate,
}

impl ProgressSnapshot {
    /// Progress of one track.
    pub fn track(&self, kind: TrackKind) -> Option<&TrackProgress> {
        self.tracks.iter().find(|t| t.kind == kind)
    }
}

impl CustomerProgress {
    /// Take a snapshot with the default estimator.
    pub fn snapshot(&self, at: Time) -> ProgressSnapshot {
        self.snapshot_with(&CompletionEstimator::default(), at)
    }

    /// Take a snapshot using `estimator` for the completion projection.
    pub fn snapshot_with(&self, estimator: &CompletionEstimator, at: Time) -> ProgressSnapshot {
        let tracks = self
            .tracks()
            .iter()
            .map(|track| TrackProgress {
                kind: track.kind,
                percentage: track.percentage(),
                completed_stages: track.completed_count(),
                total_stages: track.stages.len(),
            })
            .collect();
        let training_grades = self
            .track(TrackKind::Training)
            .stages
            .iter()
            .filter_map(|s| Some((s.key, Grade::from_score(s.score?)?)))
            .collect();
        let attendance = self
            .track(TrackKind::English)
            .stages
            .iter()
            .filter(|s| s.status != StageStatus::NotStarted)
            .filter_map(|s| Some((s.key, s.coursework.as_ref()?.attendance_rate())))
            .collect();
        let missing_documents = self
            .track(TrackKind::Visa)
            .stages
            .iter()
            .filter(|s| !s.status.is_complete())
            .filter_map(|s| {
                let missing = s.missing_documents();
                (!missing.is_empty()).then(|| (s.key, missing.into_iter().map(String::from).collect()))
            })
            .collect();

        ProgressSnapshot {
            customer_id: self.customer_id,
            timestamp: at,
            overall_percentage: self.overall_percentage(),
            tracks,
            english_status: self.english_status(),
            latest_pte: self.latest_score(TestType::Pte),
            latest_ielts: self.latest_score(TestType::Ielts),
            training_grades,
            attendance,
            missing_documents,
            blockers: self.blockers(),
            estimate: estimator.estimate(self, at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use ledger_core::{
        EnglishCourse, JobCategory, TestScore, TrainingStage, VisaCategory, VisaStep, VisaType,
    };

    fn t0() -> Time {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_snapshot_reflects_aggregate() {
        let mut progress = CustomerProgress::enroll(
            CustomerId::new(),
            &JobCategory::new("CHEF", "Chef"),
            &VisaType::new("482", "Temporary Skill Shortage", VisaCategory::Work),
            t0(),
        )
        .unwrap();
        progress.complete(StageKey::Training(TrainingStage::Theory), Some(7.5), t0()).unwrap();
        progress.start(StageKey::Training(TrainingStage::Practical), t0()).unwrap();
        for step in [VisaStep::Checklist, VisaStep::JobOffer, VisaStep::Lmia] {
            progress.complete(StageKey::Visa(step), None, t0()).unwrap();
        }
        progress.record_test_score(TestScore::new(TestType::Ielts, 7.0), t0()).unwrap();

        let snapshot = progress.snapshot(t0());
        assert_eq!(snapshot.customer_id, progress.customer_id);
        assert!((snapshot.overall_percentage - 28.857).abs() < 1e-3);

        let training = snapshot.track(TrackKind::Training).unwrap();
        assert_eq!(training.percentage, 40.0);
        assert_eq!(training.completed_stages, 1);
        assert_eq!(training.total_stages, 4);
        assert_eq!(snapshot.track(TrackKind::Visa).unwrap().completed_stages, 3);

        assert_eq!(snapshot.latest_ielts, 7.0);
        assert_eq!(snapshot.latest_pte, 0.0);
        assert_eq!(
            snapshot.training_grades,
            vec![(StageKey::Training(TrainingStage::Theory), Grade::B)]
        );
        // No course started, so the score alone does not move English along.
        assert_eq!(snapshot.english_status, EnglishStatus::NotStarted);
        assert!(snapshot.blockers.ready.contains(&StageKey::Visa(VisaStep::SkillsAssessment)));
        assert!(snapshot.attendance.is_empty());

        // Completed steps drop out; the four untouched steps keep their lists.
        assert_eq!(snapshot.missing_documents.len(), 4);
        assert_eq!(snapshot.missing_documents[0].0, StageKey::Visa(VisaStep::SkillsAssessment));
    }

    #[test]
    fn test_snapshot_attendance_and_documents() {
        let mut progress = CustomerProgress::enroll(
            CustomerId::new(),
            &JobCategory::new("CHEF", "Chef"),
            &VisaType::new("482", "Temporary Skill Shortage", VisaCategory::Work),
            t0(),
        )
        .unwrap();
        let beginner = EnglishCourse::Beginner;
        progress.start(StageKey::English(beginner), t0()).unwrap();
        progress.record_attendance(beginner, t0()).unwrap();
        for name in ["Passport", "Education Certificates", "Work Experience"] {
            progress.submit_document(VisaStep::Checklist, name, t0()).unwrap();
        }

        let snapshot = progress.snapshot(t0());
        assert_eq!(snapshot.attendance, vec![(StageKey::English(beginner), 5.0)]);
        assert_eq!(
            snapshot.missing_documents[0],
            (StageKey::Visa(VisaStep::Checklist), vec!["English Test Results".to_string()])
        );
        assert_eq!(snapshot.missing_documents.len(), 7);
    }
}
