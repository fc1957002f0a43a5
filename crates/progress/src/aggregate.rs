//! Customer progress aggregate - owns a customer's tracks and prerequisite
//! graph and applies stage transitions.

use ledger_core::{
    CustomerId, Document, EnglishCourse, EnglishStatus, Exam, JobCategory, LedgerError, Stage,
    StageKey, StageStatus, TestScore, TestScores, TestType, Time, Track, TrackKind, Transition,
    VisaStep, VisaType,
};
use ledger_dependency::{DependencyGraph, Resolution};
use serde::{Deserialize, Serialize};

use crate::enrollment::EnrollmentPlan;

/// Everything the ledger knows about one customer's progress.
///
/// Percentages are never stored; they are recomputed from stage statuses on
/// every query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerProgress {
    /// Customer this aggregate belongs to
    pub customer_id: CustomerId,

    /// Job the customer trains for
    pub job_category: JobCategory,

    /// Visa the customer applies for
    pub visa_type: VisaType,

    training: Track,
    english: Track,
    visa: Track,

    /// Static prerequisite wiring
    graph: DependencyGraph,

    test_scores: TestScores,

    /// When the customer was enrolled
    pub enrolled_at: Time,

    /// Last successful mutation
    pub updated_at: Time,

    /// Storage revision this copy was loaded at
    #[serde(default)]
    pub revision: u64,
}

impl CustomerProgress {
    /// Enroll a customer with the standard plan.
    pub fn enroll(
        customer_id: CustomerId,
        job_category: &JobCategory,
        visa_type: &VisaType,
        at: Time,
    ) -> Result<Self, LedgerError> {
        Self::enroll_with(customer_id, EnrollmentPlan::standard(job_category, visa_type), at)
    }

    /// Enroll a customer with a custom plan.
    ///
    /// The dependency graph is validated before any stage is created, so a
    /// cyclic plan yields `CyclicDependency` and no aggregate.
    pub fn enroll_with(customer_id: CustomerId, plan: EnrollmentPlan, at: Time) -> Result<Self, LedgerError> {
        let keys: Vec<StageKey> = plan.templates().map(|t| t.key).collect();
        let graph = DependencyGraph::build(keys, &plan.edges())?;

        let track = |kind: TrackKind| Track {
            kind,
            stages: plan.templates_of(kind).map(|t| t.instantiate()).collect(),
        };
        let (training, english, visa) = (
            track(TrackKind::Training),
            track(TrackKind::English),
            track(TrackKind::Visa),
        );

        Ok(Self {
            customer_id,
            job_category: plan.job_category,
            visa_type: plan.visa_type,
            training,
            english,
            visa,
            graph,
            test_scores: TestScores::default(),
            enrolled_at: at,
            updated_at: at,
            revision: 0,
        })
    }

    // === Queries ===

    /// A track by kind.
    pub fn track(&self, kind: TrackKind) -> &Track {
        match kind {
            TrackKind::Training => &self.training,
            TrackKind::English => &self.english,
            TrackKind::Visa => &self.visa,
        }
    }

    /// All tracks in order.
    pub fn tracks(&self) -> [&Track; 3] {
        [&self.training, &self.english, &self.visa]
    }

    /// A stage by key.
    pub fn stage(&self, key: StageKey) -> Result<&Stage, LedgerError> {
        self.track(key.track())
            .stage(key)
            .ok_or(LedgerError::UnknownStage(key))
    }

    /// Current status of a stage, if enrolled.
    pub fn status_of(&self, key: StageKey) -> Option<StageStatus> {
        self.track(key.track()).stage(key).map(|s| s.status)
    }

    /// The prerequisite graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Weighted completion of one track, 0 to 100.
    pub fn track_percentage(&self, kind: TrackKind) -> f64 {
        self.track(kind).percentage()
    }

    /// `0.4 × training + 0.3 × english + 0.3 × visa`.
    pub fn overall_percentage(&self) -> f64 {
        TrackKind::ALL
            .iter()
            .map(|kind| kind.share() * self.track_percentage(*kind))
            .sum()
    }

    /// Check a stage's prerequisites.
    pub fn resolve(&self, key: StageKey) -> Result<Resolution, LedgerError> {
        self.graph.resolve(key, |k| self.status_of(k))
    }

    /// Whether every prerequisite of `key` is complete.
    pub fn can_start(&self, key: StageKey) -> Result<bool, LedgerError> {
        Ok(self.resolve(key)?.is_ready())
    }

    /// Recorded English test scores.
    pub fn test_scores(&self) -> &TestScores {
        &self.test_scores
    }

    /// Latest overall score of a test type (zero if none).
    pub fn latest_score(&self, test_type: TestType) -> f64 {
        self.test_scores.latest(test_type)
    }

    /// Overall English standing.
    pub fn english_status(&self) -> EnglishStatus {
        EnglishStatus::derive(&self.english, &self.test_scores)
    }

    // === Transitions ===

    /// Apply a transition to one stage.
    ///
    /// The next state is computed in full before anything is written; on
    /// error the aggregate is unchanged. Every transition out of an idle
    /// status (not started, failed, rejected) other than `Reset` requires all
    /// prerequisites to be complete, whatever status it ends in.
    pub fn apply(&mut self, key: StageKey, transition: Transition, at: Time) -> Result<&Stage, LedgerError> {
        let current = self.stage(key)?;
        let next = current.apply(transition, at)?;

        if current.status.is_idle() && transition != Transition::Reset {
            if let Resolution::Blocked(missing) = self.resolve(key)? {
                return Err(LedgerError::PrerequisiteNotMet { stage: key, missing });
            }
        }

        self.replace(key, next, at)
    }

    /// Start a stage.
    pub fn start(&mut self, key: StageKey, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::Start, at)
    }

    /// Lodge a visa application step.
    pub fn submit(&mut self, key: StageKey, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::Submit, at)
    }

    /// Move a lodged visa step under review.
    pub fn begin_review(&mut self, key: StageKey, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::BeginReview, at)
    }

    /// Approve a visa step.
    pub fn approve(&mut self, key: StageKey, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::Approve, at)
    }

    /// Reject a visa step.
    pub fn reject(&mut self, key: StageKey, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::Reject, at)
    }

    /// Complete a stage, optionally with an assessment score.
    pub fn complete(&mut self, key: StageKey, score: Option<f64>, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::Complete { score }, at)
    }

    /// Record an externally verified training outcome.
    pub fn endorse(&mut self, key: StageKey, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::Endorse, at)
    }

    /// Administrative reset of a stage.
    pub fn reset(&mut self, key: StageKey, at: Time) -> Result<&Stage, LedgerError> {
        self.apply(key, Transition::Reset, at)
    }

    /// Record an English test result under the two-slot rule.
    ///
    /// Scores that are not finite or are negative are refused and nothing
    /// is recorded.
    pub fn record_test_score(&mut self, score: TestScore, at: Time) -> Result<(), LedgerError> {
        score.validate()?;
        self.test_scores.record(score);
        self.updated_at = at;
        Ok(())
    }

    // === Coursework ===

    /// Count one attended session of a course in progress.
    pub fn record_attendance(&mut self, course: EnglishCourse, at: Time) -> Result<&Stage, LedgerError> {
        let key = StageKey::English(course);
        let next = self.stage(key)?.attend(at)?;
        self.replace(key, next, at)
    }

    /// Store a midterm or final mark of a course in progress.
    pub fn record_exam(
        &mut self,
        course: EnglishCourse,
        exam: Exam,
        score: f64,
        at: Time,
    ) -> Result<&Stage, LedgerError> {
        let key = StageKey::English(course);
        let next = self.stage(key)?.record_exam(exam, score)?;
        self.replace(key, next, at)
    }

    /// Attended sessions of a course as a percentage, 0 to 100.
    pub fn attendance_rate(&self, course: EnglishCourse) -> Result<f64, LedgerError> {
        let stage = self.stage(StageKey::English(course))?;
        Ok(stage.coursework.as_ref().map_or(0.0, |w| w.attendance_rate()))
    }

    // === Documents ===

    /// Add a document to a visa step's checklist.
    pub fn require_document(&mut self, step: VisaStep, document: Document, at: Time) -> Result<&Stage, LedgerError> {
        let key = StageKey::Visa(step);
        let next = self.stage(key)?.require_document(document)?;
        self.replace(key, next, at)
    }

    /// Mark a checklist document of a visa step as handed in.
    pub fn submit_document(&mut self, step: VisaStep, name: &str, at: Time) -> Result<&Stage, LedgerError> {
        let key = StageKey::Visa(step);
        let next = self.stage(key)?.submit_document(name, at)?;
        self.replace(key, next, at)
    }

    /// Required documents of a visa step not yet submitted, sorted.
    pub fn missing_documents(&self, step: VisaStep) -> Result<Vec<&str>, LedgerError> {
        Ok(self.stage(StageKey::Visa(step))?.missing_documents())
    }

    /// Write a fully computed stage back and stamp the aggregate.
    fn replace(&mut self, key: StageKey, next: Stage, at: Time) -> Result<&Stage, LedgerError> {
        let slot = self
            .track_mut(key.track())
            .stage_mut(key)
            .ok_or(LedgerError::UnknownStage(key))?;
        *slot = next;
        self.updated_at = at;

        self.stage(key)
    }

    fn track_mut(&mut self, kind: TrackKind) -> &mut Track {
        match kind {
            TrackKind::Training => &mut self.training,
            TrackKind::English => &mut self.english,
            TrackKind::Visa => &mut self.visa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use ledger_core::{TrainingStage, VisaCategory};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn t0() -> Time {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
    }

    fn job() -> JobCategory {
        JobCategory::new("CHEF", "Chef")
    }

    fn visa_type() -> VisaType {
        VisaType::new("482", "Temporary Skill Shortage", VisaCategory::Work)
    }

    fn enrolled() -> CustomerProgress {
        CustomerProgress::enroll(CustomerId::new(), &job(), &visa_type(), t0()).unwrap()
    }

    fn training(stage: TrainingStage) -> StageKey {
        StageKey::Training(stage)
    }

    fn visa(step: VisaStep) -> StageKey {
        StageKey::Visa(step)
    }

    #[test]
    fn test_enroll_creates_every_stage() {
        let progress = enrolled();
        assert_eq!(progress.track(TrackKind::Training).stages.len(), 4);
        assert_eq!(progress.track(TrackKind::English).stages.len(), 5);
        assert_eq!(progress.track(TrackKind::Visa).stages.len(), 7);
        assert_eq!(progress.graph().len(), 16);
        assert_eq!(progress.overall_percentage(), 0.0);
        for track in progress.tracks() {
            assert!((track.total_weight() - 100.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_cyclic_plan_aborts_enrollment() {
        let plan = EnrollmentPlan::standard(&job(), &visa_type())
            .with_edge(training(TrainingStage::Theory), training(TrainingStage::Internship));

        let err = CustomerProgress::enroll_with(CustomerId::new(), plan, t0()).unwrap_err();
        assert!(matches!(err, LedgerError::CyclicDependency { .. }));
    }

    #[test]
    fn test_start_requires_prerequisites() {
        let mut progress = enrolled();
        let practical = training(TrainingStage::Practical);

        let err = progress.start(practical, t0()).unwrap_err();
        assert_eq!(
            err,
            LedgerError::PrerequisiteNotMet {
                stage: practical,
                missing: vec![training(TrainingStage::Theory)],
            }
        );
        assert_eq!(progress.status_of(practical), Some(StageStatus::NotStarted));
        assert_eq!(progress.updated_at, t0());

        progress.start(training(TrainingStage::Theory), t0()).unwrap();
        progress.complete(training(TrainingStage::Theory), Some(7.5), t0()).unwrap();
        assert!(progress.can_start(practical).unwrap());
        assert_eq!(progress.start(practical, t0()).unwrap().status, StageStatus::InProgress);
    }

    #[test]
    fn test_fast_path_complete_is_still_gated() {
        let mut progress = enrolled();
        let job_offer = visa(VisaStep::JobOffer);

        assert!(matches!(
            progress.complete(job_offer, None, t0()),
            Err(LedgerError::PrerequisiteNotMet { .. })
        ));

        progress.complete(visa(VisaStep::Checklist), None, t0()).unwrap();
        assert_eq!(
            progress.complete(job_offer, None, t0()).unwrap().status,
            StageStatus::Completed
        );
    }

    #[test]
    fn test_failing_fast_path_complete_is_gated() {
        let mut progress = enrolled();
        let internship = training(TrainingStage::Internship);

        let err = progress.complete(internship, Some(1.0), t0()).unwrap_err();
        assert!(matches!(err, LedgerError::PrerequisiteNotMet { stage, .. } if stage == internship));

        let stage = progress.stage(internship).unwrap();
        assert_eq!(stage.status, StageStatus::NotStarted);
        assert!(stage.score.is_none());
        assert!(stage.completed_at.is_none());
    }

    #[test]
    fn test_reset_is_never_gated() {
        let mut progress = enrolled();
        let video = training(TrainingStage::Video);
        assert!(!progress.can_start(video).unwrap());
        assert_eq!(progress.reset(video, t0()).unwrap().status, StageStatus::NotStarted);
    }

    #[test]
    fn test_invalid_transition_reported_before_gating() {
        let mut progress = enrolled();
        let err = progress.approve(visa(VisaStep::Nomination), t0()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTransition { .. }));
    }

    #[test]
    fn test_unknown_stage_on_trimmed_plan() {
        let plan = EnrollmentPlan::standard(&job(), &visa_type())
            .with_templates(TrackKind::Visa, Vec::new());
        let mut progress = CustomerProgress::enroll_with(CustomerId::new(), plan, t0()).unwrap();

        let key = visa(VisaStep::Checklist);
        assert_eq!(progress.start(key, t0()).unwrap_err(), LedgerError::UnknownStage(key));
        assert_eq!(progress.track_percentage(TrackKind::Visa), 0.0);
    }

    #[test]
    fn test_training_scenario_percentage() {
        let mut progress = enrolled();
        progress.start(training(TrainingStage::Theory), t0()).unwrap();
        progress.complete(training(TrainingStage::Theory), None, t0()).unwrap();
        progress.start(training(TrainingStage::Practical), t0()).unwrap();

        assert_eq!(progress.track_percentage(TrackKind::Training), 40.0);
    }

    #[test]
    fn test_overall_scenario() {
        let mut progress = enrolled();
        progress.complete(training(TrainingStage::Theory), None, t0()).unwrap();
        progress.start(training(TrainingStage::Practical), t0()).unwrap();
        for step in [VisaStep::Checklist, VisaStep::JobOffer, VisaStep::Lmia] {
            progress.complete(visa(step), None, t0()).unwrap();
        }

        assert!((progress.track_percentage(TrackKind::Visa) - 300.0 / 7.0).abs() < 1e-9);
        let expected = 0.4 * 40.0 + 0.3 * 0.0 + 0.3 * (300.0 / 7.0);
        assert!((progress.overall_percentage() - expected).abs() < 1e-9);
        assert!((progress.overall_percentage() - 28.857).abs() < 1e-3);
    }

    #[test]
    fn test_visa_pipeline_approve_unblocks_next_step() {
        let mut progress = enrolled();
        let checklist = visa(VisaStep::Checklist);
        progress.start(checklist, t0()).unwrap();
        progress.submit(checklist, t0()).unwrap();
        progress.begin_review(checklist, t0()).unwrap();
        progress.approve(checklist, t0()).unwrap();

        assert!(progress.can_start(visa(VisaStep::JobOffer)).unwrap());
        assert!((progress.track_percentage(TrackKind::Visa) - 100.0 / 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_reset_then_start_matches_fresh_enrollment() {
        let at = t0() + Duration::days(3);
        let theory = training(TrainingStage::Theory);

        let mut fresh = enrolled();
        fresh.start(theory, at).unwrap();
        let fresh_stage = fresh.stage(theory).unwrap().clone();

        let mut worked = enrolled();
        worked.start(theory, t0()).unwrap();
        worked.complete(theory, Some(2.0), t0()).unwrap();
        worked.reset(theory, at).unwrap();
        worked.start(theory, at).unwrap();

        assert_eq!(worked.stage(theory).unwrap(), &fresh_stage);
    }

    #[test]
    fn test_failed_stage_retry_requires_prerequisites_again() {
        let mut progress = enrolled();
        let theory = training(TrainingStage::Theory);
        let practical = training(TrainingStage::Practical);

        progress.complete(theory, None, t0()).unwrap();
        progress.start(practical, t0()).unwrap();
        progress.complete(practical, Some(1.0), t0()).unwrap();
        assert_eq!(progress.status_of(practical), Some(StageStatus::Failed));

        progress.reset(theory, t0()).unwrap();
        assert!(matches!(
            progress.start(practical, t0()),
            Err(LedgerError::PrerequisiteNotMet { .. })
        ));
    }

    #[test]
    fn test_endorse_practical_satisfies_video_prerequisite() {
        let mut progress = enrolled();
        progress.complete(training(TrainingStage::Theory), None, t0()).unwrap();
        progress.endorse(training(TrainingStage::Practical), t0()).unwrap();

        assert!(progress.can_start(training(TrainingStage::Video)).unwrap());
        assert_eq!(progress.track_percentage(TrackKind::Training), 55.0);
    }

    #[test]
    fn test_test_scores_and_english_status() {
        let mut progress = enrolled();
        progress.start(StageKey::English(EnglishCourse::Beginner), t0()).unwrap();

        progress.record_test_score(TestScore::new(TestType::Pte, 45.0), t0()).unwrap();
        assert_eq!(progress.latest_score(TestType::Pte), 45.0);
        assert_eq!(progress.english_status(), EnglishStatus::Testing);

        progress.record_test_score(TestScore::new(TestType::Pte, 60.0), t0()).unwrap();
        assert_eq!(progress.latest_score(TestType::Pte), 60.0);
        progress.record_test_score(TestScore::new(TestType::Pte, 70.0), t0()).unwrap();
        assert_eq!(progress.latest_score(TestType::Pte), 70.0);
        assert_eq!(progress.english_status(), EnglishStatus::Passed);
    }

    #[test]
    fn test_rejected_scores_leave_record_untouched() {
        let mut progress = enrolled();
        let theory = training(TrainingStage::Theory);
        progress.start(theory, t0()).unwrap();
        let later = t0() + Duration::hours(1);

        for overall in [f64::NAN, f64::INFINITY, -3.0] {
            let err = progress.record_test_score(TestScore::new(TestType::Pte, overall), later).unwrap_err();
            assert!(matches!(err, LedgerError::InvalidScore(_)));
        }
        let err = progress.complete(theory, Some(f64::NAN), later).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidScore(_)));

        assert_eq!(progress.test_scores(), &TestScores::default());
        assert_eq!(progress.status_of(theory), Some(StageStatus::InProgress));
        assert_eq!(progress.updated_at, t0());
        assert!(serde_json::to_string(&progress).is_ok());
    }

    #[test]
    fn test_attendance_and_exam_marks() {
        let mut progress = enrolled();
        let beginner = EnglishCourse::Beginner;

        assert!(matches!(
            progress.record_attendance(beginner, t0()),
            Err(LedgerError::InvalidTransition { .. })
        ));

        progress.start(StageKey::English(beginner), t0()).unwrap();
        for day in 0..5 {
            progress.record_attendance(beginner, t0() + Duration::days(day)).unwrap();
        }
        assert_eq!(progress.attendance_rate(beginner).unwrap(), 25.0);
        assert_eq!(progress.updated_at, t0() + Duration::days(4));

        progress.record_exam(beginner, Exam::Midterm, 4.0, t0()).unwrap();
        progress.record_exam(beginner, Exam::Final, 7.0, t0()).unwrap();
        let stage = progress.complete(StageKey::English(beginner), None, t0()).unwrap();
        assert_eq!(stage.score, Some(5.5));
        assert_eq!(stage.status, StageStatus::Passed);
        assert_eq!(progress.track_percentage(TrackKind::English), 20.0);
    }

    #[test]
    fn test_document_checklist_per_visa_step() {
        let mut progress = enrolled();
        let step = VisaStep::Checklist;
        assert_eq!(progress.missing_documents(step).unwrap().len(), 4);

        progress.submit_document(step, "Passport", t0()).unwrap();
        progress.submit_document(step, "Work Experience", t0()).unwrap();
        progress
            .require_document(step, Document::required("Police Certificate"), t0())
            .unwrap();
        assert_eq!(
            progress.missing_documents(step).unwrap(),
            vec!["Education Certificates", "English Test Results", "Police Certificate"]
        );

        assert!(matches!(
            progress.submit_document(step, "Birth Certificate", t0()),
            Err(LedgerError::UnknownDocument { .. })
        ));
        assert!(matches!(
            progress.require_document(step, Document::required("Passport"), t0()),
            Err(LedgerError::DuplicateDocument { .. })
        ));
    }

    #[test]
    fn test_serde_round_trip_keeps_gating() {
        let mut progress = enrolled();
        progress.complete(visa(VisaStep::Checklist), None, t0()).unwrap();

        let json = serde_json::to_string(&progress).unwrap();
        let restored: CustomerProgress = serde_json::from_str(&json).unwrap();
        assert!(restored.can_start(visa(VisaStep::JobOffer)).unwrap());
        assert!(!restored.can_start(visa(VisaStep::Lmia)).unwrap());
        assert_eq!(restored.overall_percentage(), progress.overall_percentage());
    }

    /// Random walks of transitions never push the overall percentage out of
    /// [0, 100].
    #[test]
    fn test_overall_percentage_stays_in_bounds() {
        let mut rng = StdRng::seed_from_u64(7);
        let keys: Vec<StageKey> = TrackKind::ALL
            .iter()
            .flat_map(|t| StageKey::all_of(*t))
            .collect();
        let transitions = [
            Transition::Start,
            Transition::Submit,
            Transition::BeginReview,
            Transition::Approve,
            Transition::Reject,
            Transition::Complete { score: None },
            Transition::Complete { score: Some(9.0) },
            Transition::Complete { score: Some(1.0) },
            Transition::Endorse,
            Transition::Reset,
        ];

        for _ in 0..20 {
            let mut progress = enrolled();
            for _ in 0..300 {
                let key = keys[rng.gen_range(0..keys.len())];
                let transition = transitions[rng.gen_range(0..transitions.len())];
                let _ = progress.apply(key, transition, t0());

                let overall = progress.overall_percentage();
                assert!((0.0..=100.0 + 1e-9).contains(&overall), "overall {overall}");
            }
        }
    }
}
