//! Stage model - a single unit of work inside a track, and its state machine.

use serde::{Deserialize, Serialize};

use crate::coursework::{Coursework, Exam};
use crate::document::{missing_documents, Document};
use crate::error::LedgerError;
use crate::score::check_score;
use crate::track::{max_credit, TrackKind};
use crate::Time;

/// Stages of the vocational training track, in default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainingStage {
    /// Classroom theory
    Theory,
    /// Hands-on workshop practice
    Practical,
    /// Recorded skills demonstration
    Video,
    /// Supervised work placement
    Internship,
}

impl TrainingStage {
    /// All training stages in default order.
    pub const ALL: [TrainingStage; 4] = [
        TrainingStage::Theory,
        TrainingStage::Practical,
        TrainingStage::Video,
        TrainingStage::Internship,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Theory => "theory",
            TrainingStage::Practical => "practical",
            TrainingStage::Video => "video",
            TrainingStage::Internship => "internship",
        }
    }
}

/// Courses of the English track, in default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnglishCourse {
    /// Beginner level
    Beginner,
    /// Foundation level
    Foundation,
    /// Intermediate level
    Intermediate,
    /// Workplace communication
    Communication,
    /// Interview preparation
    Interview,
}

impl EnglishCourse {
    /// All English courses in default order.
    pub const ALL: [EnglishCourse; 5] = [
        EnglishCourse::Beginner,
        EnglishCourse::Foundation,
        EnglishCourse::Intermediate,
        EnglishCourse::Communication,
        EnglishCourse::Interview,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnglishCourse::Beginner => "beginner",
            EnglishCourse::Foundation => "foundation",
            EnglishCourse::Intermediate => "intermediate",
            EnglishCourse::Communication => "communication",
            EnglishCourse::Interview => "interview",
        }
    }
}

/// Steps of the visa pipeline, in default order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaStep {
    /// Eligibility checklist
    Checklist,
    /// Employer job offer
    JobOffer,
    /// Labour Market Impact Assessment
    Lmia,
    /// Skills assessment by the assessing authority
    SkillsAssessment,
    /// State or provincial sponsorship
    StateSponsorship,
    /// Employer nomination
    Nomination,
    /// The visa application itself
    Visa,
}

impl VisaStep {
    /// All visa steps in default order.
    pub const ALL: [VisaStep; 7] = [
        VisaStep::Checklist,
        VisaStep::JobOffer,
        VisaStep::Lmia,
        VisaStep::SkillsAssessment,
        VisaStep::StateSponsorship,
        VisaStep::Nomination,
        VisaStep::Visa,
    ];

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VisaStep::Checklist => "checklist",
            VisaStep::JobOffer => "job_offer",
            VisaStep::Lmia => "lmia",
            VisaStep::SkillsAssessment => "skills_assessment",
            VisaStep::StateSponsorship => "state_sponsorship",
            VisaStep::Nomination => "nomination",
            VisaStep::Visa => "visa",
        }
    }
}

/// Identity of a stage within one customer.
///
/// The track is part of the key, so a stage can never be filed under the
/// wrong track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "track", content = "stage", rename_all = "snake_case")]
pub enum StageKey {
    /// A training stage
    Training(TrainingStage),
    /// An English course
    English(EnglishCourse),
    /// A visa step
    Visa(VisaStep),
}

impl StageKey {
    /// The track this stage belongs to.
    pub fn track(&self) -> TrackKind {
        match self {
            StageKey::Training(_) => TrackKind::Training,
            StageKey::English(_) => TrackKind::English,
            StageKey::Visa(_) => TrackKind::Visa,
        }
    }

    /// Stage name without the track prefix.
    pub fn name(&self) -> &'static str {
        match self {
            StageKey::Training(s) => s.as_str(),
            StageKey::English(c) => c.as_str(),
            StageKey::Visa(s) => s.as_str(),
        }
    }

    /// Every stage key of a track, in default order.
    pub fn all_of(track: TrackKind) -> Vec<StageKey> {
        match track {
            TrackKind::Training => TrainingStage::ALL.iter().copied().map(StageKey::Training).collect(),
            TrackKind::English => EnglishCourse::ALL.iter().copied().map(StageKey::English).collect(),
            TrackKind::Visa => VisaStep::ALL.iter().copied().map(StageKey::Visa).collect(),
        }
    }
}

impl std::fmt::Display for StageKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.track().as_str(), self.name())
    }
}

impl std::str::FromStr for StageKey {
    type Err = LedgerError;

    /// Parse `<track>:<stage>`, e.g. `visa:lmia` or `training:theory`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unrecognised = || LedgerError::UnrecognisedStage(s.to_string());
        let (track, stage) = s.trim().split_once(':').ok_or_else(unrecognised)?;
        let track: TrackKind = track.parse().map_err(|_| unrecognised())?;
        let stage = stage.to_ascii_lowercase();

        StageKey::all_of(track)
            .into_iter()
            .find(|key| key.name() == stage)
            .ok_or_else(unrecognised)
    }
}

/// Status of a stage.
///
/// One vocabulary is shared by all tracks; each track only reaches a subset
/// (see [`Stage::apply`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    /// Untouched, or reset
    NotStarted,
    /// Work under way
    InProgress,
    /// Visa application lodged
    Submitted,
    /// Visa application being assessed
    UnderReview,
    /// Visa step granted, or video accepted
    Approved,
    /// Finished
    Completed,
    /// English course finished at or above the pass mark
    Passed,
    /// Practical skill recognised without finishing the course
    HasSkill,
    /// Training assessed below the pass mark
    Failed,
    /// Visa application refused
    Rejected,
}

impl StageStatus {
    /// Whether this status satisfies a prerequisite edge.
    pub fn is_complete(&self) -> bool {
        matches!(
            self,
            StageStatus::Completed | StageStatus::Approved | StageStatus::Passed | StageStatus::HasSkill
        )
    }

    /// Whether the stage is idle: nothing in flight, nothing achieved.
    ///
    /// Leaving an idle status requires the stage's prerequisites.
    pub fn is_idle(&self) -> bool {
        matches!(self, StageStatus::NotStarted | StageStatus::Failed | StageStatus::Rejected)
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            StageStatus::NotStarted => "not_started",
            StageStatus::InProgress => "in_progress",
            StageStatus::Submitted => "submitted",
            StageStatus::UnderReview => "under_review",
            StageStatus::Approved => "approved",
            StageStatus::Completed => "completed",
            StageStatus::Passed => "passed",
            StageStatus::HasSkill => "has_skill",
            StageStatus::Failed => "failed",
            StageStatus::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested state-machine transition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Begin work, or retry after failure or rejection
    Start,
    /// Lodge a visa application
    Submit,
    /// Move a lodged application under review
    BeginReview,
    /// Grant a visa step
    Approve,
    /// Refuse a visa step
    Reject,
    /// Finish the stage
    Complete {
        /// Assessment score, if any
        score: Option<f64>,
    },
    /// Record an externally verified training outcome
    Endorse,
    /// Administrative reset to not started
    Reset,
}

impl Transition {
    /// Action name used in error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Submit => "submit",
            Transition::BeginReview => "begin review of",
            Transition::Approve => "approve",
            Transition::Reject => "reject",
            Transition::Complete { .. } => "complete",
            Transition::Endorse => "endorse",
            Transition::Reset => "reset",
        }
    }
}

/// A single stage owned by a customer's track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stage {
    /// Stage identity
    pub key: StageKey,

    /// Current status
    pub status: StageStatus,

    /// Assessment score, if one was recorded on completion
    pub score: Option<f64>,

    /// Maximum percentage this stage contributes to its track
    pub weight: f64,

    /// Score needed to pass, when the stage is assessed
    pub pass_threshold: Option<f64>,

    /// Planned study or work hours
    pub planned_hours: Option<f64>,

    /// Estimated processing time in days
    pub estimated_days: Option<u32>,

    /// When the stage was last started
    pub started_at: Option<Time>,

    /// When the stage reached its last terminal status
    pub completed_at: Option<Time>,

    /// Attendance and exam marks, for English courses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coursework: Option<Coursework>,

    /// Document checklist, for visa steps
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
}

impl Stage {
    /// Create a fresh, not-started stage.
    pub fn new(key: StageKey) -> Self {
        Self {
            key,
            status: StageStatus::NotStarted,
            score: None,
            weight: max_credit(key),
            pass_threshold: None,
            planned_hours: None,
            estimated_days: None,
            started_at: None,
            completed_at: None,
            coursework: None,
            documents: Vec::new(),
        }
    }

    /// Set the pass threshold.
    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = Some(threshold);
        self
    }

    /// Set planned hours.
    pub fn with_planned_hours(mut self, hours: f64) -> Self {
        self.planned_hours = Some(hours);
        self
    }

    /// Set estimated processing days.
    pub fn with_estimated_days(mut self, days: u32) -> Self {
        self.estimated_days = Some(days);
        self
    }

    /// Track attendance over `total_sessions` sessions.
    pub fn with_sessions(mut self, total_sessions: u32) -> Self {
        self.coursework = Some(Coursework::new(total_sessions));
        self
    }

    /// Add a document to the checklist.
    pub fn with_document(mut self, document: Document) -> Self {
        self.documents.push(document);
        self
    }

    /// Whether the score (if any) meets the pass threshold (if any).
    ///
    /// `None` when either side is missing.
    pub fn is_passed(&self) -> Option<bool> {
        match (self.score, self.pass_threshold) {
            (Some(score), Some(threshold)) => Some(score >= threshold),
            _ => None,
        }
    }

    /// Compute the stage that results from `transition` at time `at`.
    ///
    /// Returns the complete next state, or an error leaving `self`
    /// untouched. Prerequisite gating is not checked here; the owner of the
    /// dependency graph does that for every transition out of an idle status
    /// except `Reset`. Scores must be finite and not negative.
    pub fn apply(&self, transition: Transition, at: Time) -> Result<Stage, LedgerError> {
        let track = self.key.track();
        let mut next = self.clone();

        match transition {
            Transition::Start => {
                self.ensure(self.status.is_idle(), transition.name())?;
                next.status = StageStatus::InProgress;
                next.started_at = Some(at);
                next.completed_at = None;
                next.score = None;
            }
            Transition::Submit => {
                self.ensure(track == TrackKind::Visa && self.status == StageStatus::InProgress, transition.name())?;
                next.status = StageStatus::Submitted;
            }
            Transition::BeginReview => {
                self.ensure(track == TrackKind::Visa && self.status == StageStatus::Submitted, transition.name())?;
                next.status = StageStatus::UnderReview;
            }
            Transition::Approve | Transition::Reject => {
                let awaiting_decision =
                    matches!(self.status, StageStatus::Submitted | StageStatus::UnderReview);
                self.ensure(track == TrackKind::Visa && awaiting_decision, transition.name())?;
                next.status = if transition == Transition::Approve {
                    StageStatus::Approved
                } else {
                    StageStatus::Rejected
                };
                next.completed_at = Some(at);
            }
            Transition::Complete { score } => {
                let allowed = match self.status {
                    StageStatus::NotStarted | StageStatus::InProgress => true,
                    StageStatus::Submitted | StageStatus::UnderReview => track == TrackKind::Visa,
                    _ => false,
                };
                self.ensure(allowed, transition.name())?;
                next.score = match score {
                    Some(score) => Some(check_score(score)?),
                    None => self.coursework.as_ref().and_then(Coursework::average),
                };
                next.status = track.completion_status(next.is_passed());
                next.completed_at = Some(at);
            }
            Transition::Endorse => {
                next.status = match (self.key, self.status) {
                    (
                        StageKey::Training(TrainingStage::Practical),
                        StageStatus::NotStarted | StageStatus::InProgress,
                    ) => StageStatus::HasSkill,
                    (StageKey::Training(TrainingStage::Video), StageStatus::Completed) => {
                        StageStatus::Approved
                    }
                    _ => return Err(self.invalid(transition.name())),
                };
                next.completed_at = Some(at);
            }
            Transition::Reset => {
                next.status = StageStatus::NotStarted;
                next.started_at = None;
                next.completed_at = None;
                next.score = None;
                if let Some(work) = &mut next.coursework {
                    *work = Coursework::new(work.total_sessions);
                }
                for document in &mut next.documents {
                    document.submitted_at = None;
                }
            }
        }

        Ok(next)
    }

    /// Count one attended session of a course in progress.
    ///
    /// Attendance beyond the planned sessions is ignored.
    pub fn attend(&self, at: Time) -> Result<Stage, LedgerError> {
        let action = "record attendance for";
        let mut next = self.clone();
        let work = self.coursework_in_progress(&mut next, action)?;
        work.attend(at);
        Ok(next)
    }

    /// Store a midterm or final mark of a course in progress. On completion
    /// without an explicit score the course is judged on these marks.
    pub fn record_exam(&self, exam: Exam, score: f64) -> Result<Stage, LedgerError> {
        let action = "record an exam for";
        let mut next = self.clone();
        let work = self.coursework_in_progress(&mut next, action)?;
        work.record_exam(exam, score)?;
        Ok(next)
    }

    /// Add a document to a visa step's checklist.
    pub fn require_document(&self, document: Document) -> Result<Stage, LedgerError> {
        self.ensure(self.key.track() == TrackKind::Visa, "require documents for")?;
        if self.documents.iter().any(|d| d.name == document.name) {
            return Err(LedgerError::DuplicateDocument {
                stage: self.key,
                name: document.name,
            });
        }
        let mut next = self.clone();
        next.documents.push(document);
        Ok(next)
    }

    /// Mark a checklist document as handed in at `at`.
    pub fn submit_document(&self, name: &str, at: Time) -> Result<Stage, LedgerError> {
        let mut next = self.clone();
        let document = next
            .documents
            .iter_mut()
            .find(|d| d.name == name)
            .ok_or_else(|| LedgerError::UnknownDocument {
                stage: self.key,
                name: name.to_string(),
            })?;
        document.submitted_at = Some(at);
        Ok(next)
    }

    /// Required documents not yet submitted, sorted by name.
    pub fn missing_documents(&self) -> Vec<&str> {
        missing_documents(&self.documents)
    }

    /// Percentage this stage currently contributes to its track.
    pub fn credit(&self) -> f64 {
        crate::track::stage_credit(self.key, self.status)
    }

    fn coursework_in_progress<'a>(
        &self,
        next: &'a mut Stage,
        action: &'static str,
    ) -> Result<&'a mut Coursework, LedgerError> {
        self.ensure(self.status == StageStatus::InProgress, action)?;
        next.coursework.as_mut().ok_or_else(|| self.invalid(action))
    }

    fn ensure(&self, allowed: bool, action: &'static str) -> Result<(), LedgerError> {
        if allowed {
            Ok(())
        } else {
            Err(self.invalid(action))
        }
    }

    fn invalid(&self, action: &'static str) -> LedgerError {
        LedgerError::InvalidTransition {
            stage: self.key,
            from: self.status,
            action,
        }
    }
}
