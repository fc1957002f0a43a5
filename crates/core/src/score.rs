//! English test scores, the two-slot latest-score rule, and training grades.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::track::Track;

/// Accept a score only if it is finite and not negative.
///
/// Non-finite values cannot be stored as JSON numbers, so they are refused
/// before they reach a record.
pub fn check_score(score: f64) -> Result<f64, LedgerError> {
    if score.is_finite() && score >= 0.0 {
        Ok(score)
    } else {
        Err(LedgerError::InvalidScore(score))
    }
}

/// Standardised English tests the ledger tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestType {
    /// PTE Academic, scored 10-90
    Pte,
    /// IELTS, banded 0-9
    Ielts,
}

impl TestType {
    /// Overall score at which the English requirement counts as met.
    pub fn passing_score(&self) -> f64 {
        match self {
            TestType::Pte => 50.0,
            TestType::Ielts => 6.0,
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Pte => "pte",
            TestType::Ielts => "ielts",
        }
    }
}

impl std::str::FromStr for TestType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pte" => Ok(TestType::Pte),
            "ielts" => Ok(TestType::Ielts),
            other => Err(format!("unknown test type '{other}'")),
        }
    }
}

/// A single recorded test result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestScore {
    /// Which test
    pub test_type: TestType,

    /// Overall score
    pub overall: f64,

    /// Date the test was sat
    pub taken_on: Option<NaiveDate>,

    /// Listening section score
    pub listening: Option<f64>,
    /// Reading section score
    pub reading: Option<f64>,
    /// Writing section score
    pub writing: Option<f64>,
    /// Speaking section score
    pub speaking: Option<f64>,

    /// Overall score the customer was aiming for
    #[serde(default)]
    pub target: Option<f64>,

    /// Last day the result is accepted
    #[serde(default)]
    pub valid_until: Option<NaiveDate>,
}

impl TestScore {
    /// Create a score with only the overall result.
    pub fn new(test_type: TestType, overall: f64) -> Self {
        Self {
            test_type,
            overall,
            taken_on: None,
            listening: None,
            reading: None,
            writing: None,
            speaking: None,
            target: None,
            valid_until: None,
        }
    }

    /// Set the test date.
    pub fn taken_on(mut self, date: NaiveDate) -> Self {
        self.taken_on = Some(date);
        self
    }

    /// Set section scores (listening, reading, writing, speaking).
    pub fn with_sections(mut self, listening: f64, reading: f64, writing: f64, speaking: f64) -> Self {
        self.listening = Some(listening);
        self.reading = Some(reading);
        self.writing = Some(writing);
        self.speaking = Some(speaking);
        self
    }

    /// Set the target overall score.
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the expiry date of the result.
    pub fn valid_until(mut self, date: NaiveDate) -> Self {
        self.valid_until = Some(date);
        self
    }

    /// Check the overall, section and target scores.
    pub fn validate(&self) -> Result<(), LedgerError> {
        check_score(self.overall)?;
        [self.listening, self.reading, self.writing, self.speaking, self.target]
            .into_iter()
            .flatten()
            .try_for_each(|score| check_score(score).map(drop))
    }

    /// Whether the overall score reaches the target, or the test's passing
    /// score when no target was set.
    pub fn is_target_achieved(&self) -> bool {
        self.overall >= self.target.unwrap_or_else(|| self.test_type.passing_score())
    }

    /// Whether the result is still accepted on `date`. Results without an
    /// expiry never lapse.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.valid_until.map_or(true, |until| until >= date)
    }
}

/// Two attempts per test type: the first, and the most recent of the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSlots {
    /// First recorded attempt
    pub first: Option<TestScore>,

    /// Most recent of the second and later attempts
    pub latest: Option<TestScore>,
}

impl ScoreSlots {
    /// Record an attempt: slot 1 if empty, otherwise overwrite slot 2.
    ///
    /// A zero first score counts as empty, so the next attempt replaces it.
    pub fn record(&mut self, score: TestScore) {
        let first_empty = self.first.as_ref().map_or(true, |s| s.overall == 0.0);
        if first_empty {
            self.first = Some(score);
        } else {
            self.latest = Some(score);
        }
    }

    /// Latest overall score: slot 2, else slot 1, else zero.
    pub fn latest_score(&self) -> f64 {
        self.latest
            .as_ref()
            .or(self.first.as_ref())
            .map(|s| s.overall)
            .unwrap_or(0.0)
    }
}

/// Score slots for every test type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestScores {
    /// PTE Academic attempts
    pub pte: ScoreSlots,
    /// IELTS attempts
    pub ielts: ScoreSlots,
}

impl TestScores {
    /// Slots for a test type.
    pub fn slots(&self, test_type: TestType) -> &ScoreSlots {
        match test_type {
            TestType::Pte => &self.pte,
            TestType::Ielts => &self.ielts,
        }
    }

    /// Record a score into its type's slots.
    pub fn record(&mut self, score: TestScore) {
        match score.test_type {
            TestType::Pte => self.pte.record(score),
            TestType::Ielts => self.ielts.record(score),
        }
    }

    /// Latest overall score for a test type, zero when none recorded.
    pub fn latest(&self, test_type: TestType) -> f64 {
        self.slots(test_type).latest_score()
    }

    /// Whether any test type's latest score meets its passing score.
    pub fn requirement_met(&self) -> bool {
        [TestType::Pte, TestType::Ielts]
            .iter()
            .any(|t| self.latest(*t) >= t.passing_score())
    }

    /// Whether any test has a non-zero latest score.
    pub fn any_attempt(&self) -> bool {
        self.latest(TestType::Pte) > 0.0 || self.latest(TestType::Ielts) > 0.0
    }
}

/// Overall English standing of a customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnglishStatus {
    /// No course started
    NotStarted,
    /// Courses under way, no test sat
    InProgress,
    /// Tests sat, requirement not yet met
    Testing,
    /// A latest score meets its passing score
    Passed,
}

impl EnglishStatus {
    /// Derive the English status from the course track and test scores.
    pub fn derive(courses: &Track, scores: &TestScores) -> Self {
        if courses.is_untouched() {
            EnglishStatus::NotStarted
        } else if scores.requirement_met() {
            EnglishStatus::Passed
        } else if scores.any_attempt() {
            EnglishStatus::Testing
        } else {
            EnglishStatus::InProgress
        }
    }

    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            EnglishStatus::NotStarted => "not_started",
            EnglishStatus::InProgress => "in_progress",
            EnglishStatus::Testing => "testing",
            EnglishStatus::Passed => "passed",
        }
    }
}

/// Letter grade for a training score on the 0-10 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Grade {
    /// 8.5 and above
    A,
    /// 7.0 to 8.5
    B,
    /// 5.5 to 7.0
    C,
    /// 4.0 to 5.5
    D,
    /// Above zero, below 4.0
    F,
}

impl Grade {
    /// Grade a score; `None` for a zero or negative score.
    pub fn from_score(score: f64) -> Option<Self> {
        if score >= 8.5 {
            Some(Grade::A)
        } else if score >= 7.0 {
            Some(Grade::B)
        } else if score >= 5.5 {
            Some(Grade::C)
        } else if score >= 4.0 {
            Some(Grade::D)
        } else if score > 0.0 {
            Some(Grade::F)
        } else {
            None
        }
    }
}
