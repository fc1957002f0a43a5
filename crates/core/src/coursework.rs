//! Classroom records of an English course: attendance and exam marks.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::score::check_score;
use crate::Time;

/// Course exams whose marks make up the course score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Exam {
    /// Mid-course exam
    Midterm,
    /// End-of-course exam
    Final,
}

impl Exam {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Exam::Midterm => "midterm",
            Exam::Final => "final",
        }
    }
}

impl std::str::FromStr for Exam {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "midterm" => Ok(Exam::Midterm),
            "final" => Ok(Exam::Final),
            other => Err(format!("unknown exam '{other}'")),
        }
    }
}

/// Sessions and exam marks of one English course.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Coursework {
    /// Sessions the course is planned for
    pub total_sessions: u32,

    /// Sessions attended so far
    pub attended_sessions: u32,

    /// When the last session was attended
    pub last_attended_at: Option<Time>,

    /// Midterm mark
    pub midterm: Option<f64>,

    /// Final exam mark
    pub final_exam: Option<f64>,
}

impl Coursework {
    /// A course with nothing attended.
    pub fn new(total_sessions: u32) -> Self {
        Self {
            total_sessions,
            ..Self::default()
        }
    }

    /// Count one attended session. Returns false once every session has
    /// been attended.
    pub fn attend(&mut self, at: Time) -> bool {
        if self.attended_sessions >= self.total_sessions {
            return false;
        }
        self.attended_sessions += 1;
        self.last_attended_at = Some(at);
        true
    }

    /// Attended sessions as a percentage of planned sessions; 0 for a course
    /// with no sessions.
    pub fn attendance_rate(&self) -> f64 {
        if self.total_sessions == 0 {
            return 0.0;
        }
        f64::from(self.attended_sessions) / f64::from(self.total_sessions) * 100.0
    }

    /// Store an exam mark, replacing any earlier one.
    pub fn record_exam(&mut self, exam: Exam, score: f64) -> Result<(), LedgerError> {
        let score = check_score(score)?;
        match exam {
            Exam::Midterm => self.midterm = Some(score),
            Exam::Final => self.final_exam = Some(score),
        }
        Ok(())
    }

    /// Course score: the mean of both marks, or whichever one exists.
    pub fn average(&self) -> Option<f64> {
        match (self.midterm, self.final_exam) {
            (Some(midterm), Some(final_exam)) => Some((midterm + final_exam) / 2.0),
            (one, other) => one.or(other),
        }
    }
}
