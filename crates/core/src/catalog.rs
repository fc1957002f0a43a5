//! Reference data used at enrollment: job categories, visa types, and the
//! default stage templates derived from them.

use serde::{Deserialize, Serialize};

use crate::coursework::Coursework;
use crate::document::Document;
use crate::stage::{EnglishCourse, Stage, StageKey, TrainingStage, VisaStep};

/// A trade a customer is contracted and trained for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobCategory {
    /// Unique code
    pub code: String,

    /// Display name
    pub name: String,

    /// Theory hours
    pub theory_hours: f64,

    /// Practical hours
    pub practical_hours: f64,

    /// Video production hours
    pub video_hours: f64,

    /// Internship length in weeks (40 hours each)
    pub internship_weeks: u32,
}

impl JobCategory {
    /// Create a job category with default training hours.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            theory_hours: 40.0,
            practical_hours: 120.0,
            video_hours: 20.0,
            internship_weeks: 4,
        }
    }

    /// Set training hours per stage.
    pub fn with_hours(mut self, theory: f64, practical: f64, video: f64, internship_weeks: u32) -> Self {
        self.theory_hours = theory;
        self.practical_hours = practical;
        self.video_hours = video;
        self.internship_weeks = internship_weeks;
        self
    }
}

/// Broad class of a visa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisaCategory {
    /// Employer-sponsored work visa
    Work,
    /// Study visa
    Student,
    /// Occupational training visa
    Training,
    /// Permanent residence
    Permanent,
    /// Other temporary stay
    Temporary,
    /// Family sponsorship
    Family,
}

impl VisaCategory {
    /// Get string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            VisaCategory::Work => "work",
            VisaCategory::Student => "student",
            VisaCategory::Training => "training",
            VisaCategory::Permanent => "permanent",
            VisaCategory::Temporary => "temporary",
            VisaCategory::Family => "family",
        }
    }
}

impl std::str::FromStr for VisaCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "work" => Ok(VisaCategory::Work),
            "student" => Ok(VisaCategory::Student),
            "training" => Ok(VisaCategory::Training),
            "permanent" => Ok(VisaCategory::Permanent),
            "temporary" => Ok(VisaCategory::Temporary),
            "family" => Ok(VisaCategory::Family),
            other => Err(format!("unknown visa category '{other}'")),
        }
    }
}

/// A visa a customer is applying for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisaType {
    /// Unique code
    pub code: String,

    /// Display name
    pub name: String,

    /// Category
    pub category: VisaCategory,
}

impl VisaType {
    /// Create a visa type.
    pub fn new(code: impl Into<String>, name: impl Into<String>, category: VisaCategory) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            category,
        }
    }
}

/// Blueprint for one stage created at enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTemplate {
    /// Stage to create
    pub key: StageKey,
    /// Score needed to pass
    pub pass_threshold: Option<f64>,
    /// Planned study or work hours
    pub planned_hours: Option<f64>,
    /// Typical processing time in days
    pub estimated_days: Option<u32>,
    /// Class sessions, for courses that take attendance
    #[serde(default)]
    pub total_sessions: Option<u32>,
    /// Documents the stage asks for
    #[serde(default)]
    pub required_documents: Vec<String>,
}

impl StageTemplate {
    /// Template with no thresholds or estimates.
    pub fn new(key: StageKey) -> Self {
        Self {
            key,
            pass_threshold: None,
            planned_hours: None,
            estimated_days: None,
            total_sessions: None,
            required_documents: Vec::new(),
        }
    }

    /// Instantiate a fresh stage.
    pub fn instantiate(&self) -> Stage {
        Stage {
            pass_threshold: self.pass_threshold,
            planned_hours: self.planned_hours,
            estimated_days: self.estimated_days,
            coursework: self.total_sessions.map(Coursework::new),
            documents: self.required_documents.iter().map(Document::required).collect(),
            ..Stage::new(self.key)
        }
    }
}

/// Training stages sized for a job category.
pub fn training_templates(job: &JobCategory) -> Vec<StageTemplate> {
    TrainingStage::ALL
        .iter()
        .map(|stage| {
            let (hours, threshold) = match stage {
                TrainingStage::Theory => (job.theory_hours, 5.0),
                TrainingStage::Practical => (job.practical_hours, 6.0),
                TrainingStage::Video => (job.video_hours, 7.0),
                TrainingStage::Internship => (f64::from(job.internship_weeks) * 40.0, 6.0),
            };
            StageTemplate {
                pass_threshold: Some(threshold),
                planned_hours: Some(hours),
                ..StageTemplate::new(StageKey::Training(*stage))
            }
        })
        .collect()
}

/// The five English courses with their hours and pass marks.
pub fn english_templates() -> Vec<StageTemplate> {
    EnglishCourse::ALL
        .iter()
        .map(|course| {
            let (hours, sessions, threshold) = match course {
                EnglishCourse::Beginner => (40.0, 20, 5.0),
                EnglishCourse::Foundation => (60.0, 30, 6.0),
                EnglishCourse::Intermediate => (80.0, 40, 6.5),
                EnglishCourse::Communication => (40.0, 20, 7.0),
                EnglishCourse::Interview => (30.0, 15, 7.5),
            };
            StageTemplate {
                pass_threshold: Some(threshold),
                planned_hours: Some(hours),
                total_sessions: Some(sessions),
                ..StageTemplate::new(StageKey::English(*course))
            }
        })
        .collect()
}

/// The seven visa steps with their typical processing times and document
/// checklists.
pub fn visa_templates() -> Vec<StageTemplate> {
    VisaStep::ALL
        .iter()
        .map(|step| {
            let (days, documents): (u32, &[&str]) = match step {
                VisaStep::Checklist => (
                    7,
                    &["Passport", "Education Certificates", "Work Experience", "English Test Results"],
                ),
                VisaStep::JobOffer => (
                    30,
                    &["Job Offer Letter", "Employer Details", "Salary Package", "Job Description"],
                ),
                VisaStep::Lmia => (
                    90,
                    &["LMIA Application", "Job Advertisement Proof", "Labour Market Information"],
                ),
                VisaStep::SkillsAssessment => (
                    60,
                    &["Skills Assessment Application", "Qualifications", "Work Experience Evidence"],
                ),
                VisaStep::StateSponsorship => (
                    45,
                    &["State Nomination Application", "Commitment Statement", "Settlement Funds"],
                ),
                VisaStep::Nomination => (
                    30,
                    &["Nomination Application", "Supporting Documents", "State Requirements"],
                ),
                VisaStep::Visa => (
                    120,
                    &["Visa Application", "Health Checks", "Character Checks", "All Supporting Documents"],
                ),
            };
            StageTemplate {
                estimated_days: Some(days),
                required_documents: documents.iter().map(|d| d.to_string()).collect(),
                ..StageTemplate::new(StageKey::Visa(*step))
            }
        })
        .collect()
}
