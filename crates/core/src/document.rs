//! Supporting documents a visa step asks for.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::Time;

/// One entry of a visa step's document checklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Document name, unique within its step
    pub name: String,

    /// Whether the step cannot proceed without it
    pub required: bool,

    /// When the customer handed it in
    pub submitted_at: Option<Time>,

    /// Expiry date printed on the document
    pub expires_on: Option<NaiveDate>,
}

impl Document {
    /// A required, not yet submitted document.
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            submitted_at: None,
            expires_on: None,
        }
    }

    /// An optional document.
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            required: false,
            ..Self::required(name)
        }
    }

    /// Set the expiry date.
    pub fn expires_on(mut self, date: NaiveDate) -> Self {
        self.expires_on = Some(date);
        self
    }

    /// Whether it has been handed in.
    pub fn is_submitted(&self) -> bool {
        self.submitted_at.is_some()
    }

    /// Whether the document is still valid on `date`.
    pub fn is_valid_on(&self, date: NaiveDate) -> bool {
        self.expires_on.map_or(true, |expiry| expiry >= date)
    }
}

/// Names of required documents not yet submitted, sorted.
pub fn missing_documents(documents: &[Document]) -> Vec<&str> {
    let mut missing: Vec<&str> = documents
        .iter()
        .filter(|d| d.required && !d.is_submitted())
        .map(|d| d.name.as_str())
        .collect();
    missing.sort_unstable();
    missing
}
