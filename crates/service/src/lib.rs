//! Progress Ledger Service
//!
//! Customer-keyed operations over stored progress records.

#![warn(missing_docs)]

pub mod error;
pub mod ledger;

pub use error::{ServiceError, Result};
pub use ledger::{ProgressLedger, BasicProgressLedger};
