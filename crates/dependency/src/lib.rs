//! Dependency layer - prerequisite edges between stages, cycle detection,
//! and start eligibility.

#![warn(missing_docs)]

pub mod graph;
pub mod resolution;

pub use graph::{DependencyGraph, DependencyEdge};
pub use resolution::Resolution;
