//! # Persona Validator
//!
//! Checks authored records before they are allowed into an inheritance
//! chain. Validation never fails fast: every problem in a record is
//! collected into a [`ValidationReport`], split into blocking errors and
//! advisory warnings.

pub mod report;
pub mod validator;

pub use report::{IssueKind, ValidationIssue, ValidationReport};
pub use validator::RecordValidator;
