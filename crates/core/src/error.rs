//! Error types shared across the Persona domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum; the resolver, runtime and
//! config crates layer their own errors on top of these.

use thiserror::Error;

/// Failures reported by a record store or preference collaborator.
///
/// `Clone` so that a single failed lookup can be handed to every waiter of
/// a shared compilation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid document '{source_name}': {reason}")]
    InvalidDocument { source_name: String, reason: String },

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Duplicate record id: {0}")]
    DuplicateId(String),
}

/// Failures turning an authored document into a typed [`ConfigRecord`](crate::ConfigRecord).
///
/// Validation normally catches all of these first; they surface only when a
/// caller parses a document it never validated.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Malformed record document: {0}")]
    Malformed(String),

    #[error("Unknown record type: {0}")]
    UnknownType(String),

    #[error("Record '{id}' of type {record_type} has an inconsistent parent declaration")]
    Lineage { id: String, record_type: String },

    #[error("Unknown {field} value: {value}")]
    UnknownEnumValue { field: &'static str, value: String },
}

/// Runtime capability failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access denied: '{operation}' on '{resource}' is not permitted at access level {access_level}")]
    Denied {
        operation: String,
        resource: String,
        access_level: String,
    },
}
