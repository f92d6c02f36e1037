//! Validation report model: what a record author sees after a check.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The class of problem an issue reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A required field is missing or has the wrong shape.
    Structural,
    /// Illegal record type, or a layer that does not match it.
    TypeLayer,
    /// Illegal or missing parent, or an unknown whitelist entry.
    Inheritance,
    /// Unknown enum value in the security block.
    SecurityConfig,
    /// Malformed tool entries.
    ToolDependency,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IssueKind::Structural => "structural",
            IssueKind::TypeLayer => "type/layer",
            IssueKind::Inheritance => "inheritance",
            IssueKind::SecurityConfig => "security",
            IssueKind::ToolDependency => "tools",
        };
        f.write_str(s)
    }
}

/// A single problem found in a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Dotted path to the offending field (e.g. `config.tools.required[2]`).
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "[{}] {}", self.kind, self.message)
        } else {
            write!(f, "[{}] {}: {}", self.kind, self.field, self.message)
        }
    }
}

/// Outcome of validating one record. Errors block use; warnings never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub is_valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    pub fn new(
        record_id: Option<String>,
        errors: Vec<ValidationIssue>,
        warnings: Vec<ValidationIssue>,
    ) -> Self {
        Self {
            record_id,
            is_valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    pub fn has_error(&self, kind: IssueKind) -> bool {
        self.errors.iter().any(|e| e.kind == kind)
    }

    pub fn errors_of(&self, kind: IssueKind) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    pub fn has_warning(&self, kind: IssueKind) -> bool {
        self.warnings.iter().any(|w| w.kind == kind)
    }

    /// One-line summary for logs and error messages.
    pub fn summary(&self) -> String {
        let id = self.record_id.as_deref().unwrap_or("<unnamed>");
        if self.is_valid {
            format!("{id}: valid ({} warning(s))", self.warnings.len())
        } else {
            let first = self
                .errors
                .first()
                .map(ToString::to_string)
                .unwrap_or_default();
            format!(
                "{id}: {} error(s), {} warning(s); first: {first}",
                self.errors.len(),
                self.warnings.len()
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_follows_errors_only() {
        let report = ValidationReport::new(
            Some("r".into()),
            vec![],
            vec![ValidationIssue::new(IssueKind::SecurityConfig, "config.security", "missing")],
        );
        assert!(report.is_valid);
        assert!(report.has_warning(IssueKind::SecurityConfig));
        assert!(report.summary().contains("valid"));

        let report = ValidationReport::new(
            None,
            vec![ValidationIssue::new(IssueKind::TypeLayer, "metadata.layer", "mismatch")],
            vec![],
        );
        assert!(!report.is_valid);
        assert!(report.has_error(IssueKind::TypeLayer));
        assert!(report.summary().starts_with("<unnamed>: 1 error(s)"));
    }

    #[test]
    fn issue_display_includes_field() {
        let issue = ValidationIssue::new(IssueKind::ToolDependency, "config.tools.required[0]", "empty");
        assert_eq!(issue.to_string(), "[tools] config.tools.required[0]: empty");
    }

    #[test]
    fn report_serializes_is_valid() {
        let report = ValidationReport::new(Some("r".into()), vec![], vec![]);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"is_valid\":true"));
    }
}
