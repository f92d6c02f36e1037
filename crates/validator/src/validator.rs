//! The record validator.
//!
//! Runs six passes over a raw document and collects every problem instead of
//! stopping at the first one:
//!
//! 1. structure (required groups and fields)
//! 2. record type and layer
//! 3. parent declaration
//! 4. inheritance whitelist
//! 5. security block
//! 6. tool dependencies

use crate::report::{IssueKind, ValidationIssue, ValidationReport};
use persona_core::{
    AccessLevel, DataRetention, InheritableAttribute, LoggingLevel, RecordDocument, RecordType,
};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

type Table = Map<String, Value>;

/// Stateless validator for authored records.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordValidator;

impl RecordValidator {
    pub fn new() -> Self {
        Self
    }

    /// Validate a record on its own. The parent-type gate is skipped because
    /// the parent is unknown; resolution applies it on every hop.
    pub fn validate(&self, doc: &RecordDocument) -> ValidationReport {
        self.validate_with_parent(doc, None)
    }

    /// Validate a record whose parent's type is already known.
    pub fn validate_with_parent(
        &self,
        doc: &RecordDocument,
        parent_type: Option<RecordType>,
    ) -> ValidationReport {
        let mut issues = Issues::default();
        let record_id = doc.id().map(String::from);

        let Some(root) = doc.as_value().as_object() else {
            issues.error(
                IssueKind::Structural,
                "",
                "record must be a document with `metadata` and `config` groups",
            );
            return issues.finish(record_id);
        };

        let metadata = group(root, "metadata", &mut issues);
        let config = group(root, "config", &mut issues);

        if let Some(m) = metadata {
            check_metadata_fields(m, &mut issues);
        }
        if let Some(c) = config {
            check_config_fields(c, &mut issues);
        }

        let record_type = metadata.and_then(|m| check_type_layer(m, &mut issues));

        if let Some(m) = metadata {
            check_lineage(m, record_type, parent_type, record_id.as_deref(), &mut issues);
        }

        if let Some(c) = config {
            check_inheritance_list(c, record_type, &mut issues);
            check_security(c, record_type, &mut issues);
            check_tools(c, &mut issues);
        }

        let report = issues.finish(record_id);
        debug!(
            record_id = report.record_id.as_deref().unwrap_or("<unnamed>"),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "Record validated"
        );
        report
    }

    /// Check that a `child` record may inherit from a `parent` record.
    pub fn check_parent_link(child: RecordType, parent: RecordType) -> Option<ValidationIssue> {
        if child.accepts_parent(parent) {
            return None;
        }
        let allowed: Vec<&str> = RecordType::ALL
            .into_iter()
            .filter(|t| child.accepts_parent(*t))
            .map(RecordType::as_str)
            .collect();
        let allowed = if allowed.is_empty() {
            "none".to_string()
        } else {
            allowed.join(", ")
        };
        Some(ValidationIssue::new(
            IssueKind::Inheritance,
            "metadata.parentId",
            format!("a {child} record cannot inherit from a {parent} record (allowed parents: {allowed})"),
        ))
    }
}

// ── Issue collection ───────────────────────────────────────────────

#[derive(Default)]
struct Issues {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl Issues {
    fn error(&mut self, kind: IssueKind, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue::new(kind, field, message));
    }

    fn warn(&mut self, kind: IssueKind, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue::new(kind, field, message));
    }

    fn finish(self, record_id: Option<String>) -> ValidationReport {
        ValidationReport::new(record_id, self.errors, self.warnings)
    }
}

/// A field that may be absent, well-formed, or already reported as invalid.
enum Declared<T> {
    Absent,
    Valid(T),
    Invalid,
}

// ── Pass 1: structure ──────────────────────────────────────────────

fn group<'a>(root: &'a Table, name: &str, issues: &mut Issues) -> Option<&'a Table> {
    match root.get(name) {
        None => {
            issues.error(
                IssueKind::Structural,
                name,
                format!("missing required group `{name}`"),
            );
            None
        }
        Some(Value::Object(table)) => Some(table),
        Some(_) => {
            issues.error(IssueKind::Structural, name, format!("`{name}` must be a table"));
            None
        }
    }
}

fn require_non_empty_string(table: &Table, group: &str, key: &str, issues: &mut Issues) {
    let field = format!("{group}.{key}");
    match table.get(key) {
        None => issues.error(
            IssueKind::Structural,
            &field,
            format!("missing required field `{field}`"),
        ),
        Some(Value::String(s)) if !s.trim().is_empty() => {}
        Some(_) => issues.error(
            IssueKind::Structural,
            &field,
            format!("`{field}` must be a non-empty string"),
        ),
    }
}

fn check_metadata_fields(metadata: &Table, issues: &mut Issues) {
    require_non_empty_string(metadata, "metadata", "name", issues);
    require_non_empty_string(metadata, "metadata", "version", issues);

    match metadata.get("recordType") {
        None => issues.error(
            IssueKind::Structural,
            "metadata.recordType",
            "missing required field `metadata.recordType`",
        ),
        Some(Value::String(_)) => {}
        Some(_) => issues.error(
            IssueKind::Structural,
            "metadata.recordType",
            "`metadata.recordType` must be a string",
        ),
    }

    match metadata.get("layer") {
        None => issues.error(
            IssueKind::Structural,
            "metadata.layer",
            "missing required field `metadata.layer`",
        ),
        Some(v) if v.as_i64().is_some() => {}
        Some(_) => issues.error(
            IssueKind::Structural,
            "metadata.layer",
            "`metadata.layer` must be an integer",
        ),
    }

    if let Some(id) = metadata.get("id") {
        if !matches!(id, Value::String(s) if !s.trim().is_empty()) {
            issues.error(
                IssueKind::Structural,
                "metadata.id",
                "`metadata.id` must be a non-empty string when present",
            );
        }
    }

    for key in ["description", "author"] {
        if let Some(value) = metadata.get(key) {
            if !matches!(value, Value::String(_) | Value::Null) {
                issues.error(
                    IssueKind::Structural,
                    format!("metadata.{key}"),
                    format!("`metadata.{key}` must be a string when present"),
                );
            }
        }
    }

    if let Some(tags) = metadata.get("tags") {
        let well_formed = tags
            .as_array()
            .is_some_and(|tags| tags.iter().all(Value::is_string));
        if !well_formed {
            issues.error(
                IssueKind::Structural,
                "metadata.tags",
                "`metadata.tags` must be an array of strings",
            );
        }
    }
}

fn check_config_fields(config: &Table, issues: &mut Issues) {
    require_non_empty_string(config, "config", "basePrompt", issues);

    match config.get("attributes") {
        None => {}
        Some(Value::Object(attributes)) => {
            for key in attributes.keys() {
                if InheritableAttribute::parse(key).is_none() {
                    issues.warn(
                        IssueKind::Inheritance,
                        format!("config.attributes.{key}"),
                        format!("`{key}` is not an inheritable attribute; no child can whitelist it"),
                    );
                }
            }
        }
        Some(_) => issues.error(
            IssueKind::Structural,
            "config.attributes",
            "`config.attributes` must be a table",
        ),
    }

    match config.get("behavior") {
        None => {}
        Some(Value::Object(behavior)) => {
            for (key, value) in behavior {
                if value.is_array() || value.is_object() || value.is_null() {
                    issues.error(
                        IssueKind::Structural,
                        format!("config.behavior.{key}"),
                        "behavior values must be strings, numbers or booleans",
                    );
                }
            }
        }
        Some(_) => issues.error(
            IssueKind::Structural,
            "config.behavior",
            "`config.behavior` must be a table",
        ),
    }
}

// ── Pass 2: type and layer ─────────────────────────────────────────

fn check_type_layer(metadata: &Table, issues: &mut Issues) -> Option<RecordType> {
    let declared = metadata.get("recordType").and_then(Value::as_str);
    let layer = metadata.get("layer").and_then(Value::as_i64);
    let record_type = declared.and_then(RecordType::parse);

    if let Some(name) = declared {
        if record_type.is_none() {
            issues.error(
                IssueKind::TypeLayer,
                "metadata.recordType",
                format!(
                    "unknown record type `{name}` (expected one of root, specialized, composite, transient)"
                ),
            );
        }
    }

    match (record_type, layer) {
        (Some(t), Some(l)) if l != t.layer() => issues.error(
            IssueKind::TypeLayer,
            "metadata.layer",
            format!("layer {l} does not match record type `{t}` (expected {})", t.layer()),
        ),
        (None, Some(l)) if !(1..=3).contains(&l) => issues.error(
            IssueKind::TypeLayer,
            "metadata.layer",
            format!("layer {l} is outside the legal range 1..=3"),
        ),
        _ => {}
    }

    record_type
}

// ── Pass 3: parent declaration ─────────────────────────────────────

fn check_lineage(
    metadata: &Table,
    record_type: Option<RecordType>,
    parent_type: Option<RecordType>,
    own_id: Option<&str>,
    issues: &mut Issues,
) {
    let parent_id = match metadata.get("parentId") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(Value::String(s)) => Some(s.as_str()),
        Some(_) => {
            issues.error(
                IssueKind::Structural,
                "metadata.parentId",
                "`metadata.parentId` must be a string",
            );
            return;
        }
    };

    let Some(record_type) = record_type else {
        return;
    };

    match (record_type, parent_id) {
        (RecordType::Root, None) => {}
        (RecordType::Root, Some(parent)) => issues.error(
            IssueKind::Inheritance,
            "metadata.parentId",
            format!("root records must not declare a parent (found `{parent}`)"),
        ),
        (t, None) => issues.error(
            IssueKind::Inheritance,
            "metadata.parentId",
            format!("{t} records must declare a `parentId`"),
        ),
        (t, Some(parent)) => {
            if own_id == Some(parent) {
                issues.error(
                    IssueKind::Inheritance,
                    "metadata.parentId",
                    format!("record `{parent}` cannot be its own parent"),
                );
            }
            if let Some(pt) = parent_type {
                if let Some(issue) = RecordValidator::check_parent_link(t, pt) {
                    issues.errors.push(issue);
                }
            }
        }
    }
}

// ── Pass 4: inheritance whitelist ──────────────────────────────────

fn check_inheritance_list(config: &Table, record_type: Option<RecordType>, issues: &mut Issues) {
    let Some(list) = config.get("inheritanceList") else {
        return;
    };
    let Some(items) = list.as_array() else {
        issues.error(
            IssueKind::Structural,
            "config.inheritanceList",
            "`config.inheritanceList` must be an array of attribute names",
        );
        return;
    };

    if record_type == Some(RecordType::Root) && !items.is_empty() {
        issues.warn(
            IssueKind::Inheritance,
            "config.inheritanceList",
            "root records have no parent; the inheritance list is ignored",
        );
    }

    let allowed = InheritableAttribute::ALL
        .iter()
        .map(|a| a.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let mut seen = HashSet::new();
    for (i, item) in items.iter().enumerate() {
        let field = format!("config.inheritanceList[{i}]");
        match item.as_str() {
            None => issues.error(IssueKind::Structural, field, "entries must be strings"),
            Some(name) if InheritableAttribute::parse(name).is_none() => issues.error(
                IssueKind::Inheritance,
                field,
                format!("`{name}` is not an inheritable attribute (allowed: {allowed})"),
            ),
            Some(name) => {
                if !seen.insert(name) {
                    issues.warn(
                        IssueKind::Inheritance,
                        field,
                        format!("`{name}` is listed more than once"),
                    );
                }
            }
        }
    }
}

// ── Pass 5: security ───────────────────────────────────────────────

fn enum_field<T>(
    security: &Table,
    key: &str,
    parse: fn(&str) -> Option<T>,
    allowed: &[&str],
    issues: &mut Issues,
) -> Declared<T> {
    let Some(value) = security.get(key) else {
        return Declared::Absent;
    };
    match value.as_str().and_then(parse) {
        Some(parsed) => Declared::Valid(parsed),
        None => {
            issues.error(
                IssueKind::SecurityConfig,
                format!("config.security.{key}"),
                format!("unknown value {value} (expected one of {})", allowed.join(", ")),
            );
            Declared::Invalid
        }
    }
}

fn check_security(config: &Table, record_type: Option<RecordType>, issues: &mut Issues) {
    let Some(security) = config.get("security") else {
        issues.warn(
            IssueKind::SecurityConfig,
            "config.security",
            "no security block; access level, retention and logging are inherited or defaulted",
        );
        return;
    };
    let Some(security) = security.as_object() else {
        issues.error(
            IssueKind::Structural,
            "config.security",
            "`config.security` must be a table",
        );
        return;
    };

    let access = enum_field(
        security,
        "accessLevel",
        AccessLevel::parse,
        &AccessLevel::ALL.map(AccessLevel::as_str),
        issues,
    );
    enum_field(
        security,
        "dataRetention",
        DataRetention::parse,
        &DataRetention::ALL.map(DataRetention::as_str),
        issues,
    );
    let logging = enum_field(
        security,
        "logging",
        LoggingLevel::parse,
        &LoggingLevel::ALL.map(LoggingLevel::as_str),
        issues,
    );

    if record_type == Some(RecordType::Root) {
        let verbose = match logging {
            Declared::Valid(level) => level.is_most_verbose(),
            Declared::Absent => false,
            Declared::Invalid => true,
        };
        if !verbose {
            issues.warn(
                IssueKind::SecurityConfig,
                "config.security.logging",
                "root records should use `full` logging",
            );
        }
    }

    if let (Some(t), Declared::Valid(level)) = (record_type, access) {
        if level.rank() > t.native_access_level().rank() {
            issues.warn(
                IssueKind::SecurityConfig,
                "config.security.accessLevel",
                format!("access level `{level}` is broader than the `{t}` tier"),
            );
        }
    }
}

// ── Pass 6: tools ──────────────────────────────────────────────────

fn tool_list<'a>(tools: &'a Table, key: &str, issues: &mut Issues) -> Vec<&'a str> {
    let field = format!("config.tools.{key}");
    let Some(value) = tools.get(key) else {
        return Vec::new();
    };
    let Some(items) = value.as_array() else {
        issues.error(
            IssueKind::ToolDependency,
            field,
            "must be an array of tool names",
        );
        return Vec::new();
    };

    let mut names = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(name) if !name.trim().is_empty() => {
                if names.contains(&name) {
                    issues.warn(
                        IssueKind::ToolDependency,
                        format!("{field}[{i}]"),
                        format!("`{name}` is listed more than once"),
                    );
                } else {
                    names.push(name);
                }
            }
            _ => issues.error(
                IssueKind::ToolDependency,
                format!("{field}[{i}]"),
                "tool entries must be non-empty strings",
            ),
        }
    }
    names
}

fn check_tools(config: &Table, issues: &mut Issues) {
    let Some(tools) = config.get("tools") else {
        return;
    };
    let Some(tools) = tools.as_object() else {
        issues.error(
            IssueKind::ToolDependency,
            "config.tools",
            "`config.tools` must be a table with `required` and `optional` lists",
        );
        return;
    };

    let required = tool_list(tools, "required", issues);
    let optional = tool_list(tools, "optional", issues);

    for name in required.iter().filter(|n| optional.contains(*n)) {
        issues.warn(
            IssueKind::ToolDependency,
            "config.tools",
            format!("`{name}` is listed as both required and optional"),
        );
    }
}
