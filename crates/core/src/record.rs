//! Record model: authored personalization records and their typed form.
//!
//! Records are authored as TOML or JSON documents with two groups:
//!
//! ```toml
//! [metadata]
//! name = "travel-planner"
//! version = "1.2.0"
//! recordType = "specialized"
//! layer = 2
//! parentId = "assistant-root"
//!
//! [config]
//! basePrompt = "You plan trips."
//! inheritanceList = ["communication_style", "timezone"]
//!
//! [config.tools]
//! required = ["flight_search"]
//!
//! [config.security]
//! accessLevel = "specialized"
//! dataRetention = "session"
//! logging = "standard"
//! ```
//!
//! A [`RecordDocument`] is the raw, possibly malformed document. A
//! [`ConfigRecord`] is the typed form, which can only be built from a
//! document whose type, layer and parent declaration agree.

use crate::error::RecordError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// The four personalization layers a record can occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordType {
    Root,
    Specialized,
    Composite,
    Transient,
}

impl RecordType {
    pub const ALL: [RecordType; 4] = [
        RecordType::Root,
        RecordType::Specialized,
        RecordType::Composite,
        RecordType::Transient,
    ];

    /// The fixed layer number for this type.
    pub fn layer(self) -> i64 {
        match self {
            RecordType::Root => 1,
            RecordType::Specialized | RecordType::Composite => 2,
            RecordType::Transient => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecordType::Root => "root",
            RecordType::Specialized => "specialized",
            RecordType::Composite => "composite",
            RecordType::Transient => "transient",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.as_str() == s)
    }

    /// Whether a record of this type may declare a parent of type `parent`.
    ///
    /// - specialized → root only
    /// - composite → root or specialized
    /// - transient → any type
    /// - root → never has a parent
    pub fn accepts_parent(self, parent: RecordType) -> bool {
        match self {
            RecordType::Root => false,
            RecordType::Specialized => parent == RecordType::Root,
            RecordType::Composite => {
                matches!(parent, RecordType::Root | RecordType::Specialized)
            }
            RecordType::Transient => true,
        }
    }

    /// The capability tier that matches this record type.
    pub fn native_access_level(self) -> AccessLevel {
        match self {
            RecordType::Root => AccessLevel::Root,
            RecordType::Specialized => AccessLevel::Specialized,
            RecordType::Composite => AccessLevel::Composite,
            RecordType::Transient => AccessLevel::Transient,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability tier controlling which runtime operations a context may perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessLevel {
    Root,
    Specialized,
    Composite,
    Transient,
}

impl AccessLevel {
    pub const ALL: [AccessLevel; 4] = [
        AccessLevel::Root,
        AccessLevel::Specialized,
        AccessLevel::Composite,
        AccessLevel::Transient,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AccessLevel::Root => "root",
            AccessLevel::Specialized => "specialized",
            AccessLevel::Composite => "composite",
            AccessLevel::Transient => "transient",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    /// Relative breadth of the tier. Specialized and composite share a rank.
    pub fn rank(self) -> u8 {
        match self {
            AccessLevel::Root => 3,
            AccessLevel::Specialized | AccessLevel::Composite => 2,
            AccessLevel::Transient => 1,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long data produced under a record may be kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataRetention {
    Persistent,
    Session,
    Ephemeral,
}

impl DataRetention {
    pub const ALL: [DataRetention; 3] = [
        DataRetention::Persistent,
        DataRetention::Session,
        DataRetention::Ephemeral,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DataRetention::Persistent => "persistent",
            DataRetention::Session => "session",
            DataRetention::Ephemeral => "ephemeral",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == s)
    }
}

/// Logging verbosity, from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoggingLevel {
    Full,
    Standard,
    Minimal,
    Off,
}

impl LoggingLevel {
    pub const ALL: [LoggingLevel; 4] = [
        LoggingLevel::Full,
        LoggingLevel::Standard,
        LoggingLevel::Minimal,
        LoggingLevel::Off,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LoggingLevel::Full => "full",
            LoggingLevel::Standard => "standard",
            LoggingLevel::Minimal => "minimal",
            LoggingLevel::Off => "off",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.as_str() == s)
    }

    pub fn is_most_verbose(self) -> bool {
        self == LoggingLevel::Full
    }
}

/// Attribute names a child record may whitelist from its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InheritableAttribute {
    CommunicationStyle,
    PrivacyPreference,
    LanguagePreference,
    Timezone,
    BehaviorPattern,
}

impl InheritableAttribute {
    pub const ALL: [InheritableAttribute; 5] = [
        InheritableAttribute::CommunicationStyle,
        InheritableAttribute::PrivacyPreference,
        InheritableAttribute::LanguagePreference,
        InheritableAttribute::Timezone,
        InheritableAttribute::BehaviorPattern,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InheritableAttribute::CommunicationStyle => "communication_style",
            InheritableAttribute::PrivacyPreference => "privacy_preference",
            InheritableAttribute::LanguagePreference => "language_preference",
            InheritableAttribute::Timezone => "timezone",
            InheritableAttribute::BehaviorPattern => "behavior_pattern",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == s)
    }
}

impl fmt::Display for InheritableAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptive metadata of a record. Never merged: a compiled record keeps
/// the leaf's block as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Tool names a record depends on, in authored order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolSet {
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(default)]
    pub optional: Vec<String>,
}

/// Security settings as authored. Unset fields inherit from ancestors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_level: Option<AccessLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_retention: Option<DataRetention>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingLevel>,
}

/// The link from a non-root record to its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lineage {
    pub parent_id: String,
    /// Attributes copied from the parent's resolved context. Not transitive.
    #[serde(default)]
    pub inheritance_list: Vec<InheritableAttribute>,
}

/// The record's position in the layer hierarchy.
///
/// Only non-root variants carry a [`Lineage`], so "parent present iff not
/// root" holds for every typed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum RecordKind {
    Root,
    Specialized(Lineage),
    Composite(Lineage),
    Transient(Lineage),
}

impl RecordKind {
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordKind::Root => RecordType::Root,
            RecordKind::Specialized(_) => RecordType::Specialized,
            RecordKind::Composite(_) => RecordType::Composite,
            RecordKind::Transient(_) => RecordType::Transient,
        }
    }

    pub fn lineage(&self) -> Option<&Lineage> {
        match self {
            RecordKind::Root => None,
            RecordKind::Specialized(l) | RecordKind::Composite(l) | RecordKind::Transient(l) => {
                Some(l)
            }
        }
    }
}

/// A validated, typed personalization record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigRecord {
    pub id: String,
    pub metadata: RecordMetadata,
    pub kind: RecordKind,
    pub base_prompt: String,
    #[serde(default)]
    pub tools: ToolSet,
    #[serde(default)]
    pub security: SecurityOverrides,
    /// Context values this record exposes to children that whitelist them.
    #[serde(default)]
    pub attributes: BTreeMap<String, Value>,
    /// Behavior-pattern scalars, merged key by key.
    #[serde(default)]
    pub behavior: BTreeMap<String, Value>,
}

impl ConfigRecord {
    pub fn record_type(&self) -> RecordType {
        self.kind.record_type()
    }

    pub fn layer(&self) -> i64 {
        self.record_type().layer()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.kind.lineage().map(|l| l.parent_id.as_str())
    }

    pub fn inheritance_list(&self) -> &[InheritableAttribute] {
        self.kind
            .lineage()
            .map(|l| l.inheritance_list.as_slice())
            .unwrap_or(&[])
    }

    /// Build a typed record from an authored document.
    pub fn from_document(doc: &RecordDocument) -> Result<Self, RecordError> {
        let dto: DocumentDto = serde_json::from_value(doc.as_value().clone())
            .map_err(|e| RecordError::Malformed(e.to_string()))?;
        dto.into_record()
    }
}

/// A raw authored record, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordDocument(Value);

impl RecordDocument {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn from_json_str(s: &str) -> Result<Self, RecordError> {
        serde_json::from_str(s)
            .map(Self)
            .map_err(|e| RecordError::Malformed(e.to_string()))
    }

    pub fn from_toml_str(s: &str) -> Result<Self, RecordError> {
        toml::from_str::<Value>(s)
            .map(Self)
            .map_err(|e| RecordError::Malformed(e.to_string()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    /// The record id: `metadata.id`, falling back to `metadata.name`.
    pub fn id(&self) -> Option<&str> {
        let metadata = self.0.get("metadata")?;
        metadata
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| {
                metadata
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|s| !s.is_empty())
            })
    }

    /// The declared record type, if present and legal.
    pub fn record_type(&self) -> Option<RecordType> {
        self.0
            .get("metadata")?
            .get("recordType")?
            .as_str()
            .and_then(RecordType::parse)
    }

    /// The declared parent id, if present and a string.
    pub fn parent_id(&self) -> Option<&str> {
        self.0.get("metadata")?.get("parentId")?.as_str()
    }
}

// ── Authoring DTOs ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct DocumentDto {
    metadata: MetadataDto,
    config: ConfigDto,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataDto {
    #[serde(default)]
    id: Option<String>,
    name: String,
    version: String,
    record_type: String,
    layer: i64,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigDto {
    base_prompt: String,
    #[serde(default)]
    inheritance_list: Vec<String>,
    #[serde(default)]
    tools: ToolSet,
    #[serde(default)]
    security: Option<SecurityDto>,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
    #[serde(default)]
    behavior: BTreeMap<String, Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecurityDto {
    #[serde(default)]
    access_level: Option<String>,
    #[serde(default)]
    data_retention: Option<String>,
    #[serde(default)]
    logging: Option<String>,
}

impl DocumentDto {
    fn into_record(self) -> Result<ConfigRecord, RecordError> {
        let MetadataDto {
            id,
            name,
            version,
            record_type,
            layer,
            parent_id,
            description,
            author,
            tags,
        } = self.metadata;

        let id = id.filter(|s| !s.is_empty()).unwrap_or_else(|| name.clone());
        let record_type =
            RecordType::parse(&record_type).ok_or(RecordError::UnknownType(record_type))?;
        if layer != record_type.layer() {
            return Err(RecordError::Malformed(format!(
                "layer {layer} does not match record type {record_type}"
            )));
        }

        let inheritance_list = self
            .config
            .inheritance_list
            .into_iter()
            .map(|name| {
                InheritableAttribute::parse(&name).ok_or(RecordError::UnknownEnumValue {
                    field: "inheritanceList",
                    value: name,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let parent_id = parent_id.filter(|p| !p.is_empty());
        let kind = match (record_type, parent_id) {
            (RecordType::Root, None) => RecordKind::Root,
            (RecordType::Root, Some(_)) | (_, None) => {
                return Err(RecordError::Lineage {
                    id,
                    record_type: record_type.to_string(),
                });
            }
            (other, Some(parent_id)) => {
                let lineage = Lineage {
                    parent_id,
                    inheritance_list,
                };
                match other {
                    RecordType::Specialized => RecordKind::Specialized(lineage),
                    RecordType::Composite => RecordKind::Composite(lineage),
                    _ => RecordKind::Transient(lineage),
                }
            }
        };

        let security = match self.config.security {
            Some(dto) => dto.into_overrides()?,
            None => SecurityOverrides::default(),
        };

        Ok(ConfigRecord {
            id,
            metadata: RecordMetadata {
                name,
                version,
                description,
                author,
                tags,
            },
            kind,
            base_prompt: self.config.base_prompt,
            tools: self.config.tools,
            security,
            attributes: self.config.attributes,
            behavior: self.config.behavior,
        })
    }
}

impl SecurityDto {
    fn into_overrides(self) -> Result<SecurityOverrides, RecordError> {
        fn parse_opt<T>(
            value: Option<String>,
            field: &'static str,
            parse: fn(&str) -> Option<T>,
        ) -> Result<Option<T>, RecordError> {
            value
                .map(|v| parse(&v).ok_or(RecordError::UnknownEnumValue { field, value: v }))
                .transpose()
        }

        Ok(SecurityOverrides {
            access_level: parse_opt(self.access_level, "accessLevel", AccessLevel::parse)?,
            data_retention: parse_opt(self.data_retention, "dataRetention", DataRetention::parse)?,
            logging: parse_opt(self.logging, "logging", LoggingLevel::parse)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn specialized_doc() -> RecordDocument {
        RecordDocument::new(json!({
            "metadata": {
                "name": "travel",
                "version": "1.0.0",
                "recordType": "specialized",
                "layer": 2,
                "parentId": "root"
            },
            "config": {
                "basePrompt": "You plan trips.",
                "inheritanceList": ["communication_style"],
                "tools": { "required": ["flights"] },
                "security": { "accessLevel": "specialized", "logging": "standard" }
            }
        }))
    }

    #[test]
    fn layer_table_is_fixed() {
        assert_eq!(RecordType::Root.layer(), 1);
        assert_eq!(RecordType::Specialized.layer(), 2);
        assert_eq!(RecordType::Composite.layer(), 2);
        assert_eq!(RecordType::Transient.layer(), 3);
    }

    #[test]
    fn parent_gating() {
        assert!(RecordType::Specialized.accepts_parent(RecordType::Root));
        assert!(!RecordType::Specialized.accepts_parent(RecordType::Specialized));
        assert!(RecordType::Composite.accepts_parent(RecordType::Specialized));
        assert!(!RecordType::Composite.accepts_parent(RecordType::Transient));
        assert!(RecordType::Transient.accepts_parent(RecordType::Transient));
        assert!(!RecordType::Root.accepts_parent(RecordType::Root));
    }

    #[test]
    fn document_id_falls_back_to_name() {
        let doc = specialized_doc();
        assert_eq!(doc.id(), Some("travel"));
        assert_eq!(doc.record_type(), Some(RecordType::Specialized));
        assert_eq!(doc.parent_id(), Some("root"));
    }

    #[test]
    fn typed_record_from_document() {
        let record = ConfigRecord::from_document(&specialized_doc()).unwrap();
        assert_eq!(record.id, "travel");
        assert_eq!(record.record_type(), RecordType::Specialized);
        assert_eq!(record.parent_id(), Some("root"));
        assert_eq!(
            record.inheritance_list(),
            &[InheritableAttribute::CommunicationStyle]
        );
        assert_eq!(record.security.access_level, Some(AccessLevel::Specialized));
        assert_eq!(record.security.data_retention, None);
        assert_eq!(record.tools.required, vec!["flights".to_string()]);
    }

    #[test]
    fn root_with_parent_is_rejected() {
        let doc = RecordDocument::new(json!({
            "metadata": {
                "name": "r", "version": "1", "recordType": "root", "layer": 1, "parentId": "x"
            },
            "config": { "basePrompt": "p" }
        }));
        assert!(matches!(
            ConfigRecord::from_document(&doc),
            Err(RecordError::Lineage { .. })
        ));
    }

    #[test]
    fn toml_documents_parse() {
        let doc = RecordDocument::from_toml_str(
            r#"
[metadata]
id = "base"
name = "Base persona"
version = "0.1.0"
recordType = "root"
layer = 1

[config]
basePrompt = "Be helpful."

[config.attributes]
timezone = "UTC"
"#,
        )
        .unwrap();
        assert_eq!(doc.id(), Some("base"));
        let record = ConfigRecord::from_document(&doc).unwrap();
        assert_eq!(record.kind, RecordKind::Root);
        assert_eq!(record.attributes.get("timezone"), Some(&json!("UTC")));
    }

    #[test]
    fn unknown_security_value_fails_typed_parse() {
        let doc = RecordDocument::new(json!({
            "metadata": { "name": "r", "version": "1", "recordType": "root", "layer": 1 },
            "config": { "basePrompt": "p", "security": { "logging": "loud" } }
        }));
        assert!(matches!(
            ConfigRecord::from_document(&doc),
            Err(RecordError::UnknownEnumValue { field: "logging", .. })
        ));
    }
}
