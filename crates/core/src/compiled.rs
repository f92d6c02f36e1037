//! Compiled records: the merged, immutable result of an inheritance chain.

use crate::record::{AccessLevel, DataRetention, LoggingLevel, RecordMetadata, RecordType};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Security settings after every layer of the chain has been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveSecurity {
    pub access_level: AccessLevel,
    pub data_retention: DataRetention,
    pub logging: LoggingLevel,
}

impl Default for EffectiveSecurity {
    /// Least privilege, session retention, standard logging.
    fn default() -> Self {
        Self {
            access_level: AccessLevel::Transient,
            data_retention: DataRetention::Session,
            logging: LoggingLevel::Standard,
        }
    }
}

/// Tool sets unioned across the chain. Sorted and duplicate-free.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompiledTools {
    pub required: BTreeSet<String>,
    pub optional: BTreeSet<String>,
}

/// A record folded with all of its ancestors.
///
/// Built once by the merge engine and shared read-only (behind an `Arc`)
/// between every runtime context that uses it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledRecord {
    pub id: String,
    pub record_type: RecordType,
    pub layer: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// The leaf's own metadata block.
    pub metadata: RecordMetadata,
    /// Record ids from root to this record.
    pub lineage: Vec<String>,
    pub base_prompt: String,
    pub tools: CompiledTools,
    pub security: EffectiveSecurity,
    pub behavior: BTreeMap<String, Value>,
    /// Attributes declared by this record itself.
    pub attributes: BTreeMap<String, Value>,
    /// Attributes copied from the immediate parent, keyed by whitelist entry.
    pub inherited_properties: BTreeMap<String, Value>,
    /// SHA-256 over the compiled content, hex-encoded.
    pub fingerprint: String,
}

impl CompiledRecord {
    pub fn get_inherited_property(&self, key: &str) -> Option<&Value> {
        self.inherited_properties.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn compiled() -> CompiledRecord {
        CompiledRecord {
            id: "leaf".into(),
            record_type: RecordType::Specialized,
            layer: 2,
            parent_id: Some("root".into()),
            metadata: RecordMetadata {
                name: "leaf".into(),
                version: "1".into(),
                description: None,
                author: None,
                tags: vec![],
            },
            lineage: vec!["root".into(), "leaf".into()],
            base_prompt: "p".into(),
            tools: CompiledTools {
                required: ["search".to_string()].into(),
                optional: ["calendar".to_string()].into(),
            },
            security: EffectiveSecurity::default(),
            behavior: BTreeMap::new(),
            attributes: BTreeMap::from([("timezone".to_string(), json!("Asia/Tokyo"))]),
            inherited_properties: BTreeMap::from([
                ("timezone".to_string(), json!("UTC")),
                ("communication_style".to_string(), json!("concise")),
            ]),
            fingerprint: String::new(),
        }
    }

    #[test]
    fn inherited_lookup_ignores_own_attributes() {
        let record = compiled();
        assert_eq!(record.get_inherited_property("timezone"), Some(&json!("UTC")));
        assert_eq!(
            record.get_inherited_property("communication_style"),
            Some(&json!("concise"))
        );
        assert!(record.get_inherited_property("locale").is_none());
    }

    #[test]
    fn default_security_is_least_privilege() {
        assert_eq!(EffectiveSecurity::default().access_level, AccessLevel::Transient);
    }
}
