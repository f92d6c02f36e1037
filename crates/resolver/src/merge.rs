//! Layered merge: folding a resolved chain into one compiled record.
//!
//! | Field                  | Rule                                             |
//! |------------------------|--------------------------------------------------|
//! | `basePrompt`           | nearest explicit value wins                      |
//! | `security.*`           | nearest explicit value wins, else default        |
//! | `behavior.<key>`       | nearest explicit value wins, key by key          |
//! | `tools.*`              | union, required removes from optional            |
//! | `metadata`             | leaf only                                        |
//! | `inheritedProperties`  | leaf's whitelist, read from the parent's view    |

use crate::chain::InheritanceChain;
use persona_core::{
    AccessLevel, CompiledRecord, CompiledTools, ConfigRecord, DataRetention, EffectiveSecurity,
    LoggingLevel, RecordMetadata, RecordType,
};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("Cannot merge an empty inheritance chain")]
    EmptyChain,
}

/// Stateless field-by-field reducer over an [`InheritanceChain`].
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine;

impl MergeEngine {
    pub fn new() -> Self {
        Self
    }

    /// Fold `chain` root to leaf. Deterministic: the same chain always
    /// produces the same record and fingerprint.
    pub fn merge(&self, chain: &InheritanceChain) -> Result<CompiledRecord, MergeError> {
        let leaf = chain.leaf().ok_or(MergeError::EmptyChain)?;

        let mut base_prompt = String::new();
        let mut access_level: Option<AccessLevel> = None;
        let mut data_retention: Option<DataRetention> = None;
        let mut logging: Option<LoggingLevel> = None;
        let mut behavior = BTreeMap::new();
        let mut tools = CompiledTools::default();

        // Attribute view of the record above the one being folded.
        let mut parent_view: BTreeMap<String, Value> = BTreeMap::new();
        let mut inherited = BTreeMap::new();

        for record in chain.records() {
            if !record.base_prompt.is_empty() {
                base_prompt.clone_from(&record.base_prompt);
            }

            let security = record.security;
            access_level = security.access_level.or(access_level);
            data_retention = security.data_retention.or(data_retention);
            logging = security.logging.or(logging);

            for (key, value) in &record.behavior {
                behavior.insert(key.clone(), value.clone());
            }

            tools.required.extend(record.tools.required.iter().cloned());
            tools.optional.extend(record.tools.optional.iter().cloned());

            inherited = inherit_from(&parent_view, record);
            parent_view = inherited.clone();
            for (key, value) in &record.attributes {
                parent_view.insert(key.clone(), value.clone());
            }
        }

        tools.optional.retain(|t| !tools.required.contains(t));

        let defaults = EffectiveSecurity::default();
        let mut compiled = CompiledRecord {
            id: leaf.id.clone(),
            record_type: leaf.record_type(),
            layer: leaf.layer(),
            parent_id: leaf.parent_id().map(str::to_owned),
            metadata: leaf.metadata.clone(),
            lineage: chain.ids(),
            base_prompt,
            tools,
            security: EffectiveSecurity {
                access_level: access_level.unwrap_or(defaults.access_level),
                data_retention: data_retention.unwrap_or(defaults.data_retention),
                logging: logging.unwrap_or(defaults.logging),
            },
            behavior,
            attributes: leaf.attributes.clone(),
            inherited_properties: inherited,
            fingerprint: String::new(),
        };
        compiled.fingerprint = fingerprint(&compiled);
        Ok(compiled)
    }
}

/// Values `record` takes from its parent's resolved attributes: only the
/// keys it whitelists, and only those the parent can supply.
fn inherit_from(parent_view: &BTreeMap<String, Value>, record: &ConfigRecord) -> BTreeMap<String, Value> {
    record
        .inheritance_list()
        .iter()
        .filter_map(|attr| {
            let key = attr.as_str();
            parent_view.get(key).map(|v| (key.to_string(), v.clone()))
        })
        .collect()
}

/// Hashed view of a compiled record. Excludes the fingerprint itself.
#[derive(Serialize)]
struct FingerprintView<'a> {
    id: &'a str,
    record_type: RecordType,
    layer: i64,
    parent_id: Option<&'a str>,
    metadata: &'a RecordMetadata,
    lineage: &'a [String],
    base_prompt: &'a str,
    tools: &'a CompiledTools,
    security: &'a EffectiveSecurity,
    behavior: &'a BTreeMap<String, Value>,
    attributes: &'a BTreeMap<String, Value>,
    inherited_properties: &'a BTreeMap<String, Value>,
}

fn fingerprint(record: &CompiledRecord) -> String {
    let view = FingerprintView {
        id: &record.id,
        record_type: record.record_type,
        layer: record.layer,
        parent_id: record.parent_id.as_deref(),
        metadata: &record.metadata,
        lineage: &record.lineage,
        base_prompt: &record.base_prompt,
        tools: &record.tools,
        security: &record.security,
        behavior: &record.behavior,
        attributes: &record.attributes,
        inherited_properties: &record.inherited_properties,
    };
    // Serializing plain structs and BTreeMaps cannot fail.
    let bytes = serde_json::to_vec(&view).unwrap_or_default();
    hex::encode(Sha256::digest(&bytes))
}
