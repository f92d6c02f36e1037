//! Inheritance chain resolution: walking `parentId` links up to a root.

use persona_core::{ConfigRecord, RecordError, RecordStore, RecordType, StoreError};
use persona_validator::{RecordValidator, ValidationReport};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Default cap on chain length, leaf included.
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 16;

/// Records from the root to a target record, both included.
#[derive(Debug, Clone, PartialEq)]
pub struct InheritanceChain {
    records: Vec<ConfigRecord>,
}

impl InheritanceChain {
    /// Wrap records that are already ordered root first.
    pub fn new(records: Vec<ConfigRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ConfigRecord] {
        &self.records
    }

    pub fn root(&self) -> Option<&ConfigRecord> {
        self.records.first()
    }

    /// The record the chain was resolved for.
    pub fn leaf(&self) -> Option<&ConfigRecord> {
        self.records.last()
    }

    /// Record ids, root first.
    pub fn ids(&self) -> Vec<String> {
        self.records.iter().map(|r| r.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Why a chain could not be resolved. Resolution stops at the first one.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolutionError {
    #[error("Record '{child_id}' names parent '{parent_id}', which does not exist")]
    MissingAncestor { child_id: String, parent_id: String },

    #[error("Inheritance cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    #[error("A {child_type} record ('{child_id}') cannot inherit from a {parent_type} record ('{parent_id}')")]
    IllegalParent {
        child_id: String,
        child_type: RecordType,
        parent_id: String,
        parent_type: RecordType,
    },

    #[error("Ancestor '{record_id}' is invalid: {}", .report.summary())]
    InvalidAncestor {
        record_id: String,
        report: Box<ValidationReport>,
    },

    #[error("Chain for '{leaf_id}' is deeper than {max_depth} records")]
    DepthExceeded { leaf_id: String, max_depth: usize },

    #[error("Store error while resolving '{record_id}': {source}")]
    Store {
        record_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Ancestor '{record_id}' could not be parsed: {source}")]
    Parse {
        record_id: String,
        #[source]
        source: RecordError,
    },
}

/// Walks a record's ancestors through a [`RecordStore`].
///
/// Every ancestor is fetched once, validated on its own, and checked
/// against the parent rules of the record below it. Visited ids are
/// tracked so a cyclic store terminates with [`ResolutionError::Cycle`].
pub struct InheritanceResolver<'a> {
    store: &'a dyn RecordStore,
    validator: &'a RecordValidator,
    max_depth: usize,
}

impl<'a> InheritanceResolver<'a> {
    pub fn new(store: &'a dyn RecordStore, validator: &'a RecordValidator) -> Self {
        Self {
            store,
            validator,
            max_depth: DEFAULT_MAX_CHAIN_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Resolve the chain ending at `leaf`, root first.
    pub async fn resolve(&self, leaf: ConfigRecord) -> Result<InheritanceChain, ResolutionError> {
        let leaf_id = leaf.id.clone();
        let mut path = vec![leaf_id.clone()];
        let mut visited = HashSet::from([leaf_id.clone()]);
        let mut records = vec![leaf];

        loop {
            let Some(child) = records.last() else {
                break;
            };
            let Some(parent_id) = child.parent_id().map(str::to_owned) else {
                break;
            };
            let child_id = child.id.clone();
            let child_type = child.record_type();

            if !visited.insert(parent_id.clone()) {
                path.push(parent_id);
                warn!(leaf = %leaf_id, path = ?path, "Inheritance cycle detected");
                return Err(ResolutionError::Cycle { path });
            }
            if records.len() >= self.max_depth {
                return Err(ResolutionError::DepthExceeded {
                    leaf_id,
                    max_depth: self.max_depth,
                });
            }

            let parent = self.fetch_ancestor(&child_id, &parent_id).await?;

            if RecordValidator::check_parent_link(child_type, parent.record_type()).is_some() {
                return Err(ResolutionError::IllegalParent {
                    child_id,
                    child_type,
                    parent_id,
                    parent_type: parent.record_type(),
                });
            }

            path.push(parent_id);
            records.push(parent);
        }

        records.reverse();
        let chain = InheritanceChain::new(records);
        debug!(leaf = %leaf_id, chain = ?chain.ids(), "Inheritance chain resolved");
        Ok(chain)
    }

    async fn fetch_ancestor(
        &self,
        child_id: &str,
        parent_id: &str,
    ) -> Result<ConfigRecord, ResolutionError> {
        let doc = self
            .store
            .get_by_id(parent_id)
            .await
            .map_err(|source| ResolutionError::Store {
                record_id: parent_id.to_string(),
                source,
            })?
            .ok_or_else(|| ResolutionError::MissingAncestor {
                child_id: child_id.to_string(),
                parent_id: parent_id.to_string(),
            })?;

        let report = self.validator.validate(&doc);
        if !report.is_valid {
            return Err(ResolutionError::InvalidAncestor {
                record_id: parent_id.to_string(),
                report: Box::new(report),
            });
        }

        ConfigRecord::from_document(&doc).map_err(|source| ResolutionError::Parse {
            record_id: parent_id.to_string(),
            source,
        })
    }
}
