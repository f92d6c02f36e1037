//! Runtime contexts: one compiled record bound to one user session.

use crate::access::AccessPolicy;
use chrono::{DateTime, Utc};
use persona_core::{AccessError, AccessLevel, CompiledRecord, UserPreferences};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// Session-local state. Never shared between contexts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    pub context_variables: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionOutcome {
    Success,
    Failure,
    Denied,
}

/// One line of a context's execution history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionEntry {
    pub timestamp: DateTime<Utc>,
    pub operation: String,
    pub resource: String,
    pub outcome: ExecutionOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// A compiled record instantiated for a (user, session) pair.
///
/// The compiled record is shared with every other context built from the
/// same id; everything else here belongs to this session alone.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    context_id: Uuid,
    user_id: String,
    session_id: String,
    compiled: Arc<CompiledRecord>,
    preferences: UserPreferences,
    session: SessionData,
    history: Vec<ExecutionEntry>,
    created_at: DateTime<Utc>,
}

impl RuntimeContext {
    pub fn new(
        compiled: Arc<CompiledRecord>,
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        preferences: UserPreferences,
        seed: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            context_id: Uuid::new_v4(),
            user_id: user_id.into(),
            session_id: session_id.into(),
            compiled,
            preferences,
            session: SessionData {
                context_variables: seed,
            },
            history: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn context_id(&self) -> Uuid {
        self.context_id
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn compiled(&self) -> &Arc<CompiledRecord> {
        &self.compiled
    }

    pub fn record_id(&self) -> &str {
        &self.compiled.id
    }

    pub fn base_prompt(&self) -> &str {
        &self.compiled.base_prompt
    }

    pub fn required_tools(&self) -> &BTreeSet<String> {
        &self.compiled.tools.required
    }

    pub fn optional_tools(&self) -> &BTreeSet<String> {
        &self.compiled.tools.optional
    }

    pub fn access_level(&self) -> AccessLevel {
        self.compiled.security.access_level
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn get_inherited_property(&self, key: &str) -> Option<&Value> {
        self.compiled.get_inherited_property(key)
    }

    pub fn set_context_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.session
            .context_variables
            .insert(key.into(), value.into());
    }

    pub fn get_context_property(&self, key: &str) -> Option<&Value> {
        self.session.context_variables.get(key)
    }

    pub fn session_data(&self) -> &SessionData {
        &self.session
    }

    /// Whether this context's access level permits `operation`. The
    /// resource is only reported; the table does not depend on it.
    pub fn validate_access(&self, operation: &str, resource: &str) -> bool {
        let allowed = AccessPolicy::allows_named(self.access_level(), operation);
        debug!(
            context_id = %self.context_id,
            operation,
            resource,
            access_level = %self.access_level(),
            allowed,
            "Access check"
        );
        allowed
    }

    /// Like [`validate_access`](Self::validate_access), but records the
    /// attempt in the history and fails with [`AccessError::Denied`].
    pub fn authorize(&mut self, operation: &str, resource: &str) -> Result<(), AccessError> {
        if self.validate_access(operation, resource) {
            self.record_execution(operation, resource, ExecutionOutcome::Success, None);
            Ok(())
        } else {
            let level = self.access_level();
            warn!(
                context_id = %self.context_id,
                user_id = %self.user_id,
                operation,
                resource,
                access_level = %level,
                "Access denied"
            );
            self.record_execution(
                operation,
                resource,
                ExecutionOutcome::Denied,
                Some(format!("not permitted at access level {level}")),
            );
            Err(AccessError::Denied {
                operation: operation.to_string(),
                resource: resource.to_string(),
                access_level: level.to_string(),
            })
        }
    }

    pub fn record_execution(
        &mut self,
        operation: &str,
        resource: &str,
        outcome: ExecutionOutcome,
        details: Option<String>,
    ) {
        self.history.push(ExecutionEntry {
            timestamp: Utc::now(),
            operation: operation.to_string(),
            resource: resource.to_string(),
            outcome,
            details,
        });
    }

    pub fn history(&self) -> &[ExecutionEntry] {
        &self.history
    }
}
