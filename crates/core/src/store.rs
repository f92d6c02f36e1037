//! Collaborator traits: where records and user preferences come from.
//!
//! The engine never owns persistence. It asks a [`RecordStore`] for authored
//! documents by id and a [`PreferenceSource`] for per-user and per-session
//! seed data. Implementations live in `persona-store`; tests use their own.

use crate::error::StoreError;
use crate::record::RecordDocument;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Lookup of authored records by id.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// The store name (e.g., "in_memory", "file").
    fn name(&self) -> &str;

    /// Fetch a record document. `Ok(None)` means the id is unknown.
    async fn get_by_id(&self, id: &str) -> Result<Option<RecordDocument>, StoreError>;

    /// All record ids the store knows, sorted.
    async fn list_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Privacy switches a user has chosen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyFlags {
    #[serde(default)]
    pub share_history: bool,
    #[serde(default = "default_true")]
    pub allow_personalization: bool,
}

fn default_true() -> bool {
    true
}

impl Default for PrivacyFlags {
    fn default() -> Self {
        Self {
            share_history: false,
            allow_personalization: true,
        }
    }
}

/// Per-user preference data consumed when building a runtime context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserPreferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub communication_style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    #[serde(default)]
    pub privacy: PrivacyFlags,
    /// Anything else the preference store tracks.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, Value>,
}

/// Source of user preferences and session seed variables.
#[async_trait]
pub trait PreferenceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Preferences for a user. Unknown users get defaults, not an error.
    async fn user_preferences(&self, user_id: &str) -> Result<UserPreferences, StoreError>;

    /// Initial context variables for a new session.
    async fn session_seed(
        &self,
        _user_id: &str,
        _session_id: &str,
    ) -> Result<BTreeMap<String, Value>, StoreError> {
        Ok(BTreeMap::new())
    }
}

/// A preference source that knows nobody: every user gets defaults.
pub struct DefaultPreferences;

#[async_trait]
impl PreferenceSource for DefaultPreferences {
    fn name(&self) -> &str {
        "default"
    }

    async fn user_preferences(&self, _user_id: &str) -> Result<UserPreferences, StoreError> {
        Ok(UserPreferences::default())
    }
}
