//! In-memory adapters, useful for tests and embedding.

use async_trait::async_trait;
use persona_core::error::StoreError;
use persona_core::record::RecordDocument;
use persona_core::store::{PreferenceSource, RecordStore, UserPreferences};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A record store backed by a map of id → document.
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<String, RecordDocument>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Build a store from documents. Two documents with the same id are an error.
    pub fn from_documents(
        docs: impl IntoIterator<Item = RecordDocument>,
    ) -> Result<Self, StoreError> {
        let mut records = HashMap::new();
        for doc in docs {
            let id = document_id(&doc)?;
            if records.contains_key(&id) {
                return Err(StoreError::DuplicateId(id));
            }
            records.insert(id, doc);
        }
        Ok(Self {
            records: Arc::new(RwLock::new(records)),
        })
    }

    /// Add or replace a document, returning its id.
    pub async fn insert(&self, doc: RecordDocument) -> Result<String, StoreError> {
        let id = document_id(&doc)?;
        self.records.write().await.insert(id.clone(), doc);
        Ok(id)
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.records.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

fn document_id(doc: &RecordDocument) -> Result<String, StoreError> {
    doc.id()
        .map(str::to_owned)
        .ok_or_else(|| StoreError::InvalidDocument {
            source_name: "<memory>".into(),
            reason: "record has neither metadata.id nor metadata.name".into(),
        })
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<RecordDocument>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.records.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Preferences and session seeds held in memory.
#[derive(Default)]
pub struct InMemoryPreferences {
    users: RwLock<HashMap<String, UserPreferences>>,
    seeds: RwLock<HashMap<String, BTreeMap<String, Value>>>,
}

impl InMemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_user(&self, user_id: impl Into<String>, prefs: UserPreferences) {
        self.users.write().await.insert(user_id.into(), prefs);
    }

    /// Seed variables handed to every new session of `user_id`.
    pub async fn set_session_seed(
        &self,
        user_id: impl Into<String>,
        seed: BTreeMap<String, Value>,
    ) {
        self.seeds.write().await.insert(user_id.into(), seed);
    }
}

#[async_trait]
impl PreferenceSource for InMemoryPreferences {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn user_preferences(&self, user_id: &str) -> Result<UserPreferences, StoreError> {
        Ok(self
            .users
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn session_seed(
        &self,
        user_id: &str,
        _session_id: &str,
    ) -> Result<BTreeMap<String, Value>, StoreError> {
        Ok(self
            .seeds
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str) -> RecordDocument {
        RecordDocument::new(json!({
            "metadata": { "id": id, "name": id, "version": "1", "recordType": "root", "layer": 1 },
            "config": { "basePrompt": "p" }
        }))
    }

    #[tokio::test]
    async fn insert_and_fetch() {
        let store = InMemoryRecordStore::new();
        let id = store.insert(doc("root")).await.unwrap();
        assert_eq!(id, "root");
        assert!(store.get_by_id("root").await.unwrap().is_some());
        assert!(store.get_by_id("other").await.unwrap().is_none());
        assert_eq!(store.len().await, 1);
        assert!(store.remove("root").await);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn list_ids_is_sorted() {
        let store = InMemoryRecordStore::from_documents([doc("b"), doc("a"), doc("c")]).unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["a", "b", "c"]);
    }

    #[test]
    fn duplicate_ids_rejected() {
        let result = InMemoryRecordStore::from_documents([doc("a"), doc("a")]);
        assert!(matches!(result, Err(StoreError::DuplicateId(id)) if id == "a"));
    }

    #[tokio::test]
    async fn anonymous_document_rejected() {
        let store = InMemoryRecordStore::new();
        let err = store
            .insert(RecordDocument::new(json!({ "metadata": {} })))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidDocument { .. }));
    }

    #[tokio::test]
    async fn unknown_users_get_defaults() {
        let prefs = InMemoryPreferences::new();
        prefs
            .set_user(
                "alice",
                UserPreferences {
                    locale: Some("fr-FR".into()),
                    ..Default::default()
                },
            )
            .await;
        prefs
            .set_session_seed("alice", BTreeMap::from([("greeting".into(), json!("salut"))]))
            .await;

        let alice = prefs.user_preferences("alice").await.unwrap();
        assert_eq!(alice.locale.as_deref(), Some("fr-FR"));
        assert_eq!(
            prefs.session_seed("alice", "s1").await.unwrap().get("greeting"),
            Some(&json!("salut"))
        );

        let bob = prefs.user_preferences("bob").await.unwrap();
        assert_eq!(bob, UserPreferences::default());
        assert!(prefs.session_seed("bob", "s1").await.unwrap().is_empty());
    }
}
