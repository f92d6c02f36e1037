//! File-based adapters: a directory of record documents and a directory of
//! per-user preference files.
//!
//! Records are read once when the store is opened. Preference files are read
//! on every lookup so edits apply to the next session.

use async_trait::async_trait;
use persona_core::error::StoreError;
use persona_core::record::RecordDocument;
use persona_core::store::{PreferenceSource, RecordStore, UserPreferences};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A read-only record store loaded from `*.toml` and `*.json` files.
///
/// Files are read in name order. A file that cannot be parsed, or whose id
/// was already taken by an earlier file, is skipped with a warning.
pub struct FileRecordStore {
    dir: PathBuf,
    records: HashMap<String, RecordDocument>,
    sources: HashMap<String, PathBuf>,
    skipped: Vec<StoreError>,
}

impl FileRecordStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        let mut store = Self {
            dir,
            records: HashMap::new(),
            sources: HashMap::new(),
            skipped: Vec::new(),
        };

        for path in record_files(&store.dir)? {
            match load_document(&path) {
                Ok(doc) => store.add(path, doc),
                Err(e) => {
                    warn!(error = %e, "Skipping unreadable record file");
                    store.skipped.push(e);
                }
            }
        }

        debug!(
            dir = %store.dir.display(),
            count = store.records.len(),
            skipped = store.skipped.len(),
            "File record store loaded"
        );
        Ok(store)
    }

    fn add(&mut self, path: PathBuf, doc: RecordDocument) {
        let Some(id) = doc.id().map(str::to_owned) else {
            let e = StoreError::InvalidDocument {
                source_name: path.display().to_string(),
                reason: "record has neither metadata.id nor metadata.name".into(),
            };
            warn!(error = %e, "Skipping anonymous record");
            self.skipped.push(e);
            return;
        };

        if let Some(first) = self.sources.get(&id) {
            warn!(
                id = %id,
                kept = %first.display(),
                ignored = %path.display(),
                "Duplicate record id"
            );
            self.skipped.push(StoreError::DuplicateId(id));
            return;
        }

        self.sources.insert(id.clone(), path);
        self.records.insert(id, doc);
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The file a record was loaded from.
    pub fn source_of(&self, id: &str) -> Option<&Path> {
        self.sources.get(id).map(PathBuf::as_path)
    }

    /// Files that were not loaded, and why.
    pub fn skipped(&self) -> &[StoreError] {
        &self.skipped
    }
}

/// Record files in `dir`, sorted by file name.
pub fn record_files(dir: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        StoreError::Storage(format!("Failed to read records directory {}: {e}", dir.display()))
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_record_file(path))
        .collect();
    files.sort();
    Ok(files)
}

fn is_record_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("toml") | Some("json")
    )
}

/// Read and parse one record document, picking the format by extension.
pub fn load_document(path: &Path) -> Result<RecordDocument, StoreError> {
    let source_name = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| StoreError::InvalidDocument {
        source_name: source_name.clone(),
        reason: e.to_string(),
    })?;

    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => RecordDocument::from_json_str(&content),
        _ => RecordDocument::from_toml_str(&content),
    };
    parsed.map_err(|e| StoreError::InvalidDocument {
        source_name,
        reason: e.to_string(),
    })
}

#[async_trait]
impl RecordStore for FileRecordStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<RecordDocument>, StoreError> {
        Ok(self.records.get(id).cloned())
    }

    async fn list_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.records.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// Preferences read from `<dir>/<user_id>.toml`.
///
/// ```toml
/// communication_style = "formal"
/// locale = "de-DE"
/// timezone = "Europe/Berlin"
///
/// [privacy]
/// share_history = false
///
/// [session_seed]
/// greeting = "Guten Tag"
/// ```
pub struct FilePreferences {
    dir: PathBuf,
}

const SESSION_SEED_KEY: &str = "session_seed";

impl FilePreferences {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, user_id: &str) -> Result<PathBuf, StoreError> {
        let invalid = |reason: &str| StoreError::InvalidKey {
            key: user_id.to_string(),
            reason: reason.to_string(),
        };
        if user_id.is_empty() {
            return Err(invalid("user id is empty"));
        }
        if user_id.starts_with('.') {
            return Err(invalid("user id must not start with '.'"));
        }
        if user_id.contains(['/', '\\']) || user_id.contains("..") {
            return Err(invalid("user id must not contain path components"));
        }
        Ok(self.dir.join(format!("{user_id}.toml")))
    }

    /// The whole preference file as a JSON table, or `None` if it does not exist.
    async fn read_file(&self, user_id: &str) -> Result<Option<serde_json::Map<String, Value>>, StoreError> {
        let path = self.path_for(user_id)?;
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(StoreError::Storage(format!(
                    "Failed to read preferences {}: {e}",
                    path.display()
                )));
            }
        };

        let invalid = |reason: String| StoreError::InvalidDocument {
            source_name: path.display().to_string(),
            reason,
        };
        match toml::from_str::<Value>(&content).map_err(|e| invalid(e.to_string()))? {
            Value::Object(table) => Ok(Some(table)),
            _ => Err(invalid("expected a table".into())),
        }
    }
}

#[async_trait]
impl PreferenceSource for FilePreferences {
    fn name(&self) -> &str {
        "file"
    }

    async fn user_preferences(&self, user_id: &str) -> Result<UserPreferences, StoreError> {
        let Some(mut table) = self.read_file(user_id).await? else {
            debug!(user_id, "No preference file, using defaults");
            return Ok(UserPreferences::default());
        };
        table.remove(SESSION_SEED_KEY);
        serde_json::from_value(Value::Object(table)).map_err(|e| StoreError::InvalidDocument {
            source_name: format!("{user_id}.toml"),
            reason: e.to_string(),
        })
    }

    async fn session_seed(
        &self,
        user_id: &str,
        _session_id: &str,
    ) -> Result<BTreeMap<String, Value>, StoreError> {
        let Some(mut table) = self.read_file(user_id).await? else {
            return Ok(BTreeMap::new());
        };
        match table.remove(SESSION_SEED_KEY) {
            None => Ok(BTreeMap::new()),
            Some(Value::Object(seed)) => Ok(seed.into_iter().collect()),
            Some(_) => Err(StoreError::InvalidDocument {
                source_name: format!("{user_id}.toml"),
                reason: format!("`{SESSION_SEED_KEY}` must be a table"),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT_TOML: &str = r#"
[metadata]
id = "root"
name = "Root"
version = "1.0"
recordType = "root"
layer = 1

[config]
basePrompt = "Be helpful."
"#;

    const TRAVEL_JSON: &str = r#"{
  "metadata": { "id": "travel", "name": "Travel", "version": "1.0",
                "recordType": "specialized", "layer": 2, "parentId": "root" },
  "config": { "basePrompt": "Plan trips." }
}"#;

    #[tokio::test]
    async fn loads_toml_and_json_records() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("root.toml"), ROOT_TOML).unwrap();
        std::fs::write(tmp.path().join("travel.json"), TRAVEL_JSON).unwrap();
        std::fs::write(tmp.path().join("README.md"), "not a record").unwrap();

        let store = FileRecordStore::open(tmp.path()).unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["root", "travel"]);
        let travel = store.get_by_id("travel").await.unwrap().unwrap();
        assert_eq!(travel.parent_id(), Some("root"));
        assert!(store.source_of("root").unwrap().ends_with("root.toml"));
        assert!(store.skipped().is_empty());
    }

    #[tokio::test]
    async fn corrupted_files_are_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.toml"), ROOT_TOML).unwrap();
        std::fs::write(tmp.path().join("b.toml"), "[metadata\nbroken").unwrap();
        std::fs::write(tmp.path().join("c.json"), "{ nope").unwrap();

        let store = FileRecordStore::open(tmp.path()).unwrap();
        assert_eq!(store.list_ids().await.unwrap(), vec!["root"]);
        assert_eq!(store.skipped().len(), 2);
    }

    #[tokio::test]
    async fn first_file_wins_on_duplicate_ids() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.toml"), ROOT_TOML).unwrap();
        std::fs::write(
            tmp.path().join("b.toml"),
            ROOT_TOML.replace("Be helpful.", "Second copy."),
        )
        .unwrap();

        let store = FileRecordStore::open(tmp.path()).unwrap();
        let root = store.get_by_id("root").await.unwrap().unwrap();
        assert_eq!(root.as_value()["config"]["basePrompt"], "Be helpful.");
        assert_eq!(store.skipped(), &[StoreError::DuplicateId("root".into())]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        assert!(matches!(
            FileRecordStore::open("/nonexistent/persona/records"),
            Err(StoreError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn preferences_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(
            tmp.path().join("alice.toml"),
            r#"
communication_style = "formal"
locale = "de-DE"

[privacy]
share_history = true

[session_seed]
greeting = "Guten Tag"
"#,
        )
        .unwrap();

        let prefs = FilePreferences::new(tmp.path());
        let alice = prefs.user_preferences("alice").await.unwrap();
        assert_eq!(alice.communication_style.as_deref(), Some("formal"));
        assert!(alice.privacy.share_history);
        assert!(alice.privacy.allow_personalization);

        let seed = prefs.session_seed("alice", "s1").await.unwrap();
        assert_eq!(seed.get("greeting"), Some(&Value::from("Guten Tag")));
    }

    #[tokio::test]
    async fn missing_preference_file_gives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let prefs = FilePreferences::new(tmp.path());
        assert_eq!(
            prefs.user_preferences("bob").await.unwrap(),
            UserPreferences::default()
        );
        assert!(prefs.session_seed("bob", "s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn path_like_user_ids_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let prefs = FilePreferences::new(tmp.path());
        for user_id in ["../etc/passwd", "a/b", "a\\b", ".hidden", ""] {
            assert!(
                matches!(
                    prefs.user_preferences(user_id).await,
                    Err(StoreError::InvalidKey { .. })
                ),
                "{user_id:?} was accepted"
            );
        }
    }
}
