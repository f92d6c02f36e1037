//! End-to-end tests for the Persona engine.
//!
//! These tests exercise the full pipeline from record files on disk to
//! runtime contexts, and drive the `persona` binary against the same files.

use std::path::Path;
use std::process::Command;
use std::sync::Arc;

use persona_config::EngineConfig;
use persona_core::event::{ContextEvent, EventBus};
use persona_core::record::AccessLevel;
use persona_core::store::RecordStore;
use persona_runtime::{ContextLoader, LoadError};
use persona_store::{FilePreferences, FileRecordStore};
use persona_validator::IssueKind;

// ── Fixtures ─────────────────────────────────────────────────────────────

const ROOT: &str = r#"
[metadata]
id = "assistant"
name = "Assistant"
version = "1.0.0"
recordType = "root"
layer = 1

[config]
basePrompt = "You are a careful assistant."

[config.tools]
required = ["search"]
optional = ["calculator"]

[config.security]
accessLevel = "root"
dataRetention = "persistent"
logging = "full"

[config.attributes]
communication_style = "concise"
timezone = "UTC"
"#;

const TRAVEL: &str = r#"
[metadata]
id = "travel"
name = "Travel planner"
version = "2.1.0"
recordType = "specialized"
layer = 2
parentId = "assistant"

[config]
basePrompt = "You plan trips."
inheritanceList = ["communication_style"]

[config.tools]
required = ["flights"]
optional = ["calculator", "weather"]

[config.security]
logging = "standard"

[config.behavior]
formality = "casual"
"#;

const DRAFT: &str = r#"{
  "metadata": {
    "id": "draft", "name": "Draft", "version": "0.1.0",
    "recordType": "transient", "layer": 3, "parentId": "travel"
  },
  "config": {
    "basePrompt": "Draft a quick itinerary.",
    "inheritanceList": ["communication_style", "timezone"],
    "security": { "accessLevel": "transient", "dataRetention": "ephemeral" }
  }
}"#;

const MISLAYERED: &str = r#"
[metadata]
id = "mislayered"
name = "Mislayered"
version = "1.0.0"
recordType = "specialized"
layer = 3
parentId = "assistant"

[config]
basePrompt = "Wrong layer."

[config.security]
logging = "standard"
"#;

const ALICE: &str = r#"
communication_style = "formal"
timezone = "Europe/Lisbon"

[session_seed]
home_airport = "LIS"
"#;

fn write_fixtures(root: &Path, include_invalid: bool) {
    let records = root.join("records");
    let prefs = root.join("preferences");
    std::fs::create_dir_all(&records).unwrap();
    std::fs::create_dir_all(&prefs).unwrap();
    std::fs::write(records.join("assistant.toml"), ROOT).unwrap();
    std::fs::write(records.join("travel.toml"), TRAVEL).unwrap();
    std::fs::write(records.join("draft.json"), DRAFT).unwrap();
    if include_invalid {
        std::fs::write(records.join("mislayered.toml"), MISLAYERED).unwrap();
    }
    std::fs::write(prefs.join("alice.toml"), ALICE).unwrap();
}

fn file_loader(root: &Path) -> ContextLoader {
    let store = FileRecordStore::open(root.join("records")).unwrap();
    let prefs = FilePreferences::new(root.join("preferences"));
    ContextLoader::new(Arc::new(store), Arc::new(prefs))
}

// ── E2E: Library pipeline ────────────────────────────────────────────────

#[tokio::test]
async fn e2e_file_records_compile_through_three_layers() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), false);
    let loader = file_loader(tmp.path());

    let ctx = loader.instantiate("draft", "alice").await.unwrap();

    assert_eq!(ctx.compiled().lineage, vec!["assistant", "travel", "draft"]);
    assert_eq!(ctx.base_prompt(), "Draft a quick itinerary.");
    assert_eq!(ctx.access_level(), AccessLevel::Transient);

    let required: Vec<&str> = ctx.required_tools().iter().map(String::as_str).collect();
    let optional: Vec<&str> = ctx.optional_tools().iter().map(String::as_str).collect();
    assert_eq!(required, vec!["flights", "search"]);
    assert_eq!(optional, vec!["calculator", "weather"]);

    // travel re-whitelists communication_style but not timezone.
    assert_eq!(
        ctx.get_inherited_property("communication_style"),
        Some(&serde_json::json!("concise"))
    );
    assert!(ctx.get_inherited_property("timezone").is_none());

    assert_eq!(ctx.preferences().communication_style.as_deref(), Some("formal"));
    assert_eq!(
        ctx.get_context_property("home_airport"),
        Some(&serde_json::json!("LIS"))
    );
    assert!(!ctx.validate_access("admin", "records"));
    assert!(ctx.validate_access("read", "records"));
}

#[tokio::test]
async fn e2e_specialized_inherits_root_access() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), false);
    let loader = file_loader(tmp.path());

    let compiled = loader.compile("travel").await.unwrap();
    assert_eq!(compiled.security.access_level, AccessLevel::Root);
    assert_eq!(
        compiled.get_inherited_property("communication_style"),
        Some(&serde_json::json!("concise"))
    );
    assert_eq!(compiled.behavior.get("formality"), Some(&serde_json::json!("casual")));
}

#[tokio::test]
async fn e2e_invalid_record_reports_every_error() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), true);
    let loader = file_loader(tmp.path());

    match loader.instantiate("mislayered", "alice").await {
        Err(LoadError::Invalid { report, .. }) => {
            assert_eq!(report.errors.len(), 1);
            assert_eq!(report.errors[0].kind, IssueKind::TypeLayer);
        }
        other => panic!("expected a validation failure, got {other:?}"),
    }
    assert!(loader.cached("mislayered").is_none());
}

#[tokio::test]
async fn e2e_sessions_share_compiled_record() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), false);
    let events = Arc::new(EventBus::default());
    let mut rx = events.subscribe();
    let loader = file_loader(tmp.path()).with_events(Arc::clone(&events));

    let (a, b) = tokio::join!(
        loader.instantiate("travel", "alice"),
        loader.instantiate("travel", "bob")
    );
    let (mut a, b) = (a.unwrap(), b.unwrap());
    assert!(Arc::ptr_eq(a.compiled(), b.compiled()));

    a.set_context_property("destination", "Porto");
    assert!(b.get_context_property("destination").is_none());

    let mut compiled = 0;
    while let Ok(event) = rx.try_recv() {
        if matches!(event.as_ref(), ContextEvent::RecordCompiled { .. }) {
            compiled += 1;
        }
    }
    assert_eq!(compiled, 1);
}

#[tokio::test]
async fn e2e_store_lists_loaded_records() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), true);
    let store = FileRecordStore::open(tmp.path().join("records")).unwrap();
    assert_eq!(
        store.list_ids().await.unwrap(),
        vec!["assistant", "draft", "mislayered", "travel"]
    );
}

#[test]
fn e2e_config_points_loader_at_directories() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            "[store]\nrecords_dir = {:?}\npreferences_dir = {:?}\n",
            tmp.path().join("records").display().to_string(),
            tmp.path().join("preferences").display().to_string()
        ),
    )
    .unwrap();
    let config = EngineConfig::load_from(&path).unwrap();
    assert_eq!(config.store.records_path(), tmp.path().join("records"));
    assert_eq!(config.store.preferences_path(), tmp.path().join("preferences"));
}

// ── E2E: CLI binary ──────────────────────────────────────────────────────

fn persona(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_persona"));
    cmd.env("HOME", home)
        .env("PERSONA_RECORDS_DIR", home.join("records"))
        .env("PERSONA_PREFERENCES_DIR", home.join("preferences"))
        .env_remove("RUST_LOG")
        .env_remove("PERSONA_LOG_LEVEL");
    cmd
}

#[test]
fn e2e_cli_validate_flags_bad_records() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), true);

    let output = persona(tmp.path()).arg("validate").output().unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!output.status.success());
    assert!(stdout.contains("mislayered"));
    assert!(stdout.contains("1 of 4"));

    let output = persona(tmp.path())
        .arg("validate")
        .arg(tmp.path().join("records").join("travel.toml"))
        .output()
        .unwrap();
    assert!(output.status.success());
}

#[test]
fn e2e_cli_compile_json() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), false);

    let output = persona(tmp.path())
        .args(["compile", "draft", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let compiled: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(compiled["id"], "draft");
    assert_eq!(compiled["security"]["access_level"], "transient");
    assert_eq!(compiled["lineage"], serde_json::json!(["assistant", "travel", "draft"]));
    assert_eq!(compiled["fingerprint"].as_str().unwrap().len(), 64);
}

#[test]
fn e2e_cli_access_exit_codes() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), false);

    let denied = persona(tmp.path())
        .args(["access", "draft", "admin"])
        .output()
        .unwrap();
    assert!(!denied.status.success());

    let allowed = persona(tmp.path())
        .args(["access", "travel", "admin", "--resource", "records"])
        .output()
        .unwrap();
    assert!(allowed.status.success());
}

#[test]
fn e2e_cli_chain_prints_root_first() {
    let tmp = tempfile::tempdir().unwrap();
    write_fixtures(tmp.path(), false);

    let output = persona(tmp.path()).args(["chain", "draft"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("assistant"));
    assert!(lines[2].trim_start().starts_with("draft"));
}
