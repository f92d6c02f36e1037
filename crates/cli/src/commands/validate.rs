//! `persona validate`: check record files on their own.

use persona_config::EngineConfig;
use persona_core::{RecordDocument, RecordType};
use persona_store::{load_document, record_files};
use persona_validator::{RecordValidator, ValidationReport};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub async fn run(
    config: &EngineConfig,
    path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = path.unwrap_or_else(|| config.store.records_path());
    let files = if path.is_dir() {
        record_files(&path)?
    } else {
        vec![path]
    };

    if files.is_empty() {
        println!("No record files found.");
        return Ok(());
    }

    let total = files.len();
    let mut loaded = Vec::new();
    let mut failed = 0usize;
    for file in files {
        match load_document(&file) {
            Ok(doc) => loaded.push((file, doc)),
            Err(e) => {
                println!("❌ {e}");
                failed += 1;
            }
        }
    }

    // Parents found among the same files get the parent-type check too.
    let types: HashMap<String, RecordType> = loaded
        .iter()
        .filter_map(|(_, doc)| Some((doc.id()?.to_string(), doc.record_type()?)))
        .collect();

    let validator = RecordValidator::new();
    for (file, doc) in &loaded {
        let parent_type = parent_type(doc, &types);
        let report = validator.validate_with_parent(doc, parent_type);
        print_report(file, &report);
        if !report.is_valid {
            failed += 1;
        }
    }

    println!();
    if failed == 0 {
        println!("✅ {total} record(s) valid");
        Ok(())
    } else {
        println!("❌ {failed} of {total} record file(s) failed validation");
        std::process::exit(1);
    }
}

fn parent_type(doc: &RecordDocument, types: &HashMap<String, RecordType>) -> Option<RecordType> {
    types.get(doc.parent_id()?).copied()
}

fn print_report(file: &Path, report: &ValidationReport) {
    let id = report.record_id.as_deref().unwrap_or("<unnamed>");
    let status = if report.is_valid { "✅" } else { "❌" };
    println!("{status} {id} ({})", file.display());
    for error in &report.errors {
        println!("     error:   {error}");
    }
    for warning in &report.warnings {
        println!("     warning: {warning}");
    }
}
