//! `persona records`, `persona chain` and `persona compile`.

use super::{build_loader, open_record_store};
use persona_config::EngineConfig;
use persona_core::ConfigRecord;
use persona_resolver::InheritanceResolver;
use persona_validator::RecordValidator;

/// List every record in the store.
pub async fn list(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (store, skipped) = open_record_store(config)?;
    let ids = store.list_ids().await?;

    if ids.is_empty() {
        println!("No records found in {}.", config.store.records_path().display());
    } else {
        println!("Records ({}):\n", ids.len());
        for id in &ids {
            let Some(doc) = store.get_by_id(id).await? else {
                continue;
            };
            let record_type = doc
                .record_type()
                .map(|t| t.to_string())
                .unwrap_or_else(|| "?".into());
            match doc.parent_id() {
                Some(parent) => println!("  {id:<24} {record_type:<12} ← {parent}"),
                None => println!("  {id:<24} {record_type:<12}"),
            }
        }
    }

    if !skipped.is_empty() {
        println!("\nSkipped ({}):", skipped.len());
        for e in &skipped {
            println!("  ⚠️  {e}");
        }
    }
    Ok(())
}

/// Print the resolved chain for a record, root first.
pub async fn chain(config: &EngineConfig, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let (store, _) = open_record_store(config)?;
    let doc = store
        .get_by_id(id)
        .await?
        .ok_or_else(|| format!("Record not found: {id}"))?;

    let validator = RecordValidator::new();
    let report = validator.validate(&doc);
    if !report.is_valid {
        return Err(report.summary().into());
    }

    let leaf = ConfigRecord::from_document(&doc)?;
    let chain = InheritanceResolver::new(store.as_ref(), &validator)
        .with_max_depth(config.resolver.max_chain_depth)
        .resolve(leaf)
        .await?;

    for (depth, record) in chain.records().iter().enumerate() {
        let indent = "  ".repeat(depth);
        let inherits: Vec<&str> = record.inheritance_list().iter().map(|a| a.as_str()).collect();
        if inherits.is_empty() {
            println!("{indent}{} [{}, layer {}]", record.id, record.record_type(), record.layer());
        } else {
            println!(
                "{indent}{} [{}, layer {}] inherits: {}",
                record.id,
                record.record_type(),
                record.layer(),
                inherits.join(", ")
            );
        }
    }
    Ok(())
}

/// Compile a record and print a summary, or the whole record as JSON.
pub async fn compile(
    config: &EngineConfig,
    id: &str,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = build_loader(config)?;
    let compiled = loader.compile(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(compiled.as_ref())?);
        return Ok(());
    }

    println!("Record:       {} ({}, layer {})", compiled.id, compiled.record_type, compiled.layer);
    println!("Chain:        {}", compiled.lineage.join(" → "));
    println!(
        "Security:     access={}, retention={}, logging={}",
        compiled.security.access_level,
        compiled.security.data_retention.as_str(),
        compiled.security.logging.as_str()
    );
    println!("Required:     {}", join_or_dash(compiled.tools.required.iter()));
    println!("Optional:     {}", join_or_dash(compiled.tools.optional.iter()));
    if !compiled.inherited_properties.is_empty() {
        println!("Inherited:");
        for (key, value) in &compiled.inherited_properties {
            println!("  {key} = {value}");
        }
    }
    println!("Fingerprint:  {}", compiled.fingerprint);
    println!();
    println!("{}", compiled.base_prompt);
    Ok(())
}

fn join_or_dash<'a>(items: impl Iterator<Item = &'a String>) -> String {
    let items: Vec<&str> = items.map(String::as_str).collect();
    if items.is_empty() {
        "-".into()
    } else {
        items.join(", ")
    }
}
