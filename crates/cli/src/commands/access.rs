//! `persona access`: check an operation against a compiled record.

use super::build_loader;
use persona_config::EngineConfig;
use persona_runtime::{AccessPolicy, Operation};

pub async fn run(
    config: &EngineConfig,
    id: &str,
    operation: &str,
    resource: &str,
    user: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let loader = build_loader(config)?;
    let context = loader.instantiate(id, user).await?;
    let level = context.access_level();

    let allowed: Vec<&str> = AccessPolicy::allowed_operations(level)
        .into_iter()
        .map(Operation::as_str)
        .collect();
    println!("Record:   {id}");
    println!("Access:   {level} ({})", allowed.join(", "));

    if Operation::parse(operation).is_none() {
        println!("⚠️  Unknown operation '{operation}'");
    }

    if context.validate_access(operation, resource) {
        println!("✅ '{operation}' on '{resource}' is allowed");
        Ok(())
    } else {
        println!("⛔ '{operation}' on '{resource}' is denied");
        std::process::exit(1);
    }
}
