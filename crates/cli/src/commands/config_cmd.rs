//! `persona config`: Configuration management commands.

use persona_config::{ConfigError, EngineConfig};

pub async fn validate(
    config: Result<EngineConfig, ConfigError>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match config {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            let records = config.store.records_path();
            if config.store.backend == "file" && !records.is_dir() {
                warnings.push(format!(
                    "Records directory {} does not exist",
                    records.display()
                ));
            }
            if config.store.backend == "memory" {
                warnings.push(super::MEMORY_BACKEND_UNSUPPORTED.to_string());
            }
            if !config.cache.enabled {
                warnings.push("Compiled-record cache is disabled".to_string());
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Backend:      {}", config.store.backend);
            println!("   Records:      {}", records.display());
            println!("   Preferences:  {}", config.store.preferences_path().display());
            println!("   Max depth:    {}", config.resolver.max_chain_depth);
            println!("   Log level:    {}", config.logging.level);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config: &EngineConfig) -> Result<(), Box<dyn std::error::Error>> {
    let toml_str = toml::to_string_pretty(config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = EngineConfig::config_dir().join("config.toml");
    println!("{}", config_path.display());
    Ok(())
}
