pub mod access;
pub mod config_cmd;
pub mod records;
pub mod validate;

use persona_config::EngineConfig;
use persona_core::{RecordStore, StoreError};
use persona_runtime::ContextLoader;
use persona_store::{FilePreferences, FileRecordStore};
use std::sync::Arc;
use tracing::debug;

/// Open the configured record store. Also returns the files a file store
/// had to skip.
///
/// The `memory` backend starts empty and has no loading path here, so the
/// CLI refuses it.
pub fn open_record_store(
    config: &EngineConfig,
) -> Result<(Arc<dyn RecordStore>, Vec<StoreError>), StoreError> {
    debug!(
        backend = %config.store.backend,
        records = %config.store.records_path().display(),
        "Opening record store"
    );
    if config.store.backend == "memory" {
        return Err(StoreError::Storage(MEMORY_BACKEND_UNSUPPORTED.to_string()));
    }
    let store = FileRecordStore::open(config.store.records_path())?;
    let skipped = store.skipped().to_vec();
    Ok((Arc::new(store), skipped))
}

pub const MEMORY_BACKEND_UNSUPPORTED: &str =
    "store.backend = \"memory\" is only usable when embedding the engine; the CLI reads records from disk and needs store.backend = \"file\"";

/// A loader wired to the configured store and preference source.
pub fn build_loader(config: &EngineConfig) -> Result<ContextLoader, StoreError> {
    let (store, _) = open_record_store(config)?;
    Ok(ContextLoader::from_config(
        config,
        store,
        Arc::new(FilePreferences::new(config.store.preferences_path())),
    ))
}
