//! The context loader: validate, resolve, merge, cache, instantiate.
//!
//! Compiled records are cached by id and shared behind an `Arc`. Concurrent
//! requests for the same uncached id join one in-flight compilation. That
//! compilation runs on its own task, so it completes and fills the cache even
//! if every caller waiting on it is cancelled.

use crate::context::RuntimeContext;
use chrono::Utc;
use dashmap::DashMap;
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use persona_config::EngineConfig;
use persona_core::{
    CompiledRecord, ConfigRecord, ContextEvent, EventBus, PreferenceSource, RecordError,
    RecordStore, StoreError,
};
use persona_resolver::{
    DEFAULT_MAX_CHAIN_DEPTH, InheritanceResolver, MergeEngine, MergeError, ResolutionError,
};
use persona_validator::{RecordValidator, ValidationReport};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything that can stop a record from becoming a runtime context.
///
/// `Clone` because one failed compilation is reported to every waiter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Record '{record_id}' failed validation: {}", .report.summary())]
    Invalid {
        record_id: String,
        report: Box<ValidationReport>,
    },

    #[error("Cannot resolve inheritance for '{record_id}': {source}")]
    Resolution {
        record_id: String,
        #[source]
        source: ResolutionError,
    },

    #[error(transparent)]
    Merge(#[from] MergeError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Parse(#[from] RecordError),

    #[error("Compilation of '{record_id}' was aborted: {reason}")]
    Aborted { record_id: String, reason: String },
}

type CompileResult = Result<Arc<CompiledRecord>, LoadError>;
type SharedCompile = Shared<BoxFuture<'static, CompileResult>>;
type InFlight = Arc<Mutex<HashMap<String, SharedCompile>>>;

/// Builds [`RuntimeContext`]s from record ids.
///
/// One instance is meant to live for the whole process and be shared by
/// reference; it holds no global state.
pub struct ContextLoader {
    store: Arc<dyn RecordStore>,
    preferences: Arc<dyn PreferenceSource>,
    validator: RecordValidator,
    merger: MergeEngine,
    max_chain_depth: usize,
    cache_enabled: bool,
    cache: Arc<DashMap<String, Arc<CompiledRecord>>>,
    in_flight: InFlight,
    events: Arc<EventBus>,
}

impl ContextLoader {
    pub fn new(store: Arc<dyn RecordStore>, preferences: Arc<dyn PreferenceSource>) -> Self {
        Self {
            store,
            preferences,
            validator: RecordValidator::new(),
            merger: MergeEngine::new(),
            max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH,
            cache_enabled: true,
            cache: Arc::new(DashMap::new()),
            in_flight: Arc::new(Mutex::new(HashMap::new())),
            events: Arc::new(EventBus::default()),
        }
    }

    /// A loader honouring `[resolver]` and `[cache]` settings.
    pub fn from_config(
        config: &EngineConfig,
        store: Arc<dyn RecordStore>,
        preferences: Arc<dyn PreferenceSource>,
    ) -> Self {
        let mut loader = Self::new(store, preferences);
        loader.max_chain_depth = config.resolver.max_chain_depth;
        loader.cache_enabled = config.cache.enabled;
        loader
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Instantiate `record_id` for `user_id` in a fresh session.
    pub async fn instantiate(
        &self,
        record_id: &str,
        user_id: &str,
    ) -> Result<RuntimeContext, LoadError> {
        let session_id = Uuid::new_v4().to_string();
        self.instantiate_in_session(record_id, user_id, &session_id)
            .await
    }

    /// Instantiate `record_id` for `user_id` in a caller-chosen session.
    pub async fn instantiate_in_session(
        &self,
        record_id: &str,
        user_id: &str,
        session_id: &str,
    ) -> Result<RuntimeContext, LoadError> {
        let compiled = self.compile(record_id).await?;
        let preferences = self.preferences.user_preferences(user_id).await?;
        let seed = self.preferences.session_seed(user_id, session_id).await?;

        let context = RuntimeContext::new(compiled, user_id, session_id, preferences, seed);
        info!(
            record_id,
            user_id,
            session_id,
            context_id = %context.context_id(),
            "Runtime context instantiated"
        );
        self.events.publish(ContextEvent::ContextInstantiated {
            record_id: record_id.to_string(),
            user_id: user_id.to_string(),
            session_id: session_id.to_string(),
            timestamp: Utc::now(),
        });
        Ok(context)
    }

    /// The compiled form of `record_id`, from cache or freshly built.
    pub async fn compile(&self, record_id: &str) -> CompileResult {
        if let Some(hit) = self.cache_hit(record_id) {
            return Ok(hit);
        }

        let shared = {
            let mut in_flight = lock(&self.in_flight);
            // The task may have finished between the first check and the lock.
            if let Some(hit) = self.cache_hit(record_id) {
                return Ok(hit);
            }
            match in_flight.get(record_id) {
                Some(pending) => {
                    debug!(record_id, "Joining in-flight compilation");
                    pending.clone()
                }
                None => {
                    let pending = self.spawn_compilation(record_id);
                    in_flight.insert(record_id.to_string(), pending.clone());
                    pending
                }
            }
        };

        shared.await
    }

    /// A cached compiled record, without touching the store.
    pub fn cached(&self, record_id: &str) -> Option<Arc<CompiledRecord>> {
        self.cache.get(record_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    fn cache_hit(&self, record_id: &str) -> Option<Arc<CompiledRecord>> {
        let hit = self.cached(record_id)?;
        debug!(record_id, "Compiled record cache hit");
        self.events.publish(ContextEvent::CacheHit {
            record_id: record_id.to_string(),
            timestamp: Utc::now(),
        });
        Some(hit)
    }

    fn spawn_compilation(&self, record_id: &str) -> SharedCompile {
        let pipeline = Pipeline {
            store: Arc::clone(&self.store),
            validator: self.validator,
            merger: self.merger,
            max_chain_depth: self.max_chain_depth,
        };
        let cache = self.cache_enabled.then(|| Arc::clone(&self.cache));
        let events = Arc::clone(&self.events);
        let in_flight = Arc::clone(&self.in_flight);
        let id = record_id.to_string();

        let task = tokio::spawn(async move {
            // Dropped last: the cache is written before the entry disappears.
            let _guard = InFlightGuard {
                record_id: id.clone(),
                in_flight,
            };
            let result = pipeline.run(&id).await;
            match &result {
                Ok(compiled) => {
                    if let Some(cache) = &cache {
                        cache.insert(id.clone(), Arc::clone(compiled));
                    }
                    info!(
                        record_id = %id,
                        chain = ?compiled.lineage,
                        fingerprint = %compiled.fingerprint,
                        "Record compiled"
                    );
                    events.publish(ContextEvent::RecordCompiled {
                        record_id: id.clone(),
                        chain_len: compiled.lineage.len(),
                        fingerprint: compiled.fingerprint.clone(),
                        timestamp: Utc::now(),
                    });
                }
                Err(e) => {
                    warn!(record_id = %id, error = %e, "Record compilation failed");
                    events.publish(ContextEvent::CompilationFailed {
                        record_id: id.clone(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
            result
        });

        let record_id = record_id.to_string();
        async move {
            task.await.unwrap_or_else(|e| {
                Err(LoadError::Aborted {
                    record_id,
                    reason: e.to_string(),
                })
            })
        }
        .boxed()
        .shared()
    }
}

/// The owned pieces a compilation task needs.
struct Pipeline {
    store: Arc<dyn RecordStore>,
    validator: RecordValidator,
    merger: MergeEngine,
    max_chain_depth: usize,
}

impl Pipeline {
    async fn run(&self, record_id: &str) -> CompileResult {
        let doc = self
            .store
            .get_by_id(record_id)
            .await?
            .ok_or_else(|| LoadError::NotFound(record_id.to_string()))?;

        let report = self.validator.validate(&doc);
        if !report.is_valid {
            return Err(LoadError::Invalid {
                record_id: record_id.to_string(),
                report: Box::new(report),
            });
        }
        for warning in &report.warnings {
            warn!(record_id, %warning, "Validation warning");
        }

        let leaf = ConfigRecord::from_document(&doc)?;
        let chain = InheritanceResolver::new(self.store.as_ref(), &self.validator)
            .with_max_depth(self.max_chain_depth)
            .resolve(leaf)
            .await
            .map_err(|source| LoadError::Resolution {
                record_id: record_id.to_string(),
                source,
            })?;

        let compiled = self.merger.merge(&chain)?;
        Ok(Arc::new(compiled))
    }
}

/// Removes a finished (or panicked) compilation from the in-flight map.
struct InFlightGuard {
    record_id: String,
    in_flight: InFlight,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.in_flight).remove(&self.record_id);
    }
}

fn lock(
    in_flight: &Mutex<HashMap<String, SharedCompile>>,
) -> std::sync::MutexGuard<'_, HashMap<String, SharedCompile>> {
    in_flight.lock().unwrap_or_else(PoisonError::into_inner)
}
