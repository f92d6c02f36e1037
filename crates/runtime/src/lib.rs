//! # Persona Runtime
//!
//! The context instantiator. [`ContextLoader`] validates, resolves and merges
//! a record once, caches the compiled result, and binds it to user sessions
//! as [`RuntimeContext`]s whose capabilities follow the [`AccessPolicy`].

pub mod access;
pub mod context;
pub mod loader;

pub use access::{AccessPolicy, Operation};
pub use context::{ExecutionEntry, ExecutionOutcome, RuntimeContext, SessionData};
pub use loader::{ContextLoader, LoadError};
