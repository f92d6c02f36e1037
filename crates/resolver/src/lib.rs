//! # Persona Resolver
//!
//! Turns a validated leaf record into a [`CompiledRecord`](persona_core::CompiledRecord):
//! [`InheritanceResolver`] walks the ancestors through a record store, and
//! [`MergeEngine`] folds the resulting chain root to leaf.

pub mod chain;
pub mod merge;

pub use chain::{DEFAULT_MAX_CHAIN_DEPTH, InheritanceChain, InheritanceResolver, ResolutionError};
pub use merge::{MergeEngine, MergeError};
