//! # Persona Core
//!
//! Domain types, collaborator traits, and error definitions for the Persona
//! layered personalization-configuration engine. Every other crate depends
//! inward on this one.
//!
//! ## Layers
//!
//! | Type          | Layer | Parent allowed       |
//! |---------------|-------|----------------------|
//! | `root`        | 1     | none                 |
//! | `specialized` | 2     | root                 |
//! | `composite`   | 2     | root, specialized    |
//! | `transient`   | 3     | any                  |

pub mod compiled;
pub mod error;
pub mod event;
pub mod record;
pub mod store;

// Re-export key types at crate root for ergonomics
pub use compiled::{CompiledRecord, CompiledTools, EffectiveSecurity};
pub use error::{AccessError, RecordError, StoreError};
pub use event::{ContextEvent, EventBus};
pub use record::{
    AccessLevel, ConfigRecord, DataRetention, InheritableAttribute, Lineage, LoggingLevel,
    RecordDocument, RecordKind, RecordMetadata, RecordType, SecurityOverrides, ToolSet,
};
pub use store::{DefaultPreferences, PreferenceSource, PrivacyFlags, RecordStore, UserPreferences};
