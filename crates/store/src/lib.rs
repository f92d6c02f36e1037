//! Record store and preference source implementations for Persona.

pub mod file_backend;
pub mod in_memory;

pub use file_backend::{FilePreferences, FileRecordStore, load_document, record_files};
pub use in_memory::{InMemoryPreferences, InMemoryRecordStore};
