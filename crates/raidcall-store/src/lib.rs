//! # Raidcall Store
//!
//! File-backed persistence: one JSON record per event, one JSON or TOML
//! record per template. Both collections are loaded eagerly at startup and
//! guarded by a single `RwLock` each.

pub mod builtin;
pub mod events;
pub mod fsio;
pub mod templates;

pub use events::EventStore;
pub use templates::{TemplateCatalog, TemplateFormat};
