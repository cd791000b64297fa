//! Program symbols produced by linking.
//!
//! Provides the symbol/file entity types and the arena that owns them.

pub mod store;
pub mod types;

pub use store::SymbolStore;
pub use types::{ArgSlot, FileId, FileSymbol, ProgramSymbol, SymbolId};
