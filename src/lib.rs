//! # cgt
//!
//! Call graph tools: link per-translation-unit call graph fragments into one
//! program-wide graph, then ask how one function can reach another.
//!
//! ## Key Features
//!
//! - **Linking**: fragment-local ids, global names, statics kept apart,
//!   aliases collapsed onto their canonical symbols
//! - **Reachability**: cached per-vertex bitmaps in both directions
//! - **Paths**: every edge-unique (or vertex-unique) path between two
//!   symbols, restricted to the subgraph that can actually connect them
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cgt::{build_graph, CgtConfig, QueryEngine};
//! use std::path::PathBuf;
//!
//! let config = CgtConfig::default();
//! let graph = build_graph(&[PathBuf::from("main.cg")], &config).unwrap();
//!
//! let engine = QueryEngine::new(&graph, config.query_options());
//! let paths = engine.path_lookup("main", "printf").unwrap();
//! print!("{}", engine.path_report(&paths));
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod link;
pub mod query;
pub mod symbols;

// Re-exports for convenience
pub use config::CgtConfig;
pub use error::{CgtError, Result};

pub use graph::{
    build_graph, link_files, load_graph, BitmapIndexer, CallGraph, Direction, GraphStats,
    PathFinder, SubgraphFilter, Uniqueness,
};
pub use link::{write_linked, Diagnostic, DiagnosticKind, LinkOptions, LinkedProgram, Linker};
pub use query::{Command, QueryEngine, QueryOptions, QueryOutput};
pub use symbols::{ProgramSymbol, SymbolId, SymbolStore};
