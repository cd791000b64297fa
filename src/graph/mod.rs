//! Call graph module.
//!
//! Provides the compacted graph, reachability bitmaps, subgraph filters,
//! path enumeration, snapshots, and the builder that links fragment files.

pub mod builder;
pub mod engine;
pub mod filter;
pub mod index;
pub mod paths;
pub mod persistence;
pub mod types;

pub use builder::{build_graph, link_files, load_graph};
pub use engine::CallGraph;
pub use filter::{FilteredGraph, SubgraphFilter};
pub use index::{Bitmap, BitmapIndexer};
pub use paths::{
    find_paths, EdgeUnique, Path, PathFinder, SearchGraph, Uniqueness, UniquenessPolicy,
    VertexUnique, Void,
};
pub use types::{Direction, GraphStats, VertexData};
