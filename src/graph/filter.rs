//! Subgraph restriction by vertex bitmap.

use petgraph::graph::{EdgeIndex, NodeIndex};

use super::engine::CallGraph;
use super::index::{Bitmap, BitmapIndexer};
use super::paths::SearchGraph;
use super::types::Direction;

/// A set of vertices a search is allowed to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubgraphFilter {
    bitmap: Bitmap,
}

impl SubgraphFilter {
    pub fn from_bitmap(bitmap: Bitmap) -> Self {
        Self { bitmap }
    }

    /// Vertices lying on some path from `src` to `dst`:
    /// `index(src, Out) & index(dst, In)`, plus both endpoints.
    pub fn between(indexer: &BitmapIndexer<'_>, src: NodeIndex, dst: NodeIndex) -> Self {
        let mut bitmap = indexer.index(src, Direction::Out).clone();
        bitmap.intersect_with(indexer.index(dst, Direction::In));
        bitmap.insert(src.index());
        bitmap.insert(dst.index());
        Self { bitmap }
    }

    pub fn contains(&self, v: NodeIndex) -> bool {
        self.bitmap.contains(v.index())
    }

    pub fn len(&self) -> usize {
        self.bitmap.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vertices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.bitmap.ones().map(NodeIndex::new)
    }

    /// Restrict `graph` to this filter. Filters apply to a base graph only.
    pub fn view<'a>(&'a self, graph: &'a CallGraph) -> FilteredGraph<'a> {
        FilteredGraph {
            graph,
            filter: self,
        }
    }
}

/// A graph view that hides vertices outside a filter, and every edge
/// touching them. Descriptors are those of the base graph.
#[derive(Clone, Copy)]
pub struct FilteredGraph<'a> {
    graph: &'a CallGraph,
    filter: &'a SubgraphFilter,
}

impl SearchGraph for FilteredGraph<'_> {
    fn vertex_bound(&self) -> usize {
        self.graph.vertex_count()
    }

    fn contains(&self, v: NodeIndex) -> bool {
        self.filter.contains(v)
    }

    fn out_edges(&self, v: NodeIndex) -> Vec<(EdgeIndex, NodeIndex)> {
        if !self.filter.contains(v) {
            return Vec::new();
        }
        self.graph
            .out_edges(v)
            .filter(|&(_, target)| self.filter.contains(target))
            .collect()
    }
}
