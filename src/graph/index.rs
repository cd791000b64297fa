//! Reachability bitmaps.
//!
//! For every vertex and direction the indexer can hold one bitmap of the
//! vertices reachable from it (`Out`) or reaching it (`In`). Bitmaps are
//! computed on first use and cached; `build` fills the cache eagerly.
//!
//! A vertex is in its own bitmap only when it lies on a cycle.

use fixedbitset::FixedBitSet;
use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use std::sync::OnceLock;
use tracing::{debug, info};

use super::engine::CallGraph;
use super::types::Direction;

pub type Bitmap = FixedBitSet;

/// Lazily computed reachability bitmaps over one graph.
pub struct BitmapIndexer<'g> {
    graph: &'g CallGraph,
    /// Per direction (see `Direction::slot`), one cell per vertex.
    storage: [Vec<OnceLock<Bitmap>>; 2],
}

impl<'g> BitmapIndexer<'g> {
    /// Create an indexer. No bitmap is computed yet.
    pub fn new(graph: &'g CallGraph) -> Self {
        Self {
            graph,
            storage: [empty_cells(graph), empty_cells(graph)],
        }
    }

    pub fn graph(&self) -> &'g CallGraph {
        self.graph
    }

    /// Bitmap of `v` in `dir`, computing it if needed.
    ///
    /// # Panics
    /// If `v` is not a vertex of the indexed graph.
    pub fn index(&self, v: NodeIndex, dir: Direction) -> &Bitmap {
        let graph = self.graph;
        self.storage[dir.slot()][v.index()].get_or_init(|| reach(graph, v, dir))
    }

    /// Bitmap of `v` in `dir` if it has been computed.
    pub fn cached(&self, v: NodeIndex, dir: Direction) -> Option<&Bitmap> {
        self.storage[dir.slot()].get(v.index())?.get()
    }

    pub fn is_built(&self, dir: Direction) -> bool {
        self.storage[dir.slot()].iter().all(|cell| cell.get().is_some())
    }

    /// Compute every missing bitmap in `dir`, in parallel.
    pub fn build(&self, dir: Direction) {
        let graph = self.graph;
        let cells = &self.storage[dir.slot()];
        let computed: usize = cells
            .par_iter()
            .enumerate()
            .map(|(i, cell)| {
                let mut fresh = 0;
                cell.get_or_init(|| {
                    fresh = 1;
                    reach(graph, NodeIndex::new(i), dir)
                });
                fresh
            })
            .sum();
        info!(direction = %dir, computed, vertices = cells.len(), "bitmap index built");
    }

    /// Build both directions.
    pub fn build_all(&self) {
        self.build(Direction::Out);
        self.build(Direction::In);
    }

    /// Discard every cached bitmap in `dir`.
    pub fn clear(&mut self, dir: Direction) {
        self.storage[dir.slot()] = empty_cells(self.graph);
        debug!(direction = %dir, "bitmap index cleared");
    }

    pub fn clear_all(&mut self) {
        self.clear(Direction::Out);
        self.clear(Direction::In);
    }
}

fn empty_cells(graph: &CallGraph) -> Vec<OnceLock<Bitmap>> {
    (0..graph.vertex_count()).map(|_| OnceLock::new()).collect()
}

/// Depth-first walk from `start`, marking each vertex when first reached.
fn reach(graph: &CallGraph, start: NodeIndex, dir: Direction) -> Bitmap {
    let mut bitmap = FixedBitSet::with_capacity(graph.vertex_count());
    let mut stack = vec![start];
    while let Some(current) = stack.pop() {
        for next in graph.neighbors(current, dir) {
            if !bitmap.put(next.index()) {
                stack.push(next);
            }
        }
    }
    bitmap
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::VertexData;

    /// a -> b -> c -> b, d isolated
    fn sample() -> (CallGraph, Vec<NodeIndex>) {
        let mut graph = CallGraph::new();
        let v: Vec<_> = ["a", "b", "c", "d"]
            .iter()
            .map(|n| graph.add_vertex(VertexData::function(*n, "t.c", 1)))
            .collect();
        graph.add_edge(v[0], v[1]);
        graph.add_edge(v[1], v[2]);
        graph.add_edge(v[2], v[1]);
        (graph, v)
    }

    fn members(bitmap: &Bitmap) -> Vec<usize> {
        bitmap.ones().collect()
    }

    #[test]
    fn test_out_and_in_reachability() {
        let (graph, v) = sample();
        let indexer = BitmapIndexer::new(&graph);
        assert_eq!(members(indexer.index(v[0], Direction::Out)), vec![1, 2]);
        assert_eq!(members(indexer.index(v[1], Direction::Out)), vec![1, 2], "b is on a cycle");
        assert_eq!(members(indexer.index(v[2], Direction::In)), vec![0, 1, 2]);
        assert!(indexer.index(v[3], Direction::Out).is_clear());
        assert!(indexer.index(v[0], Direction::In).is_clear());
    }

    #[test]
    fn test_build_and_clear() {
        let (graph, v) = sample();
        let mut indexer = BitmapIndexer::new(&graph);
        assert!(indexer.cached(v[0], Direction::Out).is_none());
        indexer.build(Direction::Out);
        assert!(indexer.is_built(Direction::Out));
        assert!(!indexer.is_built(Direction::In));

        let before = indexer.index(v[0], Direction::Out).clone();
        indexer.build(Direction::Out);
        assert_eq!(indexer.index(v[0], Direction::Out), &before);

        indexer.clear(Direction::Out);
        assert!(indexer.cached(v[0], Direction::Out).is_none());
        assert_eq!(indexer.index(v[0], Direction::Out), &before);
    }
}
