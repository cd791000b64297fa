//! The call graph engine.
//!
//! Uses petgraph to store the compacted program: one vertex per canonical
//! symbol, one edge per distinct call. Vertex and edge indices are dense
//! and never invalidated, since the graph is immutable once built.

use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{HashMap, HashSet};
use tracing::info;

use super::types::{Direction, GraphStats, VertexData};
use crate::link::LinkedProgram;
use crate::symbols::SymbolId;

/// The compacted call graph plus a name index.
#[derive(Debug, Clone, Default)]
pub struct CallGraph {
    graph: DiGraph<VertexData, ()>,
    /// Index: symbol name -> every vertex with that name.
    symbol_index: HashMap<String, Vec<NodeIndex>>,
}

impl CallGraph {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Construction ───────────────────────────────────────────

    /// Compact a linked program into a dense graph.
    ///
    /// Forwarders never become vertices. With `drop_unused`, declarations
    /// that neither call nor are called are left out too.
    pub fn from_program(program: &LinkedProgram, drop_unused: bool) -> Self {
        let store = program.store();
        let called: HashSet<SymbolId> = store
            .iter()
            .flat_map(|s| s.callees.iter().copied())
            .collect();

        let mut graph = CallGraph::new();
        let mut mapping: HashMap<SymbolId, NodeIndex> = HashMap::new();
        for symbol in store.iter() {
            if symbol.is_forwarder() {
                continue;
            }
            if drop_unused
                && symbol.is_decl
                && symbol.callees.is_empty()
                && !called.contains(&symbol.id)
            {
                continue;
            }
            let vertex = graph.add_vertex(VertexData::from_symbol(symbol, store));
            mapping.insert(symbol.id, vertex);
        }

        for symbol in store.iter() {
            let Some(&from) = mapping.get(&symbol.id) else {
                continue;
            };
            for callee in &symbol.callees {
                if let Some(&to) = mapping.get(callee) {
                    graph.add_edge(from, to);
                }
            }
        }

        info!(
            vertices = graph.vertex_count(),
            edges = graph.edge_count(),
            dropped = store.len() - graph.vertex_count(),
            "compacted call graph"
        );
        graph
    }

    /// Add a vertex. Returns its index.
    pub fn add_vertex(&mut self, data: VertexData) -> NodeIndex {
        let name = data.name.clone();
        let idx = self.graph.add_node(data);
        self.symbol_index.entry(name).or_default().push(idx);
        idx
    }

    /// Add a call edge. Adding the same edge twice returns the existing one.
    pub fn add_edge(&mut self, from: NodeIndex, to: NodeIndex) -> EdgeIndex {
        self.graph.update_edge(from, to, ())
    }

    // ─── Accessors ──────────────────────────────────────────────

    pub fn vertex_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn vertex(&self, v: NodeIndex) -> Option<&VertexData> {
        self.graph.node_weight(v)
    }

    pub fn vertices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.graph
            .edge_indices()
            .filter_map(|e| self.graph.edge_endpoints(e))
    }

    pub fn endpoints(&self, e: EdgeIndex) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(e)
    }

    /// Vertices named exactly `name`.
    pub fn lookup(&self, name: &str) -> &[NodeIndex] {
        self.symbol_index
            .get(name)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Outgoing edges of `v` with their targets.
    pub fn out_edges(&self, v: NodeIndex) -> impl Iterator<Item = (EdgeIndex, NodeIndex)> + '_ {
        self.graph
            .edges_directed(v, petgraph::Direction::Outgoing)
            .map(|e| (e.id(), e.target()))
    }

    /// Direct neighbours of `v`: callees for `Out`, callers for `In`.
    pub fn neighbors(&self, v: NodeIndex, dir: Direction) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.neighbors_directed(v, dir.petgraph())
    }

    // ─── Statistics ─────────────────────────────────────────────

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            vertices: self.vertex_count(),
            edges: self.edge_count(),
            unique_names: self.symbol_index.len(),
            ..GraphStats::default()
        };
        let mut files = HashSet::new();
        for data in self.graph.node_weights() {
            if !data.file.is_empty() {
                files.insert(data.file.as_str());
            }
            if data.is_decl {
                stats.declarations += 1;
            } else {
                stats.definitions += 1;
            }
            if data.is_var {
                stats.variables += 1;
            }
        }
        stats.files = files.len();
        stats.self_loops = self.edges().filter(|(a, b)| a == b).count();
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Linker;

    fn linked(text: &str) -> LinkedProgram {
        let mut linker = Linker::new();
        linker.link_str("test", text);
        linker.finish().unwrap()
    }

    #[test]
    fn test_from_program_is_dense() {
        let program = linked(
            "F a.c\n1 (1) main 2 3\n2 (0) @decl X -> Y\n3 (5) Y 3\n4 (0) @decl lonely\n",
        );
        let graph = CallGraph::from_program(&program, true);
        assert_eq!(graph.vertex_count(), 2, "forwarder and lonely decl dropped");
        assert_eq!(graph.edge_count(), 2, "main->Y once, plus Y->Y");
        assert!(graph.lookup("X").is_empty());
        assert!(graph.lookup("lonely").is_empty());

        let keep_all = CallGraph::from_program(&program, false);
        assert_eq!(keep_all.vertex_count(), 3);
        assert_eq!(keep_all.lookup("lonely").len(), 1);
    }

    #[test]
    fn test_neighbors_and_lookup() {
        let mut graph = CallGraph::new();
        let a = graph.add_vertex(VertexData::function("a", "x.c", 1));
        let b = graph.add_vertex(VertexData::function("b", "x.c", 2));
        let b2 = graph.add_vertex(VertexData::function("b", "y.c", 2));
        graph.add_edge(a, b);
        graph.add_edge(a, b);
        graph.add_edge(a, b2);

        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph.lookup("b"), &[b, b2]);
        let mut callees: Vec<_> = graph.neighbors(a, Direction::Out).collect();
        callees.sort();
        assert_eq!(callees, vec![b, b2]);
        assert_eq!(graph.neighbors(b, Direction::In).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_stats() {
        let program = linked("F a.c\n1 (1) main 2\n2 (0) @decl printf\nF b.c\n3 (1) @var counter\n4 (2) loop 4\n");
        let stats = CallGraph::from_program(&program, true).stats();
        assert_eq!(stats.vertices, 4);
        assert_eq!(stats.edges, 2);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.declarations, 1);
        assert_eq!(stats.definitions, 3);
        assert_eq!(stats.variables, 1);
        assert_eq!(stats.self_loops, 1);
    }
}
