//! Snapshot persistence for the call graph.
//!
//! A snapshot is a short magic header followed by a bincode payload holding
//! the vertices and edges in dense index order, so a reload reproduces the
//! same vertex and edge indices.

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::Path;
use tracing::info;

use super::engine::CallGraph;
use super::types::VertexData;
use crate::error::{CgtError, Result};

const MAGIC: &[u8; 8] = b"CGTSNAP\x01";

#[derive(Serialize, Deserialize)]
struct Snapshot {
    vertices: Vec<VertexData>,
    edges: Vec<(u32, u32)>,
}

impl CallGraph {
    /// Write a snapshot to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            vertices: self
                .vertices()
                .filter_map(|v| self.vertex(v).cloned())
                .collect(),
            edges: self
                .edges()
                .map(|(a, b)| (a.index() as u32, b.index() as u32))
                .collect(),
        };
        let payload =
            bincode::serialize(&snapshot).map_err(|e| CgtError::Persistence(e.to_string()))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CgtError::io(parent, e))?;
        }
        let mut bytes = Vec::with_capacity(MAGIC.len() + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&payload);
        fs::write(path, bytes).map_err(|e| CgtError::io(path, e))?;

        info!(
            path = %path.display(),
            vertices = snapshot.vertices.len(),
            edges = snapshot.edges.len(),
            "graph snapshot saved"
        );
        Ok(())
    }

    /// Load a snapshot written by [`CallGraph::save`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| CgtError::io(path, e))?;
        let payload = bytes
            .strip_prefix(MAGIC.as_slice())
            .ok_or_else(|| CgtError::Persistence(format!("{} is not a snapshot", path.display())))?;
        let snapshot: Snapshot =
            bincode::deserialize(payload).map_err(|e| CgtError::Persistence(e.to_string()))?;

        let mut graph = CallGraph::new();
        let count = snapshot.vertices.len();
        for vertex in snapshot.vertices {
            graph.add_vertex(vertex);
        }
        for (a, b) in snapshot.edges {
            if a as usize >= count || b as usize >= count {
                return Err(CgtError::Persistence(format!(
                    "edge {} -> {} out of range ({} vertices)",
                    a, b, count
                )));
            }
            graph.add_edge(NodeIndex::new(a as usize), NodeIndex::new(b as usize));
        }
        info!(path = %path.display(), vertices = count, "graph snapshot loaded");
        Ok(graph)
    }

    /// Whether `path` starts with the snapshot header.
    pub fn is_snapshot(path: &Path) -> bool {
        let mut header = [0u8; 8];
        fs::File::open(path)
            .and_then(|mut f| f.read_exact(&mut header))
            .map(|_| &header == MAGIC)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::Direction;

    #[test]
    fn test_save_load_preserves_indices() {
        let mut graph = CallGraph::new();
        let a = graph.add_vertex(VertexData::function("main", "m.c", 1));
        let mut decl = VertexData::function("printf", "", 0);
        decl.is_decl = true;
        let b = graph.add_vertex(decl);
        graph.add_edge(a, b);
        graph.add_edge(b, b);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("graph.bin");
        graph.save(&path).unwrap();
        assert!(CallGraph::is_snapshot(&path));

        let loaded = CallGraph::load(&path).unwrap();
        assert_eq!(loaded.stats(), graph.stats());
        assert_eq!(loaded.lookup("printf"), &[b]);
        assert_eq!(loaded.vertex(b), graph.vertex(b));
        assert_eq!(
            loaded.neighbors(a, Direction::Out).collect::<Vec<_>>(),
            vec![b]
        );
    }

    #[test]
    fn test_load_rejects_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plain.cg");
        fs::write(&path, "F a.c\n1 (1) main\n").unwrap();
        assert!(!CallGraph::is_snapshot(&path));
        assert!(matches!(CallGraph::load(&path), Err(CgtError::Persistence(_))));
        assert!(matches!(
            CallGraph::load(&dir.path().join("missing.bin")),
            Err(CgtError::Io { .. })
        ));
    }
}
