//! Core types for the compacted call graph.
//!
//! Defines vertex data, the reachability direction, and the summary
//! statistics of a graph.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CgtError;
use crate::symbols::{ProgramSymbol, SymbolStore};

/// Data stored on each vertex: one canonical program symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VertexData {
    pub name: String,
    /// Canonical path of the owning file (empty when unknown).
    pub file: String,
    pub line: u32,
    pub is_static: bool,
    pub is_decl: bool,
    pub is_var: bool,
}

impl VertexData {
    /// A defined, non-static function.
    pub fn function(name: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            line,
            is_static: false,
            is_decl: false,
            is_var: false,
        }
    }

    pub(crate) fn from_symbol(symbol: &ProgramSymbol, store: &SymbolStore) -> Self {
        Self {
            name: symbol.name.clone(),
            file: store.file_path(symbol).to_string(),
            line: symbol.line,
            is_static: symbol.is_static,
            is_decl: symbol.is_decl,
            is_var: symbol.is_var,
        }
    }
}

impl fmt::Display for VertexData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_decl {
            write!(f, "@decl ")?;
        }
        if self.is_static {
            write!(f, "@static ")?;
        }
        write!(f, "{} ({}:{})", self.name, self.file, self.line)
    }
}

/// Which way reachability is computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Vertices that can reach the key vertex (callers, transitively).
    In,
    /// Vertices reachable from the key vertex (callees, transitively).
    Out,
}

impl Direction {
    pub(crate) fn slot(self) -> usize {
        match self {
            Direction::In => 0,
            Direction::Out => 1,
        }
    }

    pub(crate) fn petgraph(self) -> petgraph::Direction {
        match self {
            Direction::In => petgraph::Direction::Incoming,
            Direction::Out => petgraph::Direction::Outgoing,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => write!(f, "IN"),
            Direction::Out => write!(f, "OUT"),
        }
    }
}

impl FromStr for Direction {
    type Err = CgtError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(Direction::In),
            "OUT" => Ok(Direction::Out),
            _ => Err(CgtError::BadCommand(format!("unknown direction `{}`", s))),
        }
    }
}

/// Summary statistics of a call graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub vertices: usize,
    pub edges: usize,
    pub files: usize,
    pub unique_names: usize,
    pub definitions: usize,
    pub declarations: usize,
    pub variables: usize,
    pub self_loops: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_display() {
        let mut v = VertexData::function("helper", "src/a.c", 12);
        assert_eq!(v.to_string(), "helper (src/a.c:12)");
        v.is_decl = true;
        v.is_static = true;
        assert_eq!(v.to_string(), "@decl @static helper (src/a.c:12)");
    }

    #[test]
    fn test_direction_parse() {
        assert_eq!("out".parse::<Direction>().unwrap(), Direction::Out);
        assert_eq!("IN".parse::<Direction>().unwrap(), Direction::In);
        assert!("up".parse::<Direction>().is_err());
    }
}
