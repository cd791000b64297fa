//! Queries over a compacted call graph.
//!
//! Commands, one per line:
//!
//! ```text
//! ?sym    ??sym    ???sym     vertex lookup at depth 0, 1 and 2
//! symA symB                   every path from symA to symB
//! build [OUT|IN]              precompute reachability bitmaps
//! clear [OUT|IN]              drop them again
//! !index  !rindex             same as `build OUT` / `build IN`
//! ```
//!
//! A symbol token of `*` stands for every vertex.

use petgraph::graph::NodeIndex;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info};

use crate::error::{CgtError, Result};
use crate::graph::{
    find_paths, BitmapIndexer, CallGraph, Direction, Path, SubgraphFilter, Uniqueness, VertexData,
};

/// Runtime knobs for path queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub max_path_steps: Option<usize>,
    pub parallel: bool,
    pub uniqueness: Uniqueness,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_path_steps: Some(1_000_000),
            parallel: true,
            uniqueness: Uniqueness::Edge,
        }
    }
}

// ─── Commands ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Vertex { symbol: String, depth: u8 },
    Paths { from: String, to: String },
    /// `None` builds both directions.
    Build(Option<Direction>),
    Clear(Option<Direction>),
}

/// `*`, or a single word starting like an identifier. The rest of the word
/// is opaque (`main()::argc`, `foo::<ret>`).
fn is_symbol(token: &str) -> bool {
    if token == "*" {
        return true;
    }
    token
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && !token.contains(char::is_whitespace)
}

impl FromStr for Command {
    type Err = CgtError;

    fn from_str(line: &str) -> Result<Self> {
        let line = line.trim();
        let bad = || CgtError::BadCommand(line.to_string());

        if line.starts_with('?') {
            let depth = line.chars().take_while(|&c| c == '?').count();
            let symbol = line[depth..].trim();
            if depth > 3 || !is_symbol(symbol) {
                return Err(bad());
            }
            return Ok(Command::Vertex {
                symbol: symbol.to_string(),
                depth: (depth - 1) as u8,
            });
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["!index"] => Ok(Command::Build(Some(Direction::Out))),
            ["!rindex"] => Ok(Command::Build(Some(Direction::In))),
            ["build"] => Ok(Command::Build(None)),
            ["build", dir] => Ok(Command::Build(Some(dir.parse()?))),
            ["clear"] => Ok(Command::Clear(None)),
            ["clear", dir] => Ok(Command::Clear(Some(dir.parse()?))),
            [from, to] if is_symbol(from) && is_symbol(to) => Ok(Command::Paths {
                from: from.to_string(),
                to: to.to_string(),
            }),
            _ => Err(bad()),
        }
    }
}

// ─── Reports ────────────────────────────────────────────────────

/// One vertex lookup result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VertexReport {
    pub symbol: VertexData,
    pub depth: u8,
    /// Direct callers at depth 1, every transitive caller at depth 2.
    pub incoming: Vec<VertexData>,
    pub outgoing: Vec<VertexData>,
}

impl fmt::Display for VertexReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.symbol)?;
        let (inward, outward) = if self.depth >= 2 {
            ("<----", "---->")
        } else {
            ("<--", "-->")
        };
        for v in &self.incoming {
            writeln!(f, "  {} {}", inward, v)?;
        }
        for v in &self.outgoing {
            writeln!(f, "  {} {}", outward, v)?;
        }
        Ok(())
    }
}

/// Paths rendered as vertex sequences. The empty path is not listed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathReport {
    pub paths: Vec<Vec<VertexData>>,
}

impl fmt::Display for PathReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, path) in self.paths.iter().enumerate() {
            writeln!(f, "path #{}:", k + 1)?;
            for v in path {
                writeln!(f, "  {}", v)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QueryOutput {
    Vertices { reports: Vec<VertexReport> },
    Paths(PathReport),
    Built { directions: Vec<Direction> },
    Cleared { directions: Vec<Direction> },
}

impl fmt::Display for QueryOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutput::Vertices { reports } => {
                for report in reports {
                    write!(f, "{}", report)?;
                }
                Ok(())
            }
            QueryOutput::Paths(report) => write!(f, "{}", report),
            QueryOutput::Built { directions } => {
                for d in directions {
                    writeln!(f, "index {} built", d)?;
                }
                Ok(())
            }
            QueryOutput::Cleared { directions } => {
                for d in directions {
                    writeln!(f, "index {} cleared", d)?;
                }
                Ok(())
            }
        }
    }
}

fn directions(dir: Option<Direction>) -> Vec<Direction> {
    match dir {
        Some(d) => vec![d],
        None => vec![Direction::Out, Direction::In],
    }
}

// ─── Engine ─────────────────────────────────────────────────────

/// Runs queries against one graph, caching reachability bitmaps between
/// queries.
pub struct QueryEngine<'g> {
    graph: &'g CallGraph,
    indexer: BitmapIndexer<'g>,
    options: QueryOptions,
}

impl<'g> QueryEngine<'g> {
    pub fn new(graph: &'g CallGraph, options: QueryOptions) -> Self {
        Self {
            graph,
            indexer: BitmapIndexer::new(graph),
            options,
        }
    }

    pub fn indexer(&self) -> &BitmapIndexer<'g> {
        &self.indexer
    }

    /// Vertices matching a symbol token.
    pub fn resolve(&self, symbol: &str) -> Result<Vec<NodeIndex>> {
        if symbol == "*" {
            return Ok(self.graph.vertices().collect());
        }
        let found = self.graph.lookup(symbol);
        if found.is_empty() {
            return Err(CgtError::UnknownSymbol(symbol.to_string()));
        }
        Ok(found.to_vec())
    }

    fn data(&self, v: NodeIndex) -> VertexData {
        self.graph.vertex(v).cloned().unwrap_or_else(|| {
            VertexData::function(format!("#{}", v.index()), "", 0)
        })
    }

    /// Describe every vertex named `symbol`.
    pub fn vertex_lookup(&self, symbol: &str, depth: u8) -> Result<Vec<VertexReport>> {
        let mut reports = Vec::new();
        for v in self.resolve(symbol)? {
            let (incoming, outgoing) = match depth {
                0 => (Vec::new(), Vec::new()),
                1 => (
                    self.neighbors_sorted(v, Direction::In),
                    self.neighbors_sorted(v, Direction::Out),
                ),
                _ => (
                    self.reachable(v, Direction::In),
                    self.reachable(v, Direction::Out),
                ),
            };
            reports.push(VertexReport {
                symbol: self.data(v),
                depth,
                incoming,
                outgoing,
            });
        }
        Ok(reports)
    }

    fn neighbors_sorted(&self, v: NodeIndex, dir: Direction) -> Vec<VertexData> {
        let set: BTreeSet<NodeIndex> = self.graph.neighbors(v, dir).collect();
        set.into_iter().map(|n| self.data(n)).collect()
    }

    fn reachable(&self, v: NodeIndex, dir: Direction) -> Vec<VertexData> {
        self.indexer
            .index(v, dir)
            .ones()
            .map(|i| self.data(NodeIndex::new(i)))
            .collect()
    }

    /// Every path from any vertex named `from` to any vertex named `to`,
    /// merged into one ordered set.
    pub fn path_lookup(&self, from: &str, to: &str) -> Result<BTreeSet<Path>> {
        let sources = self.resolve(from)?;
        let targets = self.resolve(to)?;
        let pairs: Vec<(NodeIndex, NodeIndex)> = sources
            .iter()
            .flat_map(|&s| targets.iter().map(move |&d| (s, d)))
            .collect();
        debug!(pairs = pairs.len(), "path lookup");

        let run = |&(s, d): &(NodeIndex, NodeIndex)| -> Result<Vec<Path>> {
            let filter = SubgraphFilter::between(&self.indexer, s, d);
            let view = filter.view(self.graph);
            find_paths(&view, s, d, self.options.uniqueness, self.options.max_path_steps)
        };
        let results: Vec<Result<Vec<Path>>> = if self.options.parallel {
            pairs.par_iter().map(run).collect()
        } else {
            pairs.iter().map(run).collect()
        };

        let mut merged = BTreeSet::new();
        for result in results {
            merged.extend(result?);
        }
        Ok(merged)
    }

    /// Render paths as vertex sequences: the source of the first edge, then
    /// the target of every edge. Empty paths are skipped.
    pub fn path_report(&self, paths: &BTreeSet<Path>) -> PathReport {
        let mut report = PathReport::default();
        for path in paths {
            let Some(&first) = path.first() else {
                continue;
            };
            let mut vertices = Vec::with_capacity(path.len() + 1);
            if let Some((src, _)) = self.graph.endpoints(first) {
                vertices.push(self.data(src));
            }
            for &edge in path {
                if let Some((_, dst)) = self.graph.endpoints(edge) {
                    vertices.push(self.data(dst));
                }
            }
            report.paths.push(vertices);
        }
        report
    }

    pub fn execute(&mut self, command: &Command) -> Result<QueryOutput> {
        match command {
            Command::Vertex { symbol, depth } => Ok(QueryOutput::Vertices {
                reports: self.vertex_lookup(symbol, *depth)?,
            }),
            Command::Paths { from, to } => {
                let paths = self.path_lookup(from, to)?;
                Ok(QueryOutput::Paths(self.path_report(&paths)))
            }
            Command::Build(dir) => {
                let dirs = directions(*dir);
                for &d in &dirs {
                    self.indexer.build(d);
                }
                Ok(QueryOutput::Built { directions: dirs })
            }
            Command::Clear(dir) => {
                let dirs = directions(*dir);
                for &d in &dirs {
                    self.indexer.clear(d);
                }
                Ok(QueryOutput::Cleared { directions: dirs })
            }
        }
    }

    /// Parse and run one command line, logging how long it took.
    pub fn execute_line(&mut self, line: &str) -> Result<QueryOutput> {
        let command: Command = line.parse()?;
        let start = Instant::now();
        let output = self.execute(&command)?;
        info!(
            command = line.trim(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "query completed"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::Linker;

    fn graph(text: &str) -> CallGraph {
        let mut linker = Linker::new();
        linker.link_str("test", text);
        CallGraph::from_program(&linker.finish().unwrap(), true)
    }

    const PROGRAM: &str = "F main.c\n1 (1) main 2 3\n2 (10) parse 4\n3 (20) run 4 3\n4 (0) @decl printf\n";

    #[test]
    fn test_command_grammar() {
        assert_eq!(
            "??main".parse::<Command>().unwrap(),
            Command::Vertex { symbol: "main".into(), depth: 1 }
        );
        assert_eq!(
            "??? foo::<ret>".parse::<Command>().unwrap(),
            Command::Vertex { symbol: "foo::<ret>".into(), depth: 2 }
        );
        assert_eq!(
            "main printf".parse::<Command>().unwrap(),
            Command::Paths { from: "main".into(), to: "printf".into() }
        );
        assert_eq!("* printf".parse::<Command>().unwrap(), Command::Paths { from: "*".into(), to: "printf".into() });
        assert_eq!("build".parse::<Command>().unwrap(), Command::Build(None));
        assert_eq!("build IN".parse::<Command>().unwrap(), Command::Build(Some(Direction::In)));
        assert_eq!("!index".parse::<Command>().unwrap(), Command::Build(Some(Direction::Out)));
        assert_eq!("clear OUT".parse::<Command>().unwrap(), Command::Clear(Some(Direction::Out)));
        for bad in ["", "main", "????main", "a b c", "build sideways", "?", "1abc x"] {
            assert!(bad.parse::<Command>().is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn test_vertex_lookup_depths() {
        let graph = graph(PROGRAM);
        let engine = QueryEngine::new(&graph, QueryOptions::default());

        let direct = engine.vertex_lookup("run", 1).unwrap();
        assert_eq!(direct.len(), 1);
        let names = |vs: &[VertexData]| vs.iter().map(|v| v.name.clone()).collect::<Vec<_>>();
        assert_eq!(names(&direct[0].incoming), vec!["main", "run"]);
        assert_eq!(names(&direct[0].outgoing), vec!["run", "printf"]);

        let deep = engine.vertex_lookup("printf", 2).unwrap();
        assert_eq!(names(&deep[0].incoming), vec!["main", "parse", "run"]);
        assert!(deep[0].outgoing.is_empty());

        let text = deep[0].to_string();
        assert!(text.starts_with("@decl printf (main.c:0)\n"));
        assert!(text.contains("  <---- main (main.c:1)\n"));

        assert!(matches!(
            engine.vertex_lookup("missing", 0),
            Err(CgtError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_path_lookup_and_report() {
        let graph = graph(PROGRAM);
        let mut engine = QueryEngine::new(&graph, QueryOptions::default());
        let output = engine.execute_line("main printf").unwrap();
        let text = output.to_string();
        // main->parse->printf, main->run->printf, main->run->run->printf
        assert_eq!(text.matches("path #").count(), 3);
        assert!(text.starts_with("path #1:\n  main (main.c:1)\n"));
        assert!(text.contains("  @decl printf (main.c:0)\n\n"));
    }

    #[test]
    fn test_self_path_is_not_printed() {
        let graph = graph(PROGRAM);
        let engine = QueryEngine::new(&graph, QueryOptions::default());
        let paths = engine.path_lookup("main", "main").unwrap();
        assert_eq!(paths.len(), 1);
        assert!(paths.iter().next().unwrap().is_empty());
        assert!(engine.path_report(&paths).paths.is_empty());
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let graph = graph(PROGRAM);
        let parallel = QueryEngine::new(&graph, QueryOptions::default());
        let sequential = QueryEngine::new(
            &graph,
            QueryOptions { parallel: false, ..QueryOptions::default() },
        );
        assert_eq!(
            parallel.path_lookup("*", "*").unwrap(),
            sequential.path_lookup("*", "*").unwrap()
        );
    }

    #[test]
    fn test_build_and_clear_commands() {
        let graph = graph(PROGRAM);
        let mut engine = QueryEngine::new(&graph, QueryOptions::default());
        engine.execute_line("!rindex").unwrap();
        assert!(engine.indexer().is_built(Direction::In));
        assert!(!engine.indexer().is_built(Direction::Out));
        engine.execute_line("build").unwrap();
        assert!(engine.indexer().is_built(Direction::Out));
        engine.execute_line("clear").unwrap();
        assert!(!engine.indexer().is_built(Direction::In));
    }
}
