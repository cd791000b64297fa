//! CLI module for cgt.
//!
//! Commands:
//! - link: merge fragment files, print the linked graph
//! - query: run query commands against a linked graph
//! - stats: graph statistics as JSON
//!
//! `link --cache` saves a snapshot to the `[cache] path` of the config;
//! `query` and `stats` read that snapshot when no graph is given.

use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::CgtConfig;
use crate::graph::{link_files, load_graph, CallGraph};
use crate::link::write_linked;
use crate::query::QueryEngine;

#[derive(Parser)]
#[command(name = "cgt")]
#[command(about = "Link call graph fragments and query paths between symbols")]
pub struct Cli {
    /// Config file (default: .cgt/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Link fragment files and print the merged graph
    Link {
        /// Fragment files, linked in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Write the linked graph here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also save a binary snapshot of the compacted graph
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Also save a snapshot to the configured cache path
        #[arg(long)]
        cache: bool,
    },

    /// Run queries against a linked graph or snapshot
    Query {
        /// Linked graph file or snapshot (default: the cached snapshot)
        #[arg(short, long)]
        graph: Option<PathBuf>,

        /// Commands to run; read from stdin, one per line, when omitted
        commands: Vec<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show graph statistics
    Stats {
        /// Linked graph file or snapshot (default: the cached snapshot)
        graph: Option<PathBuf>,
    },
}

impl Cli {
    /// `--config`, or the default location.
    pub fn config_path(&self) -> PathBuf {
        self.config
            .clone()
            .unwrap_or_else(|| PathBuf::from(crate::config::DEFAULT_CONFIG_PATH))
    }

    pub fn load_config(&self) -> CgtConfig {
        CgtConfig::load(&self.config_path())
    }

    /// Snapshot cache location; relative `[cache] path` values are taken
    /// from the directory holding the config file.
    pub fn cache_path(&self, config: &CgtConfig) -> PathBuf {
        let config_path = self.config_path();
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new(""));
        config.resolve_cache_path(config_dir)
    }
}

// ─── Commands ───────────────────────────────────────────────────

/// `cgt link`: link `inputs` and write the result to `out`. A snapshot
/// of the compacted graph is saved to every path in `snapshots`.
pub fn link<W: Write>(
    inputs: &[PathBuf],
    snapshots: &[PathBuf],
    config: &CgtConfig,
    out: &mut W,
) -> anyhow::Result<()> {
    let program = link_files(inputs, config.link_options())?;
    write_linked(&program, out)?;

    if !snapshots.is_empty() {
        let graph = CallGraph::from_program(&program, config.link.drop_unused_declarations);
        for path in snapshots {
            graph.save(path)?;
            info!(path = %path.display(), "snapshot saved");
        }
    }
    let diagnostics = program.diagnostics();
    if !diagnostics.is_empty() {
        for (kind, count) in diagnostics.summary() {
            warn!(kind = %kind, count, "link finished with diagnostics");
        }
    }
    Ok(())
}

/// `cgt query`: run each command, printing results to `out`. A failing
/// command is reported and the rest still run. Returns the failure count.
pub fn query<W: Write>(
    graph: &CallGraph,
    commands: impl IntoIterator<Item = String>,
    json: bool,
    config: &CgtConfig,
    out: &mut W,
) -> anyhow::Result<usize> {
    let mut engine = QueryEngine::new(graph, config.query_options());
    let mut failures = 0;
    for line in commands {
        if line.trim().is_empty() {
            continue;
        }
        match engine.execute_line(&line) {
            Ok(output) if json => writeln!(out, "{}", serde_json::to_string(&output)?)?,
            Ok(output) => write!(out, "{}", output)?,
            Err(e) => {
                failures += 1;
                eprintln!("error: {}: {}", line.trim(), e);
            }
        }
    }
    Ok(failures)
}

/// Commands for batch mode: stdin, one per line.
pub fn stdin_commands() -> impl Iterator<Item = String> {
    std::io::stdin().lock().lines().map_while(Result::ok)
}

/// `cgt stats`: pretty JSON statistics of the graph at `path`.
pub fn stats(path: &Path, config: &CgtConfig) -> anyhow::Result<String> {
    let graph = load_graph(path, config)?;
    let stats = graph.stats();
    info!(vertices = stats.vertices, edges = stats.edges, "graph loaded");
    Ok(serde_json::to_string_pretty(&stats)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["cgt", "-q", "link", "a.cg", "b.cg", "-o", "out.cg"]).unwrap();
        assert!(cli.quiet);
        match cli.command {
            Commands::Link { inputs, output, snapshot, cache } => {
                assert_eq!(inputs.len(), 2);
                assert_eq!(output, Some(PathBuf::from("out.cg")));
                assert!(snapshot.is_none());
                assert!(!cache);
            }
            _ => panic!("expected link"),
        }
        assert!(Cli::try_parse_from(["cgt", "link"]).is_err());
        let cli = Cli::try_parse_from(["cgt", "query", "-g", "g.cg", "main printf", "--json"]).unwrap();
        match cli.command {
            Commands::Query { graph, commands, json } => {
                assert_eq!(graph, Some(PathBuf::from("g.cg")));
                assert_eq!(commands, vec!["main printf".to_string()]);
                assert!(json);
            }
            _ => panic!("expected query"),
        }
        let cli = Cli::try_parse_from(["cgt", "query", "main printf"]).unwrap();
        assert!(matches!(cli.command, Commands::Query { graph: None, .. }));
    }

    #[test]
    fn test_cache_path_follows_config_location() {
        let cli = Cli::try_parse_from(["cgt", "stats"]).unwrap();
        assert_eq!(
            cli.cache_path(&CgtConfig::default()),
            PathBuf::from(".cgt/graph.bin")
        );

        let cli = Cli::try_parse_from(["cgt", "-c", "/srv/cg/cgt.toml", "stats"]).unwrap();
        assert_eq!(
            cli.cache_path(&CgtConfig::default()),
            PathBuf::from("/srv/cg/graph.bin")
        );
    }

    #[test]
    fn test_cached_snapshot_serves_stats() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("cgt.toml");
        fs::write(&config_path, "[cache]\npath = \"cache/prog.bin\"\n").unwrap();
        let input = dir.path().join("a.cg");
        fs::write(&input, "F a.c\n1 (1) main 2\n2 (4) helper\n").unwrap();

        let config_arg = config_path.to_string_lossy().into_owned();
        let cli = Cli::try_parse_from(["cgt", "-c", config_arg.as_str(), "stats"]).unwrap();
        let config = cli.load_config();
        let cache = cli.cache_path(&config);
        assert_eq!(cache, dir.path().join("cache/prog.bin"));

        let mut linked = Vec::new();
        link(&[input], &[cache.clone()], &config, &mut linked).unwrap();
        let json = stats(&cache, &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["vertices"], 2);
        assert_eq!(value["edges"], 1);
    }

    #[test]
    fn test_link_query_stats_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.cg");
        let b = dir.path().join("b.cg");
        fs::write(&a, "F a.c\n1 (1) main 2\n2 (0) @decl work\n").unwrap();
        fs::write(&b, "F b.c\n1 (7) work\n").unwrap();
        let config = CgtConfig::default();

        let mut linked = Vec::new();
        let snapshot = dir.path().join("g.bin");
        link(&[a, b], &[snapshot.clone()], &config, &mut linked).unwrap();
        let linked_path = dir.path().join("linked.cg");
        fs::write(&linked_path, &linked).unwrap();

        let graph = load_graph(&linked_path, &config).unwrap();
        let mut out = Vec::new();
        let failures = query(
            &graph,
            vec!["main work".to_string(), "nosuch main".to_string()],
            false,
            &config,
            &mut out,
        )
        .unwrap();
        assert_eq!(failures, 1);
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("path #1:"));
        assert!(text.contains(&format!("work ({}:7)", dir.path().join("b.c").display())));

        let json = stats(&snapshot, &config).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["vertices"], 2);
        assert_eq!(value["edges"], 1);
    }
}
