//! cgt CLI - call graph linker and path queries.
//!
//! Usage:
//!   cgt link a.cg b.cg -o prog.cg       # Link fragments
//!   cgt link *.cg --snapshot prog.bin   # ...and save a snapshot
//!   cgt link *.cg --cache -o prog.cg    # ...or save it to the cache path
//!   cgt query -g prog.cg 'main printf'  # Paths from main to printf
//!   cgt query 'main printf'             # Same, against the cached snapshot
//!   cgt query -g prog.bin < queries.txt # Batch mode
//!   cgt stats prog.cg                   # Graph statistics

use anyhow::Result;
use clap::Parser;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use cgt::cli::{self, Cli, Commands};
use cgt::graph::load_graph;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.quiet { "warn" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.load_config();
    let cache_path = cli.cache_path(&config);

    match cli.command {
        Commands::Link {
            inputs,
            output,
            snapshot,
            cache,
        } => {
            let mut out: Box<dyn Write> = match &output {
                Some(path) => Box::new(BufWriter::new(File::create(path)?)),
                None => Box::new(BufWriter::new(io::stdout().lock())),
            };
            let snapshots: Vec<PathBuf> = snapshot
                .into_iter()
                .chain(cache.then(|| cache_path.clone()))
                .collect();
            cli::link(&inputs, &snapshots, &config, &mut out)?;
            out.flush()?;
        }

        Commands::Query {
            graph,
            commands,
            json,
        } => {
            let graph = load_graph(&graph.unwrap_or(cache_path), &config)?;
            let mut out = io::stdout().lock();
            let failures = if commands.is_empty() {
                cli::query(&graph, cli::stdin_commands(), json, &config, &mut out)?
            } else {
                cli::query(&graph, commands, json, &config, &mut out)?
            };
            if failures > 0 {
                tracing::warn!(failures, "some queries failed");
            }
        }

        Commands::Stats { graph } => {
            println!("{}", cli::stats(&graph.unwrap_or(cache_path), &config)?);
        }
    }

    Ok(())
}
