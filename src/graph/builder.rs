//! Graph builder: links fragment files and compacts the result.

use std::path::{Path, PathBuf};
use tracing::info;

use super::engine::CallGraph;
use crate::config::CgtConfig;
use crate::error::Result;
use crate::link::{LinkOptions, LinkedProgram, Linker};

/// Link `paths` in order (following their includes) into one program.
pub fn link_files(paths: &[PathBuf], options: LinkOptions) -> Result<LinkedProgram> {
    let mut linker = Linker::with_options(options);
    for path in paths {
        linker.link_file(path)?;
    }
    linker.finish()
}

/// Link `paths` and compact them into a call graph.
pub fn build_graph(paths: &[PathBuf], config: &CgtConfig) -> Result<CallGraph> {
    let program = link_files(paths, config.link_options())?;
    Ok(CallGraph::from_program(
        &program,
        config.link.drop_unused_declarations,
    ))
}

/// Load a graph from a snapshot, or by linking it when `path` is a
/// fragment file.
pub fn load_graph(path: &Path, config: &CgtConfig) -> Result<CallGraph> {
    if CallGraph::is_snapshot(path) {
        return CallGraph::load(path);
    }
    info!(path = %path.display(), "linking graph file");
    build_graph(&[path.to_path_buf()], config)
}
