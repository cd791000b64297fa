//! Error types for cgt.
//!
//! Only failures that stop an operation live here. Problems with individual
//! fragment lines are recorded as [`crate::link::Diagnostic`]s instead.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors raised while linking, persisting or querying a call graph.
#[derive(Debug, Error)]
pub enum CgtError {
    #[error("cannot access {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("alias chain through `{name}` never reaches a canonical symbol")]
    AliasCycle { name: String },

    #[error("symbol not found: {0}")]
    UnknownSymbol(String),

    #[error("unknown command: {0}")]
    BadCommand(String),

    #[error("path search gave up after {steps} steps")]
    BudgetExhausted { steps: usize },

    #[error("snapshot error: {0}")]
    Persistence(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl CgtError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        CgtError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, CgtError>;
