//! Recoverable problems found while linking.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    MalformedLine,
    UnknownFlag,
    UnresolvedCallee,
    UnresolvedAlias,
    UnresolvedParent,
    IdentityConflict,
    Rename,
    ParentConflict,
    DuplicateDefinition,
    PointerCall,
    AliasConflict,
    RepeatedInclude,
    IgnoredCallee,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiagnosticKind::MalformedLine => "malformed line",
            DiagnosticKind::UnknownFlag => "unknown flag",
            DiagnosticKind::UnresolvedCallee => "unresolved call",
            DiagnosticKind::UnresolvedAlias => "unresolved alias",
            DiagnosticKind::UnresolvedParent => "unresolved parent",
            DiagnosticKind::IdentityConflict => "identity conflict",
            DiagnosticKind::Rename => "rename",
            DiagnosticKind::ParentConflict => "parent conflict",
            DiagnosticKind::DuplicateDefinition => "duplicate definition",
            DiagnosticKind::PointerCall => "pointer call",
            DiagnosticKind::AliasConflict => "alias conflict",
            DiagnosticKind::RepeatedInclude => "repeated include",
            DiagnosticKind::IgnoredCallee => "ignored call",
        };
        write!(f, "{}", s)
    }
}

/// One recorded problem, located by fragment source and line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub source: String,
    pub line: Option<usize>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: {}: {}", self.source, line, self.kind, self.message),
            None => write!(f, "{}: {}: {}", self.source, self.kind, self.message),
        }
    }
}

/// Diagnostics collected over a link session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    items: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic and log it.
    pub fn push(
        &mut self,
        kind: DiagnosticKind,
        source: &str,
        line: Option<usize>,
        message: String,
    ) {
        let diagnostic = Diagnostic {
            kind,
            source: source.to_string(),
            line,
            message,
        };
        warn!(kind = %kind, "{}", diagnostic);
        self.items.push(diagnostic);
    }

    pub fn count(&self, kind: DiagnosticKind) -> usize {
        self.items.iter().filter(|d| d.kind == kind).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.items.iter()
    }

    /// Count per kind, in kind order.
    pub fn summary(&self) -> BTreeMap<DiagnosticKind, usize> {
        let mut counts = BTreeMap::new();
        for diagnostic in self.iter() {
            *counts.entry(diagnostic.kind).or_insert(0) += 1;
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
