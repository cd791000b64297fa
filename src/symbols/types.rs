//! Entity types for linked program symbols.
//!
//! Symbols and files live in a [`super::SymbolStore`] arena and refer to each
//! other through the copyable handles defined here.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Handle to a [`ProgramSymbol`] inside a store. Also the symbol's output id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SymbolId(pub u32);

impl SymbolId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Handle to a [`FileSymbol`] inside a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FileId(pub u32);

impl FileId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A source file, named by its canonical path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileSymbol {
    pub path: String,
}

/// Which argument of its parent a placeholder symbol stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ArgSlot {
    /// The return value (`foo::<ret>`).
    Return,
    /// Positional argument, numbered from 0.
    Arg(u32),
}

impl fmt::Display for ArgSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgSlot::Return => write!(f, "<ret>"),
            ArgSlot::Arg(n) => write!(f, "arg#{}", n),
        }
    }
}

/// A function or variable after linking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramSymbol {
    pub id: SymbolId,
    pub name: String,
    /// Owning file; `None` when the node appeared before any `F` line.
    pub file: Option<FileId>,
    pub line: u32,
    pub is_static: bool,
    pub is_decl: bool,
    pub is_var: bool,
    /// Defined somewhere, or called by someone.
    pub used: bool,
    /// Set when this symbol is an alias of another one.
    pub forward_to: Option<SymbolId>,
    pub callees: BTreeSet<SymbolId>,
    /// Reverse of `callees`, filled by `SymbolStore::compute_callers`.
    pub callers: Option<BTreeSet<SymbolId>>,
    pub parent: Option<SymbolId>,
    pub arg_n: Option<ArgSlot>,
    pub children: BTreeMap<ArgSlot, SymbolId>,
}

impl ProgramSymbol {
    pub fn new(id: SymbolId, name: String, file: Option<FileId>, line: u32) -> Self {
        Self {
            id,
            name,
            file,
            line,
            is_static: false,
            is_decl: false,
            is_var: false,
            used: false,
            forward_to: None,
            callees: BTreeSet::new(),
            callers: None,
            parent: None,
            arg_n: None,
            children: BTreeMap::new(),
        }
    }

    pub fn is_forwarder(&self) -> bool {
        self.forward_to.is_some()
    }

    /// Emitted by the writer and turned into a graph vertex.
    pub fn is_live(&self) -> bool {
        self.used && !self.is_forwarder()
    }
}
