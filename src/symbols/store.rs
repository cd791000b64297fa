//! Arena that owns every symbol and file of a link session.

use std::collections::{BTreeSet, HashMap};
use std::ops::{Index, IndexMut};
use tracing::debug;

use super::types::{FileId, FileSymbol, ProgramSymbol, SymbolId};
use crate::error::{CgtError, Result};

/// Symbols and files, addressed by [`SymbolId`] / [`FileId`].
#[derive(Debug, Clone, Default)]
pub struct SymbolStore {
    symbols: Vec<ProgramSymbol>,
    files: Vec<FileSymbol>,
    file_index: HashMap<String, FileId>,
}

impl SymbolStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Symbols ────────────────────────────────────────────────

    /// Create a fresh symbol with default flags.
    pub fn create(&mut self, name: String, file: Option<FileId>, line: u32) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(ProgramSymbol::new(id, name, file, line));
        id
    }

    pub fn get(&self, id: SymbolId) -> Option<&ProgramSymbol> {
        self.symbols.get(id.index())
    }

    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut ProgramSymbol> {
        self.symbols.get_mut(id.index())
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProgramSymbol> {
        self.symbols.iter()
    }

    /// All symbols carrying `name`, in creation order.
    pub fn named(&self, name: &str) -> Vec<SymbolId> {
        self.symbols
            .iter()
            .filter(|s| s.name == name)
            .map(|s| s.id)
            .collect()
    }

    // ─── Files ──────────────────────────────────────────────────

    /// Return the file with this canonical path, creating it on first use.
    pub fn intern_file(&mut self, path: &str) -> FileId {
        if let Some(&id) = self.file_index.get(path) {
            return id;
        }
        let id = FileId(self.files.len() as u32);
        self.files.push(FileSymbol {
            path: path.to_string(),
        });
        self.file_index.insert(path.to_string(), id);
        id
    }

    pub fn file(&self, id: FileId) -> Option<&FileSymbol> {
        self.files.get(id.index())
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Path of the symbol's owning file, `""` when it has none.
    pub fn file_path(&self, symbol: &ProgramSymbol) -> &str {
        symbol
            .file
            .and_then(|f| self.file(f))
            .map(|f| f.path.as_str())
            .unwrap_or("")
    }

    // ─── Post-link passes ───────────────────────────────────────

    /// Follow `forward_to` links from `id` to the canonical symbol.
    pub fn resolve_forward(&self, id: SymbolId) -> Result<SymbolId> {
        let mut current = id;
        let mut hops = 0;
        while let Some(next) = self[current].forward_to {
            hops += 1;
            if hops > self.symbols.len() {
                return Err(CgtError::AliasCycle {
                    name: self[id].name.clone(),
                });
            }
            current = next;
        }
        Ok(current)
    }

    /// Rewrite every callee and parent link that points at a forwarder so it
    /// points at the forwarder's canonical symbol. Returns the number of
    /// rewritten edges.
    ///
    /// Every alias chain is followed first, so a cycle is an error even when
    /// no edge leads into it.
    pub fn resolve_callee_aliases(&mut self) -> Result<usize> {
        for symbol in self.symbols.iter().filter(|s| s.is_forwarder()) {
            self.resolve_forward(symbol.id)?;
        }
        let mut rewritten = 0;
        for idx in 0..self.symbols.len() {
            let mut resolved = BTreeSet::new();
            for &callee in &self.symbols[idx].callees {
                let target = self.resolve_forward(callee)?;
                if target != callee {
                    rewritten += 1;
                }
                resolved.insert(target);
            }
            let parent = match self.symbols[idx].parent {
                Some(p) => Some(self.resolve_forward(p)?),
                None => None,
            };
            let symbol = &mut self.symbols[idx];
            symbol.callees = resolved;
            symbol.parent = parent;
        }
        debug!(rewritten, "resolved callee aliases");
        Ok(rewritten)
    }

    /// Fill the reverse `callers` index of every symbol.
    pub fn compute_callers(&mut self) {
        let mut callers: Vec<BTreeSet<SymbolId>> = vec![BTreeSet::new(); self.symbols.len()];
        for symbol in &self.symbols {
            for callee in &symbol.callees {
                callers[callee.index()].insert(symbol.id);
            }
        }
        for (symbol, set) in self.symbols.iter_mut().zip(callers) {
            symbol.callers = Some(set);
        }
    }

    /// Mark every defined symbol and every callee as used.
    pub fn compute_used(&mut self) {
        let mut called = vec![false; self.symbols.len()];
        for symbol in &self.symbols {
            for callee in &symbol.callees {
                called[callee.index()] = true;
            }
        }
        for (symbol, is_called) in self.symbols.iter_mut().zip(called) {
            symbol.used = !symbol.is_decl || is_called;
        }
    }

    /// Symbol ids ordered by file path (file-less symbols first), then id.
    pub fn sorted_by_file(&self) -> Vec<SymbolId> {
        let mut ids: Vec<SymbolId> = self.symbols.iter().map(|s| s.id).collect();
        ids.sort_by(|&a, &b| {
            let (sa, sb) = (&self[a], &self[b]);
            let fa = sa.file.map(|_| self.file_path(sa));
            let fb = sb.file.map(|_| self.file_path(sb));
            fa.cmp(&fb).then(a.cmp(&b))
        });
        ids
    }
}

impl Index<SymbolId> for SymbolStore {
    type Output = ProgramSymbol;

    fn index(&self, id: SymbolId) -> &ProgramSymbol {
        &self.symbols[id.index()]
    }
}

impl IndexMut<SymbolId> for SymbolStore {
    fn index_mut(&mut self, id: SymbolId) -> &mut ProgramSymbol {
        &mut self.symbols[id.index()]
    }
}
