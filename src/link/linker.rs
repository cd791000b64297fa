//! The linker: merges fragments into one symbol store.
//!
//! Node ids are only meaningful inside their fragment. Non-static names are
//! shared across fragments through the session's global name table, static
//! names never leave their fragment. Forward references inside a fragment
//! (callees, aliases, parents) are queued and resolved when the fragment
//! ends; alias chains are collapsed once, after the last fragment.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::diagnostics::{DiagnosticKind, Diagnostics};
use super::format::{parse_line, NodeLine, NodeToken, Record};
use super::paths::{fragment_dir, resolve_file_name};
use crate::error::{CgtError, Result};
use crate::symbols::{ArgSlot, FileId, SymbolId, SymbolStore};

/// Knobs that change what the linker reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    pub report_duplicate_definitions: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            report_duplicate_definitions: true,
        }
    }
}

/// Tables that live for one fragment only.
#[derive(Debug, Default)]
struct FragmentScope {
    source: String,
    dir: String,
    file: Option<FileId>,
    ids: HashMap<u64, SymbolId>,
    names: HashMap<String, SymbolId>,
    pending_aliases: Vec<(String, SymbolId, usize)>,
    pending_callees: Vec<(u64, SymbolId, usize)>,
    pending_parents: Vec<(u64, Option<u32>, SymbolId, usize)>,
    nodes: usize,
}

impl FragmentScope {
    fn begin(source: &str, dir: &str) -> Self {
        Self {
            source: source.to_string(),
            dir: dir.to_string(),
            ..Self::default()
        }
    }
}

/// A link session.
pub struct Linker {
    store: SymbolStore,
    global_symbols: HashMap<String, SymbolId>,
    scope: FragmentScope,
    diagnostics: Diagnostics,
    linked_files: HashSet<PathBuf>,
    options: LinkOptions,
    fragments: usize,
}

/// The result of a finished link session.
#[derive(Debug, Clone)]
pub struct LinkedProgram {
    store: SymbolStore,
    global_symbols: HashMap<String, SymbolId>,
    diagnostics: Diagnostics,
}

impl LinkedProgram {
    pub fn store(&self) -> &SymbolStore {
        &self.store
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Symbol bound to a non-static name in the global table.
    pub fn global(&self, name: &str) -> Option<SymbolId> {
        self.global_symbols.get(name).copied()
    }
}

impl Default for Linker {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker {
    pub fn new() -> Self {
        Self::with_options(LinkOptions::default())
    }

    pub fn with_options(options: LinkOptions) -> Self {
        Self {
            store: SymbolStore::new(),
            global_symbols: HashMap::new(),
            scope: FragmentScope::default(),
            diagnostics: Diagnostics::new(),
            linked_files: HashSet::new(),
            options,
            fragments: 0,
        }
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    // ─── Input ──────────────────────────────────────────────────

    /// Link a fragment file, then every file it includes.
    pub fn link_file(&mut self, path: &Path) -> Result<()> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if !self.linked_files.insert(key) {
            self.diagnostics.push(
                DiagnosticKind::RepeatedInclude,
                &path.display().to_string(),
                None,
                "file already linked in this session; skipped".to_string(),
            );
            return Ok(());
        }
        let text = fs::read_to_string(path).map_err(|e| CgtError::io(path, e))?;
        let source = path.display().to_string();
        let dir = fragment_dir(&source);
        let includes = self.link_text(&source, &dir, &text);

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for include in includes {
            self.link_file(&base.join(include))?;
        }
        Ok(())
    }

    /// Link in-memory fragment text named `source`.
    ///
    /// Returns the `I` include requests found in the text. There is no
    /// directory to resolve them against, so following them is up to the
    /// caller.
    pub fn link_str(&mut self, source: &str, text: &str) -> Vec<String> {
        self.link_text(source, "./", text)
    }

    fn link_text(&mut self, source: &str, dir: &str, text: &str) -> Vec<String> {
        let mut includes = Vec::new();
        self.scope = FragmentScope::begin(source, dir);
        for (index, raw) in text.lines().enumerate() {
            let lineno = index + 1;
            match parse_line(raw) {
                Ok(None) => {}
                Ok(Some(Record::File(name))) => {
                    let path = resolve_file_name(&self.scope.dir, &name);
                    self.scope.file = Some(self.store.intern_file(&path));
                }
                Ok(Some(Record::Include(name))) => includes.push(name),
                Ok(Some(Record::FragmentEnd)) => {
                    self.end_fragment();
                    self.scope = FragmentScope::begin(source, dir);
                }
                Ok(Some(Record::Node(node))) => self.ingest_node(node, lineno),
                Err(e) => self.report(DiagnosticKind::MalformedLine, lineno, e.to_string()),
            }
        }
        self.end_fragment();
        includes
    }

    fn report(&mut self, kind: DiagnosticKind, line: usize, message: String) {
        self.diagnostics
            .push(kind, &self.scope.source, Some(line), message);
    }

    // ─── Node binding ───────────────────────────────────────────

    fn ingest_node(&mut self, node: NodeLine, lineno: usize) {
        self.scope.nodes += 1;
        let file = self.scope.file;
        for flag in &node.unknown_flags {
            let message = format!("unknown flag `{}` on `{}`; ignored", flag, node.name);
            self.report(DiagnosticKind::UnknownFlag, lineno, message);
        }

        let mut bound = if node.is_static {
            None
        } else {
            self.global_symbols.get(&node.name).copied()
        };
        if bound.is_none() {
            if let Some(&id) = self.scope.ids.get(&node.id) {
                if self.store[id].name != node.name {
                    let message = format!(
                        "symbol #{} renamed from `{}` to `{}`",
                        node.id, self.store[id].name, node.name
                    );
                    self.report(DiagnosticKind::Rename, lineno, message);
                }
                bound = Some(id);
            }
        }

        if let Some(id) = bound {
            let existing = &self.store[id];
            if !existing.is_decl && !node.is_decl && existing.file != file {
                if self.options.report_duplicate_definitions {
                    let message = format!(
                        "`{}` already defined in `{}`; keeping the definitions apart",
                        node.name,
                        self.store.file_path(existing)
                    );
                    self.report(DiagnosticKind::DuplicateDefinition, lineno, message);
                }
                bound = None;
            } else {
                let mut conflicts = Vec::new();
                if existing.is_static != node.is_static {
                    conflicts.push("static");
                }
                if existing.is_var != node.is_var {
                    conflicts.push("var");
                }
                if !conflicts.is_empty() {
                    let message = format!(
                        "`{}` changes its {} flag; keeping the latest",
                        node.name,
                        conflicts.join(" and ")
                    );
                    self.report(DiagnosticKind::IdentityConflict, lineno, message);
                }
            }
        }

        let mut enlist = false;
        let id = match bound {
            Some(id) => {
                if node.is_static && !self.store[id].is_static {
                    self.global_symbols.retain(|_, bound| *bound != id);
                }
                let symbol = &mut self.store[id];
                symbol.is_static = node.is_static;
                symbol.is_var = node.is_var;
                if symbol.is_decl && (!node.is_decl || (symbol.line == 0 && node.line != 0)) {
                    symbol.file = file;
                    symbol.line = node.line;
                }
                if !node.is_decl {
                    symbol.is_decl = false;
                    symbol.line = node.line;
                    enlist = true;
                }
                id
            }
            None => {
                let id = self.store.create(node.name.clone(), file, node.line);
                let symbol = &mut self.store[id];
                symbol.is_static = node.is_static;
                symbol.is_decl = node.is_decl;
                symbol.is_var = node.is_var;
                enlist = true;
                id
            }
        };

        if let Some(target) = &node.alias {
            match self.scope.names.get(target) {
                Some(&canonical) => self.set_forward(id, canonical, lineno),
                None => self
                    .scope
                    .pending_aliases
                    .push((target.clone(), id, lineno)),
            }
        }

        self.scope.ids.insert(node.id, id);
        self.scope.names.insert(node.name.clone(), id);
        if !node.is_decl {
            self.store[id].used = true;
        }

        let takes_callees = !node.is_decl && !node.is_var;
        for token in &node.tokens {
            match *token {
                NodeToken::Callee(callee) if !takes_callees => {
                    let message = format!(
                        "call to #{} on declaration or variable `{}`; ignored",
                        callee, node.name
                    );
                    self.report(DiagnosticKind::IgnoredCallee, lineno, message);
                }
                NodeToken::Callee(callee) => match self.scope.ids.get(&callee) {
                    Some(&target) => {
                        self.store[id].callees.insert(target);
                    }
                    None => self.scope.pending_callees.push((callee, id, lineno)),
                },
                NodeToken::PointerCall => {
                    let message = format!("`{}` carries a pointer-call marker; ignored", node.name);
                    self.report(DiagnosticKind::PointerCall, lineno, message);
                }
                NodeToken::Parent { id: parent, arg } => match self.scope.ids.get(&parent) {
                    Some(&p) => self.set_parent(id, p, arg, lineno),
                    None => self.scope.pending_parents.push((parent, arg, id, lineno)),
                },
            }
        }

        if enlist && !node.is_static {
            self.global_symbols.insert(node.name, id);
        }
    }

    fn set_forward(&mut self, id: SymbolId, canonical: SymbolId, lineno: usize) {
        let name = self.store[id].name.clone();
        if id == canonical {
            let message = format!("`{}` aliases itself; ignored", name);
            self.report(DiagnosticKind::AliasConflict, lineno, message);
            return;
        }
        let current = self.store[id].forward_to;
        match current {
            Some(previous) if previous != canonical => {
                let message = format!(
                    "`{}` already aliases `{}`; ignoring alias to `{}`",
                    name, self.store[previous].name, self.store[canonical].name
                );
                self.report(DiagnosticKind::AliasConflict, lineno, message);
            }
            _ => self.store[id].forward_to = Some(canonical),
        }
    }

    fn set_parent(&mut self, child: SymbolId, parent: SymbolId, arg: Option<u32>, lineno: usize) {
        let existing = &self.store[child];
        if let Some(current) = existing.parent {
            let same = current == parent
                && arg.map_or(true, |n| existing.arg_n == Some(ArgSlot::Arg(n)));
            if !same {
                let message = format!(
                    "`{}` already belongs to `{}`; ignoring link to `{}`",
                    existing.name, self.store[current].name, self.store[parent].name
                );
                self.report(DiagnosticKind::ParentConflict, lineno, message);
            }
            return;
        }

        let children = &self.store[parent].children;
        let slot = match arg {
            Some(n) => ArgSlot::Arg(n),
            None if existing.name.ends_with("<ret>") => ArgSlot::Return,
            None => (0..)
                .map(ArgSlot::Arg)
                .find(|slot| !children.contains_key(slot))
                .unwrap_or(ArgSlot::Arg(0)),
        };
        if let Some(&taken) = children.get(&slot) {
            let message = format!(
                "{} of `{}` is already `{}`; ignoring `{}`",
                slot, self.store[parent].name, self.store[taken].name, existing.name
            );
            self.report(DiagnosticKind::ParentConflict, lineno, message);
            return;
        }

        self.store[parent].children.insert(slot, child);
        let symbol = &mut self.store[child];
        symbol.parent = Some(parent);
        symbol.arg_n = Some(slot);
    }

    // ─── Fragment end ───────────────────────────────────────────

    fn end_fragment(&mut self) {
        for (target, id, lineno) in std::mem::take(&mut self.scope.pending_aliases) {
            match self.scope.names.get(&target) {
                Some(&canonical) => self.set_forward(id, canonical, lineno),
                None => {
                    let message = format!(
                        "`{}` aliases unknown symbol `{}`",
                        self.store[id].name, target
                    );
                    self.report(DiagnosticKind::UnresolvedAlias, lineno, message);
                }
            }
        }

        for (callee, id, lineno) in std::mem::take(&mut self.scope.pending_callees) {
            match self.scope.ids.get(&callee) {
                Some(&target) => {
                    self.store[id].callees.insert(target);
                }
                None => {
                    let message = format!(
                        "unresolved call from `{}` to symbol #{}",
                        self.store[id].name, callee
                    );
                    self.report(DiagnosticKind::UnresolvedCallee, lineno, message);
                }
            }
        }

        for (parent, arg, id, lineno) in std::mem::take(&mut self.scope.pending_parents) {
            match self.scope.ids.get(&parent) {
                Some(&p) => self.set_parent(id, p, arg, lineno),
                None => {
                    let message = format!(
                        "`{}` names unknown parent #{}",
                        self.store[id].name, parent
                    );
                    self.report(DiagnosticKind::UnresolvedParent, lineno, message);
                }
            }
        }

        if self.scope.nodes > 0 {
            self.fragments += 1;
            debug!(
                fragment = %self.scope.source,
                nodes = self.scope.nodes,
                "linked fragment"
            );
        }
    }

    // ─── Finish ─────────────────────────────────────────────────

    /// Collapse alias chains and run the post-link passes.
    ///
    /// Fails with [`CgtError::AliasCycle`] when a chain never ends.
    pub fn finish(mut self) -> Result<LinkedProgram> {
        let rewritten = self.store.resolve_callee_aliases()?;
        self.store.compute_used();
        self.store.compute_callers();
        info!(
            fragments = self.fragments,
            symbols = self.store.len(),
            files = self.store.file_count(),
            rewritten,
            diagnostics = self.diagnostics.len(),
            "link complete"
        );
        Ok(LinkedProgram {
            store: self.store,
            global_symbols: self.global_symbols,
            diagnostics: self.diagnostics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(fragments: &[&str]) -> LinkedProgram {
        let mut linker = Linker::new();
        for (i, text) in fragments.iter().enumerate() {
            linker.link_str(&format!("frag{}", i), text);
        }
        linker.finish().unwrap()
    }

    fn callee_names(program: &LinkedProgram, id: SymbolId) -> Vec<String> {
        program.store()[id]
            .callees
            .iter()
            .map(|&c| program.store()[c].name.clone())
            .collect()
    }

    #[test]
    fn test_forward_callee_reference() {
        let program = link(&["F a.c\n1 (1) main 2\n2 (5) helper\n"]);
        let main = program.global("main").unwrap();
        assert_eq!(callee_names(&program, main), vec!["helper"]);
        assert!(program.diagnostics().is_empty());
    }

    #[test]
    fn test_unresolved_callee_dropped() {
        let program = link(&["F a.c\n1 (1) main 9\n"]);
        let main = program.global("main").unwrap();
        assert!(program.store()[main].callees.is_empty());
        assert_eq!(program.diagnostics().count(DiagnosticKind::UnresolvedCallee), 1);
    }

    #[test]
    fn test_declaration_upgraded_by_definition() {
        let program = link(&[
            "F main.c\n1 (3) main 2\n2 (0) @decl helper\n",
            "F helper.c\n1 (10) helper\n",
        ]);
        let helper = program.global("helper").unwrap();
        let symbol = &program.store()[helper];
        assert!(!symbol.is_decl);
        assert_eq!(symbol.line, 10);
        assert_eq!(program.store().file_path(symbol), "helper.c");
        assert_eq!(program.store().named("helper").len(), 1);
    }

    #[test]
    fn test_line_zero_declaration_takes_later_location() {
        let program = link(&[
            "F a.c\n1 (0) @decl puts\n",
            "F stdio.h\n1 (77) @decl puts\n",
        ]);
        let puts = &program.store()[program.global("puts").unwrap()];
        assert!(puts.is_decl);
        assert_eq!(puts.line, 77);
        assert_eq!(program.store().file_path(puts), "stdio.h");
    }

    #[test]
    fn test_duplicate_definitions_kept_apart() {
        let program = link(&["F a.c\n1 (1) init\n", "F b.c\n1 (1) init\n"]);
        assert_eq!(program.store().named("init").len(), 2);
        assert_eq!(
            program.diagnostics().count(DiagnosticKind::DuplicateDefinition),
            1
        );

        let mut quiet = Linker::with_options(LinkOptions {
            report_duplicate_definitions: false,
        });
        quiet.link_str("a", "F a.c\n1 (1) init\n");
        quiet.link_str("b", "F b.c\n1 (1) init\n");
        assert!(quiet.finish().unwrap().diagnostics().is_empty());
    }

    #[test]
    fn test_rename_and_identity_conflict() {
        let program = link(&["F a.c\n1 (1) @static foo\n1 (2) bar\n"]);
        let diagnostics = program.diagnostics();
        assert_eq!(diagnostics.count(DiagnosticKind::Rename), 1);
        assert_eq!(diagnostics.count(DiagnosticKind::IdentityConflict), 1);
        let symbol = &program.store()[program.global("bar").unwrap()];
        assert!(!symbol.is_static, "latest flags win");
    }

    #[test]
    fn test_alias_resolved_within_fragment() {
        let program = link(&["F a.c\n1 (1) main 2\n2 (0) @decl X -> Y\n3 (4) Y\n"]);
        let main = program.global("main").unwrap();
        assert_eq!(callee_names(&program, main), vec!["Y"]);
        let x = program.store().named("X")[0];
        assert!(program.store()[x].is_forwarder());
    }

    #[test]
    fn test_alias_conflicts() {
        let program = link(&["F a.c\n1 (1) Y\n2 (1) Z\n3 (0) @decl X -> Y\n3 (0) @decl X -> Z\n4 (0) @decl W -> W\n"]);
        assert_eq!(program.diagnostics().count(DiagnosticKind::AliasConflict), 2);
        let x = program.store().named("X")[0];
        let y = program.store().named("Y")[0];
        assert_eq!(program.store()[x].forward_to, Some(y), "first alias kept");
    }

    #[test]
    fn test_unknown_alias_reported() {
        let program = link(&["F a.c\n1 (0) @decl X -> Nowhere\n"]);
        assert_eq!(program.diagnostics().count(DiagnosticKind::UnresolvedAlias), 1);
        let x = program.store().named("X")[0];
        assert!(!program.store()[x].is_forwarder());
    }

    #[test]
    fn test_alias_cycle_is_fatal() {
        let mut linker = Linker::new();
        linker.link_str("a", "F a.c\n1 (0) @decl A -> B\n2 (0) @decl B -> A\n");
        match linker.finish() {
            Err(CgtError::AliasCycle { .. }) => {}
            other => panic!("expected alias cycle, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parent_links() {
        let program = link(&[concat!(
            "F a.c\n",
            "1 (1) f\n",
            "2 (1) @var f::<ret> ^1\n",
            "3 (1) @var f()::a ^1\n",
            "4 (1) @var f()::b ^1:5\n",
            "5 (1) @var f()::c ^1:5\n",
            "6 (1) @var g()::x ^8\n",
            "8 (2) g\n",
        )]);
        let store = program.store();
        let f = &store[program.global("f").unwrap()];
        let slots: Vec<ArgSlot> = f.children.keys().copied().collect();
        assert_eq!(slots, vec![ArgSlot::Return, ArgSlot::Arg(0), ArgSlot::Arg(5)]);
        assert_eq!(program.diagnostics().count(DiagnosticKind::ParentConflict), 1);

        let x = &store[store.named("g()::x")[0]];
        assert_eq!(x.parent, program.global("g"), "forward parent reference");
        assert_eq!(x.arg_n, Some(ArgSlot::Arg(0)));
    }

    #[test]
    fn test_symbol_turned_static_leaves_global_table() {
        let program = link(&[
            "F a.c\n1 (1) foo\n1 (2) @static foo\n",
            "F b.c\n1 (1) foo\n",
        ]);
        let foos = program.store().named("foo");
        assert_eq!(foos.len(), 2, "the later foo does not merge with the static one");
        assert!(program.store()[foos[0]].is_static);
        assert_eq!(program.global("foo"), Some(foos[1]));
        assert_eq!(program.diagnostics().count(DiagnosticKind::IdentityConflict), 1);
        assert_eq!(program.diagnostics().count(DiagnosticKind::DuplicateDefinition), 0);
    }

    #[test]
    fn test_declarations_and_variables_carry_no_calls() {
        let program = link(&["F a.c\n1 (1) f\n2 (0) @decl g 1\n3 (4) @var table 1\n"]);
        let store = program.store();
        assert!(store[program.global("g").unwrap()].callees.is_empty());
        assert!(store[program.global("table").unwrap()].callees.is_empty());
        assert_eq!(program.diagnostics().count(DiagnosticKind::IgnoredCallee), 2);
    }

    #[test]
    fn test_unknown_flag_keeps_the_node() {
        let program = link(&["F a.c\n1 (1) @weak @static foo\n"]);
        assert_eq!(program.diagnostics().count(DiagnosticKind::UnknownFlag), 1);
        let foo = program.store().named("foo");
        assert_eq!(foo.len(), 1);
        assert!(program.store()[foo[0]].is_static);
    }

    #[test]
    fn test_pointer_marker_and_malformed_lines() {
        let program = link(&["F a.c\n1 (1) main *\nnot a node\n2 (1) ok\n"]);
        assert_eq!(program.diagnostics().count(DiagnosticKind::PointerCall), 1);
        assert_eq!(program.diagnostics().count(DiagnosticKind::MalformedLine), 1);
        assert!(program.global("ok").is_some());
    }

    #[test]
    fn test_fragment_separator_resets_ids() {
        let program = link(&["F a.c\n1 (1) a\n---\nF b.c\n2 (1) b 1\n"]);
        let b = program.global("b").unwrap();
        assert!(program.store()[b].callees.is_empty());
        assert_eq!(program.diagnostics().count(DiagnosticKind::UnresolvedCallee), 1);
    }

    #[test]
    fn test_node_without_file() {
        let program = link(&["1 (3) orphan\n"]);
        let orphan = &program.store()[program.global("orphan").unwrap()];
        assert_eq!(orphan.file, None);
        assert_eq!(program.store().file_path(orphan), "");
    }
}
