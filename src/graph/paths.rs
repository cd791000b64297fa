//! Path enumeration.
//!
//! A [`PathFinder`] enumerates every path from one source vertex to every
//! other vertex, where a path is the sequence of edges taken. Termination on
//! cyclic graphs comes from a uniqueness policy: under [`EdgeUnique`] a path
//! never repeats an edge, under [`VertexUnique`] it never repeats a vertex.

use indexmap::IndexMap;
use petgraph::graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use tracing::debug;

use super::engine::CallGraph;
use crate::error::{CgtError, Result};

/// Edges in traversal order. The empty path is the trivial path of the
/// source to itself.
pub type Path = Vec<EdgeIndex>;

/// The graph interface a finder walks. Implemented by the base graph and by
/// filtered views of it, so one finder works on both.
pub trait SearchGraph {
    /// One past the highest vertex index.
    fn vertex_bound(&self) -> usize;
    fn contains(&self, v: NodeIndex) -> bool;
    /// Outgoing edges of `v` visible in this graph, with their targets.
    fn out_edges(&self, v: NodeIndex) -> Vec<(EdgeIndex, NodeIndex)>;
}

impl SearchGraph for CallGraph {
    fn vertex_bound(&self) -> usize {
        self.vertex_count()
    }

    fn contains(&self, v: NodeIndex) -> bool {
        v.index() < self.vertex_count()
    }

    fn out_edges(&self, v: NodeIndex) -> Vec<(EdgeIndex, NodeIndex)> {
        CallGraph::out_edges(self, v).collect()
    }
}

// ─── Uniqueness policies ────────────────────────────────────────

/// Decides which extensions of a path are allowed. `Used` is the state
/// recorded alongside each stored path.
pub trait UniquenessPolicy {
    type Used: Clone;

    /// State of the empty path at `start`, or `None` to record nothing.
    fn seed(start: NodeIndex) -> Option<Self::Used>;

    fn allows(used: &Self::Used, edge: EdgeIndex, target: NodeIndex) -> bool;

    /// State of the path extended by `edge`.
    fn extend(used: &Self::Used, edge: EdgeIndex, target: NodeIndex) -> Self::Used;
}

/// No edge appears twice in a path.
pub struct EdgeUnique;

impl UniquenessPolicy for EdgeUnique {
    type Used = HashSet<EdgeIndex>;

    fn seed(_start: NodeIndex) -> Option<Self::Used> {
        Some(HashSet::new())
    }

    fn allows(used: &Self::Used, edge: EdgeIndex, _target: NodeIndex) -> bool {
        !used.contains(&edge)
    }

    fn extend(used: &Self::Used, edge: EdgeIndex, _target: NodeIndex) -> Self::Used {
        let mut next = used.clone();
        next.insert(edge);
        next
    }
}

/// No vertex appears twice in a path; the start vertex counts as used.
pub struct VertexUnique;

impl UniquenessPolicy for VertexUnique {
    type Used = HashSet<NodeIndex>;

    fn seed(start: NodeIndex) -> Option<Self::Used> {
        Some(HashSet::from([start]))
    }

    fn allows(used: &Self::Used, _edge: EdgeIndex, target: NodeIndex) -> bool {
        !used.contains(&target)
    }

    fn extend(used: &Self::Used, _edge: EdgeIndex, target: NodeIndex) -> Self::Used {
        let mut next = used.clone();
        next.insert(target);
        next
    }
}

/// Records nothing, not even the start vertex.
pub struct Void;

impl UniquenessPolicy for Void {
    type Used = ();

    fn seed(_start: NodeIndex) -> Option<Self::Used> {
        None
    }

    fn allows(_used: &(), _edge: EdgeIndex, _target: NodeIndex) -> bool {
        false
    }

    fn extend(_used: &(), _edge: EdgeIndex, _target: NodeIndex) {}
}

/// Runtime choice between the useful policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Uniqueness {
    #[default]
    Edge,
    Vertex,
}

impl fmt::Display for Uniqueness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uniqueness::Edge => write!(f, "edge"),
            Uniqueness::Vertex => write!(f, "vertex"),
        }
    }
}

impl FromStr for Uniqueness {
    type Err = CgtError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "edge" => Ok(Uniqueness::Edge),
            "vertex" => Ok(Uniqueness::Vertex),
            _ => Err(CgtError::Config(format!("unknown uniqueness `{}`", s))),
        }
    }
}

// ─── Finder ─────────────────────────────────────────────────────

/// Enumerates all paths from one source under policy `P`.
pub struct PathFinder<'g, G: SearchGraph, P: UniquenessPolicy> {
    graph: &'g G,
    /// Per vertex: every path found so far ending there, in discovery order.
    storage: Vec<IndexMap<Path, P::Used>>,
    budget: Option<usize>,
    steps: usize,
    _policy: PhantomData<P>,
}

impl<'g, G: SearchGraph, P: UniquenessPolicy> PathFinder<'g, G, P> {
    pub fn new(graph: &'g G) -> Self {
        Self {
            graph,
            storage: (0..graph.vertex_bound()).map(|_| IndexMap::new()).collect(),
            budget: None,
            steps: 0,
            _policy: PhantomData,
        }
    }

    /// Fail with [`CgtError::BudgetExhausted`] after `steps` extensions.
    /// `None` means no limit.
    pub fn with_budget(mut self, steps: Option<usize>) -> Self {
        self.budget = steps;
        self
    }

    /// Enumerate every path starting at `src`. Calling it again for the same
    /// source adds nothing.
    pub fn compute(&mut self, src: NodeIndex) -> Result<()> {
        if !self.graph.contains(src) {
            return Ok(());
        }
        let Some(seed) = P::seed(src) else {
            return Ok(());
        };
        self.storage[src.index()].entry(Path::new()).or_insert(seed);

        let mut expanded = vec![0usize; self.storage.len()];
        let mut stack = vec![src];
        while let Some(current) = stack.pop() {
            let edges = self.graph.out_edges(current);
            loop {
                let cursor = expanded[current.index()];
                let Some((path, used)) = self.storage[current.index()]
                    .get_index(cursor)
                    .map(|(p, u)| (p.clone(), u.clone()))
                else {
                    break;
                };
                expanded[current.index()] = cursor + 1;

                for &(edge, target) in &edges {
                    if !P::allows(&used, edge, target) {
                        continue;
                    }
                    self.charge()?;
                    let mut next = path.clone();
                    next.push(edge);
                    let slot = &mut self.storage[target.index()];
                    if slot.contains_key(&next) {
                        continue;
                    }
                    slot.insert(next, P::extend(&used, edge, target));
                    if target != current {
                        stack.push(target);
                    }
                }
            }
        }
        debug!(source = src.index(), steps = self.steps, "path enumeration done");
        Ok(())
    }

    fn charge(&mut self) -> Result<()> {
        self.steps += 1;
        match self.budget {
            Some(limit) if self.steps > limit => Err(CgtError::BudgetExhausted { steps: limit }),
            _ => Ok(()),
        }
    }

    /// Paths found to `dst`, in discovery order.
    pub fn paths(&self, dst: NodeIndex) -> Vec<Path> {
        self.storage
            .get(dst.index())
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Paths found to `dst`, as an ordered set.
    pub fn path_set(&self, dst: NodeIndex) -> BTreeSet<Path> {
        self.storage
            .get(dst.index())
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Extension attempts made so far.
    pub fn steps(&self) -> usize {
        self.steps
    }
}

/// Enumerate paths from `src` to `dst` with a runtime-selected policy.
pub fn find_paths<G: SearchGraph>(
    graph: &G,
    src: NodeIndex,
    dst: NodeIndex,
    uniqueness: Uniqueness,
    budget: Option<usize>,
) -> Result<Vec<Path>> {
    match uniqueness {
        Uniqueness::Edge => run::<G, EdgeUnique>(graph, src, dst, budget),
        Uniqueness::Vertex => run::<G, VertexUnique>(graph, src, dst, budget),
    }
}

fn run<G: SearchGraph, P: UniquenessPolicy>(
    graph: &G,
    src: NodeIndex,
    dst: NodeIndex,
    budget: Option<usize>,
) -> Result<Vec<Path>> {
    let mut finder = PathFinder::<G, P>::new(graph).with_budget(budget);
    finder.compute(src)?;
    Ok(finder.paths(dst))
}
