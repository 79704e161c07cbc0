//! Dependency graph between formula cells.
//!
//! Two adjacency maps are kept side by side:
//!
//! - `dependencies`: cell -> cells its formula reads
//! - `dependents`: cell -> cells whose formulas read it
//!
//! Both are only ever mutated through [`link`] and [`unlink`], which update
//! the pair together so the maps cannot drift apart.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};

use super::CellRef;
use super::cycle::{CycleScratch, detect_cycle};

/// Insertion-ordered set of cells.
#[derive(Clone, Debug, Default)]
struct EdgeSet {
    order: Vec<CellRef>,
    members: HashSet<CellRef>,
}

impl EdgeSet {
    fn insert(&mut self, cell: &CellRef) -> bool {
        if !self.members.insert(cell.clone()) {
            return false;
        }
        self.order.push(cell.clone());
        true
    }

    fn remove(&mut self, cell: &CellRef) -> bool {
        if !self.members.remove(cell) {
            return false;
        }
        self.order.retain(|c| c != cell);
        true
    }

    fn as_slice(&self) -> &[CellRef] {
        &self.order
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

type Adjacency = HashMap<CellRef, EdgeSet>;

fn link(dependencies: &mut Adjacency, dependents: &mut Adjacency, from: &CellRef, to: &CellRef) {
    dependencies.entry(from.clone()).or_default().insert(to);
    dependents.entry(to.clone()).or_default().insert(from);
}

fn unlink(dependencies: &mut Adjacency, dependents: &mut Adjacency, from: &CellRef, to: &CellRef) {
    if let Some(set) = dependencies.get_mut(from) {
        set.remove(to);
        if set.is_empty() {
            dependencies.remove(from);
        }
    }
    if let Some(set) = dependents.get_mut(to) {
        set.remove(from);
        if set.is_empty() {
            dependents.remove(to);
        }
    }
}

/// Sizes reported for diagnostics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct GraphStats {
    /// Cells that own at least one dependency.
    pub cells_with_dependencies: usize,
    /// Sum of all forward edge-set sizes.
    pub total_edges: usize,
}

#[derive(Clone, Debug, Default)]
pub struct DependencyGraph {
    dependencies: Adjacency,
    dependents: Adjacency,
    scratch: RefCell<CycleScratch>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that `dependent` reads `dependency`. Idempotent.
    pub fn add_dependency(&mut self, dependent: &CellRef, dependency: &CellRef) {
        link(&mut self.dependencies, &mut self.dependents, dependent, dependency);
    }

    /// Detach `cell` from everything it reads. Cells that read `cell` are untouched.
    pub fn remove_all_dependencies(&mut self, cell: &CellRef) {
        let old: Vec<CellRef> = self.dependencies(cell).to_vec();
        for dependency in &old {
            unlink(&mut self.dependencies, &mut self.dependents, cell, dependency);
        }
    }

    /// Direct dependencies in insertion order; empty for unknown cells.
    pub fn dependencies(&self, cell: &CellRef) -> &[CellRef] {
        self.dependencies.get(cell).map(EdgeSet::as_slice).unwrap_or(&[])
    }

    /// Direct dependents in insertion order; empty for unknown cells.
    pub fn dependents(&self, cell: &CellRef) -> &[CellRef] {
        self.dependents.get(cell).map(EdgeSet::as_slice).unwrap_or(&[])
    }

    /// Every cell that transitively reads `cell`, in breadth-first discovery order.
    ///
    /// Each cell is visited at most once, so a cycle that slipped into the graph
    /// still terminates. `cell` itself is never included.
    pub fn all_dependents(&self, cell: &CellRef) -> Vec<CellRef> {
        let mut visited: HashSet<CellRef> = HashSet::new();
        let mut queue: VecDeque<CellRef> = VecDeque::new();
        let mut found = Vec::new();

        visited.insert(cell.clone());
        queue.push_back(cell.clone());
        while let Some(current) = queue.pop_front() {
            for next in self.dependents(&current) {
                if visited.insert(next.clone()) {
                    found.push(next.clone());
                    queue.push_back(next.clone());
                }
            }
        }

        found
    }

    /// Transitive dependents of `cell` ordered so each comes after every
    /// dependent it reads. Falls back to discovery order for any cells left
    /// over by a cycle.
    pub fn recalc_order(&self, cell: &CellRef) -> Vec<CellRef> {
        let discovered = self.all_dependents(cell);
        let members: HashSet<&CellRef> = discovered.iter().collect();

        let mut pending: HashMap<&CellRef, usize> = discovered
            .iter()
            .map(|c| {
                let inside = self
                    .dependencies(c)
                    .iter()
                    .filter(|d| members.contains(d))
                    .count();
                (c, inside)
            })
            .collect();

        let mut ready: VecDeque<&CellRef> = discovered
            .iter()
            .filter(|c| pending.get(c) == Some(&0))
            .collect();
        let mut order = Vec::with_capacity(discovered.len());
        let mut placed: HashSet<&CellRef> = HashSet::new();

        while let Some(current) = ready.pop_front() {
            placed.insert(current);
            order.push(current.clone());
            for next in self.dependents(current) {
                if let Some(count) = pending.get_mut(next) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(next);
                    }
                }
            }
        }

        if order.len() < discovered.len() {
            tracing::warn!(
                cell = %cell,
                leftover = discovered.len() - order.len(),
                "dependency cycle found during recalculation"
            );
            order.extend(discovered.iter().filter(|c| !placed.contains(c)).cloned());
        }

        order
    }

    /// Check whether giving `cell` the dependencies `candidate` would close a cycle.
    ///
    /// The graph itself is never modified; `candidate` replaces the current
    /// edges of `cell` only for the duration of the search.
    pub fn check_circular_reference(
        &self,
        cell: &CellRef,
        candidate: &[CellRef],
    ) -> Option<Vec<CellRef>> {
        let mut scratch = self.scratch.borrow_mut();
        detect_cycle(
            cell,
            |current| {
                if current == cell {
                    candidate
                } else {
                    self.dependencies(current)
                }
            },
            &mut scratch,
        )
    }

    pub fn clear(&mut self) {
        self.dependencies.clear();
        self.dependents.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.dependencies.is_empty()
    }

    pub fn stats(&self) -> GraphStats {
        GraphStats {
            cells_with_dependencies: self.dependencies.len(),
            total_edges: self.dependencies.values().map(EdgeSet::len).sum(),
        }
    }
}
