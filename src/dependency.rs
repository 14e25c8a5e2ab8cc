use crate::concrete::DefId;
use crate::listener::{DependencyListener, ResolutionStage, ResolutionState};
use petgraph::Direction;
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;
use std::collections::{BTreeSet, VecDeque};
use tracing::debug;

/// Records the dependency edges reported during ordering, so that a change
/// to one definition can invalidate everything that depends on it.
///
/// Edge A -> B means A depends on B.
#[derive(Debug, Clone, Default)]
pub struct DependencyCollector {
    graph: DiGraphMap<DefId, ()>,
}

impl DependencyCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Definitions `id` was found to depend on, sorted.
    pub fn dependencies_of(&self, id: DefId) -> Vec<DefId> {
        self.neighbors(id, Direction::Outgoing)
    }

    /// Definitions found to depend on `id`, sorted.
    pub fn dependents_of(&self, id: DefId) -> Vec<DefId> {
        self.neighbors(id, Direction::Incoming)
    }

    fn neighbors(&self, id: DefId, direction: Direction) -> Vec<DefId> {
        let set: BTreeSet<DefId> = self.graph.neighbors_directed(id, direction).collect();
        set.into_iter().collect()
    }

    /// Groups of definitions that depend on each other, as recorded so far.
    /// Each group is sorted, and groups come dependencies first.
    pub fn recursive_groups(&self) -> Vec<Vec<DefId>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|component| component.len() > 1)
            .map(|mut component| {
                component.sort();
                component
            })
            .collect()
    }

    /// Marks `id` and everything that transitively depends on it as
    /// unresolved, and forgets their outgoing edges: they are collected again
    /// when the definitions are re-ordered. Returns the invalidated
    /// definitions, sorted.
    pub fn update(&mut self, id: DefId, state: &dyn ResolutionState) -> Vec<DefId> {
        let mut invalidated = BTreeSet::new();
        let mut queue = VecDeque::from([id]);
        while let Some(next) = queue.pop_front() {
            if !invalidated.insert(next) {
                continue;
            }
            queue.extend(self.graph.neighbors_directed(next, Direction::Incoming));
        }

        for def in &invalidated {
            state.set_stage(*def, ResolutionStage::Unresolved);
            let targets: Vec<DefId> = self.graph.neighbors(*def).collect();
            for target in targets {
                self.graph.remove_edge(*def, target);
            }
        }
        debug!(def = %id, count = invalidated.len(), "invalidated dependents");
        invalidated.into_iter().collect()
    }
}

impl DependencyListener for DependencyCollector {
    fn depends_on(&mut self, from: DefId, to: DefId) {
        if from != to {
            self.graph.add_edge(from, to, ());
        }
    }
}
