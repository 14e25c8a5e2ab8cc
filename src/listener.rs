//! Interfaces between the scheduler and the rest of the frontend.

use crate::concrete::{DefId, Definition};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

/// Resolves a reference to its declaration.
pub trait ConcreteProvider {
    fn get_concrete(&self, id: DefId) -> Option<&Definition>;
}

/// Global instances that automatic instance search may pick up while
/// checking a definition.
pub trait InstanceProvider {
    fn instances_for(&self, id: DefId) -> Vec<DefId>;
}

/// Observes every dependency edge the scheduler discovers, including the
/// ones it goes on to ignore.
pub trait DependencyListener {
    fn depends_on(&mut self, from: DefId, to: DefId);
}

/// Receives the scheduler's decisions. This is the only hand-off to the
/// type checker.
pub trait OrderingListener {
    /// A definition outside of any cycle. `with_loops` means it refers to
    /// itself directly.
    fn unit_found(&mut self, def: DefId, with_loops: bool);

    /// A cycle that cannot be split. `instance_cycle` marks cycles that only
    /// exist through instance search.
    fn cycle_found(&mut self, defs: &[DefId], instance_cycle: bool);

    /// Mutually recursive definitions whose headers are about to be reported.
    fn pre_bodies_found(&mut self, defs: &[DefId]);

    /// The bodies of a recursive group, in checking order.
    fn bodies_found(&mut self, defs: &[DefId]);

    fn header_found(&mut self, def: DefId);

    /// The partial order could not fully order a recursive group; the
    /// following `bodies_found` uses a best-effort order.
    fn order_inconsistent(&mut self, _defs: &[DefId]) {}
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize,
)]
pub enum ResolutionStage {
    #[default]
    Unresolved,
    HeaderChecked,
    BodyChecked,
    Typechecked,
}

/// Per-definition checking state, owned outside the scheduler.
pub trait ResolutionState {
    fn stage(&self, id: DefId) -> ResolutionStage;

    fn set_stage(&self, id: DefId, stage: ResolutionStage);

    /// Records the recursive group `id` is checked with, for the
    /// termination checker.
    fn set_recursive_siblings(&self, id: DefId, siblings: &[DefId]);

    fn is_typechecked(&self, id: DefId) -> bool {
        self.stage(id) == ResolutionStage::Typechecked
    }
}

pub trait CancellationIndicator {
    fn is_canceled(&self) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancel;

impl CancellationIndicator for NeverCancel {
    fn is_canceled(&self) -> bool {
        false
    }
}

#[derive(Debug, Default)]
pub struct CancellationFlag(AtomicBool);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, AtomicOrdering::Relaxed);
    }

    pub fn reset(&self) {
        self.0.store(false, AtomicOrdering::Relaxed);
    }
}

impl CancellationIndicator for CancellationFlag {
    fn is_canceled(&self) -> bool {
        self.0.load(AtomicOrdering::Relaxed)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDependencies;

impl DependencyListener for NoDependencies {
    fn depends_on(&mut self, _from: DefId, _to: DefId) {}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum OrderEvent {
    Unit { def: DefId, with_loops: bool },
    Cycle { defs: Vec<DefId>, instance_cycle: bool },
    PreBodies(Vec<DefId>),
    Bodies(Vec<DefId>),
    Header(DefId),
    Inconsistent(Vec<DefId>),
}

/// Remembers every event in the order it was received.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    pub events: Vec<OrderEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Definitions in the order they became fully checked: units and
    /// bodies. Headers and cycles are left out.
    pub fn checked(&self) -> Vec<DefId> {
        let mut result = Vec::new();
        for event in &self.events {
            match event {
                OrderEvent::Unit { def, .. } => result.push(*def),
                OrderEvent::Bodies(defs) => result.extend(defs),
                _ => {}
            }
        }
        result
    }

    pub fn cycles(&self) -> Vec<(Vec<DefId>, bool)> {
        self.events
            .iter()
            .filter_map(|event| match event {
                OrderEvent::Cycle {
                    defs,
                    instance_cycle,
                } => Some((defs.clone(), *instance_cycle)),
                _ => None,
            })
            .collect()
    }
}

impl OrderingListener for EventLog {
    fn unit_found(&mut self, def: DefId, with_loops: bool) {
        self.events.push(OrderEvent::Unit { def, with_loops });
    }

    fn cycle_found(&mut self, defs: &[DefId], instance_cycle: bool) {
        self.events.push(OrderEvent::Cycle {
            defs: defs.to_vec(),
            instance_cycle,
        });
    }

    fn pre_bodies_found(&mut self, defs: &[DefId]) {
        self.events.push(OrderEvent::PreBodies(defs.to_vec()));
    }

    fn bodies_found(&mut self, defs: &[DefId]) {
        self.events.push(OrderEvent::Bodies(defs.to_vec()));
    }

    fn header_found(&mut self, def: DefId) {
        self.events.push(OrderEvent::Header(def));
    }

    fn order_inconsistent(&mut self, defs: &[DefId]) {
        self.events.push(OrderEvent::Inconsistent(defs.to_vec()));
    }
}
