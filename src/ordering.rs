//! Decides in which order definitions are handed to the type checker.
//!
//! Dependencies are discovered lazily from concrete syntax and fed to the
//! [`Tarjan`] engine. Every closed component gets a verdict:
//!
//! - a single definition is a unit, possibly self-recursive;
//! - a cycle that goes through an instance is re-ordered with instance
//!   search edges ignored, after reporting any cycle among the instances
//!   themselves;
//! - a cycle that involves a class or a definition with `\use` helpers
//!   cannot be split and is reported;
//! - any other cycle is mutual recursion: its headers are ordered with
//!   bodies ignored, then the bodies are checked together.
//!
//! Re-ordering runs a fresh [`Ordering`] restricted to the members of the
//! component at a stricter [`Stage`], so nothing visited at a coarser stage
//! is skipped at the stricter one.


use crate::collect::{References, collect_definition, expression_references};
use crate::comparator::{PartialComparator, Trivial};
use crate::concrete::{DefId, Definition, Expr, Group};
use crate::config::OrderingConfig;
use crate::error::OrderingError;
use crate::listener::{
    CancellationIndicator, ConcreteProvider, DependencyListener, InstanceProvider, NeverCancel,
    OrderingListener, ResolutionState,
};
use crate::tarjan::{SccHandler, Tarjan};
use std::collections::HashSet;
use tracing::{debug, trace, warn};

/// Which references count as dependencies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Signature, body, and every instance visible in scope.
    Full,
    /// Signature and body.
    NoInstances,
    /// Signature only.
    HeadersOnly,
}

impl Stage {
    pub fn with_bodies(self) -> bool {
        self != Stage::HeadersOnly
    }

    pub fn with_instances(self) -> bool {
        self == Stage::Full
    }
}

static TRIVIAL: Trivial = Trivial;
static NEVER_CANCEL: NeverCancel = NeverCancel;

/// Read-only collaborators shared by an ordering and every ordering it
/// spawns.
#[derive(Clone, Copy)]
pub struct OrderingEnv<'a> {
    pub concrete: &'a dyn ConcreteProvider,
    pub instances: &'a dyn InstanceProvider,
    pub state: &'a dyn ResolutionState,
    pub comparator: &'a dyn PartialComparator<DefId>,
    pub cancel: &'a dyn CancellationIndicator,
    pub config: OrderingConfig,
}

impl<'a> OrderingEnv<'a> {
    pub fn new(
        concrete: &'a dyn ConcreteProvider,
        instances: &'a dyn InstanceProvider,
        state: &'a dyn ResolutionState,
    ) -> Self {
        OrderingEnv {
            concrete,
            instances,
            state,
            comparator: &TRIVIAL,
            cancel: &NEVER_CANCEL,
            config: OrderingConfig::default(),
        }
    }

    /// An environment backed by a single store, such as a
    /// [`crate::table::DefinitionTable`].
    pub fn from_table<T>(table: &'a T) -> Self
    where
        T: ConcreteProvider + InstanceProvider + ResolutionState,
    {
        Self::new(table, table, table)
    }

    pub fn with_comparator(mut self, comparator: &'a dyn PartialComparator<DefId>) -> Self {
        self.comparator = comparator;
        self
    }

    pub fn with_cancellation(mut self, cancel: &'a dyn CancellationIndicator) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_config(mut self, config: OrderingConfig) -> Self {
        self.config = config;
        self
    }
}

/// Follows `\use` helpers to the definition they belong to. Stops at the
/// first definition that is typechecked, unknown, or not redirectable.
pub fn canonicalize(
    concrete: &dyn ConcreteProvider,
    state: &dyn ResolutionState,
    mut id: DefId,
) -> DefId {
    loop {
        if state.is_typechecked(id) {
            return id;
        }
        let Some(parent) = concrete.get_concrete(id).and_then(Definition::use_redirect) else {
            return id;
        };
        id = parent;
    }
}

pub struct Ordering<'a> {
    tarjan: Tarjan<DefId>,
    scheduler: Scheduler<'a>,
}

impl<'a> Ordering<'a> {
    pub fn new(
        env: OrderingEnv<'a>,
        listener: &'a mut dyn OrderingListener,
        dependencies: &'a mut dyn DependencyListener,
    ) -> Self {
        Self::restricted(env, listener, dependencies, None, Stage::Full)
    }

    fn restricted(
        env: OrderingEnv<'a>,
        listener: &'a mut dyn OrderingListener,
        dependencies: &'a mut dyn DependencyListener,
        allowed: Option<HashSet<DefId>>,
        stage: Stage,
    ) -> Self {
        Ordering {
            tarjan: Tarjan::new(),
            scheduler: Scheduler {
                env,
                listener,
                dependencies,
                allowed,
                stage,
            },
        }
    }

    pub fn stage(&self) -> Stage {
        self.scheduler.stage
    }

    pub fn canonicalize(&self, id: DefId) -> DefId {
        self.scheduler.resolve(id)
    }

    /// Orders `id` and everything it depends on that is not checked yet.
    pub fn order(&mut self, id: DefId) -> Result<(), OrderingError> {
        if self.scheduler.env.cancel.is_canceled() {
            return Err(OrderingError::Canceled);
        }
        self.order_definition(id);
        Ok(())
    }

    pub fn order_modules(&mut self, groups: &[Group]) -> Result<(), OrderingError> {
        for group in groups {
            self.order_module(group)?;
        }
        Ok(())
    }

    pub fn order_module(&mut self, group: &Group) -> Result<(), OrderingError> {
        if let Some(id) = group.definition {
            if !self.scheduler.env.state.is_typechecked(id) {
                self.order(id)?;
            }
        }
        for subgroup in group.statics.iter().chain(&group.dynamics) {
            self.order_module(subgroup)?;
        }
        Ok(())
    }

    /// Orders every definition a standalone expression refers to.
    pub fn order_expression(&mut self, expr: &Expr) -> Result<(), OrderingError> {
        for id in expression_references(expr) {
            let id = self.scheduler.resolve(id);
            if !self.scheduler.env.state.is_typechecked(id) {
                self.order(id)?;
            }
        }
        Ok(())
    }

    fn order_definition(&mut self, id: DefId) {
        let id = self.scheduler.resolve(id);
        let env = self.scheduler.env;
        if env.state.is_typechecked(id) || env.concrete.get_concrete(id).is_none() {
            return;
        }
        trace!(def = %id, stage = ?self.scheduler.stage, "ordering");
        self.tarjan.order(id, &mut self.scheduler);
    }
}

struct Scheduler<'a> {
    env: OrderingEnv<'a>,
    listener: &'a mut dyn OrderingListener,
    dependencies: &'a mut dyn DependencyListener,
    /// Dependencies outside of this set are ignored.
    allowed: Option<HashSet<DefId>>,
    stage: Stage,
}

impl Scheduler<'_> {
    fn resolve(&self, id: DefId) -> DefId {
        let concrete = self.env.concrete;
        let typecheckable = concrete
            .get_concrete(id)
            .map(Definition::typecheckable)
            .unwrap_or(id);
        canonicalize(concrete, self.env.state, typecheckable)
    }

    fn is_instance(&self, id: DefId) -> bool {
        self.env
            .concrete
            .get_concrete(id)
            .is_some_and(Definition::is_instance)
    }

    fn references(&self, definition: &Definition) -> References {
        let concrete = self.env.concrete;
        let with_bodies = self.stage.with_bodies();

        let mut refs = References::new();
        collect_definition(definition, with_bodies, &mut refs);
        if let Some(class) = definition.enclosing_class {
            refs.add(class);
        }
        if let Some(parent) = definition.coclause_parent() {
            refs.add(parent);
        }

        // Used definitions, and whatever they refer to in turn.
        let mut used = definition.used_definitions.clone();
        let mut seen = HashSet::new();
        let mut next = 0;
        while next < used.len() {
            let id = used[next];
            next += 1;
            if !seen.insert(id) {
                continue;
            }
            refs.add(id);
            if let Some(aux) = concrete.get_concrete(id) {
                collect_definition(aux, with_bodies, &mut refs);
                used.extend(aux.used_definitions.iter().copied());
            }
        }

        if self.stage.with_instances() {
            for instance in self.env.instances.instances_for(definition.id) {
                refs.add(instance);
            }
        }
        refs
    }

    /// A fresh ordering over `members` only, at `stage`.
    fn narrowed(&mut self, members: &[DefId], stage: Stage) -> Ordering<'_> {
        Ordering::restricted(
            self.env,
            &mut *self.listener,
            &mut *self.dependencies,
            Some(members.iter().copied().collect()),
            stage,
        )
    }

    fn split_instances(&mut self, component: Vec<DefId>) {
        if self.stage >= Stage::NoInstances {
            debug!(members = ?component, "cycle through instances without instance search");
            self.listener.cycle_found(&component, false);
            return;
        }

        let instances: Vec<DefId> = component
            .iter()
            .copied()
            .filter(|id| self.is_instance(*id))
            .collect();
        let mut search = InstanceCycles {
            provider: self.env.instances,
            members: instances.iter().copied().collect(),
            listener: &mut *self.listener,
        };
        let mut tarjan = Tarjan::new();
        for instance in instances {
            tarjan.order(instance, &mut search);
        }

        debug!(members = ?component, "re-ordering cycle without instance search");
        let mut nested = self.narrowed(&component, Stage::NoInstances);
        for id in component {
            nested.order_definition(id);
        }
    }

    fn split_recursion(&mut self, component: Vec<DefId>) {
        for id in &component {
            self.env.state.set_recursive_siblings(*id, &component);
        }
        self.listener.pre_bodies_found(&component);

        debug!(members = ?component, "ordering headers of recursive group");
        {
            let mut headers = self.narrowed(&component, Stage::HeadersOnly);
            for id in &component {
                headers.order_definition(*id);
            }
        }

        let mut bodies = component;
        if !self.env.comparator.sort(&mut bodies) {
            if self.env.config.warn_on_inconsistent_order {
                warn!(members = ?bodies, "no consistent checking order for recursive group");
            } else {
                debug!(members = ?bodies, "no consistent checking order for recursive group");
            }
            self.listener.order_inconsistent(&bodies);
        }
        self.listener.bodies_found(&bodies);
    }
}

impl SccHandler<DefId> for Scheduler<'_> {
    fn for_dependencies(&mut self, node: &DefId, successors: &mut Vec<DefId>) -> bool {
        let id = *node;
        let concrete = self.env.concrete;
        let Some(definition) = concrete.get_concrete(id) else {
            return false;
        };

        let mut with_loops = false;
        let mut pushed = HashSet::new();
        for reference in self.references(definition) {
            let target = self.resolve(reference);
            if target != id || self.env.config.report_self_dependencies {
                self.dependencies.depends_on(id, target);
            }
            if let Some(allowed) = &self.allowed {
                if !allowed.contains(&target) {
                    continue;
                }
            }
            if target == id {
                // References that only reach `id` through redirection are
                // not recursion.
                if reference == id {
                    with_loops = true;
                }
                continue;
            }
            if self.env.state.is_typechecked(target)
                || concrete.get_concrete(target).is_none()
                || !pushed.insert(target)
            {
                continue;
            }
            trace!(from = %id, to = %target, stage = ?self.stage, "dependency");
            successors.push(target);
        }
        with_loops
    }

    fn scc_found(&mut self, component: Vec<DefId>, with_loops: bool) {
        if self.stage == Stage::HeadersOnly && component.len() > 1 {
            debug!(members = ?component, "cycle between headers");
            self.listener.cycle_found(&component, false);
            return;
        }

        match component.as_slice() {
            [] => return,
            [unit] => {
                if self.stage == Stage::HeadersOnly {
                    self.listener.header_found(*unit);
                } else {
                    self.listener.unit_found(*unit, with_loops);
                }
                return;
            }
            _ => {}
        }

        if component.iter().any(|id| self.is_instance(*id)) {
            self.split_instances(component);
            return;
        }

        let concrete = self.env.concrete;
        let unsplittable = component.iter().any(|id| {
            concrete
                .get_concrete(*id)
                .is_some_and(|def| def.is_class() || !def.used_definitions.is_empty())
        });
        if unsplittable {
            debug!(members = ?component, "cycle through a class or used definitions");
            self.listener.cycle_found(&component, false);
            return;
        }

        self.split_recursion(component);
    }
}

/// Finds cycles among instances that only exist through instance search.
struct InstanceCycles<'s> {
    provider: &'s dyn InstanceProvider,
    members: HashSet<DefId>,
    listener: &'s mut dyn OrderingListener,
}

impl SccHandler<DefId> for InstanceCycles<'_> {
    fn for_dependencies(&mut self, node: &DefId, successors: &mut Vec<DefId>) -> bool {
        for instance in self.provider.instances_for(*node) {
            if instance != *node
                && self.members.contains(&instance)
                && !successors.contains(&instance)
            {
                successors.push(instance);
            }
        }
        false
    }

    fn scc_found(&mut self, component: Vec<DefId>, _with_loops: bool) {
        if component.len() > 1 {
            debug!(members = ?component, "instance cycle");
            self.listener.cycle_found(&component, true);
        }
    }
}
