use crate::concrete::{DefId, Definition, Group};
use crate::error::{CycleError, OrderingError};
use crate::listener::{
    ConcreteProvider, DependencyListener, OrderingListener, ResolutionStage, ResolutionState,
};
use crate::ordering::{Ordering, OrderingEnv};
use tracing::{debug, info, warn};

/// The checking side of the frontend, called in the order the scheduler
/// decides on.
pub trait Typechecker {
    fn check_header(&mut self, def: &Definition);

    /// `recursive` is set when the definition refers to itself.
    fn check_unit(&mut self, def: &Definition, recursive: bool);

    /// Called before the headers of a recursive group are checked.
    fn prepare_bodies(&mut self, _defs: &[&Definition]) {}

    fn check_bodies(&mut self, defs: &[&Definition]);

    /// Called once every body of a recursive group is checked, e.g. to run
    /// the termination checker over the group.
    fn finish_group(&mut self, _defs: &[&Definition]) {}
}

/// Turns ordering events into calls to a [`Typechecker`] and records
/// progress in the resolution state.
pub struct TypecheckingListener<'a, C> {
    concrete: &'a dyn ConcreteProvider,
    state: &'a dyn ResolutionState,
    checker: C,
    errors: Vec<CycleError>,
}

impl<'a, C: Typechecker> TypecheckingListener<'a, C> {
    pub fn new(
        concrete: &'a dyn ConcreteProvider,
        state: &'a dyn ResolutionState,
        checker: C,
    ) -> Self {
        TypecheckingListener {
            concrete,
            state,
            checker,
            errors: Vec::new(),
        }
    }

    pub fn errors(&self) -> &[CycleError] {
        &self.errors
    }

    pub fn checker(&self) -> &C {
        &self.checker
    }

    pub fn into_parts(self) -> (C, Vec<CycleError>) {
        (self.checker, self.errors)
    }

    /// Definitions among `defs` that still need checking.
    fn pending(&self, defs: &[DefId]) -> Vec<&'a Definition> {
        let concrete = self.concrete;
        defs.iter()
            .filter(|id| !self.state.is_typechecked(**id))
            .filter_map(|id| concrete.get_concrete(*id))
            .collect()
    }
}

impl<C: Typechecker> OrderingListener for TypecheckingListener<'_, C> {
    fn unit_found(&mut self, def: DefId, with_loops: bool) {
        let Some(&definition) = self.pending(&[def]).first() else {
            return;
        };
        debug!(name = %definition.name, recursive = with_loops, "checking definition");
        self.checker.check_unit(definition, with_loops);
        self.state.set_stage(def, ResolutionStage::Typechecked);
    }

    fn cycle_found(&mut self, defs: &[DefId], instance_cycle: bool) {
        let error = CycleError::new(defs, instance_cycle);
        warn!(members = ?defs, "{}", error);
        self.errors.push(error);
        // Members of an instance cycle are ordered again without instances.
        if !instance_cycle {
            for def in defs {
                self.state.set_stage(*def, ResolutionStage::Typechecked);
            }
        }
    }

    fn pre_bodies_found(&mut self, defs: &[DefId]) {
        let pending = self.pending(defs);
        self.checker.prepare_bodies(&pending);
    }

    fn bodies_found(&mut self, defs: &[DefId]) {
        let pending = self.pending(defs);
        if pending.is_empty() {
            return;
        }
        debug!(members = ?defs, "checking bodies");
        self.checker.check_bodies(&pending);
        for def in &pending {
            self.state.set_stage(def.id, ResolutionStage::BodyChecked);
        }
        self.checker.finish_group(&pending);
        for def in &pending {
            self.state.set_stage(def.id, ResolutionStage::Typechecked);
        }
    }

    fn header_found(&mut self, def: DefId) {
        if self.state.stage(def) >= ResolutionStage::HeaderChecked {
            return;
        }
        let Some(definition) = self.concrete.get_concrete(def) else {
            return;
        };
        self.checker.check_header(definition);
        self.state.set_stage(def, ResolutionStage::HeaderChecked);
    }
}

/// Orders and checks every definition of `groups` that is not checked yet.
/// Returns the checker together with the cycles that were found.
pub fn typecheck<C: Typechecker>(
    env: OrderingEnv<'_>,
    groups: &[Group],
    checker: C,
    dependencies: &mut dyn DependencyListener,
) -> Result<(C, Vec<CycleError>), OrderingError> {
    let mut listener = TypecheckingListener::new(env.concrete, env.state, checker);
    {
        let mut ordering = Ordering::new(env, &mut listener, dependencies);
        ordering.order_modules(groups)?;
    }
    info!(
        modules = groups.len(),
        cycles = listener.errors().len(),
        "ordering finished"
    );
    Ok(listener.into_parts())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::SourceOrder;
    use crate::concrete::{Body, DefinitionKind, Expr, ExprKind, FunctionKind, SourceId, Span};
    use crate::error::CycleKind;
    use crate::listener::NoDependencies;
    use crate::table::{DefinitionTable, ModuleId};

    #[derive(Default)]
    struct Recorder {
        calls: Vec<String>,
    }

    impl Typechecker for Recorder {
        fn check_header(&mut self, def: &Definition) {
            self.calls.push(format!("header {}", def.name));
        }

        fn check_unit(&mut self, def: &Definition, recursive: bool) {
            let prefix = if recursive { "rec" } else { "unit" };
            self.calls.push(format!("{} {}", prefix, def.name));
        }

        fn check_bodies(&mut self, defs: &[&Definition]) {
            let names: Vec<&str> = defs.iter().map(|def| def.name.as_str()).collect();
            self.calls.push(format!("bodies {}", names.join(" ")));
        }

        fn finish_group(&mut self, defs: &[&Definition]) {
            self.calls.push(format!("finish {}", defs.len()));
        }
    }

    fn declare(table: &mut DefinitionTable, module: ModuleId, name: &str, kind: FunctionKind) -> DefId {
        let offset = table.len() * 10;
        table.declare(
            module,
            name,
            DefinitionKind::Function {
                kind,
                use_parent: None,
            },
            Span::new(SourceId(1), offset..offset + 1),
        )
    }

    fn set_body(table: &mut DefinitionTable, id: DefId, refs: &[DefId]) {
        let items = refs
            .iter()
            .map(|r| Expr::reference(*r, Span::synthetic()))
            .collect();
        table.get_mut(id).unwrap().body =
            Some(Body::Term(Expr::new(ExprKind::Tuple(items), Span::synthetic())));
    }

    fn check(table: &DefinitionTable) -> (Recorder, Vec<CycleError>) {
        let order = SourceOrder::new(table);
        let env = OrderingEnv::from_table(table).with_comparator(&order);
        typecheck(env, &table.groups(), Recorder::default(), &mut NoDependencies).unwrap()
    }

    #[test]
    fn test_recursive_group_is_checked_in_stages() {
        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let base = declare(&mut table, main, "base", FunctionKind::Func);
        let even = declare(&mut table, main, "even", FunctionKind::Func);
        let odd = declare(&mut table, main, "odd", FunctionKind::Func);
        set_body(&mut table, even, &[odd, base]);
        set_body(&mut table, odd, &[even]);

        let (recorder, errors) = check(&table);
        assert!(errors.is_empty());
        assert_eq!(
            recorder.calls,
            vec![
                "unit base",
                "header odd",
                "header even",
                "bodies even odd",
                "finish 2"
            ]
        );
        for id in [base, even, odd] {
            assert_eq!(table.stage(id), ResolutionStage::Typechecked);
        }
        assert_eq!(table.recursive_siblings(even), vec![odd, even]);

        // Everything is checked, so a second run does nothing.
        let (recorder, errors) = check(&table);
        assert!(recorder.calls.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_self_recursive_unit() {
        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let f = declare(&mut table, main, "f", FunctionKind::Func);
        set_body(&mut table, f, &[f]);

        let (recorder, _) = check(&table);
        assert_eq!(recorder.calls, vec!["rec f"]);
    }

    #[test]
    fn test_hard_cycle_is_reported_once() {
        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let f = declare(&mut table, main, "f", FunctionKind::Func);
        let g = declare(&mut table, main, "g", FunctionKind::Func);
        let user = declare(&mut table, main, "user", FunctionKind::Func);
        table.get_mut(f).unwrap().signature = vec![Expr::reference(g, Span::synthetic())];
        table.get_mut(g).unwrap().signature = vec![Expr::reference(f, Span::synthetic())];
        set_body(&mut table, user, &[f]);

        let (recorder, errors) = check(&table);
        assert_eq!(errors, vec![CycleError::new(&[f, g], false)]);
        assert_eq!(errors[0].to_string(), "definition cycle between 2 definitions");
        // The broken group is not checked further, but its users are.
        assert_eq!(recorder.calls, vec!["unit user"]);
        assert!(table.is_typechecked(f));
        assert!(table.is_typechecked(g));

        let (_, errors) = check(&table);
        assert!(errors.is_empty());
    }

    #[test]
    fn test_instance_cycle_members_are_still_checked() {
        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let i = declare(&mut table, main, "i", FunctionKind::Instance);
        let j = declare(&mut table, main, "j", FunctionKind::Instance);
        table.set_visible_instances(i, vec![j]);
        table.set_visible_instances(j, vec![i]);

        let (recorder, errors) = check(&table);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, CycleKind::Instances);
        assert_eq!(errors[0].members, vec![i, j]);
        assert_eq!(recorder.calls, vec!["unit j", "unit i"]);
    }
}
