use crate::concrete::{DefId, Definition, DefinitionKind, Group, Span};
use crate::listener::{ConcreteProvider, InstanceProvider, ResolutionStage, ResolutionState};
use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleId(pub usize);

#[derive(Debug, Clone)]
struct Module {
    name: String,
    imports: Vec<ModuleId>,
    /// In declaration order.
    definitions: Vec<DefId>,
}

/// Owns every declared definition together with the state the checker
/// records about it.
///
/// Checking state lives behind `RefCell`s so the table can be shared as
/// both the concrete provider and the resolution state of an ordering.
#[derive(Debug, Default)]
pub struct DefinitionTable {
    definitions: Vec<Definition>,
    owners: Vec<ModuleId>,
    modules: Vec<Module>,
    visible_instances: HashMap<DefId, Vec<DefId>>,
    stages: RefCell<HashMap<DefId, ResolutionStage>>,
    siblings: RefCell<HashMap<DefId, Vec<DefId>>>,
}

impl DefinitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_module(&mut self, name: impl Into<String>) -> ModuleId {
        let id = ModuleId(self.modules.len());
        self.modules.push(Module {
            name: name.into(),
            imports: Vec::new(),
            definitions: Vec::new(),
        });
        id
    }

    pub fn add_import(&mut self, module: ModuleId, imported: ModuleId) {
        let imports = &mut self.modules[module.0].imports;
        if module != imported && !imports.contains(&imported) {
            imports.push(imported);
        }
    }

    pub fn module_id(&self, name: &str) -> Option<ModuleId> {
        self.modules
            .iter()
            .position(|module| module.name == name)
            .map(ModuleId)
    }

    pub fn module_name(&self, module: ModuleId) -> &str {
        &self.modules[module.0].name
    }

    pub fn modules(&self) -> impl Iterator<Item = ModuleId> + '_ {
        (0..self.modules.len()).map(ModuleId)
    }

    pub fn module_of(&self, id: DefId) -> Option<ModuleId> {
        self.owners.get(id.0).copied()
    }

    pub fn declare(
        &mut self,
        module: ModuleId,
        name: impl Into<String>,
        kind: DefinitionKind,
        span: Span,
    ) -> DefId {
        let id = DefId(self.definitions.len());
        self.definitions.push(Definition::new(id, name, kind, span));
        self.owners.push(module);
        self.modules[module.0].definitions.push(id);
        id
    }

    pub fn get(&self, id: DefId) -> Option<&Definition> {
        self.definitions.get(id.0)
    }

    pub fn get_mut(&mut self, id: DefId) -> Option<&mut Definition> {
        self.definitions.get_mut(id.0)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = DefId> + '_ {
        (0..self.definitions.len()).map(DefId)
    }

    /// Finds `name` in `module`, then in its imports in import order.
    pub fn lookup(&self, module: ModuleId, name: &str) -> Option<DefId> {
        let find = |module: ModuleId| {
            self.modules[module.0]
                .definitions
                .iter()
                .copied()
                .find(|id| self.definitions[id.0].name == name)
        };
        find(module).or_else(|| self.modules[module.0].imports.iter().find_map(|m| find(*m)))
    }

    /// The declared name of a definition.
    /// Returns a fallback string if not found.
    pub fn name(&self, id: DefId) -> String {
        self.get(id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| format!("<def:{}>", id.0))
    }

    pub fn qualified_name(&self, id: DefId) -> String {
        match self.module_of(id) {
            Some(module) => format!("{}.{}", self.module_name(module), self.name(id)),
            None => self.name(id),
        }
    }

    /// Replaces the default instance scope of `id`.
    pub fn set_visible_instances(&mut self, id: DefId, instances: Vec<DefId>) {
        self.visible_instances.insert(id, instances);
    }

    pub fn recursive_siblings(&self, id: DefId) -> Vec<DefId> {
        self.siblings.borrow().get(&id).cloned().unwrap_or_default()
    }

    fn module_instances(&self, module: ModuleId) -> impl Iterator<Item = DefId> + '_ {
        self.modules[module.0]
            .definitions
            .iter()
            .copied()
            .filter(|id| self.definitions[id.0].is_instance())
    }

    /// The module as a group tree. Class members become the dynamics of
    /// their class; constructors and fields are left out, since they are
    /// checked with their owner.
    pub fn module_group(&self, module: ModuleId) -> Group {
        let mut group = Group::module(self.module_name(module));
        let definitions = &self.modules[module.0].definitions;
        for id in definitions {
            let def = &self.definitions[id.0];
            let nested = matches!(
                def.kind,
                DefinitionKind::Constructor { .. } | DefinitionKind::ClassField { .. }
            ) || def
                .enclosing_class
                .is_some_and(|class| definitions.contains(&class));
            if nested {
                continue;
            }
            let mut leaf = Group::leaf(def.name.clone(), *id);
            if def.is_class() {
                leaf.dynamics = definitions
                    .iter()
                    .filter(|member| self.definitions[member.0].enclosing_class == Some(*id))
                    .map(|member| Group::leaf(self.definitions[member.0].name.clone(), *member))
                    .collect();
            }
            group.statics.push(leaf);
        }
        group
    }

    pub fn groups(&self) -> Vec<Group> {
        self.modules().map(|module| self.module_group(module)).collect()
    }
}

impl ConcreteProvider for DefinitionTable {
    fn get_concrete(&self, id: DefId) -> Option<&Definition> {
        self.get(id)
    }
}

impl InstanceProvider for DefinitionTable {
    /// Instances declared earlier in the same module, then every instance
    /// of a directly imported module, unless overridden.
    fn instances_for(&self, id: DefId) -> Vec<DefId> {
        if let Some(instances) = self.visible_instances.get(&id) {
            return instances.clone();
        }
        let Some(module) = self.module_of(id) else {
            return Vec::new();
        };
        let mut result: Vec<DefId> = self
            .module_instances(module)
            .filter(|instance| *instance < id)
            .collect();
        for imported in &self.modules[module.0].imports {
            result.extend(self.module_instances(*imported));
        }
        result
    }
}

impl ResolutionState for DefinitionTable {
    fn stage(&self, id: DefId) -> ResolutionStage {
        self.stages.borrow().get(&id).copied().unwrap_or_default()
    }

    fn set_stage(&self, id: DefId, stage: ResolutionStage) {
        self.stages.borrow_mut().insert(id, stage);
    }

    fn set_recursive_siblings(&self, id: DefId, siblings: &[DefId]) {
        self.siblings.borrow_mut().insert(id, siblings.to_vec());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concrete::FunctionKind;

    fn function(kind: FunctionKind) -> DefinitionKind {
        DefinitionKind::Function {
            kind,
            use_parent: None,
        }
    }

    #[test]
    fn test_lookup_prefers_own_module() {
        let mut table = DefinitionTable::new();
        let base = table.add_module("Base");
        let main = table.add_module("Main");
        table.add_import(main, base);

        let base_f = table.declare(base, "f", function(FunctionKind::Func), Span::synthetic());
        let base_g = table.declare(base, "g", function(FunctionKind::Func), Span::synthetic());
        let main_f = table.declare(main, "f", function(FunctionKind::Func), Span::synthetic());

        assert_eq!(table.lookup(main, "f"), Some(main_f));
        assert_eq!(table.lookup(main, "g"), Some(base_g));
        assert_eq!(table.lookup(base, "f"), Some(base_f));
        assert_eq!(table.lookup(base, "h"), None);
        assert_eq!(table.qualified_name(base_g), "Base.g");
        assert_eq!(table.name(DefId(42)), "<def:42>");
    }

    #[test]
    fn test_instance_scope() {
        let mut table = DefinitionTable::new();
        let base = table.add_module("Base");
        let main = table.add_module("Main");
        table.add_import(main, base);

        let imported = table.declare(base, "i", function(FunctionKind::Instance), Span::synthetic());
        let first = table.declare(main, "a", function(FunctionKind::Instance), Span::synthetic());
        let user = table.declare(main, "f", function(FunctionKind::Func), Span::synthetic());
        let second = table.declare(main, "b", function(FunctionKind::Instance), Span::synthetic());

        assert_eq!(table.instances_for(user), vec![first, imported]);
        assert_eq!(table.instances_for(first), vec![imported]);
        assert_eq!(table.instances_for(second), vec![first, imported]);
        assert!(table.instances_for(imported).is_empty());

        table.set_visible_instances(first, vec![second]);
        assert_eq!(table.instances_for(first), vec![second]);
    }

    #[test]
    fn test_module_group_nests_class_members() {
        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let class = table.declare(
            main,
            "C",
            DefinitionKind::Class {
                fields: vec![],
                super_classes: vec![],
            },
            Span::synthetic(),
        );
        let field = table.declare(main, "x", DefinitionKind::ClassField { class }, Span::synthetic());
        if let Some(DefinitionKind::Class { fields, .. }) = table.get_mut(class).map(|d| &mut d.kind) {
            fields.push(field);
        }
        let member = table.declare(main, "m", function(FunctionKind::Func), Span::synthetic());
        table.get_mut(member).unwrap().enclosing_class = Some(class);
        let other = table.declare(main, "g", function(FunctionKind::Func), Span::synthetic());

        let group = table.module_group(main);
        assert_eq!(group.name, "Main");
        assert_eq!(group.statics.len(), 2);
        assert_eq!(group.statics[0].definition, Some(class));
        assert_eq!(group.statics[0].dynamics, vec![Group::leaf("m", member)]);
        assert_eq!(group.statics[1], Group::leaf("g", other));
        assert_eq!(group.definitions(), vec![class, member, other]);
    }

    #[test]
    fn test_resolution_state() {
        let mut table = DefinitionTable::new();
        let main = table.add_module("Main");
        let f = table.declare(main, "f", function(FunctionKind::Func), Span::synthetic());
        let g = table.declare(main, "g", function(FunctionKind::Func), Span::synthetic());

        assert_eq!(table.stage(f), ResolutionStage::Unresolved);
        table.set_stage(f, ResolutionStage::HeaderChecked);
        assert!(!table.is_typechecked(f));
        table.set_stage(f, ResolutionStage::Typechecked);
        assert!(table.is_typechecked(f));

        table.set_recursive_siblings(g, &[f, g]);
        assert_eq!(table.recursive_siblings(g), vec![f, g]);
        assert!(table.recursive_siblings(f).is_empty());
    }
}
