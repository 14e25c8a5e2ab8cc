//! Outlines describe modules and the dependency skeleton of their
//! definitions in TOML, without any surface syntax:
//!
//! ```toml
//! [ordering]
//! report_self_dependencies = false
//!
//! [[module]]
//! name = "Main"
//! imports = ["Prelude"]
//!
//! [[module.definition]]
//! name = "even"
//! signature = ["Nat", "Bool"]
//! body = ["odd"]
//! ```
//!
//! Names are resolved in the declaring module, then in its imports.
//! `Module.name` refers to a definition of a specific module.

use crate::collect::{References, collect_definition};
use crate::concrete::{
    Body, ConstructorClause, DefId, DefinitionKind, Expr, ExprKind, FieldDecl, FunctionKind,
    Group, SourceId, Span,
};
use crate::config::OrderingConfig;
use crate::table::{DefinitionTable, ModuleId};
use serde::Deserialize;
use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use thiserror::Error;
use toml::Spanned;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutlineKind {
    #[default]
    Func,
    Sfunc,
    Lemma,
    Axiom,
    Instance,
    Cons,
    Level,
    Coerce,
    FuncCoclause,
    ClassCoclause,
    Data,
    Class,
    Constructor,
    Field,
}

impl OutlineKind {
    fn function_kind(self) -> Option<FunctionKind> {
        Some(match self {
            OutlineKind::Func => FunctionKind::Func,
            OutlineKind::Sfunc => FunctionKind::Sfunc,
            OutlineKind::Lemma => FunctionKind::Lemma,
            OutlineKind::Axiom => FunctionKind::Axiom,
            OutlineKind::Instance => FunctionKind::Instance,
            OutlineKind::Cons => FunctionKind::Cons,
            OutlineKind::Level => FunctionKind::Level,
            OutlineKind::Coerce => FunctionKind::Coerce,
            OutlineKind::FuncCoclause => FunctionKind::FuncCoclause,
            OutlineKind::ClassCoclause => FunctionKind::ClassCoclause,
            OutlineKind::Data
            | OutlineKind::Class
            | OutlineKind::Constructor
            | OutlineKind::Field => return None,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawOutline {
    #[serde(default)]
    ordering: OrderingConfig,
    #[serde(default, rename = "module")]
    modules: Vec<RawModule>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawModule {
    name: Spanned<String>,
    #[serde(default)]
    imports: Vec<String>,
    #[serde(default, rename = "definition")]
    definitions: Vec<RawDefinition>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefinition {
    name: Spanned<String>,
    #[serde(default)]
    kind: OutlineKind,
    /// One parameter per entry.
    #[serde(default)]
    signature: Vec<String>,
    body: Option<Vec<String>>,
    #[serde(default)]
    uses: Vec<String>,
    /// Use-parent, data type of a constructor, or class of a field.
    parent: Option<String>,
    /// Enclosing class of a dynamic member.
    class: Option<String>,
    /// Field implemented by a coclause function.
    field: Option<String>,
    #[serde(default)]
    extends: Vec<String>,
    /// Replaces the instances visible to this definition.
    instances: Option<Vec<String>>,
}

#[derive(Debug, Error)]
pub enum OutlineError {
    #[error("failed to read outline: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse outline: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("outline not found at {0}")]
    NotFound(PathBuf),

    #[error("module `{name}` is declared more than once")]
    DuplicateModule { name: String, span: Range<usize> },

    #[error("module `{module}` imports unknown module `{import}`")]
    UnknownModule { module: String, import: String },

    #[error("`{name}` is declared more than once in module `{module}`")]
    DuplicateDefinition {
        module: String,
        name: String,
        span: Range<usize>,
    },

    #[error("`{name}` is not defined in module `{module}`")]
    UnresolvedName {
        module: String,
        name: String,
        span: Range<usize>,
    },

    #[error("`{name}` needs a `{key}` entry")]
    MissingKey {
        name: String,
        key: &'static str,
        span: Range<usize>,
    },

    #[error("`{name}` cannot have a body; it is built from its constructors or fields")]
    UnexpectedBody { name: String, span: Range<usize> },
}

/// Definitions loaded from an outline.
#[derive(Debug)]
pub struct Outline {
    pub table: DefinitionTable,
    pub config: OrderingConfig,
    pub source: SourceId,
}

impl Outline {
    /// Load and parse an outline from the given path.
    pub fn load(path: &Path, source: SourceId) -> Result<Self, OutlineError> {
        if !path.exists() {
            return Err(OutlineError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, source)
    }

    /// Spans of the resulting definitions point at their `name` entries in
    /// `content`.
    pub fn parse(content: &str, source: SourceId) -> Result<Self, OutlineError> {
        let raw: RawOutline = toml::from_str(content)?;
        let table = build(raw.modules, source)?;
        debug!(
            definitions = table.len(),
            modules = table.modules().count(),
            "loaded outline"
        );
        Ok(Outline {
            table,
            config: raw.ordering,
            source,
        })
    }

    pub fn groups(&self) -> Vec<Group> {
        self.table.groups()
    }

    /// Finds a definition by `Module.name`.
    pub fn lookup(&self, path: &str) -> Option<DefId> {
        let (module, name) = path.rsplit_once('.')?;
        self.table.lookup(self.table.module_id(module)?, name)
    }
}

fn resolve(table: &DefinitionTable, module: ModuleId, name: &str) -> Option<DefId> {
    if let Some((qualifier, short)) = name.rsplit_once('.') {
        if let Some(target) = table.module_id(qualifier) {
            return table.lookup(target, short);
        }
    }
    table.lookup(module, name)
}

fn references(ids: &[DefId], span: Span) -> Expr {
    let items = ids.iter().map(|id| Expr::reference(*id, span)).collect();
    Expr::new(ExprKind::Tuple(items), span)
}

struct Declared {
    module: ModuleId,
    id: DefId,
    raw: RawDefinition,
}

fn build(modules: Vec<RawModule>, source: SourceId) -> Result<DefinitionTable, OutlineError> {
    let mut table = DefinitionTable::new();
    let mut declared = Vec::new();
    let mut imports = Vec::new();

    for module in modules {
        let span = module.name.span();
        let name = module.name.into_inner();
        if table.module_id(&name).is_some() {
            return Err(OutlineError::DuplicateModule { name, span });
        }
        let id = table.add_module(name.clone());
        imports.push((id, module.imports));

        let mut seen = HashSet::new();
        for raw in module.definitions {
            let span = raw.name.span();
            if !seen.insert(raw.name.get_ref().clone()) {
                return Err(OutlineError::DuplicateDefinition {
                    module: name,
                    name: raw.name.into_inner(),
                    span,
                });
            }
            // The real kind needs names that may not be declared yet.
            let placeholder = DefinitionKind::Data {
                constructors: Vec::new(),
            };
            let def = table.declare(
                id,
                raw.name.get_ref().clone(),
                placeholder,
                Span::new(source, span),
            );
            declared.push(Declared {
                module: id,
                id: def,
                raw,
            });
        }
    }

    for (module, names) in imports {
        for name in names {
            let Some(imported) = table.module_id(&name) else {
                return Err(OutlineError::UnknownModule {
                    module: table.module_name(module).to_string(),
                    import: name,
                });
            };
            table.add_import(module, imported);
        }
    }

    for entry in &declared {
        fill(&mut table, entry)?;
    }
    attach_members(&mut table, &declared);
    Ok(table)
}

fn fill(table: &mut DefinitionTable, entry: &Declared) -> Result<(), OutlineError> {
    let raw = &entry.raw;
    let name = raw.name.get_ref();
    let span = raw.name.span();
    let lookup = |target: &str| {
        resolve(table, entry.module, target).ok_or_else(|| OutlineError::UnresolvedName {
            module: table.module_name(entry.module).to_string(),
            name: target.to_string(),
            span: span.clone(),
        })
    };
    let lookup_all = |targets: &[String]| {
        targets
            .iter()
            .map(|target| lookup(target))
            .collect::<Result<Vec<_>, _>>()
    };
    let required = |value: &Option<String>, key: &'static str| match value {
        Some(target) => lookup(target),
        None => Err(OutlineError::MissingKey {
            name: name.clone(),
            key,
            span: span.clone(),
        }),
    };

    let kind = match raw.kind {
        OutlineKind::Data => DefinitionKind::Data {
            constructors: Vec::new(),
        },
        OutlineKind::Class => DefinitionKind::Class {
            fields: Vec::new(),
            super_classes: lookup_all(&raw.extends)?,
        },
        OutlineKind::Constructor => DefinitionKind::Constructor {
            data: required(&raw.parent, "parent")?,
        },
        OutlineKind::Field => DefinitionKind::ClassField {
            class: required(&raw.parent, "parent")?,
        },
        OutlineKind::FuncCoclause | OutlineKind::ClassCoclause => {
            DefinitionKind::CoClauseFunction {
                implemented_field: required(&raw.field, "field")?,
                kind: raw
                    .kind
                    .function_kind()
                    .unwrap_or(FunctionKind::FuncCoclause),
                use_parent: required(&raw.parent, "parent")?,
            }
        }
        other => DefinitionKind::Function {
            kind: other.function_kind().unwrap_or(FunctionKind::Func),
            use_parent: raw.parent.as_deref().map(lookup).transpose()?,
        },
    };
    if matches!(raw.kind, OutlineKind::Data | OutlineKind::Class) && raw.body.is_some() {
        return Err(OutlineError::UnexpectedBody {
            name: name.clone(),
            span,
        });
    }

    let expr_span = table
        .get(entry.id)
        .map(|def| def.span)
        .unwrap_or_else(Span::synthetic);
    let mut signature: Vec<Expr> = lookup_all(&raw.signature)?
        .into_iter()
        .map(|id| Expr::reference(id, expr_span))
        .collect();
    if let DefinitionKind::Class { super_classes, .. } = &kind {
        signature.extend(super_classes.iter().map(|id| Expr::reference(*id, expr_span)));
    }
    let body = match &raw.body {
        Some(targets) => Some(Body::Term(references(&lookup_all(targets)?, expr_span))),
        None => None,
    };
    let used_definitions = lookup_all(&raw.uses)?;
    let enclosing_class = raw.class.as_deref().map(lookup).transpose()?;
    let instances = raw.instances.as_deref().map(lookup_all).transpose()?;

    if let Some(instances) = instances {
        table.set_visible_instances(entry.id, instances);
    }
    if let Some(def) = table.get_mut(entry.id) {
        def.kind = kind;
        def.signature = signature;
        def.body = body;
        def.used_definitions = used_definitions;
        def.enclosing_class = enclosing_class;
    }
    Ok(())
}

/// Builds data and class bodies from their constructors and fields.
fn attach_members(table: &mut DefinitionTable, declared: &[Declared]) {
    for entry in declared {
        let Some(member) = table.get(entry.id) else {
            continue;
        };
        let owner = match member.kind {
            DefinitionKind::Constructor { data } => data,
            DefinitionKind::ClassField { class } => class,
            _ => continue,
        };
        let span = member.span;
        let mut parameters = References::new();
        collect_definition(member, false, &mut parameters);
        let parameters = parameters.into_vec();

        let Some(owner_def) = table.get_mut(owner) else {
            continue;
        };
        match (&mut owner_def.kind, &mut owner_def.body) {
            (DefinitionKind::Data { constructors }, body) => {
                constructors.push(entry.id);
                let clause = ConstructorClause {
                    constructor: entry.id,
                    parameters: parameters
                        .iter()
                        .map(|id| Expr::reference(*id, span))
                        .collect(),
                };
                match body {
                    Some(Body::Constructors(clauses)) => clauses.push(clause),
                    _ => *body = Some(Body::Constructors(vec![clause])),
                }
            }
            (DefinitionKind::Class { fields, .. }, body) => {
                fields.push(entry.id);
                let field = FieldDecl {
                    field: entry.id,
                    ty: references(&parameters, span),
                };
                match body {
                    Some(Body::Fields(decls)) => decls.push(field),
                    _ => *body = Some(Body::Fields(vec![field])),
                }
            }
            _ => {}
        }
    }
}
