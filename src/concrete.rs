//! Concrete syntax of definitions, as far as ordering needs to see it.
//!
//! References are already resolved to [`DefId`]s; everything the scheduler
//! cares about is *which* definitions an expression mentions, so the tree
//! keeps only enough structure to walk it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct DefId(pub usize);

impl fmt::Display for DefId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SourceId(pub usize);

impl SourceId {
    pub const SYNTHETIC: SourceId = SourceId(0);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    pub source: SourceId,
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(source: SourceId, range: Range<usize>) -> Self {
        Span {
            source,
            start: range.start,
            end: range.end,
        }
    }

    pub fn synthetic() -> Self {
        Span::new(SourceId::SYNTHETIC, 0..0)
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Flavours of function-like definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FunctionKind {
    Func,
    Sfunc,
    Lemma,
    Axiom,
    Instance,
    Cons,
    /// `\use \level`
    Level,
    /// `\use \coerce`
    Coerce,
    FuncCoclause,
    ClassCoclause,
}

impl FunctionKind {
    /// `\use` helpers attach to a parent definition instead of standing alone.
    pub fn is_use(self) -> bool {
        matches!(
            self,
            FunctionKind::Level
                | FunctionKind::Coerce
                | FunctionKind::FuncCoclause
                | FunctionKind::ClassCoclause
        )
    }

    pub fn is_coclause(self) -> bool {
        matches!(self, FunctionKind::FuncCoclause | FunctionKind::ClassCoclause)
    }

    /// Whether ordering treats a definition of this kind as its use-parent.
    /// Class coclauses are checked on their own.
    pub fn is_redirectable(self) -> bool {
        self.is_use() && self != FunctionKind::ClassCoclause
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DefinitionKind {
    Function {
        kind: FunctionKind,
        use_parent: Option<DefId>,
    },
    Data {
        constructors: Vec<DefId>,
    },
    Class {
        fields: Vec<DefId>,
        super_classes: Vec<DefId>,
    },
    /// Checked together with its data type.
    Constructor {
        data: DefId,
    },
    /// Checked together with its class.
    ClassField {
        class: DefId,
    },
    /// A function generated from a `\cowith` clause implementing `implemented_field`.
    CoClauseFunction {
        implemented_field: DefId,
        kind: FunctionKind,
        use_parent: DefId,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Definition {
    pub id: DefId,
    pub name: String,
    pub kind: DefinitionKind,
    /// Parameter types followed by the result type, if any.
    pub signature: Vec<Expr>,
    pub body: Option<Body>,
    /// Auxiliary definitions declared with `\using`/`\use` that belong to this one.
    pub used_definitions: Vec<DefId>,
    pub enclosing_class: Option<DefId>,
    pub span: Span,
}

impl Definition {
    pub fn new(id: DefId, name: impl Into<String>, kind: DefinitionKind, span: Span) -> Self {
        Definition {
            id,
            name: name.into(),
            kind,
            signature: Vec::new(),
            body: None,
            used_definitions: Vec::new(),
            enclosing_class: None,
            span,
        }
    }

    pub fn is_instance(&self) -> bool {
        matches!(
            self.kind,
            DefinitionKind::Function {
                kind: FunctionKind::Instance,
                ..
            }
        )
    }

    pub fn is_class(&self) -> bool {
        matches!(self.kind, DefinitionKind::Class { .. })
    }

    /// The definition ordering should use in place of this one, if it is a
    /// redirectable `\use` helper.
    pub fn use_redirect(&self) -> Option<DefId> {
        match &self.kind {
            DefinitionKind::Function {
                kind,
                use_parent: Some(parent),
            } if kind.is_redirectable() => Some(*parent),
            DefinitionKind::CoClauseFunction {
                kind, use_parent, ..
            } if kind.is_redirectable() => Some(*use_parent),
            _ => None,
        }
    }

    /// The use-parent of a coclause function, regardless of redirection.
    pub fn coclause_parent(&self) -> Option<DefId> {
        match &self.kind {
            DefinitionKind::CoClauseFunction {
                kind, use_parent, ..
            } if kind.is_use() => Some(*use_parent),
            _ => None,
        }
    }

    /// The definition that is actually typechecked when this one is referenced.
    /// Constructors and fields are checked with their data type or class.
    pub fn typecheckable(&self) -> DefId {
        match &self.kind {
            DefinitionKind::Constructor { data } => *data,
            DefinitionKind::ClassField { class } => *class,
            _ => self.id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Term(Expr),
    Clauses(Vec<Clause>),
    CoClauses(Vec<CoClause>),
    Constructors(Vec<ConstructorClause>),
    Fields(Vec<FieldDecl>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub patterns: Vec<Pattern>,
    /// `None` for absurd clauses.
    pub rhs: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CoClause {
    pub field: DefId,
    pub implementation: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorClause {
    pub constructor: DefId,
    pub parameters: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub field: DefId,
    pub ty: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Pattern {
    Var(String),
    Constructor(DefId, Vec<Pattern>),
    Tuple(Vec<Pattern>),
    Absurd,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Option<String>,
    pub ty: Option<Expr>,
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub expr: Expr,
    pub explicit: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LetClause {
    pub name: String,
    pub params: Vec<Param>,
    pub result_type: Option<Expr>,
    pub term: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Reference(DefId),
    Local(String),
    App(Box<Expr>, Vec<Argument>),
    Lam(Vec<Param>, Box<Expr>),
    Pi(Vec<Param>, Box<Expr>),
    Sigma(Vec<Param>),
    Tuple(Vec<Expr>),
    Proj(Box<Expr>, usize),
    Let(Vec<LetClause>, Box<Expr>),
    Case {
        arguments: Vec<Expr>,
        result_type: Option<Box<Expr>>,
        clauses: Vec<Clause>,
    },
    New(Box<Expr>),
    ClassExt(DefId, Vec<CoClause>),
    Typed(Box<Expr>, Box<Expr>),
    Goal(Option<Box<Expr>>),
    Universe,
    Number(i64),
    Hole,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }

    pub fn reference(id: DefId, span: Span) -> Self {
        Expr::new(ExprKind::Reference(id), span)
    }

    /// Applies `head` to explicit arguments; a bare head when there are none.
    pub fn app(head: Expr, args: Vec<Expr>) -> Self {
        if args.is_empty() {
            return head;
        }
        let span = head.span;
        let args = args
            .into_iter()
            .map(|expr| Argument {
                expr,
                explicit: true,
            })
            .collect();
        Expr::new(ExprKind::App(Box::new(head), args), span)
    }
}

/// A node of the module tree. Statics live at the group's level; dynamics
/// are the members of a class.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Group {
    pub name: String,
    pub definition: Option<DefId>,
    pub statics: Vec<Group>,
    pub dynamics: Vec<Group>,
}

impl Group {
    pub fn module(name: impl Into<String>) -> Self {
        Group {
            name: name.into(),
            ..Group::default()
        }
    }

    pub fn leaf(name: impl Into<String>, definition: DefId) -> Self {
        Group {
            name: name.into(),
            definition: Some(definition),
            ..Group::default()
        }
    }

    /// Every definition in the tree, in declaration order.
    pub fn definitions(&self) -> Vec<DefId> {
        let mut result = Vec::new();
        self.collect_definitions(&mut result);
        result
    }

    fn collect_definitions(&self, result: &mut Vec<DefId>) {
        result.extend(self.definition);
        for group in self.statics.iter().chain(&self.dynamics) {
            group.collect_definitions(result);
        }
    }
}
