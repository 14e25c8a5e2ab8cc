use crate::concrete::{
    Argument, Body, Clause, CoClause, DefId, Definition, Expr, ExprKind, LetClause, Param,
    Pattern,
};
use std::collections::HashSet;

/// Definitions referenced by a piece of syntax, deduplicated, in the order
/// they were first seen.
#[derive(Debug, Clone, Default)]
pub struct References {
    order: Vec<DefId>,
    seen: HashSet<DefId>,
}

impl References {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: DefId) {
        if self.seen.insert(id) {
            self.order.push(id);
        }
    }

    pub fn contains(&self, id: DefId) -> bool {
        self.seen.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DefId> + '_ {
        self.order.iter().copied()
    }

    pub fn into_vec(self) -> Vec<DefId> {
        self.order
    }
}

impl IntoIterator for References {
    type Item = DefId;
    type IntoIter = std::vec::IntoIter<DefId>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.into_iter()
    }
}

/// Every definition referenced by a standalone expression.
pub fn expression_references(expr: &Expr) -> References {
    let mut refs = References::new();
    collect_expr(expr, &mut refs);
    refs
}

/// References from a definition's signature and, if `with_body`, its body.
/// Used definitions are not followed here.
pub fn collect_definition(definition: &Definition, with_body: bool, refs: &mut References) {
    for expr in &definition.signature {
        collect_expr(expr, refs);
    }
    if with_body {
        if let Some(body) = &definition.body {
            collect_body(body, refs);
        }
    }
}

pub fn collect_body(body: &Body, refs: &mut References) {
    match body {
        Body::Term(expr) => collect_expr(expr, refs),
        Body::Clauses(clauses) => clauses.iter().for_each(|c| collect_clause(c, refs)),
        Body::CoClauses(coclauses) => coclauses.iter().for_each(|c| collect_coclause(c, refs)),
        Body::Constructors(constructors) => {
            for constructor in constructors {
                for param in &constructor.parameters {
                    collect_expr(param, refs);
                }
            }
        }
        Body::Fields(fields) => fields.iter().for_each(|f| collect_expr(&f.ty, refs)),
    }
}

fn collect_expr(expr: &Expr, refs: &mut References) {
    match &expr.kind {
        ExprKind::Reference(id) => refs.add(*id),
        ExprKind::App(head, args) => {
            collect_expr(head, refs);
            for Argument { expr, .. } in args {
                collect_expr(expr, refs);
            }
        }
        ExprKind::Lam(params, body) | ExprKind::Pi(params, body) => {
            collect_params(params, refs);
            collect_expr(body, refs);
        }
        ExprKind::Sigma(params) => collect_params(params, refs),
        ExprKind::Tuple(fields) => fields.iter().for_each(|e| collect_expr(e, refs)),
        ExprKind::Proj(expr, _) | ExprKind::New(expr) => collect_expr(expr, refs),
        ExprKind::Let(clauses, body) => {
            for LetClause {
                params,
                result_type,
                term,
                ..
            } in clauses
            {
                collect_params(params, refs);
                if let Some(ty) = result_type {
                    collect_expr(ty, refs);
                }
                collect_expr(term, refs);
            }
            collect_expr(body, refs);
        }
        ExprKind::Case {
            arguments,
            result_type,
            clauses,
        } => {
            arguments.iter().for_each(|e| collect_expr(e, refs));
            if let Some(ty) = result_type {
                collect_expr(ty, refs);
            }
            clauses.iter().for_each(|c| collect_clause(c, refs));
        }
        ExprKind::ClassExt(class, coclauses) => {
            refs.add(*class);
            coclauses.iter().for_each(|c| collect_coclause(c, refs));
        }
        ExprKind::Typed(expr, ty) => {
            collect_expr(expr, refs);
            collect_expr(ty, refs);
        }
        ExprKind::Goal(Some(expr)) => collect_expr(expr, refs),
        ExprKind::Goal(None)
        | ExprKind::Local(_)
        | ExprKind::Universe
        | ExprKind::Number(_)
        | ExprKind::Hole => {}
    }
}

fn collect_params(params: &[Param], refs: &mut References) {
    for param in params {
        if let Some(ty) = &param.ty {
            collect_expr(ty, refs);
        }
    }
}

fn collect_clause(clause: &Clause, refs: &mut References) {
    clause.patterns.iter().for_each(|p| collect_pattern(p, refs));
    if let Some(rhs) = &clause.rhs {
        collect_expr(rhs, refs);
    }
}

fn collect_coclause(coclause: &CoClause, refs: &mut References) {
    refs.add(coclause.field);
    collect_expr(&coclause.implementation, refs);
}

fn collect_pattern(pattern: &Pattern, refs: &mut References) {
    match pattern {
        Pattern::Constructor(id, args) => {
            refs.add(*id);
            args.iter().for_each(|p| collect_pattern(p, refs));
        }
        Pattern::Tuple(items) => items.iter().for_each(|p| collect_pattern(p, refs)),
        Pattern::Var(_) | Pattern::Absurd => {}
    }
}
