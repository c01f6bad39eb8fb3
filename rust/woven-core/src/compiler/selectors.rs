//! The selector engine: structural equality, the superselector test,
//! compound unification, and `@extend` expansion.
//!
//! `@extend` is scoped by `(target compound, media context)` — an extend
//! written inside an `@media` block only reaches rulesets sharing that same
//! media context, so a selector never grows a branch that could only ever
//! be reached under a different `@media` condition.

use std::cell::RefCell;
use std::collections::HashSet;

use thiserror::Error;

use super::ast::{Ast, Combinator, PseudoArg, SelectorId, SelectorKind};
use super::source::Span;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExtendError {
    #[error("\"{target}\" was extended but never matched (add `!optional` to silence)")]
    Unsatisfied { target: String },
}

// ── structural equality ─────────────────────────────────────────────────

pub fn selector_eq(ast: &Ast, a: SelectorId, b: SelectorId) -> bool {
    use SelectorKind::*;
    match (&ast.selector(a).kind, &ast.selector(b).kind) {
        (List { complexes: c1, is_optional: o1 }, List { complexes: c2, is_optional: o2 }) => {
            o1 == o2 && c1.len() == c2.len() && c1.iter().zip(c2).all(|(x, y)| selector_eq(ast, *x, *y))
        }
        (
            Complex { head: h1, combinator: cm1, reference: r1, tail: t1 },
            Complex { head: h2, combinator: cm2, reference: r2, tail: t2 },
        ) => cm1 == cm2 && r1 == r2 && opt_eq(ast, *h1, *h2) && opt_eq(ast, *t1, *t2),
        (
            Compound { simples: s1, has_parent_ref: p1 },
            Compound { simples: s2, has_parent_ref: p2 },
        ) => p1 == p2 && s1.len() == s2.len() && s1.iter().zip(s2).all(|(x, y)| selector_eq(ast, *x, *y)),
        (Type { name: n1, namespace: ns1 }, Type { name: n2, namespace: ns2 }) => n1 == n2 && ns1 == ns2,
        (IdRef(x), IdRef(y)) => x == y,
        (ClassRef(x), ClassRef(y)) => x == y,
        (Placeholder(x), Placeholder(y)) => x == y,
        (ParentRef, ParentRef) => true,
        (PseudoSimple { name: n1, is_element: e1 }, PseudoSimple { name: n2, is_element: e2 }) => {
            n1 == n2 && e1 == e2
        }
        (PseudoFunctional { name: n1, arg: a1 }, PseudoFunctional { name: n2, arg: a2 }) => {
            n1 == n2
                && match (a1, a2) {
                    (PseudoArg::Text(x), PseudoArg::Text(y)) => x == y,
                    (PseudoArg::List(x), PseudoArg::List(y)) => selector_eq(ast, *x, *y),
                    _ => false,
                }
        }
        (Wrapped { name: n1, inner: i1 }, Wrapped { name: n2, inner: i2 }) => {
            n1 == n2 && selector_eq(ast, *i1, *i2)
        }
        (Attribute { name: n1, matcher: m1, value: v1 }, Attribute { name: n2, matcher: m2, value: v2 }) => {
            n1 == n2 && m1 == m2 && v1 == v2
        }
        (Schema { parts: p1 }, Schema { parts: p2 }) => p1.len() == p2.len(),
        _ => false,
    }
}

fn opt_eq(ast: &Ast, a: Option<SelectorId>, b: Option<SelectorId>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(x), Some(y)) => selector_eq(ast, x, y),
        _ => false,
    }
}

// ── flattening ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ComplexStep {
    /// The combinator connecting the *previous* step to this one; `None`
    /// only for the first step in a complex selector.
    pub leading_combinator: Option<Combinator>,
    pub compound: SelectorId,
}

pub fn flatten_complex(ast: &Ast, id: SelectorId) -> Vec<ComplexStep> {
    let mut out = Vec::new();
    let mut cur = Some(id);
    let mut pending = None;
    while let Some(node_id) = cur {
        match &ast.selector(node_id).kind {
            SelectorKind::Complex { head, combinator, tail, .. } => {
                if let Some(h) = head {
                    out.push(ComplexStep { leading_combinator: pending, compound: *h });
                }
                pending = *combinator;
                cur = *tail;
            }
            _ => break,
        }
    }
    out
}

fn rebuild_complex(ast: &mut Ast, steps: &[ComplexStep]) -> SelectorId {
    if steps.is_empty() {
        return ast.alloc_selector(
            SelectorKind::Complex { head: None, combinator: None, reference: None, tail: None },
            Span::dummy(),
        );
    }
    let mut node = ast.alloc_selector(
        SelectorKind::Complex {
            head: Some(steps[steps.len() - 1].compound),
            combinator: None,
            reference: None,
            tail: None,
        },
        Span::dummy(),
    );
    for i in (0..steps.len() - 1).rev() {
        let comb = steps[i + 1].leading_combinator;
        node = ast.alloc_selector(
            SelectorKind::Complex {
                head: Some(steps[i].compound),
                combinator: comb,
                reference: None,
                tail: Some(node),
            },
            Span::dummy(),
        );
    }
    node
}

// ── superselector test ──────────────────────────────────────────────────

/// Does `a` match (at least) every element `b` matches? Handles combinator
/// slack for `Descendant` (any ancestor depth satisfies it) but, for
/// `Child`/`Adjacent`/`General`, requires a structurally equal link in `b`
/// at the same relative position — real engines allow a few more
/// equivalences (e.g. aligning across redundant descendant hops), which
/// this simplified version does not attempt.
pub fn is_superselector_complex(ast: &Ast, a: &[ComplexStep], b: &[ComplexStep]) -> bool {
    if a.is_empty() {
        return true;
    }
    if b.is_empty() {
        return false;
    }
    let mut ai = a.len() - 1;
    let mut bi = b.len() - 1;
    loop {
        if !is_compound_superselector(ast, a[ai].compound, b[bi].compound) {
            let can_skip = ai + 1 < a.len() && a[ai + 1].leading_combinator == Some(Combinator::Descendant);
            if can_skip && bi > 0 {
                bi -= 1;
                continue;
            }
            return false;
        }
        if ai == 0 {
            return true;
        }
        if bi == 0 {
            return false;
        }
        let a_comb = a[ai].leading_combinator.unwrap_or(Combinator::Descendant);
        match a_comb {
            Combinator::Descendant => {}
            exact => {
                let b_comb = b[bi].leading_combinator.unwrap_or(Combinator::Descendant);
                let ok = match exact {
                    Combinator::Child => b_comb == Combinator::Child,
                    Combinator::Adjacent => b_comb == Combinator::Adjacent,
                    Combinator::General => matches!(b_comb, Combinator::General | Combinator::Adjacent),
                    Combinator::Descendant => true,
                };
                if !ok {
                    return false;
                }
            }
        }
        ai -= 1;
        bi -= 1;
    }
}

/// `a` is a compound-superselector of `b` when every simple selector in
/// `a` also appears in `b` (so `b` is at least as specific).
pub fn is_compound_superselector(ast: &Ast, a: SelectorId, b: SelectorId) -> bool {
    let (a_simples, b_simples) = match (&ast.selector(a).kind, &ast.selector(b).kind) {
        (SelectorKind::Compound { simples: sa, .. }, SelectorKind::Compound { simples: sb, .. }) => {
            (sa.clone(), sb.clone())
        }
        _ => return selector_eq(ast, a, b),
    };
    a_simples.iter().all(|s| {
        if let SelectorKind::Type { name, .. } = &ast.selector(*s).kind {
            if name == "*" {
                return true;
            }
        }
        b_simples.iter().any(|t| selector_eq(ast, *s, *t))
    })
}

/// Merges two compounds' simple-selector sets. Fails if they carry
/// incompatible, non-universal type selectors (`div` can never unify with
/// `span`).
pub fn unify_compounds(ast: &mut Ast, a: SelectorId, b: SelectorId) -> Option<SelectorId> {
    let (a_simples, a_parent) = match &ast.selector(a).kind {
        SelectorKind::Compound { simples, has_parent_ref } => (simples.clone(), *has_parent_ref),
        _ => return None,
    };
    let (b_simples, b_parent) = match &ast.selector(b).kind {
        SelectorKind::Compound { simples, has_parent_ref } => (simples.clone(), *has_parent_ref),
        _ => return None,
    };
    let is_universal = |ast: &Ast, id: SelectorId| {
        matches!(&ast.selector(id).kind, SelectorKind::Type { name, .. } if name == "*")
    };
    let a_type = a_simples.iter().find(|s| matches!(ast.selector(**s).kind, SelectorKind::Type { .. }));
    let b_type = b_simples.iter().find(|s| matches!(ast.selector(**s).kind, SelectorKind::Type { .. }));
    if let (Some(at), Some(bt)) = (a_type, b_type) {
        if !selector_eq(ast, *at, *bt) && !is_universal(ast, *at) && !is_universal(ast, *bt) {
            return None;
        }
    }
    let mut merged: Vec<SelectorId> = Vec::new();
    for s in a_simples.into_iter().chain(b_simples) {
        if !merged.iter().any(|m| selector_eq(ast, *m, s)) {
            merged.push(s);
        }
    }
    let span = ast.selector(a).span;
    Some(ast.alloc_selector(SelectorKind::Compound { simples: merged, has_parent_ref: a_parent || b_parent }, span))
}

// ── @extend registry ────────────────────────────────────────────────────

pub struct ExtendRule {
    /// The full selector of the ruleset carrying the `@extend`.
    pub extender: SelectorId,
    /// The (typically single-compound) selector named by `@extend`.
    pub target: SelectorId,
    pub is_optional: bool,
    pub media_context: Option<String>,
}

pub struct ExtendRegistry {
    rules: Vec<ExtendRule>,
    matched: RefCell<HashSet<usize>>,
}

impl Default for ExtendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtendRegistry {
    pub fn new() -> Self {
        Self { rules: Vec::new(), matched: RefCell::new(HashSet::new()) }
    }

    pub fn register(&mut self, rule: ExtendRule) {
        self.rules.push(rule);
    }

    /// Expands `original` against every registered rule sharing
    /// `media_context`, iterating to a fixpoint since a freshly produced
    /// selector can itself become a match for another rule.
    pub fn expand(&self, ast: &mut Ast, original: SelectorId, media_context: Option<&str>) -> SelectorId {
        let complexes = match &ast.selector(original).kind {
            SelectorKind::List { complexes, .. } => complexes.clone(),
            _ => return original,
        };
        let mut working = complexes;
        let mut guard = 0;
        loop {
            guard += 1;
            if guard > 64 {
                break;
            }
            let mut additions = Vec::new();
            for &complex in &working {
                let steps = flatten_complex(ast, complex);
                let Some(last) = steps.last().cloned() else { continue };
                for (idx, rule) in self.rules.iter().enumerate() {
                    if rule.media_context.as_deref() != media_context {
                        continue;
                    }
                    let target_steps = flatten_complex(ast, rule.target);
                    let Some(target_compound) = target_steps.last().map(|s| s.compound) else { continue };
                    if is_compound_superselector(ast, target_compound, last.compound) {
                        self.matched.borrow_mut().insert(idx);
                        if let Some(new_complex) = substitute_last(ast, &steps, rule) {
                            let exists = working
                                .iter()
                                .chain(additions.iter())
                                .any(|c| selector_eq(ast, *c, new_complex));
                            if !exists {
                                additions.push(new_complex);
                            }
                        }
                    }
                }
            }
            if additions.is_empty() {
                break;
            }
            working.extend(additions);
        }
        let span = ast.selector(original).span;
        ast.alloc_selector(SelectorKind::List { complexes: working, is_optional: false }, span)
    }

    /// Targets marked required (no `!optional`) that never matched
    /// anything across the whole expansion pass.
    pub fn unsatisfied_required(&self, ast: &Ast) -> Vec<ExtendError> {
        let matched = self.matched.borrow();
        self.rules
            .iter()
            .enumerate()
            .filter(|(idx, rule)| !rule.is_optional && !matched.contains(idx))
            .map(|(_, rule)| ExtendError::Unsatisfied { target: describe(ast, rule.target) })
            .collect()
    }
}

fn substitute_last(ast: &mut Ast, steps: &[ComplexStep], rule: &ExtendRule) -> Option<SelectorId> {
    let extender_steps = flatten_complex(ast, rule.extender);
    let extender_last = extender_steps.last()?.compound;
    let target_steps = flatten_complex(ast, rule.target);
    let target_compound = target_steps.last()?.compound;
    let trimmed = drop_matched_simples(ast, steps[steps.len() - 1].compound, target_compound);
    let unified = unify_compounds(ast, trimmed, extender_last)?;
    let mut new_steps: Vec<ComplexStep> = steps[..steps.len() - 1].to_vec();
    for es in &extender_steps[..extender_steps.len().saturating_sub(1)] {
        new_steps.push(es.clone());
    }
    let leading = if new_steps.is_empty() { None } else { Some(Combinator::Descendant) };
    new_steps.push(ComplexStep { leading_combinator: leading, compound: unified });
    Some(rebuild_complex(ast, &new_steps))
}

/// Drops from `compound` every simple selector also present in `target`,
/// since those are exactly what the extender's own compound is standing in
/// for (`.a.foo { } .b { @extend .a; }` keeps `.foo` but drops `.a`, which
/// `.b` already carries).
fn drop_matched_simples(ast: &mut Ast, compound: SelectorId, target: SelectorId) -> SelectorId {
    let (simples, has_parent_ref) = match &ast.selector(compound).kind {
        SelectorKind::Compound { simples, has_parent_ref } => (simples.clone(), *has_parent_ref),
        _ => return compound,
    };
    let target_simples = match &ast.selector(target).kind {
        SelectorKind::Compound { simples, .. } => simples.clone(),
        _ => Vec::new(),
    };
    let remaining: Vec<SelectorId> =
        simples.into_iter().filter(|s| !target_simples.iter().any(|t| selector_eq(ast, *s, *t))).collect();
    let span = ast.selector(compound).span;
    ast.alloc_selector(SelectorKind::Compound { simples: remaining, has_parent_ref }, span)
}

fn describe(ast: &Ast, id: SelectorId) -> String {
    let steps = flatten_complex(ast, id);
    steps
        .last()
        .map(|s| describe_compound(ast, s.compound))
        .unwrap_or_default()
}

fn describe_compound(ast: &Ast, id: SelectorId) -> String {
    match &ast.selector(id).kind {
        SelectorKind::Compound { simples, .. } => {
            simples.iter().map(|s| describe_simple(ast, *s)).collect::<Vec<_>>().join("")
        }
        other => format!("{other:?}"),
    }
}

fn describe_simple(ast: &Ast, id: SelectorId) -> String {
    match &ast.selector(id).kind {
        SelectorKind::Type { name, .. } => name.clone(),
        SelectorKind::ClassRef(n) => format!(".{n}"),
        SelectorKind::IdRef(n) => format!("#{n}"),
        SelectorKind::Placeholder(n) => format!("%{n}"),
        SelectorKind::PseudoSimple { name, is_element } => {
            if *is_element { format!("::{name}") } else { format!(":{name}") }
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::super::source::PathId;
    use crate::compiler::parser;

    fn compound_of(ast: &Ast, root_selector_complex: SelectorId) -> SelectorId {
        flatten_complex(ast, root_selector_complex).last().unwrap().compound
    }

    fn first_ruleset_selector(src: &str) -> (Ast, SelectorId) {
        let (ast, root) = parser::parse(src, PathId(0)).unwrap();
        let stmts = match &ast.stmt(root).kind {
            crate::compiler::ast::Stmt::Block { statements, .. } => statements.clone(),
            _ => panic!(),
        };
        for s in stmts {
            if let crate::compiler::ast::Stmt::Ruleset { selector, .. } = &ast.stmt(s).kind {
                return (ast, *selector);
            }
        }
        panic!("no ruleset found");
    }

    #[test]
    fn compound_superselector_requires_subset_of_simples() {
        let (ast, root) = parser::parse(".a.b { x: 1; } .a { x: 1; } .b { x: 1; }", PathId(0)).unwrap();
        let stmts = match &ast.stmt(root).kind {
            crate::compiler::ast::Stmt::Block { statements, .. } => statements.clone(),
            _ => panic!(),
        };
        let selector_of = |stmt| match &ast.stmt(stmt).kind {
            crate::compiler::ast::Stmt::Ruleset { selector, .. } => *selector,
            _ => panic!(),
        };
        let complexes_of = |sel| match &ast.selector(sel).kind {
            SelectorKind::List { complexes, .. } => complexes.clone(),
            _ => panic!(),
        };

        let ab = compound_of(&ast, complexes_of(selector_of(stmts[0]))[0]);
        let a = compound_of(&ast, complexes_of(selector_of(stmts[1]))[0]);
        let b = compound_of(&ast, complexes_of(selector_of(stmts[2]))[0]);

        assert!(is_compound_superselector(&ast, a, ab), ".a should be a superselector of .a.b");
        assert!(is_compound_superselector(&ast, b, ab), ".b should be a superselector of .a.b");
        assert!(!is_compound_superselector(&ast, ab, a), ".a.b should not be a superselector of .a");
        assert!(!is_compound_superselector(&ast, a, b), ".a should not be a superselector of .b");
        assert!(is_compound_superselector(&ast, a, a), "a compound is its own superselector");
    }

    #[test]
    fn extend_substitutes_matching_compound() {
        let (mut ast, root) = parser::parse(".message { color: red; } .error { @extend .message; }", PathId(0)).unwrap();
        let stmts = match &ast.stmt(root).kind {
            crate::compiler::ast::Stmt::Block { statements, .. } => statements.clone(),
            _ => panic!(),
        };
        let message_selector = match &ast.stmt(stmts[0]).kind {
            crate::compiler::ast::Stmt::Ruleset { selector, .. } => *selector,
            _ => panic!(),
        };
        let (error_selector, extend_target) = match &ast.stmt(stmts[1]).kind {
            crate::compiler::ast::Stmt::Ruleset { selector, block } => {
                let inner = match &ast.stmt(*block).kind {
                    crate::compiler::ast::Stmt::Block { statements, .. } => statements.clone(),
                    _ => panic!(),
                };
                let target = match &ast.stmt(inner[0]).kind {
                    crate::compiler::ast::Stmt::Extend { target, .. } => *target,
                    _ => panic!(),
                };
                (*selector, target)
            }
            _ => panic!(),
        };

        let mut registry = ExtendRegistry::new();
        registry.register(ExtendRule {
            extender: error_selector,
            target: extend_target,
            is_optional: false,
            media_context: None,
        });

        let expanded = registry.expand(&mut ast, message_selector, None);
        let complexes = match &ast.selector(expanded).kind {
            SelectorKind::List { complexes, .. } => complexes.clone(),
            _ => panic!(),
        };
        assert_eq!(complexes.len(), 2);
        assert!(registry.unsatisfied_required(&ast).is_empty());
    }

    #[test]
    fn optional_extend_with_no_match_reports_nothing() {
        let (mut ast, root) = parser::parse(".error { @extend .nope !optional; }", PathId(0)).unwrap();
        let stmts = match &ast.stmt(root).kind {
            crate::compiler::ast::Stmt::Block { statements, .. } => statements.clone(),
            _ => panic!(),
        };
        let (error_selector, extend_target) = match &ast.stmt(stmts[0]).kind {
            crate::compiler::ast::Stmt::Ruleset { selector, block } => {
                let inner = match &ast.stmt(*block).kind {
                    crate::compiler::ast::Stmt::Block { statements, .. } => statements.clone(),
                    _ => panic!(),
                };
                let target = match &ast.stmt(inner[0]).kind {
                    crate::compiler::ast::Stmt::Extend { target, .. } => *target,
                    _ => panic!(),
                };
                (*selector, target)
            }
            _ => panic!(),
        };
        let mut registry = ExtendRegistry::new();
        registry.register(ExtendRule { extender: error_selector, target: extend_target, is_optional: true, media_context: None });
        let _ = registry.expand(&mut ast, error_selector, None);
        assert!(registry.unsatisfied_required(&ast).is_empty());
    }
}
