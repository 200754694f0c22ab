//! Recursive predicate evaluation.
//!
//! A [`AtomExpr::Recursive`] predicate holds a whole nested query; deciding
//! whether one target atom satisfies it means matching that query against the
//! entire target. The answer for every target atom is computed in one sweep
//! and memoized for the rest of the traversal, keyed by the identity of the
//! nested query expression.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use petgraph::graph::NodeIndex;

use crate::expr::{
    query_references_rings, AtomExpr, BondExpr, MatchContext, PreparationMissingError,
};
use crate::mol::Mol;
use crate::search::{MatchPolicy, SearchState};

/// Memo sets for recursive predicates, one per nested-query identity, scoped
/// to a single match traversal.
pub(crate) type RecursiveMemo = HashMap<usize, HashSet<NodeIndex>>;

/// Evaluates an atom expression, routing recursive predicates through the
/// memo and everything else to [`AtomExpr::matches`].
pub(crate) fn eval_atom_expr(
    expr: &AtomExpr,
    ctx: &MatchContext,
    memo: &RefCell<RecursiveMemo>,
    idx: NodeIndex,
) -> Result<bool, PreparationMissingError> {
    match expr {
        AtomExpr::Recursive(inner) => {
            if inner.atom_count() == 1 {
                // A single-atom nested query degenerates to direct
                // evaluation of its only predicate.
                return eval_atom_expr(inner.atom(NodeIndex::new(0)), ctx, memo, idx);
            }
            let key = inner as *const Mol<AtomExpr, BondExpr> as usize;
            if let Some(set) = memo.borrow().get(&key) {
                return Ok(set.contains(&idx));
            }
            let set = matching_targets(inner, ctx, memo)?;
            let hit = set.contains(&idx);
            memo.borrow_mut().insert(key, set);
            Ok(hit)
        }
        AtomExpr::And(exprs) => {
            for e in exprs {
                if !eval_atom_expr(e, ctx, memo, idx)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        AtomExpr::Or(exprs) => {
            for e in exprs {
                if eval_atom_expr(e, ctx, memo, idx)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        AtomExpr::Not(inner) => Ok(!eval_atom_expr(inner, ctx, memo, idx)?),
        _ => expr.matches(ctx, idx),
    }
}

/// Target atoms satisfying the nested query, computed over the whole target.
///
/// A nested query asserts membership of the atom reached through the matched
/// branch, not of the anchor itself: for a one-edge query both alignments of
/// every target bond are tried and the endpoint standing in for the non-root
/// node is marked; larger queries enumerate all embeddings and mark the image
/// of query node 1.
fn matching_targets(
    inner: &Mol<AtomExpr, BondExpr>,
    ctx: &MatchContext,
    memo: &RefCell<RecursiveMemo>,
) -> Result<HashSet<NodeIndex>, PreparationMissingError> {
    let mut set = HashSet::new();
    if inner.atom_count() < 2 {
        return Ok(set);
    }

    if inner.bond_count() == 1 && inner.atom_count() == 2 {
        let edge = inner.bonds().next().expect("one bond");
        let root_expr = inner.atom(NodeIndex::new(0));
        let branch_expr = inner.atom(NodeIndex::new(1));
        let bond_expr = inner.bond(edge);
        for t_edge in ctx.mol.bonds() {
            if !bond_expr.matches(ctx, t_edge)? {
                continue;
            }
            let (ta, tb) = ctx
                .mol
                .bond_endpoints(t_edge)
                .expect("bond index comes from this graph");
            if eval_atom_expr(root_expr, ctx, memo, ta)?
                && eval_atom_expr(branch_expr, ctx, memo, tb)?
            {
                set.insert(tb);
            }
            if eval_atom_expr(root_expr, ctx, memo, tb)?
                && eval_atom_expr(branch_expr, ctx, memo, ta)?
            {
                set.insert(ta);
            }
        }
        return Ok(set);
    }

    // The search below converts predicate errors to non-matches, so the
    // ring-data requirement has to be checked before the traversal starts.
    if ctx.prep.is_none() && query_references_rings(inner) {
        return Err(PreparationMissingError);
    }
    let policy = ExprPolicy {
        query: inner,
        ctx,
        memo,
    };
    let mut state = SearchState::new(inner, ctx.mol.atom_count());
    while let Some(mapping) = state.next_mapping(inner, ctx.mol, &policy) {
        set.insert(mapping.node(NodeIndex::new(1)));
    }
    Ok(set)
}

/// Search policy evaluating query expressions against the target.
pub(crate) struct ExprPolicy<'a, 'b> {
    pub query: &'a Mol<AtomExpr, BondExpr>,
    pub ctx: &'a MatchContext<'b>,
    pub memo: &'a RefCell<RecursiveMemo>,
}

impl MatchPolicy for ExprPolicy<'_, '_> {
    fn atom_matches(&self, query_atom: NodeIndex, target_atom: NodeIndex) -> bool {
        // Ring-data presence is verified before any traversal starts, so a
        // preparation error cannot occur here.
        eval_atom_expr(self.query.atom(query_atom), self.ctx, self.memo, target_atom)
            .unwrap_or(false)
    }

    fn bond_matches(
        &self,
        query_bond: petgraph::graph::EdgeIndex,
        target_bond: petgraph::graph::EdgeIndex,
    ) -> bool {
        self.query
            .bond(query_bond)
            .matches(self.ctx, target_bond)
            .unwrap_or(false)
    }
}
