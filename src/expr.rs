use std::fmt;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondOrder};
use crate::mol::Mol;
use crate::pattern::Preparation;

/// Ring or aromaticity data was requested before the target was prepared.
///
/// Recoverable: build a [`Preparation`] for the target and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreparationMissingError;

impl fmt::Display for PreparationMissingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ring data requested for an unprepared target; run the preparation pass first"
        )
    }
}

impl std::error::Error for PreparationMissingError {}

/// Atom predicate for a query graph node.
///
/// Each variant answers "does this concrete target atom satisfy me?" in the
/// context of the target graph. Composite variants short-circuit in
/// declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum AtomExpr {
    /// Matches any atom.
    True,
    /// Matches by element. `aromatic` is `None` for either form, `Some(true)`
    /// for aromatic-only, `Some(false)` for aliphatic-only.
    Element {
        atomic_num: u8,
        aromatic: Option<bool>,
    },
    /// Matches any aromatic atom.
    Aromatic,
    /// Matches any aliphatic atom.
    Aliphatic,
    /// Matches formal charge.
    Charge(i8),
    /// Matches heavy-atom degree (explicit neighbor count).
    Degree(u8),
    /// Matches total valence: bond order sum plus implicit hydrogens.
    Valence(u8),
    /// Matches total hydrogen count, implicit plus explicit H neighbors.
    TotalHCount(u8),
    /// Matches atoms in at least one ring.
    InRing,
    /// Matches atoms in no ring.
    NotInRing,
    /// Matches the number of smallest-set rings containing the atom.
    RingMembership(u8),
    /// Matches the size of the smallest ring containing the atom; `0` matches
    /// atoms outside every ring.
    SmallestRingSize(u8),
    /// Matches atoms carrying tetrahedral stereo; handedness is verified by
    /// the post-match stereo filter.
    Chirality(Chirality),
    /// Reaction atom-map number. Always matches; consumed by the atom-map
    /// post-match filter.
    AtomMap(u16),
    /// Component-group tag. Always matches; consumed by the grouping
    /// post-match filter.
    ComponentGroup(u16),
    /// A nested sub-pattern matched against the whole target; evaluated
    /// through the recursive-predicate memo, never via [`AtomExpr::matches`].
    Recursive(Mol<AtomExpr, BondExpr>),
    /// Logical AND of sub-expressions.
    And(Vec<AtomExpr>),
    /// Logical OR of sub-expressions; first satisfied branch wins.
    Or(Vec<AtomExpr>),
    /// Logical NOT of a sub-expression.
    Not(Box<AtomExpr>),
}

/// Bond predicate for a query graph edge.
#[derive(Debug, Clone, PartialEq)]
pub enum BondExpr {
    /// Matches any bond.
    True,
    /// Matches a single bond that is not aromatic.
    Single,
    /// Matches a double bond that is not aromatic.
    Double,
    /// Matches a triple bond.
    Triple,
    /// Matches a bond between two aromatic atoms.
    Aromatic,
    /// Matches single or aromatic (the usual implicit query bond).
    SingleOrAromatic,
    /// Matches a ring bond.
    Ring,
    /// Matches a double bond whose implicit references are on the same side;
    /// geometry is verified by the post-match stereo filter.
    Cis,
    /// Matches a double bond whose implicit references are on opposite sides;
    /// geometry is verified by the post-match stereo filter.
    Trans,
    And(Vec<BondExpr>),
    Or(Vec<BondExpr>),
    Not(Box<BondExpr>),
}

/// Target-side context for predicate evaluation: the molecule plus the
/// optional ring/aromaticity preparation.
pub struct MatchContext<'a> {
    pub mol: &'a Mol<Atom, Bond>,
    pub prep: Option<&'a Preparation>,
}

impl<'a> MatchContext<'a> {
    pub fn new(mol: &'a Mol<Atom, Bond>, prep: Option<&'a Preparation>) -> Self {
        Self { mol, prep }
    }

    /// Aromaticity of an atom: the prepared perception when present,
    /// otherwise whatever flag the reader stored.
    pub fn is_aromatic(&self, idx: NodeIndex) -> bool {
        match self.prep {
            Some(p) => p.is_aromatic(idx),
            None => self.mol.atom(idx).is_aromatic,
        }
    }

    pub fn ring_info(&self) -> Result<&'a crate::rings::RingInfo, PreparationMissingError> {
        self.prep.map(|p| p.ring_info()).ok_or(PreparationMissingError)
    }
}

fn explicit_h_count(ctx: &MatchContext, idx: NodeIndex) -> u8 {
    ctx.mol
        .neighbors(idx)
        .filter(|&nb| ctx.mol.atom(nb).atomic_num == 1)
        .count() as u8
}

fn bond_order_sum(ctx: &MatchContext, idx: NodeIndex) -> u8 {
    ctx.mol
        .bonds_of(idx)
        .map(|ei| match ctx.mol.bond(ei).order {
            BondOrder::Single => 1u8,
            BondOrder::Double => 2,
            BondOrder::Triple => 3,
        })
        .sum()
}

impl AtomExpr {
    /// Evaluates this predicate against one target atom.
    ///
    /// Ring-dependent variants need a prepared context and report
    /// [`PreparationMissingError`] rather than quietly failing the match.
    pub fn matches(
        &self,
        ctx: &MatchContext,
        idx: NodeIndex,
    ) -> Result<bool, PreparationMissingError> {
        let atom = ctx.mol.atom(idx);
        Ok(match self {
            AtomExpr::True => true,
            AtomExpr::Element {
                atomic_num,
                aromatic,
            } => {
                atom.atomic_num == *atomic_num
                    && aromatic.is_none_or(|a| ctx.is_aromatic(idx) == a)
            }
            AtomExpr::Aromatic => ctx.is_aromatic(idx),
            AtomExpr::Aliphatic => !ctx.is_aromatic(idx),
            AtomExpr::Charge(c) => atom.formal_charge == *c,
            AtomExpr::Degree(d) => ctx.mol.neighbors(idx).count() as u8 == *d,
            AtomExpr::Valence(v) => bond_order_sum(ctx, idx) + atom.hydrogen_count == *v,
            AtomExpr::TotalHCount(h) => {
                atom.hydrogen_count + explicit_h_count(ctx, idx) == *h
            }
            AtomExpr::InRing => ctx.ring_info()?.is_ring_atom(idx),
            AtomExpr::NotInRing => !ctx.ring_info()?.is_ring_atom(idx),
            AtomExpr::RingMembership(n) => ctx.ring_info()?.atom_rings(idx).len() as u8 == *n,
            AtomExpr::SmallestRingSize(r) => match ctx.ring_info()?.smallest_ring_size(idx) {
                Some(size) => size as u8 == *r,
                None => *r == 0,
            },
            AtomExpr::Chirality(q) => match q {
                Chirality::None => true,
                Chirality::Cw | Chirality::Ccw => atom.chirality != Chirality::None,
            },
            AtomExpr::AtomMap(_) => true,
            AtomExpr::ComponentGroup(_) => true,
            AtomExpr::Recursive(_) => {
                unreachable!("recursive expressions are evaluated through the memo")
            }
            AtomExpr::And(exprs) => {
                for e in exprs {
                    if !e.matches(ctx, idx)? {
                        return Ok(false);
                    }
                }
                true
            }
            AtomExpr::Or(exprs) => {
                for e in exprs {
                    if e.matches(ctx, idx)? {
                        return Ok(true);
                    }
                }
                false
            }
            AtomExpr::Not(expr) => !expr.matches(ctx, idx)?,
        })
    }

    /// Whether evaluating this expression (or anything nested in it) will
    /// consult ring data.
    pub fn references_rings(&self) -> bool {
        match self {
            AtomExpr::InRing
            | AtomExpr::NotInRing
            | AtomExpr::RingMembership(_)
            | AtomExpr::SmallestRingSize(_) => true,
            AtomExpr::Recursive(inner) => query_references_rings(inner),
            AtomExpr::And(exprs) | AtomExpr::Or(exprs) => {
                exprs.iter().any(|e| e.references_rings())
            }
            AtomExpr::Not(expr) => expr.references_rings(),
            _ => false,
        }
    }
}

impl BondExpr {
    /// Evaluates this predicate against one target bond.
    pub fn matches(
        &self,
        ctx: &MatchContext,
        edge: EdgeIndex,
    ) -> Result<bool, PreparationMissingError> {
        let bond = ctx.mol.bond(edge);
        let (a, b) = ctx
            .mol
            .bond_endpoints(edge)
            .expect("bond index comes from this graph");
        let both_aromatic = ctx.is_aromatic(a) && ctx.is_aromatic(b);
        Ok(match self {
            BondExpr::True => true,
            BondExpr::Single => bond.order == BondOrder::Single && !both_aromatic,
            BondExpr::Double => bond.order == BondOrder::Double && !both_aromatic,
            BondExpr::Triple => bond.order == BondOrder::Triple,
            BondExpr::Aromatic => both_aromatic,
            BondExpr::SingleOrAromatic => bond.order == BondOrder::Single || both_aromatic,
            BondExpr::Ring => ctx.ring_info()?.is_ring_bond(a, b),
            BondExpr::Cis | BondExpr::Trans => bond.order == BondOrder::Double,
            BondExpr::And(exprs) => {
                for e in exprs {
                    if !e.matches(ctx, edge)? {
                        return Ok(false);
                    }
                }
                true
            }
            BondExpr::Or(exprs) => {
                for e in exprs {
                    if e.matches(ctx, edge)? {
                        return Ok(true);
                    }
                }
                false
            }
            BondExpr::Not(expr) => !expr.matches(ctx, edge)?,
        })
    }

    pub fn references_rings(&self) -> bool {
        match self {
            BondExpr::Ring => true,
            BondExpr::And(exprs) | BondExpr::Or(exprs) => {
                exprs.iter().any(|e| e.references_rings())
            }
            BondExpr::Not(expr) => expr.references_rings(),
            _ => false,
        }
    }
}

/// Whether any predicate in the query (including nested sub-patterns) will
/// consult ring data.
pub fn query_references_rings(query: &Mol<AtomExpr, BondExpr>) -> bool {
    query.atoms().any(|i| query.atom(i).references_rings())
        || query.bonds().any(|e| query.bond(e).references_rings())
}
