//! Compile-once, match-many pattern facade.
//!
//! [`Pattern::compile`] validates a query graph and runs the cheap static
//! analysis once: which post-match filters the query needs, whether any
//! predicate will ask for ring data, and the traversal order. Matching is
//! then a pure function of the pattern and the target.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::aromaticity::perceive_aromatic_atoms;
use crate::atom::Atom;
use crate::bond::Bond;
use crate::expr::{
    query_references_rings, AtomExpr, BondExpr, MatchContext, PreparationMissingError,
};
use crate::filters::{self, ChiralQueryAtom};
use crate::graph_ops::component_ids;
use crate::mol::Mol;
use crate::recursive::{ExprPolicy, RecursiveMemo};
use crate::rings::RingInfo;
use crate::search::{traversal_order, Mapping, SearchState};

/// The query graph cannot be compiled into a pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// A query must have at least one atom.
    EmptyQuery,
    /// A logical AND/OR with no branches.
    EmptyExpression,
    /// A recursive expression wrapping an empty nested query.
    EmptyRecursiveQuery,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyQuery => write!(f, "query has no atoms"),
            Self::EmptyExpression => write!(f, "logical expression with no branches"),
            Self::EmptyRecursiveQuery => write!(f, "recursive expression wraps an empty query"),
        }
    }
}

impl std::error::Error for QueryError {}

/// Ring membership and perceived aromaticity for one target, the output of
/// the preparation pre-pass.
///
/// A `Preparation` is a pure function of the target graph — building it twice
/// yields equal values — and is stored separately from the graph so matching
/// never mutates the target.
#[derive(Debug, Clone, PartialEq)]
pub struct Preparation {
    ring_info: RingInfo,
    aromatic: Vec<bool>,
}

impl Preparation {
    pub fn of(mol: &Mol<Atom, Bond>) -> Self {
        let ring_info = RingInfo::sssr(mol);
        let aromatic = perceive_aromatic_atoms(mol, &ring_info);
        Self { ring_info, aromatic }
    }

    pub fn ring_info(&self) -> &RingInfo {
        &self.ring_info
    }

    pub fn is_aromatic(&self, idx: NodeIndex) -> bool {
        self.aromatic[idx.index()]
    }
}

/// A compiled query: immutable, reusable across targets, and cheap to clone.
#[derive(Debug, Clone)]
pub struct Pattern {
    query: Mol<AtomExpr, BondExpr>,
    order: Vec<NodeIndex>,
    needs_rings: bool,
    has_stereo: bool,
    has_grouping: bool,
    has_atom_maps: bool,
    auto_prepare: bool,
    chiral_atoms: Vec<ChiralQueryAtom>,
    stereo_bonds: Vec<(EdgeIndex, bool)>,
    groups: Vec<u16>,
    atom_maps: Vec<u16>,
}

impl Pattern {
    pub fn compile(query: Mol<AtomExpr, BondExpr>) -> Result<Self, QueryError> {
        if query.atom_count() == 0 {
            return Err(QueryError::EmptyQuery);
        }
        for i in query.atoms() {
            validate_atom_expr(query.atom(i))?;
        }
        for e in query.bonds() {
            validate_bond_expr(query.bond(e))?;
        }

        let chiral_atoms = filters::collect_chiral_query_atoms(&query);
        let stereo_bonds = filters::collect_stereo_bonds(&query);
        let groups = filters::collect_component_groups(&query);
        let atom_maps = filters::collect_atom_maps(&query);
        Ok(Self {
            order: traversal_order(&query),
            needs_rings: query_references_rings(&query),
            has_stereo: !chiral_atoms.is_empty() || !stereo_bonds.is_empty(),
            has_grouping: groups.iter().any(|&g| g != 0),
            has_atom_maps: atom_maps.iter().any(|&m| m != 0),
            auto_prepare: true,
            chiral_atoms,
            stereo_bonds,
            groups,
            atom_maps,
            query,
        })
    }

    /// Whether matching prepares each target automatically (the default).
    /// Turn this off when the caller prepares once and matches many patterns
    /// against the same target.
    pub fn set_prepare(mut self, auto_prepare: bool) -> Self {
        self.auto_prepare = auto_prepare;
        self
    }

    pub fn query(&self) -> &Mol<AtomExpr, BondExpr> {
        &self.query
    }

    /// Whether any predicate of this pattern consults ring data.
    pub fn needs_preparation(&self) -> bool {
        self.needs_rings
    }

    /// The ring/aromaticity pre-pass, for callers managing preparations
    /// themselves.
    pub fn prepare(target: &Mol<Atom, Bond>) -> Preparation {
        Preparation::of(target)
    }

    pub fn matches(&self, target: &Mol<Atom, Bond>) -> Result<bool, PreparationMissingError> {
        Ok(self.first_match(target)?.is_some())
    }

    pub fn first_match(
        &self,
        target: &Mol<Atom, Bond>,
    ) -> Result<Option<Mapping>, PreparationMissingError> {
        Ok(self.match_all(target)?.first())
    }

    /// Lazy enumeration of every embedding. Each call starts a fresh
    /// traversal; consuming less than the whole sequence is the caller's way
    /// of bounding the search.
    pub fn match_all<'a>(
        &'a self,
        target: &'a Mol<Atom, Bond>,
    ) -> Result<Mappings<'a>, PreparationMissingError> {
        let prep = if self.auto_prepare {
            PrepSource::Owned(Preparation::of(target))
        } else if self.needs_rings {
            return Err(PreparationMissingError);
        } else {
            PrepSource::Unprepared
        };
        Ok(self.mappings(target, prep))
    }

    /// Like [`Pattern::match_all`] with a caller-owned preparation; never
    /// fails.
    pub fn match_all_prepared<'a>(
        &'a self,
        target: &'a Mol<Atom, Bond>,
        prep: &'a Preparation,
    ) -> Mappings<'a> {
        self.mappings(target, PrepSource::Borrowed(prep))
    }

    fn mappings<'a>(&'a self, target: &'a Mol<Atom, Bond>, prep: PrepSource<'a>) -> Mappings<'a> {
        let components = if self.has_grouping {
            component_ids(target)
        } else {
            Vec::new()
        };
        Mappings {
            pattern: self,
            target,
            prep,
            memo: RefCell::new(RecursiveMemo::new()),
            components,
            state: SearchState::with_order(
                self.order.clone(),
                self.query.atom_count(),
                target.atom_count(),
            ),
        }
    }
}

fn validate_atom_expr(expr: &AtomExpr) -> Result<(), QueryError> {
    match expr {
        AtomExpr::And(parts) | AtomExpr::Or(parts) => {
            if parts.is_empty() {
                return Err(QueryError::EmptyExpression);
            }
            parts.iter().try_for_each(validate_atom_expr)
        }
        AtomExpr::Not(inner) => validate_atom_expr(inner),
        AtomExpr::Recursive(inner) => {
            if inner.atom_count() == 0 {
                return Err(QueryError::EmptyRecursiveQuery);
            }
            for i in inner.atoms() {
                validate_atom_expr(inner.atom(i))?;
            }
            for e in inner.bonds() {
                validate_bond_expr(inner.bond(e))?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn validate_bond_expr(expr: &BondExpr) -> Result<(), QueryError> {
    match expr {
        BondExpr::And(parts) | BondExpr::Or(parts) => {
            if parts.is_empty() {
                return Err(QueryError::EmptyExpression);
            }
            parts.iter().try_for_each(validate_bond_expr)
        }
        BondExpr::Not(inner) => validate_bond_expr(inner),
        _ => Ok(()),
    }
}

enum PrepSource<'a> {
    Owned(Preparation),
    Borrowed(&'a Preparation),
    Unprepared,
}

impl PrepSource<'_> {
    fn get(&self) -> Option<&Preparation> {
        match self {
            Self::Owned(p) => Some(p),
            Self::Borrowed(p) => Some(p),
            Self::Unprepared => None,
        }
    }
}

/// Lazy stream of embeddings of one pattern into one target.
///
/// The recursive-predicate memo lives here, scoped to this traversal, so a
/// `Pattern` itself carries no per-target state.
pub struct Mappings<'a> {
    pattern: &'a Pattern,
    target: &'a Mol<Atom, Bond>,
    prep: PrepSource<'a>,
    memo: RefCell<RecursiveMemo>,
    components: Vec<usize>,
    state: SearchState,
}

impl<'a> Mappings<'a> {
    /// First accepted embedding, consuming the stream.
    pub fn first(mut self) -> Option<Mapping> {
        self.next()
    }

    /// Deduplicates embeddings that touch the same set of target atoms, so a
    /// symmetric substructure counts once.
    pub fn unique(self) -> UniqueMappings<'a> {
        UniqueMappings {
            inner: self,
            seen: HashSet::new(),
        }
    }
}

impl Iterator for Mappings<'_> {
    type Item = Mapping;

    fn next(&mut self) -> Option<Mapping> {
        let Mappings {
            pattern,
            target,
            prep,
            memo,
            components,
            state,
        } = self;
        let pattern: &Pattern = *pattern;
        let target: &Mol<Atom, Bond> = *target;
        let ctx = MatchContext::new(target, prep.get());
        let policy = ExprPolicy {
            query: &pattern.query,
            ctx: &ctx,
            memo,
        };
        loop {
            let mapping = state.next_mapping(&pattern.query, target, &policy)?;
            if pattern.has_stereo
                && !filters::stereo_consistent(
                    &mapping,
                    &pattern.query,
                    target,
                    &pattern.chiral_atoms,
                    &pattern.stereo_bonds,
                )
            {
                continue;
            }
            if pattern.has_grouping
                && !filters::grouping_consistent(&mapping, &pattern.groups, components)
            {
                continue;
            }
            if pattern.has_atom_maps
                && !filters::atom_maps_consistent(&mapping, &pattern.atom_maps, target)
            {
                continue;
            }
            return Some(mapping);
        }
    }
}

/// Adapter over [`Mappings`] keeping one embedding per touched atom set.
pub struct UniqueMappings<'a> {
    inner: Mappings<'a>,
    seen: HashSet<Vec<NodeIndex>>,
}

impl Iterator for UniqueMappings<'_> {
    type Item = Mapping;

    fn next(&mut self) -> Option<Mapping> {
        loop {
            let mapping = self.inner.next()?;
            if self.seen.insert(mapping.target_key()) {
                return Some(mapping);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Chirality;
    use crate::bond::{BondOrder, BondStereo};

    fn atom(num: u8) -> Atom {
        Atom {
            atomic_num: num,
            ..Atom::default()
        }
    }

    fn element(num: u8) -> AtomExpr {
        AtomExpr::Element {
            atomic_num: num,
            aromatic: None,
        }
    }

    fn aromatic_element(num: u8) -> AtomExpr {
        AtomExpr::Element {
            atomic_num: num,
            aromatic: Some(true),
        }
    }

    /// Kekulé benzene, no aromatic flags set; perception fills them in.
    fn benzene() -> Mol<Atom, Bond> {
        let mut mol = Mol::new();
        let nodes: Vec<_> = (0..6)
            .map(|_| {
                mol.add_atom(Atom {
                    atomic_num: 6,
                    hydrogen_count: 1,
                    ..Atom::default()
                })
            })
            .collect();
        for i in 0..6 {
            let order = if i % 2 == 0 {
                BondOrder::Double
            } else {
                BondOrder::Single
            };
            mol.add_bond(
                nodes[i],
                nodes[(i + 1) % 6],
                Bond {
                    order,
                    ..Bond::default()
                },
            );
        }
        mol
    }

    fn aromatic_ring_query() -> Mol<AtomExpr, BondExpr> {
        let mut q = Mol::new();
        let nodes: Vec<_> = (0..6).map(|_| q.add_atom(aromatic_element(6))).collect();
        for i in 0..6 {
            q.add_bond(nodes[i], nodes[(i + 1) % 6], BondExpr::Aromatic);
        }
        q
    }

    #[test]
    fn empty_query_rejected() {
        let q: Mol<AtomExpr, BondExpr> = Mol::new();
        assert_eq!(Pattern::compile(q).unwrap_err(), QueryError::EmptyQuery);
    }

    #[test]
    fn empty_or_rejected() {
        let mut q = Mol::new();
        q.add_atom(AtomExpr::Or(vec![]));
        assert_eq!(
            Pattern::compile(q).unwrap_err(),
            QueryError::EmptyExpression
        );
    }

    #[test]
    fn empty_recursive_query_rejected() {
        let mut q = Mol::new();
        q.add_atom(AtomExpr::Recursive(Mol::new()));
        assert_eq!(
            Pattern::compile(q).unwrap_err(),
            QueryError::EmptyRecursiveQuery
        );
    }

    #[test]
    fn aromatic_ring_matches_kekule_benzene() {
        let pattern = Pattern::compile(aromatic_ring_query()).unwrap();
        let target = benzene();
        assert!(pattern.matches(&target).unwrap());
        let all: Vec<_> = pattern.match_all(&target).unwrap().collect();
        assert_eq!(all.len(), 12);
    }

    #[test]
    fn unique_mode_counts_substructure_once() {
        let pattern = Pattern::compile(aromatic_ring_query()).unwrap();
        let target = benzene();
        let unique: Vec<_> = pattern.match_all(&target).unwrap().unique().collect();
        assert_eq!(unique.len(), 1);
    }

    #[test]
    fn match_all_is_restartable() {
        let pattern = Pattern::compile(aromatic_ring_query()).unwrap();
        let target = benzene();
        let a: Vec<_> = pattern.match_all(&target).unwrap().collect();
        let b: Vec<_> = pattern.match_all(&target).unwrap().collect();
        assert_eq!(a, b);
    }

    #[test]
    fn ring_predicate_without_prepare_errors() {
        let mut q = Mol::new();
        q.add_atom(AtomExpr::InRing);
        let pattern = Pattern::compile(q).unwrap().set_prepare(false);
        let target = benzene();
        assert!(pattern.needs_preparation());
        assert_eq!(pattern.match_all(&target).err(), Some(PreparationMissingError));

        let prep = Pattern::prepare(&target);
        let hits: Vec<_> = pattern.match_all_prepared(&target, &prep).collect();
        assert_eq!(hits.len(), 6);
    }

    #[test]
    fn non_ring_pattern_matches_without_prepare() {
        let mut q = Mol::new();
        q.add_atom(element(6));
        let pattern = Pattern::compile(q).unwrap().set_prepare(false);
        let target = benzene();
        let hits: Vec<_> = pattern.match_all(&target).unwrap().collect();
        assert_eq!(hits.len(), 6);
    }

    #[test]
    fn prepare_is_idempotent() {
        let target = benzene();
        assert_eq!(Preparation::of(&target), Preparation::of(&target));
    }

    #[test]
    fn recursive_predicate_through_pattern() {
        // Carbon attached to oxygen, as a recursive predicate.
        let mut target = Mol::new();
        let c0 = target.add_atom(atom(6));
        let c1 = target.add_atom(atom(6));
        let o2 = target.add_atom(atom(8));
        target.add_bond(c0, c1, Bond::default());
        target.add_bond(c1, o2, Bond::default());

        let mut nested = Mol::new();
        let root = nested.add_atom(element(8));
        let branch = nested.add_atom(element(6));
        nested.add_bond(root, branch, BondExpr::SingleOrAromatic);

        let mut q = Mol::new();
        q.add_atom(AtomExpr::Recursive(nested));
        let pattern = Pattern::compile(q).unwrap();
        let hits: Vec<_> = pattern.match_all(&target).unwrap().collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node(NodeIndex::new(0)), c1);
    }

    #[test]
    fn stereo_filter_applied_when_needed() {
        let mut target = Mol::new();
        let c = target.add_atom(Atom {
            atomic_num: 6,
            chirality: Chirality::Cw,
            ..Atom::default()
        });
        for num in [9, 17, 35, 53] {
            let x = target.add_atom(atom(num));
            target.add_bond(c, x, Bond::default());
        }

        let build_query = |handedness| {
            let mut q = Mol::new();
            let center = q.add_atom(AtomExpr::And(vec![
                element(6),
                AtomExpr::Chirality(handedness),
            ]));
            for num in [9, 17, 35, 53] {
                let x = q.add_atom(element(num));
                q.add_bond(center, x, BondExpr::SingleOrAromatic);
            }
            q
        };

        let same = Pattern::compile(build_query(Chirality::Cw)).unwrap();
        assert!(same.matches(&target).unwrap());
        let opposite = Pattern::compile(build_query(Chirality::Ccw)).unwrap();
        assert!(!opposite.matches(&target).unwrap());
    }

    #[test]
    fn cis_trans_filter_through_pattern() {
        let mut target = Mol::new();
        let c0 = target.add_atom(atom(6));
        let c1 = target.add_atom(atom(6));
        let f = target.add_atom(atom(9));
        let cl = target.add_atom(atom(17));
        target.add_bond(
            c0,
            c1,
            Bond {
                order: BondOrder::Double,
                stereo: BondStereo::Trans(f, cl),
            },
        );
        target.add_bond(c0, f, Bond::default());
        target.add_bond(c1, cl, Bond::default());

        let build_query = |expr| {
            let mut q = Mol::new();
            let a = q.add_atom(element(6));
            let b = q.add_atom(element(6));
            let rf = q.add_atom(element(9));
            let rcl = q.add_atom(element(17));
            q.add_bond(a, b, expr);
            q.add_bond(a, rf, BondExpr::SingleOrAromatic);
            q.add_bond(b, rcl, BondExpr::SingleOrAromatic);
            q
        };

        let trans = Pattern::compile(build_query(BondExpr::Trans)).unwrap();
        assert!(trans.matches(&target).unwrap());
        let cis = Pattern::compile(build_query(BondExpr::Cis)).unwrap();
        assert!(!cis.matches(&target).unwrap());
    }

    #[test]
    fn grouping_filter_through_pattern() {
        // Target: ethane fragment plus a lone oxygen.
        let mut target = Mol::new();
        let c0 = target.add_atom(atom(6));
        let c1 = target.add_atom(atom(6));
        target.add_bond(c0, c1, Bond::default());
        target.add_atom(atom(8));

        // Same group: both atoms must land in one fragment.
        let mut q = Mol::new();
        q.add_atom(AtomExpr::And(vec![element(6), AtomExpr::ComponentGroup(1)]));
        q.add_atom(AtomExpr::And(vec![element(6), AtomExpr::ComponentGroup(1)]));
        let same_group = Pattern::compile(q).unwrap();
        let hits: Vec<_> = same_group.match_all(&target).unwrap().collect();
        assert_eq!(hits.len(), 2);

        // Distinct groups: carbon and oxygen must sit in distinct fragments.
        let mut q = Mol::new();
        q.add_atom(AtomExpr::And(vec![element(6), AtomExpr::ComponentGroup(1)]));
        q.add_atom(AtomExpr::And(vec![element(8), AtomExpr::ComponentGroup(2)]));
        let split_group = Pattern::compile(q).unwrap();
        let hits: Vec<_> = split_group.match_all(&target).unwrap().collect();
        assert_eq!(hits.len(), 2);

        // Same group spanning fragments: no embedding survives.
        let mut q = Mol::new();
        q.add_atom(AtomExpr::And(vec![element(6), AtomExpr::ComponentGroup(1)]));
        q.add_atom(AtomExpr::And(vec![element(8), AtomExpr::ComponentGroup(1)]));
        let impossible = Pattern::compile(q).unwrap();
        assert!(!impossible.matches(&target).unwrap());
    }

    #[test]
    fn atom_map_filter_through_pattern() {
        let mut target = Mol::new();
        let a = target.add_atom(Atom {
            atomic_num: 6,
            atom_map: 10,
            ..Atom::default()
        });
        let b = target.add_atom(Atom {
            atomic_num: 6,
            atom_map: 0,
            ..Atom::default()
        });
        target.add_bond(a, b, Bond::default());

        let mut q = Mol::new();
        q.add_atom(AtomExpr::And(vec![element(6), AtomExpr::AtomMap(1)]));
        let pattern = Pattern::compile(q).unwrap();
        let hits: Vec<_> = pattern.match_all(&target).unwrap().collect();
        // Only the mapped target atom is acceptable.
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].node(NodeIndex::new(0)), a);
    }

    #[test]
    fn cloned_pattern_matches_independently() {
        let pattern = Pattern::compile(aromatic_ring_query()).unwrap();
        let clone = pattern.clone();
        let target = benzene();
        assert_eq!(
            pattern.match_all(&target).unwrap().count(),
            clone.match_all(&target).unwrap().count()
        );
    }
}
