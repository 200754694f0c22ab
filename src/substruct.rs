use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;
use crate::search::{Mapping, MatchPolicy, SearchState};
use crate::traits::{HasAromaticity, HasAtomicNum, HasBondOrder};

/// Plain substructure matching with the default compatibility rules:
/// atomic numbers must agree, an aromatic query atom needs an aromatic
/// target atom, and bond orders must agree unless both sides of the bond
/// are aromatic.
pub fn has_substruct_match<A, B>(target: &Mol<A, B>, query: &Mol<A, B>) -> bool
where
    A: HasAtomicNum + HasAromaticity,
    B: HasBondOrder,
{
    get_substruct_match(target, query).is_some()
}

pub fn get_substruct_match<A, B>(target: &Mol<A, B>, query: &Mol<A, B>) -> Option<Mapping>
where
    A: HasAtomicNum + HasAromaticity,
    B: HasBondOrder,
{
    drive(target, query, &DefaultPolicy { target, query }, true).pop()
}

pub fn get_substruct_matches<A, B>(target: &Mol<A, B>, query: &Mol<A, B>) -> Vec<Mapping>
where
    A: HasAtomicNum + HasAromaticity,
    B: HasBondOrder,
{
    drive(target, query, &DefaultPolicy { target, query }, false)
}

/// Matching with caller-supplied compatibility closures; target and query
/// may use different atom and bond payloads.
pub fn has_substruct_match_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(&A1, &A2) -> bool,
    bond_match: impl Fn(&B1, &B2) -> bool,
) -> bool {
    get_substruct_match_with(target, query, atom_match, bond_match).is_some()
}

pub fn get_substruct_match_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(&A1, &A2) -> bool,
    bond_match: impl Fn(&B1, &B2) -> bool,
) -> Option<Mapping> {
    run(target, query, atom_match, bond_match, true).pop()
}

pub fn get_substruct_matches_with<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(&A1, &A2) -> bool,
    bond_match: impl Fn(&B1, &B2) -> bool,
) -> Vec<Mapping> {
    run(target, query, atom_match, bond_match, false)
}

struct DefaultPolicy<'a, A, B> {
    target: &'a Mol<A, B>,
    query: &'a Mol<A, B>,
}

impl<A, B> DefaultPolicy<'_, A, B>
where
    A: HasAromaticity,
{
    fn aromatic_bond(mol: &Mol<A, B>, edge: EdgeIndex) -> bool {
        mol.bond_endpoints(edge)
            .is_some_and(|(a, b)| mol.atom(a).is_aromatic() && mol.atom(b).is_aromatic())
    }
}

impl<A, B> MatchPolicy for DefaultPolicy<'_, A, B>
where
    A: HasAtomicNum + HasAromaticity,
    B: HasBondOrder,
{
    fn atom_matches(&self, query_atom: NodeIndex, target_atom: NodeIndex) -> bool {
        let q = self.query.atom(query_atom);
        let t = self.target.atom(target_atom);
        t.atomic_num() == q.atomic_num() && (!q.is_aromatic() || t.is_aromatic())
    }

    fn bond_matches(&self, query_bond: EdgeIndex, target_bond: EdgeIndex) -> bool {
        // Equal orders always pass; mismatched Kekulé assignments are
        // forgiven when both bonds sit between aromatic atoms.
        if self.target.bond(target_bond).bond_order() == self.query.bond(query_bond).bond_order() {
            return true;
        }
        Self::aromatic_bond(self.target, target_bond) && Self::aromatic_bond(self.query, query_bond)
    }
}

struct FnPolicy<'a, A1, B1, A2, B2, FA, FB> {
    target: &'a Mol<A1, B1>,
    query: &'a Mol<A2, B2>,
    atom_match: FA,
    bond_match: FB,
}

impl<A1, B1, A2, B2, FA, FB> MatchPolicy for FnPolicy<'_, A1, B1, A2, B2, FA, FB>
where
    FA: Fn(&A1, &A2) -> bool,
    FB: Fn(&B1, &B2) -> bool,
{
    fn atom_matches(&self, query_atom: NodeIndex, target_atom: NodeIndex) -> bool {
        (self.atom_match)(self.target.atom(target_atom), self.query.atom(query_atom))
    }

    fn bond_matches(&self, query_bond: EdgeIndex, target_bond: EdgeIndex) -> bool {
        (self.bond_match)(self.target.bond(target_bond), self.query.bond(query_bond))
    }
}

fn run<A1, B1, A2, B2>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    atom_match: impl Fn(&A1, &A2) -> bool,
    bond_match: impl Fn(&B1, &B2) -> bool,
    first_only: bool,
) -> Vec<Mapping> {
    let policy = FnPolicy {
        target,
        query,
        atom_match,
        bond_match,
    };
    drive(target, query, &policy, first_only)
}

fn drive<A1, B1, A2, B2, P: MatchPolicy>(
    target: &Mol<A1, B1>,
    query: &Mol<A2, B2>,
    policy: &P,
    first_only: bool,
) -> Vec<Mapping> {
    let mut state = SearchState::new(query, target.atom_count());
    let mut results = Vec::new();
    while let Some(mapping) = state.next_mapping(query, target, policy) {
        results.push(mapping);
        if first_only {
            break;
        }
    }
    results
}
