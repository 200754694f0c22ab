//! Post-match filters.
//!
//! Raw embeddings from the search engine only honor node and edge
//! predicates. Constraints that relate several mapped atoms at once —
//! stereo arrangement, component grouping, reaction atom maps — are checked
//! here, after the fact. Each filter is stateless: mapping in, verdict out.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::atom::{Atom, Chirality};
use crate::bond::{Bond, BondStereo};
use crate::expr::{AtomExpr, BondExpr};
use crate::mol::Mol;
use crate::search::Mapping;

/// A query atom carrying a handedness constraint, found at compile time.
#[derive(Debug, Clone)]
pub struct ChiralQueryAtom {
    pub query_idx: NodeIndex,
    pub chirality: Chirality,
}

pub fn collect_chiral_query_atoms(query: &Mol<AtomExpr, BondExpr>) -> Vec<ChiralQueryAtom> {
    query
        .atoms()
        .filter_map(|i| {
            extract_chirality(query.atom(i)).map(|c| ChiralQueryAtom {
                query_idx: i,
                chirality: c,
            })
        })
        .collect()
}

fn extract_chirality(expr: &AtomExpr) -> Option<Chirality> {
    match expr {
        AtomExpr::Chirality(c) if *c != Chirality::None => Some(*c),
        AtomExpr::And(parts) => parts.iter().find_map(extract_chirality),
        _ => None,
    }
}

/// Query bonds carrying a cis (`true`) or trans (`false`) constraint.
pub fn collect_stereo_bonds(query: &Mol<AtomExpr, BondExpr>) -> Vec<(EdgeIndex, bool)> {
    query
        .bonds()
        .filter_map(|e| stereo_kind(query.bond(e)).map(|cis| (e, cis)))
        .collect()
}

fn stereo_kind(expr: &BondExpr) -> Option<bool> {
    match expr {
        BondExpr::Cis => Some(true),
        BondExpr::Trans => Some(false),
        BondExpr::And(parts) => parts.iter().find_map(stereo_kind),
        _ => None,
    }
}

/// Reaction atom-map number per query atom (`0` = unmapped).
pub fn collect_atom_maps(query: &Mol<AtomExpr, BondExpr>) -> Vec<u16> {
    query
        .atoms()
        .map(|i| extract_atom_map(query.atom(i)).unwrap_or(0))
        .collect()
}

fn extract_atom_map(expr: &AtomExpr) -> Option<u16> {
    match expr {
        AtomExpr::AtomMap(m) => Some(*m),
        AtomExpr::And(parts) => parts.iter().find_map(extract_atom_map),
        _ => None,
    }
}

/// Component-group tag per query atom (`0` = unconstrained).
pub fn collect_component_groups(query: &Mol<AtomExpr, BondExpr>) -> Vec<u16> {
    query
        .atoms()
        .map(|i| extract_group(query.atom(i)).unwrap_or(0))
        .collect()
}

fn extract_group(expr: &AtomExpr) -> Option<u16> {
    match expr {
        AtomExpr::ComponentGroup(g) => Some(*g),
        AtomExpr::And(parts) => parts.iter().find_map(extract_group),
        _ => None,
    }
}

/// Neighbors in declaration order. The adjacency list iterates newest-first,
/// and stereo parity is defined against the order bonds were declared.
fn ordered_neighbors<A, B>(mol: &Mol<A, B>, idx: NodeIndex) -> Vec<NodeIndex> {
    let mut neighbors: Vec<NodeIndex> = mol.neighbors(idx).collect();
    neighbors.reverse();
    neighbors
}

/// Accepts a mapping only when every stereo constraint in the query is
/// realized with the same geometry in the target.
pub fn stereo_consistent(
    mapping: &Mapping,
    query: &Mol<AtomExpr, BondExpr>,
    target: &Mol<Atom, Bond>,
    chiral_atoms: &[ChiralQueryAtom],
    stereo_bonds: &[(EdgeIndex, bool)],
) -> bool {
    chiral_atoms
        .iter()
        .all(|cqa| tetrahedral_ok(cqa, mapping, query, target))
        && stereo_bonds
            .iter()
            .all(|&(edge, want_cis)| cis_trans_ok(edge, want_cis, mapping, query, target))
}

fn tetrahedral_ok(
    cqa: &ChiralQueryAtom,
    mapping: &Mapping,
    query: &Mol<AtomExpr, BondExpr>,
    target: &Mol<Atom, Bond>,
) -> bool {
    let t_idx = mapping.node(cqa.query_idx);
    let t_chiral = target.atom(t_idx).chirality;
    if t_chiral == Chirality::None {
        return false;
    }

    let q_neighbors = ordered_neighbors(query, cqa.query_idx);
    // Fewer than three mapped neighbors cannot pin a handedness.
    if q_neighbors.len() < 3 {
        return true;
    }
    let mapped: Vec<NodeIndex> = q_neighbors.iter().map(|&qn| mapping.node(qn)).collect();
    let stored = ordered_neighbors(target, t_idx);

    // Implicit hydrogens sit last in both conventions, so leaving them out
    // of the inversion count keeps the relative parity intact.
    let inversions = count_inversions(&mapped, &stored);
    if inversions % 2 == 0 {
        cqa.chirality == t_chiral
    } else {
        cqa.chirality != t_chiral
    }
}

fn count_inversions(mapped: &[NodeIndex], stored: &[NodeIndex]) -> usize {
    let positions: Vec<usize> = mapped
        .iter()
        .filter_map(|&n| stored.iter().position(|&s| s == n))
        .collect();
    let mut inversions = 0;
    for i in 0..positions.len() {
        for j in (i + 1)..positions.len() {
            if positions[i] > positions[j] {
                inversions += 1;
            }
        }
    }
    inversions
}

fn cis_trans_ok(
    q_edge: EdgeIndex,
    want_cis: bool,
    mapping: &Mapping,
    query: &Mol<AtomExpr, BondExpr>,
    target: &Mol<Atom, Bond>,
) -> bool {
    let (qa, qb) = query
        .bond_endpoints(q_edge)
        .expect("bond index comes from this graph");
    // Implicit references: the first other neighbor on each end.
    let q_ref_a = ordered_neighbors(query, qa).into_iter().find(|&n| n != qb);
    let q_ref_b = ordered_neighbors(query, qb).into_iter().find(|&n| n != qa);
    let (q_ref_a, q_ref_b) = match (q_ref_a, q_ref_b) {
        (Some(a), Some(b)) => (a, b),
        // A bare stereo bond with no substituent on one end constrains
        // nothing.
        _ => return true,
    };

    let ta = mapping.node(qa);
    let t_edge = mapping.bond(q_edge);
    let (stored_same_side, r1, r2) = match target.bond(t_edge).stereo {
        BondStereo::None => return false,
        BondStereo::Cis(r1, r2) => (true, r1, r2),
        BondStereo::Trans(r1, r2) => (false, r1, r2),
    };
    // Orient the stored references to the (ta, tb) ends.
    let (sa, sb) = if target.bond_between(ta, r1).is_some() {
        (r1, r2)
    } else {
        (r2, r1)
    };

    let mut flips = 0;
    if mapping.node(q_ref_a) != sa {
        flips += 1;
    }
    if mapping.node(q_ref_b) != sb {
        flips += 1;
    }
    // Each end whose mapped reference is the other substituent flips the
    // side once.
    let mapped_same_side = stored_same_side == (flips % 2 == 0);
    mapped_same_side == want_cis
}

/// Accepts a mapping only when equal group tags land in one target fragment
/// and distinct tags land in distinct fragments.
pub fn grouping_consistent(
    mapping: &Mapping,
    groups: &[u16],
    target_components: &[usize],
) -> bool {
    let mut group_comp: HashMap<u16, usize> = HashMap::new();
    for (q_idx, &g) in groups.iter().enumerate() {
        if g == 0 {
            continue;
        }
        let comp = target_components[mapping.node(NodeIndex::new(q_idx)).index()];
        match group_comp.entry(g) {
            Entry::Occupied(e) => {
                if *e.get() != comp {
                    return false;
                }
            }
            Entry::Vacant(v) => {
                v.insert(comp);
            }
        }
    }
    let mut seen = HashSet::new();
    group_comp.values().all(|&c| seen.insert(c))
}

/// Accepts a mapping only when the query-map to target-map correspondence is
/// a consistent injection over mapped atoms.
pub fn atom_maps_consistent(
    mapping: &Mapping,
    maps: &[u16],
    target: &Mol<Atom, Bond>,
) -> bool {
    let mut pairing: HashMap<u16, u16> = HashMap::new();
    let mut used: HashSet<u16> = HashSet::new();
    for (q_idx, &m) in maps.iter().enumerate() {
        if m == 0 {
            continue;
        }
        let t_map = target.atom(mapping.node(NodeIndex::new(q_idx))).atom_map;
        if t_map == 0 {
            return false;
        }
        match pairing.entry(m) {
            Entry::Occupied(e) => {
                if *e.get() != t_map {
                    return false;
                }
            }
            Entry::Vacant(v) => {
                if !used.insert(t_map) {
                    return false;
                }
                v.insert(t_map);
            }
        }
    }
    true
}
