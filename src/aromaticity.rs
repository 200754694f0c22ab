use petgraph::graph::NodeIndex;

use crate::bond::BondOrder;
use crate::mol::Mol;
use crate::rings::RingInfo;
use crate::traits::{HasAtomicNum, HasBondOrder, HasFormalCharge, HasHydrogenCount};

// Elements that can sit in an aromatic ring.
const SP2_CAPABLE: [u8; 9] = [5, 6, 7, 8, 15, 16, 33, 34, 52];

/// Per-atom aromaticity flags from a Hückel 4n+2 electron count over the
/// given ring set. Pure function of the graph; calling it twice on the same
/// input yields the same flags.
pub fn perceive_aromatic_atoms<A, B>(mol: &Mol<A, B>, rings: &RingInfo) -> Vec<bool>
where
    A: HasAtomicNum + HasFormalCharge + HasHydrogenCount,
    B: HasBondOrder,
{
    let mut aromatic = vec![false; mol.atom_count()];
    for ring in rings.rings() {
        if is_aromatic_ring(mol, ring) {
            for &atom_idx in ring {
                aromatic[atom_idx.index()] = true;
            }
        }
    }
    aromatic
}

/// Writes perceived flags back onto the atoms, replacing whatever the reader
/// set.
pub fn annotate_aromaticity(mol: &mut Mol<crate::atom::Atom, crate::bond::Bond>, rings: &RingInfo) {
    let aromatic = perceive_aromatic_atoms(mol, rings);
    let indices: Vec<_> = mol.atoms().collect();
    for idx in indices {
        mol.atom_mut(idx).is_aromatic = aromatic[idx.index()];
    }
}

fn is_aromatic_ring<A, B>(mol: &Mol<A, B>, ring: &[NodeIndex]) -> bool
where
    A: HasAtomicNum + HasFormalCharge + HasHydrogenCount,
    B: HasBondOrder,
{
    if ring.len() < 3 {
        return false;
    }
    if ring
        .iter()
        .any(|&idx| !SP2_CAPABLE.contains(&mol.atom(idx).atomic_num()))
    {
        return false;
    }
    // A triple bond inside the ring rules it out.
    for i in 0..ring.len() {
        if let Some(edge) = mol.bond_between(ring[i], ring[(i + 1) % ring.len()]) {
            if mol.bond(edge).bond_order() == BondOrder::Triple {
                return false;
            }
        }
    }

    let mut pi_total: u8 = 0;
    for (i, &atom_idx) in ring.iter().enumerate() {
        match pi_contribution(mol, atom_idx, ring, i) {
            Some(e) => pi_total = pi_total.saturating_add(e),
            None => return false,
        }
    }
    pi_total >= 2 && (pi_total - 2) % 4 == 0
}

/// π electrons an atom donates to the ring, or `None` when it breaks the
/// conjugation.
fn pi_contribution<A, B>(
    mol: &Mol<A, B>,
    atom_idx: NodeIndex,
    ring: &[NodeIndex],
    pos: usize,
) -> Option<u8>
where
    A: HasAtomicNum + HasFormalCharge + HasHydrogenCount,
    B: HasBondOrder,
{
    let atom = mol.atom(atom_idx);
    let charge = atom.formal_charge();
    let has_double = mol
        .bonds_of(atom_idx)
        .any(|e| mol.bond(e).bond_order() == BondOrder::Double);
    let has_double_in_ring = {
        let len = ring.len();
        [ring[(pos + len - 1) % len], ring[(pos + 1) % len]]
            .into_iter()
            .any(|nb| {
                mol.bond_between(atom_idx, nb)
                    .is_some_and(|e| mol.bond(e).bond_order() == BondOrder::Double)
            })
    };
    let total_degree = mol.neighbors(atom_idx).count() as u8 + atom.hydrogen_count();

    match atom.atomic_num() {
        6 => match (charge, has_double) {
            (0, true) => Some(1),
            (0, false) => None,
            (-1, _) => Some(2),
            (1, true) => Some(1),
            (1, false) => Some(0),
            _ => None,
        },
        7 => match charge {
            0 if has_double => Some(1),
            0 if total_degree <= 3 => Some(2),
            1 if has_double_in_ring => Some(1),
            _ => None,
        },
        8 | 16 | 34 | 52 => {
            if has_double_in_ring {
                Some(1)
            } else {
                Some(2)
            }
        }
        5 => Some(u8::from(has_double)),
        15 | 33 => match (has_double, total_degree) {
            (true, _) => Some(1),
            (false, d) if d <= 3 => Some(2),
            _ => None,
        },
        _ => None,
    }
}
