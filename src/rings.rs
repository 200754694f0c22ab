use std::collections::VecDeque;
use std::fmt;

use petgraph::algo::connected_components;
use petgraph::graph::NodeIndex;

use crate::mol::Mol;

/// A set of rings over a molecular graph. Each ring is a cycle of atom
/// indices in adjacency order (closing edge implied between last and first).
///
/// Two constructors exist: [`RingInfo::sssr`] builds the minimum cycle basis
/// (smallest set of smallest rings), [`RingInfo::all`] enumerates every
/// simple ring up to a configurable bound.
#[derive(Debug, Clone, PartialEq)]
pub struct RingInfo {
    rings: Vec<Vec<NodeIndex>>,
}

/// Bounds for the exhaustive ring search.
///
/// `max_ring_size` prunes rings (and partial paths) larger than the given
/// atom count; `None` enumerates rings of every size. `max_paths` caps the
/// number of live paths during vertex elimination; fused-ring systems can
/// make the path count blow up exponentially, and hitting the cap aborts the
/// search with [`RingEnumerationError`] instead of running away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingSearchLimits {
    pub max_ring_size: Option<usize>,
    pub max_paths: usize,
}

impl Default for RingSearchLimits {
    fn default() -> Self {
        Self {
            max_ring_size: None,
            max_paths: 1 << 16,
        }
    }
}

/// The exhaustive ring search was aborted before completing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingEnumerationError {
    /// The live-path cap was exceeded during vertex elimination.
    PathLimitExceeded { limit: usize },
}

impl fmt::Display for RingEnumerationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PathLimitExceeded { limit } => {
                write!(f, "ring enumeration exceeded the path limit of {limit}")
            }
        }
    }
}

impl std::error::Error for RingEnumerationError {}

impl RingInfo {
    /// Minimum cycle basis: one shortest independent ring per cyclomatic
    /// degree of freedom, chosen from candidate cycles through every bond.
    pub fn sssr<A, B>(mol: &Mol<A, B>) -> Self {
        let num_expected = Self::expected_ring_count(mol);
        if num_expected == 0 {
            return Self { rings: vec![] };
        }

        let candidates = candidate_cycles(mol);
        let mut basis: Vec<Vec<u64>> = Vec::with_capacity(num_expected);
        let mut rings: Vec<Vec<NodeIndex>> = Vec::with_capacity(num_expected);

        for ring in &candidates {
            if rings.len() >= num_expected {
                break;
            }
            let bv = edge_bitvector(ring, mol);
            if bv.iter().all(|&w| w == 0) {
                continue;
            }
            if add_to_basis(&mut basis, bv) {
                rings.push(normalize_ring(ring));
            }
        }

        rings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        Self { rings }
    }

    /// Every simple ring within `limits`, found by iterated vertex
    /// elimination: collapse one vertex at a time, splicing each pair of
    /// paths that meet there; a spliced path whose two ends coincide is a
    /// ring.
    pub fn all<A, B>(mol: &Mol<A, B>, limits: &RingSearchLimits) -> Result<Self, RingEnumerationError> {
        let n = mol.atom_count();
        let mut paths: Vec<Vec<NodeIndex>> = Vec::new();
        for edge in mol.bonds() {
            if let Some((u, v)) = mol.bond_endpoints(edge) {
                paths.push(vec![u, v]);
            }
        }

        let mut remaining: Vec<bool> = vec![false; n];
        for path in &paths {
            remaining[path[0].index()] = true;
            remaining[path[1].index()] = true;
        }

        let mut rings: Vec<Vec<NodeIndex>> = Vec::new();

        while let Some(x) = next_elimination_vertex(&paths, &remaining, n) {
            let (incident, mut kept): (Vec<Vec<NodeIndex>>, Vec<Vec<NodeIndex>>) =
                paths.into_iter().partition(|p| ends_at(p, x));

            for i in 0..incident.len() {
                for j in (i + 1)..incident.len() {
                    let merged = match splice(&incident[i], &incident[j], x) {
                        Some(m) => m,
                        None => continue,
                    };
                    if merged.first() == merged.last() {
                        let ring = &merged[..merged.len() - 1];
                        if ring.len() >= 3 && fits(ring.len(), limits.max_ring_size) {
                            rings.push(normalize_ring(ring));
                        }
                    } else if fits(merged.len(), limits.max_ring_size) {
                        kept.push(merged);
                    }
                }
            }

            if kept.len() > limits.max_paths {
                return Err(RingEnumerationError::PathLimitExceeded {
                    limit: limits.max_paths,
                });
            }

            remaining[x.index()] = false;
            paths = kept;
        }

        rings.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        rings.dedup();
        Ok(Self { rings })
    }

    pub fn num_rings(&self) -> usize {
        self.rings.len()
    }

    pub fn rings(&self) -> &[Vec<NodeIndex>] {
        &self.rings
    }

    pub fn is_ring_atom(&self, atom: NodeIndex) -> bool {
        self.rings.iter().any(|ring| ring.contains(&atom))
    }

    pub fn is_ring_bond(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.rings.iter().any(|ring| {
            let len = ring.len();
            (0..len).any(|i| {
                let j = (i + 1) % len;
                (ring[i] == a && ring[j] == b) || (ring[i] == b && ring[j] == a)
            })
        })
    }

    pub fn smallest_ring_size(&self, atom: NodeIndex) -> Option<usize> {
        self.rings
            .iter()
            .filter(|ring| ring.contains(&atom))
            .map(|ring| ring.len())
            .min()
    }

    pub fn atom_rings(&self, atom: NodeIndex) -> Vec<&Vec<NodeIndex>> {
        self.rings
            .iter()
            .filter(|ring| ring.contains(&atom))
            .collect()
    }

    /// Cyclomatic number: `bonds - atoms + components`.
    pub fn expected_ring_count<A, B>(mol: &Mol<A, B>) -> usize {
        let v = mol.atom_count();
        let e = mol.bond_count();
        let c = connected_components(mol.graph());
        (e + c).saturating_sub(v)
    }
}

fn fits(size: usize, bound: Option<usize>) -> bool {
    bound.is_none_or(|max| size <= max)
}

fn ends_at(path: &[NodeIndex], x: NodeIndex) -> bool {
    path.first() == Some(&x) || path.last() == Some(&x)
}

/// The remaining vertex touched by the fewest paths; eliminating the least
/// connected vertex first keeps the intermediate path count down.
fn next_elimination_vertex(
    paths: &[Vec<NodeIndex>],
    remaining: &[bool],
    n: usize,
) -> Option<NodeIndex> {
    let mut counts = vec![0usize; n];
    for path in paths {
        counts[path[0].index()] += 1;
        counts[path[path.len() - 1].index()] += 1;
    }
    (0..n)
        .filter(|&i| remaining[i] && counts[i] > 0)
        .min_by_key(|&i| (counts[i], i))
        .map(NodeIndex::new)
}

/// Join two paths at their shared end `x`. Returns `None` when the paths
/// overlap anywhere besides their endpoints (the result would not be simple).
fn splice(p: &[NodeIndex], q: &[NodeIndex], x: NodeIndex) -> Option<Vec<NodeIndex>> {
    let mut left: Vec<NodeIndex> = p.to_vec();
    if left[0] == x {
        left.reverse();
    }
    let mut right: Vec<NodeIndex> = q.to_vec();
    if right[right.len() - 1] == x {
        right.reverse();
    }
    debug_assert_eq!(left[left.len() - 1], x);
    debug_assert_eq!(right[0], x);

    let closes = left[0] == right[right.len() - 1];
    let left_interior = &left[if closes { 1 } else { 0 }..left.len() - 1];
    for node in &right[1..right.len() - if closes { 1 } else { 0 }] {
        if left_interior.contains(node) {
            return None;
        }
    }

    left.extend_from_slice(&right[1..]);
    Some(left)
}

/// Candidate cycles for the basis: for each bond and each third vertex, glue
/// the two shortest paths from that vertex to the bond's endpoints, provided
/// they only meet at the vertex itself.
fn candidate_cycles<A, B>(mol: &Mol<A, B>) -> Vec<Vec<NodeIndex>> {
    let n = mol.atom_count();
    let (dist, pred) = bfs_forest(mol, n);

    let mut candidates: Vec<Vec<NodeIndex>> = Vec::new();

    for edge in mol.bonds() {
        let (u, v) = match mol.bond_endpoints(edge) {
            Some(pair) => pair,
            None => continue,
        };
        for w_idx in 0..n {
            let w = NodeIndex::new(w_idx);
            let du = dist[w_idx][u.index()];
            let dv = dist[w_idx][v.index()];
            if du == u32::MAX || dv == u32::MAX {
                continue;
            }
            if (du as usize + dv as usize + 1) < 3 {
                continue;
            }
            let path_u = walk_back(&pred, w, u);
            let path_v = walk_back(&pred, w, v);
            if paths_share_internal_node(&path_u, &path_v) {
                continue;
            }
            let mut ring = path_u;
            for &node in path_v[1..].iter().rev() {
                ring.push(node);
            }
            candidates.push(ring);
        }
    }

    candidates.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
    candidates.dedup();
    candidates
}

/// Breadth-first distances and predecessors from every source at once.
fn bfs_forest<A, B>(mol: &Mol<A, B>, n: usize) -> (Vec<Vec<u32>>, Vec<Vec<Option<NodeIndex>>>) {
    let mut dist = vec![vec![u32::MAX; n]; n];
    let mut pred = vec![vec![None; n]; n];
    for src_idx in 0..n {
        let src = NodeIndex::new(src_idx);
        dist[src_idx][src_idx] = 0;
        let mut queue = VecDeque::new();
        queue.push_back(src);
        while let Some(cur) = queue.pop_front() {
            let d = dist[src_idx][cur.index()];
            for nb in mol.neighbors(cur) {
                if dist[src_idx][nb.index()] == u32::MAX {
                    dist[src_idx][nb.index()] = d + 1;
                    pred[src_idx][nb.index()] = Some(cur);
                    queue.push_back(nb);
                }
            }
        }
    }
    (dist, pred)
}

fn walk_back(
    pred: &[Vec<Option<NodeIndex>>],
    src: NodeIndex,
    dst: NodeIndex,
) -> Vec<NodeIndex> {
    let mut path = vec![dst];
    let mut cur = dst;
    while cur != src {
        match pred[src.index()][cur.index()] {
            Some(p) => {
                path.push(p);
                cur = p;
            }
            None => return vec![],
        }
    }
    path.reverse();
    path
}

fn paths_share_internal_node(path_u: &[NodeIndex], path_v: &[NodeIndex]) -> bool {
    if path_u.len() < 2 || path_v.len() < 2 {
        return false;
    }
    path_u[1..].iter().any(|node| path_v[1..].contains(node))
}

/// Ring as a bitvector over bond indices, for GF(2) independence tests.
fn edge_bitvector<A, B>(ring: &[NodeIndex], mol: &Mol<A, B>) -> Vec<u64> {
    let num_words = mol.bond_count().div_ceil(64);
    let mut bv = vec![0u64; num_words];
    let len = ring.len();
    for i in 0..len {
        let a = ring[i];
        let b = ring[(i + 1) % len];
        if let Some(edge) = mol.bond_between(a, b) {
            let idx = edge.index();
            bv[idx / 64] |= 1u64 << (idx % 64);
        }
    }
    bv
}

/// Gaussian elimination step over GF(2). Returns false when the candidate is
/// linearly dependent on the rows already in the basis.
fn add_to_basis(basis: &mut Vec<Vec<u64>>, candidate: Vec<u64>) -> bool {
    let mut v = candidate;
    for row in basis.iter() {
        if let Some(p) = leading_bit(row) {
            if v[p / 64] & (1u64 << (p % 64)) != 0 {
                xor_into(&mut v, row);
            }
        }
    }
    if v.iter().all(|&w| w == 0) {
        return false;
    }
    basis.push(v);
    true
}

fn leading_bit(bv: &[u64]) -> Option<usize> {
    bv.iter()
        .enumerate()
        .find(|(_, &word)| word != 0)
        .map(|(i, &word)| i * 64 + word.trailing_zeros() as usize)
}

fn xor_into(a: &mut [u64], b: &[u64]) {
    for (aw, bw) in a.iter_mut().zip(b.iter()) {
        *aw ^= *bw;
    }
}

/// Rotate the cycle to start at its lowest index and fix the direction so the
/// second element is the smaller neighbor. Makes equal rings compare equal.
fn normalize_ring(ring: &[NodeIndex]) -> Vec<NodeIndex> {
    if ring.is_empty() {
        return vec![];
    }
    let min_pos = ring
        .iter()
        .enumerate()
        .min_by_key(|&(_, idx)| idx)
        .map(|(i, _)| i)
        .unwrap();

    let len = ring.len();
    let mut normalized = Vec::with_capacity(len);
    for i in 0..len {
        normalized.push(ring[(min_pos + i) % len]);
    }

    if len > 2 && normalized[1] > normalized[len - 1] {
        normalized[1..].reverse();
    }

    normalized
}
