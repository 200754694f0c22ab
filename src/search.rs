use std::cmp::Reverse;

use petgraph::graph::{EdgeIndex, NodeIndex};

use crate::mol::Mol;

/// One complete embedding of a query graph into a target graph.
///
/// Records the target atom for every query atom and the target bond for
/// every query bond. The bond images are kept separately because the node
/// images alone only determine them uniquely on simple graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mapping {
    nodes: Vec<NodeIndex>,
    bonds: Vec<EdgeIndex>,
}

impl Mapping {
    #[cfg(test)]
    pub(crate) fn from_parts(nodes: Vec<NodeIndex>, bonds: Vec<EdgeIndex>) -> Self {
        Self { nodes, bonds }
    }

    /// Target atom matched to the given query atom.
    pub fn node(&self, query_atom: NodeIndex) -> NodeIndex {
        self.nodes[query_atom.index()]
    }

    /// Target bond matched to the given query bond.
    pub fn bond(&self, query_bond: EdgeIndex) -> EdgeIndex {
        self.bonds[query_bond.index()]
    }

    /// Target atoms indexed by query atom index.
    pub fn nodes(&self) -> &[NodeIndex] {
        &self.nodes
    }

    /// Target bonds indexed by query bond index.
    pub fn bonds(&self) -> &[EdgeIndex] {
        &self.bonds
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// `(query atom, target atom)` pairs in query index order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex)> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .map(|(q, &t)| (NodeIndex::new(q), t))
    }

    /// The set of target atoms this mapping touches, sorted. Two symmetric
    /// embeddings onto the same substructure share this key.
    pub fn target_key(&self) -> Vec<NodeIndex> {
        let mut key = self.nodes.clone();
        key.sort();
        key
    }
}

/// Node and edge compatibility oracle consulted by the search for every
/// candidate pairing.
pub trait MatchPolicy {
    fn atom_matches(&self, query_atom: NodeIndex, target_atom: NodeIndex) -> bool;
    fn bond_matches(&self, query_bond: EdgeIndex, target_bond: EdgeIndex) -> bool;
}

/// Fixed visit order for the query atoms: each connected component starts at
/// its highest-degree atom and expands breadth-first, so every atom after a
/// component seed has an already-visited neighbor and candidate pruning can
/// stay local.
pub fn traversal_order<A, B>(query: &Mol<A, B>) -> Vec<NodeIndex> {
    let n = query.atom_count();
    let degree = |i: usize| query.neighbors(NodeIndex::new(i)).count();
    let mut order = Vec::with_capacity(n);
    let mut seen = vec![false; n];

    while let Some(seed) = (0..n)
        .filter(|&i| !seen[i])
        .min_by_key(|&i| (Reverse(degree(i)), i))
    {
        seen[seed] = true;
        order.push(NodeIndex::new(seed));
        let mut head = order.len() - 1;
        while head < order.len() {
            let cur = order[head];
            head += 1;
            let mut next: Vec<usize> = query
                .neighbors(cur)
                .map(|nb| nb.index())
                .filter(|&i| !seen[i])
                .collect();
            next.sort_by_key(|&i| (Reverse(degree(i)), i));
            for i in next {
                if !seen[i] {
                    seen[i] = true;
                    order.push(NodeIndex::new(i));
                }
            }
        }
    }
    order
}

struct Frame {
    candidates: Vec<NodeIndex>,
    next: usize,
    chosen: Option<NodeIndex>,
}

/// Resumable backtracking search state.
///
/// The traversal lives on an explicit frame stack rather than the call
/// stack: each [`SearchState::next_mapping`] call resumes where the previous
/// one stopped, so enumeration is lazy and the caller controls how far it
/// runs by simply not asking for more.
pub struct SearchState {
    order: Vec<NodeIndex>,
    query_map: Vec<Option<NodeIndex>>,
    target_used: Vec<bool>,
    frames: Vec<Frame>,
    started: bool,
    exhausted: bool,
}

impl SearchState {
    pub fn new<A, B>(query: &Mol<A, B>, target_atom_count: usize) -> Self {
        Self::with_order(traversal_order(query), query.atom_count(), target_atom_count)
    }

    /// Builds a state with a caller-supplied visit order (one entry per query
    /// atom).
    pub fn with_order(
        order: Vec<NodeIndex>,
        query_atom_count: usize,
        target_atom_count: usize,
    ) -> Self {
        Self {
            order,
            query_map: vec![None; query_atom_count],
            target_used: vec![false; target_atom_count],
            frames: Vec::new(),
            started: false,
            exhausted: false,
        }
    }

    /// Advances the traversal to the next complete embedding, or `None` when
    /// the search space is exhausted.
    pub fn next_mapping<QA, QB, TA, TB, P: MatchPolicy>(
        &mut self,
        query: &Mol<QA, QB>,
        target: &Mol<TA, TB>,
        policy: &P,
    ) -> Option<Mapping> {
        if self.exhausted {
            return None;
        }
        if self.order.is_empty() {
            // A query with no atoms embeds exactly once, trivially.
            self.exhausted = true;
            return Some(Mapping {
                nodes: vec![],
                bonds: vec![],
            });
        }
        if !self.started {
            self.started = true;
            let first = self.candidates_for(0, query, target);
            self.frames.push(Frame {
                candidates: first,
                next: 0,
                chosen: None,
            });
        }

        'descend: while let Some(depth) = self.frames.len().checked_sub(1) {
            // Undo this frame's current assignment; on re-entry after an
            // emitted mapping this is the backtracking step.
            if let Some(t) = self.frames[depth].chosen.take() {
                self.query_map[self.order[depth].index()] = None;
                self.target_used[t.index()] = false;
            }

            while self.frames[depth].next < self.frames[depth].candidates.len() {
                let t = self.frames[depth].candidates[self.frames[depth].next];
                self.frames[depth].next += 1;

                if self.target_used[t.index()] {
                    continue;
                }
                let q = self.order[depth];
                if !self.feasible(q, t, query, target, policy) {
                    continue;
                }

                self.query_map[q.index()] = Some(t);
                self.target_used[t.index()] = true;
                self.frames[depth].chosen = Some(t);

                if self.frames.len() == self.order.len() {
                    return Some(self.complete_mapping(query, target));
                }
                let next_candidates = self.candidates_for(depth + 1, query, target);
                self.frames.push(Frame {
                    candidates: next_candidates,
                    next: 0,
                    chosen: None,
                });
                continue 'descend;
            }

            self.frames.pop();
        }

        self.exhausted = true;
        None
    }

    /// Candidate target atoms for the query atom at the given depth. When
    /// some neighbor of the query atom is already mapped, only the unused
    /// target neighbors of its image can extend the embedding; otherwise the
    /// whole target is in play.
    fn candidates_for<QA, QB, TA, TB>(
        &self,
        depth: usize,
        query: &Mol<QA, QB>,
        target: &Mol<TA, TB>,
    ) -> Vec<NodeIndex> {
        let q = self.order[depth];
        let mapped_neighbor = query
            .neighbors(q)
            .find_map(|nb| self.query_map[nb.index()]);
        match mapped_neighbor {
            Some(image) => target.neighbors(image).collect(),
            None => target.atoms().collect(),
        }
    }

    fn feasible<QA, QB, TA, TB, P: MatchPolicy>(
        &self,
        q: NodeIndex,
        t: NodeIndex,
        query: &Mol<QA, QB>,
        target: &Mol<TA, TB>,
        policy: &P,
    ) -> bool {
        if !policy.atom_matches(q, t) {
            return false;
        }
        for q_neighbor in query.neighbors(q) {
            if let Some(t_mapped) = self.query_map[q_neighbor.index()] {
                let q_bond = query
                    .bond_between(q, q_neighbor)
                    .expect("neighbors are connected");
                match target.bond_between(t, t_mapped) {
                    Some(t_bond) => {
                        if !policy.bond_matches(q_bond, t_bond) {
                            return false;
                        }
                    }
                    None => return false,
                }
            }
        }
        true
    }

    fn complete_mapping<QA, QB, TA, TB>(
        &self,
        query: &Mol<QA, QB>,
        target: &Mol<TA, TB>,
    ) -> Mapping {
        let nodes: Vec<NodeIndex> = self
            .query_map
            .iter()
            .map(|m| m.expect("mapping is total on emit"))
            .collect();
        let bonds: Vec<EdgeIndex> = query
            .bonds()
            .map(|q_bond| {
                let (qa, qb) = query
                    .bond_endpoints(q_bond)
                    .expect("bond index comes from this graph");
                target
                    .bond_between(nodes[qa.index()], nodes[qb.index()])
                    .expect("feasibility checked every mapped edge")
            })
            .collect();
        Mapping { nodes, bonds }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atom::Atom;
    use crate::bond::Bond;

    struct AnyPolicy;

    impl MatchPolicy for AnyPolicy {
        fn atom_matches(&self, _q: NodeIndex, _t: NodeIndex) -> bool {
            true
        }
        fn bond_matches(&self, _qb: EdgeIndex, _tb: EdgeIndex) -> bool {
            true
        }
    }

    fn carbon_chain(len: usize) -> Mol<Atom, Bond> {
        let mut mol = Mol::new();
        let atoms: Vec<_> = (0..len)
            .map(|_| {
                mol.add_atom(Atom {
                    atomic_num: 6,
                    ..Atom::default()
                })
            })
            .collect();
        for i in 1..len {
            mol.add_bond(atoms[i - 1], atoms[i], Bond::default());
        }
        mol
    }

    fn carbon_cycle(size: usize) -> Mol<Atom, Bond> {
        let mut mol = carbon_chain(size);
        mol.add_bond(NodeIndex::new(size - 1), NodeIndex::new(0), Bond::default());
        mol
    }

    fn all_mappings(query: &Mol<Atom, Bond>, target: &Mol<Atom, Bond>) -> Vec<Mapping> {
        let mut state = SearchState::new(query, target.atom_count());
        let mut out = Vec::new();
        while let Some(m) = state.next_mapping(query, target, &AnyPolicy) {
            out.push(m);
        }
        out
    }

    #[test]
    fn order_starts_at_max_degree() {
        let mut mol = carbon_chain(3);
        let extra = mol.add_atom(Atom::default());
        mol.add_bond(NodeIndex::new(1), extra, Bond::default());
        let order = traversal_order(&mol);
        assert_eq!(order[0], NodeIndex::new(1));
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn order_covers_disconnected_components() {
        let mut mol = carbon_chain(2);
        mol.add_atom(Atom::default());
        let order = traversal_order(&mol);
        assert_eq!(order.len(), 3);
    }

    #[test]
    fn edge_into_chain() {
        let target = carbon_chain(3);
        let query = carbon_chain(2);
        // Two placements, each in two orientations.
        assert_eq!(all_mappings(&query, &target).len(), 4);
    }

    #[test]
    fn cycle_automorphisms() {
        let target = carbon_cycle(6);
        let query = carbon_cycle(6);
        // 6 rotations times 2 reflections.
        assert_eq!(all_mappings(&query, &target).len(), 12);
    }

    #[test]
    fn too_large_query_has_no_embedding() {
        let target = carbon_chain(2);
        let query = carbon_chain(3);
        assert!(all_mappings(&query, &target).is_empty());
    }

    #[test]
    fn empty_query_embeds_once() {
        let target = carbon_chain(2);
        let query: Mol<Atom, Bond> = Mol::new();
        let maps = all_mappings(&query, &target);
        assert_eq!(maps.len(), 1);
        assert!(maps[0].is_empty());
    }

    #[test]
    fn mapping_records_bond_images() {
        let target = carbon_cycle(3);
        let query = carbon_chain(2);
        for m in all_mappings(&query, &target) {
            assert_eq!(m.bonds().len(), 1);
            let (ta, tb) = target.bond_endpoints(m.bonds()[0]).unwrap();
            let imgs = m.target_key();
            assert!(imgs.contains(&ta) && imgs.contains(&tb));
        }
    }

    #[test]
    fn lazy_enumeration_resumes() {
        let target = carbon_cycle(6);
        let query = carbon_chain(2);
        let mut state = SearchState::new(&query, target.atom_count());
        let first = state.next_mapping(&query, &target, &AnyPolicy).unwrap();
        let second = state.next_mapping(&query, &target, &AnyPolicy).unwrap();
        assert_ne!(first, second);
        let mut rest = 2;
        while state.next_mapping(&query, &target, &AnyPolicy).is_some() {
            rest += 1;
        }
        assert_eq!(rest, 12);
        // Exhausted stays exhausted.
        assert!(state.next_mapping(&query, &target, &AnyPolicy).is_none());
    }

    #[test]
    fn injectivity() {
        let target = carbon_chain(4);
        let query = carbon_chain(3);
        for m in all_mappings(&query, &target) {
            let mut key = m.target_key();
            key.dedup();
            assert_eq!(key.len(), m.len());
        }
    }

    #[test]
    fn disconnected_query_spans_fragments() {
        let mut target = carbon_chain(2);
        target.add_atom(Atom {
            atomic_num: 8,
            ..Atom::default()
        });
        let mut query: Mol<Atom, Bond> = Mol::new();
        query.add_atom(Atom::default());
        query.add_atom(Atom::default());
        // Unconstrained 2-atom disconnected query on a 3-atom target:
        // ordered pairs of distinct atoms.
        assert_eq!(all_mappings(&query, &target).len(), 6);
    }

    #[test]
    fn deterministic_enumeration_order() {
        let target = carbon_cycle(6);
        let query = carbon_chain(3);
        let a = all_mappings(&query, &target);
        let b = all_mappings(&query, &target);
        assert_eq!(a, b);
    }
}
