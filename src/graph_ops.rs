use petgraph::graph::NodeIndex;

use crate::mol::Mol;

pub fn connected_components<A, B>(mol: &Mol<A, B>) -> Vec<Vec<NodeIndex>> {
    let n = mol.atom_count();
    let mut visited = vec![false; n];
    let mut components = Vec::new();
    for node in mol.atoms() {
        if visited[node.index()] {
            continue;
        }
        let mut component = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if visited[current.index()] {
                continue;
            }
            visited[current.index()] = true;
            component.push(current);
            for neighbor in mol.neighbors(current) {
                if !visited[neighbor.index()] {
                    stack.push(neighbor);
                }
            }
        }
        component.sort();
        components.push(component);
    }
    components
}

pub fn num_components<A, B>(mol: &Mol<A, B>) -> usize {
    connected_components(mol).len()
}

/// Fragment index for every atom, keyed by atom index. Fragments are numbered
/// in order of their lowest atom index.
pub fn component_ids<A, B>(mol: &Mol<A, B>) -> Vec<usize> {
    let mut ids = vec![usize::MAX; mol.atom_count()];
    for (comp_id, component) in connected_components(mol).iter().enumerate() {
        for node in component {
            ids[node.index()] = comp_id;
        }
    }
    ids
}
