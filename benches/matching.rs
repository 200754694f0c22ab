use criterion::{black_box, criterion_group, criterion_main, Criterion};

use molmatch::{
    ring_counts, Atom, AtomExpr, Bond, BondExpr, BondOrder, Mol, Pattern, RingInfo,
    RingSearchLimits,
};

fn carbon() -> Atom {
    Atom {
        atomic_num: 6,
        hydrogen_count: 1,
        ..Atom::default()
    }
}

fn kekule_ring(size: usize) -> Mol<Atom, Bond> {
    let mut mol = Mol::new();
    let nodes: Vec<_> = (0..size).map(|_| mol.add_atom(carbon())).collect();
    for i in 0..size {
        let order = if i % 2 == 0 {
            BondOrder::Double
        } else {
            BondOrder::Single
        };
        mol.add_bond(
            nodes[i],
            nodes[(i + 1) % size],
            Bond {
                order,
                ..Bond::default()
            },
        );
    }
    mol
}

/// Linear chain of fused six-rings, `count` rings long.
fn fused_chain(count: usize) -> Mol<Atom, Bond> {
    let mut mol = Mol::new();
    let mut shared = {
        let a = mol.add_atom(carbon());
        let b = mol.add_atom(carbon());
        mol.add_bond(a, b, Bond::default());
        (a, b)
    };
    for _ in 0..count {
        let mut prev = shared.1;
        let mut ring_atoms = Vec::new();
        for _ in 0..4 {
            let n = mol.add_atom(carbon());
            mol.add_bond(prev, n, Bond::default());
            ring_atoms.push(n);
            prev = n;
        }
        mol.add_bond(prev, shared.0, Bond::default());
        shared = (ring_atoms[1], ring_atoms[2]);
    }
    mol
}

fn aromatic_six_ring_query() -> Mol<AtomExpr, BondExpr> {
    let mut q = Mol::new();
    let nodes: Vec<_> = (0..6)
        .map(|_| {
            q.add_atom(AtomExpr::Element {
                atomic_num: 6,
                aromatic: Some(true),
            })
        })
        .collect();
    for i in 0..6 {
        q.add_bond(nodes[i], nodes[(i + 1) % 6], BondExpr::Aromatic);
    }
    q
}

fn chain_query(len: usize) -> Mol<AtomExpr, BondExpr> {
    let mut q = Mol::new();
    let nodes: Vec<_> = (0..len)
        .map(|_| {
            q.add_atom(AtomExpr::Element {
                atomic_num: 6,
                aromatic: None,
            })
        })
        .collect();
    for i in 1..len {
        q.add_bond(nodes[i - 1], nodes[i], BondExpr::SingleOrAromatic);
    }
    q
}

fn bench_match(c: &mut Criterion) {
    let benzene = kekule_ring(6);
    let fused = fused_chain(6);
    let ring_pattern = Pattern::compile(aromatic_six_ring_query()).unwrap();
    let chain_pattern = Pattern::compile(chain_query(4)).unwrap();

    let mut group = c.benchmark_group("match");
    group.bench_function("aromatic_ring_in_benzene", |b| {
        b.iter(|| black_box(ring_pattern.matches(black_box(&benzene)).unwrap()))
    });
    group.bench_function("chain_all_matches_in_fused", |b| {
        b.iter(|| {
            black_box(
                chain_pattern
                    .match_all(black_box(&fused))
                    .unwrap()
                    .count(),
            )
        })
    });
    group.bench_function("unique_matches_in_fused", |b| {
        b.iter(|| {
            black_box(
                chain_pattern
                    .match_all(black_box(&fused))
                    .unwrap()
                    .unique()
                    .count(),
            )
        })
    });
    group.finish();
}

fn bench_rings(c: &mut Criterion) {
    let fused = fused_chain(8);
    let mut group = c.benchmark_group("rings");
    group.bench_function("sssr_fused_chain", |b| {
        b.iter(|| black_box(RingInfo::sssr(black_box(&fused)).num_rings()))
    });
    group.bench_function("all_rings_fused_chain", |b| {
        b.iter(|| {
            black_box(
                RingInfo::all(black_box(&fused), &RingSearchLimits::default())
                    .unwrap()
                    .num_rings(),
            )
        })
    });
    group.bench_function("ring_counts_fused_chain", |b| {
        b.iter(|| black_box(ring_counts(black_box(&fused)).is_defined()))
    });
    group.finish();
}

fn bench_recursive(c: &mut Criterion) {
    let fused = fused_chain(4);
    let mut nested = Mol::new();
    let root = nested.add_atom(AtomExpr::Element {
        atomic_num: 6,
        aromatic: None,
    });
    let branch = nested.add_atom(AtomExpr::InRing);
    nested.add_bond(root, branch, BondExpr::SingleOrAromatic);
    let mut q = Mol::new();
    q.add_atom(AtomExpr::Recursive(nested));
    let pattern = Pattern::compile(q).unwrap();

    c.bench_function("recursive_predicate_in_fused", |b| {
        b.iter(|| black_box(pattern.match_all(black_box(&fused)).unwrap().count()))
    });
}

criterion_group!(benches, bench_match, bench_rings, bench_recursive);
criterion_main!(benches);
