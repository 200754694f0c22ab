//! Ring-count aggregation.
//!
//! Buckets ring counts by size for three ring sets: the smallest-set basis,
//! the fused contribution (rings the exhaustive search finds beyond the
//! basis), and the exhaustive total. The bucket layout is a long-standing
//! external contract:
//!
//! - basis: total, sizes 3..=12, then everything larger,
//! - fused: total difference first (there is no per-size bucket for
//!   three-rings), then sizes 4..=12, then larger,
//! - total: exhaustive count, sizes 4..=12, then larger — exhaustive
//!   three-rings count toward the total only.
//!
//! When the exhaustive enumeration aborts, every bucket reports undefined
//! rather than a partial answer, and the condition is logged so "could not
//! determine" stays distinguishable from "no rings".

use log::warn;

use crate::mol::Mol;
use crate::rings::{RingInfo, RingSearchLimits};

/// Bucket names, in output order.
pub const RING_COUNT_NAMES: [&str; 34] = [
    "nRing", "n3Ring", "n4Ring", "n5Ring", "n6Ring", "n7Ring", "n8Ring", "n9Ring", "n10Ring",
    "n11Ring", "n12Ring", "nG12Ring", "nFRing", "nF4Ring", "nF5Ring", "nF6Ring", "nF7Ring",
    "nF8Ring", "nF9Ring", "nF10Ring", "nF11Ring", "nF12Ring", "nFG12Ring", "nTRing", "nT4Ring",
    "nT5Ring", "nT6Ring", "nT7Ring", "nT8Ring", "nT9Ring", "nT10Ring", "nT11Ring", "nT12Ring",
    "nTG12Ring",
];

/// Result of the aggregation: 34 counts in [`RING_COUNT_NAMES`] order, or
/// the undefined sentinel when ring enumeration failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RingCounts {
    values: Option<[u32; 34]>,
}

impl RingCounts {
    pub fn is_defined(&self) -> bool {
        self.values.is_some()
    }

    pub fn values(&self) -> Option<&[u32; 34]> {
        self.values.as_ref()
    }

    /// Count for a named bucket; `None` when undefined or unknown.
    pub fn get(&self, name: &str) -> Option<u32> {
        let pos = RING_COUNT_NAMES.iter().position(|&n| n == name)?;
        self.values.map(|v| v[pos])
    }
}

pub fn ring_counts<A, B>(mol: &Mol<A, B>) -> RingCounts {
    ring_counts_bounded(mol, &RingSearchLimits::default())
}

pub fn ring_counts_bounded<A, B>(mol: &Mol<A, B>, limits: &RingSearchLimits) -> RingCounts {
    let sssr = RingInfo::sssr(mol);
    // Index 2 holds the total, 3..=12 the per-size counts, 13 the rest.
    let mut basis = [0u32; 14];
    for ring in sssr.rings() {
        let size = ring.len();
        basis[2] += 1;
        if size > 12 {
            basis[13] += 1;
        } else if size >= 3 {
            basis[size] += 1;
        }
    }

    let all = match RingInfo::all(mol, limits) {
        Ok(ri) => ri,
        Err(e) => {
            warn!("ring count aggregation degraded to undefined: {e}");
            return RingCounts { values: None };
        }
    };
    // Index 3 holds the total; three-rings have no per-size bucket here.
    let mut total = [0u32; 14];
    for ring in all.rings() {
        let size = ring.len();
        total[3] += 1;
        if size > 12 {
            total[13] += 1;
        } else if size >= 4 {
            total[size] += 1;
        }
    }

    let mut out = [0u32; 34];
    let mut k = 0;
    for i in 2..14 {
        out[k] = basis[i];
        k += 1;
    }
    out[k] = total[3].saturating_sub(basis[2]);
    k += 1;
    for i in 4..14 {
        out[k] = total[i].saturating_sub(basis[i]);
        k += 1;
    }
    for i in 3..14 {
        out[k] = total[i];
        k += 1;
    }
    RingCounts { values: Some(out) }
}
