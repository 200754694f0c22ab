pub mod aromaticity;
pub mod atom;
pub mod bond;
pub mod expr;
pub mod filters;
pub mod graph_ops;
pub mod mol;
pub mod pattern;
mod recursive;
pub mod ringcount;
pub mod rings;
pub mod search;
pub mod substruct;
pub mod traits;

pub use atom::{Atom, Chirality};
pub use bond::{Bond, BondOrder, BondStereo};
pub use expr::{AtomExpr, BondExpr, MatchContext, PreparationMissingError};
pub use mol::Mol;
pub use pattern::{Mappings, Pattern, Preparation, QueryError, UniqueMappings};
pub use ringcount::{ring_counts, ring_counts_bounded, RingCounts, RING_COUNT_NAMES};
pub use rings::{RingEnumerationError, RingInfo, RingSearchLimits};
pub use search::{Mapping, MatchPolicy, SearchState};
pub use substruct::{
    get_substruct_match, get_substruct_match_with, get_substruct_matches,
    get_substruct_matches_with, has_substruct_match, has_substruct_match_with,
};
pub use traits::{
    HasAromaticity, HasAtomicNum, HasBondOrder, HasFormalCharge, HasHydrogenCount,
};
