use petgraph::graph::NodeIndex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondOrder {
    #[default]
    Single,
    Double,
    Triple,
}

/// Double-bond geometry, stored as a pair of reference atoms.
///
/// `Cis(a, b)` means reference atom `a` (a substituent of one endpoint) and
/// reference atom `b` (a substituent of the other endpoint) lie on the same
/// side of the bond; `Trans` means opposite sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BondStereo {
    #[default]
    None,
    Cis(NodeIndex, NodeIndex),
    Trans(NodeIndex, NodeIndex),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bond {
    pub order: BondOrder,
    pub stereo: BondStereo,
}

impl Default for Bond {
    fn default() -> Self {
        Self {
            order: BondOrder::Single,
            stereo: BondStereo::None,
        }
    }
}

impl crate::traits::HasBondOrder for Bond {
    fn bond_order(&self) -> BondOrder {
        self.order
    }
}
