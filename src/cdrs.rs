//! Complementarity-determining region (CDR) definitions and extraction.
//!
//! Regions are located by residue number using the Chothia scheme, widened by
//! a configurable number of flanking residues on either side. Insertion codes
//! (100A, 100B, ...) belong to the range of their residue number.

use crate::structure::{Chain, Residue};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The six canonical CDRs, three on each antibody chain.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, clap::ValueEnum,
)]
pub enum CdrRegion {
    /// Heavy chain CDR 1
    H1,
    /// Heavy chain CDR 2
    H2,
    /// Heavy chain CDR 3
    H3,
    /// Light chain CDR 1
    L1,
    /// Light chain CDR 2
    L2,
    /// Light chain CDR 3
    L3,
}

/// Which antibody chain a region lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AntibodyChain {
    /// Carries H1, H2 and H3
    Heavy,
    /// Carries L1, L2 and L3
    Light,
}

impl CdrRegion {
    /// Canonical ordering used for the region axis of the dataset tensors.
    pub const CANONICAL: [CdrRegion; 6] = [
        CdrRegion::H1,
        CdrRegion::H2,
        CdrRegion::H3,
        CdrRegion::L1,
        CdrRegion::L2,
        CdrRegion::L3,
    ];

    /// Inclusive Chothia residue number range of the region.
    pub fn chothia_range(&self) -> (isize, isize) {
        match self {
            CdrRegion::L1 => (24, 34),
            CdrRegion::L2 => (50, 56),
            CdrRegion::L3 => (89, 97),
            CdrRegion::H1 => (26, 32),
            CdrRegion::H2 => (52, 56),
            CdrRegion::H3 => (95, 102),
        }
    }

    /// The antibody chain carrying this region.
    pub fn chain(&self) -> AntibodyChain {
        match self {
            CdrRegion::H1 | CdrRegion::H2 | CdrRegion::H3 => AntibodyChain::Heavy,
            CdrRegion::L1 | CdrRegion::L2 | CdrRegion::L3 => AntibodyChain::Light,
        }
    }

    /// Whether a residue number falls in the region widened by `flank`.
    pub fn contains(&self, serial: isize, flank: isize) -> bool {
        let (lo, hi) = self.chothia_range();
        (lo - flank..=hi + flank).contains(&serial)
    }
}

impl fmt::Display for CdrRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Residues of `chain` belonging to `region`, in chain order.
///
/// A chain without any residue in the range yields an empty list. Waters
/// numbered into the range are not part of the region.
pub fn extract_region(chain: &Chain, region: CdrRegion, flank: isize) -> Vec<&Residue> {
    chain
        .residues
        .iter()
        .filter(|r| !r.is_water() && region.contains(r.serial, flank))
        .collect()
}

/// Extract several regions from the same chain.
pub fn extract_cdrs<'a>(
    chain: &'a Chain,
    regions: &[CdrRegion],
    flank: isize,
) -> Vec<(CdrRegion, Vec<&'a Residue>)> {
    regions
        .iter()
        .map(|&region| (region, extract_region(chain, region, flank)))
        .collect()
}
