//! Residue-antigen contact detection.
//!
//! Antigen atoms are pooled into an R*-tree once per structure, and each CDR
//! residue is then labelled by a radius query around its atoms.

use crate::structure::{Atom, Chain, Residue};
use rstar::RTree;

/// Spatial index over the atoms of one or more antigen chains.
pub struct AntigenIndex {
    tree: RTree<[f64; 3]>,
    /// Distance cutoff in Ångströms for a residue to count as in contact
    pub contact_distance: f64,
}

impl AntigenIndex {
    /// Bulk-load an index from any collection of atoms.
    pub fn new<'a>(atoms: impl IntoIterator<Item = &'a Atom>, contact_distance: f64) -> Self {
        let points: Vec<[f64; 3]> = atoms
            .into_iter()
            .map(|a| [a.pos.x, a.pos.y, a.pos.z])
            .collect();
        Self {
            tree: RTree::bulk_load(points),
            contact_distance,
        }
    }

    /// Pool every atom of several chains, waters included, into one index.
    pub fn from_chains(chains: &[&Chain], contact_distance: f64) -> Self {
        Self::new(chains.iter().flat_map(|c| c.atoms()), contact_distance)
    }

    /// Index the atoms of the given residues only.
    pub fn from_residues<'a>(
        residues: impl IntoIterator<Item = &'a Residue>,
        contact_distance: f64,
    ) -> Self {
        Self::new(
            residues.into_iter().flat_map(|r| r.atoms.iter()),
            contact_distance,
        )
    }

    /// Number of indexed atoms.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    /// Whether no atom is indexed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether any indexed atom lies within the contact distance of `atom`.
    fn atom_in_contact(&self, atom: &Atom) -> bool {
        let max_radius_squared = self.contact_distance * self.contact_distance;
        self.tree
            .locate_within_distance([atom.pos.x, atom.pos.y, atom.pos.z], max_radius_squared)
            .next()
            .is_some()
    }

    /// Smallest distance between any atom of `residue` and any antigen atom.
    pub fn min_distance(&self, residue: &Residue) -> Option<f64> {
        residue
            .atoms
            .iter()
            .filter_map(|atom| {
                let query = [atom.pos.x, atom.pos.y, atom.pos.z];
                self.tree.nearest_neighbor(&query).map(|p| {
                    nalgebra::distance(&atom.pos, &nalgebra::Point3::new(p[0], p[1], p[2]))
                })
            })
            .min_by(f64::total_cmp)
    }
}

/// Decide whether a residue touches the antigen.
///
/// A residue without resolved atoms is never in contact.
pub fn is_in_contact(residue: &Residue, antigen: &AntigenIndex) -> bool {
    residue.atoms.iter().any(|atom| antigen.atom_in_contact(atom))
}
