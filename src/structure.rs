//! Immutable structure values handed to the dataset pipeline.
//!
//! The structure loader converts parsed files into these plain values so that
//! contact labelling, CDR extraction and encoding never depend on a particular
//! file format or parser object graph.

use crate::residues::aa3to1;
use nalgebra::Point3;

/// A single atom: its name and position in Ångströms.
#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    /// Atom name, e.g. `CA`
    pub name: String,
    /// Cartesian coordinates
    pub pos: Point3<f64>,
}

impl Atom {
    /// Create an atom at `(x, y, z)`.
    pub fn new(name: &str, x: f64, y: f64, z: f64) -> Self {
        Self {
            name: name.to_string(),
            pos: Point3::new(x, y, z),
        }
    }
}

/// An observed residue in a chain.
#[derive(Debug, Clone, PartialEq)]
pub struct Residue {
    /// Residue sequence number in the file's numbering scheme
    pub serial: isize,
    /// Insertion code, e.g. `A` for residue 100A
    pub insertion: Option<String>,
    /// Three-letter residue name
    pub name: String,
    /// Resolved atoms, possibly none
    pub atoms: Vec<Atom>,
}

impl Residue {
    /// Create a residue; `insertion` is the insertion code, if any.
    pub fn new(serial: isize, insertion: Option<&str>, name: &str, atoms: Vec<Atom>) -> Self {
        Self {
            serial,
            insertion: insertion.map(str::to_string),
            name: name.to_string(),
            atoms,
        }
    }

    /// One-letter amino acid code; non-standard residues map to `X`.
    pub fn one_letter(&self) -> char {
        aa3to1(&self.name).unwrap_or('X')
    }

    /// Whether this is a water molecule (`HOH` or `WAT`).
    pub fn is_water(&self) -> bool {
        matches!(self.name.as_str(), "HOH" | "WAT")
    }

    /// Residue label such as `100A`.
    pub fn label(&self) -> String {
        format!("{}{}", self.serial, self.insertion.as_deref().unwrap_or(""))
    }
}

/// A chain of residues in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    /// Chain identifier
    pub id: String,
    /// Residues in file order, waters included
    pub residues: Vec<Residue>,
}

impl Chain {
    /// Create a chain from its residues.
    pub fn new(id: &str, residues: Vec<Residue>) -> Self {
        Self {
            id: id.to_string(),
            residues,
        }
    }

    /// One-letter sequence of the chain, skipping waters.
    pub fn sequence(&self) -> String {
        residues_to_seq(self.residues.iter().filter(|r| !r.is_water()))
    }

    /// Every atom of every residue, waters included.
    pub fn atoms(&self) -> impl Iterator<Item = &Atom> {
        self.residues.iter().flat_map(|r| r.atoms.iter())
    }
}

/// The chains of one model of a structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Structure {
    /// Structure identifier, usually the catalog `pdb` value
    pub id: String,
    /// Chains of the first model
    pub chains: Vec<Chain>,
}

impl Structure {
    /// Create a structure from its chains.
    pub fn new(id: &str, chains: Vec<Chain>) -> Self {
        Self {
            id: id.to_string(),
            chains,
        }
    }

    /// Look up a chain by identifier.
    pub fn chain(&self, id: &str) -> Option<&Chain> {
        self.chains.iter().find(|c| c.id == id)
    }
}

/// Concatenate residues into their one-letter sequence.
pub fn residues_to_seq<'a>(residues: impl IntoIterator<Item = &'a Residue>) -> String {
    residues.into_iter().map(Residue::one_letter).collect()
}
