use crate::structure::{Atom, Residue};
use pdbtbx::Residue as PdbResidue;

/// Map a three-letter residue name to its one-letter amino acid code.
///
/// Returns `None` for anything that is not one of the 20 standard amino acids.
pub fn aa3to1(name: &str) -> Option<char> {
    let aa_code = match name.to_uppercase().as_str() {
        "ALA" => 'A',
        "ARG" => 'R',
        "ASN" => 'N',
        "ASP" => 'D',
        "CYS" => 'C',
        "GLN" => 'Q',
        "GLU" => 'E',
        "GLY" => 'G',
        "HIS" => 'H',
        "ILE" => 'I',
        "LEU" => 'L',
        "LYS" => 'K',
        "MET" => 'M',
        "PHE" => 'F',
        "PRO" => 'P',
        "SER" => 'S',
        "THR" => 'T',
        "TRP" => 'W',
        "TYR" => 'Y',
        "VAL" => 'V',
        _ => 'X',
    };

    match aa_code {
        'X' => None,
        _ => Some(aa_code),
    }
}

/// Helpers on a parsed [`pdbtbx::Residue`].
pub trait ResidueExt {
    /// The residue one-letter code, `O` for water, or `None` if it's not an amino acid.
    fn resn(&self) -> Option<char>;

    /// Whether the residue is a water molecule.
    fn is_water(&self) -> bool;

    /// Copy the residue and all of its atoms into an immutable [`Residue`].
    fn to_value(&self) -> Residue;
}

impl ResidueExt for PdbResidue {
    fn resn(&self) -> Option<char> {
        match self.name() {
            Some(name) if matches!(name, "HOH" | "WAT") => Some('O'),
            Some(name) => aa3to1(name),
            None => None,
        }
    }

    fn is_water(&self) -> bool {
        self.resn() == Some('O')
    }

    fn to_value(&self) -> Residue {
        let (serial, insertion) = self.id();
        let atoms = self
            .atoms()
            .map(|atom| {
                let (x, y, z) = atom.pos();
                Atom::new(atom.name(), x, y, z)
            })
            .collect();
        Residue::new(serial, insertion, self.name().unwrap_or(""), atoms)
    }
}
