use crate::residues::ResidueExt;
use crate::structure::Chain;
use pdbtbx::Chain as PdbChain;

/// Conversions from a parsed [`pdbtbx::Chain`].
pub trait ChainExt {
    /// One-letter sequence of the chain, `X` for anything non-standard.
    fn pdb_seq(&self) -> String;

    /// Copy the chain into an immutable [`Chain`].
    ///
    /// Waters are kept: they still count as antigen atoms for contact labelling.
    fn to_value(&self) -> Chain;
}

impl ChainExt for PdbChain {
    fn pdb_seq(&self) -> String {
        self.residues()
            .filter(|res| !res.is_water())
            .map(|res| res.resn().unwrap_or('X'))
            .collect()
    }

    fn to_value(&self) -> Chain {
        let residues = self.residues().map(|res| res.to_value()).collect();
        Chain::new(self.id(), residues)
    }
}
