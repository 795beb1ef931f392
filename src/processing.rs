//! Per-structure feature, label and mask extraction.

use crate::cdrs::{extract_region, AntibodyChain, CdrRegion};
use crate::config::DatasetConfig;
use crate::contacts::{is_in_contact, AntigenIndex};
use crate::encoding::FeatureEncoder;
use crate::errors::{DatasetError, Result};
use crate::structure::{residues_to_seq, Chain, Residue};
use ndarray::{s, stack, Array2, Array3, ArrayView2, Axis};
use tracing::{trace, warn};

/// Padded tensors and contact statistics of one antibody-antigen pair.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainFeatures {
    /// `(regions, max_cdr_len, F)`
    pub cdrs: Array3<f32>,
    /// `(regions, max_cdr_len, 1)`
    pub lbls: Array3<f32>,
    /// `(regions, max_cdr_len, 1)`
    pub masks: Array3<u8>,
    /// CDR residues touching the antigen
    pub num_in_contact: usize,
    /// CDR residues across all regions
    pub num_residues: usize,
}

/// Padded matrices of a single region.
struct PaddedRegion {
    features: Array2<f32>,
    labels: Array2<f32>,
    mask: Array2<u8>,
}

/// Zero-pad an encoded region and build its label and mask columns.
fn pad_region(
    region: CdrRegion,
    raw: ArrayView2<f32>,
    contacts: &[bool],
    max_cdr_len: usize,
) -> Result<PaddedRegion> {
    let len = raw.nrows();
    if len > max_cdr_len {
        return Err(DatasetError::CdrTooLong {
            region,
            len,
            max_cdr_len,
        });
    }

    let mut features = Array2::<f32>::zeros((max_cdr_len, raw.ncols()));
    features.slice_mut(s![..len, ..]).assign(&raw);

    let mut labels = Array2::<f32>::zeros((max_cdr_len, 1));
    for (i, &c) in contacts.iter().enumerate() {
        labels[[i, 0]] = if c { 1.0 } else { 0.0 };
    }

    let mut mask = Array2::<u8>::zeros((max_cdr_len, 1));
    mask.slice_mut(s![..len, ..]).fill(1);

    Ok(PaddedRegion {
        features,
        labels,
        mask,
    })
}

/// Turn one antibody (heavy + light chain) and its antigen into padded,
/// masked per-region tensors.
///
/// Regions are laid out along the first axis in `config.regions` order.
/// A region longer than `config.max_cdr_len` is rejected with
/// [`DatasetError::CdrTooLong`] rather than truncated.
///
/// # Arguments
///
/// * `antigen` - Spatial index over the antigen atoms
/// * `heavy` - Antibody heavy chain, source of the `H*` regions
/// * `light` - Antibody light chain, source of the `L*` regions
/// * `config` - Regions, flank, encoding and padded length
///
/// # Returns
///
/// `(regions, max_cdr_len, F)` features, `(regions, max_cdr_len, 1)` labels
/// and masks, and the residue and contact counts.
pub fn process_chains(
    antigen: &AntigenIndex,
    heavy: &Chain,
    light: &Chain,
    config: &DatasetConfig,
) -> Result<ChainFeatures> {
    // Extract CDRs
    let cdrs: Vec<(CdrRegion, Vec<&Residue>)> = config
        .regions
        .iter()
        .map(|&region| {
            let chain = match region.chain() {
                AntibodyChain::Heavy => heavy,
                AntibodyChain::Light => light,
            };
            (region, extract_region(chain, region, config.cdr_flank))
        })
        .collect();

    // Ground truth contact labels
    let contacts: Vec<Vec<bool>> = cdrs
        .iter()
        .map(|(_, residues)| residues.iter().map(|r| is_in_contact(r, antigen)).collect())
        .collect();
    let num_residues: usize = contacts.iter().map(Vec::len).sum();
    let num_in_contact: usize = contacts
        .iter()
        .map(|c| c.iter().filter(|&&x| x).count())
        .sum();

    if num_in_contact < config.low_contact_threshold {
        warn!(
            "Antibody {}/{} has very few contact residues: {num_in_contact}",
            heavy.id, light.id
        );
    }

    let mut padded = Vec::with_capacity(cdrs.len());
    for ((region, residues), labels) in cdrs.iter().zip(&contacts) {
        let seq = residues_to_seq(residues.iter().copied());
        trace!("{region}: {seq}");
        let raw = config.encoding.encode(&seq);
        padded.push(pad_region(*region, raw.view(), labels, config.max_cdr_len)?);
    }

    let cdrs = stack(
        Axis(0),
        &padded.iter().map(|p| p.features.view()).collect::<Vec<_>>(),
    )?;
    let lbls = stack(
        Axis(0),
        &padded.iter().map(|p| p.labels.view()).collect::<Vec<_>>(),
    )?;
    let masks = stack(
        Axis(0),
        &padded.iter().map(|p| p.mask.view()).collect::<Vec<_>>(),
    )?;

    Ok(ChainFeatures {
        cdrs,
        lbls,
        masks,
        num_in_contact,
        num_residues,
    })
}
