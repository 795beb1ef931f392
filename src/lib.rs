#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

//! # Paratope Library
//!
//! Builds fixed-size training tensors for paratope prediction from
//! antibody-antigen complexes. For every complex listed in a catalog the six
//! CDRs are cut out of the heavy and light chains, each residue is labelled by
//! whether it touches the antigen, and the encoded, zero-padded regions are
//! stacked into `cdrs`, `lbls` and `masks` tensors alongside a positive class
//! weight. Built datasets are cached on disk as safetensors files.

mod cache;
mod cdrs;
mod chains;
mod config;
mod contacts;
mod dataset;
mod encoding;
mod errors;
mod processing;
mod residues;
mod structure;
mod utils;

// Re-export key public types
pub use cache::{open_dataset, DatasetCache};
pub use cdrs::{extract_cdrs, extract_region, AntibodyChain, CdrRegion};
pub use chains::ChainExt;
pub use config::{
    DatasetConfig, EntryFailurePolicy, CDR_FLANK, CONTACT_DISTANCE, LOW_CONTACT_THRESHOLD,
    MAX_CDR_LEN, STRUCTURE_TEMPLATE,
};
pub use contacts::{is_in_contact, AntigenIndex};
pub use dataset::{
    compute_entries, load_catalog, positive_class_weight, CatalogEntry, DatasetBuilder,
    DatasetRecord, PdbFileSource, StructureSource,
};
pub use encoding::{aa1_to_int, meiler_features, Encoding, FeatureEncoder, ALPHABET, NUM_MEILER_FEATURES};
pub use errors::{DatasetError, Result};
pub use processing::{process_chains, ChainFeatures};
pub use residues::{aa3to1, ResidueExt};
pub use structure::{residues_to_seq, Atom, Chain, Residue, Structure};
pub use utils::{load_model, load_structure, parse_antigen_chains, run_with_threads, structure_path};
