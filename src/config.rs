//! Dataset build settings.

use crate::cdrs::CdrRegion;
use crate::encoding::Encoding;
use crate::errors::{DatasetError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Longest CDR (including flanks and insertions) the padded tensors can hold
pub const MAX_CDR_LEN: usize = 31;
/// Residue-antigen atom distance in Å below which a residue is in contact
pub const CONTACT_DISTANCE: f64 = 4.5;
/// Structures with fewer contact residues than this get a warning
pub const LOW_CONTACT_THRESHOLD: usize = 5;
/// Residues added on each side of a Chothia CDR range
pub const CDR_FLANK: isize = 2;
/// Where structure files live, `{id}` is replaced by the catalog identifier
pub const STRUCTURE_TEMPLATE: &str = "data/pdbs/{id}_ch.pdb";

/// What to do when a catalog entry cannot be loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EntryFailurePolicy {
    /// Stop the whole build on the first malformed entry
    #[default]
    Abort,
    /// Log a warning and leave the entry out of the dataset
    Skip,
}

/// Settings of a dataset build.
///
/// Every field has a default, so a JSON settings file only needs the values it
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Padded length of every CDR
    pub max_cdr_len: usize,
    /// Contact distance cutoff in Å
    pub contact_distance: f64,
    /// Minimum number of contact residues before a structure is flagged
    pub low_contact_threshold: usize,
    /// Flanking residues around each Chothia CDR range
    pub cdr_flank: isize,
    /// Regions in the order they appear along the region axis
    pub regions: Vec<CdrRegion>,
    /// Residue feature encoding
    pub encoding: Encoding,
    /// Structure file path template
    pub structure_template: String,
    /// Count antigen waters as antigen atoms when labelling contacts
    pub include_antigen_waters: bool,
    /// Policy for malformed catalog entries
    pub on_error: EntryFailurePolicy,
    /// Worker threads; 1 is sequential and 0 uses all cores
    pub num_threads: usize,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            max_cdr_len: MAX_CDR_LEN,
            contact_distance: CONTACT_DISTANCE,
            low_contact_threshold: LOW_CONTACT_THRESHOLD,
            cdr_flank: CDR_FLANK,
            regions: CdrRegion::CANONICAL.to_vec(),
            encoding: Encoding::default(),
            structure_template: STRUCTURE_TEMPLATE.to_string(),
            include_antigen_waters: true,
            on_error: EntryFailurePolicy::default(),
            num_threads: 1,
        }
    }
}

/// The subset of the configuration that changes the produced tensors.
#[derive(Serialize)]
struct OutputFingerprint<'a> {
    max_cdr_len: usize,
    contact_distance: f64,
    cdr_flank: isize,
    regions: &'a [CdrRegion],
    encoding: Encoding,
    structure_template: &'a str,
    include_antigen_waters: bool,
    on_error: EntryFailurePolicy,
}

impl DatasetConfig {
    /// Read a JSON settings file; missing fields take their default values.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings no dataset can be built with.
    pub fn validate(&self) -> Result<()> {
        if self.max_cdr_len == 0 {
            return Err(DatasetError::Config("max_cdr_len must be positive".into()));
        }
        if !(self.contact_distance.is_finite() && self.contact_distance > 0.0) {
            return Err(DatasetError::Config(format!(
                "contact_distance must be a positive number, got {}",
                self.contact_distance
            )));
        }
        if self.cdr_flank < 0 {
            return Err(DatasetError::Config("cdr_flank cannot be negative".into()));
        }
        if self.regions.is_empty() {
            return Err(DatasetError::Config("at least one CDR region is required".into()));
        }
        let unique: HashSet<&CdrRegion> = self.regions.iter().collect();
        if unique.len() != self.regions.len() {
            return Err(DatasetError::Config(format!(
                "duplicate CDR regions in {:?}",
                self.regions
            )));
        }
        if !self.structure_template.contains("{id}") {
            return Err(DatasetError::Config(format!(
                "structure_template '{}' has no {{id}} placeholder",
                self.structure_template
            )));
        }
        Ok(())
    }

    /// Stable JSON rendering of the settings that affect the dataset contents.
    pub fn fingerprint(&self) -> Result<Vec<u8>> {
        let fp = OutputFingerprint {
            max_cdr_len: self.max_cdr_len,
            contact_distance: self.contact_distance,
            cdr_flank: self.cdr_flank,
            regions: &self.regions,
            encoding: self.encoding,
            structure_template: &self.structure_template,
            include_antigen_waters: self.include_antigen_waters,
            on_error: self.on_error,
        };
        Ok(serde_json::to_vec(&fp)?)
    }
}
