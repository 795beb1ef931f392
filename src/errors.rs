use crate::cdrs::CdrRegion;
use std::path::PathBuf;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DatasetError>;

/// Everything that can go wrong while building a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// A structure file is missing or could not be parsed
    #[error("Failed to read structure '{path}': {message}", path = path.display())]
    StructureRead {
        /// File that was read
        path: PathBuf,
        /// Parser errors, joined
        message: String,
    },

    /// A catalog entry names a chain the structure does not have
    #[error("Chain '{chain}' not found in structure {pdb}")]
    MissingChain {
        /// Structure identifier
        pdb: String,
        /// Missing chain id
        chain: String,
    },

    /// An antigen chain column value with an empty chain id
    #[error("Invalid antigen chain specification '{0}'")]
    InvalidAntigenChains(String),

    /// A CDR does not fit in the padded tensors
    #[error("CDR {region} has {len} residues, exceeding max_cdr_len = {max_cdr_len}")]
    CdrTooLong {
        /// Offending region
        region: CdrRegion,
        /// Its residue count
        len: usize,
        /// Configured padded length
        max_cdr_len: usize,
    },

    /// Any error raised while processing one catalog entry
    #[error("Entry {pdb}: {source}")]
    Entry {
        /// Catalog identifier of the entry
        pdb: String,
        /// Underlying error
        #[source]
        source: Box<DatasetError>,
    },

    /// No CDR residue touches the antigen, so the class weight is undefined
    #[error(
        "No CDR residue is in contact with the antigen across {entries} entries; \
         the positive class weight is undefined"
    )]
    NoContacts {
        /// Number of entries in the dataset
        entries: usize,
    },

    /// Every catalog entry was skipped, or the catalog was empty
    #[error("No catalog entry produced any data")]
    EmptyDataset,

    /// Settings that no dataset can be built with
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// A required catalog column is absent
    #[error("Catalog is missing the required column '{0}'")]
    MissingColumn(&'static str),

    /// The catalog CSV could not be read
    #[error("Failed to read catalog: {0}")]
    Catalog(#[from] polars::prelude::PolarsError),

    /// Tensors of incompatible shapes
    #[error("Tensor shape mismatch: {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// A cached dataset is unreadable or inconsistent
    #[error("Dataset cache error: {0}")]
    Cache(String),

    /// Settings file or cache metadata is not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// File system failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DatasetError {
    /// Errors caused by a single malformed catalog entry. Only these may be
    /// skipped under [`crate::EntryFailurePolicy::Skip`].
    pub fn is_entry_level(&self) -> bool {
        match self {
            DatasetError::StructureRead { .. }
            | DatasetError::MissingChain { .. }
            | DatasetError::InvalidAntigenChains(_) => true,
            DatasetError::Entry { source, .. } => source.is_entry_level(),
            _ => false,
        }
    }

    /// Attach the catalog entry identifier to an error.
    pub fn in_entry(self, pdb: &str) -> Self {
        match self {
            DatasetError::Entry { .. } => self,
            other => DatasetError::Entry {
                pdb: pdb.to_string(),
                source: Box::new(other),
            },
        }
    }
}
