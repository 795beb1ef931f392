use crate::chains::ChainExt;
use crate::errors::{DatasetError, Result};
use crate::structure::Structure;
use pdbtbx::*;
use std::path::Path;
use tracing::debug;

/// Open an atomic data file with [`pdbtbx::ReadOptions`].
///
/// Parser warnings are returned next to the structure; breaking errors become
/// [`DatasetError::StructureRead`].
pub fn load_model(input_file: &Path) -> Result<(PDB, Vec<PDBError>)> {
    let path_str = input_file.to_str().ok_or_else(|| DatasetError::StructureRead {
        path: input_file.to_path_buf(),
        message: "path is not valid UTF-8".to_string(),
    })?;

    if !input_file.is_file() {
        return Err(DatasetError::StructureRead {
            path: input_file.to_path_buf(),
            message: "file does not exist".to_string(),
        });
    }

    pdbtbx::ReadOptions::default()
        .set_only_atomic_coords(true)
        .set_level(pdbtbx::StrictnessLevel::Loose)
        .read(path_str)
        .map_err(|errors| DatasetError::StructureRead {
            path: input_file.to_path_buf(),
            message: errors
                .iter()
                .map(|e| e.to_string())
                .collect::<Vec<_>>()
                .join("; "),
        })
}

/// Load the first model of a structure file as an immutable [`Structure`].
pub fn load_structure(id: &str, input_file: &Path) -> Result<Structure> {
    let (pdb, warnings) = load_model(input_file)?;
    for w in &warnings {
        debug!("{id}: {w}");
    }

    let model = pdb.model(0).ok_or_else(|| DatasetError::StructureRead {
        path: input_file.to_path_buf(),
        message: "structure contains no models".to_string(),
    })?;

    // Information on the sequence of the chains in the model
    for chain in model.chains() {
        debug!(">{id}_{}\n{}", chain.id(), chain.pdb_seq());
    }

    Ok(Structure::new(
        id,
        model.chains().map(|c| c.to_value()).collect(),
    ))
}

/// Parse an antigen chain specification.
///
/// A single chain id (`"A"`) or several ids joined by `|` (`"A | B"`).
pub fn parse_antigen_chains(spec: &str) -> Result<Vec<String>> {
    let chains: Vec<String> = spec.split('|').map(|c| c.trim().to_string()).collect();

    if chains.iter().any(|c| c.is_empty()) {
        return Err(DatasetError::InvalidAntigenChains(spec.to_string()));
    }
    Ok(chains)
}

/// Substitute a structure identifier into a path template containing `{id}`.
pub fn structure_path(template: &str, id: &str) -> std::path::PathBuf {
    std::path::PathBuf::from(template.replace("{id}", id))
}

/// Run `op` on a dedicated rayon pool with `num_threads` workers (0 for all cores).
pub fn run_with_threads<T, F>(num_threads: usize, op: F) -> Result<T>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build()
        .map_err(|e| DatasetError::Config(format!("failed to build thread pool: {e}")))?;
    Ok(pool.install(op))
}
