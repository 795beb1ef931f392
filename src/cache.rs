//! On-disk persistence of built datasets.
//!
//! A dataset is stored as a single safetensors file holding the `cdrs`, `lbls`
//! and `masks` tensors, with the scalar fields kept as string metadata. Files
//! are named by a BLAKE3 digest over the catalog bytes and the configuration
//! fingerprint, so editing either one produces a new entry instead of reusing
//! a stale one.

use crate::config::DatasetConfig;
use crate::dataset::{compute_entries, DatasetRecord};
use crate::errors::{DatasetError, Result};
use ndarray::{Array4, ArrayD, Ix4};
use ndarray_safetensors::{parse_tensor_view_data, TensorViewWithDataBuffer};
use safetensors::{serialize, tensor::TensorView, Dtype, SafeTensors};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{debug, info};

fn cache_err(e: safetensors::SafeTensorError) -> DatasetError {
    DatasetError::Cache(format!("{e:?}"))
}

/// A directory of persisted datasets.
#[derive(Debug, Clone)]
pub struct DatasetCache {
    dir: PathBuf,
}

impl DatasetCache {
    /// Cache rooted at `dir`; the directory is created on the first store.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cached datasets.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Digest of the catalog contents and the output-affecting settings.
    pub fn key(&self, catalog: &Path, config: &DatasetConfig) -> Result<String> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&std::fs::read(catalog)?);
        hasher.update(&[0]);
        hasher.update(&config.fingerprint()?);
        Ok(hasher.finalize().to_hex()[..16].to_string())
    }

    /// File a dataset with `key` is stored in.
    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("dataset-{key}.safetensors"))
    }

    /// Load the dataset stored under `key`, or `None` when there is none.
    pub fn load(&self, key: &str) -> Result<Option<DatasetRecord>> {
        let path = self.path_for(key);
        if !path.is_file() {
            debug!("No cached dataset at {}", path.display());
            return Ok(None);
        }

        let buffer = std::fs::read(&path)?;
        let (_, header) = SafeTensors::read_metadata(&buffer).map_err(cache_err)?;
        let metadata = header
            .metadata()
            .as_ref()
            .ok_or_else(|| DatasetError::Cache(format!("{} has no metadata", path.display())))?;

        let stored_key: String = parse_meta(metadata, "cache_key")?;
        if stored_key != key {
            return Err(DatasetError::Cache(format!(
                "{} was written for key {stored_key}, expected {key}",
                path.display()
            )));
        }

        let tensors = SafeTensors::deserialize(&buffer).map_err(cache_err)?;
        let record = DatasetRecord {
            cdrs: read_f32(&tensors, "cdrs")?,
            lbls: read_f32(&tensors, "lbls")?,
            masks: read_u8(&tensors, "masks")?,
            max_cdr_len: parse_meta(metadata, "max_cdr_len")?,
            pos_class_weight: parse_meta(metadata, "pos_class_weight")?,
            num_residues: parse_meta(metadata, "num_residues")?,
            num_in_contact: parse_meta(metadata, "num_in_contact")?,
            pdb_ids: serde_json::from_str(meta_value(metadata, "pdb_ids")?)?,
        };
        debug!("Loaded cached dataset {}", path.display());
        Ok(Some(record))
    }

    /// Persist `record` under `key`, returning the written file.
    ///
    /// The file is written next to its final location and renamed into place,
    /// so an interrupted write never leaves a truncated entry behind.
    pub fn store(&self, key: &str, record: &DatasetRecord) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;

        let cdrs = record.cdrs.clone().into_dyn();
        let lbls = record.lbls.clone().into_dyn();
        let masks = record.masks.clone().into_dyn();
        let tensors = vec![
            ("cdrs", TensorViewWithDataBuffer::new(&cdrs)),
            ("lbls", TensorViewWithDataBuffer::new(&lbls)),
            ("masks", TensorViewWithDataBuffer::new(&masks)),
        ];

        let metadata: HashMap<String, String> = HashMap::from([
            ("cache_key".to_string(), key.to_string()),
            ("max_cdr_len".to_string(), record.max_cdr_len.to_string()),
            (
                "pos_class_weight".to_string(),
                record.pos_class_weight.to_string(),
            ),
            ("num_residues".to_string(), record.num_residues.to_string()),
            (
                "num_in_contact".to_string(),
                record.num_in_contact.to_string(),
            ),
            (
                "pdb_ids".to_string(),
                serde_json::to_string(&record.pdb_ids)?,
            ),
        ]);
        let bytes = serialize(tensors, &Some(metadata)).map_err(cache_err)?;

        let path = self.path_for(key);
        let partial = path.with_extension("partial");
        std::fs::write(&partial, bytes)?;
        std::fs::rename(&partial, &path)?;
        debug!("Stored dataset at {}", path.display());
        Ok(path)
    }

    /// Delete the entry stored under `key`. Returns whether one existed.
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!("Removed cached dataset {}", path.display());
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

fn tensor<'a>(tensors: &'a SafeTensors, name: &str, dtype: Dtype) -> Result<TensorView<'a>> {
    let view = tensors.tensor(name).map_err(cache_err)?;
    if view.dtype() != dtype {
        return Err(DatasetError::Cache(format!(
            "tensor '{name}' has dtype {:?}, expected {dtype:?}",
            view.dtype()
        )));
    }
    Ok(view)
}

fn read_f32(tensors: &SafeTensors, name: &str) -> Result<Array4<f32>> {
    let view = tensor(tensors, name, Dtype::F32)?;
    let arr: ArrayD<f32> = parse_tensor_view_data(&view)
        .map_err(|e| DatasetError::Cache(format!("tensor '{name}': {e:?}")))?;
    Ok(arr.into_dimensionality::<Ix4>()?)
}

fn read_u8(tensors: &SafeTensors, name: &str) -> Result<Array4<u8>> {
    let view = tensor(tensors, name, Dtype::U8)?;
    let arr: ArrayD<u8> = parse_tensor_view_data(&view)
        .map_err(|e| DatasetError::Cache(format!("tensor '{name}': {e:?}")))?;
    Ok(arr.into_dimensionality::<Ix4>()?)
}

fn meta_value<'a>(metadata: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    metadata
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| DatasetError::Cache(format!("missing metadata field '{key}'")))
}

fn parse_meta<T: FromStr>(metadata: &HashMap<String, String>, key: &str) -> Result<T> {
    let value = meta_value(metadata, key)?;
    value
        .parse()
        .map_err(|_| DatasetError::Cache(format!("invalid metadata {key} = '{value}'")))
}

/// Return the dataset for `catalog` and `config`, building it on a cache miss.
///
/// # Arguments
///
/// * `catalog` - Catalog CSV; its bytes are part of the cache key
/// * `config` - Build settings; the output-affecting ones are part of the key
/// * `cache` - Where datasets are stored
/// * `rebuild` - Discard any cached entry and recompute it
///
/// # Example
///
/// ```no_run
/// use paratope::{open_dataset, DatasetCache, DatasetConfig};
/// use std::path::Path;
///
/// let cache = DatasetCache::new("data/cache");
/// let config = DatasetConfig::default();
/// let record = open_dataset(Path::new("data/abip_train.csv"), &config, &cache, false).unwrap();
/// assert_eq!(record.cdrs.shape()[1], 6);
/// ```
pub fn open_dataset(
    catalog: &Path,
    config: &DatasetConfig,
    cache: &DatasetCache,
    rebuild: bool,
) -> Result<DatasetRecord> {
    let key = cache.key(catalog, config)?;

    if rebuild {
        cache.invalidate(&key)?;
    } else if let Some(record) = cache.load(&key)? {
        info!("Precomputed dataset found, loading...");
        return Ok(record);
    }

    info!("Computing and storing the dataset...");
    let record = compute_entries(catalog, config)?;
    let path = cache.store(&key, &record)?;
    info!("Dataset saved to {}", path.display());
    Ok(record)
}
