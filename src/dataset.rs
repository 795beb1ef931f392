//! Catalog ingestion and dataset assembly.

use crate::config::{DatasetConfig, EntryFailurePolicy};
use crate::contacts::AntigenIndex;
use crate::errors::{DatasetError, Result};
use crate::processing::{process_chains, ChainFeatures};
use crate::structure::{Chain, Structure};
use crate::utils::{load_structure, parse_antigen_chains, run_with_threads, structure_path};
use ndarray::{stack, Array4, Axis};
use polars::prelude::*;
use rayon::prelude::*;
use std::path::Path;
use tracing::{debug, info, warn};

/// One antibody-antigen complex listed in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Structure identifier, substituted into the structure path template
    pub pdb: String,
    /// Antibody heavy chain id
    pub heavy_chain: String,
    /// Antibody light chain id
    pub light_chain: String,
    /// A chain id, or several joined by `|`
    pub antigen_chain: String,
}

impl CatalogEntry {
    /// Create an entry from its four catalog columns.
    pub fn new(pdb: &str, heavy_chain: &str, light_chain: &str, antigen_chain: &str) -> Self {
        Self {
            pdb: pdb.to_string(),
            heavy_chain: heavy_chain.to_string(),
            light_chain: light_chain.to_string(),
            antigen_chain: antigen_chain.to_string(),
        }
    }
}

fn string_column(df: &DataFrame, name: &'static str) -> Result<Vec<String>> {
    let column = df
        .column(name)
        .map_err(|_| DatasetError::MissingColumn(name))?;
    Ok(column
        .as_materialized_series()
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or_default().trim().to_string())
        .collect())
}

/// Read the catalog CSV.
///
/// Required columns are `pdb`, `Hchain`, `Lchain` and `antigen_chain`; every
/// column is read as text so identifiers such as `1234` keep their spelling.
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>> {
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))?
        .finish()?;
    debug!("Loaded catalog {}\n{}", path.display(), df);

    let pdbs = string_column(&df, "pdb")?;
    let heavy = string_column(&df, "Hchain")?;
    let light = string_column(&df, "Lchain")?;
    let antigen = string_column(&df, "antigen_chain")?;

    Ok(pdbs
        .into_iter()
        .zip(heavy)
        .zip(light)
        .zip(antigen)
        .map(|(((pdb, h), l), ag)| CatalogEntry {
            pdb,
            heavy_chain: h,
            light_chain: l,
            antigen_chain: ag,
        })
        .collect())
}

/// Supplies parsed structures to the dataset builder.
pub trait StructureSource: Sync {
    /// Load the structure named `id` in the catalog.
    fn load(&self, id: &str) -> Result<Structure>;
}

/// Reads structure files from disk through a `{id}` path template.
pub struct PdbFileSource {
    template: String,
}

impl PdbFileSource {
    /// Source reading `template` with `{id}` replaced by each identifier.
    pub fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
        }
    }
}

impl StructureSource for PdbFileSource {
    fn load(&self, id: &str) -> Result<Structure> {
        load_structure(id, &structure_path(&self.template, id))
    }
}

/// The assembled training dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetRecord {
    /// `(entries, regions, max_cdr_len, F)`
    pub cdrs: Array4<f32>,
    /// `(entries, regions, max_cdr_len, 1)`
    pub lbls: Array4<f32>,
    /// `(entries, regions, max_cdr_len, 1)`
    pub masks: Array4<u8>,
    /// Padded CDR length, the third tensor axis
    pub max_cdr_len: usize,
    /// `num_residues / num_in_contact`
    pub pos_class_weight: f64,
    /// CDR residues across all entries
    pub num_residues: usize,
    /// CDR residues touching the antigen across all entries
    pub num_in_contact: usize,
    /// Identifiers of the entries that contributed rows, in order
    pub pdb_ids: Vec<String>,
}

impl DatasetRecord {
    /// Number of entries along the first tensor axis.
    pub fn num_entries(&self) -> usize {
        self.cdrs.len_of(Axis(0))
    }
}

/// Ratio used to up-weight the rare contact class.
///
/// Fails with [`DatasetError::NoContacts`] instead of returning infinity when
/// nothing is in contact.
pub fn positive_class_weight(num_residues: usize, num_in_contact: usize, entries: usize) -> Result<f64> {
    if num_in_contact == 0 {
        return Err(DatasetError::NoContacts { entries });
    }
    Ok(num_residues as f64 / num_in_contact as f64)
}

/// Builds a [`DatasetRecord`] from catalog entries.
pub struct DatasetBuilder<'a, S: StructureSource> {
    config: &'a DatasetConfig,
    source: S,
}

impl<'a, S: StructureSource> DatasetBuilder<'a, S> {
    /// Builder using `config` and reading structures from `source`.
    pub fn new(config: &'a DatasetConfig, source: S) -> Self {
        Self { config, source }
    }

    /// Load one complex, pool its antigen chains and run [`process_chains`].
    pub fn process_entry(&self, entry: &CatalogEntry) -> Result<ChainFeatures> {
        let structure = self.source.load(&entry.pdb)?;
        let chain = |id: &str| -> Result<&Chain> {
            structure
                .chain(id)
                .ok_or_else(|| DatasetError::MissingChain {
                    pdb: entry.pdb.clone(),
                    chain: id.to_string(),
                })
        };

        let heavy = chain(&entry.heavy_chain)?;
        let light = chain(&entry.light_chain)?;
        let antigen_chains = parse_antigen_chains(&entry.antigen_chain)?
            .iter()
            .map(|id| chain(id))
            .collect::<Result<Vec<&Chain>>>()?;

        let antigen = if self.config.include_antigen_waters {
            AntigenIndex::from_chains(&antigen_chains, self.config.contact_distance)
        } else {
            AntigenIndex::from_residues(
                antigen_chains
                    .iter()
                    .flat_map(|c| c.residues.iter())
                    .filter(|r| !r.is_water()),
                self.config.contact_distance,
            )
        };
        debug!(
            "{}: {} antigen atoms from chains {:?}",
            entry.pdb,
            antigen.len(),
            entry.antigen_chain
        );
        process_chains(&antigen, heavy, light, self.config)
    }

    fn process_logged(&self, entry: &CatalogEntry) -> Result<ChainFeatures> {
        info!("Processing PDB: {}", entry.pdb);
        self.process_entry(entry)
    }

    /// Process every entry and assemble the dataset tensors in catalog order.
    ///
    /// Entry-level failures abort the build or are skipped according to
    /// [`DatasetConfig::on_error`]; configuration violations always abort.
    pub fn process_dataset(&self, entries: &[CatalogEntry]) -> Result<DatasetRecord> {
        self.config.validate()?;

        let outcomes: Box<dyn Iterator<Item = Result<ChainFeatures>> + '_> =
            if self.config.num_threads == 1 {
                Box::new(entries.iter().map(|e| self.process_logged(e)))
            } else {
                let results = run_with_threads(self.config.num_threads, || {
                    entries
                        .par_iter()
                        .map(|e| self.process_logged(e))
                        .collect::<Vec<_>>()
                })?;
                Box::new(results.into_iter())
            };

        let mut num_in_contact = 0;
        let mut num_residues = 0;
        let mut all_features = Vec::new();
        let mut pdb_ids = Vec::new();

        for (entry, outcome) in entries.iter().zip(outcomes) {
            match outcome {
                Ok(features) => {
                    num_in_contact += features.num_in_contact;
                    num_residues += features.num_residues;
                    pdb_ids.push(entry.pdb.clone());
                    all_features.push(features);
                }
                Err(e) => {
                    let e = e.in_entry(&entry.pdb);
                    if e.is_entry_level() && self.config.on_error == EntryFailurePolicy::Skip {
                        warn!("Skipping entry: {e}");
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        if all_features.is_empty() {
            return Err(DatasetError::EmptyDataset);
        }
        let skipped = entries.len() - pdb_ids.len();
        if skipped > 0 {
            warn!("Skipped {skipped} of {} catalog entries", entries.len());
        }

        let cdrs = stack(
            Axis(0),
            &all_features.iter().map(|f| f.cdrs.view()).collect::<Vec<_>>(),
        )?;
        let lbls = stack(
            Axis(0),
            &all_features.iter().map(|f| f.lbls.view()).collect::<Vec<_>>(),
        )?;
        let masks = stack(
            Axis(0),
            &all_features.iter().map(|f| f.masks.view()).collect::<Vec<_>>(),
        )?;

        let pos_class_weight = positive_class_weight(num_residues, num_in_contact, pdb_ids.len())?;
        info!(
            "Dataset: {} entries, cdrs {:?}, {num_in_contact}/{num_residues} residues in contact, \
             positive class weight {pos_class_weight:.4}",
            pdb_ids.len(),
            cdrs.shape(),
        );

        Ok(DatasetRecord {
            cdrs,
            lbls,
            masks,
            max_cdr_len: self.config.max_cdr_len,
            pos_class_weight,
            num_residues,
            num_in_contact,
            pdb_ids,
        })
    }
}

/// Read the catalog, load every structure from disk and assemble the dataset.
///
/// # Arguments
///
/// * `catalog` - CSV with `pdb`, `Hchain`, `Lchain` and `antigen_chain` columns
/// * `config` - Build settings; structures are read from `config.structure_template`
///
/// # Returns
///
/// The stacked `cdrs`, `lbls` and `masks` tensors with the positive class weight.
///
/// # Example
///
/// ```no_run
/// use paratope::{compute_entries, DatasetConfig};
/// use std::path::Path;
///
/// let config = DatasetConfig::default();
/// let record = compute_entries(Path::new("data/abip_train.csv"), &config).unwrap();
/// println!("{} entries, weight {}", record.num_entries(), record.pos_class_weight);
/// ```
pub fn compute_entries(catalog: &Path, config: &DatasetConfig) -> Result<DatasetRecord> {
    let entries = load_catalog(catalog)?;
    info!("Catalog {} lists {} entries", catalog.display(), entries.len());
    DatasetBuilder::new(config, PdbFileSource::new(&config.structure_template))
        .process_dataset(&entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdrs::CdrRegion;
    use crate::processing::tests::{antigen_touching, spaced_chain};
    use crate::structure::{Atom, Residue};
    use std::collections::HashMap;
    use std::io::Write;

    struct MemorySource(HashMap<String, Structure>);

    impl StructureSource for MemorySource {
        fn load(&self, id: &str) -> Result<Structure> {
            self.0
                .get(id)
                .cloned()
                .ok_or_else(|| DatasetError::StructureRead {
                    path: format!("memory://{id}").into(),
                    message: "unknown structure".to_string(),
                })
        }
    }

    /// Heavy chain covering H1-H3, light chain covering L1-L3, antigen
    /// chain(s) touching the given residue numbers.
    fn complex(id: &str, antigens: &[(&str, Vec<isize>)]) -> Structure {
        let mut chains = vec![spaced_chain("H", 1..=110), shifted(spaced_chain("L", 1..=107))];
        chains.extend(antigens.iter().map(|(cid, touching)| antigen_touching(cid, touching)));
        Structure::new(id, chains)
    }

    /// Move a chain far away so it cannot pick up heavy-chain contacts.
    fn shifted(mut chain: Chain) -> Chain {
        for atom in chain.residues.iter_mut().flat_map(|r| r.atoms.iter_mut()) {
            atom.pos.z += 1000.0;
        }
        chain
    }

    fn source(structures: Vec<Structure>) -> MemorySource {
        MemorySource(structures.into_iter().map(|s| (s.id.clone(), s)).collect())
    }

    #[test]
    fn stacked_shapes_and_class_weight() {
        let src = source(vec![
            complex("1aaa", &[("A", vec![27, 52, 100])]),
            complex("2bbb", &[("C", vec![97, 98, 99, 101])]),
        ]);
        let entries = vec![
            CatalogEntry::new("1aaa", "H", "L", "A"),
            CatalogEntry::new("2bbb", "H", "L", "C"),
        ];
        let config = DatasetConfig::default();
        let record = DatasetBuilder::new(&config, src)
            .process_dataset(&entries)
            .unwrap();

        assert_eq!(record.num_entries(), 2);
        assert_eq!(record.cdrs.dim(), (2, 6, 31, 28));
        assert_eq!(record.lbls.dim(), (2, 6, 31, 1));
        assert_eq!(record.masks.dim(), (2, 6, 31, 1));
        assert_eq!(record.pdb_ids, vec!["1aaa", "2bbb"]);
        assert_eq!(record.max_cdr_len, 31);

        // H1 11 + H2 9 + H3 12 + L1 15 + L2 11 + L3 13 residues per entry
        assert_eq!(record.num_residues, 2 * 71);
        assert_eq!(record.num_in_contact, 7);

        // The weight is reproducible from the output tensors alone
        let mask_total: usize = record.masks.iter().map(|&m| m as usize).sum();
        let label_total: usize = record.lbls.iter().filter(|&&l| l == 1.0).count();
        assert_eq!(
            record.pos_class_weight,
            mask_total as f64 / label_total as f64
        );
        assert_eq!(record.pos_class_weight, 142.0 / 7.0);
    }

    #[test]
    fn two_chain_antigen_is_pooled() {
        let src = source(vec![complex("3ccc", &[("A", vec![27]), ("B", vec![100])])]);
        let config = DatasetConfig::default();
        let builder = DatasetBuilder::new(&config, src);

        let pooled = builder
            .process_entry(&CatalogEntry::new("3ccc", "H", "L", "A | B"))
            .unwrap();
        assert_eq!(pooled.num_in_contact, 2);
        // H1 residue 27 touches A, H3 residue 100 touches B
        assert_eq!(pooled.lbls[[0, 3, 0]], 1.0);
        assert_eq!(pooled.lbls[[2, 7, 0]], 1.0);

        let only_a = builder
            .process_entry(&CatalogEntry::new("3ccc", "H", "L", "A"))
            .unwrap();
        assert_eq!(only_a.num_in_contact, 1);
    }

    #[test]
    fn antigen_waters_count_as_contacts_unless_excluded() {
        let mut structure = complex("5eee", &[]);
        structure.chains.push(Chain::new(
            "A",
            vec![
                Residue::new(1, None, "ASP", vec![Atom::new("OD1", 5000.0, 0.0, 0.0)]),
                Residue::new(201, None, "HOH", vec![Atom::new("O", 270.0, 103.0, 0.0)]),
            ],
        ));
        let entry = CatalogEntry::new("5eee", "H", "L", "A");

        let config = DatasetConfig::default();
        let wet = DatasetBuilder::new(&config, source(vec![structure.clone()]))
            .process_entry(&entry)
            .unwrap();
        assert_eq!(wet.num_in_contact, 1);
        // H27 is the fourth H1 residue
        assert_eq!(wet.lbls[[0, 3, 0]], 1.0);

        let config = DatasetConfig {
            include_antigen_waters: false,
            ..Default::default()
        };
        let dry = DatasetBuilder::new(&config, source(vec![structure]))
            .process_entry(&entry)
            .unwrap();
        assert_eq!(dry.num_in_contact, 0);
    }

    #[test]
    fn zero_contacts_is_an_error() {
        let src = source(vec![complex("4ddd", &[("A", vec![])])]);
        let config = DatasetConfig::default();
        let err = DatasetBuilder::new(&config, src)
            .process_dataset(&[CatalogEntry::new("4ddd", "H", "L", "A")])
            .unwrap_err();
        assert!(matches!(err, DatasetError::NoContacts { entries: 1 }), "{err}");
    }

    #[test]
    fn malformed_entry_aborts_by_default() {
        let src = source(vec![complex("1aaa", &[("A", vec![27])])]);
        let entries = vec![
            CatalogEntry::new("1aaa", "H", "L", "A"),
            CatalogEntry::new("1aaa", "H", "K", "A"),
        ];
        let config = DatasetConfig::default();
        let err = DatasetBuilder::new(&config, src)
            .process_dataset(&entries)
            .unwrap_err();

        match err {
            DatasetError::Entry { pdb, source } => {
                assert_eq!(pdb, "1aaa");
                assert!(matches!(*source, DatasetError::MissingChain { ref chain, .. } if chain == "K"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn malformed_entries_can_be_skipped() {
        let src = source(vec![complex("1aaa", &[("A", vec![27, 100])])]);
        let entries = vec![
            CatalogEntry::new("missing", "H", "L", "A"),
            CatalogEntry::new("1aaa", "H", "L", "A"),
            CatalogEntry::new("1aaa", "H", "L", "A | "),
        ];
        let config = DatasetConfig {
            on_error: EntryFailurePolicy::Skip,
            ..Default::default()
        };
        let record = DatasetBuilder::new(&config, src)
            .process_dataset(&entries)
            .unwrap();
        assert_eq!(record.pdb_ids, vec!["1aaa"]);
        assert_eq!(record.num_entries(), 1);
        assert_eq!(record.num_in_contact, 2);
    }

    #[test]
    fn skipping_everything_leaves_an_empty_dataset() {
        let config = DatasetConfig {
            on_error: EntryFailurePolicy::Skip,
            ..Default::default()
        };
        let err = DatasetBuilder::new(&config, source(vec![]))
            .process_dataset(&[CatalogEntry::new("gone", "H", "L", "A")])
            .unwrap_err();
        assert!(matches!(err, DatasetError::EmptyDataset));
    }

    #[test]
    fn overlong_cdr_aborts_even_when_skipping() {
        let src = source(vec![complex("1aaa", &[("A", vec![27])])]);
        let config = DatasetConfig {
            on_error: EntryFailurePolicy::Skip,
            max_cdr_len: 12,
            ..Default::default()
        };
        let err = DatasetBuilder::new(&config, src)
            .process_dataset(&[CatalogEntry::new("1aaa", "H", "L", "A")])
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("1aaa") && msg.contains("L1"), "{msg}");
        assert!(matches!(
            err,
            DatasetError::Entry { ref source, .. }
                if matches!(**source, DatasetError::CdrTooLong { region: CdrRegion::L1, len: 15, .. })
        ));
    }

    #[test]
    fn rebuilds_are_identical_and_parallel_matches_sequential() {
        let structures = vec![
            complex("1aaa", &[("A", vec![27, 52])]),
            complex("2bbb", &[("A", vec![95, 96])]),
            complex("3ccc", &[("A", vec![31]), ("B", vec![90, 91])]),
        ];
        let entries = vec![
            CatalogEntry::new("3ccc", "H", "L", "A | B"),
            CatalogEntry::new("1aaa", "H", "L", "A"),
            CatalogEntry::new("2bbb", "H", "L", "A"),
        ];
        let sequential = DatasetConfig::default();
        let first = DatasetBuilder::new(&sequential, source(structures.clone()))
            .process_dataset(&entries)
            .unwrap();
        let second = DatasetBuilder::new(&sequential, source(structures.clone()))
            .process_dataset(&entries)
            .unwrap();
        assert_eq!(first, second);

        let parallel = DatasetConfig {
            num_threads: 3,
            ..Default::default()
        };
        let third = DatasetBuilder::new(&parallel, source(structures))
            .process_dataset(&entries)
            .unwrap();
        assert_eq!(first, third);
        assert_eq!(third.pdb_ids, vec!["3ccc", "1aaa", "2bbb"]);
    }

    #[test]
    fn catalog_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "pdb,Hchain,Lchain,model,antigen_chain").unwrap();
        writeln!(file, "1ahw,B,A,0,C").unwrap();
        writeln!(file, "1234,H,L,0,A | B").unwrap();
        file.flush().unwrap();

        let entries = load_catalog(file.path()).unwrap();
        assert_eq!(
            entries,
            vec![
                CatalogEntry::new("1ahw", "B", "A", "C"),
                CatalogEntry::new("1234", "H", "L", "A | B"),
            ]
        );
    }

    #[test]
    fn catalog_missing_column() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "pdb,Hchain,Lchain").unwrap();
        writeln!(file, "1ahw,B,A").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            load_catalog(file.path()),
            Err(DatasetError::MissingColumn("antigen_chain"))
        ));
    }
}
