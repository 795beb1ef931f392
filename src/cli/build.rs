use clap::Parser;
use paratope::{open_dataset, CdrRegion, DatasetCache, DatasetConfig, Encoding, EntryFailurePolicy};
use std::path::PathBuf;
use tracing::{debug, trace};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Catalog CSV with pdb, Hchain, Lchain and antigen_chain columns
    #[arg(short, long)]
    catalog: PathBuf,

    /// Directory holding cached datasets
    #[arg(long, default_value = "data/cache")]
    cache_dir: PathBuf,

    /// JSON settings file. Command line flags take precedence over its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Structure path template; `{id}` is replaced by the catalog pdb column
    #[arg(short, long)]
    structures: Option<String>,

    /// Padded length of every CDR
    #[arg(long)]
    max_cdr_len: Option<usize>,

    /// Distance cutoff in Å for a CDR residue to be in contact with the antigen
    #[arg(short = 'd', long)]
    contact_distance: Option<f64>,

    /// Residue feature encoding
    #[arg(short, long, value_enum)]
    encoding: Option<Encoding>,

    /// CDRs to extract, in tensor order, e.g. H1,H2,H3,L1,L2,L3
    #[arg(long, value_enum, value_delimiter = ',', ignore_case = true)]
    regions: Option<Vec<CdrRegion>>,

    /// What to do with catalog entries whose structure or chains cannot be loaded
    #[arg(long, value_enum)]
    on_error: Option<EntryFailurePolicy>,

    /// Number of threads to use for processing structures; 0 uses all cores
    #[arg(short = 'j', long = "num-threads")]
    num_threads: Option<usize>,

    /// Ignore antigen waters when labelling contacts
    #[arg(long, default_value_t = false)]
    exclude_antigen_waters: bool,

    /// Ignore any cached dataset and recompute it
    #[arg(long, default_value_t = false)]
    rebuild: bool,
}

impl Args {
    /// Settings file values, overridden by whatever was given on the command line.
    fn dataset_config(&self) -> paratope::Result<DatasetConfig> {
        let mut config = match &self.config {
            Some(path) => DatasetConfig::from_json_file(path)?,
            None => DatasetConfig::default(),
        };

        if let Some(template) = &self.structures {
            config.structure_template = template.clone();
        }
        if let Some(n) = self.max_cdr_len {
            config.max_cdr_len = n;
        }
        if let Some(d) = self.contact_distance {
            config.contact_distance = d;
        }
        if let Some(encoding) = self.encoding {
            config.encoding = encoding;
        }
        if let Some(regions) = &self.regions {
            config.regions = regions.clone();
        }
        if let Some(policy) = self.on_error {
            config.on_error = policy;
        }
        if let Some(n) = self.num_threads {
            config.num_threads = n;
        }
        if self.exclude_antigen_waters {
            config.include_antigen_waters = false;
        }

        config.validate()?;
        Ok(config)
    }
}

pub(crate) fn run(args: &Args) -> paratope::Result<()> {
    trace!("{args:?}");

    let config = args.dataset_config()?;
    debug!("{config:?}");

    let cache = DatasetCache::new(&args.cache_dir);
    let record = open_dataset(&args.catalog, &config, &cache, args.rebuild)?;

    println!("Entries: {}", record.num_entries());
    println!("cdrs: {:?}", record.cdrs.shape());
    println!("lbls: {:?}", record.lbls.shape());
    println!("masks: {:?}", record.masks.shape());
    println!(
        "Residues in contact: {}/{}",
        record.num_in_contact, record.num_residues
    );
    println!("Positive class weight: {:.4}", record.pos_class_weight);
    Ok(())
}
