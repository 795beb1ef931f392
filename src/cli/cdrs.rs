use clap::Parser;
use paratope::{
    extract_region, is_in_contact, load_structure, parse_antigen_chains, residues_to_seq,
    AntibodyChain, AntigenIndex, CdrRegion, Chain, DatasetConfig, DatasetError, Structure,
    CDR_FLANK, CONTACT_DISTANCE,
};
use std::path::PathBuf;
use tracing::{debug, trace};

#[derive(Parser, Debug, Clone)]
#[command(version, about)]
pub(crate) struct Args {
    /// Path to the PDB or mmCIF file to be analyzed
    #[arg(short, long)]
    input: PathBuf,

    /// Heavy chain id
    #[arg(long)]
    heavy: String,

    /// Light chain id
    #[arg(long)]
    light: String,

    /// Antigen chain id(s), several joined by `|` (e.g. "A | B")
    #[arg(short, long)]
    antigen: Option<String>,

    /// Distance cutoff in Å for a residue to be in contact with the antigen
    #[arg(short = 'd', long, default_value_t = CONTACT_DISTANCE)]
    contact_distance: f64,

    /// Residues added on either side of each Chothia CDR range
    #[arg(long, default_value_t = CDR_FLANK)]
    flank: isize,

    /// Ignore antigen waters when labelling contacts
    #[arg(long, default_value_t = false)]
    exclude_antigen_waters: bool,
}

impl Args {
    /// Settings for labelling, checked the same way `build` checks its own.
    fn dataset_config(&self) -> paratope::Result<DatasetConfig> {
        let config = DatasetConfig {
            contact_distance: self.contact_distance,
            cdr_flank: self.flank,
            include_antigen_waters: !self.exclude_antigen_waters,
            ..Default::default()
        };
        config.validate()?;
        Ok(config)
    }
}

fn find_chain<'a>(structure: &'a Structure, id: &str) -> paratope::Result<&'a Chain> {
    structure.chain(id).ok_or_else(|| DatasetError::MissingChain {
        pdb: structure.id.clone(),
        chain: id.to_string(),
    })
}

pub(crate) fn run(args: &Args) -> paratope::Result<()> {
    trace!("{args:?}");
    let config = args.dataset_config()?;

    let id = args
        .input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let structure = load_structure(&id, &args.input)?;
    let heavy = find_chain(&structure, &args.heavy)?;
    let light = find_chain(&structure, &args.light)?;

    let antigen = match &args.antigen {
        Some(spec) => {
            let chains = parse_antigen_chains(spec)?
                .iter()
                .map(|c| find_chain(&structure, c))
                .collect::<paratope::Result<Vec<_>>>()?;
            let index = if config.include_antigen_waters {
                AntigenIndex::from_chains(&chains, config.contact_distance)
            } else {
                AntigenIndex::from_residues(
                    chains
                        .iter()
                        .flat_map(|c| c.residues.iter())
                        .filter(|r| !r.is_water()),
                    config.contact_distance,
                )
            };
            debug!("Indexed {} antigen atoms", index.len());
            Some(index)
        }
        None => None,
    };

    println!("File: {}", args.input.display());
    for region in CdrRegion::CANONICAL {
        let chain = match region.chain() {
            AntibodyChain::Heavy => heavy,
            AntibodyChain::Light => light,
        };
        let residues = extract_region(chain, region, config.cdr_flank);
        let seq = residues_to_seq(residues.iter().copied());

        match &antigen {
            Some(index) => {
                let contacts: String = residues
                    .iter()
                    .map(|r| if is_in_contact(r, index) { '1' } else { '0' })
                    .collect();
                for r in &residues {
                    trace!(
                        "{region} {}{}: closest antigen atom {:?} Å",
                        r.name,
                        r.label(),
                        index.min_distance(r)
                    );
                }
                println!("{region}\t{:>2}\t{seq}\t{contacts}", residues.len());
            }
            None => println!("{region}\t{:>2}\t{seq}", residues.len()),
        }
    }
    Ok(())
}
