use paratope::{
    compute_entries, load_structure, open_dataset, ChainExt, DatasetCache, DatasetConfig,
    DatasetError, EntryFailurePolicy,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Minimal PDB writer: one CA per antibody residue, one OD1 per antigen residue.
struct PdbWriter {
    lines: String,
    serial: usize,
}

impl PdbWriter {
    fn new() -> Self {
        Self {
            lines: String::new(),
            serial: 0,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn atom(
        &mut self,
        name: &str,
        resn: &str,
        chain: &str,
        resi: isize,
        insertion: &str,
        (x, y, z): (f64, f64, f64),
        element: &str,
    ) {
        self.serial += 1;
        writeln!(
            self.lines,
            "ATOM  {:>5} {:<4}{:1}{:>3} {:1}{:>4}{:1}   {:>8.3}{:>8.3}{:>8.3}{:>6.2}{:>6.2}          {:>2}",
            self.serial, name, "", resn, chain, resi, insertion, x, y, z, 1.0, 20.0, element
        )
        .unwrap();
    }

    /// Residues laid out along x at `serial * 10`, shifted by `z`.
    fn antibody_chain(&mut self, chain: &str, serials: impl IntoIterator<Item = isize>, z: f64) {
        for n in serials {
            self.atom("CA", "TYR", chain, n, "", (n as f64 * 10.0, 100.0, z), "C");
        }
    }

    fn antigen_atom(&mut self, chain: &str, resi: isize, pos: (f64, f64, f64)) {
        self.atom("OD1", "ASP", chain, resi, "", pos, "O");
    }

    fn water(&mut self, chain: &str, resi: isize, pos: (f64, f64, f64)) {
        self.atom("O", "HOH", chain, resi, "", pos, "O");
    }

    fn save(mut self, path: &Path) {
        self.lines.push_str("END\n");
        std::fs::write(path, self.lines).unwrap();
    }
}

/// Heavy chain H, light chain L, two antigen chains. A touches H27 and H100,
/// B touches L91.
fn write_1abc(dir: &Path) {
    let mut pdb = PdbWriter::new();
    pdb.antibody_chain("H", 1..=110, 0.0);
    pdb.antibody_chain("L", 1..=107, 1000.0);
    pdb.antigen_atom("A", 1, (270.0, 103.0, 0.0));
    pdb.antigen_atom("A", 2, (1000.0, 103.0, 0.0));
    pdb.water("A", 101, (0.0, 0.0, -500.0));
    pdb.antigen_atom("B", 1, (910.0, 103.0, 1000.0));
    pdb.save(&dir.join("1abc_ch.pdb"));
}

/// H3 carries insertions 100A and 100B; antigen A touches H52 and H100A.
fn write_2xyz(dir: &Path) {
    let mut pdb = PdbWriter::new();
    pdb.antibody_chain("H", 1..=100, 0.0);
    pdb.atom("CA", "GLY", "H", 100, "A", (1000.0, 100.0, 50.0), "C");
    pdb.atom("CA", "GLY", "H", 100, "B", (1000.0, 100.0, 60.0), "C");
    pdb.antibody_chain("H", 101..=110, 0.0);
    pdb.antibody_chain("L", 1..=107, 1000.0);
    pdb.antigen_atom("A", 1, (520.0, 103.0, 0.0));
    pdb.antigen_atom("A", 2, (1000.0, 103.0, 50.0));
    pdb.save(&dir.join("2xyz_ch.pdb"));
}

fn write_catalog(dir: &Path, rows: &[&str]) -> PathBuf {
    let mut csv = String::from("pdb,Hchain,Lchain,model,antigen_chain,antigen_type\n");
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    let path = dir.join("catalog.csv");
    std::fs::write(&path, csv).unwrap();
    path
}

fn config_for(dir: &Path) -> DatasetConfig {
    DatasetConfig {
        structure_template: dir.join("{id}_ch.pdb").to_string_lossy().to_string(),
        ..Default::default()
    }
}

#[test]
fn structure_files_are_converted() {
    let dir = tempfile::tempdir().unwrap();
    write_2xyz(dir.path());

    let structure = load_structure("2xyz", &dir.path().join("2xyz_ch.pdb")).unwrap();
    let heavy = structure.chain("H").unwrap();
    assert_eq!(heavy.residues.len(), 112);
    assert!(heavy
        .residues
        .iter()
        .any(|r| r.serial == 100 && r.insertion.as_deref() == Some("A")));
    assert_eq!(&heavy.sequence()[99..102], "YGG");

    let (pdb, _) = paratope::load_model(&dir.path().join("2xyz_ch.pdb")).unwrap();
    let chain = pdb.chains().find(|c| c.id() == "H").unwrap();
    assert_eq!(chain.pdb_seq(), heavy.sequence());
}

/// The only antigen atom near the antibody is a water 3 Å from H27.
fn write_3wat(dir: &Path) {
    let mut pdb = PdbWriter::new();
    pdb.antibody_chain("H", 1..=110, 0.0);
    pdb.antibody_chain("L", 1..=107, 1000.0);
    pdb.antigen_atom("A", 1, (5000.0, 0.0, 0.0));
    pdb.water("A", 201, (270.0, 103.0, 0.0));
    pdb.save(&dir.join("3wat_ch.pdb"));
}

#[test]
fn waters_are_kept_out_of_sequences() {
    let dir = tempfile::tempdir().unwrap();
    write_1abc(dir.path());

    let structure = load_structure("1abc", &dir.path().join("1abc_ch.pdb")).unwrap();
    let antigen = structure.chain("A").unwrap();
    assert_eq!(antigen.residues.len(), 3);
    assert_eq!(antigen.atoms().count(), 3);
    assert_eq!(antigen.sequence(), "DD");
}

#[test]
fn antigen_waters_label_contacts() {
    let dir = tempfile::tempdir().unwrap();
    write_3wat(dir.path());
    let catalog = write_catalog(dir.path(), &["3wat,H,L,0,A,protein"]);
    let config = config_for(dir.path());

    let record = compute_entries(&catalog, &config).unwrap();
    assert_eq!(record.num_in_contact, 1);
    assert_eq!(record.lbls[[0, 0, 3, 0]], 1.0);

    let dry = DatasetConfig {
        include_antigen_waters: false,
        ..config
    };
    let err = compute_entries(&catalog, &dry).unwrap_err();
    assert!(matches!(err, DatasetError::NoContacts { entries: 1 }), "{err}");
}

#[test]
fn catalog_to_tensors() {
    let dir = tempfile::tempdir().unwrap();
    write_1abc(dir.path());
    write_2xyz(dir.path());
    let catalog = write_catalog(
        dir.path(),
        &["1abc,H,L,0,A | B,protein", "2xyz,H,L,0,A,protein"],
    );

    let record = compute_entries(&catalog, &config_for(dir.path())).unwrap();
    assert_eq!(record.pdb_ids, vec!["1abc", "2xyz"]);
    assert_eq!(record.cdrs.shape(), &[2, 6, 31, 28]);
    assert_eq!(record.lbls.shape(), &[2, 6, 31, 1]);
    assert_eq!(record.masks.shape(), &[2, 6, 31, 1]);

    // 71 CDR residues per antibody, plus the two H3 insertions of 2xyz
    assert_eq!(record.num_residues, 71 + 73);
    assert_eq!(record.num_in_contact, 5);
    assert_eq!(record.pos_class_weight, 144.0 / 5.0);

    // 1abc: H1 27 (index 3), H3 100 (index 7), L3 91 (index 4)
    assert_eq!(record.lbls[[0, 0, 3, 0]], 1.0);
    assert_eq!(record.lbls[[0, 2, 7, 0]], 1.0);
    assert_eq!(record.lbls[[0, 5, 4, 0]], 1.0);

    // 2xyz: H3 spans 93..104 with 100A/100B after 100
    let h3_mask: u32 = record.masks.slice(ndarray::s![1, 2, .., 0]).iter().map(|&m| m as u32).sum();
    assert_eq!(h3_mask, 14);
    assert_eq!(record.lbls[[1, 2, 8, 0]], 1.0);
    assert_eq!(record.lbls[[1, 1, 2, 0]], 1.0);
}

#[test]
fn cache_miss_then_hit() {
    let dir = tempfile::tempdir().unwrap();
    write_1abc(dir.path());
    let catalog = write_catalog(dir.path(), &["1abc,H,L,0,A | B,protein"]);
    let config = config_for(dir.path());
    let cache = DatasetCache::new(dir.path().join("cache"));

    let built = open_dataset(&catalog, &config, &cache, false).unwrap();
    let key = cache.key(&catalog, &config).unwrap();
    assert!(cache.path_for(&key).is_file());

    // Once cached, the structure files are no longer read
    std::fs::remove_file(dir.path().join("1abc_ch.pdb")).unwrap();
    let loaded = open_dataset(&catalog, &config, &cache, false).unwrap();
    assert_eq!(built, loaded);

    // A rebuild goes back to the structure files
    let err = open_dataset(&catalog, &config, &cache, true).unwrap_err();
    assert!(err.is_entry_level(), "{err}");
    assert!(!cache.path_for(&key).exists());
}

#[test]
fn missing_chain_aborts_or_skips() {
    let dir = tempfile::tempdir().unwrap();
    write_1abc(dir.path());
    write_2xyz(dir.path());
    let catalog = write_catalog(
        dir.path(),
        &["1abc,H,L,0,A | B,protein", "2xyz,H,K,0,A,protein"],
    );

    let config = config_for(dir.path());
    match compute_entries(&catalog, &config) {
        Err(DatasetError::Entry { pdb, source }) => {
            assert_eq!(pdb, "2xyz");
            assert!(matches!(*source, DatasetError::MissingChain { .. }));
        }
        other => panic!("expected a missing chain error, got {other:?}"),
    }

    let skipping = DatasetConfig {
        on_error: EntryFailurePolicy::Skip,
        ..config
    };
    let record = compute_entries(&catalog, &skipping).unwrap();
    assert_eq!(record.pdb_ids, vec!["1abc"]);
    assert_eq!(record.num_in_contact, 3);
}
