use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use biobit_treesplit_rs::{
    AlignmentCheck, AlignmentMatch, Config, Engine, LocusStatus, RerootConfig, Rerooter, Reroot,
};
use eyre::{Result, bail, ensure, eyre};
use tempfile::{TempDir, tempdir};

pub fn get_resource_path(resource: impl AsRef<Path>) -> Result<PathBuf> {
    let resource = resource.as_ref();
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .map(|x| x.join("resources"))
        .map(|x| x.join(resource))
        .ok_or_else(|| {
            eyre!(
                "Failed to locate requested resource: {}",
                resource.display()
            )
        })?;
    ensure!(
        path.exists(),
        "Requested resource does not exist: {}",
        path.display()
    );
    Ok(path)
}

/// Mock of pxrr: prepends a marker to the tree, fails for trees listed in `fail_on`.
#[derive(Clone, Default)]
struct MockPxrr {
    fail_on: Vec<&'static str>,
    calls: Rc<RefCell<Vec<PathBuf>>>,
}

impl Reroot for MockPxrr {
    fn reroot(&self, tree: &Path, outgroups: &[String], saveto: &Path) -> Result<()> {
        self.calls.borrow_mut().push(tree.to_path_buf());
        let name = tree.file_name().map(|x| x.to_string_lossy()).unwrap_or_default();
        if self.fail_on.iter().any(|x| name.contains(x)) {
            bail!("pxrr: none of the outgroups ({}) are in the tree", outgroups.join(","));
        }
        let newick = std::fs::read_to_string(tree)?;
        std::fs::write(saveto, format!("[&R] {newick}"))?;
        Ok(())
    }
}

fn config(
    log: &str,
    trees: &str,
    output: &Path,
    suffix: &str,
    alignments: Option<AlignmentCheck>,
    reroot: Option<RerootConfig>,
) -> Result<Config> {
    Config::new(
        get_resource_path(log)?,
        get_resource_path(trees)?,
        output,
        suffix,
        "Outgroup",
        alignments,
        reroot,
    )
}

fn tree_files(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.ends_with(".treefile") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn output_dir() -> Result<(TempDir, PathBuf)> {
    let dir = tempdir()?;
    let output = dir.path().join("trees");
    Ok((dir, output))
}

#[test]
fn split_preserves_trees() -> Result<()> {
    let (_dir, output) = output_dir()?;
    let config = config(
        "iqtree/loci.log",
        "iqtree/loci.treefile",
        &output,
        "_trimalauto",
        None,
        None,
    )?;
    let summary = Engine::new(config)?.run()?;

    assert_eq!(summary.loci().len(), 4);
    assert_eq!(summary.written(), 4);
    assert_eq!(
        tree_files(&output)?,
        [
            "core_1001_trimalauto.treefile",
            "core_1002_trimalauto.treefile",
            "core_1003_trimalauto.treefile",
            "core_1004_trimalauto.treefile",
        ]
    );

    // Every file holds exactly the corresponding line of the combined tree file
    let combined = std::fs::read_to_string(get_resource_path("iqtree/loci.treefile")?)?;
    for (ind, expected) in combined.lines().enumerate() {
        let path = output.join(format!("core_100{}_trimalauto.treefile", ind + 1));
        let written = std::fs::read_to_string(path)?;
        assert_eq!(written.trim_end_matches('\n'), expected);
    }
    Ok(())
}

#[test]
fn count_mismatch_is_fatal() -> Result<()> {
    let (_dir, output) = output_dir()?;
    let config = config(
        "iqtree/loci.log",
        "iqtree/outgroups.treefile",
        &output,
        "_trimalauto",
        None,
        None,
    )?;
    let err = Engine::new(config)?.run().unwrap_err();
    assert!(format!("{err:#}").contains("doesn't match"), "{err:#}");
    assert!(!output.exists());
    Ok(())
}

#[test]
fn alignment_names_are_validated() -> Result<()> {
    let (_dir, output) = output_dir()?;
    let fasta = get_resource_path("fasta")?;
    let check = AlignmentCheck::new(&fasta, "fasta", false)?;
    let config = config(
        "iqtree/loci.log",
        "iqtree/loci.treefile",
        &output,
        "_trimalauto",
        Some(check),
        None,
    )?;
    let summary = Engine::new(config)?.run()?;

    let report = summary
        .validation()
        .as_ref()
        .ok_or_else(|| eyre!("Validation report is missing"))?;
    assert_eq!(
        report.get("p1_core_1001"),
        Some(&AlignmentMatch::Found(fasta.join("core_1001_trimalauto.fasta")))
    );
    assert_eq!(
        report.get("p2_core_1002"),
        Some(&AlignmentMatch::Found(fasta.join("p2_core_1002_trimalauto.fasta")))
    );
    let mismatches: Vec<_> = report.mismatches().map(|(id, _)| id).collect();
    assert_eq!(mismatches, ["p3_core_1003"]);

    // Diagnostic only: all trees are still written
    assert_eq!(summary.written(), 4);
    assert_eq!(summary.missing_alignment(), 0);
    assert!(summary.to_string().contains("Alignment name mismatches: 1"));
    Ok(())
}

#[test]
fn keep_only_outgroup_from_log_column() -> Result<()> {
    let (_dir, output) = output_dir()?;
    let reroot = RerootConfig::new("TaxonX", true, "pxrr", None)?;
    let pxrr = MockPxrr::default();
    let rerooter = Rerooter::new(Box::new(pxrr.clone()), &reroot)?;
    let config = config(
        "iqtree/outgroups.log",
        "iqtree/outgroups.treefile",
        &output,
        "",
        None,
        Some(reroot),
    )?;
    let summary = Engine::with_rerooter(config, Some(rerooter)).run()?;

    assert_eq!(tree_files(&output)?, ["geneA.treefile", "geneB.treefile"]);
    assert!(matches!(
        summary.status("p1_geneA"),
        Some(LocusStatus::Rerooted { .. })
    ));
    assert!(matches!(
        summary.status("p2_geneB"),
        Some(LocusStatus::Skipped { .. })
    ));
    assert_eq!(*pxrr.calls.borrow(), [output.join("geneA.treefile")]);

    assert_eq!(
        std::fs::read_to_string(output.join("geneA.treefile.rr"))?,
        "[&R] ((A:0.1,B:0.2):0.05,(C:0.3,TaxonX:0.4):0.1);\n"
    );
    assert_eq!(
        std::fs::read_to_string(output.join("geneB.treefile"))?,
        "((A:0.1,B:0.2):0.05,C:0.3);\n"
    );
    assert!(!output.join("geneB.treefile.rr").exists());
    assert_eq!(
        std::fs::read_to_string(output.join("no_outgroups.list"))?,
        format!("{}\n", output.join("geneB.treefile").display())
    );
    Ok(())
}

#[test]
fn reroot_failures_do_not_stop_the_run() -> Result<()> {
    let (_dir, output) = output_dir()?;
    let reroot = RerootConfig::new("Amborella,Nymphaea", true, "pxrr", None)?;
    let pxrr = MockPxrr {
        fail_on: vec!["core_1003"],
        ..Default::default()
    };
    let rerooter = Rerooter::new(Box::new(pxrr.clone()), &reroot)?;
    let config = config(
        "iqtree/loci.log",
        "iqtree/loci.treefile",
        &output,
        "_trimalauto",
        None,
        Some(reroot),
    )?;
    let summary = Engine::with_rerooter(config, Some(rerooter)).run()?;

    // core_1001: Amborella, core_1003: Amborella + Nymphaea, others have none of them
    assert_eq!(summary.written(), 4);
    assert_eq!(summary.rerooted(), 1);
    assert_eq!(summary.reroot_failed(), 1);
    assert_eq!(summary.skipped(), 2);
    assert_eq!(pxrr.calls.borrow().len(), 2);

    let failed = std::fs::read_to_string(output.join("reroot_failed.list"))?;
    assert_eq!(
        failed,
        format!("{}\n", output.join("core_1003_trimalauto.treefile").display())
    );
    let no_outgroups = std::fs::read_to_string(output.join("no_outgroups.list"))?;
    assert_eq!(no_outgroups.lines().count(), 2);

    let printed = summary.to_string();
    assert!(printed.contains("Trees rerooted: 1"), "{printed}");
    assert!(printed.contains("Trees without specified outgroups: 2"), "{printed}");
    assert!(printed.contains("[ERROR] p3_core_1003: pxrr: none of the outgroups"), "{printed}");
    Ok(())
}
