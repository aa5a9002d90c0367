use derive_getters::{Dissolve, Getters};
use eyre::{Result, ensure};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_SUFFIX: &str = "_trimalauto";
pub const DEFAULT_FASTA_EXTENSION: &str = "fasta";
pub const DEFAULT_OUTGROUP_COLUMN: &str = "Outgroup";
pub const DEFAULT_PXRR: &str = "pxrr";

/// Cross-check of locus names against a directory of source alignments.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve)]
pub struct AlignmentCheck {
    directory: PathBuf,
    extension: String,
    // Do not write trees for loci without a matching alignment
    skip_missing: bool,
}

impl AlignmentCheck {
    pub fn new(
        directory: impl Into<PathBuf>,
        extension: impl Into<String>,
        skip_missing: bool,
    ) -> Result<Self> {
        let directory = directory.into();
        let extension = extension.into();
        let extension = extension.trim_start_matches('.').to_owned();
        ensure!(!extension.is_empty(), "Alignment file extension must not be empty");
        ensure!(
            directory.is_dir(),
            "Alignment directory does not exist or is not a directory: {}",
            directory.display()
        );
        Ok(Self {
            directory,
            extension,
            skip_missing,
        })
    }
}

/// Settings of the external rerooting step.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve)]
pub struct RerootConfig {
    outgroups: Vec<String>,
    keep_only_outgroup: bool,
    program: PathBuf,
    timeout: Option<Duration>,
}

impl RerootConfig {
    /// `outgroups` is the comma-separated list of taxa, exactly as it is passed to `pxrr -g`.
    pub fn new(
        outgroups: &str,
        keep_only_outgroup: bool,
        program: impl Into<PathBuf>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let outgroups: Vec<String> = outgroups
            .split(',')
            .map(str::trim)
            .filter(|x| !x.is_empty())
            .map(str::to_owned)
            .collect();
        ensure!(!outgroups.is_empty(), "At least one outgroup taxon must be specified");
        if let Some(timeout) = timeout {
            ensure!(!timeout.is_zero(), "Reroot timeout must be positive");
        }

        let program = program.into();
        ensure!(
            !program.as_os_str().is_empty(),
            "Path to the rerooting program must not be empty"
        );

        Ok(Self {
            outgroups,
            keep_only_outgroup,
            program,
            timeout,
        })
    }
}

/// Fully validated settings of a single run.
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve)]
pub struct Config {
    logfile: PathBuf,
    trees: PathBuf,
    output: PathBuf,
    suffix: String,
    outgroup_column: String,
    alignments: Option<AlignmentCheck>,
    reroot: Option<RerootConfig>,
}

impl Config {
    pub fn new(
        logfile: impl Into<PathBuf>,
        trees: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        suffix: impl Into<String>,
        outgroup_column: impl Into<String>,
        alignments: Option<AlignmentCheck>,
        reroot: Option<RerootConfig>,
    ) -> Result<Self> {
        let (logfile, trees, output) = (logfile.into(), trees.into(), output.into());
        for (name, path) in [("Log file", &logfile), ("Tree file", &trees)] {
            ensure!(path.is_file(), "{name} does not exist: {}", path.display());
        }
        ensure!(
            !output.is_file(),
            "Output path points to an existing file: {}",
            output.display()
        );

        let suffix = suffix.into();
        ensure!(
            !suffix.contains(['/', '\\']) && !suffix.contains(char::is_whitespace),
            "Suffix must not contain path separators or whitespace: {suffix:?}"
        );

        let outgroup_column = outgroup_column.into();
        ensure!(!outgroup_column.is_empty(), "Outgroup column name must not be empty");

        Ok(Self {
            logfile,
            trees,
            output,
            suffix,
            outgroup_column,
            alignments,
            reroot,
        })
    }
}
