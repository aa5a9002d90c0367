use crate::config::{
    AlignmentCheck, Config, DEFAULT_FASTA_EXTENSION, DEFAULT_OUTGROUP_COLUMN, DEFAULT_PXRR,
    DEFAULT_SUFFIX, RerootConfig,
};
use clap::Parser;
use eyre::{Result, eyre};
use std::path::PathBuf;
use std::time::Duration;

/// Split multi-tree IQ-TREE output into per-locus tree files, with optional rerooting.
#[derive(Parser, Debug, Clone, PartialEq)]
#[command(name = "treesplit", version)]
pub struct Args {
    /// IQ-TREE log file with the partition (locus) table
    #[arg(short = 'l', long = "logfile")]
    pub logfile: PathBuf,

    /// Multi-tree .treefile from IQ-TREE, one tree per locus in the order of the log
    #[arg(short = 'i', long = "input_locus_trees")]
    pub input_locus_trees: PathBuf,

    /// Output directory for individual trees
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,

    /// Suffix for file names, pass an empty string to disable
    #[arg(short = 's', long = "suffix", default_value = DEFAULT_SUFFIX, allow_hyphen_values = true)]
    pub suffix: String,

    /// Directory of fasta files to cross-check locus names against
    #[arg(short = 'f', long = "fasta_directory")]
    pub fasta_directory: Option<PathBuf>,

    /// Extension of the alignment files in the fasta directory
    #[arg(long = "fasta_extension", default_value = DEFAULT_FASTA_EXTENSION)]
    pub fasta_extension: String,

    /// Do not write trees of loci without a matching fasta file
    #[arg(long = "skip_missing_fasta", requires = "fasta_directory")]
    pub skip_missing_fasta: bool,

    /// Comma-separated outgroup list for rerooting (passed to pxrr -g)
    #[arg(short = 'r', long = "reroot")]
    pub reroot: Option<String>,

    /// Only reroot trees containing at least one of the outgroups, others are listed in
    /// no_outgroups.list
    #[arg(long = "keep_only_outgroup")]
    pub keep_only_outgroup: bool,

    /// Column of the partition table that flags outgroup presence
    #[arg(long = "outgroup_column", default_value = DEFAULT_OUTGROUP_COLUMN)]
    pub outgroup_column: String,

    /// Path to the pxrr executable
    #[arg(long = "pxrr", default_value = DEFAULT_PXRR)]
    pub pxrr: PathBuf,

    /// Kill pxrr if it runs longer than this many seconds
    #[arg(long = "reroot_timeout")]
    pub reroot_timeout: Option<f64>,
}

impl Args {
    pub fn into_config(self) -> Result<Config> {
        let alignments = self
            .fasta_directory
            .map(|dir| AlignmentCheck::new(dir, self.fasta_extension, self.skip_missing_fasta))
            .transpose()?;

        let timeout = self
            .reroot_timeout
            .map(|x| {
                Duration::try_from_secs_f64(x)
                    .map_err(|_| eyre!("Invalid reroot timeout: {x} seconds"))
            })
            .transpose()?;

        let reroot = match self.reroot {
            Some(outgroups) => Some(RerootConfig::new(
                &outgroups,
                self.keep_only_outgroup,
                self.pxrr,
                timeout,
            )?),
            None => {
                if self.keep_only_outgroup {
                    log::warn!("--keep_only_outgroup has no effect without --reroot");
                }
                if timeout.is_some() {
                    log::warn!("--reroot_timeout has no effect without --reroot");
                }
                None
            }
        };

        Config::new(
            self.logfile,
            self.input_locus_trees,
            self.output,
            self.suffix,
            self.outgroup_column,
            alignments,
            reroot,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::{TempDir, tempdir};

    // Temporary directory with empty log and tree files
    fn inputs() -> Result<(TempDir, String, String)> {
        let dir = tempdir()?;
        let (log, trees) = (dir.path().join("run.log"), dir.path().join("run.treefile"));
        std::fs::write(&log, "")?;
        std::fs::write(&trees, "")?;
        let log = log.to_string_lossy().into_owned();
        let trees = trees.to_string_lossy().into_owned();
        Ok((dir, log, trees))
    }

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_args() -> Result<()> {
        let (dir, log, trees) = inputs()?;
        let output = dir.path().join("out").to_string_lossy().into_owned();

        let args = Args::try_parse_from([
            "treesplit",
            "--logfile",
            log.as_str(),
            "-i",
            trees.as_str(),
            "-o",
            output.as_str(),
            "--reroot",
            "TaxonX,TaxonY",
            "--keep_only_outgroup",
            "--reroot_timeout",
            "2.5",
        ])?;
        assert_eq!(args.suffix, DEFAULT_SUFFIX);
        assert_eq!(args.pxrr, PathBuf::from("pxrr"));

        let config = args.into_config()?;
        let reroot = config.reroot().as_ref().ok_or_else(|| eyre!("no reroot"))?;
        assert_eq!(reroot.outgroups(), &["TaxonX", "TaxonY"]);
        assert!(*reroot.keep_only_outgroup());
        assert_eq!(*reroot.timeout(), Some(Duration::from_millis(2500)));
        assert!(config.alignments().is_none());
        Ok(())
    }

    #[test]
    fn test_empty_suffix_and_required_args() {
        let args = Args::try_parse_from([
            "treesplit", "-l", "a.log", "-i", "a.treefile", "-o", "out", "-s", "",
        ]);
        assert_eq!(args.map(|x| x.suffix).ok(), Some(String::new()));

        // Missing output
        assert!(Args::try_parse_from(["treesplit", "-l", "a.log", "-i", "a.treefile"]).is_err());
        // Skipping missing fasta files requires the fasta directory
        let args = Args::try_parse_from([
            "treesplit",
            "-l",
            "a.log",
            "-i",
            "a.treefile",
            "-o",
            "out",
            "--skip_missing_fasta",
        ]);
        assert!(args.is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() -> Result<()> {
        let (dir, log, trees) = inputs()?;
        let output = dir.path().join("out").to_string_lossy().into_owned();
        let args = Args::try_parse_from([
            "treesplit",
            "-l",
            log.as_str(),
            "-i",
            trees.as_str(),
            "-o",
            output.as_str(),
            "-r",
            "TaxonX",
            "--reroot_timeout",
            "0",
        ])?;
        assert!(args.into_config().is_err());
        Ok(())
    }
}
