use crate::locus::{LocusRecord, TreeEntry};
use derive_getters::{Dissolve, Getters};
use eyre::{Result, WrapErr, ensure};
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TREE_EXTENSION: &str = "treefile";

/// A per-locus tree file produced by the [Router].
#[derive(Clone, PartialEq, Eq, Debug, Getters, Dissolve)]
pub struct OutputFile {
    path: PathBuf,
    source_tree: TreeEntry,
    // Sibling file with the rerooted tree, if rerooting succeeded
    rerooted: Option<PathBuf>,
}

impl OutputFile {
    pub fn is_rerooted(&self) -> bool {
        self.rerooted.is_some()
    }

    pub fn set_rerooted(&mut self, path: impl Into<PathBuf>) -> &mut Self {
        self.rerooted = Some(path.into());
        self
    }
}

/// Writes every locus tree into its own file `<locus name><suffix>.treefile` inside the output
/// directory. The `p<N>_` partition prefix is dropped from the file name.
#[derive(Debug)]
pub struct Router {
    directory: PathBuf,
    suffix: String,
    written: HashSet<PathBuf>,
}

impl Router {
    /// Create the router and the output directory (if absent).
    pub fn new(directory: impl Into<PathBuf>, suffix: impl Into<String>) -> Result<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory).wrap_err_with(|| {
            format!(
                "Failed to create the output directory: {}",
                directory.display()
            )
        })?;
        Ok(Self {
            directory,
            suffix: suffix.into(),
            written: HashSet::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn base_name(&self, record: &LocusRecord) -> String {
        format!("{}{}", record.base_name(), self.suffix)
    }

    pub fn path(&self, record: &LocusRecord) -> PathBuf {
        self.directory
            .join(format!("{}.{TREE_EXTENSION}", self.base_name(record)))
    }

    /// Write the tree of a single locus. An error here concerns only this locus.
    pub fn write(&mut self, record: &LocusRecord, tree: &TreeEntry) -> Result<OutputFile> {
        ensure!(
            record.locus_id() == tree.locus_id(),
            "Tree of locus {} can't be routed to locus {}",
            tree.locus_id(),
            record.locus_id()
        );

        let path = self.path(record);
        ensure!(
            !self.written.contains(&path),
            "Output file {} was already written for another locus in this run",
            path.display()
        );

        let mut file = std::fs::File::create(&path)
            .wrap_err_with(|| format!("Failed to create {}", path.display()))?;
        writeln!(file, "{}", tree.newick())
            .and_then(|_| file.flush())
            .wrap_err_with(|| format!("Failed to write {}", path.display()))?;

        log::debug!("Locus {record}: tree written to {}", path.display());
        self.written.insert(path.clone());
        Ok(OutputFile {
            path,
            source_tree: tree.clone(),
            rerooted: None,
        })
    }
}
