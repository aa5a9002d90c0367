use crate::validate::ValidationReport;
use derive_getters::{Dissolve, Getters};
use derive_more::IsVariant;
use std::fmt::{self, Display, Formatter};
use std::path::{Path, PathBuf};

/// Terminal state of a single locus.
#[derive(Clone, PartialEq, Eq, Debug, IsVariant)]
pub enum LocusStatus {
    /// The tree file could not be written.
    WriteFailed { error: String },
    /// The alignment is missing and the locus was not written on request.
    MissingAlignment,
    /// The tree was written, rerooting was not requested.
    Written { path: PathBuf },
    /// The tree was written and rerooted into a sibling file.
    Rerooted { path: PathBuf, rerooted: PathBuf },
    /// The tree was written, rerooting was skipped because the outgroup is absent.
    Skipped { path: PathBuf },
    /// The tree was written, the rerooting utility failed.
    RerootFailed { path: PathBuf, error: String },
}

impl LocusStatus {
    /// Path of the written tree file, if any.
    pub fn path(&self) -> Option<&Path> {
        match self {
            LocusStatus::WriteFailed { .. } | LocusStatus::MissingAlignment => None,
            LocusStatus::Written { path }
            | LocusStatus::Rerooted { path, .. }
            | LocusStatus::Skipped { path }
            | LocusStatus::RerootFailed { path, .. } => Some(path.as_path()),
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            LocusStatus::WriteFailed { error } | LocusStatus::RerootFailed { error, .. } => {
                Some(error.as_str())
            }
            _ => None,
        }
    }
}

/// Outcome of the whole run: per-locus states in the order of the log plus the alignment check.
#[derive(Clone, PartialEq, Eq, Debug, Default, Getters, Dissolve)]
pub struct Summary {
    loci: Vec<(String, LocusStatus)>,
    validation: Option<ValidationReport>,
    rerooting: bool,
    // Failures that do not belong to a single locus
    run_errors: Vec<String>,
}

impl Summary {
    pub fn new(validation: Option<ValidationReport>, rerooting: bool) -> Self {
        Self {
            loci: Vec::new(),
            validation,
            rerooting,
            run_errors: Vec::new(),
        }
    }

    pub fn push(&mut self, locus_id: impl Into<String>, status: LocusStatus) {
        self.loci.push((locus_id.into(), status));
    }

    pub fn push_error(&mut self, error: impl Into<String>) {
        self.run_errors.push(error.into());
    }

    pub fn status(&self, locus_id: &str) -> Option<&LocusStatus> {
        self.loci
            .iter()
            .find(|(id, _)| id == locus_id)
            .map(|(_, status)| status)
    }

    fn count(&self, predicate: impl Fn(&LocusStatus) -> bool) -> usize {
        self.loci.iter().filter(|(_, s)| predicate(s)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|s| s.path().is_some())
    }

    pub fn write_failed(&self) -> usize {
        self.count(LocusStatus::is_write_failed)
    }

    pub fn missing_alignment(&self) -> usize {
        self.count(LocusStatus::is_missing_alignment)
    }

    pub fn rerooted(&self) -> usize {
        self.count(LocusStatus::is_rerooted)
    }

    pub fn skipped(&self) -> usize {
        self.count(LocusStatus::is_skipped)
    }

    pub fn reroot_failed(&self) -> usize {
        self.count(LocusStatus::is_reroot_failed)
    }

    /// Tree files that were not rerooted because none of the outgroups were present.
    pub fn no_outgroups(&self) -> impl Iterator<Item = &Path> {
        self.loci.iter().filter_map(|(_, s)| match s {
            LocusStatus::Skipped { path } => Some(path.as_path()),
            _ => None,
        })
    }

    /// Tree files that the rerooting utility failed on.
    pub fn failed_reroots(&self) -> impl Iterator<Item = &Path> {
        self.loci.iter().filter_map(|(_, s)| match s {
            LocusStatus::RerootFailed { path, .. } => Some(path.as_path()),
            _ => None,
        })
    }

    pub fn errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.loci
            .iter()
            .filter_map(|(id, s)| s.error().map(|e| (id.as_str(), e)))
    }
}

impl Display for Summary {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trees written: {}", self.written())?;
        if let Some(validation) = &self.validation {
            writeln!(f, "Trees skipped (missing fasta): {}", self.missing_alignment())?;
            writeln!(f, "Alignment name mismatches: {}", validation.mismatches().count())?;
        }
        writeln!(f, "Trees failed to write: {}", self.write_failed())?;
        if self.rerooting {
            writeln!(f, "Trees rerooted: {}", self.rerooted())?;
            writeln!(f, "Trees reroot failed: {}", self.reroot_failed())?;
            writeln!(f, "Trees without specified outgroups: {}", self.skipped())?;
        }
        for (id, error) in self.errors() {
            writeln!(f, "[ERROR] {id}: {error}")?;
        }
        for error in &self.run_errors {
            writeln!(f, "[ERROR] {error}")?;
        }
        Ok(())
    }
}
