use crate::config::AlignmentCheck;
use crate::locus::LocusRecord;
use derive_getters::{Dissolve, Getters};
use derive_more::IsVariant;
use itertools::Itertools;
use std::path::{Path, PathBuf};

/// Outcome of the alignment lookup for a single locus.
#[derive(Clone, PartialEq, Eq, Debug, IsVariant)]
pub enum AlignmentMatch {
    /// An alignment file with one of the expected names exists.
    Found(PathBuf),
    /// None of the expected file names exist in the alignment directory.
    Missing { expected: Vec<String> },
}

#[derive(Clone, PartialEq, Eq, Debug, Default, Getters, Dissolve)]
pub struct ValidationReport {
    // (locus ID, match) in the order of loci in the log
    entries: Vec<(String, AlignmentMatch)>,
}

impl ValidationReport {
    pub fn get(&self, locus_id: &str) -> Option<&AlignmentMatch> {
        self.entries
            .iter()
            .find(|(id, _)| id == locus_id)
            .map(|(_, m)| m)
    }

    pub fn mismatches(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().filter_map(|(id, m)| match m {
            AlignmentMatch::Found(_) => None,
            AlignmentMatch::Missing { expected } => Some((id.as_str(), expected.as_slice())),
        })
    }
}

/// Alignment file names that are accepted for the given locus, most specific first:
/// `<locus_id><suffix>.<ext>` and `<locus_name><suffix>.<ext>` (without the `p<N>_` prefix).
pub fn expected_names(record: &LocusRecord, suffix: &str, extension: &str) -> Vec<String> {
    [record.locus_id(), record.base_name()]
        .into_iter()
        .dedup()
        .map(|name| format!("{name}{suffix}.{extension}"))
        .collect()
}

/// Look up the alignment of every locus in the directory and report the results. Purely
/// diagnostic: lookup failures are reported as missing alignments and never returned as errors.
pub fn validate(records: &[LocusRecord], suffix: &str, check: &AlignmentCheck) -> ValidationReport {
    let entries: Vec<_> = records
        .iter()
        .map(|record| {
            let expected = expected_names(record, suffix, check.extension());
            let result = lookup(check.directory(), expected);
            match &result {
                AlignmentMatch::Found(path) => {
                    log::debug!("Locus {record}: alignment found at {}", path.display())
                }
                AlignmentMatch::Missing { expected } => log::warn!(
                    "Locus {record}: no alignment named {} in {}",
                    expected.iter().join(" or "),
                    check.directory().display()
                ),
            }
            (record.locus_id().to_owned(), result)
        })
        .collect();

    let missing = entries.iter().filter(|(_, m)| !m.is_found()).count();
    log::info!(
        "Alignment check: {} of {} loci matched files in {}",
        entries.len() - missing,
        entries.len(),
        check.directory().display()
    );
    ValidationReport { entries }
}

fn lookup(directory: &Path, expected: Vec<String>) -> AlignmentMatch {
    for name in &expected {
        let path = directory.join(name);
        match path.try_exists() {
            Ok(true) => return AlignmentMatch::Found(path),
            Ok(false) => {}
            Err(err) => log::warn!("Failed to check {}: {err}", path.display()),
        }
    }
    AlignmentMatch::Missing { expected }
}
