use crate::locus::{LocusRecord, TreeEntry};
use eyre::{Result, WrapErr, ensure};
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Read the combined tree file and pair its trees with locus records by position.
///
/// The file must contain exactly one newick string per locus, in the order of the partition
/// table. Blank lines are ignored. Any other discrepancy in the number of trees is fatal since the
/// pairing can't be trusted anymore.
pub fn from_path(path: impl AsRef<Path>, records: &[LocusRecord]) -> Result<Vec<TreeEntry>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path)
        .wrap_err_with(|| format!("Failed to open the tree file: {}", path.display()))?;
    extract(BufReader::new(file), records)
        .wrap_err_with(|| format!("Failed to read trees from {}", path.display()))
}

pub fn extract(reader: impl BufRead, records: &[LocusRecord]) -> Result<Vec<TreeEntry>> {
    let mut trees = Vec::with_capacity(records.len());
    for line in reader.lines() {
        let line = line?;
        let newick = line.trim();
        if newick.is_empty() {
            continue;
        }
        trees.push(newick.to_owned());
    }

    ensure!(
        trees.len() == records.len(),
        "The number of trees ({}) doesn't match the number of loci in the log ({})",
        trees.len(),
        records.len()
    );

    records
        .iter()
        .zip(trees)
        .map(|(record, newick)| {
            if !newick.ends_with(';') {
                log::warn!(
                    "Tree for locus {} is not terminated with ';', writing it as is",
                    record.locus_id()
                );
            }
            TreeEntry::new(record.locus_id(), newick)
        })
        .collect()
}
