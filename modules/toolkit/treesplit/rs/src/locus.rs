use derive_getters::{Dissolve, Getters};
use derive_more::Display;
use eyre::{Result, ensure};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

// IQ-TREE names partitions as p<N>_<name> when they come from a directory of alignments
static PARTITION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^p\d+_").expect("partition prefix pattern is valid"));

/// Strip the `p<N>_` partition prefix from a locus identifier, if present.
pub fn strip_partition_prefix(locus_id: &str) -> &str {
    match PARTITION_PREFIX.find(locus_id) {
        Some(m) if m.end() < locus_id.len() => &locus_id[m.end()..],
        _ => locus_id,
    }
}

/// A single row of the partition table in the IQ-TREE log.
///
/// Records are created by the log parser and never change afterwards. The order of records
/// follows the order of rows in the log, which is also the order of trees in the tree file.
#[derive(Clone, PartialEq, Eq, Debug, Display, Getters, Dissolve)]
#[display("{locus_id}")]
pub struct LocusRecord {
    #[getter(skip)]
    locus_id: String,
    raw_stats: BTreeMap<String, String>,
    #[getter(skip)]
    has_outgroup: Option<bool>,
}

impl LocusRecord {
    /// Construct a new record. The identifier must be a non-empty string without whitespace,
    /// because it ends up in file names.
    pub fn new(
        locus_id: impl Into<String>,
        raw_stats: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
        has_outgroup: Option<bool>,
    ) -> Result<Self> {
        let locus_id = locus_id.into();
        ensure!(!locus_id.is_empty(), "Locus ID must not be an empty string");
        ensure!(
            !locus_id.contains(char::is_whitespace),
            "Locus ID must not contain whitespace: {locus_id:?}"
        );
        ensure!(
            !locus_id.contains(['/', '\\']),
            "Locus ID must not contain path separators: {locus_id:?}"
        );

        let raw_stats = raw_stats
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        Ok(Self {
            locus_id,
            raw_stats,
            has_outgroup,
        })
    }

    pub fn locus_id(&self) -> &str {
        &self.locus_id
    }

    /// Outgroup membership as reported by the log. `None` if the log does not carry this
    /// information and it must be inferred from the tree itself.
    pub fn has_outgroup(&self) -> Option<bool> {
        self.has_outgroup
    }

    /// Locus name without the `p<N>_` partition prefix.
    pub fn base_name(&self) -> &str {
        strip_partition_prefix(&self.locus_id)
    }
}

/// A newick string taken from the combined tree file, tagged with the locus it belongs to.
#[derive(Clone, PartialEq, Eq, Debug, Dissolve)]
pub struct TreeEntry {
    locus_id: String,
    newick: String,
}

impl TreeEntry {
    pub fn new(locus_id: impl Into<String>, newick: impl Into<String>) -> Result<Self> {
        let (locus_id, newick) = (locus_id.into(), newick.into());
        ensure!(!newick.is_empty(), "Empty tree for locus {locus_id}");
        ensure!(
            !newick.contains(['\n', '\r']),
            "Tree for locus {locus_id} spans multiple lines"
        );
        Ok(Self { locus_id, newick })
    }

    pub fn locus_id(&self) -> &str {
        &self.locus_id
    }

    pub fn newick(&self) -> &str {
        &self.newick
    }
}
