use crate::locus::LocusRecord;
use eyre::{Result, WrapErr, bail, ensure, eyre};
use std::collections::HashSet;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Column that carries the locus identifier. Always the last one in IQ-TREE tables.
const NAME_COLUMN: &str = "Name";
/// Accepted names for the first column (partition index).
const INDEX_COLUMNS: &[&str] = &["ID", "Subset"];
/// Legend that IQ-TREE prints right after the partition table.
const LEGEND: &str = "Column meanings";

/// Parser for the partition table of an IQ-TREE log:
///
/// ```text
///   ID  Type  Seq  Site  Unique  Infor  Invar  Const  Name
///    1  DNA    48   606     143     62    461    461  p1_geneA
///    2  DNA    48   522     120     55    402    402  p2_geneB
/// Column meanings:
/// ...
/// ```
///
/// The header is recognized by its first two columns (`ID`/`Subset` and `Type`) and the last one
/// (`Name`). Rows follow the header until a blank line, the column legend, or the end of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogParser {
    outgroup_column: String,
}

impl Default for LogParser {
    fn default() -> Self {
        Self::new("Outgroup")
    }
}

impl LogParser {
    /// `outgroup_column` is the header of an optional column with per-locus outgroup presence.
    pub fn new(outgroup_column: impl Into<String>) -> Self {
        Self {
            outgroup_column: outgroup_column.into(),
        }
    }

    pub fn outgroup_column(&self) -> &str {
        &self.outgroup_column
    }

    pub fn from_path(&self, path: impl AsRef<Path>) -> Result<Vec<LocusRecord>> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .wrap_err_with(|| format!("Failed to open the log file: {}", path.display()))?;
        self.parse(BufReader::new(file))
            .wrap_err_with(|| format!("Failed to parse the log file: {}", path.display()))
    }

    pub fn parse(&self, reader: impl BufRead) -> Result<Vec<LocusRecord>> {
        let mut lines = reader.lines().enumerate();

        // Locate the header
        let header = loop {
            let Some((_, line)) = lines.next() else {
                bail!("Partition table header (ID/Subset Type ... Name) was not found");
            };
            let line = line?;
            let columns: Vec<&str> = line.split_whitespace().collect();
            if is_header(&columns) {
                break columns.into_iter().map(str::to_owned).collect::<Vec<_>>();
            }
        };
        let outgroup = header.iter().position(|x| *x == self.outgroup_column);
        log::debug!("Partition table columns: {}", header.join(", "));

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for (ind, line) in lines {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                if records.is_empty() {
                    continue;
                }
                break;
            }
            if line.starts_with(LEGEND) {
                break;
            }

            let lineno = ind + 1;
            let fields: Vec<&str> = line.split_whitespace().collect();
            ensure!(
                fields.len() == header.len(),
                "Line {lineno}: expected {} columns in the partition table, got {}: {line:?}",
                header.len(),
                fields.len()
            );

            let index: usize = fields[0]
                .parse()
                .map_err(|_| eyre!("Line {lineno}: invalid partition index {:?}", fields[0]))?;
            ensure!(
                index == records.len() + 1,
                "Line {lineno}: partitions must be listed in order, expected index {}, got {index}",
                records.len() + 1
            );

            let locus_id = fields[fields.len() - 1];
            ensure!(
                seen.insert(locus_id.to_owned()),
                "Line {lineno}: locus {locus_id} is listed more than once"
            );

            let has_outgroup = outgroup
                .map(|col| parse_flag(fields[col]))
                .transpose()
                .wrap_err_with(|| format!("Line {lineno}: invalid {} value", self.outgroup_column))?;

            let stats = header
                .iter()
                .zip(fields.iter())
                .skip(1)
                .take(header.len() - 2)
                .map(|(k, v)| (k.as_str(), *v));
            let record = LocusRecord::new(locus_id, stats, has_outgroup)
                .wrap_err_with(|| format!("Line {lineno}: invalid partition row"))?;
            records.push(record);
        }

        ensure!(!records.is_empty(), "Partition table does not list any loci");
        log::info!(
            "Parsed {} loci from the partition table (outgroup column: {})",
            records.len(),
            if outgroup.is_some() { "present" } else { "absent" }
        );
        Ok(records)
    }
}

fn is_header(columns: &[&str]) -> bool {
    columns.len() >= 3
        && INDEX_COLUMNS.contains(&columns[0])
        && columns[1] == "Type"
        && columns[columns.len() - 1] == NAME_COLUMN
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "yes" | "y" | "true" | "t" | "1" | "+" => Ok(true),
        "no" | "n" | "false" | "f" | "0" | "-" => Ok(false),
        _ => Err(eyre!("Expected a yes/no flag, got {value:?}")),
    }
}
