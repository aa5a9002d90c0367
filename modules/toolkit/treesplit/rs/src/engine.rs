use crate::config::Config;
use crate::locus::{LocusRecord, TreeEntry};
use crate::logfile::LogParser;
use crate::reroot::{RerootOutcome, Rerooter};
use crate::result::{LocusStatus, Summary};
use crate::router::Router;
use crate::trees;
use crate::validate::{self, ValidationReport};
use eyre::{Result, WrapErr};
use std::io::Write;
use std::path::Path;

pub const NO_OUTGROUPS_LIST: &str = "no_outgroups.list";
pub const REROOT_FAILED_LIST: &str = "reroot_failed.list";

/// Drives every locus through `parsed -> written -> {rerooted | skipped | reroot_failed}`.
///
/// Structural problems with the inputs abort the run before anything is written. Failures that
/// concern a single locus are recorded in the [Summary] and the run moves on to the next locus.
pub struct Engine {
    config: Config,
    rerooter: Option<Rerooter>,
}

impl Engine {
    /// Engine that reroots with `pxrr` if the config requests rerooting.
    pub fn new(config: Config) -> Result<Self> {
        let rerooter = config.reroot().as_ref().map(Rerooter::pxrr).transpose()?;
        Ok(Self { config, rerooter })
    }

    /// Engine with a custom rerooting backend (or none at all).
    pub fn with_rerooter(config: Config, rerooter: Option<Rerooter>) -> Self {
        Self { config, rerooter }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn run(&self) -> Result<Summary> {
        let config = &self.config;

        // Parse everything first, a fatal input error must leave no output behind
        let records =
            LogParser::new(config.outgroup_column().as_str()).from_path(config.logfile())?;
        let trees = trees::from_path(config.trees(), &records)?;

        let validation = config
            .alignments()
            .as_ref()
            .map(|check| validate::validate(&records, config.suffix(), check));

        // An uncreatable output directory fails every locus, not the run
        let mut router = Router::new(config.output(), config.suffix().as_str()).map_err(|err| {
            log::error!("{err:#}");
            format!("{err:#}")
        });

        let mut summary = Summary::new(validation, self.rerooter.is_some());
        for (record, tree) in records.iter().zip(trees.iter()) {
            let status = self.process(
                router.as_mut().map_err(|err| err.as_str()),
                record,
                tree,
                summary.validation().as_ref(),
            );
            summary.push(record.locus_id(), status);
        }

        if let (Some(_), Ok(router)) = (&self.rerooter, &router) {
            for err in write_lists(router.directory(), &summary) {
                log::error!("{err:#}");
                summary.push_error(format!("{err:#}"));
            }
        }

        log::info!(
            "Processed {} loci: {} written, {} rerooted, {} skipped, {} failed",
            summary.loci().len(),
            summary.written(),
            summary.rerooted(),
            summary.skipped(),
            summary.write_failed() + summary.reroot_failed()
        );
        Ok(summary)
    }

    fn process(
        &self,
        router: Result<&mut Router, &str>,
        record: &LocusRecord,
        tree: &TreeEntry,
        validation: Option<&ValidationReport>,
    ) -> LocusStatus {
        let skip_missing = self
            .config
            .alignments()
            .as_ref()
            .is_some_and(|x| *x.skip_missing());
        if skip_missing {
            let found = validation
                .and_then(|x| x.get(record.locus_id()))
                .is_some_and(|x| x.is_found());
            if !found {
                log::info!("Locus {record}: no matching alignment, the tree is not written");
                return LocusStatus::MissingAlignment;
            }
        }

        let router = match router {
            Ok(router) => router,
            Err(error) => {
                return LocusStatus::WriteFailed {
                    error: error.to_owned(),
                };
            }
        };
        let mut file = match router.write(record, tree) {
            Ok(file) => file,
            Err(err) => {
                log::error!("Locus {record}: {err:#}");
                return LocusStatus::WriteFailed {
                    error: format!("{err:#}"),
                };
            }
        };

        let Some(rerooter) = &self.rerooter else {
            return LocusStatus::Written {
                path: file.path().clone(),
            };
        };

        let path = file.path().clone();
        match rerooter.process(record, &mut file) {
            RerootOutcome::Rerooted(rerooted) => LocusStatus::Rerooted { path, rerooted },
            RerootOutcome::Skipped => LocusStatus::Skipped { path },
            RerootOutcome::Failed(error) => LocusStatus::RerootFailed { path, error },
        }
    }
}

/// `no_outgroups.list` is always written when rerooting, `reroot_failed.list` only on failures.
/// Returns the errors of the lists that could not be written.
fn write_lists(directory: &Path, summary: &Summary) -> Vec<eyre::Report> {
    let mut lists = vec![(NO_OUTGROUPS_LIST, summary.no_outgroups().collect::<Vec<_>>())];
    if summary.reroot_failed() > 0 {
        lists.push((REROOT_FAILED_LIST, summary.failed_reroots().collect()));
    }

    let mut errors = Vec::new();
    for (name, items) in lists {
        let saveto = directory.join(name);
        match write_list(&saveto, items) {
            Ok(()) => log::info!("Wrote {name}: {}", saveto.display()),
            Err(err) => errors.push(err),
        }
    }
    errors
}

fn write_list<'a>(saveto: &Path, items: impl IntoIterator<Item = &'a Path>) -> Result<()> {
    let mut content = Vec::new();
    for item in items {
        writeln!(content, "{}", item.display())?;
    }
    std::fs::write(saveto, content)
        .wrap_err_with(|| format!("Failed to write {}", saveto.display()))
}
