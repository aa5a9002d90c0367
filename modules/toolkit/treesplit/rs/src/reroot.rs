use crate::config::RerootConfig;
use crate::locus::{LocusRecord, TreeEntry};
use crate::router::OutputFile;
use derive_more::IsVariant;
use eyre::{Result, WrapErr, bail, ensure, eyre};
use itertools::Itertools;
use regex::Regex;
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc;
use std::time::{Duration, Instant};

pub const REROOTED_EXTENSION: &str = "rr";

const POLL_INTERVAL: Duration = Duration::from_millis(50);
// How long to wait for stderr once the child has exited or was killed
const STDERR_GRACE: Duration = Duration::from_millis(500);
// Characters that delimit taxon labels in a newick string
const LABEL_DELIMITERS: &str = r#"[\s(),:;\[\]'"]"#;

/// External program that reroots a single tree file on the given outgroups.
pub trait Reroot {
    /// Reroot the tree in `tree` and save the result to `saveto`.
    fn reroot(&self, tree: &Path, outgroups: &[String], saveto: &Path) -> Result<()>;
}

/// `pxrr` from the phyx toolkit: `pxrr -t <tree> -r -g <og1,og2,...> -o <saveto>`.
///
/// With `-r` pxrr walks the outgroup list in order and roots on the first one present in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pxrr {
    program: PathBuf,
    timeout: Option<Duration>,
}

impl Pxrr {
    pub fn new(program: impl Into<PathBuf>, timeout: Option<Duration>) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn command(&self, tree: &Path, outgroups: &[String], saveto: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-t")
            .arg(tree)
            .arg("-r")
            .arg("-g")
            .arg(outgroups.join(","))
            .arg("-o")
            .arg(saveto)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        cmd
    }
}

impl Reroot for Pxrr {
    fn reroot(&self, tree: &Path, outgroups: &[String], saveto: &Path) -> Result<()> {
        let mut cmd = self.command(tree, outgroups, saveto);
        let cmdline = std::iter::once(cmd.get_program())
            .chain(cmd.get_args())
            .map(|x| x.to_string_lossy())
            .join(" ");
        log::info!("[RUN] {cmdline}");

        let mut child = cmd
            .spawn()
            .wrap_err_with(|| format!("Failed to launch {}", self.program.display()))?;

        // Drain stderr in the background, otherwise a chatty child could block on a full pipe
        let stderr = child.stderr.take();
        let (sender, receiver) = mpsc::channel();
        std::thread::spawn(move || {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buffer);
            }
            let _ = sender.send(buffer);
        });

        let (status, stderr): (Result<ExitStatus>, String) = match self.timeout {
            None => (child.wait().map_err(Into::into), receiver.recv().unwrap_or_default()),
            Some(timeout) => {
                // Processes spawned by a wrapper script may hold the pipe open after it is killed
                let status = wait_with_timeout(&mut child, timeout);
                (status, receiver.recv_timeout(STDERR_GRACE).unwrap_or_default())
            }
        };
        let status = status.wrap_err_with(|| format!("{cmdline} did not finish"))?;

        ensure!(status.success(), "{cmdline} failed ({status}): {}", stderr.trim());
        ensure!(
            saveto.is_file(),
            "{cmdline} finished but did not produce {}",
            saveto.display()
        );
        Ok(())
    }
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> Result<ExitStatus> {
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            // The child may have exited between the two calls, kill errors are irrelevant then
            let _ = child.kill();
            child.wait()?;
            bail!("Timed out after {:.1}s", timeout.as_secs_f64());
        }
        std::thread::sleep(POLL_INTERVAL.min(timeout - elapsed));
    }
}

/// Path of the rerooted tree: the original file name with the `.rr` extension appended.
pub fn rerooted_path(tree: &Path) -> PathBuf {
    let mut name = OsString::from(tree.as_os_str());
    name.push(".");
    name.push(REROOTED_EXTENSION);
    PathBuf::from(name)
}

/// Whole-label search of outgroup taxa inside newick strings.
#[derive(Debug, Clone)]
pub struct OutgroupMatcher {
    patterns: Vec<Regex>,
}

impl OutgroupMatcher {
    pub fn new(outgroups: &[String]) -> Result<Self> {
        let patterns = outgroups
            .iter()
            .map(|taxon| {
                let pattern = format!(
                    "(?:^|{LABEL_DELIMITERS}){}(?:$|{LABEL_DELIMITERS})",
                    regex::escape(taxon)
                );
                Regex::new(&pattern).map_err(|e| eyre!("Invalid outgroup taxon {taxon:?}: {e}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// True if at least one of the outgroups labels a node of the tree.
    pub fn is_present(&self, newick: &str) -> bool {
        self.patterns.iter().any(|x| x.is_match(newick))
    }
}

/// Terminal state of the rerooting step for a single locus.
#[derive(Clone, PartialEq, Eq, Debug, IsVariant)]
pub enum RerootOutcome {
    Rerooted(PathBuf),
    Skipped,
    Failed(String),
}

/// Per-locus rerooting policy on top of a [Reroot] backend.
pub struct Rerooter {
    backend: Box<dyn Reroot>,
    outgroups: Vec<String>,
    keep_only_outgroup: bool,
    matcher: OutgroupMatcher,
}

impl Rerooter {
    pub fn new(backend: Box<dyn Reroot>, config: &RerootConfig) -> Result<Self> {
        Ok(Self {
            backend,
            outgroups: config.outgroups().clone(),
            keep_only_outgroup: *config.keep_only_outgroup(),
            matcher: OutgroupMatcher::new(config.outgroups())?,
        })
    }

    /// `pxrr` backend configured from the run settings.
    pub fn pxrr(config: &RerootConfig) -> Result<Self> {
        let backend = Pxrr::new(config.program(), *config.timeout());
        Self::new(Box::new(backend), config)
    }

    pub fn outgroups(&self) -> &[String] {
        &self.outgroups
    }

    /// The partition table decides if it has the information, otherwise the tree is searched.
    pub fn has_outgroup(&self, record: &LocusRecord, tree: &TreeEntry) -> bool {
        record
            .has_outgroup()
            .unwrap_or_else(|| self.matcher.is_present(tree.newick()))
    }

    /// Reroot a written tree file. The original file is never modified, the rerooted tree is
    /// saved next to it.
    pub fn process(&self, record: &LocusRecord, file: &mut OutputFile) -> RerootOutcome {
        if self.keep_only_outgroup && !self.has_outgroup(record, file.source_tree()) {
            log::info!(
                "Locus {record}: none of the outgroups ({}) are present, skipping",
                self.outgroups.join(",")
            );
            return RerootOutcome::Skipped;
        }

        let saveto = rerooted_path(file.path());
        let result = remove_stale(&saveto)
            .and_then(|_| self.backend.reroot(file.path(), &self.outgroups, &saveto));
        match result {
            Ok(()) => {
                file.set_rerooted(&saveto);
                RerootOutcome::Rerooted(saveto)
            }
            Err(err) => {
                log::error!("Locus {record}: rerooting failed: {err:#}");
                RerootOutcome::Failed(format!("{err:#}"))
            }
        }
    }
}

fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err).wrap_err_with(|| format!("Failed to remove {}", path.display())),
    }
}
