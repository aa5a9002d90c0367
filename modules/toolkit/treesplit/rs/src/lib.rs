pub use config::{AlignmentCheck, Config, RerootConfig};
pub use engine::Engine;
pub use locus::{LocusRecord, TreeEntry};
pub use logfile::LogParser;
pub use reroot::{OutgroupMatcher, Pxrr, Reroot, RerootOutcome, Rerooter};
pub use result::{LocusStatus, Summary};
pub use router::{OutputFile, Router};
pub use validate::{AlignmentMatch, ValidationReport};

pub mod cli;
pub mod config;
pub mod engine;
pub mod locus;
pub mod logfile;
pub mod reroot;
pub mod result;
pub mod router;
pub mod trees;
pub mod validate;
