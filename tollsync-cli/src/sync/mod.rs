//! Spreadsheet to graph reconciliation
//!
//! A run executes phases in a fixed order so that every phase finds the nodes it
//! references already committed: attributes and tolls first, then the entities that
//! tag or point at them, and the toll chains last.

pub mod chain;
pub mod entity;
pub mod issues;
pub mod plan;
pub mod run;
pub mod schema;

pub use chain::{ChainReconciler, ChainRow, TollRun, continues_run, parse_runs};
pub use entity::EntityReconciler;
pub use issues::{RowDataError, SyncIssue};
pub use plan::{PhasePlan, PhaseReport, SyncReport};
pub use run::{SyncOptions, SyncRun};

/// One reconciliation step of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Phase {
    Attributes,
    Tolls,
    Businesses,
    Promotions,
    Roads,
    Chains,
}

impl Phase {
    /// Every phase in execution order
    pub const ALL: [Phase; 6] = [
        Phase::Attributes,
        Phase::Tolls,
        Phase::Businesses,
        Phase::Promotions,
        Phase::Roads,
        Phase::Chains,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Attributes => "attributes",
            Phase::Tolls => "tolls",
            Phase::Businesses => "businesses",
            Phase::Promotions => "promotions",
            Phase::Roads => "roads",
            Phase::Chains => "chains",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
