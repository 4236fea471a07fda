//! VIP reconciliation across registered servers.

pub mod daemon;
pub mod reconcile;
pub mod runner;

pub use daemon::Daemon;
pub use reconcile::{
    merge_exported, reconcile, DesiredVipSet, MatchMode, ReconcileStats, ReplacePolicy,
};
pub use runner::{
    export_with, import_with, ExportReport, RunReport, ServerOutcome, ServerStatus, SyncRunner,
};
