//! Batch driver: walks the registered servers one at a time.
//!
//! Per server: connect → key exchange → login → list → reconcile (or
//! collect, for export) → close. Any failure ends that server's pass and is
//! recorded in the [`RunReport`]; the batch always moves on to the next
//! server.

use chrono::{DateTime, Utc};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::error::{Result, SyncError};
use crate::rcon::commands::VipConsole;
use crate::rcon::session::{Session, SessionTimings};
use crate::records::{VipEntry, VipRecordStore};
use crate::registry::{ServerRegistry, ServerTarget};
use crate::sync::reconcile::{
    merge_exported, reconcile, DesiredVipSet, MatchMode, ReconcileStats, ReplacePolicy,
};

/// How a single server's pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    /// Reconciliation ran to completion.
    Synced(ReconcileStats),
    /// Listing collected for export.
    Exported { entries: usize },
    /// Login answer was not `SUCCESS`. Not retried.
    AuthenticationFailed,
    /// Connection, protocol or timeout failure.
    Failed(String),
}

impl ServerStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ServerStatus::Synced(_) | ServerStatus::Exported { .. })
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerStatus::Synced(stats) => write!(
                f,
                "synced ({} added, {} deleted, {} already present)",
                stats.added, stats.deleted, stats.skipped
            ),
            ServerStatus::Exported { entries } => write!(f, "exported {} VIPs", entries),
            ServerStatus::AuthenticationFailed => write!(f, "login rejected, wrong password?"),
            ServerStatus::Failed(reason) => write!(f, "failed: {}", reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOutcome {
    pub target_id: String,
    pub endpoint: String,
    pub status: ServerStatus,
}

/// Result of one pass over all servers.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub outcomes: Vec<ServerOutcome>,
}

impl RunReport {
    fn start() -> (Self, Instant) {
        (
            Self {
                started_at: Utc::now(),
                duration: Duration::ZERO,
                outcomes: Vec::new(),
            },
            Instant::now(),
        )
    }

    fn record(&mut self, target: &ServerTarget, status: ServerStatus) {
        self.outcomes.push(ServerOutcome {
            target_id: target.id.clone(),
            endpoint: target.to_string(),
            status,
        });
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_success()).count()
    }

    pub fn unsuccessful(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Result of an export pass.
#[derive(Debug, Clone)]
pub struct ExportReport {
    pub run: RunReport,
    pub entries: Vec<VipEntry>,
    /// False when nothing was collected and the record file was left alone.
    pub saved: bool,
}

/// Drives passes over a list of servers with fixed session settings.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncRunner {
    timings: SessionTimings,
    match_mode: MatchMode,
}

impl SyncRunner {
    pub fn new(timings: SessionTimings, match_mode: MatchMode) -> Self {
        Self {
            timings,
            match_mode,
        }
    }

    /// Reconcile every target against `desired`, sequentially.
    pub async fn import(
        &self,
        targets: &[ServerTarget],
        desired: &DesiredVipSet,
        policy: ReplacePolicy,
    ) -> RunReport {
        let (mut report, clock) = RunReport::start();

        for target in targets {
            info!(server = %target, ?policy, "reconciling");
            let status = match self.import_one(target, desired, policy).await {
                Ok(status) => status,
                Err(e) => failed(target, &e),
            };
            log_status(target, &status);
            report.record(target, status);
        }

        report.duration = clock.elapsed();
        report
    }

    /// Collect every target's listing and merge it into sorted,
    /// de-duplicated records.
    pub async fn export(&self, targets: &[ServerTarget]) -> (RunReport, Vec<VipEntry>) {
        let (mut report, clock) = RunReport::start();
        let mut raw_entries = Vec::new();

        for target in targets {
            info!(server = %target, "exporting");
            let status = match self.export_one(target).await {
                Ok(Some(entries)) => {
                    let status = ServerStatus::Exported {
                        entries: entries.len(),
                    };
                    raw_entries.extend(entries);
                    status
                }
                Ok(None) => ServerStatus::AuthenticationFailed,
                Err(e) => failed(target, &e),
            };
            log_status(target, &status);
            report.record(target, status);
        }

        report.duration = clock.elapsed();
        (report, merge_exported(raw_entries))
    }

    /// Full import pass using the registry and record store collaborators.
    ///
    /// Fails only for local problems (unreadable record file or registry);
    /// server failures end up in the report.
    pub async fn import_pass<R, S>(
        &self,
        registry: &R,
        store: &S,
        policy: ReplacePolicy,
    ) -> Result<RunReport>
    where
        R: ServerRegistry + ?Sized,
        S: VipRecordStore + ?Sized,
    {
        let desired = DesiredVipSet::new(store.load_desired()?);
        let targets = registry.load_targets()?;
        if targets.is_empty() {
            warn!("no servers configured");
        }
        info!(
            servers = targets.len(),
            vips = desired.len(),
            "starting import pass"
        );
        Ok(self.import(&targets, &desired, policy).await)
    }

    /// Full export pass. The record store is only written when at least one
    /// VIP was collected.
    pub async fn export_pass<R, S>(&self, registry: &R, store: &S) -> Result<ExportReport>
    where
        R: ServerRegistry + ?Sized,
        S: VipRecordStore + ?Sized,
    {
        let targets = registry.load_targets()?;
        if targets.is_empty() {
            warn!("no servers configured");
        }
        let (run, entries) = self.export(&targets).await;

        let saved = !entries.is_empty();
        if saved {
            store.save_desired(&entries)?;
            info!(vips = entries.len(), "VIP records written");
        } else {
            warn!("no VIPs collected, record file left untouched");
        }

        Ok(ExportReport {
            run,
            entries,
            saved,
        })
    }

    async fn import_one(
        &self,
        target: &ServerTarget,
        desired: &DesiredVipSet,
        policy: ReplacePolicy,
    ) -> Result<ServerStatus> {
        let mut session = Session::open(&target.address, target.port, self.timings).await?;
        let result = import_with(&mut session, target, desired, policy, self.match_mode).await;
        session.close().await;
        result
    }

    /// `Ok(None)` when the login was rejected.
    async fn export_one(&self, target: &ServerTarget) -> Result<Option<Vec<String>>> {
        let mut session = Session::open(&target.address, target.port, self.timings).await?;
        let result = export_with(&mut session, target).await;
        session.close().await;
        result
    }
}

/// Login, list and reconcile over an already keyed console.
pub async fn import_with<C>(
    console: &mut C,
    target: &ServerTarget,
    desired: &DesiredVipSet,
    policy: ReplacePolicy,
    match_mode: MatchMode,
) -> Result<ServerStatus>
where
    C: VipConsole + ?Sized,
{
    if !console.login(&target.password).await? {
        return Ok(ServerStatus::AuthenticationFailed);
    }
    info!(server = %target, "logged in");

    let live = console.list_vips().await?;
    info!(server = %target, live = live.len(), "fetched live VIPs");

    let stats = reconcile(console, live, desired, policy, match_mode).await?;
    Ok(ServerStatus::Synced(stats))
}

/// Login and list over an already keyed console.
pub async fn export_with<C>(console: &mut C, target: &ServerTarget) -> Result<Option<Vec<String>>>
where
    C: VipConsole + ?Sized,
{
    if !console.login(&target.password).await? {
        return Ok(None);
    }
    info!(server = %target, "logged in");
    Ok(Some(console.list_vips().await?))
}

fn failed(target: &ServerTarget, err: &SyncError) -> ServerStatus {
    error!(server = %target, error = %err, "server pass aborted");
    ServerStatus::Failed(err.to_string())
}

fn log_status(target: &ServerTarget, status: &ServerStatus) {
    match status {
        ServerStatus::Synced(_) | ServerStatus::Exported { .. } => {
            info!(server = %target, %status, "done")
        }
        ServerStatus::AuthenticationFailed => warn!(server = %target, "login rejected, skipping"),
        ServerStatus::Failed(_) => {}
    }
}
