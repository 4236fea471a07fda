//! Periodic re-sync: run an additive import pass over every registered
//! server, sleep, repeat.
//!
//! A pass that cannot start (no record file, unreadable registry) is logged
//! and retried on the next tick. Server failures never stop the loop.

use std::future::Future;
use std::time::Duration;
use tracing::{error, info};

use crate::error::Result;
use crate::records::VipRecordStore;
use crate::registry::ServerRegistry;
use crate::sync::reconcile::ReplacePolicy;
use crate::sync::runner::{RunReport, SyncRunner};

pub struct Daemon<'a, R: ?Sized, S: ?Sized> {
    runner: SyncRunner,
    registry: &'a R,
    store: &'a S,
    interval: Duration,
}

impl<'a, R, S> Daemon<'a, R, S>
where
    R: ServerRegistry + ?Sized,
    S: VipRecordStore + ?Sized,
{
    pub fn new(runner: SyncRunner, registry: &'a R, store: &'a S, interval: Duration) -> Self {
        Self {
            runner,
            registry,
            store,
            interval,
        }
    }

    /// One pass. Errors are local (record file, registry), not per server.
    pub async fn run_once(&self) -> Result<RunReport> {
        self.runner
            .import_pass(self.registry, self.store, ReplacePolicy::Additive)
            .await
    }

    /// Loop until `shutdown` resolves. `on_report` sees each finished pass.
    /// Returns the number of passes started.
    pub async fn run<F, C>(&self, shutdown: F, mut on_report: C) -> u64
    where
        F: Future<Output = ()>,
        C: FnMut(&RunReport),
    {
        tokio::pin!(shutdown);
        let mut passes = 0u64;

        loop {
            passes += 1;
            info!(pass = passes, "starting sync pass");

            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested during pass");
                    return passes;
                }
                result = self.run_once() => match result {
                    Ok(report) => {
                        info!(
                            pass = passes,
                            succeeded = report.succeeded(),
                            unsuccessful = report.unsuccessful(),
                            elapsed_ms = report.duration.as_millis() as u64,
                            "sync pass finished"
                        );
                        on_report(&report);
                    }
                    Err(e) => error!(pass = passes, error = %e, "sync pass could not run"),
                },
            }

            info!(minutes = self.interval.as_secs() / 60, "waiting for next pass");
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    return passes;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use crate::records::VipEntry;
    use crate::registry::ServerTarget;
    use std::cell::Cell;

    struct NoServers;

    impl ServerRegistry for NoServers {
        fn load_targets(&self) -> Result<Vec<ServerTarget>> {
            Ok(Vec::new())
        }
        fn save_targets(&self, _targets: &[ServerTarget]) -> Result<()> {
            Ok(())
        }
    }

    struct CountingStore {
        loads: Cell<usize>,
        missing: bool,
    }

    impl VipRecordStore for CountingStore {
        fn load_desired(&self) -> Result<Vec<VipEntry>> {
            self.loads.set(self.loads.get() + 1);
            if self.missing {
                return Err(SyncError::Records("vips.csv: not found".into()));
            }
            Ok(vec![VipEntry::new("abc", "A")])
        }
        fn save_desired(&self, _entries: &[VipEntry]) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_until_shutdown() {
        let store = CountingStore {
            loads: Cell::new(0),
            missing: false,
        };
        let daemon = Daemon::new(
            SyncRunner::default(),
            &NoServers,
            &store,
            Duration::from_secs(60),
        );

        let mut reports = 0;
        let passes = daemon
            .run(tokio::time::sleep(Duration::from_secs(150)), |_| reports += 1)
            .await;

        // Passes start at t=0, 60 and 120.
        assert_eq!(passes, 3);
        assert_eq!(reports, 3);
        assert_eq!(store.loads.get(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_records_keeps_looping() {
        let store = CountingStore {
            loads: Cell::new(0),
            missing: true,
        };
        let daemon = Daemon::new(
            SyncRunner::default(),
            &NoServers,
            &store,
            Duration::from_secs(60),
        );

        let mut reports = 0;
        let passes = daemon
            .run(tokio::time::sleep(Duration::from_secs(90)), |_| reports += 1)
            .await;

        assert_eq!(passes, 2);
        assert_eq!(reports, 0);
        assert_eq!(store.loads.get(), 2);
    }
}
