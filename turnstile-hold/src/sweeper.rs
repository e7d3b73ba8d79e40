use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use turnstile_core::BookingResult;

use crate::manager::HoldManager;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Lapsed ACTIVE holds, plus EXPIRED holds still owning seats, seen this tick.
    pub found: usize,
    pub released: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Reclaims seats from holds whose expiry has passed, whether or not the
/// client ever comes back.
pub struct ExpirySweeper {
    holds: Arc<HoldManager>,
    interval: Duration,
    batch_size: usize,
    concurrency: usize,
}

impl ExpirySweeper {
    pub fn new(holds: Arc<HoldManager>) -> Self {
        let rules = holds.rules();
        Self {
            interval: rules.sweep_interval(),
            batch_size: rules.sweep_batch_size.max(1),
            concurrency: rules.sweep_concurrency.max(1),
            holds,
        }
    }

    pub async fn sweep_once(&self) -> BookingResult<SweepReport> {
        let started = Instant::now();
        let mut expired = self.holds.expired_holds(self.batch_size).await?;
        expired.extend(self.holds.stranded_holds(self.batch_size).await?);
        expired.sort();
        expired.dedup();
        let found = expired.len();
        if found == 0 {
            return Ok(SweepReport {
                elapsed: started.elapsed(),
                ..SweepReport::default()
            });
        }

        let holds = &self.holds;
        let results: Vec<_> = stream::iter(expired)
            .map(|hold_id| async move { (hold_id, holds.release_hold(hold_id).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = SweepReport {
            found,
            ..SweepReport::default()
        };
        for (hold_id, result) in results {
            match result {
                Ok(true) => report.released += 1,
                // Confirmed or released by someone else in the meantime.
                Ok(false) => debug!(%hold_id, "Expired hold already settled"),
                Err(err) => {
                    warn!(%hold_id, error = %err, "Failed to release expired hold");
                    report.failed += 1;
                }
            }
        }
        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// Sweeps every interval until `shutdown` flips to `true` or its sender
    /// is dropped. `on_tick` sees each completed sweep.
    pub async fn run<F>(self, mut shutdown: watch::Receiver<bool>, on_tick: F)
    where
        F: Fn(&SweepReport) + Send,
    {
        info!(interval = ?self.interval, batch = self.batch_size, "Expiry sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep_once().await {
                        Ok(report) => {
                            if report.found > 0 {
                                info!(
                                    found = report.found,
                                    released = report.released,
                                    failed = report.failed,
                                    elapsed_ms = report.elapsed.as_millis() as u64,
                                    "Expiry sweep finished"
                                );
                            }
                            on_tick(&report);
                        }
                        Err(err) => error!(error = %err, "Expiry sweep failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Expiry sweeper stopped");
    }
}
