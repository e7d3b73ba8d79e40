use axum::{extract::State, http::header, response::IntoResponse};
use prometheus::{opts, Gauge, IntCounter, IntCounterVec, Registry, TextEncoder};
use turnstile_hold::SweepReport;

use crate::error::AppError;
use crate::state::AppState;

/// Booking counters exported at `/metrics`. Each `Metrics` owns its own
/// registry, so test apps never collide on metric names.
pub struct Metrics {
    registry: Registry,
    pub holds_created: IntCounter,
    pub hold_conflicts: IntCounter,
    pub holds_released: IntCounter,
    /// Labels: `outcome` (committed, replayed, hold_expired, idempotency_conflict, consistency_fault, error)
    pub settlements: IntCounterVec,
    pub consistency_faults: IntCounter,
    pub swept_holds: IntCounter,
    pub sweep_duration_seconds: Gauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let holds_created = IntCounter::new("turnstile_holds_created_total", "Holds granted")?;
        let hold_conflicts = IntCounter::new(
            "turnstile_hold_conflicts_total",
            "Hold requests rejected because a seat was taken",
        )?;
        let holds_released = IntCounter::new(
            "turnstile_holds_released_total",
            "Holds released by their holder",
        )?;
        let settlements = IntCounterVec::new(
            opts!("turnstile_settlements_total", "Confirm attempts by outcome"),
            &["outcome"],
        )?;
        let consistency_faults = IntCounter::new(
            "turnstile_consistency_faults_total",
            "Settlements aborted because an active hold lost its seat",
        )?;
        let swept_holds = IntCounter::new(
            "turnstile_swept_holds_total",
            "Expired holds reclaimed by the sweeper",
        )?;
        let sweep_duration_seconds = Gauge::new(
            "turnstile_sweep_duration_seconds",
            "Duration of the last expiry sweep",
        )?;

        registry.register(Box::new(holds_created.clone()))?;
        registry.register(Box::new(hold_conflicts.clone()))?;
        registry.register(Box::new(holds_released.clone()))?;
        registry.register(Box::new(settlements.clone()))?;
        registry.register(Box::new(consistency_faults.clone()))?;
        registry.register(Box::new(swept_holds.clone()))?;
        registry.register(Box::new(sweep_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            holds_created,
            hold_conflicts,
            holds_released,
            settlements,
            consistency_faults,
            swept_holds,
            sweep_duration_seconds,
        })
    }

    pub fn record_settlement(&self, outcome: &str) {
        self.settlements.with_label_values(&[outcome]).inc();
    }

    pub fn record_sweep(&self, report: &SweepReport) {
        self.swept_holds.inc_by(report.released as u64);
        self.sweep_duration_seconds.set(report.elapsed.as_secs_f64());
    }

    pub fn export(&self) -> Result<String, prometheus::Error> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}

pub async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    let body = state.metrics.export().map_err(anyhow::Error::from)?;
    Ok(([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body))
}
