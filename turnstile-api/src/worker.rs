use tokio::sync::watch;
use tokio::task::JoinHandle;
use turnstile_hold::ExpirySweeper;

use crate::state::AppState;

/// Runs the expiry sweeper until `shutdown` is signalled.
pub fn spawn_expiry_sweeper(state: &AppState, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let sweeper = ExpirySweeper::new(state.holds.clone());
    let metrics = state.metrics.clone();
    tokio::spawn(sweeper.run(shutdown, move |report| metrics.record_sweep(report)))
}
