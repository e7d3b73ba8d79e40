use serde::Deserialize;
use std::time::Duration as StdDuration;

/// Whether one holder may keep several ACTIVE holds at once.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HolderPolicy {
    /// No per-holder limit; callers release their own previous holds.
    #[default]
    Unlimited,
    /// Reject a new hold while the holder has a live one.
    Single,
    /// Release the holder's live holds, then acquire the new one.
    Replace,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookingRules {
    #[serde(default = "default_hold_seconds")]
    pub hold_seconds: u64,
    #[serde(default = "default_service_fee")]
    pub service_fee: i32,
    #[serde(default)]
    pub holder_policy: HolderPolicy,
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    #[serde(default = "default_sweep_batch")]
    pub sweep_batch_size: usize,
    #[serde(default = "default_sweep_concurrency")]
    pub sweep_concurrency: usize,
}

fn default_hold_seconds() -> u64 { 600 }
fn default_service_fee() -> i32 { 5 }
fn default_sweep_interval() -> u64 { 15 }
fn default_sweep_batch() -> usize { 500 }
fn default_sweep_concurrency() -> usize { 16 }

impl Default for BookingRules {
    fn default() -> Self {
        Self {
            hold_seconds: default_hold_seconds(),
            service_fee: default_service_fee(),
            holder_policy: HolderPolicy::default(),
            sweep_interval_seconds: default_sweep_interval(),
            sweep_batch_size: default_sweep_batch(),
            sweep_concurrency: default_sweep_concurrency(),
        }
    }
}

impl BookingRules {
    pub fn hold_duration(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.hold_seconds as i64)
    }

    pub fn sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.sweep_interval_seconds.max(1))
    }
}
