pub mod manager;
pub mod sweeper;

pub use manager::HoldManager;
pub use sweeper::{ExpirySweeper, SweepReport};
