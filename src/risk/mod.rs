//! Risk gate: factor exposure, scoped caps, drawdown breaker and fat-finger checks.

mod config;
mod drawdown;
mod exposure;
pub mod factors;
mod fat_finger;
mod gate;
mod store;

pub use config::RiskSettings;
pub use drawdown::DrawdownBreaker;
pub use gate::{RiskGate, RiskRequest};
pub use store::RiskConfigStore;
#[cfg(test)]
pub use store::RiskSnapshot;
