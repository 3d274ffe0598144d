//! Trading logic: slippage-aware sizing and scheduled execution.

mod config;
mod position_sizer;
mod scheduler;

pub use config::{ExecutionConfig, SizerConfig};
pub use position_sizer::{Allocation, PositionSizer};
pub use scheduler::{ChunkResult, OrderScheduler, ProgressSink};
