//! Sizing and execution configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Configuration for slippage-aware Kelly sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SizerConfig {
    /// Maximum fraction of bankroll a single allocation may cost (0.0 to 1.0)
    pub max_bankroll_fraction: Decimal,

    /// Number of coarse steps when scanning candidate share quantities
    pub scan_steps: u32,
}

impl Default for SizerConfig {
    fn default() -> Self {
        Self {
            max_bankroll_fraction: dec!(0.25), // Quarter of bankroll per trade
            scan_steps: 50,
        }
    }
}

/// Configuration for the order scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Orders above this USD size are forced through TWAP
    pub large_order_threshold: Decimal,

    /// Default TWAP chunk count
    pub twap_chunks: u32,

    /// Default TWAP duration in seconds
    pub twap_duration_secs: u64,

    /// Upper bound on random TWAP spacing jitter, in milliseconds
    pub twap_max_jitter_ms: u64,

    /// Default iceberg clip size in USD
    pub iceberg_display_size: Decimal,

    /// Seconds between iceberg fill polls
    pub iceberg_poll_interval_secs: u64,

    /// Polls per clip before the iceberg gives up
    pub iceberg_max_retries: u32,

    /// Seconds between liquidity-snipe book polls
    pub snipe_poll_interval_secs: u64,

    /// Overall liquidity-snipe budget in seconds
    pub snipe_timeout_secs: u64,

    /// Ask levels counted towards snipe depth
    pub snipe_depth_levels: usize,

    /// Default minimum USD depth for a snipe to fire
    pub snipe_min_depth: Decimal,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            large_order_threshold: dec!(1000),  // $1000
            twap_chunks: 5,
            twap_duration_secs: 300,            // 5 minutes
            twap_max_jitter_ms: 1000,           // ±1s
            iceberg_display_size: dec!(50),     // $50 clips
            iceberg_poll_interval_secs: 2,
            iceberg_max_retries: 20,
            snipe_poll_interval_secs: 5,
            snipe_timeout_secs: 600,            // 10 minutes
            snipe_depth_levels: 3,
            snipe_min_depth: dec!(500),
        }
    }
}
