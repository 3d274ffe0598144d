//! Execution plan: how an approved size is worked into the market.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::signal::{Side, SignalError};

/// Order execution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStrategy {
    /// One immediate order for the full size
    Single,
    /// Equal time-spaced chunks
    Twap,
    /// Repeated display-size limit clips
    Iceberg,
    /// Wait for depth and price, then fire everything
    LiquiditySnipe,
}

impl ExecutionStrategy {
    /// Whether the strategy rests limit orders at the caller's price ceiling.
    /// A snipe only uses the ceiling as a trigger and then fires at market.
    pub fn places_limit_orders(&self) -> bool {
        matches!(self, ExecutionStrategy::Iceberg)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStrategy::Single => "SINGLE",
            ExecutionStrategy::Twap => "TWAP",
            ExecutionStrategy::Iceberg => "ICEBERG",
            ExecutionStrategy::LiquiditySnipe => "LIQUIDITY_SNIPE",
        }
    }
}

impl fmt::Display for ExecutionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStrategy {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "SINGLE" => Ok(Self::Single),
            "TWAP" => Ok(Self::Twap),
            "ICEBERG" => Ok(Self::Iceberg),
            "LIQUIDITY_SNIPE" | "SNIPE" => Ok(Self::LiquiditySnipe),
            other => Err(SignalError::UnknownValue(other.to_string())),
        }
    }
}

/// Plan state machine: `Scheduled -> InProgress -> {Filled, PartiallyAborted, Cancelled}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlanState {
    Scheduled,
    InProgress,
    Filled,
    PartiallyAborted,
    Cancelled,
}

impl PlanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlanState::Scheduled => "SCHEDULED",
            PlanState::InProgress => "IN_PROGRESS",
            PlanState::Filled => "FILLED",
            PlanState::PartiallyAborted => "PARTIALLY_ABORTED",
            PlanState::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PlanState::Filled | PlanState::PartiallyAborted | PlanState::Cancelled
        )
    }
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied execution parameters. Unset fields fall back to the
/// scheduler's configured defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionParams {
    pub strategy: Option<ExecutionStrategy>,
    /// TWAP total duration (seconds)
    pub duration_secs: Option<u64>,
    /// TWAP chunk count
    pub chunks: Option<u32>,
    /// Poll interval for iceberg / snipe (seconds)
    pub interval_secs: Option<u64>,
    /// Iceberg clip size in USD
    pub display_size: Option<Decimal>,
    /// Snipe: minimum USD depth across the top levels
    pub min_depth: Option<Decimal>,
    /// Snipe: how many ask levels count towards depth
    pub depth_levels: Option<usize>,
    /// Snipe trigger ceiling / iceberg limit price
    pub price_ceiling: Option<Decimal>,
    /// Max average-fill slippage over best ask for market chunks (fraction)
    pub max_slippage: Option<Decimal>,
    /// Snipe overall budget (seconds)
    pub timeout_secs: Option<u64>,
}

/// Resolved, immutable parameters for a plan that has been scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanParams {
    pub duration_secs: u64,
    pub chunks: u32,
    pub interval_secs: u64,
    pub display_size: Decimal,
    pub min_depth: Decimal,
    pub depth_levels: usize,
    pub price_ceiling: Option<Decimal>,
    pub max_slippage: Option<Decimal>,
    pub timeout_secs: u64,
}

/// A scheduled execution. Only `remaining_size` and `state` change once
/// execution starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub id: String,
    pub signal_id: String,
    pub token_id: String,
    pub side: Side,
    pub strategy: ExecutionStrategy,
    /// Strategy the caller asked for, before large-order routing
    pub requested_strategy: ExecutionStrategy,
    pub params: PlanParams,
    pub total_size: Decimal,
    pub remaining_size: Decimal,
    pub state: PlanState,
    pub created_at: DateTime<Utc>,
}

impl ExecutionPlan {
    pub fn executed_size(&self) -> Decimal {
        self.total_size - self.remaining_size
    }

    pub fn was_rerouted(&self) -> bool {
        self.strategy != self.requested_strategy
    }
}
