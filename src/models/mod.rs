//! Data models for signals, order books, execution plans, portfolios and risk state.

mod order_book;
mod plan;
mod portfolio;
mod risk;
mod signal;

pub use order_book::{BookLevel, OrderBook};
pub use plan::{ExecutionParams, ExecutionPlan, ExecutionStrategy, PlanParams, PlanState};
pub use portfolio::{Portfolio, PortfolioPosition};
pub use risk::{CorrelationEdge, DailyRiskState, ExposureLimit, LimitScope, RiskAlert, Severity};
pub use signal::{Side, SignalStatus, TradeSignal};
