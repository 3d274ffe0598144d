//! Domain error types callers match on. Plumbing errors use `anyhow`.

use std::fmt;

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

/// Configuration-related errors with structured variants.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Kind of fat-finger validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationKind {
    SizeLimitExceeded,
    PriceDeviationExceeded,
}

impl fmt::Display for ValidationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationKind::SizeLimitExceeded => f.write_str("SIZE_LIMIT_EXCEEDED"),
            ValidationKind::PriceDeviationExceeded => f.write_str("PRICE_DEVIATION_EXCEEDED"),
        }
    }
}

/// Structured pre-trade validation failure.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct ValidationError {
    pub kind: ValidationKind,
    pub message: String,
    pub details: serde_json::Value,
}

/// Risk gate blocks. Each carries enough context to explain itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RiskError {
    #[error("factor limit exceeded for {factor}: {current} + {proposed} > {limit}")]
    FactorLimitExceeded {
        factor: String,
        current: Decimal,
        proposed: Decimal,
        limit: Decimal,
    },

    #[error("market cap exceeded for {market_id}: {current} + {proposed} > {limit}")]
    MarketCapExceeded {
        market_id: String,
        current: Decimal,
        proposed: Decimal,
        limit: Decimal,
    },

    #[error("category cap exceeded for {category}: {current} + {proposed} > {limit}")]
    CategoryCapExceeded {
        category: String,
        current: Decimal,
        proposed: Decimal,
        limit: Decimal,
    },

    #[error("exchange cap exceeded for {venue}: {current} + {proposed} > {limit}")]
    ExchangeCapExceeded {
        venue: String,
        current: Decimal,
        proposed: Decimal,
        limit: Decimal,
    },

    #[error("trading paused: {reason}")]
    TradingPaused { reason: String },

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl RiskError {
    pub fn is_pause(&self) -> bool {
        matches!(self, RiskError::TradingPaused { .. })
    }
}
