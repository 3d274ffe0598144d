//! Risk configuration records and per-day risk state.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::signal::SignalError;

/// Scope value matching every market / category / venue.
pub const WILDCARD_SCOPE: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LimitScope {
    PerMarketCap,
    CategoryCap,
    ExchangeCap,
}

impl LimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitScope::PerMarketCap => "PER_MARKET_CAP",
            LimitScope::CategoryCap => "CATEGORY_CAP",
            LimitScope::ExchangeCap => "EXCHANGE_CAP",
        }
    }
}

impl fmt::Display for LimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LimitScope {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "PER_MARKET_CAP" | "MARKET" => Ok(Self::PerMarketCap),
            "CATEGORY_CAP" | "CATEGORY" => Ok(Self::CategoryCap),
            "EXCHANGE_CAP" | "EXCHANGE" => Ok(Self::ExchangeCap),
            other => Err(SignalError::UnknownValue(other.to_string())),
        }
    }
}

/// Scoped USD exposure cap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureLimit {
    pub id: Option<i64>,
    pub scope: LimitScope,
    pub scope_value: String,
    pub max_usd: Decimal,
    pub active: bool,
}

impl ExposureLimit {
    pub fn new(scope: LimitScope, scope_value: impl Into<String>, max_usd: Decimal) -> Self {
        Self {
            id: None,
            scope,
            scope_value: scope_value.into(),
            max_usd,
            active: true,
        }
    }

    /// Whether this limit applies to `value` (a market id, category or venue).
    pub fn applies_to(&self, value: &str) -> bool {
        self.active && (self.scope_value == WILDCARD_SCOPE || self.scope_value.eq_ignore_ascii_case(value))
    }
}

/// Symmetric correlation between two factor tags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationEdge {
    pub factor_a: String,
    pub factor_b: String,
    pub coefficient: f64,
}

impl CorrelationEdge {
    /// Build an edge with its endpoints in canonical order. Returns `None`
    /// when the coefficient is outside `[-1, 1]` or the endpoints coincide.
    pub fn new(a: impl Into<String>, b: impl Into<String>, coefficient: f64) -> Option<Self> {
        let (a, b) = (a.into(), b.into());
        if !(-1.0..=1.0).contains(&coefficient) || a == b {
            return None;
        }
        let (factor_a, factor_b) = if a <= b { (a, b) } else { (b, a) };
        Some(Self {
            factor_a,
            factor_b,
            coefficient,
        })
    }

    /// The factor on the other end of the edge from `tag`.
    pub fn other(&self, tag: &str) -> Option<&str> {
        if self.factor_a == tag {
            Some(&self.factor_b)
        } else if self.factor_b == tag {
            Some(&self.factor_a)
        } else {
            None
        }
    }
}

/// One account's risk state for one UTC calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyRiskState {
    pub account_id: String,
    pub day: NaiveDate,
    pub starting_balance: Decimal,
    pub current_pnl: Decimal,
    /// Worst drawdown reached today, in percent
    pub max_drawdown_pct: Decimal,
    pub paused: bool,
    pub pause_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl DailyRiskState {
    pub fn new(account_id: impl Into<String>, day: NaiveDate, starting_balance: Decimal) -> Self {
        Self {
            account_id: account_id.into(),
            day,
            starting_balance,
            current_pnl: Decimal::ZERO,
            max_drawdown_pct: Decimal::ZERO,
            paused: false,
            pause_reason: None,
            updated_at: Utc::now(),
        }
    }

    /// `|min(0, pnl)| / starting_balance * 100`.
    pub fn drawdown_pct(&self) -> Decimal {
        if self.starting_balance <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        let loss = self.current_pnl.min(Decimal::ZERO).abs();
        loss / self.starting_balance * dec!(100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Medium => f.write_str("MEDIUM"),
            Severity::High => f.write_str("HIGH"),
        }
    }
}

/// Alert raised by the factor exposure check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAlert {
    pub severity: Severity,
    pub factor: String,
    pub message: String,
}

impl fmt::Display for RiskAlert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.severity, self.factor, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_edge_is_canonical() {
        let edge = CorrelationEdge::new("Politics.Trump", "Macro.Rates", 0.7).unwrap();
        assert_eq!(edge.factor_a, "Macro.Rates");
        assert_eq!(edge.other("Macro.Rates"), Some("Politics.Trump"));
        assert_eq!(edge.other("Crypto.Bitcoin"), None);

        assert!(CorrelationEdge::new("a", "b", 1.5).is_none());
        assert!(CorrelationEdge::new("a", "a", 0.5).is_none());
    }

    #[test]
    fn test_drawdown_pct_ignores_gains() {
        let day = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let mut state = DailyRiskState::new("acct", day, dec!(1000));
        state.current_pnl = dec!(250);
        assert_eq!(state.drawdown_pct(), Decimal::ZERO);

        state.current_pnl = dec!(-50);
        assert_eq!(state.drawdown_pct(), dec!(5));
    }

    #[test]
    fn test_wildcard_limit_applies_everywhere() {
        let limit = ExposureLimit::new(LimitScope::PerMarketCap, WILDCARD_SCOPE, dec!(500));
        assert!(limit.applies_to("0xanything"));

        let mut specific = ExposureLimit::new(LimitScope::CategoryCap, "politics", dec!(500));
        assert!(specific.applies_to("Politics"));
        specific.active = false;
        assert!(!specific.applies_to("politics"));
    }
}
