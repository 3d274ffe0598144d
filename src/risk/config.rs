//! Risk gate configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds for the risk gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSettings {
    /// Factor limit used when a factor has none configured (USD)
    pub default_factor_limit: Decimal,

    /// Ceiling for exposure to a strongly correlated factor (USD)
    pub max_correlated_exposure: Decimal,

    /// Correlation coefficient above which factors count as linked
    pub correlation_threshold: f64,

    /// Daily drawdown that pauses trading, in percent of starting balance
    pub max_daily_drawdown_pct: Decimal,

    /// Allow a privileged operator to lift a drawdown pause before the day ends
    pub allow_manual_resume: bool,

    /// Master switch for fat-finger checks
    pub fat_finger_enabled: bool,

    /// Largest single order (USD); `None` turns the size check off
    pub max_order_size_usd: Option<Decimal>,

    /// Largest limit-price deviation from mid, in percent; `None` turns the
    /// price check off
    pub max_price_deviation_pct: Option<Decimal>,
}

impl Default for RiskSettings {
    fn default() -> Self {
        Self {
            default_factor_limit: dec!(2500),     // $2500 per factor
            max_correlated_exposure: dec!(5000),  // $5000 across a linked pair
            correlation_threshold: 0.6,
            max_daily_drawdown_pct: dec!(10),     // Pause at -10% on the day
            allow_manual_resume: false,
            fat_finger_enabled: true,
            max_order_size_usd: Some(dec!(5000)),
            max_price_deviation_pct: Some(dec!(10)),
        }
    }
}
