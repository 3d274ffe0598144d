//! Application configuration: JSON file, then `POLYRISK_*` environment overrides.

use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::risk::RiskSettings;
use crate::trading::{ExecutionConfig, SizerConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// SQLite connection string
    pub database_url: String,

    /// Account the lifecycle trades and tracks daily risk for
    pub account_id: String,

    /// Starting cash for the paper venue
    pub paper_capital: Decimal,

    pub sizer: SizerConfig,
    pub execution: ExecutionConfig,
    pub risk: RiskSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite:./polyrisk.db?mode=rwc".to_string(),
            account_id: "default".to_string(),
            paper_capital: Decimal::from(10_000),
            sizer: SizerConfig::default(),
            execution: ExecutionConfig::default(),
            risk: RiskSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load from an optional JSON file, apply `.env` and environment
    /// overrides, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p).map_err(|source| ConfigError::ReadFile {
                    path: p.display().to_string(),
                    source,
                })?;
                info!(path = %p.display(), "Loaded configuration file");
                serde_json::from_str(&raw)?
            }
            None => Self::default(),
        };

        if dotenvy::dotenv().is_ok() {
            debug!("Loaded .env");
        }
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Split out so tests need not
    /// touch the process environment.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("POLYRISK_DATABASE_URL") {
            self.database_url = v;
        }
        if let Some(v) = lookup("POLYRISK_ACCOUNT_ID") {
            self.account_id = v;
        }
        if let Some(v) = lookup("POLYRISK_PAPER_CAPITAL") {
            self.paper_capital = parse("POLYRISK_PAPER_CAPITAL", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_MAX_BANKROLL_FRACTION") {
            self.sizer.max_bankroll_fraction = parse("POLYRISK_MAX_BANKROLL_FRACTION", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_LARGE_ORDER_THRESHOLD") {
            self.execution.large_order_threshold = parse("POLYRISK_LARGE_ORDER_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_SNIPE_TIMEOUT_SECS") {
            self.execution.snipe_timeout_secs = parse("POLYRISK_SNIPE_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_MAX_DAILY_DRAWDOWN_PCT") {
            self.risk.max_daily_drawdown_pct = parse("POLYRISK_MAX_DAILY_DRAWDOWN_PCT", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_ALLOW_MANUAL_RESUME") {
            self.risk.allow_manual_resume = parse("POLYRISK_ALLOW_MANUAL_RESUME", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_MAX_ORDER_SIZE_USD") {
            self.risk.max_order_size_usd = parse_threshold("POLYRISK_MAX_ORDER_SIZE_USD", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_MAX_PRICE_DEVIATION_PCT") {
            self.risk.max_price_deviation_pct = parse_threshold("POLYRISK_MAX_PRICE_DEVIATION_PCT", &v)?;
        }
        if let Some(v) = lookup("POLYRISK_FAT_FINGER_ENABLED") {
            self.risk.fat_finger_enabled = parse("POLYRISK_FAT_FINGER_ENABLED", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let fraction = self.sizer.max_bankroll_fraction;
        if fraction <= Decimal::ZERO || fraction > Decimal::ONE {
            return Err(invalid("sizer.max_bankroll_fraction", "must be in (0, 1]"));
        }
        if self.execution.twap_chunks == 0 {
            return Err(invalid("execution.twap_chunks", "must be at least 1"));
        }
        if self.execution.iceberg_display_size <= Decimal::ZERO {
            return Err(invalid("execution.iceberg_display_size", "must be positive"));
        }
        if self.execution.snipe_timeout_secs == 0 {
            return Err(invalid("execution.snipe_timeout_secs", "must be positive"));
        }
        if !(-1.0..=1.0).contains(&self.risk.correlation_threshold) {
            return Err(invalid("risk.correlation_threshold", "must be within [-1, 1]"));
        }
        if self.risk.max_daily_drawdown_pct <= Decimal::ZERO {
            return Err(invalid("risk.max_daily_drawdown_pct", "must be positive"));
        }
        if matches!(self.risk.max_order_size_usd, Some(v) if v <= Decimal::ZERO) {
            return Err(invalid("risk.max_order_size_usd", "must be positive or null"));
        }
        if matches!(self.risk.max_price_deviation_pct, Some(v) if v <= Decimal::ZERO) {
            return Err(invalid("risk.max_price_deviation_pct", "must be positive or null"));
        }
        if self.account_id.trim().is_empty() {
            return Err(invalid("account_id", "must not be empty"));
        }
        Ok(())
    }
}

fn parse<T: FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| invalid(field, format!("cannot parse '{}'", raw)))
}

/// A threshold that "off" or "none" switches off.
fn parse_threshold(field: &'static str, raw: &str) -> Result<Option<Decimal>, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "off" | "none" => Ok(None),
        _ => parse(field, raw).map(Some),
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_are_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"account_id": "desk-1", "risk": {"max_order_size_usd": "250"}}"#).unwrap();
        assert_eq!(config.account_id, "desk-1");
        assert_eq!(config.risk.max_order_size_usd, Some(dec!(250)));
        assert_eq!(config.risk.max_price_deviation_pct, Some(dec!(10)));

        let off: AppConfig =
            serde_json::from_str(r#"{"risk": {"max_price_deviation_pct": null}}"#).unwrap();
        assert_eq!(off.risk.max_price_deviation_pct, None);
        assert_eq!(off.risk.max_order_size_usd, Some(dec!(5000)));
        assert_eq!(config.risk.max_daily_drawdown_pct, dec!(10));
        assert_eq!(config.execution.twap_chunks, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("POLYRISK_ALLOW_MANUAL_RESUME", "true"),
            ("POLYRISK_SNIPE_TIMEOUT_SECS", "120"),
        ]);
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert!(config.risk.allow_manual_resume);
        assert_eq!(config.execution.snipe_timeout_secs, 120);

        let off: HashMap<&str, &str> = HashMap::from([("POLYRISK_MAX_ORDER_SIZE_USD", "off")]);
        config.apply_env(|k| off.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.risk.max_order_size_usd, None);

        let bad: HashMap<&str, &str> = HashMap::from([("POLYRISK_MAX_ORDER_SIZE_USD", "lots")]);
        let err = config.apply_env(|k| bad.get(k).map(|v| v.to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "POLYRISK_MAX_ORDER_SIZE_USD", .. }));
    }

    #[test]
    fn test_validation_rejects_bad_fraction() {
        let mut config = AppConfig::default();
        config.sizer.max_bankroll_fraction = dec!(1.5);
        assert!(config.validate().is_err());
    }
}
