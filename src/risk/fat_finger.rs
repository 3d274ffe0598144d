//! Pre-trade sanity checks on order size and limit price.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::json;

use crate::error::{ValidationError, ValidationKind};
use crate::models::OrderBook;

use super::config::RiskSettings;

#[derive(Debug, Clone)]
pub struct FatFingerCheck {
    enabled: bool,
    max_order_size_usd: Option<Decimal>,
    max_price_deviation_pct: Option<Decimal>,
}

impl FatFingerCheck {
    pub fn new(
        enabled: bool,
        max_order_size_usd: Option<Decimal>,
        max_price_deviation_pct: Option<Decimal>,
    ) -> Self {
        Self {
            enabled,
            max_order_size_usd,
            max_price_deviation_pct,
        }
    }

    pub fn from_settings(settings: &RiskSettings) -> Self {
        Self::new(
            settings.fat_finger_enabled,
            settings.max_order_size_usd,
            settings.max_price_deviation_pct,
        )
    }

    /// Validate an order independent of portfolio state. The price check
    /// only applies to limit orders on a book with a mid price. A threshold
    /// left unset skips its check.
    pub fn validate(
        &self,
        size_usd: Decimal,
        limit_price: Option<Decimal>,
        book: Option<&OrderBook>,
    ) -> Result<(), ValidationError> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(max_size) = self.max_order_size_usd {
            if size_usd > max_size {
                return Err(ValidationError {
                    kind: ValidationKind::SizeLimitExceeded,
                    message: format!("order size ${} exceeds max ${}", size_usd.round_dp(2), max_size),
                    details: json!({
                        "size_usd": size_usd.to_string(),
                        "max_order_size_usd": max_size.to_string(),
                    }),
                });
            }
        }

        let (Some(max_dev), Some(price), Some(mid)) = (
            self.max_price_deviation_pct,
            limit_price,
            book.and_then(OrderBook::mid_price),
        ) else {
            return Ok(());
        };
        if mid <= Decimal::ZERO {
            return Ok(());
        }

        let deviation_pct = ((price - mid) / mid).abs() * dec!(100);
        if deviation_pct > max_dev {
            return Err(ValidationError {
                kind: ValidationKind::PriceDeviationExceeded,
                message: format!(
                    "limit price {} is {:.2}% from mid {} (max {}%)",
                    price, deviation_pct, mid, max_dev
                ),
                details: json!({
                    "limit_price": price.to_string(),
                    "mid_price": mid.to_string(),
                    "deviation_pct": deviation_pct.round_dp(4).to_string(),
                    "max_price_deviation_pct": max_dev.to_string(),
                }),
            });
        }

        Ok(())
    }
}
