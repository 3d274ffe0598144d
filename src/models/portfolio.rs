//! Account portfolio snapshot: cash balance plus open positions.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::signal::Side;

/// Open position in one side of a prediction market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioPosition {
    /// Market condition ID
    pub market_id: String,

    /// Market question, used for factor classification
    #[serde(default)]
    pub question: String,

    /// Market category (e.g. "politics", "crypto")
    #[serde(default)]
    pub category: String,

    /// Venue holding the position
    #[serde(default)]
    pub venue: String,

    /// Outcome side held
    pub side: Side,

    /// Number of outcome shares held
    pub size: Decimal,

    /// Average entry price per share
    pub average_price: Decimal,

    /// Current mark price per share
    #[serde(default)]
    pub current_price: Decimal,

    /// Last time this position was updated
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
}

impl PortfolioPosition {
    pub fn new(
        market_id: impl Into<String>,
        question: impl Into<String>,
        category: impl Into<String>,
        venue: impl Into<String>,
        side: Side,
        size: Decimal,
        price: Decimal,
    ) -> Self {
        Self {
            market_id: market_id.into(),
            question: question.into(),
            category: category.into(),
            venue: venue.into(),
            side,
            size,
            average_price: price,
            current_price: price,
            last_updated: Utc::now(),
        }
    }

    /// Mark-to-market value in USD.
    pub fn value(&self) -> Decimal {
        self.size * self.current_price
    }

    /// Cost basis in USD.
    pub fn cost_basis(&self) -> Decimal {
        self.size * self.average_price
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        self.value() - self.cost_basis()
    }

    /// Add to position (averaging in).
    pub fn add(&mut self, size: Decimal, price: Decimal) {
        let total_cost = self.cost_basis() + size * price;
        let new_size = self.size + size;

        if !new_size.is_zero() {
            self.average_price = total_cost / new_size;
        }

        self.size = new_size;
        self.current_price = price;
        self.last_updated = Utc::now();
    }
}

/// Point-in-time view of an account, as reported by a market client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Portfolio {
    /// Free cash in USD
    pub balance: Decimal,
    pub positions: Vec<PortfolioPosition>,
}

impl Portfolio {
    /// Total mark-to-market value of open positions.
    pub fn positions_value(&self) -> Decimal {
        self.positions.iter().map(PortfolioPosition::value).sum()
    }

    /// Cash plus marked positions.
    pub fn equity(&self) -> Decimal {
        self.balance + self.positions_value()
    }

    pub fn exposure_for_market(&self, market_id: &str) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.market_id == market_id)
            .map(PortfolioPosition::value)
            .sum()
    }

    pub fn exposure_for_category(&self, category: &str) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.category.eq_ignore_ascii_case(category))
            .map(PortfolioPosition::value)
            .sum()
    }

    pub fn exposure_for_venue(&self, venue: &str) -> Decimal {
        self.positions
            .iter()
            .filter(|p| p.venue.eq_ignore_ascii_case(venue))
            .map(PortfolioPosition::value)
            .sum()
    }

    /// Largest single-market exposure, used by wildcard per-market caps.
    pub fn largest_market_exposure(&self) -> Decimal {
        self.exposure_by_market()
            .into_values()
            .max()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn exposure_by_market(&self) -> BTreeMap<String, Decimal> {
        let mut out = BTreeMap::new();
        for p in &self.positions {
            *out.entry(p.market_id.clone()).or_insert(Decimal::ZERO) += p.value();
        }
        out
    }

    /// Sum position values keyed by whatever tags `classify` assigns each
    /// position's question. A position with several tags counts toward each.
    pub fn exposure_by_tag<F>(&self, classify: F) -> BTreeMap<String, Decimal>
    where
        F: Fn(&str) -> Vec<String>,
    {
        let mut out = BTreeMap::new();
        for p in &self.positions {
            for tag in classify(&p.question) {
                *out.entry(tag).or_insert(Decimal::ZERO) += p.value();
            }
        }
        out
    }
}
