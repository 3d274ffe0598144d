//! Order book snapshot used for sizing, fat-finger checks and liquidity polling.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single price level. `amount` is in outcome shares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

impl BookLevel {
    pub fn new(price: Decimal, amount: Decimal) -> Self {
        Self { price, amount }
    }

    /// USD notional resting at this level.
    pub fn notional(&self) -> Decimal {
        self.price * self.amount
    }
}

/// Ephemeral order book snapshot for one outcome token.
///
/// Asks are kept ascending and bids descending regardless of the order the
/// venue returned them in. A snapshot is fetched fresh for every decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    pub token_id: String,
    pub asks: Vec<BookLevel>,
    pub bids: Vec<BookLevel>,
    pub fetched_at: DateTime<Utc>,
}

impl OrderBook {
    /// Build a snapshot, normalising level order and dropping empty levels.
    pub fn new(token_id: impl Into<String>, mut asks: Vec<BookLevel>, mut bids: Vec<BookLevel>) -> Self {
        asks.retain(|l| l.amount > Decimal::ZERO && l.price > Decimal::ZERO);
        bids.retain(|l| l.amount > Decimal::ZERO && l.price > Decimal::ZERO);
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        bids.sort_by(|a, b| b.price.cmp(&a.price));

        Self {
            token_id: token_id.into(),
            asks,
            bids,
            fetched_at: Utc::now(),
        }
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Mid price; falls back to whichever side is present.
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            (Some(bid), None) => Some(bid),
            (None, Some(ask)) => Some(ask),
            (None, None) => None,
        }
    }

    /// Cumulative USD depth across the top `levels` ask levels.
    pub fn ask_depth_usd(&self, levels: usize) -> Decimal {
        self.asks.iter().take(levels).map(BookLevel::notional).sum()
    }

    /// Total shares offered on the ask side.
    pub fn total_ask_shares(&self) -> Decimal {
        self.asks.iter().map(|l| l.amount).sum()
    }

    /// Walk the asks spending `usd`. Returns `(shares, average_price)`, or
    /// `None` if the book cannot absorb the full amount.
    pub fn fill_for_usd(&self, usd: Decimal) -> Option<(Decimal, Decimal)> {
        if usd <= Decimal::ZERO {
            return None;
        }

        let mut remaining = usd;
        let mut shares = Decimal::ZERO;

        for level in &self.asks {
            let level_cost = level.notional();
            if level_cost >= remaining {
                shares += remaining / level.price;
                remaining = Decimal::ZERO;
                break;
            }
            shares += level.amount;
            remaining -= level_cost;
        }

        if remaining > Decimal::ZERO || shares.is_zero() {
            return None;
        }

        Some((shares, usd / shares))
    }
}
