//! Market-data and execution capability shared by the live and paper clients.

use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{OrderBook, Portfolio};

/// Order side on the venue. Outcome selection (YES/NO) is carried by the token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

/// Order lifetime on the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Good-til-cancelled limit order
    Gtc,
    /// Fill-or-kill market order
    Fok,
}

/// Result of an order placement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub order_id: Option<String>,
    pub success: bool,
    #[serde(default)]
    pub error_msg: String,
    pub status: Option<String>,
    /// Shares filled immediately, when the venue reports it
    #[serde(default)]
    pub filled_shares: Option<Decimal>,
    /// Average fill price, when the venue reports it
    #[serde(default)]
    pub avg_price: Option<Decimal>,
}

impl OrderResponse {
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error_msg: msg.into(),
            ..Default::default()
        }
    }
}

/// Coarse order state used by the scheduler's poll loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderState {
    Open,
    Filled,
    Cancelled,
}

impl OrderState {
    /// Map a venue status string onto the coarse state.
    pub fn from_venue(status: &str) -> Self {
        match status.to_ascii_uppercase().as_str() {
            "MATCHED" | "FILLED" | "MINED" | "CONFIRMED" => OrderState::Filled,
            "CANCELED" | "CANCELLED" | "EXPIRED" | "UNMATCHED" | "KILLED" => OrderState::Cancelled,
            _ => OrderState::Open,
        }
    }
}

/// Everything the core needs from a venue. The live REST client and the
/// paper client both implement this; the choice is made at construction.
#[async_trait]
pub trait MarketClient: Send + Sync {
    /// Venue name used for exchange-scoped limits.
    fn venue(&self) -> &str;

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook>;

    /// Marketable order spending `size_usd`.
    async fn place_order(&self, token_id: &str, size_usd: Decimal, side: OrderSide) -> Result<OrderResponse>;

    /// Resting limit order for `size_shares` at `price`.
    async fn place_limit_order(
        &self,
        token_id: &str,
        price: Decimal,
        size_shares: Decimal,
        side: OrderSide,
    ) -> Result<OrderResponse>;

    async fn get_order_status(&self, order_id: &str) -> Result<OrderState>;

    async fn cancel_order(&self, order_id: &str) -> Result<bool>;

    async fn cancel_all_orders(&self) -> Result<bool>;

    async fn get_portfolio(&self) -> Result<Portfolio>;
}
