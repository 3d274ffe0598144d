//! Wire types for the venue REST API.

use std::str::FromStr;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::{BookLevel, OrderBook, PortfolioPosition, Side};

use super::client::{OrderSide, OrderType};

/// Order book level as returned by the venue (prices and sizes are strings).
#[derive(Debug, Clone, Deserialize)]
pub struct BookLevelResponse {
    pub price: String,
    pub size: String,
}

/// Order book response from /book.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookResponse {
    #[serde(default)]
    pub asset_id: String,
    pub bids: Vec<BookLevelResponse>,
    pub asks: Vec<BookLevelResponse>,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub timestamp: String,
}

impl OrderBookResponse {
    pub fn into_order_book(self, token_id: &str) -> Result<OrderBook> {
        let parse = |levels: Vec<BookLevelResponse>| -> Result<Vec<BookLevel>> {
            levels
                .into_iter()
                .map(|l| {
                    let price = Decimal::from_str(&l.price)
                        .with_context(|| format!("Invalid book price {}", l.price))?;
                    let size = Decimal::from_str(&l.size)
                        .with_context(|| format!("Invalid book size {}", l.size))?;
                    Ok(BookLevel::new(price, size))
                })
                .collect()
        };

        Ok(OrderBook::new(token_id, parse(self.asks)?, parse(self.bids)?))
    }
}

/// Market order request body. Amount is USD to spend.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketOrderRequest {
    pub token_id: String,
    pub amount: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
}

/// Limit order request body. Size is in shares.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitOrderRequest {
    pub token_id: String,
    pub price: String,
    pub size: String,
    pub side: OrderSide,
    #[serde(rename = "type")]
    pub order_type: OrderType,
}

/// Order status response from /order/{id}.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderStatusResponse {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub original_size: String,
    #[serde(default)]
    pub size_matched: String,
    #[serde(default)]
    pub price: String,
}

/// Position row from /positions.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionResponse {
    pub condition_id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    pub outcome: String,
    pub size: Decimal,
    #[serde(default)]
    pub avg_price: Decimal,
    #[serde(default)]
    pub cur_price: Decimal,
}

impl PositionResponse {
    pub fn into_position(self, venue: &str) -> Result<PortfolioPosition> {
        let side = Side::from_str(&self.outcome)
            .with_context(|| format!("Unknown outcome {}", self.outcome))?;
        let mut position = PortfolioPosition::new(
            self.condition_id,
            self.title,
            self.category,
            venue,
            side,
            self.size,
            self.avg_price,
        );
        position.current_price = self.cur_price;
        Ok(position)
    }
}

/// Cash balance response from /balance.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    pub balance: Decimal,
}
