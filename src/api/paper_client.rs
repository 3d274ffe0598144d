//! Paper-trading venue: simulated fills against configured order books.
//!
//! Market orders walk the ask side and are fill-or-kill. Limit orders fill at
//! once when marketable, otherwise rest until the book crosses them (checked on
//! every status poll) or they are cancelled.

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::{OrderBook, Portfolio, PortfolioPosition, Side};

use super::client::{MarketClient, OrderResponse, OrderSide, OrderState};

/// Paper trading configuration.
#[derive(Debug, Clone)]
pub struct PaperConfig {
    /// Starting capital
    pub initial_capital: Decimal,

    /// Simulated fee rate on notional
    pub fee_rate: Decimal,

    /// Venue name reported for exchange caps
    pub venue: String,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            initial_capital: dec!(10000),
            fee_rate: Decimal::ZERO,
            venue: "paper".to_string(),
        }
    }
}

/// A simulated fill.
#[derive(Debug, Clone)]
pub struct PaperFill {
    pub order_id: String,
    pub token_id: String,
    pub shares: Decimal,
    pub cost: Decimal,
    pub fee: Decimal,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct RestingOrder {
    token_id: String,
    price: Decimal,
    shares: Decimal,
    state: OrderState,
}

#[derive(Debug, Clone)]
struct MarketMeta {
    question: String,
    category: String,
}

#[derive(Debug, Default)]
struct PaperState {
    capital: Decimal,
    total_fees: Decimal,
    books: HashMap<String, OrderBook>,
    markets: HashMap<String, MarketMeta>,
    positions: HashMap<String, PortfolioPosition>,
    orders: HashMap<String, RestingOrder>,
    fills: Vec<PaperFill>,
}

/// Simulated venue satisfying the same contract as the live client.
pub struct PaperClient {
    config: PaperConfig,
    state: RwLock<PaperState>,
    started_at: DateTime<Utc>,
}

impl PaperClient {
    pub fn new(config: PaperConfig) -> Self {
        let state = PaperState {
            capital: config.initial_capital,
            ..Default::default()
        };
        Self {
            config,
            state: RwLock::new(state),
            started_at: Utc::now(),
        }
    }

    /// Register question/category metadata for a market.
    pub async fn register_market(&self, market_id: &str, question: &str, category: &str) {
        self.state.write().await.markets.insert(
            market_id.to_string(),
            MarketMeta {
                question: question.to_string(),
                category: category.to_string(),
            },
        );
    }

    /// Replace the book for a token.
    pub async fn set_book(&self, book: OrderBook) {
        self.state.write().await.books.insert(book.token_id.clone(), book);
    }

    /// Seed an existing position, e.g. to reproduce a live portfolio.
    #[cfg(test)]
    pub async fn seed_position(&self, position: PortfolioPosition) {
        let token = position.side.token_id(&position.market_id);
        self.state.write().await.positions.insert(token, position);
    }

    /// Adjust cash, e.g. to simulate a realized loss.
    #[cfg(test)]
    pub async fn adjust_capital(&self, delta: Decimal) {
        self.state.write().await.capital += delta;
    }

    pub async fn fills(&self) -> Vec<PaperFill> {
        self.state.read().await.fills.clone()
    }

    pub async fn stats(&self) -> PaperStats {
        let state = self.state.read().await;
        let positions_value: Decimal = state.positions.values().map(PortfolioPosition::value).sum();
        let unrealized: Decimal = state.positions.values().map(PortfolioPosition::unrealized_pnl).sum();
        let equity = state.capital + positions_value;

        PaperStats {
            initial_capital: self.config.initial_capital,
            current_equity: equity,
            cash_available: state.capital,
            unrealized_pnl: unrealized,
            return_pct: if self.config.initial_capital.is_zero() {
                Decimal::ZERO
            } else {
                (equity - self.config.initial_capital) / self.config.initial_capital
            },
            open_positions: state.positions.len(),
            fills: state.fills.len(),
            open_orders: state.orders.values().filter(|o| o.state == OrderState::Open).count(),
            total_fees: state.total_fees,
            running_since: self.started_at,
        }
    }

    /// Apply a fill to cash and positions.
    fn book_fill(&self, state: &mut PaperState, order_id: &str, token_id: &str, shares: Decimal, cost: Decimal) {
        let fee = cost * self.config.fee_rate;
        state.capital -= cost + fee;
        state.total_fees += fee;

        let avg_price = cost / shares;
        let mark = state
            .books
            .get(token_id)
            .and_then(OrderBook::mid_price)
            .unwrap_or(avg_price);

        match state.positions.get_mut(token_id) {
            Some(pos) => {
                pos.add(shares, avg_price);
                pos.current_price = mark;
            }
            None => {
                let (market_id, side) = split_token(token_id);
                let meta = state.markets.get(&market_id).cloned();
                let mut pos = PortfolioPosition::new(
                    market_id,
                    meta.as_ref().map(|m| m.question.clone()).unwrap_or_default(),
                    meta.map(|m| m.category).unwrap_or_default(),
                    &self.config.venue,
                    side,
                    shares,
                    avg_price,
                );
                pos.current_price = mark;
                state.positions.insert(token_id.to_string(), pos);
            }
        }

        state.fills.push(PaperFill {
            order_id: order_id.to_string(),
            token_id: token_id.to_string(),
            shares,
            cost,
            fee,
            at: Utc::now(),
        });
    }

    /// Try to fill a resting order against the current book.
    fn try_cross(&self, state: &mut PaperState, order_id: &str) -> OrderState {
        let Some(order) = state.orders.get(order_id).cloned() else {
            return OrderState::Cancelled;
        };
        if order.state != OrderState::Open {
            return order.state;
        }

        let Some(book) = state.books.get_mut(&order.token_id) else {
            return OrderState::Open;
        };
        let Some(cost) = take_shares(book, order.shares, order.price) else {
            return OrderState::Open;
        };
        if cost * (Decimal::ONE + self.config.fee_rate) > state.capital {
            return OrderState::Open;
        }

        self.book_fill(state, order_id, &order.token_id, order.shares, cost);
        if let Some(o) = state.orders.get_mut(order_id) {
            o.state = OrderState::Filled;
        }
        OrderState::Filled
    }
}

/// Split "market:OUTCOME" into its parts. Unknown outcomes default to YES.
fn split_token(token_id: &str) -> (String, Side) {
    match token_id.rsplit_once(':') {
        Some((market, outcome)) => (market.to_string(), outcome.parse().unwrap_or(Side::BuyYes)),
        None => (token_id.to_string(), Side::BuyYes),
    }
}

/// Consume asks spending `usd`. Returns shares bought, or `None` (book
/// untouched) when depth is insufficient.
fn take_usd(book: &mut OrderBook, usd: Decimal) -> Option<Decimal> {
    let (shares, _) = book.fill_for_usd(usd)?;
    let mut remaining = usd;
    for level in book.asks.iter_mut() {
        if remaining.is_zero() {
            break;
        }
        let spend = level.notional().min(remaining);
        level.amount -= spend / level.price;
        remaining -= spend;
    }
    book.asks.retain(|l| l.amount > Decimal::ZERO);
    Some(shares)
}

/// Consume `shares` from asks priced at or below `limit`. Returns the USD
/// cost, or `None` (book untouched) when not enough is available.
fn take_shares(book: &mut OrderBook, shares: Decimal, limit: Decimal) -> Option<Decimal> {
    let available: Decimal = book.asks.iter().filter(|l| l.price <= limit).map(|l| l.amount).sum();
    if available < shares {
        return None;
    }

    let mut remaining = shares;
    let mut cost = Decimal::ZERO;
    for level in book.asks.iter_mut() {
        if remaining.is_zero() {
            break;
        }
        let take = level.amount.min(remaining);
        cost += take * level.price;
        level.amount -= take;
        remaining -= take;
    }
    book.asks.retain(|l| l.amount > Decimal::ZERO);
    Some(cost)
}

#[async_trait]
impl MarketClient for PaperClient {
    fn venue(&self) -> &str {
        &self.config.venue
    }

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
        self.state
            .read()
            .await
            .books
            .get(token_id)
            .cloned()
            .ok_or_else(|| anyhow!("No paper book for {}", token_id))
    }

    async fn place_order(&self, token_id: &str, size_usd: Decimal, side: OrderSide) -> Result<OrderResponse> {
        if side == OrderSide::Sell {
            return Ok(OrderResponse::rejected("paper venue only supports buys"));
        }
        if size_usd <= Decimal::ZERO {
            return Ok(OrderResponse::rejected("size must be positive"));
        }

        let mut state = self.state.write().await;
        if size_usd * (Decimal::ONE + self.config.fee_rate) > state.capital {
            return Ok(OrderResponse::rejected("insufficient capital"));
        }

        let Some(book) = state.books.get_mut(token_id) else {
            return Ok(OrderResponse::rejected(format!("no book for {}", token_id)));
        };
        let Some(shares) = take_usd(book, size_usd) else {
            return Ok(OrderResponse::rejected("insufficient depth for FOK order"));
        };

        let order_id = uuid::Uuid::new_v4().to_string();
        self.book_fill(&mut state, &order_id, token_id, shares, size_usd);

        debug!(token = %token_id, usd = %size_usd, shares = %shares, "Paper market order filled");

        Ok(OrderResponse {
            order_id: Some(order_id),
            success: true,
            error_msg: String::new(),
            status: Some("MATCHED".to_string()),
            filled_shares: Some(shares),
            avg_price: Some(size_usd / shares),
        })
    }

    async fn place_limit_order(
        &self,
        token_id: &str,
        price: Decimal,
        size_shares: Decimal,
        side: OrderSide,
    ) -> Result<OrderResponse> {
        if side == OrderSide::Sell {
            return Ok(OrderResponse::rejected("paper venue only supports buys"));
        }
        if size_shares <= Decimal::ZERO || price <= Decimal::ZERO || price >= Decimal::ONE {
            return Ok(OrderResponse::rejected("invalid limit order"));
        }

        let mut state = self.state.write().await;
        if price * size_shares * (Decimal::ONE + self.config.fee_rate) > state.capital {
            return Ok(OrderResponse::rejected("insufficient capital"));
        }

        let order_id = uuid::Uuid::new_v4().to_string();
        state.orders.insert(
            order_id.clone(),
            RestingOrder {
                token_id: token_id.to_string(),
                price,
                shares: size_shares,
                state: OrderState::Open,
            },
        );

        let result = self.try_cross(&mut state, &order_id);
        debug!(token = %token_id, price = %price, shares = %size_shares, state = ?result, "Paper limit order placed");

        Ok(OrderResponse {
            order_id: Some(order_id),
            success: true,
            error_msg: String::new(),
            status: Some(if result == OrderState::Filled { "MATCHED" } else { "LIVE" }.to_string()),
            filled_shares: (result == OrderState::Filled).then_some(size_shares),
            avg_price: None,
        })
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderState> {
        let mut state = self.state.write().await;
        if !state.orders.contains_key(order_id) {
            // Market orders never rest; a known fill means it matched.
            if state.fills.iter().any(|f| f.order_id == order_id) {
                return Ok(OrderState::Filled);
            }
            return Err(anyhow!("Unknown paper order {}", order_id));
        }
        Ok(self.try_cross(&mut state, order_id))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool> {
        let mut state = self.state.write().await;
        match state.orders.get_mut(order_id) {
            Some(order) if order.state == OrderState::Open => {
                order.state = OrderState::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn cancel_all_orders(&self) -> Result<bool> {
        let mut state = self.state.write().await;
        let mut cancelled = 0;
        for order in state.orders.values_mut() {
            if order.state == OrderState::Open {
                order.state = OrderState::Cancelled;
                cancelled += 1;
            }
        }
        info!(count = cancelled, "Cancelled all paper orders");
        Ok(true)
    }

    async fn get_portfolio(&self) -> Result<Portfolio> {
        let state = self.state.read().await;
        let positions = state
            .positions
            .iter()
            .map(|(token, pos)| {
                let mut pos = pos.clone();
                if let Some(mid) = state.books.get(token).and_then(OrderBook::mid_price) {
                    pos.current_price = mid;
                }
                pos
            })
            .collect();

        Ok(Portfolio {
            balance: state.capital,
            positions,
        })
    }
}

/// Paper trading statistics.
#[derive(Debug, Clone)]
pub struct PaperStats {
    pub initial_capital: Decimal,
    pub current_equity: Decimal,
    pub cash_available: Decimal,
    pub unrealized_pnl: Decimal,
    pub return_pct: Decimal,
    pub open_positions: usize,
    pub fills: usize,
    pub open_orders: usize,
    pub total_fees: Decimal,
    pub running_since: DateTime<Utc>,
}

impl std::fmt::Display for PaperStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n{:=^50}", " PAPER ACCOUNT ")?;
        writeln!(f, "Running since: {}", self.running_since.format("%Y-%m-%d %H:%M"))?;
        writeln!(f)?;
        writeln!(f, "Initial Capital:  ${:.2}", self.initial_capital)?;
        writeln!(f, "Current Equity:   ${:.2}", self.current_equity)?;
        writeln!(f, "Cash Available:   ${:.2}", self.cash_available)?;
        writeln!(f, "Unrealized P&L:   ${:.2} ({:.2}%)", self.unrealized_pnl, self.return_pct * dec!(100))?;
        writeln!(f)?;
        writeln!(f, "Open Positions:   {}", self.open_positions)?;
        writeln!(f, "Open Orders:      {}", self.open_orders)?;
        writeln!(f, "Fills:            {}", self.fills)?;
        writeln!(f, "Total Fees:       ${:.2}", self.total_fees)?;
        writeln!(f, "{:=^50}", "")?;
        Ok(())
    }
}
