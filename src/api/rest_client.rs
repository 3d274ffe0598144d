//! Live venue client over the REST order API.
//!
//! Handles:
//! - API-key authentication headers
//! - Order book snapshots
//! - Market (FOK) and limit (GTC) order placement, status and cancellation
//! - Portfolio balance and positions

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use tracing::debug;

use crate::models::{OrderBook, Portfolio};

use super::client::{MarketClient, OrderResponse, OrderSide, OrderState, OrderType};
use super::types::{
    BalanceResponse, LimitOrderRequest, MarketOrderRequest, OrderBookResponse, OrderStatusResponse,
    PositionResponse,
};

/// Default venue API base URL
pub const DEFAULT_API_URL: &str = "https://clob.polymarket.com";

/// REST client for placing and tracking orders on a live venue.
pub struct RestClient {
    http: Client,
    base_url: String,
    api_key: String,
    api_passphrase: String,
    venue: String,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: &str, api_passphrase: &str, venue: &str) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            api_passphrase: api_passphrase.to_string(),
            venue: venue.to_string(),
        })
    }

    /// Create from environment variables:
    /// - POLYRISK_API_KEY
    /// - POLYRISK_API_PASSPHRASE (optional)
    /// - POLYRISK_API_URL (defaults to the public CLOB)
    /// - POLYRISK_VENUE (defaults to "polymarket")
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("POLYRISK_API_KEY").context("POLYRISK_API_KEY not set")?;
        let api_passphrase = std::env::var("POLYRISK_API_PASSPHRASE").unwrap_or_default();
        let base_url = std::env::var("POLYRISK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let venue = std::env::var("POLYRISK_VENUE").unwrap_or_else(|_| "polymarket".to_string());

        Self::new(&base_url, &api_key, &api_passphrase, &venue)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Build authentication headers.
    fn headers(&self) -> Result<reqwest::header::HeaderMap> {
        use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("poly-api-key"),
            HeaderValue::from_str(&self.api_key)?,
        );
        if !self.api_passphrase.is_empty() {
            headers.insert(
                HeaderName::from_static("poly-passphrase"),
                HeaderValue::from_str(&self.api_passphrase)?,
            );
        }
        headers.insert(
            HeaderName::from_static("poly-timestamp"),
            HeaderValue::from_str(&chrono::Utc::now().timestamp().to_string())?,
        );

        Ok(headers)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let resp = self.http.get(self.url(path))
            .headers(self.headers()?)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Failed to get {}: {} - {}", what, status, text));
        }

        resp.json().await.with_context(|| format!("Failed to parse {}", what))
    }

    async fn post_order<B: serde::Serialize>(&self, body: &B) -> Result<OrderResponse> {
        let resp = self.http.post(self.url("/order"))
            .headers(self.headers()?)
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Ok(OrderResponse::rejected(format!("{} - {}", status, text)));
        }

        resp.json().await.context("Failed to parse order response")
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        let resp = self.http.delete(self.url(path))
            .headers(self.headers()?)
            .send()
            .await?;

        Ok(resp.status().is_success())
    }
}

#[async_trait]
impl MarketClient for RestClient {
    fn venue(&self) -> &str {
        &self.venue
    }

    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
        let resp: OrderBookResponse = self
            .get_json(&format!("/book?token_id={}", token_id), "order book")
            .await?;
        resp.into_order_book(token_id)
    }

    async fn place_order(&self, token_id: &str, size_usd: Decimal, side: OrderSide) -> Result<OrderResponse> {
        debug!(token = %token_id, size_usd = %size_usd, "Placing market order");
        let body = MarketOrderRequest {
            token_id: token_id.to_string(),
            amount: size_usd.round_dp(2).to_string(),
            side,
            order_type: OrderType::Fok,
        };
        self.post_order(&body).await
    }

    async fn place_limit_order(
        &self,
        token_id: &str,
        price: Decimal,
        size_shares: Decimal,
        side: OrderSide,
    ) -> Result<OrderResponse> {
        debug!(token = %token_id, price = %price, shares = %size_shares, "Placing limit order");
        let body = LimitOrderRequest {
            token_id: token_id.to_string(),
            price: price.round_dp(4).to_string(),
            size: size_shares.round_dp(2).to_string(),
            side,
            order_type: OrderType::Gtc,
        };
        self.post_order(&body).await
    }

    async fn get_order_status(&self, order_id: &str) -> Result<OrderState> {
        let resp: OrderStatusResponse = self
            .get_json(&format!("/order/{}", order_id), "order status")
            .await?;
        Ok(OrderState::from_venue(&resp.status))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<bool> {
        self.delete(&format!("/order/{}", order_id)).await
    }

    async fn cancel_all_orders(&self) -> Result<bool> {
        self.delete("/orders").await
    }

    async fn get_portfolio(&self) -> Result<Portfolio> {
        let balance: BalanceResponse = self.get_json("/balance", "balance").await?;
        let rows: Vec<PositionResponse> = self.get_json("/positions", "positions").await?;

        let positions = rows
            .into_iter()
            .map(|r| r.into_position(&self.venue))
            .collect::<Result<Vec<_>>>()?;

        Ok(Portfolio {
            balance: balance.balance,
            positions,
        })
    }
}
