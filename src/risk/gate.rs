//! Pre-trade risk gate.
//!
//! `evaluate` runs at proposal time: drawdown breaker, fat-finger checks,
//! then factor and correlation exposure. `check_placement` is the coarser
//! scoped-limit pass run just before orders go out.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::error::RiskError;
use crate::models::{DailyRiskState, OrderBook, Portfolio, RiskAlert};

use super::config::RiskSettings;
use super::drawdown::DrawdownBreaker;
use super::exposure::{assess_factors, check_scoped_limits};
use super::fat_finger::FatFingerCheck;
use super::store::RiskConfigStore;

/// A trade as the gate sees it.
#[derive(Debug, Clone)]
pub struct RiskRequest<'a> {
    pub account_id: &'a str,
    pub market_id: &'a str,
    pub question: &'a str,
    pub category: &'a str,
    pub venue: &'a str,
    pub size_usd: Decimal,
    /// Set for limit orders only
    pub limit_price: Option<Decimal>,
    pub book: Option<&'a OrderBook>,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct RiskDecision {
    /// Hard block, if any. The text is the verbatim rejection reason.
    pub blocking: Option<RiskError>,
    pub alerts: Vec<RiskAlert>,
    pub factors: Vec<String>,
    pub daily: DailyRiskState,
    pub config_version: u64,
}

impl RiskDecision {
    #[cfg(test)]
    pub fn is_approved(&self) -> bool {
        self.blocking.is_none()
    }

    pub fn is_paused(&self) -> bool {
        self.blocking.as_ref().is_some_and(RiskError::is_pause)
    }
}

pub struct RiskGate {
    settings: RiskSettings,
    store: Arc<RiskConfigStore>,
    breaker: DrawdownBreaker,
    fat_finger: FatFingerCheck,
}

impl RiskGate {
    pub fn new(settings: RiskSettings, store: Arc<RiskConfigStore>, breaker: DrawdownBreaker) -> Self {
        let fat_finger = FatFingerCheck::from_settings(&settings);
        Self {
            settings,
            store,
            breaker,
            fat_finger,
        }
    }

    pub fn breaker(&self) -> &DrawdownBreaker {
        &self.breaker
    }

    /// Evaluate a proposed trade. `Err` means the gate itself failed
    /// (storage), not that the trade was blocked.
    pub async fn evaluate(&self, req: &RiskRequest<'_>, portfolio: &Portfolio) -> Result<RiskDecision> {
        let snapshot = self.store.snapshot().await;
        let daily = self.breaker.check(req.account_id, portfolio.equity(), req.as_of).await?;

        let mut decision = RiskDecision {
            blocking: None,
            alerts: Vec::new(),
            factors: Vec::new(),
            daily,
            config_version: snapshot.version,
        };

        if decision.daily.paused {
            let reason = decision
                .daily
                .pause_reason
                .clone()
                .unwrap_or_else(|| "daily drawdown limit".to_string());
            warn!(account = %req.account_id, market = %req.market_id, %reason, "Trade blocked: trading paused");
            decision.blocking = Some(RiskError::TradingPaused { reason });
            return Ok(decision);
        }

        if let Err(e) = self.fat_finger.validate(req.size_usd, req.limit_price, req.book) {
            warn!(market = %req.market_id, kind = %e.kind, "Trade blocked by fat-finger check");
            decision.blocking = Some(e.into());
            return Ok(decision);
        }

        let assessment = assess_factors(req.question, req.size_usd, portfolio, &snapshot, &self.settings);
        decision.factors = assessment.factors;
        decision.alerts = assessment.alerts;
        decision.blocking = assessment.blocking;

        match &decision.blocking {
            Some(e) => warn!(market = %req.market_id, reason = %e, "Trade blocked by factor limit"),
            None => info!(
                market = %req.market_id,
                size = %req.size_usd,
                factors = ?decision.factors,
                warnings = decision.alerts.len(),
                "Risk gate approved"
            ),
        }

        Ok(decision)
    }

    /// Scoped PER_MARKET/CATEGORY/EXCHANGE caps against a fresh portfolio.
    pub async fn check_placement(&self, req: &RiskRequest<'_>, portfolio: &Portfolio) -> Result<(), RiskError> {
        let snapshot = self.store.snapshot().await;
        let result = check_scoped_limits(
            req.market_id,
            req.category,
            req.venue,
            req.size_usd,
            portfolio,
            &snapshot,
        );
        if let Err(e) = &result {
            warn!(market = %req.market_id, reason = %e, "Order placement blocked by exposure cap");
        }
        result
    }
}
