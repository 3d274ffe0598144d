//! Trade lifecycle: size, gate, schedule and audit one proposed trade.
//!
//! Handles:
//! - Choosing a side and a slippage-aware size from live books
//! - Proposal-time risk evaluation and placement-time exposure caps
//! - Executing the approved size with the requested strategy
//! - Writing every decision to the audit chain

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::ExponentialBackoffBuilder;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::{watch, Mutex};
use tracing::{error, info, warn};

use crate::api::MarketClient;
use crate::audit::{events, AuditChain};
use crate::db::Database;
use crate::models::{
    DailyRiskState, ExecutionParams, ExecutionStrategy, OrderBook, Severity, Side, TradeSignal,
};
use crate::risk::{RiskGate, RiskRequest};
use crate::trading::{Allocation, OrderScheduler, PositionSizer};

/// A trade proposed by the forecasting side.
#[derive(Debug, Clone)]
pub struct TradeProposal {
    pub market_id: String,
    pub question: String,
    pub category: String,
    /// Model probability that YES resolves true
    pub probability: Decimal,
    pub rationale: String,
    pub params: ExecutionParams,
}

/// Orchestrates sizer, risk gate, scheduler and audit chain.
pub struct TradeLifecycleController {
    client: Arc<dyn MarketClient>,
    sizer: PositionSizer,
    gate: RiskGate,
    scheduler: OrderScheduler,
    audit: Arc<AuditChain>,
    db: Database,
    account_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    audit_retry_budget: Duration,
}

impl TradeLifecycleController {
    pub fn new(
        client: Arc<dyn MarketClient>,
        sizer: PositionSizer,
        gate: RiskGate,
        scheduler: OrderScheduler,
        audit: Arc<AuditChain>,
        db: Database,
    ) -> Self {
        Self {
            client,
            sizer,
            gate,
            scheduler,
            audit,
            db,
            account_locks: Mutex::new(HashMap::new()),
            audit_retry_budget: Duration::from_secs(30),
        }
    }

    #[cfg(test)]
    pub fn gate(&self) -> &RiskGate {
        &self.gate
    }

    /// Run one proposal to a terminal status. The returned signal's status
    /// and rationale describe the outcome. `Err` is reserved for plumbing
    /// failures (venue unreachable before sizing, storage, audit exhausted).
    pub async fn propose_and_execute(
        &self,
        account_id: &str,
        proposal: &TradeProposal,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<TradeSignal> {
        // One in-flight lifecycle per account
        let lock = self.account_lock(account_id).await;
        let _guard = lock.lock().await;

        info!(
            account = %account_id,
            market = %proposal.market_id,
            probability = %proposal.probability,
            "Trade proposed"
        );

        let portfolio = self.client.get_portfolio().await.context("Failed to fetch portfolio")?;
        let (side, allocation, book) = self.choose_side(proposal, portfolio.balance).await?;

        let price_estimate = if allocation.is_zero() {
            side.win_probability(proposal.probability)
        } else {
            allocation.fill_price
        };
        let mut signal = TradeSignal::new(
            account_id,
            &proposal.market_id,
            &proposal.question,
            &proposal.category,
            side,
            price_estimate,
            allocation.size_usd,
            &proposal.rationale,
        );
        self.db.save_signal(&signal).await?;
        self.record(
            events::SIGNAL_PROPOSED,
            json!({
                "signal_id": signal.id,
                "account_id": account_id,
                "market_id": signal.market_id,
                "side": side.as_str(),
                "probability": proposal.probability.to_string(),
                "size_usd": allocation.size_usd.to_string(),
                "shares": allocation.shares.to_string(),
                "fill_price": allocation.fill_price.to_string(),
                "bankroll": portfolio.balance.to_string(),
            }),
        )
        .await?;

        if allocation.is_zero() {
            info!(market = %proposal.market_id, "No positive edge at available depth");
            signal.reject("no positive edge at available depth")?;
            return self.finish(signal, events::SIGNAL_REJECTED, json!({})).await;
        }

        // Reroutes only ever turn SINGLE into TWAP, so the requested
        // strategy decides whether the ceiling becomes a resting price.
        let strategy = proposal.params.strategy.unwrap_or(ExecutionStrategy::Single);
        let limit_price = proposal
            .params
            .price_ceiling
            .filter(|_| strategy.places_limit_orders());
        let request = RiskRequest {
            account_id,
            market_id: &proposal.market_id,
            question: &proposal.question,
            category: &proposal.category,
            venue: self.client.venue(),
            size_usd: allocation.size_usd,
            limit_price,
            book: Some(&book),
            as_of: Utc::now(),
        };

        let decision = self.gate.evaluate(&request, &portfolio).await?;
        for alert in decision.alerts.iter().filter(|a| a.severity == Severity::Medium) {
            signal.annotate(format!("WARNING {}", alert))?;
        }
        let risk_payload = json!({
            "config_version": decision.config_version,
            "factors": decision.factors,
            "alerts": decision.alerts,
            "drawdown_pct": decision.daily.drawdown_pct().round_dp(4).to_string(),
        });

        if let Some(block) = &decision.blocking {
            let reason = block.to_string();
            return if decision.is_paused() {
                signal.pause(&reason)?;
                self.finish(signal, events::SIGNAL_PAUSED, json!({ "reason": reason, "risk": risk_payload }))
                    .await
            } else {
                signal.reject(&reason)?;
                self.finish(signal, events::SIGNAL_REJECTED, json!({ "reason": reason, "risk": risk_payload }))
                    .await
            };
        }

        // Placement-time caps run against a fresh portfolio
        let fresh = self.client.get_portfolio().await.context("Failed to refresh portfolio")?;
        if let Err(e) = self.gate.check_placement(&request, &fresh).await {
            let reason = e.to_string();
            signal.reject(&reason)?;
            return self
                .finish(signal, events::SIGNAL_REJECTED, json!({ "reason": reason, "risk": risk_payload }))
                .await;
        }

        signal.approve()?;
        self.db.save_signal(&signal).await?;
        self.record(
            events::SIGNAL_APPROVED,
            json!({ "signal_id": signal.id, "risk": risk_payload }),
        )
        .await?;

        let mut plan = self.scheduler.plan(
            &signal.id,
            &side.token_id(&proposal.market_id),
            side,
            allocation.size_usd,
            &proposal.params,
        );
        self.db.save_plan(&plan).await?;
        self.record(
            events::PLAN_CREATED,
            json!({
                "signal_id": signal.id,
                "plan_id": plan.id,
                "strategy": plan.strategy.as_str(),
                "requested_strategy": plan.requested_strategy.as_str(),
                "rerouted": plan.was_rerouted(),
                "total_size": plan.total_size.to_string(),
                "params": plan.params,
            }),
        )
        .await?;

        let report = self.scheduler.execute(&mut plan, &mut cancel).await;
        let summary = report.summary();
        let report_payload = serde_json::to_value(&report)?;

        if report.executed_size > Decimal::ZERO {
            signal.mark_executed(&summary)?;
            self.finish(signal, events::SIGNAL_EXECUTED, json!({ "report": report_payload }))
                .await
        } else {
            signal.mark_failed(&summary)?;
            self.finish(signal, events::SIGNAL_FAILED, json!({ "report": report_payload }))
                .await
        }
    }

    /// Lift today's drawdown pause for an account. Audited with the actor.
    pub async fn resume_trading(&self, account_id: &str, actor_id: &str) -> Result<DailyRiskState> {
        let lock = self.account_lock(account_id).await;
        let _guard = lock.lock().await;

        let portfolio = self.client.get_portfolio().await.context("Failed to fetch portfolio")?;
        let state = self
            .gate
            .breaker()
            .resume(account_id, portfolio.equity(), Utc::now())
            .await?;

        self.record_as(
            events::TRADING_RESUMED,
            json!({
                "account_id": account_id,
                "day": state.day.to_string(),
                "starting_balance": state.starting_balance.to_string(),
            }),
            Some(actor_id),
        )
        .await?;
        Ok(state)
    }

    /// Size YES first; if it has no edge at available depth, try NO.
    async fn choose_side(&self, proposal: &TradeProposal, bankroll: Decimal) -> Result<(Side, Allocation, OrderBook)> {
        let yes = self.size_side(Side::BuyYes, proposal, bankroll).await?;
        if !yes.1.is_zero() {
            return Ok(yes);
        }

        match self.size_side(Side::BuyNo, proposal, bankroll).await {
            Ok(no) if !no.1.is_zero() => Ok(no),
            Ok(_) => Ok(yes),
            Err(e) => {
                warn!(market = %proposal.market_id, error = %e, "NO book unavailable");
                Ok(yes)
            }
        }
    }

    async fn size_side(
        &self,
        side: Side,
        proposal: &TradeProposal,
        bankroll: Decimal,
    ) -> Result<(Side, Allocation, OrderBook)> {
        let token = side.token_id(&proposal.market_id);
        let book = self
            .client
            .get_order_book(&token)
            .await
            .with_context(|| format!("Failed to fetch book for {}", token))?;
        let allocation = self
            .sizer
            .allocate(side.win_probability(proposal.probability), &book, bankroll);
        Ok((side, allocation, book))
    }

    /// Persist a terminal signal and audit it.
    async fn finish(&self, signal: TradeSignal, event: &str, extra: Value) -> Result<TradeSignal> {
        self.db.save_signal(&signal).await?;
        let mut payload = json!({
            "signal_id": signal.id,
            "status": signal.status.as_str(),
            "rationale": signal.rationale,
        });
        if let (Value::Object(map), Value::Object(more)) = (&mut payload, extra) {
            map.extend(more);
        }
        self.record(event, payload).await?;

        info!(
            signal = %signal.id,
            market = %signal.market_id,
            status = %signal.status,
            "Trade lifecycle finished"
        );
        Ok(signal)
    }

    async fn record(&self, event: &str, payload: Value) -> Result<()> {
        self.record_as(event, payload, None).await
    }

    /// Append with exponential backoff. Dropping an event would break the
    /// chain for every later record, so exhaustion is a hard error.
    async fn record_as(&self, event: &str, payload: Value, actor_id: Option<&str>) -> Result<()> {
        let policy = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100))
            .with_max_elapsed_time(Some(self.audit_retry_budget))
            .build();

        let chain = &self.audit;
        let payload = &payload;
        backoff::future::retry(policy, move || async move {
            chain.append(event, payload, actor_id).await.map_err(|e| {
                warn!(event = %event, error = %e, "Audit append failed, retrying");
                backoff::Error::transient(e)
            })
        })
        .await
        .map(|_| ())
        .map_err(|e| {
            error!(event = %event, error = %e, "Audit append retries exhausted");
            e.context(format!("Audit record {} could not be written", event))
        })
    }

    async fn account_lock(&self, account_id: &str) -> Arc<Mutex<()>> {
        self.account_locks
            .lock()
            .await
            .entry(account_id.to_string())
            .or_default()
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{PaperClient, PaperConfig};
    use crate::models::{
        BookLevel, ExecutionStrategy, ExposureLimit, LimitScope, PortfolioPosition, SignalStatus,
    };
    use crate::risk::{DrawdownBreaker, RiskConfigStore, RiskSettings};
    use crate::trading::{ExecutionConfig, SizerConfig};
    use rust_decimal_macros::dec;
    use tokio_test::assert_ok;

    const MARKET: &str = "will-it-rain";
    const QUESTION: &str = "Will it rain in London on Friday?";

    struct Harness {
        controller: TradeLifecycleController,
        paper: Arc<PaperClient>,
        db: Database,
        audit: Arc<AuditChain>,
        _cancel_tx: watch::Sender<bool>,
        cancel_rx: watch::Receiver<bool>,
    }

    async fn harness(settings: RiskSettings, store: RiskConfigStore) -> Harness {
        let db = Database::in_memory().await.unwrap();
        let paper = Arc::new(PaperClient::new(PaperConfig {
            initial_capital: dec!(1000),
            ..Default::default()
        }));
        paper.register_market(MARKET, QUESTION, "weather").await;
        paper
            .set_book(OrderBook::new(
                "will-it-rain:YES",
                vec![BookLevel::new(dec!(0.50), dec!(10000))],
                vec![BookLevel::new(dec!(0.49), dec!(10000))],
            ))
            .await;
        paper
            .set_book(OrderBook::new(
                "will-it-rain:NO",
                vec![BookLevel::new(dec!(0.51), dec!(10000))],
                vec![BookLevel::new(dec!(0.50), dec!(10000))],
            ))
            .await;

        let client: Arc<dyn MarketClient> = paper.clone();
        let audit = Arc::new(AuditChain::new(db.clone()));
        let breaker = DrawdownBreaker::new(db.clone(), settings.max_daily_drawdown_pct, settings.allow_manual_resume);
        let gate = RiskGate::new(settings, Arc::new(store), breaker);
        let scheduler = OrderScheduler::new(client.clone(), ExecutionConfig::default()).with_progress(Arc::new(db.clone()));
        let sizer = PositionSizer::new(SizerConfig {
            max_bankroll_fraction: Decimal::ONE,
            ..Default::default()
        });
        let controller = TradeLifecycleController::new(client, sizer, gate, scheduler, audit.clone(), db.clone());
        let (tx, rx) = watch::channel(false);

        Harness {
            controller,
            paper,
            db,
            audit,
            _cancel_tx: tx,
            cancel_rx: rx,
        }
    }

    fn proposal(probability: Decimal) -> TradeProposal {
        TradeProposal {
            market_id: MARKET.to_string(),
            question: QUESTION.to_string(),
            category: "weather".to_string(),
            probability,
            rationale: "model forecast".to_string(),
            params: ExecutionParams::default(),
        }
    }

    #[tokio::test]
    async fn test_happy_path_executes_and_audits() {
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(Default::default())).await;

        let signal = h
            .controller
            .propose_and_execute("acct", &proposal(dec!(0.6)), h.cancel_rx.clone())
            .await
            .unwrap();

        assert_eq!(signal.status, SignalStatus::Executed);
        assert_eq!(signal.side, Side::BuyYes);
        // flat 0.50 book, p=0.6: kelly 20% of $1000
        assert_eq!(signal.proposed_size, dec!(200));
        assert_eq!(h.paper.fills().await.len(), 1);

        let stored = h.db.get_signal(&signal.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SignalStatus::Executed);

        let kinds: Vec<String> = h.audit.tail(10).await.unwrap().into_iter().map(|r| r.event_type).collect();
        assert_eq!(
            kinds,
            vec![
                events::SIGNAL_PROPOSED,
                events::SIGNAL_APPROVED,
                events::PLAN_CREATED,
                events::SIGNAL_EXECUTED
            ]
        );
        assert!(assert_ok!(h.audit.verify().await).is_intact());
    }

    #[tokio::test]
    async fn test_low_probability_buys_no() {
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(Default::default())).await;
        let signal = h
            .controller
            .propose_and_execute("acct", &proposal(dec!(0.3)), h.cancel_rx.clone())
            .await
            .unwrap();
        assert_eq!(signal.side, Side::BuyNo);
        assert_eq!(signal.status, SignalStatus::Executed);
    }

    #[tokio::test]
    async fn test_no_edge_is_rejected() {
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(Default::default())).await;
        let signal = h
            .controller
            .propose_and_execute("acct", &proposal(dec!(0.5)), h.cancel_rx.clone())
            .await
            .unwrap();
        assert_eq!(signal.status, SignalStatus::Rejected);
        assert!(signal.rationale.contains("no positive edge"));
        assert!(h.paper.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_fat_finger_rejects_with_verbatim_reason() {
        let settings = RiskSettings {
            max_order_size_usd: Some(dec!(150)),
            ..Default::default()
        };
        let h = harness(settings, RiskConfigStore::in_memory(Default::default())).await;
        let signal = h
            .controller
            .propose_and_execute("acct", &proposal(dec!(0.6)), h.cancel_rx.clone())
            .await
            .unwrap();
        assert_eq!(signal.status, SignalStatus::Rejected);
        assert!(signal.rationale.contains("SIZE_LIMIT_EXCEEDED"));

        let last = h.audit.tail(1).await.unwrap().remove(0);
        assert_eq!(last.event_type, events::SIGNAL_REJECTED);
    }

    #[tokio::test]
    async fn test_snipe_ceiling_is_a_trigger_not_a_limit_price() {
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(Default::default())).await;

        // mid is 0.495; a 0.40 trigger sits ~19% away
        let mut p = proposal(dec!(0.6));
        p.params.strategy = Some(ExecutionStrategy::LiquiditySnipe);
        p.params.price_ceiling = Some(dec!(0.40));
        p.params.timeout_secs = Some(0);
        let signal = h.controller.propose_and_execute("acct", &p, h.cancel_rx.clone()).await.unwrap();

        assert!(!signal.rationale.contains("PRICE_DEVIATION_EXCEEDED"));
        // the gate let it through; the ask never dropped to the trigger
        assert_eq!(signal.status, SignalStatus::Failed);
        assert!(signal.rationale.contains("liquidity not met"));
        assert!(h.paper.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_iceberg_ceiling_far_from_mid_is_rejected() {
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(Default::default())).await;

        let mut p = proposal(dec!(0.6));
        p.params.strategy = Some(ExecutionStrategy::Iceberg);
        p.params.price_ceiling = Some(dec!(0.40));
        let signal = h.controller.propose_and_execute("acct", &p, h.cancel_rx.clone()).await.unwrap();

        assert_eq!(signal.status, SignalStatus::Rejected);
        assert!(signal.rationale.contains("PRICE_DEVIATION_EXCEEDED"));
    }

    #[tokio::test]
    async fn test_category_cap_blocks_at_placement() {
        let mut snapshot = crate::risk::RiskSnapshot::default();
        snapshot
            .exposure_limits
            .push(ExposureLimit::new(LimitScope::CategoryCap, "weather", dec!(100)));
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(snapshot)).await;

        let signal = h
            .controller
            .propose_and_execute("acct", &proposal(dec!(0.6)), h.cancel_rx.clone())
            .await
            .unwrap();
        assert_eq!(signal.status, SignalStatus::Rejected);
        assert!(signal.rationale.contains("category cap exceeded for weather"));
        assert!(h.paper.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_factor_limit_counts_existing_positions() {
        let mut snapshot = crate::risk::RiskSnapshot::default();
        snapshot.factor_limits.insert("Politics.Trump".to_string(), dec!(1000));
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(snapshot)).await;

        // $900 already riding on a different Trump market
        h.paper
            .seed_position(PortfolioPosition::new(
                "trump-approval",
                "Trump approval above 45% in March?",
                "politics",
                "paper",
                Side::BuyYes,
                dec!(1800),
                dec!(0.50),
            ))
            .await;

        let mut p = proposal(dec!(0.6));
        p.question = "Will Trump attend the London summit?".to_string();
        let signal = h.controller.propose_and_execute("acct", &p, h.cancel_rx.clone()).await.unwrap();

        assert_eq!(signal.status, SignalStatus::Rejected);
        assert!(signal.rationale.contains("factor limit exceeded for Politics.Trump"));
        assert!(h.paper.fills().await.is_empty());
    }

    #[tokio::test]
    async fn test_drawdown_pause_then_resume() {
        let settings = RiskSettings {
            allow_manual_resume: true,
            ..Default::default()
        };
        let h = harness(settings, RiskConfigStore::in_memory(Default::default())).await;

        // open the day at $1000 equity
        let opened = h.controller.gate().breaker().check("acct", dec!(1000), Utc::now()).await.unwrap();
        assert!(!opened.paused);

        // lose 20%; still an edge but no longer tradeable today
        h.paper.adjust_capital(dec!(-200)).await;
        let paused = h
            .controller
            .propose_and_execute("acct", &proposal(dec!(0.6)), h.cancel_rx.clone())
            .await
            .unwrap();
        assert_eq!(paused.status, SignalStatus::Paused);
        assert!(paused.rationale.contains("trading paused"));

        let state = h.controller.resume_trading("acct", "risk-officer").await.unwrap();
        assert!(!state.paused);
        let last = h.audit.tail(1).await.unwrap().remove(0);
        assert_eq!(last.event_type, events::TRADING_RESUMED);
        assert!(last.payload.contains("risk-officer"));

        let after = h
            .controller
            .propose_and_execute("acct", &proposal(dec!(0.6)), h.cancel_rx.clone())
            .await
            .unwrap();
        assert_eq!(after.status, SignalStatus::Executed);
    }

    #[tokio::test]
    async fn test_large_single_is_rerouted_and_recorded() {
        let h = harness(RiskSettings::default(), RiskConfigStore::in_memory(Default::default())).await;
        h.paper.adjust_capital(dec!(9000)).await;

        let mut p = proposal(dec!(0.6));
        p.params.strategy = Some(ExecutionStrategy::Single);
        p.params.duration_secs = Some(0);
        let signal = h.controller.propose_and_execute("acct", &p, h.cancel_rx.clone()).await.unwrap();

        // $2000 > $1000 threshold
        assert_eq!(signal.proposed_size, dec!(2000));
        assert_eq!(signal.status, SignalStatus::Executed);
        assert_eq!(h.paper.fills().await.len(), 5);

        let plan_event = h
            .audit
            .tail(10)
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.event_type == events::PLAN_CREATED)
            .unwrap();
        assert!(plan_event.payload.contains(r#""rerouted":true"#));

        let payload: serde_json::Value = serde_json::from_str(&plan_event.payload).unwrap();
        let plan_id = payload["plan_id"].as_str().unwrap();
        let plan = h.db.get_plan(plan_id).await.unwrap().unwrap();
        assert_eq!(plan.strategy, "TWAP");
        assert_eq!(plan.requested_strategy, "SINGLE");
        assert_eq!(plan.params().unwrap().chunks, 5);

        let chunks = h.db.get_plan_chunks(plan_id).await.unwrap();
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.success));
    }
}
