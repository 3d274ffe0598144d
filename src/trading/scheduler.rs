//! Order scheduler: works an approved size into the market.
//!
//! Strategies:
//! - SINGLE: one immediate order
//! - TWAP: equal chunks spaced `duration / N` apart with jitter; failed chunks are skipped
//! - ICEBERG: display-size limit clips, each polled until filled; any stuck clip aborts the order
//! - LIQUIDITY_SNIPE: poll the book and fire everything once depth and price allow
//!
//! Every sleep or poll is a cancellation point. Nothing is interrupted mid-chunk.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::api::{MarketClient, OrderSide, OrderState};
use crate::models::{
    ExecutionParams, ExecutionPlan, ExecutionStrategy, PlanParams, PlanState, Side,
};
use super::ExecutionConfig;

/// Outcome of one order placement within a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkResult {
    pub index: u32,
    /// USD size attempted
    pub size: Decimal,
    pub success: bool,
    pub order_id: Option<String>,
    pub error: Option<String>,
    pub at: DateTime<Utc>,
}

/// Final result of executing a plan.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub plan_id: String,
    pub strategy: ExecutionStrategy,
    pub state: PlanState,
    pub executed_size: Decimal,
    pub remaining_size: Decimal,
    pub chunks: Vec<ChunkResult>,
    /// Why the plan stopped short, if it did
    pub reason: Option<String>,
}

impl ExecutionReport {
    pub fn successful_chunks(&self) -> usize {
        self.chunks.iter().filter(|c| c.success).count()
    }

    pub fn summary(&self) -> String {
        let mut s = format!(
            "{} {}: executed ${} of ${} in {}/{} orders",
            self.strategy,
            self.state,
            self.executed_size.round_dp(2),
            (self.executed_size + self.remaining_size).round_dp(2),
            self.successful_chunks(),
            self.chunks.len()
        );
        if let Some(reason) = &self.reason {
            s.push_str(&format!(" ({})", reason));
        }
        s
    }
}

/// Receives plan progress as execution proceeds.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn record_chunk(&self, plan: &ExecutionPlan, chunk: &ChunkResult) -> Result<()>;

    async fn record_plan(&self, plan: &ExecutionPlan) -> Result<()>;
}

/// Per-run bookkeeping shared by the strategy loops.
struct Run {
    chunks: Vec<ChunkResult>,
    reason: Option<String>,
}

impl Run {
    fn next_index(&self) -> u32 {
        self.chunks.len() as u32
    }
}

/// Executes plans against a market client.
pub struct OrderScheduler {
    client: Arc<dyn MarketClient>,
    config: ExecutionConfig,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl OrderScheduler {
    pub fn new(client: Arc<dyn MarketClient>, config: ExecutionConfig) -> Self {
        Self {
            client,
            config,
            progress: None,
        }
    }

    /// Persist plan progress after every chunk.
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn config(&self) -> &ExecutionConfig {
        &self.config
    }

    /// Large SINGLE orders are forced through TWAP.
    pub fn route(&self, requested: ExecutionStrategy, total_size: Decimal) -> ExecutionStrategy {
        if requested == ExecutionStrategy::Single && total_size > self.config.large_order_threshold {
            ExecutionStrategy::Twap
        } else {
            requested
        }
    }

    /// Resolve caller parameters against defaults and build a scheduled plan.
    pub fn plan(
        &self,
        signal_id: &str,
        token_id: &str,
        side: Side,
        total_size: Decimal,
        params: &ExecutionParams,
    ) -> ExecutionPlan {
        let requested = params.strategy.unwrap_or(ExecutionStrategy::Single);
        let strategy = self.route(requested, total_size);

        if strategy != requested {
            info!(
                requested = %requested,
                size = %total_size,
                threshold = %self.config.large_order_threshold,
                "Large order rerouted to TWAP"
            );
        }

        let interval_secs = params.interval_secs.unwrap_or(match strategy {
            ExecutionStrategy::Iceberg => self.config.iceberg_poll_interval_secs,
            ExecutionStrategy::LiquiditySnipe => self.config.snipe_poll_interval_secs,
            _ => 0,
        });

        let resolved = PlanParams {
            duration_secs: params.duration_secs.unwrap_or(self.config.twap_duration_secs),
            chunks: params.chunks.unwrap_or(self.config.twap_chunks).max(1),
            interval_secs,
            display_size: params
                .display_size
                .filter(|d| *d > Decimal::ZERO)
                .unwrap_or(self.config.iceberg_display_size),
            min_depth: params.min_depth.unwrap_or(self.config.snipe_min_depth),
            depth_levels: params.depth_levels.unwrap_or(self.config.snipe_depth_levels).max(1),
            price_ceiling: params.price_ceiling,
            max_slippage: params.max_slippage,
            timeout_secs: params.timeout_secs.unwrap_or(self.config.snipe_timeout_secs),
        };

        ExecutionPlan {
            id: uuid::Uuid::new_v4().to_string(),
            signal_id: signal_id.to_string(),
            token_id: token_id.to_string(),
            side,
            strategy,
            requested_strategy: requested,
            params: resolved,
            total_size,
            remaining_size: total_size,
            state: PlanState::Scheduled,
            created_at: Utc::now(),
        }
    }

    /// Run a plan to a terminal state. Client errors never escape; they
    /// surface as failed chunks.
    pub async fn execute(&self, plan: &mut ExecutionPlan, cancel: &mut watch::Receiver<bool>) -> ExecutionReport {
        let mut run = Run {
            chunks: Vec::new(),
            reason: None,
        };

        if plan.state.is_terminal() {
            run.reason = Some(format!("plan already {}", plan.state));
            return self.report(plan, run);
        }

        plan.state = PlanState::InProgress;
        self.persist_plan(plan).await;

        info!(
            plan = %plan.id,
            token = %plan.token_id,
            strategy = %plan.strategy,
            size = %plan.total_size,
            "Executing plan"
        );

        plan.state = match plan.strategy {
            ExecutionStrategy::Single => self.run_single(plan, &mut run).await,
            ExecutionStrategy::Twap => self.run_twap(plan, &mut run, cancel).await,
            ExecutionStrategy::Iceberg => self.run_iceberg(plan, &mut run, cancel).await,
            ExecutionStrategy::LiquiditySnipe => self.run_snipe(plan, &mut run, cancel).await,
        };

        self.persist_plan(plan).await;

        info!(
            plan = %plan.id,
            state = %plan.state,
            executed = %plan.executed_size(),
            remaining = %plan.remaining_size,
            "Plan finished"
        );

        self.report(plan, run)
    }

    // ===== Strategies =====

    async fn run_single(&self, plan: &mut ExecutionPlan, run: &mut Run) -> PlanState {
        let size = plan.remaining_size;
        if self.market_chunk(plan, run, size).await {
            PlanState::Filled
        } else {
            run.reason.get_or_insert_with(|| "single order failed".to_string());
            PlanState::PartiallyAborted
        }
    }

    async fn run_twap(&self, plan: &mut ExecutionPlan, run: &mut Run, cancel: &mut watch::Receiver<bool>) -> PlanState {
        let sizes = split_equal(plan.total_size, plan.params.chunks);
        let n = sizes.len();
        if n < plan.params.chunks as usize {
            debug!(plan = %plan.id, requested = plan.params.chunks, chunks = n, "TWAP chunk count capped at whole cents");
        }
        let spacing = Duration::from_secs(plan.params.duration_secs) / n as u32;
        let mut failures = 0;

        for (i, size) in sizes.into_iter().enumerate() {
            if is_cancelled(cancel) {
                run.reason = Some("cancelled".to_string());
                return PlanState::Cancelled;
            }

            if !self.market_chunk(plan, run, size).await {
                failures += 1;
                warn!(plan = %plan.id, chunk = i, "TWAP chunk failed, continuing");
            }

            if i + 1 < n {
                let wait = jittered(spacing, self.config.twap_max_jitter_ms);
                debug!(plan = %plan.id, wait_ms = wait.as_millis() as u64, "TWAP sleeping");
                if suspend(wait, cancel).await {
                    run.reason = Some("cancelled".to_string());
                    return PlanState::Cancelled;
                }
            }
        }

        if failures == 0 {
            PlanState::Filled
        } else {
            run.reason = Some(format!("{} of {} chunks failed", failures, n));
            PlanState::PartiallyAborted
        }
    }

    async fn run_iceberg(
        &self,
        plan: &mut ExecutionPlan,
        run: &mut Run,
        cancel: &mut watch::Receiver<bool>,
    ) -> PlanState {
        let poll = Duration::from_secs(plan.params.interval_secs);

        while plan.remaining_size > Decimal::ZERO {
            if is_cancelled(cancel) {
                run.reason = Some("cancelled".to_string());
                return PlanState::Cancelled;
            }

            let clip = plan.params.display_size.min(plan.remaining_size);
            let index = run.next_index();

            let price = match plan.params.price_ceiling {
                Some(ceiling) => Some(ceiling),
                None => match self.client.get_order_book(&plan.token_id).await {
                    Ok(book) => book.best_ask(),
                    Err(e) => {
                        warn!(plan = %plan.id, error = %e, "Iceberg book fetch failed");
                        None
                    }
                },
            };
            let Some(price) = price.filter(|p| *p > Decimal::ZERO && *p < Decimal::ONE) else {
                self.push_chunk(plan, run, failed(index, clip, "no limit price available")).await;
                run.reason = Some("no limit price available".to_string());
                return PlanState::PartiallyAborted;
            };

            let shares = clip / price;
            let resp = match self
                .client
                .place_limit_order(&plan.token_id, price, shares, OrderSide::Buy)
                .await
            {
                Ok(r) if r.success => r,
                Ok(r) => {
                    self.push_chunk(plan, run, failed(index, clip, &r.error_msg)).await;
                    run.reason = Some(format!("clip rejected: {}", r.error_msg));
                    return PlanState::PartiallyAborted;
                }
                Err(e) => {
                    self.push_chunk(plan, run, failed(index, clip, &e.to_string())).await;
                    run.reason = Some(format!("clip placement failed: {}", e));
                    return PlanState::PartiallyAborted;
                }
            };
            let order_id = resp.order_id.clone().unwrap_or_default();

            let mut filled = resp.status.as_deref().map(OrderState::from_venue) == Some(OrderState::Filled);
            let mut attempts = 0;

            while !filled {
                if attempts >= self.config.iceberg_max_retries {
                    self.cancel_clip(&order_id).await;
                    self.push_chunk(plan, run, failed(index, clip, "clip not filled")).await;
                    run.reason = Some(format!("clip unfilled after {} polls", attempts));
                    return PlanState::PartiallyAborted;
                }

                if suspend(poll, cancel).await {
                    self.cancel_clip(&order_id).await;
                    run.reason = Some("cancelled".to_string());
                    return PlanState::Cancelled;
                }
                attempts += 1;

                match self.client.get_order_status(&order_id).await {
                    Ok(OrderState::Filled) => filled = true,
                    Ok(OrderState::Cancelled) => {
                        self.push_chunk(plan, run, failed(index, clip, "clip cancelled by venue")).await;
                        run.reason = Some("clip cancelled by venue".to_string());
                        return PlanState::PartiallyAborted;
                    }
                    Ok(OrderState::Open) => {}
                    Err(e) => warn!(order = %order_id, error = %e, "Iceberg status poll failed"),
                }
            }

            plan.remaining_size -= clip;
            let chunk = ChunkResult {
                index,
                size: clip,
                success: true,
                order_id: Some(order_id),
                error: None,
                at: Utc::now(),
            };
            info!(plan = %plan.id, clip = %clip, remaining = %plan.remaining_size, "Iceberg clip filled");
            self.push_chunk(plan, run, chunk).await;
        }

        PlanState::Filled
    }

    async fn run_snipe(&self, plan: &mut ExecutionPlan, run: &mut Run, cancel: &mut watch::Receiver<bool>) -> PlanState {
        let poll = Duration::from_secs(plan.params.interval_secs.max(1));
        let deadline = Instant::now() + Duration::from_secs(plan.params.timeout_secs);

        loop {
            if is_cancelled(cancel) {
                run.reason = Some("cancelled".to_string());
                return PlanState::Cancelled;
            }

            match self.client.get_order_book(&plan.token_id).await {
                Ok(book) => {
                    let depth = book.ask_depth_usd(plan.params.depth_levels);
                    let price_ok = match (book.best_ask(), plan.params.price_ceiling) {
                        (Some(ask), Some(ceiling)) => ask <= ceiling,
                        (Some(_), None) => true,
                        (None, _) => false,
                    };

                    if price_ok && depth >= plan.params.min_depth {
                        info!(plan = %plan.id, depth = %depth, "Liquidity condition met, firing");
                        let size = plan.remaining_size;
                        return if self.market_chunk(plan, run, size).await {
                            PlanState::Filled
                        } else {
                            run.reason.get_or_insert_with(|| "snipe order failed".to_string());
                            PlanState::PartiallyAborted
                        };
                    }
                    debug!(plan = %plan.id, depth = %depth, "Waiting for liquidity");
                }
                Err(e) => warn!(plan = %plan.id, error = %e, "Snipe book fetch failed"),
            }

            if Instant::now() + poll > deadline {
                run.reason = Some(format!("liquidity not met within {}s", plan.params.timeout_secs));
                return PlanState::PartiallyAborted;
            }
            if suspend(poll, cancel).await {
                run.reason = Some("cancelled".to_string());
                return PlanState::Cancelled;
            }
        }
    }

    // ===== Helpers =====

    /// Place one marketable chunk. Returns whether it succeeded.
    async fn market_chunk(&self, plan: &mut ExecutionPlan, run: &mut Run, size: Decimal) -> bool {
        let index = run.next_index();

        if let Some(max_slippage) = plan.params.max_slippage {
            if let Err(msg) = self.check_slippage(&plan.token_id, size, max_slippage).await {
                warn!(plan = %plan.id, chunk = index, reason = %msg, "Chunk skipped");
                self.push_chunk(plan, run, failed(index, size, &msg)).await;
                return false;
            }
        }

        let chunk = match self.client.place_order(&plan.token_id, size, OrderSide::Buy).await {
            Ok(resp) if resp.success => {
                plan.remaining_size -= size;
                ChunkResult {
                    index,
                    size,
                    success: true,
                    order_id: resp.order_id,
                    error: None,
                    at: Utc::now(),
                }
            }
            Ok(resp) => failed(index, size, &resp.error_msg),
            Err(e) => failed(index, size, &e.to_string()),
        };

        if chunk.success {
            info!(plan = %plan.id, chunk = index, size = %size, "Chunk executed");
        } else {
            warn!(plan = %plan.id, chunk = index, error = ?chunk.error, "Chunk failed");
        }

        let ok = chunk.success;
        self.push_chunk(plan, run, chunk).await;
        ok
    }

    async fn check_slippage(&self, token_id: &str, size: Decimal, max_slippage: Decimal) -> Result<(), String> {
        let book = self
            .client
            .get_order_book(token_id)
            .await
            .map_err(|e| format!("book fetch failed: {}", e))?;
        let best = book.best_ask().ok_or_else(|| "no asks".to_string())?;
        let (_, avg) = book
            .fill_for_usd(size)
            .ok_or_else(|| "insufficient depth".to_string())?;

        let limit = best * (Decimal::ONE + max_slippage);
        if avg > limit {
            return Err(format!("slippage: avg {} exceeds {}", avg.round_dp(4), limit.round_dp(4)));
        }
        Ok(())
    }

    async fn cancel_clip(&self, order_id: &str) {
        match self.client.cancel_order(order_id).await {
            Ok(true) => debug!(order = %order_id, "Resting clip cancelled"),
            Ok(false) => warn!(order = %order_id, "Venue refused clip cancel"),
            Err(e) => warn!(order = %order_id, error = %e, "Clip cancel failed"),
        }
    }

    async fn push_chunk(&self, plan: &ExecutionPlan, run: &mut Run, chunk: ChunkResult) {
        if let Some(sink) = &self.progress {
            if let Err(e) = sink.record_chunk(plan, &chunk).await {
                warn!(plan = %plan.id, error = %e, "Failed to persist chunk");
            }
        }
        run.chunks.push(chunk);
    }

    async fn persist_plan(&self, plan: &ExecutionPlan) {
        if let Some(sink) = &self.progress {
            if let Err(e) = sink.record_plan(plan).await {
                warn!(plan = %plan.id, error = %e, "Failed to persist plan state");
            }
        }
    }

    fn report(&self, plan: &ExecutionPlan, run: Run) -> ExecutionReport {
        ExecutionReport {
            plan_id: plan.id.clone(),
            strategy: plan.strategy,
            state: plan.state,
            executed_size: plan.executed_size(),
            remaining_size: plan.remaining_size,
            chunks: run.chunks,
            reason: run.reason,
        }
    }
}

fn failed(index: u32, size: Decimal, error: &str) -> ChunkResult {
    ChunkResult {
        index,
        size,
        success: false,
        order_id: None,
        error: Some(error.to_string()),
        at: Utc::now(),
    }
}

/// Split `total` into at most `n` chunks that differ by no more than a cent.
/// Never yields more chunks than `total` has whole cents, so no chunk is
/// zero; sub-cent dust rides on the last chunk.
fn split_equal(total: Decimal, n: u32) -> Vec<Decimal> {
    let cent = Decimal::new(1, 2);
    let whole_cents = (total / cent).floor().to_u32().unwrap_or(u32::MAX);
    let n = n.min(whole_cents).max(1);

    let base = (total / Decimal::from(n)).round_dp_with_strategy(2, RoundingStrategy::ToZero);
    let spare_cents = ((total - base * Decimal::from(n)) / cent).floor().to_usize().unwrap_or(0);

    let mut sizes: Vec<Decimal> = (0..n as usize)
        .map(|i| if i < spare_cents { base + cent } else { base })
        .collect();
    let allocated: Decimal = sizes.iter().copied().sum();
    if let Some(last) = sizes.last_mut() {
        *last += total - allocated;
    }
    sizes
}

/// `base` shifted by a uniform random offset in `[-max_jitter_ms, +max_jitter_ms]`.
fn jittered(base: Duration, max_jitter_ms: u64) -> Duration {
    if max_jitter_ms == 0 {
        return base;
    }
    let jitter = rand::thread_rng().gen_range(-(max_jitter_ms as i64)..=max_jitter_ms as i64);
    if jitter >= 0 {
        base + Duration::from_millis(jitter as u64)
    } else {
        base.saturating_sub(Duration::from_millis(jitter.unsigned_abs()))
    }
}

fn is_cancelled(cancel: &watch::Receiver<bool>) -> bool {
    *cancel.borrow()
}

/// Sleep for `duration` unless cancelled first. Returns true when cancelled.
async fn suspend(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    if is_cancelled(cancel) {
        return true;
    }
    let deadline = Instant::now() + duration;
    loop {
        tokio::select! {
            _ = sleep_until(deadline) => return is_cancelled(cancel),
            changed = cancel.changed() => match changed {
                Ok(()) => {
                    if *cancel.borrow_and_update() {
                        return true;
                    }
                }
                Err(_) => {
                    // Sender gone: nobody can cancel any more.
                    sleep_until(deadline).await;
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::api::OrderResponse;
    use crate::models::{BookLevel, OrderBook, Portfolio};
    use rust_decimal_macros::dec;

    #[derive(Debug, Clone)]
    enum Call {
        Market { size: Decimal, at: Instant },
        Limit { price: Decimal, shares: Decimal },
        Cancel(String),
    }

    /// Scripted client: records every call and replays canned answers.
    #[derive(Default)]
    struct ScriptedClient {
        calls: Mutex<Vec<Call>>,
        books: Mutex<VecDeque<OrderBook>>,
        statuses: Mutex<VecDeque<OrderState>>,
        fail_market_calls: Mutex<Vec<usize>>,
        market_calls: Mutex<usize>,
    }

    impl ScriptedClient {
        fn with_book(book: OrderBook) -> Self {
            let client = Self::default();
            client.books.lock().unwrap().push_back(book);
            client
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn market_sizes(&self) -> Vec<Decimal> {
            self.calls()
                .into_iter()
                .filter_map(|c| match c {
                    Call::Market { size, .. } => Some(size),
                    _ => None,
                })
                .collect()
        }
    }

    #[async_trait]
    impl MarketClient for ScriptedClient {
        fn venue(&self) -> &str {
            "scripted"
        }

        async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
            let mut books = self.books.lock().unwrap();
            let book = if books.len() > 1 { books.pop_front() } else { books.front().cloned() };
            book.ok_or_else(|| anyhow::anyhow!("no book for {}", token_id))
        }

        async fn place_order(&self, _token_id: &str, size_usd: Decimal, _side: OrderSide) -> Result<OrderResponse> {
            let n = {
                let mut count = self.market_calls.lock().unwrap();
                *count += 1;
                *count - 1
            };
            self.calls.lock().unwrap().push(Call::Market { size: size_usd, at: Instant::now() });
            if self.fail_market_calls.lock().unwrap().contains(&n) {
                return Ok(OrderResponse::rejected("venue error"));
            }
            Ok(OrderResponse {
                order_id: Some(format!("m{}", n)),
                success: true,
                status: Some("MATCHED".to_string()),
                ..Default::default()
            })
        }

        async fn place_limit_order(
            &self,
            _token_id: &str,
            price: Decimal,
            size_shares: Decimal,
            _side: OrderSide,
        ) -> Result<OrderResponse> {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Call::Limit { price, shares: size_shares });
            Ok(OrderResponse {
                order_id: Some(format!("l{}", calls.len())),
                success: true,
                status: Some("LIVE".to_string()),
                ..Default::default()
            })
        }

        async fn get_order_status(&self, _order_id: &str) -> Result<OrderState> {
            let mut statuses = self.statuses.lock().unwrap();
            Ok(statuses.pop_front().unwrap_or(OrderState::Open))
        }

        async fn cancel_order(&self, order_id: &str) -> Result<bool> {
            self.calls.lock().unwrap().push(Call::Cancel(order_id.to_string()));
            Ok(true)
        }

        async fn cancel_all_orders(&self) -> Result<bool> {
            Ok(true)
        }

        async fn get_portfolio(&self) -> Result<Portfolio> {
            Ok(Portfolio::default())
        }
    }

    fn deep_book() -> OrderBook {
        OrderBook::new("m:YES", vec![BookLevel::new(dec!(0.50), dec!(100000))], vec![])
    }

    fn scheduler(client: Arc<ScriptedClient>) -> OrderScheduler {
        OrderScheduler::new(client, ExecutionConfig::default())
    }

    fn params(strategy: ExecutionStrategy) -> ExecutionParams {
        ExecutionParams {
            strategy: Some(strategy),
            ..Default::default()
        }
    }

    #[test]
    fn test_large_single_routes_to_twap() {
        let s = scheduler(Arc::new(ScriptedClient::default()));
        assert_eq!(s.route(ExecutionStrategy::Single, dec!(1500)), ExecutionStrategy::Twap);
        assert_eq!(s.route(ExecutionStrategy::Single, dec!(1000)), ExecutionStrategy::Single);
        assert_eq!(s.route(ExecutionStrategy::Iceberg, dec!(5000)), ExecutionStrategy::Iceberg);

        let plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(2500), &ExecutionParams::default());
        assert_eq!(plan.strategy, ExecutionStrategy::Twap);
        assert!(plan.was_rerouted());
    }

    #[test]
    fn test_split_equal_sums_to_total() {
        assert_eq!(split_equal(dec!(1000), 5), vec![dec!(200); 5]);

        let uneven = split_equal(dec!(100), 3);
        assert_eq!(uneven, vec![dec!(33.34), dec!(33.33), dec!(33.33)]);
        assert_eq!(uneven.iter().sum::<Decimal>(), dec!(100));

        let spread = split_equal(dec!(0.08), 5);
        assert_eq!(spread, vec![dec!(0.02), dec!(0.02), dec!(0.02), dec!(0.01), dec!(0.01)]);
    }

    #[test]
    fn test_split_equal_never_yields_zero_chunks() {
        assert_eq!(split_equal(dec!(0.04), 5), vec![dec!(0.01); 4]);
        assert_eq!(split_equal(dec!(0.003), 5), vec![dec!(0.003)]);

        let dusty = split_equal(dec!(0.105), 5);
        assert_eq!(dusty.len(), 5);
        assert!(dusty.iter().all(|c| *c > Decimal::ZERO));
        assert_eq!(dusty.iter().sum::<Decimal>(), dec!(0.105));
    }

    #[tokio::test(start_paused = true)]
    async fn test_twap_below_chunk_count_in_cents_fills() {
        let client = Arc::new(ScriptedClient::with_book(deep_book()));
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(0.04), &params(ExecutionStrategy::Twap));
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::Filled);
        assert_eq!(client.market_sizes(), vec![dec!(0.01); 4]);
        assert_eq!(report.executed_size, dec!(0.04));
        assert_eq!(plan.remaining_size, Decimal::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_twap_five_equal_spaced_chunks() {
        let client = Arc::new(ScriptedClient::with_book(deep_book()));
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(1000), &params(ExecutionStrategy::Twap));
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::Filled);
        assert_eq!(client.market_sizes(), vec![dec!(200); 5]);
        assert_eq!(report.executed_size, dec!(1000));

        let times: Vec<Instant> = client
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Market { at, .. } => Some(at),
                _ => None,
            })
            .collect();
        for pair in times.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_secs(59), "gap {:?}", gap);
            assert!(gap <= Duration::from_secs(61), "gap {:?}", gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_twap_continues_past_failed_chunk() {
        let client = Arc::new(ScriptedClient::with_book(deep_book()));
        client.fail_market_calls.lock().unwrap().push(1);
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(1000), &params(ExecutionStrategy::Twap));
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(client.market_sizes().len(), 5);
        assert_eq!(report.state, PlanState::PartiallyAborted);
        assert_eq!(report.executed_size, dec!(800));
        assert_eq!(plan.remaining_size, dec!(200));
        assert_eq!(report.successful_chunks(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_twap_cancel_between_chunks() {
        let client = Arc::new(ScriptedClient::with_book(deep_book()));
        let s = scheduler(client.clone());
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(90)).await;
            let _ = tx.send(true);
        });

        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(1000), &params(ExecutionStrategy::Twap));
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::Cancelled);
        assert_eq!(client.market_sizes().len(), 2);
        assert_eq!(plan.remaining_size, dec!(600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_iceberg_aborts_on_unfilled_clip() {
        let client = Arc::new(ScriptedClient::with_book(deep_book()));
        client.statuses.lock().unwrap().push_back(OrderState::Filled);
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut p = params(ExecutionStrategy::Iceberg);
        p.display_size = Some(dec!(50));
        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(500), &p);
        let report = s.execute(&mut plan, &mut rx).await;

        // First clip fills, second never does.
        assert_eq!(report.state, PlanState::PartiallyAborted);
        assert_eq!(plan.remaining_size, dec!(450));
        assert_eq!(report.executed_size, dec!(50));

        let calls = client.calls();
        assert!(matches!(calls[0], Call::Limit { price, shares } if price == dec!(0.50) && shares == dec!(100)));
        assert!(matches!(calls.last(), Some(Call::Cancel(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_iceberg_fills_exactly_total() {
        let client = Arc::new(ScriptedClient::with_book(deep_book()));
        client.statuses.lock().unwrap().extend(vec![OrderState::Filled; 10]);
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut p = params(ExecutionStrategy::Iceberg);
        p.display_size = Some(dec!(70));
        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(500), &p);
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::Filled);
        assert_eq!(report.executed_size, dec!(500));
        assert_eq!(report.chunks.len(), 8);
        assert_eq!(report.chunks.last().map(|c| c.size), Some(dec!(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_iceberg_external_cancel_cancels_clip() {
        let client = Arc::new(ScriptedClient::with_book(deep_book()));
        let s = scheduler(client.clone());
        let (tx, mut rx) = watch::channel(false);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let _ = tx.send(true);
        });

        let mut p = params(ExecutionStrategy::Iceberg);
        p.display_size = Some(dec!(50));
        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(500), &p);
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::Cancelled);
        assert_eq!(plan.remaining_size, dec!(500));
        assert!(matches!(client.calls().last(), Some(Call::Cancel(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snipe_waits_for_depth() {
        let thin = OrderBook::new("m:YES", vec![BookLevel::new(dec!(0.40), dec!(100))], vec![]);
        let client = Arc::new(ScriptedClient::with_book(thin.clone()));
        {
            let mut books = client.books.lock().unwrap();
            books.push_back(thin);
            books.push_back(OrderBook::new("m:YES", vec![BookLevel::new(dec!(0.40), dec!(5000))], vec![]));
        }
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut p = params(ExecutionStrategy::LiquiditySnipe);
        p.min_depth = Some(dec!(1000));
        p.price_ceiling = Some(dec!(0.45));
        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(300), &p);
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::Filled);
        assert_eq!(client.market_sizes(), vec![dec!(300)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_snipe_times_out() {
        let expensive = OrderBook::new("m:YES", vec![BookLevel::new(dec!(0.70), dec!(100000))], vec![]);
        let client = Arc::new(ScriptedClient::with_book(expensive));
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut p = params(ExecutionStrategy::LiquiditySnipe);
        p.price_ceiling = Some(dec!(0.45));
        p.timeout_secs = Some(60);
        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(300), &p);

        let started = Instant::now();
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::PartiallyAborted);
        assert!(client.market_sizes().is_empty());
        assert!(Instant::now() - started <= Duration::from_secs(60));
        assert!(report.reason.unwrap().contains("60s"));
    }

    #[tokio::test]
    async fn test_max_slippage_fails_chunk() {
        let book = OrderBook::new(
            "m:YES",
            vec![BookLevel::new(dec!(0.50), dec!(20)), BookLevel::new(dec!(0.70), dec!(1000))],
            vec![],
        );
        let client = Arc::new(ScriptedClient::with_book(book));
        let s = scheduler(client.clone());
        let (_tx, mut rx) = watch::channel(false);

        let mut p = params(ExecutionStrategy::Single);
        p.max_slippage = Some(dec!(0.05));
        let mut plan = s.plan("sig", "m:YES", Side::BuyYes, dec!(100), &p);
        let report = s.execute(&mut plan, &mut rx).await;

        assert_eq!(report.state, PlanState::PartiallyAborted);
        assert!(client.market_sizes().is_empty());
        assert!(report.chunks[0].error.as_deref().unwrap_or("").starts_with("slippage"));
    }
}
