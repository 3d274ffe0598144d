//! Database persistence for signals, plans, risk configuration and the audit log.
//!
//! Stores everything needed to resume after restart:
//! - Trade signals and their status history
//! - Execution plans and per-chunk progress
//! - Exposure limits, factor limits and correlation edges
//! - Daily risk state per account
//! - The hash-chained audit log
//!
//! Money values are stored as TEXT so decimals round-trip exactly.

use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::models::{
    CorrelationEdge, DailyRiskState, ExecutionPlan, ExposureLimit, LimitScope, PlanParams, Side,
    SignalStatus, TradeSignal,
};
use crate::trading::{ChunkResult, ProgressSink};

/// Database connection pool.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

/// Stored signal row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSignal {
    pub id: String,
    pub account_id: String,
    pub market_id: String,
    pub question: String,
    pub category: String,
    pub side: String,
    pub price_estimate: String,
    pub proposed_size: String,
    pub rationale: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredSignal {
    pub fn into_signal(self) -> Result<TradeSignal> {
        Ok(TradeSignal {
            side: Side::from_str(&self.side)?,
            status: SignalStatus::from_str(&self.status)?,
            price_estimate: parse_decimal(&self.price_estimate, "price_estimate")?,
            proposed_size: parse_decimal(&self.proposed_size, "proposed_size")?,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
            account_id: self.account_id,
            market_id: self.market_id,
            question: self.question,
            category: self.category,
            rationale: self.rationale,
        })
    }
}

/// Stored execution plan row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredPlan {
    pub id: String,
    pub signal_id: String,
    pub token_id: String,
    pub strategy: String,
    pub requested_strategy: String,
    pub params: String,
    pub total_size: String,
    pub remaining_size: String,
    pub state: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredPlan {
    pub fn params(&self) -> Result<PlanParams> {
        serde_json::from_str(&self.params).context("Invalid stored plan params")
    }
}

/// Stored execution chunk row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredChunk {
    pub id: i64,
    pub plan_id: String,
    pub chunk_index: i64,
    pub size: String,
    pub success: bool,
    pub order_id: Option<String>,
    pub error: Option<String>,
    pub executed_at: String,
}

/// Stored audit log row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredAuditRecord {
    pub id: i64,
    pub timestamp: String,
    pub event_type: String,
    pub payload: String,
    pub previous_hash: String,
    pub record_hash: String,
}

/// Audit row to insert; built once the previous hash is known.
#[derive(Debug, Clone)]
pub struct NewAuditRecord {
    pub timestamp: String,
    pub event_type: String,
    pub payload: String,
    pub previous_hash: String,
    pub record_hash: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StoredLimit {
    id: i64,
    scope: String,
    scope_value: String,
    max_usd: String,
    active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StoredDailyState {
    account_id: String,
    day: String,
    starting_balance: String,
    current_pnl: String,
    max_drawdown_pct: String,
    paused: bool,
    pause_reason: Option<String>,
    updated_at: String,
}

impl StoredDailyState {
    fn into_state(self) -> Result<DailyRiskState> {
        Ok(DailyRiskState {
            day: NaiveDate::parse_from_str(&self.day, "%Y-%m-%d")
                .with_context(|| format!("Invalid stored day {}", self.day))?,
            starting_balance: parse_decimal(&self.starting_balance, "starting_balance")?,
            current_pnl: parse_decimal(&self.current_pnl, "current_pnl")?,
            max_drawdown_pct: parse_decimal(&self.max_drawdown_pct, "max_drawdown_pct")?,
            updated_at: parse_ts(&self.updated_at)?,
            account_id: self.account_id,
            paused: self.paused,
            pause_reason: self.pause_reason,
        })
    }
}

fn parse_decimal(s: &str, field: &str) -> Result<Decimal> {
    Decimal::from_str(s).with_context(|| format!("Invalid stored {}: {}", field, s))
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("Invalid stored timestamp {}", s))?
        .with_timezone(&Utc))
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Private in-memory database; one connection that never expires.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run all database migrations.
    async fn run_migrations(&self) -> Result<()> {
        // Trade signals
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trade_signals (
                id TEXT PRIMARY KEY,
                account_id TEXT NOT NULL,
                market_id TEXT NOT NULL,
                question TEXT NOT NULL,
                category TEXT NOT NULL,
                side TEXT NOT NULL,
                price_estimate TEXT NOT NULL,
                proposed_size TEXT NOT NULL,
                rationale TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Execution plans
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_plans (
                id TEXT PRIMARY KEY,
                signal_id TEXT NOT NULL,
                token_id TEXT NOT NULL,
                strategy TEXT NOT NULL,
                requested_strategy TEXT NOT NULL,
                params TEXT NOT NULL,
                total_size TEXT NOT NULL,
                remaining_size TEXT NOT NULL,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Per-chunk execution progress
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS execution_chunks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                plan_id TEXT NOT NULL,
                chunk_index INTEGER NOT NULL,
                size TEXT NOT NULL,
                success INTEGER NOT NULL,
                order_id TEXT,
                error TEXT,
                executed_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Scoped exposure caps
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS exposure_limits (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scope TEXT NOT NULL,
                scope_value TEXT NOT NULL,
                max_usd TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                UNIQUE(scope, scope_value)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Factor correlation edges (factor_a < factor_b)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS correlation_edges (
                factor_a TEXT NOT NULL,
                factor_b TEXT NOT NULL,
                coefficient REAL NOT NULL,
                PRIMARY KEY (factor_a, factor_b)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Per-factor exposure limits
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS factor_limits (
                factor TEXT PRIMARY KEY,
                max_usd TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Daily risk state, one row per account per UTC day
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_risk_state (
                account_id TEXT NOT NULL,
                day TEXT NOT NULL,
                starting_balance TEXT NOT NULL,
                current_pnl TEXT NOT NULL,
                max_drawdown_pct TEXT NOT NULL,
                paused INTEGER NOT NULL DEFAULT 0,
                pause_reason TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (account_id, day)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Append-only audit chain
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS audit_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp TEXT NOT NULL,
                event_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                previous_hash TEXT NOT NULL,
                record_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_signals_created ON trade_signals(created_at)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_chunks_plan ON execution_chunks(plan_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Signals ====================

    /// Insert or update a signal.
    pub async fn save_signal(&self, signal: &TradeSignal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO trade_signals (
                id, account_id, market_id, question, category, side,
                price_estimate, proposed_size, rationale, status, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                side = excluded.side,
                price_estimate = excluded.price_estimate,
                proposed_size = excluded.proposed_size,
                rationale = excluded.rationale,
                status = excluded.status,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&signal.id)
        .bind(&signal.account_id)
        .bind(&signal.market_id)
        .bind(&signal.question)
        .bind(&signal.category)
        .bind(signal.side.as_str())
        .bind(signal.price_estimate.to_string())
        .bind(signal.proposed_size.to_string())
        .bind(&signal.rationale)
        .bind(signal.status.as_str())
        .bind(signal.created_at.to_rfc3339())
        .bind(signal.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save signal")?;

        Ok(())
    }

    #[cfg(test)]
    pub async fn get_signal(&self, id: &str) -> Result<Option<TradeSignal>> {
        sqlx::query_as::<_, StoredSignal>("SELECT * FROM trade_signals WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(StoredSignal::into_signal)
            .transpose()
    }

    /// Most recent signals, newest first.
    pub async fn recent_signals(&self, limit: i64) -> Result<Vec<TradeSignal>> {
        sqlx::query_as::<_, StoredSignal>(
            "SELECT * FROM trade_signals ORDER BY created_at DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(StoredSignal::into_signal)
        .collect()
    }

    // ==================== Execution Plans ====================

    /// Insert or update a plan's progress.
    pub async fn save_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        let params = serde_json::to_string(&plan.params)?;

        sqlx::query(
            r#"
            INSERT INTO execution_plans (
                id, signal_id, token_id, strategy, requested_strategy, params,
                total_size, remaining_size, state, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                remaining_size = excluded.remaining_size,
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&plan.id)
        .bind(&plan.signal_id)
        .bind(&plan.token_id)
        .bind(plan.strategy.as_str())
        .bind(plan.requested_strategy.as_str())
        .bind(params)
        .bind(plan.total_size.to_string())
        .bind(plan.remaining_size.to_string())
        .bind(plan.state.as_str())
        .bind(plan.created_at.to_rfc3339())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save plan")?;

        Ok(())
    }

    pub async fn get_plan(&self, id: &str) -> Result<Option<StoredPlan>> {
        sqlx::query_as::<_, StoredPlan>("SELECT * FROM execution_plans WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load plan")
    }

    pub async fn save_chunk(&self, plan_id: &str, chunk: &ChunkResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO execution_chunks (plan_id, chunk_index, size, success, order_id, error, executed_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(plan_id)
        .bind(chunk.index as i64)
        .bind(chunk.size.to_string())
        .bind(chunk.success)
        .bind(&chunk.order_id)
        .bind(&chunk.error)
        .bind(chunk.at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save chunk")?;

        Ok(())
    }

    pub async fn get_plan_chunks(&self, plan_id: &str) -> Result<Vec<StoredChunk>> {
        sqlx::query_as::<_, StoredChunk>(
            "SELECT * FROM execution_chunks WHERE plan_id = ? ORDER BY id",
        )
        .bind(plan_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load chunks")
    }

    // ==================== Exposure Limits ====================

    /// Insert a limit, replacing any existing one for the same scope and value.
    pub async fn save_exposure_limit(&self, limit: &ExposureLimit) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO exposure_limits (scope, scope_value, max_usd, active)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(scope, scope_value) DO UPDATE SET
                max_usd = excluded.max_usd,
                active = excluded.active
            RETURNING id
            "#,
        )
        .bind(limit.scope.as_str())
        .bind(&limit.scope_value)
        .bind(limit.max_usd.to_string())
        .bind(limit.active)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save exposure limit")?;

        Ok(sqlx::Row::get(&row, "id"))
    }

    pub async fn list_exposure_limits(&self) -> Result<Vec<ExposureLimit>> {
        sqlx::query_as::<_, StoredLimit>(
            "SELECT id, scope, scope_value, max_usd, active FROM exposure_limits ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|row| -> Result<ExposureLimit> {
            Ok(ExposureLimit {
                id: Some(row.id),
                scope: LimitScope::from_str(&row.scope)?,
                max_usd: parse_decimal(&row.max_usd, "max_usd")?,
                scope_value: row.scope_value,
                active: row.active,
            })
        })
        .collect()
    }

    /// Returns false when no such limit exists.
    pub async fn set_limit_active(&self, id: i64, active: bool) -> Result<bool> {
        let result = sqlx::query("UPDATE exposure_limits SET active = ? WHERE id = ?")
            .bind(active)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    // ==================== Factors ====================

    pub async fn save_correlation(&self, edge: &CorrelationEdge) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO correlation_edges (factor_a, factor_b, coefficient)
            VALUES (?, ?, ?)
            ON CONFLICT(factor_a, factor_b) DO UPDATE SET coefficient = excluded.coefficient
            "#,
        )
        .bind(&edge.factor_a)
        .bind(&edge.factor_b)
        .bind(edge.coefficient)
        .execute(&self.pool)
        .await
        .context("Failed to save correlation")?;

        Ok(())
    }

    pub async fn list_correlations(&self) -> Result<Vec<CorrelationEdge>> {
        let rows: Vec<(String, String, f64)> = sqlx::query_as(
            "SELECT factor_a, factor_b, coefficient FROM correlation_edges ORDER BY factor_a, factor_b",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(a, b, c)| {
                CorrelationEdge::new(a.clone(), b.clone(), c)
                    .ok_or_else(|| anyhow!("Invalid stored correlation {} / {} = {}", a, b, c))
            })
            .collect()
    }

    pub async fn save_factor_limit(&self, factor: &str, max_usd: Decimal) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO factor_limits (factor, max_usd) VALUES (?, ?)
            ON CONFLICT(factor) DO UPDATE SET max_usd = excluded.max_usd
            "#,
        )
        .bind(factor)
        .bind(max_usd.to_string())
        .execute(&self.pool)
        .await
        .context("Failed to save factor limit")?;

        Ok(())
    }

    pub async fn list_factor_limits(&self) -> Result<Vec<(String, Decimal)>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT factor, max_usd FROM factor_limits ORDER BY factor")
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter()
            .map(|(factor, max)| -> Result<(String, Decimal)> {
                Ok((factor, parse_decimal(&max, "factor max_usd")?))
            })
            .collect()
    }

    // ==================== Daily Risk State ====================

    pub async fn get_daily_state(&self, account_id: &str, day: NaiveDate) -> Result<Option<DailyRiskState>> {
        sqlx::query_as::<_, StoredDailyState>(
            "SELECT * FROM daily_risk_state WHERE account_id = ? AND day = ?",
        )
        .bind(account_id)
        .bind(day.format("%Y-%m-%d").to_string())
        .fetch_optional(&self.pool)
        .await?
        .map(StoredDailyState::into_state)
        .transpose()
    }

    /// Most recent day's state for an account.
    #[cfg(test)]
    pub async fn latest_daily_state(&self, account_id: &str) -> Result<Option<DailyRiskState>> {
        sqlx::query_as::<_, StoredDailyState>(
            "SELECT * FROM daily_risk_state WHERE account_id = ? ORDER BY day DESC LIMIT 1",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredDailyState::into_state)
        .transpose()
    }

    pub async fn save_daily_state(&self, state: &DailyRiskState) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_risk_state (
                account_id, day, starting_balance, current_pnl, max_drawdown_pct,
                paused, pause_reason, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(account_id, day) DO UPDATE SET
                starting_balance = excluded.starting_balance,
                current_pnl = excluded.current_pnl,
                max_drawdown_pct = excluded.max_drawdown_pct,
                paused = excluded.paused,
                pause_reason = excluded.pause_reason,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&state.account_id)
        .bind(state.day.format("%Y-%m-%d").to_string())
        .bind(state.starting_balance.to_string())
        .bind(state.current_pnl.to_string())
        .bind(state.max_drawdown_pct.to_string())
        .bind(state.paused)
        .bind(&state.pause_reason)
        .bind(state.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save daily risk state")?;

        Ok(())
    }

    // ==================== Audit Log ====================

    /// Append an audit record. `build` receives the current head hash (or
    /// `None` for an empty chain); the read and the insert share one
    /// transaction.
    pub async fn append_audit<F>(&self, build: F) -> Result<StoredAuditRecord>
    where
        F: FnOnce(Option<&str>) -> NewAuditRecord,
    {
        let mut tx = self.pool.begin().await.context("Failed to begin audit transaction")?;

        let head: Option<(String,)> =
            sqlx::query_as("SELECT record_hash FROM audit_log ORDER BY id DESC LIMIT 1")
                .fetch_optional(&mut *tx)
                .await?;

        let record = build(head.as_ref().map(|(h,)| h.as_str()));

        let row = sqlx::query(
            r#"
            INSERT INTO audit_log (timestamp, event_type, payload, previous_hash, record_hash)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&record.timestamp)
        .bind(&record.event_type)
        .bind(&record.payload)
        .bind(&record.previous_hash)
        .bind(&record.record_hash)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to insert audit record")?;

        tx.commit().await.context("Failed to commit audit record")?;

        Ok(StoredAuditRecord {
            id: sqlx::Row::get(&row, "id"),
            timestamp: record.timestamp,
            event_type: record.event_type,
            payload: record.payload,
            previous_hash: record.previous_hash,
            record_hash: record.record_hash,
        })
    }

    /// Whole chain, oldest first.
    pub async fn audit_records(&self) -> Result<Vec<StoredAuditRecord>> {
        sqlx::query_as::<_, StoredAuditRecord>("SELECT * FROM audit_log ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to load audit log")
    }

    /// Last `n` records, oldest first.
    pub async fn audit_tail(&self, n: i64) -> Result<Vec<StoredAuditRecord>> {
        let mut rows = sqlx::query_as::<_, StoredAuditRecord>(
            "SELECT * FROM audit_log ORDER BY id DESC LIMIT ?",
        )
        .bind(n)
        .fetch_all(&self.pool)
        .await
        .context("Failed to load audit tail")?;

        rows.reverse();
        Ok(rows)
    }
}

#[async_trait]
impl ProgressSink for Database {
    async fn record_chunk(&self, plan: &ExecutionPlan, chunk: &ChunkResult) -> Result<()> {
        self.save_chunk(&plan.id, chunk).await?;
        self.save_plan(plan).await
    }

    async fn record_plan(&self, plan: &ExecutionPlan) -> Result<()> {
        self.save_plan(plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_signal_round_trip() {
        let db = Database::in_memory().await.unwrap();
        let mut signal = TradeSignal::new(
            "acct", "0xm", "Fed cut?", "macro", Side::BuyNo, dec!(0.35), dec!(120.50), "edge",
        );
        db.save_signal(&signal).await.unwrap();

        signal.reject("factor limit").unwrap();
        db.save_signal(&signal).await.unwrap();

        let loaded = db.get_signal(&signal.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, SignalStatus::Rejected);
        assert_eq!(loaded.proposed_size, dec!(120.50));
        assert_eq!(loaded.side, Side::BuyNo);
        assert!(loaded.rationale.ends_with("factor limit"));
        assert_eq!(db.recent_signals(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_exposure_limit_upsert_and_disable() {
        let db = Database::in_memory().await.unwrap();
        let id = db
            .save_exposure_limit(&ExposureLimit::new(LimitScope::CategoryCap, "politics", dec!(500)))
            .await
            .unwrap();
        let same = db
            .save_exposure_limit(&ExposureLimit::new(LimitScope::CategoryCap, "politics", dec!(800)))
            .await
            .unwrap();
        assert_eq!(id, same);

        assert!(db.set_limit_active(id, false).await.unwrap());
        assert!(!db.set_limit_active(999, false).await.unwrap());

        let limits = db.list_exposure_limits().await.unwrap();
        assert_eq!(limits.len(), 1);
        assert_eq!(limits[0].max_usd, dec!(800));
        assert!(!limits[0].active);
    }

    #[tokio::test]
    async fn test_daily_state_is_per_day() {
        let db = Database::in_memory().await.unwrap();
        let d1 = NaiveDate::from_ymd_opt(2026, 10, 15).unwrap();
        let d2 = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let mut state = DailyRiskState::new("acct", d1, dec!(1000));
        state.paused = true;
        db.save_daily_state(&state).await.unwrap();
        db.save_daily_state(&DailyRiskState::new("acct", d2, dec!(900))).await.unwrap();

        assert!(db.get_daily_state("acct", d1).await.unwrap().unwrap().paused);
        let latest = db.latest_daily_state("acct").await.unwrap().unwrap();
        assert_eq!(latest.day, d2);
        assert!(!latest.paused);
    }

    #[tokio::test]
    async fn test_correlations_and_factor_limits() {
        let db = Database::in_memory().await.unwrap();
        let edge = CorrelationEdge::new("Politics.Trump", "Macro.Rates", 0.7).unwrap();
        db.save_correlation(&edge).await.unwrap();
        db.save_correlation(&CorrelationEdge::new("Macro.Rates", "Politics.Trump", 0.8).unwrap())
            .await
            .unwrap();
        db.save_factor_limit("Politics.Trump", dec!(1000)).await.unwrap();

        let edges = db.list_correlations().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].coefficient, 0.8);
        assert_eq!(
            db.list_factor_limits().await.unwrap(),
            vec![("Politics.Trump".to_string(), dec!(1000))]
        );
    }
}
