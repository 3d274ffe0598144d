//! Polyrisk: slippage-aware sizing, risk gating and scheduled execution
//! for prediction-market trades.
//!
//! Takes a model probability for a market, sizes the trade against live
//! depth, runs it through the risk gate and works the order into the book,
//! recording every decision on a hash-chained audit log.

mod api;
mod audit;
mod config;
mod db;
mod error;
mod lifecycle;
mod models;
mod risk;
mod trading;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::api::{MarketClient, PaperClient, PaperConfig, RestClient};
use crate::audit::{events, AuditChain};
use crate::config::AppConfig;
use crate::db::Database;
use crate::lifecycle::{TradeLifecycleController, TradeProposal};
use crate::models::{
    BookLevel, CorrelationEdge, ExecutionParams, ExecutionStrategy, ExposureLimit, LimitScope,
    OrderBook, Side,
};
use crate::risk::{factors, DrawdownBreaker, RiskConfigStore, RiskGate};
use crate::trading::{OrderScheduler, PositionSizer};

/// Prediction-market sizing, risk and execution CLI.
#[derive(Parser)]
#[command(name = "polyrisk")]
#[command(about = "Size, risk-check and execute probability-market trades", long_about = None)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long, env = "POLYRISK_CONFIG")]
    config: Option<PathBuf>,

    /// Database URL (overrides configuration)
    #[arg(short, long)]
    database: Option<String>,

    /// Account id (overrides configuration)
    #[arg(short, long)]
    account: Option<String>,

    /// Actor recorded on audited configuration changes
    #[arg(long, default_value = "cli")]
    actor: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG wins when set
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

/// Venue selection. `--paper` simulates fills against books given on the
/// command line.
#[derive(Args, Clone)]
struct VenueArgs {
    /// Use the paper venue instead of the live REST client
    #[arg(long)]
    paper: bool,

    /// Paper YES asks as "price:shares,price:shares"
    #[arg(long)]
    yes_asks: Option<String>,

    /// Paper NO asks as "price:shares,price:shares"
    #[arg(long)]
    no_asks: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Size a trade against the current book without placing it
    Size {
        market_id: String,

        /// Probability that YES resolves true
        #[arg(short, long)]
        probability: Decimal,

        /// YES or NO
        #[arg(short, long, default_value = "YES")]
        side: Side,

        /// Bankroll in USD (defaults to venue cash balance)
        #[arg(short, long)]
        bankroll: Option<Decimal>,

        #[command(flatten)]
        venue: VenueArgs,
    },

    /// Run the full lifecycle for one proposed trade
    Propose {
        market_id: String,

        /// Market question, used for factor classification
        #[arg(short, long)]
        question: String,

        /// Market category, used for category caps
        #[arg(short, long, default_value = "general")]
        category: String,

        /// Probability that YES resolves true
        #[arg(short, long)]
        probability: Decimal,

        /// Free-text rationale from the forecaster
        #[arg(short, long, default_value = "")]
        rationale: String,

        /// SINGLE, TWAP, ICEBERG or LIQUIDITY_SNIPE
        #[arg(long)]
        strategy: Option<ExecutionStrategy>,

        /// TWAP duration in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// TWAP chunk count
        #[arg(long)]
        chunks: Option<u32>,

        /// Iceberg/snipe poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,

        /// Iceberg clip size in USD
        #[arg(long)]
        display_size: Option<Decimal>,

        /// Snipe minimum depth in USD
        #[arg(long)]
        min_depth: Option<Decimal>,

        /// Snipe depth levels
        #[arg(long)]
        depth_levels: Option<usize>,

        /// Limit price for iceberg clips / ceiling for snipes
        #[arg(long)]
        price_ceiling: Option<Decimal>,

        /// Max fill slippage over best ask for market orders (fraction)
        #[arg(long)]
        max_slippage: Option<Decimal>,

        /// Snipe timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        #[command(flatten)]
        venue: VenueArgs,
    },

    /// Scoped exposure limits
    Limits {
        #[command(subcommand)]
        action: LimitAction,
    },

    /// Factor correlation edges
    Correlation {
        #[command(subcommand)]
        action: CorrelationAction,
    },

    /// Per-factor exposure limits
    FactorLimit {
        #[command(subcommand)]
        action: FactorLimitAction,
    },

    /// Daily drawdown breaker
    Risk {
        #[command(subcommand)]
        action: RiskAction,
    },

    /// Hash-chained audit log
    Audit {
        #[command(subcommand)]
        action: AuditAction,
    },

    /// List recent trade signals
    Signals {
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Show an execution plan and its chunk history
    Plan {
        /// Plan ID (from the PLAN_CREATED audit record)
        id: String,
    },

    /// Show effective configuration
    Config,
}

#[derive(Subcommand)]
enum LimitAction {
    /// Add or replace a limit
    Add {
        /// PER_MARKET_CAP, CATEGORY_CAP or EXCHANGE_CAP
        scope: LimitScope,
        /// Market id, category or venue; "*" for any
        value: String,
        max_usd: Decimal,
    },
    List,
    Disable { id: i64 },
    Enable { id: i64 },
}

#[derive(Subcommand)]
enum CorrelationAction {
    Set {
        factor_a: String,
        factor_b: String,
        #[arg(allow_hyphen_values = true)]
        coefficient: f64,
    },
    List,
}

#[derive(Subcommand)]
enum FactorLimitAction {
    Set { factor: String, max_usd: Decimal },
    /// Known factors with their effective limits
    List,
}

#[derive(Subcommand)]
enum RiskAction {
    /// Today's drawdown state
    Status,
    /// Record today's P&L from an external source
    RecordPnl {
        #[arg(allow_hyphen_values = true)]
        pnl: Decimal,
    },
    /// Lift today's pause (requires allow_manual_resume)
    Resume {
        #[command(flatten)]
        venue: VenueArgs,
    },
}

#[derive(Subcommand)]
enum AuditAction {
    Verify,
    Tail {
        #[arg(short, default_value = "10")]
        n: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.to_lowercase()));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(url) = &cli.database {
        config.database_url = url.clone();
    }
    if let Some(account) = &cli.account {
        config.account_id = account.clone();
    }

    let db = Database::new(&config.database_url).await?;

    match cli.command {
        Commands::Size {
            market_id,
            probability,
            side,
            bankroll,
            venue,
        } => {
            let (client, _) = build_client(&config, &venue, &market_id, "", "").await?;
            let token = side.token_id(&market_id);
            let book = client.get_order_book(&token).await?;
            let bankroll = match bankroll {
                Some(b) => b,
                None => client.get_portfolio().await?.balance,
            };

            let sizer = PositionSizer::new(config.sizer.clone());
            let win_p = side.win_probability(probability);
            let allocation = sizer.allocate(win_p, &book, bankroll);

            println!("\n=== Allocation: {} {} ===", market_id, side.outcome());
            println!("Probability:      {}", win_p);
            println!("Best Ask:         {}", book.best_ask().map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()));
            println!("Bankroll:         ${:.2}", bankroll);
            println!("Bankroll Cap:     {}%", config.sizer.max_bankroll_fraction * Decimal::from(100));
            if allocation.is_zero() {
                println!("\nNo positive edge at available depth.");
            } else {
                println!("Size:             ${:.2}", allocation.size_usd);
                println!("Shares:           {}", allocation.shares);
                println!("Avg Fill:         {:.4}", allocation.fill_price);
                if let Some(kelly) = PositionSizer::kelly(win_p, allocation.fill_price) {
                    println!("Kelly at Fill:    {:.2}%", kelly * Decimal::from(100));
                }
            }
        }

        Commands::Propose {
            market_id,
            question,
            category,
            probability,
            rationale,
            strategy,
            duration,
            chunks,
            interval,
            display_size,
            min_depth,
            depth_levels,
            price_ceiling,
            max_slippage,
            timeout,
            venue,
        } => {
            let (client, paper) = build_client(&config, &venue, &market_id, &question, &category).await?;
            let controller = build_controller(&config, &db, client).await?;

            let proposal = TradeProposal {
                market_id,
                question,
                category,
                probability,
                rationale,
                params: ExecutionParams {
                    strategy,
                    duration_secs: duration,
                    chunks,
                    interval_secs: interval,
                    display_size,
                    min_depth,
                    depth_levels,
                    price_ceiling,
                    max_slippage,
                    timeout_secs: timeout,
                },
            };

            let (cancel_tx, cancel_rx) = watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Ctrl+C received, cancelling at the next suspension point");
                    let _ = cancel_tx.send(true);
                }
            });

            let signal = controller
                .propose_and_execute(&config.account_id, &proposal, cancel_rx)
                .await?;

            println!("\n=== Trade Signal {} ===", signal.id);
            println!("Market:      {}", signal.market_id);
            println!("Side:        {}", signal.side.as_str());
            println!("Size:        ${:.2}", signal.proposed_size);
            println!("Est. Price:  {:.4}", signal.price_estimate);
            println!("Status:      {}", signal.status);
            println!("Rationale:   {}", signal.rationale);

            if let Some(paper) = paper {
                let fills = paper.fills().await;
                if !fills.is_empty() {
                    println!("\n{:<36} {:<24} {:>12} {:>10} {:>8} {}", "ORDER", "TOKEN", "SHARES", "COST", "FEE", "AT");
                    println!("{}", "-".repeat(110));
                    for f in fills {
                        println!(
                            "{:<36} {:<24} {:>12.2} {:>10.2} {:>8.4} {}",
                            f.order_id,
                            truncate(&f.token_id, 22),
                            f.shares,
                            f.cost,
                            f.fee,
                            f.at.format("%H:%M:%S%.3f")
                        );
                    }
                }
                println!("{}", paper.stats().await);
            }
        }

        Commands::Limits { action } => {
            let store = RiskConfigStore::load(db.clone()).await?;
            let audit = AuditChain::new(db.clone());
            match action {
                LimitAction::Add { scope, value, max_usd } => {
                    let id = store.add_limit(ExposureLimit::new(scope, &value, max_usd)).await?;
                    audit
                        .append(
                            events::RISK_CONFIG_CHANGED,
                            &json!({ "change": "limit_set", "id": id, "scope": scope.as_str(), "value": value, "max_usd": max_usd.to_string() }),
                            Some(&cli.actor),
                        )
                        .await?;
                    println!("Limit {} set: {} {} ${}", id, scope, value, max_usd);
                }
                LimitAction::List => {
                    let snapshot = store.snapshot().await;
                    if snapshot.exposure_limits.is_empty() {
                        println!("No exposure limits configured. Use 'polyrisk limits add' to add one.");
                        return Ok(());
                    }
                    println!("\n{:>4} {:<16} {:<24} {:>12} {:>8}", "ID", "SCOPE", "VALUE", "MAX USD", "ACTIVE");
                    println!("{}", "-".repeat(68));
                    for l in &snapshot.exposure_limits {
                        println!(
                            "{:>4} {:<16} {:<24} {:>12} {:>8}",
                            l.id.unwrap_or_default(),
                            l.scope.as_str(),
                            truncate(&l.scope_value, 22),
                            l.max_usd,
                            if l.active { "yes" } else { "no" }
                        );
                    }
                }
                LimitAction::Disable { id } => set_limit_active(&store, &audit, id, false, &cli.actor).await?,
                LimitAction::Enable { id } => set_limit_active(&store, &audit, id, true, &cli.actor).await?,
            }
        }

        Commands::Correlation { action } => {
            let store = RiskConfigStore::load(db.clone()).await?;
            match action {
                CorrelationAction::Set {
                    factor_a,
                    factor_b,
                    coefficient,
                } => {
                    let edge = CorrelationEdge::new(&factor_a, &factor_b, coefficient)
                        .ok_or_else(|| anyhow!("Correlation must link two distinct factors with a coefficient in [-1, 1]"))?;
                    store.set_correlation(edge.clone()).await?;
                    AuditChain::new(db.clone())
                        .append(
                            events::RISK_CONFIG_CHANGED,
                            &json!({ "change": "correlation_set", "factor_a": edge.factor_a, "factor_b": edge.factor_b, "coefficient": edge.coefficient }),
                            Some(&cli.actor),
                        )
                        .await?;
                    println!("Correlation {} <-> {} = {:.2}", edge.factor_a, edge.factor_b, edge.coefficient);
                }
                CorrelationAction::List => {
                    let snapshot = store.snapshot().await;
                    println!("\n{:<28} {:<28} {:>6}", "FACTOR A", "FACTOR B", "RHO");
                    println!("{}", "-".repeat(64));
                    for e in &snapshot.correlations {
                        println!("{:<28} {:<28} {:>6.2}", e.factor_a, e.factor_b, e.coefficient);
                    }
                }
            }
        }

        Commands::FactorLimit { action } => {
            let store = RiskConfigStore::load(db.clone()).await?;
            match action {
                FactorLimitAction::Set { factor, max_usd } => {
                    if !factors::known_factors().contains(&factor.as_str()) {
                        warn!(factor = %factor, "Factor is not produced by the classifier");
                    }
                    store.set_factor_limit(&factor, max_usd).await?;
                    AuditChain::new(db.clone())
                        .append(
                            events::RISK_CONFIG_CHANGED,
                            &json!({ "change": "factor_limit_set", "factor": factor, "max_usd": max_usd.to_string() }),
                            Some(&cli.actor),
                        )
                        .await?;
                    println!("Factor limit {} = ${}", factor, max_usd);
                }
                FactorLimitAction::List => {
                    let snapshot = store.snapshot().await;
                    println!("\n{:<28} {:>12}", "FACTOR", "LIMIT USD");
                    println!("{}", "-".repeat(41));
                    for factor in factors::known_factors() {
                        let limit = snapshot.factor_limit(factor, config.risk.default_factor_limit);
                        let marker = if snapshot.factor_limits.contains_key(factor) { "" } else { " (default)" };
                        println!("{:<28} {:>12}{}", factor, limit, marker);
                    }
                }
            }
        }

        Commands::Risk { action } => match action {
            RiskAction::Status => {
                let breaker = breaker(&config, &db);
                match breaker.status(&config.account_id, Utc::now()).await? {
                    None => println!("No risk state for {} today. It opens on the first trade check.", config.account_id),
                    Some(s) => {
                        println!("\n=== Daily Risk: {} ({}) ===", s.account_id, s.day);
                        println!("Starting Balance: ${:.2}", s.starting_balance);
                        println!("Current P&L:      ${:.2}", s.current_pnl);
                        println!("Drawdown:         {:.2}%", s.drawdown_pct());
                        println!("Max Drawdown:     {:.2}%", s.max_drawdown_pct);
                        println!("Limit:            {}%", config.risk.max_daily_drawdown_pct);
                        println!("Paused:           {}", if s.paused { "YES" } else { "no" });
                        if let Some(reason) = &s.pause_reason {
                            println!("Reason:           {}", reason);
                        }
                    }
                }
            }
            RiskAction::RecordPnl { pnl } => {
                let state = breaker(&config, &db).record_pnl(&config.account_id, pnl, Utc::now()).await?;
                println!(
                    "Recorded P&L ${:.2}: drawdown {:.2}%{}",
                    pnl,
                    state.drawdown_pct(),
                    if state.paused { " (PAUSED)" } else { "" }
                );
            }
            RiskAction::Resume { venue } => {
                let (client, _) = build_client(&config, &venue, "", "", "").await?;
                let controller = build_controller(&config, &db, client).await?;
                let state = controller.resume_trading(&config.account_id, &cli.actor).await?;
                println!(
                    "Trading resumed for {} on {}; starting balance rebased to ${:.2}",
                    state.account_id, state.day, state.starting_balance
                );
            }
        },

        Commands::Audit { action } => {
            let audit = AuditChain::new(db.clone());
            match action {
                AuditAction::Verify => {
                    let result = audit.verify().await?;
                    println!("{}", result);
                    if !result.is_intact() {
                        std::process::exit(2);
                    }
                }
                AuditAction::Tail { n } => {
                    for r in audit.tail(n).await? {
                        println!(
                            "#{:<6} {} {:<20} {}.. {}",
                            r.id,
                            r.timestamp,
                            r.event_type,
                            short_hash(&r.record_hash),
                            truncate(&r.payload, 80)
                        );
                    }
                }
            }
        }

        Commands::Signals { limit } => {
            let signals = db.recent_signals(limit).await?;
            if signals.is_empty() {
                println!("No trade signals yet. Use 'polyrisk propose' to create one.");
                return Ok(());
            }
            println!(
                "\n{:<36} {:<20} {:<8} {:>10} {:<9} {}",
                "ID", "MARKET", "SIDE", "SIZE", "STATUS", "RATIONALE"
            );
            println!("{}", "-".repeat(120));
            for s in signals {
                println!(
                    "{:<36} {:<20} {:<8} {:>10.2} {:<9} {}",
                    s.id,
                    truncate(&s.market_id, 18),
                    s.side.as_str(),
                    s.proposed_size,
                    s.status.as_str(),
                    truncate(&s.rationale, 60)
                );
            }
        }

        Commands::Plan { id } => {
            let plan = db
                .get_plan(&id)
                .await?
                .ok_or_else(|| anyhow!("No execution plan with id {}", id))?;
            let params = plan.params()?;

            println!("\n=== Plan {} ===", plan.id);
            println!("Signal:     {}", plan.signal_id);
            println!("Token:      {}", plan.token_id);
            if plan.strategy == plan.requested_strategy {
                println!("Strategy:   {}", plan.strategy);
            } else {
                println!("Strategy:   {} (requested {})", plan.strategy, plan.requested_strategy);
            }
            println!("State:      {}", plan.state);
            println!("Size:       ${} ({} remaining)", plan.total_size, plan.remaining_size);
            println!("Params:     {}", serde_json::to_string(&params)?);

            let chunks = db.get_plan_chunks(&plan.id).await?;
            println!("\n{:<6} {:>10} {:<8} {:<36} {}", "CHUNK", "SIZE", "RESULT", "ORDER", "AT");
            println!("{}", "-".repeat(100));
            for c in chunks {
                println!(
                    "{:<6} {:>10} {:<8} {:<36} {}",
                    c.chunk_index,
                    c.size,
                    if c.success { "ok" } else { "failed" },
                    c.order_id.as_deref().unwrap_or("-"),
                    c.error.as_deref().unwrap_or(&c.executed_at)
                );
            }
        }

        Commands::Config => {
            println!("\n=== Polyrisk Configuration ===\n");
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn set_limit_active(store: &RiskConfigStore, audit: &AuditChain, id: i64, active: bool, actor: &str) -> Result<()> {
    if !store.set_limit_active(id, active).await? {
        return Err(anyhow!("No exposure limit with id {}", id));
    }
    audit
        .append(
            events::RISK_CONFIG_CHANGED,
            &json!({ "change": "limit_active", "id": id, "active": active }),
            Some(actor),
        )
        .await?;
    println!("Limit {} {}", id, if active { "enabled" } else { "disabled" });
    Ok(())
}

fn breaker(config: &AppConfig, db: &Database) -> DrawdownBreaker {
    DrawdownBreaker::new(
        db.clone(),
        config.risk.max_daily_drawdown_pct,
        config.risk.allow_manual_resume,
    )
}

/// Wire sizer, gate, scheduler and audit chain around a client.
async fn build_controller(
    config: &AppConfig,
    db: &Database,
    client: Arc<dyn MarketClient>,
) -> Result<TradeLifecycleController> {
    let store = Arc::new(RiskConfigStore::load(db.clone()).await?);
    let gate = RiskGate::new(config.risk.clone(), store, breaker(config, db));
    let scheduler = OrderScheduler::new(client.clone(), config.execution.clone()).with_progress(Arc::new(db.clone()));
    let audit = Arc::new(AuditChain::new(db.clone()));

    Ok(TradeLifecycleController::new(
        client,
        PositionSizer::new(config.sizer.clone()),
        gate,
        scheduler,
        audit,
        db.clone(),
    ))
}

/// Live REST client from env, or a paper venue seeded from the CLI books.
async fn build_client(
    config: &AppConfig,
    venue: &VenueArgs,
    market_id: &str,
    question: &str,
    category: &str,
) -> Result<(Arc<dyn MarketClient>, Option<Arc<PaperClient>>)> {
    if !venue.paper {
        let client = RestClient::from_env().context("Live client not configured; pass --paper to simulate")?;
        info!(venue = %client.venue(), "Using live venue");
        return Ok((Arc::new(client), None));
    }

    let paper = Arc::new(PaperClient::new(PaperConfig {
        initial_capital: config.paper_capital,
        ..Default::default()
    }));
    if !market_id.is_empty() {
        paper.register_market(market_id, question, category).await;
        for (side, asks) in [(Side::BuyYes, &venue.yes_asks), (Side::BuyNo, &venue.no_asks)] {
            if let Some(raw) = asks {
                let token = side.token_id(market_id);
                paper.set_book(OrderBook::new(token, parse_levels(raw)?, Vec::new())).await;
            }
        }
    }
    info!(capital = %config.paper_capital, "Using paper venue");
    let client: Arc<dyn MarketClient> = paper.clone();
    Ok((client, Some(paper)))
}

/// Parse "0.50:1000,0.55:200" into book levels.
fn parse_levels(raw: &str) -> Result<Vec<BookLevel>> {
    raw.split(',')
        .filter(|s| !s.trim().is_empty())
        .map(|level| {
            let (price, amount) = level
                .split_once(':')
                .ok_or_else(|| anyhow!("Book level '{}' must be price:shares", level))?;
            Ok(BookLevel::new(
                price.trim().parse().with_context(|| format!("Bad price in '{}'", level))?,
                amount.trim().parse().with_context(|| format!("Bad size in '{}'", level))?,
            ))
        })
        .collect()
}

/// First 12 characters of a stored hash. Tampered rows may hold anything.
fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_levels() {
        let levels = parse_levels("0.50:1000, 0.55:200").unwrap();
        assert_eq!(levels.len(), 2);
        assert_eq!(levels[1].price, dec!(0.55));
        assert_eq!(levels[1].amount, dec!(200));
        assert!(parse_levels("0.50-1000").is_err());
    }

    #[test]
    fn test_short_hash_tolerates_tampered_rows() {
        assert_eq!(short_hash(&"a".repeat(64)), "aaaaaaaaaaaa");
        assert_eq!(short_hash("ab"), "ab");
        // byte 12 falls inside a multi-byte char
        assert_eq!(short_hash("abcdefghijké0000"), "abcdefghijké0000");
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("élection présidentielle", 10), "électio...");
    }

    #[test]
    fn test_cli_parses_propose() {
        let cli = Cli::try_parse_from([
            "polyrisk", "propose", "m1", "-q", "Will it snow?", "-p", "0.62", "--strategy", "iceberg",
            "--display-size", "25", "--paper", "--yes-asks", "0.5:100",
        ])
        .unwrap();
        match cli.command {
            Commands::Propose {
                strategy, display_size, venue, ..
            } => {
                assert_eq!(strategy, Some(ExecutionStrategy::Iceberg));
                assert_eq!(display_size, Some(dec!(25)));
                assert!(venue.paper);
            }
            _ => panic!("expected propose"),
        }
    }
}
