//! Daily drawdown circuit breaker.
//!
//! One `DailyRiskState` per account per UTC day, created lazily on the first
//! check of the day. Once tripped the breaker stays tripped for the rest of
//! that day. The next day's state starts unpaused.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::db::Database;
use crate::models::DailyRiskState;

pub struct DrawdownBreaker {
    db: Database,
    max_drawdown_pct: Decimal,
    allow_manual_resume: bool,
}

impl DrawdownBreaker {
    pub fn new(db: Database, max_drawdown_pct: Decimal, allow_manual_resume: bool) -> Self {
        Self {
            db,
            max_drawdown_pct,
            allow_manual_resume,
        }
    }

    /// Mark the day's P&L to `equity` and trip if the drawdown limit is hit.
    /// A paused state is returned unchanged.
    pub async fn check(&self, account_id: &str, equity: Decimal, as_of: DateTime<Utc>) -> Result<DailyRiskState> {
        let day = as_of.date_naive();
        let mut state = match self.db.get_daily_state(account_id, day).await? {
            Some(state) => state,
            None => {
                info!(account = %account_id, day = %day, starting_balance = %equity, "Opening daily risk state");
                DailyRiskState::new(account_id, day, equity)
            }
        };

        if state.paused {
            return Ok(state);
        }

        state.current_pnl = equity - state.starting_balance;
        self.evaluate(&mut state, as_of);
        self.db.save_daily_state(&state).await?;
        Ok(state)
    }

    /// Record a realized P&L figure for today from an external source.
    pub async fn record_pnl(&self, account_id: &str, pnl: Decimal, as_of: DateTime<Utc>) -> Result<DailyRiskState> {
        let day = as_of.date_naive();
        let mut state = self
            .db
            .get_daily_state(account_id, day)
            .await?
            .ok_or_else(|| anyhow!("no risk state for {} on {}", account_id, day))?;

        state.current_pnl = pnl;
        if !state.paused {
            self.evaluate(&mut state, as_of);
        } else {
            state.updated_at = as_of;
        }
        self.db.save_daily_state(&state).await?;
        Ok(state)
    }

    /// Lift today's pause. Only allowed when manual resume is enabled; the
    /// starting balance is rebased to `equity` so the breaker does not
    /// re-trip on the loss that caused the pause.
    pub async fn resume(&self, account_id: &str, equity: Decimal, as_of: DateTime<Utc>) -> Result<DailyRiskState> {
        if !self.allow_manual_resume {
            return Err(anyhow!("manual resume is disabled"));
        }
        let day = as_of.date_naive();
        let mut state = self
            .db
            .get_daily_state(account_id, day)
            .await?
            .ok_or_else(|| anyhow!("no risk state for {} on {}", account_id, day))?;

        if !state.paused {
            return Ok(state);
        }

        warn!(
            account = %account_id,
            reason = state.pause_reason.as_deref().unwrap_or(""),
            new_starting_balance = %equity,
            "Manual resume of drawdown pause"
        );
        state.paused = false;
        state.pause_reason = None;
        state.starting_balance = equity;
        state.current_pnl = Decimal::ZERO;
        state.updated_at = as_of;
        self.db.save_daily_state(&state).await?;
        Ok(state)
    }

    /// Today's state, if any check has run.
    pub async fn status(&self, account_id: &str, as_of: DateTime<Utc>) -> Result<Option<DailyRiskState>> {
        self.db.get_daily_state(account_id, as_of.date_naive()).await
    }

    fn evaluate(&self, state: &mut DailyRiskState, as_of: DateTime<Utc>) {
        let drawdown = state.drawdown_pct();
        state.max_drawdown_pct = state.max_drawdown_pct.max(drawdown);
        state.updated_at = as_of;

        if drawdown >= self.max_drawdown_pct {
            let reason = format!(
                "daily drawdown {:.2}% >= {}% limit",
                drawdown, self.max_drawdown_pct
            );
            warn!(account = %state.account_id, day = %state.day, %reason, "Drawdown breaker tripped");
            state.paused = true;
            state.pause_reason = Some(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
    }

    async fn breaker(allow_resume: bool) -> DrawdownBreaker {
        DrawdownBreaker::new(Database::in_memory().await.unwrap(), dec!(10), allow_resume)
    }

    #[tokio::test]
    async fn test_trips_and_stays_paused_for_the_day() {
        let b = breaker(false).await;
        let t = noon();

        let s = b.check("acct", dec!(1000), t).await.unwrap();
        assert!(!s.paused);
        let s = b.check("acct", dec!(950), t + Duration::minutes(5)).await.unwrap();
        assert!(!s.paused);
        let s = b.check("acct", dec!(900), t + Duration::minutes(10)).await.unwrap();
        assert!(s.paused);
        assert!(s.pause_reason.unwrap().contains("10.00%"));

        // recovery the same day does not unpause
        let s = b.check("acct", dec!(1200), t + Duration::hours(2)).await.unwrap();
        assert!(s.paused);
        assert_eq!(s.max_drawdown_pct, dec!(10));
    }

    #[tokio::test]
    async fn test_new_day_starts_unpaused() {
        let b = breaker(false).await;
        let t = noon();
        b.check("acct", dec!(1000), t).await.unwrap();
        assert!(b.check("acct", dec!(850), t).await.unwrap().paused);

        let tomorrow = b.check("acct", dec!(850), t + Duration::days(1)).await.unwrap();
        assert!(!tomorrow.paused);
        assert_eq!(tomorrow.starting_balance, dec!(850));
        assert_eq!(tomorrow.current_pnl, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_recorded_pnl_trips_breaker() {
        let b = breaker(false).await;
        let t = noon();
        assert!(b.record_pnl("acct", dec!(-50), t).await.is_err());

        b.check("acct", dec!(2000), t).await.unwrap();
        let s = b.record_pnl("acct", dec!(-250), t).await.unwrap();
        assert!(s.paused);
        assert_eq!(b.status("acct", t).await.unwrap().unwrap().current_pnl, dec!(-250));
    }

    #[tokio::test]
    async fn test_manual_resume_requires_opt_in() {
        let t = noon();

        let locked = breaker(false).await;
        locked.check("acct", dec!(1000), t).await.unwrap();
        locked.check("acct", dec!(800), t).await.unwrap();
        assert!(locked.resume("acct", dec!(800), t).await.is_err());

        let b = breaker(true).await;
        b.check("acct", dec!(1000), t).await.unwrap();
        b.check("acct", dec!(800), t).await.unwrap();
        let s = b.resume("acct", dec!(800), t).await.unwrap();
        assert!(!s.paused);
        assert_eq!(s.starting_balance, dec!(800));

        // further losses are measured from the rebased balance
        assert!(!b.check("acct", dec!(760), t).await.unwrap().paused);
        assert!(b.check("acct", dec!(720), t).await.unwrap().paused);
    }
}
