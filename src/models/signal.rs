//! Trade signal: one proposed trade and its lifecycle status.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which outcome token the trade buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Side {
    BuyYes,
    BuyNo,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::BuyYes => "BUY_YES",
            Side::BuyNo => "BUY_NO",
        }
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            Side::BuyYes => "YES",
            Side::BuyNo => "NO",
        }
    }

    /// Venue token identifier for this side of a market.
    pub fn token_id(&self, market_id: &str) -> String {
        format!("{}:{}", market_id, self.outcome())
    }

    /// Probability that this side resolves in the money.
    pub fn win_probability(&self, yes_probability: Decimal) -> Decimal {
        match self {
            Side::BuyYes => yes_probability,
            Side::BuyNo => Decimal::ONE - yes_probability,
        }
    }
}

impl FromStr for Side {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY_YES" | "YES" => Ok(Side::BuyYes),
            "BUY_NO" | "NO" => Ok(Side::BuyNo),
            other => Err(SignalError::UnknownValue(other.to_string())),
        }
    }
}

/// Lifecycle status of a trade signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignalStatus {
    Pending,
    Approved,
    Rejected,
    Executed,
    Failed,
    Paused,
}

impl SignalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalStatus::Pending => "PENDING",
            SignalStatus::Approved => "APPROVED",
            SignalStatus::Rejected => "REJECTED",
            SignalStatus::Executed => "EXECUTED",
            SignalStatus::Failed => "FAILED",
            SignalStatus::Paused => "PAUSED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SignalStatus::Rejected | SignalStatus::Executed | SignalStatus::Failed | SignalStatus::Paused
        )
    }

    fn can_transition_to(&self, next: SignalStatus) -> bool {
        use SignalStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Rejected)
                | (Pending, Paused)
                | (Pending, Failed)
                | (Approved, Executed)
                | (Approved, Failed)
        )
    }
}

impl fmt::Display for SignalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SignalStatus {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(SignalStatus::Pending),
            "APPROVED" => Ok(SignalStatus::Approved),
            "REJECTED" => Ok(SignalStatus::Rejected),
            "EXECUTED" => Ok(SignalStatus::Executed),
            "FAILED" => Ok(SignalStatus::Failed),
            "PAUSED" => Ok(SignalStatus::Paused),
            other => Err(SignalError::UnknownValue(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignalError {
    #[error("illegal status transition {from} -> {to}")]
    IllegalTransition { from: SignalStatus, to: SignalStatus },

    #[error("unknown value: {0}")]
    UnknownValue(String),
}

/// A proposed trade flowing through sizing, risk and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id: String,
    pub account_id: String,
    pub market_id: String,
    pub question: String,
    pub category: String,
    pub side: Side,
    /// Probability-implied price estimate (expected fill)
    pub price_estimate: Decimal,
    /// Proposed size in USD
    pub proposed_size: Decimal,
    pub rationale: String,
    pub status: SignalStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TradeSignal {
    pub fn new(
        account_id: impl Into<String>,
        market_id: impl Into<String>,
        question: impl Into<String>,
        category: impl Into<String>,
        side: Side,
        price_estimate: Decimal,
        proposed_size: Decimal,
        rationale: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.into(),
            market_id: market_id.into(),
            question: question.into(),
            category: category.into(),
            side,
            price_estimate,
            proposed_size,
            rationale: rationale.into(),
            status: SignalStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a note to the rationale without changing status.
    pub fn annotate(&mut self, note: impl AsRef<str>) -> Result<(), SignalError> {
        if self.status.is_terminal() {
            return Err(SignalError::IllegalTransition {
                from: self.status,
                to: self.status,
            });
        }
        self.push_note(note.as_ref());
        Ok(())
    }

    pub fn approve(&mut self) -> Result<(), SignalError> {
        self.transition(SignalStatus::Approved, None)
    }

    pub fn reject(&mut self, reason: impl AsRef<str>) -> Result<(), SignalError> {
        self.transition(SignalStatus::Rejected, Some(reason.as_ref()))
    }

    pub fn pause(&mut self, reason: impl AsRef<str>) -> Result<(), SignalError> {
        self.transition(SignalStatus::Paused, Some(reason.as_ref()))
    }

    pub fn mark_executed(&mut self, summary: impl AsRef<str>) -> Result<(), SignalError> {
        self.transition(SignalStatus::Executed, Some(summary.as_ref()))
    }

    pub fn mark_failed(&mut self, reason: impl AsRef<str>) -> Result<(), SignalError> {
        self.transition(SignalStatus::Failed, Some(reason.as_ref()))
    }

    fn transition(&mut self, next: SignalStatus, note: Option<&str>) -> Result<(), SignalError> {
        if !self.status.can_transition_to(next) {
            return Err(SignalError::IllegalTransition {
                from: self.status,
                to: next,
            });
        }
        if let Some(note) = note {
            self.push_note(note);
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn push_note(&mut self, note: &str) {
        if note.is_empty() {
            return;
        }
        if !self.rationale.is_empty() {
            self.rationale.push_str(" | ");
        }
        self.rationale.push_str(note);
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn signal() -> TradeSignal {
        TradeSignal::new(
            "acct",
            "0xmarket",
            "Will it rain?",
            "weather",
            Side::BuyYes,
            dec!(0.5),
            dec!(100),
            "model edge",
        )
    }

    #[test]
    fn test_happy_path_transitions() {
        let mut s = signal();
        s.annotate("MEDIUM: correlated exposure").unwrap();
        s.approve().unwrap();
        s.mark_executed("filled 100").unwrap();

        assert_eq!(s.status, SignalStatus::Executed);
        assert!(s.rationale.contains("model edge"));
        assert!(s.rationale.contains("MEDIUM"));
        assert!(s.rationale.ends_with("filled 100"));
    }

    #[test]
    fn test_terminal_states_are_frozen() {
        let mut s = signal();
        s.reject("factor limit").unwrap();

        assert_eq!(
            s.approve(),
            Err(SignalError::IllegalTransition {
                from: SignalStatus::Rejected,
                to: SignalStatus::Approved
            })
        );
        assert!(s.annotate("late note").is_err());
        assert!(!s.rationale.contains("late note"));
    }

    #[test]
    fn test_cannot_execute_without_approval() {
        let mut s = signal();
        assert!(s.mark_executed("x").is_err());
        assert_eq!(s.status, SignalStatus::Pending);
    }

    #[test]
    fn test_side_tokens() {
        assert_eq!(Side::BuyNo.token_id("0xabc"), "0xabc:NO");
        assert_eq!(Side::BuyNo.win_probability(dec!(0.3)), dec!(0.7));
        assert_eq!("buy_yes".parse::<Side>().unwrap(), Side::BuyYes);
    }
}
