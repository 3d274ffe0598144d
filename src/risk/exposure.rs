//! Factor, correlation and scoped exposure checks.
//!
//! Pure functions over a portfolio and a configuration snapshot so the gate
//! can evaluate them without holding any lock.

use rust_decimal::Decimal;
use tracing::warn;

use crate::error::RiskError;
use crate::models::{LimitScope, Portfolio, RiskAlert, Severity};

use super::config::RiskSettings;
use super::factors;
use super::store::RiskSnapshot;

/// Outcome of the factor and correlation pass.
#[derive(Debug, Clone, Default)]
pub struct FactorAssessment {
    pub factors: Vec<String>,
    pub alerts: Vec<RiskAlert>,
    /// First HIGH breach, if any
    pub blocking: Option<RiskError>,
}

impl FactorAssessment {
    pub fn warnings(&self) -> impl Iterator<Item = &RiskAlert> {
        self.alerts.iter().filter(|a| a.severity == Severity::Medium)
    }
}

/// Check a proposed trade against per-factor limits and correlated exposure.
pub fn assess_factors(
    question: &str,
    proposed: Decimal,
    portfolio: &Portfolio,
    snapshot: &RiskSnapshot,
    settings: &RiskSettings,
) -> FactorAssessment {
    let tags = factors::classify(question);
    let exposure = portfolio.exposure_by_tag(factors::classify);
    let mut out = FactorAssessment {
        factors: tags.clone(),
        ..Default::default()
    };

    for tag in &tags {
        let current = exposure.get(tag).copied().unwrap_or(Decimal::ZERO);
        let limit = snapshot.factor_limit(tag, settings.default_factor_limit);
        if current + proposed > limit {
            let err = RiskError::FactorLimitExceeded {
                factor: tag.clone(),
                current,
                proposed,
                limit,
            };
            out.alerts.push(RiskAlert {
                severity: Severity::High,
                factor: tag.clone(),
                message: err.to_string(),
            });
            if out.blocking.is_none() {
                out.blocking = Some(err);
            }
        }
    }

    for tag in &tags {
        for edge in &snapshot.correlations {
            if edge.coefficient <= settings.correlation_threshold {
                continue;
            }
            let Some(other) = edge.other(tag) else {
                continue;
            };
            let other_exposure = exposure.get(other).copied().unwrap_or(Decimal::ZERO);
            if other_exposure + proposed > settings.max_correlated_exposure {
                warn!(
                    factor = %tag,
                    correlated = %other,
                    coefficient = edge.coefficient,
                    "Correlated exposure above ceiling"
                );
                out.alerts.push(RiskAlert {
                    severity: Severity::Medium,
                    factor: tag.clone(),
                    message: format!(
                        "correlated exposure via {} (rho={:.2}): {} + {} > {}",
                        other,
                        edge.coefficient,
                        other_exposure,
                        proposed,
                        settings.max_correlated_exposure
                    ),
                });
            }
        }
    }

    out
}

/// Apply every active scoped limit. The first breach is a hard stop.
pub fn check_scoped_limits(
    market_id: &str,
    category: &str,
    venue: &str,
    proposed: Decimal,
    portfolio: &Portfolio,
    snapshot: &RiskSnapshot,
) -> Result<(), RiskError> {
    for limit in snapshot.active_limits() {
        match limit.scope {
            LimitScope::PerMarketCap if limit.applies_to(market_id) => {
                let current = portfolio.exposure_for_market(market_id);
                if current + proposed > limit.max_usd {
                    return Err(RiskError::MarketCapExceeded {
                        market_id: market_id.to_string(),
                        current,
                        proposed,
                        limit: limit.max_usd,
                    });
                }
            }
            LimitScope::CategoryCap if limit.applies_to(category) => {
                let current = portfolio.exposure_for_category(category);
                if current + proposed > limit.max_usd {
                    return Err(RiskError::CategoryCapExceeded {
                        category: category.to_string(),
                        current,
                        proposed,
                        limit: limit.max_usd,
                    });
                }
            }
            LimitScope::ExchangeCap if limit.applies_to(venue) => {
                let current = portfolio.exposure_for_venue(venue);
                if current + proposed > limit.max_usd {
                    return Err(RiskError::ExchangeCapExceeded {
                        venue: venue.to_string(),
                        current,
                        proposed,
                        limit: limit.max_usd,
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}
