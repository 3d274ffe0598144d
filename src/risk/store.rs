//! Injectable risk configuration store with versioned snapshots.
//!
//! Readers take an `Arc` snapshot and never hold the lock across a check.
//! Writers persist first, then swap in a new snapshot with a bumped version.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::info;

use crate::db::Database;
use crate::models::{CorrelationEdge, ExposureLimit};

/// Immutable view of the risk configuration.
#[derive(Debug, Clone, Default)]
pub struct RiskSnapshot {
    pub version: u64,
    pub factor_limits: HashMap<String, Decimal>,
    pub correlations: Vec<CorrelationEdge>,
    pub exposure_limits: Vec<ExposureLimit>,
}

impl RiskSnapshot {
    pub fn factor_limit(&self, factor: &str, default: Decimal) -> Decimal {
        self.factor_limits.get(factor).copied().unwrap_or(default)
    }

    pub fn active_limits(&self) -> impl Iterator<Item = &ExposureLimit> {
        self.exposure_limits.iter().filter(|l| l.active)
    }
}

/// Holds the current snapshot and writes changes through to the database.
pub struct RiskConfigStore {
    db: Option<Database>,
    current: RwLock<Arc<RiskSnapshot>>,
}

impl RiskConfigStore {
    /// Store with no backing database.
    #[cfg(test)]
    pub fn in_memory(snapshot: RiskSnapshot) -> Self {
        Self {
            db: None,
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    /// Load configuration from the database.
    pub async fn load(db: Database) -> Result<Self> {
        let snapshot = Self::read_snapshot(&db, 1).await?;
        info!(
            factor_limits = snapshot.factor_limits.len(),
            correlations = snapshot.correlations.len(),
            exposure_limits = snapshot.exposure_limits.len(),
            "Loaded risk configuration"
        );
        Ok(Self {
            db: Some(db),
            current: RwLock::new(Arc::new(snapshot)),
        })
    }

    async fn read_snapshot(db: &Database, version: u64) -> Result<RiskSnapshot> {
        Ok(RiskSnapshot {
            version,
            factor_limits: db.list_factor_limits().await?.into_iter().collect(),
            correlations: db.list_correlations().await?,
            exposure_limits: db.list_exposure_limits().await?,
        })
    }

    pub async fn snapshot(&self) -> Arc<RiskSnapshot> {
        self.current.read().await.clone()
    }

    /// Re-read everything from the database.
    pub async fn reload(&self) -> Result<Arc<RiskSnapshot>> {
        let Some(db) = &self.db else {
            return Ok(self.snapshot().await);
        };
        let mut guard = self.current.write().await;
        let snapshot = Arc::new(Self::read_snapshot(db, guard.version + 1).await?);
        *guard = snapshot.clone();
        Ok(snapshot)
    }

    pub async fn set_factor_limit(&self, factor: &str, max_usd: Decimal) -> Result<()> {
        if max_usd < Decimal::ZERO {
            return Err(anyhow!("factor limit must be non-negative"));
        }
        if let Some(db) = &self.db {
            db.save_factor_limit(factor, max_usd).await?;
        }
        self.update(|s| {
            s.factor_limits.insert(factor.to_string(), max_usd);
        })
        .await;
        Ok(())
    }

    pub async fn set_correlation(&self, edge: CorrelationEdge) -> Result<()> {
        if let Some(db) = &self.db {
            db.save_correlation(&edge).await?;
        }
        self.update(|s| {
            s.correlations
                .retain(|e| !(e.factor_a == edge.factor_a && e.factor_b == edge.factor_b));
            s.correlations.push(edge);
        })
        .await;
        Ok(())
    }

    /// Add or replace a scoped limit. Returns its id.
    pub async fn add_limit(&self, mut limit: ExposureLimit) -> Result<i64> {
        if limit.max_usd < Decimal::ZERO {
            return Err(anyhow!("limit must be non-negative"));
        }
        let id = match &self.db {
            Some(db) => db.save_exposure_limit(&limit).await?,
            None => self.snapshot().await.exposure_limits.len() as i64 + 1,
        };
        limit.id = Some(id);
        self.update(|s| {
            s.exposure_limits
                .retain(|l| !(l.scope == limit.scope && l.scope_value == limit.scope_value));
            s.exposure_limits.push(limit);
        })
        .await;
        Ok(id)
    }

    /// Returns false when no limit has this id.
    pub async fn set_limit_active(&self, id: i64, active: bool) -> Result<bool> {
        if let Some(db) = &self.db {
            if !db.set_limit_active(id, active).await? {
                return Ok(false);
            }
        }
        let mut found = false;
        self.update(|s| {
            for l in s.exposure_limits.iter_mut().filter(|l| l.id == Some(id)) {
                l.active = active;
                found = true;
            }
        })
        .await;
        Ok(found)
    }

    async fn update<F: FnOnce(&mut RiskSnapshot)>(&self, f: F) {
        let mut guard = self.current.write().await;
        let mut next = (**guard).clone();
        f(&mut next);
        next.version = guard.version + 1;
        *guard = Arc::new(next);
    }
}
