//! Tamper-evident decision ledger.
//!
//! Each record commits to its predecessor:
//! `record_hash = sha256(timestamp || event_type || canonical_payload || previous_hash)`,
//! with the first record chaining from `GENESIS_HASH`.

use std::fmt;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::db::{Database, NewAuditRecord, StoredAuditRecord};

pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Audit event types written by the trade lifecycle.
pub mod events {
    pub const SIGNAL_PROPOSED: &str = "SIGNAL_PROPOSED";
    pub const SIGNAL_APPROVED: &str = "SIGNAL_APPROVED";
    pub const SIGNAL_REJECTED: &str = "SIGNAL_REJECTED";
    pub const SIGNAL_PAUSED: &str = "SIGNAL_PAUSED";
    pub const PLAN_CREATED: &str = "PLAN_CREATED";
    pub const SIGNAL_EXECUTED: &str = "SIGNAL_EXECUTED";
    pub const SIGNAL_FAILED: &str = "SIGNAL_FAILED";
    pub const TRADING_RESUMED: &str = "TRADING_RESUMED";
    pub const RISK_CONFIG_CHANGED: &str = "RISK_CONFIG_CHANGED";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakKind {
    /// `previous_hash` does not match the prior record's hash
    LinkMismatch,
    /// Stored hash does not match the recomputed one
    HashMismatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainBreak {
    pub record_id: i64,
    pub kind: BreakKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainVerification {
    pub records_checked: usize,
    pub broken: Option<ChainBreak>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.broken.is_none()
    }
}

impl fmt::Display for ChainVerification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.broken {
            None => write!(f, "audit chain intact ({} records)", self.records_checked),
            Some(b) => write!(
                f,
                "audit chain BROKEN at record {} ({:?}) after {} records",
                b.record_id, b.kind, self.records_checked
            ),
        }
    }
}

/// Serialized appender over the audit log.
pub struct AuditChain {
    db: Database,
    append_lock: Mutex<()>,
}

impl AuditChain {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            append_lock: Mutex::new(()),
        }
    }

    /// Append one record. Appends are serialized in-process and the head
    /// read shares a transaction with the insert. Callers must retry on
    /// failure rather than drop the event.
    pub async fn append(&self, event_type: &str, payload: &Value, actor_id: Option<&str>) -> Result<StoredAuditRecord> {
        let _guard = self.append_lock.lock().await;

        let body = match actor_id {
            Some(actor) => with_actor(payload, actor),
            None => payload.clone(),
        };
        let canonical = canonical_json(&body);
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true);

        let record = self
            .db
            .append_audit(|head| {
                let previous_hash = head.unwrap_or(GENESIS_HASH).to_string();
                let record_hash = compute_hash(&timestamp, event_type, &canonical, &previous_hash);
                NewAuditRecord {
                    timestamp: timestamp.clone(),
                    event_type: event_type.to_string(),
                    payload: canonical.clone(),
                    previous_hash,
                    record_hash,
                }
            })
            .await
            .with_context(|| format!("Failed to append {} audit record", event_type))?;

        debug!(id = record.id, event = %event_type, hash = %&record.record_hash[..12], "Audit record appended");
        Ok(record)
    }

    /// Walk the whole chain. Reports the first break and never repairs.
    pub async fn verify(&self) -> Result<ChainVerification> {
        let records = self.db.audit_records().await?;
        let mut expected_prev = GENESIS_HASH.to_string();

        for (i, record) in records.iter().enumerate() {
            let kind = if record.previous_hash != expected_prev {
                Some(BreakKind::LinkMismatch)
            } else if compute_hash(&record.timestamp, &record.event_type, &record.payload, &record.previous_hash)
                != record.record_hash
            {
                Some(BreakKind::HashMismatch)
            } else {
                None
            };

            if let Some(kind) = kind {
                error!(record_id = record.id, ?kind, "Audit chain verification failed");
                return Ok(ChainVerification {
                    records_checked: i + 1,
                    broken: Some(ChainBreak {
                        record_id: record.id,
                        kind,
                    }),
                });
            }
            expected_prev = record.record_hash.clone();
        }

        info!(records = records.len(), "Audit chain verified");
        Ok(ChainVerification {
            records_checked: records.len(),
            broken: None,
        })
    }

    pub async fn tail(&self, n: i64) -> Result<Vec<StoredAuditRecord>> {
        self.db.audit_tail(n).await
    }
}

pub fn compute_hash(timestamp: &str, event_type: &str, canonical_payload: &str, previous_hash: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.as_bytes());
    hasher.update(event_type.as_bytes());
    hasher.update(canonical_payload.as_bytes());
    hasher.update(previous_hash.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compact JSON with object keys sorted at every depth.
pub fn canonical_json(value: &Value) -> String {
    sorted(value).to_string()
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut out = Map::new();
            for k in keys {
                out.insert(k.clone(), sorted(&map[k]));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

fn with_actor(payload: &Value, actor: &str) -> Value {
    match payload {
        Value::Object(map) => {
            let mut map = map.clone();
            map.insert("actor_id".to_string(), Value::String(actor.to_string()));
            Value::Object(map)
        }
        other => serde_json::json!({ "actor_id": actor, "data": other }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorts_nested_keys() {
        let v = json!({"b": 1, "a": {"z": [{"y": 2, "x": 1}], "c": null}});
        assert_eq!(canonical_json(&v), r#"{"a":{"c":null,"z":[{"x":1,"y":2}]},"b":1}"#);
    }

    #[test]
    fn test_hash_is_hex_sha256() {
        let h = compute_hash("t", "E", "{}", GENESIS_HASH);
        assert_eq!(h.len(), 64);
        assert_ne!(h, compute_hash("t", "E", "{}", &h));
    }

    #[tokio::test]
    async fn test_chain_links_from_genesis() {
        let chain = AuditChain::new(Database::in_memory().await.unwrap());
        let first = chain.append("A", &json!({"n": 1}), None).await.unwrap();
        let second = chain.append("B", &json!({"n": 2}), Some("ops")).await.unwrap();

        assert_eq!(first.previous_hash, GENESIS_HASH);
        assert_eq!(second.previous_hash, first.record_hash);
        assert_eq!(second.payload, r#"{"actor_id":"ops","n":2}"#);
        assert!(chain.verify().await.unwrap().is_intact());
    }

    #[tokio::test]
    async fn test_any_tampered_field_is_reported() {
        let cases = [
            ("timestamp", "2020-01-01T00:00:00.000000Z", BreakKind::HashMismatch),
            ("event_type", "FORGED", BreakKind::HashMismatch),
            ("payload", r#"{"n":20}"#, BreakKind::HashMismatch),
            ("previous_hash", GENESIS_HASH, BreakKind::LinkMismatch),
            ("record_hash", "ab", BreakKind::HashMismatch),
        ];

        for (column, value, kind) in cases {
            let db = Database::in_memory().await.unwrap();
            let chain = AuditChain::new(db.clone());
            for n in 1..=3 {
                chain.append("E", &json!({ "n": n }), None).await.unwrap();
            }
            assert!(chain.verify().await.unwrap().is_intact());

            sqlx::query(&format!("UPDATE audit_log SET {} = ? WHERE id = 2", column))
                .bind(value)
                .execute(db.pool())
                .await
                .unwrap();

            let result = chain.verify().await.unwrap();
            assert_eq!(
                result.broken,
                Some(ChainBreak { record_id: 2, kind }),
                "tampered column {}",
                column
            );
            assert_eq!(result.records_checked, 2, "tampered column {}", column);
        }
    }

    #[tokio::test]
    async fn test_concurrent_appends_stay_linked() {
        let chain = std::sync::Arc::new(AuditChain::new(Database::in_memory().await.unwrap()));
        let mut handles = Vec::new();
        for n in 0..10 {
            let c = chain.clone();
            handles.push(tokio::spawn(async move { c.append("E", &json!({ "n": n }), None).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }
        let v = chain.verify().await.unwrap();
        assert!(v.is_intact());
        assert_eq!(v.records_checked, 10);
    }
}
