//! C10 — decision sink. Append-only log of (scenario, result) pairs for
//! audit (spec.md §4.9). Failures to persist are logged and swallowed —
//! never allowed to fail the simulation.

use std::collections::VecDeque;
use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionType {
    Failure,
    Scaling,
    Add,
}

#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub timestamp: String,
    #[serde(rename = "type")]
    pub decision_type: DecisionType,
    pub scenario: Value,
    pub result: Value,
    pub correlation_id: String,
}

#[async_trait::async_trait]
pub trait DecisionSink: Send + Sync {
    async fn log(&self, record: DecisionRecord);
}

/// Bounded in-memory ring buffer. The default sink — zero external deps,
/// matching spec.md §1's framing of the decision log store as an external
/// collaborator the core only needs a narrow interface to.
pub struct InMemoryDecisionSink {
    capacity: usize,
    records: Mutex<VecDeque<DecisionRecord>>,
}

impl InMemoryDecisionSink {
    pub fn new(capacity: usize) -> Self {
        InMemoryDecisionSink { capacity: capacity.max(1), records: Mutex::new(VecDeque::new()) }
    }

    pub fn snapshot(&self) -> Vec<DecisionRecord> {
        self.records.lock().expect("decision sink mutex poisoned").iter().cloned().collect()
    }
}

#[async_trait::async_trait]
impl DecisionSink for InMemoryDecisionSink {
    async fn log(&self, record: DecisionRecord) {
        let mut records = match self.records.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::error!("decision sink mutex poisoned, recovering");
                poisoned.into_inner()
            }
        };
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }
}

#[cfg(feature = "sqlx-sink")]
pub mod postgres {
    use super::{DecisionRecord, DecisionSink};
    use sqlx::{Pool, Postgres};

    /// Persists decisions to a `decision_log` table. Grounded in the
    /// teacher's `sqlx::PgPoolOptions` + raw-query idiom
    /// (`services/pbx/src/main.rs`, `services/api/src/main.rs`).
    pub struct PostgresDecisionSink {
        pool: Pool<Postgres>,
    }

    impl PostgresDecisionSink {
        pub fn new(pool: Pool<Postgres>) -> Self {
            PostgresDecisionSink { pool }
        }
    }

    #[async_trait::async_trait]
    impl DecisionSink for PostgresDecisionSink {
        async fn log(&self, record: DecisionRecord) {
            let decision_type = match record.decision_type {
                super::DecisionType::Failure => "failure",
                super::DecisionType::Scaling => "scaling",
                super::DecisionType::Add => "add",
            };
            let result = sqlx::query(
                r#"INSERT INTO decision_log (occurred_at, decision_type, scenario, result, correlation_id)
                   VALUES ($1, $2, $3, $4, $5)"#,
            )
            .bind(&record.timestamp)
            .bind(decision_type)
            .bind(&record.scenario)
            .bind(&record.result)
            .bind(&record.correlation_id)
            .execute(&self.pool)
            .await;

            if let Err(error) = result {
                tracing::warn!(%error, correlation_id = %record.correlation_id, "failed to persist decision record");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_sink_retains_up_to_capacity() {
        let sink = InMemoryDecisionSink::new(2);
        for i in 0..3 {
            sink.log(DecisionRecord {
                timestamp: format!("t{i}"),
                decision_type: DecisionType::Failure,
                scenario: serde_json::json!({"i": i}),
                result: serde_json::json!({}),
                correlation_id: format!("corr-{i}"),
            })
            .await;
        }
        let snapshot = sink.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].timestamp, "t1");
        assert_eq!(snapshot[1].timestamp, "t2");
    }
}
