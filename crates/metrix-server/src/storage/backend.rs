//! Postgres durable backend.
//!
//! Connects once at startup under [`retry_with_backoff`]; after that the pool
//! re-establishes individual connections on its own and the backend is never
//! reconnected as a whole.
//!
//! Tables hold the post-merge value per metric, so writes are idempotent:
//! replaying the same update twice stores the same row.
//!
//! Write-through (`record`) and snapshot saves (`save`) can interleave. Counter
//! rows only ever take the larger total, whichever path commits last. Gauge
//! rows are last-writer-wins: a snapshot copied before an update but committed
//! after its write-through briefly stores the older gauge, until the next
//! write-through or snapshot of that metric.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};

use metrix_core::error::{MetrixError, Result};
use metrix_core::{MetricKind, MetricValue, Snapshot};

use super::retry::{retry_with_backoff, AttemptError, BackoffPolicy};
use super::{DurableBackend, SnapshotSink};

const MAX_CONNECTIONS: u32 = 10;

const CREATE_GAUGES: &str = "CREATE TABLE IF NOT EXISTS metrix_gauges (
    name  TEXT PRIMARY KEY,
    value DOUBLE PRECISION NOT NULL
)";

const CREATE_COUNTERS: &str = "CREATE TABLE IF NOT EXISTS metrix_counters (
    name  TEXT PRIMARY KEY,
    value BIGINT NOT NULL
)";

const UPSERT_GAUGE: &str = "INSERT INTO metrix_gauges (name, value) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET value = EXCLUDED.value";

// Counter totals only grow; writers may commit out of order.
const UPSERT_COUNTER: &str = "INSERT INTO metrix_counters (name, value) VALUES ($1, $2)
    ON CONFLICT (name) DO UPDATE SET value = GREATEST(metrix_counters.value, EXCLUDED.value)";

/// Upsert used for every row of `kind`, by write-through and snapshot alike.
pub fn upsert_sql(kind: MetricKind) -> &'static str {
    match kind {
        MetricKind::Gauge => UPSERT_GAUGE,
        MetricKind::Counter => UPSERT_COUNTER,
    }
}

/// SQLSTATE codes worth retrying.
///
/// Class 08 is "connection exception"; the rest are conflict/overload codes.
pub fn is_retryable_sqlstate(code: &str) -> bool {
    code.starts_with("08") || matches!(code, "40001" | "40P01" | "57P03" | "53300")
}

/// Map a driver error onto the retry loop's classification.
pub fn classify(err: &sqlx::Error) -> AttemptError {
    match err {
        sqlx::Error::Database(db) => match db.code() {
            Some(code) if is_retryable_sqlstate(&code) => AttemptError::Retryable(err.to_string()),
            _ => AttemptError::Permanent(err.to_string()),
        },
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::WorkerCrashed => {
            AttemptError::Retryable(err.to_string())
        }
        _ => AttemptError::Permanent(err.to_string()),
    }
}

fn persist_err(ctx: &str) -> impl FnOnce(sqlx::Error) -> MetrixError + '_ {
    move |e| MetrixError::Persistence(format!("postgres {ctx}: {e}"))
}

pub struct PgBackend {
    pool: PgPool,
}

impl PgBackend {
    /// Connect with bounded backoff, then make sure the tables exist.
    pub async fn connect(dsn: &str, policy: &BackoffPolicy) -> Result<Self> {
        let acquire_timeout = policy.max_delay;
        let pool = retry_with_backoff("postgres connect", policy, move || async move {
            PgPoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .acquire_timeout(acquire_timeout)
                .connect(dsn)
                .await
                .map_err(|e| classify(&e))
        })
        .await?;

        let backend = Self { pool };
        backend.migrate().await?;
        tracing::info!("postgres backend ready");
        Ok(backend)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(CREATE_GAUGES)
            .execute(&self.pool)
            .await
            .map_err(persist_err("create gauges table"))?;
        sqlx::query(CREATE_COUNTERS)
            .execute(&self.pool)
            .await
            .map_err(persist_err("create counters table"))?;
        Ok(())
    }
}

#[async_trait]
impl DurableBackend for PgBackend {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| MetrixError::Connect(format!("postgres ping: {e}")))?;
        Ok(())
    }

    async fn record(&self, values: &[MetricValue]) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(persist_err("begin"))?;
        for v in values {
            let res = match v {
                MetricValue::Gauge { name, value } => {
                    sqlx::query(upsert_sql(MetricKind::Gauge))
                        .bind(name.as_str())
                        .bind(*value)
                        .execute(&mut *tx)
                        .await
                }
                MetricValue::Counter { name, total } => {
                    sqlx::query(upsert_sql(MetricKind::Counter))
                        .bind(name.as_str())
                        .bind(*total)
                        .execute(&mut *tx)
                        .await
                }
            };
            res.map_err(persist_err("upsert"))?;
        }
        tx.commit().await.map_err(persist_err("commit"))?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotSink for PgBackend {
    fn describe(&self) -> String {
        "postgres".to_string()
    }

    async fn load(&self) -> Result<Option<Snapshot>> {
        let gauges: Vec<(String, f64)> = sqlx::query_as("SELECT name, value FROM metrix_gauges")
            .fetch_all(&self.pool)
            .await
            .map_err(persist_err("load gauges"))?;
        let counters: Vec<(String, i64)> = sqlx::query_as("SELECT name, value FROM metrix_counters")
            .fetch_all(&self.pool)
            .await
            .map_err(persist_err("load counters"))?;

        let snap = Snapshot {
            gauges: gauges.into_iter().collect(),
            counters: counters.into_iter().collect(),
        };
        Ok((!snap.is_empty()).then_some(snap))
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(persist_err("begin"))?;
        for (name, value) in &snapshot.gauges {
            sqlx::query(upsert_sql(MetricKind::Gauge))
                .bind(name.as_str())
                .bind(*value)
                .execute(&mut *tx)
                .await
                .map_err(persist_err("snapshot gauge"))?;
        }
        for (name, total) in &snapshot.counters {
            sqlx::query(upsert_sql(MetricKind::Counter))
                .bind(name.as_str())
                .bind(*total)
                .execute(&mut *tx)
                .await
                .map_err(persist_err("snapshot counter"))?;
        }
        tx.commit().await.map_err(persist_err("commit"))?;
        Ok(())
    }
}
