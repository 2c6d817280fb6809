//! Redis delivery of evaluation requests
//!
//! A worker holds a numbered lease (`judge:worker:lease:<n>`) for as long as
//! it runs, pulls requests from `judge:queue` and writes each result under
//! `judge:result:<key>`, also publishing it on `judge:results`.
//! Connections are `ConnectionManager`s, which reconnect on their own.

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::evaluator::EvaluationRequest;
use crate::report::{self, EvaluationResult};

pub const LEASE_PREFIX: &str = "judge:worker:lease:";
pub const REQUEST_QUEUE: &str = "judge:queue";
pub const RESULT_PREFIX: &str = "judge:result:";
pub const RESULT_CHANNEL: &str = "judge:results";

const MAX_WORKERS: u32 = 10;
const LEASE_TTL_SECS: u64 = 120;
const RESULT_TTL_SECS: u64 = 3600;
/// BLPOP wait before returning control to the caller
const POP_WAIT_SECS: f64 = 5.0;

/// Open a managed connection to REDIS_URL (default "redis://localhost:6379")
pub async fn connect_from_env() -> Result<ConnectionManager> {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
    let client = redis::Client::open(url.as_str()).context("Invalid REDIS_URL")?;
    let conn = client
        .get_connection_manager()
        .await
        .with_context(|| format!("Failed to connect to Redis at {}", url))?;
    info!("Connected to Redis at {}", url);
    Ok(conn)
}

/// Exclusive worker number, kept alive by a background refresh
pub struct WorkerLease {
    id: u32,
    key: String,
    conn: ConnectionManager,
    refresh: JoinHandle<()>,
}

impl WorkerLease {
    /// Claim the lowest free worker number, waiting while all are taken
    pub async fn claim(mut conn: ConnectionManager) -> Result<Self> {
        loop {
            for id in 0..MAX_WORKERS {
                let key = format!("{}{}", LEASE_PREFIX, id);
                let claimed: Option<String> = redis::cmd("SET")
                    .arg(&key)
                    .arg(std::process::id())
                    .arg("NX")
                    .arg("EX")
                    .arg(LEASE_TTL_SECS)
                    .query_async(&mut conn)
                    .await
                    .context("Failed to claim worker lease")?;
                if claimed.is_some() {
                    info!("Claimed worker lease {} ({}s)", id, LEASE_TTL_SECS);
                    let refresh = tokio::spawn(refresh_lease(conn.clone(), key.clone()));
                    return Ok(Self {
                        id,
                        key,
                        conn,
                        refresh,
                    });
                }
            }
            warn!("All {} worker leases are taken, retrying", MAX_WORKERS);
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Stop refreshing and free the worker number for another process
    pub async fn release(mut self) -> Result<()> {
        self.refresh.abort();
        redis::cmd("DEL")
            .arg(&self.key)
            .query_async::<()>(&mut self.conn)
            .await
            .context("Failed to release worker lease")?;
        info!("Released worker lease {}", self.id);
        Ok(())
    }
}

impl Drop for WorkerLease {
    fn drop(&mut self) {
        self.refresh.abort();
    }
}

async fn refresh_lease(mut conn: ConnectionManager, key: String) {
    let period = Duration::from_secs(LEASE_TTL_SECS / 2);
    loop {
        tokio::time::sleep(period).await;
        let refreshed = redis::cmd("EXPIRE")
            .arg(&key)
            .arg(LEASE_TTL_SECS)
            .query_async::<bool>(&mut conn)
            .await;
        match refreshed {
            Ok(true) => debug!("Refreshed {}", key),
            Ok(false) => warn!("Lease {} expired before refresh", key),
            Err(e) => warn!("Failed to refresh {}: {}", key, e),
        }
    }
}

/// One item taken from the queue
#[derive(Debug)]
pub enum Delivery {
    Request(Box<EvaluationRequest>),
    /// Payload that is not a request; `id` is set when one could be read
    Malformed { id: Option<String>, error: String },
}

impl Delivery {
    pub fn decode(payload: &str) -> Self {
        match serde_json::from_str::<EvaluationRequest>(payload) {
            Ok(request) => Delivery::Request(Box::new(request)),
            Err(e) => {
                let id = serde_json::from_str::<Value>(payload)
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_str).map(str::to_string))
                    .filter(|id| !id.is_empty());
                Delivery::Malformed {
                    id,
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Stored and published form of a finished evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub id: String,
    pub fraction: f64,
    pub prologuehtml: String,
}

impl ResultRecord {
    pub fn new(id: impl Into<String>, result: EvaluationResult) -> Self {
        Self {
            id: id.into(),
            fraction: result.fraction,
            prologuehtml: result.prologuehtml,
        }
    }

    /// Zero-score record for a payload that could not be decoded
    pub fn rejected(id: impl Into<String>, error: &str) -> Self {
        Self::new(
            id,
            report::error_report("Petición no válida", "Error en la petición", error),
        )
    }

    pub fn key(&self) -> String {
        format!("{}{}", RESULT_PREFIX, self.id)
    }
}

/// Identifier a request's result is stored under: its `id`, or the
/// fingerprint seed in hex when the id is empty
pub fn result_id(request: &EvaluationRequest) -> String {
    if request.id.is_empty() {
        format!("{:08x}", request.fingerprint())
    } else {
        request.id.clone()
    }
}

/// Request queue and result store
pub struct RequestQueue {
    conn: ConnectionManager,
}

impl RequestQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Wait a few seconds for the next delivery; `None` when the queue stayed empty
    pub async fn next(&mut self) -> Result<Option<Delivery>> {
        let popped: Option<(String, String)> = self
            .conn
            .blpop(REQUEST_QUEUE, POP_WAIT_SECS)
            .await
            .context("BLPOP on request queue failed")?;
        Ok(popped.map(|(_, payload)| Delivery::decode(&payload)))
    }

    /// Store the record for an hour and announce it
    pub async fn publish(&mut self, record: &ResultRecord) -> Result<()> {
        let json = serde_json::to_string(record)?;
        self.conn
            .set_ex::<_, _, ()>(record.key(), &json, RESULT_TTL_SECS)
            .await
            .with_context(|| format!("Failed to store {}", record.key()))?;
        // no subscribers is fine
        if let Err(e) = self.conn.publish::<_, _, ()>(RESULT_CHANNEL, &json).await {
            debug!("Publish of {} failed: {}", record.key(), e);
        }
        Ok(())
    }
}
