use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::models::{ProcessorProvider, StoredPaymentRecord};
use crate::ports::PaymentStore;

const SCAN_BATCH: usize = 1_000;

/// Payment records in Redis, one JSON value per `<provider>:<id>` key.
///
/// Values expire after `ttl`; the summary query never looks further back than
/// that.
#[derive(Clone)]
pub struct RedisPaymentStore {
    conn: ConnectionManager,
    ttl: Duration,
}

impl RedisPaymentStore {
    pub async fn connect(redis_url: &str, ttl: Duration) -> Result<Self, StorageError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(url = redis_url, "connected to redis");
        Ok(Self { conn, ttl })
    }

    /// Walks the SCAN cursor to the end; a failing page fails the whole scan.
    async fn keys(&self, provider: ProcessorProvider) -> Result<Vec<String>, StorageError> {
        let mut con = self.conn.clone();
        let pattern = format!("{}:*", provider);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, page): (u64, Vec<String>) =
                scan_page(cursor, &pattern).query_async(&mut con).await?;
            keys.extend(page);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        Ok(keys)
    }
}

fn scan_page(cursor: u64, pattern: &str) -> redis::Cmd {
    let mut cmd = redis::cmd("SCAN");
    cmd.arg(cursor)
        .arg("MATCH")
        .arg(pattern)
        .arg("COUNT")
        .arg(SCAN_BATCH);
    cmd
}

#[async_trait]
impl PaymentStore for RedisPaymentStore {
    async fn save(&self, record: &StoredPaymentRecord) -> Result<(), StorageError> {
        let mut con = self.conn.clone();
        let value = serde_json::to_string(record)?;
        let _: () = redis::cmd("SET")
            .arg(record.key())
            .arg(value)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .query_async(&mut con)
            .await?;
        Ok(())
    }

    async fn scan(
        &self,
        provider: ProcessorProvider,
    ) -> Result<Vec<StoredPaymentRecord>, StorageError> {
        let keys = self.keys(provider).await?;
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut pipe = redis::pipe();
        for key in &keys {
            pipe.get(key);
        }
        let mut con = self.conn.clone();
        // expired between SCAN and GET => None
        let values: Vec<Option<String>> = pipe.query_async(&mut con).await?;

        let mut records = Vec::with_capacity(values.len());
        for (key, value) in keys.iter().zip(values) {
            let Some(value) = value else { continue };
            match serde_json::from_str::<StoredPaymentRecord>(&value) {
                Ok(record) => records.push(record),
                Err(err) => warn!(key = %key, error = %err, "skipping unreadable payment record"),
            }
        }
        Ok(records)
    }
}
