//! Redis-backed ledger store.

use crate::error::Result;
use crate::model::LedgerEntry;
use crate::store::LedgerStore;
use async_trait::async_trait;
use chrono::Utc;
use redis::AsyncCommands;
use tracing::{debug, info};

/// Redis key prefix for ledger entries: ledger:{user_id}
const LEDGER_KEY_PREFIX: &str = "ledger:";

fn ledger_key(user_id: &str) -> String {
    format!("{}{}", LEDGER_KEY_PREFIX, user_id)
}

/// Durable store keeping one JSON document per user.
#[derive(Clone)]
pub struct RedisLedgerStore {
    client: redis::Client,
}

impl RedisLedgerStore {
    /// Create a new store. Does not connect until first use.
    pub fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self { client })
    }

    /// Open a connection and issue a PING.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        debug!("Redis replied {}", pong);
        Ok(())
    }

    /// Get an async connection.
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }
}

#[async_trait]
impl LedgerStore for RedisLedgerStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, user_id: &str) -> Result<Option<LedgerEntry>> {
        let mut conn = self.get_connection().await?;
        let json: Option<String> = conn.get(ledger_key(user_id)).await?;

        match json {
            Some(j) => {
                let entry: LedgerEntry = serde_json::from_str(&j)?;
                debug!("Retrieved ledger entry for {} from Redis", user_id);
                Ok(Some(entry))
            }
            None => Ok(None),
        }
    }

    async fn get_or_create(&self, user_id: &str) -> Result<LedgerEntry> {
        let mut conn = self.get_connection().await?;
        let key = ledger_key(user_id);

        // SET NX so concurrent first connections converge on one record
        let fresh = LedgerEntry::new(user_id, Utc::now());
        let created: bool = conn.set_nx(&key, serde_json::to_string(&fresh)?).await?;
        if created {
            info!("Created ledger entry for {} in Redis", user_id);
            return Ok(fresh);
        }

        let json: String = conn.get(&key).await?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn save(&self, entry: &LedgerEntry) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let json = serde_json::to_string(entry)?;

        conn.set::<_, _, ()>(ledger_key(&entry.user_id), &json).await?;
        debug!(
            "Stored ledger entry for {} ({} points)",
            entry.user_id, entry.total_points
        );

        Ok(())
    }
}
