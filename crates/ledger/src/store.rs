//! Ledger storage abstraction.
//!
//! The store is injected at startup; two implementations exist:
//! - [`MemoryLedgerStore`]: ephemeral, DashMap-backed
//! - [`crate::redis_store::RedisLedgerStore`]: durable, one JSON record per user

use crate::error::Result;
use crate::model::LedgerEntry;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Keyed per-user ledger storage.
///
/// `save` replaces the whole entry atomically; concurrent writers for the
/// same user resolve as last-writer-wins.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Short backend name (e.g. "memory", "redis").
    fn backend(&self) -> &'static str;

    /// Look up a user's entry.
    async fn get(&self, user_id: &str) -> Result<Option<LedgerEntry>>;

    /// Look up a user's entry, creating a zeroed one if absent.
    async fn get_or_create(&self, user_id: &str) -> Result<LedgerEntry>;

    /// Persist an entry, replacing any previous version.
    async fn save(&self, entry: &LedgerEntry) -> Result<()>;
}

/// Shared store handle.
pub type SharedLedgerStore = Arc<dyn LedgerStore>;

/// Ephemeral in-process store.
#[derive(Debug, Clone, Default)]
pub struct MemoryLedgerStore {
    entries: Arc<DashMap<String, LedgerEntry>>,
}

impl MemoryLedgerStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl LedgerStore for MemoryLedgerStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, user_id: &str) -> Result<Option<LedgerEntry>> {
        Ok(self.entries.get(user_id).map(|e| e.clone()))
    }

    async fn get_or_create(&self, user_id: &str) -> Result<LedgerEntry> {
        let entry = self
            .entries
            .entry(user_id.to_string())
            .or_insert_with(|| {
                info!("Created ledger entry for {}", user_id);
                LedgerEntry::new(user_id, Utc::now())
            });
        Ok(entry.clone())
    }

    async fn save(&self, entry: &LedgerEntry) -> Result<()> {
        self.entries.insert(entry.user_id.clone(), entry.clone());
        debug!("Saved ledger entry for {}", entry.user_id);
        Ok(())
    }
}
