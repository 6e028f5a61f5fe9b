//! Load-modify-save around the engine, serialized per user.
//!
//! Every award for a user runs under that user's lock and starts from a
//! fresh read of the store, so two sessions for the same user (two tabs,
//! two devices) cannot lose each other's updates. Writers that bypass this
//! service still race at the store with last-writer-wins.

use crate::engine::apply_award;
use crate::error::Result;
use crate::model::{AwardEvent, LedgerEntry};
use crate::store::SharedLedgerStore;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Serializes ledger updates per user on top of a [`LedgerStore`](crate::store::LedgerStore).
#[derive(Clone)]
pub struct LedgerService {
    store: SharedLedgerStore,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl LedgerService {
    pub fn new(store: SharedLedgerStore) -> Self {
        Self {
            store,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Backend name of the underlying store.
    pub fn backend(&self) -> &'static str {
        self.store.backend()
    }

    /// Current entry for a user, created if absent.
    pub async fn snapshot(&self, user_id: &str) -> Result<LedgerEntry> {
        self.store.get_or_create(user_id).await
    }

    /// Apply an award and persist it.
    ///
    /// If the save fails the error is returned and nothing is committed; the
    /// caller's previous snapshot remains the latest durable state.
    pub async fn award(&self, user_id: &str, event: &AwardEvent) -> Result<LedgerEntry> {
        let lock = self.user_lock(user_id);
        let result = {
            let _guard = lock.lock().await;
            let mut entry = self.store.get_or_create(user_id).await?;
            apply_award(&mut entry, event);

            match self.store.save(&entry).await {
                Ok(()) => Ok(entry),
                Err(e) => {
                    warn!("Failed to persist award for {}: {}", user_id, e);
                    Err(e)
                }
            }
        };

        drop(lock);
        self.release_lock(user_id);
        result
    }

    /// Number of users with an award currently in flight.
    #[cfg(test)]
    fn active_locks(&self) -> usize {
        self.locks.len()
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn release_lock(&self, user_id: &str) {
        // Only the map holds it: nobody is waiting
        let removed = self
            .locks
            .remove_if(user_id, |_, lock| Arc::strong_count(lock) == 1);
        if removed.is_some() {
            debug!("Released ledger lock for {}", user_id);
        }
    }
}
