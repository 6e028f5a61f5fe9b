//! Per-user points ledger.
//!
//! Each user has one [`LedgerEntry`] holding a running total, the 50 most
//! recent transactions, a monthly aggregate, and a category aggregate. Award
//! events are applied by the [`engine`] and persisted through a
//! [`LedgerStore`].
//!
//! ## Architecture
//!
//! ```text
//! AwardEvent
//!     ↓
//! LedgerService (per-user lock, load → apply → save)
//!     ↓
//! engine::apply_award
//!     ↓
//! LedgerStore (MemoryLedgerStore | RedisLedgerStore)
//! ```

pub mod category;
pub mod engine;
pub mod error;
pub mod model;
pub mod redis_store;
pub mod service;
pub mod store;

pub use category::Category;
pub use engine::{apply_award, apply_award_at, apply_raw_award};
pub use error::{LedgerError, Result};
pub use model::{
    AwardEvent, CategoryPoints, LedgerEntry, MonthlyPoints, Transaction, MAX_TRANSACTIONS,
};
pub use redis_store::RedisLedgerStore;
pub use service::LedgerService;
pub use store::{LedgerStore, MemoryLedgerStore, SharedLedgerStore};
