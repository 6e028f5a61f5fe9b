//! Ledger data model.
//!
//! Field names serialize in camelCase; this is the shape clients receive in
//! `points_data` snapshots.

use crate::category::Category;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of transactions kept in an entry's history.
pub const MAX_TRANSACTIONS: usize = 50;

/// Per-user record of points, recent history, and aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    /// Owning user.
    pub user_id: String,
    /// Running total of all points awarded.
    pub total_points: u64,
    /// Most recent transactions, newest first. Capped at [`MAX_TRANSACTIONS`].
    pub transactions: Vec<Transaction>,
    /// Points per short month label (e.g. "Jan").
    pub monthly_data: Vec<MonthlyPoints>,
    /// Points per category display name, with share of the category total.
    pub category_data: Vec<CategoryPoints>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create a zeroed entry for a user.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            total_points: 0,
            transactions: Vec::new(),
            monthly_data: Vec::new(),
            category_data: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Points recorded for a month label, if any.
    pub fn month_points(&self, month: &str) -> Option<u64> {
        self.monthly_data
            .iter()
            .find(|m| m.month == month)
            .map(|m| m.points)
    }

    /// Aggregate for a category, looked up by display name.
    pub fn category(&self, category: Category) -> Option<&CategoryPoints> {
        self.category_data
            .iter()
            .find(|c| c.category == category.display_name())
    }
}

/// A single award recorded in the history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Display name of the category.
    #[serde(rename = "type")]
    pub kind: String,
    pub category: Category,
    pub name: String,
    pub amount: u64,
    pub timestamp: DateTime<Utc>,
}

/// Monthly aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyPoints {
    pub month: String,
    pub points: u64,
}

/// Category aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPoints {
    /// Category display name.
    pub category: String,
    pub points: u64,
    /// Rounded share of all category points, 0-100.
    pub percentage: u32,
    pub color: String,
}

/// Instruction to add points under a category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwardEvent {
    pub category: Category,
    pub name: String,
    pub amount: u64,
}

impl AwardEvent {
    /// Create an award from already-typed parts.
    pub fn new(category: Category, name: impl Into<String>, amount: u64) -> Self {
        Self {
            category,
            name: name.into(),
            amount,
        }
    }

    /// Validate raw award fields as received from a client.
    pub fn parse(category: &str, name: &str, amount: i64) -> Result<Self> {
        let category: Category = category.parse()?;

        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(amount));
        }

        if name.trim().is_empty() {
            return Err(LedgerError::EmptyName);
        }

        Ok(Self {
            category,
            name: name.to_string(),
            amount: amount as u64,
        })
    }
}
