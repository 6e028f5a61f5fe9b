//! Award categories.
//!
//! Each category carries its wire key, display name, and chart color in one
//! place so the three can never drift apart.

use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed set of sources points can be earned from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    DailyLogin,
    Referral,
    Task,
    Achievement,
}

impl Category {
    /// Every category, in display order.
    pub const ALL: [Category; 4] = [
        Category::DailyLogin,
        Category::Referral,
        Category::Task,
        Category::Achievement,
    ];

    /// Wire key (e.g. `dailyLogin`).
    pub fn key(self) -> &'static str {
        match self {
            Category::DailyLogin => "dailyLogin",
            Category::Referral => "referral",
            Category::Task => "task",
            Category::Achievement => "achievement",
        }
    }

    /// Human-readable name used in transactions and category aggregates.
    pub fn display_name(self) -> &'static str {
        match self {
            Category::DailyLogin => "Daily Login",
            Category::Referral => "Referral",
            Category::Task => "Task",
            Category::Achievement => "Achievement",
        }
    }

    /// Chart color for the category aggregate.
    pub fn color(self) -> &'static str {
        match self {
            Category::DailyLogin => "#00CEC9",
            Category::Referral => "#FDCB6E",
            Category::Task => "#6C5CE7",
            Category::Achievement => "#00B894",
        }
    }
}

impl FromStr for Category {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.key() == s)
            .ok_or_else(|| LedgerError::UnknownCategory(s.to_string()))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
