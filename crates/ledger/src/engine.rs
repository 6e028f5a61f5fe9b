//! Ledger update engine.
//!
//! Applies award events to a [`LedgerEntry`], keeping the running total,
//! bounded history, monthly aggregate, and category aggregate consistent.
//! Persistence is left to the caller (see [`crate::service::LedgerService`]).
//!
//! Update order for each award:
//!
//! 1. Resolve display name and color from the category
//! 2. Build the transaction, stamped with the current time
//! 3. Add the amount to `total_points`
//! 4. Prepend the transaction, keeping the newest [`MAX_TRANSACTIONS`]
//! 5. Add the amount to the current month's aggregate
//! 6. Add the amount to the category aggregate
//! 7. Recompute every category percentage

use crate::error::Result;
use crate::model::{
    AwardEvent, CategoryPoints, LedgerEntry, MonthlyPoints, Transaction, MAX_TRANSACTIONS,
};
use chrono::{DateTime, Utc};
use tracing::debug;

/// Apply an award using the wall clock.
pub fn apply_award(entry: &mut LedgerEntry, event: &AwardEvent) {
    apply_award_at(entry, event, Utc::now());
}

/// Validate raw award fields and apply them.
///
/// On a validation error the entry is left untouched.
pub fn apply_raw_award(
    entry: &mut LedgerEntry,
    category: &str,
    name: &str,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    let event = AwardEvent::parse(category, name, amount)?;
    apply_award_at(entry, &event, now);
    Ok(())
}

/// Apply an award as of `now`.
pub fn apply_award_at(entry: &mut LedgerEntry, event: &AwardEvent, now: DateTime<Utc>) {
    let category = event.category;
    let display_name = category.display_name();

    let transaction = Transaction {
        kind: display_name.to_string(),
        category,
        name: event.name.clone(),
        amount: event.amount,
        timestamp: now,
    };

    entry.total_points = entry.total_points.saturating_add(event.amount);

    entry.transactions.insert(0, transaction);
    entry.transactions.truncate(MAX_TRANSACTIONS);

    // Awards always land in the month they are processed in
    let month = month_label(now);
    match entry.monthly_data.iter_mut().find(|m| m.month == month) {
        Some(existing) => existing.points = existing.points.saturating_add(event.amount),
        None => entry.monthly_data.push(MonthlyPoints {
            month,
            points: event.amount,
        }),
    }

    match entry
        .category_data
        .iter_mut()
        .find(|c| c.category == display_name)
    {
        Some(existing) => existing.points = existing.points.saturating_add(event.amount),
        None => entry.category_data.push(CategoryPoints {
            category: display_name.to_string(),
            points: event.amount,
            percentage: 0,
            color: category.color().to_string(),
        }),
    }

    recompute_percentages(&mut entry.category_data);
    entry.updated_at = now;

    debug!(
        "Applied {} points ({}) to {}, total now {}",
        event.amount, category, entry.user_id, entry.total_points
    );
}

/// Short month label, e.g. "Jan", taken in UTC.
pub fn month_label(now: DateTime<Utc>) -> String {
    now.format("%b").to_string()
}

/// Recompute each category's share of the summed category points.
///
/// Shares are rounded half-up independently, so their sum may differ from
/// 100 by at most the number of categories.
fn recompute_percentages(categories: &mut [CategoryPoints]) {
    let total: u128 = categories.iter().map(|c| c.points as u128).sum();
    if total == 0 {
        return;
    }

    for category in categories.iter_mut() {
        let points = category.points as u128;
        category.percentage = ((200 * points + total) / (2 * total)) as u32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::category::Category;
    use crate::error::LedgerError;
    use chrono::TimeZone;

    fn jan() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 15, 12, 0, 0).unwrap()
    }

    fn feb() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 3, 8, 30, 0).unwrap()
    }

    fn percentage_total(entry: &LedgerEntry) -> u32 {
        entry.category_data.iter().map(|c| c.percentage).sum()
    }

    fn fresh() -> LedgerEntry {
        LedgerEntry::new("user-1", jan())
    }

    #[test]
    fn test_first_award() {
        let mut entry = fresh();
        let event = AwardEvent::new(Category::DailyLogin, "Daily Check-in", 25);
        apply_award_at(&mut entry, &event, jan());

        assert_eq!(entry.total_points, 25);
        assert_eq!(entry.transactions.len(), 1);

        let tx = &entry.transactions[0];
        assert_eq!(tx.category, Category::DailyLogin);
        assert_eq!(tx.kind, "Daily Login");
        assert_eq!(tx.name, "Daily Check-in");
        assert_eq!(tx.amount, 25);
        assert_eq!(tx.timestamp, jan());

        assert_eq!(
            entry.monthly_data,
            vec![MonthlyPoints {
                month: "Jan".to_string(),
                points: 25
            }]
        );
        assert_eq!(
            entry.category_data,
            vec![CategoryPoints {
                category: "Daily Login".to_string(),
                points: 25,
                percentage: 100,
                color: "#00CEC9".to_string(),
            }]
        );
        assert_eq!(entry.updated_at, jan());
    }

    #[test]
    fn test_history_is_capped_newest_first() {
        let mut entry = fresh();
        let start = jan();
        for i in 0..51 {
            let event = AwardEvent::new(Category::Task, format!("task {}", i), 1);
            apply_award_at(&mut entry, &event, start + chrono::Duration::seconds(i));
        }

        assert_eq!(entry.transactions.len(), MAX_TRANSACTIONS);
        assert_eq!(entry.total_points, 51);
        assert_eq!(entry.transactions[0].name, "task 50");
        assert_eq!(entry.transactions[49].name, "task 1");
        assert!(entry
            .transactions
            .windows(2)
            .all(|w| w[0].timestamp >= w[1].timestamp));

        // Aggregates are unaffected by the history cap
        assert_eq!(entry.category(Category::Task).unwrap().points, 51);
        assert_eq!(entry.month_points("Jan"), Some(51));
    }

    #[test]
    fn test_monthly_aggregate_per_label() {
        let mut entry = fresh();
        apply_award_at(&mut entry, &AwardEvent::new(Category::Task, "a", 10), jan());
        apply_award_at(&mut entry, &AwardEvent::new(Category::Task, "b", 5), jan());
        apply_award_at(&mut entry, &AwardEvent::new(Category::Referral, "c", 200), feb());

        assert_eq!(entry.monthly_data.len(), 2);
        assert_eq!(entry.month_points("Jan"), Some(15));
        assert_eq!(entry.month_points("Feb"), Some(200));
        assert_eq!(entry.monthly_data[0].month, "Jan");
    }

    #[test]
    fn test_percentages_recomputed_for_all_categories() {
        let mut entry = fresh();
        apply_award_at(&mut entry, &AwardEvent::new(Category::DailyLogin, "a", 25), jan());
        apply_award_at(&mut entry, &AwardEvent::new(Category::Referral, "b", 75), jan());

        assert_eq!(entry.category(Category::DailyLogin).unwrap().percentage, 25);
        assert_eq!(entry.category(Category::Referral).unwrap().percentage, 75);
        assert_eq!(entry.category(Category::Referral).unwrap().color, "#FDCB6E");
    }

    #[test]
    fn test_percentages_round_half_up() {
        let mut entry = fresh();
        // 1/8 = 12.5% -> 13, 7/8 = 87.5% -> 88
        apply_award_at(&mut entry, &AwardEvent::new(Category::Task, "a", 1), jan());
        apply_award_at(&mut entry, &AwardEvent::new(Category::Referral, "b", 7), jan());

        assert_eq!(entry.category(Category::Task).unwrap().percentage, 13);
        assert_eq!(entry.category(Category::Referral).unwrap().percentage, 88);
        assert_eq!(percentage_total(&entry), 101);
    }

    #[test]
    fn test_percentage_sum_within_tolerance() {
        let amounts = [1u64, 3, 7, 25, 50, 75, 100, 150, 200, 250, 300, 500, 1000];
        let mut entry = fresh();

        for step in 0..200usize {
            let category = Category::ALL[(step * 7 + step / 3) % Category::ALL.len()];
            let amount = amounts[(step * 5 + 1) % amounts.len()];
            apply_award_at(&mut entry, &AwardEvent::new(category, "x", amount), jan());

            let total = percentage_total(&entry) as i64;
            let tolerance = entry.category_data.len() as i64;
            assert!(
                (total - 100).abs() <= tolerance,
                "step {}: percentages sum to {}",
                step,
                total
            );
            assert!(entry.transactions.len() <= MAX_TRANSACTIONS);
        }
    }

    #[test]
    fn test_category_totals_match_awarded() {
        let mut entry = fresh();
        let mut expected = [0u64; 4];

        for step in 0..120u64 {
            let idx = (step % 4) as usize;
            let amount = step + 1;
            expected[idx] += amount;
            apply_award_at(
                &mut entry,
                &AwardEvent::new(Category::ALL[idx], "x", amount),
                jan(),
            );
        }

        for (idx, category) in Category::ALL.into_iter().enumerate() {
            assert_eq!(entry.category(category).unwrap().points, expected[idx]);
        }
        let category_sum: u64 = entry.category_data.iter().map(|c| c.points).sum();
        assert_eq!(category_sum, entry.total_points);
    }

    #[test]
    fn test_unknown_category_leaves_entry_unchanged() {
        let mut entry = fresh();
        apply_award_at(&mut entry, &AwardEvent::new(Category::Task, "a", 10), jan());
        let before = entry.clone();

        let err = apply_raw_award(&mut entry, "bogus", "x", 10, feb()).unwrap_err();
        assert!(matches!(err, LedgerError::UnknownCategory(_)));
        assert_eq!(entry, before);
    }

    #[test]
    fn test_raw_award_applies_valid_input() {
        let mut entry = fresh();
        apply_raw_award(&mut entry, "achievement", "Level Up", 250, jan()).unwrap();
        assert_eq!(entry.total_points, 250);
        assert_eq!(entry.category(Category::Achievement).unwrap().percentage, 100);
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(jan()), "Jan");
        assert_eq!(month_label(feb()), "Feb");
    }
}
