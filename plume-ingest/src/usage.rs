//! Per-user daily spend tracking.
//!
//! An explicit component with injected storage rather than ambient global
//! state: single-instance deployments use the in-memory map; a shared cache
//! can stand in behind the same trait for multi-instance ones. State starts
//! empty on process start and stale days are pruned opportunistically as
//! charges land.

use chrono::NaiveDate;
use dashmap::DashMap;

pub trait UsageStore: Send + Sync {
    /// Items already granted to this user on `day`.
    fn used(&self, user_id: &str, day: NaiveDate) -> u32;

    /// Record `amount` more granted items for this user on `day`.
    fn charge(&self, user_id: &str, day: NaiveDate, amount: u32);
}

#[derive(Debug, Clone, Copy)]
struct DayCount {
    day: NaiveDate,
    count: u32,
}

#[derive(Default)]
pub struct MemoryUsage {
    entries: DashMap<String, DayCount>,
}

impl MemoryUsage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UsageStore for MemoryUsage {
    fn used(&self, user_id: &str, day: NaiveDate) -> u32 {
        self.entries
            .get(user_id)
            .filter(|e| e.day == day)
            .map(|e| e.count)
            .unwrap_or(0)
    }

    fn charge(&self, user_id: &str, day: NaiveDate, amount: u32) {
        self.entries
            .entry(user_id.to_string())
            .and_modify(|e| {
                if e.day == day {
                    e.count = e.count.saturating_add(amount);
                } else {
                    *e = DayCount { day, count: amount };
                }
            })
            .or_insert(DayCount { day, count: amount });

        // Earlier days are dead weight once any charge lands on a newer one.
        self.entries.retain(|_, e| e.day >= day);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn charges_accumulate_within_a_day() {
        let usage = MemoryUsage::new();
        let today = day("2026-08-06");
        assert_eq!(usage.used("u1", today), 0);
        usage.charge("u1", today, 30);
        usage.charge("u1", today, 12);
        assert_eq!(usage.used("u1", today), 42);
        assert_eq!(usage.used("u2", today), 0);
    }

    #[test]
    fn day_rollover_resets_the_count() {
        let usage = MemoryUsage::new();
        usage.charge("u1", day("2026-08-05"), 100);
        let today = day("2026-08-06");
        assert_eq!(usage.used("u1", today), 0);
        usage.charge("u1", today, 5);
        assert_eq!(usage.used("u1", today), 5);
    }

    #[test]
    fn stale_entries_are_pruned_on_charge() {
        let usage = MemoryUsage::new();
        usage.charge("old", day("2026-08-01"), 10);
        usage.charge("new", day("2026-08-06"), 1);
        assert_eq!(usage.entries.len(), 1);
    }
}
