//! Completion rates since creation and per calendar month.

use crate::domain::{DateKey, DateRange};
use serde::Serialize;
use std::collections::BTreeSet;

pub const DEFAULT_MONTHS_BACK: u32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OverallStats {
    pub total_days: u32,
    pub completed_days: u32,
    pub rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthStats {
    pub label: String,
    pub year: i32,
    pub month: u32,
    pub completed_days: u32,
    pub total_days_in_window: u32,
    pub rate: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HabitStats {
    pub overall: OverallStats,
    pub per_month: Vec<MonthStats>,
}

/// Percentage rounded half up, 0 when there is nothing to divide by.
pub fn rate(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (completed, total) = (u64::from(completed), u64::from(total));
    ((completed * 200 + total) / (total * 2)) as u32
}

fn count_within(days: &BTreeSet<DateKey>, range: DateRange) -> u32 {
    if range.is_empty() {
        return 0;
    }
    days.range(range.start..=range.end).count() as u32
}

/// Aggregates completions since `habit_created` and over the `months_back`
/// calendar months ending with the month of `today`, oldest month first.
///
/// The month containing `today` only counts its days up to `today`.
pub fn compute_monthly_stats(
    dates: &[DateKey],
    habit_created: DateKey,
    months_back: u32,
    today: DateKey,
) -> HabitStats {
    let days: BTreeSet<DateKey> = dates.iter().copied().collect();

    let lifetime = DateRange::new(habit_created, today);
    let total_days = lifetime.len();
    let completed_days = count_within(&days, lifetime);
    let overall = OverallStats {
        total_days,
        completed_days,
        rate: rate(completed_days, total_days),
    };

    let mut windows = Vec::with_capacity(months_back as usize);
    let mut month = DateRange::month_of(today);
    for _ in 0..months_back {
        windows.push(month);
        month = DateRange::month_of(month.start.pred());
    }
    windows.reverse();

    let per_month = windows
        .into_iter()
        .map(|month| {
            let window = month.clipped_to(today);
            let total_days_in_window = window.len();
            let completed_days = count_within(&days, window);
            MonthStats {
                label: month.start.as_naive().format("%b").to_string(),
                year: month.start.year(),
                month: month.start.month(),
                completed_days,
                total_days_in_window,
                rate: rate(completed_days, total_days_in_window),
            }
        })
        .collect();

    HabitStats { overall, per_month }
}
