//! Consecutive-day streaks over a set of completion days.

use crate::domain::DateKey;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Streaks {
    /// Run ending at the latest completion, or 0 once more than a day has passed since it.
    pub current: u32,
    pub longest: u32,
}

/// Computes current and longest streaks as of `as_of`.
///
/// A run grows only when the next day is exactly one calendar day after the
/// previous one. Any other gap, including a zero-day gap from a duplicated
/// day, starts a new run of length 1.
pub fn compute_streaks(dates: &[DateKey], as_of: DateKey) -> Streaks {
    let mut sorted = dates.to_vec();
    sorted.sort_unstable();

    let Some(&last) = sorted.last() else {
        return Streaks::default();
    };

    let mut run = 0u32;
    let mut longest = 0u32;
    let mut previous: Option<DateKey> = None;

    for &date in &sorted {
        run = match previous {
            Some(prev) if prev.days_until(date) == 1 => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }

    let current = if last.days_until(as_of) > 1 { 0 } else { run };

    Streaks { current, longest }
}
