use crate::domain::DateKey;

/// Inclusive span of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateKey,
    pub end: DateKey,
}

impl DateRange {
    pub fn new(start: DateKey, end: DateKey) -> Self {
        Self { start, end }
    }

    /// The `days` days ending at `end`, oldest first.
    pub fn trailing(end: DateKey, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        Self {
            start: end.add_days(-span),
            end,
        }
    }

    /// The whole calendar month containing `date`.
    pub fn month_of(date: DateKey) -> Self {
        let start = date.first_of_month();
        // Any month is at most 31 days long, so this lands in the next one.
        let end = start.add_days(31).first_of_month().pred();
        Self { start, end }
    }

    /// This range with its end pulled back to `limit` when it runs past it.
    pub fn clipped_to(&self, limit: DateKey) -> Self {
        Self {
            start: self.start,
            end: self.end.min(limit),
        }
    }

    pub fn contains(&self, date: DateKey) -> bool {
        date >= self.start && date <= self.end
    }

    /// Number of days in the range; zero when it is inverted.
    pub fn len(&self) -> u32 {
        u32::try_from(self.start.days_until(self.end) + 1).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn days(&self) -> impl Iterator<Item = DateKey> {
        let start = self.start;
        (0..i64::from(self.len())).map(move |i| start.add_days(i))
    }
}
