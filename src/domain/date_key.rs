use crate::domain::DateKeyError;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A calendar day with no time-of-day and no timezone.
///
/// Every comparison, grouping and range check in the crate happens on
/// `DateKey`s. Raw timestamps are converted exactly once, at the boundary,
/// by reading their UTC fields; plain `YYYY-MM-DD` strings are read as
/// integers and never pass through a zoned value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(year: i32, month: u32, day: u32) -> Result<Self, DateKeyError> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(Self)
            .ok_or(DateKeyError::Impossible { year, month, day })
    }

    pub fn from_naive(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Calendar day of an instant, read from its UTC fields.
    pub fn from_instant(instant: DateTime<Utc>) -> Self {
        Self(instant.date_naive())
    }

    /// The viewer's current calendar day.
    pub fn today() -> Self {
        Self(Local::now().date_naive())
    }

    /// Parses a plain `YYYY-MM-DD` string or a full timestamp.
    ///
    /// Timestamps may use `T` or a space between date and time, and carry
    /// `Z`, a numeric offset, or no offset at all (read as UTC).
    pub fn parse(input: &str) -> Result<Self, DateKeyError> {
        let input = input.trim();
        if input.len() == 10 {
            return Self::parse_calendar(input);
        }

        let normalized = match input.as_bytes().get(10) {
            Some(b' ') => format!("{}T{}", &input[..10], &input[11..]),
            Some(b'T') | Some(b't') => input.to_string(),
            _ => return Err(DateKeyError::Malformed(input.to_string())),
        };

        if let Ok(instant) = DateTime::parse_from_rfc3339(&normalized) {
            return Ok(Self::from_instant(instant.with_timezone(&Utc)));
        }

        NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| Self::from_instant(naive.and_utc()))
            .map_err(|_| DateKeyError::Malformed(input.to_string()))
    }

    fn parse_calendar(input: &str) -> Result<Self, DateKeyError> {
        let malformed = || DateKeyError::Malformed(input.to_string());

        let mut parts = input.split('-');
        let (Some(year), Some(month), Some(day), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };

        let all_digits = |s: &str, width: usize| s.len() == width && s.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(year, 4) || !all_digits(month, 2) || !all_digits(day, 2) {
            return Err(malformed());
        }

        let year: i32 = year.parse().map_err(|_| malformed())?;
        let month: u32 = month.parse().map_err(|_| malformed())?;
        let day: u32 = day.parse().map_err(|_| malformed())?;

        Self::new(year, month, day)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    pub fn as_naive(&self) -> NaiveDate {
        self.0
    }

    /// `YYYY-MM-DD`, the form used to mark calendar days.
    pub fn to_calendar_string(&self) -> String {
        self.0.format("%Y-%m-%d").to_string()
    }

    /// UTC midnight of this day, the form stored in `habit_trackings`.
    pub fn to_utc_instant(&self) -> String {
        self.0
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.and_utc().to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_default()
    }

    /// Whole calendar days from `self` to `later`; negative when `later` is earlier.
    pub fn days_until(&self, later: DateKey) -> i64 {
        (later.0 - self.0).num_days()
    }

    pub fn add_days(&self, days: i64) -> Self {
        Self(self.0 + Duration::days(days))
    }

    pub fn succ(&self) -> Self {
        self.add_days(1)
    }

    pub fn pred(&self) -> Self {
        self.add_days(-1)
    }

    pub fn first_of_month(&self) -> Self {
        Self(self.0 - Duration::days(i64::from(self.0.day()) - 1))
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_calendar_string())
    }
}

impl FromStr for DateKey {
    type Err = DateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<DateKey> for String {
    fn from(key: DateKey) -> Self {
        key.to_calendar_string()
    }
}

impl TryFrom<String> for DateKey {
    type Error = DateKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NaiveDate> for DateKey {
    fn from(date: NaiveDate) -> Self {
        Self(date)
    }
}
