use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Invalid month '{0}', expected YYYY-MM")]
    InvalidMonthKey(String),

    #[error("Invalid granularity '{0}', expected weekly or monthly")]
    InvalidGranularity(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Week,
    Month,
}

impl Granularity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Granularity::Week => "week",
            Granularity::Month => "month",
        }
    }
}

impl FromStr for Granularity {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            _ => Err(CalendarError::InvalidGranularity(s.to_string())),
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A half-open calendar interval `[start, end)` used as an aggregation key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    /// `"2024-03"` for months, `"2024-W09"` for ISO weeks.
    pub key: String,
    pub label: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Position within the requested range, starting at 0.
    pub sequence_index: usize,
}

impl Period {
    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        self.start <= timestamp && timestamp < self.end
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start.date_naive()
    }

    /// Last calendar day inside the period.
    pub fn last_day(&self) -> NaiveDate {
        let end = self.end.date_naive();
        end.pred_opt().unwrap_or(end)
    }
}

/// ISO-8601 week identifier. The year is the ISO week-numbering year, which
/// differs from the calendar year around January 1st.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IsoWeekId {
    pub year: i32,
    pub week: u32,
}

impl fmt::Display for IsoWeekId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// ISO week of a date: the week containing the date's Thursday, counted from
/// the week containing January 4th of that Thursday's year.
pub fn iso_week(date: NaiveDate) -> IsoWeekId {
    let week = date.iso_week();
    IsoWeekId {
        year: week.year(),
        week: week.week(),
    }
}

/// A calendar month, always valid and with a representable successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    first: NaiveDate,
}

impl MonthKey {
    /// `month` is 1-based.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        let first = NaiveDate::from_ymd_opt(year, month, 1)?;
        Self::from_first_day(first)
    }

    fn from_first_day(first: NaiveDate) -> Option<Self> {
        // The end boundary of the month must be representable too
        first.checked_add_months(Months::new(1))?;
        Some(Self { first })
    }

    /// The month a date falls in.
    pub fn containing(date: NaiveDate) -> Option<Self> {
        Self::new(date.year(), date.month())
    }

    pub fn year(&self) -> i32 {
        self.first.year()
    }

    pub fn month(&self) -> u32 {
        self.first.month()
    }

    pub fn first_day(&self) -> NaiveDate {
        self.first
    }

    fn next_first_day(&self) -> NaiveDate {
        self.first
            .checked_add_months(Months::new(1))
            .unwrap_or(self.first)
    }

    /// Last calendar day of the month, leap years included.
    pub fn last_day(&self) -> NaiveDate {
        let next = self.next_first_day();
        next.pred_opt().unwrap_or(next)
    }

    pub fn succ(&self) -> Option<Self> {
        Self::from_first_day(self.next_first_day())
    }

    /// The same month `years` years away (negative goes back).
    pub fn shift_years(&self, years: i32) -> Option<Self> {
        Self::new(self.year().checked_add(years)?, self.month())
    }

    fn period(&self, sequence_index: usize) -> Period {
        Period {
            key: self.to_string(),
            label: self.first.format("%B %Y").to_string(),
            start: midnight(self.first),
            end: midnight(self.next_first_day()),
            sequence_index,
        }
    }
}

impl FromStr for MonthKey {
    type Err = CalendarError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || CalendarError::InvalidMonthKey(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(invalid)?;
        if year.len() != 4 || month.is_empty() || month.len() > 2 {
            return Err(invalid());
        }
        let year: i32 = year.parse().map_err(|_| invalid())?;
        let month: u32 = month.parse().map_err(|_| invalid())?;
        MonthKey::new(year, month).ok_or_else(invalid)
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

/// Full Monday-to-Sunday weeks covering a month. `month_index` is 0-based.
///
/// The first week starts on the Monday on or before the 1st and the last one
/// ends on the first Sunday on or after the month's last day, so edge weeks
/// include days of the adjacent months. An out-of-range month yields no
/// periods.
pub fn weeks(year: i32, month_index: u32) -> Vec<Period> {
    let Some(month) = month_index
        .checked_add(1)
        .and_then(|month| MonthKey::new(year, month))
    else {
        debug!(year, month_index, "no such month, no weeks generated");
        return Vec::new();
    };

    week_periods(month.first_day(), month.last_day())
}

/// One period per calendar month from `from` to `to`, both inclusive.
///
/// An inverted range yields no periods; callers surface that as a validation
/// message.
pub fn months(from: MonthKey, to: MonthKey) -> Vec<Period> {
    if from > to {
        debug!(%from, %to, "inverted month range, no periods generated");
        return Vec::new();
    }

    let mut periods = Vec::new();
    let mut current = Some(from);
    while let Some(month) = current.filter(|month| *month <= to) {
        periods.push(month.period(periods.len()));
        current = month.succ();
    }
    periods
}

/// Contiguous periods covering the inclusive date range `from..=to`: full ISO
/// weeks or full calendar months.
pub fn partition(granularity: Granularity, from: NaiveDate, to: NaiveDate) -> Vec<Period> {
    if from > to {
        debug!(%from, %to, "inverted date range, no periods generated");
        return Vec::new();
    }

    match granularity {
        Granularity::Week => week_periods(from, to),
        Granularity::Month => match (MonthKey::containing(from), MonthKey::containing(to)) {
            (Some(from), Some(to)) => months(from, to),
            _ => Vec::new(),
        },
    }
}

fn week_periods(from: NaiveDate, to: NaiveDate) -> Vec<Period> {
    let offset = u64::from(from.weekday().num_days_from_monday());
    let Some(mut start) = from.checked_sub_days(Days::new(offset)) else {
        return Vec::new();
    };

    let mut periods = Vec::new();
    while start <= to {
        let Some(next) = start.checked_add_days(Days::new(7)) else {
            break;
        };
        periods.push(week_period(start, next, periods.len()));
        start = next;
    }
    periods
}

fn week_period(monday: NaiveDate, next_monday: NaiveDate, sequence_index: usize) -> Period {
    let week = iso_week(monday);
    let sunday = next_monday.pred_opt().unwrap_or(next_monday);
    Period {
        key: week.to_string(),
        label: format!(
            "Week {} ({} - {})",
            week.week,
            monday.format("%b %-d"),
            sunday.format("%b %-d")
        ),
        start: midnight(monday),
        end: midnight(next_monday),
        sequence_index,
    }
}
