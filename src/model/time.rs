// src/model/time.rs
//! Time windows, buckets and date parsing.
//!
//! Every window is half-open: `[start, end)`. The same convention is used by
//! the row view date filter and by the block evaluator so table totals and
//! metric values reconcile.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use super::value::Value;

/// Epoch values above this are read as milliseconds rather than seconds.
const MILLIS_THRESHOLD: f64 = 100_000_000_000.0;

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    #[serde(deserialize_with = "deserialize_instant")]
    pub start: DateTime<Utc>,
    #[serde(deserialize_with = "deserialize_instant")]
    pub end: DateTime<Utc>,
}

/// Bucket size for chart series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeGrain {
    Day,
    Week,
    Month,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Window covering the days `start..end` (end date excluded).
    pub fn from_dates(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: start_of_day(start),
            end: start_of_day(end),
        }
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Clip `other` to this window. Disjoint windows yield an empty window.
    pub fn intersect(&self, other: &TimeWindow) -> TimeWindow {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end).max(start);
        TimeWindow { start, end }
    }

    /// The window actually applied: the global window, narrowed to the
    /// selected bucket when one is present.
    pub fn effective(&self, bucket: Option<&TimeWindow>) -> TimeWindow {
        match bucket {
            Some(bucket) => self.intersect(bucket),
            None => *self,
        }
    }

    /// Split into grain-aligned buckets, the first and last clipped to the
    /// window.
    pub fn buckets(&self, grain: TimeGrain) -> Vec<TimeWindow> {
        let mut buckets = Vec::new();
        if self.is_empty() {
            return buckets;
        }

        let mut cursor = grain.floor(self.start.date_naive());
        loop {
            let next = grain.advance(cursor);
            let bucket_start = start_of_day(cursor).max(self.start);
            let bucket_end = start_of_day(next).min(self.end);
            if bucket_start >= self.end {
                break;
            }
            buckets.push(TimeWindow::new(bucket_start, bucket_end));
            cursor = next;
        }
        buckets
    }
}

impl TimeGrain {
    fn floor(&self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeGrain::Day => date,
            TimeGrain::Week => {
                date - Duration::days(date.weekday().num_days_from_monday() as i64)
            }
            TimeGrain::Month => date.with_day(1).unwrap_or(date),
        }
    }

    fn advance(&self, date: NaiveDate) -> NaiveDate {
        match self {
            TimeGrain::Day => date + Duration::days(1),
            TimeGrain::Week => date + Duration::days(7),
            TimeGrain::Month => date
                .checked_add_months(Months::new(1))
                .unwrap_or(NaiveDate::MAX),
        }
    }
}

/// A comparison bound from a filter value.
///
/// Date-only bounds compare at day granularity so that an inclusive upper
/// bound covers the whole day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateBound {
    Day(NaiveDate),
    Instant(DateTime<Utc>),
}

impl DateBound {
    pub fn parse(value: &Value) -> Option<DateBound> {
        match value {
            Value::String(s) => {
                let s = s.trim();
                match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                    Ok(date) => Some(DateBound::Day(date)),
                    Err(_) => parse_instant_str(s).map(DateBound::Instant),
                }
            }
            other => parse_instant(other).map(DateBound::Instant),
        }
    }

    /// Orders an instant relative to this bound.
    pub fn compare(&self, instant: DateTime<Utc>) -> std::cmp::Ordering {
        match self {
            DateBound::Day(date) => instant.date_naive().cmp(date),
            DateBound::Instant(bound) => instant.cmp(bound),
        }
    }
}

/// Read a record value as an instant. Accepts RFC 3339, naive
/// `YYYY-MM-DD[ T]HH:MM:SS`, plain dates and epoch numbers.
pub fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_instant_str(s),
        Value::Number(n) if n.is_finite() => {
            let millis = if n.abs() >= MILLIS_THRESHOLD {
                *n
            } else {
                *n * 1000.0
            };
            Utc.timestamp_millis_opt(millis as i64).single()
        }
        _ => None,
    }
}

pub fn parse_instant_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(start_of_day)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant_str(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid date or timestamp: {}", raw)))
}
