use crate::error::{BillingError, Result};
use crate::schema::Record;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A calendar month forms are billed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawBillingPeriod")]
pub struct BillingPeriod {
    month: u32,
    year: i32,
}

#[derive(Deserialize)]
struct RawBillingPeriod {
    month: u32,
    year: i32,
}

impl TryFrom<RawBillingPeriod> for BillingPeriod {
    type Error = BillingError;

    fn try_from(raw: RawBillingPeriod) -> Result<Self> {
        Self::new(raw.month, raw.year)
    }
}

impl BillingPeriod {
    pub fn new(month: u32, year: i32) -> Result<Self> {
        validate_month(month)?;
        if !(1000..=9999).contains(&year) {
            return Err(BillingError::InvalidYear(year.to_string()));
        }
        Ok(Self { month, year })
    }

    /// Builds a period from command-line style input such as `("4", "2025")`.
    pub fn parse(month: &str, year: &str) -> Result<Self> {
        let month_str = month.trim();
        if month_str.is_empty() || !month_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(BillingError::InvalidMonth(month.to_string()));
        }
        let month_num: u32 = month_str
            .parse()
            .map_err(|_| BillingError::InvalidMonth(month.to_string()))?;

        let year_str = year.trim();
        if year_str.len() != 4 || !year_str.chars().all(|c| c.is_ascii_digit()) {
            return Err(BillingError::InvalidYear(year.to_string()));
        }
        let year_num: i32 = year_str
            .parse()
            .map_err(|_| BillingError::InvalidYear(year.to_string()))?;

        if !(1..=12).contains(&month_num) {
            return Err(BillingError::InvalidMonth(month.to_string()));
        }
        Self::new(month_num, year_num)
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Canonical key, e.g. `04_2025`.
    pub fn key(&self) -> String {
        period_key(self.month, self.year)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date.month() == self.month && date.year() == self.year
    }
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

fn period_key(month: u32, year: i32) -> String {
    format!("{:02}_{:04}", month, year)
}

pub fn validate_month(month: u32) -> Result<()> {
    if !(1..=12).contains(&month) {
        return Err(BillingError::InvalidMonth(month.to_string()));
    }
    Ok(())
}

/// Extracts the calendar date from a deployment timestamp as written,
/// without converting between timezones.
pub fn parse_deployment_date(timestamp: &str) -> Option<NaiveDate> {
    let raw = timestamp.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local().date());
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt.date());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Canonical period key of a raw timestamp, or `None` if it cannot be parsed.
pub fn period_key_of(timestamp: &str) -> Option<String> {
    parse_deployment_date(timestamp).map(|date| period_key(date.month(), date.year()))
}

pub fn classify(record: &Record, period: &BillingPeriod) -> bool {
    record
        .deployment_timestamp
        .as_deref()
        .and_then(parse_deployment_date)
        .is_some_and(|date| period.contains(date))
}

pub fn select_period(records: &[Record], period: &BillingPeriod) -> Vec<Record> {
    records
        .iter()
        .filter(|record| classify(record, period))
        .cloned()
        .collect()
}
