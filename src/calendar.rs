//! Trading calendar: which dates the market was open.
//!
//! Loaded once per run from a CSV file with a `tradedate` column
//! (`yyyymmdd`). Predecessors are looked up by position in the sorted
//! sequence, never by date arithmetic, so holidays and weekends are
//! skipped naturally.

use std::path::Path;

use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::CalendarError;

#[derive(Debug, Deserialize)]
struct CalendarRow {
    tradedate: String,
}

/// Ordered, deduplicated sequence of trading dates plus the run's "today".
#[derive(Debug, Clone)]
pub struct TradingCalendar {
    dates: Vec<NaiveDate>,
    today: NaiveDate,
}

impl TradingCalendar {
    /// Build a calendar from arbitrary dates; they are sorted and deduplicated.
    pub fn new(mut dates: Vec<NaiveDate>, today: NaiveDate) -> Self {
        dates.sort_unstable();
        dates.dedup();
        Self { dates, today }
    }

    /// Load the calendar CSV.
    pub fn load(path: &Path, today: NaiveDate) -> Result<Self, CalendarError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| CalendarError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut dates = Vec::new();
        for row in reader.deserialize::<CalendarRow>() {
            let row = row.map_err(|e| CalendarError::Read {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
            dates.push(parse_trade_date(&row.tradedate)?);
        }

        if dates.is_empty() {
            return Err(CalendarError::Empty {
                path: path.to_path_buf(),
            });
        }

        let calendar = Self::new(dates, today);
        tracing::debug!(
            path = %path.display(),
            dates = calendar.len(),
            "Trading calendar loaded"
        );
        Ok(calendar)
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Whether `date` is a market-open day.
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        self.dates.binary_search(&date).is_ok()
    }

    /// The trading day immediately before `ref_date` (default: today).
    ///
    /// `None` when the reference date is the first entry or is not a
    /// trading day at all.
    pub fn prev_trading_day(&self, ref_date: Option<NaiveDate>) -> Option<NaiveDate> {
        let date = ref_date.unwrap_or(self.today);
        match self.dates.binary_search(&date) {
            Ok(idx) if idx > 0 => Some(self.dates[idx - 1]),
            _ => None,
        }
    }

    /// Like [`prev_trading_day`](Self::prev_trading_day) but an error when absent.
    pub fn require_prev(&self, ref_date: Option<NaiveDate>) -> Result<NaiveDate, CalendarError> {
        self.prev_trading_day(ref_date)
            .ok_or(CalendarError::NoPreviousTradingDay {
                date: ref_date.unwrap_or(self.today),
            })
    }
}

fn parse_trade_date(value: &str) -> Result<NaiveDate, CalendarError> {
    // Spreadsheet exports sometimes render the integer column as `20190918.0`.
    let digits = value.strip_suffix(".0").unwrap_or(value);
    NaiveDate::parse_from_str(digits, "%Y%m%d").map_err(|_| CalendarError::InvalidDate {
        value: value.to_string(),
    })
}
