//! Run context: the dates and settings every stage shares.
//!
//! Built once by the orchestrator and passed by reference; nothing here
//! outlives a single run.

use chrono::NaiveDate;
use uuid::Uuid;

use crate::calendar::TradingCalendar;
use crate::config::AppConfig;
use crate::error::CalendarError;

/// Context for one report run.
#[derive(Debug)]
pub struct RunContext<'a> {
    /// Correlates log lines of one run.
    pub run_id: Uuid,
    pub config: &'a AppConfig,
    pub calendar: TradingCalendar,
    /// The business date whose data is reported (T-1 of today).
    pub date: NaiveDate,
}

impl<'a> RunContext<'a> {
    /// Resolve the reporting date from the calendar's "today".
    pub fn new(config: &'a AppConfig, calendar: TradingCalendar) -> Result<Self, CalendarError> {
        let date = calendar.require_prev(None)?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            config,
            calendar,
            date,
        })
    }

    pub fn today(&self) -> NaiveDate {
        self.calendar.today()
    }

    /// Trading day before the reporting date, used by the stale-file fallback.
    pub fn fallback_date(&self) -> Result<NaiveDate, CalendarError> {
        self.calendar.require_prev(Some(self.date))
    }

    /// Template date tag for the reporting date, e.g. `9月18日`.
    pub fn date_tag(&self) -> String {
        date_tag(self.date)
    }
}

/// Render the month/day tag used as a column header in the report.
pub fn date_tag(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}月{}日", date.month(), date.day())
}
