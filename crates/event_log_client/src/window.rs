//! Date window for the daily log query.

use chrono::{DateTime, Days, NaiveDate, Utc};

/// Half-open UTC day `[start, end)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DateWindow {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// The UTC calendar day before `now`.
    pub fn previous_utc_day(now: DateTime<Utc>) -> Self {
        let end = now.date_naive();
        // NaiveDate::MIN has no predecessor; nothing real runs there.
        let start = end.checked_sub_days(Days::new(1)).unwrap_or(end);
        Self { start, end }
    }

    /// The day the logs describe.
    pub fn target_date(&self) -> NaiveDate {
        self.start
    }

    pub fn start_literal(&self) -> String {
        soql_datetime(self.start)
    }

    pub fn end_literal(&self) -> String {
        soql_datetime(self.end)
    }

    /// `YYYYMMDD` of the target date.
    pub fn stamp(&self) -> String {
        self.start.format("%Y%m%d").to_string()
    }

    /// SOQL selecting daily `EventLogFile` records of `event_type` inside the window.
    pub fn event_log_query(&self, event_type: &str) -> String {
        format!(
            "SELECT Id, EventType, LogDate, LogFile \
             FROM EventLogFile \
             WHERE EventType = '{}' \
             AND Interval = 'Daily' \
             AND LogDate >= {} \
             AND LogDate < {}",
            event_type,
            self.start_literal(),
            self.end_literal()
        )
    }
}

/// Midnight UTC of `date` as a SOQL datetime literal.
fn soql_datetime(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}
