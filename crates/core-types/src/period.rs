use crate::error::CoreError;
use crate::structs::TimeWindow;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A named reporting period, resolved against "now" in UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    Today,
    Yesterday,
    CurrentMonth,
    PreviousMonth,
    Custom {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl Period {
    /// Builds a period from the form/CLI selector. `custom` needs both dates.
    pub fn parse(kind: &str, start: Option<&str>, end: Option<&str>) -> Result<Self, CoreError> {
        match kind.trim() {
            "today" => Ok(Period::Today),
            "yesterday" => Ok(Period::Yesterday),
            "current_month" => Ok(Period::CurrentMonth),
            "previous_month" => Ok(Period::PreviousMonth),
            "custom" => {
                match (non_empty(start), non_empty(end)) {
                    (Some(start), Some(end)) => {
                        let start = parse_datetime(start)?;
                        let end = parse_datetime(end)?;
                        if start > end {
                            return Err(CoreError::InvalidInput(
                                "custom range".to_string(),
                                format!("start {} is after end {}", start, end),
                            ));
                        }
                        Ok(Period::Custom { start, end })
                    }
                    _ => Err(CoreError::InvalidInput(
                        "custom range".to_string(),
                        "start and end datetime are required".to_string(),
                    )),
                }
            }
            other => Err(CoreError::InvalidInput("period".to_string(), other.to_string())),
        }
    }

    pub fn slug(&self) -> &'static str {
        match self {
            Period::Today => "today",
            Period::Yesterday => "yesterday",
            Period::CurrentMonth => "current_month",
            Period::PreviousMonth => "previous_month",
            Period::Custom { .. } => "custom",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Period::Today => "Today",
            Period::Yesterday => "Yesterday",
            Period::CurrentMonth => "Current Month",
            Period::PreviousMonth => "Previous Month",
            Period::Custom { .. } => "Custom Period",
        }
    }

    /// The millisecond window this period covers at `now`.
    ///
    /// Whole days end at 23:59:59.999; the current month ends at `now`.
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<TimeWindow, CoreError> {
        let today = now.date_naive();
        match self {
            Period::Today => day_window(today),
            Period::Yesterday => day_window(today - Duration::days(1)),
            Period::CurrentMonth => TimeWindow::from_datetimes(start_of_day(first_of_month(today)), now),
            Period::PreviousMonth => {
                let this_month = start_of_day(first_of_month(today));
                let last_month = first_of_month(today - Duration::days(today.day() as i64));
                TimeWindow::from_datetimes(
                    start_of_day(last_month),
                    this_month - Duration::milliseconds(1),
                )
            }
            Period::Custom { start, end } => TimeWindow::from_datetimes(*start, *end),
        }
    }

    /// Calendar tag identifying the data this period refers to at `now`.
    /// "today" rolls over at UTC midnight, month periods at month change.
    pub fn cache_tag(&self, now: DateTime<Utc>) -> String {
        let today = now.date_naive();
        match self {
            Period::Today => today.format("%Y-%m-%d").to_string(),
            Period::Yesterday => (today - Duration::days(1)).format("%Y-%m-%d").to_string(),
            Period::CurrentMonth => today.format("%Y-%m").to_string(),
            Period::PreviousMonth => (first_of_month(today) - Duration::days(1))
                .format("%Y-%m")
                .to_string(),
            Period::Custom { start, end } => format!(
                "{}_{}",
                start.format("%Y-%m-%dT%H:%M:%S%.3f"),
                end.format("%Y-%m-%dT%H:%M:%S%.3f")
            ),
        }
    }
}

/// Accepts `datetime-local` form values (`2024-05-01T13:30`), full ISO
/// datetimes, RFC 3339, or a bare date. Values without an offset are UTC.
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>, CoreError> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(start_of_day(date));
    }
    Err(CoreError::InvalidInput("datetime".to_string(), value.to_string()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn start_of_day(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(chrono::NaiveTime::MIN))
}

fn day_window(date: NaiveDate) -> Result<TimeWindow, CoreError> {
    let start = start_of_day(date);
    TimeWindow::from_datetimes(start, start + Duration::days(1) - Duration::milliseconds(1))
}
