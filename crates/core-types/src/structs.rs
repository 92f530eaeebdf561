use crate::error::CoreError;
use crate::record::RawRecord;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An inclusive `[start, end]` range of millisecond timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn new(start: i64, end: i64) -> Result<Self, CoreError> {
        if start > end {
            return Err(CoreError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn from_datetimes(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, CoreError> {
        Self::new(start.timestamp_millis(), end.timestamp_millis())
    }

    pub fn span_ms(&self) -> i64 {
        self.end - self.start
    }

    pub fn start_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.start).single().unwrap_or_default()
    }

    pub fn end_utc(&self) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(self.end).single().unwrap_or_default()
    }

    /// Splits the window into consecutive sub-windows whose span is at most
    /// `max_span_ms`. Each sub-window starts one millisecond after the previous
    /// one ends, so every millisecond of `self` is covered exactly once.
    /// A window that already fits is returned unchanged.
    pub fn split(&self, max_span_ms: i64) -> Vec<TimeWindow> {
        if max_span_ms <= 0 || self.span_ms() <= max_span_ms {
            return vec![*self];
        }

        let mut windows = Vec::new();
        let mut current_start = self.start;
        while current_start <= self.end {
            let current_end = current_start.saturating_add(max_span_ms).min(self.end);
            windows.push(TimeWindow {
                start: current_start,
                end: current_end,
            });
            if current_end == self.end {
                break;
            }
            current_start = current_end + 1;
        }
        windows
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start_utc(), self.end_utc())
    }
}

/// One response page: the records plus the cursor for the next page, if any.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<String>,
}

impl Page {
    /// Pagination continues only while a page is non-empty and names a cursor.
    pub fn has_more(&self) -> bool {
        !self.records.is_empty() && self.next_cursor.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// API key pair for one account.
///
/// `Debug` masks both values so credentials never reach the logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            api_secret: api_secret.into().trim().to_string(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let masked_key = if self.api_key.chars().count() > 8 {
            let head: String = self.api_key.chars().take(4).collect();
            let mut tail: Vec<char> = self.api_key.chars().rev().take(4).collect();
            tail.reverse();
            format!("{}...{}", head, tail.into_iter().collect::<String>())
        } else {
            "***REDACTED***".to_string()
        };

        f.debug_struct("Credentials")
            .field("api_key", &masked_key)
            .field("api_secret", &"***REDACTED***")
            .finish()
    }
}
