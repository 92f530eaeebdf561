use crate::error::AnalyticsError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// Reserved key of the combined, all-groups series.
pub const ALL_KEY: &str = "__ALL__";
/// Group for records without a symbol/coin.
pub const UNKNOWN_KEY: &str = "UNKNOWN";

/// A single `(timestamp, cumulative_value)` sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

/// Parallel sequences: one timestamp axis, one running total per metric.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub timestamps: Vec<DateTime<Utc>>,
    pub values: BTreeMap<String, Vec<Decimal>>,
}

impl Series {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<DateTime<Utc>> {
        self.timestamps.last().copied()
    }

    pub fn values(&self, metric: &str) -> Option<&[Decimal]> {
        self.values.get(metric).map(Vec::as_slice)
    }

    /// The running total at the last point, zero for an empty series.
    pub fn final_value(&self, metric: &str) -> Decimal {
        self.values(metric)
            .and_then(|v| v.last().copied())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn points(&self, metric: &str) -> Result<Vec<SeriesPoint>, AnalyticsError> {
        let values = self
            .values(metric)
            .ok_or_else(|| AnalyticsError::UnknownMetric(metric.to_string()))?;
        Ok(self
            .timestamps
            .iter()
            .zip(values)
            .map(|(&timestamp, &value)| SeriesPoint { timestamp, value })
            .collect())
    }
}

/// Cumulative series per group plus the combined series under [`ALL_KEY`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GroupedSeries {
    pub metrics: Vec<String>,
    pub(crate) series: BTreeMap<String, Series>,
}

impl GroupedSeries {
    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Series> {
        self.series.get(key)
    }

    pub fn combined(&self) -> Option<&Series> {
        self.series.get(ALL_KEY)
    }

    /// Real groups in key order, without the combined series.
    pub fn groups(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.series
            .iter()
            .filter(|(key, _)| key.as_str() != ALL_KEY)
            .map(|(key, series)| (key.as_str(), series))
    }

    pub fn group_count(&self) -> usize {
        self.groups().count()
    }

    /// Every series, real groups first and the combined one last.
    pub fn iter_with_total(&self) -> impl Iterator<Item = (&str, &Series)> {
        self.groups()
            .chain(self.combined().map(|series| (ALL_KEY, series)))
    }
}
