use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// One row of the summary table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: String,
    /// The group key, or the profile's total label for the combined row.
    pub display_name: String,
    pub is_total: bool,
    /// Number of records in the group.
    pub count: usize,
    /// Final cumulative value per metric.
    pub totals: BTreeMap<String, Decimal>,
    /// Inflow minus outflow, only for profiles that define one.
    pub net_flow: Option<Decimal>,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// Per-group totals with the combined row last.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Summary {
    /// Real groups only; the combined row is not counted.
    pub total_groups: usize,
    pub metrics: Vec<String>,
    pub rows: Vec<GroupSummary>,
}

impl Summary {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn total(&self) -> Option<&GroupSummary> {
        self.rows.iter().find(|row| row.is_total)
    }
}
