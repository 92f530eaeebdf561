use core_types::{Dataset, Endpoint, RawRecord};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Pulls one metric's delta out of a raw record.
pub type Extractor = fn(&RawRecord) -> Decimal;

/// One cumulative metric.
#[derive(Debug, Clone, Copy)]
pub struct Metric {
    pub name: &'static str,
    pub label: &'static str,
    /// Decimal places used when displaying totals.
    pub decimals: u32,
    pub extract: Extractor,
}

/// How raw records of a dataset are grouped, ordered and accumulated.
#[derive(Debug, Clone)]
pub struct AggregationProfile {
    /// Record field naming the group (symbol or coin).
    pub group_field: &'static str,
    /// Timestamp fields, first present wins.
    pub time_fields: &'static [&'static str],
    pub metrics: Vec<Metric>,
    /// Label for the combined row and line.
    pub total_label: &'static str,
    /// `(inflow, outflow)` metric names for the net-flow figure, if any.
    pub net_flow: Option<(&'static str, &'static str)>,
}

impl AggregationProfile {
    pub fn for_dataset(dataset: Dataset) -> Self {
        match dataset {
            Dataset::ClosedPnl => Self::closed_pnl(),
            Dataset::Executions => Self::executions(),
            Dataset::Treasury => Self::treasury(),
        }
    }

    /// Closed positions: realised PnL, open+close fees, entry+exit value.
    pub fn closed_pnl() -> Self {
        Self {
            group_field: "symbol",
            time_fields: &["updatedTime"],
            metrics: vec![
                Metric { name: "pnl", label: "PnL", decimals: 4, extract: closed_pnl },
                Metric { name: "fees", label: "Fees", decimals: 4, extract: position_fees },
                Metric { name: "volume", label: "Volume", decimals: 2, extract: position_volume },
            ],
            total_label: "ALL SYMBOLS (TOTAL)",
            net_flow: None,
        }
    }

    pub fn executions() -> Self {
        Self {
            group_field: "symbol",
            time_fields: &["execTime"],
            metrics: vec![
                Metric { name: "volume", label: "Volume", decimals: 2, extract: execution_volume },
                Metric { name: "fees", label: "Fees", decimals: 4, extract: execution_fee },
                Metric { name: "maker_volume", label: "Maker Volume", decimals: 2, extract: maker_volume },
            ],
            total_label: "ALL SYMBOLS (TOTAL)",
            net_flow: None,
        }
    }

    /// Wallet movements grouped by coin, split by the endpoint that reported them.
    pub fn treasury() -> Self {
        Self {
            group_field: "coin",
            time_fields: &["timestamp", "createTime", "successAt"],
            metrics: vec![
                Metric { name: "deposits", label: "Deposits", decimals: 4, extract: deposits },
                Metric { name: "withdrawals", label: "Withdrawals", decimals: 4, extract: withdrawals },
                Metric { name: "internal_transfers", label: "Internal Transfers", decimals: 4, extract: internal_transfers },
                Metric { name: "universal_transfers", label: "Universal Transfers", decimals: 4, extract: universal_transfers },
            ],
            total_label: "ALL COINS (TOTAL)",
            net_flow: Some(("deposits", "withdrawals")),
        }
    }

    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.iter().find(|m| m.name == name)
    }

    pub fn metric_names(&self) -> Vec<String> {
        self.metrics.iter().map(|m| m.name.to_string()).collect()
    }

    pub fn group_key(&self, record: &RawRecord) -> String {
        record
            .text(self.group_field)
            .unwrap_or_else(|| crate::series::UNKNOWN_KEY.to_string())
    }

    pub fn timestamp(&self, record: &RawRecord) -> DateTime<Utc> {
        record.timestamp(self.time_fields)
    }
}

fn closed_pnl(r: &RawRecord) -> Decimal {
    r.decimal("closedPnl")
}

fn position_fees(r: &RawRecord) -> Decimal {
    r.decimal("openFee").saturating_add(r.decimal("closeFee"))
}

fn position_volume(r: &RawRecord) -> Decimal {
    r.decimal("cumEntryValue").saturating_add(r.decimal("cumExitValue"))
}

fn execution_volume(r: &RawRecord) -> Decimal {
    let value = r.decimal("execValue");
    if value.is_zero() {
        r.decimal("execQty").saturating_mul(r.decimal("execPrice"))
    } else {
        value
    }
}

fn execution_fee(r: &RawRecord) -> Decimal {
    r.decimal("execFee")
}

fn maker_volume(r: &RawRecord) -> Decimal {
    if r.flag("isMaker") {
        execution_volume(r)
    } else {
        Decimal::ZERO
    }
}

fn amount_from(r: &RawRecord, endpoint: Endpoint) -> Decimal {
    match r.text(RawRecord::SOURCE_FIELD) {
        Some(source) if source == endpoint.as_str() => r.decimal("amount"),
        _ => Decimal::ZERO,
    }
}

fn deposits(r: &RawRecord) -> Decimal {
    amount_from(r, Endpoint::Deposits)
}

fn withdrawals(r: &RawRecord) -> Decimal {
    amount_from(r, Endpoint::Withdrawals)
}

fn internal_transfers(r: &RawRecord) -> Decimal {
    amount_from(r, Endpoint::InternalTransfers)
}

fn universal_transfers(r: &RawRecord) -> Decimal {
    amount_from(r, Endpoint::UniversalTransfers)
}
