use crate::profile::AggregationProfile;
use crate::report::{GroupSummary, Summary};
use crate::series::{ALL_KEY, GroupedSeries, Series};
use chrono::{DateTime, Utc};
use core_types::RawRecord;
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

/// One record reduced to what the accumulation needs.
struct Event {
    group: String,
    timestamp: DateTime<Utc>,
    deltas: Vec<Decimal>,
}

/// A stateless calculator turning raw exchange records into cumulative series.
#[derive(Debug, Clone)]
pub struct AnalyticsEngine {
    profile: AggregationProfile,
}

impl AnalyticsEngine {
    pub fn new(profile: AggregationProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &AggregationProfile {
        &self.profile
    }

    /// Groups `records`, orders each group chronologically and produces running
    /// totals for every metric of the profile.
    ///
    /// Equal timestamps keep feed order. The combined series is a separate
    /// pass over all records in global time order, so it reflects how groups
    /// interleave rather than summing per-group totals.
    pub fn aggregate(&self, records: &[RawRecord]) -> GroupedSeries {
        let metrics = self.profile.metric_names();
        let events: Vec<Event> = records
            .iter()
            .map(|record| Event {
                group: self.profile.group_key(record),
                timestamp: self.profile.timestamp(record),
                deltas: self.profile.metrics.iter().map(|m| (m.extract)(record)).collect(),
            })
            .collect();

        let mut by_group: BTreeMap<&str, Vec<&Event>> = BTreeMap::new();
        for event in &events {
            by_group.entry(event.group.as_str()).or_default().push(event);
        }

        let mut series: BTreeMap<String, Series> = by_group
            .into_iter()
            .map(|(group, group_events)| (group.to_string(), accumulate(&metrics, group_events)))
            .collect();

        if !events.is_empty() {
            series.insert(ALL_KEY.to_string(), accumulate(&metrics, events.iter().collect()));
        }

        tracing::debug!(records = records.len(), groups = series.len(), "Aggregated records.");
        GroupedSeries { metrics, series }
    }

    /// Final totals and first/last timestamps per group, with the combined
    /// row last.
    pub fn summarize(&self, grouped: &GroupedSeries) -> Summary {
        let rows = grouped
            .iter_with_total()
            .map(|(key, series)| {
                let is_total = key == ALL_KEY;
                let totals: BTreeMap<String, Decimal> = grouped
                    .metrics
                    .iter()
                    .map(|m| (m.clone(), series.final_value(m)))
                    .collect();
                let net_flow = self
                    .profile
                    .net_flow
                    .map(|(inflow, outflow)| series.final_value(inflow) - series.final_value(outflow));
                GroupSummary {
                    key: key.to_string(),
                    display_name: if is_total {
                        self.profile.total_label.to_string()
                    } else {
                        key.to_string()
                    },
                    is_total,
                    count: series.len(),
                    totals,
                    net_flow,
                    first: series.first_timestamp(),
                    last: series.last_timestamp(),
                }
            })
            .collect();

        Summary {
            total_groups: grouped.group_count(),
            metrics: grouped.metrics.clone(),
            rows,
        }
    }
}

/// Keeps records whose `field` matches one of `symbols` (case-insensitive).
/// An empty filter keeps everything.
pub fn filter_records(records: &[RawRecord], field: &str, symbols: &[String]) -> Vec<RawRecord> {
    if symbols.is_empty() {
        return records.to_vec();
    }
    let wanted: HashSet<String> = symbols.iter().map(|s| s.trim().to_uppercase()).collect();
    records
        .iter()
        .filter(|r| {
            r.text(field)
                .is_some_and(|value| wanted.contains(&value.to_uppercase()))
        })
        .cloned()
        .collect()
}

fn accumulate(metrics: &[String], mut events: Vec<&Event>) -> Series {
    // `sort_by_key` is stable: ties stay in feed order.
    events.sort_by_key(|e| e.timestamp);

    let mut running = vec![Decimal::ZERO; metrics.len()];
    let mut columns: Vec<Vec<Decimal>> = vec![Vec::with_capacity(events.len()); metrics.len()];
    let mut timestamps = Vec::with_capacity(events.len());

    for event in events {
        timestamps.push(event.timestamp);
        for (i, delta) in event.deltas.iter().enumerate() {
            running[i] = running[i].saturating_add(*delta);
            columns[i].push(running[i]);
        }
    }

    Series {
        timestamps,
        values: metrics.iter().cloned().zip(columns).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::series::UNKNOWN_KEY;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn position(symbol: &str, time: i64, pnl: &str, fee: &str) -> RawRecord {
        serde_json::from_value(json!({
            "symbol": symbol,
            "updatedTime": time.to_string(),
            "closedPnl": pnl,
            "openFee": fee,
            "closeFee": "0",
            "cumEntryValue": "100",
            "cumExitValue": "100"
        }))
        .unwrap()
    }

    fn engine() -> AnalyticsEngine {
        AnalyticsEngine::new(AggregationProfile::closed_pnl())
    }

    #[test]
    fn cumulative_series_per_symbol_and_interleaved_total() {
        let records = vec![
            position("BTCUSDT", 3000, "5", "1"),
            position("BTCUSDT", 1000, "10", "1"),
            position("ETHUSDT", 1500, "2", "0.5"),
            position("BTCUSDT", 2000, "-3", "1"),
        ];

        let grouped = engine().aggregate(&records);

        let btc = grouped.get("BTCUSDT").unwrap();
        assert_eq!(btc.values("pnl").unwrap(), [dec!(10), dec!(7), dec!(12)]);
        assert_eq!(btc.values("fees").unwrap(), [dec!(1), dec!(2), dec!(3)]);
        let times: Vec<i64> = btc.timestamps.iter().map(|t| t.timestamp_millis()).collect();
        assert_eq!(times, [1000, 2000, 3000]);

        let all = grouped.combined().unwrap();
        assert_eq!(all.values("pnl").unwrap(), [dec!(10), dec!(12), dec!(9), dec!(14)]);
        assert_eq!(all.final_value("fees"), dec!(3.5));
        assert_eq!(all.final_value("volume"), dec!(800));
        assert_eq!(grouped.group_count(), 2);
    }

    #[test]
    fn running_sums_saturate_at_the_decimal_limit() {
        let max = Decimal::MAX.to_string();
        let records = vec![
            position("BTCUSDT", 1000, &max, "0"),
            position("BTCUSDT", 2000, &max, "0"),
        ];

        let grouped = engine().aggregate(&records);

        assert_eq!(grouped.get("BTCUSDT").unwrap().values("pnl").unwrap(), [Decimal::MAX, Decimal::MAX]);
        assert_eq!(grouped.combined().unwrap().final_value("pnl"), Decimal::MAX);
    }

    #[test]
    fn finals_equal_arithmetic_sums() {
        let mut records = Vec::new();
        let mut expected: BTreeMap<&str, Decimal> = BTreeMap::new();
        for i in 0..40i64 {
            let symbol = if i % 3 == 0 { "ETHUSDT" } else { "BTCUSDT" };
            let pnl = Decimal::from(i * 7 % 11) - dec!(5);
            *expected.entry(symbol).or_default() += pnl;
            records.push(position(symbol, 10_000 - i * 13 % 97, &pnl.to_string(), "0.1"));
        }

        let grouped = engine().aggregate(&records);

        let mut total = Decimal::ZERO;
        for (symbol, sum) in &expected {
            assert_eq!(grouped.get(symbol).unwrap().final_value("pnl"), *sum);
            total += *sum;
        }
        assert_eq!(grouped.combined().unwrap().final_value("pnl"), total);
        assert_eq!(grouped.combined().unwrap().len(), 40);
    }

    #[test]
    fn equal_timestamps_keep_feed_order() {
        let records = vec![
            position("BTCUSDT", 1000, "1", "0"),
            position("BTCUSDT", 1000, "100", "0"),
            position("BTCUSDT", 500, "-50", "0"),
        ];

        let grouped = engine().aggregate(&records);

        assert_eq!(
            grouped.get("BTCUSDT").unwrap().values("pnl").unwrap(),
            [dec!(-50), dec!(-49), dec!(51)]
        );
    }

    #[test]
    fn aggregation_is_idempotent() {
        let records = vec![
            position("BTCUSDT", 2000, "1.5", "0.1"),
            position("ETHUSDT", 1000, "-0.5", "0.1"),
        ];
        let snapshot = records.clone();

        let first = engine().aggregate(&records);
        let second = engine().aggregate(&records);

        assert_eq!(first, second);
        assert_eq!(records, snapshot);
    }

    #[test]
    fn records_without_symbol_go_to_unknown() {
        let mut orphan = position("", 1000, "4", "0");
        orphan = orphan.with_field("symbol", serde_json::Value::Null);

        let grouped = engine().aggregate(&[orphan, position("", 2000, "1", "0")]);

        assert_eq!(grouped.get(UNKNOWN_KEY).unwrap().final_value("pnl"), dec!(5));
    }

    #[test]
    fn empty_input_has_no_series() {
        let grouped = engine().aggregate(&[]);
        assert!(grouped.is_empty());
        assert!(grouped.combined().is_none());
        assert_eq!(engine().summarize(&grouped).total_groups, 0);
    }

    #[test]
    fn summary_lists_groups_then_total() {
        let records = vec![
            position("ETHUSDT", 1000, "2", "0.5"),
            position("BTCUSDT", 2000, "10", "1"),
            position("BTCUSDT", 3000, "-4", "1"),
        ];
        let engine = engine();

        let summary = engine.summarize(&engine.aggregate(&records));

        let keys: Vec<_> = summary.rows.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(keys, ["BTCUSDT", "ETHUSDT", ALL_KEY]);
        assert_eq!(summary.total_groups, 2);
        let btc = &summary.rows[0];
        assert_eq!(btc.count, 2);
        assert_eq!(btc.totals["pnl"], dec!(6));
        assert_eq!(btc.first.unwrap().timestamp_millis(), 2000);
        assert_eq!(btc.last.unwrap().timestamp_millis(), 3000);
        let total = summary.rows.last().unwrap();
        assert!(total.is_total);
        assert_eq!(total.display_name, "ALL SYMBOLS (TOTAL)");
        assert_eq!(total.totals["pnl"], dec!(8));
        assert_eq!(total.net_flow, None);
    }

    #[test]
    fn treasury_net_flow_ignores_transfers() {
        let rows = [
            json!({ "coin": "USDT", "amount": "100", "successAt": "1000", "_source": "deposits" }),
            json!({ "coin": "USDT", "amount": "30", "createTime": "2000", "_source": "withdrawals" }),
            json!({ "coin": "USDT", "amount": "999", "timestamp": "1500", "_source": "internal_transfers" }),
            json!({ "coin": "BTC", "amount": "0.5", "successAt": "3000", "_source": "deposits" }),
        ];
        let records: Vec<RawRecord> = rows
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        let engine = AnalyticsEngine::new(AggregationProfile::treasury());

        let grouped = engine.aggregate(&records);
        let summary = engine.summarize(&grouped);

        let usdt = summary.rows.iter().find(|r| r.key == "USDT").unwrap();
        assert_eq!(usdt.net_flow, Some(dec!(70)));
        assert_eq!(usdt.totals["internal_transfers"], dec!(999));
        let usdt_times: Vec<i64> = grouped
            .get("USDT")
            .unwrap()
            .timestamps
            .iter()
            .map(|t| t.timestamp_millis())
            .collect();
        assert_eq!(usdt_times, [1000, 1500, 2000]);
        assert_eq!(summary.rows.last().unwrap().display_name, "ALL COINS (TOTAL)");
    }

    #[test]
    fn filter_matches_case_insensitively() {
        let records = vec![
            position("BTCUSDT", 1, "1", "0"),
            position("ETHUSDT", 2, "1", "0"),
            position("SOLUSDT", 3, "1", "0"),
        ];

        let kept = filter_records(&records, "symbol", &["btcusdt".to_string(), " SOLUSDT ".to_string()]);
        let symbols: Vec<_> = kept.iter().filter_map(|r| r.text("symbol")).collect();

        assert_eq!(symbols, ["BTCUSDT", "SOLUSDT"]);
        assert_eq!(filter_records(&records, "symbol", &[]).len(), 3);
    }
}
