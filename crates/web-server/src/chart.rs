use analytics::{ALL_KEY, AggregationProfile, AnalyticsError, GroupedSeries, Metric, Series};
use rust_decimal::prelude::ToPrimitive;
use serde_json::{Value, json};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Which cumulative metric(s) to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartKind {
    Metric(String),
    /// One stacked subplot per metric.
    All,
}

impl ChartKind {
    /// `"all"`, a metric name of `profile`, or empty for the profile's first
    /// metric.
    pub fn parse(raw: &str, profile: &AggregationProfile) -> Result<Self, AnalyticsError> {
        match raw.trim() {
            "all" => Ok(ChartKind::All),
            "" => profile
                .metrics
                .first()
                .map(|m| ChartKind::Metric(m.name.to_string()))
                .ok_or_else(|| AnalyticsError::UnknownMetric(String::new())),
            name => profile
                .metric(name)
                .map(|m| ChartKind::Metric(m.name.to_string()))
                .ok_or_else(|| AnalyticsError::UnknownMetric(name.to_string())),
        }
    }
}

/// Builds a Plotly figure (`{data, layout}`) with one line per group and a
/// thicker line for the combined series.
pub fn build_figure(
    grouped: &GroupedSeries,
    profile: &AggregationProfile,
    kind: &ChartKind,
    title: &str,
) -> Result<Value, AnalyticsError> {
    match kind {
        ChartKind::Metric(name) => {
            let metric = profile
                .metric(name)
                .ok_or_else(|| AnalyticsError::UnknownMetric(name.clone()))?;
            let data: Vec<Value> = grouped
                .iter_with_total()
                .map(|(key, series)| {
                    let mut trace = line_trace(key, series, metric, profile, 4.0);
                    trace["mode"] = json!("lines+markers");
                    trace
                })
                .collect();
            Ok(json!({
                "data": data,
                "layout": {
                    "title": { "text": title },
                    "xaxis": { "title": { "text": "Time (UTC)" } },
                    "yaxis": { "title": { "text": format!("Cumulative {}", metric.label) } },
                    "hovermode": "x unified",
                    "legend": { "yanchor": "top", "y": 0.99, "xanchor": "left", "x": 0.01 },
                }
            }))
        }
        ChartKind::All => Ok(subplots(grouped, profile, title)),
    }
}

fn subplots(grouped: &GroupedSeries, profile: &AggregationProfile, title: &str) -> Value {
    let rows = profile.metrics.len();
    let mut data = Vec::new();
    let mut layout = json!({
        "title": { "text": title },
        "grid": { "rows": rows, "columns": 1, "pattern": "independent" },
        "hovermode": "x unified",
        "height": 300 * rows.max(1),
        "legend": { "yanchor": "top", "y": 0.99, "xanchor": "left", "x": 1.02 },
    });

    for (row, metric) in profile.metrics.iter().enumerate() {
        let suffix = if row == 0 { String::new() } else { (row + 1).to_string() };
        for (key, series) in grouped.iter_with_total() {
            let mut trace = line_trace(key, series, metric, profile, 3.0);
            trace["xaxis"] = json!(format!("x{suffix}"));
            trace["yaxis"] = json!(format!("y{suffix}"));
            // One legend entry per group toggles it in every subplot.
            trace["legendgroup"] = json!(key);
            trace["showlegend"] = json!(row == 0);
            data.push(trace);
        }
        layout[format!("yaxis{suffix}")] = json!({ "title": { "text": metric.label } });
        if row + 1 == rows {
            layout[format!("xaxis{suffix}")] = json!({ "title": { "text": "Time (UTC)" } });
        }
    }

    json!({ "data": data, "layout": layout })
}

fn line_trace(
    key: &str,
    series: &Series,
    metric: &Metric,
    profile: &AggregationProfile,
    total_width: f64,
) -> Value {
    let is_total = key == ALL_KEY;
    let name = if is_total { profile.total_label } else { key };
    let width = if is_total { total_width } else { 2.0 };
    let x: Vec<String> = series
        .timestamps
        .iter()
        .map(|t| t.format(TIME_FORMAT).to_string())
        .collect();
    let y: Vec<f64> = series
        .values(metric.name)
        .unwrap_or_default()
        .iter()
        .map(|v| v.to_f64().unwrap_or_default())
        .collect();

    json!({
        "type": "scatter",
        "mode": "lines",
        "name": name,
        "x": x,
        "y": y,
        "line": { "width": width },
        "hovertemplate": format!(
            "<b>%{{fullData.name}}</b><br>Time: %{{x}}<br>{}: %{{y:.{}f}}<extra></extra>",
            metric.label, metric.decimals
        ),
    })
}
