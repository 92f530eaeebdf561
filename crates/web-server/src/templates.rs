//! Server-side HTML for the form, the results page and error pages.

use crate::service::Report;
use analytics::{AggregationProfile, Summary};
use chrono::{DateTime, Utc};
use core_types::Dataset;
use rust_decimal::Decimal;
use serde_json::Value;
use std::fmt::Write;

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

const STYLE: &str = r#"
body { font-family: Tahoma, Verdana, sans-serif; background: #008080; margin: 0; padding: 20px; }
.window { background: #c0c0c0; border: 2px solid; border-color: #ffffff #808080 #808080 #ffffff; max-width: 1200px; margin: 0 auto; }
.title-bar { background: #000080; color: #ffffff; font-weight: bold; padding: 4px 8px; }
.content { padding: 12px; }
label { display: block; margin-top: 8px; font-size: 12px; }
input, select { font-family: inherit; font-size: 12px; width: 100%; box-sizing: border-box; }
button { margin-top: 12px; padding: 4px 16px; }
.warning { background: #ffffe1; border: 1px solid #808080; padding: 8px; margin-bottom: 8px; }
.error { background: #ffffff; border: 1px solid #808080; padding: 8px; color: #800000; }
table.summary { width: 100%; border-collapse: collapse; background: #ffffff; font-size: 11px; }
table.summary th { background: #000080; color: #ffffff; padding: 5px; border: 1px solid #808080; }
table.summary td { padding: 5px; border: 1px solid #808080; text-align: right; }
table.summary td.name, table.summary td.time { text-align: left; }
table.summary tr.total { background: #c0c0c0; font-weight: bold; }
.positive { color: green; font-weight: bold; }
.negative { color: red; font-weight: bold; }
"#;

/// Escapes text for use in HTML element content and quoted attributes.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(title: &str, head_extra: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n<style>{STYLE}</style>\n{head_extra}</head>\n<body>\n<div class=\"window\">\n<div class=\"title-bar\">{title}</div>\n<div class=\"content\">\n{body}\n</div>\n</div>\n</body>\n</html>\n",
        title = escape_html(title),
    )
}

/// The request form.
pub fn index_page() -> String {
    let mut datasets = String::new();
    let mut chart_options = String::from("<option value=\"\">Default</option>\n");
    for dataset in [Dataset::ClosedPnl, Dataset::Executions, Dataset::Treasury] {
        let _ = writeln!(
            datasets,
            "<option value=\"{}\">{}</option>",
            dataset.as_str(),
            escape_html(dataset.title())
        );
        let _ = writeln!(chart_options, "<optgroup label=\"{}\">", escape_html(dataset.title()));
        for metric in &AggregationProfile::for_dataset(dataset).metrics {
            let _ = writeln!(chart_options, "<option value=\"{}\">{}</option>", metric.name, metric.label);
        }
        chart_options.push_str("</optgroup>\n");
    }
    chart_options.push_str("<option value=\"all\">All metrics</option>\n");

    let body = format!(
        r#"<form method="post" action="/process">
<label>API key <input type="text" name="api_key" required autocomplete="off"></label>
<label>API secret <input type="password" name="api_secret" required autocomplete="off"></label>
<label>Dataset <select name="dataset">
{datasets}</select></label>
<label>Period <select name="period">
<option value="today">Today</option>
<option value="yesterday">Yesterday</option>
<option value="current_month">Current month</option>
<option value="previous_month">Previous month</option>
<option value="custom">Custom range</option>
</select></label>
<label>Custom start (UTC) <input type="datetime-local" name="start_datetime"></label>
<label>Custom end (UTC) <input type="datetime-local" name="end_datetime"></label>
<label>Symbols / coins (comma separated, optional) <input type="text" name="symbols" placeholder="BTCUSDT, ETHUSDT"></label>
<label>Chart <select name="chart_type">
{chart_options}</select></label>
<button type="submit">Build chart</button>
</form>"#
    );
    page("Account History Charts", "", &body)
}

/// The results page: optional warning, the chart and the summary table.
pub fn results_page(report: &Report, figure: Option<&Value>) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<p>{} to {} &middot; {} records{}</p>",
        format_time(report.window.start_utc()),
        format_time(report.window.end_utc()),
        report.record_count,
        if report.from_cache { " (cached)" } else { "" }
    );
    if let Some(warning) = &report.warning {
        let _ = writeln!(body, "<div class=\"warning\">{}</div>", escape_html(warning));
    }

    let mut head = String::new();
    match figure {
        Some(figure) => {
            let _ = writeln!(head, "<script src=\"{PLOTLY_CDN}\"></script>");
            // `</` inside the JSON would end the script element early.
            let json = serde_json::to_string(figure)
                .unwrap_or_else(|_| "{}".to_string())
                .replace("</", "<\\/");
            let _ = writeln!(
                body,
                "<div id=\"chart\"></div>\n<script>\nconst figure = {json};\nPlotly.newPlot(\"chart\", figure.data, figure.layout, {{responsive: true}});\n</script>"
            );
        }
        None => body.push_str("<p>No data for this period.</p>\n"),
    }

    body.push_str(&summary_table(&report.summary, &report.profile));
    body.push_str("<p><a href=\"/\">Back</a></p>\n");
    page(&report.title, &head, &body)
}

/// Per-group totals, regular groups first and the combined row last.
pub fn summary_table(summary: &Summary, profile: &AggregationProfile) -> String {
    if summary.total_groups == 0 {
        return "<p>No data to display</p>\n".to_string();
    }

    let group_header = if profile.group_field == "coin" { "Coin" } else { "Symbol" };
    let mut html = String::new();
    let _ = writeln!(html, "<h3>Total {}s: {}</h3>", group_header.to_lowercase(), summary.total_groups);
    html.push_str("<table class=\"summary\">\n<thead><tr>");
    let _ = write!(html, "<th>{group_header}</th><th>Records</th>");
    for metric in &profile.metrics {
        let _ = write!(html, "<th>{}</th>", metric.label);
    }
    if profile.net_flow.is_some() {
        html.push_str("<th>Net Flow</th>");
    }
    html.push_str("<th>First</th><th>Last</th></tr></thead>\n<tbody>\n");

    let rows = summary
        .rows
        .iter()
        .filter(|r| !r.is_total)
        .chain(summary.rows.iter().filter(|r| r.is_total));
    for row in rows {
        let class = if row.is_total { " class=\"total\"" } else { "" };
        let _ = write!(
            html,
            "<tr{class}><td class=\"name\">{}</td><td>{}</td>",
            escape_html(&row.display_name),
            row.count
        );
        for (index, metric) in profile.metrics.iter().enumerate() {
            let value = row.totals.get(metric.name).copied().unwrap_or_default();
            // The leading metric is the headline figure and gets a sign colour.
            let class = if index == 0 { sign_class(value) } else { "" };
            let _ = write!(html, "<td{class}>{}</td>", format_decimal(value, metric.decimals));
        }
        if let Some(net) = row.net_flow {
            let _ = write!(html, "<td{}>{}</td>", sign_class(net), format_decimal(net, 4));
        }
        let _ = writeln!(
            html,
            "<td class=\"time\">{}</td><td class=\"time\">{}</td></tr>",
            row.first.map(format_time).unwrap_or_else(|| "-".to_string()),
            row.last.map(format_time).unwrap_or_else(|| "-".to_string())
        );
    }
    html.push_str("</tbody>\n</table>\n");
    html
}

/// A standalone error page.
pub fn error_page(message: &str) -> String {
    let body = format!(
        "<div class=\"error\"><h1>Error</h1><p>{}</p></div>\n<p><a href=\"/\">Back</a></p>",
        escape_html(message)
    );
    page("Error", "", &body)
}

fn sign_class(value: Decimal) -> &'static str {
    if value.is_sign_positive() && !value.is_zero() {
        " class=\"positive\""
    } else if value.is_sign_negative() && !value.is_zero() {
        " class=\"negative\""
    } else {
        ""
    }
}

fn format_decimal(value: Decimal, decimals: u32) -> String {
    format!("{:.*}", decimals as usize, value.round_dp(decimals))
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}
