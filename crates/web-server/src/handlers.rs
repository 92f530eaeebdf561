use crate::chart::{ChartKind, build_figure};
use crate::service::{ReportRequest, generate_report};
use crate::{AppState, error::AppError, templates};
use analytics::AggregationProfile;
use axum::{
    Form,
    extract::State,
    response::Html,
};
use chrono::Utc;
use core_types::{Credentials, Dataset, Period};
use serde::Deserialize;
use std::sync::Arc;

/// Fields posted by the form on `/`.
#[derive(Debug, Deserialize)]
pub struct ProcessForm {
    pub api_key: String,
    pub api_secret: String,
    #[serde(default)]
    pub dataset: Option<String>,
    pub period: String,
    #[serde(default)]
    pub start_datetime: Option<String>,
    #[serde(default)]
    pub end_datetime: Option<String>,
    #[serde(default)]
    pub symbols: Option<String>,
    #[serde(default)]
    pub chart_type: Option<String>,
}

/// # GET /
pub async fn index() -> Html<String> {
    Html(templates::index_page())
}

/// # GET /health
pub async fn health() -> &'static str {
    "OK"
}

/// # POST /process
/// Validates the form, builds the report and renders chart plus summary.
pub async fn process(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ProcessForm>,
) -> Result<Html<String>, AppError> {
    let dataset = match form.dataset.as_deref().map(str::trim) {
        None | Some("") => Dataset::ClosedPnl,
        Some(raw) => raw.parse::<Dataset>()?,
    };
    let period = Period::parse(
        &form.period,
        form.start_datetime.as_deref(),
        form.end_datetime.as_deref(),
    )?;
    // Reject a bad chart type before spending any exchange requests on it.
    let kind = ChartKind::parse(
        form.chart_type.as_deref().unwrap_or_default(),
        &AggregationProfile::for_dataset(dataset),
    )?;

    let request = ReportRequest {
        credentials: Credentials::new(form.api_key, form.api_secret),
        dataset,
        period,
        symbols: ReportRequest::parse_symbols(form.symbols.as_deref().unwrap_or_default()),
    };
    let report = generate_report(&state, &request, Utc::now()).await?;

    let figure = if report.grouped.is_empty() {
        None
    } else {
        Some(build_figure(&report.grouped, &report.profile, &kind, &report.title)?)
    };
    Ok(Html(templates::results_page(&report, figure.as_ref())))
}
