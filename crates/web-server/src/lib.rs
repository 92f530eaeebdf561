use alerter::TelegramAlerter;
use api_client::{ApiClient, BybitClient, Fetcher};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use configuration::Settings;
use record_cache::RecordCache;
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{Any as CorsAny, CorsLayer},
    trace::TraceLayer,
};

pub mod chart;
pub mod error;
pub mod handlers;
pub mod service;
pub mod templates;

pub use error::AppError;
pub use service::{Report, ReportRequest, RequestTracker, generate_report};

/// The shared application state that all handlers can access.
/// Built once at startup and never replaced.
pub struct AppState {
    pub settings: Settings,
    pub fetcher: Fetcher<Arc<dyn ApiClient>>,
    /// `None` when caching is disabled.
    pub cache: Option<RecordCache>,
    pub alerter: Option<TelegramAlerter>,
    pub tracker: RequestTracker,
}

impl AppState {
    pub fn new(
        settings: Settings,
        client: Arc<dyn ApiClient>,
        cache: Option<RecordCache>,
        alerter: Option<TelegramAlerter>,
    ) -> Self {
        let tracker = RequestTracker::new(Duration::from_secs(settings.server.request_cooldown_secs));
        let fetcher = Fetcher::new(client, settings.pacing.clone());
        Self {
            settings,
            fetcher,
            cache,
            alerter,
            tracker,
        }
    }

    /// Wires the real exchange client, cache directory and alerter from
    /// configuration.
    pub async fn from_settings(settings: Settings) -> anyhow::Result<Self> {
        let client: Arc<dyn ApiClient> = Arc::new(BybitClient::new(&settings.exchange)?);
        let cache = if settings.cache.enabled {
            Some(RecordCache::new(&settings.cache.dir).await?)
        } else {
            tracing::info!("Record cache disabled.");
            None
        };
        let alerter = TelegramAlerter::new(&settings.telegram);
        Ok(Self::new(settings, client, cache, alerter))
    }
}

/// Routes plus middleware, ready to serve.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(CorsAny)
        .allow_methods(CorsAny)
        .allow_headers(CorsAny);

    Router::new()
        .route("/", get(handlers::index))
        .route("/process", post(handlers::process))
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::custom(handle_panic))
}

/// Turns a panicking handler into a generic HTML 500 page.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "Handler panicked.");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(templates::error_page(&format!("Internal error: {detail}"))),
    )
        .into_response()
}

/// The main function to configure and run the web server.
pub async fn run_server(state: AppState) -> anyhow::Result<()> {
    let addr = state.settings.server.socket_addr()?;
    let app = build_router(Arc::new(state));

    tracing::info!("Web server listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Web server stopped.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal.");
        std::future::pending::<()>().await;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn panics_become_html_500() {
        let response = handle_panic(Box::new("boom"));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
