use crate::error::ApiError;
use crate::handlers;
use crate::store::TodoStore;
use axum::http::header::{
    HeaderName, HeaderValue, CONTENT_SECURITY_POLICY, X_CONTENT_TYPE_OPTIONS, X_FRAME_OPTIONS,
    X_XSS_PROTECTION,
};
use axum::routing::{get, put};
use axum::{middleware, Router};
use metrics_exporter_prometheus::PrometheusHandle;
use std::path::Path;
use std::sync::Arc;
use storeguard_datastore::{DatastoreError, ResilienceError};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

const CONTENT_SECURITY: &str = "default-src 'self'; style-src 'self' 'unsafe-inline'; script-src 'self'";

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn TodoStore>,
    /// `None` serves 404 on `/metrics`.
    pub metrics: Option<PrometheusHandle>,
    pub expose_errors: bool,
}

impl AppState {
    pub fn new(store: Arc<dyn TodoStore>) -> Self {
        Self {
            store,
            metrics: None,
            expose_errors: false,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    pub fn expose_errors(mut self, expose: bool) -> Self {
        self.expose_errors = expose;
        self
    }

    pub(crate) fn api_error(&self, error: ResilienceError<DatastoreError>) -> ApiError {
        ApiError::from_datastore(error, self.expose_errors)
    }
}

/// The full HTTP surface: the todo API, probes, metrics and the web page.
pub fn router(state: AppState, templates_dir: &Path, static_dir: &Path) -> Router {
    Router::new()
        .route("/todos", get(handlers::list_todos).post(handlers::add_todo))
        .route(
            "/todos/:id",
            put(handlers::update_todo).delete(handlers::delete_todo),
        )
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::render_metrics))
        .route_service("/", ServeFile::new(templates_dir.join("index.html")))
        .route_service("/favicon.ico", ServeFile::new(static_dir.join("favicon.ico")))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(middleware::from_fn(handlers::track_metrics))
        .layer(TraceLayer::new_for_http())
        .layer(security_header(CONTENT_SECURITY_POLICY, CONTENT_SECURITY))
        .layer(security_header(X_CONTENT_TYPE_OPTIONS, "nosniff"))
        .layer(security_header(X_FRAME_OPTIONS, "DENY"))
        .layer(security_header(X_XSS_PROTECTION, "1; mode=block"))
}

fn security_header(name: HeaderName, value: &'static str) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::overriding(name, HeaderValue::from_static(value))
}
