use crate::config::{Config, ValidationConfig};
use crate::error::{DagcheckError, Result};
use crate::pipeline::{self, PipelineReport};
use crate::server::types::*;
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP front end for pipeline validation
pub struct PipelineServer {
    config: Config,
}

impl PipelineServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Bind the configured address and serve until the process exits
    pub async fn run(&self) -> Result<()> {
        let app = self.create_router();
        let addr = self.config.bind_addr();

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| {
                let error_msg = if e.kind() == std::io::ErrorKind::AddrInUse {
                    format!(
                        "Port {} is already in use. Stop the other process or choose a different port \
                        (server.port in config.toml, or --port)",
                        self.config.server.port
                    )
                } else {
                    format!("Failed to bind to {}: {}", addr, e)
                };
                DagcheckError::Io(std::io::Error::new(e.kind(), error_msg))
            })?;

        log::info!("Starting dagcheck HTTP server on http://{}", addr);
        log::info!("Parse endpoint: http://{}/pipelines/parse", addr);
        log::info!("Allowed origins: {}", self.config.server.allowed_origins.join(", "));

        axum::serve(listener, app).await?;

        Ok(())
    }

    /// Create the axum router
    pub fn create_router(&self) -> Router {
        let cors = self.cors_layer();
        let state = AppState {
            validation: Arc::new(self.config.validation.clone()),
        };

        Router::new()
            .route(
                "/pipelines/parse",
                get(handle_parse).fallback(handle_method_not_allowed),
            )
            .route("/health", get(handle_health))
            .fallback(handle_not_found)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(cors),
            )
            .with_state(state)
    }

    /// Credentialed CORS for the trusted origins.
    ///
    /// Browsers refuse `*` for methods and headers when credentials are
    /// allowed, so both are mirrored from the preflight request instead.
    fn cors_layer(&self) -> CorsLayer {
        let origins: Vec<HeaderValue> = self
            .config
            .server
            .allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    log::warn!("Ignoring allowed origin that is not a valid header value: {}", o);
                    None
                }
            })
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    validation: Arc<ValidationConfig>,
}

impl IntoResponse for DagcheckError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if self.is_client_error() {
            log::warn!("Rejected request ({}): {}", status.as_u16(), self);
        } else {
            log::error!("Error processing request: {}", self);
        }
        (status, Json(ErrorBody::new(self.to_string()))).into_response()
    }
}

/// Handle GET /pipelines/parse?pipeline_data=<json>
async fn handle_parse(
    State(state): State<AppState>,
    query: std::result::Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<PipelineReport>> {
    let Query(params) = query.map_err(|e| DagcheckError::MalformedInput(e.body_text()))?;
    let raw = params.get(PIPELINE_DATA_PARAM).ok_or_else(|| {
        DagcheckError::MalformedInput(format!("missing query parameter '{}'", PIPELINE_DATA_PARAM))
    })?;

    let report = pipeline::analyze(raw, &state.validation)?;
    log::info!(
        "Pipeline checked: {} nodes, {} edges, is_dag={}",
        report.num_nodes,
        report.num_edges,
        report.is_dag
    );

    Ok(Json(report))
}

/// Handle health check endpoint
async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "dagcheck".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn handle_not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(ErrorBody::new("Not Found"))).into_response()
}

async fn handle_method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(ErrorBody::new("Method Not Allowed")),
    )
        .into_response()
}
