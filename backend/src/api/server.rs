//! HTTP Server for the claims API.
//!
//! A thin adapter over [`crate::transform::pipeline`]: each request carries
//! one statement and gets back either the archive or a JSON error.
//!
//! # API Endpoints
//!
//! | Method | Path              | Description                             |
//! |--------|-------------------|-----------------------------------------|
//! | GET    | `/health`         | Health check                            |
//! | POST   | `/api/convert`    | Statement in, `Amex_Output.zip` out     |
//! | POST   | `/api/inspect`    | Statement in, detected layout out       |
//! | GET    | `/api/logs`       | SSE stream for real-time notices        |

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, HeaderName, Method},
    response::{sse::Event, IntoResponse, Json, Response, Sse},
    routing::{get, post},
    Router,
};
use futures::stream::Stream;
use serde_json::{json, Value};
use std::{convert::Infallible, net::SocketAddr, sync::Arc, time::Duration};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;
use tower_http::cors::CorsLayer;

use super::logs::{log_error, log_info, LOG_BROADCASTER};
use super::types::InspectResponse;
use crate::archive::ARCHIVE_NAME;
use crate::config::{PipelineOptions, DEFAULT_MAX_UPLOAD_BYTES};
use crate::error::{PipelineError, ServerError, ServerResult};
use crate::models::{ExportFormat, RawStatement};
use crate::transform::pipeline::{convert, inspect};

const X_JOB_ID: HeaderName = HeaderName::from_static("x-job-id");
const X_CLAIM_FILES: HeaderName = HeaderName::from_static("x-claim-files");
const X_EXCLUDED_ROWS: HeaderName = HeaderName::from_static("x-excluded-rows");

/// Server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
    pub options: PipelineOptions,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            options: PipelineOptions::default(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    options: Arc<PipelineOptions>,
}

/// Start the HTTP server
pub async fn start_server(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers([
            header::CONTENT_TYPE,
            header::CONTENT_DISPOSITION,
            X_JOB_ID,
            X_CLAIM_FILES,
            X_EXCLUDED_ROWS,
        ]);

    let state = AppState { options: Arc::new(config.options) };

    let app = Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/api/convert", post(convert_statement))
        .route("/api/inspect", post(inspect_statement))
        .route("/api/logs", get(sse_logs))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, max_upload_bytes = config.max_upload_bytes, "claims server listening");
    log_info(format!("Server running on http://localhost:{}", config.port));

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check endpoint
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "amex-claims",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "convert": "POST /api/convert",
            "inspect": "POST /api/inspect",
            "logs": "GET /api/logs (SSE)"
        }
    }))
}

/// SSE endpoint for real-time notice streaming
async fn sse_logs() -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = LOG_BROADCASTER.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(|result| match result {
        Ok(entry) => {
            let json = serde_json::to_string(&entry).ok()?;
            Some(Ok(Event::default().data(json)))
        }
        Err(_) => None,
    });

    Sse::new(stream).keep_alive(
        axum::response::sse::KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Multipart fields of an upload
struct Upload {
    statement: RawStatement,
    format: ExportFormat,
}

async fn read_upload(mut multipart: Multipart) -> ServerResult<Upload> {
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut format = ExportFormat::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("multipart error: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        match field_name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("read error: {}", e)))?;
                file = Some((name, bytes.to_vec()));
            }
            "format" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::BadRequest(format!("read error: {}", e)))?;
                format = text.parse().map_err(ServerError::BadRequest)?;
            }
            _ => {}
        }
    }

    let (name, bytes) = file.ok_or_else(|| ServerError::BadRequest("no file provided".into()))?;
    let statement = RawStatement::new(name, bytes).map_err(PipelineError::from)?;
    Ok(Upload { statement, format })
}

/// Run blocking pipeline work off the async runtime
async fn blocking<T, F>(work: F) -> ServerResult<T>
where
    F: FnOnce() -> Result<T, PipelineError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?
        .map_err(ServerError::from)
}

/// Convert endpoint: responds with the claim archive
async fn convert_statement(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ServerError> {
    let Upload { statement, format } = read_upload(multipart)
        .await
        .inspect_err(|e| log_error(e.to_string()))?;
    tracing::info!(
        file = %statement.filename,
        bytes = statement.bytes.len(),
        %format,
        "convert request"
    );

    let options = Arc::clone(&state.options);
    let outcome = blocking(move || convert(&statement, format, &options)).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", ARCHIVE_NAME),
        ),
        (X_JOB_ID, uuid::Uuid::new_v4().to_string()),
        (X_CLAIM_FILES, outcome.archive.entries.len().to_string()),
        (X_EXCLUDED_ROWS, outcome.report.excluded_rows().to_string()),
    ];

    Ok((headers, outcome.archive.bytes).into_response())
}

/// Inspect endpoint: responds with the detected layout and a preview
async fn inspect_statement(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<InspectResponse>, ServerError> {
    let Upload { statement, .. } = read_upload(multipart).await?;
    tracing::info!(file = %statement.filename, "inspect request");

    let options = Arc::clone(&state.options);
    let preview = blocking(move || inspect(&statement, &options)).await?;

    Ok(Json(InspectResponse::from(preview)))
}
