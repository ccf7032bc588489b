//! HTTP API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (version, index size) |
//! | `POST` | `/ask` | Answer a question: `{"question": "...", "k": 4}` |
//! | `GET`  | `/documents` | Indexed documents with chunk counts |
//! | `POST` | `/documents` | Queue indexing of a PDF: `{"filename": "x.pdf"}` or `{"path": "/abs/x.pdf"}` |
//! | `DELETE` | `/documents/{id}` | Queue deletion of a document |
//! | `POST` | `/rebuild` | Queue a full rebuild |
//! | `POST` | `/reload` | Reload the query snapshot from disk |
//! | `GET`  | `/jobs/{id}` | Status of a queued job |
//!
//! Mutating endpoints answer `202 Accepted` with `{"job_id": "..."}`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "question must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `index_unavailable` (503), `internal` (500).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use docqa_core::models::{Answer, DocumentSummary};

use crate::error::{find_qa_error, QaError};
use crate::jobs::{JobKind, JobQueue, JobRecord};
use crate::state::AppContext;

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    ctx: Arc<AppContext>,
    jobs: JobQueue,
}

impl AppState {
    /// Start the job worker for `ctx`. Must be called inside a tokio runtime.
    pub fn new(ctx: Arc<AppContext>) -> Self {
        let jobs = JobQueue::start(ctx.clone());
        Self { ctx, jobs }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/documents", get(handle_list_documents).post(handle_add_document))
        .route("/documents/{id}", delete(handle_delete_document))
        .route("/rebuild", post(handle_rebuild))
        .route("/reload", post(handle_reload))
        .route("/jobs/{id}", get(handle_get_job))
        .layer(cors)
        .with_state(state)
}

/// Open the index (creating it if missing), load it, and serve until terminated.
pub async fn run_server(ctx: AppContext) -> anyhow::Result<()> {
    let bind_addr = ctx.config.server.bind.clone();
    match ctx.reload().await {
        Ok(n) => tracing::info!(chunks = n, "index loaded"),
        Err(e) => tracing::warn!(error = %e, "index not loaded; /ask unavailable until rebuild"),
    }

    let app = router(AppState::new(Arc::new(ctx)));

    println!("docqa server listening on http://{}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: message.into(),
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        match find_qa_error(&err) {
            Some(QaError::NotFound(_)) => not_found(message),
            Some(QaError::NotAPdf(_)) => bad_request(message),
            Some(QaError::IndexUnavailable(_)) => AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "index_unavailable",
                message,
            },
            _ => AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message,
            },
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    index_loaded: bool,
    chunks: usize,
}

async fn handle_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let chunks = state
        .ctx
        .index
        .snapshot()
        .map(|s| s.len())
        .unwrap_or(0);
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        index_loaded: state.ctx.index.is_loaded(),
        chunks,
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    k: Option<usize>,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<Answer>, AppError> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err(bad_request("question must not be empty"));
    }
    if req.k == Some(0) {
        return Err(bad_request("k must be >= 1"));
    }
    let answer = state.ctx.ask(question, req.k).await?;
    Ok(Json(answer))
}

// ============ /documents ============

#[derive(Serialize)]
struct DocumentsResponse {
    documents: Vec<DocumentSummary>,
}

async fn handle_list_documents(
    State(state): State<AppState>,
) -> Result<Json<DocumentsResponse>, AppError> {
    let documents = state.ctx.indexer.documents().await?;
    Ok(Json(DocumentsResponse { documents }))
}

#[derive(Deserialize)]
struct AddRequest {
    /// File name inside the configured document directory.
    #[serde(default)]
    filename: Option<String>,
    /// Any path readable by the server.
    #[serde(default)]
    path: Option<PathBuf>,
}

#[derive(Serialize)]
struct JobAccepted {
    job_id: String,
}

fn accepted(job_id: String) -> (StatusCode, Json<JobAccepted>) {
    (StatusCode::ACCEPTED, Json(JobAccepted { job_id }))
}

async fn handle_add_document(
    State(state): State<AppState>,
    Json(req): Json<AddRequest>,
) -> Result<(StatusCode, Json<JobAccepted>), AppError> {
    let path = match (req.filename, req.path) {
        (Some(name), None) => {
            // Plain file names only; no escaping the document directory.
            if name.is_empty() || name.contains('/') || name.contains('\\') || name == ".." {
                return Err(bad_request("filename must be a plain file name"));
            }
            state.ctx.config.paths.documents_dir.join(name)
        }
        (None, Some(path)) => path,
        _ => return Err(bad_request("provide exactly one of `filename` or `path`")),
    };
    if !path.is_file() {
        return Err(not_found(format!("file not found: {}", path.display())));
    }
    let id = state.jobs.submit(JobKind::Add { path })?;
    Ok(accepted(id))
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<JobAccepted>), AppError> {
    let job = state.jobs.submit(JobKind::Delete { document_id: id })?;
    Ok(accepted(job))
}

// ============ POST /rebuild, POST /reload ============

async fn handle_rebuild(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<JobAccepted>), AppError> {
    let id = state.jobs.submit(JobKind::Rebuild)?;
    Ok(accepted(id))
}

#[derive(Serialize)]
struct ReloadResponse {
    chunks: usize,
}

async fn handle_reload(State(state): State<AppState>) -> Result<Json<ReloadResponse>, AppError> {
    let chunks = state.ctx.reload().await?;
    Ok(Json(ReloadResponse { chunks }))
}

// ============ GET /jobs/{id} ============

async fn handle_get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, AppError> {
    state
        .jobs
        .get(&id)
        .map(Json)
        .ok_or_else(|| not_found(format!("no job with id: {}", id)))
}
