//! HTTP surface for DocuMind.
//!
//! - `GET /health` – Readiness, retention policy and live index statistics.
//! - `POST /api/v1/ingest` – Multipart upload of exactly one document (`file` field) into the
//!   shared knowledge base. Returns `{status, embeddings_created, total_embeddings, filename, …}`.
//! - `POST /api/v1/query` – JSON `{query, k?, style?, cite?}` answered from the knowledge base.
//! - `POST /api/v1/sessions` – Open a `single` or `multi` document session.
//! - `POST /api/v1/sessions/:id/documents` – Multipart upload of one or more files.
//! - `POST /api/v1/sessions/:id/query` – Cited answer(s) from the session's documents.
//! - `DELETE /api/v1/sessions/:id` – Close a session and drop its indexes.
//! - `GET /api/v1/metrics` – Ingestion and query counters.
//! - `GET /api/v1/commands` – Machine-readable command catalog for quick discovery by tools.
//!
//! Errors are returned as `{"detail": "<message>"}` with a status derived from the failing layer.

use crate::config::Config;
use crate::embedding::EmbeddingClientError;
use crate::extract::ExtractionError;
use crate::generation::GenerationClientError;
use crate::metrics::MetricsSnapshot;
use crate::processing::{
    HealthSnapshot, IngestOutcome, ProcessingError, QueryOutcome, QueryRequest, RagApi,
    ResponseStyle, SessionInfo, SessionMode, SourceRef, Upload,
};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

/// Build the HTTP router exposing the document API surface.
pub fn create_router<S>(service: Arc<S>, config: &Config) -> Router
where
    S: RagApi + 'static,
{
    Router::new()
        .route("/health", get(health::<S>))
        .route("/api/v1/ingest", post(ingest_document::<S>))
        .route("/api/v1/query", post(query_documents::<S>))
        .route("/api/v1/sessions", post(create_session::<S>))
        .route(
            "/api/v1/sessions/:id/documents",
            post(add_session_documents::<S>),
        )
        .route("/api/v1/sessions/:id/query", post(query_session::<S>))
        .route("/api/v1/sessions/:id", delete(close_session::<S>))
        .route("/api/v1/metrics", get(get_metrics::<S>))
        .route("/api/v1/commands", get(get_commands))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn health<S>(State(service): State<Arc<S>>) -> Json<HealthSnapshot>
where
    S: RagApi,
{
    Json(service.health().await)
}

/// Success response for a single ingested document.
#[derive(Serialize)]
struct IngestResponse {
    status: &'static str,
    filename: String,
    embeddings_created: usize,
    total_embeddings: usize,
    pages: usize,
    fingerprint: String,
}

impl From<IngestOutcome> for IngestResponse {
    fn from(outcome: IngestOutcome) -> Self {
        Self {
            status: "success",
            filename: outcome.filename,
            embeddings_created: outcome.embeddings_created,
            total_embeddings: outcome.total_embeddings,
            pages: outcome.pages,
            fingerprint: outcome.fingerprint,
        }
    }
}

/// Collect every `file`/`files` part of a multipart body.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<Upload>, AppError> {
    let mut uploads = Vec::new();
    while let Some(field) = multipart.next_field().await.map_err(invalid_multipart)? {
        if !matches!(field.name(), Some("file" | "files")) {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload").to_string();
        let bytes = field.bytes().await.map_err(invalid_multipart)?;
        uploads.push(Upload {
            filename,
            bytes: bytes.to_vec(),
        });
    }
    Ok(uploads)
}

fn invalid_multipart(error: MultipartError) -> AppError {
    AppError(ProcessingError::InvalidInput(format!(
        "Invalid multipart payload: {error}"
    )))
}

/// Index one uploaded document into the shared knowledge base.
async fn ingest_document<S>(
    State(service): State<Arc<S>>,
    multipart: Multipart,
) -> Result<Json<IngestResponse>, AppError>
where
    S: RagApi,
{
    let mut uploads = read_uploads(multipart).await?;
    if uploads.len() != 1 {
        return Err(AppError(ProcessingError::InvalidInput(format!(
            "Expected exactly one file in the 'file' field, received {}",
            uploads.len()
        ))));
    }
    let upload = uploads.remove(0);
    let outcome = service.ingest(upload).await?;
    Ok(Json(outcome.into()))
}

/// Request body for `POST /api/v1/query`.
#[derive(Deserialize)]
struct QueryBody {
    query: String,
    #[serde(default)]
    k: Option<usize>,
    #[serde(default)]
    style: ResponseStyle,
    #[serde(default)]
    cite: bool,
}

/// One answer with the retrieved context that grounded it.
#[derive(Serialize)]
struct AnswerResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    document: Option<String>,
    answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cited_answer: Option<String>,
    context_fragments: Vec<String>,
    sources: Vec<SourceRef>,
}

impl From<QueryOutcome> for AnswerResponse {
    fn from(outcome: QueryOutcome) -> Self {
        let sources = outcome.context.iter().map(|chunk| chunk.source_ref()).collect();
        Self {
            document: outcome.document,
            answer: outcome.answer,
            cited_answer: outcome.cited_answer,
            context_fragments: outcome.context.into_iter().map(|chunk| chunk.text).collect(),
            sources,
        }
    }
}

async fn query_documents<S>(
    State(service): State<Arc<S>>,
    Json(body): Json<QueryBody>,
) -> Result<Json<AnswerResponse>, AppError>
where
    S: RagApi,
{
    let outcome = service
        .query(QueryRequest {
            query: body.query,
            k: body.k,
            style: body.style,
            cite: body.cite,
        })
        .await?;
    Ok(Json(outcome.into()))
}

/// Request body for `POST /api/v1/sessions`.
#[derive(Deserialize)]
struct CreateSessionBody {
    #[serde(default)]
    mode: SessionMode,
}

async fn create_session<S>(
    State(service): State<Arc<S>>,
    body: Option<Json<CreateSessionBody>>,
) -> (StatusCode, Json<SessionInfo>)
where
    S: RagApi,
{
    let mode = body.map(|Json(body)| body.mode).unwrap_or_default();
    (StatusCode::CREATED, Json(service.create_session(mode).await))
}

#[derive(Serialize)]
struct SessionDocumentsResponse {
    session_id: Uuid,
    documents: Vec<IngestResponse>,
}

async fn add_session_documents<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
    multipart: Multipart,
) -> Result<Json<SessionDocumentsResponse>, AppError>
where
    S: RagApi,
{
    let uploads = read_uploads(multipart).await?;
    let outcomes = service.add_session_documents(session_id, uploads).await?;
    Ok(Json(SessionDocumentsResponse {
        session_id,
        documents: outcomes.into_iter().map(IngestResponse::from).collect(),
    }))
}

/// Request body for `POST /api/v1/sessions/:id/query`.
#[derive(Deserialize)]
struct SessionQueryBody {
    query: String,
    #[serde(default)]
    style: ResponseStyle,
}

#[derive(Serialize)]
struct SessionAnswersResponse {
    answers: Vec<AnswerResponse>,
}

async fn query_session<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
    Json(body): Json<SessionQueryBody>,
) -> Result<Json<SessionAnswersResponse>, AppError>
where
    S: RagApi,
{
    let outcomes = service
        .query_session(
            session_id,
            QueryRequest {
                query: body.query,
                k: None,
                style: body.style,
                cite: true,
            },
        )
        .await?;
    Ok(Json(SessionAnswersResponse {
        answers: outcomes.into_iter().map(AnswerResponse::from).collect(),
    }))
}

async fn close_session<S>(
    State(service): State<Arc<S>>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, AppError>
where
    S: RagApi,
{
    service.close_session(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Return the pipeline counters.
async fn get_metrics<S>(State(service): State<Arc<S>>) -> Json<MetricsSnapshot>
where
    S: RagApi,
{
    Json(service.metrics_snapshot())
}

/// Descriptor for a single command in the discovery catalog.
#[derive(Serialize)]
struct CommandDescriptor {
    name: &'static str,
    method: &'static str,
    path: &'static str,
    description: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_example: Option<serde_json::Value>,
}

/// Response body for `GET /api/v1/commands`.
#[derive(Serialize)]
struct CommandsResponse {
    commands: Vec<CommandDescriptor>,
}

/// Enumerate supported HTTP commands for discovery in hosts and tools.
async fn get_commands() -> Json<CommandsResponse> {
    Json(CommandsResponse {
        commands: vec![
            CommandDescriptor {
                name: "ingest",
                method: "POST",
                path: "/api/v1/ingest",
                description: "Upload one PDF or text file (multipart field 'file'); it is chunked, embedded and indexed, then deleted from disk.",
                request_example: None,
            },
            CommandDescriptor {
                name: "query",
                method: "POST",
                path: "/api/v1/query",
                description: "Answer a question using only the indexed documents. Returns the answer, context fragments and their sources.",
                request_example: Some(json!({
                    "query": "What is the project budget?",
                    "k": 5,
                    "style": "concise",
                    "cite": true
                })),
            },
            CommandDescriptor {
                name: "create_session",
                method: "POST",
                path: "/api/v1/sessions",
                description: "Open a session with a single shared knowledge base or one index per document.",
                request_example: Some(json!({"mode": "multi"})),
            },
            CommandDescriptor {
                name: "add_session_documents",
                method: "POST",
                path: "/api/v1/sessions/:id/documents",
                description: "Upload one or more files (multipart fields 'file' or 'files') into a session.",
                request_example: None,
            },
            CommandDescriptor {
                name: "query_session",
                method: "POST",
                path: "/api/v1/sessions/:id/query",
                description: "Ask one question of a session; multi-document sessions answer per document with sentence citations.",
                request_example: Some(json!({
                    "query": "How do the termination clauses differ?",
                    "style": "executive_summary"
                })),
            },
            CommandDescriptor {
                name: "close_session",
                method: "DELETE",
                path: "/api/v1/sessions/:id",
                description: "Close a session and discard its indexes.",
                request_example: None,
            },
            CommandDescriptor {
                name: "metrics",
                method: "GET",
                path: "/api/v1/metrics",
                description: "Return ingestion and query counters.",
                request_example: None,
            },
            CommandDescriptor {
                name: "health",
                method: "GET",
                path: "/health",
                description: "Report readiness, retention policy and index statistics.",
                request_example: None,
            },
        ],
    })
}

struct AppError(ProcessingError);

impl AppError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            ProcessingError::InvalidInput(_)
            | ProcessingError::EmptyIndex
            | ProcessingError::NoExtractableText(_)
            | ProcessingError::Extraction(
                ExtractionError::UnsupportedFormat(_) | ExtractionError::ToolFailed { .. },
            ) => {
                StatusCode::BAD_REQUEST
            }
            ProcessingError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            ProcessingError::Embedding(EmbeddingClientError::MissingCredential)
            | ProcessingError::Generation(GenerationClientError::MissingCredential) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ProcessingError::Embedding(_) | ProcessingError::Generation(_) => {
                StatusCode::BAD_GATEWAY
            }
            ProcessingError::Config(_)
            | ProcessingError::Extraction(_)
            | ProcessingError::Chunking(_)
            | ProcessingError::Index(_)
            | ProcessingError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let detail = self.0.to_string();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %detail, "Request failed");
        } else {
            tracing::warn!(status = status.as_u16(), error = %detail, "Request rejected");
        }
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

impl From<ProcessingError> for AppError {
    fn from(inner: ProcessingError) -> Self {
        Self(inner)
    }
}
