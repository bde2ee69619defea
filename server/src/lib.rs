use anyhow::{Context, Result};
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sri_core::{DocId, Document, EngineConfig, ErrorKind, IndexCoordinator, Model, NewDocument, SledRepository};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub type Engine = IndexCoordinator<SledRepository>;

#[derive(Deserialize)]
pub struct DocumentInput {
    pub title: String,
    #[serde(alias = "body")]
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct DocumentDto {
    pub id: DocId,
    pub title: String,
    pub text: String,
}

impl From<Document> for DocumentDto {
    fn from(doc: Document) -> Self { Self { id: doc.id, title: doc.title, text: doc.body } }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    pub algo: String,
}
fn default_max_results() -> usize { 3 }

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub admin_token: Option<String>,
}

impl AppState {
    /// Open the document store under `data_dir/documents` and both indices under `data_dir/index`.
    pub fn open(data_dir: impl AsRef<std::path::Path>, admin_token: Option<String>) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let repo = SledRepository::open(data_dir.join("documents")).context("opening document store")?;
        let config = EngineConfig::under(data_dir.join("index")).from_env()?;
        let engine = IndexCoordinator::open(repo, &config).context("opening indices")?;
        Ok(Self { engine: Arc::new(engine), admin_token })
    }
}

pub enum ApiError {
    Engine(sri_core::Error),
    Unauthorized(&'static str),
}

impl From<sri_core::Error> for ApiError {
    fn from(err: sri_core::Error) -> Self { ApiError::Engine(err) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.to_string()),
            ApiError::Engine(err) => {
                let status = match err.kind() {
                    ErrorKind::Input => StatusCode::BAD_REQUEST,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::StorageUnavailable | ErrorKind::PartialConsistency | ErrorKind::Storage => {
                        tracing::error!(error = %err, reindex = err.requires_reindex(), "request failed");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, err.to_string())
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

pub fn build_app(state: AppState) -> Router {
    // CORS: read CORS_ALLOW_ORIGIN (comma-separated) or allow Any by default
    let cors = match std::env::var("CORS_ALLOW_ORIGIN") {
        Ok(val) => {
            let origins: Vec<_> = val
                .split(',')
                .filter_map(|s| s.trim().parse().ok())
                .collect();
            if origins.is_empty() {
                CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
            } else {
                CorsLayer::new().allow_origin(AllowOrigin::list(origins)).allow_methods(Any).allow_headers(Any)
            }
        }
        Err(_) => CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any),
    };

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/documents", post(create_document))
        .route("/api/documents/many", post(create_documents))
        .route("/api/documents/search", get(search_handler))
        .route("/api/documents/:id", get(get_document).delete(delete_document))
        .route("/api/admin/reindex", post(reindex))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

async fn create_document(State(state): State<AppState>, Json(input): Json<DocumentInput>) -> Result<Json<DocumentDto>, ApiError> {
    let doc = state.engine.create_document(NewDocument::new(input.title, input.text))?;
    Ok(Json(doc.into()))
}

async fn create_documents(State(state): State<AppState>, Json(inputs): Json<Vec<DocumentInput>>) -> Result<Json<Vec<DocumentDto>>, ApiError> {
    let docs = inputs.into_iter().map(|d| NewDocument::new(d.title, d.text)).collect();
    let created = state.engine.create_documents(docs)?;
    Ok(Json(created.into_iter().map(DocumentDto::from).collect()))
}

pub async fn search_handler(State(state): State<AppState>, Query(params): Query<SearchParams>) -> Result<Json<Vec<DocumentDto>>, ApiError> {
    let start = std::time::Instant::now();
    let model: Model = params.algo.parse()?;
    // zero is left for the engine to reject
    let k = params.max_results.min(100);
    let docs = state.engine.search_documents(&params.query, k, model)?;
    tracing::info!(query = %params.query, %model, k, hits = docs.len(), took_s = start.elapsed().as_secs_f64(), "search");
    Ok(Json(docs.into_iter().map(DocumentDto::from).collect()))
}

async fn get_document(State(state): State<AppState>, Path(id): Path<DocId>) -> Result<Json<DocumentDto>, ApiError> {
    Ok(Json(state.engine.get_document(id)?.into()))
}

async fn delete_document(State(state): State<AppState>, Path(id): Path<DocId>) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.delete_document(id)?;
    Ok(Json(serde_json::json!({ "message": "Document deleted successfully." })))
}

async fn reindex(State(state): State<AppState>, headers: HeaderMap) -> Result<Json<serde_json::Value>, ApiError> {
    authorize(&state, &headers)?;
    let num_docs = state.engine.reindex_all()?;
    let counts: serde_json::Map<String, serde_json::Value> = Model::ALL
        .into_iter()
        .map(|m| (m.to_string(), state.engine.total_document_count(m).into()))
        .collect();
    Ok(Json(serde_json::json!({ "reindexed": num_docs, "documents": counts })))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let required = match &state.admin_token {
        Some(t) => t,
        None => return Err(ApiError::Unauthorized("ADMIN_TOKEN not set")),
    };
    let provided = headers.get("X-ADMIN-TOKEN").and_then(|v| v.to_str().ok()).unwrap_or("");
    if provided == required {
        Ok(())
    } else {
        Err(ApiError::Unauthorized("invalid admin token"))
    }
}
