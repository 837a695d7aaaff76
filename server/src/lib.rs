use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use search_core::{Error, IndexReader, QueryParser, Searcher, Similarity};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

const MAX_K: usize = 1000;

#[derive(Deserialize)]
pub struct SearchParams {
    pub q: String,
    #[serde(default = "default_k")]
    pub k: usize,
}
fn default_k() -> usize { 10 }

#[derive(Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub took_ms: u128,
    pub took_s: f64,
    pub total_hits: usize,
    pub results: Vec<SearchHit>,
}

#[derive(Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub score: f32,
    pub path: String,
}

/// Shared by every request handler. The snapshot is immutable, so readers never lock.
#[derive(Clone)]
pub struct AppState {
    pub reader: Arc<IndexReader>,
    pub parser: Arc<QueryParser>,
    pub similarity: Similarity,
}

pub struct ApiError(StatusCode, String);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        match e {
            Error::QuerySyntax { .. } | Error::EmptyQuery => ApiError(StatusCode::BAD_REQUEST, e.to_string()),
            other => {
                tracing::error!(error = %other, "search failed");
                ApiError(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({ "error": self.1 }))).into_response()
    }
}

/// CORS from `CORS_ALLOW_ORIGIN` (comma-separated origins); any origin when unset or empty.
fn cors_layer() -> CorsLayer {
    let origins: Vec<HeaderValue> = std::env::var("CORS_ALLOW_ORIGIN")
        .map(|val| val.split(',').filter_map(|s| s.trim().parse().ok()).collect())
        .unwrap_or_default();
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(AllowOrigin::list(origins))
    }
}

/// Open the committed snapshot under `index_dir` once and build the router over it.
pub fn build_app<P: AsRef<std::path::Path>>(index_dir: P, similarity: Similarity) -> Result<Router> {
    let index_dir = index_dir.as_ref();
    let reader = IndexReader::open(index_dir)?;
    tracing::info!(
        index = %index_dir.display(),
        generation = reader.generation(),
        num_docs = reader.meta().num_docs,
        "index loaded"
    );
    let parser = QueryParser::new(reader.analyzer());
    let app_state = AppState { reader: Arc::new(reader), parser: Arc::new(parser), similarity };

    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/search", get(search_handler))
        .route("/doc/:doc_id", get(doc_handler))
        .with_state(app_state)
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http());
    Ok(app)
}

pub async fn search_handler(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let start = std::time::Instant::now();
    let query = state.parser.parse(&params.q)?;
    let k = params.k.min(MAX_K);
    let top = Searcher::new(state.reader.as_ref(), state.similarity).search(&query, k)?;

    let results = top
        .hits
        .into_iter()
        .map(|hit| {
            let path = state.reader.doc_by_external_id(&hit.external_id).map(|d| d.path.clone()).unwrap_or_default();
            SearchHit { doc_id: hit.external_id, score: hit.score, path }
        })
        .collect();

    let elapsed = start.elapsed();
    Ok(Json(SearchResponse {
        query: params.q,
        took_ms: elapsed.as_millis(),
        took_s: elapsed.as_secs_f64(),
        total_hits: top.total_hits,
        results,
    }))
}

pub async fn doc_handler(State(state): State<AppState>, Path(doc_id): Path<String>) -> Response {
    match state.reader.doc_by_external_id(&doc_id) {
        Some(meta) => Json(serde_json::json!({
            "doc_id": meta.external_id,
            "path": meta.path,
            "filename": meta.filename,
            "byte_len": meta.byte_len,
            "token_count": meta.token_count,
        }))
        .into_response(),
        None => (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "not found" }))).into_response(),
    }
}
