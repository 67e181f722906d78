//! HTTP routes: per-kind submit handlers plus the kind-generic
//! status/download gateway.

use axum::extract::{Multipart, Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;

use nexo_core::{JobKind, NewJob};
use nexo_jobs::graph::GraphBuildRequest;
use nexo_jobs::kinds::{
    BiconSubmission, ClosenessRequest, DiamondRequest, MustRequest, TrustRankRequest,
};

use crate::error::ApiError;
use crate::service::{self, AppState};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/trustrank/submit", post(submit_trustrank))
        .route("/closeness/submit", post(submit_closeness))
        .route("/diamond/submit", post(submit_diamond))
        .route("/must/submit", post(submit_must))
        .route("/bicon/submit", post(submit_bicon))
        .route("/graph/builder", post(submit_graph))
        .route("/graph/details/:uid", get(graph_details))
        .route("/graph/download/:filename", get(graph_download))
        .route("/:kind/status", get(job_status))
        .route("/:kind/download", get(job_download))
        .route("/list_node_collections", get(list_node_collections))
        .route("/list_edge_collections", get(list_edge_collections))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct UidQuery {
    uid: String,
}

// =============================================================================
// SUBMIT
// =============================================================================

async fn submit_trustrank(
    State(state): State<AppState>,
    Json(request): Json<TrustRankRequest>,
) -> Result<Json<String>, ApiError> {
    let spec = request.normalize()?;
    let job = NewJob::from_spec(JobKind::TrustRank, &spec)?;
    Ok(Json(service::submit(&state, job).await?))
}

async fn submit_closeness(
    State(state): State<AppState>,
    Json(request): Json<ClosenessRequest>,
) -> Result<Json<String>, ApiError> {
    let spec = request.normalize()?;
    let job = NewJob::from_spec(JobKind::Closeness, &spec)?;
    Ok(Json(service::submit(&state, job).await?))
}

async fn submit_diamond(
    State(state): State<AppState>,
    Json(request): Json<DiamondRequest>,
) -> Result<Json<String>, ApiError> {
    let spec = request.normalize()?;
    let job = NewJob::from_spec(JobKind::Diamond, &spec)?;
    Ok(Json(service::submit(&state, job).await?))
}

async fn submit_must(
    State(state): State<AppState>,
    Json(request): Json<MustRequest>,
) -> Result<Json<String>, ApiError> {
    let spec = request.normalize()?;
    let job = NewJob::from_spec(JobKind::Must, &spec)?;
    Ok(Json(service::submit(&state, job).await?))
}

/// Multipart submission: the expression matrix upload plus optional tuning
/// fields.
async fn submit_bicon(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<String>, ApiError> {
    let mut filename = None;
    let mut bytes = None;
    let mut lg_min = None;
    let mut lg_max = None;
    let mut network = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "expression_file" => {
                filename = Some(
                    field
                        .file_name()
                        .unwrap_or("expression.csv")
                        .to_string(),
                );
                bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::BadRequest(format!("Upload failed: {e}")))?
                        .to_vec(),
                );
            }
            "lg_min" => lg_min = Some(int_field(field, "lg_min").await?),
            "lg_max" => lg_max = Some(int_field(field, "lg_max").await?),
            "network" => {
                network = Some(field.text().await.map_err(|e| {
                    ApiError::BadRequest(format!("Unreadable network field: {e}"))
                })?)
            }
            _ => {}
        }
    }

    let (Some(filename), Some(bytes)) = (filename, bytes) else {
        return Err(ApiError::BadRequest(
            "No expression_file submitted".to_string(),
        ));
    };

    let spec = BiconSubmission {
        filename,
        bytes,
        lg_min,
        lg_max,
        network,
    }
    .normalize(&state.dirs)?;
    Ok(Json(service::submit(&state, spec.new_job()?).await?))
}

async fn int_field(field: axum::extract::multipart::Field<'_>, name: &str) -> Result<i64, ApiError> {
    let text = field
        .text()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Unreadable {name} field: {e}")))?;
    text.parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name}: {text:?}")))
}

async fn submit_graph(
    State(state): State<AppState>,
    Json(request): Json<GraphBuildRequest>,
) -> Result<Json<String>, ApiError> {
    let valid_nodes = state.entities.node_collections().await?;
    let valid_edges = state.entities.edge_collections().await?;
    let spec = request.normalize(&valid_nodes, &valid_edges, &state.store_version)?;
    let job = NewJob::from_spec(JobKind::GraphBuild, &spec)?;
    Ok(Json(service::submit(&state, job).await?))
}

// =============================================================================
// STATUS / DOWNLOAD
// =============================================================================

/// Status of any job: the stored parameters plus `status` and `error`.
/// Unknown UIDs return an empty object.
async fn job_status(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<UidQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let kind: JobKind = kind.parse()?;
    match service::find_job(&state, kind, &query.uid).await? {
        Some(record) => Ok(Json(service::status_payload(&record))),
        None => Ok(Json(json!({}))),
    }
}

async fn job_download(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    Query(query): Query<UidQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let kind: JobKind = kind.parse()?;
    let (bytes, media_type) = service::download(&state, kind, &query.uid).await?;
    Ok(([(header::CONTENT_TYPE, media_type)], bytes))
}

/// Graph build details, including the original build parameters and the
/// error message when the build failed.
async fn graph_details(
    State(state): State<AppState>,
    Path(uid): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match service::find_job(&state, JobKind::GraphBuild, &uid).await? {
        Some(record) => Ok(Json(service::status_payload(&record))),
        None => Err(ApiError::NotFound(format!(
            "No graph with UID {uid:?} is recorded."
        ))),
    }
}

/// GraphML download; the path carries `{uid}.graphml` so clients get a
/// sensible filename.
async fn graph_download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let uid = filename.strip_suffix(".graphml").ok_or_else(|| {
        ApiError::NotFound(format!("No graph artifact named {filename:?}"))
    })?;
    let (bytes, media_type) = service::download(&state, JobKind::GraphBuild, uid).await?;
    Ok(([(header::CONTENT_TYPE, media_type)], bytes))
}

// =============================================================================
// COLLECTION LISTINGS
// =============================================================================

async fn list_node_collections(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.entities.node_collections().await?))
}

async fn list_edge_collections(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.entities.edge_collections().await?))
}
