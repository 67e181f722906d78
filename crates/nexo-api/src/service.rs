//! Kind-generic submit/status/download service over the job store.
//!
//! One implementation serves every job kind: submission is the atomic
//! find-or-create, status is the stored spec plus lifecycle fields, and
//! download resolves the per-kind artifact. Only request parsing is
//! kind-specific, and that lives in the route handlers.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};
use tracing::info;
use uuid::Uuid;

use nexo_core::{EntityStore, JobKind, JobRecord, JobStatus, JobStore, NewJob};
use nexo_jobs::JobDirs;

use crate::error::ApiError;

/// Shared state handed to every route handler.
#[derive(Clone)]
pub struct AppState {
    pub jobs: Arc<dyn JobStore>,
    pub entities: Arc<dyn EntityStore>,
    pub dirs: JobDirs,
    pub store_version: String,
}

/// Submit a normalized job: find-or-create and return the client-facing
/// UID. Idempotent under identical normalized parameters.
pub async fn submit(state: &AppState, job: NewJob) -> Result<String, ApiError> {
    let kind = job.kind;
    let (record, created) = state.jobs.find_or_create(job).await?;
    info!(
        subsystem = "api",
        op = "submit",
        job_kind = %kind,
        job_uid = %record.uid,
        created,
        "Job submission resolved"
    );
    Ok(record.uid.to_string())
}

/// Status envelope: the stored spec's fields plus `uid`, `status`, and the
/// error/result when present.
pub fn status_payload(record: &JobRecord) -> JsonValue {
    let mut payload = match &record.spec {
        JsonValue::Object(map) => map.clone(),
        other => Map::from_iter([("spec".to_string(), other.clone())]),
    };
    payload.insert("uid".to_string(), JsonValue::String(record.uid.to_string()));
    payload.insert(
        "status".to_string(),
        JsonValue::String(record.status.to_string()),
    );
    if let Some(error) = &record.error {
        payload.insert("error".to_string(), JsonValue::String(error.clone()));
    }
    if let Some(result) = &record.result {
        payload.insert("result".to_string(), result.clone());
    }
    JsonValue::Object(payload)
}

/// Look up a record by kind and UID string. Malformed or unknown UIDs and
/// kind mismatches all resolve to `None`.
pub async fn find_job(
    state: &AppState,
    kind: JobKind,
    uid: &str,
) -> Result<Option<JobRecord>, ApiError> {
    let Ok(uid) = uid.parse::<Uuid>() else {
        return Ok(None);
    };
    let record = state.jobs.get(uid).await?;
    Ok(record.filter(|r| r.kind == kind))
}

/// Artifact location and media type for a completed job.
pub fn artifact_spec(kind: JobKind) -> (&'static str, &'static str) {
    match kind {
        JobKind::TrustRank | JobKind::Closeness | JobKind::Diamond => ("txt", "text/plain"),
        JobKind::Must | JobKind::Bicon => ("tar.gz", "application/gzip"),
        JobKind::GraphBuild => ("graphml", "text/plain"),
    }
}

/// Resolve a download: artifact bytes plus media type.
///
/// Unknown UIDs and non-completed jobs produce distinct not-found errors;
/// partial artifacts are never served.
pub async fn download(
    state: &AppState,
    kind: JobKind,
    uid: &str,
) -> Result<(Vec<u8>, &'static str), ApiError> {
    let record = find_job(state, kind, uid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No {kind} job with UID {uid}")))?;

    if record.status != JobStatus::Completed {
        return Err(ApiError::NotFound(format!(
            "{kind} job with UID {uid} does not have completed status"
        )));
    }

    let (ext, media_type) = artifact_spec(kind);
    let path = state.dirs.artifact(kind, record.uid, ext);
    let bytes = std::fs::read(&path).map_err(|e| {
        ApiError::Internal(nexo_core::Error::Internal(format!(
            "Artifact for completed job {uid} is unreadable: {e}"
        )))
    })?;
    Ok((bytes, media_type))
}
