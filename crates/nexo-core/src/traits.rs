//! Store traits implemented by the persistence layer.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{EdgeFilter, Entity, JobKind, JobRecord, NewJob, NodeFilter};

/// Persistent table of job records keyed by fingerprint and by UID.
///
/// The store is the single source of truth for job status and serializes
/// all writes to a given record. Terminal transitions (`complete`, `fail`)
/// only apply to `running` records, so the lifecycle is strictly forward.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Atomically find an existing record with the same fingerprint or
    /// create a new `submitted` one.
    ///
    /// With concurrent callers sharing a fingerprint, exactly one observes
    /// `created == true`; all others receive the existing record (including
    /// terminal ones: a previously failed job is returned as-is and not
    /// retried).
    async fn find_or_create(&self, job: NewJob) -> Result<(JobRecord, bool)>;

    /// Look up a record by client-facing UID.
    async fn get(&self, uid: Uuid) -> Result<Option<JobRecord>>;

    /// Atomically claim the oldest `submitted` record of one of the given
    /// kinds, flipping it to `running`. At most one claimant wins a record.
    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<JobRecord>>;

    /// Transition a `running` record to `completed` with an optional result
    /// payload.
    async fn complete(&self, uid: Uuid, result: Option<JsonValue>) -> Result<()>;

    /// Transition a `running` record to `failed` with a human-readable error.
    async fn fail(&self, uid: Uuid, error: &str) -> Result<()>;

    /// Number of records still awaiting execution.
    async fn submitted_count(&self) -> Result<i64>;
}

/// Read-only view over the external typed node/edge store.
///
/// Entities are owned by the store; this system never writes them, and many
/// graph builds may read concurrently without coordination.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Names of all node collections.
    async fn node_collections(&self) -> Result<Vec<String>>;

    /// Names of all edge collections.
    async fn edge_collections(&self) -> Result<Vec<String>>;

    /// Nodes of one collection matching the filter.
    async fn nodes(&self, collection: &str, filter: &NodeFilter) -> Result<Vec<Entity>>;

    /// Edges of one collection matching the filter.
    async fn edges(&self, collection: &str, filter: &EdgeFilter) -> Result<Vec<Entity>>;
}
