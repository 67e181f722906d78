//! In-memory store implementations.
//!
//! These back the unit tests of every crate that consumes the store traits
//! and double as the backend for ephemeral single-process deployments.
//! Always compiled (not `cfg(test)`) so downstream crates can use them from
//! their own test modules.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use nexo_core::{
    EdgeFilter, Entity, EntityStore, Error, JobKind, JobRecord, JobStatus, JobStore, NewJob,
    NodeFilter, Result,
};

#[derive(Default)]
struct JobTable {
    by_fingerprint: HashMap<String, Uuid>,
    records: HashMap<Uuid, JobRecord>,
}

/// Mutex-guarded [`JobStore`] with the same atomicity contract as the
/// PostgreSQL implementation: find-or-create and claim are single critical
/// sections, so no two creates for one fingerprint both observe
/// `created=true` and no two claimants win the same record.
#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<JobTable>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn find_or_create(&self, job: NewJob) -> Result<(JobRecord, bool)> {
        let mut table = self.inner.lock().expect("job table poisoned");

        if let Some(uid) = table.by_fingerprint.get(&job.fingerprint) {
            let record = table.records[uid].clone();
            return Ok((record, false));
        }

        let record = JobRecord {
            uid: Uuid::new_v4(),
            fingerprint: job.fingerprint.clone(),
            kind: job.kind,
            spec: job.spec,
            status: JobStatus::Submitted,
            error: None,
            result: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        table.by_fingerprint.insert(job.fingerprint, record.uid);
        table.records.insert(record.uid, record.clone());
        Ok((record, true))
    }

    async fn get(&self, uid: Uuid) -> Result<Option<JobRecord>> {
        let table = self.inner.lock().expect("job table poisoned");
        Ok(table.records.get(&uid).cloned())
    }

    async fn claim_next(&self, kinds: &[JobKind]) -> Result<Option<JobRecord>> {
        let mut table = self.inner.lock().expect("job table poisoned");

        let next = table
            .records
            .values()
            .filter(|r| r.status == JobStatus::Submitted)
            .filter(|r| kinds.is_empty() || kinds.contains(&r.kind))
            .min_by_key(|r| r.created_at)
            .map(|r| r.uid);

        let Some(uid) = next else {
            return Ok(None);
        };
        let record = table.records.get_mut(&uid).expect("claimed record exists");
        record.status = JobStatus::Running;
        record.started_at = Some(Utc::now());
        Ok(Some(record.clone()))
    }

    async fn complete(&self, uid: Uuid, result: Option<JsonValue>) -> Result<()> {
        let mut table = self.inner.lock().expect("job table poisoned");
        let record = table
            .records
            .get_mut(&uid)
            .ok_or(Error::JobNotFound(uid))?;
        if record.status != JobStatus::Running {
            return Err(Error::Job(format!(
                "Cannot complete job {uid}: not in running state"
            )));
        }
        record.status = JobStatus::Completed;
        record.result = result;
        record.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn fail(&self, uid: Uuid, error: &str) -> Result<()> {
        let mut table = self.inner.lock().expect("job table poisoned");
        let record = table
            .records
            .get_mut(&uid)
            .ok_or(Error::JobNotFound(uid))?;
        if record.status != JobStatus::Running {
            return Err(Error::Job(format!(
                "Cannot fail job {uid}: not in running state"
            )));
        }
        record.status = JobStatus::Failed;
        record.error = Some(error.to_string());
        record.completed_at = Some(Utc::now());
        Ok(())
    }

    async fn submitted_count(&self) -> Result<i64> {
        let table = self.inner.lock().expect("job table poisoned");
        Ok(table
            .records
            .values()
            .filter(|r| r.status == JobStatus::Submitted)
            .count() as i64)
    }
}

/// In-memory [`EntityStore`] populated from JSON fixtures.
#[derive(Default)]
pub struct MemoryEntityStore {
    nodes: HashMap<String, Vec<Entity>>,
    edges: HashMap<String, Vec<Entity>>,
}

impl MemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node document to a collection.
    pub fn insert_node(&mut self, collection: &str, attrs: JsonValue) {
        self.nodes
            .entry(collection.to_string())
            .or_default()
            .push(Entity::from(attrs));
    }

    /// Add an edge document to a collection.
    pub fn insert_edge(&mut self, collection: &str, attrs: JsonValue) {
        self.edges
            .entry(collection.to_string())
            .or_default()
            .push(Entity::from(attrs));
    }
}

#[async_trait]
impl EntityStore for MemoryEntityStore {
    async fn node_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.nodes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn edge_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.edges.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn nodes(&self, collection: &str, filter: &NodeFilter) -> Result<Vec<Entity>> {
        Ok(self
            .nodes
            .get(collection)
            .map(|entities| {
                entities
                    .iter()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn edges(&self, collection: &str, filter: &EdgeFilter) -> Result<Vec<Entity>> {
        Ok(self
            .edges
            .get(collection)
            .map(|entities| {
                entities
                    .iter()
                    .filter(|e| filter.matches(e))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
