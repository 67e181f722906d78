//! Job handler trait and execution context.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use nexo_core::{EntityStore, JobKind, JobRecord, Result};

use crate::invoker::ToolPaths;
use crate::network::NetworkService;
use crate::paths::JobDirs;

/// Shared environment handed to every job handler.
#[derive(Clone)]
pub struct JobEnv {
    /// Read-only typed entity store.
    pub store: Arc<dyn EntityStore>,
    /// Seed-network extraction with per-process caching.
    pub network: Arc<NetworkService>,
    /// External executable locations.
    pub tools: Arc<ToolPaths>,
    /// Per-kind artifact directory layout.
    pub dirs: JobDirs,
    /// Timeout applied to each external tool invocation.
    pub tool_timeout: Duration,
}

impl JobEnv {
    pub fn new(
        store: Arc<dyn EntityStore>,
        tools: ToolPaths,
        dirs: JobDirs,
        tool_timeout: Duration,
    ) -> Self {
        Self {
            network: Arc::new(NetworkService::new(store.clone())),
            store,
            tools: Arc::new(tools),
            dirs,
            tool_timeout,
        }
    }

    /// Artifact path for a job of the given kind.
    pub fn artifact(&self, kind: JobKind, uid: uuid::Uuid, ext: &str) -> PathBuf {
        self.dirs.artifact(kind, uid, ext)
    }
}

/// Result of job execution.
///
/// There is no retry variant: failures are terminal and visible via status,
/// and recovery is an administrative concern.
#[derive(Debug)]
pub enum JobOutcome {
    /// Job completed successfully with optional result data.
    Completed(Option<serde_json::Value>),
    /// Job failed with a human-readable error message.
    Failed(String),
}

impl JobOutcome {
    /// Convert a fallible run into an outcome, stringifying the error at
    /// the task boundary.
    pub fn from_run(run: Result<Option<serde_json::Value>>) -> Self {
        match run {
            Ok(result) => JobOutcome::Completed(result),
            Err(e) => JobOutcome::Failed(e.to_string()),
        }
    }
}

/// Trait for job handlers, one per [`JobKind`].
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The job kind this handler processes.
    fn kind(&self) -> JobKind;

    /// Execute the job. Implementations must not leave artifacts behind on
    /// failure paths that a later `completed` status would imply exist.
    async fn execute(&self, job: &JobRecord) -> JobOutcome;
}

/// No-op handler for testing the worker loop.
pub struct NoOpHandler {
    kind: JobKind,
}

impl NoOpHandler {
    pub fn new(kind: JobKind) -> Self {
        Self { kind }
    }
}

#[async_trait]
impl JobHandler for NoOpHandler {
    fn kind(&self) -> JobKind {
        self.kind
    }

    async fn execute(&self, _job: &JobRecord) -> JobOutcome {
        JobOutcome::Completed(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_core::Error;

    #[test]
    fn test_outcome_from_run_ok() {
        let outcome = JobOutcome::from_run(Ok(Some(serde_json::json!({"n": 1}))));
        assert!(matches!(outcome, JobOutcome::Completed(Some(_))));
    }

    #[test]
    fn test_outcome_from_run_err_keeps_message() {
        let outcome = JobOutcome::from_run(Err(Error::ToolExit {
            tool: "diamond".into(),
            code: 2,
        }));
        match outcome {
            JobOutcome::Failed(msg) => {
                assert!(msg.contains("diamond exited with return code 2"))
            }
            _ => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn test_noop_handler() {
        let handler = NoOpHandler::new(JobKind::TrustRank);
        assert_eq!(handler.kind(), JobKind::TrustRank);
    }
}
