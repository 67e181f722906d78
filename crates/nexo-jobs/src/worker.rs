//! Job worker: claims submitted records and runs them to a terminal state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use nexo_core::{defaults, JobKind, JobRecord, JobStore};

use crate::handler::{JobHandler, JobOutcome};

/// Configuration for the job worker.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Polling interval in milliseconds when no work is available.
    pub poll_interval_ms: u64,
    /// Maximum number of concurrent jobs.
    pub max_concurrent_jobs: usize,
    /// Whether to enable job processing.
    pub enabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: defaults::JOB_POLL_INTERVAL_MS,
            max_concurrent_jobs: defaults::JOB_MAX_CONCURRENT,
            enabled: true,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `NEXO_JOB_WORKER_ENABLED` | `true` | Enable/disable job processing |
    /// | `NEXO_JOB_MAX_CONCURRENT` | `4` | Max concurrent jobs |
    /// | `NEXO_JOB_POLL_INTERVAL_MS` | `500` | Polling interval when idle |
    pub fn from_env() -> Self {
        let enabled = std::env::var("NEXO_JOB_WORKER_ENABLED")
            .map(|v| v != "false" && v != "0")
            .unwrap_or(true);

        let max_concurrent_jobs = std::env::var("NEXO_JOB_MAX_CONCURRENT")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(defaults::JOB_MAX_CONCURRENT)
            .max(1);

        let poll_interval_ms = std::env::var("NEXO_JOB_POLL_INTERVAL_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults::JOB_POLL_INTERVAL_MS);

        Self {
            poll_interval_ms,
            max_concurrent_jobs,
            enabled,
        }
    }

    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval_ms = ms;
        self
    }

    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent_jobs = max;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Event emitted by the job worker.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
    JobStarted { uid: Uuid, kind: JobKind },
    JobCompleted { uid: Uuid, kind: JobKind },
    JobFailed { uid: Uuid, kind: JobKind, error: String },
    WorkerStarted,
    WorkerStopped,
}

/// Handle for controlling a running worker.
pub struct WorkerHandle {
    shutdown_tx: mpsc::Sender<()>,
    event_rx: broadcast::Receiver<WorkerEvent>,
}

impl WorkerHandle {
    /// Signal the worker to shut down gracefully.
    pub async fn shutdown(&self) -> nexo_core::Result<()> {
        self.shutdown_tx
            .send(())
            .await
            .map_err(|_| nexo_core::Error::Internal("Failed to send shutdown signal".into()))?;
        Ok(())
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_rx.resubscribe()
    }
}

/// Job worker that executes claimed records.
pub struct JobWorker {
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobWorker {
    pub fn new(store: Arc<dyn JobStore>, config: WorkerConfig) -> Self {
        let (event_tx, _) = broadcast::channel(defaults::EVENT_BUS_CAPACITY);
        Self {
            store,
            config,
            handlers: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
        }
    }

    /// Register a handler for a job kind.
    pub async fn register_handler<H: JobHandler + 'static>(&self, handler: H) {
        let kind = handler.kind();
        let mut handlers = self.handlers.write().await;
        handlers.insert(kind, Arc::new(handler));
        debug!(job_kind = %kind, "Registered job handler");
    }

    /// Start the worker and return a handle for control.
    pub fn start(self) -> WorkerHandle {
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel(1);
        let event_rx = self.event_tx.subscribe();

        let worker = Arc::new(self);
        tokio::spawn(async move {
            worker.run(&mut shutdown_rx).await;
        });

        WorkerHandle {
            shutdown_tx,
            event_rx,
        }
    }

    /// Run the worker loop with concurrent job processing.
    ///
    /// Claims up to `max_concurrent_jobs` at a time; only sleeps when the
    /// queue is empty.
    #[instrument(skip(self, shutdown_rx))]
    async fn run(&self, shutdown_rx: &mut mpsc::Receiver<()>) {
        if !self.config.enabled {
            info!("Job worker is disabled, not starting");
            return;
        }

        info!(
            poll_interval_ms = self.config.poll_interval_ms,
            max_concurrent = self.config.max_concurrent_jobs,
            "Job worker started"
        );
        let _ = self.event_tx.send(WorkerEvent::WorkerStarted);

        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            if shutdown_rx.try_recv().is_ok() {
                info!("Job worker received shutdown signal");
                break;
            }

            let mut claimed = 0;
            let mut tasks = tokio::task::JoinSet::new();

            for _ in 0..self.config.max_concurrent_jobs {
                match self.claim_job().await {
                    Some(job) => {
                        claimed += 1;
                        let runner = self.clone_refs();
                        tasks.spawn(async move {
                            runner.execute_job(job).await;
                        });
                    }
                    None => break,
                }
            }

            if claimed == 0 {
                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        info!("Job worker received shutdown signal");
                        break;
                    }
                    _ = sleep(poll_interval) => {}
                }
            } else {
                debug!(claimed, "Processing concurrent job batch");
                while let Some(result) = tasks.join_next().await {
                    if let Err(e) = result {
                        error!(error = ?e, "Job task panicked outside the handler boundary");
                    }
                }
            }
        }

        let _ = self.event_tx.send(WorkerEvent::WorkerStopped);
        info!("Job worker stopped");
    }

    /// Claim the next submitted record for a kind we have a handler for.
    async fn claim_job(&self) -> Option<JobRecord> {
        let kinds: Vec<JobKind> = {
            let handlers = self.handlers.read().await;
            handlers.keys().copied().collect()
        };
        if kinds.is_empty() {
            return None;
        }

        match self.store.claim_next(&kinds).await {
            Ok(job) => job,
            Err(e) => {
                error!(error = %e, "Failed to claim job");
                None
            }
        }
    }

    fn clone_refs(&self) -> JobRunner {
        JobRunner {
            store: self.store.clone(),
            handlers: self.handlers.clone(),
            event_tx: self.event_tx.clone(),
        }
    }

    /// Get a receiver for worker events.
    pub fn events(&self) -> broadcast::Receiver<WorkerEvent> {
        self.event_tx.subscribe()
    }
}

/// Reference bundle for executing a single claimed job in a spawned task.
struct JobRunner {
    store: Arc<dyn JobStore>,
    handlers: Arc<RwLock<HashMap<JobKind, Arc<dyn JobHandler>>>>,
    event_tx: broadcast::Sender<WorkerEvent>,
}

impl JobRunner {
    /// Execute one claimed job and write its terminal state.
    ///
    /// Every failure mode inside the handler, including a panic, is caught
    /// here and converted to a `failed` transition; a claimed record never
    /// silently stays `running` while the process lives.
    async fn execute_job(self, job: JobRecord) {
        let start = Instant::now();
        let uid = job.uid;
        let kind = job.kind;

        info!(job_uid = %uid, job_kind = %kind, "Processing job");
        let _ = self.event_tx.send(WorkerEvent::JobStarted { uid, kind });

        let handler = {
            let handlers = self.handlers.read().await;
            handlers.get(&kind).cloned()
        };

        let outcome = match handler {
            Some(handler) => {
                match std::panic::AssertUnwindSafe(handler.execute(&job))
                    .catch_unwind()
                    .await
                {
                    Ok(outcome) => outcome,
                    Err(_) => JobOutcome::Failed("Job handler panicked".to_string()),
                }
            }
            None => {
                warn!(job_kind = %kind, "No handler registered for job kind");
                JobOutcome::Failed(format!("No handler for job kind: {kind}"))
            }
        };

        match outcome {
            JobOutcome::Completed(result) => {
                if let Err(e) = self.store.complete(uid, result).await {
                    error!(error = %e, job_uid = %uid, "Failed to mark job as completed");
                } else {
                    info!(
                        job_uid = %uid,
                        job_kind = %kind,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job completed successfully"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobCompleted { uid, kind });
                }
            }
            JobOutcome::Failed(error) => {
                if let Err(e) = self.store.fail(uid, &error).await {
                    error!(error = %e, job_uid = %uid, "Failed to mark job as failed");
                } else {
                    warn!(
                        job_uid = %uid,
                        job_kind = %kind,
                        %error,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Job failed"
                    );
                    let _ = self.event_tx.send(WorkerEvent::JobFailed { uid, kind, error });
                }
            }
        }
    }
}

/// Builder for creating a job worker with handlers.
pub struct WorkerBuilder {
    store: Arc<dyn JobStore>,
    config: WorkerConfig,
    handlers: Vec<Box<dyn JobHandler>>,
}

impl WorkerBuilder {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self {
            store,
            config: WorkerConfig::default(),
            handlers: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_handler<H: JobHandler + 'static>(mut self, handler: H) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    pub async fn build(self) -> JobWorker {
        let worker = JobWorker::new(self.store, self.config);
        for handler in self.handlers {
            let kind = handler.kind();
            let mut handlers = worker.handlers.write().await;
            handlers.insert(kind, Arc::from(handler));
        }
        worker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nexo_core::{JobStatus, NewJob};
    use nexo_store::MemoryJobStore;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        kind: JobKind,
        runs: Arc<AtomicUsize>,
        outcome_error: Option<String>,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        fn kind(&self) -> JobKind {
            self.kind
        }

        async fn execute(&self, _job: &JobRecord) -> JobOutcome {
            self.runs.fetch_add(1, Ordering::SeqCst);
            match &self.outcome_error {
                Some(error) => JobOutcome::Failed(error.clone()),
                None => JobOutcome::Completed(Some(serde_json::json!({"ok": true}))),
            }
        }
    }

    struct PanickingHandler;

    #[async_trait]
    impl JobHandler for PanickingHandler {
        fn kind(&self) -> JobKind {
            JobKind::Diamond
        }

        async fn execute(&self, _job: &JobRecord) -> JobOutcome {
            panic!("handler bug");
        }
    }

    fn new_job(fingerprint: &str, kind: JobKind) -> NewJob {
        NewJob {
            fingerprint: fingerprint.to_string(),
            kind,
            spec: serde_json::json!({}),
        }
    }

    async fn wait_for_terminal(
        store: &Arc<MemoryJobStore>,
        uid: Uuid,
    ) -> nexo_core::JobRecord {
        for _ in 0..200 {
            let record = store.get(uid).await.unwrap().unwrap();
            if record.status.is_terminal() {
                return record;
            }
            sleep(Duration::from_millis(5)).await;
        }
        panic!("job {uid} never reached a terminal state");
    }

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.poll_interval_ms, defaults::JOB_POLL_INTERVAL_MS);
        assert_eq!(config.max_concurrent_jobs, defaults::JOB_MAX_CONCURRENT);
        assert!(config.enabled);
    }

    #[test]
    fn test_worker_config_builder() {
        let config = WorkerConfig::default()
            .with_poll_interval(50)
            .with_max_concurrent(8)
            .with_enabled(false);
        assert_eq!(config.poll_interval_ms, 50);
        assert_eq!(config.max_concurrent_jobs, 8);
        assert!(!config.enabled);
    }

    #[tokio::test]
    async fn test_worker_runs_job_exactly_once() {
        let store = Arc::new(MemoryJobStore::new());
        let runs = Arc::new(AtomicUsize::new(0));

        // Fifty concurrent submits of the same fingerprint: one record.
        let mut tasks = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .find_or_create(new_job("shared", JobKind::TrustRank))
                    .await
                    .unwrap()
                    .0
                    .uid
            }));
        }
        let mut uids = Vec::new();
        for task in tasks {
            uids.push(task.await.unwrap());
        }
        uids.sort();
        uids.dedup();
        assert_eq!(uids.len(), 1);
        let uid = uids[0];

        let worker = WorkerBuilder::new(store.clone() as Arc<dyn JobStore>)
            .with_config(WorkerConfig::default().with_poll_interval(5))
            .with_handler(CountingHandler {
                kind: JobKind::TrustRank,
                runs: runs.clone(),
                outcome_error: None,
            })
            .build()
            .await;
        let handle = worker.start();

        let record = wait_for_terminal(&store, uid).await;
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result, Some(serde_json::json!({"ok": true})));
        assert!(record.started_at.is_some());
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_records_failure() {
        let store = Arc::new(MemoryJobStore::new());
        let runs = Arc::new(AtomicUsize::new(0));
        let (record, _) = store
            .find_or_create(new_job("fp", JobKind::Must))
            .await
            .unwrap();

        let worker = WorkerBuilder::new(store.clone() as Arc<dyn JobStore>)
            .with_config(WorkerConfig::default().with_poll_interval(5))
            .with_handler(CountingHandler {
                kind: JobKind::Must,
                runs: runs.clone(),
                outcome_error: Some("must exited with return code 1".to_string()),
            })
            .build()
            .await;
        let handle = worker.start();

        let done = wait_for_terminal(&store, record.uid).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(
            done.error.as_deref(),
            Some("must exited with return code 1")
        );

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_converts_panic_to_failed() {
        let store = Arc::new(MemoryJobStore::new());
        let (record, _) = store
            .find_or_create(new_job("fp", JobKind::Diamond))
            .await
            .unwrap();

        let worker = WorkerBuilder::new(store.clone() as Arc<dyn JobStore>)
            .with_config(WorkerConfig::default().with_poll_interval(5))
            .with_handler(PanickingHandler)
            .build()
            .await;
        let handle = worker.start();

        let done = wait_for_terminal(&store, record.uid).await;
        assert_eq!(done.status, JobStatus::Failed);
        assert_eq!(done.error.as_deref(), Some("Job handler panicked"));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_worker_ignores_unhandled_kinds() {
        let store = Arc::new(MemoryJobStore::new());
        store
            .find_or_create(new_job("fp", JobKind::Bicon))
            .await
            .unwrap();

        let worker = WorkerBuilder::new(store.clone() as Arc<dyn JobStore>)
            .with_config(WorkerConfig::default().with_poll_interval(5))
            .with_handler(NoOpHandlerForKind(JobKind::TrustRank))
            .build()
            .await;
        let handle = worker.start();

        // Bicon has no handler registered; the record must stay submitted
        // rather than being claimed and failed.
        sleep(Duration::from_millis(50)).await;
        assert_eq!(store.submitted_count().await.unwrap(), 1);

        handle.shutdown().await.unwrap();
    }

    struct NoOpHandlerForKind(JobKind);

    #[async_trait]
    impl JobHandler for NoOpHandlerForKind {
        fn kind(&self) -> JobKind {
            self.0
        }

        async fn execute(&self, _job: &JobRecord) -> JobOutcome {
            JobOutcome::Completed(None)
        }
    }
}
