//! # nexo-jobs
//!
//! Job execution for nexograph: the claim-loop worker, one handler per job
//! kind, external tool invocation, seed-network extraction, result
//! materialization, and the graph construction engine.
//!
//! ## Example
//!
//! ```ignore
//! use nexo_jobs::{JobEnv, JobDirs, ToolPaths, WorkerBuilder, WorkerConfig};
//! use nexo_jobs::kinds::{GraphBuildHandler, TrustRankHandler};
//!
//! let env = JobEnv::new(store, ToolPaths::from_env(), JobDirs::new("results"), timeout);
//! let worker = WorkerBuilder::new(job_store)
//!     .with_config(WorkerConfig::from_env())
//!     .with_handler(TrustRankHandler::new(env.clone()))
//!     .with_handler(GraphBuildHandler::new(env.clone()))
//!     .build()
//!     .await;
//! let handle = worker.start();
//! ```

pub mod graph;
pub mod handler;
pub mod invoker;
pub mod kinds;
pub mod network;
pub mod paths;
pub mod results;
pub mod worker;

// Re-export core types
pub use nexo_core::*;

pub use handler::{JobEnv, JobHandler, JobOutcome, NoOpHandler};
pub use invoker::{ToolCommand, ToolOutput, ToolPaths};
pub use network::{NetworkChoice, NetworkService, SeedKind};
pub use paths::JobDirs;
pub use worker::{JobWorker, WorkerBuilder, WorkerConfig, WorkerEvent, WorkerHandle};
