//! nexo-api - HTTP API server for nexograph.
//!
//! Wires the persistence layer, the job worker, and the submit/status/
//! download gateway together.

mod config;
mod error;
mod routes;
mod service;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nexo_core::{defaults, EntityStore, JobStore};
use nexo_jobs::kinds::{
    BiconHandler, ClosenessHandler, DiamondHandler, GraphBuildHandler, MustHandler,
    TrustRankHandler,
};
use nexo_jobs::{JobDirs, JobEnv, ToolPaths, WorkerBuilder, WorkerConfig};
use nexo_store::Database;

use config::ServerConfig;
use service::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env()?;

    let db = Database::connect(&config.database_url).await?;
    let jobs: Arc<dyn JobStore> = Arc::new(db.jobs.clone());
    let entities: Arc<dyn EntityStore> = Arc::new(db.entities.clone());

    let dirs = JobDirs::new(&config.results_dir);
    dirs.ensure()?;

    let env = JobEnv::new(
        entities.clone(),
        ToolPaths::from_env(),
        dirs.clone(),
        Duration::from_secs(config.tool_timeout_secs),
    );

    let worker = WorkerBuilder::new(jobs.clone())
        .with_config(WorkerConfig::from_env())
        .with_handler(TrustRankHandler::new(env.clone()))
        .with_handler(ClosenessHandler::new(env.clone()))
        .with_handler(DiamondHandler::new(env.clone()))
        .with_handler(MustHandler::new(env.clone()))
        .with_handler(BiconHandler::new(env.clone()))
        .with_handler(GraphBuildHandler::new(env.clone()))
        .build()
        .await;
    let worker_handle = worker.start();

    let state = AppState {
        jobs,
        entities,
        dirs,
        store_version: config.store_version.clone(),
    };

    let app = routes::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(DefaultBodyLimit::max(defaults::MAX_BODY_SIZE_BYTES))
        .layer(RequestBodyLimitLayer::new(defaults::MAX_BODY_SIZE_BYTES));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(
        subsystem = "api",
        op = "startup",
        %addr,
        store_version = %config.store_version,
        "nexo-api listening"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    worker_handle.shutdown().await.ok();
    Ok(())
}
