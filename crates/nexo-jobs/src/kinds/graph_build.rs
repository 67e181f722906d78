//! Job handler for the in-process graph construction engine.
//!
//! Request normalization lives in [`crate::graph::build`]; this handler
//! runs the build and materializes the GraphML artifact.

use async_trait::async_trait;
use serde_json::{json, Value as JsonValue};

use nexo_core::{JobKind, JobRecord, Result};

use crate::graph::{self, GraphBuildSpec};
use crate::handler::{JobEnv, JobHandler, JobOutcome};

pub struct GraphBuildHandler {
    env: JobEnv,
}

impl GraphBuildHandler {
    pub fn new(env: JobEnv) -> Self {
        Self { env }
    }

    async fn run(&self, job: &JobRecord) -> Result<Option<JsonValue>> {
        let spec: GraphBuildSpec = serde_json::from_value(job.spec.clone())?;

        let graph = graph::build(self.env.store.as_ref(), &spec).await?;

        // The artifact must be fully written before the record flips to
        // completed: serialize to the final path, no temp-and-rename needed
        // since the path is private to this UID.
        let path = self.env.dirs.artifact(JobKind::GraphBuild, job.uid, "graphml");
        let file = std::io::BufWriter::new(std::fs::File::create(&path)?);
        graph::write_graphml(&graph, file)?;

        Ok(Some(json!({
            "nodes": graph.node_count(),
            "edges": graph.edge_count(),
        })))
    }
}

#[async_trait]
impl JobHandler for GraphBuildHandler {
    fn kind(&self) -> JobKind {
        JobKind::GraphBuild
    }

    async fn execute(&self, job: &JobRecord) -> JobOutcome {
        JobOutcome::from_run(self.run(job).await)
    }
}
