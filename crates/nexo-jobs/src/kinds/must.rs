//! Multi-Steiner-tree disease-module detection.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use nexo_core::{Error, JobKind, JobRecord, Result};

use crate::handler::{JobEnv, JobHandler, JobOutcome};
use crate::invoker::ToolCommand;
use crate::network::{NetworkChoice, NetworkService, SeedKind};
use crate::results;

use super::classify_seeds;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MustRequest {
    /// Seed genes (Entrez ids) or proteins (UniProt accessions).
    pub seeds: Option<Vec<String>>,
    /// Store-derived network: `DEFAULT` or `SHARED_DISORDER`.
    pub network: Option<String>,
    /// Hub penalty in [0, 1].
    pub hubpenalty: Option<f64>,
    /// Whether multiple result trees should be returned.
    pub multiple: Option<bool>,
    /// Number of trees to return.
    pub trees: Option<u64>,
    /// Maximum number of iterations.
    pub maxit: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MustSpec {
    pub seeds: Vec<String>,
    pub seed_type: SeedKind,
    pub network: NetworkChoice,
    pub hub_penalty: f64,
    pub multiple: bool,
    pub trees: u64,
    pub maxit: u64,
}

impl MustRequest {
    pub fn normalize(self) -> Result<MustSpec> {
        let seeds = self
            .seeds
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidInput("No seed genes submitted".to_string()))?;
        let hub_penalty = self
            .hubpenalty
            .ok_or_else(|| Error::InvalidInput("Hub penalty not specified".to_string()))?;
        if !(0.0..=1.0).contains(&hub_penalty) {
            return Err(Error::InvalidInput(format!(
                "hubpenalty must be in [0, 1], got {hub_penalty}"
            )));
        }
        let multiple = self
            .multiple
            .ok_or_else(|| Error::InvalidInput("Multiple not specified".to_string()))?;
        let trees = self
            .trees
            .filter(|t| *t > 0)
            .ok_or_else(|| Error::InvalidInput("Trees not specified".to_string()))?;
        let maxit = self
            .maxit
            .filter(|m| *m > 0)
            .ok_or_else(|| Error::InvalidInput("Max iterations not specified".to_string()))?;

        let (mut seeds, seed_type) = classify_seeds(seeds);
        seeds.sort();
        seeds.dedup();

        let network = match self.network.as_deref() {
            None => NetworkChoice::Default,
            Some(name) => NetworkChoice::parse(name)?,
        };
        if seed_type == SeedKind::Protein && network == NetworkChoice::SharedDisorder {
            return Err(Error::InvalidInput(
                "SHARED_DISORDER networks are only defined for gene seeds".to_string(),
            ));
        }

        Ok(MustSpec {
            seeds,
            seed_type,
            network,
            hub_penalty,
            multiple,
            trees,
            maxit,
        })
    }
}

pub struct MustHandler {
    env: JobEnv,
}

impl MustHandler {
    pub fn new(env: JobEnv) -> Self {
        Self { env }
    }

    async fn run(&self, job: &JobRecord) -> Result<Option<JsonValue>> {
        let spec: MustSpec = serde_json::from_value(job.spec.clone())?;

        let scratch = tempfile::tempdir()?;
        let network_file = scratch.path().join("network.tsv");
        let pairs = self.env.network.edge_list(spec.seed_type, spec.network).await?;
        self.env
            .network
            .write_tsv(spec.seed_type, spec.network, &network_file)
            .await?;

        let seeds_file = scratch.path().join("seeds.txt");
        results::write_lines(&seeds_file, &spec.seeds)?;

        let nodes_file = scratch.path().join(format!("{}_nodes.txt", job.uid));
        let edges_file = scratch.path().join(format!("{}_edges.txt", job.uid));

        ToolCommand::new("must", &self.env.tools.java_bin)
            .arg("-jar")
            .arg(&self.env.tools.must_jar)
            .arg("-hp")
            .arg(spec.hub_penalty.to_string())
            .flag_if(spec.multiple, "-m")
            .arg("-mi")
            .arg(spec.maxit.to_string())
            .arg("-nw")
            .arg_path(&network_file)
            .arg("-s")
            .arg_path(&seeds_file)
            .arg("-t")
            .arg(spec.trees.to_string())
            .arg("-oe")
            .arg_path(&edges_file)
            .arg("-on")
            .arg_path(&nodes_file)
            .current_dir(scratch.path())
            .timeout(self.env.tool_timeout)
            .run()
            .await?;

        let node_rows = results::read_tsv(&nodes_file)?;
        let edge_rows = results::read_tsv(&edges_file)?;

        let network_nodes = NetworkService::network_nodes(&pairs);
        let seeds_in_network: BTreeSet<&String> = spec
            .seeds
            .iter()
            .filter(|s| network_nodes.contains(*s))
            .collect();

        // Both tool outputs ride in one bundle, written before the record
        // flips to completed.
        let artifact = self.env.dirs.artifact(JobKind::Must, job.uid, "tar.gz");
        results::bundle_files(
            &[
                (&nodes_file, &format!("{}_nodes.txt", job.uid)),
                (&edges_file, &format!("{}_edges.txt", job.uid)),
            ],
            &artifact,
        )?;

        Ok(Some(json!({
            "nodes": node_rows,
            "edges": edge_rows,
            "seeds_in_network": seeds_in_network,
        })))
    }
}

#[async_trait]
impl JobHandler for MustHandler {
    fn kind(&self) -> JobKind {
        JobKind::Must
    }

    async fn execute(&self, job: &JobRecord) -> JobOutcome {
        JobOutcome::from_run(self.run(job).await)
    }
}
