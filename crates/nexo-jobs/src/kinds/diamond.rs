//! Disease-module detection by iterative seed expansion.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use nexo_core::{defaults, Error, JobKind, JobRecord, Result};

use crate::handler::{JobEnv, JobHandler, JobOutcome};
use crate::invoker::ToolCommand;
use crate::network::{NetworkChoice, SeedKind};
use crate::results;

use super::classify_seeds;

/// Which edges the result payload reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeScope {
    /// Edges between any two module members (seeds included).
    All,
    /// Only edges between module additions and seeds.
    Limited,
}

impl EdgeScope {
    fn parse(s: &str) -> Result<Self> {
        match s {
            "all" => Ok(EdgeScope::All),
            "limited" => Ok(EdgeScope::Limited),
            _ => Err(Error::InvalidInput(
                "If specified, edges must be `limited` or `all`".to_string(),
            )),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiamondRequest {
    /// Seed genes (Entrez ids) or proteins (UniProt accessions).
    pub seeds: Option<Vec<String>>,
    /// Number of module nodes at which the expansion stops.
    pub n: Option<u64>,
    /// Seed weight. Default 1.
    pub alpha: Option<i64>,
    /// Store-derived network: `DEFAULT` or `SHARED_DISORDER`.
    pub network: Option<String>,
    /// `all` or `limited` result edges.
    pub edges: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiamondSpec {
    pub seeds: Vec<String>,
    pub seed_type: SeedKind,
    pub n: u64,
    pub alpha: i64,
    pub network: NetworkChoice,
    pub edges: EdgeScope,
}

impl DiamondRequest {
    pub fn normalize(self) -> Result<DiamondSpec> {
        let seeds = self
            .seeds
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidInput("No seed genes submitted".to_string()))?;
        let n = self
            .n
            .filter(|n| *n > 0)
            .ok_or_else(|| Error::InvalidInput("Number of module nodes not specified".to_string()))?;

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

        let edges = match self.edges.as_deref() {
            None => EdgeScope::All,
            Some(name) => EdgeScope::parse(name)?,
        };

        Ok(DiamondSpec {
            seeds,
            seed_type,
            n,
            alpha: self.alpha.unwrap_or(defaults::DIAMOND_ALPHA),
            network,
            edges,
        })
    }
}

pub struct DiamondHandler {
    env: JobEnv,
}

impl DiamondHandler {
    pub fn new(env: JobEnv) -> Self {
        Self { env }
    }

    async fn run(&self, job: &JobRecord) -> Result<Option<JsonValue>> {
        let spec: DiamondSpec = serde_json::from_value(job.spec.clone())?;

        let scratch = tempfile::tempdir()?;
        let network_file = scratch.path().join("network.tsv");
        let pairs = self.env.network.edge_list(spec.seed_type, spec.network).await?;
        self.env
            .network
            .write_tsv(spec.seed_type, spec.network, &network_file)
            .await?;

        let seeds_file = scratch.path().join("seeds.txt");
        results::write_lines(&seeds_file, &spec.seeds)?;

        let results_file = scratch.path().join("results.txt");
        ToolCommand::new("diamond", &self.env.tools.diamond_bin)
            .arg("--network_file")
            .arg_path(&network_file)
            .arg("--seed_file")
            .arg_path(&seeds_file)
            .arg("-n")
            .arg(spec.n.to_string())
            .arg("--alpha")
            .arg(spec.alpha.to_string())
            .arg("-o")
            .arg_path(&results_file)
            .current_dir(scratch.path())
            .timeout(self.env.tool_timeout)
            .run()
            .await?;

        // The tool ranks its additions under a `#rank` column; rename it so
        // the payload key is JSON-friendly.
        let mut module_rows = results::read_tsv(&results_file)?;
        let mut module_nodes: BTreeSet<String> = BTreeSet::new();
        for row in &mut module_rows {
            if let Some(rank) = row.remove("#rank") {
                row.insert("rank".to_string(), rank);
            }
            if let Some(node) = row.get("DIAMOnD_node") {
                module_nodes.insert(node.clone());
            }
        }

        let seeds: BTreeSet<String> = spec.seeds.iter().cloned().collect();
        let edges = module_edges(&pairs, &module_nodes, &seeds, spec.edges);
        let seeds_in_network: Vec<&String> = {
            let network_nodes = crate::network::NetworkService::network_nodes(&pairs);
            spec.seeds.iter().filter(|s| network_nodes.contains(*s)).collect()
        };

        let artifact = self.env.dirs.artifact(JobKind::Diamond, job.uid, "txt");
        std::fs::copy(&results_file, &artifact)?;

        Ok(Some(json!({
            "diamond_nodes": module_rows,
            "edges": edges,
            "seeds_in_network": seeds_in_network,
        })))
    }
}

/// Edges to report for a detected module.
fn module_edges(
    pairs: &[(String, String)],
    module_nodes: &BTreeSet<String>,
    seeds: &BTreeSet<String>,
    scope: EdgeScope,
) -> Vec<(String, String)> {
    pairs
        .iter()
        .filter(|(a, b)| match scope {
            EdgeScope::All => {
                let members = |n: &String| module_nodes.contains(n) || seeds.contains(n);
                members(a) && members(b)
            }
            EdgeScope::Limited => {
                (module_nodes.contains(a) && seeds.contains(b))
                    || (seeds.contains(a) && module_nodes.contains(b))
            }
        })
        .cloned()
        .collect()
}

#[async_trait]
impl JobHandler for DiamondHandler {
    fn kind(&self) -> JobKind {
        JobKind::Diamond
    }

    async fn execute(&self, job: &JobRecord) -> JobOutcome {
        JobOutcome::from_run(self.run(job).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_core::NewJob;

    fn request(seeds: &[&str], n: u64) -> DiamondRequest {
        DiamondRequest {
            seeds: Some(seeds.iter().map(|s| s.to_string()).collect()),
            n: Some(n),
            ..DiamondRequest::default()
        }
    }

    #[test]
    fn test_normalize_defaults() {
        let spec = request(&["2717", "5836"], 100).normalize().unwrap();
        assert_eq!(spec.seed_type, SeedKind::Gene);
        assert_eq!(spec.alpha, defaults::DIAMOND_ALPHA);
        assert_eq!(spec.network, NetworkChoice::Default);
        assert_eq!(spec.edges, EdgeScope::All);
    }

    #[test]
    fn test_normalize_requires_seeds_and_n() {
        assert!(DiamondRequest::default().normalize().is_err());
        assert!(request(&["2717"], 0).normalize().is_err());
        assert!(DiamondRequest {
            seeds: Some(vec!["2717".into()]),
            ..DiamondRequest::default()
        }
        .normalize()
        .is_err());
    }

    #[test]
    fn test_normalize_rejects_protein_shared_disorder() {
        let bad = DiamondRequest {
            network: Some("SHARED_DISORDER".into()),
            ..request(&["uniprot.P1"], 10)
        };
        assert!(bad.normalize().is_err());
    }

    #[test]
    fn test_normalize_rejects_bad_edge_scope() {
        let bad = DiamondRequest {
            edges: Some("some".into()),
            ..request(&["2717"], 10)
        };
        assert!(bad.normalize().is_err());
    }

    #[test]
    fn test_prefix_and_order_insensitive_fingerprint() {
        let a = request(&["entrez.5836", "2717"], 100).normalize().unwrap();
        let b = request(&["2717", "5836"], 100).normalize().unwrap();
        let a = NewJob::from_spec(JobKind::Diamond, &a).unwrap();
        let b = NewJob::from_spec(JobKind::Diamond, &b).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_module_edges_scopes() {
        let pairs = vec![
            ("101".to_string(), "102".to_string()),
            ("102".to_string(), "103".to_string()),
            ("103".to_string(), "104".to_string()),
        ];
        let module: BTreeSet<String> = ["102", "103"].iter().map(|s| s.to_string()).collect();
        let seeds: BTreeSet<String> = ["101"].iter().map(|s| s.to_string()).collect();

        // All: module ∪ seeds spans 101-102 and 102-103; 103-104 leaves the
        // module.
        let all = module_edges(&pairs, &module, &seeds, EdgeScope::All);
        assert_eq!(
            all,
            vec![
                ("101".to_string(), "102".to_string()),
                ("102".to_string(), "103".to_string()),
            ]
        );

        // Limited: only module↔seed edges.
        let limited = module_edges(&pairs, &module, &seeds, EdgeScope::Limited);
        assert_eq!(limited, vec![("101".to_string(), "102".to_string())]);
    }
}
