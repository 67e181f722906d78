//! Drug ranking by closeness centrality from protein seeds.
//!
//! Same submission surface as trustrank minus the damping factor; the two
//! share the ranked-output materialization.

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use nexo_core::{defaults, Error, JobKind, JobRecord, Result};

use crate::handler::{JobEnv, JobHandler, JobOutcome};
use crate::invoker::ToolCommand;
use crate::results;

#[derive(Debug, Default, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClosenessRequest {
    pub seeds: Option<Vec<String>>,
    pub only_direct_drugs: Option<bool>,
    pub only_approved_drugs: Option<bool>,
    #[serde(rename = "N")]
    pub n: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClosenessSpec {
    pub seed_proteins: Vec<String>,
    pub only_direct_drugs: bool,
    pub only_approved_drugs: bool,
    #[serde(rename = "N")]
    pub n: Option<usize>,
}

impl ClosenessRequest {
    pub fn normalize(self) -> Result<ClosenessSpec> {
        let seeds = self
            .seeds
            .filter(|s| !s.is_empty())
            .ok_or_else(|| Error::InvalidInput("No seed proteins submitted".to_string()))?;

        let mut seed_proteins: Vec<String> = seeds
            .iter()
            .map(|s| {
                s.strip_prefix(defaults::UNIPROT_PREFIX)
                    .unwrap_or(s)
                    .to_string()
            })
            .collect();
        seed_proteins.sort();
        seed_proteins.dedup();

        Ok(ClosenessSpec {
            seed_proteins,
            only_direct_drugs: self.only_direct_drugs.unwrap_or(true),
            only_approved_drugs: self.only_approved_drugs.unwrap_or(true),
            n: self.n,
        })
    }
}

pub struct ClosenessHandler {
    env: JobEnv,
}

impl ClosenessHandler {
    pub fn new(env: JobEnv) -> Self {
        Self { env }
    }

    async fn run(&self, job: &JobRecord) -> Result<Option<JsonValue>> {
        let spec: ClosenessSpec = serde_json::from_value(job.spec.clone())?;

        let scratch = tempfile::tempdir()?;
        let seeds_file = scratch.path().join("seeds.txt");
        results::write_lines(
            &seeds_file,
            spec.seed_proteins
                .iter()
                .map(|s| format!("{}{s}", defaults::UNIPROT_PREFIX)),
        )?;

        let outfile = self.env.dirs.artifact(JobKind::Closeness, job.uid, "txt");

        ToolCommand::new("closeness", &self.env.tools.closeness_bin)
            .arg("-n")
            .arg_path(&self.env.tools.ranking_network)
            .arg("-s")
            .arg_path(&seeds_file)
            .arg("-o")
            .arg_path(&outfile)
            .flag_if(spec.only_direct_drugs, "--only_direct_drugs")
            .flag_if(spec.only_approved_drugs, "--only_approved_drugs")
            .current_dir(scratch.path())
            .timeout(self.env.tool_timeout)
            .run()
            .await?;

        let Some(n) = spec.n else {
            return Ok(None);
        };

        let drugs = results::top_candidates(&outfile, n)?;
        let drug_ids: BTreeSet<String> = drugs
            .iter()
            .filter_map(|row| row.get("drug_name").cloned())
            .collect();
        let seeds: BTreeSet<String> = spec
            .seed_proteins
            .iter()
            .map(|s| format!("{}{s}", defaults::UNIPROT_PREFIX))
            .collect();
        let edges = results::drug_target_edges(&self.env.store, &drug_ids, &seeds).await?;

        Ok(Some(json!({ "drugs": drugs, "edges": edges })))
    }
}

#[async_trait]
impl JobHandler for ClosenessHandler {
    fn kind(&self) -> JobKind {
        JobKind::Closeness
    }

    async fn execute(&self, job: &JobRecord) -> JobOutcome {
        JobOutcome::from_run(self.run(job).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_core::NewJob;

    #[test]
    fn test_normalize_strips_and_sorts() {
        let spec = ClosenessRequest {
            seeds: Some(vec!["uniprot.P9".into(), "P1".into()]),
            ..ClosenessRequest::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(spec.seed_proteins, vec!["P1", "P9"]);
    }

    #[test]
    fn test_normalize_requires_seeds() {
        assert!(ClosenessRequest::default().normalize().is_err());
    }

    #[test]
    fn test_fingerprint_differs_from_trustrank() {
        // Same seeds submitted to the two ranking kinds must not collide.
        let closeness = ClosenessRequest {
            seeds: Some(vec!["P1".into()]),
            ..ClosenessRequest::default()
        }
        .normalize()
        .unwrap();
        let closeness = NewJob::from_spec(JobKind::Closeness, &closeness).unwrap();

        let trustrank = super::super::trustrank::TrustRankRequest {
            seeds: Some(vec!["P1".into()]),
            ..Default::default()
        }
        .normalize()
        .unwrap();
        let trustrank = NewJob::from_spec(JobKind::TrustRank, &trustrank).unwrap();

        assert_ne!(closeness.fingerprint, trustrank.fingerprint);
    }
}
