//! Drug ranking by damped network propagation from protein seeds.

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
pub struct TrustRankRequest {
    /// Protein seeds: UniProt accessions, optionally `uniprot.`-prefixed.
    pub seeds: Option<Vec<String>>,
    /// Damping factor in [0, 1]. Default 0.85.
    pub damping_factor: Option<f64>,
    pub only_direct_drugs: Option<bool>,
    pub only_approved_drugs: Option<bool>,
    /// Result cutoff: candidates scoring at least as high as the N-th drug
    /// are kept. Without it, only the raw artifact is produced.
    #[serde(rename = "N")]
    pub n: Option<usize>,
}

/// Normalized trustrank parameters; the fingerprint source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustRankSpec {
    pub seed_proteins: Vec<String>,
    pub damping_factor: f64,
    pub only_direct_drugs: bool,
    pub only_approved_drugs: bool,
    #[serde(rename = "N")]
    pub n: Option<usize>,
}

impl TrustRankRequest {
    pub fn normalize(self) -> Result<TrustRankSpec> {
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

        let damping_factor = self.damping_factor.unwrap_or(defaults::TRUSTRANK_DAMPING);
        if !(0.0..=1.0).contains(&damping_factor) {
            return Err(Error::InvalidInput(format!(
                "damping_factor must be in [0, 1], got {damping_factor}"
            )));
        }

        Ok(TrustRankSpec {
            seed_proteins,
            damping_factor,
            only_direct_drugs: self.only_direct_drugs.unwrap_or(true),
            only_approved_drugs: self.only_approved_drugs.unwrap_or(true),
            n: self.n,
        })
    }
}

pub struct TrustRankHandler {
    env: JobEnv,
}

impl TrustRankHandler {
    pub fn new(env: JobEnv) -> Self {
        Self { env }
    }

    async fn run(&self, job: &JobRecord) -> Result<Option<JsonValue>> {
        let spec: TrustRankSpec = serde_json::from_value(job.spec.clone())?;

        let scratch = tempfile::tempdir()?;
        let seeds_file = scratch.path().join("seeds.txt");
        results::write_lines(
            &seeds_file,
            spec.seed_proteins
                .iter()
                .map(|s| format!("{}{s}", defaults::UNIPROT_PREFIX)),
        )?;

        let outfile = self.env.dirs.artifact(JobKind::TrustRank, job.uid, "txt");

        ToolCommand::new("trustrank", &self.env.tools.trustrank_bin)
            .arg("-n")
            .arg_path(&self.env.tools.ranking_network)
            .arg("-s")
            .arg_path(&seeds_file)
            .arg("-d")
            .arg(spec.damping_factor.to_string())
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
impl JobHandler for TrustRankHandler {
    fn kind(&self) -> JobKind {
        JobKind::TrustRank
    }

    async fn execute(&self, job: &JobRecord) -> JobOutcome {
        JobOutcome::from_run(self.run(job).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_core::NewJob;

    fn request(seeds: &[&str]) -> TrustRankRequest {
        TrustRankRequest {
            seeds: Some(seeds.iter().map(|s| s.to_string()).collect()),
            ..TrustRankRequest::default()
        }
    }

    #[test]
    fn test_normalize_defaults() {
        let spec = request(&["P1"]).normalize().unwrap();
        assert_eq!(spec.damping_factor, defaults::TRUSTRANK_DAMPING);
        assert!(spec.only_direct_drugs);
        assert!(spec.only_approved_drugs);
        assert!(spec.n.is_none());
    }

    #[test]
    fn test_normalize_requires_seeds() {
        assert!(TrustRankRequest::default().normalize().is_err());
        assert!(request(&[]).normalize().is_err());
    }

    #[test]
    fn test_normalize_rejects_out_of_range_damping() {
        let bad = TrustRankRequest {
            damping_factor: Some(1.5),
            ..request(&["P1"])
        };
        assert!(bad.normalize().is_err());
    }

    #[test]
    fn test_equivalent_requests_share_a_fingerprint() {
        // Prefixed vs bare, shuffled vs sorted, duplicated vs unique:
        // all the same job.
        let a = request(&["uniprot.P2", "P1", "P1"]).normalize().unwrap();
        let b = request(&["P1", "P2"]).normalize().unwrap();

        let a = NewJob::from_spec(JobKind::TrustRank, &a).unwrap();
        let b = NewJob::from_spec(JobKind::TrustRank, &b).unwrap();
        assert_eq!(a.fingerprint, b.fingerprint);
    }

    #[test]
    fn test_explicit_default_equals_omitted_default() {
        let explicit = TrustRankRequest {
            damping_factor: Some(defaults::TRUSTRANK_DAMPING),
            only_direct_drugs: Some(true),
            only_approved_drugs: Some(true),
            ..request(&["P1"])
        }
        .normalize()
        .unwrap();
        let omitted = request(&["P1"]).normalize().unwrap();

        let explicit = NewJob::from_spec(JobKind::TrustRank, &explicit).unwrap();
        let omitted = NewJob::from_spec(JobKind::TrustRank, &omitted).unwrap();
        assert_eq!(explicit.fingerprint, omitted.fingerprint);
    }
}
