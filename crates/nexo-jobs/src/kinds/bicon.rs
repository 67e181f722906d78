//! Network-constrained biclustering of patients and omics data.
//!
//! The submission carries an uploaded expression matrix; the dedup key is
//! the SHA-256 of the uploaded bytes plus the tuning parameters, never the
//! filename, so identical uploads under different names collapse to one
//! job. Uploads are stored content-addressed for the same reason.

use std::collections::BTreeSet;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value as JsonValue};

use nexo_core::{content_hash, defaults, fingerprint, Error, JobKind, JobRecord, NewJob, Result};

use crate::handler::{JobEnv, JobHandler, JobOutcome};
use crate::invoker::ToolCommand;
use crate::network::{NetworkChoice, SeedKind};
use crate::paths::JobDirs;
use crate::results;

/// An incoming bicon submission: raw upload plus tuning parameters.
#[derive(Debug)]
pub struct BiconSubmission {
    pub filename: String,
    pub bytes: Vec<u8>,
    pub lg_min: Option<i64>,
    pub lg_max: Option<i64>,
    pub network: Option<String>,
}

/// Normalized bicon parameters; stored on the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiconSpec {
    /// Content hash of the uploaded expression matrix.
    pub sha256: String,
    pub lg_min: i64,
    pub lg_max: i64,
    pub network: NetworkChoice,
    /// Filename as submitted by the client (informational only).
    pub submitted_filename: String,
    /// Content-addressed location of the stored upload.
    pub expression_file: String,
}

impl BiconSubmission {
    /// Validate, store the upload content-addressed, and normalize.
    ///
    /// Writing the upload before the job record exists keeps the worker
    /// from ever claiming a record whose input file is still in flight.
    pub fn normalize(self, dirs: &JobDirs) -> Result<BiconSpec> {
        if self.bytes.is_empty() {
            return Err(Error::InvalidInput(
                "Uploaded expression file is empty".to_string(),
            ));
        }

        let lg_min = self.lg_min.unwrap_or(defaults::BICON_LG_MIN);
        let lg_max = self.lg_max.unwrap_or(defaults::BICON_LG_MAX);
        if lg_min <= 0 || lg_min > lg_max {
            return Err(Error::InvalidInput(format!(
                "Invalid bicluster size bounds: lg_min={lg_min}, lg_max={lg_max}"
            )));
        }
        let network = match self.network.as_deref() {
            None => NetworkChoice::Default,
            Some(name) => NetworkChoice::parse(name)?,
        };

        let sha256 = content_hash(&self.bytes);
        let ext = Path::new(&self.filename)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();
        let upload = dirs.upload_path(JobKind::Bicon, &sha256, &ext);
        if !upload.exists() {
            std::fs::write(&upload, &self.bytes)?;
        }

        Ok(BiconSpec {
            sha256,
            lg_min,
            lg_max,
            network,
            submitted_filename: self.filename,
            expression_file: upload.to_string_lossy().into_owned(),
        })
    }
}

impl BiconSpec {
    /// Build the job to create: the fingerprint covers the content hash and
    /// tuning parameters only, while the stored spec keeps the filenames
    /// for the status payload.
    pub fn new_job(&self) -> Result<NewJob> {
        let key = json!({
            "sha256": self.sha256,
            "lg_min": self.lg_min,
            "lg_max": self.lg_max,
            "network": self.network,
        });
        Ok(NewJob {
            fingerprint: fingerprint(JobKind::Bicon, &key),
            kind: JobKind::Bicon,
            spec: serde_json::to_value(self)?,
        })
    }
}

pub struct BiconHandler {
    env: JobEnv,
}

impl BiconHandler {
    pub fn new(env: JobEnv) -> Self {
        Self { env }
    }

    async fn run(&self, job: &JobRecord) -> Result<Option<JsonValue>> {
        let spec: BiconSpec = serde_json::from_value(job.spec.clone())?;

        let job_dir = self.env.dirs.job_dir(JobKind::Bicon, job.uid);
        std::fs::create_dir_all(&job_dir)?;

        let network_file = job_dir.join("network.tsv");
        let pairs = self
            .env
            .network
            .edge_list(SeedKind::Gene, spec.network)
            .await?;
        self.env
            .network
            .write_tsv(SeedKind::Gene, spec.network, &network_file)
            .await?;

        ToolCommand::new("bicon", &self.env.tools.bicon_python)
            .arg(&self.env.tools.bicon_script)
            .arg("--expression")
            .arg(&spec.expression_file)
            .arg("--network")
            .arg("network.tsv")
            .arg("--lg_min")
            .arg(spec.lg_min.to_string())
            .arg("--lg_max")
            .arg(spec.lg_max.to_string())
            .arg("--outdir")
            .arg(".")
            .current_dir(&job_dir)
            .timeout(self.env.tool_timeout)
            .run()
            .await?;

        let mut payload: JsonValue =
            serde_json::from_str(&std::fs::read_to_string(job_dir.join("results.json"))?)?;

        // Selected genes from both clusters, then the network edges they
        // induce.
        let genes: BTreeSet<String> = ["genes1", "genes2"]
            .iter()
            .flat_map(|key| {
                payload[*key]
                    .as_array()
                    .into_iter()
                    .flatten()
                    .filter_map(|item| item["gene"].as_str().map(str::to_string))
                    .collect::<Vec<_>>()
            })
            .collect();
        let edges: Vec<(String, String)> = pairs
            .iter()
            .filter(|(a, b)| a != b && genes.contains(a) && genes.contains(b))
            .cloned()
            .collect();
        payload["edges"] = json!(edges);

        let (patients1, patients2) = parse_patient_groups(&job_dir.join("results.csv"))?;
        payload["patients1"] = json!(patients1);
        payload["patients2"] = json!(patients2);

        // Bundle everything the tool produced, then drop the working copy.
        let artifact = self.env.dirs.artifact(JobKind::Bicon, job.uid, "tar.gz");
        results::bundle_dir(&job_dir, &job.uid.to_string(), &artifact)?;
        std::fs::remove_dir_all(&job_dir)?;

        Ok(Some(payload))
    }
}

/// The clustering summary's second row carries the two patient groups as
/// its last two comma-separated fields, `|`-delimited within each.
fn parse_patient_groups(path: &Path) -> Result<(Vec<String>, Vec<String>)> {
    let content = std::fs::read_to_string(path)?;
    let row = content.trim().lines().nth(1).ok_or_else(|| {
        Error::Tool("Clustering summary has no result row".to_string())
    })?;

    let fields: Vec<&str> = row.split(',').collect();
    if fields.len() < 2 {
        return Err(Error::Tool(
            "Clustering summary row has no patient groups".to_string(),
        ));
    }
    let split = |group: &str| -> Vec<String> {
        group.split('|').map(str::to_string).collect()
    };
    Ok((
        split(fields[fields.len() - 2]),
        split(fields[fields.len() - 1]),
    ))
}

#[async_trait]
impl JobHandler for BiconHandler {
    fn kind(&self) -> JobKind {
        JobKind::Bicon
    }

    async fn execute(&self, job: &JobRecord) -> JobOutcome {
        JobOutcome::from_run(self.run(job).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submission(filename: &str, bytes: &[u8]) -> BiconSubmission {
        BiconSubmission {
            filename: filename.to_string(),
            bytes: bytes.to_vec(),
            lg_min: None,
            lg_max: None,
            network: None,
        }
    }

    fn dirs() -> (tempfile::TempDir, JobDirs) {
        let tmp = tempfile::tempdir().unwrap();
        let dirs = JobDirs::new(tmp.path());
        dirs.ensure().unwrap();
        (tmp, dirs)
    }

    #[test]
    fn test_identical_uploads_under_different_names_dedup() {
        let (_tmp, dirs) = dirs();
        let a = submission("matrix_v1.csv", b"g,p1\n1,2\n")
            .normalize(&dirs)
            .unwrap();
        let b = submission("other_name.csv", b"g,p1\n1,2\n")
            .normalize(&dirs)
            .unwrap();

        assert_eq!(a.sha256, b.sha256);
        assert_eq!(
            a.new_job().unwrap().fingerprint,
            b.new_job().unwrap().fingerprint
        );
        // The stored specs still remember what the client called the file.
        assert_ne!(a.submitted_filename, b.submitted_filename);
    }

    #[test]
    fn test_different_content_different_fingerprint() {
        let (_tmp, dirs) = dirs();
        let a = submission("m.csv", b"a").normalize(&dirs).unwrap();
        let b = submission("m.csv", b"b").normalize(&dirs).unwrap();
        assert_ne!(
            a.new_job().unwrap().fingerprint,
            b.new_job().unwrap().fingerprint
        );
    }

    #[test]
    fn test_upload_stored_content_addressed() {
        let (_tmp, dirs) = dirs();
        let spec = submission("m.csv", b"content").normalize(&dirs).unwrap();
        let stored = std::path::Path::new(&spec.expression_file);
        assert!(stored.exists());
        assert!(stored.file_name().unwrap().to_string_lossy().starts_with(&spec.sha256));
        assert_eq!(std::fs::read(stored).unwrap(), b"content");
    }

    #[test]
    fn test_normalize_validations() {
        let (_tmp, dirs) = dirs();
        assert!(submission("m.csv", b"").normalize(&dirs).is_err());

        let mut bad = submission("m.csv", b"x");
        bad.lg_min = Some(20);
        bad.lg_max = Some(10);
        assert!(bad.normalize(&dirs).is_err());

        let mut bad = submission("m.csv", b"x");
        bad.network = Some("BOGUS".to_string());
        assert!(bad.normalize(&dirs).is_err());
    }

    #[test]
    fn test_parse_patient_groups() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        std::fs::write(
            &path,
            "id,score,patients1,patients2\n0,0.5,pA|pB,pC|pD|pE\n",
        )
        .unwrap();

        let (p1, p2) = parse_patient_groups(&path).unwrap();
        assert_eq!(p1, vec!["pA", "pB"]);
        assert_eq!(p2, vec!["pC", "pD", "pE"]);
    }

    #[test]
    fn test_parse_patient_groups_missing_row() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("results.csv");
        std::fs::write(&path, "header only\n").unwrap();
        assert!(parse_patient_groups(&path).is_err());
    }
}
