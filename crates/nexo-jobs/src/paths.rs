//! Per-job artifact directory layout.

use std::path::{Path, PathBuf};

use uuid::Uuid;

use nexo_core::{JobKind, Result};

/// Layout of the results tree: one directory per job kind, artifacts named
/// by UID so concurrent jobs never write the same path.
#[derive(Debug, Clone)]
pub struct JobDirs {
    root: PathBuf,
}

impl JobDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one kind's artifacts.
    pub fn kind_dir(&self, kind: JobKind) -> PathBuf {
        self.root.join(kind.as_str())
    }

    /// Single-file artifact path: `{root}/{kind}/{uid}.{ext}`.
    pub fn artifact(&self, kind: JobKind, uid: Uuid, ext: &str) -> PathBuf {
        self.kind_dir(kind).join(format!("{uid}.{ext}"))
    }

    /// Job-private working directory: `{root}/{kind}/{uid}/`.
    pub fn job_dir(&self, kind: JobKind, uid: Uuid) -> PathBuf {
        self.kind_dir(kind).join(uid.to_string())
    }

    /// Content-addressed upload location, shared by equal uploads.
    pub fn upload_path(&self, kind: JobKind, content_hash: &str, ext: &str) -> PathBuf {
        self.kind_dir(kind).join("uploads").join(format!("{content_hash}{ext}"))
    }

    /// Create the per-kind directory tree.
    pub fn ensure(&self) -> Result<()> {
        for kind in JobKind::ALL {
            std::fs::create_dir_all(self.kind_dir(kind))?;
        }
        std::fs::create_dir_all(self.kind_dir(JobKind::Bicon).join("uploads"))?;
        Ok(())
    }
}
