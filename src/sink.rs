//! Download collaborator: persists finished artifacts.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use base64::Engine;
use tracing::info;

use crate::tasks::capture::ExportArtifact;

pub trait ArtifactSink {
    /// Stores the artifact and returns where it went.
    fn deliver(&self, artifact: &ExportArtifact) -> Result<PathBuf>;
}

/// Writes artifacts into a directory. Files appear atomically: bytes go to a
/// `.part` file that is renamed once fully written.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Saves a secondary `data:` URI (e.g. a share code) next to the export.
    pub fn deliver_data_uri(&self, filename: &str, uri: &str) -> Result<PathBuf> {
        let (_, payload) = uri
            .split_once(";base64,")
            .context("expected a base64 data URI")?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(payload)
            .context("invalid base64 payload")?;
        self.write(filename, &bytes)
    }

    fn write(&self, filename: &str, bytes: &[u8]) -> Result<PathBuf> {
        ensure!(
            !filename.is_empty() && !filename.contains(['/', '\\']),
            "refusing to write {filename:?} outside the output directory"
        );
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        let path = self.dir.join(filename);
        let part = self.dir.join(format!("{filename}.part"));
        fs::write(&part, bytes).with_context(|| format!("failed to write {}", part.display()))?;
        fs::rename(&part, &path)
            .with_context(|| format!("failed to move {} into place", path.display()))?;
        info!(path = %path.display(), bytes = bytes.len(), "artifact saved");
        Ok(path)
    }
}

impl ArtifactSink for DirectorySink {
    fn deliver(&self, artifact: &ExportArtifact) -> Result<PathBuf> {
        let bytes = artifact.bytes()?;
        self.write(&artifact.filename, &bytes)
    }
}
