//! ffprobe-backed duration probe.
//!
//! The engine treats duration probing as a collaborator; here it shells out
//! to ffprobe, which every environment with the companion server's ffmpeg
//! toolchain already has.

use std::path::PathBuf;

use async_trait::async_trait;
use subprep_engine::{DurationProbe, EngineError, MediaFile};
use tokio::process::Command;
use tracing::debug;

pub struct FfprobeDurationProbe {
    binary: PathBuf,
}

impl FfprobeDurationProbe {
    /// Use `ffprobe` from `PATH`.
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffprobe"),
        }
    }
}

impl Default for FfprobeDurationProbe {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurationProbe for FfprobeDurationProbe {
    async fn duration(&self, file: &MediaFile) -> subprep_engine::Result<f64> {
        // ffprobe wants a path, so stage the bytes in a temp directory.
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(&file.name);
        tokio::fs::write(&path, &file.bytes).await?;

        debug!(path = %path.display(), "probing duration with ffprobe");
        let output = Command::new(&self.binary)
            .args([
                "-v",
                "error",
                "-show_entries",
                "format=duration",
                "-of",
                "csv=p=0",
            ])
            .arg(&path)
            .output()
            .await?;

        if !output.status.success() {
            return Err(EngineError::Probe {
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        text.trim().parse::<f64>().map_err(|e| EngineError::Probe {
            reason: format!("unexpected ffprobe output `{}`: {e}", text.trim()),
        })
    }
}
