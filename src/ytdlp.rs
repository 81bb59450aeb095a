use std::{io::ErrorKind, process::Stdio};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use tracing::{debug, error, instrument};

/// Prefer HLS (m3u8), otherwise fall back to the best single-file format
pub const DEFAULT_FORMAT: &str = "best[protocol^=m3u8]/best";

/// Turns a video page URL into a directly playable media URL
#[async_trait]
pub trait StreamExtractor: Send + Sync {
    /// Returns the raw tool output. The first line is expected to hold the media URL.
    async fn extract(&self, source_url: &str, format: &str) -> Result<String>;
}

/// [`StreamExtractor`] backed by the `yt-dlp` executable
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: String,
}

impl YtDlp {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Checks if yt-dlp is installed / available at the configured path
    pub async fn is_installed(&self) -> bool {
        debug!("Checking for yt-dlp installation");
        tokio::process::Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .await
            .is_ok_and(|s| s.success())
    }
}

#[async_trait]
impl StreamExtractor for YtDlp {
    /// Runs `yt-dlp <url> -g -f <format>`
    ///
    /// The child is killed if this future is dropped before it exits.
    ///
    /// # Errors
    /// Errors when yt-dlp cannot be spawned or exits unsuccessfully
    #[instrument(skip(self))]
    async fn extract(&self, source_url: &str, format: &str) -> Result<String> {
        let child = match tokio::process::Command::new(&self.program)
            .args([source_url, "-g", "-f", format])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                bail!("`{}` is not installed or available in PATH!", self.program)
            }
            Err(e) => bail!("Unable to spawn `{}`: {e}", self.program),
        };

        let out = child
            .wait_with_output()
            .await
            .context("Waiting for yt-dlp to exit")?;

        if !out.status.success() {
            error!("yt-dlp exited with {}", out.status);
            error!("stderr: {}", String::from_utf8_lossy(&out.stderr).trim());
            bail!("yt-dlp exit code not success")
        }

        String::from_utf8(out.stdout).context("Decoding yt-dlp output")
    }
}
