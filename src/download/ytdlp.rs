use crate::error::FetchCause;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

const INFO_TIMEOUT: Duration = Duration::from_secs(30);

/// Metadata document emitted by the tool's info dump.
#[derive(Debug, Deserialize)]
pub struct ToolInfo {
    pub title: Option<String>,
    #[serde(default)]
    pub formats: Vec<ToolFormat>,
}

#[derive(Debug, Deserialize)]
pub struct ToolFormat {
    pub format_id: String,
    pub ext: Option<String>,
    pub height: Option<u32>,
    pub filesize: Option<u64>,
    pub filesize_approx: Option<u64>,
}

/// A failed tool run, coarsely classified for the user-facing message.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ToolError {
    pub cause: FetchCause,
    message: String,
}

impl ToolError {
    fn other(message: impl Into<String>) -> Self {
        Self {
            cause: FetchCause::Other,
            message: message.into(),
        }
    }
}

/// Narrow adapter around the external downloader tool. All command
/// construction lives here; callers only see `get_info` and `download`.
pub struct YtDlp {
    user_agent: String,
    cookie_file: Option<PathBuf>,
    download_timeout: Duration,
}

impl YtDlp {
    pub fn new(user_agent: &str, cookie_file: Option<PathBuf>, download_timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.to_string(),
            cookie_file,
            download_timeout,
        }
    }

    /// Materializes the cookie jar from the `LINKSNAP_COOKIES` environment
    /// variable, normalized to the netscape format the tool expects. Runs
    /// once at startup; the file is read-only afterwards.
    pub fn init_cookie_jar(path: &Path) -> Option<PathBuf> {
        let raw = std::env::var("LINKSNAP_COOKIES").ok()?;

        let mut data = raw
            .replace("\\n", "\n")
            .replace(' ', "\t")
            .replace("#HttpOnly_", "");
        if !data.starts_with("# Netscape") {
            data = format!("# Netscape HTTP Cookie File\n{data}");
        }

        match std::fs::write(path, data) {
            Ok(()) => {
                info!("✅ Cookies loaded to {}", path.display());
                Some(path.to_path_buf())
            }
            Err(e) => {
                warn!("Failed to write cookie jar: {e}");
                None
            }
        }
    }

    fn base_command(&self) -> Command {
        let mut command = Command::new("yt-dlp");
        command
            .arg("--force-ipv4")
            .arg("--no-warnings")
            .arg("--no-playlist")
            .arg("--user-agent")
            .arg(&self.user_agent);
        if let Some(jar) = &self.cookie_file {
            command.arg("--cookies").arg(jar);
        }
        command
    }

    pub async fn get_info(&self, url: &str) -> Result<ToolInfo> {
        debug!(url, "dumping media info");

        let output = tokio::time::timeout(
            INFO_TIMEOUT,
            self.base_command().arg("-J").arg(url).output(),
        )
        .await
        .context("Media info dump timed out")?
        .context("Failed to run the downloader tool")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Media info dump failed: {}", stderr.trim());
        }

        serde_json::from_slice(&output.stdout).context("Failed to parse media info")
    }

    /// Materializes the requested variant at `<dest_base>.<ext>` — mp3 for
    /// audio extraction, mp4 otherwise.
    pub async fn download(
        &self,
        url: &str,
        audio_only: bool,
        format_id: &str,
        dest_base: &Path,
    ) -> Result<(), ToolError> {
        let template = format!("{}.%(ext)s", dest_base.display());
        let mut command = self.base_command();

        if audio_only {
            command.arg("-x").arg("--audio-format").arg("mp3");
        } else {
            let selector = if format_id == "best" {
                "best".to_string()
            } else {
                format!("{format_id}+bestaudio/best")
            };
            command
                .arg("-f")
                .arg(selector)
                .arg("--merge-output-format")
                .arg("mp4");
        }
        command.arg("-o").arg(&template).arg(url);

        info!(url, audio_only, format_id, "invoking downloader tool");

        let output = match tokio::time::timeout(self.download_timeout, command.output()).await {
            Err(_) => return Err(ToolError::other("Media download timed out")),
            Ok(Err(e)) => {
                return Err(ToolError::other(format!(
                    "Failed to run the downloader tool: {e}"
                )))
            }
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr.trim().to_string();
            return Err(ToolError {
                cause: classify_failure(&message),
                message: format!("Media download failed: {message}"),
            });
        }

        Ok(())
    }

    pub async fn test_availability() -> bool {
        let yt_dlp_available = match Command::new("yt-dlp").arg("--version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version = String::from_utf8_lossy(&output.stdout);
                    info!("✅ yt-dlp is available, version: {}", version.trim());
                    true
                } else {
                    warn!("❌ yt-dlp command failed");
                    false
                }
            }
            Err(e) => {
                warn!("❌ yt-dlp not found: {}", e);
                false
            }
        };

        let ffmpeg_available = match Command::new("ffmpeg").arg("-version").output().await {
            Ok(output) => {
                if output.status.success() {
                    let version_line = String::from_utf8_lossy(&output.stdout)
                        .lines()
                        .next()
                        .unwrap_or("unknown")
                        .to_string();
                    info!("✅ ffmpeg is available: {}", version_line);
                    true
                } else {
                    warn!("❌ ffmpeg command failed");
                    false
                }
            }
            Err(e) => {
                warn!("❌ ffmpeg not found: {} (required for merging and splitting)", e);
                false
            }
        };

        if yt_dlp_available && !ffmpeg_available {
            warn!("⚠️  yt-dlp will work but merged formats and oversize splitting will fail");
        }

        yt_dlp_available
    }
}

/// Maps tool stderr onto the coarse cause taxonomy. Picks the user-facing
/// message only; never drives retries.
pub fn classify_failure(stderr: &str) -> FetchCause {
    let lowered = stderr.to_ascii_lowercase();
    if lowered.contains("cookies")
        || lowered.contains("login")
        || lowered.contains("sign in")
        || lowered.contains("age-restricted")
        || lowered.contains("account")
    {
        FetchCause::Auth
    } else if lowered.contains("403")
        || lowered.contains("forbidden")
        || lowered.contains("blocked")
    {
        FetchCause::Forbidden
    } else {
        FetchCause::Other
    }
}
