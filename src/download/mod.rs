mod split;
mod ytdlp;

pub use ytdlp::{ToolInfo, YtDlp};

use crate::error::{FetchCause, PipelineError};
use anyhow::anyhow;
use futures_util::StreamExt;
use rand::{distributions::Alphanumeric, Rng};
use reqwest::header::{REFERER, USER_AGENT};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{info, warn};

/// Largest artifact the chat platform accepts in one message (49.5 MiB).
pub const UPLOAD_CEILING_BYTES: u64 = 99 * 1024 * 1024 / 2;

/// Sentinel format id for "whatever the source considers best".
pub const BEST_FORMAT: &str = "best";

const STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// A concrete fetch job: the user's quality choice (or the default policy)
/// translated against a descriptor.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub media_url: String,
    pub audio_only: bool,
    pub format_id: String,
    pub dest_base: PathBuf,
}

/// Materialized artifact(s), in playback order when split.
#[derive(Debug)]
pub struct DownloadResult {
    pub files: Vec<PathBuf>,
    pub size_bytes: u64,
}

/// Executes downloads via the opaque tool or a direct stream, enforcing
/// the upload ceiling and splitting oversized videos. A semaphore bounds
/// how many tool processes and streams run at once.
pub struct FetchEngine {
    ytdlp: Arc<YtDlp>,
    http: reqwest::Client,
    permits: Semaphore,
    user_agent: String,
}

impl FetchEngine {
    pub fn new(
        ytdlp: Arc<YtDlp>,
        max_concurrent: usize,
        desktop_user_agent: &str,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(STREAM_TIMEOUT)
            .build()?;

        Ok(Self {
            ytdlp,
            http,
            permits: Semaphore::new(max_concurrent.max(1)),
            user_agent: desktop_user_agent.to_string(),
        })
    }

    pub async fn fetch(&self, request: &DownloadRequest) -> Result<DownloadResult, PipelineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("download semaphore closed");

        let path = if !request.audio_only
            && request.format_id == BEST_FORMAT
            && direct_media_ext(&request.media_url).is_some()
        {
            // A direct file URL needs no extraction pass; a plain stream
            // copy is materially faster than the tool.
            self.stream_to_disk(&request.media_url, &request.dest_base)
                .await?
        } else {
            self.ytdlp
                .download(
                    &request.media_url,
                    request.audio_only,
                    &request.format_id,
                    &request.dest_base,
                )
                .await
                .map_err(|e| PipelineError::Fetch {
                    cause: e.cause,
                    source: e.into(),
                })?;
            let ext = if request.audio_only { "mp3" } else { "mp4" };
            request.dest_base.with_extension(ext)
        };

        let size = tokio::fs::metadata(&path)
            .await
            .map_err(|e| PipelineError::fetch_other(anyhow!("downloader produced no file: {e}")))?
            .len();

        if size <= UPLOAD_CEILING_BYTES {
            return Ok(DownloadResult {
                files: vec![path],
                size_bytes: size,
            });
        }

        if request.audio_only {
            // No splitting policy for audio; a clear error beats a broken
            // multi-part mp3.
            let _ = tokio::fs::remove_file(&path).await;
            return Err(PipelineError::SizeExceeded { size });
        }

        info!(size, "artifact exceeds the upload ceiling, splitting");
        let outcome = split::split_video(&path, UPLOAD_CEILING_BYTES).await;
        let _ = tokio::fs::remove_file(&path).await;
        match outcome {
            Ok(files) => Ok(DownloadResult {
                files,
                size_bytes: size,
            }),
            Err(e) => Err(PipelineError::Split(e)),
        }
    }

    /// Streams a single remote file to `<dest_base>.<ext>`. Used for the
    /// direct download mode and for gallery items.
    pub async fn fetch_direct(
        &self,
        url: &str,
        dest_base: &Path,
    ) -> Result<PathBuf, PipelineError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .expect("download semaphore closed");
        self.stream_to_disk(url, dest_base).await
    }

    async fn stream_to_disk(&self, url: &str, dest_base: &Path) -> Result<PathBuf, PipelineError> {
        let ext = direct_media_ext(url).unwrap_or("jpg");
        let path = dest_base.with_extension(ext);

        let mut request = self.http.get(url).header(USER_AGENT, &self.user_agent);
        if url.contains("instagram") || url.contains("cdninstagram") {
            request = request.header(REFERER, "https://www.instagram.com/");
        }

        let response = request
            .send()
            .await
            .map_err(|e| PipelineError::fetch_other(anyhow!("stream request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let cause = match status.as_u16() {
                401 => FetchCause::Auth,
                403 => FetchCause::Forbidden,
                _ => FetchCause::Other,
            };
            return Err(PipelineError::Fetch {
                cause,
                source: anyhow!("stream returned HTTP {status}"),
            });
        }

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| PipelineError::fetch_other(anyhow!("failed to create {}: {e}", path.display())))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    drop(file);
                    let _ = tokio::fs::remove_file(&path).await;
                    return Err(PipelineError::fetch_other(anyhow!("stream interrupted: {e}")));
                }
            };
            if let Err(e) = file.write_all(&chunk).await {
                drop(file);
                let _ = tokio::fs::remove_file(&path).await;
                return Err(PipelineError::fetch_other(anyhow!("failed to write stream: {e}")));
            }
        }

        file.flush()
            .await
            .map_err(|e| PipelineError::fetch_other(anyhow!("failed to flush stream: {e}")))?;

        Ok(path)
    }
}

/// Extension of a URL that already points at a media file, if any.
pub fn direct_media_ext(url: &str) -> Option<&'static str> {
    let path = url::Url::parse(url).ok()?.path().to_ascii_lowercase();
    const KNOWN: [&str; 8] = ["mp4", "mov", "webm", "mp3", "jpg", "jpeg", "png", "gif"];
    KNOWN
        .into_iter()
        .find(|ext| path.ends_with(&format!(".{ext}")))
}

/// Collision-free base name for a temporary artifact: timestamp plus a
/// random suffix, so two concurrent requests never share a file.
pub fn unique_base_name() -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("{millis}_{suffix}")
}

/// Checks the external tooling the engine shells out to.
pub async fn test_setup() -> anyhow::Result<()> {
    info!("Testing media tooling...");
    if YtDlp::test_availability().await {
        Ok(())
    } else {
        warn!("yt-dlp is unavailable; only direct file URLs will download");
        Err(anyhow!("yt-dlp is not installed or not on PATH"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_media_ext() {
        assert_eq!(
            direct_media_ext("https://v.redd.it/xyz/DASH_720.mp4"),
            Some("mp4")
        );
        assert_eq!(
            direct_media_ext("https://cdn.example/song.MP3"),
            Some("mp3")
        );
        assert_eq!(
            direct_media_ext("https://cdn.example/pic.jpeg?width=100"),
            Some("jpeg")
        );
        assert_eq!(direct_media_ext("https://x.com/user/status/123"), None);
        assert_eq!(direct_media_ext("not a url"), None);
    }

    #[test]
    fn test_unique_base_names_differ() {
        let a = unique_base_name();
        let b = unique_base_name();
        assert_ne!(a, b);
        assert!(a.contains('_'));
    }

    #[test]
    fn test_ceiling_matches_platform_limit() {
        // 49.5 MiB, just under the 50 MB bot upload cap.
        assert_eq!(UPLOAD_CEILING_BYTES, 51_904_512);
    }
}
