use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::info;

/// Segment duration is derived from a slightly smaller target so codec
/// overhead cannot push a chunk back over the ceiling.
const SAFETY_MARGIN_PERCENT: u64 = 95;

async fn probe_duration(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .arg("-v")
        .arg("error")
        .arg("-show_entries")
        .arg("format=duration")
        .arg("-of")
        .arg("default=noprint_wrappers=1:nokey=1")
        .arg(path)
        .output()
        .await
        .context("Failed to run ffprobe")?;

    if !output.status.success() {
        anyhow::bail!(
            "Failed to probe video duration: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let duration_str = String::from_utf8_lossy(&output.stdout);
    duration_str
        .trim()
        .parse()
        .context("Failed to parse video duration")
}

/// Number of chunks a file of `size_bytes` splits into under
/// `ceiling_bytes`. Pure, so the same size always plans the same count.
pub fn plan_chunks(size_bytes: u64, ceiling_bytes: u64) -> u64 {
    if size_bytes <= ceiling_bytes {
        return 1;
    }
    let safe_target = ceiling_bytes * SAFETY_MARGIN_PERCENT / 100;
    size_bytes.div_ceil(safe_target)
}

/// Splits a video into sequential chunks, each an independently playable
/// container under the ceiling. Returned paths are in playback order. The
/// source file is untouched; deleting it stays with the caller.
pub async fn split_video(path: &Path, ceiling_bytes: u64) -> Result<Vec<PathBuf>> {
    let size = tokio::fs::metadata(path)
        .await
        .context("Failed to stat video for splitting")?
        .len();

    let parts = plan_chunks(size, ceiling_bytes);
    if parts <= 1 {
        return Ok(vec![path.to_path_buf()]);
    }

    let duration = probe_duration(path).await?;
    let segment_duration = duration / parts as f64;

    info!(
        "Splitting {} ({:.1} MB, {:.1}s) into {} parts of ~{:.1}s",
        path.display(),
        size as f64 / 1024.0 / 1024.0,
        duration,
        parts,
        segment_duration
    );

    let stem = path
        .file_stem()
        .map(|stem| stem.to_string_lossy().to_string())
        .context("Video path has no file name")?;
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let pattern = parent.join(format!("{stem}_part_%03d.mp4"));

    let output = Command::new("ffmpeg")
        .arg("-i")
        .arg(path)
        .arg("-f")
        .arg("segment")
        .arg("-segment_time")
        .arg(segment_duration.to_string())
        .arg("-c")
        .arg("copy")
        .arg("-map")
        .arg("0")
        .arg("-reset_timestamps")
        .arg("1")
        .arg(&pattern)
        .output()
        .await
        .context("Failed to run ffmpeg")?;

    if !output.status.success() {
        anyhow::bail!(
            "ffmpeg split failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
    }

    let prefix = format!("{stem}_part_");
    let mut chunks = Vec::new();
    let mut entries = tokio::fs::read_dir(parent)
        .await
        .context("Failed to list split output")?;
    while let Some(entry) = entries.next_entry().await.context("Failed to list split output")? {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(&prefix) && name.ends_with(".mp4") {
            chunks.push(entry.path());
        }
    }
    chunks.sort();

    if chunks.is_empty() {
        anyhow::bail!("ffmpeg produced no segments");
    }

    info!("Split into {} parts", chunks.len());
    Ok(chunks)
}
