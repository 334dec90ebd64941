use super::sessions::Session;
use crate::download::{
    unique_base_name, DownloadRequest, DownloadResult, FetchEngine, BEST_FORMAT,
};
use crate::extract::{ItemKind, MediaDescriptor};
use crate::utils::truncate_title;
use std::path::{Path, PathBuf};
use teloxide::prelude::*;
use teloxide::types::{InputFile, MessageId, ParseMode, UserId};
use teloxide::utils::html;
use tracing::{error, info, warn};

/// One translated download job: what to fetch and how to present it.
#[derive(Debug, Clone)]
pub struct MediaJob {
    pub media_url: String,
    pub audio_only: bool,
    pub format_id: String,
    pub caption: String,
    pub source_url: String,
    pub requester: Option<UserId>,
}

impl MediaJob {
    /// Best-quality video job for descriptors with no discoverable formats.
    pub fn best_video(descriptor: &MediaDescriptor, resolved_url: &str, requester: Option<UserId>) -> Self {
        Self {
            media_url: descriptor
                .media_url
                .clone()
                .unwrap_or_else(|| resolved_url.to_string()),
            audio_only: false,
            format_id: BEST_FORMAT.to_string(),
            caption: build_caption(descriptor),
            source_url: descriptor.source_url.clone(),
            requester,
        }
    }
}

pub fn build_caption(descriptor: &MediaDescriptor) -> String {
    let title = truncate_title(&descriptor.title, 200);
    format!(
        "🎬 <b>{}</b>\n\n👤 <b>Author:</b> {}\n🔗 <a href=\"{}\">View Post</a>",
        html::escape(&title),
        html::escape(&descriptor.author),
        descriptor.source_url
    )
}

/// Runs Downloading → [Splitting] → Uploading for one job, then removes
/// every temp file and resolves the status message. All chat-platform
/// calls are best-effort so cleanup runs on every path.
pub async fn deliver_media(
    bot: &Bot,
    engine: &FetchEngine,
    download_dir: &Path,
    chat_id: ChatId,
    status_id: MessageId,
    job: MediaJob,
) {
    let _ = bot
        .edit_message_text(chat_id, status_id, "⏳ Downloading...")
        .await;

    let request = DownloadRequest {
        media_url: job.media_url.clone(),
        audio_only: job.audio_only,
        format_id: job.format_id.clone(),
        dest_base: download_dir.join(unique_base_name()),
    };

    let result = match engine.fetch(&request).await {
        Ok(result) => result,
        Err(e) => {
            error!(url = %job.media_url, "download failed: {e:#}");
            let _ = bot
                .edit_message_text(chat_id, status_id, e.user_message())
                .await;
            return;
        }
    };

    let _ = bot
        .edit_message_text(chat_id, status_id, "📤 Uploading...")
        .await;

    let upload = upload_artifacts(bot, chat_id, &result, job.audio_only, &job.caption).await;
    cleanup_files(&result.files).await;

    match upload {
        Ok(()) => {
            let _ = bot.delete_message(chat_id, status_id).await;
            record_completion(job.requester, &job.source_url);
        }
        Err(e) => {
            warn!("upload failed: {e}");
            let _ = bot
                .edit_message_text(chat_id, status_id, "⚠️ Upload failed.")
                .await;
        }
    }
}

async fn upload_artifacts(
    bot: &Bot,
    chat_id: ChatId,
    result: &DownloadResult,
    audio_only: bool,
    caption: &str,
) -> Result<(), teloxide::RequestError> {
    if audio_only {
        if let Some(path) = result.files.first() {
            bot.send_audio(chat_id, InputFile::file(path.clone()))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await?;
        }
        return Ok(());
    }

    let total = result.files.len();
    for (index, path) in result.files.iter().enumerate() {
        let text = if total > 1 {
            format!("{caption}\n\n📦 Part {}/{}", index + 1, total)
        } else {
            caption.to_string()
        };
        bot.send_video(chat_id, InputFile::file(path.clone()))
            .caption(text)
            .parse_mode(ParseMode::Html)
            .await?;
    }
    Ok(())
}

/// Uploads each gallery item in display order from the stored descriptor,
/// then removes the menu message. Videos go by URL; images are streamed to
/// disk first so they arrive as documents at original quality.
pub async fn deliver_gallery(
    bot: &Bot,
    engine: &FetchEngine,
    download_dir: &Path,
    chat_id: ChatId,
    status_id: MessageId,
    session: &Session,
) {
    let items = &session.descriptor.items;
    let _ = bot
        .edit_message_text(
            chat_id,
            status_id,
            format!("📤 Sending {} items...", items.len()),
        )
        .await;

    let mut sent = 0usize;
    for item in items {
        let delivered = match item.kind {
            ItemKind::Video => match url::Url::parse(&item.url) {
                Ok(parsed) => bot
                    .send_video(chat_id, InputFile::url(parsed))
                    .await
                    .is_ok(),
                Err(_) => false,
            },
            ItemKind::Image => deliver_gallery_image(bot, engine, download_dir, chat_id, item.url.as_str()).await,
        };
        if delivered {
            sent += 1;
        } else {
            warn!(url = %item.url, "failed to deliver gallery item");
        }
    }

    if sent > 0 {
        let _ = bot.delete_message(chat_id, status_id).await;
        record_completion(session.requester, &session.descriptor.source_url);
    } else {
        let _ = bot
            .edit_message_text(chat_id, status_id, "❌ Failed. Could not deliver the album.")
            .await;
    }
}

async fn deliver_gallery_image(
    bot: &Bot,
    engine: &FetchEngine,
    download_dir: &Path,
    chat_id: ChatId,
    url: &str,
) -> bool {
    let dest_base = download_dir.join(unique_base_name());
    match engine.fetch_direct(url, &dest_base).await {
        Ok(path) => {
            let outcome = bot
                .send_document(chat_id, InputFile::file(path.clone()))
                .await;
            cleanup_files(&[path]).await;
            outcome.is_ok()
        }
        Err(e) => {
            warn!(url, "gallery image fetch failed: {e}");
            // The platform can often fetch the URL itself.
            match url::Url::parse(url) {
                Ok(parsed) => bot
                    .send_document(chat_id, InputFile::url(parsed))
                    .await
                    .is_ok(),
                Err(_) => false,
            }
        }
    }
}

/// Downloads a single image and sends it as a photo, falling back to
/// letting the platform fetch the URL directly.
pub async fn deliver_image(
    bot: &Bot,
    engine: &FetchEngine,
    download_dir: &Path,
    chat_id: ChatId,
    status_id: MessageId,
    session: &Session,
) {
    let Some(image_url) = session.descriptor.media_url.clone() else {
        let _ = bot
            .edit_message_text(chat_id, status_id, "❌ Failed. Content unavailable.")
            .await;
        return;
    };

    let caption = build_caption(&session.descriptor);
    let dest_base = download_dir.join(unique_base_name());

    let sent = match engine.fetch_direct(&image_url, &dest_base).await {
        Ok(path) => {
            let outcome = bot
                .send_photo(chat_id, InputFile::file(path.clone()))
                .caption(caption.clone())
                .parse_mode(ParseMode::Html)
                .await;
            cleanup_files(&[path]).await;
            outcome.is_ok()
        }
        Err(e) => {
            warn!(url = %image_url, "image fetch failed: {e}");
            false
        }
    };

    let sent = if sent {
        true
    } else {
        match url::Url::parse(&image_url) {
            Ok(parsed) => bot
                .send_document(chat_id, InputFile::url(parsed))
                .caption(caption)
                .parse_mode(ParseMode::Html)
                .await
                .is_ok(),
            Err(_) => false,
        }
    };

    if sent {
        let _ = bot.delete_message(chat_id, status_id).await;
        record_completion(session.requester, &session.descriptor.source_url);
    } else {
        let _ = bot
            .edit_message_text(chat_id, status_id, "❌ Failed. Could not deliver the image.")
            .await;
    }
}

/// Removes temp artifacts with delete-if-exists semantics: running it twice
/// over the same paths is harmless.
pub async fn cleanup_files(paths: &[PathBuf]) {
    for path in paths {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), "failed to remove temp file: {e}"),
        }
    }
}

/// Fire-and-forget completion record; the stats sink is whatever consumes
/// these structured events.
fn record_completion(requester: Option<UserId>, source_url: &str) {
    info!(
        target: "linksnap::stats",
        user_id = requester.map(|user| user.0),
        url = source_url,
        "download completed"
    );
}
