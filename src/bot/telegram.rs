use super::delivery::{self, build_caption, MediaJob};
use super::sessions::{Session, SessionStore};
use crate::classify::Classifier;
use crate::config::Config;
use crate::download::{FetchEngine, YtDlp, BEST_FORMAT};
use crate::extract::{ExtractContext, Extractor, MediaDescriptor, MediaKind};
use crate::quality::{self, MenuEntry};
use crate::utils::{human_size, truncate_title};
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use teloxide::prelude::*;
use teloxide::types::{
    InlineKeyboardButton, InlineKeyboardMarkup, MaybeInaccessibleMessage, MessageId, ParseMode,
};
use teloxide::utils::html;
use tracing::{info, warn};

pub struct App {
    classifier: Classifier,
    extractor: Extractor,
    engine: FetchEngine,
    sessions: SessionStore,
    download_dir: PathBuf,
}

pub async fn run(config: Config) -> Result<()> {
    tokio::fs::create_dir_all(&config.downloads.dir)
        .await
        .context("Failed to create download directory")?;

    let cookie_file = YtDlp::init_cookie_jar(&config.cookie_path());
    let ytdlp = Arc::new(YtDlp::new(
        &config.sources.mobile_user_agent,
        cookie_file,
        Duration::from_secs(config.downloads.tool_timeout_secs),
    ));

    if let Err(e) = crate::download::test_setup().await {
        warn!("Media tooling check failed: {e}");
    }

    let extractor = Extractor::new(ExtractContext {
        http: reqwest::Client::new(),
        mobile_user_agent: config.sources.mobile_user_agent.clone(),
        desktop_user_agent: config.sources.desktop_user_agent.clone(),
        reddit_mirrors: config.sources.reddit_mirrors.clone(),
        cobalt_instances: config.sources.cobalt_instances.clone(),
        ytdlp: ytdlp.clone(),
    });
    let engine = FetchEngine::new(
        ytdlp,
        config.downloads.max_concurrent,
        &config.sources.desktop_user_agent,
    )
    .context("Failed to initialize the fetch engine")?;
    let classifier = Classifier::new(&config.sources.mobile_user_agent)
        .context("Failed to initialize the URL classifier")?;

    let app = Arc::new(App {
        classifier,
        extractor,
        engine,
        sessions: SessionStore::new(),
        download_dir: config.downloads.dir.clone(),
    });

    let bot = Bot::from_env();
    info!("Telegram bot starting...");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_callback_query().endpoint(handle_callback));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![app])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

/// Analyzing stage: spot a link, resolve it to a descriptor, then either
/// auto-download (video with no quality choice) or present a menu.
async fn handle_message(bot: Bot, msg: Message, app: Arc<App>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    if text.starts_with("/start") {
        bot.send_message(
            msg.chat.id,
            "👋 Send me a link (Reddit, X, Instagram, TikTok...) and I'll fetch the media.",
        )
        .await?;
        return Ok(());
    }

    // No recognizable URL: the message is inert, not an error.
    let Some(url) = app.classifier.find_url(text) else {
        return Ok(());
    };

    info!(%url, "new media request");
    let status = bot.send_message(msg.chat.id, "🔍 Analyzing...").await?;
    let requester = msg.from.as_ref().map(|user| user.id);

    let resolved = app.classifier.resolve_redirect(&url).await;
    let descriptor = match app.extractor.extract(&resolved).await {
        Ok(descriptor) => descriptor,
        Err(e) => {
            bot.edit_message_text(msg.chat.id, status.id, e.user_message())
                .await?;
            return Ok(());
        }
    };

    // A single meaningless menu entry helps nobody; go straight to the
    // best-quality download.
    if descriptor.kind == MediaKind::Video && descriptor.formats.is_empty() {
        info!("no quality variants discovered, auto-downloading best");
        let job = MediaJob::best_video(&descriptor, &resolved, requester);
        let chat_id = msg.chat.id;
        let status_id = status.id;
        let bot = bot.clone();
        tokio::spawn(async move {
            delivery::deliver_media(&bot, &app.engine, &app.download_dir, chat_id, status_id, job)
                .await;
        });
        return Ok(());
    }

    let entries = quality::select_menu(&descriptor);
    bot.edit_message_text(msg.chat.id, status.id, menu_text(&descriptor))
        .parse_mode(ParseMode::Html)
        .reply_markup(menu_keyboard(&entries))
        .await?;

    app.sessions
        .insert(
            msg.chat.id,
            status.id,
            Session {
                descriptor,
                resolved_url: resolved,
                requester,
            },
        )
        .await;

    Ok(())
}

/// Menu choice: claim the session the button belongs to and run the
/// matching delivery in its own task.
async fn handle_callback(bot: Bot, q: CallbackQuery, app: Arc<App>) -> ResponseResult<()> {
    let Some(MaybeInaccessibleMessage::Regular(message)) = q.message.as_ref() else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };
    let chat_id = message.chat.id;
    let message_id = message.id;

    let Some((action, argument)) = q.data.as_deref().and_then(parse_callback) else {
        bot.answer_callback_query(q.id).await?;
        return Ok(());
    };

    let Some(session) = app.sessions.take(chat_id, message_id).await else {
        bot.answer_callback_query(q.id).text("❌ Expired").await?;
        return Ok(());
    };

    bot.answer_callback_query(q.id).text("🚀 Working on it...").await?;

    let action = action.to_string();
    let format_id = argument.to_string();
    let bot = bot.clone();
    tokio::spawn(async move {
        run_choice(&bot, &app, chat_id, message_id, &action, &format_id, session).await;
    });

    Ok(())
}

async fn run_choice(
    bot: &Bot,
    app: &App,
    chat_id: ChatId,
    status_id: MessageId,
    action: &str,
    format_id: &str,
    session: Session,
) {
    match action {
        "img" => {
            delivery::deliver_image(
                bot,
                &app.engine,
                &app.download_dir,
                chat_id,
                status_id,
                &session,
            )
            .await;
        }
        "alb" => {
            delivery::deliver_gallery(
                bot,
                &app.engine,
                &app.download_dir,
                chat_id,
                status_id,
                &session,
            )
            .await;
        }
        "vid" | "aud" => {
            let job = translate_choice(&session, action == "aud", format_id);
            delivery::deliver_media(bot, &app.engine, &app.download_dir, chat_id, status_id, job)
                .await;
        }
        other => warn!(action = other, "unknown callback action"),
    }
}

/// Turns a menu choice plus the stored descriptor into a concrete job.
/// Specific format ids were discovered against the canonical post URL, so
/// the tool must run against it; "best" prefers the already-extracted
/// direct media URL.
fn translate_choice(session: &Session, audio_only: bool, format_id: &str) -> MediaJob {
    let descriptor = &session.descriptor;
    let media_url = if format_id == BEST_FORMAT {
        descriptor
            .media_url
            .clone()
            .unwrap_or_else(|| session.resolved_url.clone())
    } else {
        session.resolved_url.clone()
    };

    MediaJob {
        media_url,
        audio_only,
        format_id: format_id.to_string(),
        caption: build_caption(descriptor),
        source_url: descriptor.source_url.clone(),
        requester: session.requester,
    }
}

fn parse_callback(data: &str) -> Option<(&str, &str)> {
    data.split_once('|')
}

fn menu_text(descriptor: &MediaDescriptor) -> String {
    let title = truncate_title(&descriptor.title, 50);
    let mut text = format!("✅ <b>{}</b>", html::escape(&title));

    match descriptor.kind {
        MediaKind::Gallery => {
            text.push_str(&format!(
                "\n📚 <b>Album:</b> {} items",
                descriptor.items.len()
            ));
        }
        MediaKind::Image => text.push_str("\n🖼 Image detected"),
        MediaKind::Video => {}
    }

    text.push_str(&format!("\n👤 Author: {}", html::escape(&descriptor.author)));
    text.push_str(&format!(
        "\n🔗 <a href=\"{}\">Source</a>",
        descriptor.source_url
    ));
    text
}

fn menu_keyboard(entries: &[MenuEntry]) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = entries
        .iter()
        .map(|entry| {
            let (label, data) = match entry {
                MenuEntry::Quality {
                    format_id,
                    height,
                    approx_bytes,
                } => {
                    let label = match approx_bytes {
                        Some(bytes) => format!("📹 {height}p ({})", human_size(*bytes)),
                        None => format!("📹 {height}p"),
                    };
                    (label, format!("vid|{format_id}"))
                }
                MenuEntry::Best => ("📹 Download Video".to_string(), "vid|best".to_string()),
                MenuEntry::AudioOnly => ("🎵 Audio Only".to_string(), "aud|best".to_string()),
                MenuEntry::Image => ("🖼 Download Image".to_string(), "img|single".to_string()),
                MenuEntry::Album { count } => {
                    (format!("📥 Download Album ({count})"), "alb|all".to_string())
                }
            };
            vec![InlineKeyboardButton::callback(label, data)]
        })
        .collect();

    InlineKeyboardMarkup::new(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::types::UserId;

    fn video_session(formats_url: &str) -> Session {
        let mut descriptor = MediaDescriptor::video(
            "clip",
            "author",
            "https://x.com/user/status/1",
            formats_url.to_string(),
        );
        descriptor.formats = vec![crate::extract::MediaFormat {
            format_id: "22".to_string(),
            container: "mp4".to_string(),
            height: 720,
            approx_bytes: None,
        }];
        Session {
            descriptor,
            resolved_url: "https://x.com/user/status/1".to_string(),
            requester: Some(UserId(9)),
        }
    }

    #[test]
    fn test_parse_callback() {
        assert_eq!(parse_callback("vid|22"), Some(("vid", "22")));
        assert_eq!(parse_callback("aud|best"), Some(("aud", "best")));
        assert_eq!(parse_callback("garbage"), None);
    }

    #[test]
    fn test_translate_specific_format_uses_canonical_url() {
        let session = video_session("https://video.twimg.com/direct.mp4");
        let job = translate_choice(&session, false, "22");
        assert_eq!(job.media_url, "https://x.com/user/status/1");
        assert_eq!(job.format_id, "22");
    }

    #[test]
    fn test_translate_best_prefers_direct_url() {
        let session = video_session("https://video.twimg.com/direct.mp4");
        let job = translate_choice(&session, false, BEST_FORMAT);
        assert_eq!(job.media_url, "https://video.twimg.com/direct.mp4");
    }

    #[test]
    fn test_menu_keyboard_callback_data() {
        let entries = vec![
            MenuEntry::Quality {
                format_id: "22".to_string(),
                height: 720,
                approx_bytes: None,
            },
            MenuEntry::Quality {
                format_id: "18".to_string(),
                height: 360,
                approx_bytes: Some(5 * 1024 * 1024),
            },
            MenuEntry::AudioOnly,
        ];
        let keyboard = menu_keyboard(&entries);
        assert_eq!(keyboard.inline_keyboard.len(), 3);
        assert_eq!(keyboard.inline_keyboard[0][0].text, "📹 720p");
        assert_eq!(keyboard.inline_keyboard[1][0].text, "📹 360p (5.0 MB)");
        assert_eq!(keyboard.inline_keyboard[2][0].text, "🎵 Audio Only");
    }

    #[test]
    fn test_menu_text_mentions_album_size() {
        let items = (0..3)
            .map(|i| crate::extract::MediaItem {
                kind: crate::extract::ItemKind::Image,
                url: format!("https://example.com/{i}.jpg"),
            })
            .collect();
        let descriptor =
            MediaDescriptor::gallery("album", "author", "https://example.com/post", items);
        let text = menu_text(&descriptor);
        assert!(text.contains("3 items"));
        assert!(text.contains("author"));
    }
}
