use super::types::{ItemKind, MediaDescriptor, MediaFormat, MediaItem};
use super::{ExtractContext, Resolver, Strategy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const API_TIMEOUT: Duration = Duration::from_secs(5);
const MIRROR_HOST: &str = "api.fxtwitter.com";

pub fn resolver(context: Arc<ExtractContext>) -> Resolver {
    Resolver::new(
        "twitter",
        vec!["x.com", "twitter.com"],
        vec![Box::new(MirrorApi(context))],
    )
}

#[derive(Debug, Deserialize)]
struct MirrorResponse {
    tweet: Option<Tweet>,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    text: Option<String>,
    author: Option<Author>,
    media: Option<Media>,
}

#[derive(Debug, Deserialize)]
struct Author {
    name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct Media {
    #[serde(default)]
    all: Vec<MediaEntry>,
    #[serde(default)]
    photos: Vec<MediaEntry>,
    #[serde(default)]
    videos: Vec<MediaEntry>,
}

#[derive(Debug, Deserialize)]
struct MediaEntry {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
}

/// Public mirror keyed by the same path structure as the canonical domain.
struct MirrorApi(Arc<ExtractContext>);

#[async_trait]
impl Strategy for MirrorApi {
    fn name(&self) -> &'static str {
        "mirror-api"
    }

    async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>> {
        let api_url = mirror_url(url).context("unparseable tweet URL")?;
        debug!(%api_url, "fetching tweet metadata");

        let response: MirrorResponse = self
            .0
            .http
            .get(&api_url)
            .timeout(API_TIMEOUT)
            .send()
            .await
            .context("tweet mirror request failed")?
            .error_for_status()
            .context("tweet mirror returned an error status")?
            .json()
            .await
            .context("tweet mirror returned invalid JSON")?;

        let Some(tweet) = response.tweet else {
            return Ok(None);
        };
        let Some(media) = tweet.media else {
            return Ok(None);
        };

        let title = tweet.text.as_deref().unwrap_or("Twitter Media");
        let author = tweet
            .author
            .and_then(|author| author.name)
            .unwrap_or_else(|| "Twitter User".to_string());

        if media.all.len() > 1 {
            let items = media
                .all
                .into_iter()
                .filter_map(|entry| {
                    let url = entry.url?;
                    let kind = if entry.kind.as_deref() == Some("video") {
                        ItemKind::Video
                    } else {
                        ItemKind::Image
                    };
                    Some(MediaItem { kind, url })
                })
                .collect::<Vec<_>>();
            if !items.is_empty() {
                return Ok(Some(MediaDescriptor::gallery(title, &author, url, items)));
            }
        }

        if let Some(photo_url) = media.photos.into_iter().find_map(|entry| entry.url) {
            return Ok(Some(MediaDescriptor::image(title, &author, url, photo_url)));
        }

        if let Some(video_url) = media.videos.into_iter().find_map(|entry| entry.url) {
            let descriptor = MediaDescriptor::video(title, &author, url, video_url);
            // Quality discovery rides on the original tweet URL; when it
            // fails we still deliver, just without a menu.
            return Ok(Some(match self.discover_formats(url).await {
                Ok(formats) => descriptor.with_formats(formats),
                Err(e) => {
                    warn!("quality discovery failed, using direct link: {e}");
                    descriptor
                }
            }));
        }

        Ok(None)
    }
}

impl MirrorApi {
    async fn discover_formats(&self, url: &str) -> Result<Vec<MediaFormat>> {
        let info = self.0.ytdlp.get_info(url).await?;
        Ok(info
            .formats
            .into_iter()
            .filter_map(|format| {
                Some(MediaFormat {
                    format_id: format.format_id,
                    container: format.ext.unwrap_or_else(|| "mp4".to_string()),
                    height: format.height?,
                    approx_bytes: format.filesize.or(format.filesize_approx),
                })
            })
            .collect())
    }
}

/// Swaps the canonical host for the mirror host, keeping the path.
fn mirror_url(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    Some(format!("https://{}{}", MIRROR_HOST, parsed.path()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mirror_url_keeps_path() {
        assert_eq!(
            mirror_url("https://x.com/user/status/123").as_deref(),
            Some("https://api.fxtwitter.com/user/status/123")
        );
        assert_eq!(
            mirror_url("https://www.twitter.com/user/status/123?s=20").as_deref(),
            Some("https://api.fxtwitter.com/user/status/123")
        );
        assert!(mirror_url("not a url").is_none());
    }

    #[test]
    fn test_payload_classification() {
        let gallery: MirrorResponse = serde_json::from_value(serde_json::json!({
            "tweet": {
                "text": "four pics",
                "author": { "name": "someone" },
                "media": { "all": [
                    { "type": "photo", "url": "https://pbs.twimg.com/1.jpg" },
                    { "type": "video", "url": "https://video.twimg.com/2.mp4" },
                ]}
            }
        }))
        .unwrap();
        let media = gallery.tweet.unwrap().media.unwrap();
        assert_eq!(media.all.len(), 2);
        assert_eq!(media.all[1].kind.as_deref(), Some("video"));

        let empty: MirrorResponse = serde_json::from_value(serde_json::json!({
            "tweet": { "text": "no media" }
        }))
        .unwrap();
        assert!(empty.tweet.unwrap().media.is_none());
    }
}
