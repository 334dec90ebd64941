use super::types::{ItemKind, MediaDescriptor, MediaItem};
use super::{generic::Optimistic, ExtractContext, Resolver, Strategy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const DIRECT_TIMEOUT: Duration = Duration::from_secs(5);
const MIRROR_TIMEOUT: Duration = Duration::from_secs(6);

pub fn resolver(context: Arc<ExtractContext>) -> Resolver {
    Resolver::new(
        "reddit",
        vec!["reddit.com", "redd.it"],
        vec![
            Box::new(DirectApi(context.clone())),
            Box::new(Mirrors(context)),
            Box::new(Optimistic::new("Reddit Media")),
        ],
    )
}

/// The post's own `.json` endpoint, fetched with a mobile identity.
struct DirectApi(Arc<ExtractContext>);

#[async_trait]
impl Strategy for DirectApi {
    fn name(&self) -> &'static str {
        "direct-api"
    }

    async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>> {
        let json_url = format!("{}.json", clean_post_url(url));
        debug!(%json_url, "fetching reddit post");

        let payload: Value = self
            .0
            .http
            .get(&json_url)
            .header(USER_AGENT, &self.0.mobile_user_agent)
            .timeout(DIRECT_TIMEOUT)
            .send()
            .await
            .context("reddit API request failed")?
            .error_for_status()
            .context("reddit API returned an error status")?
            .json()
            .await
            .context("reddit API returned invalid JSON")?;

        Ok(post_data(&payload).and_then(|post| parse_post(post, url)))
    }
}

/// Read-only mirror instances serving the same JSON shape; first
/// structurally valid response wins.
struct Mirrors(Arc<ExtractContext>);

#[async_trait]
impl Strategy for Mirrors {
    fn name(&self) -> &'static str {
        "mirrors"
    }

    async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>> {
        let path = url::Url::parse(url)
            .context("invalid reddit URL")?
            .path()
            .trim_end_matches('/')
            .to_string();

        for mirror in &self.0.reddit_mirrors {
            let mirror_url = format!("{}{}.json", mirror.trim_end_matches('/'), path);
            debug!(%mirror_url, "trying reddit mirror");

            let response = self
                .0
                .http
                .get(&mirror_url)
                .header(USER_AGENT, &self.0.mobile_user_agent)
                .timeout(MIRROR_TIMEOUT)
                .send()
                .await;

            let payload: Value = match response {
                Ok(response) => match response.json().await {
                    Ok(payload) => payload,
                    Err(_) => continue,
                },
                Err(_) => continue,
            };

            if let Some(post) = post_data(&payload) {
                if let Some(descriptor) = parse_post(post, url) {
                    return Ok(Some(descriptor));
                }
            }
        }

        Ok(None)
    }
}

/// Canonical post URL without query string or trailing slash, ready for the
/// `.json` suffix.
fn clean_post_url(url: &str) -> &str {
    url.split('?')
        .next()
        .unwrap_or(url)
        .trim_end_matches('/')
}

/// Navigates the listing envelope down to the post object.
fn post_data(payload: &Value) -> Option<&Value> {
    let post = &payload[0]["data"]["children"][0]["data"];
    post.is_object().then_some(post)
}

/// Classifies a post in source order: gallery, hosted video, direct image,
/// and finally any remaining link as a video target for the opaque tool.
fn parse_post(post: &Value, source_url: &str) -> Option<MediaDescriptor> {
    let title = post["title"].as_str().unwrap_or("Reddit Media");
    let author = post["author"].as_str().unwrap_or("Unknown");

    if post["is_gallery"].as_bool().unwrap_or(false) {
        if let Some(items) = parse_gallery(post) {
            return Some(MediaDescriptor::gallery(title, author, source_url, items));
        }
    }

    if let Some(fallback) = post["secure_media"]["reddit_video"]["fallback_url"].as_str() {
        // Signed query params go stale; the bare URL keeps working.
        let direct = fallback.split('?').next().unwrap_or(fallback).to_string();
        return Some(MediaDescriptor::video(title, author, source_url, direct));
    }

    let post_url = post["url"].as_str()?;

    if is_image_url(post_url) || post["post_hint"] == "image" {
        return Some(MediaDescriptor::image(
            title,
            author,
            source_url,
            post_url.to_string(),
        ));
    }

    // External hosts (redgifs, imgur, ...) are only resolvable by the
    // opaque tool, so treat whatever is left as a video target.
    debug!(post_url, "treating external link as video target");
    Some(MediaDescriptor::video(
        title,
        author,
        source_url,
        post_url.to_string(),
    ))
}

/// Gallery items in display order, picking the largest variant per item and
/// preferring the MP4 rendition when the item is itself a video.
fn parse_gallery(post: &Value) -> Option<Vec<MediaItem>> {
    let metadata = post["media_metadata"].as_object()?;
    let order = post["gallery_data"]["items"].as_array()?;

    let mut items = Vec::new();
    for entry in order {
        let Some(media_id) = entry["media_id"].as_str() else {
            continue;
        };
        let Some(meta) = metadata.get(media_id) else {
            continue;
        };
        if meta["status"] != "valid" {
            continue;
        }

        let source = &meta["s"];
        let mut kind = ItemKind::Image;
        let mut url = source["u"]
            .as_str()
            .or_else(|| source["gif"].as_str())
            .map(unescape_entities);

        if meta["e"] == "Video" {
            if let Some(mp4) = source["mp4"].as_str() {
                url = Some(unescape_entities(mp4));
                kind = ItemKind::Video;
            }
        }

        if let Some(url) = url {
            items.push(MediaItem { kind, url });
        }
    }

    (!items.is_empty()).then_some(items)
}

fn unescape_entities(url: &str) -> String {
    url.replace("&amp;", "&")
}

fn is_image_url(url: &str) -> bool {
    let path = url.split('?').next().unwrap_or(url).to_ascii_lowercase();
    [".jpeg", ".jpg", ".png", ".gif"]
        .iter()
        .any(|ext| path.ends_with(ext))
}
