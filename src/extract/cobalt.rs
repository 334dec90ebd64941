use super::types::{ItemKind, MediaDescriptor, MediaItem};
use super::{ExtractContext, Strategy};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const API_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Deserialize)]
struct CobaltResponse {
    status: Option<String>,
    url: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    picker: Option<Vec<PickerEntry>>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PickerEntry {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
}

/// Cobalt-compatible extraction API, rotated across the configured public
/// instances. Used directly for Instagram and as the TikTok fallback.
pub struct CobaltApi {
    context: Arc<ExtractContext>,
    title: &'static str,
    /// Ask for h264/720 renditions (the Instagram call does; the TikTok
    /// fallback sends the bare URL like the original client).
    send_hints: bool,
    /// Single results without a recognizable extension are videos on some
    /// platforms (TikTok play URLs carry no extension).
    assume_video: bool,
}

impl CobaltApi {
    pub fn new(
        context: Arc<ExtractContext>,
        title: &'static str,
        send_hints: bool,
        assume_video: bool,
    ) -> Self {
        Self {
            context,
            title,
            send_hints,
            assume_video,
        }
    }

    fn request_body(&self, url: &str) -> serde_json::Value {
        if self.send_hints {
            json!({ "url": url, "vCodec": "h264", "vQuality": "720" })
        } else {
            json!({ "url": url })
        }
    }

    fn classify(&self, response: CobaltResponse, source_url: &str) -> Option<MediaDescriptor> {
        if response.status.as_deref() == Some("error") {
            debug!(text = ?response.text, "cobalt reported an error");
            return None;
        }

        if let Some(picker) = response.picker {
            let items = picker
                .into_iter()
                .filter_map(|entry| {
                    let url = entry.url?;
                    let kind = if entry.kind.as_deref() == Some("photo") {
                        ItemKind::Image
                    } else {
                        ItemKind::Video
                    };
                    Some(MediaItem { kind, url })
                })
                .collect::<Vec<_>>();
            if !items.is_empty() {
                return Some(MediaDescriptor::gallery(
                    self.title,
                    "Unknown",
                    source_url,
                    items,
                ));
            }
        }

        let media_url = response.url?;
        let is_video = self.assume_video
            || media_url.contains(".mp4")
            || response.kind.as_deref() == Some("video");

        Some(if is_video {
            MediaDescriptor::video(self.title, "Unknown", source_url, media_url)
        } else {
            MediaDescriptor::image(self.title, "Unknown", source_url, media_url)
        })
    }
}

#[async_trait]
impl Strategy for CobaltApi {
    fn name(&self) -> &'static str {
        "cobalt"
    }

    async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>> {
        let body = self.request_body(url);

        for instance in &self.context.cobalt_instances {
            debug!(%instance, "trying cobalt instance");

            let response = self
                .context
                .http
                .post(instance)
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .header(USER_AGENT, &self.context.desktop_user_agent)
                .timeout(API_TIMEOUT)
                .json(&body)
                .send()
                .await;

            let payload: CobaltResponse = match response {
                Ok(response) => match response.json().await {
                    Ok(payload) => payload,
                    Err(_) => continue,
                },
                Err(_) => continue,
            };

            if let Some(descriptor) = self.classify(payload, url) {
                return Ok(Some(descriptor));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MediaKind;
    use std::sync::Arc;

    fn api(send_hints: bool, assume_video: bool) -> CobaltApi {
        let context = Arc::new(ExtractContext {
            http: reqwest::Client::new(),
            mobile_user_agent: "mobile".to_string(),
            desktop_user_agent: "desktop".to_string(),
            reddit_mirrors: Vec::new(),
            cobalt_instances: Vec::new(),
            ytdlp: Arc::new(crate::download::YtDlp::new(
                "mobile",
                None,
                Duration::from_secs(1),
            )),
        });
        CobaltApi::new(context, "Instagram Media", send_hints, assume_video)
    }

    #[test]
    fn test_request_body_hints() {
        let hinted = api(true, false).request_body("https://instagram.com/p/x/");
        assert_eq!(hinted["vCodec"], "h264");
        assert_eq!(hinted["vQuality"], "720");

        let bare = api(false, true).request_body("https://tiktok.com/@u/video/1");
        assert!(bare.get("vCodec").is_none());
    }

    #[test]
    fn test_classify_picker_as_gallery() {
        let response: CobaltResponse = serde_json::from_value(serde_json::json!({
            "picker": [
                { "type": "photo", "url": "https://cdn.example/1.jpg" },
                { "type": "video", "url": "https://cdn.example/2.mp4" },
            ]
        }))
        .unwrap();

        let descriptor = api(true, false)
            .classify(response, "https://instagram.com/p/x/")
            .unwrap();
        assert_eq!(descriptor.kind, MediaKind::Gallery);
        assert_eq!(descriptor.items[0].kind, ItemKind::Image);
        assert_eq!(descriptor.items[1].kind, ItemKind::Video);
    }

    #[test]
    fn test_classify_single_by_extension() {
        let video: CobaltResponse =
            serde_json::from_value(serde_json::json!({ "url": "https://cdn.example/clip.mp4" }))
                .unwrap();
        assert_eq!(
            api(true, false)
                .classify(video, "https://instagram.com/p/x/")
                .unwrap()
                .kind,
            MediaKind::Video
        );

        let image: CobaltResponse =
            serde_json::from_value(serde_json::json!({ "url": "https://cdn.example/pic.jpg" }))
                .unwrap();
        assert_eq!(
            api(true, false)
                .classify(image, "https://instagram.com/p/x/")
                .unwrap()
                .kind,
            MediaKind::Image
        );
    }

    #[test]
    fn test_classify_error_and_empty() {
        let error: CobaltResponse = serde_json::from_value(
            serde_json::json!({ "status": "error", "text": "blocked" }),
        )
        .unwrap();
        assert!(api(true, false)
            .classify(error, "https://instagram.com/p/x/")
            .is_none());

        let empty: CobaltResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(api(true, false)
            .classify(empty, "https://instagram.com/p/x/")
            .is_none());
    }
}
