use super::cobalt::CobaltApi;
use super::types::{ItemKind, MediaDescriptor, MediaItem};
use super::{ExtractContext, Resolver, Strategy};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

const API_TIMEOUT: Duration = Duration::from_secs(10);
const TIKWM_ENDPOINT: &str = "https://www.tikwm.com/api/";

pub fn resolver(context: Arc<ExtractContext>) -> Resolver {
    Resolver::new(
        "tiktok",
        vec!["tiktok.com"],
        vec![
            Box::new(TikWm(context.clone())),
            Box::new(CobaltApi::new(context, "TikTok Video", false, true)),
        ],
    )
}

#[derive(Debug, Deserialize)]
struct TikWmResponse {
    code: Option<i64>,
    data: Option<TikWmData>,
}

#[derive(Debug, Deserialize)]
struct TikWmData {
    title: Option<String>,
    author: Option<TikWmAuthor>,
    #[serde(default)]
    images: Vec<String>,
    play: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TikWmAuthor {
    nickname: Option<String>,
}

/// TikWM metadata API: rich data, slideshow support, no-watermark play URL.
struct TikWm(Arc<ExtractContext>);

#[async_trait]
impl Strategy for TikWm {
    fn name(&self) -> &'static str {
        "tikwm"
    }

    async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>> {
        debug!(url, "fetching tiktok metadata");

        let response: TikWmResponse = self
            .0
            .http
            .get(TIKWM_ENDPOINT)
            .query(&[("url", url)])
            .timeout(API_TIMEOUT)
            .send()
            .await
            .context("tikwm request failed")?
            .error_for_status()
            .context("tikwm returned an error status")?
            .json()
            .await
            .context("tikwm returned invalid JSON")?;

        if response.code != Some(0) {
            return Ok(None);
        }
        let Some(data) = response.data else {
            return Ok(None);
        };

        let author = data
            .author
            .and_then(|author| author.nickname)
            .unwrap_or_else(|| "Unknown".to_string());

        if !data.images.is_empty() {
            let title = data.title.as_deref().unwrap_or("TikTok Slideshow");
            let items = data
                .images
                .into_iter()
                .map(|url| MediaItem {
                    kind: ItemKind::Image,
                    url,
                })
                .collect();
            return Ok(Some(MediaDescriptor::gallery(title, &author, url, items)));
        }

        let title = data.title.as_deref().unwrap_or("TikTok Video");
        Ok(data
            .play
            .map(|play| MediaDescriptor::video(title, &author, url, play)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slideshow_payload() {
        let response: TikWmResponse = serde_json::from_value(serde_json::json!({
            "code": 0,
            "data": {
                "title": "slides",
                "images": ["https://cdn.example/1.jpg", "https://cdn.example/2.jpg"],
                "play": "https://cdn.example/ignored.mp4"
            }
        }))
        .unwrap();
        let data = response.data.unwrap();
        assert_eq!(data.images.len(), 2);
    }

    #[test]
    fn test_video_payload() {
        let response: TikWmResponse = serde_json::from_value(serde_json::json!({
            "code": 0,
            "data": {
                "title": "a video",
                "author": { "nickname": "creator" },
                "play": "https://cdn.example/play"
            }
        }))
        .unwrap();
        let data = response.data.unwrap();
        assert!(data.images.is_empty());
        assert_eq!(data.play.as_deref(), Some("https://cdn.example/play"));
    }

    #[test]
    fn test_error_code_payload() {
        let response: TikWmResponse =
            serde_json::from_value(serde_json::json!({ "code": -1, "msg": "rate limited" }))
                .unwrap();
        assert_ne!(response.code, Some(0));
    }
}
