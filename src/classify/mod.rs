use anyhow::{Context, Result};
use regex::Regex;
use reqwest::header::{LOCATION, USER_AGENT};
use reqwest::redirect::Policy;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

const REDIRECT_TIMEOUT: Duration = Duration::from_secs(5);

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)https?://(?:www\.|old\.|mobile\.|m\.)?(?:reddit\.com|redd\.it|x\.com|twitter\.com|instagram\.com|tiktok\.com|vm\.tiktok\.com|vt\.tiktok\.com|open\.spotify\.com|spotify\.com|soundcloud\.com)/\S+",
    )
    .expect("invalid URL pattern")
});

/// Spots supported platform links in free-form chat text and expands the
/// short-link variants that hide the real post URL behind a redirect.
pub struct Classifier {
    client: reqwest::Client,
    user_agent: String,
}

impl Classifier {
    pub fn new(user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(Policy::none())
            .timeout(REDIRECT_TIMEOUT)
            .build()
            .context("Failed to create redirect resolution client")?;

        Ok(Self {
            client,
            user_agent: user_agent.to_string(),
        })
    }

    /// First supported-platform URL embedded in the text, if any. A message
    /// without one is inert, not an error.
    pub fn find_url(&self, text: &str) -> Option<String> {
        URL_PATTERN.find(text).map(|m| m.as_str().to_string())
    }

    /// Expands share links that only exist to redirect. Any failure falls
    /// back to the original URL so the request can still proceed.
    pub async fn resolve_redirect(&self, url: &str) -> String {
        if !is_short_link(url) {
            return url.to_string();
        }

        let response = self
            .client
            .head(url)
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_redirection() => response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .unwrap_or_else(|| url.to_string()),
            Ok(response) => {
                debug!(status = %response.status(), url, "short link did not redirect");
                url.to_string()
            }
            Err(e) => {
                debug!(url, "redirect resolution failed: {e}");
                url.to_string()
            }
        }
    }
}

fn is_short_link(url: &str) -> bool {
    url.contains("/s/") || url.contains("vm.tiktok") || url.contains("vt.tiktok")
}
