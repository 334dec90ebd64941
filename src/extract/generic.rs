use super::types::MediaDescriptor;
use super::{Resolver, Strategy};
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Catch-all for classifier-approved URLs no platform resolver claims
/// (music platforms and the like): hand the URL straight to the opaque
/// downloader instead of failing.
pub fn resolver() -> Resolver {
    Resolver::new("generic", Vec::new(), vec![Box::new(Optimistic::new("Media"))])
}

/// Terminal strategy that forwards the original URL as a video descriptor.
/// Trades a possibly-wrong kind guess for a chance of success.
pub struct Optimistic {
    title: &'static str,
}

impl Optimistic {
    pub fn new(title: &'static str) -> Self {
        Self { title }
    }
}

#[async_trait]
impl Strategy for Optimistic {
    fn name(&self) -> &'static str {
        "optimistic-fallback"
    }

    async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>> {
        debug!(url, "forwarding raw URL to the downloader");
        Ok(Some(MediaDescriptor::optimistic(self.title, url)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::MediaKind;

    #[tokio::test]
    async fn test_optimistic_never_fails() {
        let strategy = Optimistic::new("Reddit Media");
        let descriptor = strategy
            .try_extract("https://reddit.com/r/x/comments/abc/")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(descriptor.kind, MediaKind::Video);
        assert_eq!(descriptor.title, "Reddit Media");
        assert_eq!(
            descriptor.media_url.as_deref(),
            Some("https://reddit.com/r/x/comments/abc/")
        );
    }

    #[tokio::test]
    async fn test_generic_resolver_claims_anything() {
        let resolver = resolver();
        let descriptor = resolver
            .resolve("https://soundcloud.com/artist/track")
            .await
            .unwrap();
        assert_eq!(descriptor.kind, MediaKind::Video);
    }
}
