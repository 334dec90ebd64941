mod cobalt;
mod generic;
mod instagram;
mod reddit;
mod tiktok;
mod twitter;
pub mod types;

pub use types::{ItemKind, MediaDescriptor, MediaFormat, MediaItem, MediaKind};

use crate::download::YtDlp;
use crate::error::PipelineError;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Shared collaborators for every extraction strategy.
pub struct ExtractContext {
    pub http: reqwest::Client,
    pub mobile_user_agent: String,
    pub desktop_user_agent: String,
    pub reddit_mirrors: Vec<String>,
    pub cobalt_instances: Vec<String>,
    pub ytdlp: Arc<YtDlp>,
}

/// One data source that may turn a post URL into a descriptor.
///
/// `Ok(None)` means "this source answered but had no media"; an `Err` means
/// the source itself failed. Both advance the chain to the next strategy.
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>>;
}

/// A platform resolver: a domain filter plus an ordered strategy chain,
/// first success wins.
pub struct Resolver {
    name: &'static str,
    domains: Vec<&'static str>,
    strategies: Vec<Box<dyn Strategy>>,
}

impl Resolver {
    pub fn new(
        name: &'static str,
        domains: Vec<&'static str>,
        strategies: Vec<Box<dyn Strategy>>,
    ) -> Self {
        Self {
            name,
            domains,
            strategies,
        }
    }

    /// An empty domain list matches everything (the catch-all resolver).
    fn matches(&self, url: &str) -> bool {
        self.domains.is_empty() || self.domains.iter().any(|domain| url.contains(domain))
    }

    async fn resolve(&self, url: &str) -> Option<MediaDescriptor> {
        for strategy in &self.strategies {
            match strategy.try_extract(url).await {
                Ok(Some(descriptor)) => {
                    info!(
                        resolver = self.name,
                        strategy = strategy.name(),
                        "extraction succeeded"
                    );
                    return Some(descriptor);
                }
                Ok(None) => {
                    debug!(
                        resolver = self.name,
                        strategy = strategy.name(),
                        "no media found, trying next strategy"
                    );
                }
                Err(e) => {
                    warn!(
                        resolver = self.name,
                        strategy = strategy.name(),
                        "strategy failed: {e}"
                    );
                }
            }
        }
        None
    }
}

/// Routes a resolved URL to exactly one platform resolver. A URL never
/// falls through to another platform's resolver; only the matched chain
/// runs, and its exhaustion surfaces as `ExtractionFailed`.
pub struct Extractor {
    resolvers: Vec<Resolver>,
}

impl Extractor {
    pub fn new(context: ExtractContext) -> Self {
        let context = Arc::new(context);
        Self {
            resolvers: vec![
                twitter::resolver(context.clone()),
                reddit::resolver(context.clone()),
                instagram::resolver(context.clone()),
                tiktok::resolver(context),
                generic::resolver(),
            ],
        }
    }

    pub async fn extract(&self, url: &str) -> Result<MediaDescriptor, PipelineError> {
        for resolver in &self.resolvers {
            if resolver.matches(url) {
                info!(resolver = resolver.name, url, "extracting media");
                return resolver
                    .resolve(url)
                    .await
                    .ok_or(PipelineError::ExtractionFailed);
            }
        }
        Err(PipelineError::ExtractionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoMedia;

    #[async_trait]
    impl Strategy for NoMedia {
        fn name(&self) -> &'static str {
            "no-media"
        }

        async fn try_extract(&self, _url: &str) -> Result<Option<MediaDescriptor>> {
            Ok(None)
        }
    }

    struct Failing;

    #[async_trait]
    impl Strategy for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn try_extract(&self, _url: &str) -> Result<Option<MediaDescriptor>> {
            anyhow::bail!("boom")
        }
    }

    struct Fixed(&'static str);

    #[async_trait]
    impl Strategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn try_extract(&self, url: &str) -> Result<Option<MediaDescriptor>> {
            Ok(Some(MediaDescriptor::video(self.0, "Unknown", url, url.to_string())))
        }
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_first_success() {
        let resolver = Resolver::new(
            "test",
            vec!["example.com"],
            vec![Box::new(Failing), Box::new(NoMedia), Box::new(Fixed("won"))],
        );
        let descriptor = resolver.resolve("https://example.com/post").await.unwrap();
        assert_eq!(descriptor.title, "won");
    }

    #[tokio::test]
    async fn test_chain_exhaustion_yields_none() {
        let resolver = Resolver::new(
            "test",
            vec!["example.com"],
            vec![Box::new(Failing), Box::new(NoMedia)],
        );
        assert!(resolver.resolve("https://example.com/post").await.is_none());
    }

    #[test]
    fn test_domain_matching() {
        let resolver = Resolver::new("test", vec!["reddit.com", "redd.it"], Vec::new());
        assert!(resolver.matches("https://www.reddit.com/r/x/"));
        assert!(resolver.matches("https://redd.it/abc"));
        assert!(!resolver.matches("https://x.com/user/status/1"));

        let catch_all = Resolver::new("generic", Vec::new(), Vec::new());
        assert!(catch_all.matches("https://anything.example/whatever"));
    }
}
