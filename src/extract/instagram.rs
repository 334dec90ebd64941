use super::cobalt::CobaltApi;
use super::{ExtractContext, Resolver};
use std::sync::Arc;

/// Instagram blocks both anonymous scraping and the opaque tool, so the
/// whole chain is the Cobalt API with h264/720 hints.
pub fn resolver(context: Arc<ExtractContext>) -> Resolver {
    Resolver::new(
        "instagram",
        vec!["instagram.com"],
        vec![Box::new(CobaltApi::new(
            context,
            "Instagram Media",
            true,
            false,
        ))],
    )
}
