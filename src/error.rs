use thiserror::Error;

/// Coarse classification of a failed fetch, used only to pick the
/// user-facing message — never to drive retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchCause {
    Auth,
    Forbidden,
    Other,
}

impl std::fmt::Display for FetchCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Auth => "authentication required",
            Self::Forbidden => "forbidden",
            Self::Other => "download error",
        };
        f.write_str(text)
    }
}

/// Terminal failures of a single media request. Strategy-level failures
/// inside resolvers are recovered locally and never reach this type.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("every extraction strategy failed")]
    ExtractionFailed,

    #[error("download failed: {cause}")]
    Fetch {
        cause: FetchCause,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to split oversized file")]
    Split(#[source] anyhow::Error),

    #[error("artifact of {size} bytes exceeds the upload ceiling")]
    SizeExceeded { size: u64 },
}

impl PipelineError {
    pub fn fetch_other(source: anyhow::Error) -> Self {
        Self::Fetch {
            cause: FetchCause::Other,
            source,
        }
    }

    /// Message shown in the status message when the request dies.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ExtractionFailed => "❌ Failed. Content unavailable, private or deleted.",
            Self::Fetch {
                cause: FetchCause::Auth,
                ..
            } => "🔑 This content needs a logged-in session. The operator should refresh cookies.",
            Self::Fetch {
                cause: FetchCause::Forbidden,
                ..
            } => "🚫 The source refused the download (blocked or geo-restricted).",
            Self::Fetch { .. } => "❌ Error during download.",
            Self::Split(_) => "⚠️ Could not process large file.",
            Self::SizeExceeded { .. } => "⚠️ File too large to upload.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_per_cause() {
        let auth = PipelineError::Fetch {
            cause: FetchCause::Auth,
            source: anyhow::anyhow!("cookies"),
        };
        assert!(auth.user_message().contains("cookies"));

        let forbidden = PipelineError::Fetch {
            cause: FetchCause::Forbidden,
            source: anyhow::anyhow!("403"),
        };
        assert!(forbidden.user_message().contains("refused"));

        assert!(PipelineError::ExtractionFailed
            .user_message()
            .contains("unavailable"));
    }
}
