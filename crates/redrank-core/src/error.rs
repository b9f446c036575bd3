use thiserror::Error;
use uuid::Uuid;

/// Failure taxonomy for one keyword's synchronization pass.
///
/// Enrichment failures are deliberately absent: the enrichment seam is
/// infallible (`Option`) and can never abort a pass.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("missing credentials for {provider}")]
    Configuration { provider: String },

    #[error("search provider failure: {message}")]
    Provider {
        status: Option<u16>,
        message: String,
    },

    #[error("storage error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("keyword not found: {keyword_id}")]
    KeywordNotFound { keyword_id: Uuid },
}

impl SyncError {
    pub fn configuration(provider: impl Into<String>) -> Self {
        Self::Configuration {
            provider: provider.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            status: None,
            message: message.into(),
        }
    }

    pub fn provider_status(status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            status: Some(status),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_carries_status_in_message_free_form() {
        let err = SyncError::provider_status(502, "task failed upstream");
        match err {
            SyncError::Provider { status, message } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "task failed upstream");
            }
            other => panic!("unexpected variant: {other}"),
        }
    }

    #[test]
    fn configuration_error_names_the_provider() {
        let err = SyncError::configuration("dataforseo");
        assert_eq!(err.to_string(), "missing credentials for dataforseo");
    }
}
