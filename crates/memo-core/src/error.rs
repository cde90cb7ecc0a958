/// Core error types for the memo service.
#[derive(Debug, thiserror::Error)]
pub enum MemoError {
    #[error("{0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("The model returned an empty reply")]
    EmptyReply,

    #[error("Could not extract any tags from the model reply")]
    NoTagsExtracted,

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Memo not found: {0}")]
    NotFound(String),
}

impl MemoError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        MemoError::Validation(message.into())
    }

    /// True when the failure was caused by the caller's input.
    pub fn is_validation(&self) -> bool {
        matches!(self, MemoError::Validation(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("No API key configured for the suggestion model")]
    NoApiKey,
}

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),
}

// Request URLs may carry credentials; they never end up in an error message.
impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::Http(err.without_url())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    #[error("Store rejected request ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode stored data: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<reqwest::Error> for PersistenceError {
    fn from(err: reqwest::Error) -> Self {
        PersistenceError::Http(err.without_url())
    }
}

impl PersistenceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PersistenceError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MemoError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            MemoError::validation("content is required").to_string(),
            "content is required"
        );
        assert_eq!(
            MemoError::from(ConfigError::NoApiKey).to_string(),
            "Configuration error: No API key configured for the suggestion model"
        );
        assert_eq!(
            MemoError::NotFound("m1".into()).to_string(),
            "Memo not found: m1"
        );
    }

    #[test]
    fn test_persistence_not_found() {
        assert!(PersistenceError::NotFound("x".into()).is_not_found());
        assert!(!PersistenceError::Other("boom".into()).is_not_found());
        assert!(MemoError::validation("bad").is_validation());
        assert!(!MemoError::EmptyReply.is_validation());
    }

    #[tokio::test]
    async fn test_transport_errors_drop_url() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = reqwest::get(format!("http://{}/v1/models?key=SECRET", addr))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SECRET"));

        let provider = MemoError::from(ProviderError::from(err)).to_string();
        assert!(provider.starts_with("Provider error: HTTP error"));
        assert!(!provider.contains("SECRET"));

        let err = reqwest::get(format!("http://{}/rest/v1/memos?apikey=SECRET", addr))
            .await
            .unwrap_err();
        assert!(!PersistenceError::from(err).to_string().contains("SECRET"));
    }
}
