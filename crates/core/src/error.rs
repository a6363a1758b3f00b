use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid segmenter options: {0}")]
    InvalidSegmenterOptions(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("collaborator call failed: {0}")]
    Collaborator(#[from] QueryError),
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{service} is not configured: {remedy}")]
    NotConfigured { service: String, remedy: String },

    #[error("request failed: {0}")]
    Request(String),
}

impl QueryError {
    pub fn not_configured(service: impl Into<String>, remedy: impl Into<String>) -> Self {
        Self::NotConfigured {
            service: service.into(),
            remedy: remedy.into(),
        }
    }
}

pub type Result<T, E = QueryError> = std::result::Result<T, E>;
