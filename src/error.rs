use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Expected JSON from {url}, got: {content_type}\n{snippet}")]
    UnexpectedContentType {
        url: String,
        content_type: String,
        snippet: String,
    },

    #[error("malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}
