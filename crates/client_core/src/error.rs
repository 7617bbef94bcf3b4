use shared::{
    error::{ApiError, ErrorCode},
    ContextError, DomainError,
};
use thiserror::Error;

pub type Result<T, E = DspError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DspError {
    #[error("request to DSP server failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("DSP API error: {0}")]
    Api(#[from] ApiError),
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid server URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("server answer lacks \"{0}\"")]
    MissingField(String),
    #[error("{0}")]
    Validation(String),
    #[error("not supported: {0}")]
    Unsupported(String),
    #[error(transparent)]
    Context(#[from] ContextError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("{context}: {source}")]
    Operation {
        context: String,
        #[source]
        source: Box<DspError>,
    },
    #[error("{context}: gave up after {attempts} attempts: {source}")]
    RetryExhausted {
        context: String,
        attempts: u32,
        #[source]
        source: Box<DspError>,
    },
}

impl DspError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField(field.into())
    }

    /// Connection failures, timeouts, rate limiting and 5xx answers.
    pub fn is_transient(&self) -> bool {
        match self {
            DspError::Http(err) => err.is_connect() || err.is_timeout() || err.is_request(),
            DspError::Api(err) => err.is_transient(),
            _ => false,
        }
    }

    pub fn api_code(&self) -> Option<ErrorCode> {
        match self {
            DspError::Api(err) => Some(err.code),
            DspError::Operation { source, .. } | DspError::RetryExhausted { source, .. } => {
                source.api_code()
            }
            _ => None,
        }
    }
}
