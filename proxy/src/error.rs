use common::{BitrateError, ThrottleError};
use hyper::StatusCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Hyper(#[from] hyper::Error),

    #[error("HTTP message error: {0}")]
    Http(#[from] hyper::http::Error),

    #[error("Upstream error: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Bitrate error: {0}")]
    Bitrate(#[from] BitrateError),

    #[error("Throttle error: {0}")]
    Throttle(#[from] ThrottleError),

    #[error("Control request rejected ({status}): {message}")]
    Rejected { status: StatusCode, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ProxyError>;
