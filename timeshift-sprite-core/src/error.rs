//! Error types for the sprite thumbnail fetcher
//!
//! Internal failures carry enough detail for logging; callers of the fetcher
//! only ever see the coarse [`FetchCode`] each error maps to.

use thiserror::Error;

/// Default maximum response body size for manifest and sprite sheet fetches (16 MB).
pub const MAX_RESPONSE_SIZE: usize = 16 * 1024 * 1024;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid parameter: {0}")]
    InvalidParam(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP error {status} for {url}")]
    Http { status: reqwest::StatusCode, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Response too large ({size} bytes, max {limit})")]
    ResponseTooLarge { size: u64, limit: usize },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Result code delivered through [`crate::FetchCallback`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum FetchCode {
    Success = 0,
    ParamInvalid = -1,
    NetworkErr = -2,
    ServerError = -3,
}

impl FetchCode {
    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self as i32
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

impl std::fmt::Display for FetchCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Success => "SUCCESS",
            Self::ParamInvalid => "PARAM_INVALID",
            Self::NetworkErr => "NETWORK_ERR",
            Self::ServerError => "SERVER_ERROR",
        };
        write!(f, "{name}({})", self.as_i32())
    }
}

impl Error {
    /// Public result code for this failure.
    ///
    /// Anything that happened after the server answered is a server error.
    #[must_use]
    pub const fn code(&self) -> FetchCode {
        match self {
            Self::InvalidParam(_) => FetchCode::ParamInvalid,
            Self::Network(_) => FetchCode::NetworkErr,
            Self::Http { .. }
            | Self::Parse(_)
            | Self::Decode(_)
            | Self::ResponseTooLarge { .. }
            | Self::Config(_)
            | Self::Runtime(_) => FetchCode::ServerError,
        }
    }
}

/// Check HTTP response status before reading the body.
pub fn check_response(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if !status.is_success() {
        return Err(Error::Http {
            status,
            url: resp.url().to_string(),
        });
    }
    Ok(resp)
}

/// Read a response body, refusing anything larger than `limit` bytes.
///
/// Checks the `Content-Length` hint first, then the actual body length.
pub async fn bytes_with_limit(response: reqwest::Response, limit: usize) -> Result<bytes::Bytes> {
    if let Some(cl) = response.content_length() {
        if cl > limit as u64 {
            return Err(Error::ResponseTooLarge { size: cl, limit });
        }
    }
    let bytes = response.bytes().await?;
    if bytes.len() > limit {
        return Err(Error::ResponseTooLarge {
            size: bytes.len() as u64,
            limit,
        });
    }
    Ok(bytes)
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidParam(format!("malformed url: {err}"))
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Self::Decode(err.to_string())
    }
}
