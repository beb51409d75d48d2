use thiserror::Error;

use crate::types::Platform;

/// Failure fetching from the activity feed or another read-only HTTP source.
///
/// Propagates out of a worker cycle; the watermark is left untouched so the
/// next tick retries the same range.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("response from {url} is missing {field}")]
    MissingField { url: String, field: &'static str },
}

/// Failure delivering one notification to one platform.
///
/// Caught at the job boundary by the dispatch queue and logged.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("{platform} request failed: {source}")]
    Request {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },

    #[error("{platform} rejected the message with HTTP {status}: {body}")]
    Rejected {
        platform: Platform,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to build {platform} message: {source}")]
    Format {
        platform: Platform,
        #[source]
        source: FetchError,
    },

    #[error("failed to sign {platform} request: {message}")]
    Signing { platform: Platform, message: String },

    #[error("{platform} job panicked: {message}")]
    Panicked { platform: Platform, message: String },
}

/// Invalid or incomplete configuration. Fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("subscription #{index}: {field} must be provided")]
    MissingField { index: usize, field: &'static str },

    #[error("twitter: {field} must be set when any Twitter credential is set")]
    IncompleteTwitterCredentials { field: &'static str },

    #[error("no subscriptions configured")]
    NoSubscriptions,

    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("invalid URL for {key}: {source}")]
    InvalidUrl {
        key: &'static str,
        #[source]
        source: url::ParseError,
    },
}
