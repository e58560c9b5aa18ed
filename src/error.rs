use thiserror::Error;

/// Errors raised while reading [`AppConfig`](crate::config::AppConfig).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid number for {key}: {value}")]
    InvalidNumber { key: String, value: String },
    #[error("Invalid URL for {key}: {value}")]
    InvalidUrl { key: String, value: String },
}

/// Errors from resolving entries in the [`Container`](crate::app_system::Container).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ContainerError {
    #[error("Service not registered: {0}")]
    NotRegistered(String),
    #[error("Service {0} has a different type than requested")]
    TypeMismatch(String),
}

/// Failures below the envelope. These never leave the API service; they are
/// folded into a failed [`ApiResponse`](crate::services::ApiResponse).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),
}
