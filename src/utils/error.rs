use crate::domain::model::Provider;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeoError {
    #[error("{provider} request failed: {message}")]
    Transport { provider: Provider, message: String },

    #[error("{provider} resource not found: {url}")]
    NotFound { provider: Provider, url: String },

    #[error("{provider} request timed out after {timeout:?}")]
    Timeout { provider: Provider, timeout: Duration },

    #[error("Malformed {provider} response: {reason}")]
    MalformedResponse { provider: Provider, reason: String },

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

/// 錯誤分類，供呈現層區分處理
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Transport,
    MalformedResponse,
    Other,
}

impl GeoError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeoError::NotFound { .. } => ErrorKind::NotFound,
            GeoError::Transport { .. } | GeoError::Timeout { .. } => ErrorKind::Transport,
            GeoError::MalformedResponse { .. } | GeoError::Xml(_) => ErrorKind::MalformedResponse,
            _ => ErrorKind::Other,
        }
    }

    pub fn malformed(provider: Provider, reason: impl Into<String>) -> Self {
        GeoError::MalformedResponse {
            provider,
            reason: reason.into(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.kind() {
            ErrorKind::NotFound => format!("Nothing was found upstream: {}", self),
            ErrorKind::Transport => format!("Could not reach the data provider: {}", self),
            ErrorKind::MalformedResponse => {
                format!("The data provider returned unexpected data: {}", self)
            }
            ErrorKind::Other => self.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            GeoError::NotFound { .. } => "Check the entity id and the endpoint paths",
            GeoError::Transport { .. } => "Check network connectivity and the endpoint URL",
            GeoError::Timeout { .. } => "Increase --request-timeout or try again later",
            GeoError::MalformedResponse { .. } | GeoError::Xml(_) => {
                "The provider response format may have changed; run with --verbose for details"
            }
            GeoError::ConfigError { .. }
            | GeoError::InvalidConfigValueError { .. }
            | GeoError::MissingConfigError { .. } => "Fix the configuration and retry",
            GeoError::Serialization(_) | GeoError::Io(_) => "Retry; if it persists, report a bug",
        }
    }
}

pub type Result<T> = std::result::Result<T, GeoError>;
