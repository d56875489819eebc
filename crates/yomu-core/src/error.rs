//! Error types for yomu-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using yomu-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse failure classes reported across the sync boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    /// Transport failure or non-2xx response from the sync backend
    Network,
    /// Backend not connected or credentials rejected
    Auth,
    /// Local store read/write or record decoding failure
    Storage,
    /// Payload produced by a newer client than this one
    SchemaVersionMismatch,
    /// Caller supplied an invalid value
    InvalidInput,
}

/// Errors that can occur in yomu-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Sync backend answered with a non-success status
    #[error("Sync API error: {message} ({status})")]
    Api { status: u16, message: String },

    /// Sync backend is not connected to a storage provider
    #[error("Sync backend is not connected")]
    NotAuthenticated,

    /// OAuth-style connect flow failed
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Local store error
    #[error("Storage error: {0}")]
    Storage(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Blob text was not valid base64
    #[error("Invalid base64 blob: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Payload schema newer than this build understands
    #[error("Unsupported sync payload schema version {found} (supported up to {supported})")]
    SchemaVersion { found: u32, supported: u32 },
}

impl Error {
    /// Classify this error for callers that only care about the failure class.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { status, .. } if *status == 401 || *status == 403 => ErrorKind::Auth,
            Self::Http(_) | Self::Api { .. } => ErrorKind::Network,
            Self::NotAuthenticated | Self::Auth(_) => ErrorKind::Auth,
            Self::Storage(_)
            | Self::LibSql(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Encoding(_) => ErrorKind::Storage,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::SchemaVersion { .. } => ErrorKind::SchemaVersionMismatch,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_auth_statuses_map_to_auth_kind() {
        let unauthorized = Error::Api {
            status: 401,
            message: "token expired".to_string(),
        };
        assert_eq!(unauthorized.kind(), ErrorKind::Auth);

        let bad_gateway = Error::Api {
            status: 502,
            message: "upstream".to_string(),
        };
        assert_eq!(bad_gateway.kind(), ErrorKind::Network);
    }

    #[test]
    fn schema_version_error_mentions_both_versions() {
        let error = Error::SchemaVersion {
            found: 9,
            supported: 2,
        };
        assert_eq!(error.kind(), ErrorKind::SchemaVersionMismatch);
        let message = error.to_string();
        assert!(message.contains('9'));
        assert!(message.contains('2'));
    }
}
