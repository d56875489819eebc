//! Client configuration for reaching the sync backend.
//!
//! `ClientConfig` is local to one installation: where the backend lives, how
//! long a request may take, and where the auth flow should return to. The
//! synced preferences live in [`crate::models::SyncConfig`] instead.

use std::env;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::util::{has_http_scheme, non_blank};
use crate::{Error, Result};

const ENV_API_URL: &str = "YOMU_API_URL";
const ENV_REQUEST_TIMEOUT_SECS: &str = "YOMU_REQUEST_TIMEOUT_SECS";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3001/api/sync";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_REDIRECT_URI: &str = "http://localhost:5173/settings";

/// Installation-local client settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Base URL of the sync API, without trailing slash
    pub api_base_url: String,
    /// Upper bound for a single request, in seconds
    pub request_timeout_secs: u64,
    /// Where the backend sends the browser after the auth flow
    pub redirect_uri: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            redirect_uri: DEFAULT_REDIRECT_URI.to_string(),
        }
    }
}

impl ClientConfig {
    /// Load from a JSON file when it exists, then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            _ => Self::default(),
        };
        base.with_overrides(|key| env::var(key).ok())
    }

    /// Parse a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.normalized()
    }

    /// Persist as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(self)?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    /// Apply overrides from a key lookup (the environment in production).
    pub fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(ENV_API_URL).as_deref().and_then(non_blank) {
            self.api_base_url = url;
        }
        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT_SECS).as_deref().and_then(non_blank) {
            self.request_timeout_secs = raw.parse().map_err(|_| {
                Error::InvalidInput(format!(
                    "{ENV_REQUEST_TIMEOUT_SECS} must be a whole number of seconds"
                ))
            })?;
        }
        self.normalized()
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn normalized(mut self) -> Result<Self> {
        self.api_base_url = normalize_required_http_url(&self.api_base_url, "api_base_url")?;
        self.redirect_uri = normalize_required_http_url(&self.redirect_uri, "redirect_uri")?;
        if self.request_timeout_secs == 0 {
            return Err(Error::InvalidInput(
                "request_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(self)
    }
}

fn normalize_required_http_url(raw: &str, field: &str) -> Result<String> {
    let value = non_blank(raw)
        .ok_or_else(|| Error::InvalidInput(format!("config field '{field}' is required")))?;
    if has_http_scheme(&value) {
        Ok(value.trim_end_matches('/').to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "config field '{field}' must include http:// or https://"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(values: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = values
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| values.get(key).cloned()
    }

    #[test]
    fn overrides_replace_url_and_timeout() {
        let config = ClientConfig::default()
            .with_overrides(lookup(&[
                (ENV_API_URL, " https://sync.example.com/api/ "),
                (ENV_REQUEST_TIMEOUT_SECS, "5"),
            ]))
            .unwrap();
        assert_eq!(config.api_base_url, "https://sync.example.com/api");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn overrides_reject_non_numeric_timeout() {
        let error = ClientConfig::default()
            .with_overrides(lookup(&[(ENV_REQUEST_TIMEOUT_SECS, "soon")]))
            .unwrap_err();
        assert!(error.to_string().contains(ENV_REQUEST_TIMEOUT_SECS));
    }

    #[test]
    fn overrides_reject_url_without_scheme() {
        let error = ClientConfig::default()
            .with_overrides(lookup(&[(ENV_API_URL, "sync.example.com")]))
            .unwrap_err();
        assert!(error.to_string().contains("http://"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let config = ClientConfig {
            request_timeout_secs: 0,
            ..ClientConfig::default()
        };
        assert!(config.with_overrides(lookup(&[])).is_err());
    }

    #[test]
    fn file_round_trip_with_partial_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{"api_base_url":"https://a.example.com/"}"#).unwrap();

        let config = ClientConfig::from_file(&path).unwrap();
        assert_eq!(config.api_base_url, "https://a.example.com");
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

        let saved_path = dir.path().join("nested").join("client.json");
        config.save(&saved_path).unwrap();
        assert_eq!(ClientConfig::from_file(&saved_path).unwrap(), config);
    }

    #[test]
    fn file_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.json");
        std::fs::write(&path, r#"{"supabase_url":"https://x"}"#).unwrap();
        assert!(matches!(
            ClientConfig::from_file(&path),
            Err(Error::Serialization(_))
        ));
    }
}
