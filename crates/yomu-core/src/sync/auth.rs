//! Backend connection status and the browser-based connect flow

use serde::{Deserialize, Serialize};

use crate::models::SyncBackendType;
use crate::{Error, Result};

/// Connection state reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub connected: bool,
    #[serde(default)]
    pub backend: SyncBackendType,
    #[serde(default)]
    pub email: Option<String>,
    /// Last sync the backend completed (Unix ms)
    #[serde(default)]
    pub last_sync: Option<i64>,
    #[serde(default)]
    pub device_id: String,
}

/// Authorization URL to open, plus the state token it will echo back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthFlow {
    #[serde(alias = "auth_url")]
    pub auth_url: String,
    pub state: String,
}

/// What the auth redirect carried back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthReturn {
    /// The backend finished the exchange itself
    Connected,
    /// The provider handed back a code the client must pass to the backend
    Callback { code: String, state: Option<String> },
}

/// Interpret the query string of the auth redirect.
///
/// Accepts a bare query (`error=...`, with or without `?`) or a full URL.
/// `error` wins over everything else; a `code` means the exchange still has
/// to be completed; anything else counts as connected.
pub fn parse_auth_return(query: &str) -> Result<AuthReturn> {
    let query = query.split_once('?').map_or(query, |(_, query)| query);
    let query = query.split_once('#').map_or(query, |(query, _)| query);

    let mut code = None;
    let mut state = None;
    let mut success = None;

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = decode_component(value)?;
        match key {
            "error" => return Err(Error::Auth(value)),
            "code" => code = Some(value),
            "state" => state = Some(value),
            "success" => success = Some(value),
            _ => {}
        }
    }

    if let Some(code) = code {
        return Ok(AuthReturn::Callback { code, state });
    }
    match success.as_deref() {
        Some("false" | "0") => Err(Error::Auth("backend reported a failed connection".to_string())),
        _ => Ok(AuthReturn::Connected),
    }
}

fn decode_component(value: &str) -> Result<String> {
    let value = value.replace('+', " ");
    urlencoding::decode(&value)
        .map(std::borrow::Cow::into_owned)
        .map_err(|error| Error::InvalidInput(format!("invalid auth redirect query: {error}")))
}
