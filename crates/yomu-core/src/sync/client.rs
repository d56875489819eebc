//! Sync backend client

use reqwest::{header, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::auth::{AuthFlow, AuthStatus};
use crate::config::ClientConfig;
use crate::models::{deserialize_versioned, ConflictInfo, SyncConfig, SyncPayload};
use crate::util::body_excerpt;
use crate::{Error, Result};

/// Merged state returned by the backend.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    #[serde(deserialize_with = "deserialize_versioned")]
    pub payload: SyncPayload,
    pub sync_timestamp: i64,
    /// Book files the backend wants from this device
    #[serde(default)]
    pub files_to_upload: Vec<String>,
    /// Book files this device should fetch
    #[serde(default)]
    pub files_to_download: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<ConflictInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushOutcome {
    pub success: bool,
    #[serde(default)]
    pub etag: Option<String>,
    pub sync_timestamp: i64,
}

/// Operations offered by the sync backend.
///
/// Every call is one round-trip and is never retried here.
#[allow(async_fn_in_trait)]
pub trait SyncRemote {
    /// Upload the local payload and receive the reconciled state.
    async fn merge(&self, payload: &SyncPayload, config: Option<&SyncConfig>)
        -> Result<MergeOutcome>;

    /// Fetch the remote payload without uploading, `None` when nothing is stored yet.
    async fn pull(&self) -> Result<Option<SyncPayload>>;

    /// Replace the remote payload. `etag` guards against concurrent writers.
    async fn push(&self, payload: &SyncPayload, etag: Option<&str>) -> Result<PushOutcome>;

    async fn status(&self) -> Result<AuthStatus>;

    async fn get_config(&self) -> Result<SyncConfig>;

    async fn set_config(&self, config: &SyncConfig) -> Result<SyncConfig>;

    async fn start_auth(&self, redirect_uri: &str) -> Result<AuthFlow>;

    /// Exchange a provider code for a backend connection.
    async fn complete_auth(&self, code: &str, state: Option<&str>, redirect_uri: &str)
        -> Result<()>;

    async fn disconnect(&self) -> Result<()>;

    async fn upload_file(&self, file_id: &str, bytes: Vec<u8>) -> Result<()>;

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>>;
}

/// `SyncRemote` over the JSON HTTP API.
#[derive(Clone)]
pub struct HttpSyncClient {
    base_url: String,
    client: reqwest::Client,
}

impl HttpSyncClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let error = parse_api_error(status, &body);
        tracing::warn!(status = status.as_u16(), "Sync API request failed: {error}");
        Err(error)
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self
            .send(request.header(header::ACCEPT, "application/json"))
            .await?;
        Ok(response.json::<T>().await?)
    }
}

#[derive(Serialize)]
struct MergeRequest<'a> {
    payload: &'a SyncPayload,
    #[serde(skip_serializing_if = "Option::is_none")]
    config: Option<&'a SyncConfig>,
}

#[derive(Serialize)]
struct PushRequest<'a> {
    payload: &'a SyncPayload,
    etag: Option<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StartAuthRequest<'a> {
    redirect_uri: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CompleteAuthRequest<'a> {
    code: &'a str,
    state: Option<&'a str>,
    redirect_uri: &'a str,
}

#[derive(Deserialize)]
struct AckResponse {
    success: bool,
    #[serde(default)]
    message: String,
}

impl AckResponse {
    fn into_result(self) -> Result<()> {
        if self.success {
            tracing::debug!("{}", self.message);
            Ok(())
        } else {
            Err(Error::Auth(self.message))
        }
    }
}

impl SyncRemote for HttpSyncClient {
    async fn merge(
        &self,
        payload: &SyncPayload,
        config: Option<&SyncConfig>,
    ) -> Result<MergeOutcome> {
        self.send_json(
            self.client
                .post(self.url("/merge"))
                .json(&MergeRequest { payload, config }),
        )
        .await
    }

    async fn pull(&self) -> Result<Option<SyncPayload>> {
        let value: Option<serde_json::Value> =
            self.send_json(self.client.get(self.url("/pull"))).await?;
        value
            .filter(|value| !value.is_null())
            .map(SyncPayload::from_value)
            .transpose()
    }

    async fn push(&self, payload: &SyncPayload, etag: Option<&str>) -> Result<PushOutcome> {
        self.send_json(
            self.client
                .post(self.url("/push"))
                .json(&PushRequest { payload, etag }),
        )
        .await
    }

    async fn status(&self) -> Result<AuthStatus> {
        self.send_json(self.client.get(self.url("/auth/status")))
            .await
    }

    async fn get_config(&self) -> Result<SyncConfig> {
        self.send_json(self.client.get(self.url("/config"))).await
    }

    async fn set_config(&self, config: &SyncConfig) -> Result<SyncConfig> {
        self.send_json(self.client.put(self.url("/config")).json(config))
            .await
    }

    async fn start_auth(&self, redirect_uri: &str) -> Result<AuthFlow> {
        self.send_json(
            self.client
                .post(self.url("/auth/google/start"))
                .json(&StartAuthRequest { redirect_uri }),
        )
        .await
    }

    async fn complete_auth(
        &self,
        code: &str,
        state: Option<&str>,
        redirect_uri: &str,
    ) -> Result<()> {
        let ack: AckResponse = self
            .send_json(
                self.client
                    .post(self.url("/auth/google/callback"))
                    .json(&CompleteAuthRequest {
                        code,
                        state,
                        redirect_uri,
                    }),
            )
            .await?;
        ack.into_result()
    }

    async fn disconnect(&self) -> Result<()> {
        let ack: AckResponse = self
            .send_json(self.client.post(self.url("/auth/disconnect")))
            .await?;
        ack.into_result()
    }

    async fn upload_file(&self, file_id: &str, bytes: Vec<u8>) -> Result<()> {
        self.send(
            self.client
                .post(self.file_url(file_id))
                .header(header::CONTENT_TYPE, "application/octet-stream")
                .body(bytes),
        )
        .await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>> {
        let response = self.send(self.client.get(self.file_url(file_id))).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

impl HttpSyncClient {
    fn file_url(&self, file_id: &str) -> String {
        self.url(&format!("/files/{}", urlencoding::encode(file_id)))
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> Error {
    let status_code = status.as_u16();
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return Error::Api {
                status: status_code,
                message: message.trim().to_string(),
            };
        }
    }

    let trimmed = body_excerpt(body);
    let message = if trimmed.is_empty() {
        status
            .canonical_reason()
            .map_or_else(|| format!("HTTP {status_code}"), ToString::to_string)
    } else {
        trimmed
    };
    Error::Api {
        status: status_code,
        message,
    }
}
