use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use surfscan_core::{BackendReceipt, ScanRecord, StoredResult, ValidationError, REQUIRED_FIELDS};
use surfscan_logging::{scan_debug, scan_info};
use thiserror::Error;

pub const DEFAULT_ENDPOINT: &str = "http://localhost:8000/api";
pub const EXTENSION_VERSION_HEADER: &str = "X-Extension-Version";

/// How a record is prepared before it leaves the relay.
///
/// The two observed backends disagree, so exactly one policy is active per
/// client: `Normalize` posts to `/scan` with `"null"` substituted for absent
/// fields, `RequireFields` posts to `/process` and refuses records missing a
/// title or URL without contacting the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitPolicy {
    #[default]
    Normalize,
    RequireFields,
}

impl SubmitPolicy {
    pub fn path(self) -> &'static str {
        match self {
            SubmitPolicy::Normalize => "scan",
            SubmitPolicy::RequireFields => "process",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub endpoint: String,
    pub extension_version: String,
    pub policy: SubmitPolicy,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            extension_version: env!("CARGO_PKG_VERSION").to_string(),
            policy: SubmitPolicy::default(),
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl BackendSettings {
    fn base(&self) -> &str {
        self.endpoint.trim_end_matches('/')
    }

    pub fn download_url(&self, file_id: &str) -> String {
        format!("{}/download/{}", self.base(), file_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Transport failure; the underlying message is kept verbatim.
    #[error("{0}")]
    Network(String),
    #[error("Server responded with {0}")]
    Server(u16),
    #[error("invalid response from server: {0}")]
    Decode(String),
}

#[async_trait::async_trait]
pub trait BackendClient: Send + Sync {
    /// Sends one record. `source` is the page the record came from, or `"unknown"`.
    async fn submit(
        &self,
        record: &ScanRecord,
        source: &str,
        timestamp: &str,
    ) -> Result<BackendReceipt, BackendError>;

    /// Sends the whole result log for export.
    async fn export(
        &self,
        results: &[StoredResult],
        timestamp: &str,
    ) -> Result<BackendReceipt, BackendError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestBackendClient {
    settings: BackendSettings,
    client: reqwest::Client,
}

impl ReqwestBackendClient {
    pub fn new(settings: BackendSettings) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| BackendError::Network(err.to_string()))?;
        Ok(Self { settings, client })
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    async fn post_json(&self, path: &str, body: &Value) -> Result<BackendReceipt, BackendError> {
        let url = format!("{}/{}", self.settings.base(), path);
        scan_debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .header(EXTENSION_VERSION_HEADER, &self.settings.extension_version)
            .json(body)
            .send()
            .await
            .map_err(|err| BackendError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Server(status.as_u16()));
        }

        let value: Value = response
            .json()
            .await
            .map_err(|err| BackendError::Decode(err.to_string()))?;
        Ok(receipt_from_response(&self.settings, value))
    }
}

#[async_trait::async_trait]
impl BackendClient for ReqwestBackendClient {
    async fn submit(
        &self,
        record: &ScanRecord,
        source: &str,
        timestamp: &str,
    ) -> Result<BackendReceipt, BackendError> {
        let data = match self.settings.policy {
            SubmitPolicy::Normalize => record.normalized(),
            SubmitPolicy::RequireFields => {
                record.validate(&REQUIRED_FIELDS)?;
                record.clone()
            }
        };
        let body = json!({
            "data": data,
            "timestamp": timestamp,
            "source": source,
        });
        let receipt = self.post_json(self.settings.policy.path(), &body).await?;
        scan_info!("Record from {} accepted by backend", source);
        Ok(receipt)
    }

    async fn export(
        &self,
        results: &[StoredResult],
        timestamp: &str,
    ) -> Result<BackendReceipt, BackendError> {
        let body = json!({
            "exportAll": true,
            "data": results,
            "timestamp": timestamp,
        });
        let receipt = self.post_json("process", &body).await?;
        scan_info!(
            "Exported {} records (file id {:?})",
            results.len(),
            receipt.file_id
        );
        Ok(receipt)
    }
}

/// Builds the receipt, adding a `downloadUrl` derived from the server's `fileId`.
///
/// `/process` wraps its payload in `result`, so the id is looked up there too.
fn receipt_from_response(settings: &BackendSettings, value: Value) -> BackendReceipt {
    let mut extra = match value {
        Value::Object(map) => map,
        other => {
            let mut map = Map::new();
            map.insert("response".to_string(), other);
            map
        }
    };

    let file_id = extra
        .remove("fileId")
        .or_else(|| extra.get("result").and_then(|r| r.get("fileId")).cloned())
        .and_then(|id| match id {
            Value::String(s) => Some(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
    extra.remove("downloadUrl");

    BackendReceipt {
        download_url: file_id.as_deref().map(|id| settings.download_url(id)),
        file_id,
        extra,
    }
}
