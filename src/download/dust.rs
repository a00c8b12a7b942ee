use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use log::{info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, DownloadError, StoreError};
use crate::storage::http::{encode_uri, send_checked};

pub const DEFAULT_BASE_URL: &str = "https://dust.tt";

/// Workspace used when a request names none.
pub const DEFAULT_WORKSPACE_ID: &str = "tcYbszCY4S";

const USER_AGENT: &str = concat!("flow-inspirations/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadRequest {
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
}

/// A fetched file, base64-encoded for a JSON response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedFile {
    pub success: bool,
    pub content: String,
    pub content_type: String,
    pub size: usize,
    pub url: String,
    pub workspace_id: String,
}

// ============================================================================
// Client
// ============================================================================

/// Fetches file contents from a Dust workspace on behalf of the browser.
pub struct DustClient {
    base_url: String,
    api_key: String,
    default_workspace: String,
    client: Client,
}

impl DustClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.trim().to_string(),
            default_workspace: DEFAULT_WORKSPACE_ID.to_string(),
            client,
        })
    }

    pub fn with_default_workspace(mut self, workspace_id: &str) -> Self {
        self.default_workspace = workspace_id.to_string();
        self
    }

    /// Workspace a request resolves to: its own if given, else the default.
    pub fn workspace_for<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        requested
            .map(str::trim)
            .filter(|ws| !ws.is_empty())
            .unwrap_or(self.default_workspace.as_str())
    }

    pub fn file_url(&self, workspace_id: &str, file_id: &str) -> String {
        format!(
            "{}/api/v1/w/{}/files/{}/content",
            self.base_url,
            encode_uri(workspace_id),
            encode_uri(file_id)
        )
    }

    /// Fetch one file. Non-2xx answers keep their status as `Upstream`.
    pub async fn download(
        &self,
        file_id: &str,
        workspace_id: Option<&str>,
    ) -> Result<DownloadedFile, DownloadError> {
        let file_id = file_id.trim();
        if file_id.is_empty() {
            return Err(DownloadError::MissingFileId);
        }
        if self.api_key.is_empty() {
            warn!("download requested but no API key is configured");
            return Err(DownloadError::MissingApiKey);
        }

        let workspace_id = self.workspace_for(workspace_id).to_string();
        let url = self.file_url(&workspace_id, file_id);
        info!("download: {} (workspace {})", url, workspace_id);

        let request = self.client.get(&url).bearer_auth(&self.api_key);
        let response = send_checked(request, "download file")
            .await
            .map_err(|e| match e {
                StoreError::Status { status, body, .. } => DownloadError::Upstream {
                    status,
                    body,
                    url: url.clone(),
                    workspace_id: workspace_id.clone(),
                },
                other => DownloadError::Store(other),
            })?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| StoreError::transport("download file", e))?;

        Ok(DownloadedFile {
            success: true,
            content: STANDARD.encode(&bytes),
            content_type,
            size: bytes.len(),
            url,
            workspace_id,
        })
    }
}
