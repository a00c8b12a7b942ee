use std::time::Duration;

use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use reqwest::{Client, RequestBuilder, Response};

use crate::error::{ConfigError, StoreError};

/// Characters `encodeURI` escapes: reserved URI characters (`/`, `?`, `#`, ...) pass through.
const URI: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'\\')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Percent-encode a path the way browsers encode a full URI.
pub fn encode_uri(s: &str) -> String {
    utf8_percent_encode(s, URI).to_string()
}

/// Undo any percent-encoding in a stored object path.
///
/// Catalog rows may hold already-escaped paths; signing an escaped path would
/// encode it twice. Invalid UTF-8 after decoding leaves the input as is.
pub fn decode_path(s: &str) -> String {
    match percent_decode_str(s).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => s.to_string(),
    }
}

/// Connection to the hosted backend shared by the catalog and storage clients.
#[derive(Debug, Clone)]
pub struct Endpoint {
    pub base_url: String,
    /// Privileged key used for storage and catalog writes.
    pub service_key: String,
    /// Key used for catalog reads (anon key when available).
    pub read_key: String,
    pub client: Client,
}

impl Endpoint {
    pub fn new(
        base_url: &str,
        service_key: &str,
        read_key: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
            read_key: read_key.to_string(),
            client,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn with_service_auth(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    pub fn with_read_auth(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.read_key)
            .header("apikey", &self.read_key)
    }
}

/// Send once and turn non-2xx statuses into `StoreError::Status`.
pub async fn send_checked(request: RequestBuilder, context: &str) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::transport(context, e))?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(StoreError::Status {
        context: context.to_string(),
        status: status.as_u16(),
        body,
    })
}
