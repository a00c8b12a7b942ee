use std::cmp::Ordering;

use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::resolve::model::StorageObject;
use crate::storage::http::{Endpoint, encode_uri, send_checked};

/// Extensions the listing tier treats as screenshots.
pub const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "webp"];

/// Default lifetime of a signed URL.
pub const DEFAULT_SIGN_TTL_SECS: u64 = 60 * 60;

// ============================================================================
// ObjectStore trait
// ============================================================================

/// Object storage bucket holding the raw screenshots.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket name; also the marker used to spot internal storage URLs.
    fn bucket(&self) -> &str;

    /// Objects directly under `prefix`. Empty on any failure.
    async fn list(&self, prefix: &str) -> Vec<StorageObject>;

    /// Time-limited read URL for one already-decoded object path.
    async fn sign(&self, object_path: &str, ttl_secs: u64) -> Option<String>;

    /// Unsigned URL; only renders if the bucket is public.
    fn public_url(&self, object_path: &str) -> String;

    /// Store `bytes` at `object_path`, returning its public URL.
    async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError>;
}

// ============================================================================
// Filtering and ordering
// ============================================================================

pub fn is_image(name: &str) -> bool {
    match name.rsplit_once('.') {
        Some((_, ext)) => IMAGE_EXTENSIONS
            .iter()
            .any(|known| ext.eq_ignore_ascii_case(known)),
        None => false,
    }
}

pub fn content_type_for(name: &str) -> &'static str {
    let ext = name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

/// First run of ASCII digits, without leading zeros.
fn first_number(name: &str) -> Option<&str> {
    let start = name.find(|c: char| c.is_ascii_digit())?;
    let rest = &name[start..];
    let end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    Some(rest[..end].trim_start_matches('0'))
}

/// Numeric-aware name ordering: `2.png` before `10.png`.
///
/// Compares the first digit run of each name by value; when either name has
/// no digits or the values tie, falls back to a case-insensitive comparison
/// of the whole name. That fallback approximates a locale-aware collation
/// (`localeCompare`): ASCII names order the same, accented letters sort by
/// code point instead of next to their base letter.
pub fn compare_numeric(a: &str, b: &str) -> Ordering {
    if let (Some(x), Some(y)) = (first_number(a), first_number(b)) {
        // Digit strings without leading zeros: longer means larger.
        let by_value = x.len().cmp(&y.len()).then_with(|| x.cmp(y));
        if by_value != Ordering::Equal {
            return by_value;
        }
    }

    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Keep only images and order them for display.
pub fn sort_images(objects: Vec<StorageObject>) -> Vec<StorageObject> {
    let mut images: Vec<StorageObject> = objects.into_iter().filter(|o| is_image(&o.name)).collect();
    images.sort_by(|a, b| compare_numeric(&a.name, &b.name));
    images
}

// ============================================================================
// Hosted storage implementation
// ============================================================================

pub struct BucketStorage {
    endpoint: Endpoint,
    bucket: String,
    list_limit: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListRequest<'a> {
    prefix: &'a str,
    limit: usize,
    offset: usize,
    sort_by: SortBy,
}

#[derive(Serialize)]
struct SortBy {
    column: &'static str,
    order: &'static str,
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignRequest {
    expires_in: u64,
}

#[derive(Deserialize)]
struct SignResponse {
    #[serde(rename = "signedURL", alias = "signedUrl")]
    signed_url: Option<String>,
}

impl BucketStorage {
    pub fn new(endpoint: Endpoint, bucket: &str, list_limit: usize) -> Self {
        Self {
            endpoint,
            bucket: bucket.to_string(),
            list_limit,
        }
    }

    async fn try_list(&self, prefix: &str) -> Result<Vec<ListedObject>, StoreError> {
        let request = self
            .endpoint
            .client
            .post(
                self.endpoint
                    .url(&format!("/storage/v1/object/list/{}", self.bucket)),
            )
            .json(&ListRequest {
                prefix,
                limit: self.list_limit,
                offset: 0,
                sort_by: SortBy {
                    column: "name",
                    order: "asc",
                },
            });

        let response = send_checked(self.endpoint.with_service_auth(request), "list objects").await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::malformed("list objects", e))
    }

    async fn try_sign(&self, object_path: &str, ttl_secs: u64) -> Result<Option<String>, StoreError> {
        let request = self
            .endpoint
            .client
            .post(self.endpoint.url(&format!(
                "/storage/v1/object/sign/{}/{}",
                self.bucket,
                encode_uri(object_path)
            )))
            .json(&SignRequest {
                expires_in: ttl_secs,
            });

        let response = send_checked(self.endpoint.with_service_auth(request), "sign object").await?;
        let signed: SignResponse = response
            .json()
            .await
            .map_err(|e| StoreError::malformed("sign object", e))?;

        Ok(signed
            .signed_url
            .map(|relative| absolute_signed_url(&self.endpoint.base_url, &relative)))
    }
}

/// Make a sign-endpoint answer absolute.
///
/// The endpoint answers with a full URL, a host-relative `/storage/...` path,
/// or a path relative to `/storage/v1`.
pub fn absolute_signed_url(base_url: &str, signed: &str) -> String {
    let base = base_url.trim_end_matches('/');
    if signed.starts_with("http://") || signed.starts_with("https://") {
        signed.to_string()
    } else if signed.starts_with("/storage/") {
        format!("{}{}", base, signed)
    } else if signed.starts_with('/') {
        format!("{}/storage/v1{}", base, signed)
    } else {
        format!("{}/storage/v1/{}", base, signed)
    }
}

#[async_trait]
impl ObjectStore for BucketStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn list(&self, prefix: &str) -> Vec<StorageObject> {
        match self.try_list(prefix).await {
            Ok(listed) => {
                debug!("storage: {} objects under '{}'", listed.len(), prefix);
                listed
                    .into_iter()
                    .map(|o| StorageObject {
                        path: format!("{}/{}", prefix, o.name),
                        name: o.name,
                    })
                    .collect()
            }
            Err(e) => {
                warn!("storage listing unavailable, treating as empty: {}", e);
                vec![]
            }
        }
    }

    async fn sign(&self, object_path: &str, ttl_secs: u64) -> Option<String> {
        match self.try_sign(object_path, ttl_secs).await {
            Ok(url) => url,
            Err(e) => {
                warn!("signing '{}' failed: {}", object_path, e);
                None
            }
        }
    }

    fn public_url(&self, object_path: &str) -> String {
        self.endpoint.url(&format!(
            "/storage/v1/object/public/{}/{}",
            self.bucket,
            encode_uri(object_path)
        ))
    }

    async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        let request = self
            .endpoint
            .client
            .post(self.endpoint.url(&format!(
                "/storage/v1/object/{}/{}",
                self.bucket,
                encode_uri(object_path)
            )))
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(bytes);

        send_checked(self.endpoint.with_service_auth(request), "upload object").await?;
        Ok(self.public_url(object_path))
    }
}
