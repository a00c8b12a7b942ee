use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Multipart, State, multipart::MultipartRejection},
    http::{HeaderValue, StatusCode, header},
    middleware::map_response,
    response::{IntoResponse, Response},
    routing::post,
};
use log::{error, info};
use serde::Serialize;
use thiserror::Error;

use crate::download::dust::{DownloadRequest, DownloadedFile, DustClient};
use crate::error::{ConfigError, DownloadError, IngestError};
use crate::resolve::cascade::Resolver;
use crate::resolve::ingest::{IngestReport, UploadFile, ingest_batch};
use crate::resolve::model::{ResolveRequest, ResolveResponse};

const UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

// ============================================================================
// Errors
// ============================================================================

/// Request-level failures, rendered as `{"ok": false, "error": "..."}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    ok: bool,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    workspace_id: Option<String>,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Ingest(IngestError::MissingNames | IngestError::NoFiles) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Ingest(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Download(DownloadError::MissingFileId) => StatusCode::BAD_REQUEST,
            ApiError::Download(DownloadError::Upstream { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Download(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("request failed: {}", self);
        }
        let (url, workspace_id) = match &self {
            ApiError::Download(DownloadError::Upstream {
                url, workspace_id, ..
            }) => (Some(url.clone()), Some(workspace_id.clone())),
            _ => (None, None),
        };
        let body = ErrorBody {
            ok: false,
            error: self.to_string(),
            url,
            workspace_id,
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// State and router
// ============================================================================

/// Shared handler state. A missing configuration is kept so every request
/// can report it instead of the process refusing to start.
#[derive(Clone)]
pub struct AppState {
    resolver: Result<Arc<Resolver>, ConfigError>,
    downloader: Option<Arc<DustClient>>,
}

impl AppState {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver: Ok(Arc::new(resolver)),
            downloader: None,
        }
    }

    pub fn misconfigured(err: ConfigError) -> Self {
        Self {
            resolver: Err(err),
            downloader: None,
        }
    }

    pub fn with_downloader(mut self, downloader: DustClient) -> Self {
        self.downloader = Some(Arc::new(downloader));
        self
    }

    fn resolver(&self) -> Result<&Resolver, ApiError> {
        match &self.resolver {
            Ok(resolver) => Ok(resolver.as_ref()),
            Err(e) => Err(ApiError::Config(e.clone())),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(resolve_handler).options(preflight))
        .route("/inspirations", post(resolve_handler).options(preflight))
        .route(
            "/upload",
            post(upload_handler)
                .options(preflight)
                .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT)),
        )
        .route("/download", post(download_handler).options(preflight))
        .layer(map_response(add_cors))
        .with_state(state)
}

/// Bind and serve until Ctrl-C.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn add_cors(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, x-client-info, apikey, content-type"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    response
}

pub async fn preflight() -> &'static str {
    "ok"
}

/// Empty bodies count as an empty recommendation; anything else must be JSON.
pub fn parse_request(body: &[u8]) -> Result<ResolveRequest, ApiError> {
    parse_json(body)
}

fn parse_json<T>(body: &[u8]) -> Result<T, ApiError>
where
    T: Default + serde::de::DeserializeOwned,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("invalid request body: {}", e)))
}

pub async fn resolve_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ResolveResponse>, ApiError> {
    let resolver = state.resolver()?;
    let request = parse_request(&body)?;
    let resolution = resolver.resolve(&request.recommendation).await;
    Ok(Json(resolution.into()))
}

pub async fn upload_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<IngestReport>, ApiError> {
    let resolver = state.resolver()?;
    let mut multipart =
        multipart.map_err(|_| ApiError::BadRequest("Use multipart/form-data".to_string()))?;

    let mut app = String::new();
    let mut flow = String::new();
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "appName" => app = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?,
            "flowName" => flow = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?,
            "files[]" => {
                let Some(file_name) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                files.push(UploadFile {
                    name: file_name,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let report = ingest_batch(
        resolver.catalog().as_ref(),
        resolver.objects().as_ref(),
        &app,
        &flow,
        files,
    )
    .await?;
    Ok(Json(report))
}

/// Proxy one workspace file as base64 JSON.
pub async fn download_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DownloadedFile>, ApiError> {
    let request: DownloadRequest = parse_json(&body)?;
    let file_id = request.file_id.unwrap_or_default();
    if file_id.trim().is_empty() {
        return Err(DownloadError::MissingFileId.into());
    }

    let downloader = state
        .downloader
        .as_deref()
        .ok_or(DownloadError::MissingApiKey)?;
    let file = downloader
        .download(&file_id, request.workspace_id.as_deref())
        .await?;
    Ok(Json(file))
}
