use thiserror::Error;

/// Fatal setup problems. These abort a request before any tier runs.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing SUPABASE_URL or SERVICE key")]
    MissingConnection,

    #[error("alias table could not be loaded: {0}")]
    AliasFile(String),

    #[error("invalid HTTP client settings: {0}")]
    HttpClient(String),
}

/// Failure talking to the catalog, object storage or search API.
///
/// The resolution tiers log these and carry on with an empty result; only the
/// ingestion path lets them escape.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{context}: request failed: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{context}: upstream returned {status}: {body}")]
    Status {
        context: String,
        status: u16,
        body: String,
    },

    #[error("{context}: unexpected response: {detail}")]
    Malformed { context: String, detail: String },
}

impl StoreError {
    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        StoreError::Transport {
            context: context.into(),
            source,
        }
    }

    pub fn malformed(context: impl Into<String>, detail: impl ToString) -> Self {
        StoreError::Malformed {
            context: context.into(),
            detail: detail.to_string(),
        }
    }
}

/// Batch upload failures. Unlike resolution, ingestion does not degrade.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("appName and flowName required")]
    MissingNames,

    #[error("Attach files[] images")]
    NoFiles,

    #[error("could not read {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// File download failures. Upstream statuses are passed through.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("fileId is required")]
    MissingFileId,

    #[error("DUST_API_KEY not configured")]
    MissingApiKey,

    #[error("Dust API error: {status} - {body}")]
    Upstream {
        status: u16,
        body: String,
        url: String,
        workspace_id: String,
    },

    #[error("Internal server error: {0}")]
    Store(#[from] StoreError),
}
