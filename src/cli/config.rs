use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::download::dust::{DEFAULT_BASE_URL, DEFAULT_WORKSPACE_ID, DustClient};
use crate::error::ConfigError;
use crate::resolve::cascade::Resolver;
use crate::search::perplexity::PerplexityBackend;
use crate::storage::catalog::RestCatalog;
use crate::storage::http::Endpoint;
use crate::storage::objects::BucketStorage;
use crate::text::alias::AliasTable;
use crate::trace::logger::TraceLogger;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "flow-inspirations",
    version,
    about = "Resolve app/flow recommendations to ordered screenshot sets"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to config file (default: flow-inspirations.yaml in current dir)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Alias table YAML, overriding the built-in one
    #[arg(long, global = true)]
    pub aliases: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Serve the HTTP API
    Serve {
        /// Address to listen on (default from config, then 127.0.0.1:8787)
        #[arg(long)]
        bind: Option<String>,
    },

    /// Resolve one recommendation and print the JSON response
    Resolve {
        #[arg(long)]
        app: Option<String>,

        #[arg(long)]
        flow: Option<String>,

        /// Free text, e.g. "duolingo onboarding"
        #[arg(long)]
        text: Option<String>,
    },

    /// Upload a directory of screenshots as one flow
    Ingest {
        #[arg(long)]
        app: String,

        #[arg(long)]
        flow: String,

        /// Directory holding the images
        dir: String,
    },
}

// ============================================================================
// Config File Model (optional YAML)
// ============================================================================

/// Optional YAML config file: `flow-inspirations.yaml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub aliases: AliasConfig,
    #[serde(default)]
    pub trace: TraceConfig,
    #[serde(default)]
    pub download: DownloadConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_sign_ttl")]
    pub sign_ttl_secs: u64,

    #[serde(default = "default_list_limit")]
    pub list_limit: usize,

    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
            sign_ttl_secs: default_sign_ttl(),
            list_limit: default_list_limit(),
            http_timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_search_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            model: default_search_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_results: default_max_results(),
            http_timeout_secs: default_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AliasConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TraceConfig {
    /// JSONL file receiving one event per cascade tier
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    #[serde(default = "default_download_base")]
    pub base_url: String,

    #[serde(default = "default_workspace")]
    pub default_workspace: String,

    #[serde(default = "default_timeout")]
    pub http_timeout_secs: u64,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            base_url: default_download_base(),
            default_workspace: default_workspace(),
            http_timeout_secs: default_timeout(),
        }
    }
}

// Serde default helpers
fn default_bind() -> String { "127.0.0.1:8787".to_string() }
fn default_bucket() -> String { "flows".to_string() }
fn default_sign_ttl() -> u64 { 60 * 60 }
fn default_list_limit() -> usize { 1000 }
fn default_timeout() -> u64 { 15 }
fn default_search_endpoint() -> String { "https://api.perplexity.ai/chat/completions".to_string() }
fn default_search_model() -> String { "sonar-pro".to_string() }
fn default_max_tokens() -> u32 { 400 }
fn default_temperature() -> f32 { 0.2 }
fn default_max_results() -> usize { 5 }
fn default_download_base() -> String { DEFAULT_BASE_URL.to_string() }
fn default_workspace() -> String { DEFAULT_WORKSPACE_ID.to_string() }

// ============================================================================
// Config File Loading
// ============================================================================

/// Load config from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_config(path: Option<&str>) -> AppConfig {
    let config_path = path.unwrap_or("flow-inspirations.yaml");
    match std::fs::read_to_string(config_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => AppConfig::default(),
    }
}

// ============================================================================
// Connection secrets (environment)
// ============================================================================

/// Backend credentials, read from the environment (and `.env`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub supabase_url: String,
    pub service_key: String,
    pub anon_key: String,
    pub search_api_key: String,
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. The service key falls back to the anon
    /// key; the URL and at least one key are required.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).unwrap_or_default();

        let supabase_url = get("SUPABASE_URL");
        let anon_key = get("SUPABASE_ANON_KEY");
        let service_key = match get("SUPABASE_SERVICE_ROLE_KEY") {
            key if key.is_empty() => anon_key.clone(),
            key => key,
        };

        if supabase_url.is_empty() || service_key.is_empty() {
            return Err(ConfigError::MissingConnection);
        }

        Ok(Self {
            supabase_url,
            service_key,
            anon_key,
            search_api_key: get("PERPLEXITY_API_KEY"),
        })
    }

    /// Catalog reads prefer the anon key.
    pub fn read_key(&self) -> &str {
        if self.anon_key.is_empty() {
            &self.service_key
        } else {
            &self.anon_key
        }
    }
}

/// Download proxy key. Independent of the catalog credentials: the proxy
/// works without them and reports a missing key per request.
pub fn dust_api_key<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("DUST_API_KEY")
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

// ============================================================================
// Builders
// ============================================================================

/// Alias table from `--aliases`, then the config file, then the built-in one.
pub fn build_alias_table(cli_path: Option<&str>, config: &AppConfig) -> Result<AliasTable, ConfigError> {
    match cli_path.or(config.aliases.path.as_deref()) {
        Some(path) => AliasTable::load(Path::new(path)),
        None => AliasTable::builtin(),
    }
}

/// Wire the production collaborators into a resolver.
pub fn build_resolver(
    config: &AppConfig,
    service: &ServiceConfig,
    aliases: AliasTable,
) -> Result<Resolver, ConfigError> {
    let endpoint = Endpoint::new(
        &service.supabase_url,
        &service.service_key,
        service.read_key(),
        Duration::from_secs(config.storage.http_timeout_secs),
    )?;

    let catalog = RestCatalog::new(endpoint.clone());
    let objects = BucketStorage::new(endpoint, &config.storage.bucket, config.storage.list_limit);
    let search = PerplexityBackend::new(
        &config.search.endpoint,
        &config.search.model,
        &service.search_api_key,
        Duration::from_secs(config.search.http_timeout_secs),
    )?
    .with_limits(
        config.search.max_tokens,
        config.search.temperature,
        config.search.max_results,
    );

    let tracer = match &config.trace.path {
        Some(path) => TraceLogger::new(path),
        None => TraceLogger::disabled(),
    };

    Ok(Resolver::new(
        Arc::new(aliases),
        Arc::new(catalog),
        Arc::new(objects),
        Arc::new(search),
    )
    .with_sign_ttl(config.storage.sign_ttl_secs)
    .with_tracer(Arc::new(tracer)))
}

pub fn build_downloader(config: &AppConfig, api_key: &str) -> Result<DustClient, ConfigError> {
    Ok(DustClient::new(
        &config.download.base_url,
        api_key,
        Duration::from_secs(config.download.http_timeout_secs),
    )?
    .with_default_workspace(&config.download.default_workspace))
}
