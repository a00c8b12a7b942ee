use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, StoreError};
use crate::resolve::model::SearchSource;
use crate::storage::http::send_checked;

pub const DEFAULT_MAX_RESULTS: usize = 5;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n?```(?:json)?\n?").expect("valid fence pattern"));

static URL_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)https?:[^\s)"']+"#).expect("valid url pattern"));

// ============================================================================
// SearchBackend trait
// ============================================================================

/// Last-resort lookup of design references on the open web.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    /// Up to a handful of reference links. Never fails; errors yield nothing.
    async fn search(&self, app: &str, flow: &str) -> Vec<SearchSource>;
}

// ============================================================================
// Response parsing
// ============================================================================

/// Remove markdown code fences the model likes to wrap JSON in.
pub fn strip_code_fences(content: &str) -> String {
    CODE_FENCE.replace_all(content, "").trim().to_string()
}

/// Turn a completion into sources.
///
/// Tries `{"sources": [...]}` first (fences stripped). If the text isn't JSON
/// at all, scrapes URL-shaped substrings and names them after the app/flow.
pub fn parse_sources(content: &str, app: &str, flow: &str, max: usize) -> Vec<SearchSource> {
    let cleaned = strip_code_fences(content);

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(parsed) => parsed
            .get("sources")
            .and_then(Value::as_array)
            .map(|sources| {
                sources
                    .iter()
                    .filter_map(|s| serde_json::from_value::<SearchSource>(s.clone()).ok())
                    .take(max)
                    .collect()
            })
            .unwrap_or_default(),
        Err(_) => scrape_urls(content, app, flow, max),
    }
}

fn scrape_urls(content: &str, app: &str, flow: &str, max: usize) -> Vec<SearchSource> {
    URL_LIKE
        .find_iter(content)
        .take(max)
        .enumerate()
        .map(|(i, m)| SearchSource {
            title: format!("{} {} Design {}", app, flow, i + 1),
            url: m.as_str().to_string(),
            description: format!("Design inspiration for {} {}", app, flow),
        })
        .collect()
}

// ============================================================================
// Perplexity backend
// ============================================================================

pub struct PerplexityBackend {
    pub endpoint: String,
    pub model: String,
    pub api_key: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub max_results: usize,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

const SYSTEM_PROMPT: &str = "You are a design research assistant. Find web pages that contain mobile app screenshots and design examples. Return JSON with clickable URLs to design websites, Dribbble shots, Behance projects, or app store pages that show the requested app designs.";

impl PerplexityBackend {
    pub fn new(
        endpoint: &str,
        model: &str,
        api_key: &str,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            endpoint: endpoint.to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
            max_tokens: 400,
            temperature: 0.2,
            max_results: DEFAULT_MAX_RESULTS,
            client,
        })
    }

    pub fn with_limits(mut self, max_tokens: u32, temperature: f32, max_results: usize) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self.max_results = max_results;
        self
    }

    fn build_prompt(&self, app: &str, flow: &str) -> String {
        format!(
            r#"Find {} web pages that show {} {} mobile app screenshots and designs. Look for Dribbble shots, Behance projects, app store pages, or design websites. Return JSON {{"sources": [{{"title": "Page Title", "url": "https://example.com", "description": "Brief description"}}]}}."#,
            self.max_results, app, flow
        )
    }

    async fn complete(&self, app: &str, flow: &str) -> Result<String, StoreError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: self.build_prompt(app, flow),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let builder = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request);

        let response = send_checked(builder, "search").await?;
        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| StoreError::malformed("search", e))?;

        Ok(chat
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl SearchBackend for PerplexityBackend {
    async fn search(&self, app: &str, flow: &str) -> Vec<SearchSource> {
        if self.api_key.is_empty() {
            debug!("search: no API key configured, skipping");
            return vec![];
        }

        match self.complete(app, flow).await {
            Ok(content) => parse_sources(&content, app, flow, self.max_results),
            Err(e) => {
                warn!("search fallback failed: {}", e);
                vec![]
            }
        }
    }
}
