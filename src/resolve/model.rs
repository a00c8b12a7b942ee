use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::storage::http::encode_uri;

// ============================================================================
// Catalog entities
// ============================================================================

/// A catalogued (app, flow) pair. Owns its screens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flow {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    pub app_name: String,
    pub flow_name: String,
}

/// One screenshot in a flow, ordered by `order_index` within that flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowScreen {
    #[serde(deserialize_with = "deserialize_id")]
    pub flow_id: String,
    pub order_index: i64,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Catalog ids are uuids in some deployments and bigints in others.
pub fn deserialize_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

/// Raw entry from an object-storage listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageObject {
    pub name: String,
    pub path: String,
}

// ============================================================================
// Resolution output
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedImage {
    pub order: i64,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// A design-reference link from the search fallback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSource {
    #[serde(default)]
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// What the cascade produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Screens {
        app: String,
        flow: String,
        screens: Vec<ResolvedImage>,
    },
    Sources(Vec<SearchSource>),
    Empty,
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveRequest {
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommendation: Recommendation,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Recommendation {
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub flow: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowPayload {
    pub id: Uuid,
    pub app_name: String,
    pub flow_name: String,
    pub slug: String,
    pub description: Option<String>,
    pub screens: Vec<ResolvedImage>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub ok: bool,
    pub data: Vec<FlowPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SearchSource>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_perplexity_fallback: Option<bool>,
}

impl ResolveResponse {
    pub fn empty() -> Self {
        Self {
            ok: true,
            data: vec![],
            sources: None,
            is_perplexity_fallback: None,
        }
    }
}

impl From<Resolution> for ResolveResponse {
    fn from(resolution: Resolution) -> Self {
        match resolution {
            Resolution::Screens { app, flow, screens } => Self {
                ok: true,
                data: vec![FlowPayload {
                    id: Uuid::new_v4(),
                    slug: format!("{}/{}", encode_uri(&app), encode_uri(&flow)),
                    app_name: app,
                    flow_name: flow,
                    description: None,
                    screens,
                }],
                sources: None,
                is_perplexity_fallback: None,
            },
            Resolution::Sources(sources) => Self {
                ok: true,
                data: vec![],
                sources: Some(sources),
                is_perplexity_fallback: Some(true),
            },
            Resolution::Empty => Self::empty(),
        }
    }
}
