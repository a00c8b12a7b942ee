use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::resolve::model::{Flow, FlowScreen};
use crate::storage::http::{Endpoint, send_checked};

// ============================================================================
// CatalogStore trait
// ============================================================================

/// Structured flow / screen catalog.
///
/// The read side is fail-soft: a broken catalog looks like an empty one.
/// The write side is used by ingestion and reports errors.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Flows whose names contain `app` and `flow`, case-insensitively and
    /// ignoring how the catalog spaces words.
    async fn find_flows(&self, app: &str, flow: &str) -> Vec<Flow>;

    /// Screens of the given flows, ascending by `order_index`.
    async fn find_screens(&self, flow_ids: &[String]) -> Vec<FlowScreen>;

    /// Id of the flow named exactly (app, flow), creating it if needed.
    async fn upsert_flow(&self, app: &str, flow: &str) -> Result<String, StoreError>;

    async fn insert_screen(&self, screen: &NewScreen) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewScreen {
    pub flow_id: String,
    pub order_index: i64,
    pub image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
}

/// `ilike` pattern matching `name` anywhere, with each space as a wildcard.
pub fn ilike_pattern(name: &str) -> String {
    format!("%{}%", name.to_lowercase().replace(' ', "%"))
}

// ============================================================================
// PostgREST implementation
// ============================================================================

pub struct RestCatalog {
    endpoint: Endpoint,
}

#[derive(Deserialize)]
struct FlowIdRow {
    #[serde(deserialize_with = "crate::resolve::model::deserialize_id")]
    id: String,
}

#[derive(Serialize)]
struct NewFlow<'a> {
    app_name: &'a str,
    flow_name: &'a str,
}

impl RestCatalog {
    pub fn new(endpoint: Endpoint) -> Self {
        Self { endpoint }
    }

    async fn try_find_flows(&self, app: &str, flow: &str) -> Result<Vec<Flow>, StoreError> {
        let request = self
            .endpoint
            .client
            .get(self.endpoint.url("/rest/v1/flows"))
            .query(&[
                ("select", "*".to_string()),
                ("app_name", format!("ilike.{}", ilike_pattern(app))),
                ("flow_name", format!("ilike.{}", ilike_pattern(flow))),
            ]);

        let response = send_checked(self.endpoint.with_read_auth(request), "find flows").await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::malformed("find flows", e))
    }

    async fn try_find_screens(&self, flow_ids: &[String]) -> Result<Vec<FlowScreen>, StoreError> {
        let any_of = flow_ids
            .iter()
            .map(|id| format!("flow_id.eq.{}", id))
            .collect::<Vec<_>>()
            .join(",");

        let request = self
            .endpoint
            .client
            .get(self.endpoint.url("/rest/v1/flow_screens"))
            .query(&[
                ("select", "*".to_string()),
                ("or", format!("({})", any_of)),
                ("order", "order_index.asc".to_string()),
            ]);

        let response = send_checked(self.endpoint.with_read_auth(request), "find screens").await?;
        response
            .json()
            .await
            .map_err(|e| StoreError::malformed("find screens", e))
    }
}

#[async_trait]
impl CatalogStore for RestCatalog {
    async fn find_flows(&self, app: &str, flow: &str) -> Vec<Flow> {
        match self.try_find_flows(app, flow).await {
            Ok(flows) => {
                debug!("catalog: {} flows match '{}' / '{}'", flows.len(), app, flow);
                flows
            }
            Err(e) => {
                warn!("catalog unavailable, treating as empty: {}", e);
                vec![]
            }
        }
    }

    async fn find_screens(&self, flow_ids: &[String]) -> Vec<FlowScreen> {
        if flow_ids.is_empty() {
            return vec![];
        }

        match self.try_find_screens(flow_ids).await {
            Ok(screens) => screens,
            Err(e) => {
                warn!("catalog screens unavailable, treating as empty: {}", e);
                vec![]
            }
        }
    }

    async fn upsert_flow(&self, app: &str, flow: &str) -> Result<String, StoreError> {
        let lookup = self
            .endpoint
            .client
            .get(self.endpoint.url("/rest/v1/flows"))
            .query(&[
                ("select", "id".to_string()),
                ("app_name", format!("eq.{}", app)),
                ("flow_name", format!("eq.{}", flow)),
                ("limit", "1".to_string()),
            ]);

        // An unreachable lookup falls through to create, same as finding nothing.
        // An unreadable answer does not: the flow may exist.
        let existing: Vec<FlowIdRow> =
            match send_checked(self.endpoint.with_service_auth(lookup), "look up flow").await {
                Ok(response) => response
                    .json()
                    .await
                    .map_err(|e| StoreError::malformed("look up flow", e))?,
                Err(e) => {
                    warn!("flow lookup failed, creating instead: {}", e);
                    vec![]
                }
            };

        if let Some(row) = existing.into_iter().next() {
            return Ok(row.id);
        }

        let create = self
            .endpoint
            .client
            .post(self.endpoint.url("/rest/v1/flows"))
            .header("Prefer", "return=representation")
            .json(&NewFlow {
                app_name: app,
                flow_name: flow,
            });

        let response = send_checked(self.endpoint.with_service_auth(create), "create flow").await?;
        let created: Vec<FlowIdRow> = response
            .json()
            .await
            .map_err(|e| StoreError::malformed("create flow", e))?;

        created
            .into_iter()
            .next()
            .map(|row| row.id)
            .ok_or_else(|| StoreError::malformed("create flow", "no row returned"))
    }

    async fn insert_screen(&self, screen: &NewScreen) -> Result<(), StoreError> {
        let request = self
            .endpoint
            .client
            .post(self.endpoint.url("/rest/v1/flow_screens"))
            .json(screen);

        send_checked(self.endpoint.with_service_auth(request), "insert screen").await?;
        Ok(())
    }
}
