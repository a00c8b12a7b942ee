use std::sync::Arc;

use log::{debug, info};
use uuid::Uuid;

use crate::{
    resolve::{
        model::{Recommendation, Resolution, ResolvedImage, SearchSource},
        sign::{sign_catalog_screens, sign_listed_objects},
    },
    search::perplexity::SearchBackend,
    storage::{
        catalog::CatalogStore,
        objects::{DEFAULT_SIGN_TTL_SECS, ObjectStore, sort_images},
    },
    text::{alias::AliasTable, normalize::split_free_text},
    trace::{
        logger::TraceLogger,
        trace::{Tier, TraceEvent},
    },
};

// ============================================================================
// Input and alias stages
// ============================================================================

/// Exact names and storage folder a request resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub app: String,
    pub flow: String,
    pub folder: String,
}

/// Pull (app, flow) out of a recommendation.
///
/// Structured fields win. When either is missing and free text is present,
/// the text is split on its last word. Returns `None` when no app remains.
pub fn read_input(recommendation: &Recommendation) -> Option<(String, String)> {
    let mut app = recommendation.app.as_deref().unwrap_or("").trim().to_string();
    let mut flow = recommendation.flow.as_deref().unwrap_or("").trim().to_string();

    if app.is_empty() || flow.is_empty() {
        if let Some((text_app, text_flow)) = recommendation.text.as_deref().and_then(split_free_text) {
            app = text_app;
            flow = text_flow;
        }
    }

    if app.is_empty() { None } else { Some((app, flow)) }
}

/// Apply the alias table and derive the storage folder (`"<app> <flow>"`).
pub fn target_for(aliases: &AliasTable, app: &str, flow: &str) -> Target {
    let exact = aliases.resolve_alias(app, flow);
    let folder = if exact.flow.is_empty() {
        exact.app.clone()
    } else {
        format!("{} {}", exact.app, exact.flow)
    };

    Target {
        app: exact.app,
        flow: exact.flow,
        folder,
    }
}

fn non_empty<T>(items: Vec<T>) -> Option<Vec<T>> {
    if items.is_empty() { None } else { Some(items) }
}

// ============================================================================
// Resolver
// ============================================================================

/// Resolves an (app, flow) request to screenshots, trying each source once:
/// catalog, then raw storage listing, then web search.
pub struct Resolver {
    aliases: Arc<AliasTable>,
    catalog: Arc<dyn CatalogStore>,
    objects: Arc<dyn ObjectStore>,
    search: Arc<dyn SearchBackend>,
    sign_ttl_secs: u64,
    tracer: Arc<TraceLogger>,
}

impl Resolver {
    pub fn new(
        aliases: Arc<AliasTable>,
        catalog: Arc<dyn CatalogStore>,
        objects: Arc<dyn ObjectStore>,
        search: Arc<dyn SearchBackend>,
    ) -> Self {
        Self {
            aliases,
            catalog,
            objects,
            search,
            sign_ttl_secs: DEFAULT_SIGN_TTL_SECS,
            tracer: Arc::new(TraceLogger::disabled()),
        }
    }

    pub fn with_sign_ttl(mut self, secs: u64) -> Self {
        self.sign_ttl_secs = secs;
        self
    }

    pub fn with_tracer(mut self, tracer: Arc<TraceLogger>) -> Self {
        self.tracer = tracer;
        self
    }

    pub fn catalog(&self) -> &Arc<dyn CatalogStore> {
        &self.catalog
    }

    pub fn objects(&self) -> &Arc<dyn ObjectStore> {
        &self.objects
    }

    pub async fn resolve(&self, recommendation: &Recommendation) -> Resolution {
        let request_id = Uuid::new_v4().to_string();

        let Some((app, flow)) = read_input(recommendation) else {
            debug!("resolve: no app in request, nothing to look up");
            self.tracer
                .log(&TraceEvent::now(&request_id, Tier::Input).with_outcome("no_app", 0));
            return Resolution::Empty;
        };

        let target = target_for(&self.aliases, &app, &flow);
        info!(
            "resolve: '{}' / '{}' -> '{}' / '{}'",
            app, flow, target.app, target.flow
        );

        if let Some(screens) = self.catalog_tier(&request_id, &target).await {
            return self.screens(target, screens);
        }

        if let Some(screens) = self.storage_tier(&request_id, &target).await {
            return self.screens(target, screens);
        }

        if let Some(sources) = self.search_tier(&request_id, &target).await {
            return Resolution::Sources(sources);
        }

        info!("resolve: nothing found for '{}'", target.folder);
        Resolution::Empty
    }

    fn screens(&self, target: Target, screens: Vec<ResolvedImage>) -> Resolution {
        Resolution::Screens {
            app: target.app,
            flow: target.flow,
            screens,
        }
    }

    fn trace(&self, request_id: &str, tier: Tier, target: &Target, outcome: &str, count: usize) {
        if !self.tracer.is_enabled() {
            return;
        }
        let event = TraceEvent::now(request_id, tier)
            .with_target(&target.app, &target.flow)
            .with_folder(&target.folder)
            .with_outcome(outcome, count);
        self.tracer.log(&event);
    }

    /// Screens recorded for the first matching catalog flow, in `order_index` order.
    pub async fn catalog_tier(&self, request_id: &str, target: &Target) -> Option<Vec<ResolvedImage>> {
        let flows = self.catalog.find_flows(&target.app, &target.flow).await;
        let Some(first) = flows.first() else {
            self.trace(request_id, Tier::Catalog, target, "no_flow", 0);
            return None;
        };

        let mut screens: Vec<_> = self
            .catalog
            .find_screens(std::slice::from_ref(&first.id))
            .await
            .into_iter()
            .filter(|s| s.flow_id == first.id)
            .collect();
        screens.sort_by_key(|s| s.order_index);

        let images = sign_catalog_screens(self.objects.as_ref(), screens, self.sign_ttl_secs).await;
        debug!("catalog tier: {} screens for flow {}", images.len(), first.id);
        self.trace(request_id, Tier::Catalog, target, "screens", images.len());
        non_empty(images)
    }

    /// Images listed under the target folder, numbered in numeric name order.
    pub async fn storage_tier(&self, request_id: &str, target: &Target) -> Option<Vec<ResolvedImage>> {
        let listed = sort_images(self.objects.list(&target.folder).await);
        let images = sign_listed_objects(self.objects.as_ref(), listed, self.sign_ttl_secs).await;
        debug!("storage tier: {} images under '{}'", images.len(), target.folder);
        self.trace(request_id, Tier::Storage, target, "images", images.len());
        non_empty(images)
    }

    /// Reference links from web search.
    pub async fn search_tier(&self, request_id: &str, target: &Target) -> Option<Vec<SearchSource>> {
        info!("search tier: no stored screens for '{}', searching the web", target.folder);
        let sources = self.search.search(&target.app, &target.flow).await;
        self.trace(request_id, Tier::Search, target, "sources", sources.len());
        non_empty(sources)
    }
}
