use std::sync::{
    Arc, Mutex,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use flow_inspirations::{
    error::StoreError,
    resolve::{
        cascade::Resolver,
        model::{Flow, FlowScreen, SearchSource, StorageObject},
    },
    search::perplexity::SearchBackend,
    storage::{
        catalog::{CatalogStore, NewScreen},
        objects::ObjectStore,
    },
    text::alias::AliasTable,
};

// =========================================================================
// Catalog
// =========================================================================

#[derive(Default)]
pub struct MockCatalog {
    pub flows: Vec<Flow>,
    pub screens: Vec<FlowScreen>,
    pub find_flows_calls: AtomicUsize,
    pub find_screens_calls: AtomicUsize,
    pub created: Mutex<Vec<Flow>>,
    pub inserted: Mutex<Vec<NewScreen>>,
}

impl MockCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_flow(mut self, id: &str, app: &str, flow: &str) -> Self {
        self.flows.push(flow_row(id, app, flow));
        self
    }

    pub fn with_screen(mut self, flow_id: &str, order_index: i64, image_url: &str) -> Self {
        self.screens.push(FlowScreen {
            flow_id: flow_id.into(),
            order_index,
            image_url: Some(image_url.into()),
            caption: None,
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.find_flows_calls.load(Ordering::SeqCst) + self.find_screens_calls.load(Ordering::SeqCst)
    }
}

pub fn flow_row(id: &str, app: &str, flow: &str) -> Flow {
    Flow {
        id: id.into(),
        app_name: app.into(),
        flow_name: flow.into(),
    }
}

#[async_trait]
impl CatalogStore for MockCatalog {
    async fn find_flows(&self, _app: &str, _flow: &str) -> Vec<Flow> {
        self.find_flows_calls.fetch_add(1, Ordering::SeqCst);
        self.flows.clone()
    }

    async fn find_screens(&self, flow_ids: &[String]) -> Vec<FlowScreen> {
        self.find_screens_calls.fetch_add(1, Ordering::SeqCst);
        // Insertion order on purpose: the resolver must sort.
        self.screens
            .iter()
            .filter(|s| flow_ids.contains(&s.flow_id))
            .cloned()
            .collect()
    }

    async fn upsert_flow(&self, app: &str, flow: &str) -> Result<String, StoreError> {
        let mut created = self.created.lock().unwrap();
        if let Some(existing) = created
            .iter()
            .find(|f| f.app_name == app && f.flow_name == flow)
        {
            return Ok(existing.id.clone());
        }
        let id = format!("flow-{}", created.len() + 1);
        created.push(flow_row(&id, app, flow));
        Ok(id)
    }

    async fn insert_screen(&self, screen: &NewScreen) -> Result<(), StoreError> {
        self.inserted.lock().unwrap().push(screen.clone());
        Ok(())
    }
}

// =========================================================================
// Object storage
// =========================================================================

pub struct MockObjects {
    pub names: Vec<String>,
    pub signing_works: bool,
    pub list_calls: AtomicUsize,
    pub sign_calls: AtomicUsize,
    pub listed_prefixes: Mutex<Vec<String>>,
    pub signed_paths: Mutex<Vec<String>>,
    pub uploads: Mutex<Vec<(String, usize, String)>>,
}

impl MockObjects {
    pub fn empty() -> Self {
        Self::with_names(&[])
    }

    pub fn with_names(names: &[&str]) -> Self {
        Self {
            names: names.iter().map(|n| n.to_string()).collect(),
            signing_works: true,
            list_calls: AtomicUsize::new(0),
            sign_calls: AtomicUsize::new(0),
            listed_prefixes: Mutex::new(vec![]),
            signed_paths: Mutex::new(vec![]),
            uploads: Mutex::new(vec![]),
        }
    }

    pub fn failing_signatures(mut self) -> Self {
        self.signing_works = false;
        self
    }

    pub fn calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst) + self.sign_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MockObjects {
    fn bucket(&self) -> &str {
        "flows"
    }

    async fn list(&self, prefix: &str) -> Vec<StorageObject> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.listed_prefixes.lock().unwrap().push(prefix.to_string());
        self.names
            .iter()
            .map(|name| StorageObject {
                name: name.clone(),
                path: format!("{}/{}", prefix, name),
            })
            .collect()
    }

    async fn sign(&self, object_path: &str, _ttl_secs: u64) -> Option<String> {
        self.sign_calls.fetch_add(1, Ordering::SeqCst);
        self.signed_paths.lock().unwrap().push(object_path.to_string());
        if self.signing_works {
            Some(format!("https://signed.test/{}?token=abc", object_path))
        } else {
            None
        }
    }

    fn public_url(&self, object_path: &str) -> String {
        format!("https://public.test/flows/{}", object_path)
    }

    async fn upload(
        &self,
        object_path: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, StoreError> {
        self.uploads
            .lock()
            .unwrap()
            .push((object_path.to_string(), bytes.len(), content_type.to_string()));
        Ok(self.public_url(object_path))
    }
}

// =========================================================================
// Search
// =========================================================================

#[derive(Default)]
pub struct MockSearch {
    pub sources: Vec<SearchSource>,
    pub calls: AtomicUsize,
    pub queries: Mutex<Vec<(String, String)>>,
}

impl MockSearch {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_sources(urls: &[&str]) -> Self {
        Self {
            sources: urls
                .iter()
                .map(|url| SearchSource {
                    title: format!("Page {}", url),
                    url: url.to_string(),
                    description: "Screens".into(),
                })
                .collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchBackend for MockSearch {
    async fn search(&self, app: &str, flow: &str) -> Vec<SearchSource> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap()
            .push((app.to_string(), flow.to_string()));
        self.sources.clone()
    }
}

// =========================================================================
// Wiring
// =========================================================================

pub fn fixture_aliases() -> AliasTable {
    AliasTable::new()
        .with_entry("duolingo", "onboarding", "Duolingo iOS", "Onboarding")
        .with_entry("uber", "2-wheels", "Uber iOS", "2-wheels")
}

pub fn resolver(
    catalog: &Arc<MockCatalog>,
    objects: &Arc<MockObjects>,
    search: &Arc<MockSearch>,
) -> Resolver {
    Resolver::new(
        Arc::new(fixture_aliases()),
        catalog.clone(),
        objects.clone(),
        search.clone(),
    )
}
