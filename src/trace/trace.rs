use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};

/// Stage of the resolution cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Input,
    Catalog,
    Storage,
    Search,
}

/// One line of the resolution trace.
#[derive(Debug, Serialize)]
pub struct TraceEvent {
    pub timestamp_ms: u128,
    pub request_id: String,

    pub tier: Tier,
    pub app: String,
    pub flow: String,

    pub outcome: String,
    pub count: usize,

    pub folder: Option<String>,
}

impl TraceEvent {
    pub fn now(request_id: &str, tier: Tier) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or_default(),
            request_id: request_id.to_string(),
            tier,
            app: String::new(),
            flow: String::new(),
            outcome: String::new(),
            count: 0,
            folder: None,
        }
    }

    pub fn with_target(mut self, app: &str, flow: &str) -> Self {
        self.app = app.to_string();
        self.flow = flow.to_string();
        self
    }

    pub fn with_outcome(mut self, outcome: impl ToString, count: usize) -> Self {
        self.outcome = outcome.to_string();
        self.count = count;
        self
    }

    pub fn with_folder(mut self, folder: &str) -> Self {
        self.folder = Some(folder.to_string());
        self
    }
}
