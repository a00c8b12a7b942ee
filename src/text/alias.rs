use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::text::normalize::key_for;

/// Production alias table, embedded so the binary works without a config dir.
const DEFAULT_ALIASES: &str = include_str!("../../config/aliases.yaml");

/// Exact app/flow names as they appear in storage folders and the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasEntry {
    pub app: String,
    pub flow: String,
}

/// One app group in the YAML alias file.
///
/// ```yaml
/// - match: duolingo
///   app: Duolingo iOS
///   flows: [Onboarding, Streak]
/// ```
///
/// Every flow is keyed by `key_for(match, flow)` and resolves to `(app, flow)`.
#[derive(Debug, Clone, Deserialize)]
pub struct AliasGroup {
    #[serde(rename = "match")]
    pub match_app: String,
    pub app: String,
    #[serde(default)]
    pub flows: Vec<String>,
}

/// Read-only lookup from normalized (app, flow) keys to exact names.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, AliasEntry>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping. Later inserts for the same key win.
    pub fn with_entry(mut self, app: &str, flow: &str, exact_app: &str, exact_flow: &str) -> Self {
        self.entries.insert(
            key_for(app, flow),
            AliasEntry {
                app: exact_app.to_string(),
                flow: exact_flow.to_string(),
            },
        );
        self
    }

    pub fn from_groups(groups: Vec<AliasGroup>) -> Self {
        let mut table = Self::new();
        for group in groups {
            for flow in &group.flows {
                table = table.with_entry(&group.match_app, flow, &group.app, flow);
            }
        }
        table
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let groups: Vec<AliasGroup> = serde_yaml::from_str(content)
            .map_err(|e| ConfigError::AliasFile(e.to_string()))?;
        Ok(Self::from_groups(groups))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::AliasFile(format!("{}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    /// The embedded production table.
    pub fn builtin() -> Result<Self, ConfigError> {
        Self::from_yaml(DEFAULT_ALIASES)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn lookup(&self, app: &str, flow: &str) -> Option<&AliasEntry> {
        self.entries.get(&key_for(app, flow))
    }

    /// Map free text to exact names. Misses hand back the caller's text
    /// untouched (not normalized) so folder and catalog lookups still run.
    pub fn resolve_alias(&self, app: &str, flow: &str) -> AliasEntry {
        match self.lookup(app, flow) {
            Some(entry) => entry.clone(),
            None => AliasEntry {
                app: app.to_string(),
                flow: flow.to_string(),
            },
        }
    }
}
