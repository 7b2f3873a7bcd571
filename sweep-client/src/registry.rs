//! Model registry
//!
//! Maps the short model names used on the command line to a backend model
//! id and the client that serves it. Built once at startup; lookups are a
//! plain map access.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::GenerationClient;

/// Aliases registered by [`ModelRegistry::with_defaults`]
pub const DEFAULT_MODELS: &[(&str, &str)] = &[
    ("haiku", "claude-haiku-4-5"),
    ("sonnet", "claude-sonnet-4-5"),
    ("opus", "claude-opus-4-1"),
];

/// Backend selection for one model alias
#[derive(Clone)]
pub struct ModelEntry {
    /// Id sent to the backend
    pub model_id: String,
    /// Client that serves this model
    pub client: Arc<dyn GenerationClient>,
}

impl fmt::Debug for ModelEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelEntry")
            .field("model_id", &self.model_id)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    entries: BTreeMap<String, ModelEntry>,
}

impl ModelRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every alias in [`DEFAULT_MODELS`] against one client
    pub fn with_defaults(client: Arc<dyn GenerationClient>) -> Self {
        let mut registry = Self::new();
        for (alias, model_id) in DEFAULT_MODELS {
            registry.register(*alias, *model_id, Arc::clone(&client));
        }
        registry
    }

    /// Adds or replaces an alias
    pub fn register(
        &mut self,
        alias: impl Into<String>,
        model_id: impl Into<String>,
        client: Arc<dyn GenerationClient>,
    ) -> &mut Self {
        self.entries.insert(
            alias.into(),
            ModelEntry {
                model_id: model_id.into(),
                client,
            },
        );
        self
    }

    pub fn resolve(&self, alias: &str) -> Option<&ModelEntry> {
        self.entries.get(alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    /// Registered aliases, sorted
    pub fn aliases(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }
}
