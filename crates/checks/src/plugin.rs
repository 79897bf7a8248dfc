//! Check plugin registry.
//!
//! Maps a check id (the first token of a check command) to its constructor
//! and the resource kinds it can run against. The registry is filled once at
//! startup and then shared read-only with the parser and controllers.

use crate::check::{Check, CheckUsage};
use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::resource::ResourceKind;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Constructor for a check type
pub type CheckFactory = Arc<dyn Fn(CheckConfig) -> Result<Box<dyn Check>, CheckError> + Send + Sync>;

struct PluginEntry {
    factory: CheckFactory,
    usage: fn() -> CheckUsage,
    resource_kinds: Vec<ResourceKind>,
}

/// Documentation for one registered check type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDocs {
    pub id: String,
    pub usage: CheckUsage,
    pub resources: Vec<ResourceKind>,
}

/// Catalog of check types
#[derive(Default)]
pub struct CheckPluginRegistry {
    plugins: HashMap<String, PluginEntry>,
}

impl fmt::Debug for CheckPluginRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckPluginRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl CheckPluginRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every built-in check
    pub fn with_builtin_checks() -> Self {
        let mut registry = Self::new();
        crate::plugins::register_builtin_checks(&mut registry);
        registry
    }

    /// Registers a check type.
    ///
    /// The first registration of an id wins; later ones are rejected.
    pub fn register<F>(
        &mut self,
        id: &str,
        factory: F,
        usage: fn() -> CheckUsage,
        resource_kinds: &[ResourceKind],
    ) -> Result<(), CheckError>
    where
        F: Fn(CheckConfig) -> Result<Box<dyn Check>, CheckError> + Send + Sync + 'static,
    {
        if self.plugins.contains_key(id) {
            warn!("check factory {} already registered, ignoring", id);
            return Err(CheckError::AlreadyRegistered(id.to_string()));
        }
        self.plugins.insert(
            id.to_string(),
            PluginEntry {
                factory: Arc::new(factory),
                usage,
                resource_kinds: resource_kinds.to_vec(),
            },
        );
        Ok(())
    }

    /// Builds the check for `config.id`, if it supports `kind`
    pub fn build(&self, config: CheckConfig, kind: ResourceKind) -> Result<Box<dyn Check>, CheckError> {
        let entry = self
            .plugins
            .get(&config.id)
            .ok_or_else(|| CheckError::UnknownCheck(config.id.clone()))?;

        if !entry.resource_kinds.contains(&kind) {
            return Err(CheckError::IncompatibleResource {
                id: config.id.clone(),
                kind: kind.to_string(),
            });
        }

        let name = config.name.clone();
        (entry.factory)(config).map_err(|e| match e {
            CheckError::InvalidArgs { .. } => e,
            other => CheckError::InvalidArgs {
                name,
                reason: other.to_string(),
            },
        })
    }

    /// Registered check ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.plugins.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Usage docs for every registered check, sorted by id.
    ///
    /// Each check is instantiated with a placeholder config; when the
    /// constructor rejects it the registered usage is used instead.
    pub fn docs(&self) -> Vec<CheckDocs> {
        self.ids()
            .into_iter()
            .filter_map(|id| {
                let entry = self.plugins.get(&id)?;
                let usage = match (entry.factory)(CheckConfig::placeholder(&id)) {
                    Ok(check) => check.usage(),
                    Err(_) => (entry.usage)(),
                };
                Some(CheckDocs {
                    id,
                    usage,
                    resources: entry.resource_kinds.clone(),
                })
            })
            .collect()
    }
}
