//! Configuration specification types for a drift project.
//!
//! This module defines the structs that map to the `driftscope.yaml` file:
//! the project, its environments, its components and the plan source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::plan::CloudPlatform;

/// The root configuration structure for a driftscope project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DriftConfig {
    /// Project-level configuration.
    pub project: ProjectConfig,
    /// Components planned independently within the project.
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
    /// Where plans are read from and written to.
    #[serde(default)]
    pub store: StoreConfig,
}

/// Project-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Human-readable project name.
    pub name: String,
    /// Identifier used by the remote API (defaults to the name).
    #[serde(default)]
    pub id: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Branch assumed for plans that do not carry one.
    #[serde(default = "default_branch")]
    pub default_branch: String,
    /// Cloud platform, locked by the first plan that reveals it.
    #[serde(default)]
    pub cloud_platform: Option<CloudPlatform>,
    /// Environment labels, in display order.
    #[serde(default = "default_environments")]
    pub environments: Vec<String>,
    /// Optional grouping metadata per environment.
    #[serde(default)]
    pub environments_config: BTreeMap<String, EnvironmentConfig>,
}

/// Grouping metadata for one environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvironmentConfig {
    /// Environment group (e.g. "Production").
    #[serde(default)]
    pub group: Option<String>,
    /// Region within the group (e.g. "UK South").
    #[serde(default)]
    pub region: Option<String>,
}

/// A logical subdivision of the project's infrastructure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComponentConfig {
    /// Component name, unique within the project.
    pub name: String,
    /// Identifier used by the remote API (defaults to the name).
    #[serde(default)]
    pub id: Option<String>,
    /// Names of components this one depends on.
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Environments this component is never deployed to.
    #[serde(default)]
    pub excluded_environments: Vec<String>,
}

/// Plan source configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Backend type.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Archive directory (local backend).
    #[serde(default)]
    pub path: Option<String>,
    /// API base URL (remote backend).
    #[serde(default)]
    pub url: Option<String>,
}

/// Plan source backends.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Local directory of ingested plans.
    #[default]
    Local,
    /// Remote drift API.
    Remote,
}

fn default_branch() -> String {
    String::from("develop")
}

fn default_environments() -> Vec<String> {
    vec![String::from("dev")]
}

impl DriftConfig {
    /// Finds a component by name.
    #[must_use]
    pub fn component(&self, name: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.name == name)
    }

    /// Finds a component by the key plans are recorded under.
    #[must_use]
    pub fn component_by_key(&self, key: &str) -> Option<&ComponentConfig> {
        self.components.iter().find(|c| c.key() == key)
    }

    /// Returns true if the environment is declared.
    #[must_use]
    pub fn has_environment(&self, environment: &str) -> bool {
        self.project.environments.iter().any(|e| e == environment)
    }

    /// Resolves a component's `depends_on` names to component keys.
    ///
    /// Unknown names are skipped; the validator reports them.
    #[must_use]
    pub fn dependency_keys(&self, component: &ComponentConfig) -> Vec<String> {
        component
            .depends_on
            .iter()
            .filter_map(|name| self.component(name))
            .map(|dep| dep.key().to_string())
            .collect()
    }
}

impl ProjectConfig {
    /// Returns the identifier plans are recorded under.
    #[must_use]
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

impl ComponentConfig {
    /// Creates a component with only a name.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: None,
            depends_on: Vec::new(),
            excluded_environments: Vec::new(),
        }
    }

    /// Returns the identifier plans are recorded under.
    #[must_use]
    pub fn key(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }

    /// Returns true if the component is excluded from the environment.
    #[must_use]
    pub fn is_excluded_from(&self, environment: &str) -> bool {
        self.excluded_environments.iter().any(|e| e == environment)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_component_key_defaults_to_name() {
        let mut component = ComponentConfig::named("network");
        assert_eq!(component.key(), "network");

        component.id = Some(String::from("c-123"));
        assert_eq!(component.key(), "c-123");
    }

    #[test]
    fn test_dependency_keys_skip_unknown() {
        let mut app = ComponentConfig::named("app");
        app.depends_on = vec![String::from("network"), String::from("ghost")];
        let mut network = ComponentConfig::named("network");
        network.id = Some(String::from("net-1"));

        let config = DriftConfig {
            project: ProjectConfig {
                name: String::from("platform"),
                id: None,
                description: None,
                default_branch: default_branch(),
                cloud_platform: None,
                environments: default_environments(),
                environments_config: BTreeMap::new(),
            },
            components: vec![network, app.clone()],
            store: StoreConfig::default(),
        };

        assert_eq!(config.dependency_keys(&app), vec![String::from("net-1")]);
    }
}
