//! Configuration validation for drift projects.
//!
//! This module checks a parsed configuration for consistency before any plan
//! is ingested or aggregated against it.

use crate::error::{ConfigError, DriftError, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use super::spec::{ComponentConfig, DriftConfig, ProjectConfig, StoreBackend, StoreConfig};

/// Validator for project configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all issues found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The underlying error.
    pub error: ConfigError,
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a project configuration.
    ///
    /// # Errors
    ///
    /// Returns the first error found if validation fails.
    pub fn validate(&self, config: &DriftConfig) -> Result<ValidationResult> {
        let mut result = self.check(config);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            Err(DriftError::Config(result.errors.swap_remove(0).error))
        }
    }

    /// Collects every issue without failing.
    #[must_use]
    pub fn check(&self, config: &DriftConfig) -> ValidationResult {
        let mut result = ValidationResult::default();

        Self::validate_project(&config.project, &mut result);
        Self::validate_components(config, &mut result);
        Self::validate_store(&config.store, &mut result);

        result
    }

    /// Validates project configuration.
    fn validate_project(project: &ProjectConfig, result: &mut ValidationResult) {
        if project.name.trim().is_empty() {
            result.push(
                "project.name",
                ConfigError::validation("Project name cannot be empty", "project.name"),
            );
        }

        if project.default_branch.trim().is_empty() {
            result.push(
                "project.default_branch",
                ConfigError::validation("Default branch cannot be empty", "project.default_branch"),
            );
        }

        if project.environments.is_empty() {
            result.push(
                "project.environments",
                ConfigError::validation(
                    "At least one environment is required",
                    "project.environments",
                ),
            );
        }

        let mut seen = HashSet::new();
        for (i, env) in project.environments.iter().enumerate() {
            let field = format!("project.environments[{i}]");
            if env.trim().is_empty() {
                result.push(&field, ConfigError::validation("Environment cannot be empty", &field));
            } else if !seen.insert(env.as_str()) {
                result.push(
                    &field,
                    ConfigError::DuplicateName {
                        kind: String::from("environment"),
                        name: env.clone(),
                    },
                );
            }
        }

        for env in project.environments_config.keys() {
            if !seen.contains(env.as_str()) {
                result.warnings.push(format!(
                    "project.environments_config.{env}: Environment '{env}' is not declared"
                ));
            }
        }
    }

    /// Validates component declarations and their dependency graph.
    fn validate_components(config: &DriftConfig, result: &mut ValidationResult) {
        if config.components.is_empty() {
            result.warnings.push(String::from("No components defined in configuration"));
            return;
        }

        let mut seen_names = HashSet::new();
        let mut seen_keys = HashSet::new();

        for (i, component) in config.components.iter().enumerate() {
            let prefix = format!("components[{i}]");

            if !is_valid_name(&component.name) {
                result.push(
                    format!("{prefix}.name"),
                    ConfigError::validation(
                        format!(
                            "Component name '{}' is invalid. Must be lowercase \
                             alphanumeric with hyphens or underscores.",
                            component.name
                        ),
                        format!("{prefix}.name"),
                    ),
                );
            }

            if !seen_names.insert(component.name.as_str()) {
                result.push(
                    format!("{prefix}.name"),
                    ConfigError::DuplicateName {
                        kind: String::from("component"),
                        name: component.name.clone(),
                    },
                );
            } else if !seen_keys.insert(component.key()) {
                result.push(
                    format!("{prefix}.id"),
                    ConfigError::DuplicateName {
                        kind: String::from("component id"),
                        name: component.key().to_string(),
                    },
                );
            }

            for dependency in &component.depends_on {
                if config.component(dependency).is_none() {
                    result.push(
                        format!("{prefix}.depends_on"),
                        ConfigError::UnknownDependency {
                            component: component.name.clone(),
                            dependency: dependency.clone(),
                        },
                    );
                }
            }

            for env in &component.excluded_environments {
                if !config.has_environment(env) {
                    result.warnings.push(format!(
                        "{prefix}.excluded_environments: Environment '{env}' is not declared"
                    ));
                }
            }
        }

        if let Some(cycle) = find_dependency_cycle(&config.components) {
            result.push("components", ConfigError::CircularDependency { cycle });
        }
    }

    /// Validates the plan source configuration.
    fn validate_store(store: &StoreConfig, result: &mut ValidationResult) {
        match store.backend {
            StoreBackend::Remote => {
                if store.url.as_ref().is_none_or(|u| u.trim().is_empty()) {
                    result.push(
                        "store.url",
                        ConfigError::validation(
                            "API url is required when using the remote backend",
                            "store.url",
                        ),
                    );
                }
            }
            StoreBackend::Local => {
                if store.url.is_some() {
                    result
                        .warnings
                        .push(String::from("store.url: Ignored by the local backend"));
                }
            }
        }
    }
}

/// Returns a description of a dependency cycle, if any.
fn find_dependency_cycle(components: &[ComponentConfig]) -> Option<String> {
    let mut graph: DiGraph<&str, ()> = DiGraph::new();
    let indices: HashMap<&str, NodeIndex> = components
        .iter()
        .map(|c| (c.name.as_str(), graph.add_node(c.name.as_str())))
        .collect();

    for component in components {
        for dependency in &component.depends_on {
            if let (Some(&from), Some(&to)) = (
                indices.get(component.name.as_str()),
                indices.get(dependency.as_str()),
            ) {
                graph.update_edge(from, to, ());
            }
        }
    }

    toposort(&graph, None)
        .err()
        .map(|cycle| format!("component '{}' is part of a cycle", graph[cycle.node_id()]))
}

/// Validates that a name follows the naming convention.
/// Names must be lowercase alphanumeric with hyphens or underscores,
/// starting with a letter.
fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();

    match chars.next() {
        Some(first) if first.is_ascii_lowercase() => {}
        _ => return false,
    }

    if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_') {
        return false;
    }

    !name.ends_with(['-', '_']) && !name.contains("--") && !name.contains("__")
}

impl ValidationResult {
    fn push(&mut self, field: impl Into<String>, error: ConfigError) {
        self.errors.push(ValidationError {
            field: field.into(),
            error,
        });
    }

    /// Returns true if validation passed (no errors).
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Returns the number of errors.
    #[must_use]
    pub const fn error_count(&self) -> usize {
        self.errors.len()
    }

    /// Returns the number of warnings.
    #[must_use]
    pub const fn warning_count(&self) -> usize {
        self.warnings.len()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigParser;

    fn parse(yaml: &str) -> DriftConfig {
        ConfigParser::new()
            .parse_yaml(yaml, None)
            .expect("test config parses")
    }

    #[test]
    fn test_valid_name() {
        assert!(is_valid_name("network"));
        assert!(is_valid_name("app-service"));
        assert!(is_valid_name("app_service_2"));
    }

    #[test]
    fn test_invalid_name() {
        assert!(!is_valid_name(""));
        assert!(!is_valid_name("Network"));
        assert!(!is_valid_name("1-network"));
        assert!(!is_valid_name("network-"));
        assert!(!is_valid_name("net--work"));
        assert!(!is_valid_name("net work"));
    }

    #[test]
    fn test_valid_config() {
        let config = parse(
            r"
project:
  name: platform
  environments: [dev, prod]
components:
  - name: network
  - name: app
    depends_on: [network]
",
        );
        let result = ConfigValidator::new().validate(&config).expect("config is valid");
        assert!(result.is_valid());
        assert_eq!(result.warning_count(), 0);
    }

    #[test]
    fn test_unknown_dependency() {
        let config = parse(
            r"
project:
  name: platform
components:
  - name: app
    depends_on: [network]
",
        );
        let result = ConfigValidator::new().validate(&config);
        assert!(matches!(
            result,
            Err(DriftError::Config(ConfigError::UnknownDependency { .. }))
        ));
    }

    #[test]
    fn test_circular_dependency() {
        let config = parse(
            r"
project:
  name: platform
components:
  - name: a
    depends_on: [b]
  - name: b
    depends_on: [a]
",
        );
        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.error_count(), 1);
        assert!(matches!(
            result.errors[0].error,
            ConfigError::CircularDependency { .. }
        ));
    }

    #[test]
    fn test_duplicate_environment_and_component() {
        let config = parse(
            r"
project:
  name: platform
  environments: [dev, dev]
components:
  - name: app
  - name: app
",
        );
        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.error_count(), 2);
    }

    #[test]
    fn test_remote_backend_requires_url() {
        let config = parse(
            r"
project:
  name: platform
components:
  - name: app
store:
  backend: remote
",
        );
        let result = ConfigValidator::new().check(&config);
        assert_eq!(result.errors[0].field, "store.url");
    }
}
