//! Environment grouping for display.
//!
//! Environments are grouped as `group -> region -> [environment]` using the
//! project's `environments_config`.

use std::collections::BTreeMap;

use super::spec::EnvironmentConfig;

/// Group used when an environment has no configured group.
pub const DEFAULT_GROUP: &str = "Ungrouped";

/// Region used when an environment has no configured region.
pub const DEFAULT_REGION: &str = "Global";

/// Environments grouped by group, then region.
pub type EnvironmentGroups = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Groups environments by their configured group and region.
///
/// Missing or empty values fall back to [`DEFAULT_GROUP`] and
/// [`DEFAULT_REGION`]. Within a region, environments keep their declared
/// order.
#[must_use]
pub fn group_environments(
    environments: &[String],
    config: &BTreeMap<String, EnvironmentConfig>,
) -> EnvironmentGroups {
    let mut grouped = EnvironmentGroups::new();

    for env in environments {
        let conf = config.get(env);
        let group = conf
            .and_then(|c| c.group.as_deref())
            .filter(|g| !g.is_empty())
            .unwrap_or(DEFAULT_GROUP);
        let region = conf
            .and_then(|c| c.region.as_deref())
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REGION);

        grouped
            .entry(group.to_string())
            .or_default()
            .entry(region.to_string())
            .or_default()
            .push(env.clone());
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn envs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_group_with_config() {
        let mut config = BTreeMap::new();
        config.insert(
            String::from("production-uks-1"),
            EnvironmentConfig {
                group: Some(String::from("Production")),
                region: Some(String::from("UK South")),
            },
        );
        config.insert(
            String::from("production-global"),
            EnvironmentConfig {
                group: Some(String::from("Production")),
                region: Some(String::new()),
            },
        );

        let grouped = group_environments(
            &envs(&["production-uks-1", "production-global", "dev"]),
            &config,
        );

        assert_eq!(grouped["Production"]["UK South"], envs(&["production-uks-1"]));
        assert_eq!(grouped["Production"]["Global"], envs(&["production-global"]));
        assert_eq!(grouped["Ungrouped"]["Global"], envs(&["dev"]));
    }

    #[test]
    fn test_group_without_config() {
        let grouped = group_environments(&envs(&["dev", "test"]), &BTreeMap::new());
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped[DEFAULT_GROUP][DEFAULT_REGION], envs(&["dev", "test"]));
    }
}
