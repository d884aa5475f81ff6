//! Plan ingestion.
//!
//! Turns a raw Terraform JSON plan into a pruned, immutable [`Plan`] bound to
//! one component and environment of the project.

use chrono::Utc;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

use crate::config::DriftConfig;
use crate::error::{IngestError, Result};

use super::fingerprint::PlanHasher;
use super::types::{
    parse_timestamp, ChangeDetail, CloudPlatform, Plan, PlanDocument, ResourceChange,
    ResourceEdge, ResourceGraph, ResourceNode,
};

/// Target of an ingestion.
#[derive(Debug, Clone)]
pub struct IngestRequest {
    /// Component name or key.
    pub component: String,
    /// Environment label.
    pub environment: String,
    /// Branch label; `None` records the project's default branch.
    pub branch: Option<String>,
}

/// Builds [`Plan`]s from raw Terraform JSON plans.
#[derive(Debug)]
pub struct PlanIngestor<'a> {
    config: &'a DriftConfig,
    locked_platform: Option<CloudPlatform>,
    hasher: PlanHasher,
}

impl<'a> PlanIngestor<'a> {
    /// Creates an ingestor for the given project.
    #[must_use]
    pub fn new(config: &'a DriftConfig) -> Self {
        Self {
            config,
            locked_platform: None,
            hasher: PlanHasher::new(),
        }
    }

    /// Sets the platform already recorded by earlier plans.
    #[must_use]
    pub fn with_locked_platform(mut self, platform: Option<CloudPlatform>) -> Self {
        self.locked_platform = platform;
        self
    }

    /// Platform the project is bound to, if any.
    #[must_use]
    pub fn project_platform(&self) -> Option<CloudPlatform> {
        self.config
            .project
            .cloud_platform
            .or(self.locked_platform)
            .filter(|p| p.is_known())
    }

    /// Ingests a raw plan.
    ///
    /// `latest` is the most recent stored plan for the same component and
    /// environment; the new plan must be strictly newer.
    ///
    /// # Errors
    ///
    /// Returns an error if the component or environment is unknown, the
    /// document is not a plan, the platform differs from the project's or
    /// the plan is stale.
    pub fn ingest(
        &self,
        raw: &Value,
        request: &IngestRequest,
        latest: Option<&Plan>,
    ) -> Result<Plan> {
        let project = &self.config.project;

        let component = self
            .config
            .component(&request.component)
            .or_else(|| self.config.component_by_key(&request.component))
            .ok_or_else(|| IngestError::UnknownComponent {
                name: request.component.clone(),
                project: project.name.clone(),
            })?;

        if !self.config.has_environment(&request.environment) {
            return Err(IngestError::UnknownEnvironment {
                name: request.environment.clone(),
                project: project.name.clone(),
            }
            .into());
        }

        if component.is_excluded_from(&request.environment) {
            warn!(
                "Component '{}' is excluded from environment '{}'",
                component.name, request.environment
            );
        }

        let document = raw
            .as_object()
            .ok_or_else(|| IngestError::invalid("plan must be a JSON object"))?;

        let raw_changes = match document.get("resource_changes") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(prune_change).collect(),
            Some(_) => return Err(IngestError::invalid("resource_changes must be an array").into()),
        };

        let cloud_platform = detect_platform(&raw_changes);
        if let Some(expected) = self.project_platform()
            && cloud_platform.is_known()
            && expected != cloud_platform
        {
            return Err(IngestError::PlatformMismatch {
                project: expected.to_string(),
                plan: cloud_platform.to_string(),
            }
            .into());
        }

        let ingested_at = Utc::now();
        let timestamp = match document.get("timestamp").and_then(Value::as_str) {
            Some(raw_ts) => parse_timestamp(raw_ts)
                .ok_or_else(|| IngestError::invalid(format!("invalid timestamp '{raw_ts}'")))?,
            None => ingested_at,
        };

        if let Some(latest) = latest.filter(|p| {
            p.component_id == component.key() && p.environment == request.environment
        }) && timestamp <= latest.timestamp
        {
            debug!("Rejecting stale plan for {}/{}", component.name, request.environment);
            return Err(IngestError::StalePlan {
                uploaded: timestamp.to_rfc3339(),
                latest: latest.timestamp.to_rfc3339(),
            }
            .into());
        }

        let providers: BTreeSet<String> = raw
            .pointer("/configuration/provider_config")
            .and_then(Value::as_object)
            .map(|config| config.keys().cloned().collect())
            .unwrap_or_default();

        let resource_graph = raw
            .pointer("/configuration/root_module")
            .map(|root| build_resource_graph(root, &raw_changes))
            .filter(|graph| !graph.nodes.is_empty());

        let fingerprint = self.hasher.hash_changes(&raw_changes);

        let plan = Plan {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp,
            ingested_at: Some(ingested_at),
            project_id: project.key().to_string(),
            component_id: component.key().to_string(),
            component_name: Some(component.name.clone()),
            environment: request.environment.clone(),
            branch: Some(
                request
                    .branch
                    .clone()
                    .unwrap_or_else(|| project.default_branch.clone()),
            ),
            terraform_version: document
                .get("terraform_version")
                .and_then(Value::as_str)
                .map(String::from),
            cloud_platform,
            providers,
            dependencies: self.config.dependency_keys(component),
            resource_graph,
            fingerprint: Some(fingerprint),
            terraform_plan: PlanDocument {
                format_version: document
                    .get("format_version")
                    .and_then(Value::as_str)
                    .map(String::from),
                resource_changes: raw_changes,
            },
        };

        info!(
            "Ingested plan {} for {}/{} ({} resource changes)",
            plan.id,
            component.name,
            plan.environment,
            plan.resource_changes().len()
        );

        Ok(plan)
    }
}

/// Keeps only the fields the dashboard reads from a raw resource change.
fn prune_change(raw: &Value) -> ResourceChange {
    let text = |key: &str| raw.get(key).and_then(Value::as_str).map(String::from);
    let change = raw.get("change").filter(|c| c.is_object());

    let full = ResourceChange {
        address: text("address").unwrap_or_default(),
        resource_type: text("type").unwrap_or_default(),
        name: text("name"),
        resource_group: text("resource_group"),
        change: ChangeDetail {
            actions: change
                .and_then(|c| c.get("actions"))
                .and_then(Value::as_array)
                .map(|actions| {
                    actions
                        .iter()
                        .filter_map(Value::as_str)
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            before: change.and_then(|c| c.get("before")).cloned(),
            after: change.and_then(|c| c.get("after")).cloned(),
        },
    };

    let resource_group = full.resolved_resource_group().map(String::from);
    ResourceChange {
        address: full.address,
        resource_type: full.resource_type,
        name: full.name,
        resource_group,
        change: ChangeDetail {
            actions: full.change.actions,
            before: None,
            after: None,
        },
    }
}

/// Platform of the first resource type with a known prefix.
fn detect_platform(changes: &[ResourceChange]) -> CloudPlatform {
    changes
        .iter()
        .map(|c| CloudPlatform::from_resource_type(&c.resource_type))
        .find(|p| p.is_known())
        .unwrap_or_default()
}

/// Builds the resource adjacency from the plan's configuration tree.
///
/// Nodes are the plan's resource change addresses. An edge runs from a
/// resource to every known resource it references or explicitly depends on.
fn build_resource_graph(root_module: &Value, changes: &[ResourceChange]) -> ResourceGraph {
    let mut by_config_address: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for change in changes.iter().filter(|c| !c.address.is_empty()) {
        by_config_address
            .entry(strip_instance_keys(&change.address))
            .or_default()
            .push(&change.address);
    }

    let mut edges = BTreeSet::new();
    collect_module_edges(root_module, "", &by_config_address, &mut edges);

    let mut seen = BTreeSet::new();
    let nodes = changes
        .iter()
        .filter(|c| !c.address.is_empty() && seen.insert(c.address.as_str()))
        .map(|c| ResourceNode {
            id: c.address.clone(),
            label: c.name.clone().unwrap_or_else(|| c.address.clone()),
            node_type: c.resource_type.clone(),
        })
        .collect();

    ResourceGraph {
        nodes,
        edges: edges.into_iter().collect(),
    }
}

fn collect_module_edges(
    module: &Value,
    prefix: &str,
    known: &BTreeMap<String, Vec<&str>>,
    edges: &mut BTreeSet<ResourceEdge>,
) {
    for resource in module
        .get("resources")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
    {
        let Some(address) = resource.get("address").and_then(Value::as_str) else {
            continue;
        };
        let Some(sources) = known.get(&format!("{prefix}{address}")) else {
            continue;
        };

        let mut references = Vec::new();
        if let Some(expressions) = resource.get("expressions") {
            collect_references(expressions, &mut references);
        }
        references.extend(
            resource
                .get("depends_on")
                .and_then(Value::as_array)
                .into_iter()
                .flatten()
                .filter_map(Value::as_str),
        );

        for reference in references {
            let Some(targets) = resolve_reference(&format!("{prefix}{reference}"), known) else {
                continue;
            };
            for source in sources {
                for target in targets.iter().filter(|t| *t != source) {
                    edges.insert(ResourceEdge {
                        source: (*source).to_string(),
                        target: (*target).to_string(),
                    });
                }
            }
        }
    }

    for (name, call) in module
        .get("module_calls")
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
    {
        if let Some(child) = call.get("module") {
            collect_module_edges(child, &format!("{prefix}module.{name}."), known, edges);
        }
    }
}

/// Collects every `references` entry below an expressions block.
fn collect_references<'v>(value: &'v Value, out: &mut Vec<&'v str>) {
    match value {
        Value::Object(map) => {
            for (key, inner) in map {
                if key == "references" {
                    out.extend(inner.as_array().into_iter().flatten().filter_map(Value::as_str));
                } else {
                    collect_references(inner, out);
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_references(item, out)),
        _ => {}
    }
}

/// Resolves a reference such as `aws_vpc.main.id` to known resources by
/// dropping trailing attribute segments.
fn resolve_reference<'k, 'a>(
    reference: &str,
    known: &'k BTreeMap<String, Vec<&'a str>>,
) -> Option<&'k Vec<&'a str>> {
    let mut candidate = strip_instance_keys(reference);
    loop {
        if let Some(found) = known.get(&candidate) {
            return Some(found);
        }
        let cut = candidate.rfind('.')?;
        candidate.truncate(cut);
    }
}

/// Removes `[...]` instance keys from an address.
fn strip_instance_keys(address: &str) -> String {
    let mut out = String::with_capacity(address.len());
    let mut depth = 0usize;
    for ch in address.chars() {
        match ch {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            _ if depth == 0 => out.push(ch),
            _ => {}
        }
    }
    out
}
