//! Plan document types.
//!
//! These types mirror the stored shape of an ingested plan: plan metadata at
//! the top level and the pruned Terraform document under `terraform_plan`.
//! Deserialization is permissive: missing or `null` collections become
//! empty, so partially corrupt payloads still classify as no change.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

use super::classify::{classify, ChangeCategory};

/// Field inspected on `before`/`after` when a change has no resource group.
pub const RESOURCE_GROUP_FIELD: &str = "resource_group_name";

/// One entry in a plan's `resource_changes`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourceChange {
    /// Unique address of the resource within its plan.
    #[serde(default, deserialize_with = "null_as_default")]
    pub address: String,
    /// Provider-specific resource type.
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub resource_type: String,
    /// Resource name within its module.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Deployment grouping label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    /// The planned change.
    #[serde(default, deserialize_with = "null_as_default")]
    pub change: ChangeDetail,
}

/// The `change` block of a resource change.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChangeDetail {
    /// Primitive action tokens.
    #[serde(default, deserialize_with = "null_as_default")]
    pub actions: Vec<String>,
    /// State before the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<serde_json::Value>,
    /// State after the change.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<serde_json::Value>,
}

/// Cloud platform detected from resource types.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CloudPlatform {
    /// Microsoft Azure (`azurerm_*`).
    Azure,
    /// Amazon Web Services (`aws_*`).
    #[serde(rename = "AWS")]
    Aws,
    /// Google Cloud (`google_*`).
    #[serde(rename = "GCP")]
    Gcp,
    /// Not detected.
    #[default]
    Unknown,
}

/// Internal resource adjacency of one plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceGraph {
    /// Resource nodes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub nodes: Vec<ResourceNode>,
    /// Dependency edges between resource nodes.
    #[serde(default, deserialize_with = "null_as_default")]
    pub edges: Vec<ResourceEdge>,
}

/// A node of a resource graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceNode {
    /// Resource address.
    pub id: String,
    /// Display label.
    #[serde(default)]
    pub label: String,
    /// Resource type.
    #[serde(rename = "type", default)]
    pub node_type: String,
}

/// A directed edge of a resource graph.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResourceEdge {
    /// Dependent resource.
    pub source: String,
    /// Resource depended upon.
    pub target: String,
}

/// The pruned Terraform document kept with a plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PlanDocument {
    /// Terraform JSON format version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,
    /// Resource changes in plan order.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource_changes: Vec<ResourceChange>,
}

/// An immutable ingested snapshot for one component, environment and branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Plan identifier.
    pub id: String,
    /// When the plan was produced.
    #[serde(with = "flexible_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// When the plan was stored; breaks timestamp ties.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingested_at: Option<DateTime<Utc>>,
    /// Owning project.
    #[serde(default)]
    pub project_id: String,
    /// Owning component.
    #[serde(default)]
    pub component_id: String,
    /// Component display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    /// Environment label.
    #[serde(default)]
    pub environment: String,
    /// Branch label; `None` means the project's default branch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Terraform version that produced the plan.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terraform_version: Option<String>,
    /// Detected cloud platform.
    #[serde(default)]
    pub cloud_platform: CloudPlatform,
    /// Configured providers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub providers: BTreeSet<String>,
    /// Keys of the components this component depends on.
    #[serde(default, deserialize_with = "null_as_default")]
    pub dependencies: Vec<String>,
    /// Internal resource adjacency.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_graph: Option<ResourceGraph>,
    /// Content hash of the pruned changes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
    /// Pruned Terraform document.
    #[serde(default, deserialize_with = "null_as_default")]
    pub terraform_plan: PlanDocument,
}

impl ResourceChange {
    /// Creates a change with the given address and actions.
    #[must_use]
    pub fn new(address: impl Into<String>, actions: &[&str]) -> Self {
        Self {
            address: address.into(),
            change: ChangeDetail {
                actions: actions.iter().map(|a| (*a).to_string()).collect(),
                before: None,
                after: None,
            },
            ..Self::default()
        }
    }

    /// Sets the resource type.
    #[must_use]
    pub fn with_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = resource_type.into();
        self
    }

    /// Sets the resource group.
    #[must_use]
    pub fn with_resource_group(mut self, group: impl Into<String>) -> Self {
        self.resource_group = Some(group.into());
        self
    }

    /// Classifies this change.
    #[must_use]
    pub fn category(&self) -> ChangeCategory {
        classify(&self.change.actions)
    }

    /// Resolves the resource group: the top-level field first, then
    /// `resource_group_name` on the after state, then on the before state.
    #[must_use]
    pub fn resolved_resource_group(&self) -> Option<&str> {
        fn from_state(state: Option<&serde_json::Value>) -> Option<&str> {
            state
                .and_then(|s| s.get(RESOURCE_GROUP_FIELD))
                .and_then(serde_json::Value::as_str)
                .filter(|s| !s.is_empty())
        }

        self.resource_group
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| from_state(self.change.after.as_ref()))
            .or_else(|| from_state(self.change.before.as_ref()))
    }

    /// Returns true if any action mutates infrastructure.
    #[must_use]
    pub fn is_mutating(&self) -> bool {
        self.change
            .actions
            .iter()
            .any(|a| matches!(a.as_str(), "create" | "update" | "delete"))
    }
}

impl CloudPlatform {
    /// Detects the platform from a resource type prefix.
    #[must_use]
    pub fn from_resource_type(resource_type: &str) -> Self {
        if resource_type.starts_with("azurerm_") {
            Self::Azure
        } else if resource_type.starts_with("aws_") {
            Self::Aws
        } else if resource_type.starts_with("google_") {
            Self::Gcp
        } else {
            Self::Unknown
        }
    }

    /// Returns true unless the platform is unknown.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl Plan {
    /// Creates an empty plan for one component and environment.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        component_id: impl Into<String>,
        environment: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            timestamp,
            ingested_at: None,
            project_id: String::new(),
            component_id: component_id.into(),
            component_name: None,
            environment: environment.into(),
            branch: None,
            terraform_version: None,
            cloud_platform: CloudPlatform::Unknown,
            providers: BTreeSet::new(),
            dependencies: Vec::new(),
            resource_graph: None,
            fingerprint: None,
            terraform_plan: PlanDocument::default(),
        }
    }

    /// Sets the resource changes.
    #[must_use]
    pub fn with_changes(mut self, changes: Vec<ResourceChange>) -> Self {
        self.terraform_plan.resource_changes = changes;
        self
    }

    /// Returns the plan's resource changes.
    #[must_use]
    pub fn resource_changes(&self) -> &[ResourceChange] {
        &self.terraform_plan.resource_changes
    }

    /// Returns the branch, falling back to the given default.
    #[must_use]
    pub fn branch_or<'a>(&'a self, default_branch: &'a str) -> &'a str {
        self.branch.as_deref().unwrap_or(default_branch)
    }

    /// Returns the component label for display.
    #[must_use]
    pub fn component_label(&self) -> &str {
        self.component_name.as_deref().unwrap_or(&self.component_id)
    }

    /// Ordering key for recency: timestamp, then ingestion time, then id.
    #[must_use]
    pub fn recency_key(&self) -> (DateTime<Utc>, Option<DateTime<Utc>>, &str) {
        (self.timestamp, self.ingested_at, self.id.as_str())
    }

    /// Returns true if any resource change mutates infrastructure.
    #[must_use]
    pub fn has_drift(&self) -> bool {
        self.resource_changes().iter().any(ResourceChange::is_mutating)
    }
}

impl std::fmt::Display for CloudPlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Azure => "Azure",
            Self::Aws => "AWS",
            Self::Gcp => "GCP",
            Self::Unknown => "Unknown",
        };
        write!(f, "{s}")
    }
}

/// Parses RFC 3339 timestamps and naive ISO timestamps (assumed UTC).
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|naive| naive.and_utc())
        })
}

/// Deserializes `null` as the type's default value.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

mod flexible_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::parse_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {raw}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resource_group_resolution_order() {
        let mut change = ResourceChange::new("azurerm_storage_account.main", &["update"]);
        change.change.before = Some(json!({ "resource_group_name": "rg-before" }));
        assert_eq!(change.resolved_resource_group(), Some("rg-before"));

        change.change.after = Some(json!({ "resource_group_name": "rg-after" }));
        assert_eq!(change.resolved_resource_group(), Some("rg-after"));

        change.resource_group = Some(String::from("rg-top"));
        assert_eq!(change.resolved_resource_group(), Some("rg-top"));
    }

    #[test]
    fn test_resource_group_skips_empty_values() {
        let mut change = ResourceChange::new("azurerm_subnet.a", &["create"]);
        change.resource_group = Some(String::new());
        change.change.after = Some(json!({ "resource_group_name": "" }));
        change.change.before = Some(json!({ "resource_group_name": "rg-old" }));
        assert_eq!(change.resolved_resource_group(), Some("rg-old"));

        change.change.before = Some(json!({ "resource_group_name": 42 }));
        assert_eq!(change.resolved_resource_group(), None);
    }

    #[test]
    fn test_null_fields_deserialize_as_defaults() {
        let change: ResourceChange = serde_json::from_value(json!({
            "address": "aws_s3_bucket.logs",
            "type": "aws_s3_bucket",
            "change": null
        }))
        .expect("null change is tolerated");

        assert!(change.change.actions.is_empty());
        assert_eq!(change.category(), ChangeCategory::NoOp);
    }

    #[test]
    fn test_plan_deserializes_api_shape() {
        let plan: Plan = serde_json::from_value(json!({
            "id": "p1",
            "project_id": "proj",
            "component_id": "c1",
            "component_name": "network",
            "environment": "dev",
            "timestamp": "2024-02-23T14:45:00.123456",
            "providers": null,
            "cloud_platform": "AWS",
            "terraform_plan": {
                "resource_changes": [
                    {
                        "address": "aws_vpc.main",
                        "type": "aws_vpc",
                        "change": { "actions": ["create"] }
                    }
                ]
            }
        }))
        .expect("api plan parses");

        assert_eq!(plan.cloud_platform, CloudPlatform::Aws);
        assert_eq!(plan.resource_changes().len(), 1);
        assert!(plan.has_drift());
        assert_eq!(plan.timestamp.to_rfc3339(), "2024-02-23T14:45:00.123456+00:00");
    }

    #[test]
    fn test_cloud_platform_detection() {
        assert_eq!(
            CloudPlatform::from_resource_type("azurerm_resource_group"),
            CloudPlatform::Azure
        );
        assert_eq!(CloudPlatform::from_resource_type("aws_instance"), CloudPlatform::Aws);
        assert_eq!(
            CloudPlatform::from_resource_type("google_compute_instance"),
            CloudPlatform::Gcp
        );
        assert_eq!(CloudPlatform::from_resource_type("random_id"), CloudPlatform::Unknown);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2024-02-23T14:45:00Z").is_some());
        assert!(parse_timestamp("2024-02-23T14:45:00.000+01:00").is_some());
        assert!(parse_timestamp("2024-02-23T14:45:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
