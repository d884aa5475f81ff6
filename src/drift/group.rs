//! Grouped aggregation.
//!
//! Changes are partitioned into labeled buckets first; each bucket is then
//! summarized on its own. Bucket labels are case-sensitive, and buckets are
//! listed in case-insensitive lexicographic order.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use crate::plan::{Plan, ResourceChange};

use super::summary::DriftSummary;

/// Label for changes without a resource group.
pub const UNGROUPED_RESOURCES: &str = "Ungrouped Resources";

/// Label for changes without an environment or type.
pub const UNKNOWN: &str = "Unknown";

/// Key used to partition resource changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupKey {
    /// Resource type.
    Type,
    /// Resource group, resolved from the change's state when absent.
    ResourceGroup,
    /// Environment of the owning plan.
    Environment,
}

/// Display label of a group.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupLabel(String);

/// Result of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Aggregate {
    /// One summary over every change.
    Total(DriftSummary),
    /// One summary per group.
    Grouped(BTreeMap<GroupLabel, DriftSummary>),
}

impl GroupLabel {
    /// Creates a label.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self(label.into())
    }

    /// Returns the label text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Ord for GroupLabel {
    fn cmp(&self, other: &Self) -> Ordering {
        let folded = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
        folded(&self.0)
            .cmp(&folded(&other.0))
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for GroupLabel {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for GroupLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl GroupKey {
    /// Label of a change under this key.
    ///
    /// `environment` is the environment of the plan owning the change, if
    /// known.
    #[must_use]
    pub fn label(self, change: &ResourceChange, environment: Option<&str>) -> GroupLabel {
        let label = match self {
            Self::Type => non_empty(Some(change.resource_type.as_str())).unwrap_or(UNKNOWN),
            Self::ResourceGroup => change.resolved_resource_group().unwrap_or(UNGROUPED_RESOURCES),
            Self::Environment => non_empty(environment).unwrap_or(UNKNOWN),
        };
        GroupLabel::new(label)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Partitions changes by `key`.
///
/// Bare changes carry no environment, so grouping them by
/// [`GroupKey::Environment`] yields a single [`UNKNOWN`] bucket; use
/// [`group_plan_changes`] instead.
#[must_use]
pub fn group_changes(
    changes: &[ResourceChange],
    key: GroupKey,
) -> BTreeMap<GroupLabel, Vec<&ResourceChange>> {
    let mut groups: BTreeMap<GroupLabel, Vec<&ResourceChange>> = BTreeMap::new();
    for change in changes {
        groups.entry(key.label(change, None)).or_default().push(change);
    }
    groups
}

/// Partitions the changes of several plans by `key`.
#[must_use]
pub fn group_plan_changes<'a, I>(
    plans: I,
    key: GroupKey,
) -> BTreeMap<GroupLabel, Vec<&'a ResourceChange>>
where
    I: IntoIterator<Item = &'a Plan>,
{
    let mut groups: BTreeMap<GroupLabel, Vec<&ResourceChange>> = BTreeMap::new();
    for plan in plans {
        for change in plan.resource_changes() {
            groups
                .entry(key.label(change, Some(&plan.environment)))
                .or_default()
                .push(change);
        }
    }
    groups
}

/// Summarizes each group of `changes` independently.
#[must_use]
pub fn aggregate_grouped(
    changes: &[ResourceChange],
    key: GroupKey,
) -> BTreeMap<GroupLabel, DriftSummary> {
    summarize_groups(group_changes(changes, key))
}

/// Summarizes each group of the plans' changes independently.
#[must_use]
pub fn aggregate_plans_grouped<'a, I>(plans: I, key: GroupKey) -> BTreeMap<GroupLabel, DriftSummary>
where
    I: IntoIterator<Item = &'a Plan>,
{
    summarize_groups(group_plan_changes(plans, key))
}

/// Summarizes `changes`, optionally per group.
#[must_use]
pub fn aggregate(changes: &[ResourceChange], group_by: Option<GroupKey>) -> Aggregate {
    match group_by {
        None => Aggregate::Total(DriftSummary::from_changes(changes)),
        Some(key) => Aggregate::Grouped(aggregate_grouped(changes, key)),
    }
}

fn summarize_groups(
    groups: BTreeMap<GroupLabel, Vec<&ResourceChange>>,
) -> BTreeMap<GroupLabel, DriftSummary> {
    groups
        .into_iter()
        .map(|(label, members)| (label, DriftSummary::from_changes(members)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn labels<V>(groups: &BTreeMap<GroupLabel, V>) -> Vec<&str> {
        groups.keys().map(GroupLabel::as_str).collect()
    }

    fn label(text: &str) -> GroupLabel {
        GroupLabel::new(text)
    }

    fn in_group(group: &str) -> ResourceChange {
        ResourceChange::new(format!("r.{group}"), &["update"]).with_resource_group(group)
    }

    #[test]
    fn test_resource_group_buckets_and_order() {
        let changes = vec![
            in_group("rg-a"),
            in_group("rg-a"),
            in_group("rg-b"),
            ResourceChange::new("r.none", &["no-op"]),
        ];

        let groups = group_changes(&changes, GroupKey::ResourceGroup);
        assert_eq!(labels(&groups), ["rg-a", "rg-b", UNGROUPED_RESOURCES]);
        assert_eq!(groups[&label("rg-a")].len(), 2);
        assert_eq!(groups[&label("rg-b")].len(), 1);
        assert_eq!(groups[&label(UNGROUPED_RESOURCES)].len(), 1);
    }

    #[test]
    fn test_grouping_is_a_partition() {
        let changes = vec![
            in_group("rg-a"),
            in_group("RG-A"),
            ResourceChange::new("x", &["create"]).with_type("aws_vpc"),
            ResourceChange::new("y", &["delete"]),
        ];

        for key in [GroupKey::Type, GroupKey::ResourceGroup, GroupKey::Environment] {
            let groups = group_changes(&changes, key);
            let mut seen: Vec<*const ResourceChange> = groups
                .values()
                .flatten()
                .map(|c| std::ptr::from_ref::<ResourceChange>(*c))
                .collect();
            seen.sort();
            seen.dedup();
            assert_eq!(seen.len(), changes.len());
            assert_eq!(groups.values().map(Vec::len).sum::<usize>(), changes.len());
        }

        let by_group = group_changes(&changes, GroupKey::ResourceGroup);
        assert!(by_group.contains_key(&label("rg-a")));
        assert!(by_group.contains_key(&label("RG-A")));
    }

    #[test]
    fn test_case_insensitive_order_with_stable_ties() {
        let mut keys = vec![
            GroupLabel::new("beta"),
            GroupLabel::new("Alpha"),
            GroupLabel::new("alpha"),
            GroupLabel::new("Gamma"),
        ];
        keys.sort();
        let sorted: Vec<&str> = keys.iter().map(GroupLabel::as_str).collect();
        assert_eq!(sorted, ["Alpha", "alpha", "beta", "Gamma"]);
    }

    #[test]
    fn test_grouped_summaries_are_independent() {
        let changes = vec![
            in_group("rg-a"),
            ResourceChange::new("ok", &["no-op"]).with_resource_group("rg-a"),
            ResourceChange::new("ok2", &["no-op"]).with_resource_group("rg-b"),
        ];

        let grouped = aggregate_grouped(&changes, GroupKey::ResourceGroup);
        assert_eq!(grouped[&label("rg-a")].alignment_percentage, 50);
        assert_eq!(grouped[&label("rg-b")].alignment_percentage, 100);

        let Aggregate::Total(total) = aggregate(&changes, None) else {
            panic!("expected a total summary");
        };
        assert_eq!(total.alignment_percentage, 67);
    }

    #[test]
    fn test_environment_grouping_over_plans() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let plan = |env: &str, changes: Vec<ResourceChange>| {
            Plan::new(format!("p-{env}"), "app", env, at).with_changes(changes)
        };

        let plans = [
            plan("prod", vec![ResourceChange::new("a", &["create"])]),
            plan("dev", vec![ResourceChange::new("b", &["no-op"])]),
            plan("", vec![ResourceChange::new("c", &["no-op"])]),
        ];

        let grouped = aggregate_plans_grouped(&plans, GroupKey::Environment);
        assert_eq!(labels(&grouped), ["dev", "prod", UNKNOWN]);
        assert_eq!(grouped[&label("prod")].created, 1);

        let bare = group_changes(plans[0].resource_changes(), GroupKey::Environment);
        assert_eq!(labels(&bare), [UNKNOWN]);
    }
}
