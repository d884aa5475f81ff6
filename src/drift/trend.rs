//! Trend series over a plan history.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use crate::plan::Plan;

use super::latest::chronological;
use super::summary::DriftSummary;

/// One point of a trend series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrendPoint {
    /// Timestamp of the plan behind this point.
    pub timestamp: DateTime<Utc>,
    /// Plan behind this point.
    pub plan_id: String,
    /// Component of the plan.
    pub component_id: String,
    /// Environment of the plan.
    pub environment: String,
    /// Summary of this plan's own changes.
    pub summary: DriftSummary,
    /// Last known summary per component and environment as of this point,
    /// ordered by component then environment.
    ///
    /// Empty when the series covers a single component in a single
    /// environment.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub per_component: Vec<ComponentTrend>,
}

/// Last known state of one component in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentTrend {
    /// Component key.
    pub component_id: String,
    /// Environment of the component's latest plan.
    pub environment: String,
    /// Summary of that plan.
    pub summary: DriftSummary,
}

impl TrendPoint {
    /// Last known state of a component in an environment.
    #[must_use]
    pub fn component_state(&self, component_id: &str, environment: &str) -> Option<&DriftSummary> {
        self.per_component
            .iter()
            .find(|c| c.component_id == component_id && c.environment == environment)
            .map(|c| &c.summary)
    }
}

/// Builds one point per plan, oldest first.
///
/// Each point summarizes only its own plan's changes. When several
/// components or environments are involved, every point also carries the
/// summary of the most recent plan seen so far for each component in each
/// environment.
#[must_use]
pub fn trend_series<'a, I>(plans: I) -> Vec<TrendPoint>
where
    I: IntoIterator<Item = &'a Plan>,
{
    let ordered = chronological(plans);
    let scopes: BTreeSet<(&str, &str)> = ordered
        .iter()
        .map(|p| (p.component_id.as_str(), p.environment.as_str()))
        .collect();
    let breakdown = scopes.len() > 1;

    let mut running: BTreeMap<(&str, &str), DriftSummary> = BTreeMap::new();

    ordered
        .into_iter()
        .map(|plan| {
            let summary = DriftSummary::from_changes(plan.resource_changes());

            let per_component = if breakdown {
                running.insert((plan.component_id.as_str(), plan.environment.as_str()), summary);
                running
                    .iter()
                    .map(|(&(component_id, environment), &summary)| ComponentTrend {
                        component_id: component_id.to_string(),
                        environment: environment.to_string(),
                        summary,
                    })
                    .collect()
            } else {
                Vec::new()
            };

            TrendPoint {
                timestamp: plan.timestamp,
                plan_id: plan.id.clone(),
                component_id: plan.component_id.clone(),
                environment: plan.environment.clone(),
                summary,
                per_component,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ResourceChange;
    use chrono::TimeZone;

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, 9, 0, 0).unwrap()
    }

    fn plan(id: &str, component: &str, day: u32, actions: &[&[&str]]) -> Plan {
        plan_in(id, component, "dev", day, actions)
    }

    fn plan_in(id: &str, component: &str, env: &str, day: u32, actions: &[&[&str]]) -> Plan {
        let changes = actions
            .iter()
            .enumerate()
            .map(|(i, a)| ResourceChange::new(format!("{id}.r{i}"), a))
            .collect();
        Plan::new(id, component, env, at(day)).with_changes(changes)
    }

    #[test]
    fn test_points_are_not_cumulative() {
        let plans = [
            plan("p3", "app", 3, &[&["no-op"]]),
            plan("p1", "app", 1, &[&["create"], &["create"]]),
            plan("p2", "app", 2, &[&["delete"]]),
        ];

        let series = trend_series(&plans);
        assert_eq!(series.len(), 3);
        assert_eq!(
            series.iter().map(|p| p.plan_id.as_str()).collect::<Vec<_>>(),
            ["p1", "p2", "p3"]
        );
        assert_eq!(series[0].summary, DriftSummary::from_counts(2, 0, 0, 0));
        assert_eq!(series[1].summary, DriftSummary::from_counts(0, 0, 1, 0));
        assert_eq!(series[2].summary.alignment_percentage, 100);
        assert!(series.iter().all(|p| p.per_component.is_empty()));
    }

    #[test]
    fn test_per_component_last_known_state() {
        let plans = [
            plan("a1", "app", 1, &[&["create"]]),
            plan("n1", "net", 2, &[&["no-op"]]),
            plan("a2", "app", 3, &[&["update"], &["no-op"]]),
        ];

        let series = trend_series(&plans);

        assert_eq!(series[0].per_component.len(), 1);
        let state = |i: usize, component: &str| {
            *series[i].component_state(component, "dev").expect("state is known")
        };
        assert_eq!(state(1, "app").created, 1);
        assert_eq!(state(1, "net").alignment_percentage, 100);
        assert_eq!(state(2, "app").updated, 1);
        assert_eq!(state(2, "app").created, 0);
        assert_eq!(state(2, "net").alignment_percentage, 100);
    }

    #[test]
    fn test_environments_keep_separate_state() {
        let plans = [
            plan_in("a-dev", "app", "dev", 1, &[&["create"]]),
            plan_in("n-dev", "net", "dev", 2, &[&["no-op"]]),
            plan_in("a-prod", "app", "prod", 3, &[&["no-op"]]),
        ];

        let series = trend_series(&plans);
        let last = &series[2];

        assert_eq!(last.per_component.len(), 3);
        assert_eq!(
            last.component_state("app", "dev").map(|s| s.created),
            Some(1)
        );
        assert_eq!(
            last.component_state("app", "prod").map(|s| s.alignment_percentage),
            Some(100)
        );
        let scopes: Vec<(&str, &str)> = last
            .per_component
            .iter()
            .map(|c| (c.component_id.as_str(), c.environment.as_str()))
            .collect();
        assert_eq!(scopes, [("app", "dev"), ("app", "prod"), ("net", "dev")]);
    }

    #[test]
    fn test_one_component_in_two_environments_has_breakdown() {
        let plans = [
            plan_in("d", "app", "dev", 1, &[&["update"]]),
            plan_in("p", "app", "prod", 2, &[&["no-op"]]),
        ];

        let series = trend_series(&plans);
        assert_eq!(
            series[1].component_state("app", "dev").map(|s| s.updated),
            Some(1)
        );
    }

    #[test]
    fn test_empty_history() {
        assert!(trend_series(std::iter::empty()).is_empty());
    }
}
