//! Latest-state resolution.
//!
//! Only the most recent plan per `(component, environment)` is current.
//! Recency is decided by sorting, never by the order plans arrive in.

use std::collections::BTreeMap;

use crate::plan::Plan;

/// Sorts plans oldest first by timestamp, then ingestion order.
pub fn sort_chronological(plans: &mut [Plan]) {
    plans.sort_by(|a, b| a.recency_key().cmp(&b.recency_key()));
}

/// Returns references to the plans, oldest first.
#[must_use]
pub fn chronological<'a, I>(plans: I) -> Vec<&'a Plan>
where
    I: IntoIterator<Item = &'a Plan>,
{
    let mut sorted: Vec<&Plan> = plans.into_iter().collect();
    sorted.sort_by(|a, b| a.recency_key().cmp(&b.recency_key()));
    sorted
}

/// Branch selection applied before resolving the latest plans.
#[derive(Debug, Clone, Copy)]
pub struct BranchFilter<'b> {
    /// Branch to keep; `None` keeps every branch.
    pub branch: Option<&'b str>,
    /// Branch assumed for plans that do not carry one.
    pub default_branch: &'b str,
}

impl<'b> BranchFilter<'b> {
    /// Keeps plans on `branch`.
    #[must_use]
    pub const fn new(branch: Option<&'b str>, default_branch: &'b str) -> Self {
        Self {
            branch,
            default_branch,
        }
    }

    /// Keeps every plan.
    #[must_use]
    pub const fn any() -> Self {
        Self {
            branch: None,
            default_branch: "",
        }
    }

    /// Returns true if the plan passes the filter.
    #[must_use]
    pub fn accepts(&self, plan: &Plan) -> bool {
        self.branch
            .is_none_or(|branch| plan.branch_or(self.default_branch) == branch)
    }
}

/// Index of the current plan per `(component, environment)`.
#[derive(Debug, Default)]
pub struct LatestIndex<'a> {
    latest: BTreeMap<&'a str, BTreeMap<&'a str, &'a Plan>>,
}

impl<'a> LatestIndex<'a> {
    /// Builds the index from plans in any order.
    pub fn build<I>(plans: I, filter: BranchFilter<'_>) -> Self
    where
        I: IntoIterator<Item = &'a Plan>,
    {
        let mut latest: BTreeMap<&str, BTreeMap<&str, &Plan>> = BTreeMap::new();

        for plan in plans.into_iter().filter(|p| filter.accepts(p)) {
            let slot = latest
                .entry(plan.component_id.as_str())
                .or_default()
                .entry(plan.environment.as_str())
                .or_insert(plan);
            if slot.recency_key() < plan.recency_key() {
                *slot = plan;
            }
        }

        Self { latest }
    }

    /// Current plan for a component in an environment.
    #[must_use]
    pub fn get(&self, component_id: &str, environment: &str) -> Option<&'a Plan> {
        self.latest
            .get(component_id)
            .and_then(|envs| envs.get(environment))
            .copied()
    }

    /// Current plans of one environment, ordered by component.
    #[must_use]
    pub fn for_environment(&self, environment: &str) -> Vec<&'a Plan> {
        self.latest
            .values()
            .filter_map(|envs| envs.get(environment).copied())
            .collect()
    }

    /// Every current plan, ordered by component then environment.
    pub fn plans(&self) -> impl Iterator<Item = &'a Plan> + '_ {
        self.latest.values().flat_map(|envs| envs.values().copied())
    }

    /// Number of current plans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.latest.values().map(BTreeMap::len).sum()
    }

    /// Returns true if no plan is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }
}
