//! Component status and the drift matrix.
//!
//! The matrix crosses the project's components with its environments using
//! the latest plan of each pair.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::ComponentConfig;
use crate::plan::{ChangeCategory, Plan, ResourceChange};

use super::latest::LatestIndex;
use super::summary::percentage;

/// Status of one component in one environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Latest plan has no pending changes.
    Aligned,
    /// Latest plan creates, updates or deletes something.
    Drift,
    /// No plan ingested yet.
    Unknown,
    /// Component is not deployed to the environment.
    Excluded,
}

impl ComponentStatus {
    /// Status derived from the latest plan, if any.
    #[must_use]
    pub fn of(plan: Option<&Plan>) -> Self {
        match plan {
            None => Self::Unknown,
            Some(plan) if plan.has_drift() => Self::Drift,
            Some(_) => Self::Aligned,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Aligned => "aligned",
            Self::Drift => "drift",
            Self::Unknown => "unknown",
            Self::Excluded => "excluded",
        }
    }
}

/// Per-category counts for a report cell; a replacement counts once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionBreakdown {
    /// Resources to create.
    pub create: usize,
    /// Resources to update.
    pub update: usize,
    /// Resources to delete.
    pub delete: usize,
    /// Resources to recreate.
    pub replace: usize,
    /// Data sources read.
    pub read: usize,
}

impl ActionBreakdown {
    /// Counts the changes by category.
    pub fn from_changes<'a, I>(changes: I) -> Self
    where
        I: IntoIterator<Item = &'a ResourceChange>,
    {
        let mut breakdown = Self::default();

        for change in changes {
            match change.category() {
                ChangeCategory::Create => breakdown.create += 1,
                ChangeCategory::Update => breakdown.update += 1,
                ChangeCategory::Delete => breakdown.delete += 1,
                ChangeCategory::Replace => breakdown.replace += 1,
                ChangeCategory::Read | ChangeCategory::NoOp => {
                    if change.change.actions.iter().any(|a| a == "read") {
                        breakdown.read += 1;
                    }
                }
            }
        }

        breakdown
    }

    /// Number of pending changes, reads excluded.
    #[must_use]
    pub const fn pending(&self) -> usize {
        self.create + self.update + self.delete + self.replace
    }
}

/// One cell of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixCell {
    /// Environment of the cell.
    pub environment: String,
    /// Status of the component in the environment.
    pub status: ComponentStatus,
    /// Latest plan id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    /// Latest plan timestamp.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Change counts of the latest plan.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ActionBreakdown>,
}

/// One component row of the matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatrixRow {
    /// Component key.
    pub component_id: String,
    /// Component name.
    pub component_name: String,
    /// One cell per environment, in project order.
    pub cells: Vec<MatrixCell>,
}

/// Alignment of one environment across components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvironmentScore {
    /// Environment label.
    pub environment: String,
    /// Aligned components.
    pub aligned: usize,
    /// Non-excluded components.
    pub total: usize,
    /// `round(aligned / total * 100)`, 0 when no component applies.
    pub score: u8,
}

/// Project-wide counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OverviewMetrics {
    /// Cells with drift.
    pub drifted: usize,
    /// Aligned cells.
    pub aligned: usize,
    /// Cells without a plan.
    pub unknown: usize,
    /// `round(aligned / (aligned + drifted) * 100)`, 0 without known states.
    pub score: u8,
    /// Average age of the latest plans in whole days.
    pub average_age_days: u64,
}

/// Components x environments grid of latest-plan status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriftMatrix {
    /// Column labels.
    pub environments: Vec<String>,
    /// One row per component.
    pub rows: Vec<MatrixRow>,
    /// One score per environment.
    pub scores: Vec<EnvironmentScore>,
    /// Project-wide counts.
    pub overview: OverviewMetrics,
}

impl DriftMatrix {
    /// Builds the matrix from the latest plans.
    ///
    /// `now` is the reference instant for plan ages.
    #[must_use]
    pub fn build(
        components: &[ComponentConfig],
        environments: &[String],
        latest: &LatestIndex<'_>,
        now: DateTime<Utc>,
    ) -> Self {
        let mut scores: Vec<EnvironmentScore> = environments
            .iter()
            .map(|env| EnvironmentScore {
                environment: env.clone(),
                aligned: 0,
                total: 0,
                score: 0,
            })
            .collect();
        let mut overview = OverviewMetrics::default();
        let mut ages: Vec<i64> = Vec::new();

        let rows = components
            .iter()
            .map(|component| {
                let cells = environments
                    .iter()
                    .zip(scores.iter_mut())
                    .map(|(env, score)| {
                        if component.is_excluded_from(env) {
                            return MatrixCell {
                                environment: env.clone(),
                                status: ComponentStatus::Excluded,
                                plan_id: None,
                                timestamp: None,
                                breakdown: None,
                            };
                        }

                        let plan = latest.get(component.key(), env);
                        let status = ComponentStatus::of(plan);

                        score.total += 1;
                        match status {
                            ComponentStatus::Aligned => {
                                score.aligned += 1;
                                overview.aligned += 1;
                            }
                            ComponentStatus::Drift => overview.drifted += 1,
                            ComponentStatus::Unknown => overview.unknown += 1,
                            ComponentStatus::Excluded => {}
                        }

                        if let Some(plan) = plan {
                            ages.push((now - plan.timestamp).num_seconds().max(0));
                        }

                        MatrixCell {
                            environment: env.clone(),
                            status,
                            plan_id: plan.map(|p| p.id.clone()),
                            timestamp: plan.map(|p| p.timestamp),
                            breakdown: plan
                                .map(|p| ActionBreakdown::from_changes(p.resource_changes())),
                        }
                    })
                    .collect();

                MatrixRow {
                    component_id: component.key().to_string(),
                    component_name: component.name.clone(),
                    cells,
                }
            })
            .collect();

        for score in &mut scores {
            score.score = percentage(score.aligned, score.total, 0);
        }
        overview.score = percentage(overview.aligned, overview.aligned + overview.drifted, 0);
        overview.average_age_days = average_days(&ages);

        Self {
            environments: environments.to_vec(),
            rows,
            scores,
            overview,
        }
    }

    /// Looks up a cell.
    #[must_use]
    pub fn cell(&self, component_id: &str, environment: &str) -> Option<&MatrixCell> {
        self.rows
            .iter()
            .find(|row| row.component_id == component_id)
            .and_then(|row| row.cells.iter().find(|cell| cell.environment == environment))
    }
}

/// Rounded mean of ages in seconds, expressed in days.
fn average_days(ages: &[i64]) -> u64 {
    const DAY: u64 = 86_400;

    if ages.is_empty() {
        return 0;
    }
    let total: u64 = ages.iter().map(|&a| a.unsigned_abs()).sum();
    let divisor = ages.len() as u64 * DAY;
    (total * 2 + divisor) / (divisor * 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drift::BranchFilter;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 10, 12, 0, 0).unwrap()
    }

    fn plan(id: &str, component: &str, env: &str, days_old: i64, actions: &[&str]) -> Plan {
        Plan::new(id, component, env, now() - Duration::days(days_old))
            .with_changes(vec![ResourceChange::new(format!("{id}.r"), actions)])
    }

    fn components() -> Vec<ComponentConfig> {
        let mut app = ComponentConfig::named("app");
        app.excluded_environments = vec![String::from("prod")];
        vec![ComponentConfig::named("network"), app, ComponentConfig::named("db")]
    }

    fn environments() -> Vec<String> {
        vec![String::from("dev"), String::from("prod")]
    }

    #[test]
    fn test_status_of_plan() {
        assert_eq!(ComponentStatus::of(None), ComponentStatus::Unknown);
        let read_only = plan("r", "app", "dev", 0, &["read"]);
        assert_eq!(ComponentStatus::of(Some(&read_only)), ComponentStatus::Aligned);
        let drifted = plan("d", "app", "dev", 0, &["delete", "create"]);
        assert_eq!(ComponentStatus::of(Some(&drifted)), ComponentStatus::Drift);
    }

    #[test]
    fn test_breakdown_counts_replace_once() {
        let changes = [
            ResourceChange::new("a", &["create", "delete"]),
            ResourceChange::new("b", &["create"]),
            ResourceChange::new("c", &["read"]),
            ResourceChange::new("d", &["no-op"]),
        ];
        let breakdown = ActionBreakdown::from_changes(&changes);
        assert_eq!(breakdown.replace, 1);
        assert_eq!(breakdown.create, 1);
        assert_eq!(breakdown.read, 1);
        assert_eq!(breakdown.pending(), 2);
    }

    #[test]
    fn test_matrix_scores() {
        let plans = [
            plan("n-dev", "network", "dev", 2, &["no-op"]),
            plan("n-prod", "network", "prod", 4, &["update"]),
            plan("a-dev", "app", "dev", 6, &["no-op"]),
        ];
        let latest = LatestIndex::build(&plans, BranchFilter::any());
        let matrix = DriftMatrix::build(&components(), &environments(), &latest, now());

        assert_eq!(matrix.rows.len(), 3);
        assert_eq!(
            matrix.cell("app", "prod").map(|c| c.status),
            Some(ComponentStatus::Excluded)
        );
        assert_eq!(
            matrix.cell("db", "dev").map(|c| c.status),
            Some(ComponentStatus::Unknown)
        );

        // dev: network and app aligned, db unknown
        assert_eq!(matrix.scores[0].aligned, 2);
        assert_eq!(matrix.scores[0].total, 3);
        assert_eq!(matrix.scores[0].score, 67);
        // prod: network drifted, db unknown, app excluded
        assert_eq!(matrix.scores[1].total, 2);
        assert_eq!(matrix.scores[1].score, 0);

        assert_eq!(matrix.overview.aligned, 2);
        assert_eq!(matrix.overview.drifted, 1);
        assert_eq!(matrix.overview.unknown, 2);
        assert_eq!(matrix.overview.score, 67);
        assert_eq!(matrix.overview.average_age_days, 4);
    }

    #[test]
    fn test_empty_matrix() {
        let latest = LatestIndex::build(std::iter::empty(), BranchFilter::any());
        let matrix = DriftMatrix::build(&[], &environments(), &latest, now());

        assert!(matrix.rows.is_empty());
        assert!(matrix.scores.iter().all(|s| s.score == 0 && s.total == 0));
        assert_eq!(matrix.overview.score, 0);
        assert_eq!(matrix.overview.average_age_days, 0);
    }
}
