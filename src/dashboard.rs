//! Dashboard views over a plan source.
//!
//! Each view loads the project's plans from a [`PlanSource`], keeps the
//! requested branch and folds the plans into one report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::config::DriftConfig;
use crate::drift::{
    aggregate, aggregate_plans_grouped, trend_series, Aggregate, BranchFilter, DriftMatrix,
    DriftSummary, GroupKey, LatestIndex, TrendPoint,
};
use crate::error::Result;
use crate::graph::{dependency_edges, ComponentInput, GraphLayout};
use crate::plan::{ChangeCategory, ChangeFilter, IngestRequest, Plan, PlanIngestor};
use crate::store::{LocalPlanStore, PlanFilter, PlanSource};

/// Latest-state summary of one component in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentSummary {
    /// Component key.
    pub component_id: String,
    /// Component display name.
    pub component_name: String,
    /// Environment of the plan.
    pub environment: String,
    /// Plan the summary comes from.
    pub plan_id: String,
    /// When that plan was produced.
    pub timestamp: DateTime<Utc>,
    /// Counts and alignment.
    pub summary: DriftSummary,
}

/// Summary of every current plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryReport {
    /// One entry per current plan, ordered by component then environment.
    pub components: Vec<ComponentSummary>,
    /// Summary over the changes of every current plan.
    pub total: DriftSummary,
}

/// One listed resource change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceRow {
    /// Component owning the change.
    pub component_id: String,
    /// Environment of the plan.
    pub environment: String,
    /// Resource address.
    pub address: String,
    /// Resource type.
    pub resource_type: String,
    /// Resolved resource group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_group: Option<String>,
    /// Display category.
    pub category: ChangeCategory,
    /// Raw action list.
    pub actions: Vec<String>,
}

/// Resource listing of the current plans.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResourceReport {
    /// Rows passing the filter.
    pub rows: Vec<ResourceRow>,
    /// Summary of every change of the listed plans, unfiltered.
    pub aggregate: Aggregate,
}

/// Options of the resource listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceQuery<'q> {
    /// Environment to list; `None` lists every environment.
    pub environment: Option<&'q str>,
    /// Component to list; `None` lists every component.
    pub component: Option<&'q str>,
    /// Grouping of the aggregate.
    pub group_by: Option<GroupKey>,
    /// Row filter.
    pub filter: ChangeFilter,
}

/// Read-side views of a project's drift.
pub struct Dashboard<'a, S: PlanSource> {
    /// Project configuration.
    config: &'a DriftConfig,
    /// Plan source.
    source: &'a S,
    /// Branch to report on; `None` means every branch.
    branch: Option<String>,
}

impl<'a, S: PlanSource> Dashboard<'a, S> {
    /// Creates a dashboard reporting on the project's default branch.
    #[must_use]
    pub fn new(config: &'a DriftConfig, source: &'a S) -> Self {
        Self {
            config,
            source,
            branch: Some(config.project.default_branch.clone()),
        }
    }

    /// Sets the branch to report on; `None` reports on every branch.
    #[must_use]
    pub fn with_branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    fn branch_filter(&self) -> BranchFilter<'_> {
        BranchFilter::new(self.branch.as_deref(), &self.config.project.default_branch)
    }

    /// Loads the project's plans on the selected branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub async fn plans(
        &self,
        component: Option<&str>,
        environment: Option<&str>,
    ) -> Result<Vec<Plan>> {
        let mut filter = PlanFilter::all().project(self.config.project.key());
        filter.component_id = component.map(str::to_string);
        filter.environment = environment.map(str::to_string);

        let branch = self.branch_filter();
        let plans: Vec<Plan> = self
            .source
            .list(&filter)
            .await?
            .into_iter()
            .filter(|p| branch.accepts(p))
            .collect();

        debug!(
            "Loaded {} plan(s) from {} source",
            plans.len(),
            self.source.backend_type()
        );
        Ok(plans)
    }

    /// Summarizes the current plan of each component.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub async fn summary(&self, environment: Option<&str>) -> Result<SummaryReport> {
        let plans = self.plans(None, environment).await?;
        let latest = LatestIndex::build(&plans, BranchFilter::any());

        let components = latest
            .plans()
            .map(|plan| ComponentSummary {
                component_id: plan.component_id.clone(),
                component_name: self.component_name(plan),
                environment: plan.environment.clone(),
                plan_id: plan.id.clone(),
                timestamp: plan.timestamp,
                summary: DriftSummary::from_changes(plan.resource_changes()),
            })
            .collect();
        let total = DriftSummary::from_changes(latest.plans().flat_map(Plan::resource_changes));

        Ok(SummaryReport { components, total })
    }

    /// Lists the resource changes of the current plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub async fn resources(&self, query: ResourceQuery<'_>) -> Result<ResourceReport> {
        let plans = self.plans(query.component, query.environment).await?;
        let latest = LatestIndex::build(&plans, BranchFilter::any());

        let rows = latest
            .plans()
            .flat_map(|plan| {
                query
                    .filter
                    .apply(plan.resource_changes())
                    .into_iter()
                    .map(move |change| ResourceRow {
                        component_id: plan.component_id.clone(),
                        environment: plan.environment.clone(),
                        address: change.address.clone(),
                        resource_type: change.resource_type.clone(),
                        resource_group: change.resolved_resource_group().map(str::to_string),
                        category: ChangeCategory::display_category(&change.change.actions),
                        actions: change.change.actions.clone(),
                    })
            })
            .collect();

        let aggregate = match query.group_by {
            Some(GroupKey::Environment) => {
                Aggregate::Grouped(aggregate_plans_grouped(latest.plans(), GroupKey::Environment))
            }
            group_by => {
                let changes: Vec<_> = latest
                    .plans()
                    .flat_map(|p| p.resource_changes().iter().cloned())
                    .collect();
                aggregate(&changes, group_by)
            }
        };

        Ok(ResourceReport { rows, aggregate })
    }

    /// Builds the components x environments matrix.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub async fn matrix(&self, now: DateTime<Utc>) -> Result<DriftMatrix> {
        let plans = self.plans(None, None).await?;
        let latest = LatestIndex::build(&plans, BranchFilter::any());
        Ok(DriftMatrix::build(
            &self.config.components,
            &self.config.project.environments,
            &latest,
            now,
        ))
    }

    /// Builds the trend series of the selected plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub async fn trend(
        &self,
        component: Option<&str>,
        environment: Option<&str>,
    ) -> Result<Vec<TrendPoint>> {
        let plans = self.plans(component, environment).await?;
        Ok(trend_series(&plans))
    }

    /// Lays out the dependency graph of one environment.
    ///
    /// Components excluded from the environment are left out. Dependencies
    /// come from the current plans and from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the source cannot be read.
    pub async fn graph(&self, environment: &str) -> Result<GraphLayout> {
        let plans = self.plans(None, Some(environment)).await?;
        let latest = LatestIndex::build(&plans, BranchFilter::any());

        let inputs: Vec<ComponentInput<'_>> = self
            .config
            .components
            .iter()
            .filter(|c| !c.is_excluded_from(environment))
            .map(|c| ComponentInput {
                id: c.key(),
                label: &c.name,
                plan: latest.get(c.key(), environment),
            })
            .collect();

        let drawn: BTreeSet<&str> = inputs.iter().map(|c| c.id).collect();
        let mut edges: BTreeSet<(String, String)> = dependency_edges(&inputs).into_iter().collect();
        for component in self.config.components.iter().filter(|c| drawn.contains(c.key())) {
            for target in self.config.dependency_keys(component) {
                if drawn.contains(target.as_str()) && target != component.key() {
                    edges.insert((component.key().to_string(), target));
                }
            }
        }
        let edges: Vec<(String, String)> = edges.into_iter().collect();

        Ok(GraphLayout::build(&inputs, &edges))
    }

    fn component_name(&self, plan: &Plan) -> String {
        self.config
            .component_by_key(&plan.component_id)
            .map_or_else(|| plan.component_label().to_string(), |c| c.name.clone())
    }
}

/// Ingests a raw Terraform plan into the local archive.
///
/// The platform lock and the stale check are resolved against the plans
/// already stored.
///
/// # Errors
///
/// Returns an error if ingestion rejects the plan or the archive cannot be
/// read or written.
pub async fn ingest(
    config: &DriftConfig,
    store: &LocalPlanStore,
    raw: &Value,
    request: &IngestRequest,
) -> Result<Plan> {
    let locked = store.locked_platform(config.project.key()).await?;

    let key = config
        .component(&request.component)
        .or_else(|| config.component_by_key(&request.component))
        .map(|c| c.key().to_string());
    let latest = match key {
        Some(key) => store.latest_for(&key, &request.environment).await?,
        None => None,
    };

    let plan = PlanIngestor::new(config)
        .with_locked_platform(locked)
        .ingest(raw, request, latest.as_ref())?;
    store.save(&plan).await?;

    info!(
        "Ingested plan {} ({} change(s)) for {}/{}",
        plan.id,
        plan.resource_changes().len(),
        plan.component_id,
        plan.environment
    );
    Ok(plan)
}
