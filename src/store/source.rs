//! Plan source trait definition.
//!
//! This module defines the common interface for the local archive and the
//! remote drift API.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::plan::Plan;

/// Selection applied when listing plans. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlanFilter {
    /// Project key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    /// Component key.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_id: Option<String>,
    /// Environment label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,
    /// Branch label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl PlanFilter {
    /// Matches every plan.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Restricts to one component.
    #[must_use]
    pub fn component(mut self, component_id: impl Into<String>) -> Self {
        self.component_id = Some(component_id.into());
        self
    }

    /// Restricts to one environment.
    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = Some(environment.into());
        self
    }

    /// Restricts to one branch.
    #[must_use]
    pub fn branch(mut self, branch: Option<String>) -> Self {
        self.branch = branch;
        self
    }

    /// Restricts to one project.
    #[must_use]
    pub fn project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Returns true if the plan passes the filter.
    #[must_use]
    pub fn matches(&self, plan: &Plan) -> bool {
        fn accepts(wanted: Option<&String>, actual: Option<&str>) -> bool {
            wanted.is_none_or(|w| actual == Some(w.as_str()))
        }

        accepts(self.project_id.as_ref(), Some(&plan.project_id))
            && accepts(self.component_id.as_ref(), Some(&plan.component_id))
            && accepts(self.environment.as_ref(), Some(&plan.environment))
            && accepts(self.branch.as_ref(), plan.branch.as_deref())
    }
}

/// Trait for plan sources.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanSource: Send + Sync {
    /// Lists plans matching the filter, newest first.
    async fn list(&self, filter: &PlanFilter) -> Result<Vec<Plan>>;

    /// Fetches one plan.
    async fn get(&self, id: &str) -> Result<Plan>;

    /// Deletes one plan.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Gets the backend type name.
    fn backend_type(&self) -> &'static str;
}

#[async_trait]
impl PlanSource for Box<dyn PlanSource> {
    async fn list(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        (**self).list(filter).await
    }

    async fn get(&self, id: &str) -> Result<Plan> {
        (**self).get(id).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        (**self).delete(id).await
    }

    fn backend_type(&self) -> &'static str {
        (**self).backend_type()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_filter_matches() {
        let at = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut plan = Plan::new("p1", "app", "dev", at);
        plan.branch = Some(String::from("develop"));

        assert!(PlanFilter::all().matches(&plan));
        assert!(PlanFilter::all().component("app").environment("dev").matches(&plan));
        assert!(!PlanFilter::all().environment("prod").matches(&plan));
        assert!(PlanFilter::all().branch(Some(String::from("develop"))).matches(&plan));
        assert!(!PlanFilter::all().branch(Some(String::from("main"))).matches(&plan));

        plan.branch = None;
        assert!(!PlanFilter::all().branch(Some(String::from("develop"))).matches(&plan));
    }
}
