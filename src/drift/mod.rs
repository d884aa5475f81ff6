//! Drift aggregation module.
//!
//! This module folds classified resource changes into:
//! - Summaries with an alignment percentage, optionally grouped
//! - The latest plan per component and environment
//! - Trend series over a plan history
//! - Component status and the drift matrix

mod group;
mod latest;
mod status;
mod summary;
mod trend;

pub use group::{
    aggregate, aggregate_grouped, aggregate_plans_grouped, group_changes, group_plan_changes,
    Aggregate, GroupKey, GroupLabel, UNGROUPED_RESOURCES, UNKNOWN,
};
pub use latest::{chronological, sort_chronological, BranchFilter, LatestIndex};
pub use status::{
    ActionBreakdown, ComponentStatus, DriftMatrix, EnvironmentScore, MatrixCell, MatrixRow,
    OverviewMetrics,
};
pub use summary::{percentage, DriftSummary};
pub use trend::{trend_series, ComponentTrend, TrendPoint};
