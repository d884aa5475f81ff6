//! Output formatting for CLI commands.
//!
//! This module provides formatting utilities for displaying
//! information to the user in various formats.

use colored::{ColoredString, Colorize};
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::{EnvironmentGroups, ValidationResult};
use crate::dashboard::{ResourceReport, SummaryReport};
use crate::drift::{Aggregate, ComponentStatus, DriftMatrix, DriftSummary, TrendPoint};
use crate::graph::GraphLayout;
use crate::plan::{ChangeCategory, Plan};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Stored plan row for table display.
#[derive(Tabled)]
struct PlanRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Branch")]
    branch: String,
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Changes")]
    changes: String,
}

/// Resource change row for table display.
#[derive(Tabled)]
struct ResourceRowView {
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Address")]
    address: String,
    #[tabled(rename = "Type")]
    resource_type: String,
    #[tabled(rename = "Resource Group")]
    resource_group: String,
}

/// Summary row for table display.
#[derive(Tabled)]
struct SummaryRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Create")]
    created: usize,
    #[tabled(rename = "Update")]
    updated: usize,
    #[tabled(rename = "Delete")]
    deleted: usize,
    #[tabled(rename = "Unchanged")]
    unchanged: usize,
    #[tabled(rename = "Aligned")]
    alignment: String,
}

impl SummaryRow {
    fn new(name: impl Into<String>, summary: &DriftSummary) -> Self {
        Self {
            name: name.into(),
            created: summary.created,
            updated: summary.updated,
            deleted: summary.deleted,
            unchanged: summary.unchanged,
            alignment: OutputFormatter::format_alignment(summary.alignment_percentage).to_string(),
        }
    }
}

/// Trend row for table display.
#[derive(Tabled)]
struct TrendRow {
    #[tabled(rename = "Timestamp")]
    timestamp: String,
    #[tabled(rename = "Plan")]
    plan: String,
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "+/~/-")]
    changes: String,
    #[tabled(rename = "Aligned")]
    alignment: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json<T: Serialize + ?Sized>(value: &T) -> String {
        serde_json::to_string_pretty(value).unwrap_or_default()
    }

    /// Formats a list of stored plans.
    #[must_use]
    pub fn format_plans(&self, plans: &[Plan]) -> String {
        match self.format {
            OutputFormat::Json => Self::json(plans),
            OutputFormat::Text => {
                if plans.is_empty() {
                    return String::from("   No plans stored.\n");
                }

                let rows: Vec<PlanRow> = plans
                    .iter()
                    .map(|p| {
                        let summary = DriftSummary::from_changes(p.resource_changes());
                        PlanRow {
                            id: Self::truncate(&p.id, 12),
                            component: p.component_label().to_string(),
                            environment: p.environment.clone(),
                            branch: p.branch.clone().unwrap_or_default(),
                            timestamp: p.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                            changes: Self::format_counts(&summary),
                        }
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats one plan with its resource changes.
    #[must_use]
    pub fn format_plan(&self, plan: &Plan) -> String {
        match self.format {
            OutputFormat::Json => Self::json(plan),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = writeln!(output, "\nPlan {}", plan.id.bold());
                let _ = writeln!(output, "   Component: {}", plan.component_label());
                let _ = writeln!(output, "   Environment: {}", plan.environment);
                if let Some(branch) = &plan.branch {
                    let _ = writeln!(output, "   Branch: {branch}");
                }
                let _ = writeln!(output, "   Timestamp: {}", plan.timestamp.to_rfc3339());
                let _ = writeln!(output, "   Platform: {}", plan.cloud_platform);
                if let Some(version) = &plan.terraform_version {
                    let _ = writeln!(output, "   Terraform: {version}");
                }
                if !plan.providers.is_empty() {
                    let providers: Vec<&str> = plan.providers.iter().map(String::as_str).collect();
                    let _ = writeln!(output, "   Providers: {}", providers.join(", "));
                }
                if let Some(fingerprint) = &plan.fingerprint {
                    let _ = writeln!(output, "   Fingerprint: {}", Self::truncate(fingerprint, 16));
                }
                output.push('\n');

                let rows: Vec<ResourceRowView> = plan
                    .resource_changes()
                    .iter()
                    .map(|c| ResourceRowView {
                        action: Self::format_category(ChangeCategory::display_category(
                            &c.change.actions,
                        ))
                        .to_string(),
                        address: c.address.clone(),
                        resource_type: c.resource_type.clone(),
                        resource_group: c.resolved_resource_group().unwrap_or_default().to_string(),
                    })
                    .collect();
                if !rows.is_empty() {
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                let summary = DriftSummary::from_changes(plan.resource_changes());
                let _ = writeln!(output, "\n{}", Self::format_summary_line(&summary));
                output
            }
        }
    }

    /// Formats the latest-state summary.
    #[must_use]
    pub fn format_summary(&self, report: &SummaryReport) -> String {
        match self.format {
            OutputFormat::Json => Self::json(report),
            OutputFormat::Text => {
                if report.components.is_empty() {
                    return String::from("   No plans ingested yet.\n");
                }

                let rows: Vec<SummaryRow> = report
                    .components
                    .iter()
                    .map(|c| {
                        SummaryRow::new(
                            format!("{} ({})", c.component_name, c.environment),
                            &c.summary,
                        )
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                let _ = writeln!(output, "\n\n{}", Self::format_summary_line(&report.total));
                output
            }
        }
    }

    /// Formats a resource listing.
    #[must_use]
    pub fn format_resources(&self, report: &ResourceReport) -> String {
        match self.format {
            OutputFormat::Json => Self::json(report),
            OutputFormat::Text => {
                let mut output = String::new();

                if report.rows.is_empty() {
                    output.push_str("   No matching resources.\n");
                } else {
                    let rows: Vec<ResourceRowView> = report
                        .rows
                        .iter()
                        .map(|r| ResourceRowView {
                            action: Self::format_category(r.category).to_string(),
                            address: format!("{}: {}", r.component_id, r.address),
                            resource_type: r.resource_type.clone(),
                            resource_group: r.resource_group.clone().unwrap_or_default(),
                        })
                        .collect();
                    output.push_str(&Table::new(rows).to_string());
                    output.push('\n');
                }

                match &report.aggregate {
                    Aggregate::Total(summary) => {
                        let _ = writeln!(output, "\n{}", Self::format_summary_line(summary));
                    }
                    Aggregate::Grouped(groups) => {
                        let rows: Vec<SummaryRow> = groups
                            .iter()
                            .map(|(label, summary)| SummaryRow::new(label.as_str(), summary))
                            .collect();
                        output.push('\n');
                        output.push_str(&Table::new(rows).to_string());
                        output.push('\n');
                    }
                }

                output
            }
        }
    }

    /// Formats the drift matrix.
    #[must_use]
    pub fn format_matrix(&self, matrix: &DriftMatrix) -> String {
        match self.format {
            OutputFormat::Json => Self::json(matrix),
            OutputFormat::Text => {
                let mut builder = tabled::builder::Builder::default();

                let mut header = vec![String::from("Component")];
                header.extend(matrix.environments.iter().cloned());
                builder.push_record(header);

                for row in &matrix.rows {
                    let mut record = vec![row.component_name.clone()];
                    record.extend(row.cells.iter().map(|cell| {
                        let mut text = Self::format_status(cell.status).to_string();
                        if let Some(breakdown) = cell.breakdown.filter(|b| b.pending() > 0) {
                            let _ = write!(
                                text,
                                " +{} ~{} -{} ±{}",
                                breakdown.create,
                                breakdown.update,
                                breakdown.delete,
                                breakdown.replace
                            );
                        }
                        text
                    }));
                    builder.push_record(record);
                }

                let mut alignment = vec![String::from("Alignment")];
                alignment.extend(matrix.scores.iter().map(|s| {
                    format!(
                        "{} ({}/{})",
                        Self::format_alignment(s.score),
                        s.aligned,
                        s.total
                    )
                }));
                builder.push_record(alignment);

                let mut output = builder.build().to_string();
                let overview = &matrix.overview;
                let _ = write!(
                    output,
                    "\n\nOverall: {} aligned, {} drifted, {} unknown. \
                     Score {}, average plan age {} day(s)\n",
                    overview.aligned.to_string().green(),
                    overview.drifted.to_string().red(),
                    overview.unknown.to_string().dimmed(),
                    Self::format_alignment(overview.score),
                    overview.average_age_days
                );
                output
            }
        }
    }

    /// Formats a trend series.
    #[must_use]
    pub fn format_trend(&self, series: &[TrendPoint]) -> String {
        match self.format {
            OutputFormat::Json => Self::json(series),
            OutputFormat::Text => {
                if series.is_empty() {
                    return String::from("   No plans in range.\n");
                }

                let rows: Vec<TrendRow> = series
                    .iter()
                    .map(|p| TrendRow {
                        timestamp: p.timestamp.format("%Y-%m-%d %H:%M").to_string(),
                        plan: Self::truncate(&p.plan_id, 12),
                        component: p.component_id.clone(),
                        environment: p.environment.clone(),
                        changes: Self::format_counts(&p.summary),
                        alignment: Self::format_alignment(p.summary.alignment_percentage)
                            .to_string(),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats a graph layout.
    #[must_use]
    pub fn format_graph(&self, layout: &GraphLayout) -> String {
        match self.format {
            OutputFormat::Json => Self::json(layout),
            OutputFormat::Text => {
                let mut output = String::new();
                let _ = writeln!(
                    output,
                    "\nDependency graph ({:.0} x {:.0})\n",
                    layout.width, layout.height
                );

                for container in &layout.containers {
                    let _ = writeln!(
                        output,
                        "{} at ({:.0}, {:.0}) size {:.0} x {:.0}",
                        container.label.bold(),
                        container.x,
                        container.y,
                        container.width,
                        container.height
                    );
                    for resource in layout.resources_of(&container.id) {
                        let category = resource
                            .category
                            .map_or_else(|| "absent".dimmed(), Self::format_category);
                        let _ = writeln!(
                            output,
                            "   {category} {} at ({:.0}, {:.0})",
                            resource.address, resource.x, resource.y
                        );
                    }
                }

                let dependencies: Vec<_> = layout
                    .edges
                    .iter()
                    .filter(|e| e.kind == crate::graph::EdgeKind::Component)
                    .collect();
                if !dependencies.is_empty() {
                    output.push_str("\nDependencies:\n");
                    for edge in dependencies {
                        let _ = writeln!(output, "   {} -> {}", edge.source, edge.target);
                    }
                }

                output
            }
        }
    }

    /// Formats grouped environments.
    #[must_use]
    pub fn format_environments(&self, groups: &EnvironmentGroups) -> String {
        match self.format {
            OutputFormat::Json => Self::json(groups),
            OutputFormat::Text => {
                let mut output = String::new();
                for (group, regions) in groups {
                    let _ = writeln!(output, "{}", group.bold());
                    for (region, environments) in regions {
                        let _ = writeln!(output, "   {region}: {}", environments.join(", "));
                    }
                }
                output
            }
        }
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => {
                let errors: Vec<String> = result
                    .errors
                    .iter()
                    .map(|e| format!("{}: {}", e.field, e.error))
                    .collect();
                Self::json(&serde_json::json!({
                    "valid": result.errors.is_empty(),
                    "errors": errors,
                    "warnings": result.warnings,
                }))
            }
            OutputFormat::Text => {
                let mut output = String::new();
                if result.errors.is_empty() {
                    let _ = writeln!(output, "{} Configuration is valid.", "✓".green());
                } else {
                    let _ = writeln!(output, "{} Configuration has errors:", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {}: {}", error.field, error.error);
                    }
                }
                if show_warnings && !result.warnings.is_empty() {
                    let _ = writeln!(output, "\n{} Warnings:", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats the outcome of an ingestion.
    #[must_use]
    pub fn format_ingested(&self, plan: &Plan) -> String {
        match self.format {
            OutputFormat::Json => Self::json(&serde_json::json!({
                "id": plan.id,
                "component_id": plan.component_id,
                "environment": plan.environment,
                "branch": plan.branch,
                "fingerprint": plan.fingerprint,
                "summary": DriftSummary::from_changes(plan.resource_changes()),
            })),
            OutputFormat::Text => {
                let summary = DriftSummary::from_changes(plan.resource_changes());
                format!(
                    "{} Ingested plan {} for {}/{}\n{}\n",
                    "✓".green(),
                    plan.id,
                    plan.component_id,
                    plan.environment,
                    Self::format_summary_line(&summary)
                )
            }
        }
    }

    /// Formats a plain status message.
    #[must_use]
    pub fn message(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => Self::json(&serde_json::json!({
                "status": "success",
                "message": message
            })),
            OutputFormat::Text => format!("{} {message}\n", "✓".green()),
        }
    }

    /// One-line summary with colored counters.
    fn format_summary_line(summary: &DriftSummary) -> String {
        format!(
            "Plan: {} to create, {} to update, {} to destroy, {} unchanged. Alignment {}",
            summary.created.to_string().green(),
            summary.updated.to_string().yellow(),
            summary.deleted.to_string().red(),
            summary.unchanged,
            Self::format_alignment(summary.alignment_percentage)
        )
    }

    fn format_counts(summary: &DriftSummary) -> String {
        format!("+{} ~{} -{}", summary.created, summary.updated, summary.deleted)
    }

    /// Formats an alignment percentage with color.
    fn format_alignment(percentage: u8) -> ColoredString {
        let text = format!("{percentage}%");
        match percentage {
            90.. => text.green(),
            50..=89 => text.yellow(),
            _ => text.red(),
        }
    }

    /// Formats a change category with color.
    fn format_category(category: ChangeCategory) -> ColoredString {
        match category {
            ChangeCategory::Create => "+create".green(),
            ChangeCategory::Update => "~update".yellow(),
            ChangeCategory::Delete => "-delete".red(),
            ChangeCategory::Replace => "±replace".magenta(),
            ChangeCategory::Read => "read".cyan(),
            ChangeCategory::NoOp => "no-op".dimmed(),
        }
    }

    /// Formats a component status with color.
    fn format_status(status: ComponentStatus) -> ColoredString {
        match status {
            ComponentStatus::Aligned => "aligned".green(),
            ComponentStatus::Drift => "drift".red(),
            ComponentStatus::Unknown => "unknown".dimmed(),
            ComponentStatus::Excluded => "excluded".dimmed(),
        }
    }

    /// Truncates a string to a maximum number of characters.
    fn truncate(s: &str, max_len: usize) -> String {
        if s.chars().count() <= max_len {
            s.to_string()
        } else {
            let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
            format!("{kept}...")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ResourceChange;
    use chrono::{TimeZone, Utc};

    fn plan() -> Plan {
        let at = Utc.with_ymd_and_hms(2024, 4, 2, 8, 30, 0).unwrap();
        let mut plan = Plan::new("0123456789abcdef", "app", "dev", at).with_changes(vec![
            ResourceChange::new("azurerm_storage_account.logs", &["create"])
                .with_type("azurerm_storage_account")
                .with_resource_group("rg-app"),
            ResourceChange::new("azurerm_key_vault.main", &["no-op"]),
        ]);
        plan.branch = Some(String::from("develop"));
        plan
    }

    #[test]
    fn test_truncate() {
        assert_eq!(OutputFormatter::truncate("short", 12), "short");
        assert_eq!(OutputFormatter::truncate("0123456789abcdef", 12), "012345678...");
    }

    #[test]
    fn test_plan_list_text_and_json() {
        colored::control::set_override(false);
        let plans = vec![plan()];

        let text = OutputFormatter::new(OutputFormat::Text).format_plans(&plans);
        assert!(text.contains("012345678..."));
        assert!(text.contains("+1 ~0 -0"));
        assert!(text.contains("2024-04-02 08:30"));

        let json = OutputFormatter::new(OutputFormat::Json).format_plans(&plans);
        let parsed: serde_json::Value = serde_json::from_str(&json).expect("valid json");
        assert_eq!(parsed[0]["id"], "0123456789abcdef");
    }

    #[test]
    fn test_plan_details() {
        colored::control::set_override(false);
        let text = OutputFormatter::new(OutputFormat::Text).format_plan(&plan());

        assert!(text.contains("+create"));
        assert!(text.contains("rg-app"));
        assert!(text.contains("Alignment 50%"));
    }

    #[test]
    fn test_empty_outputs() {
        let formatter = OutputFormatter::new(OutputFormat::Text);
        assert!(formatter.format_plans(&[]).contains("No plans stored"));
        assert!(formatter.format_trend(&[]).contains("No plans in range"));
    }
}
