//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::drift::GroupKey;
use crate::plan::ChangeFilter;

/// driftscope - Terraform drift reporting across components and environments.
#[derive(Parser, Debug)]
#[command(name = "driftscope")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "DRIFTSCOPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Branch to report on (defaults to the project's default branch).
    #[arg(short, long, global = true)]
    pub branch: Option<String>,

    /// Report on every branch.
    #[arg(long, global = true, conflicts_with = "branch")]
    pub all_branches: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate the project configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Ingest a Terraform JSON plan into the local archive.
    Ingest {
        /// Plan file (`terraform show -json` output).
        file: PathBuf,

        /// Component the plan belongs to.
        #[arg(long)]
        component: String,

        /// Environment the plan was produced for.
        #[arg(short, long)]
        environment: String,
    },

    /// Manage stored plans.
    Plans {
        /// Plans subcommand.
        #[command(subcommand)]
        command: PlansCommands,
    },

    /// Show the latest-state summary per component.
    Summary {
        /// Restrict to one environment.
        #[arg(short, long)]
        environment: Option<String>,
    },

    /// List resource changes of the latest plans.
    Resources {
        /// Restrict to one environment.
        #[arg(short, long)]
        environment: Option<String>,

        /// Restrict to one component.
        #[arg(long)]
        component: Option<String>,

        /// Group the summary.
        #[arg(long, default_value = "none")]
        group_by: GroupBy,

        /// Which changes to list.
        #[arg(long, default_value = "all")]
        filter: FilterArg,
    },

    /// Show the components x environments drift matrix.
    Matrix,

    /// Show the drift trend over the plan history.
    Trend {
        /// Restrict to one component.
        #[arg(long)]
        component: Option<String>,

        /// Restrict to one environment.
        #[arg(short, long)]
        environment: Option<String>,
    },

    /// Lay out the dependency graph of an environment.
    Graph {
        /// Environment to draw (defaults to the first declared one).
        #[arg(short, long)]
        environment: Option<String>,

        /// Emit Graphviz DOT instead of the layout.
        #[arg(long)]
        dot: bool,
    },

    /// List environments by group and region.
    Environments,
}

/// Plan management subcommands.
#[derive(Subcommand, Debug)]
pub enum PlansCommands {
    /// List stored plans, newest first.
    List {
        /// Restrict to one component.
        #[arg(long)]
        component: Option<String>,

        /// Restrict to one environment.
        #[arg(short, long)]
        environment: Option<String>,
    },

    /// Show one plan.
    Show {
        /// Plan id.
        id: String,
    },

    /// Delete plans.
    Delete {
        /// Plan ids.
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Delete all but the most recent plans of a component.
    Prune {
        /// Component to prune.
        #[arg(long)]
        component: String,

        /// Environment to prune.
        #[arg(short, long)]
        environment: String,

        /// Number of plans to keep.
        #[arg(long, default_value = "10")]
        keep: usize,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Grouping of the resource summary.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum GroupBy {
    /// One summary over every change.
    #[default]
    None,
    /// By resource type.
    Type,
    /// By resource group.
    ResourceGroup,
    /// By environment.
    Environment,
}

impl GroupBy {
    /// Grouping key, if any.
    #[must_use]
    pub const fn key(self) -> Option<GroupKey> {
        match self {
            Self::None => None,
            Self::Type => Some(GroupKey::Type),
            Self::ResourceGroup => Some(GroupKey::ResourceGroup),
            Self::Environment => Some(GroupKey::Environment),
        }
    }
}

/// Resource listing filter.
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum FilterArg {
    /// Every change.
    #[default]
    All,
    /// Changes needing an action.
    Diff,
    /// Creations and replacements.
    Create,
    /// Updates.
    Update,
    /// Deletions and replacements.
    Delete,
}

impl From<FilterArg> for ChangeFilter {
    fn from(arg: FilterArg) -> Self {
        match arg {
            FilterArg::All => Self::All,
            FilterArg::Diff => Self::Diff,
            FilterArg::Create => Self::Create,
            FilterArg::Update => Self::Update,
            FilterArg::Delete => Self::Delete,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Branch selection: `None` means every branch, `Some(None)` the
    /// project's default.
    #[must_use]
    pub fn branch_selection(&self) -> Option<Option<&str>> {
        if self.all_branches {
            None
        } else {
            Some(self.branch.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_resources() {
        let cli = Cli::try_parse_from([
            "driftscope",
            "resources",
            "-e",
            "dev",
            "--group-by",
            "resource-group",
            "--filter",
            "diff",
            "--output",
            "json",
        ])
        .expect("arguments parse");

        let Commands::Resources {
            environment,
            group_by,
            filter,
            ..
        } = cli.command
        else {
            panic!("expected resources command");
        };
        assert_eq!(environment.as_deref(), Some("dev"));
        assert_eq!(group_by.key(), Some(GroupKey::ResourceGroup));
        assert_eq!(ChangeFilter::from(filter), ChangeFilter::Diff);
    }

    #[test]
    fn test_branch_flags_conflict() {
        let result =
            Cli::try_parse_from(["driftscope", "--branch", "main", "--all-branches", "matrix"]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["driftscope", "--all-branches", "matrix"]).expect("parses");
        assert_eq!(cli.branch_selection(), None);
    }
}
