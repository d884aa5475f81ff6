//! driftscope CLI entrypoint.
//!
//! This is the main entrypoint for the driftscope command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use driftscope::cli::{Cli, Commands, OutputFormatter, PlansCommands};
use driftscope::config::{
    find_config_file, group_environments, ConfigParser, ConfigValidator, DriftConfig, StoreBackend,
};
use driftscope::dashboard::{self, Dashboard, ResourceQuery};
use driftscope::error::{DriftError, Result};
use driftscope::plan::IngestRequest;
use driftscope::store::{LocalPlanStore, PlanFilter, PlanSource, RemotePlanSource};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.log_json);

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system. `RUST_LOG` takes precedence.
fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Loaded project and its location.
struct Project {
    config: DriftConfig,
    dir: PathBuf,
}

impl Project {
    /// Plan source selected by the configuration.
    fn source(&self) -> Result<Box<dyn PlanSource>> {
        match self.config.store.backend {
            StoreBackend::Local => Ok(Box::new(self.local_store()?)),
            StoreBackend::Remote => {
                let url = self
                    .config
                    .store
                    .url
                    .as_deref()
                    .ok_or_else(|| DriftError::internal("Remote store URL not configured"))?;
                let token = ConfigParser::api_token().ok();
                if token.is_none() {
                    warn!("No API token set, sending unauthenticated requests");
                }
                Ok(Box::new(RemotePlanSource::new(url, token)?))
            }
        }
    }

    /// The local archive; fails for remote projects.
    fn local_store(&self) -> Result<LocalPlanStore> {
        match self.config.store.backend {
            StoreBackend::Local => Ok(LocalPlanStore::from_config(&self.config.store, &self.dir)),
            StoreBackend::Remote => Err(DriftError::internal(
                "This command needs the local plan archive (store.backend: local)",
            )),
        }
    }

    /// Key plans are recorded under for a component name.
    fn component_key(&self, name: &str) -> String {
        self.config
            .component(name)
            .map_or_else(|| name.to_string(), |c| c.key().to_string())
    }

    fn dashboard<'a, S: PlanSource>(
        &'a self,
        source: &'a S,
        cli_branch: Option<Option<&str>>,
    ) -> Dashboard<'a, S> {
        let dashboard = Dashboard::new(&self.config, source);
        match cli_branch {
            None => dashboard.with_branch(None),
            Some(None) => dashboard,
            Some(Some(branch)) => dashboard.with_branch(Some(branch.to_string())),
        }
    }
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);
    let branch = cli.branch_selection();

    if let Commands::Validate { warnings } = cli.command {
        return cmd_validate(cli.config.as_ref(), warnings, &formatter);
    }

    let project = load_project(cli.config.as_ref())?;

    match &cli.command {
        Commands::Validate { .. } => Ok(ExitCode::SUCCESS),
        Commands::Ingest {
            file,
            component,
            environment,
        } => {
            let request = IngestRequest {
                component: component.clone(),
                environment: environment.clone(),
                branch: cli.branch.clone(),
            };
            cmd_ingest(&project, file, &request, &formatter).await
        }
        Commands::Plans { command } => {
            cmd_plans(&project, command, cli.branch.clone(), &formatter).await
        }
        Commands::Summary { environment } => {
            let source = project.source()?;
            let report = project
                .dashboard(&source, branch)
                .summary(environment.as_deref())
                .await?;
            emit(&formatter.format_summary(&report))
        }
        Commands::Resources {
            environment,
            component,
            group_by,
            filter,
        } => {
            let source = project.source()?;
            let component = component.as_deref().map(|c| project.component_key(c));
            let query = ResourceQuery {
                environment: environment.as_deref(),
                component: component.as_deref(),
                group_by: group_by.key(),
                filter: (*filter).into(),
            };
            let report = project.dashboard(&source, branch).resources(query).await?;
            emit(&formatter.format_resources(&report))
        }
        Commands::Matrix => {
            let source = project.source()?;
            let matrix = project
                .dashboard(&source, branch)
                .matrix(chrono::Utc::now())
                .await?;
            emit(&formatter.format_matrix(&matrix))
        }
        Commands::Trend {
            component,
            environment,
        } => {
            let source = project.source()?;
            let component = component.as_deref().map(|c| project.component_key(c));
            let series = project
                .dashboard(&source, branch)
                .trend(component.as_deref(), environment.as_deref())
                .await?;
            emit(&formatter.format_trend(&series))
        }
        Commands::Graph { environment, dot } => {
            let environment = environment
                .clone()
                .or_else(|| project.config.project.environments.first().cloned())
                .ok_or_else(|| DriftError::internal("Project declares no environments"))?;
            let source = project.source()?;
            let layout = project.dashboard(&source, branch).graph(&environment).await?;
            if *dot {
                emit(&layout.to_dot())
            } else {
                emit(&formatter.format_graph(&layout))
            }
        }
        Commands::Environments => {
            let groups = group_environments(
                &project.config.project.environments,
                &project.config.project.environments_config,
            );
            emit(&formatter.format_environments(&groups))
        }
    }
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let config_file = resolve_config_path(config_path)?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(parent_dir(&config_file));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().check(&config);
    emit(&formatter.format_validation(&result, show_warnings))?;

    if result.errors.is_empty() {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

/// Ingest a plan file.
async fn cmd_ingest(
    project: &Project,
    file: &Path,
    request: &IngestRequest,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let store = project.local_store()?;

    info!("Reading plan: {}", file.display());
    let content = tokio::fs::read_to_string(file).await?;
    let raw: serde_json::Value = serde_json::from_str(&content)?;

    let plan = dashboard::ingest(&project.config, &store, &raw, request).await?;
    emit(&formatter.format_ingested(&plan))
}

/// Manage stored plans.
async fn cmd_plans(
    project: &Project,
    command: &PlansCommands,
    branch: Option<String>,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    match command {
        PlansCommands::List {
            component,
            environment,
        } => {
            let source = project.source()?;
            let mut filter = PlanFilter::all()
                .project(project.config.project.key())
                .branch(branch);
            filter.component_id = component.as_deref().map(|c| project.component_key(c));
            filter.environment.clone_from(environment);

            let plans = source.list(&filter).await?;
            emit(&formatter.format_plans(&plans))
        }
        PlansCommands::Show { id } => {
            let plan = project.source()?.get(id).await?;
            emit(&formatter.format_plan(&plan))
        }
        PlansCommands::Delete { ids } => {
            let source = project.source()?;
            for id in ids {
                source.delete(id).await?;
            }
            emit(&formatter.message(&format!("Deleted {} plan(s)", ids.len())))
        }
        PlansCommands::Prune {
            component,
            environment,
            keep,
        } => {
            let store = project.local_store()?;
            let pruned = store
                .prune(&project.component_key(component), environment, *keep)
                .await?;
            emit(&formatter.message(&format!("Pruned {} plan(s)", pruned.len())))
        }
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Writes command output to stdout.
fn emit(output: &str) -> Result<ExitCode> {
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(output.as_bytes())?;
    if !output.ends_with('\n') {
        stdout.write_all(b"\n")?;
    }
    stdout.flush()?;
    Ok(ExitCode::SUCCESS)
}

/// Resolves the configuration file path.
fn resolve_config_path(config_path: Option<&PathBuf>) -> Result<PathBuf> {
    match config_path {
        Some(path) => Ok(path.clone()),
        None => find_config_file(std::env::current_dir()?),
    }
}

fn parent_dir(path: &Path) -> PathBuf {
    path.parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Loads and validates the project configuration.
fn load_project(config_path: Option<&PathBuf>) -> Result<Project> {
    let config_file = resolve_config_path(config_path)?;
    debug!("Loading configuration from: {}", config_file.display());

    let dir = parent_dir(&config_file);
    let parser = ConfigParser::new().with_base_path(&dir);
    parser.load_dotenv()?;

    let config = parser.load_with_env(&config_file)?;
    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok(Project { config, dir })
}
