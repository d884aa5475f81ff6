//! Local file-based plan archive.
//!
//! Each ingested plan is stored as `<base>/plans/<id>.json`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{DriftError, Result, StoreError};
use crate::plan::{CloudPlatform, Plan};

use super::source::{PlanFilter, PlanSource};

/// Default archive directory name.
pub const ARCHIVE_DIR: &str = ".driftscope";

/// Subdirectory holding plan files.
const PLANS_DIR: &str = "plans";

/// Local file-based plan archive.
#[derive(Debug, Clone)]
pub struct LocalPlanStore {
    /// Directory holding plan files.
    plans_dir: PathBuf,
}

impl LocalPlanStore {
    /// Creates a store rooted at `base_dir`.
    #[must_use]
    pub fn with_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            plans_dir: base_dir.into().join(PLANS_DIR),
        }
    }

    /// Creates a store from configuration; relative paths resolve against
    /// `project_dir`.
    #[must_use]
    pub fn from_config(config: &StoreConfig, project_dir: &Path) -> Self {
        let path = config.path.as_deref().unwrap_or(ARCHIVE_DIR);
        let path = Path::new(path);
        if path.is_absolute() {
            Self::with_base_dir(path)
        } else {
            Self::with_base_dir(project_dir.join(path))
        }
    }

    /// Directory holding plan files.
    #[must_use]
    pub fn plans_dir(&self) -> &Path {
        &self.plans_dir
    }

    fn plan_path(&self, id: &str) -> Result<PathBuf> {
        let valid = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::NotFound { id: id.to_string() }.into());
        }
        Ok(self.plans_dir.join(format!("{id}.json")))
    }

    async fn ensure_dir(&self) -> Result<()> {
        if !self.plans_dir.exists() {
            debug!("Creating plan directory: {}", self.plans_dir.display());
            fs::create_dir_all(&self.plans_dir)
                .await
                .map_err(|e| StoreError::io(format!("Failed to create plan directory: {e}")))?;
        }
        Ok(())
    }

    async fn read_plan(path: &Path) -> Result<Plan> {
        let content = fs::read_to_string(path).await.map_err(|e| StoreError::Corrupted {
            message: format!("Failed to read {}: {e}", path.display()),
        })?;

        serde_json::from_str(&content).map_err(|e| {
            DriftError::Store(StoreError::Corrupted {
                message: format!("Failed to parse {}: {e}", path.display()),
            })
        })
    }

    /// Stores a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan cannot be serialized or written.
    pub async fn save(&self, plan: &Plan) -> Result<()> {
        self.ensure_dir().await?;
        let path = self.plan_path(&plan.id)?;

        let content = serde_json::to_string_pretty(plan)
            .map_err(|e| StoreError::serialization(format!("Failed to serialize plan: {e}")))?;

        // Write to a temporary file first, then rename for atomicity
        let temp_path = path.with_extension("tmp");
        if let Err(e) = write_then_rename(&temp_path, &path, content.as_bytes()).await {
            if let Err(cleanup) = fs::remove_file(&temp_path).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                warn!("Failed to remove {}: {cleanup}", temp_path.display());
            }
            return Err(e);
        }

        info!(
            "Stored plan {} for {}/{}",
            plan.id, plan.component_id, plan.environment
        );
        Ok(())
    }

    /// Reads every stored plan. Unreadable files are skipped.
    async fn load_all(&self) -> Result<Vec<Plan>> {
        if !self.plans_dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = fs::read_dir(&self.plans_dir)
            .await
            .map_err(|e| StoreError::io(format!("Failed to read plan directory: {e}")))?;

        let mut plans = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(format!("Failed to read plan directory: {e}")))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_plan(&path).await {
                Ok(plan) => plans.push(plan),
                Err(e) => warn!("Skipping unreadable plan file: {e}"),
            }
        }

        Ok(plans)
    }

    /// Most recent plan of a component in an environment, on any branch.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read.
    pub async fn latest_for(&self, component_id: &str, environment: &str) -> Result<Option<Plan>> {
        let filter = PlanFilter::all().component(component_id).environment(environment);
        Ok(self.list(&filter).await?.into_iter().next())
    }

    /// Platform recorded by the first stored plan of the project that
    /// revealed one.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read.
    pub async fn locked_platform(&self, project_id: &str) -> Result<Option<CloudPlatform>> {
        let mut plans = self.list(&PlanFilter::all().project(project_id)).await?;
        plans.reverse();
        Ok(plans
            .into_iter()
            .map(|p| p.cloud_platform)
            .find(|p| p.is_known()))
    }

    /// Deletes several plans, skipping ids that are not stored.
    ///
    /// Returns the number of plans removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a plan file cannot be removed.
    pub async fn delete_many(&self, ids: &[String]) -> Result<usize> {
        let mut removed = 0;
        for id in ids {
            match self.delete(id).await {
                Ok(()) => removed += 1,
                Err(DriftError::Store(StoreError::NotFound { .. })) => {
                    debug!("Plan {id} not stored, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }

    /// Keeps the `keep` most recent plans of a component in an environment
    /// and deletes the rest.
    ///
    /// Returns the ids of the deleted plans.
    ///
    /// # Errors
    ///
    /// Returns an error if the archive cannot be read or a file removed.
    pub async fn prune(
        &self,
        component_id: &str,
        environment: &str,
        keep: usize,
    ) -> Result<Vec<String>> {
        let filter = PlanFilter::all().component(component_id).environment(environment);
        let stale: Vec<String> = self
            .list(&filter)
            .await?
            .into_iter()
            .skip(keep)
            .map(|p| p.id)
            .collect();

        self.delete_many(&stale).await?;
        info!(
            "Pruned {} plan(s) of {component_id}/{environment}, kept {keep}",
            stale.len()
        );
        Ok(stale)
    }
}

#[async_trait]
impl PlanSource for LocalPlanStore {
    async fn list(&self, filter: &PlanFilter) -> Result<Vec<Plan>> {
        let mut plans: Vec<Plan> = self
            .load_all()
            .await?
            .into_iter()
            .filter(|p| filter.matches(p))
            .collect();
        plans.sort_by(|a, b| b.recency_key().cmp(&a.recency_key()));
        debug!("Listed {} plan(s) from {}", plans.len(), self.plans_dir.display());
        Ok(plans)
    }

    async fn get(&self, id: &str) -> Result<Plan> {
        let path = self.plan_path(id)?;
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() }.into());
        }
        Self::read_plan(&path).await
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let path = self.plan_path(id)?;
        if !path.exists() {
            return Err(StoreError::NotFound { id: id.to_string() }.into());
        }

        info!("Deleting plan file: {}", path.display());
        fs::remove_file(&path)
            .await
            .map_err(|e| StoreError::io(format!("Failed to delete plan file: {e}")))?;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "local"
    }
}

/// Writes `content` to `temp_path`, then moves it over `path`.
async fn write_then_rename(temp_path: &Path, path: &Path, content: &[u8]) -> Result<()> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|e| StoreError::io(format!("Failed to create temp plan file: {e}")))?;
    file.write_all(content)
        .await
        .map_err(|e| StoreError::io(format!("Failed to write plan file: {e}")))?;
    file.sync_all()
        .await
        .map_err(|e| StoreError::io(format!("Failed to sync plan file: {e}")))?;
    drop(file);

    fs::rename(temp_path, path)
        .await
        .map_err(|e| StoreError::io(format!("Failed to rename plan file: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::ResourceChange;
    use chrono::{Duration, TimeZone, Utc};
    use tempfile::TempDir;

    fn create_test_store() -> (LocalPlanStore, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = LocalPlanStore::with_base_dir(temp_dir.path());
        (store, temp_dir)
    }

    fn plan(id: &str, component: &str, env: &str, hours: i64) -> Plan {
        let base = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let mut plan = Plan::new(id, component, env, base + Duration::hours(hours))
            .with_changes(vec![ResourceChange::new("azurerm_resource_group.main", &["no-op"])]);
        plan.project_id = String::from("platform");
        plan
    }

    #[tokio::test]
    async fn test_save_and_get() {
        let (store, _temp) = create_test_store();

        store.save(&plan("p1", "app", "dev", 0)).await.expect("Failed to save plan");
        let loaded = store.get("p1").await.expect("Failed to load plan");

        assert_eq!(loaded.component_id, "app");
        assert_eq!(loaded.resource_changes().len(), 1);
        assert!(store.plans_dir().join("p1.json").exists());
        assert!(!store.plans_dir().join("p1.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_save_leaves_no_temp_file() {
        let (store, _temp) = create_test_store();
        // A directory in the way makes the final rename fail
        std::fs::create_dir_all(store.plans_dir().join("p1.json")).expect("Failed to create dir");

        let result = store.save(&plan("p1", "app", "dev", 0)).await;

        assert!(matches!(result, Err(DriftError::Store(StoreError::Io { .. }))));
        assert!(!store.plans_dir().join("p1.tmp").exists());
    }

    #[tokio::test]
    async fn test_get_missing_and_invalid_ids() {
        let (store, _temp) = create_test_store();

        let missing = store.get("nope").await;
        assert!(matches!(missing, Err(DriftError::Store(StoreError::NotFound { .. }))));

        let traversal = store.get("../secret").await;
        assert!(matches!(traversal, Err(DriftError::Store(StoreError::NotFound { .. }))));
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_filtered() {
        let (store, _temp) = create_test_store();
        for p in [
            plan("old", "app", "dev", 1),
            plan("new", "app", "dev", 5),
            plan("mid", "app", "dev", 3),
            plan("other", "db", "dev", 9),
        ] {
            store.save(&p).await.expect("Failed to save plan");
        }

        let ids: Vec<String> = store
            .list(&PlanFilter::all().component("app"))
            .await
            .expect("Failed to list plans")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, ["new", "mid", "old"]);

        let latest = store.latest_for("app", "dev").await.expect("Failed to read latest");
        assert_eq!(latest.map(|p| p.id).as_deref(), Some("new"));
        assert!(store.latest_for("app", "prod").await.expect("latest").is_none());
    }

    #[tokio::test]
    async fn test_corrupted_files_are_skipped_in_listing() {
        let (store, _temp) = create_test_store();
        store.save(&plan("good", "app", "dev", 0)).await.expect("Failed to save plan");
        std::fs::write(store.plans_dir().join("bad.json"), "{ not json").expect("write");

        let plans = store.list(&PlanFilter::all()).await.expect("Failed to list plans");
        assert_eq!(plans.len(), 1);

        let bad = store.get("bad").await;
        assert!(matches!(bad, Err(DriftError::Store(StoreError::Corrupted { .. }))));
    }

    #[tokio::test]
    async fn test_delete_many_and_prune() {
        let (store, _temp) = create_test_store();
        for hours in 0..5 {
            store
                .save(&plan(&format!("p{hours}"), "app", "dev", hours))
                .await
                .expect("Failed to save plan");
        }

        let removed = store
            .delete_many(&[String::from("p0"), String::from("missing")])
            .await
            .expect("Failed to delete plans");
        assert_eq!(removed, 1);

        let pruned = store.prune("app", "dev", 2).await.expect("Failed to prune");
        assert_eq!(pruned, ["p2", "p1"]);

        let left: Vec<String> = store
            .list(&PlanFilter::all())
            .await
            .expect("Failed to list plans")
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(left, ["p4", "p3"]);
    }

    #[tokio::test]
    async fn test_locked_platform_comes_from_oldest_known() {
        let (store, _temp) = create_test_store();
        assert_eq!(store.locked_platform("platform").await.expect("platform"), None);

        let mut first = plan("a", "app", "dev", 0);
        first.cloud_platform = CloudPlatform::Azure;
        let mut second = plan("b", "app", "dev", 1);
        second.cloud_platform = CloudPlatform::Aws;
        store.save(&first).await.expect("save");
        store.save(&second).await.expect("save");

        assert_eq!(
            store.locked_platform("platform").await.expect("platform"),
            Some(CloudPlatform::Azure)
        );
    }
}
