//! Local JSON persistence and configuration for Shelfview.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use shelf_core::{recount_projects, CoreError, CoreResult, Project, Task};

/// Default directory name for the local store.
pub const STORE_DIR_NAME: &str = "shelfview";

/// Slot holding the serialized task list.
pub const TASKS_KEY: &str = "shelfview_tasks";

/// Slot holding the serialized project list.
pub const PROJECTS_KEY: &str = "shelfview_projects";

const CONFIG_FILE_NAME: &str = "config.yaml";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// String-keyed slots of JSON arrays, one file per slot.
///
/// Reads never fail: a missing or unreadable slot is an empty list. Writes never fail
/// either; problems are logged and the previous file is left as it was.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Create a store rooted at the provided directory.
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Get the root directory of the store.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Resolve the default store directory (~/.shelfview).
    pub fn default_path() -> CoreResult<PathBuf> {
        if let Some(dir) = dirs::home_dir() {
            return Ok(dir.join(format!(".{STORE_DIR_NAME}")));
        }
        Err(CoreError::Storage(
            "unable to determine a default store path".into(),
        ))
    }

    fn slot_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }

    /// Read a slot, degrading to an empty list on missing or malformed data.
    pub fn read_slot<T: DeserializeOwned>(&self, key: &str) -> Vec<T> {
        let path = self.slot_path(key);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(err) => {
                tracing::warn!(slot = key, %err, "failed to read slot");
                return Vec::new();
            }
        };
        serde_json::from_str(&contents).unwrap_or_else(|err| {
            tracing::warn!(slot = key, %err, "discarding malformed slot");
            Vec::new()
        })
    }

    /// Write a slot, logging instead of returning any failure.
    pub fn write_slot<T: Serialize>(&self, key: &str, items: &[T]) {
        if let Err(err) = self.try_write_slot(key, items) {
            tracing::error!(slot = key, %err, "failed to save slot");
        }
    }

    fn try_write_slot<T: Serialize>(&self, key: &str, items: &[T]) -> CoreResult<()> {
        fs::create_dir_all(&self.root).map_err(|err| CoreError::Storage(err.to_string()))?;
        let contents =
            serde_json::to_string(items).map_err(|err| CoreError::Storage(err.to_string()))?;
        fs::write(self.slot_path(key), contents).map_err(|err| CoreError::Storage(err.to_string()))
    }

    pub fn load_tasks(&self) -> Vec<Task> {
        self.read_slot(TASKS_KEY)
    }

    /// Persist tasks and refresh every project's task count to match.
    pub fn save_tasks(&self, tasks: &[Task]) {
        self.write_slot(TASKS_KEY, tasks);
        let mut projects = self.load_projects();
        if !projects.is_empty() {
            recount_projects(&mut projects, tasks);
            self.save_projects(&projects);
        }
    }

    pub fn load_projects(&self) -> Vec<Project> {
        self.read_slot(PROJECTS_KEY)
    }

    pub fn save_projects(&self, projects: &[Project]) {
        self.write_slot(PROJECTS_KEY, projects);
    }

    /// Append a task to the stored list.
    pub fn add_task(&self, task: Task) -> Vec<Task> {
        let mut tasks = self.load_tasks();
        tasks.push(task);
        self.save_tasks(&tasks);
        tasks
    }

    /// Flip a task's completion flag. Returns the new state, or `None` if no task matched.
    pub fn toggle_task(&self, id: Uuid) -> Option<bool> {
        let mut tasks = self.load_tasks();
        let task = tasks.iter_mut().find(|task| task.id == id)?;
        task.completed = !task.completed;
        let completed = task.completed;
        self.save_tasks(&tasks);
        Some(completed)
    }

    /// Remove a task by id. Returns whether anything was removed.
    pub fn remove_task(&self, id: Uuid) -> bool {
        let mut tasks = self.load_tasks();
        let before = tasks.len();
        tasks.retain(|task| task.id != id);
        if tasks.len() == before {
            return false;
        }
        self.save_tasks(&tasks);
        true
    }

    /// Append a project, counting any tasks that already reference it.
    pub fn add_project(&self, mut project: Project) -> Vec<Project> {
        let tasks = self.load_tasks();
        let mut projects = self.load_projects();
        project.task_count = tasks
            .iter()
            .filter(|task| task.project_id == Some(project.id))
            .count();
        projects.push(project);
        self.save_projects(&projects);
        projects
    }
}

/// Settings persisted in `config.yaml`.
#[derive(Debug, Default, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ShelfConfig {
    /// Catalog API base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    /// Local store directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<String>,
    /// Request timeout in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl ShelfConfig {
    /// Effective timeout, falling back to the default.
    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)
    }
}

/// Location of the config file.
pub fn config_path() -> CoreResult<PathBuf> {
    if let Some(dir) = dirs::config_dir() {
        return Ok(dir.join(STORE_DIR_NAME).join(CONFIG_FILE_NAME));
    }
    Err(CoreError::Storage(
        "unable to determine config directory".into(),
    ))
}

pub fn load_config() -> CoreResult<ShelfConfig> {
    load_config_from(&config_path()?)
}

/// Load a config file, treating a missing file as the default config.
pub fn load_config_from(path: &Path) -> CoreResult<ShelfConfig> {
    if !path.exists() {
        return Ok(ShelfConfig::default());
    }
    let contents = fs::read_to_string(path).map_err(|err| CoreError::Storage(err.to_string()))?;
    serde_yaml::from_str(&contents).map_err(|err| CoreError::Storage(err.to_string()))
}

pub fn save_config(config: &ShelfConfig) -> CoreResult<()> {
    save_config_to(&config_path()?, config)
}

pub fn save_config_to(path: &Path, config: &ShelfConfig) -> CoreResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| CoreError::Storage(err.to_string()))?;
    }
    let contents =
        serde_yaml::to_string(config).map_err(|err| CoreError::Storage(err.to_string()))?;
    fs::write(path, contents).map_err(|err| CoreError::Storage(err.to_string()))?;
    Ok(())
}

/// Persist a new catalog URL, keeping the other settings.
pub fn set_api_url(url: &str) -> CoreResult<()> {
    let mut config = load_config()?;
    config.api_url = Some(url.to_string());
    save_config(&config)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Pick the store directory: explicit value, then `SHELFVIEW_PATH`, then config, then default.
pub fn resolve_store_path(explicit: Option<PathBuf>, config: &ShelfConfig) -> CoreResult<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path);
    }
    if let Some(value) = non_empty(std::env::var("SHELFVIEW_PATH").ok()) {
        return Ok(PathBuf::from(value));
    }
    if let Some(path) = non_empty(config.store_path.clone()) {
        return Ok(PathBuf::from(path));
    }
    LocalStore::default_path()
}

/// Pick the catalog URL: explicit value, then `SHELFVIEW_API_URL`, then config.
///
/// `None` means the caller should use its built-in endpoint.
pub fn resolve_api_url(explicit: Option<String>, config: &ShelfConfig) -> Option<String> {
    non_empty(explicit)
        .or_else(|| non_empty(std::env::var("SHELFVIEW_API_URL").ok()))
        .or_else(|| non_empty(config.api_url.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use shelf_core::Priority;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalStore) {
        let temp = TempDir::new().expect("temp dir");
        let store = LocalStore::new(temp.path().join("store"));
        (temp, store)
    }

    #[test]
    fn missing_slot_reads_empty() {
        let (_temp, store) = store();
        assert!(store.load_tasks().is_empty());
        assert!(store.load_projects().is_empty());
    }

    #[test]
    fn malformed_slot_reads_empty() {
        let (_temp, store) = store();
        fs::create_dir_all(store.path()).unwrap();
        fs::write(store.path().join(format!("{TASKS_KEY}.json")), "{not json").unwrap();
        assert!(store.load_tasks().is_empty());
    }

    #[test]
    fn slots_are_independent() {
        let (_temp, store) = store();
        store.add_project(Project::new("Home", "#22c55e").unwrap());
        assert_eq!(store.load_projects().len(), 1);
        assert!(store.load_tasks().is_empty());
    }

    #[test]
    fn task_lifecycle_updates_project_counts() {
        let (_temp, store) = store();
        let project = Project::new("Work", "#3b82f6").unwrap();
        store.add_project(project.clone());

        let mut task = Task::new("Write report", Priority::High, Utc::now()).unwrap();
        task.project_id = Some(project.id);
        let id = task.id;
        store.add_task(task);
        assert_eq!(store.load_projects()[0].task_count, 1);

        assert_eq!(store.toggle_task(id), Some(true));
        assert!(store.load_tasks()[0].completed);
        assert_eq!(store.toggle_task(Uuid::new_v4()), None);

        assert!(store.remove_task(id));
        assert!(!store.remove_task(id));
        assert_eq!(store.load_projects()[0].task_count, 0);
    }

    #[test]
    fn write_failure_is_swallowed() {
        let temp = TempDir::new().expect("temp dir");
        let blocker = temp.path().join("file");
        fs::write(&blocker, "x").unwrap();
        let store = LocalStore::new(blocker.join("nested"));
        store.save_projects(&[Project::new("Home", "").unwrap()]);
        assert!(store.load_projects().is_empty());
    }

    #[test]
    fn config_round_trip_and_defaults() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("shelfview").join(CONFIG_FILE_NAME);
        assert_eq!(load_config_from(&path).unwrap(), ShelfConfig::default());

        let config = ShelfConfig {
            api_url: Some("http://localhost:4000".into()),
            store_path: None,
            timeout_secs: Some(5),
        };
        save_config_to(&path, &config).unwrap();
        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(loaded.timeout_secs(), 5);
        assert_eq!(ShelfConfig::default().timeout_secs(), DEFAULT_TIMEOUT_SECS);
    }

    #[test]
    fn explicit_values_win_resolution() {
        let config = ShelfConfig {
            api_url: Some("http://from-config".into()),
            store_path: Some("/from/config".into()),
            timeout_secs: None,
        };
        assert_eq!(
            resolve_api_url(Some("http://explicit".into()), &config).as_deref(),
            Some("http://explicit")
        );
        assert_eq!(
            resolve_store_path(Some(PathBuf::from("/explicit")), &config).unwrap(),
            PathBuf::from("/explicit")
        );
    }
}
