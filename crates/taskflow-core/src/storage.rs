use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::task::{Task, Theme};

pub const TASKS_KEY: &str = "taskflow_tasks";
pub const THEME_KEY: &str = "taskflow_theme";

/// Synchronous string key-value storage, shaped after the browser's
/// `localStorage` API.
pub trait KeyValueStore {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>>;

    fn set_item(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

/// One file per key under a data directory. Writes go through a temp file in
/// the same directory and are renamed into place, so a reader never sees a
/// half-written value.
#[derive(Debug)]
pub struct DirStore {
    pub data_dir: PathBuf,
}

impl DirStore {
    #[tracing::instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        let data_dir = data_dir.to_path_buf();
        fs::create_dir_all(&data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        info!(data_dir = %data_dir.display(), "opened key-value store");
        Ok(Self { data_dir })
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.data_dir.join(key)
    }
}

impl KeyValueStore for DirStore {
    #[tracing::instrument(skip(self))]
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            debug!(file = %path.display(), "no stored value");
            return Ok(None);
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed reading {}", path.display()))?;
        Ok(Some(raw))
    }

    #[tracing::instrument(skip(self, value))]
    fn set_item(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        debug!(file = %path.display(), bytes = value.len(), "saving value atomically");

        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        temp.write_all(value.as_bytes())?;
        temp.flush()?;

        temp.persist(&path)
            .map_err(|err| anyhow!("failed to persist {}: {}", path.display(), err))?;

        Ok(())
    }
}

/// In-process storage. `fail_writes` makes every `set_item` fail, which is how
/// a full or unavailable store is simulated.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    items: BTreeMap<String, String>,
    pub fail_writes: bool,
    pub writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_item(mut self, key: &str, value: &str) -> Self {
        self.items.insert(key.to_string(), value.to_string());
        self
    }
}

impl KeyValueStore for MemoryStore {
    fn get_item(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.items.get(key).cloned())
    }

    fn set_item(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        if self.fail_writes {
            return Err(anyhow!("storage quota exceeded while writing {key}"));
        }
        self.items.insert(key.to_string(), value.to_string());
        self.writes += 1;
        Ok(())
    }
}

/// Task collection and theme preference on top of a [`KeyValueStore`].
#[derive(Debug)]
pub struct Persistence<S> {
    kv: S,
}

impl<S: KeyValueStore> Persistence<S> {
    pub fn new(kv: S) -> Self {
        Self { kv }
    }

    pub fn backend(&self) -> &S {
        &self.kv
    }

    pub fn backend_mut(&mut self) -> &mut S {
        &mut self.kv
    }

    /// Never fails: absent, unreadable or corrupt data all load as an empty
    /// collection.
    #[tracing::instrument(skip(self))]
    pub fn load_tasks(&self) -> Vec<Task> {
        let raw = match self.kv.get_item(TASKS_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return Vec::new(),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to read stored tasks; starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<Task>>(&raw) {
            Ok(tasks) => {
                debug!(count = tasks.len(), "loaded tasks");
                tasks
            }
            Err(err) => {
                warn!(error = %err, "stored tasks are corrupt; starting empty");
                Vec::new()
            }
        }
    }

    #[tracing::instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn save_tasks(&mut self, tasks: &[Task]) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(tasks).context("failed to serialize tasks")?;
        self.kv
            .set_item(TASKS_KEY, &serialized)
            .context("failed to save tasks")
    }

    /// `None` when nothing is stored or the stored value is not a known theme.
    #[tracing::instrument(skip(self))]
    pub fn load_theme(&self) -> Option<Theme> {
        let raw = match self.kv.get_item(THEME_KEY) {
            Ok(raw) => raw?,
            Err(err) => {
                warn!(error = %format!("{err:#}"), "failed to read theme preference");
                return None;
            }
        };
        match raw.parse::<Theme>() {
            Ok(theme) => Some(theme),
            Err(err) => {
                warn!(error = %err, "ignoring unrecognized theme preference");
                None
            }
        }
    }

    #[tracing::instrument(skip(self))]
    pub fn save_theme(&mut self, theme: Theme) -> anyhow::Result<()> {
        self.kv
            .set_item(THEME_KEY, theme.as_str())
            .context("failed to save theme preference")
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    use super::*;
    use crate::task::{Category, Priority, TaskDraft, TaskId};

    fn make_task(id: &str, title: &str) -> Task {
        let now = Utc.with_ymd_and_hms(2026, 4, 1, 8, 30, 0).unwrap();
        Task::new_pending(
            TaskDraft::new(title)
                .with_category(Category::Work)
                .with_priority(Priority::High),
            TaskId::from(id),
            now,
        )
    }

    #[test]
    fn missing_data_loads_empty() {
        let persistence = Persistence::new(MemoryStore::new());
        assert!(persistence.load_tasks().is_empty());
        assert_eq!(persistence.load_theme(), None);
    }

    #[test]
    fn corrupt_data_loads_empty() {
        let kv = MemoryStore::new().with_item(TASKS_KEY, "{not json");
        assert!(Persistence::new(kv).load_tasks().is_empty());

        let kv = MemoryStore::new().with_item(TASKS_KEY, r#"[{"id": "a"}]"#);
        assert!(Persistence::new(kv).load_tasks().is_empty());
    }

    #[test]
    fn unknown_theme_loads_as_no_preference() {
        let kv = MemoryStore::new().with_item(THEME_KEY, "sepia");
        assert_eq!(Persistence::new(kv).load_theme(), None);
    }

    #[test]
    fn failing_backend_reports_error_on_save() {
        let mut kv = MemoryStore::new();
        kv.fail_writes = true;
        let mut persistence = Persistence::new(kv);

        assert!(persistence.save_tasks(&[make_task("a", "x")]).is_err());
        assert!(persistence.save_theme(Theme::Dark).is_err());
        assert_eq!(persistence.backend().writes, 0);
    }

    #[test]
    fn dir_store_roundtrip_preserves_order_and_theme() {
        let temp = tempdir().expect("tempdir");
        let kv = DirStore::open(temp.path()).expect("open store");
        let mut persistence = Persistence::new(kv);

        let tasks = vec![make_task("b", "second"), make_task("a", "first")];
        persistence.save_tasks(&tasks).expect("save tasks");
        persistence.save_theme(Theme::Dark).expect("save theme");

        assert!(temp.path().join("taskflow_tasks").exists());
        assert_eq!(
            fs::read_to_string(temp.path().join("taskflow_theme")).unwrap(),
            "dark"
        );

        let reopened = Persistence::new(DirStore::open(temp.path()).expect("reopen"));
        assert_eq!(reopened.load_tasks(), tasks);
        assert_eq!(reopened.load_theme(), Some(Theme::Dark));
    }
}
