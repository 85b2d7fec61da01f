use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::notify::{NotificationSink, Severity};
use crate::storage::{KeyValueStore, Persistence};
use crate::task::{Task, TaskDraft, TaskId};

pub const MSG_CREATED: &str = "Task added successfully!";
pub const MSG_COMPLETED: &str = "Task completed! 🎉";
pub const MSG_REOPENED: &str = "Task reopened";
pub const MSG_UPDATED: &str = "Task updated!";
pub const MSG_DELETED: &str = "Task removed";
pub const MSG_SAVE_FAILED: &str = "Failed to save data!";

/// Owns the ordered task collection (newest first). Every mutation saves the
/// whole collection before it returns; a failed save is reported through the
/// sink and the in-memory change is kept.
#[derive(Debug)]
pub struct TaskStore<S, N> {
    persistence: Persistence<S>,
    sink: N,
    tasks: Vec<Task>,
}

impl<S: KeyValueStore, N: NotificationSink> TaskStore<S, N> {
    #[tracing::instrument(skip_all)]
    pub fn open(persistence: Persistence<S>, sink: N) -> Self {
        let tasks = persistence.load_tasks();
        info!(count = tasks.len(), "task store opened");
        Self {
            persistence,
            sink,
            tasks,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.iter().find(|t| &t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn persistence(&self) -> &Persistence<S> {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut Persistence<S> {
        &mut self.persistence
    }

    pub fn sink(&self) -> &N {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut N {
        &mut self.sink
    }

    /// Returns `None` without touching anything when the title is blank.
    #[tracing::instrument(skip(self, draft, now))]
    pub fn create(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Option<TaskId> {
        let title = draft.title.trim();
        if title.is_empty() {
            debug!("blank title; create ignored");
            return None;
        }

        let draft = TaskDraft {
            title: title.to_string(),
            ..draft
        };
        let id = self.fresh_id();
        let task = Task::new_pending(draft, id.clone(), now);
        self.tasks.insert(0, task);
        info!(id = %id, count = self.tasks.len(), "task created");

        self.persist();
        self.sink.notify(MSG_CREATED, Severity::Success);
        Some(id)
    }

    /// Returns the new completion state, or `None` when no task matches.
    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn toggle_complete(&mut self, id: &TaskId) -> Option<bool> {
        let task = self.tasks.iter_mut().find(|t| &t.id == id)?;
        task.completed = !task.completed;
        let completed = task.completed;
        info!(completed, "task toggled");

        self.persist();
        if completed {
            self.sink.notify(MSG_COMPLETED, Severity::Success);
        } else {
            self.sink.notify(MSG_REOPENED, Severity::Info);
        }
        Some(completed)
    }

    /// Overwrites the editable fields. Unlike `create`, a blank title is
    /// accepted here and stored as the empty string.
    #[tracing::instrument(skip(self, draft), fields(id = %id))]
    pub fn update(&mut self, id: &TaskId, draft: TaskDraft) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| &t.id == id) else {
            debug!("no task with that id; update ignored");
            return false;
        };

        task.title = draft.title.trim().to_string();
        task.category = draft.category;
        task.priority = draft.priority;
        task.due_date = draft.due_date;
        if task.title.is_empty() {
            warn!("task updated with an empty title");
        }
        info!("task updated");

        self.persist();
        self.sink.notify(MSG_UPDATED, Severity::Info);
        true
    }

    #[tracing::instrument(skip(self), fields(id = %id))]
    pub fn delete(&mut self, id: &TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| &t.id != id);
        if self.tasks.len() == before {
            debug!("no task with that id; delete ignored");
            return false;
        }
        info!(count = self.tasks.len(), "task deleted");

        self.persist();
        self.sink.notify(MSG_DELETED, Severity::Error);
        true
    }

    /// Returns how many tasks were removed.
    #[tracing::instrument(skip(self))]
    pub fn clear_completed(&mut self) -> usize {
        let removed = self.tasks.iter().filter(|t| t.completed).count();
        if removed == 0 {
            return 0;
        }

        self.tasks.retain(|t| !t.completed);
        info!(removed, remaining = self.tasks.len(), "cleared completed tasks");

        self.persist();
        self.sink
            .notify(&format!("{removed} task(s) removed"), Severity::Info);
        removed
    }

    fn persist(&mut self) {
        if let Err(err) = self.persistence.save_tasks(&self.tasks) {
            warn!(error = %format!("{err:#}"), "save failed; in-memory state kept");
            self.sink.notify(MSG_SAVE_FAILED, Severity::Error);
        }
    }

    fn fresh_id(&self) -> TaskId {
        loop {
            let id = TaskId::generate();
            if self.get(&id).is_none() {
                return id;
            }
        }
    }
}
