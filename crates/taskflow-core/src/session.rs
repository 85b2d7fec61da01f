use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

use crate::filter::{Filter, StatusFilter};
use crate::notify::{NotificationSink, Severity};
use crate::render::{self, ListView};
use crate::storage::{KeyValueStore, Persistence};
use crate::store::{MSG_SAVE_FAILED, TaskStore};
use crate::task::{TaskDraft, TaskId, Theme};

/// Ephemeral UI state. Nothing here is persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub filter: StatusFilter,
    pub query: String,
    pub editing: Option<TaskId>,
}

/// Routes user intents to the task store and keeps the filter, search and
/// edit state between them.
#[derive(Debug)]
pub struct Session<S, N> {
    store: TaskStore<S, N>,
    state: ViewState,
    theme: Theme,
}

impl<S: KeyValueStore, N: NotificationSink> Session<S, N> {
    /// `fallback_theme` applies when no preference has been saved.
    pub fn open(persistence: Persistence<S>, sink: N, fallback_theme: Theme) -> Self {
        let theme = persistence.load_theme().unwrap_or(fallback_theme);
        Self {
            store: TaskStore::open(persistence, sink),
            state: ViewState::default(),
            theme,
        }
    }

    pub fn store(&self) -> &TaskStore<S, N> {
        &self.store
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn submit(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Option<TaskId> {
        self.store.create(draft, now)
    }

    pub fn set_filter(&mut self, filter: StatusFilter) {
        debug!(%filter, "filter changed");
        self.state.filter = filter;
    }

    pub fn set_search(&mut self, query: &str) {
        self.state.query = query.trim().to_lowercase();
        debug!(query = %self.state.query, "search changed");
    }

    pub fn toggle(&mut self, id: &TaskId) -> Option<bool> {
        self.store.toggle_complete(id)
    }

    pub fn delete(&mut self, id: &TaskId) -> bool {
        self.store.delete(id)
    }

    pub fn clear_completed(&mut self) -> usize {
        self.store.clear_completed()
    }

    /// Opens an edit on `id` and returns the task's current fields. A miss
    /// leaves no edit open.
    pub fn begin_edit(&mut self, id: &TaskId) -> Option<TaskDraft> {
        let Some(task) = self.store.get(id) else {
            self.state.editing = None;
            return None;
        };
        let draft = task.to_draft();
        self.state.editing = Some(id.clone());
        debug!(id = %id, "edit opened");
        Some(draft)
    }

    /// Applies `draft` to the task under edit and closes the edit. Returns
    /// false when no edit is open or the task has gone away.
    pub fn save_edit(&mut self, draft: TaskDraft) -> bool {
        let Some(id) = self.state.editing.take() else {
            debug!("no edit open; save ignored");
            return false;
        };
        self.store.update(&id, draft)
    }

    pub fn cancel_edit(&mut self) {
        if let Some(id) = self.state.editing.take() {
            debug!(id = %id, "edit discarded");
        }
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
        info!(%theme, "theme changed");
        if let Err(err) = self.store.persistence_mut().save_theme(theme) {
            warn!(error = %format!("{err:#}"), "theme preference not saved");
            self.store.sink_mut().notify(MSG_SAVE_FAILED, Severity::Error);
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        let next = self.theme.toggled();
        self.set_theme(next);
        next
    }

    pub fn current_filter(&self) -> Filter {
        Filter::new(self.state.filter, &self.state.query)
    }

    pub fn view(&self, today: NaiveDate) -> ListView {
        let all = self.store.tasks();
        let filtered = self.current_filter().apply(all);
        render::project(&filtered, all, today)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::notify::RecordingSink;
    use crate::storage::MemoryStore;
    use crate::store::MSG_UPDATED;
    use crate::task::{Category, Priority};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 8, 0, 0).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn session() -> Session<MemoryStore, RecordingSink> {
        Session::open(
            Persistence::new(MemoryStore::new()),
            RecordingSink::new(),
            Theme::Light,
        )
    }

    #[test]
    fn view_composes_filter_search_and_stats() {
        let mut s = session();
        let milk = s.submit(TaskDraft::new("Buy milk"), now()).unwrap();
        s.submit(TaskDraft::new("Buy groceries"), now()).unwrap();
        s.submit(TaskDraft::new("File taxes").with_category(Category::Finances), now())
            .unwrap();
        s.toggle(&milk);

        s.set_search("  BUY ");
        assert_eq!(s.state().query, "buy");
        let view = s.view(today());
        let titles: Vec<_> = view.rows.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy groceries", "Buy milk"]);
        assert_eq!(view.stats.total, 3);
        assert_eq!(view.stats.completed, 1);
        assert!(view.has_completed);

        s.set_filter(StatusFilter::Pending);
        let view = s.view(today());
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].title, "Buy groceries");

        s.set_search("finan");
        s.set_filter(StatusFilter::Completed);
        let view = s.view(today());
        assert!(view.empty);
        assert_eq!(view.stats.total, 3);
    }

    #[test]
    fn edit_is_prepopulated_and_saved() {
        let mut s = session();
        let due = NaiveDate::from_ymd_opt(2026, 11, 1);
        let id = s
            .submit(
                TaskDraft::new("Dentist")
                    .with_category(Category::Health)
                    .with_priority(Priority::High)
                    .with_due_date(due),
                now(),
            )
            .unwrap();

        let draft = s.begin_edit(&id).expect("edit opens");
        assert_eq!(s.state().editing, Some(id.clone()));
        assert_eq!(draft.title, "Dentist");
        assert_eq!(draft.category, Category::Health);
        assert_eq!(draft.due_date, due);

        assert!(s.save_edit(TaskDraft { title: "Dentist 9am".to_string(), ..draft }));
        assert_eq!(s.state().editing, None);
        assert_eq!(s.store().get(&id).unwrap().title, "Dentist 9am");
        assert_eq!(s.store().sink().last().unwrap().message, MSG_UPDATED);
    }

    #[test]
    fn cancelled_edit_discards_changes() {
        let mut s = session();
        let id = s.submit(TaskDraft::new("Keep"), now()).unwrap();

        let mut draft = s.begin_edit(&id).unwrap();
        draft.title = "Changed".to_string();
        s.cancel_edit();

        assert!(!s.save_edit(draft));
        assert_eq!(s.store().get(&id).unwrap().title, "Keep");
    }

    #[test]
    fn begin_edit_on_missing_task_opens_nothing() {
        let mut s = session();
        assert_eq!(s.begin_edit(&TaskId::from("nope")), None);
        assert_eq!(s.state().editing, None);
    }

    #[test]
    fn theme_toggles_and_persists() {
        let mut s = session();
        assert_eq!(s.theme(), Theme::Light);
        assert_eq!(s.toggle_theme(), Theme::Dark);
        assert_eq!(s.store().persistence().load_theme(), Some(Theme::Dark));

        let reopened = Session::open(
            Persistence::new(s.store().persistence().backend().clone()),
            RecordingSink::new(),
            Theme::Light,
        );
        assert_eq!(reopened.theme(), Theme::Dark);
    }

    #[test]
    fn failed_theme_save_is_reported() {
        let mut kv = MemoryStore::new();
        kv.fail_writes = true;
        let mut s = Session::open(Persistence::new(kv), RecordingSink::new(), Theme::Dark);

        s.set_theme(Theme::Light);

        assert_eq!(s.theme(), Theme::Light);
        assert_eq!(s.store().sink().messages(), vec![MSG_SAVE_FAILED]);
    }
}
