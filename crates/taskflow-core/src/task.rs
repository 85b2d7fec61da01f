use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque task identifier. Newly created tasks get a simple-form UUID v4;
/// ids loaded from disk are kept verbatim whatever their shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display handle for listings: the shortest prefix of at least eight
    /// characters that no other id in `tasks` starts with, or the whole id.
    pub fn handle(&self, tasks: &[Task]) -> &str {
        let ends = self
            .0
            .char_indices()
            .map(|(idx, _)| idx)
            .skip(HANDLE_MIN_CHARS)
            .chain(std::iter::once(self.0.len()));
        for end in ends {
            let prefix = &self.0[..end];
            let clash = tasks
                .iter()
                .any(|t| t.id != *self && t.id.as_str().starts_with(prefix));
            if !clash {
                return prefix;
            }
        }
        &self.0
    }
}

const HANDLE_MIN_CHARS: usize = 8;

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Personal,
    Work,
    Studies,
    Health,
    Finances,
    Other,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Personal,
        Category::Work,
        Category::Studies,
        Category::Health,
        Category::Finances,
        Category::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Work => "work",
            Category::Studies => "studies",
            Category::Health => "health",
            Category::Finances => "finances",
            Category::Other => "other",
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Category::Personal => "🏠",
            Category::Work => "💼",
            Category::Studies => "📚",
            Category::Health => "🏃",
            Category::Finances => "💰",
            Category::Other => "📌",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Personal => "Personal",
            Category::Work => "Work",
            Category::Studies => "Studies",
            Category::Health => "Health",
            Category::Finances => "Finances",
            Category::Other => "Other",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let names = Category::ALL.map(Category::as_str);
        let name = resolve_name(s, &names)
            .ok_or_else(|| anyhow!("unknown category: {s} (expected one of {})", names.join(", ")))?;
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == name)
            .ok_or_else(|| anyhow!("unknown category: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Priority::Low => "🟢 Low",
            Priority::Medium => "🟡 Medium",
            Priority::High => "🔴 High",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let names = Priority::ALL.map(Priority::as_str);
        let name = resolve_name(s, &names)
            .ok_or_else(|| anyhow!("unknown priority: {s} (expected one of {})", names.join(", ")))?;
        Priority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == name)
            .ok_or_else(|| anyhow!("unknown priority: {s}"))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Theme::Light => Theme::Dark,
            Theme::Dark => Theme::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            other => Err(anyhow!("unknown theme: {other} (expected light or dark)")),
        }
    }
}

/// The four user-editable fields of a task, as filled in by the creation
/// form or the edit dialog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TaskDraft {
    pub title: String,
    pub category: Category,
    pub priority: Priority,
    pub due_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_due_date(mut self, due_date: Option<NaiveDate>) -> Self {
        self.due_date = due_date;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,

    pub title: String,

    pub category: Category,

    pub priority: Priority,

    #[serde(default)]
    pub due_date: Option<NaiveDate>,

    pub completed: bool,

    pub created_at: DateTime<Utc>,
}

impl Task {
    pub fn new_pending(draft: TaskDraft, id: TaskId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            category: draft.category,
            priority: draft.priority,
            due_date: draft.due_date,
            completed: false,
            created_at: now,
        }
    }

    pub fn to_draft(&self) -> TaskDraft {
        TaskDraft {
            title: self.title.clone(),
            category: self.category,
            priority: self.priority,
            due_date: self.due_date,
        }
    }

    /// Due strictly before `today` and still open. Time of day plays no part.
    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        !self.completed && self.due_date.map(|due| due < today).unwrap_or(false)
    }
}

/// Exact match first, then a unique prefix, both case-insensitive.
fn resolve_name<'a>(input: &str, names: &[&'a str]) -> Option<&'a str> {
    let token = input.trim().to_lowercase();
    if token.is_empty() {
        return None;
    }
    if let Some(exact) = names.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = names.iter().copied().filter(|name| name.starts_with(&token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}
