use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{
  Deserialize,
  Serialize
};
use tracing::trace;

use crate::task::Task;

#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
  #[default]
  All,
  Pending,
  Completed
}

impl StatusFilter {
  pub fn as_str(self) -> &'static str {
    match self {
      | StatusFilter::All => "all",
      | StatusFilter::Pending => {
        "pending"
      }
      | StatusFilter::Completed => {
        "completed"
      }
    }
  }

  pub fn admits(
    self,
    task: &Task
  ) -> bool {
    match self {
      | StatusFilter::All => true,
      | StatusFilter::Pending => {
        !task.completed
      }
      | StatusFilter::Completed => {
        task.completed
      }
    }
  }
}

impl fmt::Display for StatusFilter {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for StatusFilter {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "all" => Ok(StatusFilter::All),
      | "pending" | "open" | "todo" => {
        Ok(StatusFilter::Pending)
      }
      | "completed" | "done" => {
        Ok(StatusFilter::Completed)
      }
      | other => {
        Err(anyhow!(
          "unknown status filter: \
           {other} (expected all, \
           pending or completed)"
        ))
      }
    }
  }
}

/// Status filter AND free-text search.
/// The search needle is trimmed and
/// lowercased once at construction.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct Filter {
  status: StatusFilter,
  needle: Option<String>
}

impl Filter {
  pub fn new(
    status: StatusFilter,
    query: &str
  ) -> Self {
    let needle =
      query.trim().to_lowercase();
    Self {
      status,
      needle: (!needle.is_empty())
        .then_some(needle)
    }
  }

  pub fn status(&self) -> StatusFilter {
    self.status
  }

  pub fn needle(&self) -> Option<&str> {
    self.needle.as_deref()
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    if !self.status.admits(task) {
      return false;
    }

    match &self.needle {
      | None => true,
      | Some(needle) => {
        task
          .title
          .to_lowercase()
          .contains(needle.as_str())
          || task
            .category
            .as_str()
            .contains(needle.as_str())
      }
    }
  }

  /// Surviving tasks keep their source
  /// order.
  #[tracing::instrument(skip(
    self, tasks
  ))]
  pub fn apply<'a>(
    &self,
    tasks: &'a [Task]
  ) -> Vec<&'a Task> {
    let out: Vec<&Task> = tasks
      .iter()
      .filter(|task| self.matches(task))
      .collect();
    trace!(
      status = %self.status,
      needle = ?self.needle,
      total = tasks.len(),
      kept = out.len(),
      "applied filter"
    );
    out
  }
}

#[cfg(test)]
mod tests {
  use chrono::{
    TimeZone,
    Utc
  };

  use super::{
    Filter,
    StatusFilter
  };
  use crate::task::{
    Category,
    Task,
    TaskDraft,
    TaskId
  };

  fn task(
    id: &str,
    title: &str,
    category: Category,
    completed: bool
  ) -> Task {
    let now = Utc
      .with_ymd_and_hms(
        2026, 2, 16, 5, 0, 0
      )
      .unwrap();
    let mut task = Task::new_pending(
      TaskDraft::new(title)
        .with_category(category),
      TaskId::from(id),
      now
    );
    task.completed = completed;
    task
  }

  fn titles(
    tasks: &[&Task]
  ) -> Vec<String> {
    tasks
      .iter()
      .map(|t| t.title.clone())
      .collect()
  }

  #[test]
  fn pending_with_empty_query() {
    let tasks = vec![
      task(
        "1",
        "A",
        Category::Other,
        false
      ),
      task(
        "2",
        "B",
        Category::Other,
        true
      ),
    ];

    let filter = Filter::new(
      StatusFilter::Pending,
      ""
    );
    assert_eq!(
      titles(&filter.apply(&tasks)),
      vec!["A"]
    );

    let done = Filter::new(
      StatusFilter::Completed,
      "  "
    );
    assert_eq!(
      titles(&done.apply(&tasks)),
      vec!["B"]
    );
  }

  #[test]
  fn search_matches_title_or_category()
  {
    let tasks = vec![
      task(
        "1",
        "Buy groceries",
        Category::Personal,
        false
      ),
      task(
        "2",
        "Call the bank",
        Category::Finances,
        true
      ),
      task(
        "3",
        "Revise notes",
        Category::Studies,
        false
      ),
      task(
        "4",
        "Walk the dog",
        Category::Health,
        false
      ),
    ];

    let by_title =
      Filter::new(StatusFilter::All, "GRO");
    assert_eq!(
      titles(&by_title.apply(&tasks)),
      vec!["Buy groceries"]
    );

    let by_category = Filter::new(
      StatusFilter::All,
      " Stud "
    );
    assert_eq!(
      titles(
        &by_category.apply(&tasks)
      ),
      vec!["Revise notes"]
    );

    let none =
      Filter::new(StatusFilter::All, "xyz");
    assert!(none.apply(&tasks).is_empty());
  }

  #[test]
  fn status_and_search_intersect_in_source_order()
   {
    let tasks = vec![
      task(
        "1",
        "Report draft",
        Category::Work,
        false
      ),
      task(
        "2",
        "Report final",
        Category::Work,
        true
      ),
      task(
        "3",
        "Expense report",
        Category::Finances,
        false
      ),
      task(
        "4",
        "Gym",
        Category::Health,
        false
      ),
    ];

    let filter = Filter::new(
      StatusFilter::Pending,
      "report"
    );
    let once = filter.apply(&tasks);
    assert_eq!(
      titles(&once),
      vec![
        "Report draft",
        "Expense report"
      ]
    );

    // applying the same filter state to
    // its own output changes nothing
    let owned: Vec<_> = once
      .into_iter()
      .cloned()
      .collect();
    let twice = filter.apply(&owned);
    assert_eq!(
      titles(&twice),
      vec![
        "Report draft",
        "Expense report"
      ]
    );
  }

  #[test]
  fn parses_status_aliases() {
    assert_eq!(
      "Done"
        .parse::<StatusFilter>()
        .unwrap(),
      StatusFilter::Completed
    );
    assert_eq!(
      "open"
        .parse::<StatusFilter>()
        .unwrap(),
      StatusFilter::Pending
    );
    assert!(
      "later"
        .parse::<StatusFilter>()
        .is_err()
    );
  }
}
