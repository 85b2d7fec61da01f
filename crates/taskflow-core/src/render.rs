use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use serde::Serialize;
use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_due_date;
use crate::task::{Category, Priority, Task};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRow {
    pub id: String,
    pub short_id: String,
    pub title: String,
    pub completed: bool,
    pub priority: Priority,
    pub priority_label: String,
    pub category: Category,
    pub category_label: String,
    pub due_date: Option<NaiveDate>,
    pub due_label: Option<String>,
    pub overdue: bool,
}

impl TaskRow {
    /// `all` is the full collection, so the short id stays unique across it.
    pub fn from_task(task: &Task, all: &[Task], today: NaiveDate) -> Self {
        Self {
            id: task.id.to_string(),
            short_id: task.id.handle(all).to_string(),
            title: task.title.clone(),
            completed: task.completed,
            priority: task.priority,
            priority_label: task.priority.label().to_string(),
            category: task.category,
            category_label: format!("{} {}", task.category.icon(), task.category.label()),
            due_date: task.due_date,
            due_label: task.due_date.map(format_due_date),
            overdue: task.is_overdue(today),
        }
    }
}

/// Counts over the whole collection, never the filtered view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Stats {
    pub total: usize,
    pub pending: usize,
    pub completed: usize,
    pub percent: u32,
}

impl Stats {
    pub fn from_tasks(tasks: &[Task]) -> Self {
        let total = tasks.len();
        let completed = tasks.iter().filter(|t| t.completed).count();
        let percent = if total == 0 {
            0
        } else {
            (completed as f64 / total as f64 * 100.0).round() as u32
        };
        Self {
            total,
            pending: total - completed,
            completed,
            percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListView {
    pub rows: Vec<TaskRow>,
    pub stats: Stats,
    pub empty: bool,
    pub has_completed: bool,
}

/// Projects the filtered tasks plus the full collection into everything a
/// list screen shows. Same inputs, same output.
pub fn project(filtered: &[&Task], all: &[Task], today: NaiveDate) -> ListView {
    ListView {
        rows: filtered
            .iter()
            .map(|task| TaskRow::from_task(task, all, today))
            .collect(),
        stats: Stats::from_tasks(all),
        empty: filtered.is_empty(),
        has_completed: all.iter().any(|t| t.completed),
    }
}

/// Escapes control characters (ESC included) so user text can never drive
/// the terminal.
pub fn literal_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch.is_control() {
            out.extend(ch.escape_default());
        } else {
            out.push(ch);
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);
        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    pub fn color_enabled(&self) -> bool {
        self.color
    }

    #[tracing::instrument(skip(self, view))]
    pub fn print_list(&self, view: &ListView) -> anyhow::Result<()> {
        let color = self.color && io::stdout().is_terminal();
        self.write_list(io::stdout().lock(), view, color)
    }

    #[tracing::instrument(skip(self, view))]
    pub fn print_stats(&self, view: &ListView) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", stats_line(&view.stats))?;
        Ok(())
    }

    pub fn print_json<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        serde_json::to_writer_pretty(&mut out, value)?;
        writeln!(out)?;
        Ok(())
    }

    pub fn write_list<W: Write>(&self, mut out: W, view: &ListView, color: bool) -> anyhow::Result<()> {
        if view.empty {
            writeln!(out, "No tasks found.")?;
        } else {
            let headers = vec![
                "ID".to_string(),
                "Done".to_string(),
                "Title".to_string(),
                "Category".to_string(),
                "Priority".to_string(),
                "Due".to_string(),
            ];

            let mut rows = Vec::with_capacity(view.rows.len());
            for row in &view.rows {
                let id = paint(color, row.short_id.as_str(), "33");
                let done = if row.completed { "[x]" } else { "[ ]" }.to_string();
                let title = literal_text(&row.title);
                let title = if row.completed {
                    paint(color, &title, "2")
                } else {
                    title
                };
                let priority = paint(color, &row.priority_label, priority_code(row.priority));
                let due = match (&row.due_label, row.overdue) {
                    (Some(label), true) => paint(color, &format!("{label} !"), "31"),
                    (Some(label), false) => label.clone(),
                    (None, _) => String::new(),
                };

                rows.push(vec![id, done, title, row.category_label.clone(), priority, due]);
            }

            write_table(&mut out, headers, rows)?;
        }

        writeln!(out)?;
        writeln!(out, "{}", stats_line(&view.stats))?;
        if view.has_completed {
            writeln!(out, "Run `taskflow clear` to remove completed tasks.")?;
        }
        Ok(())
    }
}

fn stats_line(stats: &Stats) -> String {
    format!(
        "{} total · {} pending · {} completed · {}% done",
        stats.total, stats.pending, stats.completed, stats.percent
    )
}

fn priority_code(priority: Priority) -> &'static str {
    match priority {
        Priority::Low => "32",
        Priority::Medium => "33",
        Priority::High => "31",
    }
}

fn paint(color: bool, text: &str, code: &str) -> String {
    if !color {
        return text.to_string();
    }
    format!("\x1b[{code}m{text}\x1b[0m")
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
