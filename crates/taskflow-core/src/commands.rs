mod modifiers;

use anyhow::anyhow;
use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::cli::Invocation;
use crate::config::Config;
use crate::datetime::Zone;
use crate::filter::StatusFilter;
use crate::notify::NotificationSink;
use crate::render::Renderer;
use crate::session::Session;
use crate::storage::KeyValueStore;
use crate::task::{Category, Priority, Task, TaskDraft, TaskId, Theme};

use self::modifiers::{Mod, apply_mods, parse_words_and_mods};

pub fn known_command_names() -> Vec<&'static str> {
    vec![
        "add", "list", "done", "edit", "delete", "clear", "stats", "theme", "export", "help",
        "version",
    ]
}

pub fn expand_command_abbrev(token: &str, known: &[&'static str]) -> Option<&'static str> {
    if let Some(exact) = known.iter().copied().find(|name| *name == token) {
        return Some(exact);
    }

    let mut matches = known.iter().copied().filter(|name| name.starts_with(token));
    let first = matches.next()?;
    if matches.next().is_some() {
        None
    } else {
        Some(first)
    }
}

/// Checks the config keys that only commands read, so a bad value fails at
/// startup rather than on the first command that needs it.
#[instrument(skip(cfg))]
pub fn validate_config(cfg: &Config) -> anyhow::Result<()> {
    cfg.get_parsed::<Category>("default.category")?;
    cfg.get_parsed::<Priority>("default.priority")?;
    if let Some(cmd) = cfg.get("default.command")
        && expand_command_abbrev(&cmd, &known_command_names()).is_none()
    {
        return Err(anyhow!("invalid value for default.command: {cmd}"));
    }
    Ok(())
}

#[instrument(skip(session, cfg, renderer, zone, inv))]
pub fn dispatch<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    cfg: &Config,
    renderer: &Renderer,
    zone: Zone,
    inv: Invocation,
) -> anyhow::Result<()> {
    let now = Utc::now();
    dispatch_at(session, cfg, renderer, zone.today(now), now, inv)
}

/// `dispatch` with the clock pinned.
pub fn dispatch_at<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    cfg: &Config,
    renderer: &Renderer,
    today: NaiveDate,
    now: DateTime<Utc>,
    inv: Invocation,
) -> anyhow::Result<()> {
    let command = inv.command.as_str();
    let args = inv.args.as_slice();
    debug!(command, ?args, json = inv.json, %today, "dispatching command");

    match command {
        "add" => cmd_add(session, cfg, renderer, args, today, now, inv.json),
        "list" => cmd_list(session, renderer, args, today, inv.json),
        "done" => cmd_done(session, renderer, args, inv.json),
        "edit" => cmd_edit(session, renderer, args, today, inv.json),
        "delete" => cmd_delete(session, args),
        "clear" => cmd_clear(session, renderer, inv.json),
        "stats" => cmd_stats(session, renderer, today, inv.json),
        "theme" => cmd_theme(session, renderer, args, inv.json),
        "export" => renderer.print_json(&session.store().tasks()),
        "help" => cmd_help(),
        "version" => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        other => Err(anyhow!("unknown command: {other}")),
    }
}

#[instrument(skip(session, cfg, renderer, args, today, now))]
fn cmd_add<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    cfg: &Config,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    now: DateTime<Utc>,
    json: bool,
) -> anyhow::Result<()> {
    info!("command add");

    let parsed = parse_words_and_mods(args, today)?;
    let mut draft = TaskDraft::new(parsed.text())
        .with_category(cfg.get_parsed::<Category>("default.category")?.unwrap_or_default())
        .with_priority(cfg.get_parsed::<Priority>("default.priority")?.unwrap_or_default());
    apply_mods(&mut draft, &parsed.mods)?;

    let Some(id) = session.submit(draft, now) else {
        warn!("task title is empty; nothing created");
        return Ok(());
    };

    if json {
        return print_task(session, renderer, &id);
    }
    println!("Created task {}.", id.handle(session.store().tasks()));
    Ok(())
}

#[instrument(skip(session, renderer, args, today))]
fn cmd_list<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    json: bool,
) -> anyhow::Result<()> {
    info!("command list");

    let parsed = parse_words_and_mods(args, today)?;
    let mut status = StatusFilter::All;
    for one_mod in &parsed.mods {
        match one_mod {
            Mod::Status(s) => status = *s,
            other => return Err(anyhow!("list only accepts status: modifiers, got {other:?}")),
        }
    }

    session.set_filter(status);
    session.set_search(&parsed.text());
    let view = session.view(today);

    if json {
        renderer.print_json(&view)
    } else {
        renderer.print_list(&view)
    }
}

#[instrument(skip(session, renderer, args))]
fn cmd_done<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    renderer: &Renderer,
    args: &[String],
    json: bool,
) -> anyhow::Result<()> {
    info!("command done");

    let id = resolve_id(session.store().tasks(), require_id(args, "done")?)?;
    if session.toggle(&id).is_none() {
        warn!(id = %id, "no task matches that id");
        return Ok(());
    }

    if json {
        return print_task(session, renderer, &id);
    }
    Ok(())
}

#[instrument(skip(session, renderer, args, today))]
fn cmd_edit<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    renderer: &Renderer,
    args: &[String],
    today: NaiveDate,
    json: bool,
) -> anyhow::Result<()> {
    info!("command edit");

    let id = resolve_id(session.store().tasks(), require_id(args, "edit")?)?;
    let parsed = parse_words_and_mods(&args[1..], today)?;

    let Some(mut draft) = session.begin_edit(&id) else {
        warn!(id = %id, "no task matches that id");
        return Ok(());
    };

    if !parsed.words.is_empty() {
        draft.title = parsed.text();
    }
    if let Err(err) = apply_mods(&mut draft, &parsed.mods) {
        session.cancel_edit();
        return Err(err);
    }
    session.save_edit(draft);

    if json {
        return print_task(session, renderer, &id);
    }
    Ok(())
}

#[instrument(skip(session, args))]
fn cmd_delete<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    args: &[String],
) -> anyhow::Result<()> {
    info!("command delete");

    let id = resolve_id(session.store().tasks(), require_id(args, "delete")?)?;
    if !session.delete(&id) {
        warn!(id = %id, "no task matches that id");
    }
    Ok(())
}

#[instrument(skip(session, renderer))]
fn cmd_clear<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    renderer: &Renderer,
    json: bool,
) -> anyhow::Result<()> {
    info!("command clear");

    let removed = session.clear_completed();
    if json {
        return renderer.print_json(&json!({ "removed": removed }));
    }
    if removed == 0 {
        println!("No completed tasks to remove.");
    }
    Ok(())
}

#[instrument(skip(session, renderer, today))]
fn cmd_stats<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    renderer: &Renderer,
    today: NaiveDate,
    json: bool,
) -> anyhow::Result<()> {
    info!("command stats");

    let view = session.view(today);
    if json {
        renderer.print_json(&view.stats)
    } else {
        renderer.print_stats(&view)
    }
}

#[instrument(skip(session, renderer, args))]
fn cmd_theme<S: KeyValueStore, N: NotificationSink>(
    session: &mut Session<S, N>,
    renderer: &Renderer,
    args: &[String],
    json: bool,
) -> anyhow::Result<()> {
    info!("command theme");

    match args {
        [] => {}
        [arg] if arg.eq_ignore_ascii_case("toggle") => {
            session.toggle_theme();
        }
        [arg] => session.set_theme(arg.parse::<Theme>()?),
        _ => return Err(anyhow!("theme takes at most one argument: light, dark or toggle")),
    }

    let theme = session.theme();
    if json {
        return renderer.print_json(&json!({ "theme": theme }));
    }
    println!("{theme}");
    Ok(())
}

fn cmd_help() -> anyhow::Result<()> {
    println!(
        "\
usage: taskflow [-v|-q] [--rc key=value] [--config PATH] [--data DIR] [--json] <command> [args]

commands:
  add <title> [category:X] [priority:X] [due:DATE]   create a task
  list [status:all|pending|completed] [search]       show tasks and statistics
  done <id>                                          toggle completion
  edit <id> [title] [category:X] [priority:X] [due:DATE]
  delete <id>                                        remove a task
  clear                                              remove completed tasks
  stats                                              show statistics only
  theme [light|dark|toggle]                          show or change the theme
  export                                             print all tasks as JSON
  help, version

categories: {}
priorities: {}
dates: YYYY-MM-DD, today, tomorrow, yesterday, weekday names, +Nd, -Nd, +Nw, -Nw",
        Category::ALL.map(|c| c.as_str()).join(", "),
        Priority::ALL.map(|p| p.as_str()).join(", "),
    );
    Ok(())
}

fn require_id<'a>(args: &'a [String], command: &str) -> anyhow::Result<&'a str> {
    match args.first().map(|s| s.trim()) {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(anyhow!("{command} requires a task id")),
    }
}

/// Exact id first, then a unique prefix. An id that matches nothing is
/// passed through unchanged so the store treats it as a lookup miss.
fn resolve_id(tasks: &[Task], token: &str) -> anyhow::Result<TaskId> {
    if tasks.iter().any(|t| t.id.as_str() == token) {
        return Ok(TaskId::from(token));
    }

    let matches: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.id.as_str().starts_with(token))
        .collect();
    match matches.as_slice() {
        [] => Ok(TaskId::from(token)),
        [one] => {
            debug!(prefix = token, id = %one.id, "resolved id prefix");
            Ok(one.id.clone())
        }
        many => Err(anyhow!(
            "ambiguous id prefix {token}: matches {} tasks",
            many.len()
        )),
    }
}

fn print_task<S: KeyValueStore, N: NotificationSink>(
    session: &Session<S, N>,
    renderer: &Renderer,
    id: &TaskId,
) -> anyhow::Result<()> {
    match session.store().get(id) {
        Some(task) => renderer.print_json(task),
        None => Err(anyhow!("task {id} disappeared")),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::*;
    use crate::notify::RecordingSink;
    use crate::storage::{MemoryStore, Persistence};
    use crate::store::{MSG_COMPLETED, MSG_CREATED, MSG_DELETED, MSG_UPDATED};

    type TestSession = Session<MemoryStore, RecordingSink>;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 16).unwrap()
    }

    fn session() -> TestSession {
        Session::open(
            Persistence::new(MemoryStore::new()),
            RecordingSink::new(),
            Theme::Light,
        )
    }

    fn run(session: &mut TestSession, cfg: &Config, line: &[&str]) -> anyhow::Result<()> {
        let inv = Invocation {
            command: line[0].to_string(),
            args: line[1..].iter().map(|s| s.to_string()).collect(),
            json: false,
        };
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        dispatch_at(session, cfg, &Renderer::plain(), today(), now, inv)
    }

    fn only_id(session: &TestSession) -> TaskId {
        session.store().tasks()[0].id.clone()
    }

    #[test]
    fn add_applies_modifiers_and_config_defaults() {
        let mut cfg = Config::default();
        cfg.apply_overrides(vec![("default.priority".to_string(), "low".to_string())]);
        let mut s = session();

        run(&mut s, &cfg, &["add", "Pay", "rent", "cat:finances", "due:+3d"]).unwrap();

        let task = &s.store().tasks()[0];
        assert_eq!(task.title, "Pay rent");
        assert_eq!(task.category, Category::Finances);
        assert_eq!(task.priority, Priority::Low);
        assert_eq!(task.due_date, NaiveDate::from_ymd_opt(2026, 10, 19));
        assert_eq!(s.store().sink().messages(), vec![MSG_CREATED]);
    }

    #[test]
    fn add_without_title_creates_nothing() {
        let mut s = session();
        run(&mut s, &Config::default(), &["add", "pri:high"]).unwrap();
        assert!(s.store().is_empty());
        assert!(s.store().sink().notifications.is_empty());
    }

    #[test]
    fn done_edit_and_delete_resolve_id_prefixes() {
        let cfg = Config::default();
        let mut s = session();
        run(&mut s, &cfg, &["add", "Draft", "report"]).unwrap();
        let id = only_id(&s);
        let prefix = &id.as_str()[..6];

        run(&mut s, &cfg, &["done", prefix]).unwrap();
        assert!(s.store().get(&id).unwrap().completed);

        run(&mut s, &cfg, &["edit", prefix, "Final", "report", "pri:high", "due:"]).unwrap();
        let task = s.store().get(&id).unwrap();
        assert_eq!(task.title, "Final report");
        assert_eq!(task.priority, Priority::High);
        assert!(task.completed);
        assert_eq!(s.state().editing, None);

        run(&mut s, &cfg, &["delete", id.as_str()]).unwrap();
        assert!(s.store().is_empty());
        assert_eq!(
            s.store().sink().messages(),
            vec![MSG_CREATED, MSG_COMPLETED, MSG_UPDATED, MSG_DELETED]
        );
    }

    #[test]
    fn edit_with_only_modifiers_keeps_title() {
        let cfg = Config::default();
        let mut s = session();
        run(&mut s, &cfg, &["add", "Gym"]).unwrap();
        let id = only_id(&s);

        run(&mut s, &cfg, &["edit", id.as_str(), "category:health"]).unwrap();
        let task = s.store().get(&id).unwrap();
        assert_eq!(task.title, "Gym");
        assert_eq!(task.category, Category::Health);
    }

    #[test]
    fn unknown_id_is_a_silent_miss() {
        let cfg = Config::default();
        let mut s = session();
        run(&mut s, &cfg, &["add", "Keep"]).unwrap();

        run(&mut s, &cfg, &["done", "zzzz"]).unwrap();
        run(&mut s, &cfg, &["delete", "zzzz"]).unwrap();

        assert!(!s.store().tasks()[0].completed);
        assert_eq!(s.store().sink().messages(), vec![MSG_CREATED]);
    }

    #[test]
    fn ambiguous_prefix_is_an_error() {
        let tasks: Vec<Task> = ["ab01", "ab02"]
            .iter()
            .map(|id| {
                Task::new_pending(
                    TaskDraft::new("x"),
                    TaskId::from(*id),
                    Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap(),
                )
            })
            .collect();

        assert!(resolve_id(&tasks, "ab").is_err());
        assert_eq!(resolve_id(&tasks, "ab02").unwrap(), TaskId::from("ab02"));
        assert_eq!(resolve_id(&tasks, "zz").unwrap(), TaskId::from("zz"));
    }

    #[test]
    fn listed_short_ids_resolve_to_their_own_task() {
        let now = Utc.with_ymd_and_hms(2026, 10, 16, 9, 0, 0).unwrap();
        let tasks: Vec<Task> = ["1760000000000", "1760000000001", "0123456789abcdef"]
            .iter()
            .map(|id| Task::new_pending(TaskDraft::new("x"), TaskId::from(*id), now))
            .collect();
        let filtered: Vec<&Task> = tasks.iter().collect();

        let view = crate::render::project(&filtered, &tasks, today());
        assert_eq!(view.rows[2].short_id, "01234567");
        for row in &view.rows {
            let resolved = resolve_id(&tasks, &row.short_id).expect("shown id resolves");
            assert_eq!(resolved.as_str(), row.id);
        }
    }

    #[test]
    fn list_sets_filter_and_search() {
        let cfg = Config::default();
        let mut s = session();
        run(&mut s, &cfg, &["add", "Buy", "groceries"]).unwrap();

        run(&mut s, &cfg, &["list", "status:pending", "GRO"]).unwrap();
        assert_eq!(s.state().filter, StatusFilter::Pending);
        assert_eq!(s.state().query, "gro");

        assert!(run(&mut s, &cfg, &["list", "pri:high"]).is_err());
    }

    #[test]
    fn theme_command_sets_and_toggles() {
        let cfg = Config::default();
        let mut s = session();

        run(&mut s, &cfg, &["theme", "dark"]).unwrap();
        assert_eq!(s.theme(), Theme::Dark);
        run(&mut s, &cfg, &["theme", "toggle"]).unwrap();
        assert_eq!(s.theme(), Theme::Light);
        assert!(run(&mut s, &cfg, &["theme", "sepia"]).is_err());
    }

    #[test]
    fn bad_command_defaults_fail_validation() {
        assert!(validate_config(&Config::default()).is_ok());

        for (key, value) in [
            ("default.category", "chores"),
            ("default.priority", "urgent"),
            ("default.command", "d"),
        ] {
            let mut cfg = Config::default();
            cfg.apply_overrides(vec![(key.to_string(), value.to_string())]);
            let err = validate_config(&cfg).unwrap_err();
            assert!(format!("{err:#}").contains(key), "{key}: {err:#}");
        }
    }

    #[test]
    fn abbreviations_expand_to_unique_commands() {
        let known = known_command_names();
        assert_eq!(expand_command_abbrev("ex", &known), Some("export"));
        assert_eq!(expand_command_abbrev("list", &known), Some("list"));
        assert_eq!(expand_command_abbrev("d", &known), None);
        assert_eq!(expand_command_abbrev("de", &known), Some("delete"));
    }
}
