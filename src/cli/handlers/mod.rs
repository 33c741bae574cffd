mod init;
pub use init::{cmd_config, cmd_init, cmd_login, cmd_logout, cmd_verify, cmd_whoami};

use std::error::Error;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::cli::commands::*;
use crate::cli::output::*;
use crate::domain::TaskDomain;
use crate::io::auth;
use crate::io::config_io;
use crate::io::store::{data_dir, open_store};
use crate::io::watcher::DataWatcher;
use crate::model::config::{AppConfig, PersistenceMode};
use crate::model::filter::{TaskFilter, TaskSort};
use crate::model::time_entry::TimeEntry;
use crate::ops::catalog_ops::{Catalog, CategoryPatch, NewCategory, NewPriority, PriorityPatch};
use crate::ops::dashboard::format_minutes;
use crate::ops::query::QueryResult;
use crate::ops::recurrence::describe;
use crate::ops::task_ops::{Change, NewTask, TaskPatch, normalize_tags};
use crate::ops::time_ops::{NewTimeEntry, elapsed_minutes, total_minutes};
use crate::ops::views::{group_tasks, month_grid, tasks_by_day, week_days};
use crate::util::dates::{DayEdge, format_due, parse_instant, parse_month};

type CmdResult = Result<(), Box<dyn Error>>;

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn dispatch(cli: Cli) -> CmdResult {
    let json = cli.json;
    let home = config_io::resolve_home(cli.home.as_deref());
    tracing::debug!(home = %home.display(), "resolved home");

    // Config is read per command; init and config work without a readable config.toml
    let config = || load_config(&home);
    let domain = || -> Result<TaskDomain, Box<dyn Error>> { open_domain(&home, &config()?) };
    let now = Utc::now();

    match cli.command {
        Commands::Init(args) => cmd_init(&home, args),
        Commands::Config(args) => cmd_config(&home, args, json),

        Commands::Login(args) => cmd_login(&home, &config()?, args),
        Commands::Verify(args) => cmd_verify(&home, &config()?, args),
        Commands::Logout => cmd_logout(&home, &config()?),
        Commands::Whoami => cmd_whoami(&home, &config()?, json),

        Commands::Add(args) => cmd_add(&domain()?, args, json, now),
        Commands::List(args) => cmd_list(&domain()?, args, json, now),
        Commands::Show(args) => cmd_show(&domain()?, args, json, now),
        Commands::Edit(args) => cmd_edit(&domain()?, args, json, now),
        Commands::Done(args) => cmd_done(&domain()?, args, json, now),
        Commands::Rm(args) => cmd_rm(&domain()?, args),
        Commands::Dup(args) => cmd_dup(&domain()?, args, json, now),
        Commands::Reorder(args) => cmd_reorder(&domain()?, args, now),

        Commands::Stats(args) => cmd_stats(&domain()?, args, json, now),
        Commands::Board(args) => cmd_board(&domain()?, args, json, now),
        Commands::Calendar(args) => cmd_calendar(&domain()?, args, json, now),
        Commands::Watch(args) => cmd_watch(&home, &config()?, args),

        Commands::Category(args) => {
            let config = config()?;
            cmd_category(&open_domain(&home, &config)?, &config, args, json, now)
        }
        Commands::Priority(args) => {
            let config = config()?;
            cmd_priority(&open_domain(&home, &config)?, &config, args, json, now)
        }
        Commands::Timer(args) => cmd_timer(&domain()?, args, json, now),
    }
}

fn load_config(home: &Path) -> Result<AppConfig, Box<dyn Error>> {
    let (config, _) = config_io::read_config(home)?;
    Ok(config)
}

/// Signed-in domain over the configured store
fn open_domain(home: &Path, config: &AppConfig) -> Result<TaskDomain, Box<dyn Error>> {
    let session = auth::load_session(home)?.ok_or("not signed in (try `tf login <email>`)")?;
    if session.is_expired(Utc::now()) {
        return Err("session expired; sign in again with `tf login`".into());
    }
    let store = open_store(home, config, Some(&session))?;
    let domain = TaskDomain::new(store, session);
    tracing::debug!(
        store = domain.store_kind(),
        user = %domain.session().user_id(),
        "opened task domain"
    );
    Ok(domain)
}

fn print_json<T: Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_filter(domain: &TaskDomain, args: &FilterArgs) -> Result<TaskFilter, Box<dyn Error>> {
    let category_id = match args.category.as_deref() {
        Some(key) => Some(domain.resolve_category(key)?.id),
        None => None,
    };
    let priority_id = match args.priority.as_deref() {
        Some(key) => Some(domain.resolve_priority(key)?.id),
        None => None,
    };
    for bound in [&args.from, &args.to].into_iter().flatten() {
        if parse_instant(bound, DayEdge::Start).is_none() {
            eprintln!("warning: ignoring unrecognised date '{}'", bound);
        }
    }
    let is_done = match (args.done, args.pending) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    Ok(TaskFilter {
        search: args.search.clone(),
        category_id,
        priority_id,
        is_done,
        due_date_from: args.from.clone(),
        due_date_to: args.to.clone(),
        is_overdue: args.overdue.then_some(true),
        tags: normalize_tags(&args.tags),
    })
}

fn build_sort(sort: Option<&str>, desc: bool) -> Result<Option<TaskSort>, String> {
    sort.map(|field| parse_sort(field, desc)).transpose()
}

fn resolve_due(s: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    s.map(parse_due).transpose()
}

// ---------------------------------------------------------------------------
// Task commands
// ---------------------------------------------------------------------------

fn cmd_add(domain: &TaskDomain, args: AddArgs, json: bool, now: DateTime<Utc>) -> CmdResult {
    let new = NewTask {
        title: args.title,
        description: args.desc,
        category_id: match args.category.as_deref() {
            Some(key) => Some(domain.resolve_category(key)?.id),
            None => None,
        },
        priority_id: match args.priority.as_deref() {
            Some(key) => Some(domain.resolve_priority(key)?.id),
            None => None,
        },
        due_date: resolve_due(args.due.as_deref())?,
        estimated_time: args.estimate,
        actual_time: None,
        tags: args.tags,
        recurrence_pattern: args.repeat.as_deref().map(parse_pattern).transpose()?,
        recurrence_interval: args.every,
        position: None,
    };
    let task = domain.add_task(new, now)?;
    if json {
        let catalog = domain.catalog()?;
        return print_json(&task_to_json(&task, &catalog, now));
    }
    println!("added {}: {}", task.id, task.title);
    Ok(())
}

fn print_query(result: &QueryResult, catalog: &Catalog, json: bool, now: DateTime<Utc>) -> CmdResult {
    if json {
        return print_json(&QueryJson {
            tasks: tasks_to_json(&result.tasks, catalog, now),
            stats: &result.stats,
        });
    }
    if result.tasks.is_empty() {
        println!("no tasks");
        return Ok(());
    }
    for task in &result.tasks {
        println!("{}", format_task_line(task, catalog, now));
    }
    println!();
    println!("{}", format_stats(&result.stats));
    Ok(())
}

fn cmd_list(domain: &TaskDomain, args: ListArgs, json: bool, now: DateTime<Utc>) -> CmdResult {
    let filter = build_filter(domain, &args.filter)?;
    let sort = build_sort(args.sort.as_deref(), args.desc)?;
    let result = domain.query(&filter, sort.as_ref(), now)?;
    print_query(&result, &domain.catalog()?, json, now)
}

fn cmd_show(domain: &TaskDomain, args: IdArg, json: bool, now: DateTime<Utc>) -> CmdResult {
    let task = domain.find_task(args.id)?;
    let catalog = domain.catalog()?;
    let entries = domain.time_entries(Some(task.id))?;

    if json {
        #[derive(Serialize)]
        struct ShowJson<'a> {
            #[serde(flatten)]
            task: TaskJson<'a>,
            time_entries: &'a [TimeEntry],
        }
        return print_json(&ShowJson {
            task: task_to_json(&task, &catalog, now),
            time_entries: &entries,
        });
    }

    for line in format_task_detail(&task, &catalog, now) {
        println!("{}", line);
    }
    if !entries.is_empty() {
        println!();
        println!("time entries ({} logged):", format_minutes(total_minutes(&entries)));
        for entry in &entries {
            println!("  {}", format_time_entry(entry));
        }
    }
    Ok(())
}

fn cmd_edit(domain: &TaskDomain, args: EditArgs, json: bool, now: DateTime<Utc>) -> CmdResult {
    fn change<T>(value: Option<T>, clear: bool) -> Change<T> {
        match (value, clear) {
            (Some(v), _) => Change::Set(v),
            (None, true) => Change::Clear,
            (None, false) => Change::Keep,
        }
    }

    let tags = if args.add_tags.is_empty() && args.remove_tags.is_empty() {
        None
    } else {
        let current = domain.find_task(args.id)?;
        let mut tags: Vec<String> = current
            .tags
            .into_iter()
            .filter(|t| !args.remove_tags.iter().any(|r| r.trim() == t.as_str()))
            .collect();
        tags.extend(args.add_tags);
        Some(tags)
    };

    let category_id = match args.category.as_deref() {
        Some(key) => Some(domain.resolve_category(key)?.id),
        None => None,
    };
    let priority_id = match args.priority.as_deref() {
        Some(key) => Some(domain.resolve_priority(key)?.id),
        None => None,
    };

    let patch = TaskPatch {
        title: args.title,
        description: change(args.desc, args.clear_desc),
        is_done: None,
        category_id: change(category_id, args.clear_category),
        priority_id: change(priority_id, args.clear_priority),
        due_date: change(resolve_due(args.due.as_deref())?, args.clear_due),
        estimated_time: change(args.estimate, false),
        actual_time: change(args.spent, false),
        tags,
        recurrence_pattern: change(
            args.repeat.as_deref().map(parse_pattern).transpose()?,
            args.no_repeat,
        ),
        recurrence_interval: args.every,
        position: None,
    };
    if patch.is_empty() {
        return Err("nothing to change (see `tf edit --help`)".into());
    }

    let task = domain.update_task(args.id, patch, now)?;
    if json {
        let catalog = domain.catalog()?;
        return print_json(&task_to_json(&task, &catalog, now));
    }
    println!("updated {}: {}", task.id, task.title);
    Ok(())
}

fn cmd_done(domain: &TaskDomain, args: IdArg, json: bool, now: DateTime<Utc>) -> CmdResult {
    let toggled = domain.toggle_task(args.id, now)?;
    if json {
        let catalog = domain.catalog()?;
        return print_json(&serde_json::json!({
            "task": task_to_json(&toggled.task, &catalog, now),
            "next": toggled.next.as_ref().map(|t| task_to_json(t, &catalog, now)),
        }));
    }
    let state = if toggled.task.is_done { "done" } else { "reopened" };
    println!("{} {}: {}", state, toggled.task.id, toggled.task.title);
    if let Some(next) = &toggled.next {
        let due = next
            .due_date
            .map(|d| format!(" due {}", format_due(d)))
            .unwrap_or_default();
        println!("next occurrence {}: {}{} ~{}", next.id, next.title, due, describe(next));
    }
    Ok(())
}

fn cmd_rm(domain: &TaskDomain, args: IdArg) -> CmdResult {
    domain.delete_task(args.id)?;
    println!("deleted {}", args.id);
    Ok(())
}

fn cmd_dup(domain: &TaskDomain, args: IdArg, json: bool, now: DateTime<Utc>) -> CmdResult {
    let copy = domain.duplicate_task(args.id, now)?;
    if json {
        let catalog = domain.catalog()?;
        return print_json(&task_to_json(&copy, &catalog, now));
    }
    println!("duplicated {} as {}: {}", args.id, copy.id, copy.title);
    Ok(())
}

fn cmd_reorder(domain: &TaskDomain, args: ReorderArgs, now: DateTime<Utc>) -> CmdResult {
    domain.reorder(&args.ids, now)?;
    println!("reordered {} tasks", args.ids.len());
    Ok(())
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

fn cmd_stats(domain: &TaskDomain, args: StatsArgs, json: bool, now: DateTime<Utc>) -> CmdResult {
    let filter = build_filter(domain, &args.filter)?;
    let dashboard = domain.dashboard(&filter, now)?;
    if json {
        return print_json(&dashboard);
    }
    for line in format_dashboard(&dashboard) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_board(domain: &TaskDomain, args: BoardArgs, json: bool, now: DateTime<Utc>) -> CmdResult {
    let group = parse_group(&args.group)?;
    let filter = build_filter(domain, &args.filter)?;
    let result = domain.query(&filter, None, now)?;
    let catalog = domain.catalog()?;
    let columns = group_tasks(&result.tasks, group, &catalog.categories, &catalog.priorities);
    if json {
        return print_json(&columns_to_json(&columns, &catalog, now));
    }
    for line in format_board(&columns, &catalog, now) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_calendar(domain: &TaskDomain, args: CalendarArgs, json: bool, now: DateTime<Utc>) -> CmdResult {
    let filter = build_filter(domain, &args.filter)?;
    let result = domain.query(&filter, None, now)?;
    let catalog = domain.catalog()?;
    let by_day = tasks_by_day(&result.tasks);

    if let Some(week) = args.week.as_deref() {
        let days = week_days(parse_day(week)?);
        if json {
            return print_json(&calendar_to_json(days[0], days[6], &by_day, &catalog, now));
        }
        for line in format_week(&days, &by_day, &catalog, now) {
            println!("{}", line);
        }
        return Ok(());
    }

    let (year, month) = match args.month.as_deref() {
        Some(m) => parse_month(m).ok_or_else(|| format!("invalid month '{}' (expected YYYY-MM)", m))?,
        None => (now.year(), now.month()),
    };
    let grid = month_grid(year, month).ok_or_else(|| format!("invalid month {}-{:02}", year, month))?;
    let days: Vec<_> = grid.iter().flatten().filter_map(|d| *d).collect();
    let (Some(&first), Some(&last)) = (days.first(), days.last()) else {
        return Err(format!("invalid month {}-{:02}", year, month).into());
    };
    if json {
        return print_json(&calendar_to_json(first, last, &by_day, &catalog, now));
    }
    for line in format_month(first, &grid, &by_day, &catalog, now) {
        println!("{}", line);
    }
    Ok(())
}

fn cmd_watch(home: &Path, config: &AppConfig, args: WatchArgs) -> CmdResult {
    if config.mode != PersistenceMode::Local {
        return Err("watch only follows local data".into());
    }
    let domain = open_domain(home, config)?;
    let dir = data_dir(home);
    std::fs::create_dir_all(&dir)?;
    let watcher = DataWatcher::start(&dir)?;

    let filter = build_filter(&domain, &args.filter)?;
    let sort = build_sort(args.sort.as_deref(), args.desc)?;
    let show = |now: DateTime<Utc>| -> CmdResult {
        let result = domain.query(&filter, sort.as_ref(), now)?;
        print_query(&result, &domain.catalog()?, false, now)
    };

    show(Utc::now())?;
    while let Some(changed) = watcher.wait(Duration::from_millis(200)) {
        tracing::debug!(files = changed.len(), "data changed");
        println!("{}", "-".repeat(40));
        if let Err(e) = show(Utc::now()) {
            eprintln!("error: {}", e);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Categories and priorities
// ---------------------------------------------------------------------------

fn cmd_category(
    domain: &TaskDomain,
    config: &AppConfig,
    args: CategoryCmd,
    json: bool,
    now: DateTime<Utc>,
) -> CmdResult {
    match args.action {
        CategoryAction::List => {
            let categories = domain.categories()?;
            if json {
                return print_json(&categories);
            }
            if categories.is_empty() {
                println!("no categories");
            }
            for c in &categories {
                println!("{}", format_category(c));
            }
        }
        CategoryAction::Add(add) => {
            let category = domain.add_category(
                NewCategory {
                    name: add.name,
                    color: add
                        .color
                        .unwrap_or_else(|| config.defaults.category_color.clone()),
                },
                now,
            )?;
            if json {
                return print_json(&category);
            }
            println!("added category {}: {}", category.id, category.name);
        }
        CategoryAction::Edit(edit) => {
            let id = domain.resolve_category(&edit.key)?.id;
            let patch = CategoryPatch {
                name: edit.name,
                color: edit.color,
            };
            if patch == CategoryPatch::default() {
                return Err("nothing to change (give --name or --color)".into());
            }
            let category = domain.update_category(id, patch)?;
            if json {
                return print_json(&category);
            }
            println!("updated category {}: {}", category.id, category.name);
        }
        CategoryAction::Rm(key) => {
            let category = domain.resolve_category(&key.key)?;
            domain.delete_category(category.id)?;
            println!("deleted category {}: {}", category.id, category.name);
        }
    }
    Ok(())
}

fn cmd_priority(
    domain: &TaskDomain,
    config: &AppConfig,
    args: PriorityCmd,
    json: bool,
    now: DateTime<Utc>,
) -> CmdResult {
    match args.action {
        PriorityAction::List => {
            let priorities = domain.priorities()?;
            if json {
                return print_json(&priorities);
            }
            if priorities.is_empty() {
                println!("no priorities");
            }
            for p in &priorities {
                println!("{}", format_priority(p));
            }
        }
        PriorityAction::Add(add) => {
            let priority = domain.add_priority(
                NewPriority {
                    name: add.name,
                    level: add.level,
                    color: add
                        .color
                        .unwrap_or_else(|| config.defaults.priority_color.clone()),
                },
                now,
            )?;
            if json {
                return print_json(&priority);
            }
            println!("added priority {}: {}", priority.id, priority.name);
        }
        PriorityAction::Edit(edit) => {
            let id = domain.resolve_priority(&edit.key)?.id;
            let patch = PriorityPatch {
                name: edit.name,
                level: edit.level,
                color: edit.color,
            };
            if patch == PriorityPatch::default() {
                return Err("nothing to change (give --name, --level or --color)".into());
            }
            let priority = domain.update_priority(id, patch)?;
            if json {
                return print_json(&priority);
            }
            println!("updated priority {}: {}", priority.id, priority.name);
        }
        PriorityAction::Rm(key) => {
            let priority = domain.resolve_priority(&key.key)?;
            domain.delete_priority(priority.id)?;
            println!("deleted priority {}: {}", priority.id, priority.name);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Timer
// ---------------------------------------------------------------------------

fn cmd_timer(domain: &TaskDomain, args: TimerCmd, json: bool, now: DateTime<Utc>) -> CmdResult {
    match args.action {
        TimerAction::Start(start) => {
            let started = domain.start_timer(
                NewTimeEntry {
                    task_id: start.task,
                    description: start.note,
                },
                now,
            )?;
            if json {
                return print_json(&started.entry);
            }
            if let Some(stopped) = &started.stopped {
                println!(
                    "stopped timer on task {} ({}m)",
                    stopped.entry.task_id,
                    stopped.entry.duration.unwrap_or(0)
                );
            }
            println!("timing task {}", started.entry.task_id);
        }
        TimerAction::Stop => {
            let stopped = domain.stop_timer(now)?;
            if json {
                return print_json(&stopped.entry);
            }
            let minutes = stopped.entry.duration.unwrap_or(0);
            match &stopped.task {
                Some(task) => println!(
                    "stopped: {}m on {} (total {}m)",
                    minutes,
                    task.title,
                    task.actual_time.unwrap_or(0)
                ),
                None => println!("stopped: {}m", minutes),
            }
        }
        TimerAction::Status => {
            let running = domain.active_timer()?;
            if json {
                return print_json(&running);
            }
            match running {
                Some(entry) => {
                    let title = domain
                        .find_task(entry.task_id)
                        .map(|t| t.title)
                        .unwrap_or_else(|_| "(deleted task)".to_string());
                    println!(
                        "timing task {} ({}) for {}m",
                        entry.task_id,
                        title,
                        elapsed_minutes(entry.start_time, now)
                    );
                }
                None => println!("no timer running"),
            }
        }
        TimerAction::Log(log) => {
            let entries = domain.time_entries(log.task)?;
            if json {
                return print_json(&entries);
            }
            if entries.is_empty() {
                println!("no time entries");
                return Ok(());
            }
            for entry in &entries {
                println!("{}", format_time_entry(entry));
            }
            println!();
            println!("total {}", format_minutes(total_minutes(&entries)));
        }
        TimerAction::Rm(entry) => {
            domain.delete_time_entry(entry.entry)?;
            println!("deleted time entry {}", entry.entry);
        }
    }
    Ok(())
}
