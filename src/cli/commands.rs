use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "tf", about = concat!("taflo v", env!("CARGO_PKG_VERSION"), " - tasks, boards and calendars from the terminal"), version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Use a different home directory (config, session and local data)
    #[arg(long, global = true, value_name = "DIR")]
    pub home: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a fresh config.toml
    Init(InitArgs),
    /// Sign in (remote mode e-mails a one-time code)
    Login(LoginArgs),
    /// Finish a remote sign in with the e-mailed code
    Verify(VerifyArgs),
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Add a task
    Add(AddArgs),
    /// List tasks
    List(ListArgs),
    /// Show task details
    Show(IdArg),
    /// Change task fields
    Edit(EditArgs),
    /// Toggle a task's completion
    Done(IdArg),
    /// Delete a task
    Rm(IdArg),
    /// Duplicate a task
    Dup(IdArg),
    /// Set manual order: the listed tasks get positions 0, 1, 2, ...
    Reorder(ReorderArgs),
    /// Show task statistics
    Stats(StatsArgs),
    /// Show tasks as kanban columns
    Board(BoardArgs),
    /// Show tasks on a month or week calendar
    Calendar(CalendarArgs),
    /// Manage categories
    Category(CategoryCmd),
    /// Manage priorities
    Priority(PriorityCmd),
    /// Track time spent on tasks
    Timer(TimerCmd),
    /// Re-list tasks whenever local data changes
    Watch(WatchArgs),
    /// Read or change configuration
    Config(ConfigCmd),
}

// ---------------------------------------------------------------------------
// Setup and identity
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct InitArgs {
    /// Persistence mode: local or remote
    #[arg(long, default_value = "local")]
    pub mode: String,
    /// Hosted backend URL (remote mode)
    #[arg(long)]
    pub url: Option<String>,
    /// Hosted backend public API key (remote mode)
    #[arg(long)]
    pub key: Option<String>,
    /// Overwrite an existing config.toml
    #[arg(long)]
    pub force: bool,
}

#[derive(Args)]
pub struct LoginArgs {
    pub email: String,
}

#[derive(Args)]
pub struct VerifyArgs {
    pub email: String,
    /// One-time code from the sign-in e-mail
    pub code: String,
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Filter flags shared by every command that shows tasks
#[derive(Args, Default)]
pub struct FilterArgs {
    /// Match title or description (case-insensitive)
    #[arg(long, short = 's')]
    pub search: Option<String>,
    /// Category id or name
    #[arg(long, short = 'c')]
    pub category: Option<String>,
    /// Priority id or name
    #[arg(long, short = 'p')]
    pub priority: Option<String>,
    /// Only completed tasks
    #[arg(long, conflicts_with = "pending")]
    pub done: bool,
    /// Only open tasks
    #[arg(long)]
    pub pending: bool,
    /// Due on or after (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub from: Option<String>,
    /// Due on or before (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub to: Option<String>,
    /// Only overdue tasks
    #[arg(long)]
    pub overdue: bool,
    /// Match any of these tags (repeatable)
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,
}

#[derive(Args)]
pub struct AddArgs {
    pub title: String,
    #[arg(long, short = 'd')]
    pub desc: Option<String>,
    /// Category id or name
    #[arg(long, short = 'c')]
    pub category: Option<String>,
    /// Priority id or name
    #[arg(long, short = 'p')]
    pub priority: Option<String>,
    /// Due date (YYYY-MM-DD means end of that day, or RFC 3339)
    #[arg(long)]
    pub due: Option<String>,
    /// Estimated minutes
    #[arg(long)]
    pub estimate: Option<u32>,
    /// Add a tag (repeatable)
    #[arg(long = "tag", short = 't')]
    pub tags: Vec<String>,
    /// Repeat when completed: daily, weekly, monthly, yearly
    #[arg(long, value_name = "PATTERN")]
    pub repeat: Option<String>,
    /// Repeat interval, e.g. --repeat weekly --every 2
    #[arg(long, value_name = "N", requires = "repeat")]
    pub every: Option<u32>,
}

#[derive(Args)]
pub struct ListArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Sort by: title, created, due, priority, position
    #[arg(long)]
    pub sort: Option<String>,
    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,
}

#[derive(Args)]
pub struct IdArg {
    /// Task id
    pub id: i64,
}

#[derive(Args)]
pub struct EditArgs {
    /// Task id
    pub id: i64,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long, short = 'd', conflicts_with = "clear_desc")]
    pub desc: Option<String>,
    #[arg(long)]
    pub clear_desc: bool,
    /// Category id or name
    #[arg(long, short = 'c', conflicts_with = "clear_category")]
    pub category: Option<String>,
    #[arg(long)]
    pub clear_category: bool,
    /// Priority id or name
    #[arg(long, short = 'p', conflicts_with = "clear_priority")]
    pub priority: Option<String>,
    #[arg(long)]
    pub clear_priority: bool,
    #[arg(long, conflicts_with = "clear_due")]
    pub due: Option<String>,
    #[arg(long)]
    pub clear_due: bool,
    /// Estimated minutes
    #[arg(long)]
    pub estimate: Option<u32>,
    /// Tracked minutes
    #[arg(long)]
    pub spent: Option<u32>,
    /// Add a tag (repeatable)
    #[arg(long = "tag", short = 't')]
    pub add_tags: Vec<String>,
    /// Remove a tag (repeatable)
    #[arg(long = "untag")]
    pub remove_tags: Vec<String>,
    /// daily, weekly, monthly, yearly
    #[arg(long, value_name = "PATTERN", conflicts_with = "no_repeat")]
    pub repeat: Option<String>,
    #[arg(long, value_name = "N")]
    pub every: Option<u32>,
    /// Stop repeating
    #[arg(long)]
    pub no_repeat: bool,
}

#[derive(Args)]
pub struct ReorderArgs {
    /// Task ids in the new order
    #[arg(required = true)]
    pub ids: Vec<i64>,
}

#[derive(Args)]
pub struct StatsArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct BoardArgs {
    /// Columns by: status, category, priority
    #[arg(long, short = 'g', default_value = "status")]
    pub group: String,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct CalendarArgs {
    /// Month to show, YYYY-MM (default: current month)
    #[arg(long, conflicts_with = "week")]
    pub month: Option<String>,
    /// Show the week containing this date, YYYY-MM-DD
    #[arg(long)]
    pub week: Option<String>,
    #[command(flatten)]
    pub filter: FilterArgs,
}

#[derive(Args)]
pub struct WatchArgs {
    #[command(flatten)]
    pub filter: FilterArgs,
    /// Sort by: title, created, due, priority, position
    #[arg(long)]
    pub sort: Option<String>,
    #[arg(long, requires = "sort")]
    pub desc: bool,
}

// ---------------------------------------------------------------------------
// Categories and priorities
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct CategoryCmd {
    #[command(subcommand)]
    pub action: CategoryAction,
}

#[derive(Subcommand)]
pub enum CategoryAction {
    List,
    /// Create a category
    Add(CategoryAddArgs),
    /// Rename or recolour a category
    Edit(CategoryEditArgs),
    /// Delete a category (tasks become Uncategorized)
    Rm(KeyArg),
}

#[derive(Args)]
pub struct CategoryAddArgs {
    pub name: String,
    /// #rrggbb (default from config)
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct CategoryEditArgs {
    /// Category id or name
    pub key: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct KeyArg {
    /// Id or name
    pub key: String,
}

#[derive(Args)]
pub struct PriorityCmd {
    #[command(subcommand)]
    pub action: PriorityAction,
}

#[derive(Subcommand)]
pub enum PriorityAction {
    List,
    /// Create a priority
    Add(PriorityAddArgs),
    /// Change a priority
    Edit(PriorityEditArgs),
    /// Delete a priority (tasks become No Priority)
    Rm(KeyArg),
}

#[derive(Args)]
pub struct PriorityAddArgs {
    pub name: String,
    /// Lower levels sort first
    #[arg(long, allow_negative_numbers = true)]
    pub level: i32,
    #[arg(long)]
    pub color: Option<String>,
}

#[derive(Args)]
pub struct PriorityEditArgs {
    /// Priority id or name
    pub key: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub level: Option<i32>,
    #[arg(long)]
    pub color: Option<String>,
}

// ---------------------------------------------------------------------------
// Timer and config
// ---------------------------------------------------------------------------

#[derive(Args)]
pub struct TimerCmd {
    #[command(subcommand)]
    pub action: TimerAction,
}

#[derive(Subcommand)]
pub enum TimerAction {
    /// Start timing a task (stops any running timer)
    Start(TimerStartArgs),
    /// Stop the running timer
    Stop,
    /// Show the running timer
    Status,
    /// List time entries
    Log(TimerLogArgs),
    /// Delete a time entry
    Rm(EntryArg),
}

#[derive(Args)]
pub struct TimerStartArgs {
    /// Task id
    pub task: i64,
    #[arg(long)]
    pub note: Option<String>,
}

#[derive(Args)]
pub struct TimerLogArgs {
    /// Only entries for this task
    #[arg(long)]
    pub task: Option<i64>,
}

#[derive(Args)]
pub struct EntryArg {
    /// Time entry id
    pub entry: i64,
}

#[derive(Args)]
pub struct ConfigCmd {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print a value (or every value with no key)
    Get(ConfigGetArgs),
    /// Change a value in config.toml
    Set(ConfigSetArgs),
    /// Print the config file path
    Path,
}

#[derive(Args)]
pub struct ConfigGetArgs {
    pub key: Option<String>,
}

#[derive(Args)]
pub struct ConfigSetArgs {
    pub key: String,
    pub value: String,
}
