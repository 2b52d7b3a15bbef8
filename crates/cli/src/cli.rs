use std::path::PathBuf;

use clap::{value_parser, Args, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "labtrack",
    version,
    about = "Track lab sample follow-ups with scheduled reminders.",
    after_help = "Examples:\n  labtrack add Tap water sample --template water --calendar\n  labtrack preview --start tomorrow --template bacteria\n  labtrack add Swab ward 4 --at +2d --at 2024-03-01T08:30\n  labtrack upcoming"
)]
pub struct Cli {
    /// Override the data directory (defaults to platform-specific app dir)
    #[arg(long, value_name = "PATH", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Tracing filter (e.g. "info", "labtrack_core=debug"); falls back to RUST_LOG
    #[arg(long = "log", value_name = "DIRECTIVE", global = true)]
    pub log_filter: Option<String>,

    /// Owner of created and listed tasks (defaults to LABTRACK_USER, then "anonymous")
    #[arg(long, value_name = "ID", global = true)]
    pub user: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CliCommand {
    /// List the reminder templates
    Templates,
    /// Show the reminder times a schedule would produce
    Preview(PreviewArgs),
    /// Create a task and schedule its reminders
    Add(AddArgs),
    /// List active and completed tasks
    List,
    /// Show the next incomplete reminders
    Upcoming,
    /// Toggle a task's completion
    Done(DoneArgs),
    /// Toggle one reminder's completion
    Check(CheckArgs),
    /// Delete one or more tasks by id
    Delete(DeleteArgs),
    /// List or cancel pending local notifications
    Notifications(NotificationsArgs),
    /// List calendar events created for reminders
    Events,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ScheduleArgs {
    /// Reminder template id (swab, water, bacteria)
    #[arg(long, value_name = "ID", conflicts_with = "at")]
    pub template: Option<String>,

    /// Explicit reminder time; repeat for several (ISO, +Nd, tomorrow, mon, HH:MM)
    #[arg(long, value_name = "WHEN")]
    pub at: Vec<String>,
}

#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    /// Start of the schedule (ISO, today, tomorrow, +3d, mon)
    #[arg(long, value_name = "WHEN", default_value = "now")]
    pub start: String,

    #[command(flatten)]
    pub schedule: ScheduleArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AddArgs {
    /// Task title
    #[arg(value_name = "TITLE", required = true)]
    pub title: Vec<String>,

    /// Optional notes, also used as calendar event notes
    #[arg(long)]
    pub description: Option<String>,

    /// Start of the template schedule
    #[arg(long, value_name = "WHEN", default_value = "now")]
    pub start: String,

    #[command(flatten)]
    pub schedule: ScheduleArgs,

    /// Mirror every reminder into the local calendar
    #[arg(long)]
    pub calendar: bool,

    /// File the task as general instead of microbiology
    #[arg(long, conflicts_with_all = ["lab_id", "sample_type", "test_type"])]
    pub general: bool,

    /// Laboratory sample identifier
    #[arg(long = "lab-id")]
    pub lab_id: Option<String>,

    /// Sample type (e.g. Blood, Urine, Swab)
    #[arg(long = "sample-type")]
    pub sample_type: Option<String>,

    /// Test type (e.g. Culture, PCR)
    #[arg(long = "test-type")]
    pub test_type: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct DoneArgs {
    #[arg(value_name = "ID")]
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct CheckArgs {
    #[arg(value_name = "ID")]
    pub id: String,

    /// Zero-based reminder position as shown by `list`
    #[arg(value_name = "INDEX", value_parser = value_parser!(usize))]
    pub index: usize,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// One or more task ids to delete (see `list`)
    #[arg(value_name = "ID", required = true)]
    pub ids: Vec<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct NotificationsArgs {
    /// Cancel every pending notification
    #[arg(long = "cancel-all")]
    pub cancel_all: bool,
}
