use std::fmt;
use std::io::Write;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Local, SecondsFormat, TimeZone, Utc};
use labtrack_core::calendar::Alarm;
use labtrack_core::capture::TaskInput;
use labtrack_core::model::{Task, TaskCategory};
use labtrack_core::notifications::NotificationScheduler;
use labtrack_core::orchestrator::CreateStatus;
use labtrack_core::parser::{parse_all, parse_when};
use labtrack_core::schedule::Selection;
use labtrack_core::{preview_reminders, templates, DeleteResult, Workspace};

use crate::cli::{AddArgs, CheckArgs, CliCommand, DeleteArgs, DoneArgs, NotificationsArgs, PreviewArgs, ScheduleArgs};

pub async fn execute<W: Write>(workspace: &Workspace, command: CliCommand, writer: W) -> Result<()> {
    execute_at(workspace, command, Local::now(), writer).await
}

/// Run `command` with relative dates resolved against `now`.
pub async fn execute_at<Tz, W>(
    workspace: &Workspace,
    command: CliCommand,
    now: DateTime<Tz>,
    mut writer: W,
) -> Result<()>
where
    Tz: TimeZone,
    W: Write,
{
    match command {
        CliCommand::Templates => handle_templates(&mut writer),
        CliCommand::Preview(args) => handle_preview(&args, &now, &mut writer),
        CliCommand::Add(args) => handle_add(workspace, args, &now, &mut writer).await,
        CliCommand::List => handle_list(workspace, &mut writer),
        CliCommand::Upcoming => handle_upcoming(workspace, now.with_timezone(&Utc), &mut writer),
        CliCommand::Done(args) => handle_done(workspace, &args, &mut writer).await,
        CliCommand::Check(args) => handle_check(workspace, &args, &mut writer).await,
        CliCommand::Delete(args) => handle_delete(workspace, &args, &mut writer).await,
        CliCommand::Notifications(args) => handle_notifications(workspace, &args, &mut writer).await,
        CliCommand::Events => handle_events(workspace, &mut writer).await,
    }
}

fn handle_templates<W: Write>(mut writer: W) -> Result<()> {
    for template in templates::all() {
        let offsets = if template.is_custom() {
            "pick dates".to_string()
        } else {
            let days: Vec<String> = template.offsets.iter().map(u32::to_string).collect();
            format!("days {}", days.join(", "))
        };
        writeln!(
            writer,
            "{:<9} {:<22} {:<16} {}",
            template.id, template.name, offsets, template.description
        )?;
    }
    Ok(())
}

fn selection<Tz: TimeZone>(args: &ScheduleArgs, now: &DateTime<Tz>) -> Result<Selection> {
    if let Some(template) = &args.template {
        return Ok(Selection::template(template.clone()));
    }
    if args.at.is_empty() {
        return Ok(Selection::None);
    }
    Ok(Selection::custom(parse_all(&args.at, now)?))
}

fn reminder_times<Tz: TimeZone>(
    start: &str,
    args: &ScheduleArgs,
    now: &DateTime<Tz>,
) -> Result<Vec<DateTime<Utc>>> {
    let start = parse_when(start, now)?;
    Ok(preview_reminders(&start, &selection(args, now)?)?)
}

fn handle_preview<Tz: TimeZone, W: Write>(
    args: &PreviewArgs,
    now: &DateTime<Tz>,
    mut writer: W,
) -> Result<()> {
    let times = reminder_times(&args.start, &args.schedule, now)?;
    if times.is_empty() {
        writeln!(writer, "No reminders")?;
        return Ok(());
    }
    for (index, at) in times.iter().enumerate() {
        writeln!(writer, "{}  {}", index, stamp(at))?;
    }
    Ok(())
}

fn category(args: &AddArgs) -> TaskCategory {
    if args.general {
        return TaskCategory::General;
    }
    TaskCategory::Microbiology {
        lab_id: args.lab_id.clone(),
        sample_type: args.sample_type.clone(),
        test_type: args.test_type.clone(),
    }
}

async fn handle_add<Tz: TimeZone, W: Write>(
    workspace: &Workspace,
    args: AddArgs,
    now: &DateTime<Tz>,
    mut writer: W,
) -> Result<()> {
    let reminder_times = reminder_times(&args.start, &args.schedule, now)?;
    let input = TaskInput {
        title: args.title.join(" "),
        description: args.description.clone(),
        category: category(&args),
        user_id: None,
        reminder_times,
        sync_calendar: args.calendar,
    };

    let outcome = workspace
        .create_task(input)
        .await
        .map_err(|err| anyhow!("Task creation failed: {}", err))?;

    match &outcome.status {
        CreateStatus::Created { id } => writeln!(writer, "{} ({})", outcome.status, id)?,
        CreateStatus::Queued => writeln!(writer, "{}", outcome.status)?,
    }
    for warning in &outcome.warnings {
        writeln!(writer, "Warning: {}", warning)?;
    }
    Ok(())
}

fn handle_list<W: Write>(workspace: &Workspace, mut writer: W) -> Result<()> {
    let view = workspace.attach_view()?;
    let active = view.active_tasks();
    let completed = view.completed_tasks();

    writeln!(writer, "Active ({})", active.len())?;
    for task in &active {
        write_task(&mut writer, task)?;
    }
    writeln!(writer, "Completed ({})", completed.len())?;
    for task in &completed {
        write_task(&mut writer, task)?;
    }
    Ok(())
}

fn write_task<W: Write>(mut writer: W, task: &Task) -> Result<()> {
    writeln!(writer, "  {}  {} [{}]", task.id, task.title, task.category.kind())?;
    if let TaskCategory::Microbiology {
        lab_id,
        sample_type,
        test_type,
    } = &task.category
    {
        let details: Vec<&str> = [lab_id, sample_type, test_type]
            .into_iter()
            .filter_map(|value| value.as_deref())
            .collect();
        if !details.is_empty() {
            writeln!(writer, "    {}", details.join(" / "))?;
        }
    }
    if let Some(description) = &task.description {
        writeln!(writer, "    {}", description)?;
    }
    for (index, reminder) in task.reminders.iter().enumerate() {
        writeln!(
            writer,
            "    [{}] {} {}",
            if reminder.is_completed { "x" } else { " " },
            index,
            stamp(&reminder.date)
        )?;
    }
    Ok(())
}

fn handle_upcoming<W: Write>(workspace: &Workspace, now: DateTime<Utc>, mut writer: W) -> Result<()> {
    let view = workspace.attach_view()?;
    let upcoming = view.upcoming_reminders(now);
    if upcoming.is_empty() {
        writeln!(writer, "No upcoming reminders")?;
        return Ok(());
    }
    for item in upcoming {
        writeln!(
            writer,
            "{}  {} ({})",
            stamp(&item.reminder.date),
            item.task_title,
            item.task_id
        )?;
    }
    Ok(())
}

async fn handle_done<W: Write>(workspace: &Workspace, args: &DoneArgs, mut writer: W) -> Result<()> {
    let view = workspace.attach_view()?;
    view.toggle_task_complete(&args.id).await?;
    let task = view
        .find(&args.id)
        .ok_or_else(|| anyhow!("Task {} disappeared", args.id))?;
    let state = if task.is_completed { "completed" } else { "active" };
    writeln!(writer, "Marked '{}' {}", task.title, state)?;
    Ok(())
}

async fn handle_check<W: Write>(workspace: &Workspace, args: &CheckArgs, mut writer: W) -> Result<()> {
    let view = workspace.attach_view()?;
    view.toggle_reminder_complete(&args.id, args.index).await?;
    let task = view
        .find(&args.id)
        .ok_or_else(|| anyhow!("Task {} disappeared", args.id))?;
    let checked = task
        .reminders
        .get(args.index)
        .map(|reminder| reminder.is_completed)
        .unwrap_or_default();
    writeln!(
        writer,
        "Reminder {} of '{}' {}",
        args.index,
        task.title,
        if checked { "checked" } else { "unchecked" }
    )?;
    Ok(())
}

async fn handle_delete<W: Write>(workspace: &Workspace, args: &DeleteArgs, mut writer: W) -> Result<()> {
    let results = workspace.delete_tasks(&args.ids).await?;
    let summary = DeleteSummary::from_results(&results);
    summary.write_to(&mut writer)?;
    Ok(())
}

async fn handle_notifications<W: Write>(
    workspace: &Workspace,
    args: &NotificationsArgs,
    mut writer: W,
) -> Result<()> {
    if args.cancel_all {
        workspace.notifications().cancel_all().await?;
        writeln!(writer, "Cancelled all scheduled notifications")?;
        return Ok(());
    }

    let pending = workspace.notifications().pending().await?;
    if pending.is_empty() {
        writeln!(writer, "No pending notifications")?;
        return Ok(());
    }
    for notification in pending {
        writeln!(
            writer,
            "{}  {}: {}",
            stamp(&notification.request.trigger_at),
            notification.request.title,
            notification.request.body
        )?;
    }
    Ok(())
}

async fn handle_events<W: Write>(workspace: &Workspace, mut writer: W) -> Result<()> {
    let events = workspace.calendar().events().await?;
    if events.is_empty() {
        writeln!(writer, "No calendar events")?;
        return Ok(());
    }
    for stored in events {
        writeln!(
            writer,
            "{} - {}  {} [{}] alarms: {}",
            stamp(&stored.event.start),
            stamp(&stored.event.end),
            stored.event.title,
            stored.calendar_id,
            alarm_summary(&stored.event.alarms)
        )?;
    }
    Ok(())
}

fn alarm_summary(alarms: &[Alarm]) -> String {
    alarms
        .iter()
        .map(|alarm| format!("{}m", alarm.relative_offset_minutes))
        .collect::<Vec<_>>()
        .join(", ")
}

fn stamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

struct DeleteSummary {
    deleted: usize,
    missing: Vec<String>,
}

impl DeleteSummary {
    fn from_results(results: &[DeleteResult]) -> Self {
        let mut deleted = 0usize;
        let mut missing = Vec::new();
        for result in results {
            if result.deleted {
                deleted += 1;
            } else {
                missing.push(result.id.clone());
            }
        }
        Self { deleted, missing }
    }

    fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "{}", SummaryLine::deleted(self.deleted))?;
        if !self.missing.is_empty() {
            writeln!(writer, "Not found: {}", self.missing.join(", "))?;
        }
        Ok(())
    }
}

enum SummaryLine {
    Deleted(usize),
    NoneDeleted,
}

impl SummaryLine {
    fn deleted(count: usize) -> Self {
        if count > 0 {
            SummaryLine::Deleted(count)
        } else {
            SummaryLine::NoneDeleted
        }
    }
}

impl fmt::Display for SummaryLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummaryLine::Deleted(count) => {
                write!(
                    f,
                    "Deleted {} task{}",
                    count,
                    if *count == 1 { "" } else { "s" }
                )
            }
            SummaryLine::NoneDeleted => write!(f, "No tasks deleted"),
        }
    }
}
