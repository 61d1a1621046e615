use crate::domain::models::{
    Reminder, ReminderDraft, RepeatDays, Task, TaskDraft, TaskStatus, TimeOfDay,
};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ledger;
use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskFilter {
    All,
    Today,
    Recurring,
    OneTime,
}

/// Canonical weekday-to-column mapping for the seven repeat flags.
pub fn weekday_column(day: Weekday) -> &'static str {
    match day {
        Weekday::Sun => "sun",
        Weekday::Mon => "mon",
        Weekday::Tue => "tue",
        Weekday::Wed => "wed",
        Weekday::Thu => "thr",
        Weekday::Fri => "fri",
        Weekday::Sat => "sat",
    }
}

// Qualified so joins against tables with their own id column stay unambiguous.
const TASK_COLUMNS: &str = "tasks.id, tasks.title, tasks.description, tasks.color, \
     tasks.sun, tasks.mon, tasks.tue, tasks.wed, tasks.thr, tasks.fri, tasks.sat";

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let mut flags = [false; 7];
    for (index, flag) in flags.iter_mut().enumerate() {
        *flag = row.get::<_, i64>(4 + index)? != 0;
    }
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        color: row.get(3)?,
        repeat_days: RepeatDays::from_flags(flags),
        reminder: None,
        status: TaskStatus::Unknown,
    })
}

fn reminder_from_parts(
    id: i64,
    task_id: i64,
    raw_start: &str,
    duration_minutes: u32,
    raw_modified: &str,
) -> Result<Reminder, InfraError> {
    let start_time = TimeOfDay::parse(raw_start)
        .map_err(|error| InfraError::Invariant(format!("invalid reminders.start_time: {error}")))?;
    let last_modified = DateTime::parse_from_rfc3339(raw_modified)
        .map_err(|error| {
            InfraError::Invariant(format!(
                "invalid reminders.last_modified '{raw_modified}': {error}"
            ))
        })?
        .with_timezone(&Utc);
    Ok(Reminder {
        id,
        task_id,
        start_time,
        duration_minutes,
        last_modified,
    })
}

pub fn get_reminder(connection: &Connection, task_id: i64) -> Result<Option<Reminder>, InfraError> {
    let row = connection
        .query_row(
            "SELECT id, task_id, start_time, duration, last_modified
             FROM reminders WHERE task_id = ?1",
            params![task_id],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((id, task_id, raw_start, duration_minutes, raw_modified)) = row else {
        return Ok(None);
    };
    Ok(Some(reminder_from_parts(
        id,
        task_id,
        &raw_start,
        duration_minutes,
        &raw_modified,
    )?))
}

/// Creates or updates the task's reminder row in place. Updating keeps the
/// reminder id stable, which keeps the alarm key stable across re-arms;
/// `last_modified` is refreshed either way since it anchors one-time
/// triggers.
pub fn upsert_reminder(
    connection: &Connection,
    task_id: i64,
    draft: &ReminderDraft,
    now: DateTime<Utc>,
) -> Result<Reminder, InfraError> {
    connection.execute(
        "INSERT INTO reminders (task_id, start_time, duration, last_modified)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(task_id) DO UPDATE SET
           start_time = excluded.start_time,
           duration = excluded.duration,
           last_modified = excluded.last_modified",
        params![
            task_id,
            draft.start_time.to_string(),
            draft.duration_minutes,
            now.to_rfc3339()
        ],
    )?;
    get_reminder(connection, task_id)?.ok_or_else(|| {
        InfraError::Invariant(format!("reminder for task {task_id} missing after upsert"))
    })
}

pub fn delete_reminder(connection: &Connection, task_id: i64) -> Result<bool, InfraError> {
    let deleted = connection.execute("DELETE FROM reminders WHERE task_id = ?1", params![task_id])?;
    Ok(deleted > 0)
}

pub fn insert_task(
    connection: &Connection,
    draft: &TaskDraft,
    now: DateTime<Utc>,
) -> Result<Task, InfraError> {
    let flags = draft.repeat_days.flags();
    connection.execute(
        "INSERT INTO tasks (title, description, color, sun, mon, tue, wed, thr, fri, sat)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            draft.title,
            draft.description,
            draft.color,
            flags[0],
            flags[1],
            flags[2],
            flags[3],
            flags[4],
            flags[5],
            flags[6]
        ],
    )?;
    let task_id = connection.last_insert_rowid();

    let reminder = match &draft.reminder {
        Some(reminder_draft) => Some(upsert_reminder(connection, task_id, reminder_draft, now)?),
        None => None,
    };

    Ok(Task {
        id: task_id,
        title: draft.title.clone(),
        description: draft.description.clone(),
        color: draft.color,
        repeat_days: draft.repeat_days,
        reminder,
        status: TaskStatus::Incomplete,
    })
}

pub fn update_task_row(connection: &Connection, task: &Task) -> Result<bool, InfraError> {
    let flags = task.repeat_days.flags();
    let updated = connection.execute(
        "UPDATE tasks SET title = ?1, description = ?2, color = ?3,
           sun = ?4, mon = ?5, tue = ?6, wed = ?7, thr = ?8, fri = ?9, sat = ?10
         WHERE id = ?11",
        params![
            task.title,
            task.description,
            task.color,
            flags[0],
            flags[1],
            flags[2],
            flags[3],
            flags[4],
            flags[5],
            flags[6],
            task.id
        ],
    )?;
    Ok(updated > 0)
}

/// Deleting a task cascades to its reminder and its ledger rows through the
/// schema's foreign keys. The per-date aggregates are decremented for the
/// cascaded ledger rows, so the aggregate keeps matching the ledger.
pub fn delete_task(connection: &Connection, task_id: i64) -> Result<bool, InfraError> {
    let entry_dates = ledger::entry_dates(connection, task_id)?;
    let deleted = connection.execute("DELETE FROM tasks WHERE id = ?1", params![task_id])?;
    if deleted > 0 {
        for date in entry_dates {
            ledger::decrement_stat(connection, date)?;
        }
    }
    Ok(deleted > 0)
}

/// Batch delete; ids with no matching row are skipped. Returns the ids that
/// were actually deleted.
pub fn delete_tasks(connection: &Connection, task_ids: &[i64]) -> Result<Vec<i64>, InfraError> {
    let mut deleted = Vec::new();
    for task_id in task_ids {
        if delete_task(connection, *task_id)? {
            deleted.push(*task_id);
        }
    }
    Ok(deleted)
}

fn load_relations(connection: &Connection, task: &mut Task, today: NaiveDate) -> Result<(), InfraError> {
    task.reminder = get_reminder(connection, task.id)?;
    let completed = ledger::is_completed_today(connection, task.id, task.is_recurring(), today)?;
    task.status = if completed {
        TaskStatus::Completed
    } else {
        TaskStatus::Incomplete
    };
    Ok(())
}

pub fn get_task(
    connection: &Connection,
    task_id: i64,
    today: NaiveDate,
) -> Result<Option<Task>, InfraError> {
    let task = connection
        .query_row(
            &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
            params![task_id],
            task_from_row,
        )
        .optional()?;
    let Some(mut task) = task else {
        return Ok(None);
    };
    load_relations(connection, &mut task, today)?;
    Ok(Some(task))
}

/// Lists tasks with relations and derived status loaded. The today view
/// contains the tasks whose flag for today's weekday is set, ordered by
/// reminder start time with reminder-less tasks last.
pub fn list_tasks(
    connection: &Connection,
    filter: TaskFilter,
    today: NaiveDate,
) -> Result<Vec<Task>, InfraError> {
    let sql = match filter {
        TaskFilter::All => format!("SELECT {TASK_COLUMNS} FROM tasks ORDER BY id ASC"),
        TaskFilter::Today => format!(
            "SELECT {TASK_COLUMNS} FROM (
               SELECT tasks.*, ifnull(reminders.start_time, '99:99') AS sort_time
               FROM tasks LEFT OUTER JOIN reminders ON reminders.task_id = tasks.id
               WHERE tasks.{} = 1
               ORDER BY sort_time ASC, tasks.id ASC
             ) AS tasks",
            weekday_column(today.weekday())
        ),
        TaskFilter::Recurring => format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE sun + mon + tue + wed + thr + fri + sat > 0 ORDER BY id ASC"
        ),
        TaskFilter::OneTime => format!(
            "SELECT {TASK_COLUMNS} FROM tasks
             WHERE sun + mon + tue + wed + thr + fri + sat = 0 ORDER BY id ASC"
        ),
    };

    let mut statement = connection.prepare(&sql)?;
    let rows = statement.query_map([], task_from_row)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    for task in &mut tasks {
        load_relations(connection, task, today)?;
    }
    Ok(tasks)
}

/// Tasks completed on the given date, per the ledger. Relations are not
/// loaded; the view is historical, so today's derived status does not apply.
pub fn completed_tasks_on_date(
    connection: &Connection,
    date: NaiveDate,
) -> Result<Vec<Task>, InfraError> {
    let mut statement = connection.prepare(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         INNER JOIN routine_entries ON routine_entries.task_id = tasks.id
         WHERE routine_entries.date = ?1
         ORDER BY tasks.id ASC"
    ))?;
    let rows = statement.query_map(params![date.to_string()], task_from_row)?;
    let mut tasks = Vec::new();
    for row in rows {
        tasks.push(row?);
    }
    Ok(tasks)
}
