//! Completion ledger (`routine_entries`) and the per-date aggregate derived
//! from it (`routine_stats`). One ledger row per (task, date); the aggregate
//! row for a date always equals the number of ledger rows with that date and
//! is dropped instead of being kept at zero.
//!
//! Every function here takes a connection so the completion coordinator can
//! run the ledger and aggregate mutations inside one transaction.

use crate::infrastructure::error::InfraError;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u32,
}

/// For a recurring task a ledger row for today means "completed today". A
/// one-time task has a single logical occurrence, so any row for its id
/// counts as done regardless of the row's date.
pub fn is_completed_today(
    connection: &Connection,
    task_id: i64,
    recurring: bool,
    today: NaiveDate,
) -> Result<bool, InfraError> {
    let count: i64 = if recurring {
        connection.query_row(
            "SELECT COUNT(*) FROM routine_entries WHERE task_id = ?1 AND date = ?2",
            params![task_id, today.to_string()],
            |row| row.get(0),
        )?
    } else {
        connection.query_row(
            "SELECT COUNT(*) FROM routine_entries WHERE task_id = ?1",
            params![task_id],
            |row| row.get(0),
        )?
    };
    Ok(count > 0)
}

/// Inserts the (task, date) ledger row if absent. Returns whether a row was
/// actually inserted, so concurrent duplicate calls never double-count.
pub fn insert_entry(
    connection: &Connection,
    task_id: i64,
    date: NaiveDate,
) -> Result<bool, InfraError> {
    let inserted = connection.execute(
        "INSERT OR IGNORE INTO routine_entries (task_id, date) VALUES (?1, ?2)",
        params![task_id, date.to_string()],
    )?;
    Ok(inserted > 0)
}

/// Deletes the (task, date) ledger row if present. Returns whether a row was
/// actually deleted.
pub fn delete_entry(
    connection: &Connection,
    task_id: i64,
    date: NaiveDate,
) -> Result<bool, InfraError> {
    let deleted = connection.execute(
        "DELETE FROM routine_entries WHERE task_id = ?1 AND date = ?2",
        params![task_id, date.to_string()],
    )?;
    Ok(deleted > 0)
}

/// Bumps the aggregate count for the date, creating the row at 1 when absent.
pub fn increment_stat(connection: &Connection, date: NaiveDate) -> Result<(), InfraError> {
    connection.execute(
        "INSERT INTO routine_stats (date, count) VALUES (?1, 1)
         ON CONFLICT(date) DO UPDATE SET count = count + 1",
        params![date.to_string()],
    )?;
    Ok(())
}

/// Decrements the aggregate count for the date, deleting the row when it
/// reaches zero.
pub fn decrement_stat(connection: &Connection, date: NaiveDate) -> Result<(), InfraError> {
    connection.execute(
        "UPDATE routine_stats SET count = count - 1 WHERE date = ?1",
        params![date.to_string()],
    )?;
    connection.execute(
        "DELETE FROM routine_stats WHERE date = ?1 AND count <= 0",
        params![date.to_string()],
    )?;
    Ok(())
}

pub fn stat_count(connection: &Connection, date: NaiveDate) -> Result<Option<u32>, InfraError> {
    let count = connection
        .query_row(
            "SELECT count FROM routine_stats WHERE date = ?1",
            params![date.to_string()],
            |row| row.get::<_, u32>(0),
        )
        .optional()?;
    Ok(count)
}

/// Dates the task has ledger rows for, oldest first.
pub fn entry_dates(connection: &Connection, task_id: i64) -> Result<Vec<NaiveDate>, InfraError> {
    let mut statement = connection.prepare(
        "SELECT date FROM routine_entries WHERE task_id = ?1 ORDER BY date ASC",
    )?;
    let rows = statement.query_map(params![task_id], |row| row.get::<_, String>(0))?;

    let mut dates = Vec::new();
    for row in rows {
        let raw_date = row?;
        let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|error| {
            InfraError::Invariant(format!("invalid routine_entries.date '{raw_date}': {error}"))
        })?;
        dates.push(date);
    }
    Ok(dates)
}

pub fn entry_count_for_date(connection: &Connection, date: NaiveDate) -> Result<u32, InfraError> {
    let count: u32 = connection.query_row(
        "SELECT COUNT(*) FROM routine_entries WHERE date = ?1",
        params![date.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Per-date completion counts, newest first, optionally bounded to a range.
pub fn count_stats(
    connection: &Connection,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<DailyCount>, InfraError> {
    let start = start.map(|date| date.to_string());
    let end = end.map(|date| date.to_string());
    let mut statement = connection.prepare(
        "SELECT date, count FROM routine_stats
         WHERE (?1 IS NULL OR date >= ?1) AND (?2 IS NULL OR date <= ?2)
         ORDER BY date DESC",
    )?;
    let rows = statement.query_map(params![start, end], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, u32>(1)?))
    })?;

    let mut counts = Vec::new();
    for row in rows {
        let (raw_date, count) = row?;
        let date = NaiveDate::parse_from_str(&raw_date, "%Y-%m-%d").map_err(|error| {
            InfraError::Invariant(format!("invalid routine_stats.date '{raw_date}': {error}"))
        })?;
        counts.push(DailyCount { date, count });
    }
    Ok(counts)
}

/// Removes every historical ledger row for the task except the one for
/// `keep_date`, rebalancing the aggregate rows for the purged dates so the
/// count invariant survives the purge. Runs when an edit flips a task between
/// recurring and one-time, so the reshaped task does not inherit stale
/// completions.
pub fn purge_entries_except(
    connection: &Connection,
    task_id: i64,
    keep_date: NaiveDate,
) -> Result<usize, InfraError> {
    let mut statement = connection.prepare(
        "SELECT date FROM routine_entries WHERE task_id = ?1 AND date <> ?2",
    )?;
    let purged_dates = statement
        .query_map(params![task_id, keep_date.to_string()], |row| {
            row.get::<_, String>(0)
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let purged = connection.execute(
        "DELETE FROM routine_entries WHERE task_id = ?1 AND date <> ?2",
        params![task_id, keep_date.to_string()],
    )?;
    for date in &purged_dates {
        connection.execute(
            "UPDATE routine_stats SET count = count - 1 WHERE date = ?1",
            params![date],
        )?;
        connection.execute(
            "DELETE FROM routine_stats WHERE date = ?1 AND count <= 0",
            params![date],
        )?;
    }
    Ok(purged)
}

/// Clears the ledger and the aggregate store entirely.
pub fn reset_all(connection: &Connection) -> Result<(), InfraError> {
    connection.execute("DELETE FROM routine_entries", [])?;
    connection.execute("DELETE FROM routine_stats", [])?;
    Ok(())
}
