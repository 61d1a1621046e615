use crate::domain::models::Task;
use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone};

/// Computes the next absolute instant the task's reminder should fire, or
/// `None` when nothing is pending. Pure: the caller supplies "now" and
/// today's completion state, and identical inputs always produce the same
/// answer.
///
/// Recurring tasks fire today at the reminder time when today's weekday flag
/// is set, the time has not passed yet and the task is not completed today;
/// otherwise they fire on the next flagged weekday. A next-week occurrence is
/// a fresh instance, so completion state only suppresses today's candidate.
///
/// One-time tasks anchor to the date the reminder was last modified and never
/// re-fire once completed or once that instant has passed.
///
/// The weekday scan is capped at seven iterations; exhausting it means the
/// repeat mask and the recurring branch disagree, which is an internal
/// invariant violation reported as `Err`.
pub fn next_trigger<Tz: TimeZone>(
    task: &Task,
    now: &DateTime<Tz>,
    completed_today: bool,
) -> Result<Option<DateTime<Tz>>, String> {
    let Some(reminder) = &task.reminder else {
        return Ok(None);
    };
    let timezone = now.timezone();
    let start_time = reminder.start_time.as_naive_time();

    if task.is_recurring() {
        let today = now.date_naive();
        if task.repeat_days.contains(today.weekday()) && !completed_today {
            if let Some(candidate) = resolve_local(&timezone, today, start_time) {
                if candidate > *now {
                    return Ok(Some(candidate));
                }
            }
        }
        for offset in 1..=7 {
            let date = today + Duration::days(offset);
            if !task.repeat_days.contains(date.weekday()) {
                continue;
            }
            if let Some(candidate) = resolve_local(&timezone, date, start_time) {
                return Ok(Some(candidate));
            }
        }
        Err(format!(
            "no repeat weekday found within 7 days for recurring task {}",
            task.id
        ))
    } else {
        if completed_today {
            return Ok(None);
        }
        let anchor_date = reminder.last_modified.with_timezone(&timezone).date_naive();
        let Some(candidate) = resolve_local(&timezone, anchor_date, start_time) else {
            return Ok(None);
        };
        if candidate > *now {
            Ok(Some(candidate))
        } else {
            Ok(None)
        }
    }
}

/// Resolves a wall-clock date and time in the given timezone. Times that fall
/// into a DST gap have no representation and yield `None`.
fn resolve_local<Tz: TimeZone>(
    timezone: &Tz,
    date: NaiveDate,
    time: NaiveTime,
) -> Option<DateTime<Tz>> {
    timezone.from_local_datetime(&date.and_time(time)).earliest()
}
