//! Recurring-task scheduling and completion-tracking engine.
//!
//! Tasks repeat on a weekly weekday mask or run once, optionally carry a
//! reminder whose next trigger instant is computed from the mask and the
//! task's completion state, and record completions in a per-day ledger with
//! a per-date aggregate kept transactionally consistent with it.

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{bootstrap_workspace, BootstrapResult};
pub use application::commands::{
    completed_tasks_on_date_impl, create_task_impl, delete_task_impl, delete_tasks_impl,
    get_task_impl, list_tasks_impl, mark_task_done_impl, mark_task_undone_impl, rearm_all_impl,
    reset_statistics_impl, task_count_stats_impl, update_task_impl, AppState,
};
pub use application::coordinator::CompletionCoordinator;
pub use application::events::{TaskEvent, TaskEventBus};
pub use application::scheduler::{
    AlarmPayload, AlarmScheduler, AlarmService, InMemoryAlarmService, NowProvider,
};
pub use domain::models::{
    Reminder, ReminderChange, ReminderDraft, RepeatDays, Task, TaskDraft, TaskPatch, TaskStatus,
    TimeOfDay, DEFAULT_COLORS, DESCRIPTION_MAX_CHARS, TITLE_MAX_CHARS,
};
pub use domain::trigger::next_trigger;
pub use infrastructure::error::InfraError;
pub use infrastructure::ledger::DailyCount;
pub use infrastructure::storage::TaskStore;
pub use infrastructure::task_repository::TaskFilter;
