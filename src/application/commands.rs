use crate::application::bootstrap::bootstrap_workspace;
use crate::application::coordinator::CompletionCoordinator;
use crate::application::events::{TaskEvent, TaskEventBus};
use crate::application::scheduler::{AlarmScheduler, AlarmService, NowProvider};
use crate::domain::models::{ReminderChange, Task, TaskDraft, TaskPatch, TaskStatus};
use crate::infrastructure::config::read_timezone;
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ledger::{self, DailyCount};
use crate::infrastructure::storage::TaskStore;
use crate::infrastructure::task_repository::{self, TaskFilter};
use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

pub struct AppState {
    store: Arc<TaskStore>,
    events: Arc<TaskEventBus>,
    alarms: AlarmScheduler,
    coordinator: CompletionCoordinator,
    now_provider: NowProvider,
    logs_dir: PathBuf,
    log_guard: Mutex<()>,
}

impl AppState {
    pub fn new(
        workspace_root: PathBuf,
        alarm_service: Arc<dyn AlarmService>,
    ) -> Result<Self, InfraError> {
        Self::with_now_provider(workspace_root, alarm_service, Arc::new(Utc::now))
    }

    pub fn with_now_provider(
        workspace_root: PathBuf,
        alarm_service: Arc<dyn AlarmService>,
        now_provider: NowProvider,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config_dir = workspace_root.join("config");
        let logs_dir = workspace_root.join("logs");

        let timezone: Tz = read_timezone(&config_dir)?;
        let store = Arc::new(TaskStore::open(&bootstrap.database_path)?);
        let events = Arc::new(TaskEventBus::new());
        let alarms = AlarmScheduler::new(alarm_service, timezone, now_provider.clone());
        let coordinator = CompletionCoordinator::new(
            store.clone(),
            events.clone(),
            timezone,
            now_provider.clone(),
        );

        Ok(Self {
            store,
            events,
            alarms,
            coordinator,
            now_provider,
            logs_dir,
            log_guard: Mutex::new(()),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.events.subscribe()
    }

    pub fn today(&self) -> NaiveDate {
        self.coordinator.today()
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": (self.now_provider)().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    async fn run_store<T: Send + 'static>(
        &self,
        operation: impl FnOnce(&TaskStore) -> Result<T, InfraError> + Send + 'static,
    ) -> Result<T, InfraError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || operation(&store))
            .await
            .map_err(|error| InfraError::Invariant(format!("store task aborted: {error}")))?
    }

    /// Arm failures must not fail the mutation that triggered them; the store
    /// is already committed at that point. They are logged instead.
    async fn arm_logged(&self, command: &str, task: &Task) {
        if task.reminder.is_none() {
            return;
        }
        let completed = task.status == TaskStatus::Completed;
        if let Err(error) = self.alarms.arm(task, completed).await {
            self.log_error(
                command,
                &format!("failed to arm alarm for task {}: {error}", task.id),
            );
        }
    }

    async fn disarm_logged(&self, command: &str, reminder_id: i64) {
        if let Err(error) = self.alarms.disarm_reminder(reminder_id).await {
            self.log_error(
                command,
                &format!("failed to cancel alarm {reminder_id}: {error}"),
            );
        }
    }
}

pub async fn create_task_impl(state: &AppState, draft: TaskDraft) -> Result<Task, InfraError> {
    draft.validate().map_err(InfraError::Validation)?;

    let now = (state.now_provider)();
    let task = state
        .run_store(move |store| {
            store.with_transaction(|transaction| {
                task_repository::insert_task(transaction, &draft, now)
            })
        })
        .await?;

    state.arm_logged("create_task", &task).await;
    state.events.publish(TaskEvent::Created { task_id: task.id });
    state.log_info("create_task", &format!("created task {}", task.id));
    Ok(task)
}

/// Applies the patch. When the edit flips the task between recurring and
/// one-time it is a different kind of task afterwards, so its ledger history
/// for dates other than today is dropped; a completion recorded earlier today
/// survives. Edits that keep the task's type leave the history alone.
pub async fn update_task_impl(
    state: &AppState,
    task_id: i64,
    patch: TaskPatch,
) -> Result<Task, InfraError> {
    patch.validate().map_err(InfraError::Validation)?;

    let now = (state.now_provider)();
    let today = state.today();
    let (removed_reminder_id, type_changed) = state
        .run_store(move |store| {
            store.with_transaction(|transaction| {
                let mut task = task_repository::get_task(transaction, task_id, today)?
                    .ok_or_else(|| InfraError::Validation(format!("task {task_id} not found")))?;
                let was_recurring = task.is_recurring();

                if let Some(title) = patch.title {
                    task.title = title;
                }
                if let Some(description) = patch.description {
                    task.description = description;
                }
                if let Some(color) = patch.color {
                    task.color = color;
                }
                if let Some(repeat_days) = patch.repeat_days {
                    task.repeat_days = repeat_days;
                }
                task_repository::update_task_row(transaction, &task)?;

                let mut removed_reminder_id = None;
                match patch.reminder {
                    ReminderChange::Keep => {}
                    ReminderChange::Set(reminder_draft) => {
                        task_repository::upsert_reminder(
                            transaction,
                            task_id,
                            &reminder_draft,
                            now,
                        )?;
                    }
                    ReminderChange::Remove => {
                        if let Some(reminder) = task.reminder.take() {
                            task_repository::delete_reminder(transaction, task_id)?;
                            removed_reminder_id = Some(reminder.id);
                        }
                    }
                }
                Ok((removed_reminder_id, task.is_recurring() != was_recurring))
            })
        })
        .await?;

    if type_changed {
        let purged = state.coordinator.purge_history_except_today(task_id).await?;
        if purged > 0 {
            state.log_info(
                "update_task",
                &format!("purged {purged} historical completions for task {task_id}"),
            );
        }
    }

    // The purge may have flipped the derived status (a one-time task whose
    // only completion was on an earlier date), so reload before re-arming.
    let task = state
        .run_store(move |store| {
            store.with_connection(|connection| {
                task_repository::get_task(connection, task_id, today)?.ok_or_else(|| {
                    InfraError::Validation(format!("task {task_id} not found"))
                })
            })
        })
        .await?;

    if let Some(reminder_id) = removed_reminder_id {
        state.disarm_logged("update_task", reminder_id).await;
    }
    state.arm_logged("update_task", &task).await;
    state.events.publish(TaskEvent::Updated { task_id });
    state.log_info("update_task", &format!("updated task {task_id}"));
    Ok(task)
}

pub async fn delete_task_impl(state: &AppState, task_id: i64) -> Result<bool, InfraError> {
    let (deleted, reminder_id) = state
        .run_store(move |store| {
            store.with_transaction(|transaction| {
                let reminder_id =
                    task_repository::get_reminder(transaction, task_id)?.map(|reminder| reminder.id);
                let deleted = task_repository::delete_task(transaction, task_id)?;
                Ok((deleted, reminder_id))
            })
        })
        .await?;

    if deleted {
        if let Some(reminder_id) = reminder_id {
            state.disarm_logged("delete_task", reminder_id).await;
        }
        state.events.publish(TaskEvent::Deleted {
            task_ids: vec![task_id],
        });
        state.log_info("delete_task", &format!("deleted task {task_id}"));
    }
    Ok(deleted)
}

/// Batch delete. Ids with no matching row are skipped; the returned count and
/// the deletion event cover only the rows that existed.
pub async fn delete_tasks_impl(state: &AppState, task_ids: Vec<i64>) -> Result<usize, InfraError> {
    let (deleted_ids, reminder_ids) = state
        .run_store(move |store| {
            store.with_transaction(|transaction| {
                let mut reminder_ids = Vec::new();
                for task_id in &task_ids {
                    if let Some(reminder) = task_repository::get_reminder(transaction, *task_id)? {
                        reminder_ids.push(reminder.id);
                    }
                }
                let deleted_ids = task_repository::delete_tasks(transaction, &task_ids)?;
                Ok((deleted_ids, reminder_ids))
            })
        })
        .await?;

    for reminder_id in reminder_ids {
        state.disarm_logged("delete_tasks", reminder_id).await;
    }
    let count = deleted_ids.len();
    if count > 0 {
        state.log_info("delete_tasks", &format!("deleted {count} tasks"));
        state.events.publish(TaskEvent::Deleted {
            task_ids: deleted_ids,
        });
    }
    Ok(count)
}

pub async fn mark_task_done_impl(state: &AppState, task_id: i64) -> Result<Task, InfraError> {
    let (task, changed) = state.coordinator.mark_done(task_id).await?;
    state.arm_logged("mark_task_done", &task).await;
    if changed {
        state.log_info("mark_task_done", &format!("task {task_id} completed"));
    }
    Ok(task)
}

pub async fn mark_task_undone_impl(state: &AppState, task_id: i64) -> Result<Task, InfraError> {
    let (task, changed) = state.coordinator.mark_undone(task_id).await?;
    state.arm_logged("mark_task_undone", &task).await;
    if changed {
        state.log_info("mark_task_undone", &format!("task {task_id} reverted"));
    }
    Ok(task)
}

pub async fn get_task_impl(state: &AppState, task_id: i64) -> Result<Task, InfraError> {
    let today = state.today();
    state
        .run_store(move |store| {
            store.with_connection(|connection| {
                task_repository::get_task(connection, task_id, today)?.ok_or_else(|| {
                    InfraError::Validation(format!("task {task_id} not found"))
                })
            })
        })
        .await
}

pub async fn list_tasks_impl(state: &AppState, filter: TaskFilter) -> Result<Vec<Task>, InfraError> {
    let today = state.today();
    state
        .run_store(move |store| {
            store.with_connection(|connection| task_repository::list_tasks(connection, filter, today))
        })
        .await
}

pub async fn completed_tasks_on_date_impl(
    state: &AppState,
    date: NaiveDate,
) -> Result<Vec<Task>, InfraError> {
    state
        .run_store(move |store| {
            store.with_connection(|connection| {
                task_repository::completed_tasks_on_date(connection, date)
            })
        })
        .await
}

pub async fn task_count_stats_impl(
    state: &AppState,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Result<Vec<DailyCount>, InfraError> {
    state
        .run_store(move |store| {
            store.with_connection(|connection| ledger::count_stats(connection, start, end))
        })
        .await
}

/// Clears the completion ledger and the per-date aggregates, then re-arms
/// every reminder since every task is incomplete again.
pub async fn reset_statistics_impl(state: &AppState) -> Result<(), InfraError> {
    state
        .run_store(move |store| store.with_transaction(|transaction| ledger::reset_all(transaction)))
        .await?;

    state.events.publish(TaskEvent::StatisticsReset);
    state.log_info("reset_statistics", "cleared completion history");
    arm_all(state, "reset_statistics").await?;
    Ok(())
}

/// Re-registers every reminder's alarm from current store state. Run on
/// startup, where platform alarm registrations may have been lost.
pub async fn rearm_all_impl(state: &AppState) -> Result<usize, InfraError> {
    arm_all(state, "rearm_all").await
}

async fn arm_all(state: &AppState, command: &str) -> Result<usize, InfraError> {
    let tasks = list_tasks_impl(state, TaskFilter::All).await?;
    let mut armed = 0;
    for task in &tasks {
        if task.reminder.is_none() {
            continue;
        }
        let completed = task.status == TaskStatus::Completed;
        match state.alarms.arm(task, completed).await {
            Ok(Some(_)) => armed += 1,
            Ok(None) => {}
            Err(error) => {
                state.log_error(
                    command,
                    &format!("failed to arm alarm for task {}: {error}", task.id),
                );
            }
        }
    }
    state.log_info(command, &format!("armed {armed} alarms"));
    Ok(armed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::scheduler::InMemoryAlarmService;
    use crate::domain::models::{
        ReminderChange, ReminderDraft, RepeatDays, TimeOfDay, DEFAULT_COLORS,
    };
    use chrono::{DateTime, Weekday};
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_WORKSPACE: AtomicUsize = AtomicUsize::new(0);

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn date(value: &str) -> NaiveDate {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").expect("valid date")
    }

    struct TempWorkspace {
        path: PathBuf,
    }

    impl TempWorkspace {
        fn new() -> Self {
            let sequence = NEXT_TEMP_WORKSPACE.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "routinetask-command-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp workspace");
            Self { path }
        }

        // 2026-03-10 is a Tuesday.
        fn app_state(&self) -> (AppState, Arc<InMemoryAlarmService>) {
            self.app_state_at("2026-03-10T08:00:00Z")
        }

        fn app_state_at(&self, now: &str) -> (AppState, Arc<InMemoryAlarmService>) {
            let service = Arc::new(InMemoryAlarmService::default());
            let instant = fixed_time(now);
            let state = AppState::with_now_provider(
                self.path.clone(),
                service.clone(),
                Arc::new(move || instant),
            )
            .expect("initialize app state");
            (state, service)
        }
    }

    impl Drop for TempWorkspace {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    fn tuesday_draft(title: &str) -> TaskDraft {
        TaskDraft {
            repeat_days: RepeatDays::NONE.with(Weekday::Tue),
            reminder: Some(ReminderDraft {
                start_time: TimeOfDay::new(9, 0).unwrap(),
                duration_minutes: 30,
            }),
            ..TaskDraft::new(title)
        }
    }

    #[tokio::test]
    async fn create_task_rejects_empty_title() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        let result = create_task_impl(&state, TaskDraft::new("   ")).await;
        assert!(matches!(result, Err(InfraError::Validation(_))));
    }

    #[tokio::test]
    async fn create_arms_the_alarm_and_lists_under_today() {
        let workspace = TempWorkspace::new();
        let (state, service) = workspace.app_state();

        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        assert_eq!(created.status, TaskStatus::Incomplete);
        let reminder = created.reminder.as_ref().expect("reminder");
        assert_eq!(
            service.registered_trigger(reminder.id),
            Some(fixed_time("2026-03-10T09:00:00Z"))
        );

        let today = list_tasks_impl(&state, TaskFilter::Today)
            .await
            .expect("list today");
        assert_eq!(today.len(), 1);
        assert_eq!(today[0].id, created.id);

        let fetched = get_task_impl(&state, created.id).await.expect("get task");
        assert_eq!(fetched.title, "Morning run");
        assert_eq!(fetched.color, DEFAULT_COLORS[0]);
    }

    #[tokio::test]
    async fn get_task_reports_missing_ids() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        assert!(matches!(
            get_task_impl(&state, 404).await,
            Err(InfraError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn done_undone_roundtrip_moves_the_alarm_and_publishes_events() {
        let workspace = TempWorkspace::new();
        let (state, service) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        let reminder_id = created.reminder.as_ref().expect("reminder").id;
        let mut receiver = state.subscribe();

        let done = mark_task_done_impl(&state, created.id).await.expect("done");
        assert_eq!(done.status, TaskStatus::Completed);
        // Completed today, so the alarm jumps to next Tuesday.
        assert_eq!(
            service.registered_trigger(reminder_id),
            Some(fixed_time("2026-03-17T09:00:00Z"))
        );
        assert_eq!(
            receiver.recv().await,
            Ok(TaskEvent::StatusChanged {
                task_id: created.id,
                completed: true
            })
        );

        let undone = mark_task_undone_impl(&state, created.id).await.expect("undone");
        assert_eq!(undone.status, TaskStatus::Incomplete);
        assert_eq!(
            service.registered_trigger(reminder_id),
            Some(fixed_time("2026-03-10T09:00:00Z"))
        );
        assert_eq!(
            receiver.recv().await,
            Ok(TaskEvent::StatusChanged {
                task_id: created.id,
                completed: false
            })
        );

        let stats = task_count_stats_impl(&state, None, None).await.expect("stats");
        assert!(stats.is_empty());
    }

    #[tokio::test]
    async fn marking_done_twice_counts_once() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");

        mark_task_done_impl(&state, created.id).await.expect("done");
        mark_task_done_impl(&state, created.id).await.expect("done again");

        let stats = task_count_stats_impl(&state, None, None).await.expect("stats");
        assert_eq!(
            stats,
            vec![DailyCount {
                date: date("2026-03-10"),
                count: 1
            }]
        );
    }

    #[tokio::test]
    async fn type_change_purges_history_but_keeps_todays_completion() {
        let workspace = TempWorkspace::new();

        // Completed last Tuesday.
        {
            let (state, _) = workspace.app_state_at("2026-03-03T10:00:00Z");
            let created = create_task_impl(&state, tuesday_draft("Morning run"))
                .await
                .expect("create task");
            mark_task_done_impl(&state, created.id).await.expect("done");
        }

        let (state, _) = workspace.app_state();
        let tasks = list_tasks_impl(&state, TaskFilter::All).await.expect("list");
        let task_id = tasks[0].id;
        mark_task_done_impl(&state, task_id).await.expect("done today");

        // Recurring to one-time.
        let patch = TaskPatch {
            repeat_days: Some(RepeatDays::NONE),
            ..TaskPatch::default()
        };
        let updated = update_task_impl(&state, task_id, patch).await.expect("update");
        assert!(!updated.is_recurring());
        assert_eq!(updated.status, TaskStatus::Completed);

        let stats = task_count_stats_impl(&state, None, None).await.expect("stats");
        assert_eq!(
            stats,
            vec![DailyCount {
                date: date("2026-03-10"),
                count: 1
            }]
        );
    }

    #[tokio::test]
    async fn title_only_edit_preserves_completion_history() {
        let workspace = TempWorkspace::new();

        // Completed on Monday.
        {
            let (state, _) = workspace.app_state_at("2026-03-09T10:00:00Z");
            let created = create_task_impl(&state, TaskDraft {
                repeat_days: RepeatDays::EVERY_DAY,
                ..TaskDraft::new("Morning run")
            })
            .await
            .expect("create task");
            mark_task_done_impl(&state, created.id).await.expect("done");
        }

        // Renamed on Tuesday.
        let (state, _) = workspace.app_state();
        let tasks = list_tasks_impl(&state, TaskFilter::All).await.expect("list");
        let patch = TaskPatch {
            title: Some("Evening run".to_string()),
            ..TaskPatch::default()
        };
        let updated = update_task_impl(&state, tasks[0].id, patch).await.expect("update");
        assert_eq!(updated.title, "Evening run");

        let stats = task_count_stats_impl(&state, None, None).await.expect("stats");
        assert_eq!(
            stats,
            vec![DailyCount {
                date: date("2026-03-09"),
                count: 1
            }]
        );
    }

    #[tokio::test]
    async fn update_can_remove_the_reminder_and_cancel_its_alarm() {
        let workspace = TempWorkspace::new();
        let (state, service) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        assert_eq!(service.registered_count(), 1);

        let patch = TaskPatch {
            reminder: ReminderChange::Remove,
            ..TaskPatch::default()
        };
        let updated = update_task_impl(&state, created.id, patch).await.expect("update");
        assert!(updated.reminder.is_none());
        assert_eq!(service.registered_count(), 0);
    }

    #[tokio::test]
    async fn update_reschedules_when_the_reminder_time_changes() {
        let workspace = TempWorkspace::new();
        let (state, service) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        let reminder_id = created.reminder.as_ref().expect("reminder").id;

        let patch = TaskPatch {
            reminder: ReminderChange::Set(ReminderDraft {
                start_time: TimeOfDay::new(18, 30).unwrap(),
                duration_minutes: 15,
            }),
            ..TaskPatch::default()
        };
        let updated = update_task_impl(&state, created.id, patch).await.expect("update");
        let reminder = updated.reminder.as_ref().expect("reminder kept");
        assert_eq!(reminder.id, reminder_id);
        assert_eq!(
            service.registered_trigger(reminder_id),
            Some(fixed_time("2026-03-10T18:30:00Z"))
        );
    }

    #[tokio::test]
    async fn switching_to_one_time_keeps_todays_completed_state() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        mark_task_done_impl(&state, created.id).await.expect("done");

        let patch = TaskPatch {
            repeat_days: Some(RepeatDays::NONE),
            ..TaskPatch::default()
        };
        let updated = update_task_impl(&state, created.id, patch).await.expect("update");
        assert!(!updated.is_recurring());
        assert_eq!(updated.status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn delete_cancels_the_alarm_and_publishes_the_deletion() {
        let workspace = TempWorkspace::new();
        let (state, service) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        let mut receiver = state.subscribe();

        assert!(delete_task_impl(&state, created.id).await.expect("delete"));
        assert_eq!(service.registered_count(), 0);
        assert_eq!(
            receiver.recv().await,
            Ok(TaskEvent::Deleted {
                task_ids: vec![created.id]
            })
        );
        assert!(!delete_task_impl(&state, created.id).await.expect("redelete"));
    }

    #[tokio::test]
    async fn deleting_a_completed_task_rebalances_the_aggregates() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        let kept = create_task_impl(&state, TaskDraft {
            repeat_days: RepeatDays::EVERY_DAY,
            ..TaskDraft::new("Kept")
        })
        .await
        .expect("create kept");
        let doomed = create_task_impl(&state, tuesday_draft("Doomed"))
            .await
            .expect("create doomed");
        mark_task_done_impl(&state, kept.id).await.expect("done kept");
        mark_task_done_impl(&state, doomed.id).await.expect("done doomed");

        assert!(delete_task_impl(&state, doomed.id).await.expect("delete"));

        // Only the surviving task's completion remains counted.
        let stats = task_count_stats_impl(&state, None, None).await.expect("stats");
        assert_eq!(
            stats,
            vec![DailyCount {
                date: date("2026-03-10"),
                count: 1
            }]
        );
    }

    #[tokio::test]
    async fn batch_delete_skips_missing_ids() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        let first = create_task_impl(&state, tuesday_draft("First"))
            .await
            .expect("create first");
        let second = create_task_impl(&state, TaskDraft::new("Second"))
            .await
            .expect("create second");

        let deleted = delete_tasks_impl(&state, vec![first.id, 999, second.id])
            .await
            .expect("batch delete");
        assert_eq!(deleted, 2);
        assert!(list_tasks_impl(&state, TaskFilter::All)
            .await
            .expect("list")
            .is_empty());
    }

    #[tokio::test]
    async fn completed_tasks_on_date_reads_the_ledger() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        create_task_impl(&state, TaskDraft::new("Untouched"))
            .await
            .expect("create other");
        mark_task_done_impl(&state, created.id).await.expect("done");

        let completed = completed_tasks_on_date_impl(&state, date("2026-03-10"))
            .await
            .expect("completed on date");
        assert_eq!(completed.len(), 1);
        assert_eq!(completed[0].id, created.id);
        assert!(completed_tasks_on_date_impl(&state, date("2026-03-09"))
            .await
            .expect("completed earlier")
            .is_empty());
    }

    #[tokio::test]
    async fn stats_aggregate_across_tasks_and_filter_by_range() {
        let workspace = TempWorkspace::new();

        {
            let (state, _) = workspace.app_state_at("2026-03-09T10:00:00Z");
            let task = create_task_impl(&state, TaskDraft {
                repeat_days: RepeatDays::EVERY_DAY,
                ..TaskDraft::new("Daily")
            })
            .await
            .expect("create daily");
            mark_task_done_impl(&state, task.id).await.expect("done monday");
        }

        let (state, _) = workspace.app_state();
        let tasks = list_tasks_impl(&state, TaskFilter::All).await.expect("list");
        let other = create_task_impl(&state, tuesday_draft("Second"))
            .await
            .expect("create second");
        mark_task_done_impl(&state, tasks[0].id).await.expect("done tuesday");
        mark_task_done_impl(&state, other.id).await.expect("done second");

        let stats = task_count_stats_impl(&state, None, None).await.expect("stats");
        assert_eq!(
            stats,
            vec![
                DailyCount {
                    date: date("2026-03-10"),
                    count: 2
                },
                DailyCount {
                    date: date("2026-03-09"),
                    count: 1
                },
            ]
        );

        let bounded = task_count_stats_impl(&state, Some(date("2026-03-10")), None)
            .await
            .expect("bounded stats");
        assert_eq!(bounded.len(), 1);
        assert_eq!(bounded[0].count, 2);
    }

    #[tokio::test]
    async fn reset_statistics_clears_history_and_rearms() {
        let workspace = TempWorkspace::new();
        let (state, service) = workspace.app_state();
        let created = create_task_impl(&state, tuesday_draft("Morning run"))
            .await
            .expect("create task");
        let reminder_id = created.reminder.as_ref().expect("reminder").id;
        mark_task_done_impl(&state, created.id).await.expect("done");
        let mut receiver = state.subscribe();

        reset_statistics_impl(&state).await.expect("reset");
        assert_eq!(receiver.recv().await, Ok(TaskEvent::StatisticsReset));
        assert!(task_count_stats_impl(&state, None, None)
            .await
            .expect("stats")
            .is_empty());
        let fetched = get_task_impl(&state, created.id).await.expect("get task");
        assert_eq!(fetched.status, TaskStatus::Incomplete);
        // Incomplete again, so the alarm is back on today's occurrence.
        assert_eq!(
            service.registered_trigger(reminder_id),
            Some(fixed_time("2026-03-10T09:00:00Z"))
        );
    }

    #[tokio::test]
    async fn rearm_all_registers_every_pending_reminder() {
        let workspace = TempWorkspace::new();

        {
            let (state, _) = workspace.app_state();
            create_task_impl(&state, tuesday_draft("First")).await.expect("create");
            create_task_impl(&state, tuesday_draft("Second")).await.expect("create");
            create_task_impl(&state, TaskDraft::new("No reminder"))
                .await
                .expect("create");
        }

        // Fresh alarm service, as after a restart.
        let (state, service) = workspace.app_state();
        assert_eq!(service.registered_count(), 0);
        let armed = rearm_all_impl(&state).await.expect("rearm");
        assert_eq!(armed, 2);
        assert_eq!(service.registered_count(), 2);
    }

    #[tokio::test]
    async fn commands_append_json_log_lines() {
        let workspace = TempWorkspace::new();
        let (state, _) = workspace.app_state();
        create_task_impl(&state, TaskDraft::new("Morning run"))
            .await
            .expect("create task");

        let raw = fs::read_to_string(workspace.path.join("logs").join("commands.log"))
            .expect("read log");
        let line = raw.lines().next().expect("log line");
        let entry: serde_json::Value = serde_json::from_str(line).expect("json line");
        assert_eq!(entry.get("command").and_then(serde_json::Value::as_str), Some("create_task"));
        assert_eq!(entry.get("level").and_then(serde_json::Value::as_str), Some("info"));
    }
}
