use crate::application::events::{TaskEvent, TaskEventBus};
use crate::application::scheduler::NowProvider;
use crate::domain::models::{Task, TaskStatus};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::ledger;
use crate::infrastructure::storage::TaskStore;
use crate::infrastructure::task_repository;
use chrono::NaiveDate;
use chrono_tz::Tz;
use std::sync::Arc;

/// Owns the done/undone transitions. Each transition runs the ledger write
/// and the aggregate adjustment in one store transaction, so observers never
/// see the pair disagree, and publishes a status event only when the
/// transition actually changed something.
pub struct CompletionCoordinator {
    store: Arc<TaskStore>,
    events: Arc<TaskEventBus>,
    timezone: Tz,
    now_provider: NowProvider,
}

impl CompletionCoordinator {
    pub fn new(
        store: Arc<TaskStore>,
        events: Arc<TaskEventBus>,
        timezone: Tz,
        now_provider: NowProvider,
    ) -> Self {
        Self {
            store,
            events,
            timezone,
            now_provider,
        }
    }

    /// The ledger date for the current instant in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        (self.now_provider)().with_timezone(&self.timezone).date_naive()
    }

    async fn run_blocking<T: Send + 'static>(
        &self,
        operation: impl FnOnce(&TaskStore) -> Result<T, InfraError> + Send + 'static,
    ) -> Result<T, InfraError> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || operation(&store))
            .await
            .map_err(|error| InfraError::Invariant(format!("store task aborted: {error}")))?
    }

    /// Records the task as completed for today. Idempotent: returns the task
    /// and whether the call changed anything.
    pub async fn mark_done(&self, task_id: i64) -> Result<(Task, bool), InfraError> {
        let today = self.today();
        let (task, changed) = self
            .run_blocking(move |store| {
                store.with_transaction(|transaction| {
                    let mut task = task_repository::get_task(transaction, task_id, today)?
                        .ok_or_else(|| {
                            InfraError::Validation(format!("task {task_id} not found"))
                        })?;
                    if task.status == TaskStatus::Completed {
                        return Ok((task, false));
                    }
                    if ledger::insert_entry(transaction, task_id, today)? {
                        ledger::increment_stat(transaction, today)?;
                    }
                    task.status = TaskStatus::Completed;
                    Ok((task, true))
                })
            })
            .await?;

        if changed {
            self.events.publish(TaskEvent::StatusChanged {
                task_id,
                completed: true,
            });
        }
        Ok((task, changed))
    }

    /// Removes today's ledger row if present; a no-op otherwise. A one-time
    /// task completed on an earlier date stays completed, since that day's
    /// record is history rather than today's state.
    pub async fn mark_undone(&self, task_id: i64) -> Result<(Task, bool), InfraError> {
        let today = self.today();
        let (task, changed) = self
            .run_blocking(move |store| {
                store.with_transaction(|transaction| {
                    let mut task = task_repository::get_task(transaction, task_id, today)?
                        .ok_or_else(|| {
                            InfraError::Validation(format!("task {task_id} not found"))
                        })?;
                    if !ledger::delete_entry(transaction, task_id, today)? {
                        return Ok((task, false));
                    }
                    ledger::decrement_stat(transaction, today)?;
                    task.status = TaskStatus::Incomplete;
                    Ok((task, true))
                })
            })
            .await?;

        if changed {
            self.events.publish(TaskEvent::StatusChanged {
                task_id,
                completed: false,
            });
        }
        Ok((task, changed))
    }

    pub async fn is_completed_today(&self, task_id: i64) -> Result<bool, InfraError> {
        let today = self.today();
        self.run_blocking(move |store| {
            store.with_connection(|connection| {
                let task = task_repository::get_task(connection, task_id, today)?.ok_or_else(
                    || InfraError::Validation(format!("task {task_id} not found")),
                )?;
                Ok(task.status == TaskStatus::Completed)
            })
        })
        .await
    }

    /// Drops the task's ledger history except today's row. Runs after an edit
    /// commits, so the reshaped task starts from a clean history without
    /// losing a completion recorded earlier the same day.
    pub async fn purge_history_except_today(&self, task_id: i64) -> Result<usize, InfraError> {
        let today = self.today();
        self.run_blocking(move |store| {
            store.with_transaction(|transaction| {
                ledger::purge_entries_except(transaction, task_id, today)
            })
        })
        .await
    }
}
