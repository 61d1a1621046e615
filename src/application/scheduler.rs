use crate::domain::models::Task;
use crate::domain::trigger::next_trigger;
use crate::infrastructure::error::InfraError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// What the platform alarm delivers when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmPayload {
    pub task_id: i64,
    pub title: String,
    pub description: String,
    pub duration_minutes: u32,
    pub recurring: bool,
}

/// Seam to the platform's one-shot alarm facility. Scheduling under an
/// already-registered alarm id replaces the earlier registration.
#[async_trait]
pub trait AlarmService: Send + Sync {
    async fn schedule_one_shot(
        &self,
        alarm_id: i64,
        trigger_at: DateTime<Utc>,
        payload: AlarmPayload,
    ) -> Result<(), InfraError>;

    async fn cancel(&self, alarm_id: i64) -> Result<(), InfraError>;
}

#[derive(Default)]
pub struct InMemoryAlarmService {
    registered: Mutex<HashMap<i64, (DateTime<Utc>, AlarmPayload)>>,
}

impl InMemoryAlarmService {
    pub fn registered_trigger(&self, alarm_id: i64) -> Option<DateTime<Utc>> {
        self.registered
            .lock()
            .ok()
            .and_then(|alarms| alarms.get(&alarm_id).map(|(trigger_at, _)| *trigger_at))
    }

    pub fn registered_payload(&self, alarm_id: i64) -> Option<AlarmPayload> {
        self.registered
            .lock()
            .ok()
            .and_then(|alarms| alarms.get(&alarm_id).map(|(_, payload)| payload.clone()))
    }

    pub fn registered_count(&self) -> usize {
        self.registered.lock().map(|alarms| alarms.len()).unwrap_or(0)
    }
}

#[async_trait]
impl AlarmService for InMemoryAlarmService {
    async fn schedule_one_shot(
        &self,
        alarm_id: i64,
        trigger_at: DateTime<Utc>,
        payload: AlarmPayload,
    ) -> Result<(), InfraError> {
        let mut alarms = self
            .registered
            .lock()
            .map_err(|error| InfraError::Invariant(format!("alarm registry poisoned: {error}")))?;
        alarms.insert(alarm_id, (trigger_at, payload));
        Ok(())
    }

    async fn cancel(&self, alarm_id: i64) -> Result<(), InfraError> {
        let mut alarms = self
            .registered
            .lock()
            .map_err(|error| InfraError::Invariant(format!("alarm registry poisoned: {error}")))?;
        alarms.remove(&alarm_id);
        Ok(())
    }
}

/// Bridges the pure trigger calculation to the alarm service. The reminder's
/// row id keys the alarm, so re-arming a task replaces its previous
/// registration instead of stacking a second one.
pub struct AlarmScheduler {
    service: Arc<dyn AlarmService>,
    timezone: Tz,
    now_provider: NowProvider,
}

impl AlarmScheduler {
    pub fn new(service: Arc<dyn AlarmService>, timezone: Tz, now_provider: NowProvider) -> Self {
        Self {
            service,
            timezone,
            now_provider,
        }
    }

    /// Schedules the task's next occurrence, or clears any stale registration
    /// when nothing is pending. Returns the scheduled instant.
    pub async fn arm(
        &self,
        task: &Task,
        completed_today: bool,
    ) -> Result<Option<DateTime<Utc>>, InfraError> {
        let Some(reminder) = &task.reminder else {
            return Ok(None);
        };
        let now = (self.now_provider)().with_timezone(&self.timezone);
        let trigger = next_trigger(task, &now, completed_today).map_err(InfraError::Invariant)?;

        match trigger {
            Some(trigger_at) => {
                let trigger_at = trigger_at.with_timezone(&Utc);
                let payload = AlarmPayload {
                    task_id: task.id,
                    title: task.title.clone(),
                    description: task.description.clone(),
                    duration_minutes: reminder.duration_minutes,
                    recurring: task.is_recurring(),
                };
                self.service
                    .schedule_one_shot(reminder.id, trigger_at, payload)
                    .await?;
                Ok(Some(trigger_at))
            }
            None => {
                self.service.cancel(reminder.id).await?;
                Ok(None)
            }
        }
    }

    pub async fn disarm(&self, task: &Task) -> Result<(), InfraError> {
        if let Some(reminder) = &task.reminder {
            self.disarm_reminder(reminder.id).await?;
        }
        Ok(())
    }

    /// Cancels by reminder id directly, for callers holding a reminder whose
    /// task row is already gone or rewritten.
    pub async fn disarm_reminder(&self, reminder_id: i64) -> Result<(), InfraError> {
        self.service.cancel(reminder_id).await
    }
}
