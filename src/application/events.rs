use serde::Serialize;
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Notifications emitted after a mutation commits. Observers react to the
/// committed state; nothing is published for a mutation that changed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskEvent {
    Created { task_id: i64 },
    Updated { task_id: i64 },
    Deleted { task_ids: Vec<i64> },
    StatusChanged { task_id: i64, completed: bool },
    StatisticsReset,
}

/// Broadcast fan-out for [`TaskEvent`]. Publishing never blocks and never
/// fails; with no subscribers the event is simply dropped.
pub struct TaskEventBus {
    sender: broadcast::Sender<TaskEvent>,
}

impl TaskEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: TaskEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for TaskEventBus {
    fn default() -> Self {
        Self::new()
    }
}
