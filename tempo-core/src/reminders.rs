//! Task reminders and the one-shot timer scheduler that fires them.
//!
//! The store owns reminder state; the scheduler only owns timers. When a timer expires the
//! scheduler sends a [`ReminderFired`] message back to whoever owns the store, and that owner
//! calls [`crate::TaskStore::mark_reminder_fired`]. Nothing here touches shared state.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    TimeBased,
    LocationBased,
    ContextBased,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub task_id: String,
    pub kind: ReminderKind,
    #[serde(default)]
    pub trigger_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub trigger_location: Option<String>,
    #[serde(default)]
    pub trigger_context: Option<String>,
    pub message: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReminderDraft {
    pub kind: Option<ReminderKind>,
    pub trigger_time: Option<DateTime<Utc>>,
    pub trigger_location: Option<String>,
    pub trigger_context: Option<String>,
    pub message: Option<String>,
}

impl ReminderDraft {
    pub fn at(trigger_time: DateTime<Utc>) -> Self {
        Self {
            kind: Some(ReminderKind::TimeBased),
            trigger_time: Some(trigger_time),
            ..Self::default()
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// When a reminder is being armed. Decides what happens to trigger times already in the past.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmPolicy {
    /// Freshly created or snoozed: a past trigger is never armed.
    OnCreate,
    /// Restored from disk after a restart: an overdue active reminder fires immediately.
    OnReload,
}

/// How long to wait before firing `reminder`, or `None` if it should not be armed at all.
pub fn arm_delay(
    reminder: &Reminder,
    now: DateTime<Utc>,
    policy: ArmPolicy,
) -> Option<std::time::Duration> {
    if !reminder.is_active || reminder.kind != ReminderKind::TimeBased {
        return None;
    }
    let at = reminder.trigger_time?;
    let delta = at - now;
    if delta > Duration::zero() {
        return delta.to_std().ok();
    }
    match policy {
        ArmPolicy::OnCreate => None,
        ArmPolicy::OnReload => Some(std::time::Duration::ZERO),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderFired {
    pub reminder_id: String,
    pub task_id: String,
}

/// Cancellable one-shot timers keyed by reminder id.
///
/// Must be used from inside a tokio runtime: arming spawns a task.
#[derive(Debug)]
pub struct ReminderScheduler {
    handles: HashMap<String, JoinHandle<()>>,
    tx: mpsc::UnboundedSender<ReminderFired>,
}

impl ReminderScheduler {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReminderFired>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                handles: HashMap::new(),
                tx,
            },
            rx,
        )
    }

    /// Arm `reminder` according to `policy`. Returns false when the policy says not to.
    pub fn arm(&mut self, reminder: &Reminder, now: DateTime<Utc>, policy: ArmPolicy) -> bool {
        let Some(delay) = arm_delay(reminder, now, policy) else {
            tracing::debug!(reminder_id = %reminder.id, ?policy, "reminder not armed");
            return false;
        };
        self.arm_after(&reminder.id, &reminder.task_id, delay);
        true
    }

    /// Replace any pending timer for this reminder with one firing `minutes` from now.
    pub fn snooze(&mut self, reminder: &Reminder, minutes: u32) {
        let delay = std::time::Duration::from_secs(u64::from(minutes) * 60);
        self.arm_after(&reminder.id, &reminder.task_id, delay);
    }

    pub fn cancel(&mut self, reminder_id: &str) -> bool {
        match self.handles.remove(reminder_id) {
            Some(h) => {
                h.abort();
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, reminder_id: &str) -> bool {
        self.handles
            .get(reminder_id)
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    pub fn armed_ids(&self) -> Vec<String> {
        self.handles.keys().cloned().collect()
    }

    pub fn armed_count(&self) -> usize {
        self.handles.values().filter(|h| !h.is_finished()).count()
    }

    fn arm_after(&mut self, reminder_id: &str, task_id: &str, delay: std::time::Duration) {
        // Re-arming replaces the old timer.
        self.cancel(reminder_id);

        let tx = self.tx.clone();
        let fired = ReminderFired {
            reminder_id: reminder_id.to_string(),
            task_id: task_id.to_string(),
        };
        tracing::debug!(reminder_id, delay_secs = delay.as_secs(), "arming reminder");
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(fired);
        });
        self.handles.insert(reminder_id.to_string(), handle);
    }
}

impl Drop for ReminderScheduler {
    fn drop(&mut self) {
        for (_, h) in self.handles.drain() {
            h.abort();
        }
    }
}
