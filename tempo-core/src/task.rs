//! Task model: priorities, energy requirements, and the status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reminders::Reminder;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    /// Sort weight used by the planner and recommendations (high=3 .. low=1).
    pub fn weight(self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnergyLevel {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Delegated,
}

impl TaskStatus {
    /// Allowed status moves.
    ///
    /// `Completed -> Pending` is the explicit "reopen" path; nothing else leaves `Completed`.
    pub fn can_transition_to(self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        matches!(
            (self, next),
            (Pending, InProgress)
                | (Pending, Delegated)
                | (Pending, Completed)
                | (InProgress, Completed)
                | (InProgress, Pending)
                | (Delegated, Completed)
                | (Delegated, Pending)
                | (Completed, Pending)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("task {task_id}: cannot move from {from:?} to {to:?}")]
pub struct TransitionError {
    pub task_id: String,
    pub from: TaskStatus,
    pub to: TaskStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,

    pub priority: Priority,
    pub energy: EnergyLevel,

    /// Minutes, always > 0.
    pub duration_minutes: u32,

    pub category: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub delegate_to: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// 1-10.
    pub estimated_effort: u8,

    /// Minutes.
    #[serde(default)]
    pub actual_time_spent: Option<u32>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub reminders: Vec<Reminder>,
}

/// Attributes for a new task. Anything left unset gets the store defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub energy: Option<EnergyLevel>,
    pub duration_minutes: Option<u32>,
    pub category: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub delegate_to: Option<String>,
    pub tags: Vec<String>,
    pub parent_task_id: Option<String>,
    pub dependencies: Vec<String>,
    pub estimated_effort: Option<u8>,
}

impl TaskDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_energy(mut self, energy: EnergyLevel) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_duration(mut self, minutes: u32) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_due_date(mut self, due: DateTime<Utc>) -> Self {
        self.due_date = Some(due);
        self
    }

    pub fn with_scheduled_time(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_time = Some(at);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub(crate) fn into_task(self, id: String, now: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            priority: self.priority.unwrap_or(Priority::Medium),
            energy: self.energy.unwrap_or(EnergyLevel::Medium),
            duration_minutes: self.duration_minutes.filter(|d| *d > 0).unwrap_or(30),
            category: self.category.unwrap_or_else(|| "Personal".to_string()),
            status: TaskStatus::Pending,
            created_at: now,
            due_date: self.due_date,
            scheduled_time: self.scheduled_time,
            delegate_to: self.delegate_to,
            tags: self.tags,
            parent_task_id: self.parent_task_id,
            dependencies: self.dependencies,
            estimated_effort: self.estimated_effort.unwrap_or(5).clamp(1, 10),
            actual_time_spent: None,
            completed_at: None,
            reminders: Vec::new(),
        }
    }
}

/// Partial update. `Some` fields overwrite; `status` is not here, it goes through
/// [`crate::TaskStore::set_status`] so transitions stay checked.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub energy: Option<EnergyLevel>,
    pub duration_minutes: Option<u32>,
    pub category: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub scheduled_time: Option<DateTime<Utc>>,
    pub delegate_to: Option<String>,
    pub tags: Option<Vec<String>>,
    pub estimated_effort: Option<u8>,
    pub actual_time_spent: Option<u32>,
}

impl TaskPatch {
    pub(crate) fn apply(self, task: &mut Task) {
        if let Some(v) = self.title {
            task.title = v;
        }
        if let Some(v) = self.description {
            task.description = Some(v);
        }
        if let Some(v) = self.priority {
            task.priority = v;
        }
        if let Some(v) = self.energy {
            task.energy = v;
        }
        if let Some(v) = self.duration_minutes.filter(|d| *d > 0) {
            task.duration_minutes = v;
        }
        if let Some(v) = self.category {
            task.category = v;
        }
        if let Some(v) = self.due_date {
            task.due_date = Some(v);
        }
        if let Some(v) = self.scheduled_time {
            task.scheduled_time = Some(v);
        }
        if let Some(v) = self.delegate_to {
            task.delegate_to = Some(v);
        }
        if let Some(v) = self.tags {
            task.tags = v;
        }
        if let Some(v) = self.estimated_effort {
            task.estimated_effort = v.clamp(1, 10);
        }
        if let Some(v) = self.actual_time_spent {
            task.actual_time_spent = Some(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_defaults() {
        let now = Utc::now();
        let t = TaskDraft::new("write report").into_task("t1".into(), now);
        assert_eq!(t.priority, Priority::Medium);
        assert_eq!(t.energy, EnergyLevel::Medium);
        assert_eq!(t.duration_minutes, 30);
        assert_eq!(t.category, "Personal");
        assert_eq!(t.estimated_effort, 5);
        assert_eq!(t.status, TaskStatus::Pending);
        assert_eq!(t.created_at, now);
    }

    #[test]
    fn zero_duration_falls_back_to_default() {
        let t = TaskDraft::new("x").with_duration(0).into_task("t".into(), Utc::now());
        assert_eq!(t.duration_minutes, 30);
    }

    #[test]
    fn completed_only_reopens_to_pending() {
        assert!(TaskStatus::Completed.can_transition_to(TaskStatus::Pending));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::InProgress));
        assert!(!TaskStatus::Completed.can_transition_to(TaskStatus::Delegated));
        assert!(TaskStatus::Pending.can_transition_to(TaskStatus::Delegated));
    }

    #[test]
    fn patch_ignores_zero_duration_and_clamps_effort() {
        let mut t = TaskDraft::new("x").into_task("t".into(), Utc::now());
        TaskPatch {
            duration_minutes: Some(0),
            estimated_effort: Some(42),
            ..TaskPatch::default()
        }
        .apply(&mut t);
        assert_eq!(t.duration_minutes, 30);
        assert_eq!(t.estimated_effort, 10);
    }
}
