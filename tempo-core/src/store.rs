//! Task store: the single owner of tasks, reminders, daily plans, and the productivity profile.
//!
//! Every mutation writes the full snapshot through the configured [`Storage`]. Write failures
//! are logged, never fatal; use [`TaskStore::flush`] when the caller needs to know.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use thiserror::Error;
use uuid::Uuid;

use crate::planner::{self, DailyPlan, ScheduledSlot};
use crate::profile::ProductivityProfile;
use crate::reminders::{ArmPolicy, Reminder, ReminderDraft, ReminderKind, ReminderScheduler};
use crate::snapshot::{Snapshot, Storage, StoreError};
use crate::task::{EnergyLevel, Priority, Task, TaskDraft, TaskPatch, TaskStatus, TransitionError};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatusError {
    #[error("task not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// Pending tasks split by priority, each bucket ordered by due date (undated last).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityBuckets {
    pub high: Vec<Task>,
    pub medium: Vec<Task>,
    pub low: Vec<Task>,
}

pub fn generate_id() -> String {
    Uuid::new_v4().simple().to_string()
}

fn load<S: Storage>(storage: &S) -> Snapshot {
    match storage.read() {
        Ok(Some(blob)) => Snapshot::decode_or_default(&blob),
        Ok(None) => Snapshot::default(),
        Err(e) => {
            tracing::warn!(error = %e, "could not read stored state; starting empty");
            Snapshot::default()
        }
    }
}

pub struct TaskStore<S: Storage> {
    storage: S,
    tz: Tz,
    tasks: Vec<Task>,
    plans: BTreeMap<NaiveDate, DailyPlan>,
    profile: ProductivityProfile,
}

impl<S: Storage> TaskStore<S> {
    /// Load state from `storage`. Absent, unreadable, or malformed data yields an empty store.
    pub fn open(storage: S, tz: Tz) -> Self {
        let snapshot = load(&storage);
        tracing::debug!(tasks = snapshot.tasks.len(), "task store opened");

        Self {
            storage,
            tz,
            tasks: snapshot.tasks,
            plans: snapshot.daily_plans,
            profile: snapshot.profile,
        }
    }

    /// Replace in-memory state with whatever is in storage now. A long-lived owner calls this
    /// before mutating so it never writes back state other writers have since replaced.
    pub fn reload(&mut self) {
        let snapshot = load(&self.storage);
        self.tasks = snapshot.tasks;
        self.plans = snapshot.daily_plans;
        self.profile = snapshot.profile;
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            tasks: self.tasks.clone(),
            daily_plans: self.plans.clone(),
            profile: self.profile.clone(),
            ..Snapshot::default()
        }
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        let blob = self.snapshot().encode()?;
        self.storage.write(&blob)
    }

    fn persist(&self) {
        if let Err(e) = self.flush() {
            tracing::error!(error = %e, "failed to save task data");
        }
    }

    pub fn all(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    pub fn create(&mut self, draft: TaskDraft, now: DateTime<Utc>) -> Task {
        let task = draft.into_task(generate_id(), now);
        tracing::info!(task_id = %task.id, title = %task.title, "task created");
        self.tasks.push(task.clone());
        self.persist();
        task
    }

    pub fn update(&mut self, id: &str, patch: TaskPatch) -> Option<Task> {
        let task = self.get_mut(id)?;
        patch.apply(task);
        let out = task.clone();
        self.persist();
        Some(out)
    }

    pub fn delete(&mut self, id: &str) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        let deleted = self.tasks.len() != before;
        if deleted {
            tracing::info!(task_id = id, "task deleted");
            self.persist();
        }
        deleted
    }

    /// Mark completed, stamp `completed_at`, default the actual time to the estimate, and feed
    /// the productivity profile. Completing an already completed task changes nothing.
    pub fn complete(&mut self, id: &str, now: DateTime<Utc>) -> Option<Task> {
        let tz = self.tz;
        let task = self.get_mut(id)?;
        if task.status == TaskStatus::Completed {
            return Some(task.clone());
        }

        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        task.actual_time_spent = Some(task.actual_time_spent.unwrap_or(task.duration_minutes));
        let out = task.clone();

        self.profile.record_completion(&out, tz);
        tracing::info!(task_id = id, "task completed");
        self.persist();
        Some(out)
    }

    /// Move a task along the status state machine.
    pub fn set_status(
        &mut self,
        id: &str,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Result<Task, StatusError> {
        let current = self
            .get(id)
            .ok_or_else(|| StatusError::NotFound(id.to_string()))?
            .status;

        if current == status {
            return self
                .get(id)
                .cloned()
                .ok_or_else(|| StatusError::NotFound(id.to_string()));
        }
        if !current.can_transition_to(status) {
            return Err(TransitionError {
                task_id: id.to_string(),
                from: current,
                to: status,
            }
            .into());
        }
        if status == TaskStatus::Completed {
            return self
                .complete(id, now)
                .ok_or_else(|| StatusError::NotFound(id.to_string()));
        }

        let task = self
            .get_mut(id)
            .ok_or_else(|| StatusError::NotFound(id.to_string()))?;
        if current == TaskStatus::Completed {
            task.completed_at = None;
        }
        task.status = status;
        let out = task.clone();
        self.persist();
        Ok(out)
    }

    pub fn tasks_by_priority(&self) -> PriorityBuckets {
        let mut buckets = PriorityBuckets::default();
        for t in self.tasks.iter().filter(|t| t.status == TaskStatus::Pending) {
            let bucket = match t.priority {
                Priority::High => &mut buckets.high,
                Priority::Medium => &mut buckets.medium,
                Priority::Low => &mut buckets.low,
            };
            bucket.push(t.clone());
        }
        for bucket in [&mut buckets.high, &mut buckets.medium, &mut buckets.low] {
            bucket.sort_by(|a, b| match (a.due_date, b.due_date) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
        }
        buckets
    }

    /// Book a task at `start`. Refused when it overlaps a slot in that day's cached plan.
    pub fn schedule_task(&mut self, id: &str, start: DateTime<Utc>) -> bool {
        let Some(task) = self.get(id) else {
            return false;
        };
        let end = start + Duration::minutes(i64::from(task.duration_minutes));
        let buffer_minutes = (task.duration_minutes / 5).min(15);
        let date = start.with_timezone(&self.tz).date_naive();

        if let Some(plan) = self.plans.get(&date) {
            if plan.scheduled_tasks.iter().any(|s| s.overlaps(start, end)) {
                tracing::debug!(task_id = id, %start, "schedule refused: overlaps plan");
                return false;
            }
        }

        if let Some(t) = self.get_mut(id) {
            t.scheduled_time = Some(start);
        }
        if let Some(plan) = self.plans.get_mut(&date) {
            plan.unscheduled_tasks.retain(|u| u != id);
            plan.scheduled_tasks.push(ScheduledSlot {
                task_id: id.to_string(),
                start,
                end,
                buffer_minutes,
            });
            plan.scheduled_tasks.sort_by_key(|s| s.start);
        }
        self.persist();
        true
    }

    /// Suggested start for a dated task: the day before it is due, at the first peak hour.
    pub fn suggest_schedule(&self, id: &str) -> Option<DateTime<Utc>> {
        let task = self.get(id)?;
        let due = task.due_date?;
        let hour = self.profile.peak_energy_hours.first().copied().unwrap_or(10);
        let day_before = due.with_timezone(&self.tz).date_naive().pred_opt()?;
        planner::local_time_on(day_before, hour, 0, self.tz)
    }

    /// The cached plan for `date`, computing and caching it on first request.
    ///
    /// A cached plan is reused even if tasks changed since; see [`TaskStore::invalidate_plan`].
    pub fn create_or_get_plan(&mut self, date: NaiveDate) -> DailyPlan {
        if let Some(plan) = self.plans.get(&date) {
            return plan.clone();
        }
        let plan = planner::build_daily_plan(&self.tasks, date, self.tz);
        tracing::info!(
            %date,
            scheduled = plan.scheduled_tasks.len(),
            unscheduled = plan.unscheduled_tasks.len(),
            "daily plan created"
        );
        self.plans.insert(date, plan.clone());
        self.persist();
        plan
    }

    pub fn daily_plan(&self, date: NaiveDate) -> Option<&DailyPlan> {
        self.plans.get(&date)
    }

    pub fn invalidate_plan(&mut self, date: NaiveDate) -> bool {
        let removed = self.plans.remove(&date).is_some();
        if removed {
            self.persist();
        }
        removed
    }

    pub fn recommendations(&self, energy: EnergyLevel, now: DateTime<Utc>) -> Vec<Task> {
        let hour = now.with_timezone(&self.tz).hour();
        planner::recommend(&self.tasks, energy, hour, &self.profile)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn profile(&self) -> &ProductivityProfile {
        &self.profile
    }

    /// Attach a new reminder to a task. `None` if the task does not exist.
    pub fn create_reminder(
        &mut self,
        task_id: &str,
        draft: ReminderDraft,
        now: DateTime<Utc>,
    ) -> Option<Reminder> {
        let task = self.get_mut(task_id)?;
        let reminder = Reminder {
            id: generate_id(),
            task_id: task_id.to_string(),
            kind: draft.kind.unwrap_or(ReminderKind::TimeBased),
            trigger_time: draft.trigger_time,
            trigger_location: draft.trigger_location,
            trigger_context: draft.trigger_context,
            message: draft
                .message
                .unwrap_or_else(|| format!("Reminder: {}", task.title)),
            is_active: true,
            created_at: now,
        };
        task.reminders.push(reminder.clone());
        tracing::info!(reminder_id = %reminder.id, task_id, "reminder created");
        self.persist();
        Some(reminder)
    }

    pub fn reminder(&self, id: &str) -> Option<&Reminder> {
        self.tasks
            .iter()
            .flat_map(|t| t.reminders.iter())
            .find(|r| r.id == id)
    }

    fn reminder_mut(&mut self, id: &str) -> Option<&mut Reminder> {
        self.tasks
            .iter_mut()
            .flat_map(|t| t.reminders.iter_mut())
            .find(|r| r.id == id)
    }

    pub fn active_reminders(&self) -> Vec<Reminder> {
        self.tasks
            .iter()
            .flat_map(|t| t.reminders.iter())
            .filter(|r| r.is_active)
            .cloned()
            .collect()
    }

    /// Move an active reminder's trigger to `now + minutes`. Inactive reminders are left alone.
    pub fn snooze_reminder(
        &mut self,
        id: &str,
        minutes: u32,
        now: DateTime<Utc>,
    ) -> Option<Reminder> {
        let r = self.reminder_mut(id)?;
        if !r.is_active {
            return None;
        }
        r.trigger_time = Some(now + Duration::minutes(i64::from(minutes)));
        let out = r.clone();
        self.persist();
        Some(out)
    }

    /// Handle a timer expiry. Returns the reminder to notify about, or `None` if it is gone or
    /// no longer active. Time-based reminders are deactivated once fired.
    pub fn mark_reminder_fired(&mut self, id: &str) -> Option<Reminder> {
        let r = self.reminder_mut(id)?;
        if !r.is_active {
            return None;
        }
        let out = r.clone();
        if r.kind == ReminderKind::TimeBased {
            r.is_active = false;
            self.persist();
        }
        Some(out)
    }

    pub fn dismiss_reminder(&mut self, id: &str) -> Option<Reminder> {
        let r = self.reminder_mut(id)?;
        r.is_active = false;
        let out = r.clone();
        self.persist();
        Some(out)
    }

    /// Re-arm every active reminder after a reload. Overdue ones fire immediately.
    pub fn rearm_reminders(&self, scheduler: &mut ReminderScheduler, now: DateTime<Utc>) -> usize {
        let armed = self
            .active_reminders()
            .iter()
            .filter(|r| scheduler.arm(r, now, ArmPolicy::OnReload))
            .count();
        tracing::info!(armed, "reminders re-armed");
        armed
    }

    /// Deliver a fired timer if the stored reminder is still due: active, and its trigger time
    /// not after `now`. `None` otherwise, e.g. when it was snoozed or dismissed elsewhere.
    pub fn deliver_reminder(&mut self, id: &str, now: DateTime<Utc>) -> Option<Reminder> {
        let r = self.reminder(id)?;
        if !r.is_active || r.trigger_time.is_some_and(|t| t > now) {
            return None;
        }
        self.mark_reminder_fired(id)
    }

    /// Bring `scheduler` in line with stored state: timers for reminders that are gone or
    /// inactive are cancelled, every active one is re-armed from its current trigger time.
    pub fn sync_timers(&self, scheduler: &mut ReminderScheduler, now: DateTime<Utc>) -> usize {
        let active = self.active_reminders();
        for id in scheduler.armed_ids() {
            if !active.iter().any(|r| r.id == id) {
                scheduler.cancel(&id);
            }
        }
        active
            .iter()
            .filter(|r| scheduler.arm(r, now, ArmPolicy::OnReload))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::MemoryStorage;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn store() -> TaskStore<MemoryStorage> {
        TaskStore::open(MemoryStorage::new(), Tz::UTC)
    }

    #[test]
    fn create_update_delete() {
        let mut s = store();
        let t = s.create(TaskDraft::new("draft memo"), now());
        assert_eq!(s.all().len(), 1);

        let updated = s
            .update(
                &t.id,
                TaskPatch {
                    priority: Some(Priority::High),
                    ..TaskPatch::default()
                },
            )
            .unwrap();
        assert_eq!(updated.priority, Priority::High);

        assert!(s.update("missing", TaskPatch::default()).is_none());
        assert!(s.delete(&t.id));
        assert!(!s.delete(&t.id));
        assert!(s.all().is_empty());
    }

    #[test]
    fn complete_defaults_actual_time() {
        let mut s = store();
        let t = s.create(TaskDraft::new("x").with_duration(40), now());
        let done = s.complete(&t.id, now()).unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert_eq!(done.completed_at, Some(now()));
        assert_eq!(done.actual_time_spent, Some(40));
        assert_eq!(s.profile().completion_history.len(), 1);

        // second completion is a no-op
        s.complete(&t.id, now() + Duration::hours(1)).unwrap();
        assert_eq!(s.profile().completion_history.len(), 1);
        assert!(s.complete("missing", now()).is_none());
    }

    #[test]
    fn status_transitions_are_checked() {
        let mut s = store();
        let t = s.create(TaskDraft::new("x"), now());
        s.set_status(&t.id, TaskStatus::Completed, now()).unwrap();

        let err = s.set_status(&t.id, TaskStatus::Delegated, now()).unwrap_err();
        assert!(matches!(err, StatusError::Transition(_)));

        let reopened = s.set_status(&t.id, TaskStatus::Pending, now()).unwrap();
        assert_eq!(reopened.status, TaskStatus::Pending);
        assert!(reopened.completed_at.is_none());

        assert_eq!(
            s.set_status("nope", TaskStatus::Pending, now()).unwrap_err(),
            StatusError::NotFound("nope".to_string())
        );
    }

    #[test]
    fn mutations_persist_and_reload() {
        let storage = MemoryStorage::new();
        let mut s = TaskStore::open(storage.clone(), Tz::UTC);
        let t = s.create(TaskDraft::new("persist me").with_tags(["a", "b"]), now());
        s.complete(&t.id, now()).unwrap();

        let reopened = TaskStore::open(storage, Tz::UTC);
        assert_eq!(reopened.all(), s.all());
        assert_eq!(reopened.profile(), s.profile());
    }

    #[test]
    fn malformed_storage_opens_empty() {
        let s = TaskStore::open(MemoryStorage::with_blob("garbage"), Tz::UTC);
        assert!(s.all().is_empty());
    }

    #[test]
    fn priority_buckets_sort_by_due_date() {
        let mut s = store();
        let later = s.create(
            TaskDraft::new("later")
                .with_priority(Priority::High)
                .with_due_date(now() + Duration::days(3)),
            now(),
        );
        let undated = s.create(TaskDraft::new("undated").with_priority(Priority::High), now());
        let sooner = s.create(
            TaskDraft::new("sooner")
                .with_priority(Priority::High)
                .with_due_date(now() + Duration::days(1)),
            now(),
        );
        s.create(TaskDraft::new("low").with_priority(Priority::Low), now());

        let b = s.tasks_by_priority();
        let ids: Vec<&str> = b.high.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec![sooner.id.as_str(), later.id.as_str(), undated.id.as_str()]);
        assert_eq!(b.low.len(), 1);
        assert!(b.medium.is_empty());
    }

    #[test]
    fn plan_is_cached_until_invalidated() {
        let mut s = store();
        let day = now().date_naive();
        s.create(TaskDraft::new("a").with_due_date(now() + Duration::hours(4)), now());
        let first = s.create_or_get_plan(day);
        assert_eq!(first.scheduled_tasks.len(), 1);

        s.create(TaskDraft::new("b").with_due_date(now() + Duration::hours(4)), now());
        assert_eq!(s.create_or_get_plan(day), first);

        assert!(s.invalidate_plan(day));
        assert_eq!(s.create_or_get_plan(day).scheduled_tasks.len(), 2);
    }

    #[test]
    fn schedule_task_refuses_plan_overlap() {
        let mut s = store();
        let day = now().date_naive();
        s.create(
            TaskDraft::new("planned")
                .with_duration(60)
                .with_due_date(now() + Duration::hours(4)),
            now(),
        );
        s.create_or_get_plan(day);

        let other = s.create(TaskDraft::new("other").with_duration(30), now());
        let at_930 = planner::local_time_on(day, 9, 30, Tz::UTC).unwrap();
        assert!(!s.schedule_task(&other.id, at_930));

        let at_11 = planner::local_time_on(day, 11, 0, Tz::UTC).unwrap();
        assert!(s.schedule_task(&other.id, at_11));
        assert_eq!(s.get(&other.id).unwrap().scheduled_time, Some(at_11));
        assert_eq!(s.daily_plan(day).unwrap().scheduled_tasks.len(), 2);
        assert!(!s.schedule_task("missing", at_11));
    }

    #[test]
    fn suggestion_is_day_before_at_first_peak_hour() {
        let mut s = store();
        let due = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let t = s.create(TaskDraft::new("x").with_due_date(due), now());
        assert_eq!(
            s.suggest_schedule(&t.id),
            Some(Utc.with_ymd_and_hms(2026, 3, 9, 9, 0, 0).unwrap())
        );
        let undated = s.create(TaskDraft::new("y"), now());
        assert_eq!(s.suggest_schedule(&undated.id), None);
    }

    #[test]
    fn reminder_lifecycle() {
        let mut s = store();
        let t = s.create(TaskDraft::new("call dentist"), now());
        assert!(s.create_reminder("missing", ReminderDraft::default(), now()).is_none());

        let r = s
            .create_reminder(&t.id, ReminderDraft::at(now() + Duration::minutes(10)), now())
            .unwrap();
        assert_eq!(r.message, "Reminder: call dentist");
        assert_eq!(s.get(&t.id).unwrap().reminders.len(), 1);
        assert_eq!(s.active_reminders().len(), 1);

        let snoozed = s.snooze_reminder(&r.id, 30, now()).unwrap();
        assert_eq!(snoozed.trigger_time, Some(now() + Duration::minutes(30)));

        assert!(s.mark_reminder_fired(&r.id).is_some());
        assert!(s.mark_reminder_fired(&r.id).is_none());
        assert!(s.active_reminders().is_empty());
        assert!(s.snooze_reminder(&r.id, 5, now()).is_none());
    }

    #[test]
    fn non_time_reminders_stay_active_after_firing() {
        let mut s = store();
        let t = s.create(TaskDraft::new("buy milk"), now());
        let r = s
            .create_reminder(
                &t.id,
                ReminderDraft {
                    kind: Some(ReminderKind::LocationBased),
                    trigger_location: Some("grocery".into()),
                    ..ReminderDraft::default()
                },
                now(),
            )
            .unwrap();
        assert!(s.mark_reminder_fired(&r.id).is_some());
        assert!(s.reminder(&r.id).unwrap().is_active);

        s.dismiss_reminder(&r.id).unwrap();
        assert!(!s.reminder(&r.id).unwrap().is_active);
    }
}
