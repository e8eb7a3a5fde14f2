//! Daily planner: picks a day's tasks, builds histograms, and greedily places them into the
//! working window.
//!
//! Placement rules:
//! - candidates are the day's tasks without a `scheduled_time`
//! - priority weight DESC, stable for ties (input order wins)
//! - the cursor starts at 09:00 local and advances by duration + 15 minutes
//! - the first task that would end after 17:00 stops placement; later (even shorter) tasks
//!   are not tried

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::profile::ProductivityProfile;
use crate::task::{EnergyLevel, Priority, Task, TaskStatus};

pub const WORKDAY_START_HOUR: u32 = 9;
pub const WORKDAY_END_HOUR: u32 = 17;
/// Gap the cursor skips after every placed task.
pub const SLOT_GAP_MINUTES: i64 = 15;
pub const MAX_RECOMMENDATIONS: usize = 5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub high: u32,
    pub medium: u32,
    pub low: u32,
}

impl Distribution {
    fn bump_priority(&mut self, p: Priority) {
        match p {
            Priority::High => self.high += 1,
            Priority::Medium => self.medium += 1,
            Priority::Low => self.low += 1,
        }
    }

    fn bump_energy(&mut self, e: EnergyLevel) {
        match e {
            EnergyLevel::High => self.high += 1,
            EnergyLevel::Medium => self.medium += 1,
            EnergyLevel::Low => self.low += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledSlot {
    pub task_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Suggested slack after the task: 20% of its duration, at most 15 minutes.
    pub buffer_minutes: u32,
}

impl ScheduledSlot {
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        start < self.end && end > self.start
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPlan {
    pub date: NaiveDate,
    pub total_estimated_minutes: u32,
    pub energy_distribution: Distribution,
    pub priority_distribution: Distribution,
    pub scheduled_tasks: Vec<ScheduledSlot>,
    pub unscheduled_tasks: Vec<String>,
}

/// Wall-clock time on `date` in `tz`, as UTC. `None` inside a DST gap.
pub fn local_time_on(date: NaiveDate, hour: u32, minute: u32, tz: Tz) -> Option<DateTime<Utc>> {
    let time = NaiveTime::from_hms_opt(hour, minute, 0)?;
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

fn local_date(at: DateTime<Utc>, tz: Tz) -> NaiveDate {
    at.with_timezone(&tz).date_naive()
}

/// Non-completed tasks that belong to `date`: by due date when set, otherwise by scheduled time.
pub fn tasks_for_date<'a>(tasks: &'a [Task], date: NaiveDate, tz: Tz) -> Vec<&'a Task> {
    tasks
        .iter()
        .filter(|t| t.status != TaskStatus::Completed)
        .filter(|t| match (t.due_date, t.scheduled_time) {
            (Some(due), _) => local_date(due, tz) == date,
            (None, Some(at)) => local_date(at, tz) == date,
            (None, None) => false,
        })
        .collect()
}

/// Greedy placement into the 09:00-17:00 window of `date`.
pub fn auto_schedule(tasks: &[&Task], date: NaiveDate, tz: Tz) -> Vec<ScheduledSlot> {
    let (Some(window_start), Some(window_end)) = (
        local_time_on(date, WORKDAY_START_HOUR, 0, tz),
        local_time_on(date, WORKDAY_END_HOUR, 0, tz),
    ) else {
        tracing::warn!(%date, %tz, "working window falls in a DST gap; nothing scheduled");
        return Vec::new();
    };

    let mut candidates: Vec<&Task> = tasks
        .iter()
        .copied()
        .filter(|t| t.scheduled_time.is_none())
        .collect();
    // sort_by is stable: equal weights keep input order.
    candidates.sort_by(|a, b| b.priority.weight().cmp(&a.priority.weight()));

    let mut scheduled = Vec::new();
    let mut cursor = window_start;

    for t in candidates {
        let end = cursor + Duration::minutes(i64::from(t.duration_minutes));
        if end > window_end {
            break;
        }
        scheduled.push(ScheduledSlot {
            task_id: t.id.clone(),
            start: cursor,
            end,
            buffer_minutes: (t.duration_minutes / 5).min(15),
        });
        cursor = end + Duration::minutes(SLOT_GAP_MINUTES);
    }

    scheduled
}

/// Compute a fresh plan for `date`. Caching lives in the store.
pub fn build_daily_plan(tasks: &[Task], date: NaiveDate, tz: Tz) -> DailyPlan {
    let day_tasks = tasks_for_date(tasks, date, tz);
    let scheduled_tasks = auto_schedule(&day_tasks, date, tz);

    let mut energy_distribution = Distribution::default();
    let mut priority_distribution = Distribution::default();
    for t in &day_tasks {
        energy_distribution.bump_energy(t.energy);
        priority_distribution.bump_priority(t.priority);
    }

    let unscheduled_tasks = day_tasks
        .iter()
        .filter(|t| !scheduled_tasks.iter().any(|s| s.task_id == t.id))
        .map(|t| t.id.clone())
        .collect();

    DailyPlan {
        date,
        total_estimated_minutes: day_tasks.iter().map(|t| t.duration_minutes).sum(),
        energy_distribution,
        priority_distribution,
        scheduled_tasks,
        unscheduled_tasks,
    }
}

/// Up to five pending, unscheduled tasks suited to the declared energy level at `hour`.
///
/// During a peak hour a medium or high declaration is treated as high. A low declaration
/// accepts every task; high and medium targets only accept exact matches.
pub fn recommend<'a>(
    tasks: &'a [Task],
    declared: EnergyLevel,
    hour: u32,
    profile: &ProductivityProfile,
) -> Vec<&'a Task> {
    let target = if profile.is_peak_hour(hour) && declared != EnergyLevel::Low {
        EnergyLevel::High
    } else {
        declared
    };

    let mut out: Vec<&Task> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending && t.scheduled_time.is_none())
        .filter(|t| target == EnergyLevel::Low || t.energy == target)
        .collect();

    out.sort_by(|a, b| {
        b.priority
            .weight()
            .cmp(&a.priority.weight())
            .then_with(|| (b.energy == declared).cmp(&(a.energy == declared)))
    });
    out.truncate(MAX_RECOMMENDATIONS);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::TaskDraft;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn due_today(id: &str, priority: Priority, minutes: u32) -> Task {
        TaskDraft::new(id)
            .with_priority(priority)
            .with_duration(minutes)
            .with_due_date(local_time_on(day(), 20, 0, Tz::UTC).unwrap())
            .into_task(id.to_string(), Utc::now())
    }

    #[test]
    fn places_by_priority_with_gap() {
        let tasks = vec![
            due_today("low", Priority::Low, 30),
            due_today("high", Priority::High, 60),
            due_today("med", Priority::Medium, 30),
        ];
        let plan = build_daily_plan(&tasks, day(), Tz::UTC);

        let order: Vec<&str> = plan.scheduled_tasks.iter().map(|s| s.task_id.as_str()).collect();
        assert_eq!(order, vec!["high", "med", "low"]);

        let first = &plan.scheduled_tasks[0];
        assert_eq!(first.start, local_time_on(day(), 9, 0, Tz::UTC).unwrap());
        assert_eq!(first.end, local_time_on(day(), 10, 0, Tz::UTC).unwrap());
        assert_eq!(first.buffer_minutes, 12);
        // 10:00 end + 15 min gap
        assert_eq!(
            plan.scheduled_tasks[1].start,
            local_time_on(day(), 10, 15, Tz::UTC).unwrap()
        );
        assert_eq!(plan.total_estimated_minutes, 120);
        assert_eq!(plan.priority_distribution, Distribution { high: 1, medium: 1, low: 1 });
        assert!(plan.unscheduled_tasks.is_empty());
    }

    #[test]
    fn stops_at_first_task_past_five_pm() {
        let tasks = vec![
            due_today("long", Priority::High, 7 * 60),
            due_today("too-long", Priority::Medium, 60),
            due_today("short", Priority::Low, 10),
        ];
        let plan = build_daily_plan(&tasks, day(), Tz::UTC);

        // 09:00-16:00, cursor 16:15, 60 min ends 17:15 > 17:00 -> stop; "short" is not tried.
        assert_eq!(plan.scheduled_tasks.len(), 1);
        assert_eq!(plan.unscheduled_tasks, vec!["too-long".to_string(), "short".to_string()]);
    }

    #[test]
    fn task_ending_exactly_at_five_fits() {
        let tasks = vec![due_today("all-day", Priority::High, 8 * 60)];
        let plan = build_daily_plan(&tasks, day(), Tz::UTC);
        assert_eq!(plan.scheduled_tasks.len(), 1);
        assert_eq!(
            plan.scheduled_tasks[0].end,
            local_time_on(day(), 17, 0, Tz::UTC).unwrap()
        );
    }

    #[test]
    fn ties_keep_input_order() {
        let tasks = vec![
            due_today("a", Priority::Medium, 15),
            due_today("b", Priority::Medium, 15),
            due_today("c", Priority::Medium, 15),
        ];
        let plan = build_daily_plan(&tasks, day(), Tz::UTC);
        let order: Vec<&str> = plan.scheduled_tasks.iter().map(|s| s.task_id.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn completed_and_other_days_are_excluded() {
        let mut done = due_today("done", Priority::High, 30);
        done.status = TaskStatus::Completed;
        let other_day = TaskDraft::new("later")
            .with_due_date(local_time_on(day().succ_opt().unwrap(), 9, 0, Tz::UTC).unwrap())
            .into_task("later".to_string(), Utc::now());
        let by_schedule = TaskDraft::new("booked")
            .with_scheduled_time(local_time_on(day(), 13, 0, Tz::UTC).unwrap())
            .into_task("booked".to_string(), Utc::now());

        let tasks = vec![done, other_day, by_schedule];
        let day_tasks = tasks_for_date(&tasks, day(), Tz::UTC);
        let ids: Vec<&str> = day_tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["booked"]);

        // Already booked tasks are not auto-placed.
        let plan = build_daily_plan(&tasks, day(), Tz::UTC);
        assert!(plan.scheduled_tasks.is_empty());
        assert_eq!(plan.unscheduled_tasks, vec!["booked".to_string()]);
    }

    #[test]
    fn local_date_uses_timezone() {
        let tz: Tz = "America/Chicago".parse().unwrap();
        // 2026-03-03 03:00 UTC is still 2026-03-02 in Chicago.
        let due = Utc.with_ymd_and_hms(2026, 3, 3, 3, 0, 0).unwrap();
        let t = TaskDraft::new("x").with_due_date(due).into_task("x".into(), Utc::now());
        let tasks = vec![t];
        assert_eq!(tasks_for_date(&tasks, day(), tz).len(), 1);
        assert_eq!(tasks_for_date(&tasks, day(), Tz::UTC).len(), 0);
    }

    fn pending(id: &str, priority: Priority, energy: EnergyLevel) -> Task {
        TaskDraft::new(id)
            .with_priority(priority)
            .with_energy(energy)
            .into_task(id.to_string(), Utc::now())
    }

    #[test]
    fn recommendations_upgrade_in_peak_hour() {
        let tasks = vec![
            pending("m", Priority::High, EnergyLevel::Medium),
            pending("h", Priority::Low, EnergyLevel::High),
        ];
        let profile = ProductivityProfile::default();

        let at_peak = recommend(&tasks, EnergyLevel::Medium, 10, &profile);
        assert_eq!(at_peak.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["h"]);

        let off_peak = recommend(&tasks, EnergyLevel::Medium, 20, &profile);
        assert_eq!(off_peak.iter().map(|t| t.id.as_str()).collect::<Vec<_>>(), vec!["m"]);
    }

    #[test]
    fn low_energy_accepts_everything_and_prefers_exact_match() {
        let tasks = vec![
            pending("a", Priority::Medium, EnergyLevel::High),
            pending("b", Priority::Medium, EnergyLevel::Low),
            pending("c", Priority::High, EnergyLevel::Medium),
        ];
        let out = recommend(&tasks, EnergyLevel::Low, 10, &ProductivityProfile::default());
        let ids: Vec<&str> = out.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
    }

    #[test]
    fn recommendations_cap_at_five_and_skip_scheduled() {
        let mut tasks: Vec<Task> = (0..8)
            .map(|i| pending(&format!("t{i}"), Priority::Low, EnergyLevel::Low))
            .collect();
        tasks[0].scheduled_time = Some(Utc::now());
        let out = recommend(&tasks, EnergyLevel::Low, 3, &ProductivityProfile::default());
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|t| t.id != "t0"));
    }
}
