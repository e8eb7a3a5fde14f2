//! Productivity profile: completion history and the "peak energy hours" ranking.

use std::collections::HashMap;

use chrono::Timelike;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::task::{EnergyLevel, Task};

const HISTORY_CAP: usize = 100;
const MIN_HISTORY_FOR_ANALYSIS: usize = 10;
const PEAK_HOURS_KEPT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkPattern {
    MorningPerson,
    NightOwl,
    Balanced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub task_id: String,
    pub estimated_minutes: u32,
    pub actual_minutes: u32,
    pub energy_used: EnergyLevel,
    /// Local hour of day (0-23) at completion.
    pub hour_of_day: u32,
    pub completed_on_time: bool,
}

impl CompletionRecord {
    /// Estimated / actual. Above 1.0 means the task went faster than planned.
    pub fn efficiency(&self) -> f64 {
        f64::from(self.estimated_minutes) / f64::from(self.actual_minutes.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductivityProfile {
    pub peak_energy_hours: Vec<u32>,
    pub preferred_task_duration: u32,
    pub work_pattern: WorkPattern,
    /// Minutes between breaks.
    pub break_frequency: u32,
    pub focus_session_length: u32,
    #[serde(default)]
    pub completion_history: Vec<CompletionRecord>,
}

impl Default for ProductivityProfile {
    fn default() -> Self {
        Self {
            peak_energy_hours: vec![9, 10, 11, 14, 15],
            preferred_task_duration: 30,
            work_pattern: WorkPattern::Balanced,
            break_frequency: 90,
            focus_session_length: 45,
            completion_history: Vec::new(),
        }
    }
}

impl ProductivityProfile {
    pub fn is_peak_hour(&self, hour: u32) -> bool {
        self.peak_energy_hours.contains(&hour)
    }

    /// Record a completed task and refresh the peak-hour ranking.
    pub fn record_completion(&mut self, task: &Task, tz: Tz) {
        let Some(completed_at) = task.completed_at else {
            return;
        };
        let record = CompletionRecord {
            task_id: task.id.clone(),
            estimated_minutes: task.duration_minutes,
            actual_minutes: task.actual_time_spent.unwrap_or(task.duration_minutes),
            energy_used: task.energy,
            hour_of_day: completed_at.with_timezone(&tz).hour(),
            completed_on_time: task.due_date.map(|due| completed_at <= due).unwrap_or(true),
        };

        self.completion_history.push(record);
        if self.completion_history.len() > HISTORY_CAP {
            let excess = self.completion_history.len() - HISTORY_CAP;
            self.completion_history.drain(..excess);
        }

        self.analyze_peak_hours();
    }

    fn analyze_peak_hours(&mut self) {
        if self.completion_history.len() < MIN_HISTORY_FOR_ANALYSIS {
            return;
        }

        let mut by_hour: HashMap<u32, f64> = HashMap::new();
        for r in &self.completion_history {
            *by_hour.entry(r.hour_of_day).or_default() += r.efficiency();
        }

        let mut ranked: Vec<(u32, f64)> = by_hour.into_iter().collect();
        // Score desc, then hour asc so ties are deterministic.
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        self.peak_energy_hours = ranked
            .into_iter()
            .take(PEAK_HOURS_KEPT)
            .map(|(hour, _)| hour)
            .collect();
        tracing::debug!(peak_hours = ?self.peak_energy_hours, "peak hours updated");
    }
}
