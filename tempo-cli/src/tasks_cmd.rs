use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Subcommand, ValueEnum};

use tempo_core::time::parse_local_deadline_to_utc;
use tempo_core::{
    DailyPlan, EnergyLevel, FileStorage, Priority, StatusError, Task, TaskDraft, TaskPatch,
    TaskStatus, TaskStore,
};

use crate::config::load_config;
use crate::state::open_store;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PriorityArg {
    High,
    Medium,
    Low,
}

impl From<PriorityArg> for Priority {
    fn from(p: PriorityArg) -> Self {
        match p {
            PriorityArg::High => Priority::High,
            PriorityArg::Medium => Priority::Medium,
            PriorityArg::Low => Priority::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum EnergyArg {
    High,
    Medium,
    Low,
}

impl From<EnergyArg> for EnergyLevel {
    fn from(e: EnergyArg) -> Self {
        match e {
            EnergyArg::High => EnergyLevel::High,
            EnergyArg::Medium => EnergyLevel::Medium,
            EnergyArg::Low => EnergyLevel::Low,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    InProgress,
    Completed,
    Delegated,
}

impl From<StatusArg> for TaskStatus {
    fn from(s: StatusArg) -> Self {
        match s {
            StatusArg::Pending => TaskStatus::Pending,
            StatusArg::InProgress => TaskStatus::InProgress,
            StatusArg::Completed => TaskStatus::Completed,
            StatusArg::Delegated => TaskStatus::Delegated,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum TaskCommand {
    /// Create a task
    Add {
        title: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,

        #[arg(long, value_enum)]
        energy: Option<EnergyArg>,

        /// Estimated minutes (default 30)
        #[arg(long)]
        duration: Option<u32>,

        #[arg(long)]
        category: Option<String>,

        /// Local deadline, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        due: Option<String>,

        /// Comma-separated
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Pending tasks grouped by priority
    List {
        /// Include completed and delegated tasks
        #[arg(long, default_value_t = false)]
        all: bool,
    },

    /// Mark a task completed
    Done { id: String },

    /// Move a task to another status
    Status {
        id: String,
        #[arg(value_enum)]
        status: StatusArg,
    },

    /// Change task fields
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        #[arg(long, value_enum)]
        energy: Option<EnergyArg>,
        #[arg(long)]
        duration: Option<u32>,
        #[arg(long)]
        due: Option<String>,
        /// Minutes actually spent
        #[arg(long)]
        spent: Option<u32>,
    },

    Delete { id: String },

    /// Book a task at a local time, "YYYY-MM-DD HH:MM"
    Schedule { id: String, at: String },

    /// Suggest a start time for a task with a due date
    Suggest { id: String },
}

pub fn run(cmd: TaskCommand) -> Result<()> {
    let tz = load_config()?.timezone()?;
    let mut store = open_store(tz)?;
    let now = Utc::now();

    match cmd {
        TaskCommand::Add {
            title,
            description,
            priority,
            energy,
            duration,
            category,
            due,
            tags,
        } => {
            if title.trim().is_empty() {
                bail!("task title must not be empty");
            }
            let mut draft = TaskDraft::new(title).with_tags(tags);
            draft.description = description;
            draft.priority = priority.map(Into::into);
            draft.energy = energy.map(Into::into);
            draft.duration_minutes = duration;
            draft.category = category;
            draft.due_date = due.as_deref().map(|d| parse_local_deadline_to_utc(d, tz)).transpose()?;

            let task = store.create(draft, now);
            println!("Created {}", task.id);
            print_task(&task, tz);
            if let Some(at) = store.suggest_schedule(&task.id) {
                println!("Suggested start: {}", local(at, tz));
            }
        }

        TaskCommand::List { all } => {
            if all {
                for t in store.all() {
                    print_task(t, tz);
                }
                return Ok(());
            }
            let buckets = store.tasks_by_priority();
            for (label, tasks) in [
                ("High", &buckets.high),
                ("Medium", &buckets.medium),
                ("Low", &buckets.low),
            ] {
                if tasks.is_empty() {
                    continue;
                }
                println!("## {label}");
                for t in tasks {
                    print_task(t, tz);
                }
                println!();
            }
        }

        TaskCommand::Done { id } => {
            let task = store
                .complete(&id, now)
                .with_context(|| format!("task not found: {id}"))?;
            println!("Completed: {}", task.title);
        }

        TaskCommand::Status { id, status } => match store.set_status(&id, status.into(), now) {
            Ok(task) => println!("{} -> {:?}", task.title, task.status),
            Err(StatusError::NotFound(id)) => bail!("task not found: {id}"),
            Err(e) => bail!(e),
        },

        TaskCommand::Update {
            id,
            title,
            description,
            priority,
            energy,
            duration,
            due,
            spent,
        } => {
            let patch = TaskPatch {
                title,
                description,
                priority: priority.map(Into::into),
                energy: energy.map(Into::into),
                duration_minutes: duration,
                due_date: due.as_deref().map(|d| parse_local_deadline_to_utc(d, tz)).transpose()?,
                actual_time_spent: spent,
                ..TaskPatch::default()
            };
            let task = store
                .update(&id, patch)
                .with_context(|| format!("task not found: {id}"))?;
            print_task(&task, tz);
        }

        TaskCommand::Delete { id } => {
            if !store.delete(&id) {
                bail!("task not found: {id}");
            }
            println!("Deleted {id}");
        }

        TaskCommand::Schedule { id, at } => {
            let start = parse_local_deadline_to_utc(&at, tz)?;
            if store.get(&id).is_none() {
                bail!("task not found: {id}");
            }
            if !store.schedule_task(&id, start) {
                bail!("{at} overlaps something already planned that day");
            }
            println!("Scheduled {id} at {}", local(start, tz));
        }

        TaskCommand::Suggest { id } => match store.suggest_schedule(&id) {
            Some(at) => println!("Suggested start: {}", local(at, tz)),
            None => println!("No suggestion (unknown task or no due date)."),
        },
    }
    Ok(())
}

pub fn plan(date: Option<String>, refresh: bool) -> Result<()> {
    let tz = load_config()?.timezone()?;
    let mut store = open_store(tz)?;
    let date = match date {
        Some(d) => NaiveDate::parse_from_str(d.trim(), "%Y-%m-%d")
            .with_context(|| format!("invalid date '{d}' (expected YYYY-MM-DD)"))?,
        None => Utc::now().with_timezone(&tz).date_naive(),
    };
    if refresh {
        store.invalidate_plan(date);
    }
    let plan = store.create_or_get_plan(date);
    print_plan(&store, &plan, tz);
    Ok(())
}

pub fn recommend(energy: EnergyArg) -> Result<()> {
    let tz = load_config()?.timezone()?;
    let store = open_store(tz)?;
    let picks = store.recommendations(energy.into(), Utc::now());
    if picks.is_empty() {
        println!("Nothing pending fits that energy level.");
        return Ok(());
    }
    for t in &picks {
        print_task(t, tz);
    }
    Ok(())
}

fn local(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string()
}

fn print_task(t: &Task, tz: Tz) {
    let due = t
        .due_date
        .map(|d| format!(" | due {}", local(d, tz)))
        .unwrap_or_default();
    println!(
        "- {} [{:?}/{:?}] {} ({} min, {:?}){due}",
        t.id, t.priority, t.energy, t.title, t.duration_minutes, t.status
    );
}

fn print_plan(store: &TaskStore<FileStorage>, plan: &DailyPlan, tz: Tz) {
    println!("# Plan for {}\n", plan.date);
    println!(
        "Estimated: {} min | priority h/m/l {}/{}/{} | energy h/m/l {}/{}/{}\n",
        plan.total_estimated_minutes,
        plan.priority_distribution.high,
        plan.priority_distribution.medium,
        plan.priority_distribution.low,
        plan.energy_distribution.high,
        plan.energy_distribution.medium,
        plan.energy_distribution.low,
    );
    let title = |id: &str| store.get(id).map(|t| t.title.clone()).unwrap_or_else(|| id.to_string());

    for s in &plan.scheduled_tasks {
        println!(
            "{}-{}  {} (+{} min buffer)",
            s.start.with_timezone(&tz).format("%H:%M"),
            s.end.with_timezone(&tz).format("%H:%M"),
            title(&s.task_id),
            s.buffer_minutes
        );
    }
    if !plan.unscheduled_tasks.is_empty() {
        println!("\nDid not fit:");
        for id in &plan.unscheduled_tasks {
            println!("- {}", title(id));
        }
    }
}
