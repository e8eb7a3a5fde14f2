use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use clap::Subcommand;

use tempo_core::time::parse_local_deadline_to_utc;
use tempo_core::{ArmPolicy, ReminderDraft, ReminderScheduler};

use crate::config::load_config;
use crate::state::open_store;

#[derive(Subcommand, Debug)]
pub enum RemindCommand {
    /// Attach a time-based reminder to a task
    Add {
        task_id: String,

        /// Local time, "YYYY-MM-DD HH:MM"
        #[arg(long, conflicts_with = "in_minutes")]
        at: Option<String>,

        /// Minutes from now
        #[arg(long = "in")]
        in_minutes: Option<u32>,

        /// Defaults to "Reminder: <task title>"
        #[arg(long)]
        message: Option<String>,
    },

    /// Active reminders
    List,

    /// Push a reminder back
    Snooze {
        id: String,
        #[arg(long, default_value_t = 10)]
        minutes: u32,
    },

    Dismiss { id: String },
}

pub fn run(cmd: RemindCommand) -> Result<()> {
    let tz = load_config()?.timezone()?;
    let mut store = open_store(tz)?;
    let now = Utc::now();

    match cmd {
        RemindCommand::Add {
            task_id,
            at,
            in_minutes,
            message,
        } => {
            let trigger = match (at, in_minutes) {
                (Some(at), _) => parse_local_deadline_to_utc(&at, tz)?,
                (None, Some(m)) => now + Duration::minutes(i64::from(m)),
                (None, None) => bail!("pass --at or --in"),
            };
            if trigger <= now {
                bail!("reminder time is in the past");
            }
            let mut draft = ReminderDraft::at(trigger);
            if let Some(m) = message {
                draft = draft.with_message(m);
            }
            let r = store
                .create_reminder(&task_id, draft, now)
                .with_context(|| format!("task not found: {task_id}"))?;
            println!(
                "Reminder {} at {} (delivered by `tempo run`)",
                r.id,
                trigger.with_timezone(&tz).format("%Y-%m-%d %H:%M")
            );
        }

        RemindCommand::List => {
            let mut active = store.active_reminders();
            active.sort_by_key(|r| r.trigger_time);
            if active.is_empty() {
                println!("No active reminders.");
            }
            for r in active {
                let at = r
                    .trigger_time
                    .map(|t| t.with_timezone(&tz).format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!("- {} {at} [{}] {}", r.id, r.task_id, r.message);
            }
        }

        RemindCommand::Snooze { id, minutes } => {
            let r = store
                .snooze_reminder(&id, minutes, now)
                .with_context(|| format!("no active reminder {id}"))?;
            if let Some(t) = r.trigger_time {
                println!("Snoozed until {}", t.with_timezone(&tz).format("%H:%M"));
            }
        }

        RemindCommand::Dismiss { id } => {
            store
                .dismiss_reminder(&id)
                .with_context(|| format!("reminder not found: {id}"))?;
            println!("Dismissed {id}");
        }
    }
    Ok(())
}

/// How often the delivery loop re-reads state for reminders added or snoozed elsewhere.
const RESYNC_SECS: u64 = 30;

/// Foreground delivery loop. Other `tempo` invocations keep editing `state.json` while this
/// runs, so state is re-read before every delivery and on a fixed interval; timers follow it.
/// Overdue reminders fire right away. Stops on Ctrl-C.
pub async fn run_daemon() -> Result<()> {
    let tz = load_config()?.timezone()?;
    let mut store = open_store(tz)?;
    let (mut scheduler, mut fired) = ReminderScheduler::new();

    let armed = store.rearm_reminders(&mut scheduler, Utc::now());
    println!("Watching {armed} reminder(s). Ctrl-C to stop.");

    let mut resync = tokio::time::interval(std::time::Duration::from_secs(RESYNC_SECS));
    resync.tick().await;

    loop {
        tokio::select! {
            msg = fired.recv() => {
                let Some(msg) = msg else { break };
                store.reload();
                let now = Utc::now();
                match store.deliver_reminder(&msg.reminder_id, now) {
                    Some(r) => {
                        scheduler.cancel(&r.id);
                        println!("\x07[{}] {}", now.with_timezone(&tz).format("%H:%M"), r.message);
                        tracing::info!(reminder_id = %r.id, task_id = %r.task_id, "reminder delivered");
                    }
                    None => match store.reminder(&msg.reminder_id) {
                        Some(r) if r.is_active => {
                            scheduler.arm(r, now, ArmPolicy::OnCreate);
                        }
                        _ => {
                            scheduler.cancel(&msg.reminder_id);
                        }
                    },
                }
            }
            _ = resync.tick() => {
                store.reload();
                let armed = store.sync_timers(&mut scheduler, Utc::now());
                tracing::debug!(armed, "reminder timers resynced");
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping reminder loop");
                break;
            }
        }
    }
    Ok(())
}
