use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use chrono_tz::Tz;
use clap::Subcommand;
use uuid::Uuid;

use tempo_core::time::parse_local_deadline_to_utc;
use tempo_core::{CalendarEvent, CalendarProvider, ConflictDetection, meeting_prep};

use crate::calendar::{sync, token_for};
use crate::config::load_config;
use crate::llm::GeminiClient;
use crate::state::{calendar_path, read_calendar, write_calendar};

#[derive(Subcommand, Debug)]
pub enum CalendarCommand {
    /// Add a local event (refused when it hard-conflicts)
    Add {
        title: String,

        /// Local start, "YYYY-MM-DD HH:MM"
        #[arg(long)]
        start: String,

        #[arg(long, default_value_t = 60, value_parser = minutes_range())]
        minutes: i64,

        #[arg(long)]
        location: Option<String>,

        #[arg(long)]
        description: Option<String>,

        /// Add even when the conflict check reports an error
        #[arg(long, default_value_t = false)]
        force: bool,
    },

    /// Events between two local dates (inclusive start bounds)
    List {
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },

    /// Events starting in the next N hours
    Upcoming {
        #[arg(long, default_value_t = 24, value_parser = clap::value_parser!(i64).range(1..=MAX_HOURS_AHEAD))]
        hours: i64,
    },

    /// Conflict check for a prospective event without saving it
    Check {
        /// Titles drive preparation time (interview, presentation, review, standup)
        #[arg(long, default_value = "New event")]
        title: String,
        #[arg(long)]
        start: String,
        #[arg(long, default_value_t = 60, value_parser = minutes_range())]
        minutes: i64,
        #[arg(long)]
        location: Option<String>,
    },

    Remove { id: String },

    /// Pull events from connected providers (all with a token if none given)
    Sync {
        #[arg(long)]
        provider: Option<String>,
    },

    /// Preparation checklist for an event
    Prep { id: String },
}

/// One week; longer events are not something this calendar books.
const MAX_EVENT_MINUTES: i64 = 7 * 24 * 60;
/// One year.
const MAX_HOURS_AHEAD: i64 = 366 * 24;

fn minutes_range() -> clap::builder::RangedI64ValueParser<i64> {
    clap::value_parser!(i64).range(1..=MAX_EVENT_MINUTES)
}

pub async fn run(cmd: CalendarCommand) -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.timezone()?;
    let path = calendar_path()?;
    let mut calendar = read_calendar(&path)?;
    let now = Utc::now();

    match cmd {
        CalendarCommand::Add {
            title,
            start,
            minutes,
            location,
            description,
            force,
        } => {
            let mut event = candidate(&start, minutes, location, tz)?;
            event.id = format!("local_{}", Uuid::new_v4().simple());
            event.title = title;
            event.description = description;

            let detection = calendar.detect_conflicts(&event);
            print_detection(&detection);
            if detection.severity == tempo_core::Severity::Error && !force {
                bail!("not added; pass --force to keep it anyway");
            }
            println!("Added {} ({})", event.id, event.title);
            calendar.add(event);
            write_calendar(&path, &calendar)?;
        }

        CalendarCommand::List { from, to } => {
            let from = from.as_deref().map(|s| parse_local_deadline_to_utc(s, tz)).transpose()?;
            let to = to.as_deref().map(|s| parse_local_deadline_to_utc(s, tz)).transpose()?;
            print_events(&calendar.events(from, to), tz);
        }

        CalendarCommand::Upcoming { hours } => {
            print_events(&calendar.upcoming(hours, now), tz);
        }

        CalendarCommand::Check {
            title,
            start,
            minutes,
            location,
        } => {
            let mut event = candidate(&start, minutes, location, tz)?;
            event.title = title;
            print_detection(&calendar.detect_conflicts(&event));
        }

        CalendarCommand::Remove { id } => {
            if !calendar.remove(&id) {
                bail!("event not found: {id}");
            }
            write_calendar(&path, &calendar)?;
            println!("Removed {id}");
        }

        CalendarCommand::Sync { provider } => {
            let providers = match provider {
                Some(p) => vec![p.parse::<CalendarProvider>().map_err(anyhow::Error::msg)?],
                None => vec![CalendarProvider::Google, CalendarProvider::Outlook],
            };
            let client = reqwest::Client::new();
            let mut synced = 0;
            for p in providers {
                let Some(token) = token_for(&cfg.calendar, p) else {
                    println!("{}: no token in config.toml [calendar]", p.name());
                    continue;
                };
                if sync(&client, &mut calendar, p, token).await {
                    synced += 1;
                    println!("{}: synced", p.name());
                } else {
                    println!("{}: sync failed (see log)", p.name());
                }
            }
            if synced > 0 {
                write_calendar(&path, &calendar)?;
            }
        }

        CalendarCommand::Prep { id } => {
            let event = calendar
                .get(&id)
                .cloned()
                .with_context(|| format!("event not found: {id}"))?;
            let generator = GeminiClient::from_config(&cfg);
            let prep = meeting_prep::prepare(&event, &generator, tz).await;

            println!("# {}\n", prep.event.title);
            println!(
                "Arrive by {}",
                prep.suggested_arrival.with_timezone(&tz).format("%Y-%m-%d %H:%M")
            );
            if let Some(t) = &prep.travel_instructions {
                println!("{t}");
            }
            println!("\n## Tasks");
            for t in &prep.preparation_tasks {
                println!(
                    "- [{:?}] {} ({} min, by {})",
                    t.priority,
                    t.title,
                    t.estimated_minutes,
                    t.due.with_timezone(&tz).format("%H:%M")
                );
            }
            println!("\n## Bring");
            for d in &prep.documents_needed {
                println!("- {d}");
            }
            println!("\n## Key points");
            for k in &prep.key_points {
                println!("- {k}");
            }
        }
    }
    Ok(())
}

fn candidate(start: &str, minutes: i64, location: Option<String>, tz: Tz) -> Result<CalendarEvent> {
    if !(1..=MAX_EVENT_MINUTES).contains(&minutes) {
        bail!("--minutes must be between 1 and {MAX_EVENT_MINUTES}");
    }
    let start = parse_local_deadline_to_utc(start, tz)?;
    let mut event = CalendarEvent::new("candidate", "New event", start, start + Duration::minutes(minutes));
    event.location = location;
    Ok(event)
}

fn print_detection(d: &ConflictDetection) {
    if !d.has_conflict {
        println!("No conflicts.");
        return;
    }
    println!("{:?} ({:?}):", d.severity, d.kind);
    for e in &d.conflicts {
        println!("- {} ({})", e.title, e.id);
    }
    println!("{}", d.suggestion);
}

fn print_events(events: &[CalendarEvent], tz: Tz) {
    if events.is_empty() {
        println!("No events.");
        return;
    }
    for e in events {
        let place = e
            .location
            .as_deref()
            .map(|l| format!(" @ {l}"))
            .unwrap_or_default();
        println!(
            "{}-{}  {}{place}  [{}]",
            e.start.with_timezone(&tz).format("%a %m-%d %H:%M"),
            e.end.with_timezone(&tz).format("%H:%M"),
            e.title,
            e.id
        );
    }
}
