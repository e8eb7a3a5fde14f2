use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::fs;
use std::path::{Path, PathBuf};

use tempo_core::{CalendarEvent, CalendarStore, FileStorage, TaskStore};

/// `$TEMPO_HOME`, else `~/.tempo`.
pub fn tempo_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("TEMPO_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".tempo"))
}

pub fn ensure_tempo_home() -> Result<PathBuf> {
    let dir = tempo_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

/// Tasks, reminders, plans and the productivity profile.
pub fn state_path() -> Result<PathBuf> {
    Ok(ensure_tempo_home()?.join("state.json"))
}

pub fn open_store(tz: Tz) -> Result<TaskStore<FileStorage>> {
    Ok(TaskStore::open(FileStorage::new(state_path()?), tz))
}

pub fn calendar_path() -> Result<PathBuf> {
    Ok(ensure_tempo_home()?.join("calendar.json"))
}

/// Missing or malformed files give an empty calendar.
pub fn read_calendar(path: &Path) -> Result<CalendarStore> {
    if !path.exists() {
        return Ok(CalendarStore::new());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    match serde_json::from_str::<Vec<CalendarEvent>>(&s) {
        Ok(events) => Ok(CalendarStore::from_events(events)),
        Err(e) => {
            tracing::warn!(error = %e, path = %path.display(), "calendar file is malformed; starting empty");
            Ok(CalendarStore::new())
        }
    }
}

pub fn write_calendar(path: &Path, calendar: &CalendarStore) -> Result<()> {
    let json = serde_json::to_string_pretty(calendar.all())?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}
