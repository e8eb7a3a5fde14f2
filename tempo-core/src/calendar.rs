//! Calendar events and the in-memory calendar store.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::conflicts::{self, ConflictDetection};
use crate::task::{EnergyLevel, Priority};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    Standup,
    Review,
    Planning,
    Social,
    Interview,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    #[serde(default)]
    pub meeting_type: Option<MeetingType>,
    /// Minutes of preparation needed before the event.
    #[serde(default)]
    pub preparation_minutes: Option<u32>,
    /// Minutes of travel needed to get there.
    #[serde(default)]
    pub travel_minutes: Option<u32>,
    #[serde(default)]
    pub energy: Option<EnergyLevel>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub is_all_day: bool,
    pub status: EventStatus,
    pub priority: Priority,
    /// Minutes before start.
    #[serde(default)]
    pub reminders: Vec<u32>,
    #[serde(default)]
    pub metadata: Option<EventMetadata>,
}

impl CalendarEvent {
    /// A confirmed, medium-priority event. `start < end` is assumed, not checked.
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: None,
            start,
            end,
            location: None,
            attendees: Vec::new(),
            is_all_day: false,
            status: EventStatus::Confirmed,
            priority: Priority::Medium,
            reminders: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_attendees<I, S>(mut self, attendees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attendees = attendees.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.status == EventStatus::Cancelled
    }

    pub fn overlaps(&self, other: &CalendarEvent) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalendarProvider {
    Google,
    Outlook,
}

impl CalendarProvider {
    pub fn name(self) -> &'static str {
        match self {
            CalendarProvider::Google => "google",
            CalendarProvider::Outlook => "outlook",
        }
    }

    /// Every event ingested from this provider has an id starting with this prefix.
    pub fn id_prefix(self) -> String {
        format!("{}_", self.name())
    }

    pub fn events_url(self) -> &'static str {
        match self {
            CalendarProvider::Google => {
                "https://www.googleapis.com/calendar/v3/calendars/primary/events"
            }
            CalendarProvider::Outlook => "https://graph.microsoft.com/v1.0/me/events",
        }
    }
}

impl std::str::FromStr for CalendarProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "google" => Ok(CalendarProvider::Google),
            "outlook" | "microsoft" => Ok(CalendarProvider::Outlook),
            other => Err(format!("unknown calendar provider '{other}' (google|outlook)")),
        }
    }
}

/// Events kept sorted by start time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalendarStore {
    events: Vec<CalendarEvent>,
    connected: BTreeSet<CalendarProvider>,
}

impl CalendarStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(mut events: Vec<CalendarEvent>) -> Self {
        events.sort_by_key(|e| e.start);
        Self {
            events,
            connected: BTreeSet::new(),
        }
    }

    /// Every stored event, cancelled ones included, in start order.
    pub fn all(&self) -> &[CalendarEvent] {
        &self.events
    }

    pub fn get(&self, id: &str) -> Option<&CalendarEvent> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Non-cancelled events whose start falls within the optional bounds (both inclusive).
    pub fn events(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Vec<CalendarEvent> {
        self.events
            .iter()
            .filter(|e| !e.is_cancelled())
            .filter(|e| start.is_none_or(|s| e.start >= s))
            .filter(|e| end.is_none_or(|x| e.start <= x))
            .cloned()
            .collect()
    }

    /// Non-cancelled events starting within `[now, now + hours_ahead]`. A horizon past the
    /// representable range is unbounded.
    pub fn upcoming(&self, hours_ahead: i64, now: DateTime<Utc>) -> Vec<CalendarEvent> {
        let until = Duration::try_hours(hours_ahead).and_then(|d| now.checked_add_signed(d));
        self.events(Some(now), until)
    }

    pub fn next_event(&self, now: DateTime<Utc>) -> Option<&CalendarEvent> {
        self.events
            .iter()
            .find(|e| !e.is_cancelled() && e.start >= now)
    }

    /// Insert keeping start order; events with equal start keep insertion order.
    pub fn add(&mut self, event: CalendarEvent) {
        let idx = self.events.partition_point(|e| e.start <= event.start);
        tracing::debug!(event_id = %event.id, "calendar event added");
        self.events.insert(idx, event);
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        self.events.len() != before
    }

    /// Replace everything previously ingested from `provider` with `events`, then re-sort.
    pub fn ingest(&mut self, provider: CalendarProvider, events: Vec<CalendarEvent>) {
        let prefix = provider.id_prefix();
        self.events.retain(|e| !e.id.starts_with(&prefix));
        let count = events.len();
        self.events.extend(events);
        self.events.sort_by_key(|e| e.start);
        self.connected.insert(provider);
        tracing::info!(provider = provider.name(), count, "calendar events ingested");
    }

    pub fn connected_providers(&self) -> Vec<CalendarProvider> {
        self.connected.iter().copied().collect()
    }

    pub fn detect_conflicts(&self, candidate: &CalendarEvent) -> ConflictDetection {
        conflicts::detect_conflicts(candidate, &self.events)
    }
}
