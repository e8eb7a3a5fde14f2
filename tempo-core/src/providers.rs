//! Mapping external calendar payloads into [`CalendarEvent`].

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;

use crate::calendar::{CalendarEvent, CalendarProvider, EventStatus};
use crate::task::Priority;

const DEFAULT_REMINDER_MINUTES: u32 = 15;
const UNTITLED: &str = "Untitled Event";

/// Map a provider's list response. Items without a usable id or time are skipped.
pub fn parse_events(provider: CalendarProvider, body: &str) -> Result<Vec<CalendarEvent>, serde_json::Error> {
    let events = match provider {
        CalendarProvider::Google => {
            let list: GoogleList = serde_json::from_str(body)?;
            list.items.into_iter().filter_map(GoogleEvent::into_event).collect()
        }
        CalendarProvider::Outlook => {
            let list: OutlookList = serde_json::from_str(body)?;
            list.value.into_iter().filter_map(OutlookEvent::into_event).collect()
        }
    };
    Ok(events)
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Graph returns naive local datetimes with fractional seconds; treat them as UTC.
    if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(ndt.and_utc());
    }
    let d = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(d.and_hms_opt(0, 0, 0)?.and_utc())
}

#[derive(Debug, Default, Deserialize)]
struct GoogleList {
    #[serde(default)]
    items: Vec<GoogleEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleTime {
    date_time: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleAttendee {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleOverride {
    minutes: u32,
}

#[derive(Debug, Default, Deserialize)]
struct GoogleReminders {
    #[serde(default)]
    overrides: Vec<GoogleOverride>,
}

#[derive(Debug, Deserialize)]
struct GoogleEvent {
    id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    #[serde(default)]
    start: GoogleTime,
    #[serde(default)]
    end: GoogleTime,
    location: Option<String>,
    #[serde(default)]
    attendees: Vec<GoogleAttendee>,
    status: Option<String>,
    reminders: Option<GoogleReminders>,
}

impl GoogleEvent {
    fn into_event(self) -> Option<CalendarEvent> {
        let Some(id) = self.id else {
            tracing::warn!("skipping google event without id");
            return None;
        };
        let is_all_day = self.start.date_time.is_none();
        let when = |t: &GoogleTime| t.date_time.as_deref().or(t.date.as_deref()).and_then(parse_instant);
        let (Some(start), Some(end)) = (when(&self.start), when(&self.end)) else {
            tracing::warn!(event_id = %id, "skipping google event with unparsable time");
            return None;
        };

        let status = match self.status.as_deref() {
            Some("cancelled") => EventStatus::Cancelled,
            Some("tentative") => EventStatus::Tentative,
            _ => EventStatus::Confirmed,
        };
        let reminders = match self.reminders {
            Some(r) if !r.overrides.is_empty() => r.overrides.into_iter().map(|o| o.minutes).collect(),
            _ => vec![DEFAULT_REMINDER_MINUTES],
        };

        let mut event = CalendarEvent::new(
            format!("{}{id}", CalendarProvider::Google.id_prefix()),
            self.summary.filter(|s| !s.is_empty()).unwrap_or_else(|| UNTITLED.to_string()),
            start,
            end,
        )
        .with_status(status)
        .with_attendees(self.attendees.into_iter().filter_map(|a| a.email));
        event.description = self.description;
        event.location = self.location;
        event.is_all_day = is_all_day;
        event.reminders = reminders;
        Some(event)
    }
}

#[derive(Debug, Default, Deserialize)]
struct OutlookList {
    #[serde(default)]
    value: Vec<OutlookEvent>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlookTime {
    date_time: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlookLocation {
    display_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct OutlookAddress {
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlookAttendee {
    #[serde(default)]
    email_address: OutlookAddress,
}

#[derive(Debug, Default, Deserialize)]
struct OutlookResponse {
    response: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OutlookEvent {
    id: Option<String>,
    subject: Option<String>,
    body_preview: Option<String>,
    #[serde(default)]
    start: OutlookTime,
    #[serde(default)]
    end: OutlookTime,
    #[serde(default)]
    location: OutlookLocation,
    #[serde(default)]
    attendees: Vec<OutlookAttendee>,
    #[serde(default)]
    is_all_day: bool,
    #[serde(default)]
    is_cancelled: bool,
    #[serde(default)]
    response_status: OutlookResponse,
    importance: Option<String>,
}

impl OutlookEvent {
    fn into_event(self) -> Option<CalendarEvent> {
        let Some(id) = self.id else {
            tracing::warn!("skipping outlook event without id");
            return None;
        };
        let when = |t: &OutlookTime| t.date_time.as_deref().and_then(parse_instant);
        let (Some(start), Some(end)) = (when(&self.start), when(&self.end)) else {
            tracing::warn!(event_id = %id, "skipping outlook event with unparsable time");
            return None;
        };

        let status = if self.is_cancelled {
            EventStatus::Cancelled
        } else if self.response_status.response.as_deref() == Some("tentativelyAccepted") {
            EventStatus::Tentative
        } else {
            EventStatus::Confirmed
        };
        let priority = match self.importance.as_deref() {
            Some("high") => Priority::High,
            Some("low") => Priority::Low,
            _ => Priority::Medium,
        };

        let mut event = CalendarEvent::new(
            format!("{}{id}", CalendarProvider::Outlook.id_prefix()),
            self.subject.filter(|s| !s.is_empty()).unwrap_or_else(|| UNTITLED.to_string()),
            start,
            end,
        )
        .with_status(status)
        .with_attendees(self.attendees.into_iter().filter_map(|a| a.email_address.address));
        event.description = self.body_preview;
        event.location = self.location.display_name.filter(|l| !l.is_empty());
        event.is_all_day = self.is_all_day;
        event.priority = priority;
        event.reminders = vec![DEFAULT_REMINDER_MINUTES];
        Some(event)
    }
}
