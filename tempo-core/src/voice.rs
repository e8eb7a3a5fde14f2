//! Voice command routing: ordered pattern table, first match wins, free text falls back to the
//! conversation.

use chrono::{DateTime, Days, Duration, Timelike, Utc};
use chrono_tz::Tz;
use regex::{Captures, Regex};

use crate::calendar::{CalendarEvent, CalendarStore};
use crate::conflicts::Severity;
use crate::conversation::{Conversation, GenerationContext, TextGenerator, time_of_day};
use crate::meeting_prep::prepare_offline;
use crate::planner::local_time_on;
use crate::time::TimeSpecParser;

const MEETING_MINUTES: i64 = 60;
const CONFLICT_WINDOW_HOURS: i64 = 24;
const MAX_CONFLICTS_SPOKEN: usize = 3;

pub const SPEECH_UNAVAILABLE_NOTICE: &str =
    "Speech output is not available here. Responses will be shown as text only.";

/// Lowercase, drop characters outside word/space/basic punctuation, collapse whitespace.
pub fn normalize(text: &str) -> String {
    let kept: String = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || "_'?.,!:-".contains(*c))
        .collect();
    kept.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Where spoken responses go.
pub trait SpeechSink {
    fn is_available(&self) -> bool;
    /// Replaces anything still being spoken.
    fn speak(&mut self, text: &str);
    fn cancel(&mut self);
}

/// A sink with no output device.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSpeech;

impl SpeechSink for NoSpeech {
    fn is_available(&self) -> bool {
        false
    }

    fn speak(&mut self, _text: &str) {}

    fn cancel(&mut self) {}
}

/// What a handler wants done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Say(String),
    /// Cut off pending speech and say nothing.
    Hush,
}

/// State the built-in handlers read and change.
#[derive(Debug, Clone)]
pub struct Desk {
    pub calendar: CalendarStore,
    pub tz: Tz,
    times: TimeSpecParser,
}

type Handler = fn(&mut Desk, &Captures<'_>, DateTime<Utc>) -> Reply;

struct Route {
    name: &'static str,
    pattern: Regex,
    handler: Handler,
}

/// Patterns are tried in registration order against normalized text.
pub struct CommandRouter {
    routes: Vec<Route>,
}

impl CommandRouter {
    pub fn new() -> Result<Self, regex::Error> {
        let table: [(&'static str, &str, Handler); 13] = [
            ("stop", r"^(?:stop|be quiet|quiet|shut up|silence)$", stop),
            ("cancel", r"^(?:cancel|cancel that|never ?mind|forget it)$", cancel),
            ("help", r"^(?:help|what can you do|what can i say)$", help),
            ("time", r"\bwhat time is it\b|\bwhat(?:'s| is) the time\b|^time$", time_now),
            (
                "date",
                r"\bwhat(?:'s| is) (?:the |today's )?date\b|\bwhat day is (?:it|today)\b",
                date_today,
            ),
            ("reminder", r"^(?:remind me|set (?:a )?reminder)(?: to)?\s*(.*)$", reminder),
            (
                "conflict_check",
                r"\b(?:conflicts?|clash(?:es)?|double[- ]booked|overlap(?:s|ping)?)\b",
                conflict_check,
            ),
            ("meeting_prep", r"\bprep(?:are|aration)?\b.*\b(?:meeting|call)\b", meeting_prep),
            (
                "schedule_meeting",
                r"^(?:schedule|book|set up|add) (?:a |an )?(?:meeting|call|event)(?: (called|titled|about|with) (.+?))?(?: (?:at|for|on))? ((?:tomorrow )?(?:at )?\d{1,2}(?::\d{2})? ?(?:am|pm)?(?: tomorrow)?)$",
                schedule_meeting,
            ),
            (
                "schedule_meeting_no_time",
                r"^(?:schedule|book|set up|add) (?:a |an )?(?:meeting|call|event)\b",
                ask_for_time,
            ),
            (
                "next_meeting",
                r"\b(?:next|upcoming) (?:meeting|event|appointment|call)\b",
                next_meeting,
            ),
            (
                "schedule_query",
                r"\b(?:my (?:schedule|calendar|agenda|day)|what do i have)\b(?:.*?\b(today|tomorrow)\b)?",
                schedule_query,
            ),
            ("weather", r"\b(?:weather|forecast|raining|rain)\b", weather),
        ];

        let mut routes = Vec::with_capacity(table.len());
        for (name, pattern, handler) in table {
            routes.push(Route {
                name,
                pattern: Regex::new(pattern)?,
                handler,
            });
        }
        Ok(Self { routes })
    }

    pub fn route_names(&self) -> Vec<&'static str> {
        self.routes.iter().map(|r| r.name).collect()
    }

    /// Name of the first route matching already-normalized `text`.
    pub fn matching_route(&self, text: &str) -> Option<&'static str> {
        let key = command_key(text);
        self.routes
            .iter()
            .find(|r| r.pattern.is_match(key))
            .map(|r| r.name)
    }

    /// Run the first matching handler. `None` when nothing matches.
    pub fn dispatch(
        &self,
        desk: &mut Desk,
        text: &str,
        now: DateTime<Utc>,
    ) -> Option<(&'static str, Reply)> {
        let key = command_key(text);
        self.routes.iter().find_map(|r| {
            r.pattern
                .captures(key)
                .map(|caps| (r.name, (r.handler)(desk, &caps, now)))
        })
    }
}

fn command_key(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '?', '!', ','])
}

fn clock(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%-I:%M %p").to_string()
}

fn day_and_clock(at: DateTime<Utc>, tz: Tz) -> String {
    at.with_timezone(&tz).format("%-I:%M %p on %A").to_string()
}

fn stop(_: &mut Desk, _: &Captures<'_>, _: DateTime<Utc>) -> Reply {
    Reply::Hush
}

fn cancel(_: &mut Desk, _: &Captures<'_>, _: DateTime<Utc>) -> Reply {
    Reply::Say("Okay, cancelled.".into())
}

fn help(_: &mut Desk, _: &Captures<'_>, _: DateTime<Utc>) -> Reply {
    Reply::Say(
        "You can ask: what's on my schedule today, schedule a meeting at 3pm, do I have any \
         conflicts, prepare me for my next meeting, when is my next meeting, what time is it, \
         what's the date. Say stop to interrupt me."
            .into(),
    )
}

fn time_now(desk: &mut Desk, _: &Captures<'_>, now: DateTime<Utc>) -> Reply {
    Reply::Say(format!("It's {}.", day_and_clock(now, desk.tz)))
}

fn date_today(desk: &mut Desk, _: &Captures<'_>, now: DateTime<Utc>) -> Reply {
    let local = now.with_timezone(&desk.tz);
    Reply::Say(format!("Today is {}.", local.format("%A, %B %-d, %Y")))
}

fn reminder(_: &mut Desk, caps: &Captures<'_>, _: DateTime<Utc>) -> Reply {
    let what = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
    if what.is_empty() {
        return Reply::Say("What should I remind you about?".into());
    }
    Reply::Say(format!(
        "I heard: remind you to {what}. Voice reminders aren't saved yet, so add it with \
         `tempo remind add`."
    ))
}

fn conflict_check(desk: &mut Desk, _: &Captures<'_>, now: DateTime<Utc>) -> Reply {
    let events = desk.calendar.upcoming(CONFLICT_WINDOW_HOURS, now);
    let mut found: Vec<String> = Vec::new();
    for (i, event) in events.iter().enumerate() {
        let detection = crate::conflicts::detect_conflicts(event, &events[..i]);
        if detection.has_conflict {
            found.push(format!("\"{}\": {}", event.title, detection.suggestion));
        }
    }

    if found.is_empty() {
        return Reply::Say("No conflicts in the next 24 hours.".into());
    }
    let total = found.len();
    found.truncate(MAX_CONFLICTS_SPOKEN);
    let noun = if total == 1 { "conflict" } else { "conflicts" };
    Reply::Say(format!("I found {total} {noun}. {}", found.join(" ")))
}

fn meeting_prep(desk: &mut Desk, _: &Captures<'_>, now: DateTime<Utc>) -> Reply {
    let Some(event) = desk.calendar.next_event(now) else {
        return Reply::Say("You don't have any upcoming meetings to prepare for.".into());
    };
    let prep = prepare_offline(event);
    let steps: Vec<String> = prep
        .preparation_tasks
        .iter()
        .map(|t| t.title.to_lowercase())
        .collect();
    Reply::Say(format!(
        "To prepare for \"{}\" at {}: {}. Bring the {}. Plan to arrive by {}.",
        event.title,
        day_and_clock(event.start, desk.tz),
        steps.join(", "),
        prep.documents_needed.join(", ").to_lowercase(),
        clock(prep.suggested_arrival, desk.tz),
    ))
}

fn schedule_meeting(desk: &mut Desk, caps: &Captures<'_>, now: DateTime<Utc>) -> Reply {
    let spoken = caps.get(3).map(|m| m.as_str()).unwrap_or_default();
    let Some(start) = desk.times.parse(spoken, now, desk.tz) else {
        return Reply::Say(format!("Sorry, I couldn't understand the time \"{spoken}\"."));
    };

    let title = match (caps.get(1).map(|m| m.as_str()), caps.get(2).map(|m| m.as_str())) {
        (Some("with"), Some(who)) => format!("Meeting with {who}"),
        (Some("about"), Some(topic)) => format!("Meeting about {topic}"),
        (Some(_), Some(name)) => name.to_string(),
        _ => "Meeting".to_string(),
    };
    let event = CalendarEvent::new(
        format!("local_{}", uuid::Uuid::new_v4().simple()),
        title,
        start,
        start + Duration::minutes(MEETING_MINUTES),
    );

    let detection = desk.calendar.detect_conflicts(&event);
    if detection.has_conflict && detection.severity == Severity::Error {
        tracing::info!(kind = ?detection.kind, "voice scheduling refused");
        return Reply::Say(format!("I didn't schedule it. {}", detection.suggestion));
    }

    let mut said = format!(
        "Scheduled \"{}\" for {}.",
        event.title,
        day_and_clock(event.start, desk.tz)
    );
    if detection.has_conflict {
        said.push_str(&format!(" Heads up: {}", detection.suggestion));
    }
    desk.calendar.add(event);
    Reply::Say(said)
}

fn ask_for_time(_: &mut Desk, _: &Captures<'_>, _: DateTime<Utc>) -> Reply {
    Reply::Say("When should I schedule it? Try something like \"at 3pm\" or \"tomorrow at 10am\".".into())
}

fn next_meeting(desk: &mut Desk, _: &Captures<'_>, now: DateTime<Utc>) -> Reply {
    match desk.calendar.next_event(now) {
        Some(e) => {
            let place = e
                .location
                .as_deref()
                .map(|l| format!(" at {l}"))
                .unwrap_or_default();
            Reply::Say(format!(
                "Your next meeting is \"{}\" at {}{place}.",
                e.title,
                day_and_clock(e.start, desk.tz)
            ))
        }
        None => Reply::Say("You have no upcoming meetings.".into()),
    }
}

fn schedule_query(desk: &mut Desk, caps: &Captures<'_>, now: DateTime<Utc>) -> Reply {
    let tomorrow = caps.get(1).is_some_and(|m| m.as_str() == "tomorrow");
    let label = if tomorrow { "tomorrow" } else { "today" };

    let today = now.with_timezone(&desk.tz).date_naive();
    let day = if tomorrow {
        today.checked_add_days(Days::new(1))
    } else {
        Some(today)
    };
    let bounds = day.and_then(|d| {
        let start = local_time_on(d, 0, 0, desk.tz)?;
        let end = local_time_on(d.checked_add_days(Days::new(1))?, 0, 0, desk.tz)?;
        Some((start, end - Duration::seconds(1)))
    });
    let Some((start, end)) = bounds else {
        return Reply::Say(format!("I couldn't work out {label}'s date."));
    };

    let events = desk.calendar.events(Some(start), Some(end));
    if events.is_empty() {
        return Reply::Say(format!("You have nothing scheduled {label}."));
    }
    let items: Vec<String> = events
        .iter()
        .map(|e| format!("{} at {}", e.title, clock(e.start, desk.tz)))
        .collect();
    let noun = if events.len() == 1 { "event" } else { "events" };
    Reply::Say(format!(
        "You have {} {noun} {label}: {}.",
        events.len(),
        items.join(", ")
    ))
}

fn weather(_: &mut Desk, _: &Captures<'_>, _: DateTime<Utc>) -> Reply {
    Reply::Say("I can't check the weather yet.".into())
}

/// Routes commands, speaks replies, and falls back to the conversation for free text.
pub struct VoiceAssistant<G, S> {
    router: CommandRouter,
    desk: Desk,
    conversation: Conversation,
    generator: G,
    speech: S,
}

impl<G: TextGenerator, S: SpeechSink> VoiceAssistant<G, S> {
    pub fn new(
        calendar: CalendarStore,
        tz: Tz,
        conversation: Conversation,
        generator: G,
        speech: S,
    ) -> Result<Self, regex::Error> {
        if !speech.is_available() {
            tracing::warn!("speech output unavailable; replies are text only");
        }
        Ok(Self {
            router: CommandRouter::new()?,
            desk: Desk {
                calendar,
                tz,
                times: TimeSpecParser::new()?,
            },
            conversation,
            generator,
            speech,
        })
    }

    /// Shown once at startup when there is no speech output.
    pub fn startup_notice(&self) -> Option<&'static str> {
        (!self.speech.is_available()).then_some(SPEECH_UNAVAILABLE_NOTICE)
    }

    pub fn calendar(&self) -> &CalendarStore {
        &self.desk.calendar
    }

    pub fn calendar_mut(&mut self) -> &mut CalendarStore {
        &mut self.desk.calendar
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn router(&self) -> &CommandRouter {
        &self.router
    }

    pub fn into_calendar(self) -> CalendarStore {
        self.desk.calendar
    }

    /// Respond to one utterance. Returns the reply text; empty after "stop".
    pub async fn handle(&mut self, text: &str, now: DateTime<Utc>) -> String {
        let normalized = normalize(text);
        let reply = match self.router.dispatch(&mut self.desk, &normalized, now) {
            Some((route, reply)) => {
                tracing::debug!(route, "voice command matched");
                reply
            }
            None => {
                let ctx = GenerationContext {
                    time_context: Some(
                        time_of_day(now.with_timezone(&self.desk.tz).hour()).to_string(),
                    ),
                    ..Default::default()
                };
                let said = self
                    .conversation
                    .respond(&self.generator, &normalized, &ctx, now, self.desk.tz)
                    .await;
                Reply::Say(said)
            }
        };

        match reply {
            Reply::Hush => {
                self.speech.cancel();
                String::new()
            }
            Reply::Say(text) => {
                if self.speech.is_available() {
                    self.speech.speak(&text);
                }
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Offline;
    use chrono::TimeZone;

    #[derive(Default)]
    struct Recorder {
        spoken: Vec<String>,
        cancels: usize,
    }

    impl SpeechSink for Recorder {
        fn is_available(&self) -> bool {
            true
        }

        fn speak(&mut self, text: &str) {
            self.spoken.push(text.to_string());
        }

        fn cancel(&mut self) {
            self.cancels += 1;
        }
    }

    fn now() -> DateTime<Utc> {
        // Monday 2026-03-02 08:00 UTC
        Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap()
    }

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, 0, 0).unwrap()
    }

    fn assistant(events: Vec<CalendarEvent>) -> VoiceAssistant<Offline, Recorder> {
        VoiceAssistant::new(
            CalendarStore::from_events(events),
            Tz::UTC,
            Conversation::default(),
            Offline,
            Recorder::default(),
        )
        .unwrap()
    }

    #[test]
    fn normalize_strips_and_collapses() {
        assert_eq!(normalize("  What's   the TIME?? "), "what's the time??");
        assert_eq!(normalize("Book a call @ 3pm #now"), "book a call 3pm now");
        assert_eq!(normalize("tomorrow at 9:30AM!"), "tomorrow at 9:30am!");
    }

    #[test]
    fn each_route_has_a_matching_phrase() {
        let r = CommandRouter::new().unwrap();
        let cases = [
            ("stop", "stop"),
            ("cancel", "never mind"),
            ("help", "what can you do?"),
            ("time", "what time is it"),
            ("date", "what's the date today"),
            ("reminder", "remind me to call mom"),
            ("conflict_check", "do i have any conflicts tomorrow"),
            ("meeting_prep", "prepare me for my next meeting"),
            ("schedule_meeting", "schedule a meeting with bob tomorrow at 3pm"),
            ("schedule_meeting_no_time", "schedule a meeting with bob"),
            ("next_meeting", "when is my next meeting"),
            ("schedule_query", "what's on my schedule today"),
            ("weather", "what's the weather like"),
        ];
        for (route, phrase) in cases {
            assert_eq!(r.matching_route(&normalize(phrase)), Some(route), "{phrase}");
        }
        assert_eq!(r.route_names().len(), cases.len());
    }

    #[test]
    fn first_match_wins() {
        let r = CommandRouter::new().unwrap();
        // Mentions the calendar, but prep is registered earlier.
        assert_eq!(
            r.matching_route("prepare me for the meeting on my calendar"),
            Some("meeting_prep")
        );
        // "remind me" is registered before the schedule query.
        assert_eq!(r.matching_route("remind me to check my calendar"), Some("reminder"));
        assert_eq!(r.matching_route("tell me a joke"), None);
    }

    #[tokio::test]
    async fn time_query_mentions_hour_and_weekday() {
        let mut a = assistant(Vec::new());
        let said = a.handle("What time is it?", now()).await;
        assert_eq!(said, "It's 8:00 AM on Monday.");
        assert_eq!(a.speech.spoken, vec![said]);
    }

    #[tokio::test]
    async fn stop_cancels_speech_silently() {
        let mut a = assistant(Vec::new());
        assert_eq!(a.handle("Stop.", now()).await, "");
        assert_eq!(a.speech.cancels, 1);
        assert!(a.speech.spoken.is_empty());
    }

    #[tokio::test]
    async fn schedule_meeting_adds_event() {
        let mut a = assistant(Vec::new());
        let said = a.handle("Schedule a meeting with Bob tomorrow at 3pm", now()).await;
        assert_eq!(said, "Scheduled \"Meeting with bob\" for 3:00 PM on Tuesday.");
        let e = &a.calendar().all()[0];
        assert_eq!(e.start, Utc.with_ymd_and_hms(2026, 3, 3, 15, 0, 0).unwrap());
        assert_eq!(e.end - e.start, Duration::hours(1));
    }

    #[tokio::test]
    async fn schedule_meeting_refuses_overlap() {
        let busy = CalendarEvent::new("b", "Board call", at(14), at(16));
        let mut a = assistant(vec![busy]);
        let said = a.handle("book a meeting at 3pm", now()).await;
        assert!(said.starts_with("I didn't schedule it."), "{said}");
        assert!(said.contains("Board call"));
        assert_eq!(a.calendar().all().len(), 1);
    }

    #[tokio::test]
    async fn schedule_query_lists_todays_events() {
        let mut a = assistant(vec![
            CalendarEvent::new("a", "Standup", at(9), at(10)),
            CalendarEvent::new("b", "Lunch", at(12), at(13)),
        ]);
        let said = a.handle("what's on my schedule today", now()).await;
        assert_eq!(said, "You have 2 events today: Standup at 9:00 AM, Lunch at 12:00 PM.");
        let said = a.handle("what's on my schedule tomorrow", now()).await;
        assert_eq!(said, "You have nothing scheduled tomorrow.");
    }

    #[tokio::test]
    async fn next_meeting_and_prep() {
        let mut a = assistant(vec![
            CalendarEvent::new("a", "Sprint planning", at(10), at(11)).with_location("Zoom"),
        ]);
        let said = a.handle("when is my next meeting", now()).await;
        assert_eq!(said, "Your next meeting is \"Sprint planning\" at 10:00 AM on Monday at Zoom.");

        let said = a.handle("prepare me for my next meeting", now()).await;
        assert!(said.contains("define meeting objectives"), "{said}");
        assert!(said.contains("arrive by 9:52 AM"), "{said}");
    }

    #[tokio::test]
    async fn conflict_check_reports_overlaps() {
        let mut a = assistant(vec![
            CalendarEvent::new("a", "Design", at(9), at(11)),
            CalendarEvent::new("b", "Review", at(10), at(12)),
        ]);
        let said = a.handle("any conflicts?", now()).await;
        assert!(said.starts_with("I found 1 conflict."), "{said}");
        assert!(said.contains("overlaps with \"Design\""));
    }

    #[tokio::test]
    async fn unmatched_text_falls_back_to_conversation() {
        let mut a = assistant(Vec::new());
        let said = a.handle("hello there", now()).await;
        assert!(said.starts_with("Hello!"));
        assert_eq!(a.conversation().len(), 2);
    }

    #[test]
    fn notice_when_speech_unavailable() {
        let a = VoiceAssistant::new(
            CalendarStore::new(),
            Tz::UTC,
            Conversation::default(),
            Offline,
            NoSpeech,
        )
        .unwrap();
        assert_eq!(a.startup_notice(), Some(SPEECH_UNAVAILABLE_NOTICE));
    }
}
