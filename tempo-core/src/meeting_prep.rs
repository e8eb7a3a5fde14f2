//! Meeting preparation: prep tasks, documents, key points and arrival time for an event.

use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::calendar::{CalendarEvent, MeetingType};
use crate::conflicts::estimate_travel_minutes;
use crate::conversation::{GenerationContext, TextGenerator, contextual_prompt};
use crate::task::Priority;

const MAX_KEY_POINTS: usize = 5;
const MIN_KEY_POINT_CHARS: usize = 11;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingKind {
    Interview,
    Review,
    Planning,
    Standup,
    Social,
    General,
}

impl From<MeetingType> for MeetingKind {
    fn from(t: MeetingType) -> Self {
        match t {
            MeetingType::Interview => MeetingKind::Interview,
            MeetingType::Review => MeetingKind::Review,
            MeetingType::Planning => MeetingKind::Planning,
            MeetingType::Standup => MeetingKind::Standup,
            MeetingType::Social => MeetingKind::Social,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparationTask {
    pub id: String,
    pub title: String,
    pub description: String,
    pub estimated_minutes: u32,
    pub priority: Priority,
    pub completed: bool,
    pub due: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeetingPreparation {
    pub event: CalendarEvent,
    pub preparation_tasks: Vec<PreparationTask>,
    pub documents_needed: Vec<String>,
    pub key_points: Vec<String>,
    pub suggested_arrival: DateTime<Utc>,
    pub travel_instructions: Option<String>,
}

/// Explicit metadata wins; otherwise keywords in the title and description.
pub fn infer_meeting_kind(event: &CalendarEvent) -> MeetingKind {
    if let Some(t) = event.metadata.as_ref().and_then(|m| m.meeting_type) {
        return t.into();
    }
    let text = format!(
        "{} {}",
        event.title,
        event.description.as_deref().unwrap_or_default()
    )
    .to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| text.contains(w));

    if has(&["interview"]) {
        MeetingKind::Interview
    } else if has(&["review", "retrospective"]) {
        MeetingKind::Review
    } else if has(&["planning", "roadmap"]) {
        MeetingKind::Planning
    } else if has(&["standup", "daily"]) {
        MeetingKind::Standup
    } else if has(&["social", "lunch", "coffee"]) {
        MeetingKind::Social
    } else {
        MeetingKind::General
    }
}

/// Video-call locations. Matched on service names, not the bare word "meet".
pub fn is_virtual(location: &str) -> bool {
    let l = location.to_lowercase();
    ["zoom", "teams", "google meet", "meet.google"]
        .iter()
        .any(|k| l.contains(k))
}

fn prep_task(
    event: &CalendarEvent,
    suffix: &str,
    title: &str,
    description: String,
    estimated_minutes: u32,
    priority: Priority,
    minutes_before: i64,
) -> PreparationTask {
    PreparationTask {
        id: format!("prep_{}_{suffix}", event.id),
        title: title.to_string(),
        description,
        estimated_minutes,
        priority,
        completed: false,
        due: event.start - Duration::minutes(minutes_before),
    }
}

pub fn preparation_tasks(event: &CalendarEvent) -> Vec<PreparationTask> {
    let mut tasks = vec![prep_task(
        event,
        "review",
        "Review meeting agenda",
        format!("Review the agenda and objectives for \"{}\"", event.title),
        5,
        Priority::High,
        30,
    )];

    match infer_meeting_kind(event) {
        MeetingKind::Interview => {
            tasks.push(prep_task(
                event,
                "research",
                "Research candidate/company",
                "Review background information and prepare questions".into(),
                15,
                Priority::High,
                60,
            ));
            tasks.push(prep_task(
                event,
                "questions",
                "Prepare interview questions",
                "Draft relevant questions based on role requirements".into(),
                10,
                Priority::Medium,
                45,
            ));
        }
        MeetingKind::Review => tasks.push(prep_task(
            event,
            "materials",
            "Gather review materials",
            "Collect relevant documents, reports, and data for review".into(),
            10,
            Priority::High,
            45,
        )),
        MeetingKind::Planning => tasks.push(prep_task(
            event,
            "objectives",
            "Define meeting objectives",
            "Clarify goals and desired outcomes for the planning session".into(),
            8,
            Priority::High,
            60,
        )),
        MeetingKind::Standup | MeetingKind::Social | MeetingKind::General => {}
    }

    if event.location.as_deref().is_some_and(is_virtual) {
        tasks.push(prep_task(
            event,
            "tech",
            "Test video/audio setup",
            "Verify camera, microphone, and internet connection".into(),
            3,
            Priority::Medium,
            15,
        ));
    }
    tasks
}

pub fn documents_needed(event: &CalendarEvent) -> Vec<String> {
    let title = event.title.to_lowercase();
    let description = event.description.as_deref().unwrap_or_default().to_lowercase();
    let mentions = |w: &str| title.contains(w) || description.contains(w);

    let mut docs: Vec<&str> = Vec::new();
    if mentions("review") {
        docs.extend(["Performance metrics", "Previous review notes", "Goal tracking spreadsheet"]);
    }
    if mentions("planning") {
        docs.extend(["Project timeline", "Resource allocation sheet", "Budget information"]);
    }
    if title.contains("interview") {
        docs.extend(["Resume/CV", "Job description", "Interview question template"]);
    }
    docs.extend(["Meeting agenda", "Previous meeting notes"]);

    let mut out: Vec<String> = Vec::with_capacity(docs.len());
    for d in docs {
        if !out.iter().any(|x| x == d) {
            out.push(d.to_string());
        }
    }
    out
}

pub fn default_key_points(kind: MeetingKind) -> Vec<String> {
    let points: &[&str] = match kind {
        MeetingKind::Standup => &[
            "What did you accomplish yesterday?",
            "What are you working on today?",
            "Any blockers or challenges?",
        ],
        MeetingKind::Review => &[
            "Review progress against goals",
            "Discuss achievements and challenges",
            "Plan next steps and improvements",
        ],
        MeetingKind::Planning => &[
            "Define objectives and scope",
            "Identify resources and timeline",
            "Assign responsibilities and next actions",
        ],
        MeetingKind::Interview => &[
            "Review candidate background",
            "Assess technical and cultural fit",
            "Discuss role expectations and growth",
        ],
        MeetingKind::Social | MeetingKind::General => &[
            "Review agenda items",
            "Discuss current status and updates",
            "Identify action items and owners",
            "Plan follow-up activities",
        ],
    };
    points.iter().map(|p| p.to_string()).collect()
}

/// Bullet or numbered lines from generated text, list markers stripped, short lines dropped.
pub fn parse_key_points(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim_start_matches(|c: char| {
                c.is_ascii_digit() || c == '.' || c == '-' || c == '*' || c.is_whitespace()
            })
            .trim()
        })
        .filter(|line| line.chars().count() >= MIN_KEY_POINT_CHARS)
        .take(MAX_KEY_POINTS)
        .map(str::to_string)
        .collect()
}

/// Start minus a per-kind buffer, plus travel for physical locations.
pub fn suggested_arrival(event: &CalendarEvent) -> DateTime<Utc> {
    let mut buffer = match infer_meeting_kind(event) {
        MeetingKind::Interview => 10,
        MeetingKind::Review | MeetingKind::Planning => 8,
        MeetingKind::Standup => 2,
        MeetingKind::Social | MeetingKind::General => 5,
    };
    if let Some(loc) = event.location.as_deref().filter(|l| !l.is_empty() && !is_virtual(l)) {
        buffer += estimate_travel_minutes("current location", loc);
    }
    event.start - Duration::minutes(buffer)
}

pub fn travel_instructions(location: &str) -> String {
    if is_virtual(location) {
        return "Virtual meeting - ensure stable internet connection and test audio/video beforehand."
            .to_string();
    }
    format!(
        "Navigate to: {location}. Check traffic and parking before you leave, and allow extra \
         time for check-in if the building is new to you."
    )
}

/// "morning on Monday" in the user's zone.
pub fn time_context(at: DateTime<Utc>, tz: Tz) -> String {
    let local = at.with_timezone(&tz);
    let part = match local.hour() {
        0..=11 => "morning",
        12..=16 => "afternoon",
        _ => "evening",
    };
    format!("{part} on {}", local.format("%A"))
}

/// Everything except generated key points, which fall back to the per-kind defaults.
pub fn prepare_offline(event: &CalendarEvent) -> MeetingPreparation {
    MeetingPreparation {
        event: event.clone(),
        preparation_tasks: preparation_tasks(event),
        documents_needed: documents_needed(event),
        key_points: default_key_points(infer_meeting_kind(event)),
        suggested_arrival: suggested_arrival(event),
        travel_instructions: event
            .location
            .as_deref()
            .filter(|l| !l.is_empty())
            .map(travel_instructions),
    }
}

/// Like [`prepare_offline`], with key points asked of `generator` when it is configured.
pub async fn prepare<G: TextGenerator>(
    event: &CalendarEvent,
    generator: &G,
    tz: Tz,
) -> MeetingPreparation {
    let mut prep = prepare_offline(event);
    if !generator.is_configured() {
        return prep;
    }

    let mut ask = format!(
        "Generate 3-5 key discussion points for a meeting titled \"{}\"",
        event.title
    );
    if let Some(d) = event.description.as_deref().filter(|d| !d.is_empty()) {
        ask.push_str(&format!(" with description: {d}"));
    }
    ask.push_str(". Focus on actionable items and important topics to cover.");
    let ctx = GenerationContext {
        current_task: Some("meeting_preparation".into()),
        time_context: Some(time_context(event.start, tz)),
        ..Default::default()
    };

    match generator.generate(&contextual_prompt(&ask, &ctx)).await {
        Ok(text) => {
            let points = parse_key_points(&text);
            if !points.is_empty() {
                prep.key_points = points;
            }
        }
        Err(e) => tracing::warn!(error = %e, event_id = %event.id, "key point generation failed"),
    }
    prep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::EventMetadata;
    use crate::conversation::Offline;
    use chrono::TimeZone;

    struct Bullets;

    impl TextGenerator for Bullets {
        fn is_configured(&self) -> bool {
            true
        }

        async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            Ok("1. Confirm the launch date\n- ok\n* Agree on owners for each risk\n".into())
        }
    }

    fn event(title: &str) -> CalendarEvent {
        let start = Utc.with_ymd_and_hms(2026, 3, 2, 14, 0, 0).unwrap();
        CalendarEvent::new("e1", title, start, start + Duration::hours(1))
    }

    #[test]
    fn kind_from_keywords_and_metadata() {
        assert_eq!(infer_meeting_kind(&event("Sprint retrospective")), MeetingKind::Review);
        assert_eq!(infer_meeting_kind(&event("Q3 roadmap")), MeetingKind::Planning);
        assert_eq!(infer_meeting_kind(&event("Coffee with Sam")), MeetingKind::Social);
        assert_eq!(infer_meeting_kind(&event("Sync")), MeetingKind::General);

        let tagged = event("Sync").with_metadata(EventMetadata {
            meeting_type: Some(MeetingType::Interview),
            ..Default::default()
        });
        assert_eq!(infer_meeting_kind(&tagged), MeetingKind::Interview);
    }

    #[test]
    fn interview_prep_tasks_and_due_times() {
        let e = event("Candidate interview").with_location("Zoom");
        let tasks = preparation_tasks(&e);
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["prep_e1_review", "prep_e1_research", "prep_e1_questions", "prep_e1_tech"]
        );
        assert_eq!(tasks[1].due, e.start - Duration::minutes(60));
    }

    #[test]
    fn documents_are_deduplicated() {
        let e = event("Planning review").with_description("quarterly review and planning");
        let docs = documents_needed(&e);
        assert_eq!(docs.len(), 8);
        assert_eq!(docs.last().map(String::as_str), Some("Previous meeting notes"));
    }

    #[test]
    fn arrival_includes_travel_unless_virtual() {
        let standup = event("Daily standup");
        assert_eq!(suggested_arrival(&standup), standup.start - Duration::minutes(2));

        let onsite = event("Daily standup").with_location("Client HQ");
        assert_eq!(suggested_arrival(&onsite), onsite.start - Duration::minutes(32));

        let remote = event("Daily standup").with_location("Teams");
        assert_eq!(suggested_arrival(&remote), remote.start - Duration::minutes(2));
    }

    #[test]
    fn key_point_parsing_strips_markers() {
        let points = parse_key_points("1. Confirm the launch date\n\n- ok\n* Agree on owners\n");
        assert_eq!(points, vec!["Confirm the launch date", "Agree on owners"]);
    }

    #[test]
    fn time_context_label() {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        assert_eq!(time_context(at, Tz::UTC), "morning on Monday");
    }

    #[tokio::test]
    async fn generated_key_points_replace_defaults() {
        let e = event("Launch sync");
        let prep = prepare(&e, &Bullets, Tz::UTC).await;
        assert_eq!(
            prep.key_points,
            vec!["Confirm the launch date", "Agree on owners for each risk"]
        );

        let offline = prepare(&e, &Offline, Tz::UTC).await;
        assert_eq!(offline.key_points, default_key_points(MeetingKind::General));
        assert!(offline.travel_instructions.is_none());
    }
}
