//! Scheduling-conflict heuristics for a candidate event against the stored calendar.

use serde::{Deserialize, Serialize};

use crate::calendar::CalendarEvent;

const BACK_TO_BACK_MINUTES: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    Overlap,
    BackToBack,
    TravelTime,
    PreparationTime,
}

impl ConflictKind {
    /// Tie-break among findings of equal severity.
    fn precedence(self) -> u8 {
        match self {
            ConflictKind::Overlap => 3,
            ConflictKind::TravelTime => 2,
            ConflictKind::PreparationTime => 1,
            ConflictKind::BackToBack => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// One rule hit against one stored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictFinding {
    pub event_id: String,
    pub kind: ConflictKind,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictDetection {
    pub has_conflict: bool,
    /// Each conflicting stored event once, in calendar order.
    pub conflicts: Vec<CalendarEvent>,
    pub findings: Vec<ConflictFinding>,
    /// The most severe finding's kind; `Overlap` when nothing conflicts.
    pub kind: ConflictKind,
    pub severity: Severity,
    /// Empty when nothing conflicts.
    pub suggestion: String,
}

impl ConflictDetection {
    fn clear() -> Self {
        Self {
            has_conflict: false,
            conflicts: Vec::new(),
            findings: Vec::new(),
            kind: ConflictKind::Overlap,
            severity: Severity::Warning,
            suggestion: String::new(),
        }
    }
}

/// Rough travel minutes between two free-text locations.
pub fn estimate_travel_minutes(from: &str, to: &str) -> i64 {
    let (from, to) = (from.to_lowercase(), to.to_lowercase());
    if from.contains("home") || to.contains("home") {
        20
    } else if from.contains("office") && to.contains("office") {
        5
    } else {
        30
    }
}

/// Preparation minutes implied by a meeting title.
pub fn default_prep_minutes(title: &str) -> i64 {
    let t = title.to_lowercase();
    if t.contains("interview") {
        15
    } else if t.contains("presentation") || t.contains("demo") {
        30
    } else if t.contains("review") || t.contains("planning") {
        10
    } else if t.contains("standup") || t.contains("daily") {
        2
    } else {
        5
    }
}

fn prep_minutes(candidate: &CalendarEvent) -> i64 {
    candidate
        .metadata
        .as_ref()
        .and_then(|m| m.preparation_minutes)
        .filter(|m| *m > 0)
        .map(i64::from)
        .unwrap_or_else(|| default_prep_minutes(&candidate.title))
}

/// Check `candidate` against every non-cancelled event in `events`, in order.
///
/// A stored event with the candidate's own id is skipped, so re-checking an event that was
/// already added does not report it against itself.
pub fn detect_conflicts(candidate: &CalendarEvent, events: &[CalendarEvent]) -> ConflictDetection {
    let mut out = ConflictDetection::clear();
    let prep = prep_minutes(candidate);

    for other in events {
        if other.is_cancelled() || other.id == candidate.id {
            continue;
        }

        let mut hits: Vec<(ConflictKind, Severity)> = Vec::new();
        if candidate.overlaps(other) {
            hits.push((ConflictKind::Overlap, Severity::Error));
        } else {
            let gap = (candidate.start - other.end).num_minutes().abs();

            if gap < BACK_TO_BACK_MINUTES {
                hits.push((ConflictKind::BackToBack, Severity::Warning));
            }

            let travel = match (
                candidate.location.as_deref().filter(|l| !l.is_empty()),
                other.location.as_deref().filter(|l| !l.is_empty()),
            ) {
                (Some(here), Some(there)) if here != there => {
                    Some(estimate_travel_minutes(there, here))
                }
                _ => None,
            };
            if travel.is_some_and(|needed| gap < needed) {
                hits.push((ConflictKind::TravelTime, Severity::Error));
            }

            if gap < prep {
                hits.push((ConflictKind::PreparationTime, Severity::Warning));
            }
        }

        if hits.is_empty() {
            continue;
        }
        out.conflicts.push(other.clone());
        out.findings.extend(hits.into_iter().map(|(kind, severity)| ConflictFinding {
            event_id: other.id.clone(),
            kind,
            severity,
        }));
    }

    // Most severe wins; ties go to kind precedence, then to the earliest finding.
    let worst = out
        .findings
        .iter()
        .enumerate()
        .max_by_key(|(i, f)| (f.severity, f.kind.precedence(), std::cmp::Reverse(*i)))
        .map(|(_, f)| (f.kind, f.severity));

    if let Some((kind, severity)) = worst {
        out.has_conflict = true;
        out.kind = kind;
        out.severity = severity;
        out.suggestion = suggestion(&out.conflicts[0], kind);
    }
    out
}

fn suggestion(first: &CalendarEvent, kind: ConflictKind) -> String {
    match kind {
        ConflictKind::Overlap => format!(
            "This meeting overlaps with \"{}\". Consider rescheduling to avoid conflicts.",
            first.title
        ),
        ConflictKind::BackToBack => format!(
            "This meeting is scheduled immediately after \"{}\". Consider adding a 5-10 minute buffer.",
            first.title
        ),
        ConflictKind::TravelTime => format!(
            "Insufficient travel time from \"{}\" to the new meeting location. Consider adjusting the start time.",
            first.location.as_deref().unwrap_or("the previous meeting")
        ),
        ConflictKind::PreparationTime => format!(
            "Limited preparation time after \"{}\". Consider scheduling earlier or blocking prep time.",
            first.title
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::{EventMetadata, EventStatus};
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, h, m, 0).unwrap()
    }

    fn ev(id: &str, title: &str, start: DateTime<Utc>, minutes: i64) -> CalendarEvent {
        CalendarEvent::new(id, title, start, start + Duration::minutes(minutes))
    }

    #[test]
    fn no_events_no_conflict() {
        let c = detect_conflicts(&ev("x", "Sync", at(10, 0), 60), &[]);
        assert!(!c.has_conflict);
        assert!(c.conflicts.is_empty());
        assert_eq!(c.kind, ConflictKind::Overlap);
        assert_eq!(c.severity, Severity::Warning);
        assert!(c.suggestion.is_empty());
    }

    #[test]
    fn overlap_is_error() {
        let stored = vec![ev("a", "Design sync", at(10, 30), 60)];
        let c = detect_conflicts(&ev("x", "Sync", at(10, 0), 60), &stored);
        assert!(c.has_conflict);
        assert_eq!(c.kind, ConflictKind::Overlap);
        assert_eq!(c.severity, Severity::Error);
        assert!(c.suggestion.contains("Design sync"));
    }

    #[test]
    fn cancelled_events_are_ignored() {
        let stored = vec![ev("a", "Old", at(10, 0), 60).with_status(EventStatus::Cancelled)];
        assert!(!detect_conflicts(&ev("x", "Sync", at(10, 0), 60), &stored).has_conflict);
    }

    #[test]
    fn back_to_back_without_locations() {
        let stored = vec![ev("a", "Before", at(9, 0), 58)];
        let candidate = ev("x", "Sync", at(10, 0), 30).with_metadata(EventMetadata {
            preparation_minutes: Some(1),
            ..Default::default()
        });
        let c = detect_conflicts(&candidate, &stored);
        assert_eq!(c.kind, ConflictKind::BackToBack);
        assert_eq!(c.severity, Severity::Warning);
    }

    #[test]
    fn same_location_never_travel() {
        let stored = vec![ev("a", "Before", at(9, 0), 60).with_location("Office A")];
        let candidate = ev("x", "Sync", at(10, 0), 60).with_location("Office A");
        let c = detect_conflicts(&candidate, &stored);
        assert!(c.findings.iter().all(|f| f.kind != ConflictKind::TravelTime));
    }

    #[test]
    fn preparation_uses_title_heuristic() {
        // 20 minute gap: enough for anything but a presentation.
        let stored = vec![ev("a", "Before", at(9, 0), 40)];
        let demo = detect_conflicts(&ev("x", "Product demo", at(10, 0), 30), &stored);
        assert_eq!(demo.kind, ConflictKind::PreparationTime);
        assert_eq!(demo.severity, Severity::Warning);

        let chat = detect_conflicts(&ev("y", "Chat", at(10, 0), 30), &stored);
        assert!(!chat.has_conflict);
    }

    #[test]
    fn most_severe_classification_wins_over_scan_order() {
        // Travel conflict first, then a back-to-back warning on a later event.
        let stored = vec![
            ev("a", "Gym", at(8, 0), 110).with_location("Home"),
            ev("b", "Call", at(10, 0), 0),
        ];
        let candidate = ev("x", "Sync", at(10, 0), 30).with_location("Office A");
        let c = detect_conflicts(&candidate, &stored);
        assert_eq!(c.kind, ConflictKind::TravelTime);
        assert_eq!(c.severity, Severity::Error);
        assert_eq!(c.conflicts.len(), 2);
    }

    #[test]
    fn each_conflicting_event_listed_once() {
        let stored = vec![ev("a", "Before", at(9, 0), 60).with_location("Home")];
        let candidate = ev("x", "Sync", at(10, 0), 60).with_location("Office");
        let c = detect_conflicts(&candidate, &stored);
        assert_eq!(c.conflicts.len(), 1);
        assert_eq!(c.findings.len(), 3);
    }

    #[test]
    fn candidate_does_not_conflict_with_itself() {
        let candidate = ev("x", "Sync", at(10, 0), 60);
        assert!(!detect_conflicts(&candidate, std::slice::from_ref(&candidate)).has_conflict);
    }

    #[test]
    fn travel_estimates() {
        assert_eq!(estimate_travel_minutes("Home", "Office A"), 20);
        assert_eq!(estimate_travel_minutes("Office A", "Office B"), 5);
        assert_eq!(estimate_travel_minutes("Cafe", "Library"), 30);
    }

    #[test]
    fn prep_estimates() {
        assert_eq!(default_prep_minutes("Candidate Interview"), 15);
        assert_eq!(default_prep_minutes("Q3 presentation"), 30);
        assert_eq!(default_prep_minutes("Sprint planning"), 10);
        assert_eq!(default_prep_minutes("Daily standup"), 2);
        assert_eq!(default_prep_minutes("Lunch"), 5);
    }
}
