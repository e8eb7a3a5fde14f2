//! tempo-core: tasks, daily planning, reminders, calendar conflicts and voice command routing
//! for the Tempo assistant.

pub mod calendar;
pub mod conflicts;
pub mod conversation;
pub mod meeting_prep;
pub mod planner;
pub mod profile;
pub mod providers;
pub mod reminders;
pub mod snapshot;
pub mod store;
pub mod task;
pub mod time;
pub mod voice;

pub use calendar::{
    CalendarEvent, CalendarProvider, CalendarStore, EventMetadata, EventStatus, MeetingType,
};
pub use conflicts::{ConflictDetection, ConflictFinding, ConflictKind, Severity, detect_conflicts};
pub use conversation::{Conversation, GenerationContext, Offline, TextGenerator};
pub use meeting_prep::{MeetingKind, MeetingPreparation, PreparationTask};
pub use planner::{DailyPlan, Distribution, ScheduledSlot};
pub use profile::{CompletionRecord, ProductivityProfile, WorkPattern};
pub use reminders::{
    ArmPolicy, Reminder, ReminderDraft, ReminderFired, ReminderKind, ReminderScheduler,
};
pub use snapshot::{FileStorage, MemoryStorage, Snapshot, Storage, StoreError};
pub use store::{PriorityBuckets, StatusError, TaskStore};
pub use task::{EnergyLevel, Priority, Task, TaskDraft, TaskPatch, TaskStatus, TransitionError};
pub use time::TimeSpecParser;
pub use voice::{CommandRouter, NoSpeech, SpeechSink, VoiceAssistant};
