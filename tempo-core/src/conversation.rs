//! Rolling conversation context and the text-generation seam.

use std::collections::VecDeque;
use std::future::Future;

use chrono::{DateTime, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORY_LEN: usize = 10;
const PROMPT_HISTORY_LEN: usize = 5;
const SUMMARY_TOPICS: usize = 3;
const SUMMARY_TOPIC_CHARS: usize = 50;

const SYSTEM_PROMPT: &str = "You are Tempo, a voice-first personal assistant focused on \
productivity and well-being.

Keep replies short enough to be spoken aloud. Use the conversation history and context below to \
stay consistent with what the user already said. You help with tasks, schedules, reminders and \
meeting preparation. When you are unsure, ask one clarifying question.";

const APOLOGIES: [&str; 3] = [
    "I'm having trouble processing that right now. Could you try rephrasing your request?",
    "Sorry, I encountered a technical issue. Let me try to help you in a different way.",
    "I'm experiencing some difficulty at the moment. Is there something specific I can help you with?",
];

/// Something that turns a prompt into free text, usually a remote model.
pub trait TextGenerator {
    /// False when credentials are missing; callers then use local replies instead.
    fn is_configured(&self) -> bool;

    fn generate(&self, prompt: &str) -> impl Future<Output = anyhow::Result<String>> + Send;
}

/// A generator with no backend. Always unconfigured.
#[derive(Debug, Clone, Copy, Default)]
pub struct Offline;

impl TextGenerator for Offline {
    fn is_configured(&self) -> bool {
        false
    }

    async fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
        anyhow::bail!("no text generator configured")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Role::User => "USER",
            Role::Assistant => "ASSISTANT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub at: DateTime<Utc>,
    pub time_of_day: String,
    #[serde(default)]
    pub task_context: Option<String>,
}

/// Optional structured context sent along with a prompt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationContext {
    pub current_task: Option<String>,
    pub time_context: Option<String>,
    pub communication_style: Option<String>,
    pub preferences: Vec<String>,
}

impl GenerationContext {
    fn is_empty(&self) -> bool {
        self.current_task.is_none()
            && self.time_context.is_none()
            && self.communication_style.is_none()
            && self.preferences.is_empty()
    }

    fn render(&self, out: &mut String) {
        if self.is_empty() {
            return;
        }
        out.push_str("\n\nCURRENT CONTEXT:\n");
        if let Some(t) = &self.time_context {
            out.push_str(&format!("Time: {t}\n"));
        }
        if let Some(t) = &self.current_task {
            out.push_str(&format!("Current Task Context: {t}\n"));
        }
        if let Some(s) = &self.communication_style {
            out.push_str(&format!("User Communication Style: {s}\n"));
        }
        if !self.preferences.is_empty() {
            out.push_str(&format!("User Preferences: {}\n", self.preferences.join(", ")));
        }
    }
}

pub fn time_of_day(hour: u32) -> &'static str {
    match hour {
        0..=5 => "late night",
        6..=11 => "morning",
        12..=16 => "afternoon",
        17..=20 => "evening",
        _ => "night",
    }
}

/// A single prompt with context and no history. Used for one-off generations.
pub fn contextual_prompt(input: &str, ctx: &GenerationContext) -> String {
    let mut out = SYSTEM_PROMPT.to_string();
    ctx.render(&mut out);
    out.push_str(&format!("\n\nCURRENT USER INPUT: {input}"));
    out
}

#[derive(Debug, Clone)]
pub struct Conversation {
    history: VecDeque<Message>,
    max_len: usize,
    next_apology: usize,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LEN)
    }
}

impl Conversation {
    pub fn new(max_len: usize) -> Self {
        Self {
            history: VecDeque::new(),
            max_len: max_len.max(1),
            next_apology: 0,
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Message> {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    pub fn push(
        &mut self,
        role: Role,
        content: impl Into<String>,
        now: DateTime<Utc>,
        tz: Tz,
        task_context: Option<String>,
    ) {
        self.history.push_back(Message {
            role,
            content: content.into(),
            at: now,
            time_of_day: time_of_day(now.with_timezone(&tz).hour()).to_string(),
            task_context,
        });
        while self.history.len() > self.max_len {
            self.history.pop_front();
        }
    }

    /// System prompt, the last few turns, optional context, then the input.
    pub fn build_prompt(&self, input: &str, ctx: &GenerationContext) -> String {
        let mut out = SYSTEM_PROMPT.to_string();
        if !self.history.is_empty() {
            out.push_str("\n\nCONVERSATION HISTORY:\n");
            let skip = self.history.len().saturating_sub(PROMPT_HISTORY_LEN);
            for m in self.history.iter().skip(skip) {
                out.push_str(&format!("{}: {}\n", m.role.label(), m.content));
            }
        }
        ctx.render(&mut out);
        out.push_str(&format!("\n\nCURRENT USER INPUT: {input}"));
        out
    }

    /// Reply to free text. Never fails: missing credentials produce a local reply and a
    /// generator error produces an apology.
    pub async fn respond<G: TextGenerator>(
        &mut self,
        generator: &G,
        input: &str,
        ctx: &GenerationContext,
        now: DateTime<Utc>,
        tz: Tz,
    ) -> String {
        if !generator.is_configured() {
            let reply = self.mock_reply(input, now, tz);
            self.push(Role::User, input, now, tz, ctx.current_task.clone());
            self.push(Role::Assistant, reply.clone(), now, tz, None);
            return reply;
        }

        self.push(Role::User, input, now, tz, ctx.current_task.clone());
        let prompt = self.build_prompt(input, ctx);
        match generator.generate(&prompt).await {
            Ok(text) => {
                let text = text.trim().to_string();
                self.push(Role::Assistant, text.clone(), now, tz, None);
                text
            }
            Err(e) => {
                tracing::warn!(error = %e, "text generation failed");
                self.apology()
            }
        }
    }

    /// Canned replies in rotation.
    pub fn apology(&mut self) -> String {
        let s = APOLOGIES[self.next_apology % APOLOGIES.len()];
        self.next_apology = self.next_apology.wrapping_add(1);
        s.to_string()
    }

    /// Keyword-matched reply used when no generator is configured.
    pub fn mock_reply(&self, input: &str, now: DateTime<Utc>, tz: Tz) -> String {
        let lower = input.to_lowercase();
        let tod = time_of_day(now.with_timezone(&tz).hour());

        let last_user = self
            .history
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.to_lowercase());
        if last_user.is_some_and(|m| m.contains("schedule")) && lower.contains("meeting") {
            return "Based on our earlier discussion about your schedule, I'd suggest booking that \
                    meeting during one of your peak hours. Connect a text generator for a \
                    tailored answer."
                .to_string();
        }

        if lower.contains("schedule") || lower.contains("calendar") {
            let opener = match tod {
                "morning" => "Good morning! Let me help you plan your day.",
                "evening" => "Let's review your schedule for tomorrow.",
                _ => "I can help you with your schedule.",
            };
            return format!("{opener} Try asking what's on your schedule today.");
        }
        if lower.contains("reminder") {
            return "I can set that reminder once you tell me the task and the time.".to_string();
        }
        if lower.contains("how are you") || lower.contains("hello") {
            return format!(
                "Hello! I'm doing well and ready to help you be more productive this {tod}. \
                 What can I assist you with?"
            );
        }
        if lower.contains("feature") {
            return "I can help with task management, daily planning, reminders, calendar \
                    conflicts and meeting preparation."
                .to_string();
        }
        format!(
            "I understand your request about \"{input}\". I'm running without a text generator \
             right now, so I can only answer built-in commands this {tod}."
        )
    }

    pub fn summary(&self) -> String {
        if self.history.is_empty() {
            return "No previous conversation context.".to_string();
        }
        let skip = self.history.len().saturating_sub(SUMMARY_TOPICS);
        let topics: Vec<String> = self
            .history
            .iter()
            .skip(skip)
            .map(|m| m.content.chars().take(SUMMARY_TOPIC_CHARS).collect())
            .collect();
        format!("Recent topics: {}", topics.join(", "))
    }
}
