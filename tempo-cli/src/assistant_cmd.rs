use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Timelike, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};

use tempo_core::conversation::time_of_day;
use tempo_core::{Conversation, GenerationContext, SpeechSink, TextGenerator, VoiceAssistant};

use crate::config::load_config;
use crate::llm::GeminiClient;
use crate::speech::CommandSpeech;
use crate::state::{calendar_path, read_calendar, write_calendar};

/// One free-text question, answered by the configured generator (or offline).
pub async fn ask(text: &str) -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.timezone()?;
    let generator = GeminiClient::from_config(&cfg);
    let mut conversation = Conversation::new(cfg.chat.max_turns_context);

    let now = Utc::now();
    let ctx = GenerationContext {
        time_context: Some(time_of_day(now.with_timezone(&tz).hour()).to_string()),
        ..Default::default()
    };
    let reply = conversation.respond(&generator, text, &ctx, now, tz).await;
    println!("{reply}");
    Ok(())
}

/// Line-at-a-time command loop. Each line is handled as one utterance. Blank line, EOF or
/// Ctrl-C exits.
pub async fn voice() -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.timezone()?;
    let path = calendar_path()?;

    let mut assistant = VoiceAssistant::new(
        read_calendar(&path)?,
        tz,
        Conversation::new(cfg.chat.max_turns_context),
        GeminiClient::from_config(&cfg),
        CommandSpeech::from_config(&cfg.speech),
    )
    .context("compile voice command patterns")?;

    if let Some(notice) = assistant.startup_notice() {
        println!("{notice}");
    }
    println!("Say something (\"help\" for commands, empty line to quit).");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("read stdin")?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line.filter(|l| !l.trim().is_empty()) else {
            break;
        };
        let reply = handle_utterance(&mut assistant, &path, &line, Utc::now()).await?;
        if !reply.is_empty() {
            println!("> {reply}");
        }
    }
    Ok(())
}

/// Handle one utterance against the calendar as it is on disk now, and save right away if the
/// utterance changed it.
async fn handle_utterance<G: TextGenerator, S: SpeechSink>(
    assistant: &mut VoiceAssistant<G, S>,
    path: &Path,
    line: &str,
    now: DateTime<Utc>,
) -> Result<String> {
    *assistant.calendar_mut() = read_calendar(path)?;
    let before = assistant.calendar().all().to_vec();

    let reply = assistant.handle(line, now).await;

    if assistant.calendar().all() != before.as_slice() {
        write_calendar(path, assistant.calendar())?;
    }
    Ok(reply)
}
