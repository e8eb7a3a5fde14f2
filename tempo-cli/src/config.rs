use anyhow::{Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_tempo_home;

pub const API_KEY_ENV: &str = "TEMPO_GEMINI_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub assistant: AssistantSection,
    pub llm: LlmSection,
    pub chat: ChatSection,
    pub speech: SpeechSection,
    pub calendar: CalendarSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantSection {
    /// IANA zone used for the working window, peak hours, "today" and "tomorrow".
    pub timezone: String,
}

impl Default for AssistantSection {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Only "gemini" is supported; anything else runs offline.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: f32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key: None,
            temperature: 0.7,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSection {
    pub max_turns_context: usize,
}

impl Default for ChatSection {
    fn default() -> Self {
        Self {
            max_turns_context: tempo_core::conversation::DEFAULT_HISTORY_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechSection {
    pub enabled: bool,
    /// Text-to-speech program; the first of `say`, `espeak-ng`, `espeak` found on PATH if unset.
    pub command: Option<String>,
}

impl Default for SpeechSection {
    fn default() -> Self {
        Self {
            enabled: true,
            command: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarSection {
    pub google_token: Option<String>,
    pub outlook_token: Option<String>,
}

impl Config {
    pub fn timezone(&self) -> Result<Tz> {
        self.assistant
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid timezone in config: {}", self.assistant.timezone))
    }

    /// Config value first, then the environment.
    pub fn api_key(&self) -> Option<String> {
        self.llm
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_tempo_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    toml::from_str(&s).context("parse config.toml")
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [assistant]
            timezone = "America/Chicago"

            [speech]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timezone().unwrap(), chrono_tz::America::Chicago);
        assert!(!cfg.speech.enabled);
        assert_eq!(cfg.llm, LlmSection::default());
        assert_eq!(cfg.chat.max_turns_context, 10);
    }

    #[test]
    fn bad_timezone_is_an_error() {
        let mut cfg = Config::default();
        cfg.assistant.timezone = "Mars/Olympus".into();
        assert!(cfg.timezone().is_err());
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let back: Config = toml::from_str(&s).unwrap();
        assert_eq!(back, Config::default());
    }
}
