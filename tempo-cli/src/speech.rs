use std::path::PathBuf;
use std::process::{Child, Command, Stdio};

use tempo_core::SpeechSink;

use crate::config::SpeechSection;

const CANDIDATES: [&str; 3] = ["say", "espeak-ng", "espeak"];

/// Speaks through a local text-to-speech program. One utterance at a time.
#[derive(Debug)]
pub struct CommandSpeech {
    program: Option<PathBuf>,
    current: Option<Child>,
}

impl CommandSpeech {
    pub fn from_config(cfg: &SpeechSection) -> Self {
        let program = if !cfg.enabled {
            None
        } else if let Some(cmd) = cfg.command.as_deref() {
            which::which(cmd).ok()
        } else {
            CANDIDATES.iter().find_map(|c| which::which(c).ok())
        };
        if let Some(p) = &program {
            tracing::debug!(program = %p.display(), "speech output enabled");
        }
        Self {
            program,
            current: None,
        }
    }
}

impl SpeechSink for CommandSpeech {
    fn is_available(&self) -> bool {
        self.program.is_some()
    }

    fn speak(&mut self, text: &str) {
        self.cancel();
        let Some(program) = &self.program else {
            return;
        };
        match Command::new(program)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => self.current = Some(child),
            Err(e) => tracing::warn!(error = %e, "speech program failed to start"),
        }
    }

    fn cancel(&mut self) {
        if let Some(mut child) = self.current.take() {
            // Already exited is fine.
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Drop for CommandSpeech {
    fn drop(&mut self) {
        self.cancel();
    }
}
