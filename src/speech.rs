// src/speech.rs
//! Speech backends for call announcements.
//!
//! Speaking is fire and forget: a backend starts the utterance and returns.
//! Overlapping calls are left to the backend to interleave or cut over.

use log::{debug, info, warn};
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tokio::runtime::Handle;

use crate::config::SpeechBackend;
use crate::constants::SPEECH_BASE_WPM;

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("failed to start speech program '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("speech unavailable: {0}")]
    Unavailable(String),
}

/// Text plus voice settings, as configured for the terminal
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    /// 0.0..=1.0
    pub volume: f32,
    /// 1.0 is normal speed
    pub rate: f32,
    /// 0.0..=2.0
    pub pitch: f32,
}

impl Utterance {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into(), volume: 1.0, rate: 1.0, pitch: 1.0 }
    }
}

pub trait Speaker: Send + Sync {
    fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError>;
}

/// Runs an espeak compatible program per utterance. Must be used from
/// inside a tokio runtime, which reaps the children.
#[derive(Debug, Clone)]
pub struct CommandSpeaker {
    program: String,
    voice: Option<String>,
}

impl CommandSpeaker {
    pub fn new(program: impl Into<String>) -> Self {
        Self { program: program.into(), voice: None }
    }

    /// Builder: espeak voice name, e.g. "en-gb"
    pub fn voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    /// espeak arguments for an utterance
    pub fn args(&self, utterance: &Utterance) -> Vec<String> {
        let amplitude = (utterance.volume.clamp(0.0, 1.0) * 200.0).round() as u32;
        let wpm = (utterance.rate.clamp(0.1, 10.0) * SPEECH_BASE_WPM).round() as u32;
        let pitch = (utterance.pitch.clamp(0.0, 2.0) / 2.0 * 99.0).round() as u32;

        let mut args = vec![
            "-a".to_string(),
            amplitude.to_string(),
            "-s".to_string(),
            wpm.to_string(),
            "-p".to_string(),
            pitch.to_string(),
        ];
        if let Some(voice) = &self.voice {
            args.push("-v".to_string());
            args.push(voice.clone());
        }
        args.push("--".to_string());
        args.push(utterance.text.clone());
        args
    }
}

impl Speaker for CommandSpeaker {
    fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        let runtime = Handle::try_current().map_err(|e| SpeechError::Unavailable(e.to_string()))?;
        let mut child = Command::new(&self.program)
            .args(self.args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| SpeechError::Spawn { program: self.program.clone(), source })?;

        debug!("Speaking via {} (pid {:?})", self.program, child.id());
        let program = self.program.clone();
        runtime.spawn(async move {
            match child.wait().await {
                Ok(status) if !status.success() => warn!("{} exited with {}", program, status),
                Ok(_) => {}
                Err(e) => warn!("Could not wait for {}: {}", program, e),
            }
        });
        Ok(())
    }
}

/// Writes announcements to the log only
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&self, utterance: &Utterance) -> Result<(), SpeechError> {
        info!("Announcement: {}", utterance.text);
        Ok(())
    }
}

/// Speaker for the configured backend; `None` when speech is switched off
pub fn build_speaker(backend: SpeechBackend, command: &str) -> Result<Option<Box<dyn Speaker>>, SpeechError> {
    match backend {
        SpeechBackend::Off => Ok(None),
        SpeechBackend::Log => Ok(Some(Box::new(LogSpeaker))),
        SpeechBackend::Command if command.trim().is_empty() => {
            Err(SpeechError::Unavailable("no speech command configured".to_string()))
        }
        SpeechBackend::Command => Ok(Some(Box::new(CommandSpeaker::new(command.trim())))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voice_settings_map_to_espeak_ranges() {
        let speaker = CommandSpeaker::new("espeak-ng");
        let utterance = Utterance { text: "Number A001".into(), volume: 0.5, rate: 1.0, pitch: 2.0 };
        assert_eq!(
            speaker.args(&utterance),
            vec!["-a", "100", "-s", "175", "-p", "99", "--", "Number A001"]
        );
    }

    #[test]
    fn test_out_of_range_settings_are_clamped() {
        let speaker = CommandSpeaker::new("espeak-ng").voice("en-gb");
        let utterance = Utterance { text: "-x".into(), volume: 3.0, rate: 2.0, pitch: -1.0 };
        let args = speaker.args(&utterance);
        assert_eq!(args[..6], ["-a", "200", "-s", "350", "-p", "0"]);
        assert_eq!(args[6..], ["-v", "en-gb", "--", "-x"]);
    }

    #[test]
    fn test_backend_selection() {
        assert!(build_speaker(SpeechBackend::Off, "espeak-ng").unwrap().is_none());
        assert!(build_speaker(SpeechBackend::Log, "").unwrap().is_some());
        assert!(matches!(build_speaker(SpeechBackend::Command, " "), Err(SpeechError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_missing_program_is_an_error() {
        let speaker = CommandSpeaker::new("/nonexistent/qumons-speech");
        let err = speaker.speak(&Utterance::new("hello")).unwrap_err();
        assert!(matches!(err, SpeechError::Spawn { .. }));
    }

    #[test]
    fn test_command_speaker_needs_a_runtime() {
        let speaker = CommandSpeaker::new("true");
        let err = speaker.speak(&Utterance::new("hello")).unwrap_err();
        assert!(matches!(err, SpeechError::Unavailable(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_spoken_child_is_reaped_by_the_runtime() {
        let speaker = CommandSpeaker::new("true");
        speaker.speak(&Utterance::new("A001 to window 2")).unwrap();
        speaker.speak(&Utterance::new("A002 to window 2")).unwrap();
        // the wait tasks finish once the children exit
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    }
}
