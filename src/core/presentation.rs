/// Presentation collaborators: the narrow seams between playback and the
/// host's renderer, audio mixer and choice UI.
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::schema::alignment::DreamweaverThread;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PresentationError {
    #[error("missing presentation resource: {0}")]
    MissingResource(String),
    #[error("presentation backend failed: {0}")]
    Backend(String),
}

/// Screen-wide looks the terminal can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VisualPreset {
    BootSequence,
    StableBaseline,
    SecretReveal,
    ThreadLight,
    ThreadShadow,
    ThreadAmbition,
    ThreadBalance,
}

impl VisualPreset {
    pub fn for_thread(thread: DreamweaverThread) -> Self {
        match thread {
            DreamweaverThread::Light => Self::ThreadLight,
            DreamweaverThread::Shadow => Self::ThreadShadow,
            DreamweaverThread::Ambition => Self::ThreadAmbition,
            DreamweaverThread::Balance => Self::ThreadBalance,
        }
    }
}

impl fmt::Display for VisualPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioBus {
    Ambient,
    Effects,
    Ui,
    Music,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioCue {
    BootHum,
    ChoicePrompt,
    ChoiceConfirm,
    SecretReveal,
    Transition,
}

/// Applies visual and audio effects on behalf of the beat player.
///
/// Failures are reported, never fatal: the player logs them and keeps going.
pub trait Presenter {
    fn apply_visual(&mut self, preset: VisualPreset) -> Result<(), PresentationError>;
    fn show_visual(&mut self, name: &str) -> Result<(), PresentationError>;
    fn play_audio(&mut self, bus: AudioBus, cue: AudioCue) -> Result<(), PresentationError>;
}

/// Collects one answer for a choice prompt.
pub trait ChoicePresenter {
    /// Returns an index into `labels`.
    fn choose(&mut self, prompt: &str, labels: &[&str]) -> usize;
}

/// Accepts every request and does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn apply_visual(&mut self, _preset: VisualPreset) -> Result<(), PresentationError> {
        Ok(())
    }

    fn show_visual(&mut self, _name: &str) -> Result<(), PresentationError> {
        Ok(())
    }

    fn play_audio(&mut self, _bus: AudioBus, _cue: AudioCue) -> Result<(), PresentationError> {
        Ok(())
    }
}

/// Always picks the same option index, clamped to the available range.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedChooser(pub usize);

impl ChoicePresenter for FixedChooser {
    fn choose(&mut self, _prompt: &str, labels: &[&str]) -> usize {
        self.0.min(labels.len().saturating_sub(1))
    }
}

/// Replays a scripted list of answers, then falls back to the first option.
#[derive(Debug, Clone, Default)]
pub struct ScriptedChooser {
    answers: std::collections::VecDeque<usize>,
}

impl ScriptedChooser {
    pub fn new(answers: impl IntoIterator<Item = usize>) -> Self {
        Self {
            answers: answers.into_iter().collect(),
        }
    }
}

impl ChoicePresenter for ScriptedChooser {
    fn choose(&mut self, _prompt: &str, labels: &[&str]) -> usize {
        let answer = self.answers.pop_front().unwrap_or(0);
        answer.min(labels.len().saturating_sub(1))
    }
}
