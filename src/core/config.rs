/// Playback configuration: text timing, ghost-writing and transition effects.
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::core::render;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
}

/// Timing and effect settings for the beat player.
///
/// Every field has a default, so a RON file only needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Seconds between typed characters.
    pub char_delay_secs: f64,
    /// Whether narration types with glitch glyphs. Boot lines always do.
    pub ghost_writing: bool,
    /// Chance per non-whitespace character of flashing a glyph first.
    pub ghost_probability: f64,
    /// Pause after each rendered line.
    pub line_pause_secs: f64,
    /// Wait between one beat finishing and the next starting.
    pub transition_delay_secs: f64,
    /// Length of the dissolve between beats; `None` skips it.
    pub dissolve_secs: Option<f64>,
    pub seed: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            char_delay_secs: 0.03,
            ghost_writing: true,
            ghost_probability: 0.22,
            line_pause_secs: 0.4,
            transition_delay_secs: 1.0,
            dissolve_secs: Some(1.5),
            seed: 0,
        }
    }
}

impl PlaybackConfig {
    pub fn load_from_ron(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    pub fn parse_ron(input: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(input)?)
    }

    /// Zero delays and no random effects. Useful for tests and fast-forward.
    pub fn instant() -> Self {
        Self {
            char_delay_secs: 0.0,
            ghost_writing: false,
            ghost_probability: 0.0,
            line_pause_secs: 0.0,
            transition_delay_secs: 0.0,
            dissolve_secs: None,
            seed: 0,
        }
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn char_delay(mut self, secs: f64) -> Self {
        self.char_delay_secs = secs;
        self
    }

    pub fn ghost_writing(mut self, enabled: bool) -> Self {
        self.ghost_writing = enabled;
        self
    }

    pub fn ghost_probability(mut self, probability: f64) -> Self {
        self.ghost_probability = render::probability(probability);
        self
    }

    pub fn line_pause(mut self, secs: f64) -> Self {
        self.line_pause_secs = secs;
        self
    }

    pub fn transition_delay(mut self, secs: f64) -> Self {
        self.transition_delay_secs = secs;
        self
    }

    pub fn dissolve(mut self, secs: Option<f64>) -> Self {
        self.dissolve_secs = secs;
        self
    }

    pub fn char_delay_duration(&self) -> Duration {
        secs(self.char_delay_secs)
    }

    pub fn line_pause_duration(&self) -> Duration {
        secs(self.line_pause_secs)
    }

    pub fn transition_duration(&self) -> Duration {
        secs(self.transition_delay_secs)
    }

    pub fn dissolve_duration(&self) -> Option<Duration> {
        self.dissolve_secs.map(secs)
    }
}

/// Negative and NaN values collapse to zero; values too large for a
/// `Duration` saturate.
pub(crate) fn secs(value: f64) -> Duration {
    if value.is_nan() || value <= 0.0 {
        Duration::ZERO
    } else {
        Duration::try_from_secs_f64(value).unwrap_or(Duration::MAX)
    }
}
