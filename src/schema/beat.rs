/// Beats: the closed set of playback units a cinematic plan is made of.
use serde::{Deserialize, Serialize};
use std::fmt;

use super::alignment::Score;
use super::document::{Metadata, OptionRecord, Question, SecretReveal};

/// Identifies a beat's slot in the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeatKind {
    BootSequence,
    Monologue,
    InitialChoice,
    StoryIntro,
    StoryChoice,
    StoryContinuation,
    SecretSetup,
    SecretChoice,
    NameSetup,
    NameChoice,
    Exit,
}

impl BeatKind {
    /// Every kind, in the order beats appear in a plan.
    pub const CANONICAL_ORDER: [BeatKind; 11] = [
        BeatKind::BootSequence,
        BeatKind::Monologue,
        BeatKind::InitialChoice,
        BeatKind::StoryIntro,
        BeatKind::StoryChoice,
        BeatKind::StoryContinuation,
        BeatKind::SecretSetup,
        BeatKind::SecretChoice,
        BeatKind::NameSetup,
        BeatKind::NameChoice,
        BeatKind::Exit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BootSequence => "boot_sequence",
            Self::Monologue => "monologue",
            Self::InitialChoice => "initial_choice",
            Self::StoryIntro => "story_intro",
            Self::StoryChoice => "story_choice",
            Self::StoryContinuation => "story_continuation",
            Self::SecretSetup => "secret_setup",
            Self::SecretChoice => "secret_choice",
            Self::NameSetup => "name_setup",
            Self::NameChoice => "name_choice",
            Self::Exit => "exit",
        }
    }

    pub fn from_str_opt(name: &str) -> Option<BeatKind> {
        Self::CANONICAL_ORDER
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name.trim()))
    }

    /// Position in `CANONICAL_ORDER`.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn is_choice(&self) -> bool {
        matches!(
            self,
            Self::InitialChoice | Self::StoryChoice | Self::SecretChoice | Self::NameChoice
        )
    }
}

impl fmt::Display for BeatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
    /// Persona the option is voiced toward (`hero`, `wrath`, ...).
    pub persona_tag: Option<String>,
    pub philosophical_tag: Option<String>,
    /// Text rendered after the option is confirmed.
    pub response: Option<String>,
    pub scores: Score,
}

impl From<OptionRecord> for ChoiceOption {
    fn from(record: OptionRecord) -> Self {
        Self {
            id: record.id,
            text: record.text,
            persona_tag: record.dreamweaver,
            philosophical_tag: record.philosophical,
            response: record.response,
            scores: record.scores.into(),
        }
    }
}

/// A question and its options, in presentation order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChoicePrompt {
    pub prompt: String,
    pub context: Option<String>,
    pub options: Vec<ChoiceOption>,
}

impl ChoicePrompt {
    pub fn labels(&self) -> Vec<&str> {
        self.options.iter().map(|o| o.text.as_str()).collect()
    }
}

impl From<Question> for ChoicePrompt {
    fn from(question: Question) -> Self {
        Self {
            prompt: question.prompt,
            context: question.context,
            options: question.options.into_iter().map(ChoiceOption::from).collect(),
        }
    }
}

/// What happens after the secret question is answered.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SecretRevealPlan {
    /// Named visual shown before the reveal lines.
    pub visual: Option<String>,
    pub lines: Vec<String>,
    /// Whether the reveal leaves a marker in the game state.
    pub persistent: bool,
    pub journal_entry: Option<String>,
}

impl From<SecretReveal> for SecretRevealPlan {
    fn from(reveal: SecretReveal) -> Self {
        Self {
            visual: reveal.visual,
            lines: reveal.text,
            persistent: reveal.persistent,
            journal_entry: reveal.journal_entry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Beat {
    Boot {
        glitch_lines: Vec<String>,
        fade_to_stable: bool,
    },
    Narration {
        kind: BeatKind,
        lines: Vec<String>,
        timing: Option<String>,
    },
    Choice {
        kind: BeatKind,
        setup_lines: Vec<String>,
        prompt: ChoicePrompt,
    },
    SecretChoice {
        kind: BeatKind,
        prompt: ChoicePrompt,
        reveal: SecretRevealPlan,
    },
}

impl Beat {
    pub fn kind(&self) -> BeatKind {
        match self {
            Beat::Boot { .. } => BeatKind::BootSequence,
            Beat::Narration { kind, .. }
            | Beat::Choice { kind, .. }
            | Beat::SecretChoice { kind, .. } => *kind,
        }
    }

    pub fn prompt(&self) -> Option<&ChoicePrompt> {
        match self {
            Beat::Choice { prompt, .. } | Beat::SecretChoice { prompt, .. } => Some(prompt),
            Beat::Boot { .. } | Beat::Narration { .. } => None,
        }
    }
}

/// The ordered, immutable beat sequence for one cinematic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CinematicPlan {
    metadata: Metadata,
    scene_type: Option<String>,
    beats: Vec<Beat>,
}

impl CinematicPlan {
    /// Beats must arrive in `BeatKind::CANONICAL_ORDER`.
    pub(crate) fn new(metadata: Metadata, scene_type: Option<String>, beats: [Beat; 11]) -> Self {
        debug_assert!(beats
            .iter()
            .map(Beat::kind)
            .eq(BeatKind::CANONICAL_ORDER.iter().copied()));
        Self {
            metadata,
            scene_type,
            beats: beats.into(),
        }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn scene_type(&self) -> Option<&str> {
        self.scene_type.as_deref()
    }

    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn beat(&self, kind: BeatKind) -> &Beat {
        &self.beats[kind.index()]
    }

    pub fn kinds(&self) -> impl Iterator<Item = BeatKind> + '_ {
        self.beats.iter().map(Beat::kind)
    }
}
