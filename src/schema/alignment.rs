use serde::{Deserialize, Serialize};
use std::fmt;

use super::document::ScoreRecord;

/// One of the three Dreamweaver persona axes.
///
/// The declaration order is the canonical order used for tie-breaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PersonaAxis {
    /// Light, the Hero.
    Light,
    /// Shadow, Wrath.
    Shadow,
    /// Ambition, Mischief.
    Ambition,
}

impl PersonaAxis {
    /// All axes in canonical order. Dominance scans iterate this list, never a map.
    pub const ALL: [PersonaAxis; 3] = [PersonaAxis::Light, PersonaAxis::Shadow, PersonaAxis::Ambition];

    /// Lower-case key used in content and save files.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Shadow => "shadow",
            Self::Ambition => "ambition",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Shadow => "Shadow",
            Self::Ambition => "Ambition",
        }
    }

    /// The persona each axis is voiced by.
    pub fn persona(&self) -> &'static str {
        match self {
            Self::Light => "Hero",
            Self::Shadow => "Wrath",
            Self::Ambition => "Mischief",
        }
    }

    /// Parse an axis name or its persona alias, case-insensitively.
    pub fn from_name(name: &str) -> Option<PersonaAxis> {
        let name = name.trim();
        Self::ALL.into_iter().find(|axis| {
            name.eq_ignore_ascii_case(axis.key()) || name.eq_ignore_ascii_case(axis.persona())
        })
    }
}

impl fmt::Display for PersonaAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Receives per-axis score updates.
pub trait ScoreSink {
    fn update_axis(&mut self, axis: PersonaAxis, points: i32);
}

/// Author-declared weights of a single choice option.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Score {
    pub light: i32,
    pub shadow: i32,
    pub ambition: i32,
}

impl Score {
    pub fn new(light: i32, shadow: i32, ambition: i32) -> Self {
        Self {
            light,
            shadow,
            ambition,
        }
    }

    pub fn get(&self, axis: PersonaAxis) -> i32 {
        match axis {
            PersonaAxis::Light => self.light,
            PersonaAxis::Shadow => self.shadow,
            PersonaAxis::Ambition => self.ambition,
        }
    }

    pub fn is_zero(&self) -> bool {
        PersonaAxis::ALL.iter().all(|axis| self.get(*axis) == 0)
    }

    /// Send each non-zero component to `sink`, in canonical axis order.
    pub fn apply_to<S: ScoreSink + ?Sized>(&self, sink: &mut S) {
        for axis in PersonaAxis::ALL {
            let points = self.get(axis);
            if points != 0 {
                sink.update_axis(axis, points);
            }
        }
    }
}

impl From<ScoreRecord> for Score {
    fn from(record: ScoreRecord) -> Self {
        Score::new(record.light, record.shadow, record.ambition)
    }
}

/// Running totals for all three axes.
///
/// The three axes are fixed fields, so a state with a missing axis cannot exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignmentState {
    pub light: i32,
    pub shadow: i32,
    pub ambition: i32,
}

impl AlignmentState {
    pub fn get(&self, axis: PersonaAxis) -> i32 {
        match axis {
            PersonaAxis::Light => self.light,
            PersonaAxis::Shadow => self.shadow,
            PersonaAxis::Ambition => self.ambition,
        }
    }

    pub fn get_mut(&mut self, axis: PersonaAxis) -> &mut i32 {
        match axis {
            PersonaAxis::Light => &mut self.light,
            PersonaAxis::Shadow => &mut self.shadow,
            PersonaAxis::Ambition => &mut self.ambition,
        }
    }

    pub fn total(&self) -> i32 {
        self.light
            .saturating_add(self.shadow)
            .saturating_add(self.ambition)
    }
}

/// The narrative branch committed to at the end of the cinematic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum DreamweaverThread {
    #[default]
    Light,
    Shadow,
    Ambition,
    /// No axis holds a clear majority.
    Balance,
}

impl DreamweaverThread {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Light => "Light",
            Self::Shadow => "Shadow",
            Self::Ambition => "Ambition",
            Self::Balance => "Balance",
        }
    }

    pub fn from_label(label: &str) -> Option<DreamweaverThread> {
        [Self::Light, Self::Shadow, Self::Ambition, Self::Balance]
            .into_iter()
            .find(|thread| label.trim().eq_ignore_ascii_case(thread.label()))
    }
}

impl From<PersonaAxis> for DreamweaverThread {
    fn from(axis: PersonaAxis) -> Self {
        match axis {
            PersonaAxis::Light => Self::Light,
            PersonaAxis::Shadow => Self::Shadow,
            PersonaAxis::Ambition => Self::Ambition,
        }
    }
}

impl fmt::Display for DreamweaverThread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A confirmed choice, kept for history and transcripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRecord {
    pub question_id: String,
    pub option_id: String,
    pub text: String,
    pub score: Score,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(PersonaAxis, i32)>,
    }

    impl ScoreSink for Recorder {
        fn update_axis(&mut self, axis: PersonaAxis, points: i32) {
            self.calls.push((axis, points));
        }
    }

    #[test]
    fn axis_names_and_aliases() {
        assert_eq!(PersonaAxis::from_name("light"), Some(PersonaAxis::Light));
        assert_eq!(PersonaAxis::from_name("HERO"), Some(PersonaAxis::Light));
        assert_eq!(PersonaAxis::from_name("Wrath"), Some(PersonaAxis::Shadow));
        assert_eq!(PersonaAxis::from_name(" mischief "), Some(PersonaAxis::Ambition));
        assert_eq!(PersonaAxis::from_name("balance"), None);
        assert_eq!(PersonaAxis::from_name(""), None);
    }

    #[test]
    fn canonical_order_is_light_shadow_ambition() {
        assert_eq!(
            PersonaAxis::ALL,
            [PersonaAxis::Light, PersonaAxis::Shadow, PersonaAxis::Ambition]
        );
    }

    #[test]
    fn score_applies_only_nonzero_components() {
        let mut recorder = Recorder::default();
        Score::new(0, 1, 0).apply_to(&mut recorder);
        assert_eq!(recorder.calls, vec![(PersonaAxis::Shadow, 1)]);
    }

    #[test]
    fn zero_score_makes_no_calls() {
        let mut recorder = Recorder::default();
        let score = Score::default();
        assert!(score.is_zero());
        score.apply_to(&mut recorder);
        assert!(recorder.calls.is_empty());
    }

    #[test]
    fn alignment_state_serializes_all_three_axes() {
        let state = AlignmentState {
            light: 2,
            shadow: -1,
            ambition: 0,
        };
        let json = serde_json::to_value(state).unwrap();
        assert_eq!(json["light"], 2);
        assert_eq!(json["shadow"], -1);
        assert_eq!(json["ambition"], 0);
        assert_eq!(state.total(), 1);
    }

    #[test]
    fn total_saturates() {
        let state = AlignmentState {
            light: i32::MAX,
            shadow: i32::MAX,
            ambition: 1,
        };
        assert_eq!(state.total(), i32::MAX);
    }

    #[test]
    fn thread_labels_round_trip() {
        for thread in [
            DreamweaverThread::Light,
            DreamweaverThread::Shadow,
            DreamweaverThread::Ambition,
            DreamweaverThread::Balance,
        ] {
            assert_eq!(DreamweaverThread::from_label(thread.label()), Some(thread));
        }
        assert_eq!(DreamweaverThread::from_label("hero"), None);
    }
}
