/// Alignment scoring across the three Dreamweaver persona axes.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schema::alignment::{
    AlignmentState, ChoiceRecord, DreamweaverThread, PersonaAxis, ScoreSink,
};
use crate::schema::beat::ChoiceOption;

/// Share of the total one axis needs before the thread commits to it, in tenths.
const DOMINANCE_TENTHS: i64 = 6;

impl ScoreSink for AlignmentState {
    fn update_axis(&mut self, axis: PersonaAxis, points: i32) {
        let score = self.get_mut(axis);
        *score = score.saturating_add(points);
    }
}

/// Accumulates persona-axis points from confirmed choices.
///
/// Scores are never clamped; negative weights can drive an axis below zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentScorer {
    state: AlignmentState,
    #[serde(skip)]
    history: Vec<ChoiceRecord>,
}

impl AlignmentScorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from previously saved totals. History starts empty.
    pub fn from_state(state: AlignmentState) -> Self {
        Self {
            state,
            history: Vec::new(),
        }
    }

    pub fn state(&self) -> AlignmentState {
        self.state
    }

    pub fn history(&self) -> &[ChoiceRecord] {
        &self.history
    }

    pub fn score(&self, axis: PersonaAxis) -> i32 {
        self.state.get(axis)
    }

    /// Add `points` to the axis named `axis_name`. Unknown names are ignored.
    pub fn update_score(&mut self, axis_name: &str, points: i32) {
        match PersonaAxis::from_name(axis_name) {
            Some(axis) => self.update_axis(axis, points),
            None => debug!(axis = axis_name, points, "ignoring score for unknown axis"),
        }
    }

    /// The axis with the strictly highest score; ties go to the earliest axis.
    pub fn dominant_axis(&self) -> PersonaAxis {
        let mut leader = PersonaAxis::ALL[0];
        for axis in PersonaAxis::ALL.into_iter().skip(1) {
            if self.state.get(axis) > self.state.get(leader) {
                leader = axis;
            }
        }
        leader
    }

    /// Record a confirmed option and apply its score once.
    pub fn apply_choice(&mut self, question_id: &str, option: &ChoiceOption) -> &ChoiceRecord {
        option.scores.apply_to(self);
        debug!(
            question = question_id,
            option = %option.id,
            light = self.state.light,
            shadow = self.state.shadow,
            ambition = self.state.ambition,
            "choice scored"
        );
        let index = self.history.len();
        self.history.push(ChoiceRecord {
            question_id: question_id.to_string(),
            option_id: option.id.clone(),
            text: option.text.clone(),
            score: option.scores,
        });
        &self.history[index]
    }

    /// The thread to commit to: the dominant axis if it holds at least 60% of
    /// the total, otherwise `Balance`. A non-positive total is always `Balance`.
    pub fn resolve_thread(&self) -> DreamweaverThread {
        let total: i64 = PersonaAxis::ALL
            .into_iter()
            .map(|axis| i64::from(self.score(axis)))
            .sum();
        if total <= 0 {
            return DreamweaverThread::Balance;
        }
        let dominant = self.dominant_axis();
        if i64::from(self.score(dominant)) * 10 >= total * DOMINANCE_TENTHS {
            dominant.into()
        } else {
            DreamweaverThread::Balance
        }
    }

    /// One line per axis with points and share of the total.
    pub fn score_summary(&self) -> String {
        let total = self.state.total();
        let mut lines = Vec::with_capacity(PersonaAxis::ALL.len() + 1);
        for axis in PersonaAxis::ALL {
            let points = self.score(axis);
            let share = if total > 0 {
                f64::from(points) * 100.0 / f64::from(total)
            } else {
                0.0
            };
            lines.push(format!(
                "{:<8} ({:<8}) {:>4} pts {:>5.1}%",
                axis.label(),
                axis.persona(),
                points,
                share
            ));
        }
        lines.push(format!("Thread: {}", self.resolve_thread()));
        lines.join("\n")
    }

    pub fn reset(&mut self) {
        self.state = AlignmentState::default();
        self.history.clear();
    }
}

impl ScoreSink for AlignmentScorer {
    fn update_axis(&mut self, axis: PersonaAxis, points: i32) {
        self.state.update_axis(axis, points);
    }
}
