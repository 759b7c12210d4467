/// Stage control: maps beats onto game scenes and hands off to the next stage.
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::loader::ContentError;
use crate::core::player::{BeatPlayer, PlayerError, PlayerStep, RunSummary, StepEvent};
use crate::core::presentation::ChoicePresenter;
use crate::schema::beat::{BeatKind, CinematicPlan};

#[derive(Debug, Error)]
pub enum StageError {
    #[error("content error: {0}")]
    Content(#[from] ContentError),
    #[error("invalid stage manifest: {0}")]
    Validation(String),
    #[error("scene transition failed: {0}")]
    Scene(String),
    #[error("player error: {0}")]
    Player(#[from] PlayerError),
}

/// Performs the host's actual scene or stage switch.
pub trait SceneLoader {
    fn transition_to(&mut self, scene_id: &str) -> Result<(), StageError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneEntry {
    pub id: String,
    pub display_name: String,
    /// First beat played in this scene. The scene runs until the next entry's beat.
    pub beat: BeatKind,
}

/// The scenes making up one stage, in play order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageManifest {
    pub stage_id: String,
    pub next_stage: Option<String>,
    pub scenes: Vec<SceneEntry>,
}

impl StageManifest {
    /// One scene per beat, named after the beat.
    pub fn for_plan(
        stage_id: impl Into<String>,
        next_stage: Option<String>,
        plan: &CinematicPlan,
    ) -> Self {
        let scenes = plan
            .kinds()
            .map(|kind| SceneEntry {
                id: kind.as_str().to_string(),
                display_name: display_name(kind),
                beat: kind,
            })
            .collect();
        Self {
            stage_id: stage_id.into(),
            next_stage,
            scenes,
        }
    }

    pub fn load_from_json(path: &Path) -> Result<Self, StageError> {
        let source = std::fs::read_to_string(path).map_err(ContentError::from)?;
        Self::parse_json(&source)
    }

    pub fn parse_json(source: &str) -> Result<Self, StageError> {
        let manifest: Self = serde_json::from_str(source).map_err(ContentError::from)?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Scenes must be non-empty, uniquely named and in canonical beat order.
    pub fn validate(&self) -> Result<(), StageError> {
        if self.scenes.is_empty() {
            return Err(StageError::Validation(format!(
                "stage {} has no scenes",
                self.stage_id
            )));
        }
        let mut seen = FxHashSet::default();
        for scene in &self.scenes {
            if !seen.insert(scene.id.as_str()) {
                return Err(StageError::Validation(format!(
                    "duplicate scene id {}",
                    scene.id
                )));
            }
        }
        for pair in self.scenes.windows(2) {
            if pair[1].beat <= pair[0].beat {
                return Err(StageError::Validation(format!(
                    "scene {} ({}) does not follow {} ({}) in story order",
                    pair[1].id, pair[1].beat, pair[0].id, pair[0].beat
                )));
            }
        }
        Ok(())
    }

    /// Index of the scene that plays `kind`. Beats before the first entry
    /// belong to the first scene.
    pub fn scene_for(&self, kind: BeatKind) -> usize {
        self.scenes
            .iter()
            .rposition(|scene| scene.beat <= kind)
            .unwrap_or(0)
    }
}

fn display_name(kind: BeatKind) -> String {
    kind.as_str()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sequences the stage's scenes around one `BeatPlayer`.
///
/// Holds no branching logic: the plan decides what plays, the player decides
/// when, and this only tells the host which scene is showing.
pub struct StageController<L: SceneLoader> {
    player: BeatPlayer,
    manifest: StageManifest,
    loader: L,
    scene: Option<usize>,
    completed: bool,
}

impl<L: SceneLoader> StageController<L> {
    pub fn new(player: BeatPlayer, manifest: StageManifest, loader: L) -> Result<Self, StageError> {
        manifest.validate()?;
        Ok(Self {
            player,
            manifest,
            loader,
            scene: None,
            completed: false,
        })
    }

    pub fn player(&self) -> &BeatPlayer {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut BeatPlayer {
        &mut self.player
    }

    pub fn manifest(&self) -> &StageManifest {
        &self.manifest
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    pub fn current_scene(&self) -> Option<&SceneEntry> {
        self.scene.and_then(|i| self.manifest.scenes.get(i))
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    /// Enter the first scene.
    pub fn begin(&mut self) -> Result<(), StageError> {
        info!(stage = %self.manifest.stage_id, "stage started");
        self.enter(0)
    }

    /// Move to the next scene, or finish the stage after the last one.
    pub fn advance(&mut self) -> Result<(), StageError> {
        if self.completed {
            return Ok(());
        }
        let next = self.scene.map_or(0, |i| i + 1);
        if let Some(current) = self.current_scene() {
            let id = current.id.clone();
            self.player
                .game()
                .borrow_mut()
                .scene_progress
                .insert(id, Value::Bool(true));
        }
        if next < self.manifest.scenes.len() {
            self.enter(next)
        } else {
            self.complete()
        }
    }

    /// Pull the next player step, switching scenes as beats cross scene
    /// boundaries. `Ok(None)` once the stage is complete.
    pub fn step(&mut self) -> Result<Option<PlayerStep>, StageError> {
        if self.completed {
            return Ok(None);
        }
        if self.scene.is_none() {
            self.begin()?;
        }
        let Some(step) = self.player.next() else {
            while !self.completed {
                self.advance()?;
            }
            return Ok(None);
        };
        match step.event {
            StepEvent::BeatStarted(kind) => {
                let target = self.manifest.scene_for(kind);
                while self.scene.is_some_and(|i| i < target) {
                    self.advance()?;
                }
            }
            StepEvent::BeatCompleted(BeatKind::Exit) if self.player.is_done() => {
                while !self.completed {
                    self.advance()?;
                }
            }
            _ => {}
        }
        Ok(Some(step))
    }

    pub fn confirm_choice(&mut self, index: usize) -> Result<(), StageError> {
        self.player.confirm_choice(index)?;
        Ok(())
    }

    /// Drive the stage to completion without waiting.
    pub fn run_with(&mut self, chooser: &mut dyn ChoicePresenter) -> Result<RunSummary, StageError> {
        let mut steps = 0;
        let mut elapsed = std::time::Duration::ZERO;
        let mut choices = Vec::new();
        while let Some(step) = self.step()? {
            steps += 1;
            elapsed = elapsed.saturating_add(step.delay);
            if let StepEvent::ChoicePresented {
                prompt, options, ..
            } = &step.event
            {
                let labels: Vec<&str> = options.iter().map(String::as_str).collect();
                let index = chooser.choose(prompt, &labels);
                choices.push(self.player.confirm_choice(index)?);
            }
        }
        let thread = self.player.game().borrow().thread;
        Ok(RunSummary {
            steps,
            elapsed,
            choices,
            thread,
        })
    }

    fn enter(&mut self, index: usize) -> Result<(), StageError> {
        let scene = &self.manifest.scenes[index];
        debug!(scene = %scene.id, name = %scene.display_name, "entering scene");
        self.loader.transition_to(&scene.id)?;
        self.scene = Some(index);
        self.player.game().borrow_mut().current_scene = index;
        Ok(())
    }

    fn complete(&mut self) -> Result<(), StageError> {
        let thread = {
            let mut game = self.player.game().borrow_mut();
            let thread = game.scorer.resolve_thread();
            game.thread = thread;
            game.selected_dreamweaver = Some(thread.label().to_string());
            thread
        };
        self.completed = true;
        info!(stage = %self.manifest.stage_id, thread = %thread, "stage complete");
        if let Some(next) = &self.manifest.next_stage {
            info!(next = %next, "transitioning to next stage");
            self.loader.transition_to(next)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::PlaybackConfig;
    use crate::core::director::build_plan;
    use crate::core::presentation::{FixedChooser, NullPresenter};
    use crate::core::save::GameState;
    use crate::schema::alignment::DreamweaverThread;
    use crate::schema::document::{NarrativeDocument, OptionRecord, ScoreRecord};
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingLoader {
        requests: Vec<String>,
        fail_on: Option<String>,
    }

    impl SceneLoader for RecordingLoader {
        fn transition_to(&mut self, scene_id: &str) -> Result<(), StageError> {
            if self.fail_on.as_deref() == Some(scene_id) {
                return Err(StageError::Scene(format!("cannot load {scene_id}")));
            }
            self.requests.push(scene_id.to_string());
            Ok(())
        }
    }

    fn plan() -> Arc<CinematicPlan> {
        let option = OptionRecord {
            id: "only".to_string(),
            text: "Only".to_string(),
            scores: ScoreRecord {
                light: 0,
                shadow: 2,
                ambition: 0,
            },
            ..OptionRecord::default()
        };
        let mut doc = NarrativeDocument::default();
        doc.opening_monologue.lines = vec!["hi".to_string()];
        doc.first_choice.question.options = vec![option.clone()];
        doc.story_fragment.question.options = vec![option.clone()];
        doc.secret_question.options = vec![option.clone()];
        doc.name_question.options = vec![option];
        Arc::new(build_plan(doc))
    }

    fn player() -> BeatPlayer {
        BeatPlayer::new(
            plan(),
            PlaybackConfig::instant(),
            GameState::new().shared(),
            NullPresenter,
        )
    }

    fn scene(id: &str, beat: BeatKind) -> SceneEntry {
        SceneEntry {
            id: id.to_string(),
            display_name: id.to_string(),
            beat,
        }
    }

    #[test]
    fn manifest_for_plan_has_one_scene_per_beat() {
        let manifest = StageManifest::for_plan("stage_1", Some("stage_2".to_string()), &plan());
        assert_eq!(manifest.scenes.len(), 11);
        assert_eq!(manifest.scenes[0].id, "boot_sequence");
        assert_eq!(manifest.scenes[0].display_name, "Boot Sequence");
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn manifest_rejects_out_of_order_and_duplicates() {
        let mut manifest = StageManifest {
            stage_id: "s".to_string(),
            next_stage: None,
            scenes: vec![scene("a", BeatKind::Monologue), scene("b", BeatKind::BootSequence)],
        };
        assert!(matches!(manifest.validate(), Err(StageError::Validation(_))));

        manifest.scenes = vec![scene("a", BeatKind::BootSequence), scene("a", BeatKind::Exit)];
        assert!(matches!(manifest.validate(), Err(StageError::Validation(_))));

        manifest.scenes.clear();
        assert!(matches!(manifest.validate(), Err(StageError::Validation(_))));
    }

    #[test]
    fn manifest_parses_snake_case_beats() {
        let manifest = StageManifest::parse_json(
            r#"{
                "stageId": "ghost_terminal",
                "nextStage": "nethack",
                "scenes": [
                    { "id": "boot", "displayName": "Boot", "beat": "boot_sequence" },
                    { "id": "questions", "displayName": "Questions", "beat": "initial_choice" }
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.scenes[1].beat, BeatKind::InitialChoice);
        assert_eq!(manifest.scene_for(BeatKind::Monologue), 0);
        assert_eq!(manifest.scene_for(BeatKind::Exit), 1);
    }

    #[test]
    fn bad_manifest_json_is_a_content_error() {
        assert!(matches!(
            StageManifest::parse_json("{}"),
            Err(StageError::Content(ContentError::Json(_)))
        ));
    }

    #[test]
    fn one_transition_per_scene_then_next_stage() {
        let manifest = StageManifest::for_plan("stage_1", Some("stage_2".to_string()), &plan());
        let mut controller =
            StageController::new(player(), manifest, RecordingLoader::default()).unwrap();
        let summary = controller.run_with(&mut FixedChooser(0)).unwrap();

        let mut expected: Vec<String> = BeatKind::CANONICAL_ORDER
            .iter()
            .map(|k| k.as_str().to_string())
            .collect();
        expected.push("stage_2".to_string());
        assert_eq!(controller.loader().requests, expected);
        assert!(controller.is_complete());
        assert_eq!(summary.thread, DreamweaverThread::Shadow);

        let game = controller.player().game().borrow();
        assert_eq!(game.thread, DreamweaverThread::Shadow);
        assert_eq!(game.selected_dreamweaver.as_deref(), Some("Shadow"));
        assert_eq!(game.current_scene, 10);
        assert_eq!(game.scene_progress.len(), 11);
    }

    #[test]
    fn grouped_scenes_switch_at_their_first_beat() {
        let manifest = StageManifest {
            stage_id: "s".to_string(),
            next_stage: None,
            scenes: vec![
                scene("intro", BeatKind::BootSequence),
                scene("questions", BeatKind::InitialChoice),
                scene("farewell", BeatKind::Exit),
            ],
        };
        let mut controller =
            StageController::new(player(), manifest, RecordingLoader::default()).unwrap();
        controller.run_with(&mut FixedChooser(0)).unwrap();
        assert_eq!(controller.loader().requests, vec!["intro", "questions", "farewell"]);
    }

    #[test]
    fn scene_failure_propagates() {
        let manifest = StageManifest::for_plan("s", None, &plan());
        let loader = RecordingLoader {
            fail_on: Some("monologue".to_string()),
            ..RecordingLoader::default()
        };
        let mut controller = StageController::new(player(), manifest, loader).unwrap();
        let err = controller.run_with(&mut FixedChooser(0)).unwrap_err();
        assert!(matches!(err, StageError::Scene(_)));
        assert_eq!(controller.current_scene().map(|s| s.id.as_str()), Some("boot_sequence"));
    }

    #[test]
    fn advance_after_completion_is_a_no_op() {
        let manifest = StageManifest {
            stage_id: "s".to_string(),
            next_stage: Some("next".to_string()),
            scenes: vec![scene("only", BeatKind::BootSequence)],
        };
        let mut controller =
            StageController::new(player(), manifest, RecordingLoader::default()).unwrap();
        controller.begin().unwrap();
        controller.advance().unwrap();
        assert!(controller.is_complete());
        controller.advance().unwrap();
        assert_eq!(controller.loader().requests, vec!["only", "next"]);
        assert!(controller.step().unwrap().is_none());
    }
}
