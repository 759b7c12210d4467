/// End-to-end playthroughs: plan, player, stage controller and save file.

use narrative_cinematic::core::config::PlaybackConfig;
use narrative_cinematic::core::director::CinematicDirector;
use narrative_cinematic::core::player::{BeatPlayer, StepEvent};
use narrative_cinematic::core::presentation::{NullPresenter, ScriptedChooser};
use narrative_cinematic::core::render::RenderStep;
use narrative_cinematic::core::save::{GameState, SaveStore};
use narrative_cinematic::core::stage::{SceneLoader, StageController, StageError, StageManifest};
use narrative_cinematic::schema::alignment::{AlignmentState, DreamweaverThread};
use narrative_cinematic::schema::beat::BeatKind;
use std::path::Path;
use std::time::Duration;

const GHOST_TERMINAL: &str = "tests/fixtures/ghost_terminal.json";

#[derive(Default)]
struct Loader {
    requests: Vec<String>,
}

impl SceneLoader for Loader {
    fn transition_to(&mut self, scene_id: &str) -> Result<(), StageError> {
        self.requests.push(scene_id.to_string());
        Ok(())
    }
}

fn player(config: PlaybackConfig) -> BeatPlayer {
    let plan = CinematicDirector::from_json_file(GHOST_TERMINAL)
        .get_plan()
        .unwrap();
    BeatPlayer::new(plan, config, GameState::new().shared(), NullPresenter)
}

fn stage(config: PlaybackConfig) -> StageController<Loader> {
    let manifest =
        StageManifest::load_from_json(Path::new("tests/fixtures/stage_manifest.json")).unwrap();
    StageController::new(player(config), manifest, Loader::default()).unwrap()
}

#[test]
fn light_playthrough_commits_to_light() {
    let mut stage = stage(PlaybackConfig::instant());
    let summary = stage.run_with(&mut ScriptedChooser::new([0, 0, 0, 0])).unwrap();

    assert_eq!(summary.thread, DreamweaverThread::Light);
    assert_eq!(summary.choices.len(), 4);
    assert_eq!(
        stage.loader().requests,
        vec!["boot", "monologue", "first_question", "story", "secret", "name", "exit", "echo_hub"]
    );

    let game = stage.player().game().borrow();
    assert_eq!(
        game.scorer.state(),
        AlignmentState {
            light: 6,
            shadow: 0,
            ambition: 0
        }
    );
    assert_eq!(game.player_name(), "Wanderer");
    assert_eq!(game.shards, vec!["ghost_terminal_eye".to_string()]);
    assert_eq!(game.selected_dreamweaver.as_deref(), Some("Light"));
    assert_eq!(stage.player().visible_text(), "THREAD LOCKED: LIGHT\nWake up.\n");
}

#[test]
fn split_choices_resolve_to_balance() {
    let mut stage = stage(PlaybackConfig::instant());
    let summary = stage.run_with(&mut ScriptedChooser::new([0, 1, 1, 1])).unwrap();

    assert_eq!(summary.thread, DreamweaverThread::Balance);
    let game = stage.player().game().borrow();
    assert_eq!(
        game.scorer.state(),
        AlignmentState {
            light: 2,
            shadow: 3,
            ambition: 1
        }
    );
    assert_eq!(game.player_name(), "Nobody");
    assert!(stage
        .player()
        .visible_text()
        .starts_with("THREAD LOCKED: BALANCE"));
}

#[test]
fn timed_playback_keeps_exact_text() {
    let config = PlaybackConfig::load_from_ron(Path::new("tests/fixtures/playback.ron")).unwrap();
    let mut player = player(config);
    let mut monologue = String::new();
    let mut in_monologue = false;
    let mut elapsed = Duration::ZERO;
    let mut glitches = 0;

    while let Some(step) = player.next() {
        elapsed += step.delay;
        match &step.event {
            StepEvent::BeatStarted(kind) => in_monologue = *kind == BeatKind::Monologue,
            StepEvent::BeatCompleted(BeatKind::Monologue) => monologue = player.visible_text(),
            StepEvent::Text(RenderStep::Glitch { .. }) if in_monologue => glitches += 1,
            StepEvent::ChoicePresented { .. } => {
                player.confirm_choice(0).unwrap();
            }
            _ => {}
        }
    }

    assert_eq!(
        monologue,
        "You were here before.\nThe terminal remembers, even when you do not.\n"
    );
    assert!(glitches > 0);
    assert!(elapsed > Duration::from_secs(5));
    assert!(player.is_done());
}

#[test]
fn seeded_playback_is_deterministic() {
    let config = PlaybackConfig::load_from_ron(Path::new("tests/fixtures/playback.ron")).unwrap();
    let run = |config: PlaybackConfig| {
        let mut player = player(config);
        let mut events = Vec::new();
        while let Some(step) = player.next() {
            if matches!(step.event, StepEvent::ChoicePresented { .. }) {
                player.confirm_choice(1).unwrap();
            }
            events.push(step);
        }
        events
    };
    assert_eq!(run(config.clone()), run(config));
}

#[test]
fn saved_run_restores_alignment() {
    let mut stage = stage(PlaybackConfig::instant());
    stage
        .run_with(&mut ScriptedChooser::new([2, 2, 1, 0]))
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let store = SaveStore::new(dir.path().join("save.json"));
    let before = stage.player().game().borrow().clone();
    store.save(&before).unwrap();

    let restored = store.load().unwrap().unwrap().restore();
    assert_eq!(restored.scorer.state(), before.scorer.state());
    assert_eq!(restored.thread, before.thread);
    assert_eq!(restored.thread, DreamweaverThread::Ambition);
    assert_eq!(restored.shards, before.shards);
    assert_eq!(restored.current_scene, 6);
    assert_eq!(restored.scene_progress.len(), 7);
}
