/// Cinematic preview: play a narrative script in the terminal.
///
/// Usage: cinematic_preview <script.json> [--config <playback.ron>]
///        [--manifest <stage.json>] [--seed <n>] [--instant] [--save <path>]
///
/// Text is typed out with the configured delays. Choice prompts are answered
/// by number on stdin. Set RUST_LOG=debug to see beat and scene transitions.

use narrative_cinematic::core::config::PlaybackConfig;
use narrative_cinematic::core::director::CinematicDirector;
use narrative_cinematic::core::player::{BeatPlayer, StepEvent};
use narrative_cinematic::core::presentation::{AudioBus, AudioCue, PresentationError, Presenter, VisualPreset};
use narrative_cinematic::core::render::{DissolveStep, RenderStep};
use narrative_cinematic::core::save::{GameState, SaveStore};
use narrative_cinematic::core::stage::{SceneLoader, StageController, StageError, StageManifest};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

struct TerminalPresenter;

impl Presenter for TerminalPresenter {
    fn apply_visual(&mut self, preset: VisualPreset) -> Result<(), PresentationError> {
        info!(%preset, "visual preset");
        Ok(())
    }

    fn show_visual(&mut self, name: &str) -> Result<(), PresentationError> {
        info!(visual = name, "show visual");
        Ok(())
    }

    fn play_audio(&mut self, bus: AudioBus, cue: AudioCue) -> Result<(), PresentationError> {
        info!(?bus, ?cue, "audio cue");
        Ok(())
    }
}

struct TerminalSceneLoader;

impl SceneLoader for TerminalSceneLoader {
    fn transition_to(&mut self, scene_id: &str) -> Result<(), StageError> {
        info!(scene = scene_id, "scene transition");
        Ok(())
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let script = args[1].clone();
    let mut config_path = None;
    let mut manifest_path = None;
    let mut save_path = None;
    let mut seed = None;
    let mut instant = false;

    let mut i = 2;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                config_path = Some(args[i].clone());
            }
            "--manifest" if i + 1 < args.len() => {
                i += 1;
                manifest_path = Some(args[i].clone());
            }
            "--save" if i + 1 < args.len() => {
                i += 1;
                save_path = Some(args[i].clone());
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                seed = args[i].parse().ok();
            }
            "--instant" => instant = true,
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    let mut config = match config_path {
        Some(ref path) => match PlaybackConfig::load_from_ron(Path::new(path)) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => PlaybackConfig::default(),
    };
    if let Some(seed) = seed {
        config = config.seed(seed);
    }
    if instant {
        config = PlaybackConfig::instant().seed(config.seed);
    }

    let director = CinematicDirector::from_json_file(&script);
    let plan = match director.get_plan() {
        Ok(plan) => plan,
        Err(e) => {
            eprintln!("Error loading {}: {}", script, e);
            std::process::exit(1);
        }
    };

    let manifest = match manifest_path {
        Some(ref path) => match StageManifest::load_from_json(Path::new(path)) {
            Ok(manifest) => manifest,
            Err(e) => {
                eprintln!("Error loading manifest {}: {}", path, e);
                std::process::exit(1);
            }
        },
        None => StageManifest::for_plan("preview", None, &plan),
    };

    let player = BeatPlayer::new(plan, config, GameState::new().shared(), TerminalPresenter);
    let mut stage = match StageController::new(player, manifest, TerminalSceneLoader) {
        Ok(stage) => stage,
        Err(e) => {
            eprintln!("Invalid manifest: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = play(&mut stage, instant) {
        eprintln!("\nPlayback stopped: {}", e);
        std::process::exit(1);
    }

    let game = stage.player().game().borrow();
    println!("\n--- Alignment ---");
    println!("{}", game.scorer.score_summary());
    if !game.player_name().is_empty() {
        println!("Player: {}", game.player_name());
    }

    if let Some(path) = save_path {
        match SaveStore::new(&path).save(&game) {
            Ok(_) => println!("Saved to {}", path),
            Err(e) => eprintln!("Error saving {}: {}", path, e),
        }
    }
}

fn play(stage: &mut StageController<TerminalSceneLoader>, instant: bool) -> Result<(), StageError> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    while let Some(step) = stage.step()? {
        match step.event {
            StepEvent::Text(RenderStep::Char(ch)) => print!("{}", ch),
            StepEvent::Text(RenderStep::Glitch { glyph }) => print!("{}", glyph),
            StepEvent::Text(RenderStep::Settle(ch)) => print!("\u{8}{}", ch),
            StepEvent::Text(RenderStep::LineBreak) => println!(),
            StepEvent::Dissolve(DissolveStep::Clear) => println!(),
            StepEvent::ChoicePresented { options, .. } => {
                for (n, label) in options.iter().enumerate() {
                    println!("  [{}] {}", n + 1, label);
                }
                let index = read_choice(&stdin, &mut stdout, options.len());
                stage.confirm_choice(index)?;
            }
            _ => {}
        }
        stdout.flush().ok();
        if !instant && !step.delay.is_zero() {
            std::thread::sleep(step.delay);
        }
    }
    Ok(())
}

fn read_choice(stdin: &io::Stdin, stdout: &mut io::Stdout, count: usize) -> usize {
    loop {
        print!("> ");
        stdout.flush().ok();
        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            return 0;
        }
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=count).contains(&n) => return n - 1,
            _ => println!("Enter a number from 1 to {}", count),
        }
    }
}

fn print_usage() {
    eprintln!("Usage: cinematic_preview <script.json> [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <playback.ron>  Timing and effect settings");
    eprintln!("  --manifest <stage.json>  Stage manifest (default: one scene per beat)");
    eprintln!("  --seed <n>               RNG seed for glitch effects");
    eprintln!("  --instant                No delays or effects");
    eprintln!("  --save <path>            Write a save file when playback ends");
}
