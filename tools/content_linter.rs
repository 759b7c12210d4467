/// Content Linter: validates narrative scripts before they ship.
///
/// Usage: content_linter <script.json | dir> [--manifest <stage.json>]

use narrative_cinematic::core::director::build_plan;
use narrative_cinematic::core::player::THREAD_NAME_TOKEN;
use narrative_cinematic::core::render::parse_pause;
use narrative_cinematic::core::stage::StageManifest;
use narrative_cinematic::schema::beat::{Beat, BeatKind, ChoicePrompt, CinematicPlan};
use narrative_cinematic::schema::document::NarrativeDocument;
use rustc_hash::FxHashSet;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        println!("Usage: content_linter <script.json | dir> [--manifest <stage.json>]");
        process::exit(0);
    }

    let target = Path::new(&args[1]);
    let mut manifest_path = None;

    let mut i = 2;
    while i < args.len() {
        if args[i] == "--manifest" && i + 1 < args.len() {
            i += 1;
            manifest_path = Some(args[i].clone());
        }
        i += 1;
    }

    let files = if target.is_file() {
        vec![target.to_path_buf()]
    } else if target.is_dir() {
        let mut files = Vec::new();
        collect_json(target, &mut files);
        files.sort();
        files
    } else {
        eprintln!("ERROR: Path '{}' does not exist", target.display());
        process::exit(1);
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    for file in &files {
        match NarrativeDocument::load_from_json(file) {
            Ok(doc) => {
                let plan = build_plan(doc);
                for warning in lint_plan(&plan) {
                    warnings.push(format!("{}: {}", file.display(), warning));
                }
            }
            Err(e) => errors.push(format!("{}: {}", file.display(), e)),
        }
    }

    if let Some(ref path) = manifest_path {
        if let Err(e) = StageManifest::load_from_json(Path::new(path)) {
            errors.push(format!("{}: {}", path, e));
        }
    }

    println!("\n=== Content Lint Report ===\n");
    println!("Checked {} script(s)", files.len());

    if errors.is_empty() && warnings.is_empty() {
        println!("All checks passed!");
    }

    for warning in &warnings {
        println!("WARNING: {}", warning);
    }

    for error in &errors {
        println!("ERROR: {}", error);
    }

    println!(
        "\nSummary: {} errors, {} warnings",
        errors.len(),
        warnings.len()
    );

    if !errors.is_empty() {
        process::exit(1);
    }
}

fn collect_json(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_json(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            files.push(path);
        }
    }
}

fn lint_plan(plan: &CinematicPlan) -> Vec<String> {
    let mut warnings = Vec::new();

    for beat in plan.beats() {
        let kind = beat.kind();
        match beat {
            Beat::Boot { glitch_lines, .. } => {
                if glitch_lines.is_empty() {
                    warnings.push(format!("{kind}: boot sequence has no lines"));
                }
                lint_lines(kind, glitch_lines, &mut warnings);
            }
            Beat::Narration { lines, timing, .. } => {
                if lines.is_empty() && kind != BeatKind::StoryIntro {
                    warnings.push(format!("{kind}: no lines"));
                }
                if let Some(tag) = timing {
                    if !matches!(tag.to_ascii_lowercase().as_str(), "slow_burn" | "rapid") {
                        warnings.push(format!("{kind}: unknown timing tag '{tag}'"));
                    }
                }
                lint_lines(kind, lines, &mut warnings);
                if kind == BeatKind::Exit && !lines.iter().any(|l| l.contains(THREAD_NAME_TOKEN)) {
                    warnings.push(format!("{kind}: exit never names the resolved thread"));
                }
            }
            Beat::Choice {
                setup_lines,
                prompt,
                ..
            } => {
                lint_lines(kind, setup_lines, &mut warnings);
                lint_prompt(kind, prompt, &mut warnings);
            }
            Beat::SecretChoice { prompt, reveal, .. } => {
                lint_prompt(kind, prompt, &mut warnings);
                lint_lines(kind, &reveal.lines, &mut warnings);
                if reveal.persistent && reveal.journal_entry.is_none() {
                    warnings.push(format!("{kind}: persistent reveal without a journal entry"));
                }
            }
        }
    }

    warnings
}

fn lint_lines(kind: BeatKind, lines: &[String], warnings: &mut Vec<String>) {
    for (n, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            warnings.push(format!("{kind}: line {} is blank", n + 1));
        }
        let looks_like_pause = trimmed.to_ascii_lowercase().starts_with("[pause")
            || trimmed.to_ascii_lowercase().starts_with("pause:");
        if looks_like_pause && parse_pause(trimmed).is_none() {
            warnings.push(format!("{kind}: line {} is a malformed pause token '{}'", n + 1, trimmed));
        }
        if line.contains("{{") && !line.contains(THREAD_NAME_TOKEN) {
            warnings.push(format!("{kind}: line {} has an unknown placeholder", n + 1));
        }
    }
}

fn lint_prompt(kind: BeatKind, prompt: &ChoicePrompt, warnings: &mut Vec<String>) {
    if prompt.prompt.trim().is_empty() {
        warnings.push(format!("{kind}: empty prompt"));
    }
    let mut ids = FxHashSet::default();
    for option in &prompt.options {
        if !ids.insert(option.id.as_str()) {
            warnings.push(format!("{kind}: duplicate option id '{}'", option.id));
        }
        if option.text.trim().is_empty() {
            warnings.push(format!("{kind}: option '{}' has no text", option.id));
        }
        if option.scores.is_zero() && kind != BeatKind::NameChoice {
            warnings.push(format!("{kind}: option '{}' scores nothing", option.id));
        }
    }
}
