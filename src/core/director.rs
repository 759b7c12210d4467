/// Plan building and caching.
///
/// A `CinematicDirector` owns one `PlanSource` and builds the plan from it at
/// most once until `reset()` is called.
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, info};

use crate::core::loader::ContentError;
use crate::schema::beat::{Beat, BeatKind, ChoicePrompt, CinematicPlan};
use crate::schema::document::NarrativeDocument;

/// Where the director gets its narrative document from.
pub trait PlanSource: Send + Sync {
    fn load(&self) -> Result<NarrativeDocument, ContentError>;
}

/// Loads the document from a JSON file on every call.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl PlanSource for JsonFileSource {
    fn load(&self) -> Result<NarrativeDocument, ContentError> {
        NarrativeDocument::load_from_json(&self.path)
    }
}

/// Serves an in-memory document.
#[derive(Debug, Clone)]
pub struct StaticSource(pub NarrativeDocument);

impl PlanSource for StaticSource {
    fn load(&self) -> Result<NarrativeDocument, ContentError> {
        Ok(self.0.clone())
    }
}

/// Assemble the eleven beats of a plan in canonical order.
pub fn build_plan(doc: NarrativeDocument) -> CinematicPlan {
    let NarrativeDocument {
        scene_type,
        metadata,
        boot_sequence,
        opening_monologue,
        first_choice,
        story_fragment,
        secret_question,
        name_question,
        exit,
    } = doc;

    let narration = |kind, lines| Beat::Narration {
        kind,
        lines,
        timing: None,
    };
    let choice = |kind, prompt: ChoicePrompt| Beat::Choice {
        kind,
        setup_lines: Vec::new(),
        prompt,
    };
    let secret_prompt: ChoicePrompt = secret_question.to_question().into();
    let name_prompt: ChoicePrompt = name_question.to_question().into();

    let beats = [
        Beat::Boot {
            glitch_lines: boot_sequence.glitch_lines,
            fade_to_stable: boot_sequence.fade_to_stable,
        },
        Beat::Narration {
            kind: BeatKind::Monologue,
            lines: opening_monologue.lines,
            timing: opening_monologue.cinematic_timing,
        },
        Beat::Choice {
            kind: BeatKind::InitialChoice,
            setup_lines: first_choice.setup,
            prompt: first_choice.question.into(),
        },
        narration(BeatKind::StoryIntro, story_fragment.intro),
        choice(BeatKind::StoryChoice, story_fragment.question.into()),
        narration(BeatKind::StoryContinuation, story_fragment.continuation),
        narration(BeatKind::SecretSetup, secret_question.setup),
        Beat::SecretChoice {
            kind: BeatKind::SecretChoice,
            prompt: secret_prompt,
            reveal: secret_question.secret_reveal.into(),
        },
        narration(BeatKind::NameSetup, name_question.setup),
        choice(BeatKind::NameChoice, name_prompt),
        narration(BeatKind::Exit, exit.final_lines),
    ];

    CinematicPlan::new(metadata, scene_type, beats)
}

/// Builds the cinematic plan on first use and shares it afterwards.
///
/// Readers on the fast path take only the `RwLock` read guard. Builders
/// serialize on `build_lock` and re-check the cache before loading, so
/// concurrent first calls perform one build.
pub struct CinematicDirector {
    source: Box<dyn PlanSource>,
    cache: RwLock<Option<Arc<CinematicPlan>>>,
    build_lock: Mutex<()>,
}

impl CinematicDirector {
    pub fn new(source: impl PlanSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RwLock::new(None),
            build_lock: Mutex::new(()),
        }
    }

    pub fn from_json_file(path: impl Into<PathBuf>) -> Self {
        Self::new(JsonFileSource::new(path))
    }

    pub fn get_plan(&self) -> Result<Arc<CinematicPlan>, ContentError> {
        if let Some(plan) = self.cached() {
            return Ok(plan);
        }

        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(plan) = self.cached() {
            return Ok(plan);
        }

        let doc = self.source.load()?;
        let plan = Arc::new(build_plan(doc));
        info!(beats = plan.len(), "built cinematic plan");
        for beat in plan.beats() {
            debug!(kind = %beat.kind(), "planned beat");
        }
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&plan));
        Ok(plan)
    }

    /// Drop the cached plan; the next `get_plan` rebuilds from the source.
    pub fn reset(&self) {
        let _guard = self.build_lock.lock().unwrap_or_else(PoisonError::into_inner);
        *self.cache.write().unwrap_or_else(PoisonError::into_inner) = None;
        debug!("cinematic plan cache cleared");
    }

    pub fn is_cached(&self) -> bool {
        self.cached().is_some()
    }

    fn cached(&self) -> Option<Arc<CinematicPlan>> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loader::ValidationError;
    use crate::schema::document::{OptionRecord, ScoreRecord};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn option(id: &str, light: i32) -> OptionRecord {
        OptionRecord {
            id: id.to_string(),
            text: id.to_uppercase(),
            scores: ScoreRecord {
                light,
                ..ScoreRecord::default()
            },
            ..OptionRecord::default()
        }
    }

    fn document() -> NarrativeDocument {
        let mut doc = NarrativeDocument::default();
        doc.boot_sequence.glitch_lines = vec!["> boot".to_string()];
        doc.opening_monologue.lines = vec!["once".to_string()];
        doc.opening_monologue.cinematic_timing = Some("slow_burn".to_string());
        doc.first_choice.setup = vec!["listen".to_string()];
        doc.first_choice.question.prompt = "Who are you?".to_string();
        doc.first_choice.question.options = vec![option("a", 1)];
        doc.story_fragment.question.options = vec![option("b", 2)];
        doc.secret_question.prompt = "Secret?".to_string();
        doc.secret_question.options = vec![option("c", 3)];
        doc.secret_question.secret_reveal.persistent = true;
        doc.name_question.setup = vec!["and you are".to_string()];
        doc.name_question.prompt = "Name?".to_string();
        doc.name_question.options = vec![option("d", 0)];
        doc.exit.final_lines = vec!["goodbye".to_string()];
        doc
    }

    struct CountingSource {
        doc: NarrativeDocument,
        loads: Arc<AtomicUsize>,
    }

    impl PlanSource for CountingSource {
        fn load(&self) -> Result<NarrativeDocument, ContentError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            Ok(self.doc.clone())
        }
    }

    struct FailingSource;

    impl PlanSource for FailingSource {
        fn load(&self) -> Result<NarrativeDocument, ContentError> {
            Err(ValidationError::MissingSection("exit".to_string()).into())
        }
    }

    #[test]
    fn plan_has_eleven_beats_in_canonical_order() {
        let plan = build_plan(document());
        assert_eq!(plan.len(), 11);
        assert!(plan.kinds().eq(BeatKind::CANONICAL_ORDER.iter().copied()));
    }

    #[test]
    fn monologue_keeps_timing_and_first_choice_keeps_setup() {
        let plan = build_plan(document());
        match plan.beat(BeatKind::Monologue) {
            Beat::Narration { timing, .. } => assert_eq!(timing.as_deref(), Some("slow_burn")),
            other => panic!("unexpected beat {other:?}"),
        }
        match plan.beat(BeatKind::InitialChoice) {
            Beat::Choice {
                setup_lines,
                prompt,
                ..
            } => {
                assert_eq!(setup_lines, &vec!["listen".to_string()]);
                assert_eq!(prompt.prompt, "Who are you?");
            }
            other => panic!("unexpected beat {other:?}"),
        }
        match plan.beat(BeatKind::NameChoice) {
            Beat::Choice { setup_lines, .. } => assert!(setup_lines.is_empty()),
            other => panic!("unexpected beat {other:?}"),
        }
    }

    #[test]
    fn secret_question_becomes_secret_choice_with_reveal() {
        let plan = build_plan(document());
        match plan.beat(BeatKind::SecretChoice) {
            Beat::SecretChoice { prompt, reveal, .. } => {
                assert_eq!(prompt.prompt, "Secret?");
                assert!(prompt.context.is_none());
                assert_eq!(prompt.options[0].scores.light, 3);
                assert!(reveal.persistent);
            }
            other => panic!("unexpected beat {other:?}"),
        }
    }

    #[test]
    fn repeated_get_plan_returns_same_arc() {
        let loads = Arc::new(AtomicUsize::new(0));
        let director = CinematicDirector::new(CountingSource {
            doc: document(),
            loads: Arc::clone(&loads),
        });
        let first = director.get_plan().unwrap();
        let second = director.get_plan().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_triggers_rebuild() {
        let loads = Arc::new(AtomicUsize::new(0));
        let director = CinematicDirector::new(CountingSource {
            doc: document(),
            loads: Arc::clone(&loads),
        });
        let first = director.get_plan().unwrap();
        director.reset();
        assert!(!director.is_cached());
        let second = director.get_plan().unwrap();
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn static_source_serves_in_memory_document() {
        let director = CinematicDirector::new(StaticSource(document()));
        let plan = director.get_plan().unwrap();
        assert_eq!(*plan, build_plan(document()));
        assert!(director.is_cached());
    }

    #[test]
    fn load_failure_propagates_and_caches_nothing() {
        let director = CinematicDirector::new(FailingSource);
        assert!(matches!(
            director.get_plan(),
            Err(ContentError::Validation(ValidationError::MissingSection(_)))
        ));
        assert!(!director.is_cached());
    }

    #[test]
    fn concurrent_first_access_builds_once() {
        let loads = Arc::new(AtomicUsize::new(0));
        let director = Arc::new(CinematicDirector::new(CountingSource {
            doc: document(),
            loads: Arc::clone(&loads),
        }));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let director = Arc::clone(&director);
                std::thread::spawn(move || director.get_plan().unwrap())
            })
            .collect();
        let plans: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        for plan in &plans[1..] {
            assert!(Arc::ptr_eq(&plans[0], plan));
        }
    }
}
