/// The beat player: a cooperative scheduler over a cinematic plan.
///
/// `BeatPlayer` is an iterator. Each `PlayerStep` it yields says what just
/// happened and how long the host should wait before pulling the next one.
/// Nothing here sleeps or spawns; dropping the player mid-beat simply stops
/// playback.
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::core::config::{secs, PlaybackConfig};
use crate::core::presentation::{
    AudioBus, AudioCue, ChoicePresenter, PresentationError, Presenter, VisualPreset,
};
use crate::core::render::{
    timing_scale, Dissolve, DissolveStep, RenderSettings, RenderStep, TextBuffer, TextRenderer,
};
use crate::core::save::SharedGameState;
use crate::schema::alignment::{ChoiceRecord, DreamweaverThread};
use crate::schema::beat::{Beat, BeatKind, CinematicPlan};

/// Placeholder in exit lines replaced by the resolved thread label.
pub const THREAD_NAME_TOKEN: &str = "{{THREAD_NAME}}";

/// Marker recorded for a persistent secret without its own journal entry.
pub const SECRET_MARKER: &str = "secret_revealed";

/// Delay attached to each `AwaitingChoice` step while no choice is confirmed.
pub const CHOICE_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlayerError {
    #[error("no choice is being awaited")]
    NotAwaitingChoice,
    #[error("option {index} is out of range ({count} options)")]
    InvalidOption { index: usize, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlayerState {
    Idle,
    RenderingText,
    AwaitingChoice,
    Transitioning,
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StepEvent {
    BeatStarted(BeatKind),
    Visual(VisualPreset),
    ShowVisual(String),
    Audio { bus: AudioBus, cue: AudioCue },
    Text(RenderStep),
    ChoicePresented {
        kind: BeatKind,
        prompt: String,
        context: Option<String>,
        options: Vec<String>,
    },
    AwaitingChoice,
    ChoiceConfirmed { kind: BeatKind, option_id: String },
    MarkerRecorded(String),
    Dissolve(DissolveStep),
    /// The fixed wait between beats.
    Transition,
    BeatCompleted(BeatKind),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStep {
    pub event: StepEvent,
    pub delay: Duration,
}

impl PlayerStep {
    fn now(event: StepEvent) -> Self {
        Self {
            event,
            delay: Duration::ZERO,
        }
    }
}

/// What `run_with` reports after driving a plan to the end.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    /// Sum of all step delays.
    pub elapsed: Duration,
    pub choices: Vec<ChoiceRecord>,
    pub thread: DreamweaverThread,
}

enum Action {
    Begin(BeatKind),
    Visual(VisualPreset),
    ShowVisual(String),
    Audio(AudioBus, AudioCue),
    Text {
        lines: Vec<String>,
        ghost: bool,
        scale: f64,
    },
    Prompt(BeatKind),
    Confirmed(BeatKind, String),
    Marker(String),
    Complete(BeatKind),
    Dissolve,
    Wait(Duration),
}

enum Active {
    Text(TextRenderer),
    Dissolve(Dissolve),
    Awaiting(BeatKind),
}

pub struct BeatPlayer {
    plan: Arc<CinematicPlan>,
    config: PlaybackConfig,
    game: SharedGameState,
    presenter: Box<dyn Presenter>,
    rng: StdRng,
    state: PlayerState,
    next_beat: usize,
    current: Option<BeatKind>,
    queue: VecDeque<Action>,
    active: Option<Active>,
    buffer: TextBuffer,
}

impl BeatPlayer {
    pub fn new(
        plan: Arc<CinematicPlan>,
        config: PlaybackConfig,
        game: SharedGameState,
        presenter: impl Presenter + 'static,
    ) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            plan,
            config,
            game,
            presenter: Box::new(presenter),
            rng,
            state: PlayerState::Idle,
            next_beat: 0,
            current: None,
            queue: VecDeque::new(),
            active: None,
            buffer: TextBuffer::new(),
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn current_beat(&self) -> Option<BeatKind> {
        self.current
    }

    pub fn plan(&self) -> &Arc<CinematicPlan> {
        &self.plan
    }

    pub fn game(&self) -> &SharedGameState {
        &self.game
    }

    pub fn visible_text(&self) -> String {
        self.buffer.text()
    }

    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    pub fn is_done(&self) -> bool {
        self.state == PlayerState::Done
    }

    /// Abandon whatever is playing and continue from `kind` on the next pull.
    pub fn start_at(&mut self, kind: BeatKind) {
        self.queue.clear();
        self.active = None;
        self.buffer.clear();
        self.current = None;
        self.next_beat = kind.index();
        self.state = PlayerState::Idle;
        debug!(beat = %kind, "player repositioned");
    }

    /// Answer the pending choice prompt with option `index`.
    ///
    /// The option's score is applied once, then its response and any secret
    /// reveal play before the beat completes.
    pub fn confirm_choice(&mut self, index: usize) -> Result<ChoiceRecord, PlayerError> {
        let Some(Active::Awaiting(kind)) = self.active else {
            return Err(PlayerError::NotAwaitingChoice);
        };
        let plan = Arc::clone(&self.plan);
        let beat = plan.beat(kind);
        let prompt = beat.prompt().ok_or(PlayerError::NotAwaitingChoice)?;
        let option = prompt.options.get(index).ok_or(PlayerError::InvalidOption {
            index,
            count: prompt.options.len(),
        })?;

        let record = {
            let mut game = self.game.borrow_mut();
            let record = game.scorer.apply_choice(kind.as_str(), option).clone();
            if kind == BeatKind::NameChoice {
                game.set_player_name(&option.text);
            }
            record
        };
        info!(beat = %kind, option = %option.id, "choice confirmed");

        let mut follow = vec![
            Action::Confirmed(kind, option.id.clone()),
            Action::Audio(AudioBus::Ui, AudioCue::ChoiceConfirm),
        ];
        if let Some(response) = option.response.as_ref().filter(|r| !r.trim().is_empty()) {
            follow.push(Action::Text {
                lines: vec![response.clone()],
                ghost: self.config.ghost_writing,
                scale: 1.0,
            });
        }
        if let Beat::SecretChoice { reveal, .. } = beat {
            follow.push(Action::Visual(VisualPreset::SecretReveal));
            follow.push(Action::Audio(AudioBus::Effects, AudioCue::SecretReveal));
            if let Some(visual) = &reveal.visual {
                follow.push(Action::ShowVisual(visual.clone()));
            }
            follow.push(Action::Text {
                lines: reveal.lines.clone(),
                ghost: self.config.ghost_writing,
                scale: 1.0,
            });
            if reveal.persistent {
                let marker = reveal
                    .journal_entry
                    .clone()
                    .unwrap_or_else(|| SECRET_MARKER.to_string());
                follow.push(Action::Marker(marker));
            }
            follow.push(Action::Visual(VisualPreset::StableBaseline));
        }

        for action in follow.into_iter().rev() {
            self.queue.push_front(action);
        }
        self.active = None;
        self.state = PlayerState::RenderingText;
        Ok(record)
    }

    /// Play the whole plan without waiting, answering prompts through `chooser`.
    pub fn run_with(&mut self, chooser: &mut dyn ChoicePresenter) -> Result<RunSummary, PlayerError> {
        let mut steps = 0;
        let mut elapsed = Duration::ZERO;
        let mut choices = Vec::new();

        while let Some(step) = self.next() {
            steps += 1;
            elapsed = elapsed.saturating_add(step.delay);
            if let StepEvent::ChoicePresented {
                prompt, options, ..
            } = &step.event
            {
                let labels: Vec<&str> = options.iter().map(String::as_str).collect();
                let index = chooser.choose(prompt, &labels);
                choices.push(self.confirm_choice(index)?);
            }
        }

        let thread = self.game.borrow().scorer.resolve_thread();
        Ok(RunSummary {
            steps,
            elapsed,
            choices,
            thread,
        })
    }

    fn render_settings(&self, ghost: bool, scale: f64) -> RenderSettings {
        RenderSettings {
            char_delay: secs(self.config.char_delay_duration().as_secs_f64() * scale.max(0.0)),
            line_pause: self.config.line_pause_duration(),
            ghost,
            ghost_probability: self.config.ghost_probability,
        }
    }

    /// Queue the actions for the next beat. Returns `false` past the last beat.
    fn schedule_next_beat(&mut self) -> bool {
        let plan = Arc::clone(&self.plan);
        let Some(beat) = plan.beats().get(self.next_beat) else {
            return false;
        };
        self.next_beat += 1;
        let kind = beat.kind();
        let ghost = self.config.ghost_writing;

        self.queue.push_back(Action::Begin(kind));
        match beat {
            Beat::Boot {
                glitch_lines,
                fade_to_stable,
            } => {
                self.queue.push_back(Action::Visual(VisualPreset::BootSequence));
                self.queue
                    .push_back(Action::Audio(AudioBus::Ambient, AudioCue::BootHum));
                self.queue.push_back(Action::Text {
                    lines: glitch_lines.clone(),
                    ghost: true,
                    scale: 1.0,
                });
                if *fade_to_stable {
                    self.queue
                        .push_back(Action::Visual(VisualPreset::StableBaseline));
                }
            }
            Beat::Narration {
                kind: BeatKind::Exit,
                lines,
                timing,
            } => {
                let thread = self.game.borrow().scorer.resolve_thread();
                let label = thread.label().to_uppercase();
                self.queue
                    .push_back(Action::Visual(VisualPreset::for_thread(thread)));
                self.queue.push_back(Action::Text {
                    lines: lines
                        .iter()
                        .map(|line| line.replace(THREAD_NAME_TOKEN, &label))
                        .collect(),
                    ghost,
                    scale: timing_scale(timing.as_deref()),
                });
            }
            Beat::Narration { lines, timing, .. } => {
                self.queue.push_back(Action::Text {
                    lines: lines.clone(),
                    ghost,
                    scale: timing_scale(timing.as_deref()),
                });
            }
            Beat::Choice {
                setup_lines,
                prompt,
                ..
            } => {
                self.queue.push_back(Action::Text {
                    lines: setup_lines.clone(),
                    ghost,
                    scale: 1.0,
                });
                let mut prompt_lines = vec![prompt.prompt.clone()];
                prompt_lines.extend(prompt.context.clone());
                self.queue.push_back(Action::Text {
                    lines: prompt_lines,
                    ghost,
                    scale: 1.0,
                });
                self.queue.push_back(Action::Prompt(kind));
            }
            Beat::SecretChoice { prompt, .. } => {
                self.queue.push_back(Action::Text {
                    lines: vec![prompt.prompt.clone()],
                    ghost,
                    scale: 1.0,
                });
                self.queue.push_back(Action::Prompt(kind));
            }
        }

        self.queue.push_back(Action::Complete(kind));
        if kind != BeatKind::Exit {
            self.queue.push_back(Action::Dissolve);
            self.queue
                .push_back(Action::Wait(self.config.transition_duration()));
        }
        true
    }

    /// Perform one queued action. `None` means it produced no step of its own.
    fn perform(&mut self, action: Action) -> Option<PlayerStep> {
        match action {
            Action::Begin(kind) => {
                self.current = Some(kind);
                self.state = PlayerState::RenderingText;
                debug!(beat = %kind, "beat started");
                Some(PlayerStep::now(StepEvent::BeatStarted(kind)))
            }
            Action::Visual(preset) => {
                report(self.presenter.apply_visual(preset), "visual preset");
                Some(PlayerStep::now(StepEvent::Visual(preset)))
            }
            Action::ShowVisual(name) => {
                report(self.presenter.show_visual(&name), "named visual");
                Some(PlayerStep::now(StepEvent::ShowVisual(name)))
            }
            Action::Audio(bus, cue) => {
                report(self.presenter.play_audio(bus, cue), "audio cue");
                Some(PlayerStep::now(StepEvent::Audio { bus, cue }))
            }
            Action::Text {
                lines,
                ghost,
                scale,
            } => {
                if !lines.is_empty() {
                    let settings = self.render_settings(ghost, scale);
                    let seed = self.rng.gen();
                    self.active = Some(Active::Text(TextRenderer::new(lines, settings, seed)));
                    self.state = PlayerState::RenderingText;
                }
                None
            }
            Action::Prompt(kind) => {
                let plan = Arc::clone(&self.plan);
                let prompt = plan.beat(kind).prompt()?;
                report(
                    self.presenter.play_audio(AudioBus::Ui, AudioCue::ChoicePrompt),
                    "audio cue",
                );
                self.active = Some(Active::Awaiting(kind));
                self.state = PlayerState::AwaitingChoice;
                debug!(beat = %kind, options = prompt.options.len(), "awaiting choice");
                Some(PlayerStep::now(StepEvent::ChoicePresented {
                    kind,
                    prompt: prompt.prompt.clone(),
                    context: prompt.context.clone(),
                    options: prompt.options.iter().map(|o| o.text.clone()).collect(),
                }))
            }
            Action::Confirmed(kind, option_id) => {
                Some(PlayerStep::now(StepEvent::ChoiceConfirmed { kind, option_id }))
            }
            Action::Marker(marker) => {
                self.game.borrow_mut().add_shard(marker.clone());
                debug!(marker = %marker, "narrative marker recorded");
                Some(PlayerStep::now(StepEvent::MarkerRecorded(marker)))
            }
            Action::Complete(kind) => {
                self.state = if kind == BeatKind::Exit {
                    PlayerState::Done
                } else {
                    PlayerState::Transitioning
                };
                debug!(beat = %kind, "beat completed");
                if kind == BeatKind::Exit {
                    info!("cinematic finished");
                }
                Some(PlayerStep::now(StepEvent::BeatCompleted(kind)))
            }
            Action::Dissolve => {
                match self.config.dissolve_duration() {
                    Some(total) => {
                        let seed = self.rng.gen();
                        self.active = Some(Active::Dissolve(Dissolve::new(&self.buffer, total, seed)));
                    }
                    None => self.buffer.clear(),
                }
                None
            }
            Action::Wait(delay) => Some(PlayerStep {
                event: StepEvent::Transition,
                delay,
            }),
        }
    }
}

fn report(result: Result<(), PresentationError>, what: &str) {
    if let Err(err) = result {
        warn!(error = %err, what, "presentation failed, continuing playback");
    }
}

impl Iterator for BeatPlayer {
    type Item = PlayerStep;

    fn next(&mut self) -> Option<PlayerStep> {
        loop {
            match &mut self.active {
                Some(Active::Text(renderer)) => match renderer.next() {
                    Some(timed) => {
                        self.buffer.apply(&timed.step);
                        return Some(PlayerStep {
                            event: StepEvent::Text(timed.step),
                            delay: timed.delay,
                        });
                    }
                    None => self.active = None,
                },
                Some(Active::Dissolve(dissolve)) => match dissolve.next() {
                    Some((step, delay)) => {
                        self.buffer.apply_dissolve(&step);
                        return Some(PlayerStep {
                            event: StepEvent::Dissolve(step),
                            delay,
                        });
                    }
                    None => self.active = None,
                },
                Some(Active::Awaiting(_)) => {
                    return Some(PlayerStep {
                        event: StepEvent::AwaitingChoice,
                        delay: CHOICE_POLL,
                    });
                }
                None => {}
            }

            if self.state == PlayerState::Done {
                return None;
            }

            match self.queue.pop_front() {
                Some(action) => {
                    if let Some(step) = self.perform(action) {
                        return Some(step);
                    }
                }
                None => {
                    if !self.schedule_next_beat() {
                        self.state = PlayerState::Done;
                        return None;
                    }
                }
            }
        }
    }
}
