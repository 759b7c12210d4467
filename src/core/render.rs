/// Typewriter text rendering, pause tokens and the inter-beat dissolve.
///
/// Both `TextRenderer` and `Dissolve` are plain iterators of timed steps. They
/// never sleep; the caller waits out each step's delay.
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use crate::core::config::secs;

/// Glyphs flashed in place of a character before it settles.
pub const GLITCH_GLYPHS: [char; 16] = [
    '█', '▓', '▒', '░', '#', '%', '&', '@', '$', '*', '?', '!', '/', '\\', '|', '~',
];

const MIN_GLITCH_SECS: f64 = 0.01;
const GLITCH_FRACTION: f64 = 0.35;

/// Parse a pause token line: `[PAUSE: 2s]`, `[pause: 0.5]` or `pause:1.5s`.
pub fn parse_pause(line: &str) -> Option<Duration> {
    let mut token = line.trim();
    if let Some(inner) = token.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
        token = inner.trim();
    }
    let head = token.get(..5)?;
    if !head.eq_ignore_ascii_case("pause") {
        return None;
    }
    let rest = token[5..].trim_start().strip_prefix(':')?.trim();
    let number = rest
        .strip_suffix('s')
        .or_else(|| rest.strip_suffix('S'))
        .unwrap_or(rest)
        .trim();
    let seconds: f64 = number.parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

/// Clamp a probability into `0.0..=1.0`; NaN counts as never.
pub(crate) fn probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Multiplier applied to the character delay for a beat's timing tag.
pub fn timing_scale(tag: Option<&str>) -> f64 {
    match tag.map(str::trim) {
        Some(t) if t.eq_ignore_ascii_case("slow_burn") => 2.0,
        Some(t) if t.eq_ignore_ascii_case("rapid") => 0.5,
        _ => 1.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderStep {
    /// Append a character.
    Char(char),
    /// Append a glitch glyph that the next `Settle` replaces.
    Glitch { glyph: char },
    /// Replace the trailing glyph with the canonical character.
    Settle(char),
    LineBreak,
    /// A pause token: nothing visible changes.
    Pause,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedStep {
    pub step: RenderStep,
    pub delay: Duration,
}

impl TimedStep {
    fn new(step: RenderStep, delay: Duration) -> Self {
        Self { step, delay }
    }
}

/// Settings for one `TextRenderer`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub char_delay: Duration,
    pub line_pause: Duration,
    pub ghost: bool,
    pub ghost_probability: f64,
}

/// Types out lines one character at a time.
pub struct TextRenderer {
    lines: Vec<String>,
    line: usize,
    chars: Vec<char>,
    next_char: usize,
    line_started: bool,
    pending_settle: Option<char>,
    settings: RenderSettings,
    rng: StdRng,
}

impl TextRenderer {
    pub fn new(lines: Vec<String>, settings: RenderSettings, seed: u64) -> Self {
        Self {
            lines,
            line: 0,
            chars: Vec::new(),
            next_char: 0,
            line_started: false,
            pending_settle: None,
            settings,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    fn glitch_delay(&self) -> Duration {
        let scaled = self.settings.char_delay.as_secs_f64() * GLITCH_FRACTION;
        secs(scaled.max(MIN_GLITCH_SECS))
    }

    fn advance_line(&mut self) {
        self.line += 1;
        self.line_started = false;
        self.chars.clear();
        self.next_char = 0;
    }
}

impl Iterator for TextRenderer {
    type Item = TimedStep;

    fn next(&mut self) -> Option<TimedStep> {
        if let Some(ch) = self.pending_settle.take() {
            return Some(TimedStep::new(RenderStep::Settle(ch), self.settings.char_delay));
        }

        loop {
            let line = self.lines.get(self.line)?;

            if !self.line_started {
                if let Some(pause) = parse_pause(line) {
                    self.advance_line();
                    return Some(TimedStep::new(RenderStep::Pause, pause));
                }
                self.chars = line.chars().collect();
                self.next_char = 0;
                self.line_started = true;
            }

            if let Some(&ch) = self.chars.get(self.next_char) {
                self.next_char += 1;
                let ghost = self.settings.ghost
                    && !ch.is_whitespace()
                    && self.rng.gen_bool(probability(self.settings.ghost_probability));
                if ghost {
                    let glyph = GLITCH_GLYPHS.choose(&mut self.rng).copied().unwrap_or('#');
                    self.pending_settle = Some(ch);
                    return Some(TimedStep::new(RenderStep::Glitch { glyph }, self.glitch_delay()));
                }
                return Some(TimedStep::new(RenderStep::Char(ch), self.settings.char_delay));
            }

            self.advance_line();
            return Some(TimedStep::new(RenderStep::LineBreak, self.settings.line_pause));
        }
    }
}

/// The text currently visible on the terminal.
#[derive(Debug, Clone, PartialEq)]
pub struct TextBuffer {
    chars: Vec<char>,
    opacity: f32,
}

impl Default for TextBuffer {
    fn default() -> Self {
        Self {
            chars: Vec::new(),
            opacity: 1.0,
        }
    }
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn push_str(&mut self, text: &str) {
        self.chars.extend(text.chars());
    }

    pub fn clear(&mut self) {
        self.chars.clear();
        self.opacity = 1.0;
    }

    pub fn apply(&mut self, step: &RenderStep) {
        match *step {
            RenderStep::Char(ch) => self.chars.push(ch),
            RenderStep::Glitch { glyph } => self.chars.push(glyph),
            RenderStep::Settle(ch) => {
                self.chars.pop();
                self.chars.push(ch);
            }
            RenderStep::LineBreak => self.chars.push('\n'),
            RenderStep::Pause => {}
        }
    }

    pub fn apply_dissolve(&mut self, step: &DissolveStep) {
        match *step {
            DissolveStep::Replace {
                index,
                glyph,
                opacity,
            } => {
                if let Some(slot) = self.chars.get_mut(index) {
                    *slot = glyph;
                }
                self.opacity = opacity;
            }
            DissolveStep::Clear => self.clear(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DissolveStep {
    /// Overwrite the character at `index` and fade the buffer.
    Replace { index: usize, glyph: char, opacity: f32 },
    /// Remove all text.
    Clear,
}

/// Replaces visible characters with glyphs in random order, then clears.
pub struct Dissolve {
    order: Vec<usize>,
    position: usize,
    step_delay: Duration,
    glyphs: Vec<char>,
    cleared: bool,
}

impl Dissolve {
    pub fn new(buffer: &TextBuffer, total: Duration, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = buffer
            .chars
            .iter()
            .enumerate()
            .filter(|(_, ch)| !ch.is_whitespace())
            .map(|(i, _)| i)
            .collect();
        order.shuffle(&mut rng);
        let glyphs = order
            .iter()
            .map(|_| GLITCH_GLYPHS.choose(&mut rng).copied().unwrap_or('#'))
            .collect();
        let step_delay = match u32::try_from(order.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(count) => total / count,
        };
        Self {
            order,
            position: 0,
            step_delay,
            glyphs,
            cleared: false,
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl Iterator for Dissolve {
    type Item = (DissolveStep, Duration);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(&index) = self.order.get(self.position) {
            let glyph = self.glyphs[self.position];
            self.position += 1;
            let progress = self.position as f32 / self.order.len() as f32;
            let opacity = (1.0 - progress * 0.85).max(0.25);
            return Some((
                DissolveStep::Replace {
                    index,
                    glyph,
                    opacity,
                },
                self.step_delay,
            ));
        }
        if self.cleared {
            return None;
        }
        self.cleared = true;
        Some((DissolveStep::Clear, Duration::ZERO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(ghost: bool, probability: f64) -> RenderSettings {
        RenderSettings {
            char_delay: Duration::from_millis(30),
            line_pause: Duration::from_millis(400),
            ghost,
            ghost_probability: probability,
        }
    }

    fn render(lines: &[&str], settings: RenderSettings, seed: u64) -> (TextBuffer, Vec<TimedStep>) {
        let lines = lines.iter().map(|l| l.to_string()).collect();
        let steps: Vec<_> = TextRenderer::new(lines, settings, seed).collect();
        let mut buffer = TextBuffer::new();
        for step in &steps {
            buffer.apply(&step.step);
        }
        (buffer, steps)
    }

    #[test]
    fn pause_token_grammar() {
        assert_eq!(parse_pause("[PAUSE: 2s]"), Some(Duration::from_secs(2)));
        assert_eq!(parse_pause("[pause: 0.5]"), Some(Duration::from_millis(500)));
        assert_eq!(parse_pause("pause:1.5s"), Some(Duration::from_millis(1500)));
        assert_eq!(parse_pause("  Pause : 3S "), Some(Duration::from_secs(3)));
        assert_eq!(parse_pause("pause for effect"), None);
        assert_eq!(parse_pause("[PAUSE: -1s]"), None);
        assert_eq!(parse_pause("hello"), None);
        assert_eq!(parse_pause("é"), None);
    }

    #[test]
    fn out_of_range_pause_is_plain_text() {
        assert_eq!(parse_pause("pause:1e20"), None);
        assert_eq!(parse_pause("[PAUSE: 1e300s]"), None);
        assert_eq!(parse_pause("pause: NaN"), None);
        assert_eq!(parse_pause("pause: inf"), None);

        let (buffer, _) = render(&["pause:1e20"], settings(false, 0.0), 1);
        assert_eq!(buffer.text(), "pause:1e20\n");
    }

    #[test]
    fn nan_probability_never_ghosts() {
        assert_eq!(probability(f64::NAN), 0.0);
        assert_eq!(probability(-1.0), 0.0);
        assert_eq!(probability(2.0), 1.0);

        let (buffer, steps) = render(&["abc"], settings(true, f64::NAN), 5);
        assert_eq!(buffer.text(), "abc\n");
        assert!(steps
            .iter()
            .all(|s| !matches!(s.step, RenderStep::Glitch { .. })));
    }

    #[test]
    fn pause_line_yields_no_characters() {
        let (buffer, steps) = render(&["[PAUSE: 2s]"], settings(false, 0.0), 1);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].step, RenderStep::Pause);
        assert_eq!(steps[0].delay, Duration::from_secs(2));
        assert!(buffer.is_empty());
    }

    #[test]
    fn plain_rendering_types_every_character() {
        let (buffer, steps) = render(&["hi", "yo"], settings(false, 0.0), 1);
        assert_eq!(buffer.text(), "hi\nyo\n");
        let chars = steps
            .iter()
            .filter(|s| matches!(s.step, RenderStep::Char(_)))
            .count();
        assert_eq!(chars, 4);
        assert!(steps
            .iter()
            .filter(|s| matches!(s.step, RenderStep::Char(_)))
            .all(|s| s.delay == Duration::from_millis(30)));
    }

    #[test]
    fn ghost_rendering_never_alters_final_text() {
        let line = "The terminal remembers you.";
        for seed in 0..16 {
            let (buffer, steps) = render(&[line], settings(true, 0.5), seed);
            assert_eq!(buffer.text(), format!("{line}\n"));
            let glitches = steps
                .iter()
                .filter(|s| matches!(s.step, RenderStep::Glitch { .. }))
                .count();
            let settles = steps
                .iter()
                .filter(|s| matches!(s.step, RenderStep::Settle(_)))
                .count();
            assert_eq!(glitches, settles);
        }
    }

    #[test]
    fn ghost_always_on_glitches_every_visible_character() {
        let (_, steps) = render(&["a b"], settings(true, 1.0), 9);
        let glitch_delays: Vec<_> = steps
            .iter()
            .filter(|s| matches!(s.step, RenderStep::Glitch { .. }))
            .map(|s| s.delay)
            .collect();
        assert_eq!(glitch_delays.len(), 2);
        assert!(glitch_delays
            .iter()
            .all(|d| *d == Duration::from_secs_f64(0.03 * 0.35)));
    }

    #[test]
    fn glitch_delay_has_a_floor() {
        let mut fast = settings(true, 1.0);
        fast.char_delay = Duration::ZERO;
        let (_, steps) = render(&["x"], fast, 2);
        assert_eq!(steps[0].delay, Duration::from_secs_f64(0.01));
    }

    #[test]
    fn timing_tags() {
        assert_eq!(timing_scale(Some("slow_burn")), 2.0);
        assert_eq!(timing_scale(Some("RAPID")), 0.5);
        assert_eq!(timing_scale(Some("whatever")), 1.0);
        assert_eq!(timing_scale(None), 1.0);
    }

    #[test]
    fn dissolve_ends_with_empty_buffer() {
        let mut buffer = TextBuffer::new();
        buffer.push_str("ab c\nd");
        let dissolve = Dissolve::new(&buffer, Duration::from_secs(1), 4);
        assert_eq!(dissolve.len(), 4);

        let steps: Vec<_> = dissolve.collect();
        assert_eq!(steps.len(), 5);
        let mut seen: Vec<usize> = steps
            .iter()
            .filter_map(|(s, _)| match s {
                DissolveStep::Replace { index, .. } => Some(*index),
                DissolveStep::Clear => None,
            })
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 3, 5]);
        assert_eq!(steps[0].1, Duration::from_millis(250));

        for (step, _) in &steps {
            buffer.apply_dissolve(step);
        }
        assert!(buffer.is_empty());
    }

    #[test]
    fn dissolve_opacity_has_a_floor() {
        let mut buffer = TextBuffer::new();
        buffer.push_str("abcdefghij");
        let mut last = 1.0;
        for (step, _) in Dissolve::new(&buffer, Duration::from_secs(1), 0) {
            if let DissolveStep::Replace { opacity, .. } = step {
                assert!(opacity <= last);
                assert!(opacity >= 0.25);
                last = opacity;
            }
        }
        assert_eq!(last, 0.25);
    }

    #[test]
    fn dissolve_of_empty_buffer_only_clears() {
        let buffer = TextBuffer::new();
        let steps: Vec<_> = Dissolve::new(&buffer, Duration::from_secs(1), 0).collect();
        assert_eq!(steps, vec![(DissolveStep::Clear, Duration::ZERO)]);
    }
}
