/// Content loading: raw JSON narrative scripts into typed documents.
///
/// Structural problems (missing sections, wrong root shape) fail the load.
/// Malformed optional fields are logged and fall back to their defaults.
use serde_json::{Map, Value};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::schema::alignment::PersonaAxis;
use crate::schema::document::{
    BootSequence, ChoiceBlock, ExitSection, Metadata, Monologue, NameQuestion, NarrativeDocument,
    OptionRecord, Question, ScoreRecord, SecretQuestion, SecretReveal, StoryFragment,
};

type Object = Map<String, Value>;

/// Sections every cinematic script must carry, as JSON objects.
pub const REQUIRED_SECTIONS: [&str; 7] = [
    "bootSequence",
    "openingMonologue",
    "firstChoice",
    "storyFragment",
    "secretQuestion",
    "nameQuestion",
    "exit",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{0} is not a JSON object")]
    NotAnObject(String),
    #[error("missing required section: {0}")]
    MissingSection(String),
    #[error("question in {0} has no options")]
    NoOptions(String),
}

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid content: {0}")]
    Validation(#[from] ValidationError),
}

impl NarrativeDocument {
    /// Read and validate a narrative script from a JSON file.
    pub fn load_from_json(path: &Path) -> Result<Self, ContentError> {
        let source = std::fs::read_to_string(path)?;
        debug!(path = %path.display(), bytes = source.len(), "read narrative script");
        Self::parse_json(&source)
    }

    pub fn parse_json(source: &str) -> Result<Self, ContentError> {
        let value: Value = serde_json::from_str(source)?;
        Self::from_value(&value)
    }

    /// Validate and map an already-parsed JSON value.
    pub fn from_value(value: &Value) -> Result<Self, ContentError> {
        let root = value
            .as_object()
            .ok_or_else(|| ValidationError::NotAnObject("root".to_string()))?;
        validate_sections(root)?;

        let doc = NarrativeDocument {
            scene_type: string_field(root, "type", "root"),
            metadata: root
                .get("metadata")
                .and_then(|v| as_object(v, "metadata"))
                .map(metadata)
                .unwrap_or_default(),
            boot_sequence: boot_sequence(section(root, "bootSequence")?),
            opening_monologue: monologue(section(root, "openingMonologue")?),
            first_choice: first_choice(section(root, "firstChoice")?),
            story_fragment: story_fragment(section(root, "storyFragment")?),
            secret_question: secret_question(section(root, "secretQuestion")?),
            name_question: name_question(section(root, "nameQuestion")?),
            exit: ExitSection {
                final_lines: lines_field(section(root, "exit")?, "finalLines", "exit"),
            },
        };

        require_options(&doc.first_choice.question.options, "firstChoice")?;
        require_options(&doc.story_fragment.question.options, "storyFragment")?;
        require_options(&doc.secret_question.options, "secretQuestion")?;
        require_options(&doc.name_question.options, "nameQuestion")?;
        Ok(doc)
    }
}

fn validate_sections(root: &Object) -> Result<(), ValidationError> {
    for name in REQUIRED_SECTIONS {
        match root.get(name) {
            None | Some(Value::Null) => {
                return Err(ValidationError::MissingSection(name.to_string()))
            }
            Some(value) if !value.is_object() => {
                return Err(ValidationError::NotAnObject(name.to_string()))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn section<'a>(root: &'a Object, name: &str) -> Result<&'a Object, ValidationError> {
    root.get(name)
        .and_then(Value::as_object)
        .ok_or_else(|| ValidationError::MissingSection(name.to_string()))
}

fn require_options(options: &[OptionRecord], section: &str) -> Result<(), ValidationError> {
    if options.is_empty() {
        return Err(ValidationError::NoOptions(section.to_string()));
    }
    Ok(())
}

fn as_object<'a>(value: &'a Value, path: &str) -> Option<&'a Object> {
    match value {
        Value::Object(map) => Some(map),
        Value::Null => None,
        other => {
            warn!(field = path, found = type_name(other), "expected an object, using default");
            None
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn string_field(obj: &Object, key: &str, path: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => {
            warn!(field = %format!("{path}.{key}"), found = type_name(other), "expected a string, ignoring");
            None
        }
    }
}

/// Like `string_field`, but numbers are accepted and rendered as text.
fn loose_string_field(obj: &Object, key: &str, path: &str) -> Option<String> {
    match obj.get(key) {
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => string_field(obj, key, path),
    }
}

fn bool_field(obj: &Object, key: &str, path: &str) -> bool {
    match obj.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(other) => {
            warn!(field = %format!("{path}.{key}"), found = type_name(other), "expected a bool, using false");
            false
        }
    }
}

fn int_field(obj: &Object, key: &str, path: &str) -> Option<i64> {
    match obj.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| {
            warn!(field = %format!("{path}.{key}"), value = %n, "expected an integer, ignoring");
            None
        }),
        Value::Null => None,
        other => {
            warn!(field = %format!("{path}.{key}"), found = type_name(other), "expected an integer, ignoring");
            None
        }
    }
}

/// A list of text lines. Non-string entries are skipped.
fn lines_field(obj: &Object, key: &str, path: &str) -> Vec<String> {
    match obj.get(key) {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match item {
                Value::String(s) => Some(s.clone()),
                other => {
                    warn!(field = %format!("{path}.{key}[{i}]"), found = type_name(other), "skipping non-string line");
                    None
                }
            })
            .collect(),
        Some(other) => {
            warn!(field = %format!("{path}.{key}"), found = type_name(other), "expected a list of lines, using empty");
            Vec::new()
        }
    }
}

fn metadata(obj: &Object) -> Metadata {
    Metadata {
        iteration: loose_string_field(obj, "iteration", "metadata"),
        iteration_fallback: int_field(obj, "iterationFallback", "metadata"),
        previous_attempt: loose_string_field(obj, "previousAttempt", "metadata"),
        interface: string_field(obj, "interface", "metadata"),
        status: string_field(obj, "status", "metadata"),
        note: string_field(obj, "note", "metadata"),
    }
}

fn boot_sequence(obj: &Object) -> BootSequence {
    BootSequence {
        glitch_lines: lines_field(obj, "glitchLines", "bootSequence"),
        fade_to_stable: bool_field(obj, "fadeToStable", "bootSequence"),
    }
}

fn monologue(obj: &Object) -> Monologue {
    Monologue {
        lines: lines_field(obj, "lines", "openingMonologue"),
        cinematic_timing: string_field(obj, "cinematicTiming", "openingMonologue"),
    }
}

fn first_choice(obj: &Object) -> ChoiceBlock {
    ChoiceBlock {
        setup: lines_field(obj, "setup", "firstChoice"),
        question: question(obj.get("question"), "firstChoice.question"),
    }
}

fn story_fragment(obj: &Object) -> StoryFragment {
    StoryFragment {
        intro: lines_field(obj, "intro", "storyFragment"),
        question: question(obj.get("question"), "storyFragment.question"),
        continuation: lines_field(obj, "continuation", "storyFragment"),
    }
}

fn secret_question(obj: &Object) -> SecretQuestion {
    SecretQuestion {
        setup: lines_field(obj, "setup", "secretQuestion"),
        prompt: string_field(obj, "prompt", "secretQuestion").unwrap_or_default(),
        options: options(obj, "secretQuestion"),
        secret_reveal: obj
            .get("secretReveal")
            .and_then(|v| as_object(v, "secretQuestion.secretReveal"))
            .map(secret_reveal)
            .unwrap_or_default(),
    }
}

fn secret_reveal(obj: &Object) -> SecretReveal {
    let path = "secretQuestion.secretReveal";
    SecretReveal {
        visual: string_field(obj, "visual", path),
        text: lines_field(obj, "text", path),
        persistent: bool_field(obj, "persistent", path),
        journal_entry: string_field(obj, "journalEntry", path),
    }
}

fn name_question(obj: &Object) -> NameQuestion {
    NameQuestion {
        setup: lines_field(obj, "setup", "nameQuestion"),
        prompt: string_field(obj, "prompt", "nameQuestion").unwrap_or_default(),
        options: options(obj, "nameQuestion"),
    }
}

fn question(value: Option<&Value>, path: &str) -> Question {
    let Some(obj) = value.and_then(|v| as_object(v, path)) else {
        return Question::default();
    };
    Question {
        prompt: string_field(obj, "prompt", path).unwrap_or_default(),
        context: string_field(obj, "context", path),
        options: options(obj, path),
    }
}

fn options(obj: &Object, path: &str) -> Vec<OptionRecord> {
    match obj.get("options") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| {
                let item_path = format!("{path}.options[{i}]");
                as_object(item, &item_path).map(|o| option(o, i, &item_path))
            })
            .collect(),
        Some(other) => {
            warn!(field = %format!("{path}.options"), found = type_name(other), "expected a list of options, using empty");
            Vec::new()
        }
    }
}

fn option(obj: &Object, index: usize, path: &str) -> OptionRecord {
    OptionRecord {
        id: loose_string_field(obj, "id", path).unwrap_or_else(|| format!("option_{index}")),
        text: string_field(obj, "text", path).unwrap_or_default(),
        dreamweaver: string_field(obj, "dreamweaver", path),
        philosophical: string_field(obj, "philosophical", path),
        response: string_field(obj, "response", path),
        scores: obj
            .get("scores")
            .and_then(|v| as_object(v, &format!("{path}.scores")))
            .map(|s| scores(s, path))
            .unwrap_or_default(),
    }
}

/// Axis keys accept persona aliases; unknown keys are ignored.
fn scores(obj: &Object, path: &str) -> ScoreRecord {
    let mut record = ScoreRecord::default();
    for (key, value) in obj {
        let Some(axis) = PersonaAxis::from_name(key) else {
            debug!(field = %format!("{path}.scores.{key}"), "ignoring unknown score axis");
            continue;
        };
        let Some(points) = value.as_i64().and_then(|n| i32::try_from(n).ok()) else {
            warn!(field = %format!("{path}.scores.{key}"), found = type_name(value), "expected an integer score, using 0");
            continue;
        };
        match axis {
            PersonaAxis::Light => record.light = record.light.saturating_add(points),
            PersonaAxis::Shadow => record.shadow = record.shadow.saturating_add(points),
            PersonaAxis::Ambition => record.ambition = record.ambition.saturating_add(points),
        }
    }
    record
}
