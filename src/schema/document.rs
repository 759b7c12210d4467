use serde::Serialize;

/// Authoring metadata carried alongside the cinematic sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub iteration: Option<String>,
    pub iteration_fallback: Option<i64>,
    pub previous_attempt: Option<String>,
    pub interface: Option<String>,
    pub status: Option<String>,
    pub note: Option<String>,
}

/// Glitch lines shown while the terminal "boots".
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BootSequence {
    pub glitch_lines: Vec<String>,
    pub fade_to_stable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Monologue {
    pub lines: Vec<String>,
    /// Free-form pacing tag such as `slow_burn`.
    pub cinematic_timing: Option<String>,
}

/// Per-option weights toward each persona axis, as authored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScoreRecord {
    pub light: i32,
    pub shadow: i32,
    pub ambition: i32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OptionRecord {
    pub id: String,
    pub text: String,
    pub dreamweaver: Option<String>,
    pub philosophical: Option<String>,
    pub response: Option<String>,
    pub scores: ScoreRecord,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Question {
    pub prompt: String,
    pub context: Option<String>,
    pub options: Vec<OptionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChoiceBlock {
    pub setup: Vec<String>,
    pub question: Question,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoryFragment {
    pub intro: Vec<String>,
    pub question: Question,
    pub continuation: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretReveal {
    pub visual: Option<String>,
    pub text: Vec<String>,
    pub persistent: bool,
    pub journal_entry: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretQuestion {
    pub setup: Vec<String>,
    pub prompt: String,
    pub options: Vec<OptionRecord>,
    pub secret_reveal: SecretReveal,
}

impl SecretQuestion {
    /// Project the secret question onto the common question shape.
    pub fn to_question(&self) -> Question {
        Question {
            prompt: self.prompt.clone(),
            context: None,
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NameQuestion {
    pub setup: Vec<String>,
    pub prompt: String,
    pub options: Vec<OptionRecord>,
}

impl NameQuestion {
    /// Project the name question onto the common question shape.
    pub fn to_question(&self) -> Question {
        Question {
            prompt: self.prompt.clone(),
            context: None,
            options: self.options.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExitSection {
    pub final_lines: Vec<String>,
}

/// The parsed narrative script for one cinematic sequence.
///
/// Produced by the loader, consumed by value when the plan is built.
/// Serializes back to the authored JSON shape, which the loader accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NarrativeDocument {
    #[serde(rename = "type")]
    pub scene_type: Option<String>,
    pub metadata: Metadata,
    pub boot_sequence: BootSequence,
    pub opening_monologue: Monologue,
    pub first_choice: ChoiceBlock,
    pub story_fragment: StoryFragment,
    pub secret_question: SecretQuestion,
    pub name_question: NameQuestion,
    pub exit: ExitSection,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(id: &str) -> OptionRecord {
        OptionRecord {
            id: id.to_string(),
            text: format!("{id} text"),
            scores: ScoreRecord {
                light: 1,
                shadow: 0,
                ambition: 2,
            },
            ..OptionRecord::default()
        }
    }

    #[test]
    fn secret_question_projects_prompt_and_options() {
        let secret = SecretQuestion {
            setup: vec!["one more thing".to_string()],
            prompt: "Can you keep a secret?".to_string(),
            options: vec![option("yes"), option("no")],
            secret_reveal: SecretReveal::default(),
        };

        let question = secret.to_question();
        assert_eq!(question.prompt, "Can you keep a secret?");
        assert!(question.context.is_none());
        assert_eq!(question.options.len(), 2);
        assert_eq!(question.options[1].id, "no");
    }

    #[test]
    fn name_question_keeps_option_scores() {
        let name = NameQuestion {
            setup: Vec::new(),
            prompt: "What is your name?".to_string(),
            options: vec![option("wanderer")],
        };

        let question = name.to_question();
        assert_eq!(question.options[0].scores.ambition, 2);
    }

    #[test]
    fn document_default_is_empty() {
        let doc = NarrativeDocument::default();
        assert!(doc.boot_sequence.glitch_lines.is_empty());
        assert!(!doc.boot_sequence.fade_to_stable);
        assert!(doc.exit.final_lines.is_empty());
    }
}
