/// Game state shared by the player and stage controller, and its flat JSON
/// save format.
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use thiserror::Error;
use tracing::{info, warn};

use crate::core::alignment::AlignmentScorer;
use crate::schema::alignment::{AlignmentState, DreamweaverThread, PersonaAxis};

/// Current save file version. Written on save; loads do not migrate.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Escape markup characters so a player-entered name is safe to display.
/// Nothing else in the name is altered.
pub fn sanitize_player_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Undo `sanitize_player_name`. Text that is not one of its three escapes
/// passes through unchanged.
fn unescape_player_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut rest = name;
    while let Some(ch) = rest.chars().next() {
        if ch == '&' {
            if let Some((raw, tail)) = [("&amp;", '&'), ("&lt;", '<'), ("&gt;", '>')]
                .iter()
                .find_map(|&(escape, raw)| rest.strip_prefix(escape).map(|tail| (raw, tail)))
            {
                out.push(raw);
                rest = tail;
                continue;
            }
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

/// Mutable run state, shared between the beat player and stage controller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameState {
    pub current_scene: usize,
    player_name: String,
    pub thread: DreamweaverThread,
    pub scorer: AlignmentScorer,
    pub selected_dreamweaver: Option<String>,
    /// Party snapshot owned by the character system; carried opaquely.
    pub party: Value,
    /// Collected narrative markers.
    pub shards: Vec<String>,
    pub scene_progress: BTreeMap<String, Value>,
}

pub type SharedGameState = Rc<RefCell<GameState>>;

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> SharedGameState {
        Rc::new(RefCell::new(self))
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn set_player_name(&mut self, name: &str) {
        self.player_name = sanitize_player_name(name);
    }

    pub fn add_shard(&mut self, marker: impl Into<String>) {
        let marker = marker.into();
        if !self.shards.contains(&marker) {
            self.shards.push(marker);
        }
    }

    /// Clear everything for a fresh run.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A flat, serializable snapshot of `GameState`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveState {
    pub version: u32,
    pub timestamp: String,
    pub game_state: SavedGameState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedGameState {
    pub current_scene: usize,
    pub player_name: String,
    pub dreamweaver_thread: String,
    pub dreamweaver_scores: AlignmentState,
    pub selected_dreamweaver: Option<String>,
    pub player_party: Value,
    pub shards: Vec<String>,
    pub scene_progress: BTreeMap<String, Value>,
}

impl SaveState {
    pub fn capture(state: &GameState) -> Self {
        Self {
            version: SAVE_VERSION,
            timestamp: chrono::Utc::now().to_rfc3339(),
            game_state: SavedGameState {
                current_scene: state.current_scene,
                player_name: state.player_name.clone(),
                dreamweaver_thread: state.thread.label().to_string(),
                dreamweaver_scores: state.scorer.state(),
                selected_dreamweaver: state.selected_dreamweaver.clone(),
                player_party: state.party.clone(),
                shards: state.shards.clone(),
                scene_progress: state.scene_progress.clone(),
            },
        }
    }

    /// Build a complete `GameState` from this snapshot. Choice history is not saved.
    pub fn restore(&self) -> GameState {
        let saved = &self.game_state;
        let thread = DreamweaverThread::from_label(&saved.dreamweaver_thread).unwrap_or_else(|| {
            warn!(thread = %saved.dreamweaver_thread, "unknown thread label in save, using default");
            DreamweaverThread::default()
        });
        GameState {
            current_scene: saved.current_scene,
            // Saved names are already escaped; normalizing keeps hand-edited
            // markup escaped exactly once.
            player_name: sanitize_player_name(&unescape_player_name(&saved.player_name)),
            thread,
            scorer: AlignmentScorer::from_state(saved.dreamweaver_scores),
            selected_dreamweaver: saved.selected_dreamweaver.clone(),
            party: saved.player_party.clone(),
            shards: saved.shards.clone(),
            scene_progress: saved.scene_progress.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String, SaveError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a save file, skipping fields of unexpected type.
    ///
    /// Only a root that is not a JSON object fails.
    pub fn from_json(source: &str) -> Result<Self, SaveError> {
        let root: Map<String, Value> = serde_json::from_str(source)?;

        let version = field(&root, "version").unwrap_or(SAVE_VERSION);
        if version != SAVE_VERSION {
            warn!(found = version, expected = SAVE_VERSION, "save version differs, loading as-is");
        }
        let timestamp = field(&root, "timestamp").unwrap_or_default();
        let game_state = match root.get("gameState") {
            Some(Value::Object(obj)) => saved_game_state(obj),
            Some(_) => {
                warn!(field = "gameState", "expected an object, using defaults");
                SavedGameState::default()
            }
            None => SavedGameState::default(),
        };

        Ok(Self {
            version,
            timestamp,
            game_state,
        })
    }
}

fn saved_game_state(obj: &Map<String, Value>) -> SavedGameState {
    let defaults = SavedGameState::default();
    SavedGameState {
        current_scene: field(obj, "currentScene").unwrap_or(defaults.current_scene),
        player_name: field(obj, "playerName").unwrap_or(defaults.player_name),
        dreamweaver_thread: field(obj, "dreamweaverThread").unwrap_or(defaults.dreamweaver_thread),
        dreamweaver_scores: match obj.get("dreamweaverScores") {
            Some(Value::Object(scores)) => alignment(scores),
            Some(_) => {
                warn!(field = "dreamweaverScores", "expected an object, using zero scores");
                AlignmentState::default()
            }
            None => AlignmentState::default(),
        },
        selected_dreamweaver: field(obj, "selectedDreamweaver"),
        player_party: obj.get("playerParty").cloned().unwrap_or(Value::Null),
        shards: field(obj, "shards").unwrap_or(defaults.shards),
        scene_progress: field(obj, "sceneProgress").unwrap_or(defaults.scene_progress),
    }
}

fn alignment(obj: &Map<String, Value>) -> AlignmentState {
    let mut state = AlignmentState::default();
    for axis in PersonaAxis::ALL {
        if let Some(points) = field::<i32>(obj, axis.key()) {
            *state.get_mut(axis) = points;
        }
    }
    state
}

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str) -> Option<T> {
    let value = obj.get(key)?;
    if value.is_null() {
        return None;
    }
    match T::deserialize(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            warn!(field = key, error = %err, "skipping malformed save field");
            None
        }
    }
}

/// Reads and writes one save file.
#[derive(Debug, Clone)]
pub struct SaveStore {
    path: PathBuf,
}

impl SaveStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn save(&self, state: &GameState) -> Result<SaveState, SaveError> {
        let snapshot = SaveState::capture(state);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, snapshot.to_json()?)?;
        info!(path = %self.path.display(), scene = state.current_scene, "game saved");
        Ok(snapshot)
    }

    /// `Ok(None)` when no save file exists yet.
    pub fn load(&self) -> Result<Option<SaveState>, SaveError> {
        let source = match std::fs::read_to_string(&self.path) {
            Ok(source) => source,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let snapshot = SaveState::from_json(&source)?;
        info!(path = %self.path.display(), timestamp = %snapshot.timestamp, "game loaded");
        Ok(Some(snapshot))
    }

    /// Replace `state` wholesale with the saved one. Returns `false` if there
    /// was nothing to load; on error `state` is untouched.
    pub fn load_into(&self, state: &mut GameState) -> Result<bool, SaveError> {
        match self.load()? {
            Some(snapshot) => {
                *state = snapshot.restore();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn delete(&self) -> Result<(), SaveError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
