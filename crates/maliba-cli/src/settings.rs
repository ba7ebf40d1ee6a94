//! Harness settings: a JSON file plus environment overrides.
//!
//! The file path comes from `MALIBA_CONFIG` (default `maliba.json` in the
//! working directory). A missing or unreadable file falls back to the
//! built-in defaults with a warning. Overrides follow `MALIBA_<KEY>`.

use maliba_core::{BotDifficulty, GameConfig, HeuristicWeights, PlayerType};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "maliba.json";

/// Everything the self-play harness needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Number of games to play
    pub games: u32,
    /// JSON-lines transcript file; stdout when absent
    pub transcript: Option<PathBuf>,
    /// Per-seat bot difficulty; seats without an entry follow their player type
    pub difficulties: Vec<BotDifficulty>,
    pub weights: HeuristicWeights,
    pub game: GameConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            games: 1,
            transcript: None,
            difficulties: Vec::new(),
            weights: HeuristicWeights::default(),
            game: GameConfig::default(),
        }
    }
}

impl Settings {
    /// Bot difficulty for a seat
    pub fn difficulty(&self, seat: usize) -> BotDifficulty {
        if let Some(&difficulty) = self.difficulties.get(seat) {
            return difficulty;
        }
        match self.game.players.get(seat) {
            Some(PlayerType::Random) => BotDifficulty::Easy,
            _ => BotDifficulty::Medium,
        }
    }
}

/// Load settings from `MALIBA_CONFIG` (or the default path) and apply
/// environment overrides
pub fn load_settings() -> Settings {
    let path = std::env::var("MALIBA_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let settings = load_from_path(Path::new(&path));
    apply_env_overrides(settings, |key| std::env::var(key).ok())
}

/// Load settings from a specific path
pub fn load_from_path(path: &Path) -> Settings {
    if !path.exists() {
        debug!("No settings at {}, using built-in defaults", path.display());
        return Settings::default();
    }
    match std::fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str(&content) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {}: {}, using defaults", path.display(), e);
            Settings::default()
        }
    }
}

/// Parse a comma-separated seat list such as `heuristic,random`
pub fn parse_players(list: &str) -> Option<Vec<PlayerType>> {
    list.split(',')
        .map(|seat| match seat.trim().to_ascii_lowercase().as_str() {
            "human" => Some(PlayerType::Human),
            "heuristic" => Some(PlayerType::Heuristic),
            "random" => Some(PlayerType::Random),
            _ => None,
        })
        .collect()
}

macro_rules! env_override {
    ($lookup:expr, $target:expr, $key:expr) => {
        if let Some(raw) = $lookup($key) {
            match raw.parse() {
                Ok(v) => $target = v,
                Err(_) => warn!("Ignoring {}={:?}: not a valid value", $key, raw),
            }
        }
    };
}

/// Apply `MALIBA_*` overrides read through `lookup`
pub fn apply_env_overrides(
    mut settings: Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Settings {
    env_override!(lookup, settings.games, "MALIBA_GAMES");
    env_override!(lookup, settings.game.seed, "MALIBA_SEED");
    env_override!(lookup, settings.game.rules.max_moves, "MALIBA_MAX_MOVES");
    env_override!(lookup, settings.game.rules.tokens_per_player, "MALIBA_TOKENS_PER_PLAYER");

    if let Some(path) = lookup("MALIBA_TRANSCRIPT") {
        settings.transcript = Some(PathBuf::from(path));
    }
    if let Some(list) = lookup("MALIBA_PLAYERS") {
        match parse_players(&list) {
            Some(players) => settings.game.players = players,
            None => warn!("Ignoring MALIBA_PLAYERS={:?}: unknown player type", list),
        }
    }
    settings
}
