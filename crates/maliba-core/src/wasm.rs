//! WebAssembly bindings for the Mali-Ba rules engine.
//!
//! This module exposes the game engine to JavaScript through wasm-bindgen.
//! Structured results cross the boundary as JSON strings.

use wasm_bindgen::prelude::*;

use crate::bot::{Bot, BotDifficulty};
use crate::codec::{action_to_string, parse_action, ActionId};
use crate::config::GameConfig;
use crate::game::GameState;
use crate::scoring;

/// Initialize panic hook for better error messages in browser console
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// WASM-exposed game wrapper
#[wasm_bindgen]
pub struct WasmGame {
    state: GameState,
}

#[wasm_bindgen]
impl WasmGame {
    /// Create a new game from a configuration document; an empty string
    /// uses the defaults
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<WasmGame, JsValue> {
        let config = if config_json.trim().is_empty() {
            GameConfig::default()
        } else {
            GameConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?
        };
        let state = GameState::new(config).map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmGame { state })
    }

    /// Restore a saved game under a configuration
    #[wasm_bindgen(js_name = fromState)]
    pub fn from_state(config_json: &str, state_json: &str) -> Result<WasmGame, JsValue> {
        let config =
            GameConfig::from_json(config_json).map_err(|e| JsValue::from_str(&e.to_string()))?;
        let state = GameState::from_json(config, state_json)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(WasmGame { state })
    }

    /// Get the current game state as JSON
    #[wasm_bindgen(js_name = getState)]
    pub fn get_state(&self) -> String {
        self.state.to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the board layout as JSON
    #[wasm_bindgen(js_name = getBoard)]
    pub fn get_board(&self) -> String {
        let board_json = self.state.board().to_json_friendly();
        serde_json::to_string(&board_json).unwrap_or_else(|_| "{}".to_string())
    }

    #[wasm_bindgen(js_name = getCurrentPlayer)]
    pub fn get_current_player(&self) -> u8 {
        self.state.current_player()
    }

    #[wasm_bindgen(js_name = getPhase)]
    pub fn get_phase(&self) -> String {
        serde_json::to_string(&self.state.phase()).unwrap_or_else(|_| "\"Unknown\"".to_string())
    }

    /// Legal action ids as a JSON array
    #[wasm_bindgen(js_name = getLegalActions)]
    pub fn get_legal_actions(&self) -> String {
        serde_json::to_string(self.state.legal_actions()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Legal actions with their descriptions, as `[[id, text], ...]`
    #[wasm_bindgen(js_name = getLegalMoves)]
    pub fn get_legal_moves(&self) -> String {
        let described: Vec<(ActionId, String)> = self
            .state
            .legal_moves()
            .iter()
            .map(|(id, mv)| (id, mv.to_string()))
            .collect();
        serde_json::to_string(&described).unwrap_or_else(|_| "[]".to_string())
    }

    #[wasm_bindgen(js_name = describeAction)]
    pub fn describe_action(&self, action: ActionId) -> String {
        action_to_string(&self.state, action)
    }

    #[wasm_bindgen(js_name = applyAction)]
    pub fn apply_action(&mut self, action: ActionId) -> Result<(), JsValue> {
        self.state
            .apply_action(action)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    /// Apply a move given in its text form, e.g. `move (0,1,-1)>(1,0,-1) post`
    #[wasm_bindgen(js_name = applyMoveString)]
    pub fn apply_move_string(&mut self, text: &str) -> Result<(), JsValue> {
        let action = parse_action(&self.state, text)
            .ok_or_else(|| JsValue::from_str(&format!("Not a legal move: {}", text)))?;
        self.apply_action(action)
    }

    pub fn undo(&mut self) -> Result<(), JsValue> {
        self.state.undo().map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = isFinished)]
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// Final returns as a JSON array (zeros while the game runs)
    #[wasm_bindgen(js_name = getReturns)]
    pub fn get_returns(&self) -> String {
        serde_json::to_string(&self.state.returns()).unwrap_or_else(|_| "[]".to_string())
    }

    /// Score breakdown for every player as JSON
    #[wasm_bindgen(js_name = getScores)]
    pub fn get_scores(&self) -> String {
        serde_json::to_string(&scoring::score_all(&self.state)).unwrap_or_else(|_| "[]".to_string())
    }

    /// Get a bot's choice for the player to move (`easy`, `medium`, `hard`)
    #[wasm_bindgen(js_name = getBotAction)]
    pub fn get_bot_action(&self, difficulty: &str) -> Option<ActionId> {
        let difficulty = match difficulty {
            "easy" => BotDifficulty::Easy,
            "hard" => BotDifficulty::Hard,
            _ => BotDifficulty::Medium,
        };
        let mut bot = Bot::new(self.state.current_player(), difficulty);
        bot.choose_action(&self.state)
    }
}
