//! Saving and restoring the mutable game state.
//!
//! The document carries everything an action can change, including the
//! random generator, so a restored game continues exactly where the saved
//! one stopped. Board and rule configuration are not part of the document;
//! the caller supplies the same `GameConfig` on restore. The undo stack is
//! not saved.

use crate::actions::RouteId;
use crate::board::{Board, PlayerId};
use crate::config::GameConfig;
use crate::game::{EndReason, GameError, GamePhase, GameState, HistoryEntry, TradeEntity};
use crate::hex::HexCoord;
use crate::player::{MeepleColor, Player};
use crate::routes::TradeRoute;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Serializable snapshot of a game in progress.
///
/// Hex-keyed maps are stored as `[hex, value]` pairs in hex order so the
/// document is valid JSON and its bytes are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStateJson {
    pub current_player: PlayerId,
    pub phase: GamePhase,
    pub move_count: u32,
    pub next_route_id: RouteId,
    pub players: Vec<Player>,
    pub tokens: Vec<(HexCoord, Vec<PlayerId>)>,
    pub meeples: Vec<(HexCoord, Vec<MeepleColor>)>,
    pub entities: Vec<(HexCoord, Vec<TradeEntity>)>,
    pub routes: Vec<TradeRoute>,
    pub history: Vec<HistoryEntry>,
    pub rewards: Vec<f64>,
    pub final_returns: Option<Vec<f64>>,
    pub end_reason: Option<EndReason>,
    pub rng: ChaCha8Rng,
}

fn pairs<V: Clone>(map: &BTreeMap<HexCoord, V>) -> Vec<(HexCoord, V)> {
    map.iter().map(|(hex, value)| (*hex, value.clone())).collect()
}

fn bad(message: impl Into<String>) -> GameError {
    GameError::Persistence(message.into())
}

/// Rebuild a hex map, rejecting hexes off the board and repeated keys
fn hex_map<V>(
    board: &Board,
    what: &str,
    entries: Vec<(HexCoord, V)>,
) -> Result<BTreeMap<HexCoord, V>, GameError> {
    let mut map = BTreeMap::new();
    for (hex, value) in entries {
        if !board.is_valid(&hex) {
            return Err(bad(format!("{} at off-board hex {}", what, hex)));
        }
        if map.insert(hex, value).is_some() {
            return Err(bad(format!("{} listed twice at {}", what, hex)));
        }
    }
    Ok(map)
}

impl GameState {
    pub fn to_document(&self) -> GameStateJson {
        GameStateJson {
            current_player: self.current_player,
            phase: self.phase,
            move_count: self.move_count,
            next_route_id: self.next_route_id,
            players: self.players.clone(),
            tokens: pairs(&self.tokens),
            meeples: pairs(&self.meeples),
            entities: pairs(&self.entities),
            routes: self.routes.clone(),
            history: self.history.clone(),
            rewards: self.rewards.clone(),
            final_returns: self.final_returns.clone(),
            end_reason: self.end_reason,
            rng: self.rng.clone(),
        }
    }

    /// Serialize the state document
    pub fn to_json(&self) -> Result<String, GameError> {
        serde_json::to_string(&self.to_document()).map_err(|e| bad(e.to_string()))
    }

    /// Restore a game saved with [`GameState::to_json`] under the same
    /// configuration
    pub fn from_json(config: GameConfig, json: &str) -> Result<Self, GameError> {
        let document: GameStateJson =
            serde_json::from_str(json).map_err(|e| bad(e.to_string()))?;
        config.validate()?;
        let board = Board::from_config(&config.board)?;
        Self::from_document(Arc::new(board), config, document)
    }

    /// Restore a game from a parsed document
    pub fn from_document(
        board: Arc<Board>,
        config: GameConfig,
        document: GameStateJson,
    ) -> Result<Self, GameError> {
        let n = config.players.len();
        if document.players.len() != n {
            return Err(bad(format!(
                "document has {} players, configuration has {}",
                document.players.len(),
                n
            )));
        }
        if let Some((position, player)) = document
            .players
            .iter()
            .enumerate()
            .find(|(i, p)| p.id as usize != *i)
        {
            return Err(bad(format!(
                "player {} stored at position {}",
                player.id, position
            )));
        }
        if document.current_player as usize >= n {
            return Err(bad(format!("no player {} to move", document.current_player)));
        }
        if document.rewards.len() != n
            || document.final_returns.as_ref().is_some_and(|r| r.len() != n)
        {
            return Err(bad("reward vectors do not match the player count"));
        }

        let owner_ok = |p: PlayerId| (p as usize) < n;
        if !document.tokens.iter().all(|(_, owners)| owners.iter().copied().all(owner_ok))
            || !document
                .entities
                .iter()
                .all(|(_, list)| list.iter().all(|e| owner_ok(e.owner)))
        {
            return Err(bad("piece owned by an unknown player"));
        }
        for route in &document.routes {
            if !owner_ok(route.owner) {
                return Err(bad(format!("route #{} has unknown owner", route.id)));
            }
            if route.id >= document.next_route_id {
                return Err(bad(format!("route #{} is beyond the next route id", route.id)));
            }
            if let Some(hex) = route.hexes().iter().find(|h| !board.is_valid(h)) {
                return Err(bad(format!("route #{} leaves the board at {}", route.id, hex)));
            }
            if route.hexes().windows(2).any(|w| w[0] >= w[1]) {
                return Err(bad(format!("route #{} hexes are not canonical", route.id)));
            }
        }

        let mut state = GameState::from_parts(Arc::clone(&board), Arc::new(config));
        state.tokens = hex_map(&board, "token", document.tokens)?;
        state.meeples = hex_map(&board, "meeples", document.meeples)?;
        state.entities = hex_map(&board, "entity", document.entities)?;
        state.current_player = document.current_player;
        state.phase = document.phase;
        state.move_count = document.move_count;
        state.next_route_id = document.next_route_id;
        state.players = document.players;
        state.routes = document.routes;
        state.history = document.history;
        state.rewards = document.rewards;
        state.final_returns = document.final_returns;
        state.end_reason = document.end_reason;
        state.rng = document.rng;
        state.reset_legal_cache();

        debug!(phase = ?state.phase, moves = state.move_count, "state restored");
        Ok(state)
    }
}
