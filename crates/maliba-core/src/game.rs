//! Core game state machine.
//!
//! This module contains the main `GameState` struct: phase transitions,
//! action application, the undo stack, shaped rewards and end-game
//! detection. Move generation lives in `movegen`, route bookkeeping in
//! `routes`, final scoring in `scoring`.

use crate::actions::{Move, RouteId};
use crate::board::{Board, PlayerId};
use crate::codec::{encode, ActionId};
use crate::config::{EndTrigger, GameConfig, Requirement};
use crate::hex::HexCoord;
use crate::movegen::{self, can_place_post, distribution_path, LegalMoves};
use crate::player::{Goods, MeepleColor, Player};
use crate::routes::{canonicalize, validate_route, RouteRejection, TradeRoute};
use crate::scoring;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Game phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GamePhase {
    /// Before the board is stocked with meeples
    Setup,
    /// Players place their starting tokens
    PlaceToken,
    /// Main phase
    Play,
    /// Reserved; the modeled flow never enters it
    EndRound,
    /// Game is over
    GameOver,
}

/// Errors that can occur when building or driving a game
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum GameError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Action {0} is not legal here")]
    InvalidAction(ActionId),

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Game is over")]
    GameOver,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Route rejected: {0}")]
    Route(#[from] RouteRejection),

    #[error("Bad state document: {0}")]
    Persistence(String),
}

/// Tier of a trading entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Post,
    Center,
}

/// A player-owned trading entity on a hex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEntity {
    pub owner: PlayerId,
    pub kind: EntityKind,
}

/// One applied move
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub player: PlayerId,
    /// `None` for moves applied directly that have no id
    pub action: Option<ActionId>,
    /// What actually happened; a degenerate mancala is recorded as a pass
    pub mv: Move,
}

/// What ended the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    MoveCap,
    RareGoods(PlayerId),
    RouteCount(PlayerId),
    Connectivity(PlayerId),
    RegionSpread(PlayerId),
}

/// Everything an action can change, except the history (which only grows
/// by one entry per action and is popped on undo)
#[derive(Debug, Clone)]
struct Snapshot {
    players: Vec<Player>,
    current_player: PlayerId,
    phase: GamePhase,
    tokens: BTreeMap<HexCoord, Vec<PlayerId>>,
    meeples: BTreeMap<HexCoord, Vec<MeepleColor>>,
    entities: BTreeMap<HexCoord, Vec<TradeEntity>>,
    routes: Vec<TradeRoute>,
    next_route_id: RouteId,
    rewards: Vec<f64>,
    final_returns: Option<Vec<f64>>,
    end_reason: Option<EndReason>,
    move_count: u32,
    rng: ChaCha8Rng,
}

/// The complete game state
#[derive(Debug, Clone)]
pub struct GameState {
    pub(crate) board: Arc<Board>,
    pub(crate) config: Arc<GameConfig>,
    pub(crate) players: Vec<Player>,
    pub(crate) current_player: PlayerId,
    pub(crate) phase: GamePhase,
    /// Tokens by hex; a hex may hold several players' tokens
    pub(crate) tokens: BTreeMap<HexCoord, Vec<PlayerId>>,
    /// Meeple stacks; index 0 is the front
    pub(crate) meeples: BTreeMap<HexCoord, Vec<MeepleColor>>,
    pub(crate) entities: BTreeMap<HexCoord, Vec<TradeEntity>>,
    pub(crate) routes: Vec<TradeRoute>,
    pub(crate) next_route_id: RouteId,
    pub(crate) history: Vec<HistoryEntry>,
    /// Cumulative shaped rewards per player
    pub(crate) rewards: Vec<f64>,
    pub(crate) final_returns: Option<Vec<f64>>,
    pub(crate) end_reason: Option<EndReason>,
    pub(crate) move_count: u32,
    pub(crate) rng: ChaCha8Rng,
    undo_stack: Vec<Snapshot>,
    legal: OnceCell<LegalMoves>,
}

impl GameState {
    /// Create a new game from a configuration
    pub fn new(config: GameConfig) -> Result<Self, GameError> {
        config.validate()?;
        let board = Board::from_config(&config.board)?;
        Ok(Self::from_parts(Arc::new(board), Arc::new(config)))
    }

    pub(crate) fn from_parts(board: Arc<Board>, config: Arc<GameConfig>) -> Self {
        let players: Vec<Player> = config
            .players
            .iter()
            .enumerate()
            .map(|(i, kind)| Player::new(i as PlayerId, *kind, config.rules.post_supply))
            .collect();
        let rewards = vec![0.0; players.len()];
        let rng = ChaCha8Rng::seed_from_u64(config.seed);

        Self {
            board,
            config,
            players,
            current_player: 0,
            phase: GamePhase::Setup,
            tokens: BTreeMap::new(),
            meeples: BTreeMap::new(),
            entities: BTreeMap::new(),
            routes: Vec::new(),
            next_route_id: 0,
            history: Vec::new(),
            rewards,
            final_returns: None,
            end_reason: None,
            move_count: 0,
            rng,
            undo_stack: Vec::new(),
            legal: OnceCell::new(),
        }
    }

    /// Independent copy for what-if simulation, without the undo stack
    pub fn scratch(&self) -> GameState {
        GameState {
            board: Arc::clone(&self.board),
            config: Arc::clone(&self.config),
            players: self.players.clone(),
            current_player: self.current_player,
            phase: self.phase,
            tokens: self.tokens.clone(),
            meeples: self.meeples.clone(),
            entities: self.entities.clone(),
            routes: self.routes.clone(),
            next_route_id: self.next_route_id,
            history: self.history.clone(),
            rewards: self.rewards.clone(),
            final_returns: self.final_returns.clone(),
            end_reason: self.end_reason,
            move_count: self.move_count,
            rng: self.rng.clone(),
            undo_stack: Vec::new(),
            legal: OnceCell::new(),
        }
    }

    // ==================== Accessors ====================

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    /// A player by id (panics on an unknown id)
    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[id as usize]
    }

    /// Players whose tokens are on a hex
    pub fn tokens_at(&self, hex: &HexCoord) -> &[PlayerId] {
        self.tokens.get(hex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Hexes holding the player's tokens, in hex order
    pub fn token_hexes(&self, player: PlayerId) -> Vec<HexCoord> {
        self.tokens
            .iter()
            .filter(|(_, owners)| owners.contains(&player))
            .map(|(hex, _)| *hex)
            .collect()
    }

    /// Meeple stack on a hex, front first
    pub fn meeples_at(&self, hex: &HexCoord) -> &[MeepleColor] {
        self.meeples.get(hex).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entities_at(&self, hex: &HexCoord) -> &[TradeEntity] {
        self.entities.get(hex).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The player's entity on a hex, if any
    pub fn entity_of(&self, player: PlayerId, hex: &HexCoord) -> Option<EntityKind> {
        self.entities_at(hex)
            .iter()
            .find(|e| e.owner == player)
            .map(|e| e.kind)
    }

    /// All of the player's entities, in hex order
    pub fn entities_of(&self, player: PlayerId) -> impl Iterator<Item = (HexCoord, EntityKind)> + '_ {
        self.entities.iter().filter_map(move |(hex, list)| {
            list.iter()
                .find(|e| e.owner == player)
                .map(|e| (*hex, e.kind))
        })
    }

    pub fn centers_of(&self, player: PlayerId) -> usize {
        self.entities_of(player)
            .filter(|(_, kind)| *kind == EntityKind::Center)
            .count()
    }

    pub fn routes(&self) -> &[TradeRoute] {
        &self.routes
    }

    pub fn active_routes(&self, player: PlayerId) -> impl Iterator<Item = &TradeRoute> + '_ {
        self.routes
            .iter()
            .filter(move |r| r.owner == player && r.active)
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    /// Cumulative shaped rewards per player
    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    /// Final returns once the game is over, zeros before that
    pub fn returns(&self) -> Vec<f64> {
        self.final_returns
            .clone()
            .unwrap_or_else(|| vec![0.0; self.players.len()])
    }

    pub fn end_reason(&self) -> Option<EndReason> {
        self.end_reason
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn is_terminal(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    // ==================== Legal moves ====================

    /// Legal moves for the player to move, generated once per state
    pub fn legal_moves(&self) -> &LegalMoves {
        self.legal.get_or_init(|| movegen::legal_moves(self))
    }

    pub fn legal_actions(&self) -> &[ActionId] {
        &self.legal_moves().actions
    }

    pub(crate) fn reset_legal_cache(&mut self) {
        self.legal = OnceCell::new();
    }

    /// A uniformly random legal action, drawn from the state's generator
    pub fn random_action(&mut self) -> Option<ActionId> {
        let count = self.legal_moves().len();
        if count == 0 {
            return None;
        }
        let i = self.rng.gen_range(0..count);
        Some(self.legal_moves().actions[i])
    }

    // ==================== Applying moves ====================

    /// Apply a legal action id.
    ///
    /// Ids that are malformed or not legal in this state are rejected with
    /// `InvalidAction` and leave the state untouched.
    pub fn apply_action(&mut self, action: ActionId) -> Result<(), GameError> {
        if self.is_terminal() {
            return Err(GameError::GameOver);
        }
        let mv = self
            .legal_moves()
            .move_for(action)
            .cloned()
            .ok_or(GameError::InvalidAction(action))?;
        self.apply_unchecked(Some(action), mv);
        Ok(())
    }

    /// Apply a structured move for the player to move.
    ///
    /// Income, route updates and route deletions are validated and rejected
    /// with an error. Every other move must satisfy its preconditions;
    /// violating them is a caller bug and panics.
    pub fn apply_move(&mut self, mv: Move) -> Result<(), GameError> {
        if self.is_terminal() {
            return Err(GameError::GameOver);
        }
        let player = self.current_player;
        match &mv {
            Move::Invalid => return Err(GameError::InvalidMove(mv.to_string())),
            Move::TradeRouteUpdate { id, hexes } => {
                self.require_play(&mv)?;
                self.check_route_owner(player, *id)?;
                validate_route(self, player, &canonicalize(hexes), None, Some(*id))?;
            }
            Move::TradeRouteDelete { id } => {
                self.require_play(&mv)?;
                self.check_route_owner(player, *id)?;
            }
            Move::Income(plan) => {
                self.require_play(&mv)?;
                let payout = movegen::income_plan(self, player, plan.profile);
                if !movegen::income_allowed(self, player) || payout.is_empty() || payout != *plan {
                    return Err(GameError::InvalidMove(mv.to_string()));
                }
            }
            _ => {}
        }
        let action = encode(&self.board, &mv);
        self.apply_unchecked(action, mv);
        Ok(())
    }

    fn require_play(&self, mv: &Move) -> Result<(), GameError> {
        if self.phase != GamePhase::Play {
            return Err(GameError::InvalidMove(format!(
                "{} outside the play phase",
                mv
            )));
        }
        Ok(())
    }

    fn apply_unchecked(&mut self, action: Option<ActionId>, mv: Move) {
        let snapshot = self.capture();
        self.undo_stack.push(snapshot);

        let player = self.current_player;
        let phase_before = self.phase;
        let (recorded, bonus) = self.execute(player, mv);
        debug!(player, action = ?action, mv = %recorded, "applied");

        self.history.push(HistoryEntry {
            player,
            action,
            mv: recorded,
        });
        self.move_count += 1;
        self.rewards[player as usize] += self.config.rewards.step_penalty + bonus;

        if self.phase == phase_before {
            self.current_player = (self.current_player + 1) % self.players.len() as PlayerId;
        }
        self.refresh_route_activity();
        self.reset_legal_cache();
        self.check_terminal();
    }

    /// Carry out a move's effect. Returns the move to record and the shaped
    /// reward bonus it earned.
    pub(crate) fn execute(&mut self, player: PlayerId, mv: Move) -> (Move, f64) {
        match mv {
            Move::Invalid => panic!("Invalid move applied"),

            Move::Pass => {
                if self.phase == GamePhase::Setup {
                    self.stock_meeples();
                    self.phase = GamePhase::PlaceToken;
                    self.current_player = 0;
                }
                (Move::Pass, 0.0)
            }

            Move::PlaceToken { hex } => {
                assert_eq!(self.phase, GamePhase::PlaceToken, "Not placing tokens");
                assert!(
                    self.board.is_valid(&hex)
                        && !self.board.is_city(&hex)
                        && self.tokens_at(&hex).is_empty(),
                    "Player {} cannot place a token at {}",
                    player,
                    hex
                );
                self.tokens.entry(hex).or_default().push(player);
                if self.all_tokens_placed() {
                    self.phase = GamePhase::Play;
                    self.current_player = 0;
                }
                (Move::PlaceToken { hex }, 0.0)
            }

            Move::Mancala {
                start,
                destination,
                place_post,
                route,
            } => {
                assert_eq!(self.phase, GamePhase::Play, "Mancala outside play");
                assert!(
                    self.tokens_at(&start).contains(&player),
                    "Player {} has no token at {}",
                    player,
                    start
                );
                assert!(
                    self.board.is_valid(&destination) && destination != start,
                    "Player {} cannot move to {}",
                    player,
                    destination
                );

                let carried = self.meeples.remove(&start).unwrap_or_default();
                let path = if carried.is_empty() {
                    assert!(
                        start.is_adjacent(&destination),
                        "Empty-handed token at {} can only step to a neighbor",
                        start
                    );
                    Vec::new()
                } else {
                    match distribution_path(&self.board, start, destination, carried.len()) {
                        Some(path) => path,
                        None => {
                            debug!(player, %start, %destination, carried = carried.len(),
                                "no distribution path; move becomes a pass");
                            self.meeples.insert(start, carried);
                            return (Move::Pass, 0.0);
                        }
                    }
                };

                self.move_token(player, start, destination);
                for (hex, meeple) in path.iter().zip(carried) {
                    self.meeples.entry(*hex).or_default().push(meeple);
                }

                let mut bonus = 0.0;
                if place_post {
                    bonus += self.place_post(player, destination);
                }
                if let Some(route) = &route {
                    assert!(place_post, "A mancala route needs a post");
                    self.declare_route(player, route, Some(destination));
                }
                let recorded = Move::Mancala {
                    start,
                    destination,
                    place_post,
                    route,
                };
                (recorded, bonus)
            }

            Move::Upgrade { hex, route } => {
                assert_eq!(self.phase, GamePhase::Play, "Upgrade outside play");
                let bonus = self.upgrade_post(player, hex);
                if let Some(route) = &route {
                    self.declare_route(player, route, Some(hex));
                }
                (Move::Upgrade { hex, route }, bonus)
            }

            Move::Income(plan) => {
                assert_eq!(self.phase, GamePhase::Play, "Income outside play");
                let owner = &mut self.players[player as usize];
                let new_goods = plan
                    .common
                    .names()
                    .filter(|g| !owner.common_goods.contains(g))
                    .count()
                    + plan
                        .rare
                        .names()
                        .filter(|g| !owner.rare_goods.contains(g))
                        .count();
                owner.common_goods.add_all(&plan.common);
                owner.rare_goods.add_all(&plan.rare);
                let bonus = new_goods as f64 * self.config.rewards.new_good_bonus;
                (Move::Income(plan), bonus)
            }

            Move::TradeRouteCreate { hexes } => {
                assert_eq!(self.phase, GamePhase::Play, "Route outside play");
                let hexes = canonicalize(&hexes);
                self.declare_route(player, &hexes, None);
                (Move::TradeRouteCreate { hexes }, 0.0)
            }

            Move::TradeRouteUpdate { id, hexes } => {
                if let Err(rejection) = self.update_route(player, id, &hexes) {
                    panic!("Player {} cannot reroute #{}: {}", player, id, rejection);
                }
                let hexes = canonicalize(&hexes);
                (Move::TradeRouteUpdate { id, hexes }, 0.0)
            }

            Move::TradeRouteDelete { id } => {
                if let Err(rejection) = self.delete_route(player, id) {
                    panic!("Player {} cannot delete route #{}: {}", player, id, rejection);
                }
                (Move::TradeRouteDelete { id }, 0.0)
            }
        }
    }

    fn stock_meeples(&mut self) {
        let board = Arc::clone(&self.board);
        let per_hex = self.config.rules.meeples_per_hex;
        for &hex in board.hexes() {
            let stack: Vec<MeepleColor> = (0..per_hex)
                .map(|_| MeepleColor::ALL[self.rng.gen_range(0..MeepleColor::ALL.len())])
                .collect();
            self.meeples.insert(hex, stack);
        }
    }

    fn all_tokens_placed(&self) -> bool {
        let quota = self.config.rules.tokens_per_player as usize;
        self.players
            .iter()
            .all(|p| self.token_hexes(p.id).len() >= quota)
    }

    fn move_token(&mut self, player: PlayerId, from: HexCoord, to: HexCoord) {
        if let Some(owners) = self.tokens.get_mut(&from) {
            if let Some(i) = owners.iter().position(|&p| p == player) {
                owners.remove(i);
            }
            if owners.is_empty() {
                self.tokens.remove(&from);
            }
        }
        self.tokens.entry(to).or_default().push(player);
    }

    /// Remove the front meeple of a hex, if any
    pub(crate) fn remove_front_meeple(&mut self, hex: &HexCoord) -> Option<MeepleColor> {
        let stack = self.meeples.get_mut(hex)?;
        let meeple = (!stack.is_empty()).then(|| stack.remove(0));
        if stack.is_empty() {
            self.meeples.remove(hex);
        }
        meeple
    }

    /// Place a post and pay for it: the front meeple at the hex, else one
    /// common good from the largest pile, else one rare good
    fn place_post(&mut self, player: PlayerId, hex: HexCoord) -> f64 {
        assert!(
            can_place_post(self, player, &hex),
            "Player {} cannot place a post at {}",
            player,
            hex
        );

        if self.remove_front_meeple(&hex).is_none() {
            let owner = &mut self.players[player as usize];
            if let Some(good) = owner.common_goods.largest().map(str::to_string) {
                owner.common_goods.remove(&good, 1);
            } else if let Some(good) = owner.rare_goods.largest().map(str::to_string) {
                owner.rare_goods.remove(&good, 1);
            } else {
                panic!("Player {} cannot pay for a post at {}", player, hex);
            }
        }

        let rewards = &self.config.rewards;
        let mut bonus = 0.0;
        if let Some(region) = self.board.region_of(&hex) {
            let first_in_region = !self
                .entities_of(player)
                .any(|(h, _)| self.board.region_of(&h) == Some(region));
            if first_in_region {
                bonus += rewards.new_region_bonus;
            }
        }
        if self.board.is_city(&hex) || self.board.is_coastal(&hex) {
            bonus += rewards.key_location_bonus;
        }

        self.players[player as usize].take_post();
        self.entities.entry(hex).or_default().push(TradeEntity {
            owner: player,
            kind: EntityKind::Post,
        });
        bonus
    }

    /// Upgrade an owned post to a center, paying the upgrade cost in common
    /// goods from the largest piles
    fn upgrade_post(&mut self, player: PlayerId, hex: HexCoord) -> f64 {
        assert_eq!(
            self.entity_of(player, &hex),
            Some(EntityKind::Post),
            "Player {} has no post at {}",
            player,
            hex
        );
        let cost = self.config.rules.upgrade_cost;
        let owner = &mut self.players[player as usize];
        let paid: Option<Goods> = owner.common_goods.take_largest(cost);
        assert!(
            paid.is_some(),
            "Player {} cannot pay {} goods to upgrade {}",
            player,
            cost,
            hex
        );
        owner.return_post();

        if let Some(entity) = self
            .entities
            .get_mut(&hex)
            .and_then(|list| list.iter_mut().find(|e| e.owner == player))
        {
            entity.kind = EntityKind::Center;
        }
        self.config.rewards.upgrade_bonus
    }

    fn declare_route(&mut self, player: PlayerId, route: &[HexCoord], exempt: Option<HexCoord>) {
        let hexes = canonicalize(route);
        if let Err(rejection) = validate_route(self, player, &hexes, exempt, None) {
            panic!("Player {} declared an invalid route: {}", player, rejection);
        }
        self.create_route(player, &hexes);
    }

    // ==================== Undo ====================

    fn capture(&self) -> Snapshot {
        Snapshot {
            players: self.players.clone(),
            current_player: self.current_player,
            phase: self.phase,
            tokens: self.tokens.clone(),
            meeples: self.meeples.clone(),
            entities: self.entities.clone(),
            routes: self.routes.clone(),
            next_route_id: self.next_route_id,
            rewards: self.rewards.clone(),
            final_returns: self.final_returns.clone(),
            end_reason: self.end_reason,
            move_count: self.move_count,
            rng: self.rng.clone(),
        }
    }

    /// Revert the most recent action
    pub fn undo(&mut self) -> Result<(), GameError> {
        let snapshot = self.undo_stack.pop().ok_or(GameError::NothingToUndo)?;
        self.players = snapshot.players;
        self.current_player = snapshot.current_player;
        self.phase = snapshot.phase;
        self.tokens = snapshot.tokens;
        self.meeples = snapshot.meeples;
        self.entities = snapshot.entities;
        self.routes = snapshot.routes;
        self.next_route_id = snapshot.next_route_id;
        self.rewards = snapshot.rewards;
        self.final_returns = snapshot.final_returns;
        self.end_reason = snapshot.end_reason;
        self.move_count = snapshot.move_count;
        self.rng = snapshot.rng;
        self.history.pop();
        self.reset_legal_cache();
        Ok(())
    }

    // ==================== End of game ====================

    /// Evaluate the end-game triggers and the move cap; enters `GameOver`
    /// and fixes the returns when one fires. Returns whether the game is over.
    pub fn check_terminal(&mut self) -> bool {
        if self.is_terminal() {
            return true;
        }

        if self.phase == GamePhase::Play {
            if let Some(reason) = self.fired_trigger() {
                let scores = scoring::score_all(self);
                let returns = scoring::final_returns(&scores, &self.config.scoring);
                info!(?reason, ?returns, totals = ?scores.iter().map(|s| s.total()).collect::<Vec<_>>(),
                    "game over");
                self.finish(reason, returns);
                return true;
            }
        }

        if self.move_count >= self.config.rules.max_moves {
            let returns = vec![self.config.scoring.move_cap_penalty; self.players.len()];
            info!(moves = self.move_count, "move cap reached; game drawn");
            self.finish(EndReason::MoveCap, returns);
            return true;
        }
        false
    }

    fn finish(&mut self, reason: EndReason, returns: Vec<f64>) {
        self.phase = GamePhase::GameOver;
        self.end_reason = Some(reason);
        self.final_returns = Some(returns);
        self.reset_legal_cache();
    }

    fn fired_trigger(&self) -> Option<EndReason> {
        let ends = &self.config.rules.end_conditions;
        for player in 0..self.players.len() as PlayerId {
            let rare = self.player(player).rare_goods.distinct() as u32;
            if self.trigger_met(player, &ends.rare_goods, rare) {
                return Some(EndReason::RareGoods(player));
            }
            let routes = self.active_routes(player).count() as u32;
            if self.trigger_met(player, &ends.route_count, routes) {
                return Some(EndReason::RouteCount(player));
            }
            let linked = self.best_connectivity(player);
            if linked.is_some_and(|n| self.trigger_met(player, &ends.connectivity, n)) {
                return Some(EndReason::Connectivity(player));
            }
            let regions = self.rare_good_regions(player);
            if self.trigger_met(player, &ends.region_spread, regions) {
                return Some(EndReason::RegionSpread(player));
            }
        }
        None
    }

    fn trigger_met(&self, player: PlayerId, trigger: &EndTrigger, value: u32) -> bool {
        trigger.enabled
            && value >= trigger.threshold
            && self.requirement_met(player, trigger.requirement)
    }

    fn requirement_met(&self, player: PlayerId, requirement: Requirement) -> bool {
        match requirement {
            Requirement::None => true,
            Requirement::MinActiveRoutes(n) => self.active_routes(player).count() as u32 >= n,
            Requirement::MinCenters(n) => self.centers_of(player) as u32 >= n,
            Requirement::MinRareGoods(n) => self.player(player).rare_goods.distinct() as u32 >= n,
        }
    }

    /// The most intervening cities on any active route of the player that
    /// touches a capital, a different desert city and the coast
    fn best_connectivity(&self, player: PlayerId) -> Option<u32> {
        let board = &self.board;
        self.active_routes(player)
            .filter(|route| route.hexes().iter().any(|h| board.is_coastal(h)))
            .filter_map(|route| {
                let cities: Vec<_> = route.hexes().iter().filter_map(|h| board.city_at(h)).collect();
                let mut best = None;
                for capital in cities.iter().filter(|c| board.is_capital(c)) {
                    for desert in cities
                        .iter()
                        .filter(|c| board.is_desert_city(c) && c.id != capital.id)
                    {
                        let between = cities
                            .iter()
                            .filter(|c| c.id != capital.id && c.id != desert.id)
                            .count() as u32;
                        best = best.max(Some(between));
                    }
                }
                best
            })
            .max()
    }

    /// Distinct regions the player's rare goods come from
    fn rare_good_regions(&self, player: PlayerId) -> u32 {
        let board = &self.board;
        let regions: BTreeSet<_> = self
            .player(player)
            .rare_goods
            .names()
            .filter_map(|good| board.city_for_rare_good(good))
            .filter_map(|city| board.region_of(&city.location))
            .collect();
        regions.len() as u32
    }
}
