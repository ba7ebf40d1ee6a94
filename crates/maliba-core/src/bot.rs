//! Bot players for Mali-Ba.
//!
//! Bots pick among the legal actions using a pluggable weighting:
//! - Easy: uniform random legal action
//! - Medium: weighted random sample during play, uniform during setup
//! - Hard: the highest-weighted action, lowest id on ties

use crate::actions::Move;
use crate::board::{PlayerId, RegionId};
use crate::codec::ActionId;
use crate::game::{EntityKind, GamePhase, GameState};
use crate::hex::HexCoord;
use crate::movegen::MoveCounts;
use rand::distributions::WeightedIndex;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::trace;

/// Bot difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotDifficulty {
    Easy,
    Medium,
    Hard,
}

/// What a weigher may look at besides the move itself
pub struct WeightContext<'a> {
    pub state: &'a GameState,
    pub player: PlayerId,
    pub counts: MoveCounts,
    /// Hexes holding the player's Centers
    pub centers: Vec<HexCoord>,
    pub center_regions: BTreeSet<RegionId>,
}

impl<'a> WeightContext<'a> {
    pub fn new(state: &'a GameState) -> Self {
        let player = state.current_player();
        let centers: Vec<HexCoord> = state
            .entities_of(player)
            .filter(|(_, kind)| *kind == EntityKind::Center)
            .map(|(hex, _)| hex)
            .collect();
        let center_regions = centers
            .iter()
            .filter_map(|h| state.board().region_of(h))
            .collect();
        Self {
            state,
            player,
            counts: state.legal_moves().counts,
            centers,
            center_regions,
        }
    }
}

/// Scores a candidate move; higher is more attractive. Negative weights are
/// treated as zero.
pub trait ActionWeigher {
    fn weight(&self, mv: &Move, ctx: &WeightContext) -> f64;
}

/// Hand-tuned move weighting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeuristicWeights {
    pub pass: f64,
    pub mancala: f64,
    pub upgrade: f64,
    pub income: f64,
    pub place_token: f64,
    pub trade_route: f64,
    /// Mancala placing a post on a city
    pub mancala_city_post: f64,
    /// Mancala placing any post
    pub mancala_post: f64,
    /// Mancala travelling more than three hexes
    pub mancala_long_distance: f64,
    /// Mancala from or onto a crowded hex
    pub mancala_meeple_density: f64,
    /// Per hex of distance from the nearest existing Center
    pub upgrade_spread: f64,
    /// Upgrade in a region with no Center yet
    pub upgrade_new_region: f64,
    /// Upgrade while the post supply is nearly empty
    pub upgrade_low_supply: f64,
}

impl Default for HeuristicWeights {
    fn default() -> Self {
        Self {
            pass: 0.1,
            mancala: 10.0,
            upgrade: 15.0,
            income: 5.0,
            place_token: 5.0,
            trade_route: 10.0,
            mancala_city_post: 30.0,
            mancala_post: 0.0,
            mancala_long_distance: 10.0,
            mancala_meeple_density: 15.0,
            upgrade_spread: 5.0,
            upgrade_new_region: 20.0,
            upgrade_low_supply: 0.0,
        }
    }
}

impl ActionWeigher for HeuristicWeights {
    fn weight(&self, mv: &Move, ctx: &WeightContext) -> f64 {
        let state = ctx.state;
        let counts = &ctx.counts;
        let weight = match mv {
            Move::Pass => self.pass,
            Move::PlaceToken { hex } => {
                // Crowded neighborhoods give longer first moves
                let nearby: usize = std::iter::once(*hex)
                    .chain(state.board().neighbors(hex))
                    .map(|h| state.meeples_at(&h).len())
                    .sum();
                self.place_token + nearby as f64
            }
            Move::Mancala {
                start,
                destination,
                place_post,
                ..
            } => {
                let mut w = self.mancala;
                if start.distance_to(destination) > 3 {
                    w += self.mancala_long_distance;
                }
                if state.meeples_at(destination).len() > 3 || state.meeples_at(start).len() > 5 {
                    w += self.mancala_meeple_density;
                }
                if *place_post {
                    w += self.mancala_post;
                    if state.board().is_city(destination) {
                        w += self.mancala_city_post;
                    }
                }
                w
            }
            Move::Upgrade { hex, .. } => {
                let mut w = self.upgrade;
                if counts.upgrade > 0 {
                    w *= counts.mancala as f64 / counts.upgrade as f64;
                }
                if state
                    .player(ctx.player)
                    .post_supply
                    .is_some_and(|left| left < 2)
                {
                    w += self.upgrade_low_supply;
                }
                let spread = ctx
                    .centers
                    .iter()
                    .map(|c| c.distance_to(hex))
                    .min()
                    .unwrap_or(5);
                w += spread as f64 * self.upgrade_spread;
                if state
                    .board()
                    .region_of(hex)
                    .is_some_and(|r| !ctx.center_regions.contains(&r))
                {
                    w += self.upgrade_new_region;
                }
                w
            }
            Move::Income(_) => {
                let mut w = self.income;
                if counts.income > 0 {
                    w *= counts.mancala as f64 / counts.income as f64;
                }
                w
            }
            Move::TradeRouteCreate { .. } => self.trade_route,
            Move::TradeRouteUpdate { .. } | Move::TradeRouteDelete { .. } | Move::Invalid => 0.0,
        };
        weight.max(0.0)
    }
}

/// A bot player that can decide on actions
pub struct Bot {
    pub player_id: PlayerId,
    pub difficulty: BotDifficulty,
    weigher: Box<dyn ActionWeigher>,
    rng: ChaCha8Rng,
}

impl Bot {
    pub fn new(player_id: PlayerId, difficulty: BotDifficulty) -> Self {
        Self {
            player_id,
            difficulty,
            weigher: Box::new(HeuristicWeights::default()),
            rng: ChaCha8Rng::from_entropy(),
        }
    }

    pub fn with_seed(player_id: PlayerId, difficulty: BotDifficulty, seed: u64) -> Self {
        Self {
            player_id,
            difficulty,
            weigher: Box::new(HeuristicWeights::default()),
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// A bot drawing from the game's seed on its own stream, so a seeded
    /// game replays the same bot choices
    pub fn for_game(player_id: PlayerId, difficulty: BotDifficulty, game: &GameState) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(game.config().seed);
        rng.set_stream(player_id as u64 + 1);
        Self {
            player_id,
            difficulty,
            weigher: Box::new(HeuristicWeights::default()),
            rng,
        }
    }

    /// Replace the move weighting
    pub fn with_weigher(mut self, weigher: impl ActionWeigher + 'static) -> Self {
        self.weigher = Box::new(weigher);
        self
    }

    /// Weight of every legal action, in action id order
    pub fn action_weights(&self, game: &GameState) -> Vec<(ActionId, f64)> {
        let ctx = WeightContext::new(game);
        game.legal_moves()
            .iter()
            .map(|(id, mv)| (id, self.weigher.weight(mv, &ctx).max(0.0)))
            .collect()
    }

    /// Choose an action for the bot's player, or `None` when it is not that
    /// player's turn or nothing is legal
    pub fn choose_action(&mut self, game: &GameState) -> Option<ActionId> {
        if game.is_terminal() || game.current_player() != self.player_id {
            return None;
        }
        let actions = game.legal_actions();
        if actions.is_empty() {
            return None;
        }

        let chosen = match self.difficulty {
            BotDifficulty::Easy => self.choose_easy(actions),
            BotDifficulty::Medium if game.phase() != GamePhase::Play => self.choose_easy(actions),
            BotDifficulty::Medium => self.choose_medium(game),
            BotDifficulty::Hard => self.choose_hard(game),
        };
        trace!(player = self.player_id, difficulty = ?self.difficulty, action = ?chosen, "bot choice");
        chosen
    }

    /// Easy: Just pick a random legal action
    fn choose_easy(&mut self, actions: &[ActionId]) -> Option<ActionId> {
        actions.choose(&mut self.rng).copied()
    }

    /// Medium: sample proportionally to weight; uniform if every weight is zero
    fn choose_medium(&mut self, game: &GameState) -> Option<ActionId> {
        let weighted = self.action_weights(game);
        match WeightedIndex::new(weighted.iter().map(|(_, w)| *w)) {
            Ok(dist) => Some(weighted[dist.sample(&mut self.rng)].0),
            Err(_) => self.choose_easy(game.legal_actions()),
        }
    }

    /// Hard: the best-weighted action
    fn choose_hard(&mut self, game: &GameState) -> Option<ActionId> {
        self.action_weights(game)
            .into_iter()
            .fold(None, |best: Option<(ActionId, f64)>, (id, w)| match best {
                Some((_, top)) if top >= w => best,
                _ => Some((id, w)),
            })
            .map(|(id, _)| id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::tests::{clear_meeples, play_state};
    use crate::player::MeepleColor;

    struct PreferIncome;

    impl ActionWeigher for PreferIncome {
        fn weight(&self, mv: &Move, _ctx: &WeightContext) -> f64 {
            if matches!(mv, Move::Income(_)) {
                1.0
            } else {
                0.0
            }
        }
    }

    #[test]
    fn test_bot_creation() {
        let bot = Bot::new(1, BotDifficulty::Hard);
        assert_eq!(bot.player_id, 1);
        assert_eq!(bot.difficulty, BotDifficulty::Hard);
    }

    #[test]
    fn test_easy_bot_chooses_legal_action() {
        let game = play_state();
        let mut bot = Bot::with_seed(0, BotDifficulty::Easy, 42);
        let action = bot.choose_action(&game).unwrap();
        assert!(game.legal_actions().contains(&action));
    }

    #[test]
    fn test_bot_waits_for_its_turn() {
        let game = play_state();
        let mut bot = Bot::with_seed(1, BotDifficulty::Medium, 7);
        assert_eq!(bot.choose_action(&game), None);
    }

    #[test]
    fn test_seeded_bots_agree() {
        let game = play_state();
        let mut a = Bot::with_seed(0, BotDifficulty::Medium, 9);
        let mut b = Bot::with_seed(0, BotDifficulty::Medium, 9);
        for _ in 0..5 {
            assert_eq!(a.choose_action(&game), b.choose_action(&game));
        }
    }

    #[test]
    fn test_hard_bot_prefers_city_post() {
        let mut game = play_state();
        clear_meeples(&mut game);
        // Three meeples carry the token from (0,1,-1) to Segou, the only
        // city with a meeple to pay for a post
        game.meeples.insert(
            HexCoord::new(0, 1),
            vec![MeepleColor::Red, MeepleColor::Blue, MeepleColor::Green],
        );
        game.meeples.insert(HexCoord::new(2, -2), vec![MeepleColor::White]);
        game.reset_legal_cache();

        let mut bot = Bot::with_seed(0, BotDifficulty::Hard, 1);
        let action = bot.choose_action(&game).unwrap();
        match game.legal_moves().move_for(action) {
            Some(Move::Mancala {
                destination,
                place_post: true,
                ..
            }) => assert!(game.board().is_city(destination)),
            other => panic!("expected a city post, got {:?}", other),
        }
    }

    #[test]
    fn test_game_seeded_bots_replay() {
        let play = |seed: u64| {
            let config = GameConfig {
                seed,
                ..GameConfig::default()
            };
            let mut game = GameState::new(config).unwrap();
            let mut bots: Vec<Bot> = (0..2)
                .map(|p| Bot::for_game(p, BotDifficulty::Medium, &game))
                .collect();
            for _ in 0..30 {
                if game.is_terminal() {
                    break;
                }
                let seat = game.current_player() as usize;
                let action = bots[seat].choose_action(&game).unwrap();
                game.apply_action(action).unwrap();
            }
            game.history()
                .iter()
                .map(|entry| entry.action)
                .collect::<Vec<_>>()
        };
        assert_eq!(play(9), play(9));
    }

    #[test]
    fn test_custom_weigher() {
        let mut game = play_state();
        game.put_entity(0, HexCoord::new(1, 1), EntityKind::Post);
        let mut bot = Bot::with_seed(0, BotDifficulty::Hard, 3).with_weigher(PreferIncome);
        let action = bot.choose_action(&game).unwrap();
        assert!(matches!(
            game.legal_moves().move_for(action),
            Some(Move::Income(_))
        ));
    }

    #[test]
    fn test_weights_are_never_negative() {
        let weights = HeuristicWeights {
            pass: -3.0,
            ..HeuristicWeights::default()
        };
        let config = GameConfig::with_players(vec![
            crate::player::PlayerType::Human,
            crate::player::PlayerType::Heuristic,
        ]);
        let game = crate::game::tests::play_state_with(config);
        let ctx = WeightContext::new(&game);
        assert_eq!(weights.weight(&Move::Pass, &ctx), 0.0);
    }
}
