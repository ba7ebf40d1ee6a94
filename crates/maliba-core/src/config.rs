//! Game configuration: players, board, rules, scoring and reward shaping.
//!
//! Every struct deserializes with `#[serde(default)]`, so a configuration
//! document only needs to name the values it changes. The engine never reads
//! files or the environment; callers hand it a parsed `GameConfig`.

use crate::board::BoardConfig;
use crate::codec::MAX_BOARD_HEXES;
use crate::game::GameError;
use crate::player::PlayerType;
use serde::{Deserialize, Serialize};

/// Complete parameter bundle for one game instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// One entry per seat, 2-4 seats
    pub players: Vec<PlayerType>,
    /// Seed for the state-owned random generator
    pub seed: u64,
    pub board: BoardConfig,
    pub rules: RulesConfig,
    pub scoring: ScoringConfig,
    pub rewards: RewardConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players: vec![PlayerType::Heuristic, PlayerType::Heuristic],
            seed: 0,
            board: BoardConfig::default(),
            rules: RulesConfig::default(),
            scoring: ScoringConfig::default(),
            rewards: RewardConfig::default(),
        }
    }
}

impl GameConfig {
    /// Default configuration with the given seat types
    pub fn with_players(players: Vec<PlayerType>) -> Self {
        Self {
            players,
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self, GameError> {
        let config: GameConfig =
            serde_json::from_str(json).map_err(|e| GameError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), GameError> {
        if !(2..=4).contains(&self.players.len()) {
            return Err(GameError::InvalidConfig(format!(
                "2-4 players required, got {}",
                self.players.len()
            )));
        }

        let rules = &self.rules;
        if rules.tokens_per_player == 0 {
            return Err(GameError::InvalidConfig("tokens_per_player must be >= 1".into()));
        }
        if rules.min_route_length < 2 {
            return Err(GameError::InvalidConfig("min_route_length must be >= 2".into()));
        }
        if rules.max_route_length < rules.min_route_length {
            return Err(GameError::InvalidConfig(
                "max_route_length is below min_route_length".into(),
            ));
        }
        // Subset enumeration over centers grows combinatorially with this bound.
        if rules.max_route_length > MAX_ROUTE_LENGTH {
            return Err(GameError::InvalidConfig(format!(
                "max_route_length must be <= {}",
                MAX_ROUTE_LENGTH
            )));
        }
        if rules.max_moves == 0 {
            return Err(GameError::InvalidConfig("max_moves must be >= 1".into()));
        }

        if let Some(hexes) = &self.board.valid_hexes {
            if hexes.split(';').filter(|s| !s.trim().is_empty()).count() > MAX_BOARD_HEXES {
                return Err(GameError::InvalidConfig(format!(
                    "at most {} board hexes are supported",
                    MAX_BOARD_HEXES
                )));
            }
        }

        let scoring = &self.scoring;
        if scoring.common_goods_tiers.is_empty() {
            return Err(GameError::InvalidConfig("common_goods_tiers is empty".into()));
        }
        if scoring.route_region_tiers.is_empty() {
            return Err(GameError::InvalidConfig("route_region_tiers is empty".into()));
        }

        Ok(())
    }
}

/// Upper bound accepted for `max_route_length`
pub const MAX_ROUTE_LENGTH: usize = 8;

/// Rule switches and numeric costs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Tokens each player places before play begins
    pub tokens_per_player: u32,
    /// Trading posts per player, `None` for an unlimited supply
    pub post_supply: Option<u32>,
    /// Common goods paid to upgrade a post to a center
    pub upgrade_cost: u32,
    /// Route declaration rides along with placements and upgrades instead of
    /// costing a turn of its own
    pub free_route_declaration: bool,
    pub allow_consecutive_income: bool,
    /// Posts on city hexes count toward routes and are upgraded on declaration
    pub auto_upgrade_city_posts: bool,
    /// Declaring a route removes one meeple from each of its hexes
    pub route_removes_meeples: bool,
    pub min_route_length: usize,
    pub max_route_length: usize,
    /// Hexes a new route may share with any one existing active route
    pub max_shared_hexes: usize,
    /// Standalone route-creation moves offered per turn
    pub top_route_candidates: usize,
    /// Hard cap on applied actions; reaching it ends the game in a draw
    pub max_moves: u32,
    pub meeples_per_hex: usize,
    pub income: IncomeRules,
    pub end_conditions: EndConditions,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            tokens_per_player: 1,
            post_supply: Some(12),
            upgrade_cost: 3,
            free_route_declaration: true,
            allow_consecutive_income: false,
            auto_upgrade_city_posts: true,
            route_removes_meeples: false,
            min_route_length: 2,
            max_route_length: 5,
            max_shared_hexes: 1,
            top_route_candidates: 5,
            max_moves: 400,
            meeples_per_hex: 3,
            income: IncomeRules::default(),
            end_conditions: EndConditions::default(),
        }
    }
}

/// Goods paid out per trading entity when a player collects income
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IncomeRules {
    /// Rare goods from a Center standing on a city
    pub center_in_city_rare: u32,
    /// Common goods from a Center that an active route links to cities
    pub center_connected_common: u32,
    /// Rare goods from a Center that an active route links to cities
    pub center_connected_rare: u32,
    /// Common goods from a Center with no active route
    pub center_isolated_common: u32,
    pub post_common: u32,
}

impl Default for IncomeRules {
    fn default() -> Self {
        Self {
            center_in_city_rare: 1,
            center_connected_common: 2,
            center_connected_rare: 1,
            center_isolated_common: 2,
            post_common: 1,
        }
    }
}

/// The independent player-scoped end-game triggers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndConditions {
    /// Distinct rare goods held
    pub rare_goods: EndTrigger,
    /// Active trade routes owned
    pub route_count: EndTrigger,
    /// Distinct intervening cities on one active route that links a capital,
    /// a desert city and the coast
    pub connectivity: EndTrigger,
    /// Distinct regions the held rare goods come from
    pub region_spread: EndTrigger,
}

impl Default for EndConditions {
    fn default() -> Self {
        Self {
            rare_goods: EndTrigger::new(4, Requirement::MinActiveRoutes(2)),
            route_count: EndTrigger::new(4, Requirement::None),
            connectivity: EndTrigger::new(1, Requirement::MinActiveRoutes(1)),
            region_spread: EndTrigger::new(3, Requirement::MinActiveRoutes(1)),
        }
    }
}

/// One end-game trigger and the requirement that gates it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndTrigger {
    pub enabled: bool,
    pub threshold: u32,
    pub requirement: Requirement,
}

impl EndTrigger {
    pub fn new(threshold: u32, requirement: Requirement) -> Self {
        Self {
            enabled: true,
            threshold,
            requirement,
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            threshold: 0,
            requirement: Requirement::None,
        }
    }
}

/// A condition that must also hold before a trigger can end the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Requirement {
    None,
    MinActiveRoutes(u32),
    MinCenters(u32),
    MinRareGoods(u32),
}

/// Final scoring tables and outcome values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    /// Active routes needed for the flat route bonus
    pub route_bonus_min_routes: u32,
    pub route_bonus: u32,
    pub center_points: u32,
    /// Bonus indexed by the number of distinct common goods held
    pub common_goods_tiers: Vec<u32>,
    /// Flat bonus on top of the last tier once the table is exceeded
    pub common_goods_overflow: u32,
    /// 1st / 2nd / 3rd longest single route
    pub longest_route_bonus: Vec<u32>,
    /// 1st / 2nd / 3rd most centers within a region
    pub region_control_bonus: Vec<u32>,
    /// Bonus per active route indexed by distinct regions crossed (clamped)
    pub route_region_tiers: Vec<u32>,
    pub win_value: f64,
    pub draw_value: f64,
    pub loss_penalty: f64,
    /// Flat return for every player when the move cap ends the game
    pub move_cap_penalty: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            route_bonus_min_routes: 3,
            route_bonus: 5,
            center_points: 2,
            common_goods_tiers: vec![0, 1, 3, 6, 10, 15],
            common_goods_overflow: 5,
            longest_route_bonus: vec![10, 6, 3],
            region_control_bonus: vec![4, 2, 1],
            route_region_tiers: vec![0, 0, 2, 4, 7],
            win_value: 1.0,
            draw_value: 0.0,
            loss_penalty: -1.0,
            move_cap_penalty: -0.5,
        }
    }
}

/// Per-step shaped rewards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardConfig {
    /// Applied to the acting player every step
    pub step_penalty: f64,
    pub upgrade_bonus: f64,
    /// Per good type newly held
    pub new_good_bonus: f64,
    /// First post in a region
    pub new_region_bonus: f64,
    /// Post on a city or coastal hex
    pub key_location_bonus: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            step_penalty: -0.001,
            upgrade_bonus: 0.02,
            new_good_bonus: 0.01,
            new_region_bonus: 0.02,
            key_location_bonus: 0.02,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = GameConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.players.len(), 2);
        assert_eq!(config.rules.upgrade_cost, 3);
        assert_eq!(config.rules.post_supply, Some(12));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = GameConfig::from_json(
            r#"{
                "players": ["Human", "Heuristic", "Random"],
                "seed": 7,
                "rules": {
                    "upgrade_cost": 2,
                    "post_supply": null,
                    "income": { "post_common": 2 }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.players.len(), 3);
        assert_eq!(config.seed, 7);
        assert_eq!(config.rules.upgrade_cost, 2);
        assert_eq!(config.rules.post_supply, None);
        assert_eq!(config.rules.max_route_length, 5);
        assert_eq!(config.rules.income.post_common, 2);
        assert_eq!(config.rules.income.center_isolated_common, 2);
        assert_eq!(config.scoring, ScoringConfig::default());
    }

    #[test]
    fn test_player_count_validated() {
        let config = GameConfig::with_players(vec![PlayerType::Human]);
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));

        let config = GameConfig::with_players(vec![PlayerType::Random; 5]);
        assert!(matches!(config.validate(), Err(GameError::InvalidConfig(_))));
    }

    #[test]
    fn test_route_length_bounds_validated() {
        let mut config = GameConfig::default();
        config.rules.min_route_length = 4;
        config.rules.max_route_length = 3;
        assert!(config.validate().is_err());

        config.rules.max_route_length = MAX_ROUTE_LENGTH + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_json_is_invalid_config() {
        assert!(matches!(
            GameConfig::from_json("{ not json"),
            Err(GameError::InvalidConfig(_))
        ));
    }
}
