//! Final scoring and game returns.

use crate::board::PlayerId;
use crate::config::ScoringConfig;
use crate::game::{EntityKind, GameState};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One player's final score by component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub player: PlayerId,
    /// Hexes across active routes, plus the flat bonus for many routes
    pub route_hexes: u32,
    pub rare_goods: u32,
    pub centers: u32,
    /// Tiered bonus for distinct common goods
    pub common_variety: u32,
    /// Ranked bonus for the longest single route
    pub longest_route: u32,
    /// Ranked bonus for most Centers, summed over regions
    pub region_control: u32,
    /// Tiered bonus per active route for the regions it crosses
    pub route_regions: u32,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.route_hexes
            + self.rare_goods
            + self.centers
            + self.common_variety
            + self.longest_route
            + self.region_control
            + self.route_regions
    }
}

/// Score every player in the current state
pub fn score_all(state: &GameState) -> Vec<ScoreBreakdown> {
    let board = state.board();
    let table = &state.config().scoring;
    let n = state.player_count();

    let mut scores: Vec<ScoreBreakdown> = (0..n as PlayerId)
        .map(|player| {
            let owner = state.player(player);
            let routes: Vec<_> = state.active_routes(player).collect();

            let mut route_hexes: u32 = routes.iter().map(|r| r.len() as u32).sum();
            if routes.len() as u32 >= table.route_bonus_min_routes {
                route_hexes += table.route_bonus;
            }

            let route_regions = routes
                .iter()
                .map(|route| {
                    let crossed: BTreeSet<_> =
                        route.hexes().iter().filter_map(|h| board.region_of(h)).collect();
                    tier(&table.route_region_tiers, crossed.len(), 0)
                })
                .sum();

            ScoreBreakdown {
                player,
                route_hexes,
                rare_goods: owner.rare_goods.total(),
                centers: state.centers_of(player) as u32 * table.center_points,
                common_variety: tier(
                    &table.common_goods_tiers,
                    owner.common_goods.distinct(),
                    table.common_goods_overflow,
                ),
                route_regions,
                ..ScoreBreakdown::default()
            }
        })
        .collect();

    // Longest single active route
    let longest: Vec<u32> = (0..n as PlayerId)
        .map(|player| {
            state
                .active_routes(player)
                .map(|r| r.len() as u32)
                .max()
                .unwrap_or(0)
        })
        .collect();
    for (score, bonus) in scores
        .iter_mut()
        .zip(ranked_bonus(&longest, &table.longest_route_bonus))
    {
        score.longest_route = bonus;
    }

    // Center majority per region
    let mut per_region: BTreeMap<_, Vec<u32>> = BTreeMap::new();
    for player in 0..n as PlayerId {
        for (hex, kind) in state.entities_of(player) {
            if kind != EntityKind::Center {
                continue;
            }
            if let Some(region) = board.region_of(&hex) {
                per_region.entry(region).or_insert_with(|| vec![0; n])[player as usize] += 1;
            }
        }
    }
    for counts in per_region.values() {
        for (score, bonus) in scores
            .iter_mut()
            .zip(ranked_bonus(counts, &table.region_control_bonus))
        {
            score.region_control += bonus;
        }
    }

    scores
}

/// Look up a tier table; past the last tier, the top tier plus a flat
/// `overflow` bonus
fn tier(table: &[u32], index: usize, overflow: u32) -> u32 {
    match table.get(index) {
        Some(&value) => value,
        None => table.last().copied().unwrap_or(0) + overflow,
    }
}

/// Award `table[rank]` by descending value. Tied players share the bonus of
/// their rank and use up the ranks below it; zero values earn nothing.
pub fn ranked_bonus(values: &[u32], table: &[u32]) -> Vec<u32> {
    let mut order: Vec<usize> = (0..values.len()).filter(|&i| values[i] > 0).collect();
    order.sort_by(|&a, &b| values[b].cmp(&values[a]));

    let mut bonus = vec![0; values.len()];
    let mut rank = 0;
    while rank < order.len() {
        let value = values[order[rank]];
        let tied = order[rank..]
            .iter()
            .take_while(|&&p| values[p] == value)
            .count();
        let award = table.get(rank).copied().unwrap_or(0);
        for &p in &order[rank..rank + tied] {
            bonus[p] = award;
        }
        rank += tied;
    }
    bonus
}

/// Turn final scores into returns.
///
/// A unique top score wins and everyone else takes the loss penalty; tied
/// leaders take the draw value. If nobody scored, all returns are zero.
pub fn final_returns(scores: &[ScoreBreakdown], config: &ScoringConfig) -> Vec<f64> {
    let totals: Vec<u32> = scores.iter().map(ScoreBreakdown::total).collect();
    let best = totals.iter().copied().max().unwrap_or(0);
    if best == 0 {
        return vec![0.0; totals.len()];
    }

    let leaders = totals.iter().filter(|&&t| t == best).count();
    let leader_value = if leaders == 1 {
        config.win_value
    } else {
        config.draw_value
    };
    totals
        .iter()
        .map(|&t| {
            if t == best {
                leader_value
            } else {
                config.loss_penalty
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::game::tests::play_state_with;
    use crate::hex::HexCoord;
    use crate::player::PlayerType;
    use pretty_assertions::assert_eq;

    fn hex(x: i32, y: i32) -> HexCoord {
        HexCoord::new(x, y)
    }

    #[test]
    fn test_ranked_bonus_ties_consume_ranks() {
        let table = [10, 6, 3];
        assert_eq!(ranked_bonus(&[5, 5, 3], &table), vec![10, 10, 3]);
        assert_eq!(ranked_bonus(&[4, 2, 2, 1], &table), vec![10, 6, 6, 0]);
        assert_eq!(ranked_bonus(&[1, 3, 0], &table), vec![6, 10, 0]);
        assert_eq!(ranked_bonus(&[0, 0], &table), vec![0, 0]);
    }

    #[test]
    fn test_tier_overflow() {
        let table = [0, 1, 3, 6, 10, 15];
        assert_eq!(tier(&table, 0, 5), 0);
        assert_eq!(tier(&table, 5, 5), 15);
        assert_eq!(tier(&table, 6, 5), 20);
        // The overflow bonus is flat, not per extra good
        assert_eq!(tier(&table, 8, 5), 20);
        assert_eq!(tier(&table, 12, 5), 20);
        assert_eq!(tier(&[0, 0, 2, 4, 7], 9, 0), 7);
    }

    /// Three players scored by hand on the default board.
    ///
    /// Regions: Sahara z>0, Niger Bend z=0, Savanna z<0.
    ///
    /// | component      | P0 | P1 | P2 |
    /// |----------------|----|----|----|
    /// | route hexes    |  5 |  3 |  0 |
    /// | rare goods     |  2 |  2 |  0 |
    /// | centers x2     |  8 |  6 |  2 |
    /// | common variety |  6 |  1 | 20 |
    /// | longest route  | 10 | 10 |  0 |
    /// | region control | 10 |  6 |  2 |
    /// | route regions  |  4 |  2 |  0 |
    /// | total          | 45 | 30 | 24 |
    #[test]
    fn test_three_player_scoring() {
        let config = GameConfig::with_players(vec![PlayerType::Heuristic; 3]);
        let mut state = play_state_with(config);

        // Player 0: Savanna x2, Niger Bend x1, Sahara x1
        for h in [hex(1, 1), hex(-1, 1), hex(2, 0), hex(-2, 1)] {
            state.put_entity(0, h, EntityKind::Center);
        }
        state.create_route(0, &[hex(1, 1), hex(-1, 1), hex(2, 0)]);
        state.create_route(0, &[hex(-2, 1), hex(2, 0)]);
        state.players[0].rare_goods.add("Gold", 2);
        for good in ["Salt", "Fish", "Millet"] {
            state.players[0].common_goods.add(good, 1);
        }

        // Player 1: Sahara x2, Savanna x1
        for h in [hex(1, -2), hex(-1, -1), hex(3, -1)] {
            state.put_entity(1, h, EntityKind::Center);
        }
        state.create_route(1, &[hex(1, -2), hex(-1, -1), hex(3, -1)]);
        state.players[1].rare_goods.add("Silver cross", 1);
        state.players[1].rare_goods.add("Chiwara", 1);
        state.players[1].common_goods.add("Dates", 4);

        // Player 2: one Sahara center and eight kinds of common goods, two
        // past the top tier
        state.put_entity(2, hex(-3, 2), EntityKind::Center);
        for good in [
            "Salt", "Fish", "Millet", "Dates", "Horses", "Leather", "Kola", "Shea butter",
        ] {
            state.players[2].common_goods.add(good, 1);
        }
        state.refresh_route_activity();

        let scores = score_all(&state);
        assert_eq!(
            scores[0],
            ScoreBreakdown {
                player: 0,
                route_hexes: 5,
                rare_goods: 2,
                centers: 8,
                common_variety: 6,
                longest_route: 10,
                region_control: 10,
                route_regions: 4,
            }
        );
        assert_eq!(
            scores[1],
            ScoreBreakdown {
                player: 1,
                route_hexes: 3,
                rare_goods: 2,
                centers: 6,
                common_variety: 1,
                longest_route: 10,
                region_control: 6,
                route_regions: 2,
            }
        );
        assert_eq!(
            scores[2],
            ScoreBreakdown {
                player: 2,
                route_hexes: 0,
                rare_goods: 0,
                centers: 2,
                common_variety: 20,
                longest_route: 0,
                region_control: 2,
                route_regions: 0,
            }
        );
        assert_eq!(
            scores.iter().map(ScoreBreakdown::total).collect::<Vec<_>>(),
            vec![45, 30, 24]
        );

        let returns = final_returns(&scores, &state.config().scoring);
        assert_eq!(returns, vec![1.0, -1.0, -1.0]);
    }

    #[test]
    fn test_route_bonus_at_three_routes() {
        let mut state = play_state_with(GameConfig::default());
        for h in [hex(1, 1), hex(-1, 1), hex(2, 0), hex(-2, 1), hex(1, -2), hex(3, -1)] {
            state.put_entity(0, h, EntityKind::Center);
        }
        state.create_route(0, &[hex(1, 1), hex(-1, 1)]);
        state.create_route(0, &[hex(2, 0), hex(-2, 1)]);
        state.create_route(0, &[hex(1, -2), hex(3, -1)]);
        state.refresh_route_activity();

        assert_eq!(score_all(&state)[0].route_hexes, 6 + 5);
    }

    #[test]
    fn test_inactive_routes_do_not_score() {
        let mut state = play_state_with(GameConfig::default());
        state.put_entity(0, hex(1, 1), EntityKind::Center);
        state.put_entity(0, hex(-1, 1), EntityKind::Post);
        state.create_route(0, &[hex(1, 1), hex(-1, 1)]);
        state.refresh_route_activity();

        let score = &score_all(&state)[0];
        assert_eq!(score.route_hexes, 0);
        assert_eq!(score.longest_route, 0);
        assert_eq!(score.centers, 2);
    }

    #[test]
    fn test_returns_for_tied_leaders() {
        let config = ScoringConfig::default();
        let scores = [
            ScoreBreakdown {
                player: 0,
                centers: 4,
                ..ScoreBreakdown::default()
            },
            ScoreBreakdown {
                player: 1,
                centers: 4,
                ..ScoreBreakdown::default()
            },
            ScoreBreakdown {
                player: 2,
                rare_goods: 1,
                ..ScoreBreakdown::default()
            },
        ];
        assert_eq!(final_returns(&scores, &config), vec![0.0, 0.0, -1.0]);
    }

    #[test]
    fn test_returns_when_nobody_scored() {
        let config = ScoringConfig::default();
        let scores = [ScoreBreakdown::default(), ScoreBreakdown::default()];
        assert_eq!(final_returns(&scores, &config), vec![0.0, 0.0]);
    }
}
