//! Legal move generation.
//!
//! Generation is per phase. In Play it covers token movement (mancala),
//! optionally compounded with a post placement and a route declaration,
//! post upgrades, income and, when route declaration costs a turn,
//! standalone route creation. Results are cached on the state and cleared
//! after every applied action.

use crate::actions::{IncomePlan, IncomeProfile, Move};
use crate::board::{Board, City, PlayerId};
use crate::codec::{encode, ActionId};
use crate::game::{EntityKind, GamePhase, GameState};
use crate::hex::HexCoord;
use crate::player::Goods;
use crate::routes::{best_route, find_candidate_routes, route_order};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet, VecDeque};
use tracing::trace;

/// Number of legal moves per family
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveCounts {
    pub pass: usize,
    pub place_token: usize,
    pub mancala: usize,
    pub upgrade: usize,
    pub income: usize,
    pub trade_route: usize,
}

impl MoveCounts {
    fn record(&mut self, mv: &Move) {
        match mv {
            Move::Pass => self.pass += 1,
            Move::PlaceToken { .. } => self.place_token += 1,
            Move::Mancala { .. } => self.mancala += 1,
            Move::Upgrade { .. } => self.upgrade += 1,
            Move::Income(_) => self.income += 1,
            Move::TradeRouteCreate { .. }
            | Move::TradeRouteUpdate { .. }
            | Move::TradeRouteDelete { .. } => self.trade_route += 1,
            Move::Invalid => {}
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.place_token + self.mancala + self.upgrade + self.income + self.trade_route
    }
}

/// Legal actions for the player to move, sorted by id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LegalMoves {
    pub actions: Vec<ActionId>,
    /// `moves[i]` is the move behind `actions[i]`
    pub moves: Vec<Move>,
    pub counts: MoveCounts,
}

impl LegalMoves {
    fn from_moves(board: &Board, candidates: Vec<Move>) -> Self {
        let mut pairs: Vec<(ActionId, Move)> = candidates
            .into_iter()
            .filter_map(|mv| encode(board, &mv).map(|id| (id, mv)))
            .collect();
        // Stable sort keeps the first move generated for a shared id
        pairs.sort_by_key(|(id, _)| *id);
        pairs.dedup_by_key(|(id, _)| *id);

        let mut legal = LegalMoves::default();
        for (id, mv) in pairs {
            legal.counts.record(&mv);
            legal.actions.push(id);
            legal.moves.push(mv);
        }
        legal
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn contains(&self, action: ActionId) -> bool {
        self.actions.binary_search(&action).is_ok()
    }

    /// The move behind a legal id
    pub fn move_for(&self, action: ActionId) -> Option<&Move> {
        self.actions
            .binary_search(&action)
            .ok()
            .map(|i| &self.moves[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = (ActionId, &Move)> + '_ {
        self.actions.iter().copied().zip(self.moves.iter())
    }
}

/// Generate the legal moves for the player to move
pub fn legal_moves(state: &GameState) -> LegalMoves {
    if state.is_terminal() {
        return LegalMoves::default();
    }

    let player = state.current_player();
    let moves = match state.phase() {
        GamePhase::Setup => vec![Move::Pass],
        GamePhase::PlaceToken => token_moves(state),
        GamePhase::Play | GamePhase::EndRound => play_moves(state, player),
        GamePhase::GameOver => Vec::new(),
    };

    let legal = LegalMoves::from_moves(state.board(), moves);
    trace!(player, counts = ?legal.counts, "legal moves");
    legal
}

fn token_moves(state: &GameState) -> Vec<Move> {
    let board = state.board();
    board
        .hexes()
        .iter()
        .filter(|hex| !board.is_city(hex) && state.tokens_at(hex).is_empty())
        .map(|&hex| Move::PlaceToken { hex })
        .collect()
}

fn play_moves(state: &GameState, player: PlayerId) -> Vec<Move> {
    let board = state.board();
    let rules = &state.config().rules;
    let mut moves = Vec::new();

    if state.player(player).kind.is_human() {
        moves.push(Move::Pass);
    }

    // Mancala, with post and route compounds
    for start in state.token_hexes(player) {
        let carried = state.meeples_at(&start).len();
        for destination in reachable(board, start, carried + 1) {
            if state.tokens_at(&destination).contains(&player) {
                continue;
            }
            moves.push(Move::Mancala {
                start,
                destination,
                place_post: false,
                route: None,
            });

            let feasible =
                carried == 0 || distribution_path(board, start, destination, carried).is_some();
            if !feasible || !can_place_post(state, player, &destination) {
                continue;
            }
            let with_post = Move::Mancala {
                start,
                destination,
                place_post: true,
                route: None,
            };
            if rules.free_route_declaration {
                if let Some(route) = implied_route(state, player, &with_post) {
                    moves.push(Move::Mancala {
                        start,
                        destination,
                        place_post: true,
                        route: Some(route),
                    });
                }
            }
            moves.push(with_post);
        }
    }

    // Upgrades
    let posts: Vec<HexCoord> = state
        .entities_of(player)
        .filter(|(_, kind)| *kind == EntityKind::Post)
        .map(|(hex, _)| hex)
        .collect();
    for hex in posts {
        if !can_upgrade(state, player, &hex) {
            continue;
        }
        let upgrade = Move::Upgrade { hex, route: None };
        if rules.free_route_declaration {
            if let Some(route) = implied_route(state, player, &upgrade) {
                moves.push(Move::Upgrade {
                    hex,
                    route: Some(route),
                });
            }
        }
        moves.push(upgrade);
    }

    // Income, deduplicated by what it would pay out
    if income_allowed(state, player) {
        let mut seen = HashSet::new();
        for profile in IncomeProfile::ALL {
            let plan = income_plan(state, player, profile);
            if !plan.is_empty() && seen.insert(plan.goods_key()) {
                moves.push(Move::Income(plan));
            }
        }
    }

    // Standalone route declaration
    if !rules.free_route_declaration {
        moves.extend(
            ranked_standalone_routes(state, player)
                .into_iter()
                .map(|hexes| Move::TradeRouteCreate { hexes }),
        );
    }

    if moves.is_empty() {
        moves.push(Move::Pass);
    }
    moves
}

/// Hexes reachable from `start` within `max_steps` steps, excluding `start`,
/// in breadth-first order
pub fn reachable(board: &Board, start: HexCoord, max_steps: usize) -> Vec<HexCoord> {
    let mut visited = BTreeSet::from([start]);
    let mut queue = VecDeque::from([(start, 0usize)]);
    let mut found = Vec::new();

    while let Some((hex, depth)) = queue.pop_front() {
        if depth == max_steps {
            continue;
        }
        for next in board.neighbors(&hex) {
            if visited.insert(next) {
                found.push(next);
                queue.push_back((next, depth + 1));
            }
        }
    }
    found
}

/// Greedy path of exactly `steps` hexes from `start` (exclusive) to
/// `destination` (inclusive), one meeple dropped per hex.
///
/// Every step but the last scans the unvisited non-destination neighbors in
/// `HexCoord::DIRECTIONS` order and keeps the closest one to the
/// destination that is no farther than the current hex; on equal distance
/// the later direction wins. When nothing qualifies the first unvisited
/// non-destination neighbor is taken. The last step must land on the
/// destination.
pub fn distribution_path(
    board: &Board,
    start: HexCoord,
    destination: HexCoord,
    steps: usize,
) -> Option<Vec<HexCoord>> {
    if steps == 0 || start == destination || !board.is_valid(&destination) {
        return None;
    }

    let mut visited = BTreeSet::from([start]);
    let mut path = Vec::with_capacity(steps);
    let mut current = start;

    for step in 1..=steps {
        if step == steps {
            if current.is_adjacent(&destination) && !visited.contains(&destination) {
                path.push(destination);
                return Some(path);
            }
            return None;
        }

        let open: Vec<HexCoord> = board
            .neighbors(&current)
            .filter(|n| *n != destination && !visited.contains(n))
            .collect();
        let mut best = None;
        let mut best_distance = current.distance_to(&destination);
        for candidate in &open {
            let distance = candidate.distance_to(&destination);
            if distance <= best_distance {
                best = Some(*candidate);
                best_distance = distance;
            }
        }
        let next = best.or_else(|| open.first().copied())?;

        visited.insert(next);
        path.push(next);
        current = next;
    }
    None
}

/// Whether the player may put a new post on `hex`
pub fn can_place_post(state: &GameState, player: PlayerId, hex: &HexCoord) -> bool {
    let board = state.board();
    if !board.is_valid(hex) || state.entity_of(player, hex).is_some() {
        return false;
    }
    let owner = state.player(player);
    if !owner.has_post_supply() {
        return false;
    }
    if !board.is_city(hex) && state.entities_at(hex).len() + 1 >= state.players().len() {
        return false;
    }
    !state.meeples_at(hex).is_empty() || owner.has_spendable_good()
}

/// Whether the player may upgrade a post on `hex` right now
pub fn can_upgrade(state: &GameState, player: PlayerId, hex: &HexCoord) -> bool {
    state.entity_of(player, hex) == Some(EntityKind::Post)
        && state.player(player).common_goods.total() >= state.config().rules.upgrade_cost
}

/// Whether the player's consecutive-income rule allows an income move now
pub fn income_allowed(state: &GameState, player: PlayerId) -> bool {
    if state.config().rules.allow_consecutive_income {
        return true;
    }
    !state
        .history()
        .iter()
        .rev()
        .find(|entry| entry.player == player)
        .is_some_and(|entry| matches!(entry.mv, Move::Income(_)))
}

/// Goods the player would collect with a given profile.
///
/// A Center on a city pays that city's rare good and a Post the common good
/// of its closest city. Any other Center draws on the cities its active
/// routes reach, or on its closest cities when it has none: connected
/// Centers may take a rare good, isolated ones only common goods.
pub fn income_plan(state: &GameState, player: PlayerId, profile: IncomeProfile) -> IncomePlan {
    let board = state.board();
    let amounts = &state.config().rules.income;
    let owner = state.player(player);
    let mut common = Goods::new();
    let mut rare = Goods::new();

    for (hex, kind) in state.entities_of(player) {
        if kind == EntityKind::Center {
            if let Some(city) = board.city_at(&hex) {
                rare.add(&city.rare_good, amounts.center_in_city_rare);
                continue;
            }
        }
        if kind == EntityKind::Post {
            if let Some(city) = board.closest_cities(&hex).first() {
                common.add(&city.common_good, amounts.post_common);
            }
            continue;
        }

        let connected = connected_cities(state, player, &hex);
        let is_connected = !connected.is_empty();
        let sources = if is_connected {
            connected
        } else {
            board.closest_cities(&hex)
        };
        let Some(first) = sources.first() else {
            continue;
        };

        let rare_city = match profile {
            IncomeProfile::NewRare if is_connected => sources
                .iter()
                .find(|c| !owner.rare_goods.contains(&c.rare_good))
                .copied(),
            IncomeProfile::HoardRare if is_connected => Some(*first),
            _ => None,
        };
        if let Some(city) = rare_city {
            rare.add(&city.rare_good, amounts.center_connected_rare);
            continue;
        }

        let amount = if is_connected {
            amounts.center_connected_common
        } else {
            amounts.center_isolated_common
        };
        if profile == IncomeProfile::HoardRare {
            common.add(&first.common_good, amount);
        } else {
            // Alternate over the first two sources
            let spread = sources.len().min(2);
            for i in 0..amount as usize {
                common.add(&sources[i % spread].common_good, 1);
            }
        }
    }

    IncomePlan {
        profile,
        common,
        rare,
    }
}

/// Cities on the player's active routes through `hex`, first seen first
pub fn connected_cities<'a>(state: &'a GameState, player: PlayerId, hex: &HexCoord) -> Vec<&'a City> {
    let board = state.board();
    let mut cities: Vec<&City> = Vec::new();
    for route in state
        .routes()
        .iter()
        .filter(|r| r.owner == player && r.active && r.contains(hex))
    {
        for city in route.city_ids(board).iter().filter_map(|&id| board.city(id)) {
            if !cities.iter().any(|c| c.id == city.id) {
                cities.push(city);
            }
        }
    }
    cities
}

/// The route a compound move would declare: replay the primitive effect on
/// a scratch copy and take the best route through the acted-on hex.
///
/// Returns `None` if the primitive is not applicable or no route exists.
pub fn implied_route(state: &GameState, player: PlayerId, primitive: &Move) -> Option<Vec<HexCoord>> {
    let hex = match primitive {
        Move::Mancala {
            start,
            destination,
            place_post: true,
            route: None,
        } => {
            if !state.tokens_at(start).contains(&player)
                || state.tokens_at(destination).contains(&player)
                || !can_place_post(state, player, destination)
            {
                return None;
            }
            let carried = state.meeples_at(start).len();
            let feasible = if carried == 0 {
                start.is_adjacent(destination)
            } else {
                distribution_path(state.board(), *start, *destination, carried).is_some()
            };
            if !feasible {
                return None;
            }
            *destination
        }
        Move::Upgrade { hex, route: None } => {
            if !can_upgrade(state, player, hex) {
                return None;
            }
            *hex
        }
        _ => return None,
    };

    let mut scratch = state.scratch();
    scratch.execute(player, primitive.clone());
    best_route(&scratch, player, Some(hex))
}

/// Candidate routes for standalone declaration, best first, at most the
/// configured number and at most one per action id
pub fn ranked_standalone_routes(state: &GameState, player: PlayerId) -> Vec<Vec<HexCoord>> {
    let rules = &state.config().rules;
    let board = state.board();
    let mut candidates = find_candidate_routes(
        state,
        player,
        None,
        rules.min_route_length,
        rules.max_route_length,
    );
    candidates.sort_by(|a, b| route_order(a, b));

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|route| {
            let endpoints = (route.first().copied(), route.last().copied());
            seen.insert(endpoints)
        })
        .filter(|route| encode(board, &Move::TradeRouteCreate { hexes: route.clone() }).is_some())
        .take(rules.top_route_candidates)
        .collect()
}
