//! Trade route discovery, validation and bookkeeping.
//!
//! A route is a set of a player's trading Centers declared together. Its hex
//! list is always kept in canonical (sorted, deduplicated) order so that two
//! routes over the same hexes compare equal. Candidate discovery enumerates
//! subsets of the player's Centers, bounded by the configured maximum route
//! length.

use crate::actions::RouteId;
use crate::board::{Board, PlayerId};
use crate::game::{EntityKind, GameState};
use crate::hex::HexCoord;
use serde::{Deserialize, Serialize};
use std::cell::OnceCell;
use std::cmp::Ordering;
use thiserror::Error;
use tracing::{debug, trace};

/// Why a proposed route was refused
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum RouteRejection {
    #[error("route is shorter than the minimum length")]
    TooShort,

    #[error("route is longer than the maximum length")]
    TooLong,

    #[error("no owned trading center at {0}")]
    NotACenter(HexCoord),

    #[error("route shares {shared} hexes with route #{route_id}")]
    Overlap { route_id: RouteId, shared: usize },

    #[error("route duplicates route #{route_id}")]
    Duplicate { route_id: RouteId },

    #[error("no route #{0}")]
    UnknownRoute(RouteId),

    #[error("route #{0} belongs to another player")]
    NotOwner(RouteId),
}

/// A declared trade route
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRoute {
    pub id: RouteId,
    pub owner: PlayerId,
    hexes: Vec<HexCoord>,
    /// Whether the owner still holds a Center on every hex
    pub active: bool,
    /// Ids of the cities on this route, in hex order
    #[serde(skip)]
    cities: OnceCell<Vec<u32>>,
}

impl PartialEq for TradeRoute {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.owner == other.owner
            && self.hexes == other.hexes
            && self.active == other.active
    }
}

impl TradeRoute {
    pub fn new(id: RouteId, owner: PlayerId, hexes: &[HexCoord]) -> Self {
        Self {
            id,
            owner,
            hexes: canonicalize(hexes),
            active: false,
            cities: OnceCell::new(),
        }
    }

    /// Hexes in canonical order
    pub fn hexes(&self) -> &[HexCoord] {
        &self.hexes
    }

    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }

    pub fn contains(&self, hex: &HexCoord) -> bool {
        self.hexes.binary_search(hex).is_ok()
    }

    pub(crate) fn set_hexes(&mut self, hexes: &[HexCoord]) {
        self.hexes = canonicalize(hexes);
        self.cities = OnceCell::new();
    }

    /// Number of hexes shared with another canonical hex list
    pub fn shared_with(&self, hexes: &[HexCoord]) -> usize {
        hexes.iter().filter(|h| self.contains(h)).count()
    }

    /// Ids of every city on the route, computed once
    pub fn city_ids(&self, board: &Board) -> &[u32] {
        self.cities.get_or_init(|| {
            self.hexes
                .iter()
                .filter_map(|h| board.city_at(h))
                .map(|c| c.id)
                .collect()
        })
    }
}

/// Sort and deduplicate a hex list
pub fn canonicalize(hexes: &[HexCoord]) -> Vec<HexCoord> {
    let mut canonical = hexes.to_vec();
    canonical.sort();
    canonical.dedup();
    canonical
}

/// Best-first order: longer routes first, then lexicographically smaller
pub fn route_order(a: &[HexCoord], b: &[HexCoord]) -> Ordering {
    b.len().cmp(&a.len()).then_with(|| a.cmp(b))
}

/// Whether a hex can anchor one of the player's routes: an owned Center, or
/// an owned Post on a city when city posts are upgraded on declaration
fn is_route_anchor(state: &GameState, player: PlayerId, hex: &HexCoord) -> bool {
    match state.entity_of(player, hex) {
        Some(EntityKind::Center) => true,
        Some(EntityKind::Post) => {
            state.config().rules.auto_upgrade_city_posts && state.board().is_city(hex)
        }
        None => false,
    }
}

/// Hexes that may appear in the player's candidate routes
fn route_pool(state: &GameState, player: PlayerId, must_include: Option<HexCoord>) -> Vec<HexCoord> {
    let mut pool: Vec<HexCoord> = state
        .entities_of(player)
        .map(|(hex, _)| hex)
        .filter(|hex| is_route_anchor(state, player, hex))
        .collect();
    pool.extend(must_include);
    canonicalize(&pool)
}

/// Check a canonical hex list against the route rules.
///
/// `exempt` is a hex that need not hold a Center yet (a post being placed
/// in the same move). `replacing` is a route being rerouted, ignored by the
/// overlap and duplicate checks. Every route the player has declared counts
/// for those checks, including one still waiting for its Centers.
pub fn validate_route(
    state: &GameState,
    player: PlayerId,
    hexes: &[HexCoord],
    exempt: Option<HexCoord>,
    replacing: Option<RouteId>,
) -> Result<(), RouteRejection> {
    let rules = &state.config().rules;
    if hexes.len() < rules.min_route_length {
        return Err(RouteRejection::TooShort);
    }
    if hexes.len() > rules.max_route_length {
        return Err(RouteRejection::TooLong);
    }

    for hex in hexes {
        if Some(*hex) == exempt {
            continue;
        }
        if !is_route_anchor(state, player, hex) {
            return Err(RouteRejection::NotACenter(*hex));
        }
    }

    for route in state.routes() {
        if route.owner != player || Some(route.id) == replacing {
            continue;
        }
        if route.hexes() == hexes {
            return Err(RouteRejection::Duplicate { route_id: route.id });
        }
        let shared = route.shared_with(hexes);
        if shared > rules.max_shared_hexes {
            return Err(RouteRejection::Overlap {
                route_id: route.id,
                shared,
            });
        }
    }

    Ok(())
}

/// Every valid route of `min_len..=max_len` hexes over the player's Centers,
/// optionally forced to include `must_include` (which is exempt from the
/// Center check). Routes come out canonical, shorter sizes first.
pub fn find_candidate_routes(
    state: &GameState,
    player: PlayerId,
    must_include: Option<HexCoord>,
    min_len: usize,
    max_len: usize,
) -> Vec<Vec<HexCoord>> {
    let pool = route_pool(state, player, must_include);
    let mut found = Vec::new();

    for size in min_len.max(1)..=max_len.min(pool.len()) {
        for_each_combination(&pool, size, |combo| {
            if let Some(forced) = must_include {
                if combo.binary_search(&forced).is_err() {
                    return;
                }
            }
            if validate_route(state, player, combo, must_include, None).is_ok() {
                found.push(combo.to_vec());
            }
        });
    }

    trace!(player, pool = pool.len(), found = found.len(), "route candidates");
    found
}

/// The best candidate through `must_include`: longest, then lexicographically
/// smallest
pub fn best_route(
    state: &GameState,
    player: PlayerId,
    must_include: Option<HexCoord>,
) -> Option<Vec<HexCoord>> {
    let rules = &state.config().rules;
    find_candidate_routes(
        state,
        player,
        must_include,
        rules.min_route_length,
        rules.max_route_length,
    )
    .into_iter()
    .min_by(|a, b| route_order(a, b))
}

/// Calls `f` with every `size`-element combination of a sorted pool, in
/// lexicographic order. Each combination is itself sorted.
fn for_each_combination<F: FnMut(&[HexCoord])>(pool: &[HexCoord], size: usize, mut f: F) {
    if size == 0 || size > pool.len() {
        return;
    }
    let n = pool.len();
    let mut indices: Vec<usize> = (0..size).collect();
    let mut combo: Vec<HexCoord> = Vec::with_capacity(size);

    loop {
        combo.clear();
        combo.extend(indices.iter().map(|&i| pool[i]));
        f(&combo);

        // Advance the rightmost index that still has room
        let Some(pos) = (0..size).rev().find(|&i| indices[i] != i + n - size) else {
            return;
        };
        indices[pos] += 1;
        for i in pos + 1..size {
            indices[i] = indices[i - 1] + 1;
        }
    }
}

impl GameState {
    /// Store a new route after its rule-driven side effects. The caller has
    /// already validated the hexes.
    pub(crate) fn create_route(&mut self, player: PlayerId, hexes: &[HexCoord]) -> RouteId {
        let hexes = canonicalize(hexes);
        let rules = &self.config.rules;
        let auto_upgrade = rules.auto_upgrade_city_posts;
        let remove_meeples = rules.route_removes_meeples;

        for hex in &hexes {
            if auto_upgrade && self.board.is_city(hex) {
                let upgraded = self
                    .entities
                    .get_mut(hex)
                    .and_then(|list| {
                        list.iter_mut()
                            .find(|e| e.owner == player && e.kind == EntityKind::Post)
                    })
                    .map(|e| e.kind = EntityKind::Center)
                    .is_some();
                if upgraded {
                    self.players[player as usize].return_post();
                    debug!(player, %hex, "city post upgraded by route");
                }
            }
            if remove_meeples {
                self.remove_front_meeple(hex);
            }
        }

        let id = self.next_route_id;
        self.next_route_id += 1;
        self.routes.push(TradeRoute::new(id, player, &hexes));
        debug!(player, route = id, len = hexes.len(), "route created");
        id
    }

    /// Replace an owned route's hexes after validation
    pub(crate) fn update_route(
        &mut self,
        player: PlayerId,
        id: RouteId,
        hexes: &[HexCoord],
    ) -> Result<(), RouteRejection> {
        self.check_route_owner(player, id)?;
        let hexes = canonicalize(hexes);
        validate_route(self, player, &hexes, None, Some(id))?;
        if let Some(route) = self.routes.iter_mut().find(|r| r.id == id) {
            route.set_hexes(&hexes);
        }
        debug!(player, route = id, "route updated");
        Ok(())
    }

    pub(crate) fn delete_route(&mut self, player: PlayerId, id: RouteId) -> Result<(), RouteRejection> {
        self.check_route_owner(player, id)?;
        self.routes.retain(|r| r.id != id);
        debug!(player, route = id, "route deleted");
        Ok(())
    }

    pub(crate) fn check_route_owner(&self, player: PlayerId, id: RouteId) -> Result<(), RouteRejection> {
        let route = self
            .routes
            .iter()
            .find(|r| r.id == id)
            .ok_or(RouteRejection::UnknownRoute(id))?;
        if route.owner != player {
            return Err(RouteRejection::NotOwner(id));
        }
        Ok(())
    }

    /// Re-derive every route's active flag from current Center ownership
    pub(crate) fn refresh_route_activity(&mut self) {
        let status: Vec<bool> = self
            .routes
            .iter()
            .map(|route| {
                route
                    .hexes()
                    .iter()
                    .all(|hex| self.entity_of(route.owner, hex) == Some(EntityKind::Center))
            })
            .collect();

        for (route, active) in self.routes.iter_mut().zip(status) {
            if route.active != active {
                debug!(route = route.id, owner = route.owner, active, "route activity changed");
                route.active = active;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::tests::play_state;
    use pretty_assertions::assert_eq;

    fn hex(x: i32, y: i32) -> HexCoord {
        HexCoord::new(x, y)
    }

    #[test]
    fn test_canonicalize() {
        let raw = vec![hex(1, 0), hex(-1, 0), hex(1, 0), hex(0, 0)];
        let once = canonicalize(&raw);
        assert_eq!(once, vec![hex(-1, 0), hex(0, 0), hex(1, 0)]);
        assert_eq!(canonicalize(&once), once);
    }

    #[test]
    fn test_route_equality_ignores_order_and_cache() {
        let board = Board::from_config(&crate::board::BoardConfig::default()).unwrap();
        let a = TradeRoute::new(1, 0, &[hex(2, -2), hex(1, 0), hex(0, 0)]);
        let b = TradeRoute::new(1, 0, &[hex(0, 0), hex(1, 0), hex(2, -2)]);
        // Timbuktu and Segou
        assert_eq!(a.city_ids(&board), &[0, 1]);
        assert_eq!(a, b);
    }

    #[test]
    fn test_combinations() {
        let pool = vec![hex(0, 0), hex(0, 1), hex(1, 0), hex(1, 1)];
        let mut seen = Vec::new();
        for_each_combination(&pool, 2, |c| seen.push(c.to_vec()));
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], vec![hex(0, 0), hex(0, 1)]);
        assert_eq!(seen[5], vec![hex(1, 0), hex(1, 1)]);

        let mut count = 0;
        for_each_combination(&pool, 4, |_| count += 1);
        assert_eq!(count, 1);
        for_each_combination(&pool, 5, |_| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn test_candidates_need_centers() {
        let mut state = play_state();
        state.put_entity(0, hex(1, 1), EntityKind::Center);
        state.put_entity(0, hex(-1, 1), EntityKind::Center);
        state.put_entity(0, hex(2, 0), EntityKind::Post);

        let found = find_candidate_routes(&state, 0, None, 2, 5);
        assert_eq!(found, vec![vec![hex(-1, 1), hex(1, 1)]]);

        // A forced hex is exempt from the Center check
        let forced = find_candidate_routes(&state, 0, Some(hex(2, 0)), 2, 5);
        assert!(forced.iter().all(|r| r.contains(&hex(2, 0))));
        assert_eq!(
            best_route(&state, 0, Some(hex(2, 0))),
            Some(vec![hex(-1, 1), hex(1, 1), hex(2, 0)])
        );
    }

    #[test]
    fn test_duplicate_and_overlap_rejected() {
        let mut state = play_state();
        for h in [hex(1, 1), hex(-1, 1), hex(2, 0), hex(-2, 1)] {
            state.put_entity(0, h, EntityKind::Center);
        }
        let first = vec![hex(-1, 1), hex(1, 1), hex(2, 0)];
        state.create_route(0, &first);
        state.refresh_route_activity();
        assert!(state.routes()[0].active);

        assert_eq!(
            validate_route(&state, 0, &first, None, None),
            Err(RouteRejection::Duplicate { route_id: 0 })
        );
        // Two shared hexes exceed the default limit of one
        assert_eq!(
            validate_route(&state, 0, &[hex(-2, 1), hex(-1, 1), hex(1, 1)], None, None),
            Err(RouteRejection::Overlap {
                route_id: 0,
                shared: 2
            })
        );
        assert_eq!(
            validate_route(&state, 0, &[hex(-2, 1), hex(-1, 1)], None, None),
            Ok(())
        );
        // Rerouting the route itself skips its own overlap
        assert_eq!(validate_route(&state, 0, &first, None, Some(0)), Ok(()));
    }

    #[test]
    fn test_route_removes_front_meeples() {
        use crate::player::MeepleColor;

        let mut config = crate::config::GameConfig::default();
        config.rules.route_removes_meeples = true;
        let mut state = crate::game::tests::play_state_with(config);
        crate::game::tests::clear_meeples(&mut state);
        state
            .meeples
            .insert(hex(1, 1), vec![MeepleColor::Red, MeepleColor::Blue]);
        state.meeples.insert(hex(-1, 1), vec![MeepleColor::White]);
        state.put_entity(0, hex(1, 1), EntityKind::Center);
        state.put_entity(0, hex(-1, 1), EntityKind::Center);

        state.create_route(0, &[hex(1, 1), hex(-1, 1)]);
        assert_eq!(state.meeples_at(&hex(1, 1)), &[MeepleColor::Blue]);
        assert!(state.meeples_at(&hex(-1, 1)).is_empty());
    }

    #[test]
    fn test_routes_keep_meeples_by_default() {
        let mut state = play_state();
        crate::game::tests::clear_meeples(&mut state);
        state.meeples.insert(hex(1, 1), vec![crate::player::MeepleColor::Red]);
        state.put_entity(0, hex(1, 1), EntityKind::Center);
        state.put_entity(0, hex(-1, 1), EntityKind::Center);

        state.create_route(0, &[hex(1, 1), hex(-1, 1)]);
        assert_eq!(state.meeples_at(&hex(1, 1)).len(), 1);
    }

    #[test]
    fn test_pending_route_counts_for_duplicates() {
        let mut state = play_state();
        state.put_entity(0, hex(1, 1), EntityKind::Center);
        state.put_entity(0, hex(-1, 1), EntityKind::Post);
        let pending = vec![hex(-1, 1), hex(1, 1)];
        state.create_route(0, &pending);
        state.refresh_route_activity();
        assert!(!state.routes()[0].active);

        assert_eq!(
            validate_route(&state, 0, &pending, Some(hex(-1, 1)), None),
            Err(RouteRejection::Duplicate { route_id: 0 })
        );
        assert_eq!(best_route(&state, 0, Some(hex(-1, 1))), None);
    }

    #[test]
    fn test_route_goes_inactive_when_center_lost() {
        let mut state = play_state();
        state.put_entity(0, hex(1, 1), EntityKind::Center);
        state.put_entity(0, hex(-1, 1), EntityKind::Center);
        state.create_route(0, &[hex(1, 1), hex(-1, 1)]);
        state.refresh_route_activity();
        assert!(state.routes()[0].active);

        state.entities.remove(&hex(1, 1));
        state.refresh_route_activity();
        assert!(!state.routes()[0].active);
        assert_eq!(state.routes().len(), 1);
    }

    #[test]
    fn test_city_post_auto_upgraded() {
        let mut state = play_state();
        let segou = hex(2, -2);
        state.put_entity(0, segou, EntityKind::Post);
        state.put_entity(0, hex(1, 1), EntityKind::Center);
        let supply = state.player(0).post_supply;

        assert_eq!(
            best_route(&state, 0, None),
            Some(vec![hex(1, 1), segou])
        );
        state.create_route(0, &[segou, hex(1, 1)]);
        assert_eq!(state.entity_of(0, &segou), Some(EntityKind::Center));
        assert_eq!(state.player(0).post_supply, supply.map(|n| n + 1));
    }

    #[test]
    fn test_update_and_delete_check_owner() {
        let mut state = play_state();
        for h in [hex(1, 1), hex(-1, 1), hex(2, 0)] {
            state.put_entity(0, h, EntityKind::Center);
        }
        let id = state.create_route(0, &[hex(1, 1), hex(-1, 1)]);

        assert_eq!(state.delete_route(1, id), Err(RouteRejection::NotOwner(id)));
        assert_eq!(
            state.update_route(0, 99, &[hex(1, 1), hex(2, 0)]),
            Err(RouteRejection::UnknownRoute(99))
        );
        assert_eq!(state.update_route(0, id, &[hex(2, 0), hex(1, 1)]), Ok(()));
        assert_eq!(state.routes()[0].hexes(), &[hex(1, 1), hex(2, 0)]);
        assert_eq!(state.delete_route(0, id), Ok(()));
        assert!(state.routes().is_empty());
    }
}
