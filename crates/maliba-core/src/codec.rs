//! Integer action identifiers.
//!
//! The id space is split into disjoint family ranges, each sized for the
//! largest supported board. Two additive flags mark compound moves:
//!
//! | range / flag          | meaning                                   |
//! |-----------------------|-------------------------------------------|
//! | `0`                   | Pass (Setup: advance)                     |
//! | `1 + profile`         | Income with a heuristic profile           |
//! | `32 + hex`            | PlaceToken                                |
//! | `160 + hex`           | Upgrade                                   |
//! | `288 + start*128+end` | Mancala                                   |
//! | `16672 + first*128+last` | TradeRouteCreate (canonical endpoints) |
//! | `+ 2^16`              | place a post at the Mancala destination   |
//! | `+ 2^17`              | declare a route through the acted-on hex  |
//!
//! Decoding peels the route flag first, then the post flag, then tests the
//! residual against the family bases from the highest base down. The ranges
//! nest by construction, so that order is what keeps them disjoint.
//!
//! An id only says *that* a route is declared, not which one. Decoding a
//! route-flagged id replays the primitive effect on a scratch state and takes
//! the best route through the acted-on hex, which is exactly what the move
//! generator does when it builds the compound move.

use crate::actions::{IncomeProfile, Move};
use crate::board::Board;
use crate::game::GameState;
use crate::hex::HexCoord;
use crate::movegen;
use crate::routes::canonicalize;

/// Compact action identifier
pub type ActionId = u32;

/// Largest supported board (a regular board of radius 6 has 127 hexes)
pub const MAX_BOARD_HEXES: usize = 128;

const HEX_SPAN: u32 = MAX_BOARD_HEXES as u32;

pub const PASS_ACTION: ActionId = 0;
pub const INCOME_BASE: ActionId = 1;
pub const PLACE_TOKEN_BASE: ActionId = 32;
pub const UPGRADE_BASE: ActionId = PLACE_TOKEN_BASE + HEX_SPAN;
pub const MANCALA_BASE: ActionId = UPGRADE_BASE + HEX_SPAN;
pub const TRADE_ROUTE_BASE: ActionId = MANCALA_BASE + HEX_SPAN * HEX_SPAN;
const TRADE_ROUTE_END: ActionId = TRADE_ROUTE_BASE + HEX_SPAN * HEX_SPAN;

pub const POST_FLAG: ActionId = 1 << 16;
pub const ROUTE_FLAG: ActionId = 1 << 17;

/// Size of the whole id space
pub const NUM_DISTINCT_ACTIONS: u32 = 1 << 18;

/// Move family and indices carried by an id, before any state is consulted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionFamily {
    Pass,
    Income(IncomeProfile),
    PlaceToken(usize),
    Upgrade(usize),
    Mancala { start: usize, end: usize },
    TradeRouteCreate { first: usize, last: usize },
}

/// An id split into its family and compound flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedAction {
    pub family: ActionFamily,
    pub place_post: bool,
    pub declare_route: bool,
}

/// Split an id into family and flags, checking indices against a board of
/// `hex_count` hexes. Returns `None` for anything outside the valid space.
pub fn unpack(action: ActionId, hex_count: usize) -> Option<DecodedAction> {
    if action >= NUM_DISTINCT_ACTIONS {
        return None;
    }

    let mut residual = action;
    let declare_route = residual >= ROUTE_FLAG;
    if declare_route {
        residual -= ROUTE_FLAG;
    }
    let place_post = residual >= POST_FLAG;
    if place_post {
        residual -= POST_FLAG;
    }

    let index = |i: u32| -> Option<usize> {
        let i = i as usize;
        (i < hex_count).then_some(i)
    };

    let family = if residual >= TRADE_ROUTE_END {
        return None;
    } else if residual >= TRADE_ROUTE_BASE {
        let offset = residual - TRADE_ROUTE_BASE;
        let first = index(offset / HEX_SPAN)?;
        let last = index(offset % HEX_SPAN)?;
        if first >= last {
            return None;
        }
        ActionFamily::TradeRouteCreate { first, last }
    } else if residual >= MANCALA_BASE {
        let offset = residual - MANCALA_BASE;
        let start = index(offset / HEX_SPAN)?;
        let end = index(offset % HEX_SPAN)?;
        if start == end {
            return None;
        }
        ActionFamily::Mancala { start, end }
    } else if residual >= UPGRADE_BASE {
        ActionFamily::Upgrade(index(residual - UPGRADE_BASE)?)
    } else if residual >= PLACE_TOKEN_BASE {
        ActionFamily::PlaceToken(index(residual - PLACE_TOKEN_BASE)?)
    } else if residual >= INCOME_BASE {
        ActionFamily::Income(IncomeProfile::from_ordinal(residual - INCOME_BASE)?)
    } else {
        ActionFamily::Pass
    };

    // Only a Mancala may carry the post flag, and a route needs a post or an
    // upgrade to hang on.
    let flags_ok = match family {
        ActionFamily::Mancala { .. } => !declare_route || place_post,
        ActionFamily::Upgrade(_) => !place_post,
        _ => !place_post && !declare_route,
    };
    if !flags_ok {
        return None;
    }

    Some(DecodedAction {
        family,
        place_post,
        declare_route,
    })
}

/// Inverse of `unpack`. Indices must already be valid for the board.
pub fn pack(decoded: &DecodedAction) -> ActionId {
    let base = match decoded.family {
        ActionFamily::Pass => PASS_ACTION,
        ActionFamily::Income(profile) => INCOME_BASE + profile.ordinal(),
        ActionFamily::PlaceToken(i) => PLACE_TOKEN_BASE + i as u32,
        ActionFamily::Upgrade(i) => UPGRADE_BASE + i as u32,
        ActionFamily::Mancala { start, end } => {
            MANCALA_BASE + start as u32 * HEX_SPAN + end as u32
        }
        ActionFamily::TradeRouteCreate { first, last } => {
            TRADE_ROUTE_BASE + first as u32 * HEX_SPAN + last as u32
        }
    };
    let mut action = base;
    if decoded.place_post {
        action += POST_FLAG;
    }
    if decoded.declare_route {
        action += ROUTE_FLAG;
    }
    action
}

/// Encode a move. Returns `None` for moves that have no id (invalid moves,
/// route updates and deletions) or that reference hexes off the board.
pub fn encode(board: &Board, mv: &Move) -> Option<ActionId> {
    let decoded = match mv {
        Move::Invalid | Move::TradeRouteUpdate { .. } | Move::TradeRouteDelete { .. } => {
            return None
        }
        Move::Pass => DecodedAction {
            family: ActionFamily::Pass,
            place_post: false,
            declare_route: false,
        },
        Move::Income(plan) => DecodedAction {
            family: ActionFamily::Income(plan.profile),
            place_post: false,
            declare_route: false,
        },
        Move::PlaceToken { hex } => DecodedAction {
            family: ActionFamily::PlaceToken(board.index_of(hex)?),
            place_post: false,
            declare_route: false,
        },
        Move::Upgrade { hex, route } => DecodedAction {
            family: ActionFamily::Upgrade(board.index_of(hex)?),
            place_post: false,
            declare_route: route.is_some(),
        },
        Move::Mancala {
            start,
            destination,
            place_post,
            route,
        } => {
            if route.is_some() && !place_post {
                return None;
            }
            let start = board.index_of(start)?;
            let end = board.index_of(destination)?;
            if start == end {
                return None;
            }
            DecodedAction {
                family: ActionFamily::Mancala { start, end },
                place_post: *place_post,
                declare_route: route.is_some(),
            }
        }
        Move::TradeRouteCreate { hexes } => {
            let canonical = canonicalize(hexes);
            if canonical.len() < 2 {
                return None;
            }
            let first = board.index_of(canonical.first()?)?;
            let last = board.index_of(canonical.last()?)?;
            DecodedAction {
                family: ActionFamily::TradeRouteCreate { first, last },
                place_post: false,
                declare_route: false,
            }
        }
    };
    Some(pack(&decoded))
}

/// Decode an id against the current state, for the player to move.
///
/// Returns `Move::Invalid` when the id is malformed or when a compound
/// route cannot be reconstructed.
pub fn decode(state: &GameState, action: ActionId) -> Move {
    let board = state.board();
    let Some(decoded) = unpack(action, board.len()) else {
        return Move::Invalid;
    };
    let player = state.current_player();
    let hex = |i: usize| -> HexCoord { board.hexes()[i] };

    match decoded.family {
        ActionFamily::Pass => Move::Pass,
        ActionFamily::Income(profile) => Move::Income(movegen::income_plan(state, player, profile)),
        ActionFamily::PlaceToken(i) => Move::PlaceToken { hex: hex(i) },
        ActionFamily::Upgrade(i) => {
            let primitive = Move::Upgrade {
                hex: hex(i),
                route: None,
            };
            with_implied_route(state, primitive, decoded.declare_route)
        }
        ActionFamily::Mancala { start, end } => {
            let primitive = Move::Mancala {
                start: hex(start),
                destination: hex(end),
                place_post: decoded.place_post,
                route: None,
            };
            with_implied_route(state, primitive, decoded.declare_route)
        }
        ActionFamily::TradeRouteCreate { first, last } => {
            let (first, last) = (hex(first), hex(last));
            movegen::ranked_standalone_routes(state, player)
                .into_iter()
                .find(|r| r.first() == Some(&first) && r.last() == Some(&last))
                .map(|hexes| Move::TradeRouteCreate { hexes })
                .unwrap_or(Move::Invalid)
        }
    }
}

fn with_implied_route(state: &GameState, primitive: Move, declare_route: bool) -> Move {
    if !declare_route {
        return primitive;
    }
    let player = state.current_player();
    match movegen::implied_route(state, player, &primitive) {
        Some(route) => match primitive {
            Move::Upgrade { hex, .. } => Move::Upgrade {
                hex,
                route: Some(route),
            },
            Move::Mancala {
                start,
                destination,
                place_post,
                ..
            } => Move::Mancala {
                start,
                destination,
                place_post,
                route: Some(route),
            },
            other => other,
        },
        None => Move::Invalid,
    }
}

/// Human-readable description of an id in the current state
pub fn action_to_string(state: &GameState, action: ActionId) -> String {
    decode(state, action).to_string()
}

/// Parse a move description and encode it. Route-carrying moves must name
/// the same route the id would reconstruct, and income must name the goods
/// the profile pays out in this state.
pub fn parse_action(state: &GameState, text: &str) -> Option<ActionId> {
    let mv = Move::parse(text);
    let action = encode(state.board(), &mv)?;
    match &mv {
        Move::Mancala { route: Some(_), .. }
        | Move::Upgrade { route: Some(_), .. }
        | Move::Income(_)
        | Move::TradeRouteCreate { .. } => {
            let canonical = match &mv {
                Move::TradeRouteCreate { hexes } => Move::TradeRouteCreate {
                    hexes: canonicalize(hexes),
                },
                other => other.clone(),
            };
            (decode(state, action) == canonical).then_some(action)
        }
        _ => Some(action),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;
    use pretty_assertions::assert_eq;

    fn decoded(family: ActionFamily, place_post: bool, declare_route: bool) -> DecodedAction {
        DecodedAction {
            family,
            place_post,
            declare_route,
        }
    }

    #[test]
    fn test_family_bases() {
        assert_eq!(UPGRADE_BASE, 160);
        assert_eq!(MANCALA_BASE, 288);
        assert_eq!(TRADE_ROUTE_BASE, 16672);
        assert!(TRADE_ROUTE_END <= POST_FLAG);
    }

    #[test]
    fn test_pack_unpack_families() {
        let cases = [
            decoded(ActionFamily::Pass, false, false),
            decoded(ActionFamily::Income(IncomeProfile::HoardRare), false, false),
            decoded(ActionFamily::PlaceToken(36), false, false),
            decoded(ActionFamily::Upgrade(0), false, true),
            decoded(ActionFamily::Mancala { start: 3, end: 4 }, true, true),
            decoded(ActionFamily::Mancala { start: 36, end: 0 }, false, false),
            decoded(ActionFamily::TradeRouteCreate { first: 1, last: 30 }, false, false),
        ];
        for case in cases {
            assert_eq!(unpack(pack(&case), 37), Some(case));
        }
    }

    #[test]
    fn test_flags_peeled_before_range_test() {
        // Upgrade of hex 5 with a route: the residual lands in the Upgrade range
        let action = UPGRADE_BASE + 5 + ROUTE_FLAG;
        assert_eq!(
            unpack(action, 37),
            Some(decoded(ActionFamily::Upgrade(5), false, true))
        );

        let action = MANCALA_BASE + 2 * 128 + 9 + POST_FLAG + ROUTE_FLAG;
        assert_eq!(
            unpack(action, 37),
            Some(decoded(ActionFamily::Mancala { start: 2, end: 9 }, true, true))
        );
    }

    #[test]
    fn test_invalid_ids() {
        // Hex index beyond the board
        assert_eq!(unpack(PLACE_TOKEN_BASE + 37, 37), None);
        assert_eq!(unpack(MANCALA_BASE + 40 * 128 + 1, 37), None);
        // Gap after the income profiles
        assert_eq!(unpack(INCOME_BASE + 4, 37), None);
        // Route flag on a plain mancala, post flag on an upgrade
        assert_eq!(unpack(MANCALA_BASE + 1 + ROUTE_FLAG, 37), None);
        assert_eq!(unpack(UPGRADE_BASE + 1 + POST_FLAG, 37), None);
        // Flags on families that take none
        assert_eq!(unpack(PASS_ACTION + POST_FLAG, 37), None);
        // Mancala onto its own start
        assert_eq!(unpack(MANCALA_BASE + 3 * 128 + 3, 37), None);
        assert_eq!(unpack(NUM_DISTINCT_ACTIONS, 37), None);
    }

    #[test]
    fn test_encode_moves() {
        let board = Board::regular(3).unwrap();
        let a = HexCoord::new(0, 1);
        let b = HexCoord::new(1, 0);
        let ia = board.index_of(&a).unwrap() as u32;
        let ib = board.index_of(&b).unwrap() as u32;

        assert_eq!(encode(&board, &Move::Pass), Some(0));
        assert_eq!(
            encode(&board, &Move::PlaceToken { hex: a }),
            Some(PLACE_TOKEN_BASE + ia)
        );
        assert_eq!(
            encode(
                &board,
                &Move::Mancala {
                    start: a,
                    destination: b,
                    place_post: true,
                    route: Some(vec![b, a]),
                }
            ),
            Some(MANCALA_BASE + ia * 128 + ib + POST_FLAG + ROUTE_FLAG)
        );
        // Endpoints come from the canonical order, whatever the input order
        assert_eq!(
            encode(&board, &Move::TradeRouteCreate { hexes: vec![b, a] }),
            Some(TRADE_ROUTE_BASE + ia.min(ib) * 128 + ia.max(ib))
        );
    }

    #[test]
    fn test_encode_rejects_unencodable() {
        let board = Board::regular(3).unwrap();
        let off_board = HexCoord::new(5, 0);
        assert_eq!(encode(&board, &Move::Invalid), None);
        assert_eq!(encode(&board, &Move::TradeRouteDelete { id: 1 }), None);
        assert_eq!(encode(&board, &Move::PlaceToken { hex: off_board }), None);
        assert_eq!(
            encode(
                &board,
                &Move::Mancala {
                    start: HexCoord::ORIGIN,
                    destination: HexCoord::new(1, 0),
                    place_post: false,
                    route: Some(vec![]),
                }
            ),
            None
        );
    }

    #[test]
    fn test_parse_income_checks_goods() {
        let mut state = crate::game::tests::play_state();
        state.put_entity(0, HexCoord::new(1, 1), crate::game::EntityKind::Post);
        let paid = action_to_string(&state, 3);
        assert_eq!(paid, "income max-total | Fish:1 | -");
        assert_eq!(parse_action(&state, &paid), Some(3));
        assert_eq!(parse_action(&state, "income max-total | Gold bars:100 | -"), None);
        assert_eq!(parse_action(&state, "income max-total | Fish:2 | -"), None);
    }
}
