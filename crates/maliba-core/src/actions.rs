//! Moves that players can make.
//!
//! `Move` is the structured form of every action. The compact integer form
//! lives in `codec`; this module owns the human-readable text form used by
//! logs, transcripts and the command surface.
//!
//! Text forms:
//!
//! ```text
//! pass
//! token (0,1,-1)
//! move (0,1,-1)>(1,0,-1)
//! move (0,1,-1)>(1,0,-1) post route (0,0,0) (1,0,-1)
//! upgrade (1,1,-2)
//! upgrade (1,1,-2) route (0,0,0) (1,1,-2)
//! income new-rare | Salt:2 | Gold:1
//! route (0,0,0) (2,-2,0)
//! reroute #3 (0,0,0) (2,1,-3)
//! unroute #3
//! ```

use crate::hex::HexCoord;
use crate::player::Goods;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Route identifier, monotonic per game and never reused
pub type RouteId = u32;

/// All possible moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Move {
    /// Malformed input; never applied
    Invalid,

    /// Skip the turn; in Setup this advances to token placement
    Pass,

    /// Put a token on an empty non-city hex
    PlaceToken { hex: HexCoord },

    /// Move a token, distributing the meeples picked up at `start`
    Mancala {
        start: HexCoord,
        destination: HexCoord,
        /// Also place a trading post at the destination
        place_post: bool,
        /// Also declare this route (canonical order); requires `place_post`
        route: Option<Vec<HexCoord>>,
    },

    /// Upgrade an owned post to a center, optionally declaring a route
    Upgrade {
        hex: HexCoord,
        route: Option<Vec<HexCoord>>,
    },

    /// Collect goods from owned trading entities
    Income(IncomePlan),

    /// Declare a trade route as a move of its own
    TradeRouteCreate { hexes: Vec<HexCoord> },

    /// Replace the hexes of an owned route
    TradeRouteUpdate { id: RouteId, hexes: Vec<HexCoord> },

    /// Remove an owned route
    TradeRouteDelete { id: RouteId },
}

/// Heuristic income allocation strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IncomeProfile {
    /// Connected Centers take a rare good the player does not hold yet
    NewRare,
    /// Centers spread common goods over their two first cities
    NewCommon,
    /// Centers take common goods
    MaxTotal,
    /// Connected Centers take a rare good, isolated ones pile one common good
    HoardRare,
}

impl IncomeProfile {
    pub const ALL: [IncomeProfile; 4] = [
        IncomeProfile::NewRare,
        IncomeProfile::NewCommon,
        IncomeProfile::MaxTotal,
        IncomeProfile::HoardRare,
    ];

    pub fn ordinal(&self) -> u32 {
        match self {
            IncomeProfile::NewRare => 0,
            IncomeProfile::NewCommon => 1,
            IncomeProfile::MaxTotal => 2,
            IncomeProfile::HoardRare => 3,
        }
    }

    pub fn from_ordinal(n: u32) -> Option<Self> {
        Self::ALL.get(n as usize).copied()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IncomeProfile::NewRare => "new-rare",
            IncomeProfile::NewCommon => "new-common",
            IncomeProfile::MaxTotal => "max-total",
            IncomeProfile::HoardRare => "hoard-rare",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

/// Goods a player would receive from one income action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomePlan {
    pub profile: IncomeProfile,
    pub common: Goods,
    pub rare: Goods,
}

impl IncomePlan {
    pub fn is_empty(&self) -> bool {
        self.common.is_empty() && self.rare.is_empty()
    }

    /// Normalized goods description, ignoring which profile produced it
    pub fn goods_key(&self) -> String {
        format!("{} | {}", self.common, self.rare)
    }
}

impl Move {
    /// Parse the text form; anything unrecognized yields `Move::Invalid`.
    pub fn parse(s: &str) -> Move {
        parse_move(s.trim()).unwrap_or(Move::Invalid)
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Move::Invalid)
    }

    /// The route declared as a side effect, if any
    pub fn declared_route(&self) -> Option<&[HexCoord]> {
        match self {
            Move::Mancala { route, .. } | Move::Upgrade { route, .. } => route.as_deref(),
            _ => None,
        }
    }
}

fn parse_move(s: &str) -> Option<Move> {
    let (verb, rest) = match s.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (s, ""),
    };

    match verb {
        "pass" if rest.is_empty() => Some(Move::Pass),
        "invalid" if rest.is_empty() => Some(Move::Invalid),
        "token" => Some(Move::PlaceToken {
            hex: rest.parse().ok()?,
        }),
        "move" => {
            let mut words = rest.split_whitespace();
            let (start, destination) = words.next()?.split_once('>')?;
            let start = start.parse().ok()?;
            let destination = destination.parse().ok()?;
            let place_post = match words.next() {
                None => false,
                Some("post") => true,
                Some(_) => return None,
            };
            let route = parse_route_tail(&mut words)?;
            if route.is_some() && !place_post {
                return None;
            }
            Some(Move::Mancala {
                start,
                destination,
                place_post,
                route,
            })
        }
        "upgrade" => {
            let mut words = rest.split_whitespace();
            let hex = words.next()?.parse().ok()?;
            let route = parse_route_tail(&mut words)?;
            Some(Move::Upgrade { hex, route })
        }
        "income" => {
            let mut parts = rest.split('|').map(str::trim);
            let profile = IncomeProfile::parse(parts.next()?)?;
            let common = parts.next().unwrap_or("-").parse().ok()?;
            let rare = parts.next().unwrap_or("-").parse().ok()?;
            if parts.next().is_some() {
                return None;
            }
            Some(Move::Income(IncomePlan {
                profile,
                common,
                rare,
            }))
        }
        "route" => Some(Move::TradeRouteCreate {
            hexes: parse_hexes(rest.split_whitespace())?,
        }),
        "reroute" => {
            let mut words = rest.split_whitespace();
            let id = parse_route_id(words.next()?)?;
            Some(Move::TradeRouteUpdate {
                id,
                hexes: parse_hexes(words)?,
            })
        }
        "unroute" => Some(Move::TradeRouteDelete {
            id: parse_route_id(rest)?,
        }),
        _ => None,
    }
}

/// `None` on a malformed tail, `Some(None)` when there is no tail
fn parse_route_tail<'a>(words: &mut impl Iterator<Item = &'a str>) -> Option<Option<Vec<HexCoord>>> {
    match words.next() {
        None => Some(None),
        Some("route") => Some(Some(parse_hexes(words)?)),
        Some(_) => None,
    }
}

fn parse_hexes<'a>(words: impl Iterator<Item = &'a str>) -> Option<Vec<HexCoord>> {
    let hexes: Vec<HexCoord> = words
        .map(|w| w.parse().ok())
        .collect::<Option<Vec<_>>>()?;
    if hexes.is_empty() {
        return None;
    }
    Some(hexes)
}

fn parse_route_id(s: &str) -> Option<RouteId> {
    s.trim().strip_prefix('#')?.parse().ok()
}

fn write_hexes(f: &mut fmt::Formatter<'_>, hexes: &[HexCoord]) -> fmt::Result {
    for hex in hexes {
        write!(f, " {}", hex)?;
    }
    Ok(())
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Move::Invalid => write!(f, "invalid"),
            Move::Pass => write!(f, "pass"),
            Move::PlaceToken { hex } => write!(f, "token {}", hex),
            Move::Mancala {
                start,
                destination,
                place_post,
                route,
            } => {
                write!(f, "move {}>{}", start, destination)?;
                if *place_post {
                    write!(f, " post")?;
                }
                if let Some(route) = route {
                    write!(f, " route")?;
                    write_hexes(f, route)?;
                }
                Ok(())
            }
            Move::Upgrade { hex, route } => {
                write!(f, "upgrade {}", hex)?;
                if let Some(route) = route {
                    write!(f, " route")?;
                    write_hexes(f, route)?;
                }
                Ok(())
            }
            Move::Income(plan) => {
                write!(f, "income {} | {}", plan.profile.as_str(), plan.goods_key())
            }
            Move::TradeRouteCreate { hexes } => {
                write!(f, "route")?;
                write_hexes(f, hexes)
            }
            Move::TradeRouteUpdate { id, hexes } => {
                write!(f, "reroute #{}", id)?;
                write_hexes(f, hexes)
            }
            Move::TradeRouteDelete { id } => write!(f, "unroute #{}", id),
        }
    }
}
