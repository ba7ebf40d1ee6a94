//! Hex coordinate system using cube coordinates (x, y, z).
//!
//! Every coordinate satisfies `x + y + z = 0`. The constructor derives `z`
//! from `x` and `y`, and every fallible entry point (`try_from_cube`,
//! `FromStr`, deserialization) rejects off-plane triples, so a `HexCoord`
//! value can never violate the invariant.
//!
//! Coordinates are totally ordered (lexicographically on x, y, z) so they can
//! key ordered maps and so route hex lists have a canonical sorted form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when building a coordinate from untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HexError {
    #[error("hex ({x},{y},{z}) is off the x+y+z=0 plane")]
    OffPlane { x: i32, y: i32, z: i32 },

    #[error("malformed hex coordinate: {0:?}")]
    Malformed(String),
}

/// Cube coordinate of a hex cell.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(try_from = "RawHex")]
pub struct HexCoord {
    x: i32,
    y: i32,
    z: i32,
}

/// Unchecked wire form; converted through `try_from_cube` on deserialize.
#[derive(Deserialize)]
struct RawHex {
    x: i32,
    y: i32,
    z: i32,
}

impl TryFrom<RawHex> for HexCoord {
    type Error = HexError;

    fn try_from(raw: RawHex) -> Result<Self, Self::Error> {
        HexCoord::try_from_cube(raw.x, raw.y, raw.z)
    }
}

impl HexCoord {
    /// The six unit direction vectors.
    ///
    /// The order is significant: neighbor iteration and every tie-break that
    /// depends on it (BFS order, mancala path choice) follow this sequence.
    pub const DIRECTIONS: [HexCoord; 6] = [
        HexCoord::new(1, -1),
        HexCoord::new(1, 0),
        HexCoord::new(0, 1),
        HexCoord::new(-1, 1),
        HexCoord::new(-1, 0),
        HexCoord::new(0, -1),
    ];

    /// The origin hex (0, 0, 0)
    pub const ORIGIN: HexCoord = HexCoord::new(0, 0);

    /// Create a coordinate from x and y; z is derived.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y, z: -x - y }
    }

    /// Create a coordinate from all three cube components.
    pub fn try_from_cube(x: i32, y: i32, z: i32) -> Result<Self, HexError> {
        if x + y + z != 0 {
            return Err(HexError::OffPlane { x, y, z });
        }
        Ok(Self { x, y, z })
    }

    pub const fn x(&self) -> i32 {
        self.x
    }

    pub const fn y(&self) -> i32 {
        self.y
    }

    pub const fn z(&self) -> i32 {
        self.z
    }

    /// The six neighboring hexes, in `DIRECTIONS` order
    pub fn neighbors(&self) -> [HexCoord; 6] {
        Self::DIRECTIONS.map(|d| *self + d)
    }

    /// Distance to another hex (in hex steps)
    pub fn distance_to(&self, other: &HexCoord) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        let dz = (self.z - other.z).unsigned_abs();
        (dx + dy + dz) / 2
    }

    /// Distance from the origin
    pub fn ring(&self) -> u32 {
        self.distance_to(&Self::ORIGIN)
    }

    pub fn is_adjacent(&self, other: &HexCoord) -> bool {
        self.distance_to(other) == 1
    }
}

impl Add for HexCoord {
    type Output = HexCoord;

    fn add(self, rhs: HexCoord) -> HexCoord {
        HexCoord {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            z: self.z + rhs.z,
        }
    }
}

impl Sub for HexCoord {
    type Output = HexCoord;

    fn sub(self, rhs: HexCoord) -> HexCoord {
        HexCoord {
            x: self.x - rhs.x,
            y: self.y - rhs.y,
            z: self.z - rhs.z,
        }
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.x, self.y, self.z)
    }
}

/// Parses `(x,y,z)` or bare `x,y,z`.
impl FromStr for HexCoord {
    type Err = HexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let inner = trimmed
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .unwrap_or(trimmed);

        let parts: Vec<&str> = inner.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(HexError::Malformed(s.to_string()));
        }

        let mut values = [0i32; 3];
        for (slot, part) in values.iter_mut().zip(&parts) {
            *slot = part
                .parse()
                .map_err(|_| HexError::Malformed(s.to_string()))?;
        }

        HexCoord::try_from_cube(values[0], values[1], values[2])
    }
}

/// All hexes within `radius` of the origin, in sorted order.
pub fn hexagon(radius: u32) -> Vec<HexCoord> {
    let r = radius as i32;
    let mut hexes = Vec::new();
    for x in -r..=r {
        for y in -r..=r {
            let hex = HexCoord::new(x, y);
            if hex.ring() <= radius {
                hexes.push(hex);
            }
        }
    }
    hexes.sort();
    hexes
}
