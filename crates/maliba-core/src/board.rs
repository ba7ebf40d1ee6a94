//! Static board model: valid hexes, cities, coast and regions.
//!
//! This module contains:
//! - `BoardConfig`, the serde input describing a board
//! - `Board`, the immutable model built once from that input
//! - Coordinate <-> dense index lookup used by the action codec
//!
//! A `Board` is never mutated after construction; game states share it
//! behind an `Arc`.

use crate::codec::MAX_BOARD_HEXES;
use crate::game::GameError;
use crate::hex::{hexagon, HexCoord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

/// Player identifier (0-3 for a 4-player game)
pub type PlayerId = u8;

/// Region identifier, the position of the region in the board configuration
pub type RegionId = u16;

/// A city as declared in the board configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityConfig {
    pub name: String,
    pub culture: String,
    /// Location in `x,y,z` form
    pub location: String,
    pub common_good: String,
    pub rare_good: String,
}

/// A named region and the hexes it covers (`x,y,z;x,y,z` form)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
    pub name: String,
    pub hexes: String,
}

/// Board description supplied by the configuration loader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Radius of the regular hexagonal board, used when `valid_hexes` is absent
    pub radius: u32,
    /// Explicit hex list for irregular boards
    pub valid_hexes: Option<String>,
    pub cities: Vec<CityConfig>,
    pub coastal_hexes: String,
    pub regions: Vec<RegionConfig>,
    /// Names of capital cities
    pub capitals: Vec<String>,
    /// Names of desert cities
    pub desert_cities: Vec<String>,
}

impl Default for BoardConfig {
    /// Radius-3 board with six cities, three regions and a western coast.
    fn default() -> Self {
        let city = |name: &str, culture: &str, location: &str, common: &str, rare: &str| {
            CityConfig {
                name: name.into(),
                culture: culture.into(),
                location: location.into(),
                common_good: common.into(),
                rare_good: rare.into(),
            }
        };

        let region = |name: &str, keep: fn(&HexCoord) -> bool| RegionConfig {
            name: name.into(),
            hexes: format_hex_list(hexagon(3).iter().filter(|h| keep(h))),
        };

        Self {
            radius: 3,
            valid_hexes: None,
            cities: vec![
                city("Timbuktu", "Songhai", "0,0,0", "Salt", "Gold"),
                city("Segou", "Bambara", "2,-2,0", "Millet", "Chiwara"),
                city("Ouagadougou", "Mossi", "-2,2,0", "Horses", "Bronze bracelet"),
                city("Djenne", "Bozo", "2,1,-3", "Fish", "Mud cloth"),
                city("Agadez", "Tuareg", "-1,-2,3", "Dates", "Silver cross"),
                city("Kano", "Hausa", "-1,3,-2", "Leather", "Indigo cloth"),
            ],
            coastal_hexes: "-3,0,3;-3,1,2;-3,2,1;-3,3,0".into(),
            regions: vec![
                region("Sahara", |h| h.z() > 0),
                region("Niger Bend", |h| h.z() == 0),
                region("Savanna", |h| h.z() < 0),
            ],
            capitals: vec!["Timbuktu".into()],
            desert_cities: vec!["Timbuktu".into(), "Agadez".into()],
        }
    }
}

/// Render hexes in the `x,y,z;x,y,z` configuration form.
pub fn format_hex_list<'a>(hexes: impl IntoIterator<Item = &'a HexCoord>) -> String {
    hexes
        .into_iter()
        .map(|h| format!("{},{},{}", h.x(), h.y(), h.z()))
        .collect::<Vec<_>>()
        .join(";")
}

/// Parse a `x,y,z;x,y,z` hex list.
///
/// Malformed and off-plane entries are skipped with a warning.
pub fn parse_hex_list(list: &str) -> Vec<HexCoord> {
    list.split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<HexCoord>() {
            Ok(hex) => Some(hex),
            Err(e) => {
                warn!("skipping hex entry {:?}: {}", entry, e);
                None
            }
        })
        .collect()
}

/// A city placed on the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    pub id: u32,
    pub name: String,
    /// Cultural group
    pub culture: String,
    pub location: HexCoord,
    pub common_good: String,
    pub rare_good: String,
}

/// The immutable game board
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    /// Valid hexes in sorted order; position is the hex index
    hexes: Vec<HexCoord>,
    index: BTreeMap<HexCoord, usize>,
    cities: Vec<City>,
    city_at: BTreeMap<HexCoord, usize>,
    coastal: BTreeSet<HexCoord>,
    region_of: BTreeMap<HexCoord, RegionId>,
    region_names: BTreeMap<RegionId, String>,
    capitals: BTreeSet<u32>,
    desert_cities: BTreeSet<u32>,
}

impl Board {
    /// Build a board from configuration.
    pub fn from_config(config: &BoardConfig) -> Result<Self, GameError> {
        let mut hexes = match &config.valid_hexes {
            Some(list) => parse_hex_list(list),
            None => hexagon(config.radius),
        };
        hexes.sort();
        hexes.dedup();

        if hexes.is_empty() {
            return Err(GameError::InvalidConfig("board has no valid hexes".into()));
        }
        if hexes.len() > MAX_BOARD_HEXES {
            return Err(GameError::InvalidConfig(format!(
                "board has {} hexes, at most {} are supported",
                hexes.len(),
                MAX_BOARD_HEXES
            )));
        }

        let index: BTreeMap<HexCoord, usize> =
            hexes.iter().enumerate().map(|(i, h)| (*h, i)).collect();

        let mut cities = Vec::with_capacity(config.cities.len());
        let mut city_at = BTreeMap::new();
        for (i, cfg) in config.cities.iter().enumerate() {
            let location: HexCoord = cfg.location.parse().map_err(|e| {
                GameError::InvalidConfig(format!("city {}: {}", cfg.name, e))
            })?;
            if !index.contains_key(&location) {
                return Err(GameError::InvalidConfig(format!(
                    "city {} at {} is off the board",
                    cfg.name, location
                )));
            }
            if city_at.insert(location, i).is_some() {
                return Err(GameError::InvalidConfig(format!(
                    "two cities share hex {}",
                    location
                )));
            }
            cities.push(City {
                id: i as u32,
                name: cfg.name.clone(),
                culture: cfg.culture.clone(),
                location,
                common_good: cfg.common_good.clone(),
                rare_good: cfg.rare_good.clone(),
            });
        }

        let coastal = parse_hex_list(&config.coastal_hexes)
            .into_iter()
            .filter(|h| {
                let valid = index.contains_key(h);
                if !valid {
                    warn!("coastal hex {} is off the board", h);
                }
                valid
            })
            .collect();

        // A hex listed in several regions keeps the last one declared.
        let mut region_of = BTreeMap::new();
        let mut region_names = BTreeMap::new();
        for (i, region) in config.regions.iter().enumerate() {
            let id = i as RegionId;
            region_names.insert(id, region.name.clone());
            for hex in parse_hex_list(&region.hexes) {
                if index.contains_key(&hex) {
                    region_of.insert(hex, id);
                } else {
                    warn!("region {} lists off-board hex {}", region.name, hex);
                }
            }
        }

        let lookup = |names: &[String]| -> BTreeSet<u32> {
            names
                .iter()
                .filter_map(|name| {
                    let found = cities.iter().find(|c| &c.name == name).map(|c| c.id);
                    if found.is_none() {
                        warn!("unknown city name {:?}", name);
                    }
                    found
                })
                .collect()
        };
        let capitals = lookup(&config.capitals);
        let desert_cities = lookup(&config.desert_cities);

        Ok(Self {
            hexes,
            index,
            cities,
            city_at,
            coastal,
            region_of,
            region_names,
            capitals,
            desert_cities,
        })
    }

    /// A bare regular board with no cities, coast or regions
    pub fn regular(radius: u32) -> Result<Self, GameError> {
        Self::from_config(&BoardConfig {
            radius,
            valid_hexes: None,
            cities: Vec::new(),
            coastal_hexes: String::new(),
            regions: Vec::new(),
            capitals: Vec::new(),
            desert_cities: Vec::new(),
        })
    }

    /// All valid hexes, sorted
    pub fn hexes(&self) -> &[HexCoord] {
        &self.hexes
    }

    pub fn len(&self) -> usize {
        self.hexes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hexes.is_empty()
    }

    pub fn is_valid(&self, hex: &HexCoord) -> bool {
        self.index.contains_key(hex)
    }

    /// Dense index of a hex
    pub fn index_of(&self, hex: &HexCoord) -> Option<usize> {
        self.index.get(hex).copied()
    }

    /// Hex at a dense index
    pub fn hex_at(&self, index: usize) -> Option<HexCoord> {
        self.hexes.get(index).copied()
    }

    /// Valid neighbors of a hex, in direction order
    pub fn neighbors(&self, hex: &HexCoord) -> impl Iterator<Item = HexCoord> + '_ {
        hex.neighbors()
            .into_iter()
            .filter(move |n| self.index.contains_key(n))
    }

    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn city(&self, id: u32) -> Option<&City> {
        self.cities.get(id as usize)
    }

    pub fn city_at(&self, hex: &HexCoord) -> Option<&City> {
        self.city_at.get(hex).map(|&i| &self.cities[i])
    }

    pub fn is_city(&self, hex: &HexCoord) -> bool {
        self.city_at.contains_key(hex)
    }

    /// Every city at the minimum distance from a hex, in id order
    pub fn closest_cities(&self, hex: &HexCoord) -> Vec<&City> {
        let Some(nearest) = self.cities.iter().map(|c| c.location.distance_to(hex)).min() else {
            return Vec::new();
        };
        self.cities
            .iter()
            .filter(|c| c.location.distance_to(hex) == nearest)
            .collect()
    }

    /// The city whose rare good has the given name
    pub fn city_for_rare_good(&self, good: &str) -> Option<&City> {
        self.cities.iter().find(|c| c.rare_good == good)
    }

    pub fn is_capital(&self, city: &City) -> bool {
        self.capitals.contains(&city.id)
    }

    pub fn is_desert_city(&self, city: &City) -> bool {
        self.desert_cities.contains(&city.id)
    }

    pub fn coastal_hexes(&self) -> &BTreeSet<HexCoord> {
        &self.coastal
    }

    pub fn is_coastal(&self, hex: &HexCoord) -> bool {
        self.coastal.contains(hex)
    }

    pub fn region_of(&self, hex: &HexCoord) -> Option<RegionId> {
        self.region_of.get(hex).copied()
    }

    pub fn region_name(&self, region: RegionId) -> Option<&str> {
        self.region_names.get(&region).map(String::as_str)
    }

    /// All region ids with their names
    pub fn regions(&self) -> &BTreeMap<RegionId, String> {
        &self.region_names
    }

    /// Convert to a JSON-friendly representation with arrays instead of maps
    pub fn to_json_friendly(&self) -> BoardJson {
        BoardJson {
            hexes: self
                .hexes
                .iter()
                .map(|hex| HexJson {
                    hex: *hex,
                    city: self.city_at.get(hex).map(|&i| i as u32),
                    coastal: self.coastal.contains(hex),
                    region: self.region_of(hex),
                })
                .collect(),
            cities: self.cities.clone(),
            regions: self
                .region_names
                .iter()
                .map(|(id, name)| (*id, name.clone()))
                .collect(),
        }
    }
}

/// JSON-friendly board representation for renderers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardJson {
    pub hexes: Vec<HexJson>,
    pub cities: Vec<City>,
    pub regions: Vec<(RegionId, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HexJson {
    pub hex: HexCoord,
    pub city: Option<u32>,
    pub coastal: bool,
    pub region: Option<RegionId>,
}
