//! Player state and goods management.
//!
//! This module contains:
//! - Player struct with goods inventories and trading-post supply
//! - Goods, a named multiset used for both common and rare goods
//! - Player and meeple colors

use crate::board::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Player color, assigned by seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerColor {
    Black,
    White,
    Red,
    Blue,
}

impl PlayerColor {
    /// Get color for a player index
    pub fn for_player(id: PlayerId) -> Self {
        match id % 4 {
            0 => PlayerColor::Black,
            1 => PlayerColor::White,
            2 => PlayerColor::Red,
            _ => PlayerColor::Blue,
        }
    }
}

/// Who controls a seat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerType {
    /// Moves come from outside; Pass is offered
    Human,
    /// Automated, picks by heuristic weight
    Heuristic,
    /// Automated, picks uniformly
    Random,
}

impl PlayerType {
    pub fn is_human(&self) -> bool {
        matches!(self, PlayerType::Human)
    }
}

/// Meeple colors on the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeepleColor {
    Yellow,
    White,
    Blue,
    Red,
    Green,
}

impl MeepleColor {
    pub const ALL: [MeepleColor; 5] = [
        MeepleColor::Yellow,
        MeepleColor::White,
        MeepleColor::Blue,
        MeepleColor::Red,
        MeepleColor::Green,
    ];
}

/// A multiset of named goods
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Goods(BTreeMap<String, u32>);

impl Goods {
    /// Create an empty inventory
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an inventory holding `amount` of a single good
    pub fn single(good: &str, amount: u32) -> Self {
        let mut goods = Self::new();
        goods.add(good, amount);
        goods
    }

    pub fn count(&self, good: &str) -> u32 {
        self.0.get(good).copied().unwrap_or(0)
    }

    /// Total number of units
    pub fn total(&self) -> u32 {
        self.0.values().sum()
    }

    /// Number of distinct good types held
    pub fn distinct(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, good: &str) -> bool {
        self.0.contains_key(good)
    }

    pub fn add(&mut self, good: &str, amount: u32) {
        if amount > 0 {
            *self.0.entry(good.to_string()).or_insert(0) += amount;
        }
    }

    /// Add another inventory to this one
    pub fn add_all(&mut self, other: &Goods) {
        for (good, count) in other.iter() {
            self.add(good, count);
        }
    }

    /// Remove goods (panics if insufficient)
    pub fn remove(&mut self, good: &str, amount: u32) {
        let held = self.count(good);
        assert!(
            held >= amount,
            "Cannot pay {} {}: only {} held",
            amount,
            good,
            held
        );
        if held == amount {
            self.0.remove(good);
        } else if let Some(count) = self.0.get_mut(good) {
            *count -= amount;
        }
    }

    /// The good with the largest pile; ties go to the lexicographically
    /// smallest name
    pub fn largest(&self) -> Option<&str> {
        self.0
            .iter()
            .max_by(|(a_name, a), (b_name, b)| a.cmp(b).then_with(|| b_name.cmp(a_name)))
            .map(|(name, _)| name.as_str())
    }

    /// Remove `amount` units, always from the current largest pile.
    ///
    /// Returns what was taken, or `None` (leaving `self` untouched) when
    /// fewer than `amount` units are held.
    pub fn take_largest(&mut self, amount: u32) -> Option<Goods> {
        if self.total() < amount {
            return None;
        }
        let mut taken = Goods::new();
        for _ in 0..amount {
            let good = self.largest()?.to_string();
            self.remove(&good, 1);
            taken.add(&good, 1);
        }
        Some(taken)
    }

    /// Iterate `(name, count)` in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.0.iter().map(|(name, count)| (name.as_str(), *count))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.0.keys().map(String::as_str)
    }
}

/// Formats as `Salt:2,Gold:1`; empty inventories print as `-`.
impl fmt::Display for Goods {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "-");
        }
        let parts: Vec<String> = self
            .iter()
            .map(|(name, count)| format!("{}:{}", name, count))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

impl std::str::FromStr for Goods {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut goods = Goods::new();
        if s == "-" || s.is_empty() {
            return Ok(goods);
        }
        for part in s.split(',') {
            let (name, count) = part
                .rsplit_once(':')
                .ok_or_else(|| format!("bad goods entry {:?}", part))?;
            let count: u32 = count
                .trim()
                .parse()
                .map_err(|_| format!("bad goods count {:?}", part))?;
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("empty good name in {:?}", part));
            }
            goods.add(name, count);
        }
        Ok(goods)
    }
}

/// A single player's state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Player ID (0-3)
    pub id: PlayerId,
    pub color: PlayerColor,
    pub kind: PlayerType,
    pub common_goods: Goods,
    pub rare_goods: Goods,
    /// Trading posts left to place; `None` is unlimited
    pub post_supply: Option<u32>,
}

impl Player {
    /// Create a new player
    pub fn new(id: PlayerId, kind: PlayerType, post_supply: Option<u32>) -> Self {
        Self {
            id,
            color: PlayerColor::for_player(id),
            kind,
            common_goods: Goods::new(),
            rare_goods: Goods::new(),
            post_supply,
        }
    }

    pub fn has_post_supply(&self) -> bool {
        self.post_supply.map_or(true, |n| n > 0)
    }

    /// Take one post from supply (panics if none are left)
    pub fn take_post(&mut self) {
        if let Some(n) = self.post_supply.as_mut() {
            assert!(*n > 0, "Player {} has no trading posts left", self.id);
            *n -= 1;
        }
    }

    /// Return one post to supply
    pub fn return_post(&mut self) {
        if let Some(n) = self.post_supply.as_mut() {
            *n += 1;
        }
    }

    /// Whether the player holds any good that can pay for a placement
    pub fn has_spendable_good(&self) -> bool {
        !self.common_goods.is_empty() || !self.rare_goods.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_goods_add_and_remove() {
        let mut goods = Goods::new();
        goods.add("Salt", 2);
        goods.add("Gold", 1);
        goods.add("Salt", 1);
        goods.add("Fish", 0);

        assert_eq!(goods.count("Salt"), 3);
        assert_eq!(goods.total(), 4);
        assert_eq!(goods.distinct(), 2);
        assert!(!goods.contains("Fish"));

        goods.remove("Gold", 1);
        assert!(!goods.contains("Gold"));
        assert_eq!(goods.distinct(), 1);
    }

    #[test]
    #[should_panic(expected = "Cannot pay")]
    fn test_goods_remove_insufficient_panics() {
        let mut goods = Goods::single("Salt", 1);
        goods.remove("Salt", 2);
    }

    #[test]
    fn test_largest_breaks_ties_by_name() {
        let mut goods = Goods::new();
        goods.add("Millet", 2);
        goods.add("Dates", 2);
        goods.add("Fish", 1);
        assert_eq!(goods.largest(), Some("Dates"));
    }

    #[test]
    fn test_take_largest() {
        let mut goods = Goods::new();
        goods.add("Cattle", 3);
        goods.add("Salt", 1);

        let taken = goods.take_largest(3).unwrap();
        assert_eq!(taken, Goods::single("Cattle", 3));
        assert_eq!(goods, Goods::single("Salt", 1));

        assert_eq!(goods.take_largest(2), None);
        assert_eq!(goods.total(), 1);
    }

    #[test]
    fn test_take_largest_spreads_across_piles() {
        let mut goods = Goods::new();
        goods.add("Salt", 2);
        goods.add("Fish", 2);

        let taken = goods.take_largest(3).unwrap();
        assert_eq!(taken.total(), 3);
        assert_eq!(goods.total(), 1);
    }

    #[test]
    fn test_goods_text_form() {
        let mut goods = Goods::new();
        goods.add("Salt", 2);
        goods.add("Mud cloth", 1);
        let text = goods.to_string();
        assert_eq!(text, "Mud cloth:1,Salt:2");
        assert_eq!(text.parse::<Goods>().unwrap(), goods);
        assert_eq!("-".parse::<Goods>().unwrap(), Goods::new());
        assert!("Salt".parse::<Goods>().is_err());
    }

    #[test]
    fn test_post_supply() {
        let mut player = Player::new(0, PlayerType::Heuristic, Some(1));
        assert!(player.has_post_supply());
        player.take_post();
        assert!(!player.has_post_supply());
        player.return_post();
        assert_eq!(player.post_supply, Some(1));

        let mut unlimited = Player::new(1, PlayerType::Human, None);
        unlimited.take_post();
        assert!(unlimited.has_post_supply());
    }

    #[test]
    fn test_player_colors() {
        assert_eq!(PlayerColor::for_player(0), PlayerColor::Black);
        assert_eq!(PlayerColor::for_player(3), PlayerColor::Blue);
    }
}
