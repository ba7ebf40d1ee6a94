//! Mali-Ba - a hex-grid trade route strategy game engine
//!
//! This crate provides the core rules engine for Mali-Ba, including:
//! - Cube coordinates and the static board (cities, coast, regions)
//! - Compact integer action ids and their structured moves
//! - Legal move generation, including mancala token movement
//! - Trade route discovery and validation
//! - The game state machine with undo, shaped rewards and end detection
//! - Final scoring, state documents and simple bots
//!
//! # Architecture
//!
//! The engine is platform-agnostic and performs no I/O. It can be compiled to:
//! - Native Rust for self-play and training harnesses
//! - WebAssembly for browser play (feature `wasm`)
//!
//! # Modules
//!
//! - [`hex`]: Cube coordinate system
//! - [`board`]: Board model and its configuration
//! - [`config`]: Rules, scoring and reward parameters
//! - [`codec`]: Action id encoding and decoding
//! - [`movegen`]: Legal move generation
//! - [`routes`]: Trade route engine
//! - [`game`]: Game state machine
//! - [`scoring`]: Final scores and returns

pub mod actions;
pub mod board;
pub mod bot;
pub mod codec;
pub mod config;
pub mod game;
pub mod hex;
pub mod movegen;
pub mod persistence;
pub mod player;
pub mod routes;
pub mod scoring;
#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use actions::{IncomePlan, IncomeProfile, Move, RouteId};
pub use board::{Board, BoardConfig, City, PlayerId, RegionId};
pub use bot::{ActionWeigher, Bot, BotDifficulty, HeuristicWeights, WeightContext};
pub use codec::{action_to_string, decode, encode, parse_action, ActionId};
pub use config::{GameConfig, IncomeRules, RewardConfig, RulesConfig, ScoringConfig};
pub use game::{EndReason, EntityKind, GameError, GamePhase, GameState, HistoryEntry};
pub use hex::{HexCoord, HexError};
pub use movegen::{LegalMoves, MoveCounts};
pub use persistence::GameStateJson;
pub use player::{Goods, MeepleColor, Player, PlayerColor, PlayerType};
pub use routes::{RouteRejection, TradeRoute};
pub use scoring::ScoreBreakdown;
