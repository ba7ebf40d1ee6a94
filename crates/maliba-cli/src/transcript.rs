//! JSON-lines transcript records for self-play games.

use maliba_core::{ActionId, EndReason, PlayerId, PlayerType, ScoreBreakdown};
use serde::{Deserialize, Serialize};
use std::io::Write;

/// One transcript line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum TranscriptEvent {
    /// A game was created
    GameStarted {
        game: u32,
        seed: u64,
        players: Vec<PlayerType>,
    },

    /// An action was applied
    MoveApplied {
        game: u32,
        ply: u32,
        player: PlayerId,
        action: ActionId,
        description: String,
    },

    /// The game ended
    GameFinished {
        game: u32,
        moves: u32,
        reason: Option<EndReason>,
        returns: Vec<f64>,
        scores: Vec<ScoreBreakdown>,
    },
}

/// Writes one JSON object per line
pub struct TranscriptWriter<W: Write> {
    out: W,
}

impl<W: Write> TranscriptWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn record(&mut self, event: &TranscriptEvent) -> Result<(), crate::runner::RunnerError> {
        serde_json::to_writer(&mut self.out, event)?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}
