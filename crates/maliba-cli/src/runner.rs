//! Seeded self-play matches between bots.

use maliba_core::scoring::score_all;
use maliba_core::{
    action_to_string, Bot, EndReason, GameConfig, GameError, GameState, PlayerId,
};
use std::io::Write;
use thiserror::Error;
use tracing::{debug, info};

use crate::settings::Settings;
use crate::transcript::{TranscriptEvent, TranscriptWriter};

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("Game error: {0}")]
    Game(#[from] GameError),

    #[error("No action available for player {0}")]
    NoAction(PlayerId),

    #[error("Transcript write failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Transcript encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Outcome of one finished game
#[derive(Debug, Clone, PartialEq)]
pub struct MatchSummary {
    pub game: u32,
    pub seed: u64,
    pub moves: u32,
    pub reason: Option<EndReason>,
    pub returns: Vec<f64>,
}

impl MatchSummary {
    /// The seat with the win return, if any
    pub fn winner(&self) -> Option<PlayerId> {
        let best = self.returns.iter().copied().fold(f64::MIN, f64::max);
        let leaders: Vec<usize> = (0..self.returns.len())
            .filter(|&i| self.returns[i] == best)
            .collect();
        (best > 0.0 && leaders.len() == 1).then(|| leaders[0] as PlayerId)
    }
}

/// Plays the configured number of games, one seat per bot
pub struct MatchRunner {
    settings: Settings,
}

impl MatchRunner {
    pub fn new(settings: Settings) -> Result<Self, RunnerError> {
        settings.game.validate()?;
        Ok(Self { settings })
    }

    /// Configuration for game `index`: the base seed advanced by the index
    fn game_config(&self, index: u32) -> GameConfig {
        GameConfig {
            seed: self.settings.game.seed.wrapping_add(index as u64),
            ..self.settings.game.clone()
        }
    }

    fn seat_bots(&self, game: &GameState) -> Vec<Bot> {
        (0..self.settings.game.players.len())
            .map(|seat| {
                Bot::for_game(seat as PlayerId, self.settings.difficulty(seat), game)
                    .with_weigher(self.settings.weights.clone())
            })
            .collect()
    }

    /// Play one game to the end, recording every move
    pub fn run_match<W: Write>(
        &self,
        index: u32,
        transcript: &mut TranscriptWriter<W>,
    ) -> Result<MatchSummary, RunnerError> {
        let config = self.game_config(index);
        let seed = config.seed;
        let players = config.players.clone();
        let mut game = GameState::new(config)?;
        let mut bots = self.seat_bots(&game);

        transcript.record(&TranscriptEvent::GameStarted {
            game: index,
            seed,
            players,
        })?;

        while !game.is_terminal() {
            let player = game.current_player();
            let action = bots[player as usize]
                .choose_action(&game)
                .ok_or(RunnerError::NoAction(player))?;
            let description = action_to_string(&game, action);
            game.apply_action(action)?;
            transcript.record(&TranscriptEvent::MoveApplied {
                game: index,
                ply: game.move_count(),
                player,
                action,
                description,
            })?;
        }

        let summary = MatchSummary {
            game: index,
            seed,
            moves: game.move_count(),
            reason: game.end_reason(),
            returns: game.returns(),
        };
        transcript.record(&TranscriptEvent::GameFinished {
            game: index,
            moves: summary.moves,
            reason: summary.reason,
            returns: summary.returns.clone(),
            scores: score_all(&game),
        })?;
        debug!(game = index, moves = summary.moves, reason = ?summary.reason, "match finished");
        Ok(summary)
    }

    /// Play every configured game and log the aggregate result
    pub fn run_all<W: Write>(
        &self,
        transcript: &mut TranscriptWriter<W>,
    ) -> Result<Vec<MatchSummary>, RunnerError> {
        let mut summaries = Vec::with_capacity(self.settings.games as usize);
        for index in 0..self.settings.games {
            summaries.push(self.run_match(index, transcript)?);
        }
        transcript.flush()?;

        let seats = self.settings.game.players.len();
        let mut wins = vec![0u32; seats];
        let mut undecided = 0;
        for summary in &summaries {
            match summary.winner() {
                Some(p) => wins[p as usize] += 1,
                None => undecided += 1,
            }
        }
        let total_moves: u32 = summaries.iter().map(|s| s.moves).sum();
        info!(
            games = summaries.len(),
            ?wins,
            undecided,
            mean_moves = total_moves as f64 / summaries.len().max(1) as f64,
            "self-play finished"
        );
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use maliba_core::{BotDifficulty, PlayerType};

    fn settings(games: u32) -> Settings {
        let mut settings = Settings::default();
        settings.games = games;
        settings.game.seed = 17;
        settings.game.rules.max_moves = 120;
        settings.game.players = vec![PlayerType::Heuristic, PlayerType::Random];
        settings.difficulties = vec![BotDifficulty::Hard];
        settings
    }

    #[test]
    fn test_match_runs_to_completion() {
        let runner = MatchRunner::new(settings(1)).unwrap();
        let mut transcript = TranscriptWriter::new(Vec::new());
        let summary = runner.run_match(0, &mut transcript).unwrap();
        assert!(summary.moves <= 120);
        assert_eq!(summary.returns.len(), 2);

        let text = String::from_utf8(transcript.into_inner()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len() as u32, summary.moves + 2);
        assert!(lines[0].contains("game_started"));
        assert!(lines[lines.len() - 1].contains("game_finished"));
    }

    #[test]
    fn test_matches_are_reproducible() {
        let runner = MatchRunner::new(settings(2)).unwrap();
        let mut first = TranscriptWriter::new(Vec::new());
        let mut second = TranscriptWriter::new(Vec::new());
        let a = runner.run_all(&mut first).unwrap();
        let b = runner.run_all(&mut second).unwrap();
        assert_eq!(a, b);
        assert_eq!(first.into_inner(), second.into_inner());
        assert_eq!(a[1].seed, 18);
    }

    #[test]
    fn test_invalid_game_config_rejected() {
        let mut bad = settings(1);
        bad.game.players = vec![PlayerType::Random];
        assert!(matches!(
            MatchRunner::new(bad),
            Err(RunnerError::Game(GameError::InvalidConfig(_)))
        ));
    }

    #[test]
    fn test_winner() {
        let summary = MatchSummary {
            game: 0,
            seed: 0,
            moves: 10,
            reason: None,
            returns: vec![-1.0, 1.0, -1.0],
        };
        assert_eq!(summary.winner(), Some(1));
        let drawn = MatchSummary {
            returns: vec![0.0, 0.0],
            ..summary
        };
        assert_eq!(drawn.winner(), None);
    }
}
