//! Mali-Ba self-play harness.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod runner;
mod settings;
mod transcript;

use runner::MatchRunner;
use transcript::TranscriptWriter;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let settings = settings::load_settings();
    info!(
        games = settings.games,
        seed = settings.game.seed,
        players = ?settings.game.players,
        "Starting Mali-Ba self-play..."
    );

    let out: Box<dyn Write> = match &settings.transcript {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };
    let mut transcript = TranscriptWriter::new(BufWriter::new(out));

    let runner = MatchRunner::new(settings)?;
    runner.run_all(&mut transcript)?;
    Ok(())
}
