// SPDX-License-Identifier: MIT OR Apache-2.0
//! Cueline player - plays a saved trigger sequence without a UI.
//!
//! Every trigger is bound to a logging template, so on/update/off events
//! show up in the log as the wall-clock play-head passes them.
//!
//! Usage: `cueline_player [config.ron]`

mod config;
mod error;

use config::{PlayerConfig, DEFAULT_CONFIG_PATH, DEFAULT_LOG_FILTER};
use cueline_timeline::persist::read_record;
use cueline_timeline::{ClockTransport, InteractionEngine, Timeline, TimelineSession, Transport, TriggerSequence};
use error::PlayerError;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn init_tracing(filter: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run(config: &PlayerConfig) -> Result<(), PlayerError> {
    let record = read_record(&config.sequence)?;
    let registry = config.registry_for(&record);
    let sequence = TriggerSequence::from_record(&record, &registry)?;
    tracing::info!(
        "Loaded {} ({:.1}s, {} lines, {} triggers)",
        config.sequence.display(),
        sequence.duration(),
        sequence.lines().len(),
        sequence.lines().iter().map(|line| line.triggers().len()).sum::<usize>()
    );

    let transport = Arc::new(ClockTransport::new(sequence.duration()).with_speed(config.speed));
    let timeline = Timeline::new(sequence, InteractionEngine::default());
    let mut session = TimelineSession::new(timeline, registry, transport.clone());

    session.seek(config.start_time);
    session.start_ticker(config.ticker())?;
    session.play();

    while transport.is_playing() {
        std::thread::sleep(config.ticker().period);
    }

    session.stop_ticker();
    session.pause();
    tracing::info!("Playback finished at {:.3}s", transport.position());
    Ok(())
}

fn main() {
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    let config = match PlayerConfig::load_or_default(&path) {
        Ok(config) => config,
        Err(e) => {
            init_tracing(DEFAULT_LOG_FILTER);
            tracing::error!("Failed to read {}: {e}", path.display());
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_filter);
    tracing::info!("Starting cueline player v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(&config) {
        tracing::error!("Player stopped: {e}");
        std::process::exit(1);
    }
}
