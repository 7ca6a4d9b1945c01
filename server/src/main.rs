use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use server::broadcast::Hub;
use server::config::GameConfig;
use server::holders::MockHolderSource;
use server::payout::{MockPaymentService, PayoutCoordinator};
use server::round::RoundEngine;
use server::scheduler::GameScheduler;
use server::stats::PersistentStats;

/// Main-method of the application.
/// Parses command-line arguments, wires the engine to its collaborators and
/// runs the game loop until interrupted.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    // Command line arguments
    #[derive(Parser, Debug)]
    #[clap(author, version, about)]
    struct Args {
        /// Physics tick rate (updates per second)
        #[clap(short, long, default_value = "60")]
        tick_rate: u32,
        /// Round duration in seconds
        #[clap(short, long, default_value = "30")]
        round_duration: u32,
        /// Path of the persistent stats file
        #[clap(short, long, default_value = "firework-stats.json")]
        stats: PathBuf,
        /// Observer event channel capacity
        #[clap(long, default_value = "64")]
        channel_capacity: usize,
    }

    let args = Args::parse();

    let config = GameConfig {
        physics_tick_hz: args.tick_rate,
        round_duration_secs: args.round_duration,
        ..GameConfig::default()
    };

    // Durable state is loaded exactly once; everything after this point
    // flows through the scheduler.
    let stats = PersistentStats::load(&args.stats, config.initial_round);
    let engine = RoundEngine::new(config.clone(), &stats);
    let hub = Arc::new(Hub::new(args.channel_capacity));

    let (payout_tx, payout_rx) = mpsc::unbounded_channel();
    let payouts = PayoutCoordinator::new(MockPaymentService::new(), payout_tx);
    let holders = MockHolderSource::new(config.min_racers, config.max_racers);

    let scheduler = GameScheduler::new(
        engine,
        holders,
        payouts,
        payout_rx,
        Arc::clone(&hub),
        args.stats,
    );

    let game_handle = tokio::spawn(scheduler.run());

    // Handle shutdown gracefully
    tokio::select! {
        result = game_handle => {
            if let Err(e) = result {
                eprintln!("Game loop task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
