//! Game scheduler
//!
//! Owns the single `RoundEngine` for the life of the process and drives it
//! from one `select!` loop over three independent timers: a high-frequency
//! physics tick, a lower-frequency broadcast tick and a one-second
//! countdown tick. The loop body is the only place engine state mutates,
//! so the three logically concurrent timers never race each other.
//!
//! Payout calls are the only suspending work and they run detached; their
//! results come back over a channel and are applied at the next countdown
//! tick. A payment network outage can cost a round its reward but cannot
//! stall the simulation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};

use shared::{PushEvent, RoundEnded};

use crate::broadcast::Hub;
use crate::holders::HolderSource;
use crate::payout::{PaymentService, PayoutCoordinator, PayoutEvent};
use crate::round::{CountdownOutcome, RoundEngine, RoundFinal, TickOutcome};
use crate::stats::PersistentStats;

pub struct GameScheduler<H, P>
where
    H: HolderSource + Send + 'static,
    P: PaymentService,
{
    engine: RoundEngine,
    holders: H,
    payouts: PayoutCoordinator<P>,
    payout_rx: mpsc::UnboundedReceiver<PayoutEvent>,
    hub: Arc<Hub>,
    stats_path: PathBuf,
}

impl<H, P> GameScheduler<H, P>
where
    H: HolderSource + Send + 'static,
    P: PaymentService,
{
    pub fn new(
        engine: RoundEngine,
        holders: H,
        payouts: PayoutCoordinator<P>,
        payout_rx: mpsc::UnboundedReceiver<PayoutEvent>,
        hub: Arc<Hub>,
        stats_path: PathBuf,
    ) -> Self {
        Self {
            engine,
            holders,
            payouts,
            payout_rx,
            hub,
            stats_path,
        }
    }

    /// Runs the game loop forever.
    pub async fn run(mut self) {
        let config = &self.engine.config;
        let mut physics = interval(Duration::from_secs_f32(1.0 / config.physics_tick_hz as f32));
        let mut broadcast = interval(Duration::from_secs_f32(
            1.0 / config.broadcast_tick_hz as f32,
        ));
        let mut countdown = interval(Duration::from_secs(1));
        physics.set_missed_tick_behavior(MissedTickBehavior::Skip);
        broadcast.set_missed_tick_behavior(MissedTickBehavior::Skip);
        countdown.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Game scheduler running (physics {}Hz, broadcast {}Hz)",
            config.physics_tick_hz, config.broadcast_tick_hz
        );

        loop {
            tokio::select! {
                _ = physics.tick() => self.on_physics_tick().await,
                _ = broadcast.tick() => self.on_broadcast_tick().await,
                _ = countdown.tick() => self.on_countdown_tick().await,
            }
        }
    }

    async fn on_physics_tick(&mut self) {
        match self.engine.tick() {
            Some(TickOutcome::CelebrationStarted { winner }) => {
                info!(
                    "Round #{}: celebrating {} at {}m",
                    self.engine.round, winner.wallet, winner.height_reached
                );
            }
            Some(TickOutcome::RoundFinalized(final_)) => self.handle_round_final(final_).await,
            None => {}
        }
    }

    async fn on_broadcast_tick(&mut self) {
        if self.engine.round_active() {
            self.hub
                .publish(PushEvent::GameState(self.engine.snapshot()))
                .await;
        }
    }

    async fn on_countdown_tick(&mut self) {
        // Apply any payout results that landed since the last second, so
        // claim outcomes are visible before break decisions are made.
        while let Ok(event) = self.payout_rx.try_recv() {
            self.apply_payout_event(event);
        }

        match self.engine.tick_countdown() {
            Some(CountdownOutcome::RoundFinalized(final_)) => {
                self.handle_round_final(final_).await
            }
            Some(CountdownOutcome::ClaimWindow) => {
                self.engine.begin_claim();
                self.payouts.spawn_claim();
            }
            Some(CountdownOutcome::BreakExpired) => self.try_start_round().await,
            None => {}
        }
    }

    async fn handle_round_final(&mut self, final_: RoundFinal) {
        self.persist_stats(self.engine.round + 1);

        self.hub
            .publish(PushEvent::RoundEnded(RoundEnded {
                winner: final_.winner.clone(),
                prize_pool: final_.reward,
                round: final_.round,
            }))
            .await;
        self.hub
            .publish(PushEvent::Winners(self.engine.recent_winners()))
            .await;

        // Fire and forget; a distribution failure is an operational
        // anomaly surfaced in the logs, never a state change.
        self.payouts
            .spawn_distribute(final_.round, final_.winner_address, final_.reward);
    }

    async fn try_start_round(&mut self) {
        let retry = self.engine.config.roster_retry_secs;
        match self.holders.fetch_roster() {
            Ok(roster) if roster.is_empty() => {
                warn!("Holder roster came back empty, retrying in {}s", retry);
                self.engine.delay_next_round(retry);
            }
            Ok(roster) => {
                let reward = self.engine.pending_reward();
                match self.engine.start_round(roster, reward) {
                    Ok(()) => {
                        self.persist_stats(self.engine.round);
                        self.hub
                            .publish(PushEvent::NewRound(self.engine.snapshot()))
                            .await;
                    }
                    Err(e) => warn!("Refused to start round: {}", e),
                }
            }
            Err(e) => {
                warn!("{}, retrying in {}s", e, retry);
                self.engine.delay_next_round(retry);
            }
        }
    }

    fn apply_payout_event(&mut self, event: PayoutEvent) {
        match event {
            PayoutEvent::ClaimFinished(Ok(amount)) => self.engine.claim_succeeded(amount),
            PayoutEvent::ClaimFinished(Err(_)) => self.engine.claim_failed(),
            PayoutEvent::DistributeFinished { round, result } => {
                // The winner record stays as written either way; a failed
                // transfer shows up here and nowhere else.
                if let Err(e) = result {
                    warn!("Round #{} payout anomaly: {}", round, e);
                }
            }
        }
    }

    fn persist_stats(&self, current_round: u64) {
        let stats = PersistentStats {
            current_round,
            total_distributed: self.engine.total_distributed,
            winners: self.engine.winners.iter().cloned().collect(),
        };
        stats.save(&self.stats_path);
    }
}
