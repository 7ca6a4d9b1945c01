//! Round engine - the round lifecycle state machine
//!
//! Owns one round's racer set, advances physics each tick, evaluates win
//! conditions and drives phase transitions. The engine performs no IO and
//! owns no timers: the scheduler calls `tick`/`tick_countdown` and acts on
//! the typed outcomes they return.
//!
//! Phase machine: `Racing -> Celebrating -> Ended -> (next round) Racing`.
//! A round that ends by countdown expiry goes straight to `Ended`.

use std::collections::VecDeque;
use std::error::Error;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use log::{info, warn};
use shared::{ClaimStatus, GameSnapshot, Phase, RacerView, WinnerEntry};

use crate::config::GameConfig;
use crate::holders::Holder;
use crate::racer::Racer;
use crate::stats::PersistentStats;

/// Transition surfaced by a physics tick.
#[derive(Debug)]
pub enum TickOutcome {
    /// A winner was just declared; the engine entered `Celebrating`.
    CelebrationStarted { winner: RacerView },
    /// The round is over and `Ended` was entered.
    RoundFinalized(RoundFinal),
}

/// Transition surfaced by a countdown tick.
#[derive(Debug)]
pub enum CountdownOutcome {
    /// The round countdown hit zero; the round was force-ended.
    RoundFinalized(RoundFinal),
    /// The break is `claim_lead_secs` from expiring; time to claim fees.
    ClaimWindow,
    /// The break expired; the next round should start.
    BreakExpired,
}

/// Everything the scheduler needs once a round has finalized: the payout
/// target, the reward, and the history record already appended.
#[derive(Debug, Clone)]
pub struct RoundFinal {
    pub round: u64,
    pub winner: RacerView,
    pub winner_address: String,
    pub reward: f64,
    pub record: WinnerEntry,
}

/// `start_round` refusal. The engine's prior state is left intact.
#[derive(Debug, PartialEq, Eq)]
pub enum StartRoundError {
    EmptyRoster,
    RoundInProgress,
}

impl fmt::Display for StartRoundError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StartRoundError::EmptyRoster => write!(f, "cannot start a round with no participants"),
            StartRoundError::RoundInProgress => write!(f, "a round is already in progress"),
        }
    }
}

impl Error for StartRoundError {}

/// The authoritative round state machine.
///
/// Constructed once at startup from persisted stats and mutated only by the
/// scheduler's callbacks.
pub struct RoundEngine {
    pub config: GameConfig,
    pub phase: Phase,
    /// Number of the round in progress or just ended. Monotonic, persists
    /// across restarts.
    pub round: u64,
    pub time_remaining: u32,
    pub prize_pool: f64,
    pub total_distributed: f64,
    pub racers: Vec<Racer>,
    /// Id of the declared winner. Set exactly once per round.
    pub winner: Option<u32>,
    pub camera_y: f32,
    pub claim_status: ClaimStatus,
    /// Bounded winner history, newest first.
    pub winners: VecDeque<WinnerEntry>,
    /// Reward claimed for the upcoming round; zero after a failed claim.
    pending_reward: f64,
    /// Physics ticks since round start; elapsed time derives from this so
    /// the simulation is deterministic under test.
    tick_count: u64,
    celebration_start_tick: u64,
    break_remaining: u32,
    started_count: usize,
    first_round: bool,
}

impl RoundEngine {
    /// Builds the engine in its between-rounds state, resuming the round
    /// counter and lifetime totals from persisted stats.
    pub fn new(config: GameConfig, stats: &PersistentStats) -> Self {
        let break_remaining = config.break_secs;
        Self {
            phase: Phase::Ended,
            round: stats.current_round,
            time_remaining: 0,
            prize_pool: 0.0,
            total_distributed: stats.total_distributed,
            racers: Vec::new(),
            winner: None,
            camera_y: 0.0,
            claim_status: ClaimStatus::Idle,
            winners: stats.winners.iter().cloned().collect(),
            pending_reward: 0.0,
            tick_count: 0,
            celebration_start_tick: 0,
            break_remaining,
            started_count: 0,
            first_round: true,
            config,
        }
    }

    /// Starts the next round from the given roster.
    ///
    /// Refuses on an empty roster or while a round is still in flight; in
    /// both cases the prior state is untouched. Rosters above the
    /// configured ceiling are down-sampled uniformly without replacement,
    /// keeping the survivors in roster order.
    pub fn start_round(&mut self, roster: Vec<Holder>, reward: f64) -> Result<(), StartRoundError> {
        if self.phase != Phase::Ended {
            return Err(StartRoundError::RoundInProgress);
        }
        if roster.is_empty() {
            return Err(StartRoundError::EmptyRoster);
        }

        if self.first_round {
            self.first_round = false;
        } else {
            self.round += 1;
        }

        let roster = if roster.len() > self.config.max_racers {
            let mut rng = rand::thread_rng();
            let mut keep =
                rand::seq::index::sample(&mut rng, roster.len(), self.config.max_racers).into_vec();
            keep.sort_unstable();
            keep.into_iter().map(|i| roster[i].clone()).collect()
        } else {
            roster
        };

        let total_lanes = roster.len();
        self.racers = roster
            .iter()
            .enumerate()
            .map(|(lane, holder)| Racer::new(lane as u32, holder, lane, total_lanes, &self.config))
            .collect();
        self.started_count = self.racers.len();
        self.winner = None;
        self.prize_pool = reward;
        self.time_remaining = self.config.round_duration_secs;
        self.tick_count = 0;
        self.camera_y = 0.0;
        self.phase = Phase::Racing;

        info!(
            "Round #{} started with {} racers (prize {})",
            self.round, self.started_count, self.prize_pool
        );
        Ok(())
    }

    /// Advances one physics tick. No-op unless a round is active.
    pub fn tick(&mut self) -> Option<TickOutcome> {
        match self.phase {
            Phase::Racing => self.tick_racing(),
            Phase::Celebrating => self.tick_celebrating(),
            Phase::Ended => None,
        }
    }

    fn tick_racing(&mut self) -> Option<TickOutcome> {
        self.tick_count += 1;
        let elapsed = self.tick_count as f32 / self.config.physics_tick_hz as f32;

        for racer in &mut self.racers {
            racer.advance(elapsed, &self.config);
        }

        if let Some(leader_height) = self.leader().map(|r| r.height) {
            self.camera_y += (leader_height - self.camera_y) * self.config.camera_follow_factor;
        }

        // Win conditions, in precedence order. Finish line first: crossing
        // it ends the round no matter what else happened this tick.
        if let Some(idx) = self
            .racers
            .iter()
            .position(|r| !r.exploded && r.height_m() >= self.config.finish_line_m)
        {
            return Some(self.begin_celebration(idx));
        }

        let active: Vec<usize> = self
            .racers
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.exploded)
            .map(|(i, _)| i)
            .collect();

        match active.as_slice() {
            [idx] => {
                // Sole survivor. With a one-entry roster the trigger waits
                // for the racer's first actual advance so the round is
                // visible at all.
                let idx = *idx;
                if self.started_count > 1 || self.racers[idx].height > 0.0 {
                    return Some(self.begin_celebration(idx));
                }
                None
            }
            [] if !self.racers.is_empty() => {
                // Everyone detonated on the same tick. Highest climb wins.
                Some(TickOutcome::RoundFinalized(self.end_with_highest()))
            }
            _ => None,
        }
    }

    fn tick_celebrating(&mut self) -> Option<TickOutcome> {
        self.tick_count += 1;
        let elapsed = self.tick_count as f32 / self.config.physics_tick_hz as f32;

        let idx = match self.winner_index() {
            Some(idx) => idx,
            None => {
                warn!("celebrating with no declared winner; ending round");
                self.phase = Phase::Ended;
                self.break_remaining = self.config.break_secs;
                return None;
            }
        };

        // Only the winner keeps climbing; everyone else is already out.
        self.racers[idx].advance(elapsed, &self.config);
        let target = self.racers[idx].height;
        self.camera_y += (target - self.camera_y) * self.config.camera_celebrate_factor;

        let grace_ticks = (self.config.celebration_secs * self.config.physics_tick_hz) as u64;
        if self.tick_count - self.celebration_start_tick >= grace_ticks {
            return Some(TickOutcome::RoundFinalized(self.finalize_round(idx)));
        }
        None
    }

    /// One-second countdown tick: the round clock while racing, the break
    /// clock between rounds.
    pub fn tick_countdown(&mut self) -> Option<CountdownOutcome> {
        match self.phase {
            Phase::Racing => {
                if self.time_remaining > 0 {
                    self.time_remaining -= 1;
                }
                if self.time_remaining == 0 {
                    info!("Round #{} countdown expired", self.round);
                    Some(CountdownOutcome::RoundFinalized(self.end_with_highest()))
                } else {
                    None
                }
            }
            // The round clock is suspended during the celebration grace.
            Phase::Celebrating => None,
            Phase::Ended => {
                if self.break_remaining > 0 {
                    self.break_remaining -= 1;
                }
                if self.break_remaining == self.config.claim_lead_secs && self.break_remaining > 0 {
                    Some(CountdownOutcome::ClaimWindow)
                } else if self.break_remaining == 0 {
                    Some(CountdownOutcome::BreakExpired)
                } else {
                    None
                }
            }
        }
    }

    /// Pushes the next round start out by `secs`. Used when the roster is
    /// unavailable so the scheduler retries instead of spinning.
    pub fn delay_next_round(&mut self, secs: u32) {
        self.break_remaining = secs;
    }

    /// Marks the pre-round fee claim as in flight.
    pub fn begin_claim(&mut self) {
        self.claim_status = ClaimStatus::Claiming;
        self.pending_reward = 0.0;
    }

    /// Applies a successful claim; the amount becomes the next round's
    /// reward.
    pub fn claim_succeeded(&mut self, amount: f64) {
        self.claim_status = ClaimStatus::Claimed;
        self.pending_reward = amount;
    }

    /// Applies a failed claim; the next round runs with a zero reward.
    pub fn claim_failed(&mut self) {
        self.claim_status = ClaimStatus::Failed;
        self.pending_reward = 0.0;
    }

    /// Reward claimed for the upcoming round.
    pub fn pending_reward(&self) -> f64 {
        self.pending_reward
    }

    /// True while physics and broadcasting should run.
    pub fn round_active(&self) -> bool {
        matches!(self.phase, Phase::Racing | Phase::Celebrating)
    }

    /// Non-exploded racer with the greatest height-progress; camera target.
    /// Ties resolve to the earliest roster position.
    pub fn leader(&self) -> Option<&Racer> {
        let mut leader: Option<&Racer> = None;
        for racer in self.racers.iter().filter(|r| !r.exploded) {
            match leader {
                Some(best) if racer.height <= best.height => {}
                _ => leader = Some(racer),
            }
        }
        leader
    }

    /// Full authoritative snapshot for broadcast.
    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            current_round: self.round,
            time_remaining: self.time_remaining,
            prize_pool: self.prize_pool,
            total_distributed: self.total_distributed,
            fireworks: self.racers.iter().map(Racer::snapshot).collect(),
            winner: self.winner_index().map(|idx| self.racers[idx].snapshot()),
            phase: self.phase,
            winners: self
                .winners
                .iter()
                .take(self.config.winner_broadcast_cap)
                .cloned()
                .collect(),
            camera_y: self.camera_y,
            claim_status: self.claim_status,
        }
    }

    /// Winner history limited to the broadcast cap.
    pub fn recent_winners(&self) -> Vec<WinnerEntry> {
        self.winners
            .iter()
            .take(self.config.winner_broadcast_cap)
            .cloned()
            .collect()
    }

    fn winner_index(&self) -> Option<usize> {
        let id = self.winner?;
        self.racers.iter().position(|r| r.id == id)
    }

    /// Declares `idx` the winner. The winner is set exactly once; a second
    /// declaration is an anomaly and is dropped.
    fn declare_winner(&mut self, idx: usize) -> bool {
        if self.winner.is_some() {
            warn!("Round #{}: winner already declared, ignoring", self.round);
            return false;
        }
        self.winner = Some(self.racers[idx].id);
        true
    }

    fn begin_celebration(&mut self, idx: usize) -> TickOutcome {
        self.declare_winner(idx);
        for (i, racer) in self.racers.iter_mut().enumerate() {
            if i != idx {
                racer.force_explode();
            }
        }
        self.phase = Phase::Celebrating;
        self.celebration_start_tick = self.tick_count;

        let winner = self.racers[idx].snapshot();
        info!(
            "Round #{}: {} takes the lead at {}m, celebrating",
            self.round, winner.wallet, winner.height_reached
        );
        TickOutcome::CelebrationStarted { winner }
    }

    /// Countdown-expiry and mass-elimination ending: the greatest height
    /// among all racers wins, exploded or not, ties to the earliest roster
    /// position. Goes straight to `Ended`.
    fn end_with_highest(&mut self) -> RoundFinal {
        let mut best = 0;
        for (i, racer) in self.racers.iter().enumerate().skip(1) {
            if racer.height > self.racers[best].height {
                best = i;
            }
        }
        self.declare_winner(best);
        for racer in &mut self.racers {
            racer.force_explode();
        }
        let idx = self.winner_index().unwrap_or(best);
        self.finalize_round(idx)
    }

    fn finalize_round(&mut self, idx: usize) -> RoundFinal {
        self.racers[idx].force_explode();
        let winner = self.racers[idx].snapshot();
        let winner_address = self.racers[idx].address.clone();

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        let record = WinnerEntry {
            wallet: winner.wallet.clone(),
            round: self.round,
            prize: self.prize_pool,
            height: winner.height_reached,
            timestamp,
        };
        self.winners.push_front(record.clone());
        self.winners.truncate(self.config.winner_history_cap);
        self.total_distributed += self.prize_pool;

        self.phase = Phase::Ended;
        self.break_remaining = self.config.break_secs;

        info!(
            "Round #{} winner: {} ({}m, prize {})",
            self.round, winner.wallet, winner.height_reached, self.prize_pool
        );

        RoundFinal {
            round: self.round,
            reward: self.prize_pool,
            winner,
            winner_address,
            record,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> GameConfig {
        GameConfig {
            base_speed_min: 0.01,
            base_speed_max: 0.01,
            speed_accel: 1.0,
            max_speed: 0.01,
            wobble_amplitude: 0.0,
            max_launch_delay_secs: 0.0,
            round_duration_secs: 30,
            celebration_secs: 1,
            physics_tick_hz: 60,
            ..GameConfig::default()
        }
    }

    fn roster(n: usize) -> Vec<Holder> {
        (0..n)
            .map(|i| Holder::new(&format!("wallet{:02}", i), &format!("address{:02}", i)))
            .collect()
    }

    fn engine_with_round(config: GameConfig, n: usize) -> RoundEngine {
        let stats = PersistentStats::fresh(127);
        let mut engine = RoundEngine::new(config, &stats);
        engine.start_round(roster(n), 1.0).unwrap();
        // Strip the per-racer randomness the scenarios don't want.
        for racer in &mut engine.racers {
            racer.launch_delay_secs = 0.0;
            racer.speed = 0.01;
            racer.max_height_m = 5000.0;
        }
        engine
    }

    #[test]
    fn refuses_empty_roster() {
        let stats = PersistentStats::fresh(127);
        let mut engine = RoundEngine::new(test_config(), &stats);
        assert_eq!(
            engine.start_round(Vec::new(), 1.0),
            Err(StartRoundError::EmptyRoster)
        );
        assert_eq!(engine.phase, Phase::Ended);
        assert_eq!(engine.round, 127);
    }

    #[test]
    fn refuses_start_mid_round() {
        let mut engine = engine_with_round(test_config(), 3);
        let before = engine.racers.len();
        assert_eq!(
            engine.start_round(roster(5), 1.0),
            Err(StartRoundError::RoundInProgress)
        );
        assert_eq!(engine.racers.len(), before);
        assert_eq!(engine.phase, Phase::Racing);
    }

    #[test]
    fn first_round_resumes_saved_number() {
        let stats = PersistentStats::fresh(200);
        let mut engine = RoundEngine::new(test_config(), &stats);
        engine.start_round(roster(3), 0.5).unwrap();
        assert_eq!(engine.round, 200);
    }

    #[test]
    fn round_number_increments_after_first() {
        let mut engine = engine_with_round(test_config(), 3);
        assert_eq!(engine.round, 127);

        // Run the round out via the countdown.
        for _ in 0..engine.config.round_duration_secs {
            engine.tick_countdown();
        }
        assert_eq!(engine.phase, Phase::Ended);

        engine.start_round(roster(3), 0.0).unwrap();
        assert_eq!(engine.round, 128);
    }

    #[test]
    fn oversized_roster_is_sampled_in_order() {
        let config = GameConfig {
            max_racers: 18,
            ..test_config()
        };
        let stats = PersistentStats::fresh(1);
        let mut engine = RoundEngine::new(config, &stats);
        engine.start_round(roster(40), 1.0).unwrap();

        assert_eq!(engine.racers.len(), 18);
        // Survivors keep roster order: their wallet suffixes are ascending.
        let wallets: Vec<&str> = engine.racers.iter().map(|r| r.wallet.as_str()).collect();
        let mut sorted = wallets.clone();
        sorted.sort();
        assert_eq!(wallets, sorted);
        // Ids are reassigned densely.
        for (i, racer) in engine.racers.iter().enumerate() {
            assert_eq!(racer.id, i as u32);
        }
    }

    #[test]
    fn finish_line_crossing_starts_celebration_and_explodes_the_rest() {
        let mut engine = engine_with_round(test_config(), 3);
        engine.racers[1].speed = 0.02; // reaches 2000m at tick 100

        let mut outcome = None;
        for _ in 0..150 {
            if let Some(o) = engine.tick() {
                outcome = Some(o);
                break;
            }
        }

        match outcome {
            Some(TickOutcome::CelebrationStarted { winner }) => {
                assert_eq!(winner.wallet, "wallet01");
                assert!(winner.height_reached >= 2000);
            }
            other => panic!("expected celebration, got {:?}", other),
        }
        assert_eq!(engine.phase, Phase::Celebrating);
        assert!(engine.racers[0].exploded);
        assert!(engine.racers[2].exploded);
        assert!(!engine.racers[1].exploded);
    }

    #[test]
    fn celebration_finalizes_after_grace() {
        let mut engine = engine_with_round(test_config(), 2);
        engine.racers[0].speed = 0.02;

        // Drive to celebration.
        while engine.phase == Phase::Racing {
            engine.tick();
        }
        assert_eq!(engine.phase, Phase::Celebrating);

        // One second of grace at 60Hz.
        let mut finalized = None;
        for _ in 0..=60 {
            if let Some(TickOutcome::RoundFinalized(f)) = engine.tick() {
                finalized = Some(f);
                break;
            }
        }

        let final_ = finalized.expect("celebration never finalized");
        assert_eq!(final_.winner.wallet, "wallet00");
        assert_eq!(final_.round, 127);
        assert_eq!(engine.phase, Phase::Ended);
        assert_eq!(engine.winners.len(), 1);
        assert!(engine.racers.iter().all(|r| r.exploded));
    }

    #[test]
    fn countdown_expiry_picks_highest_and_skips_celebration() {
        let mut engine = engine_with_round(test_config(), 5);
        for (i, height) in [0.3, 0.8, 0.65, 0.1, 0.2].iter().enumerate() {
            engine.racers[i].height = *height;
        }
        engine.racers[3].force_explode();
        engine.racers[4].force_explode();

        let mut outcome = None;
        for _ in 0..engine.config.round_duration_secs {
            if let Some(o) = engine.tick_countdown() {
                outcome = Some(o);
                break;
            }
        }

        match outcome {
            Some(CountdownOutcome::RoundFinalized(final_)) => {
                assert_eq!(final_.winner.wallet, "wallet01");
            }
            other => panic!("expected forced end, got {:?}", other),
        }
        assert_eq!(engine.phase, Phase::Ended);
        assert!(engine.racers.iter().all(|r| r.exploded));
        assert_eq!(engine.time_remaining, 0);
    }

    #[test]
    fn countdown_tie_goes_to_roster_order() {
        let mut engine = engine_with_round(test_config(), 3);
        engine.racers[0].height = 0.4;
        engine.racers[1].height = 0.9;
        engine.racers[2].height = 0.9;

        for _ in 0..engine.config.round_duration_secs {
            if let Some(CountdownOutcome::RoundFinalized(final_)) = engine.tick_countdown() {
                assert_eq!(final_.winner.wallet, "wallet01");
                return;
            }
        }
        panic!("round never expired");
    }

    #[test]
    fn countdown_never_goes_negative() {
        let mut engine = engine_with_round(test_config(), 2);
        for _ in 0..100 {
            engine.tick_countdown();
            assert!(engine.time_remaining <= engine.config.round_duration_secs);
        }
        assert_eq!(engine.time_remaining, 0);
    }

    #[test]
    fn round_clock_suspended_while_celebrating() {
        let mut engine = engine_with_round(test_config(), 2);
        engine.racers[0].speed = 0.02;
        while engine.phase == Phase::Racing {
            engine.tick();
        }
        let remaining = engine.time_remaining;
        assert!(engine.tick_countdown().is_none());
        assert_eq!(engine.time_remaining, remaining);
    }

    #[test]
    fn winner_is_never_reassigned() {
        let mut engine = engine_with_round(test_config(), 3);
        engine.racers[2].speed = 0.02;
        while engine.phase == Phase::Racing {
            engine.tick();
        }
        let declared = engine.winner;
        assert!(declared.is_some());

        // A stray second declaration is dropped.
        assert!(!engine.declare_winner(0));
        assert_eq!(engine.winner, declared);
    }

    #[test]
    fn mass_elimination_ends_round_with_highest() {
        let mut engine = engine_with_round(test_config(), 3);
        for (i, height_m) in [30.0_f32, 90.0, 60.0].iter().enumerate() {
            engine.racers[i].height = height_m / 1000.0;
            engine.racers[i].max_height_m = *height_m;
        }

        // Every racer crosses its threshold on the next advance.
        let outcome = engine.tick();
        match outcome {
            Some(TickOutcome::RoundFinalized(final_)) => {
                assert_eq!(final_.winner.wallet, "wallet01");
            }
            other => panic!("expected elimination ending, got {:?}", other),
        }
        assert_eq!(engine.phase, Phase::Ended);
    }

    #[test]
    fn claim_cycle_drives_status_and_reward() {
        let mut engine = engine_with_round(test_config(), 2);
        assert_eq!(engine.claim_status, ClaimStatus::Idle);

        engine.begin_claim();
        assert_eq!(engine.claim_status, ClaimStatus::Claiming);
        engine.claim_succeeded(0.8);
        assert_eq!(engine.claim_status, ClaimStatus::Claimed);
        assert_eq!(engine.pending_reward(), 0.8);

        engine.begin_claim();
        engine.claim_failed();
        assert_eq!(engine.claim_status, ClaimStatus::Failed);
        assert_eq!(engine.pending_reward(), 0.0);
    }

    #[test]
    fn break_countdown_surfaces_claim_window_then_expiry() {
        let config = test_config();
        let stats = PersistentStats::fresh(1);
        let mut engine = RoundEngine::new(config.clone(), &stats);

        let mut saw_claim = false;
        for _ in 0..config.break_secs {
            match engine.tick_countdown() {
                Some(CountdownOutcome::ClaimWindow) => saw_claim = true,
                Some(CountdownOutcome::BreakExpired) => {
                    assert!(saw_claim, "claim window must precede break expiry");
                    return;
                }
                Some(CountdownOutcome::RoundFinalized(_)) => panic!("no round to finalize"),
                None => {}
            }
        }
        panic!("break never expired");
    }

    #[test]
    fn camera_smooths_toward_leader() {
        let mut engine = engine_with_round(test_config(), 2);
        engine.racers[0].height = 0.5;
        engine.racers[0].speed = 0.0;
        engine.racers[1].height = 0.1;
        engine.racers[1].speed = 0.0;
        engine.camera_y = 0.0;

        engine.tick();
        let expected = 0.5 * engine.config.camera_follow_factor;
        assert!((engine.camera_y - expected).abs() < 1e-4);

        let before = engine.camera_y;
        engine.tick();
        assert!(engine.camera_y > before);
        assert!(engine.camera_y < 0.5);
    }
}
