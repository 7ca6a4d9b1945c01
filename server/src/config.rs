//! Game configuration
//!
//! Every constant that used to vary between revisions of the game lives
//! here, so there is one engine and a bag of tunable numbers instead of
//! forked copies of the loop.

/// All tunable parameters for the round engine and its timers.
#[derive(Debug, Clone)]
pub struct GameConfig {
    /// Round duration in seconds.
    pub round_duration_secs: u32,
    /// Smallest roster the mock holder source will produce.
    pub min_racers: usize,
    /// Concurrency ceiling; oversized rosters are down-sampled to this.
    pub max_racers: usize,
    /// Physics updates per second.
    pub physics_tick_hz: u32,
    /// State broadcasts per second.
    pub broadcast_tick_hz: u32,
    /// Base climb speed band, height units per physics tick.
    pub base_speed_min: f32,
    pub base_speed_max: f32,
    /// Multiplicative per-tick speed growth.
    pub speed_accel: f32,
    /// Speed cap, height units per tick.
    pub max_speed: f32,
    /// Wobble phase advance per tick.
    pub wobble_step: f32,
    /// Lateral displacement amplitude per tick.
    pub wobble_amplitude: f32,
    /// Racers never drift closer than this to a lane edge.
    pub lane_margin: f32,
    /// Upper bound on the per-racer launch delay, seconds.
    pub max_launch_delay_secs: f32,
    /// Absolute finish threshold in display meters. Reaching it ends the
    /// round immediately regardless of remaining time.
    pub finish_line_m: f32,
    /// Fraction of racers whose termination threshold lands in the
    /// contender band; the rest draw from the early-exit band.
    pub contender_fraction: f64,
    /// Contender threshold band, display meters. Values at or above the
    /// finish line produce racers that never self-explode.
    pub contender_band_m: (f32, f32),
    /// Early-exit threshold band, display meters.
    pub early_exit_band_m: (f32, f32),
    /// Camera smoothing factor toward the leader while racing.
    pub camera_follow_factor: f32,
    /// Tighter smoothing factor once locked on the winner.
    pub camera_celebrate_factor: f32,
    /// Celebration grace before the round finalizes, seconds.
    pub celebration_secs: u32,
    /// Break between rounds, seconds.
    pub break_secs: u32,
    /// The fee claim fires this many seconds before the break expires.
    /// Must be smaller than `break_secs` or the claim never triggers.
    pub claim_lead_secs: u32,
    /// Break applied after a failed roster fetch before the next attempt.
    pub roster_retry_secs: u32,
    /// Winner history retained in memory and on disk.
    pub winner_history_cap: usize,
    /// Winner history entries included in broadcasts.
    pub winner_broadcast_cap: usize,
    /// Round number used when no stats file exists yet.
    pub initial_round: u64,
    /// Display palette sampled per racer.
    pub colors: Vec<&'static str>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            round_duration_secs: 30,
            min_racers: 12,
            max_racers: 18,
            physics_tick_hz: 60,
            broadcast_tick_hz: 30,
            base_speed_min: 0.003,
            base_speed_max: 0.005,
            speed_accel: 1.0008,
            max_speed: 0.009,
            wobble_step: 0.05,
            wobble_amplitude: 0.001,
            lane_margin: 0.05,
            max_launch_delay_secs: 1.5,
            finish_line_m: 2000.0,
            contender_fraction: 0.35,
            contender_band_m: (1200.0, 2800.0),
            early_exit_band_m: (250.0, 1100.0),
            camera_follow_factor: 0.12,
            camera_celebrate_factor: 0.1,
            celebration_secs: 3,
            break_secs: 5,
            claim_lead_secs: 3,
            roster_retry_secs: 2,
            winner_history_cap: 20,
            winner_broadcast_cap: 10,
            initial_round: 127,
            colors: vec![
                "#ff9500", "#ffd700", "#ff6b9d", "#9945FF", "#00d4ff", "#00ff88",
                "#ff4d4d", "#ffffff", "#ff3366", "#33ff99", "#6699ff", "#ffcc00",
            ],
        }
    }
}
