//! Racer - a single simulated contestant
//!
//! Each racer climbs until it hits its own termination threshold, the
//! finish line ends the round, or it is force-exploded by round cleanup.

use rand::Rng;
use shared::{RacerView, DISPLAY_SCALE};

use crate::config::GameConfig;
use crate::holders::Holder;

/// Complete state for a single racer.
#[derive(Debug, Clone)]
pub struct Racer {
    /// Unique within a round, reused across rounds.
    pub id: u32,
    /// Short wallet handle shown to observers.
    pub wallet: String,
    /// Full external address, retained only for payout.
    pub address: String,
    /// Normalized lane position in [0, 1].
    pub x: f32,
    /// Monotonic height-progress, unit-free. Display meters are
    /// `height * DISPLAY_SCALE`.
    pub height: f32,
    /// Current climb speed, height units per tick.
    pub speed: f32,
    /// Cosmetic wobble phase; drives lateral drift only.
    pub wobble: f32,
    pub color: String,
    pub secondary_color: String,
    /// Terminal, one-way false -> true.
    pub exploded: bool,
    /// Termination threshold in display meters. Thresholds at or above the
    /// finish line never self-explode; those racers end only via the finish
    /// condition or forced elimination.
    pub max_height_m: f32,
    /// Seconds after round start before this racer begins moving.
    pub launch_delay_secs: f32,
}

impl Racer {
    /// Creates a racer on its starting pad.
    ///
    /// Speed, wobble phase, launch delay and the termination threshold are
    /// randomized per racer; the threshold draw is the only randomness that
    /// affects the race outcome.
    pub fn new(
        id: u32,
        holder: &Holder,
        lane: usize,
        total_lanes: usize,
        config: &GameConfig,
    ) -> Self {
        let mut rng = rand::thread_rng();

        let max_height_m = if rng.gen_bool(config.contender_fraction) {
            rng.gen_range(config.contender_band_m.0..=config.contender_band_m.1)
        } else {
            rng.gen_range(config.early_exit_band_m.0..=config.early_exit_band_m.1)
        };

        let color = config.colors[rng.gen_range(0..config.colors.len())];
        let secondary_color = config.colors[rng.gen_range(0..config.colors.len())];

        Self {
            id,
            wallet: holder.wallet.clone(),
            address: holder.address.clone(),
            x: (lane as f32 + 0.5) / total_lanes as f32,
            height: 0.0,
            speed: rng.gen_range(config.base_speed_min..=config.base_speed_max),
            wobble: rng.gen_range(0.0..=std::f32::consts::TAU),
            color: color.to_string(),
            secondary_color: secondary_color.to_string(),
            exploded: false,
            max_height_m,
            launch_delay_secs: rng.gen_range(0.0..=config.max_launch_delay_secs),
        }
    }

    /// Advances one physics tick.
    ///
    /// No-op while exploded or before the racer's launch delay has elapsed.
    pub fn advance(&mut self, elapsed_secs: f32, config: &GameConfig) {
        if self.exploded || elapsed_secs < self.launch_delay_secs {
            return;
        }

        self.height += self.speed;
        self.speed = (self.speed * config.speed_accel).min(config.max_speed);

        // Lateral wobble, clamped away from the lane edges. Cosmetic only.
        self.wobble += config.wobble_step;
        self.x = (self.x + self.wobble.sin() * config.wobble_amplitude)
            .clamp(config.lane_margin, 1.0 - config.lane_margin);

        if self.max_height_m < config.finish_line_m && self.height_m() >= self.max_height_m {
            self.exploded = true;
        }
    }

    /// Unconditional explosion, idempotent. Used for mass elimination and
    /// round-end cleanup.
    pub fn force_explode(&mut self) {
        self.exploded = true;
    }

    /// Display height in meters.
    pub fn height_m(&self) -> f32 {
        self.height * DISPLAY_SCALE
    }

    /// Read-only projection for broadcast; excludes the full address.
    pub fn snapshot(&self) -> RacerView {
        RacerView {
            id: self.id,
            wallet: self.wallet.clone(),
            x: self.x,
            y: 1.0 - self.height,
            color: self.color.clone(),
            secondary_color: self.secondary_color.clone(),
            has_exploded: self.exploded,
            height_reached: self.height_m().max(0.0) as u32,
        }
    }
}
