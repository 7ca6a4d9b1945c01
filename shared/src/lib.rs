use serde::{Deserialize, Serialize};

/// Height-progress units to display "meters".
pub const DISPLAY_SCALE: f32 = 1000.0;

/// Engine-wide round phase.
///
/// `Celebrating` is entered only from `Racing` and exits only to `Ended`.
/// A round that ends by countdown expiry skips `Celebrating` entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Racing,
    Celebrating,
    Ended,
}

/// Outcome of the pre-round fee claim, surfaced in every broadcast snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimStatus {
    Idle,
    Claiming,
    Claimed,
    Failed,
}

/// Public projection of a single racer.
///
/// This is what crosses the system boundary. The holder's full external
/// address is deliberately absent; observers only ever see the short wallet
/// handle.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RacerView {
    pub id: u32,
    pub wallet: String,
    /// Normalized lane position in [0, 1].
    pub x: f32,
    /// Normalized vertical position; 1.0 is the launch pad, values shrink
    /// (and go negative past one height unit) as the racer climbs.
    pub y: f32,
    pub color: String,
    pub secondary_color: String,
    pub has_exploded: bool,
    /// Display height in whole meters.
    pub height_reached: u32,
}

/// One line of the bounded winner history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinnerEntry {
    pub wallet: String,
    pub round: u64,
    pub prize: f64,
    /// Height reached, whole meters.
    pub height: u32,
    /// Declaration time, unix milliseconds.
    pub timestamp: u64,
}

/// Full authoritative state snapshot pushed to observers.
///
/// Field names are part of the browser contract; renaming one breaks every
/// connected client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSnapshot {
    pub current_round: u64,
    /// Round countdown remaining, whole seconds.
    pub time_remaining: u32,
    pub prize_pool: f64,
    pub total_distributed: f64,
    pub fireworks: Vec<RacerView>,
    pub winner: Option<RacerView>,
    pub phase: Phase,
    /// Most recent winners, newest first, at most ten entries.
    pub winners: Vec<WinnerEntry>,
    /// Smoothed camera height hint for observer-side tracking.
    pub camera_y: f32,
    pub claim_status: ClaimStatus,
}

/// Payload of the `roundEnded` push event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundEnded {
    pub winner: RacerView,
    pub prize_pool: f64,
    pub round: u64,
}

/// Events pushed from the engine to observers.
///
/// Serialized as `{"event": ..., "data": ...}` envelopes so a thin transport
/// can forward them verbatim as named channel messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PushEvent {
    NewRound(GameSnapshot),
    GameState(GameSnapshot),
    RoundEnded(RoundEnded),
    Winners(Vec<WinnerEntry>),
}
