//! Observer fan-out
//!
//! The transport itself (websocket, SSE, whatever fronts the browsers) is
//! not this crate's business; it subscribes here and forwards JSON. The hub
//! keeps the latest full snapshot so a freshly connected observer can render
//! immediately instead of waiting for the next broadcast tick.

use log::debug;
use shared::{GameSnapshot, PushEvent};
use tokio::sync::{broadcast, RwLock};

pub struct Hub {
    tx: broadcast::Sender<PushEvent>,
    latest: RwLock<Option<GameSnapshot>>,
}

impl Hub {
    /// `capacity` bounds the per-subscriber event backlog; slow observers
    /// lose frames rather than applying backpressure to the game loop.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            latest: RwLock::new(None),
        }
    }

    /// Registers an observer: the most recent snapshot (if any round has
    /// been broadcast yet) plus a live event receiver.
    pub async fn subscribe(&self) -> (Option<GameSnapshot>, broadcast::Receiver<PushEvent>) {
        let snapshot = self.latest.read().await.clone();
        (snapshot, self.tx.subscribe())
    }

    /// Fans an event out to every subscriber. Never fails: with no
    /// observers connected the event is simply dropped.
    pub async fn publish(&self, event: PushEvent) {
        match &event {
            PushEvent::NewRound(snapshot) | PushEvent::GameState(snapshot) => {
                *self.latest.write().await = Some(snapshot.clone());
            }
            _ => {}
        }
        if self.tx.send(event).is_err() {
            debug!("No observers connected, dropping event");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{ClaimStatus, Phase};

    fn snapshot(round: u64) -> GameSnapshot {
        GameSnapshot {
            current_round: round,
            time_remaining: 30,
            prize_pool: 0.8,
            total_distributed: 10.0,
            fireworks: Vec::new(),
            winner: None,
            phase: Phase::Racing,
            winners: Vec::new(),
            camera_y: 0.0,
            claim_status: ClaimStatus::Idle,
        }
    }

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = Hub::new(16);
        let (initial, mut rx) = hub.subscribe().await;
        assert!(initial.is_none());

        hub.publish(PushEvent::GameState(snapshot(127))).await;
        match rx.recv().await {
            Ok(PushEvent::GameState(s)) => assert_eq!(s.current_round, 127),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn late_subscriber_gets_latest_snapshot() {
        let hub = Hub::new(16);
        hub.publish(PushEvent::NewRound(snapshot(128))).await;
        hub.publish(PushEvent::GameState(snapshot(129))).await;

        let (initial, _rx) = hub.subscribe().await;
        assert_eq!(initial.unwrap().current_round, 129);
    }

    #[tokio::test]
    async fn publish_without_observers_is_harmless() {
        let hub = Hub::new(16);
        hub.publish(PushEvent::Winners(Vec::new())).await;
        assert_eq!(hub.subscriber_count(), 0);
    }
}
