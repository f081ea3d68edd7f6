//! Typed fight lifecycle events over a broadcast bus.
//!
//! The orchestration loop publishes; presentation layers (terminal,
//! websocket) subscribe independently, keeping core logic decoupled from
//! any particular sink. Ordering contract for consumers: round and turn
//! events arrive in strict round-ascending order, but `verdict_received`
//! events within one round may arrive in any judge order.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::fight::state::{Corner, DecisionType};
use crate::pool::ModelId;

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 256;

/// All fight lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FightEvent {
    /// A fight was set up: participants assigned, scores zeroed.
    FightInit {
        fight_id: String,
        topic: String,
        red: ModelId,
        blue: ModelId,
        judges: Vec<ModelId>,
        timestamp: DateTime<Utc>,
    },

    /// A round began.
    RoundStart {
        fight_id: String,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// A fighter's turn was requested.
    FighterThinking {
        fight_id: String,
        round: u32,
        corner: Corner,
        model: ModelId,
        timestamp: DateTime<Utc>,
    },

    /// A fighter produced its turn text (possibly the silence marker).
    FighterSpeaking {
        fight_id: String,
        round: u32,
        corner: Corner,
        model: ModelId,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// All judge calls for a round were dispatched.
    JudgingStart {
        fight_id: String,
        round: u32,
        timestamp: DateTime<Utc>,
    },

    /// One judge's verdict came back.
    VerdictReceived {
        fight_id: String,
        round: u32,
        judge: ModelId,
        score_a: i32,
        score_b: i32,
        timestamp: DateTime<Utc>,
    },

    /// A round was tallied.
    RoundResult {
        fight_id: String,
        round: u32,
        red_wins: u32,
        blue_wins: u32,
        timestamp: DateTime<Utc>,
    },

    /// Judge picks tied after the scheduled rounds.
    SuddenDeathStart {
        fight_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The fight reached a declared winner.
    FightComplete {
        fight_id: String,
        winner: Corner,
        decision: DecisionType,
        red_score: i32,
        blue_score: i32,
        timestamp: DateTime<Utc>,
    },

    /// A fight cycle failed before reaching a winner.
    Error {
        fight_id: Option<String>,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl FightEvent {
    /// Get the event type as a string.
    pub fn event_type(&self) -> &'static str {
        match self {
            FightEvent::FightInit { .. } => "fight_init",
            FightEvent::RoundStart { .. } => "round_start",
            FightEvent::FighterThinking { .. } => "fighter_thinking",
            FightEvent::FighterSpeaking { .. } => "fighter_speaking",
            FightEvent::JudgingStart { .. } => "judging_start",
            FightEvent::VerdictReceived { .. } => "verdict_received",
            FightEvent::RoundResult { .. } => "round_result",
            FightEvent::SuddenDeathStart { .. } => "sudden_death_start",
            FightEvent::FightComplete { .. } => "fight_complete",
            FightEvent::Error { .. } => "error",
        }
    }

    /// Get the timestamp of this event.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FightEvent::FightInit { timestamp, .. } => *timestamp,
            FightEvent::RoundStart { timestamp, .. } => *timestamp,
            FightEvent::FighterThinking { timestamp, .. } => *timestamp,
            FightEvent::FighterSpeaking { timestamp, .. } => *timestamp,
            FightEvent::JudgingStart { timestamp, .. } => *timestamp,
            FightEvent::VerdictReceived { timestamp, .. } => *timestamp,
            FightEvent::RoundResult { timestamp, .. } => *timestamp,
            FightEvent::SuddenDeathStart { timestamp, .. } => *timestamp,
            FightEvent::FightComplete { timestamp, .. } => *timestamp,
            FightEvent::Error { timestamp, .. } => *timestamp,
        }
    }

    /// Get the fight ID if this event is fight-scoped.
    pub fn fight_id(&self) -> Option<&str> {
        match self {
            FightEvent::FightInit { fight_id, .. } => Some(fight_id),
            FightEvent::RoundStart { fight_id, .. } => Some(fight_id),
            FightEvent::FighterThinking { fight_id, .. } => Some(fight_id),
            FightEvent::FighterSpeaking { fight_id, .. } => Some(fight_id),
            FightEvent::JudgingStart { fight_id, .. } => Some(fight_id),
            FightEvent::VerdictReceived { fight_id, .. } => Some(fight_id),
            FightEvent::RoundResult { fight_id, .. } => Some(fight_id),
            FightEvent::SuddenDeathStart { fight_id, .. } => Some(fight_id),
            FightEvent::FightComplete { fight_id, .. } => Some(fight_id),
            FightEvent::Error { fight_id, .. } => fight_id.as_deref(),
        }
    }

    /// Get the round number if this event is round-scoped.
    pub fn round(&self) -> Option<u32> {
        match self {
            FightEvent::RoundStart { round, .. } => Some(*round),
            FightEvent::FighterThinking { round, .. } => Some(*round),
            FightEvent::FighterSpeaking { round, .. } => Some(*round),
            FightEvent::JudgingStart { round, .. } => Some(*round),
            FightEvent::VerdictReceived { round, .. } => Some(*round),
            FightEvent::RoundResult { round, .. } => Some(*round),
            _ => None,
        }
    }
}

/// Shared reference to the event bus.
pub type SharedEventBus = Arc<FightEventBus>;

/// Event bus backed by a Tokio broadcast channel.
pub struct FightEventBus {
    sender: broadcast::Sender<FightEvent>,
}

impl FightEventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Create a shared reference to this bus.
    pub fn shared(self) -> SharedEventBus {
        Arc::new(self)
    }

    /// Publish an event to all subscribers. A bus with no receivers drops
    /// the event; publishing never fails.
    pub fn publish(&self, event: FightEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(count) => debug!(event_type, receivers = count, "event published"),
            Err(_) => debug!(event_type, "event published (no receivers)"),
        }
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<FightEvent> {
        self.sender.subscribe()
    }

    /// Number of current subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for FightEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = FightEventBus::new();
        let mut receiver = bus.subscribe();

        bus.publish(FightEvent::RoundStart {
            fight_id: "20260101_120000".into(),
            round: 1,
            timestamp: Utc::now(),
        });

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.event_type(), "round_start");
        assert_eq!(event.fight_id(), Some("20260101_120000"));
        assert_eq!(event.round(), Some(1));
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = FightEventBus::new().shared();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(FightEvent::SuddenDeathStart {
            fight_id: "f".into(),
            timestamp: Utc::now(),
        });

        assert_eq!(rx1.recv().await.unwrap().event_type(), "sudden_death_start");
        assert_eq!(rx2.recv().await.unwrap().event_type(), "sudden_death_start");
    }

    #[test]
    fn test_publish_without_subscribers_is_ok() {
        let bus = FightEventBus::new();
        bus.publish(FightEvent::Error {
            fight_id: None,
            message: "no takers".into(),
            timestamp: Utc::now(),
        });
    }

    #[test]
    fn test_event_serialization_tag() {
        let event = FightEvent::VerdictReceived {
            fight_id: "f".into(),
            round: 3,
            judge: "groq/qwen".into(),
            score_a: 7,
            score_b: 4,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "verdict_received");
        assert_eq!(json["round"], 3);

        let parsed: FightEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.event_type(), "verdict_received");
    }
}
