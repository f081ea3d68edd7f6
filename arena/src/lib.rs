//! Autonomous LLM debate arena.
//!
//! Two models from a discovered pool argue a generated topic over five
//! rounds while a rotating panel of three judge models scores each round.
//! The engine resolves judge picks into a winner (sudden death on a tie),
//! publishes lifecycle events on a broadcast bus, and persists one JSON
//! record per fight.

pub mod client;
pub mod config;
pub mod engine;
pub mod events;
pub mod fight;
pub mod judge;
pub mod persist;
pub mod pool;
pub mod rotation;
pub mod text;
pub mod verdict;

pub use client::{CallError, CompletionClient, CompletionRequest, HttpCompletionClient};
pub use config::{ArenaConfig, FightConfig};
pub use engine::{Engine, EngineError};
pub use events::{FightEvent, FightEventBus, SharedEventBus};
pub use fight::{
    Corner, DecisionType, Fight, FightManager, FightPhase, Round, SILENCE_MARKER,
};
pub use pool::{Lab, ModelId};
pub use rotation::JudgeRotation;
pub use verdict::Verdict;
