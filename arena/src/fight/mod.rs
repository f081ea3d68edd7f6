//! Fight orchestration: state machine plus the manager that drives it.

pub mod manager;
pub mod state;

pub use manager::{sudden_death_votes, FightManager, SILENCE_MARKER};
pub use state::{
    Corner, DecisionType, Fight, FightPhase, FightSetupError, Round, TransitionError,
};
