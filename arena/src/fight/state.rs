//! Fight state machine, records, and resolution arithmetic.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pool::ModelId;
use crate::rotation::PANEL_SIZE;
use crate::verdict::Verdict;

/// Phase of a fight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FightPhase {
    /// Participants assigned, scores zeroed, no round started.
    Init,
    /// Fighters are producing the current round's turns.
    RoundInProgress,
    /// Judge verdicts for the current round are being collected.
    Judging,
    /// All scheduled rounds judged; counting judge picks.
    Resolving,
    /// Judge picks tied; extra round under sudden-death rules.
    SuddenDeath,
    /// Winner declared; the record is immutable.
    Complete,
}

impl FightPhase {
    /// Whether this is a terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete)
    }

    /// Valid transitions from this phase.
    pub fn valid_transitions(self) -> &'static [FightPhase] {
        match self {
            Self::Init => &[Self::RoundInProgress],
            Self::RoundInProgress => &[Self::Judging],
            Self::Judging => &[Self::RoundInProgress, Self::Resolving],
            Self::Resolving => &[Self::SuddenDeath, Self::Complete],
            Self::SuddenDeath => &[Self::Complete],
            Self::Complete => &[],
        }
    }
}

impl std::fmt::Display for FightPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "init"),
            Self::RoundInProgress => write!(f, "round_in_progress"),
            Self::Judging => write!(f, "judging"),
            Self::Resolving => write!(f, "resolving"),
            Self::SuddenDeath => write!(f, "sudden_death"),
            Self::Complete => write!(f, "complete"),
        }
    }
}

/// Error for invalid state transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: FightPhase,
    pub to: FightPhase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} -> {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

/// Corner of the ring a fighter occupies. Red argues FOR the topic, Blue
/// argues AGAINST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    Red,
    Blue,
}

impl Corner {
    pub fn opponent(self) -> Corner {
        match self {
            Corner::Red => Corner::Blue,
            Corner::Blue => Corner::Red,
        }
    }
}

impl std::fmt::Display for Corner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Corner::Red => write!(f, "red"),
            Corner::Blue => write!(f, "blue"),
        }
    }
}

/// How the fight was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionType {
    /// All three judges picked the winner.
    Unanimous,
    /// A strict majority, but not all judges.
    Split,
    /// Decided by the sudden-death round.
    SuddenDeath,
}

impl std::fmt::Display for DecisionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unanimous => write!(f, "Unanimous Decision"),
            Self::Split => write!(f, "Split Decision"),
            Self::SuddenDeath => write!(f, "Sudden Death Victory"),
        }
    }
}

/// A completed round: both turns plus the judge verdicts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Round number (1-indexed).
    pub round: u32,
    /// Red's turn text.
    pub red_text: String,
    /// Blue's turn text.
    pub blue_text: String,
    /// Positionally aligned with the fight's judge list: `verdicts[i]`
    /// belongs to `judges[i]`. Never filter or reorder — resolution sums
    /// depend on this alignment.
    pub verdicts: Vec<Verdict>,
}

/// Errors detected when assembling a fight.
#[derive(Debug, Error)]
pub enum FightSetupError {
    #[error("fighters must be distinct, got {0} twice")]
    FightersIdentical(ModelId),

    #[error("expected a panel of {}, got {found}", PANEL_SIZE)]
    BadPanelSize { found: usize },

    #[error("judge {0} is also a fighter")]
    JudgeOverlapsFighter(ModelId),

    #[error("judge {0} appears twice on the panel")]
    DuplicateJudge(ModelId),
}

/// Full record of one fight. Created at fight start, mutated only by the
/// fight manager, immutable once complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fight {
    /// Timestamp-derived id, unique per process at second granularity.
    pub id: String,
    /// Current phase.
    pub phase: FightPhase,
    /// Current round number (0 before the first round starts).
    pub current_round: u32,
    /// Scheduled rounds.
    pub max_rounds: u32,
    /// Debate topic.
    pub topic: String,
    /// Red fighter (argues FOR).
    pub red: ModelId,
    /// Blue fighter (argues AGAINST).
    pub blue: ModelId,
    /// The judge panel, in verdict order.
    pub judges: Vec<ModelId>,
    /// Completed rounds.
    pub rounds: Vec<Round>,
    /// Per-judge `(red, blue)` round-win counters over the scheduled
    /// rounds, index-aligned with `judges`. A failed judge's neutral
    /// verdict counts for neither side.
    pub judge_round_wins: Vec<(u32, u32)>,
    /// Running sum of all judges' A-scores.
    pub total_red_score: i32,
    /// Running sum of all judges' B-scores.
    pub total_blue_score: i32,
    /// Declared winner, set at completion.
    pub winner: Option<Corner>,
    /// How the fight was decided, set at completion.
    pub decision: Option<DecisionType>,
    /// When the fight was created.
    pub created_at: DateTime<Utc>,
}

impl Fight {
    /// Assemble a new fight, validating the participant invariants:
    /// distinct fighters, exactly three unique judges, judges disjoint
    /// from fighters.
    pub fn new(
        topic: &str,
        red: ModelId,
        blue: ModelId,
        judges: Vec<ModelId>,
        max_rounds: u32,
    ) -> Result<Self, FightSetupError> {
        if red == blue {
            return Err(FightSetupError::FightersIdentical(red));
        }
        if judges.len() != PANEL_SIZE {
            return Err(FightSetupError::BadPanelSize {
                found: judges.len(),
            });
        }
        for (i, judge) in judges.iter().enumerate() {
            if *judge == red || *judge == blue {
                return Err(FightSetupError::JudgeOverlapsFighter(judge.clone()));
            }
            if judges[..i].contains(judge) {
                return Err(FightSetupError::DuplicateJudge(judge.clone()));
            }
        }

        let created_at = Utc::now();
        let judge_round_wins = vec![(0, 0); judges.len()];
        Ok(Self {
            id: created_at.format("%Y%m%d_%H%M%S").to_string(),
            phase: FightPhase::Init,
            current_round: 0,
            max_rounds,
            topic: topic.to_string(),
            red,
            blue,
            judges,
            rounds: Vec::new(),
            judge_round_wins,
            total_red_score: 0,
            total_blue_score: 0,
            winner: None,
            decision: None,
            created_at,
        })
    }

    /// Transition to a new phase. Entering `RoundInProgress` advances the
    /// round counter.
    pub fn transition(&mut self, to: FightPhase, reason: &str) -> Result<(), TransitionError> {
        if !self.phase.valid_transitions().contains(&to) {
            return Err(TransitionError {
                from: self.phase,
                to,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }
        tracing::debug!(fight_id = %self.id, from = %self.phase, to = %to, reason, "phase transition");
        self.phase = to;
        if to == FightPhase::RoundInProgress {
            self.current_round += 1;
        }
        Ok(())
    }

    /// The model in a given corner.
    pub fn fighter(&self, corner: Corner) -> &ModelId {
        match corner {
            Corner::Red => &self.red,
            Corner::Blue => &self.blue,
        }
    }

    /// Whether the fight has ended.
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Count judge picks from the round log. For each judge, that judge's
    /// A- and B-scores are summed independently across all rounds (not the
    /// global aggregate) to decide the judge's overall pick; equal sums
    /// leave the judge undecided. Idempotent: reads only the round log.
    pub fn judge_picks(&self) -> (u32, u32) {
        let mut red_picks = 0;
        let mut blue_picks = 0;
        for idx in 0..self.judges.len() {
            let mut a_sum = 0i32;
            let mut b_sum = 0i32;
            for round in &self.rounds {
                if let Some(v) = round.verdicts.get(idx) {
                    a_sum += v.score_a;
                    b_sum += v.score_b;
                }
            }
            if a_sum > b_sum {
                red_picks += 1;
            } else if b_sum > a_sum {
                blue_picks += 1;
            }
        }
        (red_picks, blue_picks)
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        format!(
            "[{}] round {}/{} | {} vs {} | {}-{}",
            self.phase,
            self.current_round,
            self.max_rounds,
            self.red,
            self.blue,
            self.total_red_score,
            self.total_blue_score,
        )
    }
}
