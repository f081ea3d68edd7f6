//! Drives a single fight from init to a declared winner.
//!
//! Fighter turns are strictly sequential (Blue rebuts what Red just said).
//! Judge calls within a round run concurrently; `join_all` preserves
//! input order so `rounds[n].verdicts[i]` always belongs to `judges[i]`.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{info, warn};

use crate::client::{CompletionClient, CompletionRequest};
use crate::config::FightConfig;
use crate::events::{FightEvent, FightEventBus};
use crate::fight::state::{
    Corner, DecisionType, Fight, FightPhase, Round, TransitionError,
};
use crate::judge::judge_verdict;
use crate::text::clean_response;
use crate::verdict::Verdict;

/// Recorded in place of a turn when a fighter exhausts its retries or
/// produces nothing usable. Judges see it and score accordingly.
pub const SILENCE_MARKER: &str = "*[Fighter stood silent]*";

/// Turns shorter than this after cleaning count as unusable.
const MIN_TURN_LEN: usize = 6;

const SUDDEN_DEATH_PROMPT: &str =
    "SUDDEN DEATH: Why do you deserve to win this fight? Be ruthless.";

fn opening_prompt(topic: &str, position: &str) -> String {
    format!(
        "Topic: {topic}. Position: {position}. Opening statement. \
         Do not refer to an opponent yet."
    )
}

fn rebuttal_prompt(opponent_text: &str) -> String {
    format!("Opponent: '{opponent_text}'. Rebut.")
}

/// Count sudden-death votes. A tied verdict gets a forced one-point bump
/// to Red before counting, so every judge casts a vote.
pub fn sudden_death_votes(verdicts: &mut [Verdict]) -> (u32, u32) {
    let mut red_votes = 0;
    let mut blue_votes = 0;
    for v in verdicts.iter_mut() {
        if v.score_a == v.score_b {
            v.score_a += 1;
        }
        if v.score_a > v.score_b {
            red_votes += 1;
        } else {
            blue_votes += 1;
        }
    }
    (red_votes, blue_votes)
}

/// Orchestrates one fight over the completion client, publishing lifecycle
/// events as it goes. Consumed by `run`.
pub struct FightManager {
    client: Arc<dyn CompletionClient>,
    events: Arc<FightEventBus>,
    cfg: FightConfig,
    fight: Fight,
}

impl FightManager {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        events: Arc<FightEventBus>,
        cfg: FightConfig,
        fight: Fight,
    ) -> Self {
        events.publish(FightEvent::FightInit {
            fight_id: fight.id.clone(),
            topic: fight.topic.clone(),
            red: fight.red.clone(),
            blue: fight.blue.clone(),
            judges: fight.judges.clone(),
            timestamp: Utc::now(),
        });
        Self {
            client,
            events,
            cfg,
            fight,
        }
    }

    /// One fighter turn with retries; silence is recorded, never fatal.
    /// `round` labels the turn events and is `max_rounds + 1` in sudden
    /// death, matching the verdict events and the appended round record.
    async fn fighter_turn(&self, corner: Corner, round: u32, prompt: String) -> String {
        let model = self.fight.fighter(corner).clone();
        self.events.publish(FightEvent::FighterThinking {
            fight_id: self.fight.id.clone(),
            round,
            corner,
            model: model.clone(),
            timestamp: Utc::now(),
        });

        let req = CompletionRequest {
            model: model.clone(),
            system_prompt: Some(self.cfg.system_prompt.clone()),
            user_prompt: prompt,
            max_tokens: self.cfg.fighter_max_tokens,
            timeout: self.cfg.fighter_timeout,
            structured_output: false,
        };

        let mut text = SILENCE_MARKER.to_string();
        for attempt in 0..=self.cfg.fighter_retries {
            match self.client.complete(&req).await {
                Ok(raw) => {
                    let cleaned = clean_response(&raw);
                    if cleaned.len() >= MIN_TURN_LEN {
                        text = cleaned;
                        break;
                    }
                    warn!(model = %model, attempt, "fighter turn too short");
                }
                Err(e) => {
                    warn!(model = %model, attempt, error = %e, "fighter call failed");
                }
            }
            if attempt < self.cfg.fighter_retries {
                tokio::time::sleep(self.cfg.fighter_retry_backoff).await;
            }
        }

        self.events.publish(FightEvent::FighterSpeaking {
            fight_id: self.fight.id.clone(),
            round,
            corner,
            model,
            text: text.clone(),
            timestamp: Utc::now(),
        });
        text
    }

    /// Produce both turns for round `n`. Red opens or rebuts Blue's last
    /// turn; Blue always responds to what Red just said.
    async fn run_round(&mut self, round: u32) -> Result<(String, String), TransitionError> {
        self.fight
            .transition(FightPhase::RoundInProgress, "round start")?;
        self.events.publish(FightEvent::RoundStart {
            fight_id: self.fight.id.clone(),
            round,
            timestamp: Utc::now(),
        });

        let red_prompt = match self.fight.rounds.last() {
            None => opening_prompt(&self.fight.topic, "FOR"),
            Some(prev) => rebuttal_prompt(&prev.blue_text),
        };
        let red_text = self.fighter_turn(Corner::Red, round, red_prompt).await;

        let blue_prompt = if round == 1 {
            opening_prompt(&self.fight.topic, "AGAINST")
        } else {
            rebuttal_prompt(&red_text)
        };
        let blue_text = self.fighter_turn(Corner::Blue, round, blue_prompt).await;

        Ok((red_text, blue_text))
    }

    /// Collect all three verdicts concurrently, then tally.
    async fn judge_round(
        &mut self,
        round: u32,
        red_text: String,
        blue_text: String,
    ) -> Result<(), TransitionError> {
        self.fight.transition(FightPhase::Judging, "turns done")?;
        self.events.publish(FightEvent::JudgingStart {
            fight_id: self.fight.id.clone(),
            round,
            timestamp: Utc::now(),
        });

        let verdicts = self
            .collect_verdicts(round, &self.fight.topic.clone(), &red_text, &blue_text)
            .await;

        let mut red_wins = 0;
        let mut blue_wins = 0;
        for (i, v) in verdicts.iter().enumerate() {
            self.fight.total_red_score += v.score_a;
            self.fight.total_blue_score += v.score_b;
            if v.score_a > v.score_b {
                red_wins += 1;
                self.fight.judge_round_wins[i].0 += 1;
            } else if v.score_b > v.score_a {
                blue_wins += 1;
                self.fight.judge_round_wins[i].1 += 1;
            }
            // equal scores only appear on judge failure and count for no one
        }

        self.events.publish(FightEvent::RoundResult {
            fight_id: self.fight.id.clone(),
            round,
            red_wins,
            blue_wins,
            timestamp: Utc::now(),
        });
        info!(
            fight_id = %self.fight.id,
            round, red_wins, blue_wins,
            "round judged"
        );

        self.fight.rounds.push(Round {
            round,
            red_text,
            blue_text,
            verdicts,
        });
        Ok(())
    }

    /// Fan out to the panel; output order matches `fight.judges`.
    async fn collect_verdicts(
        &self,
        round: u32,
        topic: &str,
        text_a: &str,
        text_b: &str,
    ) -> Vec<Verdict> {
        let calls = self.fight.judges.iter().map(|judge| {
            let judge = judge.clone();
            let events = Arc::clone(&self.events);
            let fight_id = self.fight.id.clone();
            async move {
                let verdict = judge_verdict(
                    self.client.as_ref(),
                    &judge,
                    topic,
                    text_a,
                    text_b,
                    &self.cfg,
                )
                .await;
                events.publish(FightEvent::VerdictReceived {
                    fight_id,
                    round,
                    judge,
                    score_a: verdict.score_a,
                    score_b: verdict.score_b,
                    timestamp: Utc::now(),
                });
                verdict
            }
        });
        join_all(calls).await
    }

    /// One extra pleading round judged as votes. Always produces a winner.
    async fn run_sudden_death(&mut self) -> Result<Corner, TransitionError> {
        self.fight
            .transition(FightPhase::SuddenDeath, "judge picks tied")?;
        self.events.publish(FightEvent::SuddenDeathStart {
            fight_id: self.fight.id.clone(),
            timestamp: Utc::now(),
        });

        let sd_round = self.fight.max_rounds + 1;
        let red_text = self
            .fighter_turn(Corner::Red, sd_round, SUDDEN_DEATH_PROMPT.to_string())
            .await;
        let blue_text = self
            .fighter_turn(Corner::Blue, sd_round, SUDDEN_DEATH_PROMPT.to_string())
            .await;

        let mut verdicts = self
            .collect_verdicts(sd_round, "SUDDEN DEATH", &red_text, &blue_text)
            .await;
        let (red_votes, blue_votes) = sudden_death_votes(&mut verdicts);

        self.fight.rounds.push(Round {
            round: sd_round,
            red_text,
            blue_text,
            verdicts,
        });

        info!(
            fight_id = %self.fight.id,
            red_votes, blue_votes,
            "sudden death decided"
        );
        Ok(if red_votes > blue_votes {
            Corner::Red
        } else {
            Corner::Blue
        })
    }

    /// Run the fight to completion and return the final record.
    pub async fn run(mut self) -> Result<Fight, TransitionError> {
        for round in 1..=self.cfg.max_rounds {
            if round > 1 {
                tokio::time::sleep(self.cfg.round_cooldown).await;
            }
            let (red_text, blue_text) = self.run_round(round).await?;
            self.judge_round(round, red_text, blue_text).await?;
        }

        self.fight
            .transition(FightPhase::Resolving, "all rounds judged")?;
        let (red_picks, blue_picks) = self.fight.judge_picks();
        info!(
            fight_id = %self.fight.id,
            red_picks, blue_picks,
            "resolving fight"
        );

        let (winner, decision) = if red_picks == blue_picks {
            (self.run_sudden_death().await?, DecisionType::SuddenDeath)
        } else {
            let winner = if red_picks > blue_picks {
                Corner::Red
            } else {
                Corner::Blue
            };
            let top = red_picks.max(blue_picks);
            let decision = if top as usize == self.fight.judges.len() {
                DecisionType::Unanimous
            } else {
                DecisionType::Split
            };
            (winner, decision)
        };

        self.fight.winner = Some(winner);
        self.fight.decision = Some(decision);
        self.fight.transition(FightPhase::Complete, "winner declared")?;

        self.events.publish(FightEvent::FightComplete {
            fight_id: self.fight.id.clone(),
            winner,
            decision,
            red_score: self.fight.total_red_score,
            blue_score: self.fight.total_blue_score,
            timestamp: Utc::now(),
        });
        info!(
            fight_id = %self.fight.id,
            winner = %winner,
            decision = %decision,
            "fight complete"
        );
        Ok(self.fight)
    }
}
