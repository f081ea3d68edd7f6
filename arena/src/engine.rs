//! Session engine: matchup selection, topic generation, and the fight loop.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use rand::seq::IndexedRandom;
use thiserror::Error;
use tracing::{info, warn};

use crate::client::{CompletionClient, CompletionRequest};
use crate::config::ArenaConfig;
use crate::events::{FightEvent, FightEventBus};
use crate::fight::manager::FightManager;
use crate::fight::state::{Fight, FightSetupError, TransitionError};
use crate::persist::{save_fight, PersistError};
use crate::pool::{check_pool_size, Lab, ModelId, PoolError};
use crate::rotation::{JudgeRotation, RotationError};
use crate::text::clean_response;

/// Used when the topic model is unavailable.
pub const FALLBACK_TOPIC: &str = "Should AI be granted legal personhood?";

const TOPIC_PROMPT: &str =
    "Generate ONE controversial debate topic (technical/ethical/societal). \
     Single question format.";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Rotation(#[from] RotationError),

    #[error(transparent)]
    Setup(#[from] FightSetupError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Pick two fighters from the pool: Red at random, Blue preferring a
/// different lab so matchups cross model families when they can.
pub fn select_fighters(pool: &[ModelId]) -> Result<(ModelId, ModelId), PoolError> {
    check_pool_size(pool)?;
    let mut rng = rand::rng();

    let red = pool
        .choose(&mut rng)
        .ok_or(PoolError::InsufficientModels { found: 0 })?
        .clone();
    let red_lab = Lab::of(&red);

    let cross_lab: Vec<&ModelId> = pool
        .iter()
        .filter(|m| **m != red && Lab::of(m) != red_lab)
        .collect();
    let blue = if let Some(pick) = cross_lab.choose(&mut rng) {
        (*pick).clone()
    } else {
        let others: Vec<&ModelId> = pool.iter().filter(|m| **m != red).collect();
        others
            .choose(&mut rng)
            .map(|m| (*m).clone())
            .ok_or(PoolError::InsufficientModels { found: pool.len() })?
    };

    Ok((red, blue))
}

/// Ask the topic model for a debate question, degrading to the fallback
/// topic on any failure.
pub async fn generate_topic(client: &dyn CompletionClient, cfg: &ArenaConfig) -> String {
    let req = CompletionRequest {
        model: cfg.topic_model.clone(),
        system_prompt: None,
        user_prompt: TOPIC_PROMPT.to_string(),
        max_tokens: cfg.topic_max_tokens,
        timeout: cfg.topic_timeout,
        structured_output: false,
    };
    match client.complete(&req).await {
        Ok(raw) => {
            let topic = clean_response(&raw)
                .trim_matches(|c| c == '"' || c == '\'')
                .to_string();
            if topic.is_empty() {
                warn!("topic model returned nothing usable, using fallback");
                FALLBACK_TOPIC.to_string()
            } else {
                topic
            }
        }
        Err(e) => {
            warn!(error = %e, "topic generation failed, using fallback");
            FALLBACK_TOPIC.to_string()
        }
    }
}

/// Runs fights back to back over a fixed pool, persisting each record.
pub struct Engine {
    client: Arc<dyn CompletionClient>,
    events: Arc<FightEventBus>,
    cfg: ArenaConfig,
    pool: Vec<ModelId>,
    rotation: JudgeRotation,
}

impl Engine {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        events: Arc<FightEventBus>,
        cfg: ArenaConfig,
        pool: Vec<ModelId>,
    ) -> Result<Self, EngineError> {
        check_pool_size(&pool)?;
        let rotation = JudgeRotation::new(&pool);
        Ok(Self {
            client,
            events,
            cfg,
            pool,
            rotation,
        })
    }

    /// Run one full fight cycle: select, generate topic, fight, persist.
    pub async fn run_fight(&mut self) -> Result<(Fight, PathBuf), EngineError> {
        let (red, blue) = select_fighters(&self.pool)?;
        let judges = self.rotation.get_judges(&[red.clone(), blue.clone()])?;
        let topic = generate_topic(self.client.as_ref(), &self.cfg).await;
        info!(%red, %blue, ?judges, %topic, "fight card set");

        let fight = Fight::new(&topic, red, blue, judges, self.cfg.fight.max_rounds)?;
        let manager = FightManager::new(
            Arc::clone(&self.client),
            Arc::clone(&self.events),
            self.cfg.fight.clone(),
            fight,
        );
        let fight = manager.run().await?;

        let path = save_fight(&self.cfg.results_dir, &fight)?;
        Ok((fight, path))
    }

    /// Run fights until the count is exhausted (forever when `None`). A
    /// failed cycle publishes an error event and stops the loop.
    pub async fn run_loop(&mut self, max_fights: Option<u32>) -> Result<(), EngineError> {
        let mut fights_run = 0u32;
        loop {
            if let Some(max) = max_fights {
                if fights_run >= max {
                    info!(fights_run, "fight quota reached");
                    return Ok(());
                }
            }
            if fights_run > 0 {
                tokio::time::sleep(self.cfg.fight_cooldown).await;
            }

            match self.run_fight().await {
                Ok((fight, path)) => {
                    info!(
                        fight_id = %fight.id,
                        path = %path.display(),
                        "fight cycle finished"
                    );
                    fights_run += 1;
                }
                Err(e) => {
                    self.events.publish(FightEvent::Error {
                        fight_id: None,
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    return Err(e);
                }
            }
        }
    }
}
