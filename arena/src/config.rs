//! Runtime configuration, environment-overridable.

use std::path::PathBuf;
use std::time::Duration;

/// Per-fight protocol settings.
#[derive(Debug, Clone)]
pub struct FightConfig {
    /// Scheduled rounds per fight.
    pub max_rounds: u32,
    /// Timeout for a single fighter turn.
    pub fighter_timeout: Duration,
    /// Timeout for a single judge call.
    pub judge_timeout: Duration,
    /// Extra attempts after a failed fighter call.
    pub fighter_retries: u32,
    /// Extra attempts after a failed judge call.
    pub judge_retries: u32,
    /// Sleep between fighter attempts.
    pub fighter_retry_backoff: Duration,
    /// Sleep between judge attempts.
    pub judge_retry_backoff: Duration,
    /// Token budget for a fighter turn.
    pub fighter_max_tokens: u32,
    /// Token budget for a judge verdict.
    pub judge_max_tokens: u32,
    /// Rate-limit recovery window between rounds. No fighter or judge call
    /// may start before it elapses.
    pub round_cooldown: Duration,
    /// System prompt given to both fighters.
    pub system_prompt: String,
}

impl Default for FightConfig {
    fn default() -> Self {
        Self {
            max_rounds: 5,
            fighter_timeout: Duration::from_secs(45),
            judge_timeout: Duration::from_secs(180),
            fighter_retries: 1,
            judge_retries: 2,
            fighter_retry_backoff: Duration::from_secs(1),
            judge_retry_backoff: Duration::from_secs(2),
            fighter_max_tokens: 400,
            judge_max_tokens: 500,
            round_cooldown: Duration::from_secs(120),
            system_prompt:
                "You are a ruthless debater. Attack logic. No apologies. Max 3 sentences."
                    .to_string(),
        }
    }
}

impl FightConfig {
    /// Zero every wait window so tests run instantly.
    pub fn without_delays() -> Self {
        Self {
            fighter_retry_backoff: Duration::ZERO,
            judge_retry_backoff: Duration::ZERO,
            round_cooldown: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// Session-level settings for the arena.
#[derive(Debug, Clone)]
pub struct ArenaConfig {
    /// OpenAI-compatible completions endpoint base URL.
    pub api_base: String,
    /// Env var holding the API key for the default route.
    pub api_key_env: String,
    /// Path to the discovered model pool file.
    pub pool_path: PathBuf,
    /// Directory for fight result records.
    pub results_dir: PathBuf,
    /// Model used for topic generation.
    pub topic_model: String,
    /// Timeout for the topic call.
    pub topic_timeout: Duration,
    /// Token budget for the topic call.
    pub topic_max_tokens: u32,
    /// Cooldown between consecutive fights.
    pub fight_cooldown: Duration,
    /// Fight protocol settings.
    pub fight: FightConfig,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            api_base: std::env::var("ARENA_API_BASE")
                .unwrap_or_else(|_| "https://openrouter.ai/api/v1".into()),
            api_key_env: std::env::var("ARENA_API_KEY_ENV")
                .unwrap_or_else(|_| "ARENA_API_KEY".into()),
            pool_path: std::env::var("ARENA_POOL_FILE")
                .unwrap_or_else(|_| "models_pool.json".into())
                .into(),
            results_dir: std::env::var("ARENA_RESULTS_DIR")
                .unwrap_or_else(|_| "results".into())
                .into(),
            topic_model: std::env::var("ARENA_TOPIC_MODEL")
                .unwrap_or_else(|_| "groq/llama-3.3-70b-versatile".into()),
            topic_timeout: Duration::from_secs(15),
            topic_max_tokens: 60,
            fight_cooldown: Duration::from_secs(120),
            fight: FightConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fight_config_defaults() {
        let cfg = FightConfig::default();
        assert_eq!(cfg.max_rounds, 5);
        assert_eq!(cfg.fighter_timeout, Duration::from_secs(45));
        assert_eq!(cfg.judge_timeout, Duration::from_secs(180));
        assert_eq!(cfg.fighter_retries, 1);
        assert_eq!(cfg.judge_retries, 2);
        assert_eq!(cfg.round_cooldown, Duration::from_secs(120));
    }

    #[test]
    fn test_without_delays_zeroes_waits() {
        let cfg = FightConfig::without_delays();
        assert_eq!(cfg.round_cooldown, Duration::ZERO);
        assert_eq!(cfg.fighter_retry_backoff, Duration::ZERO);
        assert_eq!(cfg.judge_retry_backoff, Duration::ZERO);
        // protocol shape untouched
        assert_eq!(cfg.max_rounds, 5);
    }
}
