//! Retry-tolerant judge calls.
//!
//! A judge that times out or emits garbage must never abort a fight:
//! after the retry budget is spent the call degrades to a neutral 5-5
//! draw carrying the error text for audit. Partial judge failures are
//! invisible to the end user except through that "Error:"-prefixed
//! reason string.

use tracing::warn;

use crate::client::{supports_structured_output, CompletionClient, CompletionRequest};
use crate::config::FightConfig;
use crate::pool::ModelId;
use crate::text::{clean_response, truncate};
use crate::verdict::{parse_verdict, Verdict};

/// Score pair recorded when a judge is unavailable. This is the only
/// verdict allowed to carry equal scores.
pub const NEUTRAL_SCORE: i32 = 5;
const ERROR_REASON_LIMIT: usize = 50;

fn judge_prompt(topic: &str, text_a: &str, text_b: &str) -> String {
    format!(
        "Topic: {topic}\n\
         Fighter A: {text_a}\n\
         Fighter B: {text_b}\n\
         \n\
         Rate A and B (0-10) on LOGIC and SUBSTANCE. Ignore tone.\n\
         Output valid JSON:\n\
         {{\n\
         \x20   \"score_a\": <int>,\n\
         \x20   \"score_b\": <int>,\n\
         \x20   \"reason\": \"<detailed 1-2 sentence explanation>\"\n\
         }}"
    )
}

/// Call one judge and parse its verdict, degrading to a neutral draw on
/// exhaustion of `judge_retries + 1` attempts.
pub async fn judge_verdict(
    client: &dyn CompletionClient,
    judge: &ModelId,
    topic: &str,
    text_a: &str,
    text_b: &str,
    cfg: &FightConfig,
) -> Verdict {
    let req = CompletionRequest {
        model: judge.clone(),
        system_prompt: None,
        user_prompt: judge_prompt(topic, text_a, text_b),
        max_tokens: cfg.judge_max_tokens,
        timeout: cfg.judge_timeout,
        structured_output: supports_structured_output(judge),
    };

    let mut last_error = String::new();
    for attempt in 0..=cfg.judge_retries {
        match client.complete(&req).await {
            Ok(raw) => return parse_verdict(judge, &clean_response(&raw)),
            Err(e) => {
                warn!(judge = %judge, attempt, error = %e, "judge call failed");
                last_error = e.to_string();
                if attempt < cfg.judge_retries {
                    tokio::time::sleep(cfg.judge_retry_backoff).await;
                }
            }
        }
    }

    Verdict {
        judge: judge.clone(),
        score_a: NEUTRAL_SCORE,
        score_b: NEUTRAL_SCORE,
        reason: format!("Error: {}", truncate(&last_error, ERROR_REASON_LIMIT)),
    }
}
