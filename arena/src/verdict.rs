//! Judge verdicts and the layered response parser.
//!
//! Judge models are unreliable emitters: some return clean JSON, some wrap
//! it in prose, some produce near-JSON with quoting artifacts, some leak a
//! nested rationale object. The parser is an explicit ordered strategy
//! chain — each strategy either yields scores or a `ParseError`, and the
//! first success wins. Malformed output is absorbed entirely here and
//! never surfaces past this boundary.

use std::sync::OnceLock;

use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::pool::ModelId;
use crate::text::truncate;

/// One judge's scored verdict for a round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub judge: ModelId,
    pub score_a: i32,
    pub score_b: i32,
    pub reason: String,
}

/// Error from a single parse strategy.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("not a JSON object: {0}")]
    NotJson(String),

    #[error("no brace-delimited object in response")]
    NoObject,
}

/// Scores and rationale before judge attribution and tie-breaking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawScores {
    pub score_a: i32,
    pub score_b: i32,
    pub reason: String,
}

const DEFAULT_SCORE: i32 = 5;
const DEFAULT_REASON: &str = "No reason.";
const RAW_REASON_LIMIT: usize = 150;

type ParseStrategy = fn(&str) -> Result<RawScores, ParseError>;

/// Ordered fallback chain, strictly first-success-wins. `parse_loose` is
/// total, so the chain always yields scores.
const STRATEGIES: &[ParseStrategy] = &[parse_strict, parse_embedded, parse_loose];

/// Run the strategy chain over a raw judge response.
pub fn parse_response(raw: &str) -> RawScores {
    for strategy in STRATEGIES {
        if let Ok(scores) = strategy(raw) {
            return scores;
        }
    }
    RawScores {
        score_a: DEFAULT_SCORE,
        score_b: DEFAULT_SCORE,
        reason: truncate(raw, RAW_REASON_LIMIT),
    }
}

/// Parse a judge response, attribute it, and apply the round tie-break:
/// a judge is never allowed to score a drawn round, so equal scores get
/// exactly one side bumped by 1 at random. Deliberate round-level
/// decisiveness, not a parsing artifact. The neutral 5-5 error verdict is
/// produced outside the parser and is the only verdict allowed to tie.
pub fn parse_verdict(judge: &str, raw: &str) -> Verdict {
    let scores = parse_response(raw);
    let (score_a, score_b) = break_round_tie(scores.score_a, scores.score_b);
    Verdict {
        judge: judge.to_string(),
        score_a,
        score_b,
        reason: scores.reason,
    }
}

fn break_round_tie(score_a: i32, score_b: i32) -> (i32, i32) {
    if score_a != score_b {
        return (score_a, score_b);
    }
    let mut rng = rand::rng();
    if rng.random_bool(0.5) {
        (score_a + 1, score_b)
    } else {
        (score_a, score_b + 1)
    }
}

/// Strategy 1: the whole body is a JSON object.
fn parse_strict(raw: &str) -> Result<RawScores, ParseError> {
    let value: Value =
        serde_json::from_str(raw.trim()).map_err(|e| ParseError::NotJson(e.to_string()))?;
    if !value.is_object() {
        return Err(ParseError::NotJson("top-level value is not an object".into()));
    }
    Ok(scores_from_value(&value))
}

/// Strategy 2: the body contains an object somewhere — take the largest
/// `{...}` substring. A second attempt normalizes single-quote artifacts.
fn parse_embedded(raw: &str) -> Result<RawScores, ParseError> {
    static OBJECT: OnceLock<Regex> = OnceLock::new();
    let re = OBJECT.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("valid regex"));
    let object = re.find(raw).ok_or(ParseError::NoObject)?.as_str();

    if let Ok(value) = serde_json::from_str::<Value>(object) {
        return Ok(scores_from_value(&value));
    }
    let normalized = object.replace('\'', "\"");
    let value: Value =
        serde_json::from_str(&normalized).map_err(|e| ParseError::NotJson(e.to_string()))?;
    Ok(scores_from_value(&value))
}

/// Strategy 3: regex extraction. First integer after each score label,
/// defaults of 5; reason substring after the label, avoiding nested
/// braces; final fallback is the head of the raw response.
fn parse_loose(raw: &str) -> Result<RawScores, ParseError> {
    static SCORE_A: OnceLock<Regex> = OnceLock::new();
    static SCORE_B: OnceLock<Regex> = OnceLock::new();
    static REASON: OnceLock<Regex> = OnceLock::new();
    let score_a_re = SCORE_A.get_or_init(|| Regex::new(r"(?is)score_a.*?(\d+)").expect("valid regex"));
    let score_b_re = SCORE_B.get_or_init(|| Regex::new(r"(?is)score_b.*?(\d+)").expect("valid regex"));
    let reason_re = REASON.get_or_init(|| {
        Regex::new(r#"(?is)reason\s*["']?\s*[:=]\s*["']?([^"'{}]+)"#).expect("valid regex")
    });

    let extract = |re: &Regex| {
        re.captures(raw)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(DEFAULT_SCORE)
    };

    let reason = reason_re
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| truncate(raw, RAW_REASON_LIMIT));

    Ok(RawScores {
        score_a: extract(score_a_re),
        score_b: extract(score_b_re),
        reason,
    })
}

fn scores_from_value(value: &Value) -> RawScores {
    RawScores {
        score_a: int_field(value, "score_a"),
        score_b: int_field(value, "score_b"),
        reason: reason_field(value),
    }
}

/// Score fields default to 5; numeric strings are accepted.
fn int_field(value: &Value, key: &str) -> i32 {
    match value.get(key) {
        Some(Value::Number(n)) => n.as_i64().map(|v| v as i32).unwrap_or(DEFAULT_SCORE),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(DEFAULT_SCORE),
        _ => DEFAULT_SCORE,
    }
}

/// Some models wrap the rationale in a nested object, or serialize one
/// into the reason string. Flatten either shape into plain text.
fn reason_field(value: &Value) -> String {
    match value.get("reason") {
        Some(Value::Object(map)) => flatten_values(map),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.starts_with('{') {
                if let Ok(Value::Object(map)) = serde_json::from_str(trimmed) {
                    return flatten_values(&map);
                }
            }
            trimmed.to_string()
        }
        Some(other) => other.to_string(),
        None => DEFAULT_REASON.to_string(),
    }
}

fn flatten_values(map: &serde_json::Map<String, Value>) -> String {
    map.values()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_json() {
        let scores =
            parse_response(r#"{"score_a": 8, "score_b": 3, "reason": "A argued better"}"#);
        assert_eq!(scores.score_a, 8);
        assert_eq!(scores.score_b, 3);
        assert_eq!(scores.reason, "A argued better");
    }

    #[test]
    fn test_strict_json_missing_keys_default() {
        let scores = parse_response(r#"{"score_a": 7}"#);
        assert_eq!(scores.score_a, 7);
        assert_eq!(scores.score_b, 5);
        assert_eq!(scores.reason, "No reason.");
    }

    #[test]
    fn test_strict_json_string_scores() {
        let scores = parse_response(r#"{"score_a": "6", "score_b": "4", "reason": "ok"}"#);
        assert_eq!(scores.score_a, 6);
        assert_eq!(scores.score_b, 4);
    }

    #[test]
    fn test_nested_reason_object_flattened() {
        let scores = parse_response(
            r#"{"score_a": 6, "score_b": 4, "reason": {"logic": "A was tighter", "substance": "more evidence"}}"#,
        );
        assert!(scores.reason.contains("A was tighter"));
        assert!(scores.reason.contains("more evidence"));
    }

    #[test]
    fn test_serialized_reason_string_flattened() {
        let scores = parse_response(
            r#"{"score_a": 6, "score_b": 4, "reason": "{\"summary\": \"A led on logic\"}"}"#,
        );
        assert_eq!(scores.reason, "A led on logic");
    }

    #[test]
    fn test_embedded_object_in_prose() {
        let raw = "Here is my verdict:\n{\"score_a\": 9, \"score_b\": 2, \"reason\": \"one-sided\"}\nThanks!";
        let scores = parse_response(raw);
        assert_eq!(scores.score_a, 9);
        assert_eq!(scores.score_b, 2);
        assert_eq!(scores.reason, "one-sided");
    }

    #[test]
    fn test_embedded_single_quote_artifacts() {
        let raw = "Verdict: {'score_a': 7, 'score_b': 4, 'reason': 'A held up'}";
        let scores = parse_response(raw);
        assert_eq!(scores.score_a, 7);
        assert_eq!(scores.score_b, 4);
        assert_eq!(scores.reason, "A held up");
    }

    #[test]
    fn test_loose_label_extraction() {
        let raw = "I rate score_a: 8 and score_b: 6. reason: A was more rigorous.";
        let scores = parse_response(raw);
        assert_eq!(scores.score_a, 8);
        assert_eq!(scores.score_b, 6);
        assert!(scores.reason.contains("more rigorous"));
    }

    #[test]
    fn test_loose_defaults_on_prose() {
        let raw = "Both fighters did reasonably well, hard to call.";
        let scores = parse_response(raw);
        assert_eq!(scores.score_a, 5);
        assert_eq!(scores.score_b, 5);
        // reason falls back to the head of the raw response
        assert!(scores.reason.starts_with("Both fighters"));
    }

    #[test]
    fn test_loose_reason_truncated_to_150() {
        let raw = "x".repeat(400);
        let scores = parse_response(&raw);
        assert_eq!(scores.reason.chars().count(), 150);
    }

    #[test]
    fn test_top_level_non_object_rejected_by_strict() {
        // "7" is valid JSON but not a verdict; the chain must fall through
        let scores = parse_response("7");
        assert_eq!(scores.score_a, 5);
        assert_eq!(scores.score_b, 5);
    }

    #[test]
    fn test_tie_break_never_returns_equal_scores() {
        for _ in 0..100 {
            let v = parse_verdict(
                "groq/judge",
                r#"{"score_a": 7, "score_b": 7, "reason": "close"}"#,
            );
            assert_ne!(v.score_a, v.score_b);
            assert_eq!(v.score_a + v.score_b, 15);
            assert_eq!(v.score_a.max(v.score_b), 8);
        }
    }

    #[test]
    fn test_tie_break_goes_both_ways() {
        let mut saw_a = false;
        let mut saw_b = false;
        for _ in 0..200 {
            let v = parse_verdict("j", r#"{"score_a": 5, "score_b": 5}"#);
            if v.score_a > v.score_b {
                saw_a = true;
            } else {
                saw_b = true;
            }
            if saw_a && saw_b {
                break;
            }
        }
        assert!(saw_a && saw_b, "random bump never favored one side");
    }

    #[test]
    fn test_unequal_scores_pass_through() {
        let v = parse_verdict("j", r#"{"score_a": 9, "score_b": 3, "reason": "clear"}"#);
        assert_eq!((v.score_a, v.score_b), (9, 3));
        assert_eq!(v.judge, "j");
    }

    #[test]
    fn test_verdict_serialization_shape() {
        let v = Verdict {
            judge: "groq/qwen".into(),
            score_a: 7,
            score_b: 4,
            reason: "sound logic".into(),
        };
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["judge"], "groq/qwen");
        assert_eq!(json["score_a"], 7);
        assert_eq!(json["score_b"], 4);
        assert_eq!(json["reason"], "sound logic");
    }
}
