//! Fight record persistence.
//!
//! One pretty-printed JSON file per completed fight, written to a
//! temporary path and renamed so readers never see a partial record.

use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::fight::state::{Fight, Round};
use crate::pool::ModelId;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("fight {0} is not complete")]
    FightNotComplete(String),

    #[error("failed to serialize fight record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Serialize)]
struct AggregateScores {
    red: i32,
    blue: i32,
}

/// On-disk shape of a fight record.
#[derive(Debug, Serialize)]
struct FightRecord<'a> {
    fight_id: &'a str,
    timestamp: String,
    topic: &'a str,
    red_model: &'a ModelId,
    blue_model: &'a ModelId,
    judges: &'a [ModelId],
    rounds: &'a [Round],
    aggregate_scores: AggregateScores,
    winner: String,
    decision_type: String,
}

/// Write a completed fight to `dir/fight_{id}.json`, creating the
/// directory if needed. Returns the final path.
pub fn save_fight(dir: &Path, fight: &Fight) -> Result<PathBuf, PersistError> {
    let (winner, decision) = match (fight.winner, fight.decision) {
        (Some(w), Some(d)) if fight.is_complete() => (w, d),
        _ => return Err(PersistError::FightNotComplete(fight.id.clone())),
    };

    let record = FightRecord {
        fight_id: &fight.id,
        timestamp: fight.created_at.to_rfc3339(),
        topic: &fight.topic,
        red_model: &fight.red,
        blue_model: &fight.blue,
        judges: &fight.judges,
        rounds: &fight.rounds,
        aggregate_scores: AggregateScores {
            red: fight.total_red_score,
            blue: fight.total_blue_score,
        },
        winner: winner.to_string(),
        decision_type: decision.to_string(),
    };
    let json = serde_json::to_string_pretty(&record)?;

    std::fs::create_dir_all(dir).map_err(|source| PersistError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let path = dir.join(format!("fight_{}.json", fight.id));
    let tmp = dir.join(format!("fight_{}.json.tmp", fight.id));
    std::fs::write(&tmp, json).map_err(|source| PersistError::Io {
        path: tmp.clone(),
        source,
    })?;
    std::fs::rename(&tmp, &path).map_err(|source| PersistError::Io {
        path: path.clone(),
        source,
    })?;

    info!(fight_id = %fight.id, path = %path.display(), "fight record saved");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fight::state::{Corner, DecisionType, FightPhase};
    use crate::verdict::Verdict;

    fn completed_fight() -> Fight {
        let mut fight = Fight::new(
            "Is water wet?",
            "groq/red".into(),
            "mistral/blue".into(),
            vec![
                "groq/j1".to_string(),
                "groq/j2".to_string(),
                "mistral/j3".to_string(),
            ],
            5,
        )
        .unwrap();
        fight.rounds.push(Round {
            round: 1,
            red_text: "yes".into(),
            blue_text: "no".into(),
            verdicts: vec![Verdict {
                judge: "groq/j1".into(),
                score_a: 8,
                score_b: 2,
                reason: "r".into(),
            }],
        });
        fight.total_red_score = 8;
        fight.total_blue_score = 2;
        fight.winner = Some(Corner::Red);
        fight.decision = Some(DecisionType::Unanimous);
        fight.phase = FightPhase::Complete;
        fight
    }

    #[test]
    fn test_save_writes_wire_shape() {
        let dir = tempfile::tempdir().unwrap();
        let fight = completed_fight();
        let path = save_fight(dir.path(), &fight).unwrap();
        assert_eq!(
            path.file_name().unwrap().to_str().unwrap(),
            format!("fight_{}.json", fight.id)
        );

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["fight_id"], fight.id);
        assert_eq!(json["topic"], "Is water wet?");
        assert_eq!(json["red_model"], "groq/red");
        assert_eq!(json["blue_model"], "mistral/blue");
        assert_eq!(json["judges"].as_array().unwrap().len(), 3);
        assert_eq!(json["rounds"].as_array().unwrap().len(), 1);
        assert_eq!(json["aggregate_scores"]["red"], 8);
        assert_eq!(json["aggregate_scores"]["blue"], 2);
        assert_eq!(json["winner"], "red");
        assert_eq!(json["decision_type"], "Unanimous Decision");
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results").join("2026");
        let path = save_fight(&nested, &completed_fight()).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_incomplete_fight_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut fight = completed_fight();
        fight.phase = FightPhase::Resolving;
        let err = save_fight(dir.path(), &fight).unwrap_err();
        assert!(matches!(err, PersistError::FightNotComplete(_)));
    }

    #[test]
    fn test_no_tmp_file_left_behind() {
        let dir = tempfile::tempdir().unwrap();
        let fight = completed_fight();
        save_fight(dir.path(), &fight).unwrap();
        let tmp = dir.path().join(format!("fight_{}.json.tmp", fight.id));
        assert!(!tmp.exists());
    }
}
