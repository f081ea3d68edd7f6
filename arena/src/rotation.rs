//! Judge panel selection with provider diversity and round-robin fill.
//!
//! A session owns one `JudgeRotation`; its rotation index advances
//! monotonically across fights so panel duty spreads over the whole pool.
//! Concurrent multi-fight servers must serialize access to it (mutex or a
//! single-writer task) — fights run one at a time in the base design.

use std::collections::HashMap;

use rand::seq::{IndexedRandom, SliceRandom};
use thiserror::Error;

use crate::pool::{provider, ModelId};

/// Every fight is scored by exactly this many judges.
pub const PANEL_SIZE: usize = 3;

/// Errors from judge selection.
#[derive(Debug, Error)]
pub enum RotationError {
    #[error("pool cannot supply {} eligible judges, found {found}", PANEL_SIZE)]
    InsufficientJudges { found: usize },
}

/// Session-scoped judge rotation state.
pub struct JudgeRotation {
    /// Deduplicated, shuffled copy of the model pool; fixed for the session.
    pool: Vec<ModelId>,
    /// Monotonic counter, wraps via modulo. Advanced on every
    /// `get_judges` call.
    rotation_index: usize,
}

impl JudgeRotation {
    /// Build a rotation from a pool, deduplicating and shuffling once.
    pub fn new(pool: &[ModelId]) -> Self {
        let mut deduped: Vec<ModelId> = pool.to_vec();
        deduped.sort();
        deduped.dedup();
        let mut rng = rand::rng();
        deduped.shuffle(&mut rng);
        Self {
            pool: deduped,
            rotation_index: 0,
        }
    }

    /// Pick exactly three unique judges disjoint from the fighters.
    ///
    /// Two phases, order-sensitive:
    /// 1. Diversity pass — at most one judge per provider, providers
    ///    visited in random order, maximizing distinct providers on the
    ///    panel.
    /// 2. Fill pass — walk the pool from the rotation index, bounded by
    ///    `2 × pool` attempts so it terminates even with a small pool.
    ///
    /// A pool that cannot supply three eligible candidates is an explicit
    /// error, never a silently short list.
    pub fn get_judges(&mut self, fighters: &[ModelId; 2]) -> Result<Vec<ModelId>, RotationError> {
        let mut judges: Vec<ModelId> = Vec::with_capacity(PANEL_SIZE);
        let mut rng = rand::rng();

        let mut by_provider: HashMap<&str, Vec<&ModelId>> = HashMap::new();
        for m in &self.pool {
            by_provider.entry(provider(m)).or_default().push(m);
        }
        let mut providers: Vec<&str> = by_provider.keys().copied().collect();
        providers.shuffle(&mut rng);

        for p in providers {
            if judges.len() >= PANEL_SIZE {
                break;
            }
            let candidates: Vec<&ModelId> = by_provider[p]
                .iter()
                .copied()
                .filter(|m| !fighters.contains(*m) && !judges.contains(*m))
                .collect();
            if let Some(pick) = candidates.choose(&mut rng) {
                judges.push((**pick).clone());
            }
        }

        let mut attempts = 0;
        while judges.len() < PANEL_SIZE && attempts < self.pool.len() * 2 {
            let candidate = &self.pool[self.rotation_index % self.pool.len()];
            if !fighters.contains(candidate) && !judges.contains(candidate) {
                judges.push(candidate.clone());
            }
            self.rotation_index += 1;
            attempts += 1;
        }

        if judges.len() < PANEL_SIZE {
            return Err(RotationError::InsufficientJudges {
                found: judges.len(),
            });
        }
        Ok(judges)
    }

    /// Number of models in the rotation pool.
    pub fn pool_size(&self) -> usize {
        self.pool.len()
    }

    /// Current rotation index (monotonic, not wrapped).
    pub fn rotation_index(&self) -> usize {
        self.rotation_index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(ids: &[&str]) -> Vec<ModelId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn fighters(a: &str, b: &str) -> [ModelId; 2] {
        [a.to_string(), b.to_string()]
    }

    #[test]
    fn test_panel_disjoint_and_unique() {
        let models = pool(&[
            "groq/llama-3.3-70b",
            "groq/qwen-2.5",
            "groq/gemma-2-9b",
            "mistral/mistral-large",
            "mistral/mistral-small",
            "mistral/ministral-8b",
        ]);
        let mut rotation = JudgeRotation::new(&models);
        let fight = fighters("groq/llama-3.3-70b", "mistral/mistral-large");

        for _ in 0..50 {
            let judges = rotation.get_judges(&fight).unwrap();
            assert_eq!(judges.len(), PANEL_SIZE);
            for j in &judges {
                assert!(!fight.contains(j), "judge {} is a fighter", j);
            }
            let mut unique = judges.clone();
            unique.sort();
            unique.dedup();
            assert_eq!(unique.len(), PANEL_SIZE, "duplicate judge in panel");
        }
    }

    #[test]
    fn test_minimum_pool_exactly_five() {
        let models = pool(&[
            "groq/llama-3.3-70b",
            "groq/qwen-2.5",
            "mistral/mistral-large",
            "mistral/mistral-small",
            "groq/gemma-2-9b",
        ]);
        let mut rotation = JudgeRotation::new(&models);
        let fight = fighters("groq/llama-3.3-70b", "mistral/mistral-large");

        let judges = rotation.get_judges(&fight).unwrap();
        assert_eq!(judges.len(), 3);
    }

    #[test]
    fn test_insufficient_judges_is_an_error() {
        // Pool of 4 leaves only 2 eligible once fighters are excluded
        let models = pool(&[
            "groq/llama-3.3-70b",
            "groq/qwen-2.5",
            "mistral/mistral-large",
            "mistral/mistral-small",
        ]);
        let mut rotation = JudgeRotation::new(&models);
        let fight = fighters("groq/llama-3.3-70b", "mistral/mistral-large");

        let err = rotation.get_judges(&fight).unwrap_err();
        assert!(matches!(
            err,
            RotationError::InsufficientJudges { found: 2 }
        ));
    }

    #[test]
    fn test_provider_diversity_preferred() {
        // Two providers, both with eligible candidates: the diversity pass
        // must put both providers on the panel.
        let models = pool(&[
            "groq/llama-3.3-70b",
            "groq/qwen-2.5",
            "groq/gemma-2-9b",
            "mistral/mistral-large",
            "mistral/mistral-small",
            "mistral/ministral-8b",
        ]);
        let mut rotation = JudgeRotation::new(&models);
        let fight = fighters("groq/llama-3.3-70b", "mistral/mistral-large");

        for _ in 0..20 {
            let judges = rotation.get_judges(&fight).unwrap();
            let mut providers: Vec<&str> = judges.iter().map(|j| provider(j)).collect();
            providers.sort();
            providers.dedup();
            assert!(
                providers.len() >= 2,
                "panel drew from a single provider: {:?}",
                judges
            );
        }
    }

    #[test]
    fn test_rotation_index_advances_across_fights() {
        // A pool with one provider defeats the diversity pass entirely
        // (one judge from it) and forces the fill pass to advance the index.
        let models = pool(&[
            "groq/llama-3.3-70b",
            "groq/qwen-2.5",
            "groq/gemma-2-9b",
            "groq/kimi-k2",
            "groq/glm-4.5",
        ]);
        let mut rotation = JudgeRotation::new(&models);
        let fight = fighters("groq/llama-3.3-70b", "groq/qwen-2.5");

        assert_eq!(rotation.rotation_index(), 0);
        rotation.get_judges(&fight).unwrap();
        let after_first = rotation.rotation_index();
        assert!(after_first > 0);
        rotation.get_judges(&fight).unwrap();
        assert!(rotation.rotation_index() > after_first);
    }

    #[test]
    fn test_pool_deduplicated_on_construction() {
        let models = pool(&["groq/llama-3.3-70b", "groq/llama-3.3-70b", "groq/qwen-2.5"]);
        let rotation = JudgeRotation::new(&models);
        assert_eq!(rotation.pool_size(), 2);
    }
}
