//! Model pool loading and lab classification.
//!
//! The pool file is produced by an external discovery process: a JSON
//! object keyed by provider name, each mapping to a list of
//! `provider/name` model identifiers. Loading narrows the pool to the
//! trusted providers and top model families; classification groups models
//! into coarse labs so matchup selection can avoid same-lab fights.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

/// Identifier of a remotely hosted model, in `provider/name` form.
pub type ModelId = String;

/// Providers kept when loading the pool. Everything else is dropped for
/// stability.
pub const TRUSTED_PROVIDERS: &[&str] = &["groq", "mistral"];

/// Model-family keywords used to narrow the pool to top models.
const FAMILY_KEYWORDS: &[&str] = &[
    "kimi", "qwen", "glm", "minimax", "llama", "gemma", "mistral",
];

/// Minimum pool size for a fight: 2 fighters plus 3 distinct judges with
/// diversity headroom.
pub const MIN_POOL_SIZE: usize = 5;

/// Errors from pool loading and validation.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("failed to read pool file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("pool file is malformed: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("need at least {} models for a fight, found {found}", MIN_POOL_SIZE)]
    InsufficientModels { found: usize },
}

/// Coarse family grouping of a model, used to diversify matchups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lab {
    Qwen,
    Kimi,
    Glm,
    Minimax,
    Llama,
    Gemini,
    OpenAi,
    Deepseek,
    Mistral,
    Other,
}

impl Lab {
    /// Classify a model id by ordered substring checks against the
    /// lowercased identifier; first match wins. The order is load-bearing:
    /// some tokens appear inside other identifiers' context.
    pub fn of(model: &str) -> Lab {
        let id = model.to_lowercase();
        if id.contains("qwen") {
            Lab::Qwen
        } else if id.contains("kimi") || id.contains("moonshot") {
            Lab::Kimi
        } else if id.contains("glm") || id.contains("zai-org") {
            Lab::Glm
        } else if id.contains("minimax") {
            Lab::Minimax
        } else if id.contains("llama") {
            Lab::Llama
        } else if id.contains("gemini") {
            Lab::Gemini
        } else if id.contains("openai") || id.contains("gpt") {
            Lab::OpenAi
        } else if id.contains("deepseek") {
            Lab::Deepseek
        } else if id.contains("mistral") {
            Lab::Mistral
        } else {
            Lab::Other
        }
    }
}

impl std::fmt::Display for Lab {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lab::Qwen => write!(f, "qwen"),
            Lab::Kimi => write!(f, "kimi"),
            Lab::Glm => write!(f, "glm"),
            Lab::Minimax => write!(f, "minimax"),
            Lab::Llama => write!(f, "llama"),
            Lab::Gemini => write!(f, "gemini"),
            Lab::OpenAi => write!(f, "openai"),
            Lab::Deepseek => write!(f, "deepseek"),
            Lab::Mistral => write!(f, "mistral"),
            Lab::Other => write!(f, "other"),
        }
    }
}

/// Provider prefix of a model id (substring before `/`).
pub fn provider(model: &str) -> &str {
    model.split('/').next().unwrap_or(model)
}

/// Load and filter the model pool.
///
/// Keeps only trusted providers, deduplicates, then applies the
/// family-keyword filter. The keyword filter never empties a non-empty
/// pool: when no model matches, the unfiltered trusted set is returned.
pub fn load_pool(path: &Path) -> Result<Vec<ModelId>, PoolError> {
    let raw = std::fs::read_to_string(path).map_err(|e| PoolError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    let by_provider: BTreeMap<String, Vec<ModelId>> = serde_json::from_str(&raw)?;

    let mut models: Vec<ModelId> = by_provider
        .iter()
        .filter(|(p, _)| TRUSTED_PROVIDERS.contains(&p.as_str()))
        .flat_map(|(_, ms)| ms.iter().cloned())
        .collect();
    models.sort();
    models.dedup();

    let filtered: Vec<ModelId> = models
        .iter()
        .filter(|m| {
            let id = m.to_lowercase();
            FAMILY_KEYWORDS.iter().any(|k| id.contains(k))
        })
        .cloned()
        .collect();
    let pool = if filtered.is_empty() { models } else { filtered };

    let mut distribution: BTreeMap<&str, usize> = BTreeMap::new();
    for m in &pool {
        *distribution.entry(provider(m)).or_default() += 1;
    }
    info!(models = pool.len(), ?distribution, "model pool loaded");

    Ok(pool)
}

/// Hard precondition for matchup selection.
pub fn check_pool_size(pool: &[ModelId]) -> Result<(), PoolError> {
    if pool.len() < MIN_POOL_SIZE {
        return Err(PoolError::InsufficientModels { found: pool.len() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_pool(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_lab_classification() {
        assert_eq!(Lab::of("groq/qwen-2.5-72b"), Lab::Qwen);
        assert_eq!(Lab::of("groq/moonshotai/kimi-k2"), Lab::Kimi);
        assert_eq!(Lab::of("mistral/mistral-large"), Lab::Mistral);
        assert_eq!(Lab::of("groq/llama-3.3-70b"), Lab::Llama);
        assert_eq!(Lab::of("openrouter/some-model"), Lab::Other);
    }

    #[test]
    fn test_lab_order_glm_before_llama() {
        // "zai-org/GLM" ids must classify as glm even when other tokens
        // appear elsewhere in the path
        assert_eq!(Lab::of("groq/zai-org/GLM-4.5-Air"), Lab::Glm);
    }

    #[test]
    fn test_provider_prefix() {
        assert_eq!(provider("groq/llama-3.3-70b"), "groq");
        assert_eq!(provider("no-slash"), "no-slash");
    }

    #[test]
    fn test_load_filters_untrusted_providers() {
        let file = write_pool(
            r#"{
                "groq": ["groq/llama-3.3-70b", "groq/qwen-2.5"],
                "mistral": ["mistral/mistral-large"],
                "huggingface": ["huggingface/llama-guard"]
            }"#,
        );
        let pool = load_pool(file.path()).unwrap();
        assert_eq!(pool.len(), 3);
        assert!(pool.iter().all(|m| !m.starts_with("huggingface")));
    }

    #[test]
    fn test_load_deduplicates() {
        let file = write_pool(
            r#"{"groq": ["groq/llama-3.3-70b", "groq/llama-3.3-70b", "groq/qwen-2.5"]}"#,
        );
        let pool = load_pool(file.path()).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_keyword_filter_falls_back_when_empty() {
        // No family keyword matches, but the pool must not come back empty
        let file = write_pool(r#"{"groq": ["groq/compound-beta", "groq/allam-2-7b"]}"#);
        let pool = load_pool(file.path()).unwrap();
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_pool(Path::new("/nonexistent/models_pool.json")).unwrap_err();
        assert!(matches!(err, PoolError::Io { .. }));
    }

    #[test]
    fn test_load_malformed_file() {
        let file = write_pool("not json at all");
        let err = load_pool(file.path()).unwrap_err();
        assert!(matches!(err, PoolError::Malformed(_)));
    }

    #[test]
    fn test_check_pool_size() {
        let small: Vec<ModelId> = (0..4).map(|i| format!("groq/m{}", i)).collect();
        let err = check_pool_size(&small).unwrap_err();
        assert!(matches!(err, PoolError::InsufficientModels { found: 4 }));

        let ok: Vec<ModelId> = (0..5).map(|i| format!("groq/m{}", i)).collect();
        assert!(check_pool_size(&ok).is_ok());
    }
}
