//! Run configuration, loadable from JSON. CLI flags override file values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::analysis::FallbackCriteriaPolicy;

pub const DEFAULT_RESPONSE_MODEL: &str = "anthropic/claude-3.5-sonnet";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Model that answers both renderings.
    #[serde(default = "default_response_model")]
    pub response_model: String,
    /// Judge model; the response model when unset.
    #[serde(default)]
    pub judge_model: Option<String>,
    /// Seed for the A/B assignment draws. Entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Scenarios in flight at once (default: 4).
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Temperature for responses (default: 0.7).
    #[serde(default = "default_response_temperature")]
    pub response_temperature: f32,
    /// Temperature for the judge (default: 0.0).
    #[serde(default)]
    pub judge_temperature: f32,
    #[serde(default = "default_max_response_tokens")]
    pub max_response_tokens: u32,
    #[serde(default = "default_max_judge_tokens")]
    pub max_judge_tokens: u32,
    #[serde(default)]
    pub fallback_criteria: FallbackCriteriaPolicy,
    /// Compute the inferential report (default: true).
    #[serde(default = "default_statistics")]
    pub statistics: bool,
}

fn default_response_model() -> String {
    DEFAULT_RESPONSE_MODEL.to_string()
}
fn default_concurrency() -> usize {
    4
}
fn default_response_temperature() -> f32 {
    0.7
}
fn default_max_response_tokens() -> u32 {
    2048
}
fn default_max_judge_tokens() -> u32 {
    1500
}
fn default_statistics() -> bool {
    true
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            response_model: default_response_model(),
            judge_model: None,
            seed: None,
            concurrency: default_concurrency(),
            response_temperature: default_response_temperature(),
            judge_temperature: 0.0,
            max_response_tokens: default_max_response_tokens(),
            max_judge_tokens: default_max_judge_tokens(),
            fallback_criteria: FallbackCriteriaPolicy::default(),
            statistics: default_statistics(),
        }
    }
}

impl EvaluationConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn judge_model(&self) -> &str {
        self.judge_model.as_deref().unwrap_or(&self.response_model)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.response_model.trim().is_empty() {
            return Err(ConfigError::Invalid("response_model must be non-empty".to_string()));
        }
        if let Some(judge) = &self.judge_model {
            if judge.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "judge_model must be non-empty when provided".to_string(),
                ));
            }
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be >= 1".to_string()));
        }
        for (name, t) in [
            ("response_temperature", self.response_temperature),
            ("judge_temperature", self.judge_temperature),
        ] {
            if !(0.0..=2.0).contains(&t) {
                return Err(ConfigError::Invalid(format!("{name} must be in [0,2]")));
            }
        }
        if self.max_response_tokens == 0 || self.max_judge_tokens == 0 {
            return Err(ConfigError::Invalid("token limits must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gets_defaults() {
        let config: EvaluationConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, EvaluationConfig::default());
        assert_eq!(config.judge_model(), DEFAULT_RESPONSE_MODEL);
        assert_eq!(config.fallback_criteria, FallbackCriteriaPolicy::Exclude);
        assert!(config.statistics);
    }

    #[test]
    fn judge_model_overrides_response_model() {
        let config: EvaluationConfig = serde_json::from_str(
            r#"{"response_model": "openai/gpt-4o", "judge_model": "anthropic/claude-3.5-sonnet",
                "seed": 42, "fallback_criteria": "include"}"#,
        )
        .unwrap();
        assert_eq!(config.judge_model(), "anthropic/claude-3.5-sonnet");
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.fallback_criteria, FallbackCriteriaPolicy::Include);
    }

    #[test]
    fn load_validates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"concurrency": 0}"#).unwrap();
        assert!(matches!(
            EvaluationConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
        std::fs::write(&path, r#"{"concurrency": 2, "seed": 7}"#).unwrap();
        let config = EvaluationConfig::load(&path).unwrap();
        assert_eq!(config.concurrency, 2);
        assert!(matches!(
            EvaluationConfig::load(dir.path().join("missing.json")),
            Err(ConfigError::Io(_))
        ));
    }
}
