//! Scenario catalog: the structured inputs both renderings are built from.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CATEGORY: &str = "uncategorized";

#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("failed to read scenario catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse scenario catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("scenario catalog is empty")]
    Empty,
    #[error("scenario #{0} has an empty id")]
    EmptyId(usize),
    #[error("duplicate scenario id: {0}")]
    DuplicateId(String),
    #[error("unknown scenario: {0}")]
    Unknown(String),
    #[error("no scenarios in category: {0}")]
    EmptyCategory(String),
}

/// One evaluation case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(alias = "name")]
    pub id: String,
    #[serde(default)]
    pub description: String,
    pub task: String,
    /// Factors the judge should weigh.
    #[serde(default, alias = "expected_advantages")]
    pub rubric: Vec<String>,
    #[serde(default = "default_category")]
    pub category: String,
    pub data: Value,
}

fn default_category() -> String {
    DEFAULT_CATEGORY.to_string()
}

/// Which scenarios to run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScenarioFilter {
    /// Exactly this scenario; takes precedence over the other fields.
    pub single: Option<String>,
    pub category: Option<String>,
    /// Keep the first `limit` after category filtering.
    pub limit: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ScenarioCatalog {
    scenarios: Vec<Scenario>,
}

impl ScenarioCatalog {
    pub fn new(scenarios: Vec<Scenario>) -> Result<Self, ScenarioError> {
        if scenarios.is_empty() {
            return Err(ScenarioError::Empty);
        }
        let mut seen = HashSet::new();
        for (index, scenario) in scenarios.iter().enumerate() {
            if scenario.id.trim().is_empty() {
                return Err(ScenarioError::EmptyId(index));
            }
            if !seen.insert(scenario.id.as_str()) {
                return Err(ScenarioError::DuplicateId(scenario.id.clone()));
            }
        }
        Ok(Self { scenarios })
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ScenarioError> {
        Self::new(serde_json::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn scenarios(&self) -> &[Scenario] {
        &self.scenarios
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    /// Distinct categories in first-seen order.
    pub fn categories(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.scenarios
            .iter()
            .map(|s| s.category.as_str())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Scenario id to category, as consumed by the aggregator.
    pub fn category_map(&self) -> HashMap<String, String> {
        self.scenarios
            .iter()
            .map(|s| (s.id.clone(), s.category.clone()))
            .collect()
    }

    /// Apply a filter, keeping catalog order.
    pub fn select(&self, filter: &ScenarioFilter) -> Result<Vec<Scenario>, ScenarioError> {
        if let Some(id) = &filter.single {
            return self
                .get(id)
                .cloned()
                .map(|s| vec![s])
                .ok_or_else(|| ScenarioError::Unknown(id.clone()));
        }

        let mut selected: Vec<Scenario> = match &filter.category {
            Some(category) => self
                .scenarios
                .iter()
                .filter(|s| &s.category == category)
                .cloned()
                .collect(),
            None => self.scenarios.clone(),
        };
        if let Some(category) = &filter.category {
            if selected.is_empty() {
                return Err(ScenarioError::EmptyCategory(category.clone()));
            }
        }
        if let Some(limit) = filter.limit {
            selected.truncate(limit);
        }
        Ok(selected)
    }
}
