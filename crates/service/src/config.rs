use std::env;
use std::path::PathBuf;

use trip_core::DEFAULT_MAX_OPTIONS;

pub const DEFAULT_DATASET_PATH: &str = "assets/trip_dataset.csv";
pub const DEFAULT_MODEL_PATH: &str = "assets/budget_model.json";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannerConfig {
    pub dataset_path: PathBuf,
    pub model_path: PathBuf,
    pub max_options: usize,
    pub database_url: Option<String>,
    /// Pins every generation to the same draws when set.
    pub seed: Option<u64>,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from(DEFAULT_DATASET_PATH),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            max_options: DEFAULT_MAX_OPTIONS,
            database_url: None,
            seed: None,
        }
    }
}

impl PlannerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads `TRIP_*` settings through `lookup`; absent, blank or unparsable
    /// values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let value = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            dataset_path: value("TRIP_DATASET_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.dataset_path),
            model_path: value("TRIP_MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_path),
            max_options: value("TRIP_MAX_OPTIONS")
                .and_then(|raw| raw.parse::<usize>().ok())
                .filter(|max| *max > 0)
                .unwrap_or(defaults.max_options),
            database_url: value("TRIP_DATABASE_URL"),
            seed: value("TRIP_SEED").and_then(|raw| raw.parse::<u64>().ok()),
        }
    }
}
