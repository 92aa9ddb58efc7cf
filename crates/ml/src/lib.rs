mod linear;
mod tree;

#[cfg(feature = "burn-ml")]
mod burn_impl;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{ensure, Result};
use serde::Deserialize;
use thiserror::Error;
use trip_core::{round_cents, BudgetPredictor, FeatureRow};

pub use linear::LinearBudgetModel;
pub use tree::TreeEnsembleModel;

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("failed reading budget model at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("budget model at {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid budget model: {0}")]
    Invalid(String),
}

/// Row-major feature values laid out in a model's feature order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    columns: usize,
    values: Vec<f64>,
}

impl FeatureMatrix {
    /// Projects each row onto `feature_names`; features a row lacks are zero.
    pub fn align(rows: &[FeatureRow], feature_names: &[String]) -> Self {
        let mut values = Vec::with_capacity(rows.len() * feature_names.len());
        for row in rows {
            values.extend(feature_names.iter().map(|name| row.get(name)));
        }
        Self {
            rows: rows.len(),
            columns: feature_names.len(),
            values,
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn column_count(&self) -> usize {
        self.columns
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Yields one slice per row, empty when the model declares no features.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        (0..self.rows).map(move |row| &self.values[row * self.columns..(row + 1) * self.columns])
    }
}

pub trait BudgetModel: Send + Sync {
    fn model_name(&self) -> &'static str;
    fn feature_names(&self) -> &[String];
    fn predict_batch(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>>;
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ModelFile {
    TreeEnsemble(TreeEnsembleModel),
    Linear(LinearBudgetModel),
}

/// Adapts a [`BudgetModel`] to the planner's predictor seam: aligns features,
/// runs one batch, clamps to zero and rounds to cents.
#[derive(Clone)]
pub struct ModelPredictor {
    model: Arc<dyn BudgetModel>,
}

impl ModelPredictor {
    pub fn new(model: Arc<dyn BudgetModel>) -> Self {
        Self { model }
    }

    pub fn model_name(&self) -> &'static str {
        self.model.model_name()
    }
}

impl BudgetPredictor for ModelPredictor {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let matrix = FeatureMatrix::align(rows, self.model.feature_names());
        let scores = self.model.predict_batch(&matrix)?;

        ensure!(
            scores.len() == rows.len(),
            "model {} scored {} of {} rows",
            self.model.model_name(),
            scores.len(),
            rows.len()
        );

        Ok(scores
            .into_iter()
            .map(|score| round_cents(score.max(0.0)))
            .collect())
    }
}

#[derive(Clone)]
pub struct BudgetMlStack {
    pub predictor: Arc<ModelPredictor>,
    pub fallback: bool,
    pub burn_enabled: bool,
}

impl BudgetMlStack {
    /// Loads the model at `path`, or the built-in baseline when the file does
    /// not exist. A file that exists but cannot be parsed is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelLoadError> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::from_model(
                wrap_linear(LinearBudgetModel::per_day_baseline()),
                true,
            ));
        }

        let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed: ModelFile =
            serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let model: Arc<dyn BudgetModel> = match parsed {
            ModelFile::TreeEnsemble(model) => Arc::new(model),
            ModelFile::Linear(model) => wrap_linear(model),
        };
        Ok(Self::from_model(model, false))
    }

    pub fn from_model(model: Arc<dyn BudgetModel>, fallback: bool) -> Self {
        Self {
            predictor: Arc::new(ModelPredictor::new(model)),
            fallback,
            burn_enabled: cfg!(feature = "burn-ml"),
        }
    }

    pub fn model_name(&self) -> &'static str {
        self.predictor.model_name()
    }
}

#[cfg(feature = "burn-ml")]
fn wrap_linear(model: LinearBudgetModel) -> Arc<dyn BudgetModel> {
    Arc::new(burn_impl::BurnLinearModel::new(model))
}

#[cfg(not(feature = "burn-ml"))]
fn wrap_linear(model: LinearBudgetModel) -> Arc<dyn BudgetModel> {
    Arc::new(model)
}
