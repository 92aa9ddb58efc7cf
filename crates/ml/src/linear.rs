use anyhow::Result;
use serde::Deserialize;
use trip_core::predictor::{FEATURE_AVG_RATING, FEATURE_DAYS, FEATURE_PACKAGE_TYPE};

use crate::{BudgetModel, FeatureMatrix, ModelLoadError};

#[derive(Debug, Clone, Deserialize)]
struct LinearSpec {
    feature_names: Vec<String>,
    intercept: f64,
    weights: Vec<f64>,
}

/// `intercept + Σ weight·feature`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "LinearSpec")]
pub struct LinearBudgetModel {
    feature_names: Vec<String>,
    intercept: f64,
    weights: Vec<f64>,
}

impl LinearBudgetModel {
    pub fn new(
        feature_names: Vec<String>,
        intercept: f64,
        weights: Vec<f64>,
    ) -> Result<Self, ModelLoadError> {
        if feature_names.len() != weights.len() {
            return Err(ModelLoadError::Invalid(format!(
                "linear model has {} features but {} weights",
                feature_names.len(),
                weights.len()
            )));
        }
        Ok(Self {
            feature_names,
            intercept,
            weights,
        })
    }

    /// Built-in estimate used when no trained model is available: a day rate
    /// scaled up by package tier and rating.
    pub fn per_day_baseline() -> Self {
        Self {
            feature_names: vec![
                FEATURE_DAYS.to_string(),
                FEATURE_PACKAGE_TYPE.to_string(),
                FEATURE_AVG_RATING.to_string(),
            ],
            intercept: 2_500.0,
            weights: vec![9_500.0, 6_000.0, 1_200.0],
        }
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl TryFrom<LinearSpec> for LinearBudgetModel {
    type Error = ModelLoadError;

    fn try_from(spec: LinearSpec) -> Result<Self, Self::Error> {
        Self::new(spec.feature_names, spec.intercept, spec.weights)
    }
}

impl BudgetModel for LinearBudgetModel {
    fn model_name(&self) -> &'static str {
        "linear"
    }

    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_batch(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>> {
        Ok(matrix
            .rows()
            .map(|row| {
                self.intercept
                    + row
                        .iter()
                        .zip(self.weights.iter())
                        .map(|(value, weight)| value * weight)
                        .sum::<f64>()
            })
            .collect())
    }
}
