use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Location,
    PackageType,
    TravelCompanion,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Location => "location",
            Self::PackageType => "package type",
            Self::TravelCompanion => "travel companion",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodingError {
    #[error("unknown {category} value `{value}`")]
    UnknownCategoryValue { category: Category, value: String },

    #[error("code {code} is out of range for {category} ({classes} known classes)")]
    InvalidCode {
        category: Category,
        code: u32,
        classes: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("at least one location is required")]
    EmptyLocations,

    #[error("location identifiers must not be blank")]
    BlankLocation,

    #[error("total_days must be at least 1")]
    ZeroDays,

    #[error("rating_range must look like `min-max`, got `{0}`")]
    RatingFormat(String),

    #[error("rating {0} is outside 0.0-5.0")]
    RatingOutOfBounds(f64),

    #[error("rating minimum {min} exceeds maximum {max}")]
    RatingOrder { min: f64, max: f64 },
}

/// Failures that abort a generation call. Expected "no result" conditions are
/// returned as [`crate::PlanRejection`] instead.
#[derive(Debug, Error)]
pub enum PlannerError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Encoding(#[from] EncodingError),

    #[error("budget prediction failed: {0:#}")]
    Prediction(anyhow::Error),

    #[error("predictor returned {actual} estimates for {expected} rows")]
    PredictionCount { expected: usize, actual: usize },
}
