pub mod catalog;
pub mod encoder;
pub mod error;
pub mod models;
pub mod planner;
pub mod predictor;
pub mod sampling;

pub use catalog::{rating_bucket, Catalog, CatalogStats};
pub use encoder::{FeatureEncoder, LabelClasses};
pub use error::{Category, EncodingError, PlannerError, ValidationError};
pub use models::*;
pub use planner::{
    allocate_days, select_packages, Candidate, GenerationReport, ItineraryAssembler,
    LocationResolution, LocationSelection, PlanOutcome, SkipReason, SkippedPackage, TrialReport,
    DEFAULT_MAX_OPTIONS, SAMPLE_SIZE,
};
pub use predictor::{BudgetPredictor, FeatureRow};
pub use sampling::{RandomSource, RngSource};
