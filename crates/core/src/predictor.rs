use std::collections::BTreeMap;

use anyhow::Result;

use crate::models::PackageRecord;

pub const FEATURE_LOCATION: &str = "Location_ID";
pub const FEATURE_PACKAGE_TYPE: &str = "Package_Type";
pub const FEATURE_DAYS: &str = "Days";
pub const FEATURE_AVG_RATING: &str = "Avg_Rating";
pub const FEATURE_TRAVEL_COMPANION: &str = "Travel_Companion";

/// Named numeric inputs for one candidate. Absent features read as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureRow {
    values: BTreeMap<String, f64>,
}

impl FeatureRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: f64) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> f64 {
        self.values.get(name).copied().unwrap_or(0.0)
    }
}

impl From<&PackageRecord> for FeatureRow {
    fn from(record: &PackageRecord) -> Self {
        let mut row = FeatureRow::new();
        row.set(FEATURE_LOCATION, f64::from(record.location_code));
        row.set(FEATURE_PACKAGE_TYPE, f64::from(record.package_type_code));
        row.set(FEATURE_DAYS, f64::from(record.days));
        row.set(FEATURE_AVG_RATING, record.avg_rating);
        row.set(FEATURE_TRAVEL_COMPANION, f64::from(record.companion_code));
        for activity in &record.activities {
            row.set(activity.clone(), 1.0);
        }
        row
    }
}

/// Cost estimation seam. Implementations return one non-negative estimate per
/// row, rounded to cents.
pub trait BudgetPredictor: Send + Sync {
    fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>>;
}
