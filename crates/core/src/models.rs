use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ValidationError;

static RATING_RANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)?)-(\d+(?:\.\d+)?)$").expect("valid rating regex"));

pub const MAX_RATING: f64 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelCompanion {
    Solo,
    Couple,
    Family,
    Friends,
}

impl TravelCompanion {
    pub const ALL: [Self; 4] = [Self::Solo, Self::Couple, Self::Family, Self::Friends];

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "Solo" => Some(Self::Solo),
            "Couple" => Some(Self::Couple),
            "Family" => Some(Self::Family),
            "Friends" => Some(Self::Friends),
            _ => None,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn code(self) -> u8 {
        match self {
            Self::Solo => 0,
            Self::Couple => 1,
            Self::Family => 2,
            Self::Friends => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "Solo",
            Self::Couple => "Couple",
            Self::Family => "Family",
            Self::Friends => "Friends",
        }
    }
}

/// Inclusive rating band, always within `0.0..=5.0` with `min <= max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RatingRange {
    min: f64,
    max: f64,
}

impl RatingRange {
    pub fn new(min: f64, max: f64) -> Result<Self, ValidationError> {
        for value in [min, max] {
            if !(0.0..=MAX_RATING).contains(&value) {
                return Err(ValidationError::RatingOutOfBounds(value));
            }
        }
        if min > max {
            return Err(ValidationError::RatingOrder { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn contains(&self, rating: f64) -> bool {
        rating >= self.min && rating <= self.max
    }
}

impl FromStr for RatingRange {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let captures = RATING_RANGE_PATTERN
            .captures(trimmed)
            .ok_or_else(|| ValidationError::RatingFormat(trimmed.to_string()))?;

        let parse = |idx: usize| {
            captures[idx]
                .parse::<f64>()
                .map_err(|_| ValidationError::RatingFormat(trimmed.to_string()))
        };

        Self::new(parse(1)?, parse(2)?)
    }
}

impl TryFrom<String> for RatingRange {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RatingRange> for String {
    fn from(value: RatingRange) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RatingRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    pub locations: Vec<String>,
    pub package: String,
    pub total_days: u32,
    pub rating_range: RatingRange,
    /// Kept as free text so an unsupported companion surfaces as a plan
    /// rejection rather than a decode failure.
    pub travel_companion: String,
}

impl TripRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.locations.is_empty() {
            return Err(ValidationError::EmptyLocations);
        }
        if self.locations.iter().any(|loc| loc.trim().is_empty()) {
            return Err(ValidationError::BlankLocation);
        }
        if self.total_days == 0 {
            return Err(ValidationError::ZeroDays);
        }
        Ok(())
    }
}

/// One row of the raw package dataset, named after the dataset's columns.
/// Columns the catalog does not use are ignored on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPackageRow {
    #[serde(rename = "Package_ID")]
    pub package_id: String,
    #[serde(rename = "Location_ID")]
    pub location_id: String,
    #[serde(rename = "Package_Type")]
    pub package_type: String,
    #[serde(rename = "Duration (Days)")]
    pub duration_days: u32,
    #[serde(rename = "Budget (LKR)")]
    pub budget: f64,
    #[serde(rename = "Avg_Rating")]
    pub avg_rating: f64,
    #[serde(rename = "Accommodation")]
    pub accommodation: String,
    #[serde(rename = "Food & Transport")]
    pub food_transport: String,
    #[serde(rename = "Activities")]
    pub activities: String,
    #[serde(rename = "Travel_Companion")]
    pub travel_companion: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PackageRecord {
    pub package_id: String,
    pub location_code: u32,
    pub package_type_code: u32,
    pub companion_code: u8,
    pub days: u32,
    pub avg_rating: f64,
    pub rating_bucket: String,
    pub accommodation: String,
    pub food_transport: String,
    pub activities: BTreeSet<String>,
}

/// A package entry inside a generated plan, serialized with the column names
/// downstream consumers expect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    #[serde(rename = "Location")]
    pub location: String,
    #[serde(rename = "Package_ID")]
    pub package_id: String,
    #[serde(rename = "Package_Type")]
    pub package_type: String,
    #[serde(rename = "Days")]
    pub days: u32,
    #[serde(rename = "Accommodation")]
    pub accommodation: String,
    #[serde(rename = "Food & Transport")]
    pub food_transport: String,
    #[serde(rename = "Avg_Rating")]
    pub avg_rating: f64,
    #[serde(rename = "Activities")]
    pub activities: Vec<String>,
    #[serde(rename = "Predicted_Budget")]
    pub predicted_budget: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryCombination {
    pub plan: Vec<PlanEntry>,
    pub total_days: u32,
    pub total_budget: f64,
    pub travel_companion: String,
}

impl ItineraryCombination {
    pub fn package_ids(&self) -> Vec<String> {
        self.plan.iter().map(|entry| entry.package_id.clone()).collect()
    }
}

/// Returned in place of combinations when a request cannot be served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanRejection {
    InvalidCompanion,
    NoMatch,
}

impl PlanRejection {
    pub fn message(self) -> &'static str {
        match self {
            Self::InvalidCompanion => {
                "Invalid travel companion. Must be one of: Solo, Couple, Family, Friends."
            }
            Self::NoMatch => "No matching packages found for given criteria.",
        }
    }
}

impl fmt::Display for PlanRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl Serialize for PlanRejection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("PlanRejection", 1)?;
        state.serialize_field("error", self.message())?;
        state.end()
    }
}

pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
