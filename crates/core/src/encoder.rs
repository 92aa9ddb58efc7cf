use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Category, EncodingError};
use crate::models::{RawPackageRow, TravelCompanion};

/// Sorted class list; a value's code is its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelClasses {
    classes: Vec<String>,
}

impl LabelClasses {
    pub fn fit<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes = values
            .into_iter()
            .map(|value| value.as_ref().trim().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        Self { classes }
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    fn encode(&self, category: Category, value: &str) -> Result<u32, EncodingError> {
        self.classes
            .binary_search_by(|class| class.as_str().cmp(value.trim()))
            .map(|idx| idx as u32)
            .map_err(|_| EncodingError::UnknownCategoryValue {
                category,
                value: value.to_string(),
            })
    }

    fn decode(&self, category: Category, code: u32) -> Result<&str, EncodingError> {
        self.classes
            .get(code as usize)
            .map(String::as_str)
            .ok_or(EncodingError::InvalidCode {
                category,
                code,
                classes: self.classes.len(),
            })
    }
}

/// Fit-once mapping between categorical values and model codes. Location and
/// package-type classes are learned; companion codes are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    locations: LabelClasses,
    package_types: LabelClasses,
}

impl FeatureEncoder {
    pub fn fit(rows: &[RawPackageRow]) -> Self {
        Self {
            locations: LabelClasses::fit(rows.iter().map(|row| row.location_id.as_str())),
            package_types: LabelClasses::fit(rows.iter().map(|row| row.package_type.as_str())),
        }
    }

    pub fn from_classes<L, P>(locations: L, package_types: P) -> Self
    where
        L: IntoIterator,
        L::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        Self {
            locations: LabelClasses::fit(locations),
            package_types: LabelClasses::fit(package_types),
        }
    }

    pub fn locations(&self) -> &LabelClasses {
        &self.locations
    }

    pub fn package_types(&self) -> &LabelClasses {
        &self.package_types
    }

    pub fn encode(&self, category: Category, value: &str) -> Result<u32, EncodingError> {
        match category {
            Category::Location => self.locations.encode(category, value),
            Category::PackageType => self.package_types.encode(category, value),
            Category::TravelCompanion => TravelCompanion::parse(value)
                .map(|companion| u32::from(companion.code()))
                .ok_or_else(|| EncodingError::UnknownCategoryValue {
                    category,
                    value: value.to_string(),
                }),
        }
    }

    pub fn decode(&self, category: Category, code: u32) -> Result<String, EncodingError> {
        match category {
            Category::Location => self.locations.decode(category, code).map(str::to_string),
            Category::PackageType => self
                .package_types
                .decode(category, code)
                .map(str::to_string),
            Category::TravelCompanion => u8::try_from(code)
                .ok()
                .and_then(TravelCompanion::from_code)
                .map(|companion| companion.as_str().to_string())
                .ok_or(EncodingError::InvalidCode {
                    category,
                    code,
                    classes: TravelCompanion::ALL.len(),
                }),
        }
    }
}
