use std::collections::BTreeSet;

use serde::Serialize;

use crate::encoder::FeatureEncoder;
use crate::error::{Category, EncodingError};
use crate::models::{PackageRecord, RawPackageRow, TravelCompanion};

const ACTIVITY_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub packages: usize,
    pub locations: usize,
    pub package_types: usize,
    pub activity_tags: usize,
}

/// Immutable package table built once from the raw dataset.
#[derive(Debug, Clone)]
pub struct Catalog {
    records: Vec<PackageRecord>,
    activity_tags: Vec<String>,
    location_count: usize,
    package_type_count: usize,
}

impl Catalog {
    pub fn build(rows: &[RawPackageRow], encoder: &FeatureEncoder) -> Result<Self, EncodingError> {
        let mut records = Vec::with_capacity(rows.len());
        let mut activity_tags = BTreeSet::new();

        for row in rows {
            let companion = TravelCompanion::parse(&row.travel_companion).ok_or_else(|| {
                EncodingError::UnknownCategoryValue {
                    category: Category::TravelCompanion,
                    value: row.travel_companion.clone(),
                }
            })?;

            let activities = split_activities(&row.activities);
            activity_tags.extend(activities.iter().cloned());

            records.push(PackageRecord {
                package_id: row.package_id.trim().to_string(),
                location_code: encoder.encode(Category::Location, &row.location_id)?,
                package_type_code: encoder.encode(Category::PackageType, &row.package_type)?,
                companion_code: companion.code(),
                days: row.duration_days,
                avg_rating: row.avg_rating,
                rating_bucket: rating_bucket(row.avg_rating),
                accommodation: row.accommodation.trim().to_string(),
                food_transport: row.food_transport.trim().to_string(),
                activities,
            });
        }

        Ok(Self {
            records,
            activity_tags: activity_tags.into_iter().collect(),
            location_count: encoder.locations().len(),
            package_type_count: encoder.package_types().len(),
        })
    }

    pub fn records(&self) -> &[PackageRecord] {
        &self.records
    }

    pub fn activity_tags(&self) -> &[String] {
        &self.activity_tags
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn for_companion(
        &self,
        companion: TravelCompanion,
    ) -> impl Iterator<Item = &PackageRecord> + '_ {
        let code = companion.code();
        self.records
            .iter()
            .filter(move |record| record.companion_code == code)
    }

    pub fn stats(&self) -> CatalogStats {
        CatalogStats {
            packages: self.records.len(),
            locations: self.location_count,
            package_types: self.package_type_count,
            activity_tags: self.activity_tags.len(),
        }
    }
}

/// `3.7` falls in the `"3-4"` bucket.
pub fn rating_bucket(rating: f64) -> String {
    let floor = rating.floor() as i64;
    format!("{}-{}", floor, floor + 1)
}

fn split_activities(raw: &str) -> BTreeSet<String> {
    raw.split(ACTIVITY_SEPARATOR)
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(ToString::to_string)
        .collect()
}
