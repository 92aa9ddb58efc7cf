use std::fs::File;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use thiserror::Error;
use trip_core::{Catalog, EncodingError, FeatureEncoder, RawPackageRow, MAX_RATING};

/// Columns the catalog loader depends on.
pub const REQUIRED_COLUMNS: [&str; 10] = [
    "Package_ID",
    "Location_ID",
    "Package_Type",
    "Duration (Days)",
    "Budget (LKR)",
    "Avg_Rating",
    "Accommodation",
    "Food & Transport",
    "Activities",
    "Travel_Companion",
];

#[derive(Debug, Error)]
pub enum DatasetLoadError {
    #[error("dataset not found at {}", .0.display())]
    Missing(PathBuf),

    #[error("failed reading dataset {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("dataset is missing required column `{0}`")]
    MissingColumn(String),

    #[error("malformed dataset row at line {line}: {message}")]
    Malformed { line: u64, message: String },

    #[error("dataset contains no package rows")]
    Empty,

    #[error(transparent)]
    Encoding(#[from] EncodingError),
}

/// Fitted encoder plus the catalog built with it.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub encoder: FeatureEncoder,
    pub catalog: Catalog,
}

pub fn load_rows(path: impl AsRef<Path>) -> Result<Vec<RawPackageRow>, DatasetLoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => DatasetLoadError::Missing(path.to_path_buf()),
        _ => DatasetLoadError::Io {
            path: path.to_path_buf(),
            source,
        },
    })?;
    read_rows(file)
}

pub fn read_rows<R: Read>(reader: R) -> Result<Vec<RawPackageRow>, DatasetLoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|error| malformed(1, &error))?
        .clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|header| header == column) {
            return Err(DatasetLoadError::MissingColumn(column.to_string()));
        }
    }

    let mut rows = Vec::new();
    for result in reader.deserialize::<RawPackageRow>() {
        let row = result.map_err(|error| {
            let line = error.position().map(csv::Position::line).unwrap_or(0);
            malformed(line, &error)
        })?;
        let line = rows.len() as u64 + 2;

        if row.duration_days == 0 {
            return Err(DatasetLoadError::Malformed {
                line,
                message: format!("package {} has a zero-day duration", row.package_id),
            });
        }
        if !(0.0..=MAX_RATING).contains(&row.avg_rating) {
            return Err(DatasetLoadError::Malformed {
                line,
                message: format!(
                    "package {} has rating {} outside 0-5",
                    row.package_id, row.avg_rating
                ),
            });
        }
        rows.push(row);
    }

    if rows.is_empty() {
        return Err(DatasetLoadError::Empty);
    }
    Ok(rows)
}

/// Loads the dataset, fits the encoder on it and builds the catalog.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<LoadedCatalog, DatasetLoadError> {
    let rows = load_rows(path)?;
    let encoder = FeatureEncoder::fit(&rows);
    let catalog = Catalog::build(&rows, &encoder)?;
    Ok(LoadedCatalog { encoder, catalog })
}

fn malformed(line: u64, error: &csv::Error) -> DatasetLoadError {
    DatasetLoadError::Malformed {
        line,
        message: error.to_string(),
    }
}
