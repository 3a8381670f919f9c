//! Feature store
//!
//! Loads one feature table per pretrained model from the CSV files produced
//! by the featurisation pipeline. Each table is keyed by the composite
//! identity `(filename, territory_name)` and keeps the file's row order.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SearchError};

/// Header of the identity column holding the image filename
pub const FILENAME_COLUMN: &str = "filename";
/// Header of the identity column holding the display name
pub const TERRITORY_COLUMN: &str = "territory_name";

/// Composite key addressing one flag's row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Identity {
    pub filename: String,
    pub territory_name: String,
}

impl Identity {
    pub fn new(filename: impl Into<String>, territory_name: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            territory_name: territory_name.into(),
        }
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.territory_name, self.filename)
    }
}

/// Feature vectors of one model, in upstream row order
#[derive(Debug, Clone)]
pub struct FeatureSet {
    name: String,
    columns: Vec<String>,
    identities: Vec<Identity>,
    vectors: Vec<Vec<f32>>,
    by_filename: HashMap<String, usize>,
}

impl FeatureSet {
    /// Build a feature set from in-memory rows
    ///
    /// Every vector must have one value per column. Filenames must be unique
    /// and at least one row is required.
    pub fn from_rows(
        name: impl Into<String>,
        columns: Vec<String>,
        rows: Vec<(Identity, Vec<f32>)>,
    ) -> Result<Self> {
        let name = name.into();
        if columns.is_empty() {
            return Err(SearchError::load(format!("{}: no feature columns", name)));
        }
        if rows.is_empty() {
            return Err(SearchError::load(format!("{}: no rows", name)));
        }

        let mut identities = Vec::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());
        let mut by_filename = HashMap::with_capacity(rows.len());

        for (row, (identity, vector)) in rows.into_iter().enumerate() {
            if vector.len() != columns.len() {
                return Err(SearchError::load(format!(
                    "{}: row {} has {} features, expected {}",
                    name,
                    row,
                    vector.len(),
                    columns.len()
                )));
            }
            if by_filename.insert(identity.filename.clone(), row).is_some() {
                return Err(SearchError::load(format!(
                    "{}: duplicate filename {}",
                    name, identity.filename
                )));
            }
            identities.push(identity);
            vectors.push(vector);
        }

        let zero_rows = vectors
            .iter()
            .filter(|v| v.iter().all(|x| *x == 0.0))
            .count();
        if zero_rows > 0 {
            log::warn!(
                "{}: {} zero-norm feature vectors, their similarity to every other row is 0",
                name,
                zero_rows
            );
        }

        Ok(Self {
            name,
            columns,
            identities,
            vectors,
            by_filename,
        })
    }

    /// Parse a feature table from CSV
    pub fn from_reader<R: Read>(name: impl Into<String>, reader: R) -> Result<Self> {
        let name = name.into();
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| SearchError::csv(name.as_str(), e))?
            .clone();

        let position = |column: &str| {
            headers.iter().position(|h| h == column).ok_or_else(|| {
                SearchError::load(format!("{}: missing identity column '{}'", name, column))
            })
        };
        let filename_at = position(FILENAME_COLUMN)?;
        let territory_at = position(TERRITORY_COLUMN)?;

        let feature_at: Vec<usize> = (0..headers.len())
            .filter(|i| *i != filename_at && *i != territory_at)
            .collect();
        let columns: Vec<String> = feature_at.iter().map(|i| headers[*i].to_string()).collect();

        let mut rows = Vec::new();
        for (row, record) in csv_reader.records().enumerate() {
            let record = record.map_err(|e| SearchError::csv(name.as_str(), e))?;

            if record.len() != headers.len() {
                return Err(SearchError::load(format!(
                    "{}: row {} has {} cells, header has {}",
                    name,
                    row,
                    record.len(),
                    headers.len()
                )));
            }

            let identity = Identity::new(&record[filename_at], &record[territory_at]);
            let mut vector = Vec::with_capacity(feature_at.len());
            for &i in &feature_at {
                let cell = &record[i];
                let value: f32 = cell.parse().map_err(|_| {
                    SearchError::load(format!(
                        "{}: row {} column {}: '{}' is not a number",
                        name, row, &headers[i], cell
                    ))
                })?;
                if !value.is_finite() {
                    return Err(SearchError::load(format!(
                        "{}: row {} column {}: non-finite value",
                        name, row, &headers[i]
                    )));
                }
                vector.push(value);
            }

            rows.push((identity, vector));
        }

        Self::from_rows(name, columns, rows)
    }

    /// Load a feature table file; the model name is the file stem
    pub fn from_path(path: &Path) -> Result<Self> {
        let name = model_name(path)?;
        let file = File::open(path).map_err(|e| SearchError::io(path, e))?;
        let set = Self::from_reader(name, file)?;

        log::info!(
            "Loaded {} features from {} ({} rows, {}d)",
            set.name,
            path.display(),
            set.len(),
            set.dimension()
        );

        Ok(set)
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Feature column names in header order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Dimensionality of every vector in the set
    pub fn dimension(&self) -> usize {
        self.columns.len()
    }

    pub fn identity(&self, row: usize) -> Option<&Identity> {
        self.identities.get(row)
    }

    pub fn vector(&self, row: usize) -> Option<&[f32]> {
        self.vectors.get(row).map(Vec::as_slice)
    }

    /// Identities in row order
    pub fn identities(&self) -> &[Identity] {
        &self.identities
    }

    /// Iterate `(identity, vector)` pairs in row order
    pub fn rows(&self) -> impl Iterator<Item = (&Identity, &[f32])> {
        self.identities
            .iter()
            .zip(self.vectors.iter().map(Vec::as_slice))
    }

    /// Row of a filename
    pub fn position_of_filename(&self, filename: &str) -> Option<usize> {
        self.by_filename.get(filename).copied()
    }

    /// First row carrying a territory name
    pub fn position_of_territory(&self, territory: &str) -> Option<usize> {
        self.identities
            .iter()
            .position(|id| id.territory_name == territory)
    }
}

/// Model name from a feature file path (its stem)
fn model_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .ok_or_else(|| SearchError::load(format!("{}: no model name", path.display())))
}

/// All feature sets, keyed by model name
#[derive(Debug, Clone, Default)]
pub struct FeatureStore {
    sets: BTreeMap<String, FeatureSet>,
}

impl FeatureStore {
    /// Load every feature file matching a glob pattern
    ///
    /// Either every file loads or the whole call fails.
    pub fn load(pattern: &str) -> Result<Self> {
        let entries = glob::glob(pattern)
            .map_err(|e| SearchError::load(format!("Invalid pattern '{}': {}", pattern, e)))?;

        let mut paths: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| SearchError::load(e.to_string()))?;
            if path.is_file() {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(SearchError::load(format!(
                "No feature files match '{}'",
                pattern
            )));
        }

        let mut sets = Vec::with_capacity(paths.len());
        for path in &paths {
            sets.push(FeatureSet::from_path(path)?);
        }

        Self::from_sets(sets)
    }

    /// Assemble a store from already loaded sets
    pub fn from_sets(sets: impl IntoIterator<Item = FeatureSet>) -> Result<Self> {
        let mut store = Self::default();
        for set in sets {
            if store.sets.contains_key(set.name()) {
                return Err(SearchError::load(format!(
                    "Two feature files share the model name {}",
                    set.name()
                )));
            }
            store.sets.insert(set.name().to_string(), set);
        }
        Ok(store)
    }

    pub fn get(&self, model: &str) -> Option<&FeatureSet> {
        self.sets.get(model)
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Model names in sorted order
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.sets.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FeatureSet> {
        self.sets.values()
    }

    pub fn into_sets(self) -> impl Iterator<Item = FeatureSet> {
        self.sets.into_values()
    }
}
