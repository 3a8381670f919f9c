//! Error types for flagsearch-core

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading feature sets or answering queries
#[derive(Debug, Error)]
pub enum SearchError {
    /// Malformed or inconsistent feature files. Fatal at startup.
    #[error("Load error: {0}")]
    Load(String),

    /// A feature file could not be opened or read
    #[error("I/O error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A feature file is not well-formed CSV
    #[error("CSV error in {model}: {source}")]
    Csv {
        model: String,
        #[source]
        source: csv::Error,
    },

    /// Query vector dimensionality does not match the index
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    /// Identity is not a column of a similarity matrix
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    /// Territory is missing from a model's feature set
    #[error("Unknown territory '{territory}' in model {model}")]
    UnknownTerritory { territory: String, model: String },

    /// Method string is neither "knn" nor "cosine"
    #[error("Invalid search method '{0}': expected \"knn\" or \"cosine\"")]
    InvalidMethod(String),
}

impl SearchError {
    /// Create a load error
    pub fn load(msg: impl Into<String>) -> Self {
        Self::Load(msg.into())
    }

    /// Create an I/O error for a feature file
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a CSV parse error for a model's table
    pub fn csv(model: impl Into<String>, source: csv::Error) -> Self {
        Self::Csv {
            model: model.into(),
            source,
        }
    }

    /// Create an unknown identity error
    pub fn unknown_identity(id: impl Into<String>) -> Self {
        Self::UnknownIdentity(id.into())
    }

    /// Create an unknown territory error
    pub fn unknown_territory(territory: impl Into<String>, model: impl Into<String>) -> Self {
        Self::UnknownTerritory {
            territory: territory.into(),
            model: model.into(),
        }
    }

    /// Create an invalid method error
    pub fn invalid_method(method: impl Into<String>) -> Self {
        Self::InvalidMethod(method.into())
    }

    /// Whether the error was caused by the caller's query rather than the data
    pub fn is_query_error(&self) -> bool {
        matches!(
            self,
            Self::Dimension { .. }
                | Self::UnknownIdentity(_)
                | Self::UnknownTerritory { .. }
                | Self::InvalidMethod(_)
        )
    }
}

/// Result type for search operations
pub type Result<T> = std::result::Result<T, SearchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_territory_display() {
        let err = SearchError::unknown_territory("Atlantis", "VGG16");
        assert_eq!(
            err.to_string(),
            "Unknown territory 'Atlantis' in model VGG16"
        );
    }

    #[test]
    fn test_dimension_display() {
        let err = SearchError::Dimension {
            expected: 3,
            actual: 2,
        };
        assert_eq!(err.to_string(), "Dimension mismatch: expected 3, got 2");
    }

    #[test]
    fn test_query_error_classification() {
        assert!(SearchError::invalid_method("euclidean").is_query_error());
        assert!(SearchError::unknown_identity("France").is_query_error());
        assert!(!SearchError::load("bad header").is_query_error());
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert!(!SearchError::io("VGG16.csv", io).is_query_error());
    }

    #[test]
    fn test_io_error_keeps_source() {
        use std::error::Error as _;

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SearchError::io("data/VGG16.csv", io);
        assert_eq!(err.to_string(), "I/O error reading data/VGG16.csv: denied");
        assert!(err.source().is_some());
    }
}
