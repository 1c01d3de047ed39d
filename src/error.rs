//! Error types for the doclaynet-eval library.

use thiserror::Error;

/// Result type for doclaynet-eval operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Error types that can occur during detection evaluation.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Error during JSON parsing or serialization.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error during I/O operations.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error while reading or writing a CSV table.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// A required input location was not provided.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An expected per-image table is absent.
    #[error("Missing input: {0}")]
    MissingInput(String),

    /// An input table lacks a required column.
    #[error("Missing column '{column}' in {table}")]
    MissingColumn { table: String, column: String },

    /// Invalid annotation data.
    #[error("Invalid annotation: {0}")]
    InvalidAnnotation(String),

    /// Invalid bounding box coordinates.
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Empty dataset provided.
    #[error("Empty dataset: {0}")]
    EmptyDataset(String),

    /// Invalid IoU threshold.
    #[error("Invalid threshold: {0}")]
    InvalidThreshold(String),
}

impl EvalError {
    /// Whether the error only invalidates a single table or file.
    ///
    /// Absent files, missing columns and unparseable content are confined to
    /// the input that raised them; [`crate::aggregate::load_tables`] logs and
    /// skips those. Anything else, such as an I/O failure of the output
    /// directory, aborts the unit of work that raised it.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            EvalError::MissingInput(_)
                | EvalError::MissingColumn { .. }
                | EvalError::CsvError(_)
                | EvalError::JsonError(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_per_table_errors_are_recoverable() {
        assert!(EvalError::MissingInput("t.csv".into()).is_recoverable());

        let csv_err = csv::Reader::from_reader("IOU\n50.0\n".as_bytes())
            .deserialize::<u32>()
            .next()
            .unwrap()
            .unwrap_err();
        assert!(EvalError::from(csv_err).is_recoverable());

        let json_err = serde_json::from_str::<Vec<f64>>("not json").unwrap_err();
        assert!(EvalError::from(json_err).is_recoverable());
    }

    #[test]
    fn test_io_and_configuration_errors_are_fatal() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert!(!EvalError::from(io).is_recoverable());
        assert!(!EvalError::Configuration("no ground truth".into()).is_recoverable());
        assert!(!EvalError::InvalidThreshold("0".into()).is_recoverable());
    }
}
