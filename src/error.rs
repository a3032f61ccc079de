// src/error.rs

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    /// Bad or missing run configuration. Raised before any output file is opened.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A biomarker-result row that does not have the expected shape.
    #[error("malformed row at {}:{line}: {reason}", path.display())]
    MalformedRow {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("invalid biom table: {0}")]
    InvalidBiomFormat(String),

    /// HSV component or scaling factor outside its domain.
    #[error("{what} value out of range ({min}, {max}): {value}")]
    OutOfRange {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
