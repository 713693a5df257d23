use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StreambillError>;

/// Errors surfaced by the library.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StreambillError {
    /// The draft failed composer validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The draft references settings entries that no longer exist.
    #[error("missing data: {} not found", .missing.join(", "))]
    MissingData { missing: Vec<&'static str> },

    /// Nothing has been composed yet.
    #[error("no draft invoice saved")]
    NoDraft,

    /// Expiry date fell outside the representable calendar range.
    #[error("expiry date out of range for {months} months after {issue_date}")]
    DateOutOfRange {
        issue_date: chrono::NaiveDate,
        months: f64,
    },

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("template error: {0}")]
    Template(#[from] tera::Error),
}

impl StreambillError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Blocking, user-correctable problems with the draft form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Please ensure Business, Package, and Customer ID are filled.")]
    MissingRequired,

    #[error("Please fill in the Custom Package Name and Price.")]
    CustomPackageIncomplete,
}
