use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors produced by the ETL pipelines.
///
/// Missing or malformed fields inside an individual vendor record are not
/// represented here: they are recovered in the transform layer by substituting
/// the column's declared default and logging the occurrence.
#[derive(Error, Debug)]
pub enum EtlError {
    /// The vendor rejected our credentials. Never retried.
    #[error("{source_name} rejected credentials (HTTP {status})")]
    Authentication { source_name: &'static str, status: u16 },

    /// The vendor kept rate-limiting us after the bounded retry budget.
    #[error("{source_name} rate limit still exceeded after {attempts} attempts")]
    QuotaExceeded {
        source_name: &'static str,
        attempts: u32,
    },

    /// A request reached the vendor but came back with a non-success status.
    #[error("request to {url} failed with HTTP {status}")]
    Api { url: String, status: u16 },

    /// A request never produced a usable response (connect, timeout, decode).
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The response body could not be read as the expected envelope at all.
    #[error("unexpected payload from {url}: {detail}")]
    UnexpectedPayload { url: String, detail: String },

    /// A row was pushed with the wrong number of cells for its table.
    #[error("row for `{entity}` has {got} cells, schema has {expected} columns")]
    RowShape {
        entity: String,
        expected: usize,
        got: usize,
    },

    /// An artifact could not be written or moved into place.
    #[error("failed to write artifact {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A run option or endpoint setting is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Pass-through for raw I/O errors that do not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Excel(#[from] rust_xlsxwriter::XlsxError),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EtlError>;
