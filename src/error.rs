use thiserror::Error;

/// Checkpoint failures of the tracking pipeline.
///
/// Network and parse failures are not listed here; they travel as the
/// underlying `reqwest` / `polars` errors wrapped in `anyhow`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TrackerError {
    #[error("No data found for {country}. Please check the country name.")]
    NoData { country: String },

    #[error("Missing columns in data: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("We only support http/https/file sources, got: {0}")]
    UnsupportedSource(String),
}
