use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DATA_URL: &str = "https://covid.ourworldindata.org/data/owid-covid-data.csv";
pub const DATA_DIR: &str = "data";
pub const DATA_FILE: &str = "owid-covid-data.csv";
pub const OUTPUT_DIR: &str = "output";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Locations and limits used by one tracker run.
///
/// Everything the pipeline would otherwise take from the working directory
/// lives here, so tests can point each stage at a scratch folder.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: String,
    pub timeout: Duration,
    pub data_dir: PathBuf,
    pub data_file: String,
    pub output_dir: PathBuf,
    pub chart_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            source: DATA_URL.to_string(),
            timeout: FETCH_TIMEOUT,
            data_dir: PathBuf::from(DATA_DIR),
            data_file: DATA_FILE.to_string(),
            output_dir: PathBuf::from(OUTPUT_DIR),
            chart_dir: std::env::temp_dir().join("covid-tracker"),
        }
    }
}

impl Settings {
    /// Settings rooted at `root`: `data/`, `output/` and `charts/` below it.
    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            data_dir: root.join(DATA_DIR),
            output_dir: root.join(OUTPUT_DIR),
            chart_dir: root.join("charts"),
            ..Self::default()
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Full path of the cached dataset.
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join(&self.data_file)
    }

    /// Destination of the saved per-country subset.
    pub fn output_path(&self, country: &str) -> PathBuf {
        self.output_dir.join(format!("{}_covid_data.csv", country))
    }
}
