use std::ops::{Deref, DerefMut};
use std::path::PathBuf;

use anyhow::Result;
use polars::prelude::*;
use tracing::info;

use crate::fetcher::{ensure_cached, DataSource};
use crate::load::{load_csv, save_csv};
use crate::render::render_charts;

pub mod config;
pub mod error;
pub mod fetcher;
pub mod load;
pub mod render;

pub use crate::config::Settings;
pub use crate::error::TrackerError;
pub use crate::render::{SystemViewer, Viewer};

pub const LOCATION: &str = "location";
pub const DATE: &str = "date";
pub const TOTAL_CASES: &str = "total_cases";
pub const TOTAL_DEATHS: &str = "total_deaths";

/// Columns every filtered view must carry before it can be charted.
pub const REQUIRED_COLUMNS: [&str; 3] = [DATE, TOTAL_CASES, TOTAL_DEATHS];

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone)]
pub struct DataSet(pub(crate) DataFrame);

impl Deref for DataSet {
    type Target = DataFrame;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for DataSet {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

// DataSet 内部方法
impl DataSet {
    /// DataSet 转换为 CSV
    pub fn to_csv(&self) -> Result<String> {
        let mut buf = Vec::new();
        let mut df = self.0.clone();
        CsvWriter::new(&mut buf).finish(&mut df)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Rows whose `location` equals `country` exactly, in their original order.
    pub fn filter_location(&self, country: &str) -> Result<DataSet> {
        let filtered = self
            .0
            .clone()
            .lazy()
            .filter(col(LOCATION).eq(lit(country)))
            .collect()?;
        Ok(DataSet(filtered))
    }

    /// Required columns absent from this view, in `REQUIRED_COLUMNS` order.
    pub fn missing_columns(&self) -> Vec<String> {
        let names = self.get_column_names();
        REQUIRED_COLUMNS
            .iter()
            .filter(|required| !names.contains(*required))
            .map(|required| required.to_string())
            .collect()
    }

    /// Parse the `date` column from text into a date column, in place.
    pub fn normalize_dates(&mut self) -> Result<()> {
        let dates = self.column(DATE)?;
        if dates.dtype() == &DataType::Date {
            return Ok(());
        }
        let mut parsed = dates.str()?.as_date(Some(DATE_FORMAT), false)?.into_series();
        parsed.rename(DATE);
        self.0.with_column(parsed)?;
        Ok(())
    }
}

/// What the user asked for on the command line.
#[derive(Debug, Clone)]
pub struct Request {
    pub country: String,
    pub save: bool,
}

/// Result of a completed run.
#[derive(Debug)]
pub struct Outcome {
    pub rows: usize,
    pub interactive_chart: PathBuf,
    pub saved: Option<PathBuf>,
}

/// Fetch (or reuse the cache), filter by country, validate, convert dates,
/// draw the charts and optionally save the view.
///
/// Every stage is a checkpoint: the first failure ends the run and nothing
/// after it executes.
pub async fn track<V: Viewer + ?Sized>(
    settings: &Settings,
    request: &Request,
    viewer: &V,
) -> Result<Outcome> {
    let source = DataSource::new(&settings.source, settings.timeout);
    let data_file = ensure_cached(&source, &settings.data_dir, &settings.data_file).await?;

    let ds = load_csv(&data_file)?;

    let country = request.country.as_str();
    let mut view = ds.filter_location(country)?;
    if view.height() == 0 {
        return Err(TrackerError::NoData {
            country: country.to_string(),
        }
        .into());
    }
    info!("{} rows for {}", view.height(), country);

    // checked on the filtered view, so an unknown country hides a bad header
    let missing = view.missing_columns();
    if !missing.is_empty() {
        return Err(TrackerError::MissingColumns(missing).into());
    }

    view.normalize_dates()?;

    let interactive_chart = render_charts(&view, country, &settings.chart_dir, viewer)?;

    let saved = if request.save {
        let output = settings.output_path(country);
        save_csv(&view, &output)?;
        info!("Filtered data saved to {}", output.display());
        Some(output)
    } else {
        None
    };

    Ok(Outcome {
        rows: view.height(),
        interactive_chart,
        saved,
    })
}
