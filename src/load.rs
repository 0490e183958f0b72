use std::fs::{self, File};
use std::path::Path;

use anyhow::{Context, Result};
use polars::prelude::*;
use tracing::info;

use crate::DataSet;

/// Read the whole CSV file, inferring column types from every row.
pub fn load_csv(path: &Path) -> Result<DataSet> {
    let df = CsvReader::from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .has_header(true)
        .infer_schema(None)
        .finish()?;
    info!("loaded {} rows x {} columns from {}", df.height(), df.width(), path.display());
    Ok(DataSet(df))
}

/// Write `ds` to `path`, creating the parent folder when needed.
pub fn save_csv(ds: &DataSet, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file =
        File::create(path).with_context(|| format!("failed to create {}", path.display()))?;
    let mut df = ds.0.clone();
    CsvWriter::new(&mut file).finish(&mut df)?;
    Ok(())
}
