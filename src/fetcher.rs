use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::fs;
use tracing::info;

use crate::error::TrackerError;

// rust 的 async trait 还没有稳定，可以用async_trait 宏
#[async_trait]
pub trait Fetch {
    type Error;
    async fn fetch(&self) -> Result<Vec<u8>, Self::Error>;
}

/// Any source the tracker can read the dataset from: `http(s)://` or `file://`.
pub struct DataSource<'a> {
    pub location: &'a str,
    pub timeout: Duration,
}

impl<'a> DataSource<'a> {
    pub fn new(location: &'a str, timeout: Duration) -> Self {
        Self { location, timeout }
    }
}

#[async_trait]
impl<'a> Fetch for DataSource<'a> {
    type Error = anyhow::Error;

    async fn fetch(&self) -> Result<Vec<u8>, Self::Error> {
        let name = self.location;
        info!("Downloading data from: {}", name);
        if name.starts_with("http://") || name.starts_with("https://") {
            UrlFetcher {
                url: name,
                timeout: self.timeout,
            }
            .fetch()
            .await
        } else if let Some(path) = name.strip_prefix("file://") {
            FileFetcher(path).fetch().await
        } else {
            Err(TrackerError::UnsupportedSource(name.to_string()).into())
        }
    }
}

struct UrlFetcher<'a> {
    url: &'a str,
    timeout: Duration,
}

#[async_trait]
impl<'a> Fetch for UrlFetcher<'a> {
    type Error = anyhow::Error;

    async fn fetch(&self) -> Result<Vec<u8>, Self::Error> {
        let client = reqwest::Client::builder().timeout(self.timeout).build()?;
        let resp = client.get(self.url).send().await?.error_for_status()?;
        Ok(resp.bytes().await?.to_vec())
    }
}

struct FileFetcher<'a>(pub(crate) &'a str);

#[async_trait]
impl<'a> Fetch for FileFetcher<'a> {
    type Error = anyhow::Error;

    async fn fetch(&self) -> Result<Vec<u8>, Self::Error> {
        fs::read(self.0)
            .await
            .with_context(|| format!("failed to read {}", self.0))
    }
}

/// Make sure `dir/file_name` exists, downloading it through `fetcher` only
/// when it is missing. An existing file is returned as is, however old.
pub async fn ensure_cached<F>(fetcher: &F, dir: &Path, file_name: &str) -> Result<PathBuf>
where
    F: Fetch<Error = anyhow::Error> + Sync,
{
    let path = dir.join(file_name);
    if fs::try_exists(&path)
        .await
        .with_context(|| format!("failed to inspect {}", path.display()))?
    {
        info!("Using existing local data: {}", path.display());
        return Ok(path);
    }

    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let body = fetcher.fetch().await.context("Error downloading data")?;
    fs::write(&path, &body)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Download complete: {} ({} bytes)", path.display(), body.len());

    Ok(path)
}
