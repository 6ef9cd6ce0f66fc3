//!
//! src/images.rs
//!
//! Stores avatar images on local disk and hands back the public url
//! of the stored copy
//!

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use crate::config::{HttpConfig, IdentityConfig, ImageStoreConfig, RetryConfig};
use crate::errors::ImportError;
use crate::fetch::{send_with_retry, wikimedia_client};
use crate::source::ImageStore;

const DEFAULT_EXTENSION: &str = "jpg";

pub struct DiskImageStore {
    http: Client,
    root: PathBuf,
    public_base: Url,
    retry: RetryConfig
}

impl DiskImageStore {
    pub fn new(http_config: &HttpConfig, id: &IdentityConfig, cfg: &ImageStoreConfig) ->
        Result<Self, ImportError> {
        Ok( Self {
            http: wikimedia_client(http_config, id)?,
            root: cfg.root.clone(),
            public_base: cfg.public_base.clone(),
            retry: http_config.retry.clone()
        })
    }

    /// Lowercase extension of the url's last path segment, `jpg` otherwise
    pub fn extension_of(source_url: &str) -> String {
        Url::parse(source_url).ok()
            .and_then(|u| {
                let last = u.path_segments()?.next_back()?.to_string();
                let (_, ext) = last.rsplit_once('.')?;
                let ext = ext.to_ascii_lowercase();
                let plausible = !ext.is_empty()
                    && ext.len() <= 5
                    && ext.chars().all(|c| c.is_ascii_alphanumeric());
                plausible.then_some(ext)
            })
            .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
    }

    /// Atomic write under the root, returns the public url
    pub fn write_image(&self, bytes: &[u8], source_url: &str) -> Result<String, ImportError> {
        let file = format!("{}.{}", Uuid::new_v4(), Self::extension_of(source_url));
        write_atomic(&self.root, &file, bytes)?;
        Ok(self.public_base.join(&file)?.to_string())
    }
}

fn write_atomic(dir: &Path, file: &str, bytes: &[u8]) -> Result<PathBuf, ImportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file);
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.persist(&path).map_err(|e| ImportError::Io(e.error))?;
    Ok(path)
}

#[async_trait]
impl ImageStore for DiskImageStore {
    async fn store(&self, source_url: &str) -> Result<String, ImportError> {
        let resp = send_with_retry(self.http.get(source_url), &self.retry).await?;
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Err(ImportError::Parse(format!("empty image at {source_url}")));
        }
        let stored = self.write_image(&bytes, source_url)?;
        debug!(source = %source_url, stored = %stored, bytes = bytes.len(), "image.stored");
        Ok(stored)
    }
}
