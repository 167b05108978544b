//! Object storage used by the upload handler

use anyhow::{Context, Result, bail};
use async_trait::async_trait;

use crate::config::StorageConfig;

/// A bucket-qualified object name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectLocation {
    pub bucket: String,
    pub name: String,
}

impl ObjectLocation {
    pub fn new(bucket: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ObjectLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "gs://{}/{}", self.bucket, self.name)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Copy an object, overwriting the destination
    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()>;

    async fn delete(&self, location: &ObjectLocation) -> Result<()>;
}

/// Cloud Storage JSON API client
#[derive(Debug, Clone)]
pub struct GcsClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl GcsClient {
    pub fn new(http: reqwest::Client, config: &StorageConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        }
    }

    fn object_url(&self, location: &ObjectLocation) -> String {
        format!(
            "{}/storage/v1/b/{}/o/{}",
            self.base_url,
            urlencoding::encode(&location.bucket),
            urlencoding::encode(&location.name)
        )
    }
}

#[async_trait]
impl ObjectStore for GcsClient {
    async fn copy(&self, from: &ObjectLocation, to: &ObjectLocation) -> Result<()> {
        let url = format!(
            "{}/copyTo/b/{}/o/{}",
            self.object_url(from),
            urlencoding::encode(&to.bucket),
            urlencoding::encode(&to.name)
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_LENGTH, 0)
            .send()
            .await
            .with_context(|| format!("Failed to copy {} to {}", from, to))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Storage returned {} copying {} to {}: {}", status, from, to, text);
        }

        log::debug!("Copied {} to {}", from, to);
        Ok(())
    }

    async fn delete(&self, location: &ObjectLocation) -> Result<()> {
        let response = self
            .http
            .delete(self.object_url(location))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .with_context(|| format!("Failed to delete {}", location))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!("Storage returned {} deleting {}: {}", status, location, text);
        }

        log::debug!("Deleted {}", location);
        Ok(())
    }
}
