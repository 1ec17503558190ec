//! Release of uploaded order photos from object storage

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::info;

use crate::config::BlobSettings;
use crate::services::provider::{ensure_success, ProviderError, USER_AGENT};

const PROVIDER: &str = "blob-store";

#[async_trait]
pub trait PhotoStore: Send + Sync {
    /// Delete the given photos. An empty list is a no-op.
    async fn release(&self, urls: &[String]) -> Result<(), ProviderError>;

    fn name(&self) -> &'static str;
}

/// Used when no storage token is configured
#[derive(Debug, Default)]
pub struct NoopPhotoStore;

#[async_trait]
impl PhotoStore for NoopPhotoStore {
    async fn release(&self, _urls: &[String]) -> Result<(), ProviderError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    urls: &'a [String],
}

/// HTTP blob store (`POST {base}/delete`)
pub struct BlobPhotoStore {
    client: Client,
    settings: BlobSettings,
}

impl BlobPhotoStore {
    pub fn new(settings: BlobSettings) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { client, settings })
    }

    fn delete_url(&self) -> String {
        format!("{}/delete", self.settings.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl PhotoStore for BlobPhotoStore {
    async fn release(&self, urls: &[String]) -> Result<(), ProviderError> {
        if urls.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.delete_url())
            .bearer_auth(&self.settings.token)
            .json(&DeleteRequest { urls })
            .send()
            .await
            .map_err(|source| ProviderError::Transport { provider: PROVIDER, source })?;

        ensure_success(PROVIDER, response).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "blob"
    }
}

pub fn create_photo_store(settings: Option<&BlobSettings>) -> Result<Arc<dyn PhotoStore>> {
    match settings {
        Some(blob) => {
            info!("Releasing photos through blob store at {}", blob.base_url);
            Ok(Arc::new(BlobPhotoStore::new(blob.clone())?))
        }
        None => {
            info!("No blob token configured, photo release disabled");
            Ok(Arc::new(NoopPhotoStore))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> BlobSettings {
        BlobSettings {
            base_url: base_url.to_string(),
            token: "token".to_string(),
        }
    }

    #[tokio::test]
    async fn noop_store_accepts_anything() {
        let store = NoopPhotoStore;
        assert!(store.release(&["https://x/1.jpg".to_string()]).await.is_ok());
    }

    #[test]
    fn delete_url_has_single_slash() {
        let store = BlobPhotoStore::new(settings("https://blob.example/")).unwrap();
        assert_eq!(store.delete_url(), "https://blob.example/delete");
    }

    #[test]
    fn delete_body_lists_urls() {
        let urls = vec!["https://blob.example/a.jpg".to_string()];
        let json = serde_json::to_value(DeleteRequest { urls: &urls }).unwrap();
        assert_eq!(json, serde_json::json!({ "urls": ["https://blob.example/a.jpg"] }));
    }

    #[tokio::test]
    async fn empty_release_skips_the_network() {
        let store = BlobPhotoStore::new(settings("http://127.0.0.1:9")).unwrap();
        assert!(store.release(&[]).await.is_ok());
    }

    #[test]
    fn factory_without_settings_is_noop() {
        assert_eq!(create_photo_store(None).unwrap().name(), "noop");
        assert_eq!(
            create_photo_store(Some(&settings("https://blob.example"))).unwrap().name(),
            "blob"
        );
    }
}
