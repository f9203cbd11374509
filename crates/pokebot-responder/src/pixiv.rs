//! Cached remote image list backing `{pixiv}`.
//!
//! The URL list is downloaded once, written to `pixiv.json` in the data
//! directory and reused until [`PixivImages::clear_cache`] is called.
//! Each `{pixiv}` occurrence picks its own entry and embeds it as base64.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use pokebot_core::cq;
use pokebot_core::error::{PokebotError, Result};
use rand::seq::SliceRandom;
use tokio::sync::Mutex;

use crate::template::ImageSource;

/// Lazily loaded list of image URLs with a JSON file cache.
pub struct PixivImages {
    client: reqwest::Client,
    list_url: String,
    cache_path: PathBuf,
    timeout: Duration,
    urls: Mutex<Option<Arc<Vec<String>>>>,
}

impl PixivImages {
    pub fn new(list_url: &str, cache_path: PathBuf, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            list_url: list_url.to_string(),
            cache_path,
            timeout,
            urls: Mutex::new(None),
        }
    }

    /// The URL list: memory, then disk cache, then download.
    pub async fn urls(&self) -> Result<Arc<Vec<String>>> {
        let mut slot = self.urls.lock().await;
        if let Some(urls) = slot.as_ref() {
            return Ok(urls.clone());
        }

        let urls = match self.read_cache().await {
            Some(urls) => urls,
            None => {
                let urls = self.download_list().await?;
                self.write_cache(&urls).await;
                urls
            }
        };
        let urls = Arc::new(urls);
        *slot = Some(urls.clone());
        Ok(urls)
    }

    /// Drop the cached list from memory and disk; the next use downloads again.
    pub async fn clear_cache(&self) -> Result<()> {
        *self.urls.lock().await = None;
        match tokio::fs::remove_file(&self.cache_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_cache(&self) -> Option<Vec<String>> {
        let json = tokio::fs::read_to_string(&self.cache_path).await.ok()?;
        match parse_url_list(&json) {
            Ok(urls) if !urls.is_empty() => Some(urls),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Ignoring unreadable {}: {e}", self.cache_path.display());
                None
            }
        }
    }

    async fn write_cache(&self, urls: &[String]) {
        let result = async {
            if let Some(parent) = self.cache_path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let json = serde_json::to_string(urls)?;
            tokio::fs::write(&self.cache_path, json).await?;
            Ok::<_, PokebotError>(())
        }
        .await;
        if let Err(e) = result {
            tracing::warn!("Failed to cache pixiv list: {e}");
        }
    }

    async fn download_list(&self) -> Result<Vec<String>> {
        tracing::info!("Downloading pixiv image list from {}", self.list_url);
        let body = self
            .client
            .get(&self.list_url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PokebotError::Http(format!("pixiv list request failed: {e}")))?
            .text()
            .await
            .map_err(|e| PokebotError::Http(format!("pixiv list body: {e}")))?;
        parse_url_list(&body)
    }

    async fn fetch_base64(&self, url: &str) -> Result<String> {
        let bytes = self
            .client
            .get(url)
            .timeout(self.timeout)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PokebotError::Http(format!("image request failed: {e}")))?
            .bytes()
            .await
            .map_err(|e| PokebotError::Http(format!("image body: {e}")))?;
        Ok(STANDARD.encode(&bytes))
    }
}

/// Accepts `["url", ...]` or `[{"url": "..."}, ...]`.
fn parse_url_list(json: &str) -> Result<Vec<String>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let items = value
        .as_array()
        .ok_or_else(|| PokebotError::Validation("image list is not a JSON array".into()))?;
    Ok(items
        .iter()
        .filter_map(|v| v.as_str().or_else(|| v["url"].as_str()))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}

#[async_trait]
impl ImageSource for PixivImages {
    async fn random_image(&self) -> Result<String> {
        let urls = self.urls().await?;
        let url = {
            let mut rng = rand::thread_rng();
            urls.choose(&mut rng).cloned()
        }
        .ok_or_else(|| PokebotError::Validation("pixiv image list is empty".into()))?;
        let encoded = self.fetch_base64(&url).await?;
        Ok(cq::image(&format!("base64://{encoded}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_url_list_shapes() {
        assert_eq!(
            parse_url_list(r#"["a", "", "b"]"#).unwrap(),
            vec!["a".to_string(), "b".to_string()]
        );
        assert_eq!(
            parse_url_list(r#"[{"url": "c"}, {"pid": 1}]"#).unwrap(),
            vec!["c".to_string()]
        );
        assert!(parse_url_list(r#"{"url": "c"}"#).is_err());
    }

    #[tokio::test]
    async fn test_disk_cache_is_used_and_cleared() {
        let dir = std::env::temp_dir().join("pokebot-test-pixiv");
        std::fs::create_dir_all(&dir).unwrap();
        let cache = dir.join("pixiv.json");
        std::fs::write(&cache, r#"["https://img.example/1.jpg"]"#).unwrap();

        // Unreachable list URL: only the cache can satisfy this.
        let images = PixivImages::new("http://127.0.0.1:9/list", cache.clone(), Duration::from_millis(300));
        let urls = images.urls().await.unwrap();
        assert_eq!(urls.as_slice(), ["https://img.example/1.jpg".to_string()]);

        images.clear_cache().await.unwrap();
        assert!(!cache.exists());
        assert!(images.urls().await.is_err());
        std::fs::remove_dir_all(&dir).ok();
    }
}
