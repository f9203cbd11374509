//! Hitokoto quotation client backing `{hitokoto}`.

use std::time::Duration;

use async_trait::async_trait;
use pokebot_core::error::{PokebotError, Result};

use crate::template::QuoteSource;

/// Fetches one-line quotations from a hitokoto-compatible endpoint.
pub struct HitokotoClient {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HitokotoClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.to_string(),
            timeout,
        }
    }

    /// Request URL for a raw query string such as `c=a&c=b`.
    fn url_for(&self, query: &str) -> String {
        let query = query.trim().trim_start_matches('?');
        if query.is_empty() {
            self.base_url.clone()
        } else if self.base_url.contains('?') {
            format!("{}&{}", self.base_url, query)
        } else {
            format!("{}?{}", self.base_url, query)
        }
    }
}

/// Pull the quotation out of a response body.
///
/// JSON bodies carry it in `hitokoto`; `encode=text` responses are the quote itself.
fn extract_quote(body: &str) -> Result<String> {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => json["hitokoto"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| PokebotError::Http("hitokoto response has no 'hitokoto' field".into())),
        Err(_) => Ok(body.trim().to_string()),
    }
}

#[async_trait]
impl QuoteSource for HitokotoClient {
    async fn fetch_quote(&self, query: &str) -> Result<String> {
        let url = self.url_for(query);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PokebotError::Http(format!("hitokoto request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(PokebotError::Http(format!("hitokoto returned {}", resp.status())));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| PokebotError::Http(format!("hitokoto body: {e}")))?;
        extract_quote(&body)
    }
}
