//! OneBot v11 HTTP API client.
//!
//! Every action is `POST {api_url}/{action}` with a JSON body; the reply is
//! `{"status": "ok"|"async"|"failed", "retcode": 0, "data": ...}`.

use std::time::Duration;

use async_trait::async_trait;
use pokebot_core::config::OneBotConfig;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::traits::{BotApi, MessageSink};
use pokebot_core::types::{Conversation, id_param};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct ActionResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    retcode: i64,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    wording: Option<String>,
}

impl ActionResponse {
    fn into_data(self, action: &str) -> Result<Value> {
        let accepted = matches!(self.status.as_str(), "ok" | "async");
        if !accepted || self.retcode != 0 {
            let reason = self
                .wording
                .or(self.message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| format!("status '{}'", self.status));
            return Err(PokebotError::Api(format!(
                "{action} failed (retcode {}): {reason}",
                self.retcode
            )));
        }
        Ok(self.data)
    }
}

/// HTTP client for one OneBot implementation.
pub struct OneBotClient {
    client: reqwest::Client,
    api_url: String,
    access_token: Option<String>,
    timeout: Duration,
}

impl OneBotClient {
    pub fn new(config: &OneBotConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone().filter(|t| !t.is_empty()),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
        }
    }

    fn action_url(&self, action: &str) -> String {
        format!("{}/{}", self.api_url, action)
    }

    /// Account info of the logged-in bot (`get_login_info`).
    pub async fn login_id(&self) -> Result<String> {
        let data = self.call("get_login_info", serde_json::json!({})).await?;
        match &data["user_id"] {
            Value::Number(n) => Ok(n.to_string()),
            Value::String(s) if !s.is_empty() => Ok(s.clone()),
            _ => Err(PokebotError::Api("get_login_info returned no user_id".into())),
        }
    }
}

#[async_trait]
impl BotApi for OneBotClient {
    async fn call(&self, action: &str, params: Value) -> Result<Value> {
        tracing::debug!("OneBot call {action} {params}");
        let mut request = self
            .client
            .post(self.action_url(action))
            .timeout(self.timeout)
            .json(&params);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PokebotError::Http(format!("{action} request failed: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PokebotError::Http(format!("{action} returned HTTP {status}")));
        }

        let body: ActionResponse = response
            .json()
            .await
            .map_err(|e| PokebotError::Api(format!("invalid {action} response: {e}")))?;
        body.into_data(action)
    }
}

#[async_trait]
impl MessageSink for OneBotClient {
    async fn send(&self, conversation: &Conversation, content: &str) -> Result<Vec<String>> {
        let (action, params) = match conversation {
            Conversation::Private { user_id } => (
                "send_private_msg",
                serde_json::json!({ "user_id": id_param(user_id), "message": content }),
            ),
            Conversation::Group { group_id } => (
                "send_group_msg",
                serde_json::json!({ "group_id": id_param(group_id), "message": content }),
            ),
        };
        let data = self.call(action, params).await?;
        Ok(match &data["message_id"] {
            Value::Number(n) => vec![n.to_string()],
            Value::String(s) => vec![s.clone()],
            _ => Vec::new(),
        })
    }
}
