//! Collaborator interfaces the engine is driven through.
//!
//! The transport (OneBot HTTP, a test fake, ...) implements these; the
//! responder and scheduler crates only ever see the traits.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{PokebotError, Result};
use crate::types::{Conversation, EventContext};

/// Raw action interface of the messaging backend.
#[async_trait]
pub trait BotApi: Send + Sync {
    /// Invoke a named backend action and return its `data` payload.
    async fn call(&self, action: &str, params: Value) -> Result<Value>;

    /// Ids of every group the bot account is in.
    async fn group_list(&self) -> Result<Vec<String>> {
        let data = self.call("get_group_list", serde_json::json!({})).await?;
        collect_ids(&data, "group_id")
    }

    /// Ids of every friend of the bot account.
    async fn friend_list(&self) -> Result<Vec<String>> {
        let data = self.call("get_friend_list", serde_json::json!({})).await?;
        collect_ids(&data, "user_id")
    }
}

/// Outbound message interface.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send one message and return the ids the backend assigned to it.
    async fn send(&self, conversation: &Conversation, content: &str) -> Result<Vec<String>>;
}

/// Re-entry point into the command router.
#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `command` on behalf of `ctx.user_id`.
    ///
    /// `triggered_by_system` is set when an automatic response issued the
    /// command; the router must then skip (and not record) its cooldown.
    /// Returns the reply text the command produced, if any.
    async fn execute(
        &self,
        command: &str,
        ctx: &EventContext,
        triggered_by_system: bool,
    ) -> Result<Option<String>>;
}

/// Pull `key` out of every object in a JSON array, accepting numbers or strings.
pub fn collect_ids(data: &Value, key: &str) -> Result<Vec<String>> {
    let items = data
        .as_array()
        .ok_or_else(|| PokebotError::Api(format!("expected a list of objects with '{key}'")))?;
    Ok(items
        .iter()
        .filter_map(|item| match &item[key] {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StaticApi(Value);

    #[async_trait]
    impl BotApi for StaticApi {
        async fn call(&self, _action: &str, _params: Value) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_collect_ids_mixed() {
        let data = serde_json::json!([
            {"group_id": 123, "group_name": "a"},
            {"group_id": "456"},
            {"group_name": "no id"}
        ]);
        assert_eq!(collect_ids(&data, "group_id").unwrap(), vec!["123", "456"]);
    }

    #[test]
    fn test_collect_ids_not_array() {
        assert!(collect_ids(&serde_json::json!({"x": 1}), "group_id").is_err());
    }

    #[tokio::test]
    async fn test_default_group_list() {
        let api = StaticApi(serde_json::json!([{"group_id": 7}, {"group_id": 8}]));
        assert_eq!(api.group_list().await.unwrap(), vec!["7", "8"]);
    }
}
