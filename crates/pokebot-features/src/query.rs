//! Read-only backend queries (`get`).
//!
//! `get [message id]`, `get.stat`, `get.ver`, `get.info` and `get.group [group id]`.

use std::sync::Arc;

use async_trait::async_trait;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::traits::BotApi;
use pokebot_core::types::{EventContext, id_param};
use pokebot_scheduler::is_valid_id;
use serde_json::Value;

use crate::router::{Command, Invocation};

/// Plain text for a JSON scalar; strings lose their quotes.
fn field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}

/// `key: value` lines for every field of `data` not in `skip`.
fn remaining_fields(data: &Value, skip: &[&str]) -> Vec<String> {
    data.as_object()
        .map(|map| {
            map.iter()
                .filter(|(key, _)| !skip.contains(&key.as_str()))
                .map(|(key, value)| format!("{key}: {value}"))
                .collect()
        })
        .unwrap_or_default()
}

fn status_text(data: &Value) -> String {
    let online = if data["online"].as_bool().unwrap_or(false) { "online" } else { "offline" };
    let good = if data["good"].as_bool().unwrap_or(false) { "good" } else { "degraded" };
    let mut lines = vec![format!("Status: {online} | {good}")];
    lines.extend(remaining_fields(data, &["online", "good"]));
    lines.join("\n")
}

fn version_text(data: &Value) -> String {
    let mut lines = vec![
        format!("App: {}", field(&data["app_name"])),
        format!("Version: {}", field(&data["app_version"])),
        format!("Protocol: {}", field(&data["protocol_version"])),
    ];
    lines.extend(remaining_fields(
        data,
        &["app_name", "app_version", "protocol_version"],
    ));
    lines.join("\n")
}

pub struct QueryCommand {
    api: Arc<dyn BotApi>,
}

impl QueryCommand {
    pub fn new(api: Arc<dyn BotApi>) -> Self {
        Self { api }
    }

    async fn message(&self, message_id: &str) -> Result<String> {
        let data = self
            .api
            .call("get_msg", serde_json::json!({ "message_id": id_param(message_id) }))
            .await?;
        Ok(serde_json::to_string_pretty(&data)?)
    }

    async fn group(&self, group_id: &str) -> Result<String> {
        let data = self
            .api
            .call("get_group_info", serde_json::json!({ "group_id": id_param(group_id) }))
            .await?;
        Ok(format!(
            "Group: {}({}) [{}/{}]",
            field(&data["group_name"]),
            group_id,
            field(&data["member_count"]),
            field(&data["max_member_count"])
        ))
    }
}

#[async_trait]
impl Command for QueryCommand {
    fn name(&self) -> &str {
        "get"
    }

    fn usage(&self) -> &str {
        "get [message id] | get.stat | get.ver | get.info | get.group [group id]"
    }

    async fn run(&self, invocation: &Invocation, ctx: &EventContext) -> Result<String> {
        match invocation.sub() {
            None => {
                let message_id = match invocation.arg(0) {
                    Some(id) if is_valid_id(id) => id,
                    Some(id) => {
                        return Err(PokebotError::Validation(format!("'{id}' is not a message id")));
                    }
                    None => ctx
                        .message_id
                        .as_deref()
                        .ok_or_else(|| PokebotError::Validation("usage: get <message id>".into()))?,
                };
                self.message(message_id).await
            }
            Some("stat") => {
                let data = self.api.call("get_status", serde_json::json!({})).await?;
                Ok(status_text(&data))
            }
            Some("ver") => {
                let data = self.api.call("get_version_info", serde_json::json!({})).await?;
                Ok(version_text(&data))
            }
            Some("info") => {
                let data = self.api.call("get_login_info", serde_json::json!({})).await?;
                Ok(format!(
                    "Account: {}({})",
                    field(&data["nickname"]),
                    field(&data["user_id"])
                ))
            }
            Some("group") => {
                let group_id = match invocation.arg(0) {
                    Some(id) if is_valid_id(id) => id,
                    Some(id) => {
                        return Err(PokebotError::Validation(format!("'{id}' is not a group id")));
                    }
                    None => ctx.conversation.group_id().ok_or_else(|| {
                        PokebotError::Validation("not in a group; use get.group <group id>".into())
                    })?,
                };
                self.group(group_id).await
            }
            Some(sub) => Err(PokebotError::Command(format!("unknown subcommand 'get.{sub}'"))),
        }
    }
}
