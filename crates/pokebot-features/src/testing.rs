//! Fake backend shared by the feature tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pokebot_core::error::{PokebotError, Result};
use pokebot_core::traits::BotApi;
use pokebot_scheduler::TargetStore;
use serde_json::Value;

type FailRule = Box<dyn Fn(&str, &Value) -> bool + Send + Sync>;

/// Records every call; answers from `data`, fails where `fail_when` says so.
#[derive(Default)]
pub(crate) struct FakeApi {
    pub calls: Mutex<Vec<(String, Value)>>,
    pub data: HashMap<String, Value>,
    pub fail_when: Option<FailRule>,
}

impl FakeApi {
    pub fn failing(rule: impl Fn(&str, &Value) -> bool + Send + Sync + 'static) -> Self {
        Self {
            fail_when: Some(Box::new(rule)),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, action: &str, data: Value) -> Self {
        self.data.insert(action.to_string(), data);
        self
    }

    pub fn calls_to(&self, action: &str) -> Vec<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(a, _)| a == action)
            .map(|(_, p)| p.clone())
            .collect()
    }
}

#[async_trait]
impl BotApi for FakeApi {
    async fn call(&self, action: &str, params: Value) -> Result<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((action.to_string(), params.clone()));
        if self.fail_when.as_ref().is_some_and(|f| f(action, &params)) {
            return Err(PokebotError::Api(format!("{action} rejected")));
        }
        Ok(self.data.get(action).cloned().unwrap_or(Value::Null))
    }
}

pub(crate) async fn temp_store(name: &str) -> (Arc<TargetStore>, PathBuf) {
    let dir = std::env::temp_dir().join(format!("pokebot-test-features-{name}"));
    std::fs::remove_dir_all(&dir).ok();
    (Arc::new(TargetStore::open(dir.join("targets.json")).await), dir)
}
