//! 测试辅助模块
//! 提供脚本化 RPC 传输和常用链配置

#![allow(dead_code)]

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use serde_json::Value;
use txforge::{
    domain::{ChainConfig, ChainRegistry},
    error::{ChainError, Result},
    service::{
        provider_factory::ProviderFactory, providers::ChainProvider, rpc_transport::RpcTransport,
    },
};

/// 脚本化传输
///
/// 响应按键排队：JSON-RPC 用方法名，REST 用 `"GET /path"` / `"POST /path"`。
/// 队列耗尽后重复最近返回的一条，直到再次 `on()` 排入新响应。
pub struct MockTransport {
    chain: String,
    responses: Mutex<HashMap<String, Script>>,
    calls: Mutex<Vec<(String, Value)>>,
}

impl MockTransport {
    pub fn new(chain: &str) -> Arc<Self> {
        Arc::new(Self {
            chain: chain.to_string(),
            responses: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn on(&self, key: &str, response: Value) -> &Self {
        self.push(key, Ok(response))
    }

    pub fn on_error(&self, key: &str, error: ChainError) -> &Self {
        self.push(key, Err(error))
    }

    fn push(&self, key: &str, response: Result<Value>) -> &Self {
        self.responses
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default()
            .queue
            .push_back(response);
        self
    }

    /// 已调用的键（按顺序）
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// 某个键最近一次调用的参数
    pub fn last_params(&self, key: &str) -> Option<Value> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, params)| params.clone())
    }

    fn respond(&self, key: String, params: Value) -> Result<Value> {
        self.calls.lock().unwrap().push((key.clone(), params));

        let mut responses = self.responses.lock().unwrap();
        let script = responses.get_mut(&key).ok_or_else(|| {
            ChainError::rpc(&self.chain, format!("no scripted response for {}", key))
        })?;
        match script.queue.pop_front() {
            Some(response) => {
                script.last = Some(response.clone());
                response
            }
            None => script.last.clone().unwrap_or_else(|| {
                Err(ChainError::rpc(&self.chain, format!("no scripted response for {}", key)))
            }),
        }
    }
}

#[derive(Default)]
struct Script {
    queue: VecDeque<Result<Value>>,
    last: Option<Result<Value>>,
}

#[async_trait]
impl RpcTransport for MockTransport {
    fn chain(&self) -> &str {
        &self.chain
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        self.respond(method.to_string(), params)
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        self.respond(format!("GET {}", path), Value::Null)
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value> {
        self.respond(format!("POST {}", path), body)
    }

    async fn post_text(&self, path: &str, body: String) -> Result<String> {
        let value = self.respond(format!("POST {}", path), Value::String(body))?;
        Ok(value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()))
    }
}

pub fn chain_config(alias: &str) -> ChainConfig {
    ChainRegistry::new().get(alias).unwrap().clone()
}

/// 使用脚本化传输的 Provider
pub fn provider(alias: &str, transport: &Arc<MockTransport>) -> Arc<dyn ChainProvider> {
    ProviderFactory::with_transport(chain_config(alias), transport.clone())
}
