// RPC 传输层 - JSON-RPC 与 REST 的统一抽象
// Provider 只依赖 RpcTransport trait，测试中可替换为脚本化实现

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{
    config::RpcConfig,
    error::{ChainError, Result},
    infrastructure::rpc_validator,
};

/// 上游节点/索引器传输
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// 所属链别名（错误标注用）
    fn chain(&self) -> &str;

    /// JSON-RPC 2.0 调用，返回 result 字段
    async fn call(&self, method: &str, params: Value) -> Result<Value>;

    /// REST GET，返回 JSON
    async fn get_json(&self, path: &str) -> Result<Value>;

    /// REST POST JSON，返回 JSON
    async fn post_json(&self, path: &str, body: Value) -> Result<Value>;

    /// REST POST 纯文本，返回纯文本
    async fn post_text(&self, path: &str, body: String) -> Result<String>;
}

/// 基于 reqwest 的 HTTP 传输
pub struct HttpTransport {
    chain: String,
    base_url: String,
    http_client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(chain: impl Into<String>, base_url: impl Into<String>, config: &RpcConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            chain: chain.into(),
            base_url: base_url.into(),
            http_client: client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.is_empty() {
            return self.base_url.clone();
        }
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn transport_err(&self, what: &str, e: reqwest::Error) -> ChainError {
        ChainError::rpc(&self.chain, format!("{}: {}", what, e))
    }

    /// 读取响应体；非 2xx 状态映射为带 HTTP 状态码的 RPC 错误
    async fn read_body(&self, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_err("Failed to read response body", e))?;

        if !status.is_success() {
            return Err(ChainError::rpc_with_code(
                &self.chain,
                i64::from(status.as_u16()),
                format!("RPC request failed with status {}: {}", status, body),
            ));
        }
        Ok(body)
    }

    fn parse_json(&self, body: &str) -> Result<Value> {
        serde_json::from_str(body).map_err(|e| {
            ChainError::rpc(&self.chain, format!("Failed to parse JSON response: {}", e))
        })
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    fn chain(&self) -> &str {
        &self.chain
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        tracing::debug!(chain = %self.chain, method = %method, "JSON-RPC request");

        let response = self
            .http_client
            .post(&self.base_url)
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.transport_err("Failed to send RPC request", e))?;

        let body = self.read_body(response).await?;
        let json = self.parse_json(&body)?;

        // 检查 JSON-RPC 错误
        rpc_validator::extract_result(&self.chain, json).map_err(|e| {
            tracing::warn!(chain = %self.chain, method = %method, error = %e, "JSON-RPC error");
            e
        })
    }

    async fn get_json(&self, path: &str) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!(chain = %self.chain, url = %url, "REST GET");

        let response = self
            .http_client
            .get(&url)
            .send()
            .await
            .map_err(|e| self.transport_err("Failed to send request", e))?;

        let body = self.read_body(response).await?;
        self.parse_json(&body)
    }

    async fn post_json(&self, path: &str, body: Value) -> Result<Value> {
        let url = self.url(path);
        tracing::debug!(chain = %self.chain, url = %url, "REST POST");

        let response = self
            .http_client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_err("Failed to send request", e))?;

        let text = self.read_body(response).await?;
        self.parse_json(&text)
    }

    async fn post_text(&self, path: &str, body: String) -> Result<String> {
        let url = self.url(path);
        tracing::debug!(chain = %self.chain, url = %url, "REST POST (text)");

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "text/plain")
            .body(body)
            .send()
            .await
            .map_err(|e| self.transport_err("Failed to send request", e))?;

        Ok(self.read_body(response).await?.trim().to_string())
    }
}

/// HTTP 404 等“资源不存在”响应
pub fn is_not_found(err: &ChainError) -> bool {
    matches!(err, ChainError::Rpc { code: Some(404), .. })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport(base: &str) -> HttpTransport {
        let config = RpcConfig {
            timeout_secs: 1,
            connect_timeout_secs: 1,
            endpoints: Default::default(),
        };
        HttpTransport::new("bitcoin", base, &config)
    }

    #[test]
    fn test_url_join() {
        let t = transport("https://blockstream.info/api/");
        assert_eq!(t.url("/tx"), "https://blockstream.info/api/tx");
        assert_eq!(t.url("blocks/tip/height"), "https://blockstream.info/api/blocks/tip/height");
        assert_eq!(t.url(""), "https://blockstream.info/api/");
    }

    #[test]
    fn test_not_found_classification() {
        assert!(is_not_found(&ChainError::rpc_with_code("bitcoin", 404, "Transaction not found")));
        assert!(!is_not_found(&ChainError::rpc_with_code("bitcoin", 500, "boom")));
        assert!(!is_not_found(&ChainError::rpc("bitcoin", "timeout")));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_chain_tagged() {
        let t = transport("http://127.0.0.1:1");
        let err = t.get_json("/blocks/tip/height").await.unwrap_err();
        assert!(err.is_rpc());
        assert!(err.to_string().contains("bitcoin"));
    }
}
