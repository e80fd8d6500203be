//! 配置管理模块
//! 支持从环境变量和配置文件加载配置

use std::{collections::HashMap, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::utils::chain_normalizer;

/// 应用配置结构体
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rpc: RpcConfig,
    #[serde(default)]
    pub utxo: UtxoConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String, // "json" or "text"
}

/// RPC 传输配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// 链别名 → RPC URL 覆盖
    #[serde(default)]
    pub endpoints: HashMap<String, String>,
}

/// UTXO 选币配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UtxoConfig {
    pub min_confirmations: u32,
    /// satoshi
    pub dust_threshold: u64,
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

/// `solana-devnet` → `SOLANA_DEVNET_RPC_URL`
fn endpoint_env_key(alias: &str) -> String {
    format!("{}_RPC_URL", alias.replace('-', "_").to_uppercase())
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".into()),
        }
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        let endpoints = chain_normalizer::canonical_names()
            .into_iter()
            .filter_map(|alias| {
                std::env::var(endpoint_env_key(alias))
                    .ok()
                    .filter(|url| !url.trim().is_empty())
                    .map(|url| (alias.to_string(), url))
            })
            .collect();

        Self {
            timeout_secs: env_parse("RPC_TIMEOUT_SECS").unwrap_or(30),
            connect_timeout_secs: env_parse("RPC_CONNECT_TIMEOUT_SECS").unwrap_or(10),
            endpoints,
        }
    }
}

impl Default for UtxoConfig {
    fn default() -> Self {
        Self {
            min_confirmations: env_parse("UTXO_MIN_CONFIRMATIONS").unwrap_or(1),
            dust_threshold: env_parse("UTXO_DUST_THRESHOLD").unwrap_or(546),
        }
    }
}

impl Config {
    /// 从环境变量加载配置
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            logging: LoggingConfig::default(),
            rpc: RpcConfig::default(),
            utxo: UtxoConfig::default(),
        })
    }

    /// 从配置文件加载配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file as TOML")?;

        Ok(config)
    }

    /// 从环境变量和配置文件合并加载（配置文件优先级更高）
    pub fn from_env_and_file<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        let mut config = Self::from_env()?;

        if let Some(path) = path {
            if path.as_ref().exists() {
                let file_config = Self::from_file(path)?;
                // 端点按别名合并，其余整段覆盖
                let mut endpoints = config.rpc.endpoints;
                endpoints.extend(file_config.rpc.endpoints.clone());
                config = file_config;
                config.rpc.endpoints = endpoints;
            }
        }

        Ok(config)
    }

    /// 加载 `.env`（若存在）后合并环境变量与配置文件，并校验
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_env_and_file(path)?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    /// 验证配置有效性
    pub fn validate(&self) -> Result<()> {
        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("LOG_LEVEL must be one of: {:?}", valid_levels);
        }

        // 验证日志格式
        if self.logging.format != "json" && self.logging.format != "text" {
            anyhow::bail!("LOG_FORMAT must be 'json' or 'text'");
        }

        if self.rpc.timeout_secs == 0 || self.rpc.connect_timeout_secs == 0 {
            anyhow::bail!("RPC timeouts must be greater than zero");
        }

        for (alias, url) in &self.rpc.endpoints {
            chain_normalizer::normalize_chain_identifier(alias)
                .with_context(|| format!("Unknown chain in rpc.endpoints: {}", alias))?;
            if !url.starts_with("http://") && !url.starts_with("https://") {
                anyhow::bail!("RPC endpoint for {} must be an http(s) URL", alias);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    #[test]
    fn test_endpoint_env_key() {
        assert_eq!(endpoint_env_key("solana-devnet"), "SOLANA_DEVNET_RPC_URL");
        assert_eq!(endpoint_env_key("xrp"), "XRP_RPC_URL");
    }

    #[test]
    fn test_config_from_env() {
        std::env::set_var("KUSAMA_RPC_URL", "https://kusama.example.org");
        let config = Config::from_env().unwrap();
        assert_eq!(
            config.rpc.endpoints.get("kusama").map(String::as_str),
            Some("https://kusama.example.org")
        );
        std::env::remove_var("KUSAMA_RPC_URL");
    }

    #[test]
    fn test_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[logging]
level = "debug"
format = "json"

[rpc]
timeout_secs = 5
connect_timeout_secs = 2

[rpc.endpoints]
solana = "https://solana.example.org"

[utxo]
min_confirmations = 3
dust_threshold = 1000
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.rpc.timeout_secs, 5);
        assert_eq!(
            config.rpc.endpoints.get("solana").map(String::as_str),
            Some("https://solana.example.org")
        );
        assert_eq!(config.utxo.min_confirmations, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"\nformat = \"text\"").unwrap();

        let config = Config::from_env_and_file(Some(file.path())).unwrap();
        assert_eq!(config.logging.level, "warn");
        assert!(config.rpc.timeout_secs > 0);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config {
            logging: LoggingConfig {
                level: "info".into(),
                format: "text".into(),
            },
            ..Config::default()
        };
        config.rpc.timeout_secs = 30;
        config.rpc.connect_timeout_secs = 10;
        config.rpc.endpoints.clear();
        assert!(config.validate().is_ok());

        config.logging.format = "xml".into();
        assert!(config.validate().is_err());
        config.logging.format = "text".into();

        config
            .rpc
            .endpoints
            .insert("dogecoin".into(), "https://doge.example.org".into());
        assert!(config.validate().is_err());
        config.rpc.endpoints.clear();

        config.rpc.timeout_secs = 0;
        assert!(config.validate().is_err());
    }
}
