//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步服务的配置结构和校验逻辑。

use crate::error::ConfigError;
use crate::keys::DELIMITER;
use crate::model::Scope;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub config_version: Option<u32>,
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// 全局配置
#[derive(Deserialize, Clone, Debug)]
#[serde(default)]
pub struct GlobalConfig {
    /// 提供方名称
    pub provider: String,
    /// 单轮同步内版本拉取的最大并发数
    pub concurrency_limit: usize,
    /// 同步间隔（秒）
    pub sync_interval_secs: u64,
    /// 临时失败的最大重试次数
    pub max_retries: u32,
    /// 重试基础延迟（毫秒），按指数退避
    pub retry_base_delay_ms: u64,
    /// 单轮同步超时（秒）
    pub pass_timeout_secs: u64,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            provider: crate::keys::AWS_PROVIDER.to_string(),
            concurrency_limit: 8,
            sync_interval_secs: 60,
            max_retries: 3,
            retry_base_delay_ms: 200,
            pass_timeout_secs: 300,
        }
    }
}

impl GlobalConfig {
    pub fn sync_interval(&self) -> Duration {
        Duration::from_secs(self.sync_interval_secs)
    }

    pub fn pass_timeout(&self) -> Duration {
        Duration::from_secs(self.pass_timeout_secs)
    }
}

/// 账号配置
#[derive(Deserialize, Clone, Debug, PartialEq)]
pub struct AccountConfig {
    pub name: String,
    pub regions: Vec<String>,
}

impl Config {
    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Invalid(msg));

        if let Some(version) = self.config_version {
            if version > CONFIG_VERSION {
                return invalid(format!(
                    "Configuration version {} is not supported. Current version is {}.",
                    version, CONFIG_VERSION
                ));
            }
        }

        if self.global.provider.is_empty() || self.global.provider.contains(DELIMITER) {
            return invalid(format!("Invalid provider name '{}'", self.global.provider));
        }
        if self.global.concurrency_limit == 0 {
            return invalid("Global concurrency_limit cannot be zero".to_string());
        }
        if self.global.sync_interval_secs == 0 {
            return invalid("Global sync_interval_secs cannot be zero".to_string());
        }
        if self.global.pass_timeout_secs == 0 {
            return invalid("Global pass_timeout_secs cannot be zero".to_string());
        }

        let mut names = HashSet::new();
        for account in &self.accounts {
            if account.name.is_empty() {
                return invalid("Account name cannot be empty".to_string());
            }
            if account.name.contains(DELIMITER) {
                return invalid(format!(
                    "Account name '{}' cannot contain '{}'",
                    account.name, DELIMITER
                ));
            }
            if !names.insert(account.name.as_str()) {
                return invalid(format!("Duplicate account '{}'", account.name));
            }
            if account.regions.is_empty() {
                return invalid(format!("Account '{}' has no regions", account.name));
            }
            for region in &account.regions {
                if region.is_empty() || region.contains(DELIMITER) {
                    return invalid(format!(
                        "Invalid region '{}' for account '{}'",
                        region, account.name
                    ));
                }
            }
        }

        Ok(())
    }

    /// 所有 {account, region} 作用域
    pub fn scopes(&self) -> Vec<Scope> {
        self.accounts
            .iter()
            .flat_map(|a| a.regions.iter().map(move |r| Scope::new(&a.name, r)))
            .collect()
    }
}
