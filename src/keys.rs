//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存键的结构、序列化格式和解析逻辑。
//!
//! 序列化格式固定为 `provider:namespace:account:region:name[:version]`，
//! 其他组件会解析此处生成的键，格式必须保持向后兼容。

use crate::error::KeyError;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// 键字段分隔符，任何字段中都不允许出现
pub const DELIMITER: char = ':';

/// 默认提供方标识
pub const AWS_PROVIDER: &str = "aws";

lazy_static! {
    static ref APPLICATION_NAME: Regex =
        Regex::new(r"^([a-zA-Z0-9_.]+)(?:-.*)?$").expect("valid application pattern");
}

/// 缓存命名空间（资源类型）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Namespace {
    LaunchTemplates,
    LaunchTemplateVersions,
    Images,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::LaunchTemplates => "launchTemplates",
            Namespace::LaunchTemplateVersions => "launchTemplateVersions",
            Namespace::Images => "images",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "launchTemplates" => Ok(Namespace::LaunchTemplates),
            "launchTemplateVersions" => Ok(Namespace::LaunchTemplateVersions),
            "images" => Ok(Namespace::Images),
            other => Err(format!("unknown namespace `{}`", other)),
        }
    }
}

/// 结构化缓存键
///
/// 所有字段相等时两个键才相等；构造后不可变
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey {
    provider: String,
    namespace: Namespace,
    account: String,
    region: String,
    name: String,
    version: Option<u64>,
}

impl ResourceKey {
    /// 构造缓存键
    ///
    /// 任意字段为空或包含分隔符时返回 `KeyError::InvalidField`
    pub fn build(
        provider: &str,
        namespace: Namespace,
        name: &str,
        account: &str,
        region: &str,
        version: Option<u64>,
    ) -> Result<Self, KeyError> {
        check_field("provider", provider)?;
        check_field("name", name)?;
        check_field("account", account)?;
        check_field("region", region)?;

        Ok(Self {
            provider: provider.to_string(),
            namespace,
            account: account.to_string(),
            region: region.to_string(),
            name: name.to_string(),
            version,
        })
    }

    /// 解析序列化后的键
    pub fn parse(serialized: &str) -> Result<Self, KeyError> {
        let parse_err = |reason: String| KeyError::Parse {
            key: serialized.to_string(),
            reason,
        };

        let parts: Vec<&str> = serialized.split(DELIMITER).collect();
        if parts.len() != 5 && parts.len() != 6 {
            return Err(parse_err(format!(
                "expected 5 or 6 fields, found {}",
                parts.len()
            )));
        }

        let namespace = parts[1].parse::<Namespace>().map_err(parse_err)?;
        let version = match parts.get(5) {
            Some(raw) => Some(
                raw.parse::<u64>()
                    .map_err(|e| parse_err(format!("invalid version `{}`: {}", raw, e)))?,
            ),
            None => None,
        };

        Self::build(parts[0], namespace, parts[4], parts[2], parts[3], version).map_err(|e| {
            parse_err(e.to_string())
        })
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<u64> {
        self.version
    }

    /// 按 `app-stack-detail` 命名约定推导应用名
    pub fn application(&self) -> Option<String> {
        application_of(&self.name)
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}{d}{}",
            self.provider,
            self.namespace,
            self.account,
            self.region,
            self.name,
            d = DELIMITER
        )?;
        if let Some(version) = self.version {
            write!(f, "{}{}", DELIMITER, version)?;
        }
        Ok(())
    }
}

impl FromStr for ResourceKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ResourceKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ResourceKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ResourceKey::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn check_field(field: &'static str, value: &str) -> Result<(), KeyError> {
    if value.is_empty() {
        return Err(KeyError::InvalidField {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    if value.contains(DELIMITER) {
        return Err(KeyError::InvalidField {
            field,
            reason: format!("must not contain `{}`", DELIMITER),
        });
    }
    Ok(())
}

/// 从资源名称推导应用名，不符合命名约定时返回 None
pub fn application_of(name: &str) -> Option<String> {
    APPLICATION_NAME
        .captures(name)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

/// 常用缓存键的构造方法
pub struct Keys;

impl Keys {
    pub fn launch_template(name: &str, account: &str, region: &str) -> Result<ResourceKey, KeyError> {
        ResourceKey::build(
            AWS_PROVIDER,
            Namespace::LaunchTemplates,
            name,
            account,
            region,
            None,
        )
    }

    pub fn launch_template_version(
        name: &str,
        version: u64,
        account: &str,
        region: &str,
    ) -> Result<ResourceKey, KeyError> {
        ResourceKey::build(
            AWS_PROVIDER,
            Namespace::LaunchTemplateVersions,
            name,
            account,
            region,
            Some(version),
        )
    }

    pub fn image(image_id: &str, account: &str, region: &str) -> Result<ResourceKey, KeyError> {
        ResourceKey::build(AWS_PROVIDER, Namespace::Images, image_id, account, region, None)
    }
}
