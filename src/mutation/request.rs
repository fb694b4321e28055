//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 稀疏变更请求。
//!
//! 每个字段都有“未设置”和“已设置”两种状态，未设置表示沿用当前版本的值，
//! 从不表示清空为默认值。

use crate::model::TemplateIdentity;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// 镜像选择
///
/// `image_id` 为空时需要先通过镜像解析能力填充
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageSelection {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_id: Option<String>,
}

impl ImageSelection {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_id: None,
        }
    }

    pub fn resolved(name: impl Into<String>, image_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            image_id: Some(image_id.into()),
        }
    }
}

/// 价格相关字段，整体覆盖
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_price: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spot_instance_type: Option<String>,
}

impl MarketChanges {
    pub fn is_empty(&self) -> bool {
        self.market_type.is_none() && self.spot_price.is_none() && self.spot_instance_type.is_none()
    }
}

/// 块设备映射
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockDevice {
    pub device_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtual_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iops: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete_on_termination: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
}

/// 启动模板数据的稀疏变更
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageSelection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iam_role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub associate_public_ip_address: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ramdisk_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_monitoring: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ebs_optimized: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base64_user_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_devices: Option<Vec<BlockDevice>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_groups: Option<Vec<String>>,
    /// 为 true 时安全组取并集，不移除任何现有安全组
    #[serde(default)]
    pub security_groups_append_only: bool,
    #[serde(default, skip_serializing_if = "MarketChanges::is_empty")]
    pub market: MarketChanges,
    /// 直接覆盖的启动模板数据字段
    #[serde(flatten)]
    pub other: BTreeMap<String, Value>,
}

/// 变更请求
///
/// 顶层未知字段直接拒绝，拼错的字段名不会被当作空请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct MutationRequest {
    pub target: TemplateIdentity,
    /// 调用方最后观察到的版本号，为空时不做并发校验
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_version: Option<u64>,
    #[serde(default)]
    pub changes: TemplateChanges,
}

impl MutationRequest {
    pub fn new(target: TemplateIdentity) -> Self {
        Self {
            target,
            observed_version: None,
            changes: TemplateChanges::default(),
        }
    }

    pub fn observed(mut self, version: u64) -> Self {
        self.observed_version = Some(version);
        self
    }

    pub fn with_changes(mut self, changes: TemplateChanges) -> Self {
        self.changes = changes;
        self
    }
}

/// 源版本选择
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionSelector {
    #[default]
    Latest,
    Default,
    Number(u64),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => f.write_str("$Latest"),
            VersionSelector::Default => f.write_str("$Default"),
            VersionSelector::Number(n) => write!(f, "{}", n),
        }
    }
}

impl FromStr for VersionSelector {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "$Latest" => Ok(VersionSelector::Latest),
            "$Default" => Ok(VersionSelector::Default),
            other => other
                .parse::<u64>()
                .map(VersionSelector::Number)
                .map_err(|_| format!("invalid version selector `{}`", other)),
        }
    }
}

impl Serialize for VersionSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for VersionSelector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(VersionSelector::Number(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
