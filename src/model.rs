//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步引擎消费和产出的数据结构。

use crate::keys::{Namespace, ResourceKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// 属性映射
///
/// serde_json 的 Map 默认按键排序，保证序列化结果稳定
pub type Attributes = Map<String, Value>;

/// 同步作用域：{account, region}
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub account: String,
    pub region: String,
}

impl Scope {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.account, self.region)
    }
}

/// 一页拉取结果
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, next_token: Option<String>) -> Self {
        Self { items, next_token }
    }

    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_token: None,
        }
    }
}

/// 提供方返回的启动模板（顶层资源）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLaunchTemplate {
    pub launch_template_id: String,
    pub launch_template_name: String,
    pub latest_version_number: u64,
    pub default_version_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

/// 提供方返回的启动模板版本（不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTemplateVersion {
    pub launch_template_id: String,
    pub launch_template_name: String,
    pub version_number: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version_description: Option<String>,
    #[serde(default)]
    pub default_version: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub launch_template_data: Attributes,
}

impl RawTemplateVersion {
    /// 版本引用的镜像 ID
    pub fn image_id(&self) -> Option<&str> {
        self.launch_template_data
            .get("imageId")
            .and_then(Value::as_str)
    }
}

/// 缓存权威性
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Authority {
    /// 全量结果，替换存储中该类型/作用域的全部旧数据
    Authoritative,
    /// 仅补充信息
    Informative,
}

/// 代理声明提供的数据类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDataType {
    pub namespace: Namespace,
    pub authority: Authority,
}

/// 缓存条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: ResourceKey,
    pub attributes: Attributes,
    #[serde(default)]
    pub relationships: BTreeMap<Namespace, BTreeSet<ResourceKey>>,
}

impl CacheEntry {
    pub fn new(key: ResourceKey, attributes: Attributes) -> Self {
        Self {
            key,
            attributes,
            relationships: BTreeMap::new(),
        }
    }

    pub fn relate(&mut self, target: ResourceKey) {
        self.relationships
            .entry(target.namespace())
            .or_default()
            .insert(target);
    }

    pub fn related(&self, namespace: Namespace) -> impl Iterator<Item = &ResourceKey> {
        self.relationships
            .get(&namespace)
            .into_iter()
            .flat_map(|keys| keys.iter())
    }
}

/// 一轮同步的产出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheResult {
    pub namespace: Namespace,
    pub authority: Authority,
    pub scope: Scope,
    /// 按键排序
    pub entries: Vec<CacheEntry>,
}

/// 启动模板的身份
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateIdentity {
    pub launch_template_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launch_template_name: Option<String>,
}

impl TemplateIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            launch_template_id: id.into(),
            launch_template_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.launch_template_name = Some(name.into());
        self
    }
}

impl fmt::Display for TemplateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.launch_template_name {
            Some(name) => write!(f, "{} ({})", name, self.launch_template_id),
            None => f.write_str(&self.launch_template_id),
        }
    }
}

/// 当前权威版本的只读快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionedResource {
    pub identity: TemplateIdentity,
    pub current_version_number: u64,
    pub current_attributes: Attributes,
}

impl VersionedResource {
    pub fn from_version(version: &RawTemplateVersion) -> Self {
        Self {
            identity: TemplateIdentity::new(&version.launch_template_id)
                .with_name(&version.launch_template_name),
            current_version_number: version.version_number,
            current_attributes: version.launch_template_data.clone(),
        }
    }
}

/// 变更计划
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVersionPlan {
    pub base_version_number: u64,
    pub resulting_attributes: Attributes,
    /// 为 false 时不提交新版本
    pub changed: bool,
    /// 实际发生变化的顶层字段
    pub changed_fields: BTreeSet<String>,
}
