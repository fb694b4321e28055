//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 基于快照数据的提供方实现。
//!
//! 数据来自 JSON 快照或直接构造，按固定页大小分页返回，
//! 支持为版本列表注入故障、模拟延迟，并记录提交的新版本。

use super::{ImageResolver, LaunchTemplateProvider};
use crate::error::{FetchError, ProviderError, ResolveError};
use crate::model::{
    Attributes, Page, RawLaunchTemplate, RawTemplateVersion, Scope, TemplateIdentity,
};
use ahash::AHashMap;
use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, instrument};

pub const DEFAULT_PAGE_SIZE: usize = 100;

/// 单个作用域的快照数据
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeSnapshot {
    pub account: String,
    pub region: String,
    #[serde(default)]
    pub templates: Vec<RawLaunchTemplate>,
    #[serde(default)]
    pub versions: Vec<RawTemplateVersion>,
    /// 镜像名称 -> 镜像 ID
    #[serde(default)]
    pub images: BTreeMap<String, String>,
}

/// 快照文件格式
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    #[serde(default)]
    pub scopes: Vec<ScopeSnapshot>,
}

#[derive(Debug, Default)]
struct ScopeData {
    templates: Vec<RawLaunchTemplate>,
    versions: AHashMap<String, Vec<RawTemplateVersion>>,
    images: BTreeMap<String, String>,
}

/// 一次成功的版本提交
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub scope: Scope,
    pub launch_template_id: String,
    pub base_version: u64,
    pub version_number: u64,
    pub attributes: Attributes,
}

/// 快照提供方
pub struct SnapshotProvider {
    name: String,
    page_size: usize,
    latency: Option<Duration>,
    scopes: RwLock<AHashMap<Scope, ScopeData>>,
    version_faults: DashMap<String, FetchError>,
    fail_submissions: AtomicBool,
    submissions: RwLock<Vec<Submission>>,
    version_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl SnapshotProvider {
    pub fn new(snapshot: ProviderSnapshot) -> Self {
        let mut scopes: AHashMap<Scope, ScopeData> = AHashMap::new();
        for scope_snapshot in snapshot.scopes {
            let data = scopes
                .entry(Scope::new(&scope_snapshot.account, &scope_snapshot.region))
                .or_default();
            data.templates.extend(scope_snapshot.templates);
            for version in scope_snapshot.versions {
                data.versions
                    .entry(version.launch_template_id.clone())
                    .or_default()
                    .push(version);
            }
            data.images.extend(scope_snapshot.images);
        }
        for data in scopes.values_mut() {
            for versions in data.versions.values_mut() {
                versions.sort_by_key(|v| v.version_number);
            }
        }

        Self {
            name: crate::keys::AWS_PROVIDER.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            latency: None,
            scopes: RwLock::new(scopes),
            version_faults: DashMap::new(),
            fail_submissions: AtomicBool::new(false),
            submissions: RwLock::new(Vec::new()),
            version_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// 提供方名称，作为缓存键前缀
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// 每次版本列表请求前等待的时间
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// 之后对该模板的版本列表请求都返回 `error`
    pub fn inject_version_fault(&self, launch_template_id: &str, error: FetchError) {
        self.version_faults
            .insert(launch_template_id.to_string(), error);
    }

    pub fn clear_version_faults(&self) {
        self.version_faults.clear();
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.fail_submissions.store(fail, Ordering::SeqCst);
    }

    pub async fn submissions(&self) -> Vec<Submission> {
        self.submissions.read().await.clone()
    }

    /// 版本列表请求总次数（按页计）
    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    /// 同时进行中的版本列表请求的峰值
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn page_of<T: Clone>(&self, items: &[T], token: Option<String>) -> Result<Page<T>, FetchError> {
        let offset = match token {
            Some(token) => token
                .parse::<usize>()
                .map_err(|_| FetchError::Fatal(format!("invalid next token `{}`", token)))?,
            None => 0,
        };
        if offset > items.len() {
            return Err(FetchError::Fatal(format!(
                "next token `{}` out of range",
                offset
            )));
        }

        let end = (offset + self.page_size).min(items.len());
        let next_token = (end < items.len()).then(|| end.to_string());
        Ok(Page::new(items[offset..end].to_vec(), next_token))
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl LaunchTemplateProvider for SnapshotProvider {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_launch_templates(
        &self,
        scope: &Scope,
        token: Option<String>,
    ) -> Result<Page<RawLaunchTemplate>, FetchError> {
        let scopes = self.scopes.read().await;
        match scopes.get(scope) {
            Some(data) => self.page_of(&data.templates, token),
            None => Ok(Page::last(Vec::new())),
        }
    }

    #[instrument(skip(self), level = "debug")]
    async fn list_template_versions(
        &self,
        scope: &Scope,
        launch_template_id: &str,
        token: Option<String>,
    ) -> Result<Page<RawTemplateVersion>, FetchError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if let Some(fault) = self.version_faults.get(launch_template_id) {
            debug!("injected fault for {}: {}", launch_template_id, fault.value());
            return Err(fault.value().clone());
        }

        let scopes = self.scopes.read().await;
        let versions = scopes
            .get(scope)
            .and_then(|data| data.versions.get(launch_template_id));
        match versions {
            Some(versions) => self.page_of(versions, token),
            None => {
                let known = scopes
                    .get(scope)
                    .map(|data| {
                        data.templates
                            .iter()
                            .any(|t| t.launch_template_id == launch_template_id)
                    })
                    .unwrap_or(false);
                if known {
                    Ok(Page::last(Vec::new()))
                } else {
                    Err(FetchError::Fatal(format!(
                        "launch template {} not found in {}",
                        launch_template_id, scope
                    )))
                }
            }
        }
    }

    #[instrument(skip(self, attributes), level = "debug")]
    async fn submit_new_version(
        &self,
        scope: &Scope,
        identity: &TemplateIdentity,
        base_version: u64,
        attributes: &Attributes,
    ) -> Result<u64, ProviderError> {
        const OPERATION: &str = "CreateLaunchTemplateVersion";

        if self.fail_submissions.load(Ordering::SeqCst) {
            return Err(ProviderError::new(OPERATION, "request rejected by provider"));
        }

        let mut scopes = self.scopes.write().await;
        let data = scopes
            .get_mut(scope)
            .ok_or_else(|| ProviderError::new(OPERATION, format!("unknown scope {}", scope)))?;

        let template = data
            .templates
            .iter_mut()
            .find(|t| t.launch_template_id == identity.launch_template_id)
            .ok_or_else(|| {
                ProviderError::new(
                    OPERATION,
                    format!("launch template {} not found", identity),
                )
            })?;

        let versions = data
            .versions
            .entry(identity.launch_template_id.clone())
            .or_default();
        if !versions.iter().any(|v| v.version_number == base_version) {
            return Err(ProviderError::new(
                OPERATION,
                format!("source version {} does not exist", base_version),
            ));
        }

        let version_number = versions
            .iter()
            .map(|v| v.version_number)
            .max()
            .unwrap_or(0)
            + 1;
        versions.push(RawTemplateVersion {
            launch_template_id: template.launch_template_id.clone(),
            launch_template_name: template.launch_template_name.clone(),
            version_number,
            version_description: None,
            default_version: false,
            create_time: Some(Utc::now()),
            launch_template_data: attributes.clone(),
        });
        template.latest_version_number = version_number;

        self.submissions.write().await.push(Submission {
            scope: scope.clone(),
            launch_template_id: identity.launch_template_id.clone(),
            base_version,
            version_number,
            attributes: attributes.clone(),
        });

        debug!(
            "created version {} of {} from {}",
            version_number, identity, base_version
        );
        Ok(version_number)
    }
}

#[async_trait]
impl ImageResolver for SnapshotProvider {
    async fn resolve_image(&self, scope: &Scope, name: &str) -> Result<String, ResolveError> {
        let scopes = self.scopes.read().await;
        scopes
            .get(scope)
            .and_then(|data| data.images.get(name))
            .cloned()
            .ok_or_else(|| ResolveError::NotFound(name.to_string()))
    }
}
