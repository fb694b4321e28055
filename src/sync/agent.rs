//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 启动模板缓存代理。
//!
//! 每轮同步全量拉取一个作用域内的启动模板及其全部版本，
//! 生成带镜像关系的缓存条目，并作为权威数据整组交给缓存存储。

use super::SyncReport;
use crate::error::{Result, SyncError};
use crate::fetch::fetch_all;
use crate::keys::{Namespace, ResourceKey};
use crate::metrics::SyncMetrics;
use crate::model::{
    AgentDataType, Attributes, Authority, CacheEntry, CacheResult, RawLaunchTemplate,
    RawTemplateVersion, Scope,
};
use crate::progress::TaskContext;
use crate::provider::LaunchTemplateProvider;
use crate::store::CacheStore;
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

const PHASE: &str = "CACHE_LAUNCH_TEMPLATES";

pub const DEFAULT_CONCURRENCY_LIMIT: usize = 8;

/// 启动模板缓存代理
///
/// 一个代理对应一个 {account, region} 作用域，不同代理之间没有共享的可变状态
pub struct LaunchTemplateCachingAgent {
    provider: Arc<dyn LaunchTemplateProvider>,
    store: Arc<dyn CacheStore>,
    scope: Scope,
    concurrency_limit: usize,
    metrics: Option<SyncMetrics>,
}

impl LaunchTemplateCachingAgent {
    pub fn new(
        provider: Arc<dyn LaunchTemplateProvider>,
        store: Arc<dyn CacheStore>,
        scope: Scope,
    ) -> Self {
        Self {
            provider,
            store,
            scope,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            metrics: None,
        }
    }

    /// 版本拉取的最大并发数，至少为 1
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit.max(1);
        self
    }

    pub fn with_metrics(mut self, metrics: SyncMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn agent_type(&self) -> String {
        format!(
            "{}/{}/LaunchTemplateCachingAgent",
            self.scope.account, self.scope.region
        )
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    pub fn account_name(&self) -> &str {
        &self.scope.account
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn provided_data_types(&self) -> Vec<AgentDataType> {
        vec![AgentDataType {
            namespace: Namespace::LaunchTemplates,
            authority: Authority::Authoritative,
        }]
    }

    /// 执行一轮完整同步并发布结果
    ///
    /// 任何拉取失败、取消或超时都不会调用存储，存储中的上一代数据保持不变
    #[instrument(skip(self, ctx), level = "info", fields(agent = %self.agent_type(), task = %ctx.task_id()))]
    pub async fn sync(&self, ctx: &TaskContext) -> Result<SyncReport> {
        let started = Instant::now();
        let result = self.sync_inner(ctx, started).await;

        match &result {
            Ok(report) => {
                info!(
                    "Published {} launch templates for {} in {:?}",
                    report.entries, self.scope, report.duration
                );
                ctx.update_status(
                    PHASE,
                    format!("Cached {} launch templates in {}", report.entries, self.scope),
                );
                if let Some(metrics) = &self.metrics {
                    metrics.record_success(&self.agent_type(), report.entries, report.duration);
                }
            }
            Err(e) => {
                warn!("Launch template sync for {} failed: {}", self.scope, e);
                ctx.update_status(PHASE, format!("Sync failed: {}", e));
                if let Some(metrics) = &self.metrics {
                    metrics.record_failure(&self.agent_type(), &e.to_string(), started.elapsed());
                }
            }
        }

        result
    }

    async fn sync_inner(&self, ctx: &TaskContext, started: Instant) -> Result<SyncReport> {
        let result = self.load_data(ctx).await?;
        if ctx.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let entries = result.entries.len();
        let related = result
            .entries
            .iter()
            .filter(|e| e.related(Namespace::Images).next().is_some())
            .count();

        self.store
            .replace_authoritative(result.namespace, &self.scope, result.entries)
            .await?;

        Ok(SyncReport {
            agent_type: self.agent_type(),
            scope: self.scope.clone(),
            entries,
            related,
            duration: started.elapsed(),
        })
    }

    /// 拉取并构建本作用域的全部缓存条目，不写入存储
    ///
    /// 取消信号触发时丢弃所有进行中的拉取
    #[instrument(skip(self, ctx), level = "debug", fields(scope = %self.scope))]
    pub async fn load_data(&self, ctx: &TaskContext) -> Result<CacheResult> {
        let cancel = ctx.cancellation().clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("sync pass for {} cancelled", self.scope);
                Err(SyncError::Cancelled)
            }
            result = self.collect(ctx) => result,
        }
    }

    async fn collect(&self, ctx: &TaskContext) -> Result<CacheResult> {
        ctx.update_status(
            PHASE,
            format!("Describing launch templates in {}", self.scope),
        );

        let templates = fetch_all(|token| self.provider.list_launch_templates(&self.scope, token))
            .await
            .map_err(|partial| SyncError::Failed {
                resource: format!("launch templates in {}", self.scope),
                source: partial.error,
            })?;
        debug!("fetched {} launch templates in {}", templates.len(), self.scope);

        ctx.update_status(
            PHASE,
            format!("Describing versions of {} launch templates", templates.len()),
        );

        // buffered 按输入顺序产出，结果与各请求的完成顺序无关
        let fetched: Vec<(RawLaunchTemplate, Vec<RawTemplateVersion>)> = stream::iter(templates)
            .map(|template| self.fetch_versions(template))
            .buffered(self.concurrency_limit)
            .try_collect()
            .await?;

        let mut entries = fetched
            .into_iter()
            .map(|(template, versions)| self.build_entry(template, versions))
            .collect::<Result<Vec<_>>>()?;
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        Ok(CacheResult {
            namespace: Namespace::LaunchTemplates,
            authority: Authority::Authoritative,
            scope: self.scope.clone(),
            entries,
        })
    }

    async fn fetch_versions(
        &self,
        template: RawLaunchTemplate,
    ) -> Result<(RawLaunchTemplate, Vec<RawTemplateVersion>)> {
        let id = template.launch_template_id.as_str();
        let versions = fetch_all(|token| {
            self.provider
                .list_template_versions(&self.scope, id, token)
        })
        .await
        .map_err(|partial| SyncError::Failed {
            resource: format!(
                "launch template {} ({})",
                template.launch_template_name, template.launch_template_id
            ),
            source: partial.error,
        })?;

        Ok((template, versions))
    }

    fn build_entry(
        &self,
        template: RawLaunchTemplate,
        mut versions: Vec<RawTemplateVersion>,
    ) -> Result<CacheEntry> {
        let provider = self.provider.name();
        let key = ResourceKey::build(
            provider,
            Namespace::LaunchTemplates,
            &template.launch_template_name,
            &self.scope.account,
            &self.scope.region,
            None,
        )
        .map_err(|e| {
            // 名称无法构成键时整轮失败且不重试，需要修正资源本身
            warn!(
                "launch template {} has an unusable name {:?}: {}",
                template.launch_template_id, template.launch_template_name, e
            );
            SyncError::Key(e)
        })?;

        versions.sort_by_key(|v| v.version_number);
        let latest_image = versions
            .iter()
            .find(|v| v.version_number == template.latest_version_number)
            .and_then(RawTemplateVersion::image_id)
            .map(str::to_string);

        let mut attributes = to_attributes(&template)?;
        attributes.insert("versions".to_string(), to_value(&versions)?);
        if let Some(application) = key.application() {
            attributes.insert("application".to_string(), Value::String(application));
        }

        let mut entry = CacheEntry::new(key, attributes);
        match latest_image {
            Some(image_id) => match ResourceKey::build(
                provider,
                Namespace::Images,
                &image_id,
                &self.scope.account,
                &self.scope.region,
                None,
            ) {
                Ok(image_key) => entry.relate(image_key),
                Err(e) => warn!("skipping image relationship for {}: {}", entry.key, e),
            },
            None => debug!(
                "no image on latest version {} of {}, skipping relationship",
                template.latest_version_number, entry.key
            ),
        }

        Ok(entry)
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| SyncError::Serialization(e.to_string()))
}

fn to_attributes<T: Serialize>(value: &T) -> Result<Attributes> {
    match to_value(value)? {
        Value::Object(map) => Ok(map),
        other => Err(SyncError::Serialization(format!(
            "expected an object, found {}",
            other
        ))),
    }
}
