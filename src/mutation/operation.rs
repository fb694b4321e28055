//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 修改启动模板的操作。
//!
//! 读取当前权威版本，解析镜像，计算变更计划，仅在有变化时提交新版本，
//! 成功后可触发一次该作用域的重新同步。

use super::plan::plan_mutation;
use super::request::{MutationRequest, TemplateChanges, VersionSelector};
use crate::error::{MutationError, ResolveError};
use crate::fetch::fetch_all;
use crate::model::{NewVersionPlan, RawTemplateVersion, Scope, TemplateIdentity, VersionedResource};
use crate::progress::TaskContext;
use crate::provider::{ImageResolver, LaunchTemplateProvider};
use crate::sync::{LaunchTemplateCachingAgent, SyncReport};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

const PHASE: &str = "MODIFY_LAUNCH_TEMPLATE";

/// 修改启动模板的描述
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModifyLaunchTemplateDescription {
    pub account: String,
    pub region: String,
    pub launch_template: TemplateIdentity,
    /// 作为基准的源版本
    #[serde(default)]
    pub source_version: VersionSelector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub observed_version: Option<u64>,
    #[serde(default)]
    pub changes: TemplateChanges,
}

impl ModifyLaunchTemplateDescription {
    pub fn scope(&self) -> Scope {
        Scope::new(&self.account, &self.region)
    }
}

/// 操作结果
#[derive(Debug)]
pub struct MutationOutcome {
    pub plan: NewVersionPlan,
    /// 提交后得到的新版本号，无变化时为 None
    pub new_version: Option<u64>,
    /// 提交后的重新同步结果，未配置同步代理时为 None
    pub resync: Option<Result<SyncReport, String>>,
}

/// 修改启动模板操作
pub struct ModifyLaunchTemplateOperation {
    provider: Arc<dyn LaunchTemplateProvider>,
    images: Arc<dyn ImageResolver>,
    resync: Option<Arc<LaunchTemplateCachingAgent>>,
}

impl ModifyLaunchTemplateOperation {
    pub fn new(provider: Arc<dyn LaunchTemplateProvider>, images: Arc<dyn ImageResolver>) -> Self {
        Self {
            provider,
            images,
            resync: None,
        }
    }

    /// 提交成功后用该代理重新同步
    pub fn with_resync(mut self, agent: Arc<LaunchTemplateCachingAgent>) -> Self {
        self.resync = Some(agent);
        self
    }

    #[instrument(skip(self, ctx, description), level = "info", fields(template = %description.launch_template, task = %ctx.task_id()))]
    pub async fn operate(
        &self,
        ctx: &TaskContext,
        description: ModifyLaunchTemplateDescription,
    ) -> Result<MutationOutcome, MutationError> {
        ctx.update_status(PHASE, "Initializing operation...");
        let scope = description.scope();

        let current = self
            .current_version(&scope, &description.launch_template, description.source_version)
            .await?;
        ctx.update_status(
            PHASE,
            format!(
                "Using version {} of {} as source",
                current.current_version_number, current.identity
            ),
        );

        let mut request = MutationRequest {
            target: current.identity.clone(),
            observed_version: description.observed_version,
            changes: description.changes,
        };
        if let Some(image) = request.changes.image.as_mut() {
            if image.image_id.is_none() {
                ctx.update_status(PHASE, format!("Resolving image {}", image.name));
                let image_id = self
                    .images
                    .resolve_image(&scope, &image.name)
                    .await
                    .map_err(|e| match e {
                        ResolveError::NotFound(name) => MutationError::ImageNotFound(name),
                        ResolveError::Fetch(e) => MutationError::Fetch(e),
                    })?;
                image.image_id = Some(image_id);
            }
        }

        let plan = plan_mutation(&current, &request)?;
        if !plan.changed {
            info!("No changes for {}, skipping new version", current.identity);
            ctx.update_status(PHASE, "No changes detected, launch template left as is");
            return Ok(MutationOutcome {
                plan,
                new_version: None,
                resync: None,
            });
        }

        ctx.update_status(
            PHASE,
            format!(
                "Creating new version from {} (changed: {})",
                plan.base_version_number,
                plan.changed_fields
                    .iter()
                    .cloned()
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        );
        let new_version = self
            .provider
            .submit_new_version(
                &scope,
                &current.identity,
                plan.base_version_number,
                &plan.resulting_attributes,
            )
            .await?;
        info!("Created version {} of {}", new_version, current.identity);
        ctx.update_status(PHASE, format!("Created version {}", new_version));

        let resync = match &self.resync {
            Some(agent) if agent.scope() == &scope => {
                let result = agent.sync(&ctx.child()).await.map_err(|e| {
                    warn!("Resync after modifying {} failed: {}", current.identity, e);
                    e.to_string()
                });
                Some(result)
            }
            Some(agent) => {
                warn!(
                    "Resync agent scope {} does not match {}, skipping",
                    agent.scope(),
                    scope
                );
                None
            }
            None => None,
        };

        Ok(MutationOutcome {
            plan,
            new_version: Some(new_version),
            resync,
        })
    }

    /// 读取源版本的快照
    pub async fn current_version(
        &self,
        scope: &Scope,
        identity: &TemplateIdentity,
        selector: VersionSelector,
    ) -> Result<VersionedResource, MutationError> {
        let id = identity.launch_template_id.as_str();
        let versions = fetch_all(|token| self.provider.list_template_versions(scope, id, token))
            .await
            .map_err(|partial| partial.into_error())?;

        select_version(&versions, selector)
            .map(VersionedResource::from_version)
            .ok_or_else(|| MutationError::VersionNotFound {
                template: identity.to_string(),
                selector: selector.to_string(),
            })
    }
}

fn select_version(
    versions: &[RawTemplateVersion],
    selector: VersionSelector,
) -> Option<&RawTemplateVersion> {
    match selector {
        VersionSelector::Latest => versions.iter().max_by_key(|v| v.version_number),
        VersionSelector::Default => versions.iter().find(|v| v.default_version),
        VersionSelector::Number(n) => versions.iter().find(|v| v.version_number == n),
    }
}
