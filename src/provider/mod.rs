//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了外部云提供方的能力接口。
//!
//! 每个提供方实现一次这些接口，同步引擎和变更操作只依赖接口本身。

pub mod snapshot;

use crate::error::{FetchError, ProviderError, ResolveError};
use crate::model::{Attributes, Page, RawLaunchTemplate, RawTemplateVersion, Scope, TemplateIdentity};
use async_trait::async_trait;

pub use snapshot::{ProviderSnapshot, SnapshotProvider};

/// 启动模板提供方
#[async_trait]
pub trait LaunchTemplateProvider: Send + Sync {
    /// 提供方名称，同时作为缓存键前缀
    fn name(&self) -> &str;

    /// 列出作用域内的启动模板（分页）
    async fn list_launch_templates(
        &self,
        scope: &Scope,
        token: Option<String>,
    ) -> Result<Page<RawLaunchTemplate>, FetchError>;

    /// 列出某个启动模板的全部版本（分页）
    async fn list_template_versions(
        &self,
        scope: &Scope,
        launch_template_id: &str,
        token: Option<String>,
    ) -> Result<Page<RawTemplateVersion>, FetchError>;

    /// 基于 `base_version` 提交一个新版本，返回新版本号
    async fn submit_new_version(
        &self,
        scope: &Scope,
        identity: &TemplateIdentity,
        base_version: u64,
        attributes: &Attributes,
    ) -> Result<u64, ProviderError>;
}

/// 镜像名称到镜像 ID 的解析能力
#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve_image(&self, scope: &Scope, name: &str) -> Result<String, ResolveError>;
}
