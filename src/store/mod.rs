//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存存储接口。
//!
//! 存储负责持久化和整组替换；同步引擎只产出条目，不负责淘汰旧条目。

pub mod memory;

use crate::error::StoreError;
use crate::keys::Namespace;
use crate::model::{CacheEntry, Scope};
use async_trait::async_trait;

pub use memory::MemoryCacheStore;

/// 缓存存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// 原子地用 `entries` 替换 {namespace, scope} 的全部权威数据
    ///
    /// 不在 `entries` 中的旧条目必须被淘汰；调用失败时旧数据保持不变
    async fn replace_authoritative(
        &self,
        namespace: Namespace,
        scope: &Scope,
        entries: Vec<CacheEntry>,
    ) -> Result<(), StoreError>;
}
