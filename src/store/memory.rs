//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 内存缓存存储，提供整组替换和关系图查询。

use super::CacheStore;
use crate::error::StoreError;
use crate::keys::{Namespace, ResourceKey, AWS_PROVIDER};
use crate::model::{CacheEntry, Scope};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// 某个 {namespace, scope} 的一代权威数据
#[derive(Debug, Default)]
struct Generation {
    number: u64,
    entries: BTreeMap<ResourceKey, CacheEntry>,
}

/// 内存缓存存储
///
/// 每次替换整体换入一个新的 `Generation`，读方要么看到旧一代，要么看到新一代。
/// 一个存储只保存一个提供方的数据，其他提供方的条目在写入时被拒绝。
#[derive(Debug, Clone)]
pub struct MemoryCacheStore {
    provider: String,
    generations: Arc<DashMap<(Namespace, Scope), Arc<Generation>>>,
}

impl Default for MemoryCacheStore {
    fn default() -> Self {
        Self::for_provider(AWS_PROVIDER)
    }
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            generations: Arc::new(DashMap::new()),
        }
    }

    pub fn provider(&self) -> &str {
        &self.provider
    }

    fn generation_of(&self, namespace: Namespace, scope: &Scope) -> Option<Arc<Generation>> {
        self.generations
            .get(&(namespace, scope.clone()))
            .map(|g| g.value().clone())
    }

    /// 当前代数，从未写入时为 0
    pub fn generation(&self, namespace: Namespace, scope: &Scope) -> u64 {
        self.generation_of(namespace, scope)
            .map(|g| g.number)
            .unwrap_or(0)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<CacheEntry> {
        let scope = Scope::new(key.account(), key.region());
        self.generation_of(key.namespace(), &scope)
            .and_then(|g| g.entries.get(key).cloned())
    }

    /// 按键排序返回 {namespace, scope} 下的全部条目
    pub fn entries(&self, namespace: Namespace, scope: &Scope) -> Vec<CacheEntry> {
        self.generation_of(namespace, scope)
            .map(|g| g.entries.values().cloned().collect())
            .unwrap_or_default()
    }

    /// 正向关系：`key` 指向的 `namespace` 类型条目
    ///
    /// 目标条目尚未缓存时只返回键
    pub fn related(&self, key: &ResourceKey, namespace: Namespace) -> Vec<(ResourceKey, Option<CacheEntry>)> {
        let Some(entry) = self.get(key) else {
            return Vec::new();
        };
        entry
            .related(namespace)
            .map(|target| (target.clone(), self.get(target)))
            .collect()
    }

    /// 反向关系：所有指向 `target` 的条目键
    pub fn referencing(&self, target: &ResourceKey) -> Vec<ResourceKey> {
        let mut sources: Vec<ResourceKey> = self
            .generations
            .iter()
            .flat_map(|g| {
                g.value()
                    .entries
                    .values()
                    .filter(|entry| entry.related(target.namespace()).any(|k| k == target))
                    .map(|entry| entry.key.clone())
                    .collect::<Vec<_>>()
            })
            .collect();
        sources.sort();
        sources
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    #[instrument(skip(self, entries), level = "debug", fields(count = entries.len()))]
    async fn replace_authoritative(
        &self,
        namespace: Namespace,
        scope: &Scope,
        entries: Vec<CacheEntry>,
    ) -> Result<(), StoreError> {
        let mut indexed = BTreeMap::new();
        for entry in entries {
            if entry.key.provider() != self.provider {
                return Err(StoreError::Rejected(format!(
                    "entry {} does not belong to provider {}",
                    entry.key, self.provider
                )));
            }
            if entry.key.namespace() != namespace {
                return Err(StoreError::Rejected(format!(
                    "entry {} does not belong to namespace {}",
                    entry.key, namespace
                )));
            }
            if entry.key.account() != scope.account || entry.key.region() != scope.region {
                return Err(StoreError::Rejected(format!(
                    "entry {} does not belong to scope {}",
                    entry.key, scope
                )));
            }
            let key = entry.key.clone();
            if indexed.insert(key.clone(), entry).is_some() {
                return Err(StoreError::Rejected(format!("duplicate entry {}", key)));
            }
        }

        let mut slot = self
            .generations
            .entry((namespace, scope.clone()))
            .or_default();
        let number = slot.number + 1;
        *slot = Arc::new(Generation {
            number,
            entries: indexed,
        });
        debug!("replaced {} {} with generation {}", namespace, scope, number);
        Ok(())
    }
}
