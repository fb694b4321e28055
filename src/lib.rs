//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! ltsync - 启动模板缓存同步
//!
//! 按 {account, region} 对启动模板做全量权威同步，写入关系型缓存；
//! 并以写时复制方式为不可变的模板版本生成新版本。

#![doc(html_root_url = "https://docs.rs/ltsync/0.1.0")]

pub use serde;
pub use serde::{Deserialize, Serialize};
pub use serde_json;
pub use tokio;

pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod keys;
pub mod metrics;
pub mod model;
pub mod mutation;
pub mod progress;
pub mod provider;
pub mod store;
pub mod sync;
pub mod telemetry;

// Re-export commonly used items
pub use config::Config;
pub use error::{MutationError, Result, SyncError};
pub use keys::{Keys, Namespace, ResourceKey};
pub use model::{CacheEntry, CacheResult, NewVersionPlan, Scope, TemplateIdentity, VersionedResource};
pub use mutation::{plan_mutation, ModifyLaunchTemplateOperation, MutationRequest};
pub use progress::TaskContext;
pub use provider::{LaunchTemplateProvider, SnapshotProvider};
pub use store::{CacheStore, MemoryCacheStore};
pub use sync::{CachingScheduler, LaunchTemplateCachingAgent};

/// ltsync 版本号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
