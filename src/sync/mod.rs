//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存同步机制，包括缓存代理和周期调度。

pub mod agent;
pub mod scheduler;

use crate::model::Scope;
use std::time::Duration;

pub use agent::LaunchTemplateCachingAgent;
pub use scheduler::{CachingScheduler, SchedulerConfig};

/// 一轮成功同步的摘要
#[derive(Debug, Clone, PartialEq)]
pub struct SyncReport {
    pub agent_type: String,
    pub scope: Scope,
    /// 发布的条目数
    pub entries: usize,
    /// 与关联镜像建立了关系的条目数
    pub related: usize,
    pub duration: Duration,
}

/// 计算重试延迟（指数退避）
pub fn calculate_retry_delay(attempt: u32, base_delay_ms: u64) -> Duration {
    let factor = 2_u64.saturating_pow(attempt);
    Duration::from_millis(base_delay_ms.saturating_mul(factor))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay_doubles() {
        assert_eq!(calculate_retry_delay(0, 100), Duration::from_millis(100));
        assert_eq!(calculate_retry_delay(3, 100), Duration::from_millis(800));
        assert_eq!(calculate_retry_delay(80, 100), Duration::from_millis(u64::MAX));
    }
}
