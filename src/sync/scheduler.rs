//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存代理的周期调度。
//!
//! 各作用域的代理并发运行、互不阻塞；临时失败按指数退避重试，
//! 单轮同步有超时上限，取消信号到达后停止调度。

use super::{calculate_retry_delay, LaunchTemplateCachingAgent, SyncReport};
use crate::config::{Config, GlobalConfig};
use crate::error::{Result, SyncError};
use crate::metrics::SyncMetrics;
use crate::progress::TaskContext;
use crate::provider::LaunchTemplateProvider;
use crate::store::CacheStore;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// 调度参数
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval: Duration,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub pass_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&GlobalConfig::default())
    }
}

impl From<&GlobalConfig> for SchedulerConfig {
    fn from(global: &GlobalConfig) -> Self {
        Self {
            interval: global.sync_interval(),
            max_retries: global.max_retries,
            retry_base_delay_ms: global.retry_base_delay_ms,
            pass_timeout: global.pass_timeout(),
        }
    }
}

/// 缓存调度器
pub struct CachingScheduler {
    agents: Vec<Arc<LaunchTemplateCachingAgent>>,
    config: SchedulerConfig,
}

impl CachingScheduler {
    pub fn new(agents: Vec<Arc<LaunchTemplateCachingAgent>>, config: SchedulerConfig) -> Self {
        Self { agents, config }
    }

    /// 按配置为每个 {account, region} 创建一个代理
    pub fn from_config(
        config: &Config,
        provider: Arc<dyn LaunchTemplateProvider>,
        store: Arc<dyn CacheStore>,
        metrics: SyncMetrics,
    ) -> Self {
        let agents = config
            .scopes()
            .into_iter()
            .map(|scope| {
                Arc::new(
                    LaunchTemplateCachingAgent::new(provider.clone(), store.clone(), scope)
                        .with_concurrency_limit(config.global.concurrency_limit)
                        .with_metrics(metrics.clone()),
                )
            })
            .collect();
        Self::new(agents, SchedulerConfig::from(&config.global))
    }

    pub fn agents(&self) -> &[Arc<LaunchTemplateCachingAgent>] {
        &self.agents
    }

    /// 所有代理各运行一轮（含重试），返回每个代理的结果
    #[instrument(skip(self, ctx), level = "info", fields(agents = self.agents.len()))]
    pub async fn run_once(&self, ctx: &TaskContext) -> Vec<(String, Result<SyncReport>)> {
        let runs = self.agents.iter().map(|agent| async move {
            let result = self.run_agent(agent, ctx).await;
            (agent.agent_type(), result)
        });
        join_all(runs).await
    }

    async fn run_agent(
        &self,
        agent: &LaunchTemplateCachingAgent,
        ctx: &TaskContext,
    ) -> Result<SyncReport> {
        let mut attempt = 0u32;
        loop {
            let pass_ctx = ctx.child();
            let result = match tokio::time::timeout(self.config.pass_timeout, agent.sync(&pass_ctx)).await {
                Ok(result) => result,
                Err(_) => {
                    // 超时后取消本轮残留的子任务
                    pass_ctx.cancellation().cancel();
                    Err(SyncError::Timeout(self.config.pass_timeout.as_secs()))
                }
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = calculate_retry_delay(attempt, self.config.retry_base_delay_ms);
                    attempt += 1;
                    warn!(
                        "{} failed (attempt {}), retrying in {:?}: {}",
                        agent.agent_type(),
                        attempt,
                        delay,
                        e
                    );
                    tokio::select! {
                        _ = ctx.cancellation().cancelled() => return Err(SyncError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                other => return other,
            }
        }
    }

    /// 周期运行直到 `ctx` 被取消
    pub async fn start(&self, ctx: TaskContext) {
        info!(
            "Starting caching scheduler with {} agents, interval {:?}",
            self.agents.len(),
            self.config.interval
        );
        let mut interval = tokio::time::interval(self.config.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ctx.cancellation().cancelled() => {
                    info!("Caching scheduler stopped");
                    break;
                }
                _ = interval.tick() => {
                    let results = self.run_once(&ctx).await;
                    let failed = results.iter().filter(|(_, r)| r.is_err()).count();
                    debug!("scheduler tick finished: {} agents, {} failed", results.len(), failed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_global() {
        let global = GlobalConfig {
            sync_interval_secs: 30,
            max_retries: 5,
            ..Default::default()
        };
        let config = SchedulerConfig::from(&global);
        assert_eq!(config.interval, Duration::from_secs(30));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.pass_timeout, Duration::from_secs(300));
    }
}
