//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 缓存调度器集成测试

use ltsync::config::Config;
use ltsync::error::{FetchError, SyncError};
use ltsync::metrics::SyncMetrics;
use ltsync::sync::SchedulerConfig;
use ltsync::{CachingScheduler, LaunchTemplateCachingAgent, MemoryCacheStore, Namespace, TaskContext};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;

#[path = "../common/mod.rs"]
mod common;

use common::{provider, scope, setup_logging};

fn fast_config(max_retries: u32) -> SchedulerConfig {
    SchedulerConfig {
        interval: Duration::from_millis(50),
        max_retries,
        retry_base_delay_ms: 60,
        pass_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
#[serial]
async fn test_transient_failure_retried() {
    setup_logging();
    let provider = Arc::new(provider(1));
    let store = Arc::new(MemoryCacheStore::new());
    let metrics = SyncMetrics::new();
    let agent = Arc::new(
        LaunchTemplateCachingAgent::new(provider.clone(), store.clone(), scope())
            .with_metrics(metrics.clone()),
    );
    let scheduler = CachingScheduler::new(vec![agent.clone()], fast_config(3));

    provider.inject_version_fault("lt-0", FetchError::Transient("throttled".into()));
    let clearer = provider.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        clearer.clear_version_faults();
    });

    let results = scheduler.run_once(&TaskContext::new()).await;
    assert_eq!(results.len(), 1);
    let report = results[0].1.as_ref().unwrap();
    assert_eq!(report.entries, 2);
    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 1);

    let stats = metrics.get(&agent.agent_type()).unwrap();
    assert_eq!(stats.failures, 1);
    assert_eq!(stats.passes, 1);
}

#[tokio::test]
#[serial]
async fn test_fatal_failure_not_retried() {
    setup_logging();
    let provider = Arc::new(provider(0));
    let store = Arc::new(MemoryCacheStore::new());
    let agent = Arc::new(LaunchTemplateCachingAgent::new(provider.clone(), store.clone(), scope()));
    let scheduler = CachingScheduler::new(vec![agent], fast_config(3));

    provider.inject_version_fault("lt-web", FetchError::Fatal("access denied".into()));
    let results = scheduler.run_once(&TaskContext::new()).await;

    assert!(matches!(results[0].1, Err(SyncError::Failed { .. })));
    assert_eq!(provider.version_calls(), 1);
    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 0);
}

#[tokio::test]
#[serial]
async fn test_pass_timeout() {
    setup_logging();
    let provider = Arc::new(provider(0).with_latency(Duration::from_millis(500)));
    let store = Arc::new(MemoryCacheStore::new());
    let agent = Arc::new(LaunchTemplateCachingAgent::new(provider, store.clone(), scope()));
    let scheduler = CachingScheduler::new(
        vec![agent],
        SchedulerConfig {
            pass_timeout: Duration::from_millis(50),
            ..fast_config(0)
        },
    );

    let results = scheduler.run_once(&TaskContext::new()).await;
    assert!(matches!(results[0].1, Err(SyncError::Timeout(_))));
    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 0);
}

#[tokio::test]
#[serial]
async fn test_start_runs_until_cancelled() {
    setup_logging();
    let config = Config::from_toml(
        r#"
        [global]
        concurrency_limit = 2
        sync_interval_secs = 1

        [[accounts]]
        name = "prod"
        regions = ["us-east-1"]

        [[accounts]]
        name = "staging"
        regions = ["us-east-1", "eu-west-1"]
        "#,
    )
    .unwrap();

    let store = Arc::new(MemoryCacheStore::new());
    let metrics = SyncMetrics::new();
    let scheduler = Arc::new(CachingScheduler::from_config(
        &config,
        Arc::new(provider(2)),
        store.clone(),
        metrics.clone(),
    ));
    assert_eq!(scheduler.agents().len(), 3);

    let ctx = TaskContext::new();
    let cancel = ctx.cancellation().clone();
    let runner = scheduler.clone();
    let handle = tokio::spawn(async move { runner.start(ctx).await });

    tokio::time::sleep(Duration::from_millis(200)).await;
    cancel.cancel();
    tokio::time::timeout(Duration::from_secs(2), handle)
        .await
        .expect("scheduler stops after cancellation")
        .unwrap();

    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 1);
    assert_eq!(store.entries(Namespace::LaunchTemplates, &scope()).len(), 3);
    // 快照中没有的作用域同步为空集合
    let staging = ltsync::Scope::new("staging", "eu-west-1");
    assert_eq!(store.generation(Namespace::LaunchTemplates, &staging), 1);
    assert!(store.entries(Namespace::LaunchTemplates, &staging).is_empty());
    assert_eq!(metrics.snapshot().len(), 3);
}
