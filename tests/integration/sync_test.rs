//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 启动模板全量同步集成测试

use ltsync::error::{FetchError, SyncError};
use ltsync::progress::{ProgressSink, TaskContext};
use ltsync::{Keys, LaunchTemplateCachingAgent, MemoryCacheStore, Namespace};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[path = "../common/mod.rs"]
mod common;

use common::{provider, scope, setup_logging, ACCOUNT, REGION};

fn agent(
    provider: Arc<ltsync::SnapshotProvider>,
    store: Arc<MemoryCacheStore>,
) -> LaunchTemplateCachingAgent {
    LaunchTemplateCachingAgent::new(provider, store, scope())
}

/// 最新版本的镜像成为模板条目的唯一关联
#[tokio::test]
async fn test_latest_version_image_is_related() {
    setup_logging();
    let store = Arc::new(MemoryCacheStore::new());
    let agent = agent(Arc::new(provider(0)), store.clone());

    let report = agent.sync(&TaskContext::new()).await.unwrap();
    assert_eq!(report.entries, 1);
    assert_eq!(report.related, 1);

    let key = Keys::launch_template("web-v1", ACCOUNT, REGION).unwrap();
    let entry = store.get(&key).expect("web-v1 cached");

    let images: Vec<_> = entry.related(Namespace::Images).cloned().collect();
    assert_eq!(images, vec![Keys::image("ami-42", ACCOUNT, REGION).unwrap()]);

    let versions = entry.attributes["versions"].as_array().unwrap();
    let numbers: Vec<_> = versions.iter().map(|v| v["versionNumber"].clone()).collect();
    assert_eq!(numbers, vec![json!(1), json!(2)]);
    assert_eq!(entry.attributes["latestVersionNumber"], json!(2));
    assert_eq!(entry.attributes["application"], json!("web"));

    let referencing = store.referencing(&Keys::image("ami-42", ACCOUNT, REGION).unwrap());
    assert_eq!(referencing, vec![key.clone()]);

    let related = store.related(&key, Namespace::Images);
    assert_eq!(related.len(), 1);
    assert!(related[0].1.is_none(), "images are not cached by this agent");
}

#[tokio::test]
async fn test_repeated_sync_is_byte_identical() {
    setup_logging();
    let store = Arc::new(MemoryCacheStore::new());
    let agent = agent(Arc::new(provider(6).with_page_size(2)), store.clone());

    agent.sync(&TaskContext::new()).await.unwrap();
    let first = serde_json::to_string(&store.entries(Namespace::LaunchTemplates, &scope())).unwrap();

    agent.sync(&TaskContext::new()).await.unwrap();
    let second = serde_json::to_string(&store.entries(Namespace::LaunchTemplates, &scope())).unwrap();

    assert_eq!(first, second);
    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 2);
}

/// 任一模板的版本拉取失败时整轮作废，存储保留上一代
#[tokio::test]
async fn test_partial_failure_keeps_previous_generation() {
    setup_logging();
    let provider = Arc::new(provider(4));
    let store = Arc::new(MemoryCacheStore::new());
    let agent = agent(provider.clone(), store.clone());

    agent.sync(&TaskContext::new()).await.unwrap();
    let before = store.entries(Namespace::LaunchTemplates, &scope());
    assert_eq!(before.len(), 5);

    provider.inject_version_fault("lt-2", FetchError::Fatal("throttled".into()));
    let err = agent.sync(&TaskContext::new()).await.unwrap_err();
    match &err {
        SyncError::Failed { resource, source } => {
            assert!(resource.contains("lt-2"));
            assert_eq!(source, &FetchError::Fatal("throttled".into()));
        }
        other => panic!("unexpected error: {:?}", other),
    }

    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 1);
    assert_eq!(store.entries(Namespace::LaunchTemplates, &scope()), before);
}

/// 删除的模板在下一轮同步后从存储中消失
#[tokio::test]
async fn test_removed_template_disappears() {
    setup_logging();
    let store = Arc::new(MemoryCacheStore::new());

    agent(Arc::new(provider(3)), store.clone())
        .sync(&TaskContext::new())
        .await
        .unwrap();
    assert_eq!(store.entries(Namespace::LaunchTemplates, &scope()).len(), 4);

    agent(Arc::new(provider(1)), store.clone())
        .sync(&TaskContext::new())
        .await
        .unwrap();
    let names: Vec<_> = store
        .entries(Namespace::LaunchTemplates, &scope())
        .into_iter()
        .map(|e| e.key.name().to_string())
        .collect();
    assert_eq!(names, vec!["batch0-worker", "web-v1"]);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    setup_logging();
    let provider = Arc::new(provider(12).with_latency(Duration::from_millis(20)));
    let store = Arc::new(MemoryCacheStore::new());
    let agent = agent(provider.clone(), store.clone()).with_concurrency_limit(3);

    let report = agent.sync(&TaskContext::new()).await.unwrap();
    assert_eq!(report.entries, 13);
    assert!(provider.max_in_flight() <= 3);
    assert!(provider.max_in_flight() >= 2);
    assert_eq!(provider.version_calls(), 13);
}

#[tokio::test]
async fn test_cancelled_pass_publishes_nothing() {
    setup_logging();
    let provider = Arc::new(provider(8).with_latency(Duration::from_millis(200)));
    let store = Arc::new(MemoryCacheStore::new());
    let agent = agent(provider, store.clone());

    let ctx = TaskContext::new();
    let cancel = ctx.cancellation().clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        cancel.cancel();
    });

    let err = agent.sync(&ctx).await.unwrap_err();
    assert!(matches!(err, SyncError::Cancelled));
    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 0);
}

#[tokio::test]
async fn test_progress_reported() {
    setup_logging();
    let (sink, mut rx) = ProgressSink::channel();
    let ctx = TaskContext::new().with_progress(sink);
    let agent = agent(Arc::new(provider(0)), Arc::new(MemoryCacheStore::new()));

    agent.sync(&ctx).await.unwrap();
    drop(ctx);

    let mut statuses = Vec::new();
    while let Some(event) = rx.recv().await {
        statuses.push(event.status);
    }
    assert!(statuses.first().unwrap().starts_with("Describing launch templates"));
    assert!(statuses.last().unwrap().starts_with("Cached 1 launch templates"));
}
