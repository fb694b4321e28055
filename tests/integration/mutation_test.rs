//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 启动模板版本变更集成测试

use ltsync::error::{FetchError, MutationError};
use ltsync::mutation::{
    ImageSelection, ModifyLaunchTemplateDescription, ModifyLaunchTemplateOperation,
    TemplateChanges, VersionSelector,
};
use ltsync::{
    Keys, LaunchTemplateCachingAgent, MemoryCacheStore, Namespace, SnapshotProvider,
    TaskContext, TemplateIdentity,
};
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::collections::BTreeSet;
use std::sync::Arc;

#[path = "../common/mod.rs"]
mod common;

use common::{provider, scope, setup_logging, ACCOUNT, REGION};

fn operation(provider: &Arc<SnapshotProvider>) -> ModifyLaunchTemplateOperation {
    ModifyLaunchTemplateOperation::new(provider.clone(), provider.clone())
}

fn description(changes: TemplateChanges) -> ModifyLaunchTemplateDescription {
    ModifyLaunchTemplateDescription {
        account: ACCOUNT.to_string(),
        region: REGION.to_string(),
        launch_template: TemplateIdentity::new("lt-web"),
        source_version: VersionSelector::Latest,
        observed_version: None,
        changes,
    }
}

#[tokio::test]
async fn test_append_only_groups_create_new_version() {
    setup_logging();
    let provider = Arc::new(provider(0));
    let changes = TemplateChanges {
        security_groups: Some(vec!["sg-b".into()]),
        security_groups_append_only: true,
        ..Default::default()
    };

    let outcome = operation(&provider)
        .operate(&TaskContext::new(), description(changes))
        .await
        .unwrap();

    assert!(outcome.plan.changed);
    assert_eq!(outcome.plan.base_version_number, 2);
    assert_eq!(outcome.new_version, Some(3));
    assert!(outcome.resync.is_none());

    let submissions = provider.submissions().await;
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].base_version, 2);
    assert_eq!(submissions[0].attributes["securityGroupIds"], json!(["sg-a", "sg-b"]));
    assert_eq!(submissions[0].attributes["imageId"], json!("ami-42"));
    assert_eq!(submissions[0].attributes["instanceType"], json!("m5.large"));
}

/// 镜像名称解析为当前已使用的镜像时不创建新版本
#[tokio::test]
async fn test_same_image_is_a_no_op() {
    setup_logging();
    let provider = Arc::new(provider(0));
    let changes = TemplateChanges {
        image: Some(ImageSelection::named("web-base-2024")),
        instance_type: Some("m5.large".into()),
        ..Default::default()
    };

    let outcome = operation(&provider)
        .operate(&TaskContext::new(), description(changes))
        .await
        .unwrap();

    assert!(!outcome.plan.changed);
    assert!(outcome.plan.changed_fields.is_empty());
    assert_eq!(outcome.new_version, None);
    assert!(provider.submissions().await.is_empty());
}

#[tokio::test]
async fn test_resolved_image_overlaid() {
    setup_logging();
    let provider = Arc::new(provider(0));
    let changes = TemplateChanges {
        image: Some(ImageSelection::named("web-base-2025")),
        ..Default::default()
    };

    let outcome = operation(&provider)
        .operate(&TaskContext::new(), description(changes))
        .await
        .unwrap();

    assert_eq!(outcome.plan.resulting_attributes["imageId"], json!("ami-77"));
    assert_eq!(
        outcome.plan.changed_fields,
        BTreeSet::from(["imageId".to_string()])
    );
}

#[tokio::test]
async fn test_unknown_image_rejected() {
    setup_logging();
    let provider = Arc::new(provider(0));
    let changes = TemplateChanges {
        image: Some(ImageSelection::named("does-not-exist")),
        ..Default::default()
    };

    let err = operation(&provider)
        .operate(&TaskContext::new(), description(changes))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::ImageNotFound(name) if name == "does-not-exist"));
    assert!(provider.submissions().await.is_empty());
}

#[tokio::test]
async fn test_stale_observed_version_rejected() {
    setup_logging();
    let provider = Arc::new(provider(0));
    let mut description = description(TemplateChanges {
        instance_type: Some("c5.xlarge".into()),
        ..Default::default()
    });
    description.observed_version = Some(1);

    let err = operation(&provider)
        .operate(&TaskContext::new(), description)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        MutationError::PreconditionFailed { expected: 1, actual: 2 }
    ));
    assert!(provider.submissions().await.is_empty());
}

#[tokio::test]
async fn test_explicit_source_version() {
    setup_logging();
    let provider = Arc::new(provider(0));
    let mut description = description(TemplateChanges {
        ebs_optimized: Some(true),
        ..Default::default()
    });
    description.source_version = VersionSelector::Number(1);

    let outcome = operation(&provider)
        .operate(&TaskContext::new(), description)
        .await
        .unwrap();
    assert_eq!(outcome.plan.base_version_number, 1);
    assert_eq!(outcome.plan.resulting_attributes["imageId"], json!("ami-41"));
    assert_eq!(outcome.new_version, Some(3));

    let mut missing = self::description(TemplateChanges::default());
    missing.source_version = VersionSelector::Number(9);
    let err = operation(&provider)
        .operate(&TaskContext::new(), missing)
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::VersionNotFound { .. }));
}

#[tokio::test]
async fn test_fetch_failure_surfaces() {
    setup_logging();
    let provider = Arc::new(provider(0));
    provider.inject_version_fault("lt-web", FetchError::Transient("throttled".into()));

    let err = operation(&provider)
        .operate(&TaskContext::new(), description(TemplateChanges::default()))
        .await
        .unwrap_err();
    assert!(matches!(err, MutationError::Fetch(FetchError::Transient(_))));
}

#[tokio::test]
async fn test_provider_rejection_surfaces() {
    setup_logging();
    let provider = Arc::new(provider(0));
    provider.fail_submissions(true);

    let err = operation(&provider)
        .operate(
            &TaskContext::new(),
            description(TemplateChanges {
                key_pair: Some("ops".into()),
                ..Default::default()
            }),
        )
        .await
        .unwrap_err();
    match err {
        MutationError::Provider(e) => assert_eq!(e.operation, "CreateLaunchTemplateVersion"),
        other => panic!("unexpected error: {:?}", other),
    }
}

/// 提交成功后重新同步，缓存中的镜像关联随之更新
#[tokio::test]
async fn test_resync_after_submission() {
    setup_logging();
    let provider = Arc::new(provider(2));
    let store = Arc::new(MemoryCacheStore::new());
    let agent = Arc::new(LaunchTemplateCachingAgent::new(
        provider.clone(),
        store.clone(),
        scope(),
    ));
    agent.sync(&TaskContext::new()).await.unwrap();

    let outcome = operation(&provider)
        .with_resync(agent)
        .operate(
            &TaskContext::new(),
            description(TemplateChanges {
                image: Some(ImageSelection::named("web-base-2025")),
                ..Default::default()
            }),
        )
        .await
        .unwrap();

    let report = outcome.resync.expect("resync configured").unwrap();
    assert_eq!(report.entries, 3);
    assert_eq!(store.generation(Namespace::LaunchTemplates, &scope()), 2);

    let key = Keys::launch_template("web-v1", ACCOUNT, REGION).unwrap();
    let entry = store.get(&key).unwrap();
    let images: Vec<_> = entry.related(Namespace::Images).cloned().collect();
    assert_eq!(images, vec![Keys::image("ami-77", ACCOUNT, REGION).unwrap()]);
    assert_eq!(entry.attributes["latestVersionNumber"], json!(3));
}

/// 追加模式下，任意请求都不会移除已有安全组
#[tokio::test]
async fn test_append_only_never_removes_groups() {
    setup_logging();
    let pool: Vec<String> = (0..8).map(|i| format!("sg-{}", i)).collect();
    let mut rng = rand::thread_rng();

    for _ in 0..25 {
        let provider = Arc::new(provider(0));
        let mut requested = pool.clone();
        requested.shuffle(&mut rng);
        requested.truncate(rng.gen_range(1..=pool.len()));

        let outcome = operation(&provider)
            .operate(
                &TaskContext::new(),
                description(TemplateChanges {
                    security_groups: Some(requested.clone()),
                    security_groups_append_only: true,
                    ..Default::default()
                }),
            )
            .await
            .unwrap();

        let groups: BTreeSet<String> = outcome.plan.resulting_attributes["securityGroupIds"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(groups.contains("sg-a"));
        assert!(requested.iter().all(|g| groups.contains(g)));
        assert_eq!(groups.len(), requested.len() + 1);
        assert!(outcome.plan.changed);
    }
}
