//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了测试的通用工具函数和快照数据。

use ltsync::provider::{ProviderSnapshot, SnapshotProvider};
use ltsync::Scope;
use serde_json::{json, Value};
use std::sync::Once;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

static INIT: Once = Once::new();

pub const ACCOUNT: &str = "prod";
pub const REGION: &str = "us-east-1";

pub fn setup_logging() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_span_events(FmtSpan::CLOSE)
            .with_env_filter(EnvFilter::new("debug"))
            .try_init()
            .ok();
    });
}

pub fn scope() -> Scope {
    Scope::new(ACCOUNT, REGION)
}

pub fn template(id: &str, name: &str, latest: u64) -> Value {
    json!({
        "launchTemplateId": id,
        "launchTemplateName": name,
        "latestVersionNumber": latest,
        "defaultVersionNumber": 1,
        "createTime": "2025-01-01T00:00:00Z",
        "createdBy": "arn:aws:iam::123456789012:user/ops"
    })
}

pub fn version(id: &str, name: &str, number: u64, data: Value) -> Value {
    json!({
        "launchTemplateId": id,
        "launchTemplateName": name,
        "versionNumber": number,
        "defaultVersion": number == 1,
        "createTime": "2025-01-01T00:00:00Z",
        "launchTemplateData": data
    })
}

/// web-v1 有两个版本，最新版本引用 ami-42；另有 `count` 个无镜像的模板
pub fn snapshot(count: usize) -> ProviderSnapshot {
    let mut templates = vec![template("lt-web", "web-v1", 2)];
    let mut versions = vec![
        version("lt-web", "web-v1", 1, json!({ "imageId": "ami-41", "instanceType": "t3.micro" })),
        version(
            "lt-web",
            "web-v1",
            2,
            json!({
                "imageId": "ami-42",
                "instanceType": "m5.large",
                "securityGroupIds": ["sg-a"]
            }),
        ),
    ];
    for i in 0..count {
        let id = format!("lt-{}", i);
        let name = format!("batch{}-worker", i);
        templates.push(template(&id, &name, 1));
        versions.push(version(&id, &name, 1, json!({ "instanceType": "c5.large" })));
    }

    serde_json::from_value(json!({
        "scopes": [{
            "account": ACCOUNT,
            "region": REGION,
            "templates": templates,
            "versions": versions,
            "images": { "web-base-2025": "ami-77", "web-base-2024": "ami-42" }
        }]
    }))
    .unwrap()
}

#[allow(dead_code)]
pub fn provider(count: usize) -> SnapshotProvider {
    SnapshotProvider::new(snapshot(count))
}
