//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步服务的日志和链路追踪初始化。

use opentelemetry::global;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::trace::TracerProvider as SdkTracerProvider;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter, Registry};

fn env_filter(filter: Option<&str>) -> EnvFilter {
    match filter {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

/// 初始化控制台日志
///
/// `filter` 为空时读取 `RUST_LOG`，仍为空则使用 `info`。
/// 重复调用时保留第一次设置的 subscriber。
pub fn init_logging(filter: Option<&str>, json: bool) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter(filter))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);

    let result = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        tracing::debug!("logging already initialized: {}", e);
    }
}

/// 初始化控制台日志和 OpenTelemetry 链路追踪
///
/// 同步、变更入口上 `#[instrument]` 产生的 span 同时写入控制台并交给 tracer provider。
/// provider 未配置导出器，span 只在进程内传播上下文。
/// 返回 false 表示全局 subscriber 已被设置，本次调用未生效。
pub fn init_tracing(service_name: &str, filter: Option<&str>) -> bool {
    let provider = SdkTracerProvider::builder().build();
    let tracer = provider.tracer(service_name.to_string());
    global::set_tracer_provider(provider);

    let subscriber = Registry::default()
        .with(env_filter(filter))
        .with(
            tracing_subscriber::fmt::layer()
                .with_span_events(FmtSpan::CLOSE)
                .with_writer(std::io::stderr),
        )
        .with(tracing_opentelemetry::layer().with_tracer(tracer));

    tracing::subscriber::set_global_default(subscriber).is_ok()
}

/// 关闭全局 tracer provider，进程退出前调用
pub fn shutdown_tracing() {
    global::shutdown_tracer_provider();
}
