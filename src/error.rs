//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步引擎和版本变更的错误类型。

use thiserror::Error;

/// 缓存键错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// 字段为空或包含保留分隔符
    #[error("Invalid key field `{field}`: {reason}")]
    InvalidField { field: &'static str, reason: String },

    /// 无法解析序列化后的键
    #[error("Cannot parse key `{key}`: {reason}")]
    Parse { key: String, reason: String },
}

/// 分页拉取错误
///
/// 区分可重试和不可重试两类失败，重试策略由调用方决定
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// 临时失败（限流、超时等），可退避重试
    #[error("Transient fetch error: {0}")]
    Transient(String),

    /// 致命失败（鉴权失败等），不可重试
    #[error("Fatal fetch error: {0}")]
    Fatal(String),
}

impl FetchError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// 缓存存储错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cache store rejected entries: {0}")]
    Rejected(String),
}

/// 同步过程错误
#[derive(Error, Debug)]
pub enum SyncError {
    /// 某个资源拉取失败，本轮同步整体放弃
    #[error("Sync failed for {resource}: {source}")]
    Failed {
        resource: String,
        #[source]
        source: FetchError,
    },

    /// 同步被取消，结果已丢弃
    #[error("Sync pass cancelled")]
    Cancelled,

    /// 同步超时，结果已丢弃
    #[error("Sync pass timed out after {0} seconds")]
    Timeout(u64),

    /// 缓存键构造失败
    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    /// 写入缓存存储失败
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// 资源无法转换为缓存属性
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl SyncError {
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Failed { source, .. } => source.is_retryable(),
            SyncError::Timeout(_) | SyncError::Store(StoreError::Unavailable(_)) => true,
            _ => false,
        }
    }
}

/// 版本变更错误
#[derive(Error, Debug)]
pub enum MutationError {
    /// 请求引用了资源类型不支持的字段
    #[error("Unknown field `{0}` for launch template data")]
    UnknownField(String),

    /// 字段取值非法
    #[error("Invalid value for `{field}`: {reason}")]
    InvalidField { field: String, reason: String },

    /// 当前版本号与调用方观察到的不一致
    #[error("Precondition failed: expected version {expected}, current version is {actual}")]
    PreconditionFailed { expected: u64, actual: u64 },

    /// 找不到指定的源版本
    #[error("Launch template {template} has no version matching {selector}")]
    VersionNotFound { template: String, selector: String },

    /// 镜像名称无法解析
    #[error("Image `{0}` not found")]
    ImageNotFound(String),

    /// 读取当前版本失败
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// 提交新版本失败，版本可能已创建也可能未创建
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

/// 外部提供方在提交新版本时返回的错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct ProviderError {
    pub operation: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// 镜像解析错误
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Image `{0}` not found")]
    NotFound(String),

    #[error("Image lookup failed: {0}")]
    Fetch(#[from] FetchError),
}

/// 配置错误
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Cannot parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// 同步结果类型别名
pub type Result<T> = std::result::Result<T, SyncError>;
