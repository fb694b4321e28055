//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了任务进度事件和显式传递的任务上下文。

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// 进度事件
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressEvent {
    pub task_id: Uuid,
    pub phase: String,
    pub status: String,
    pub at: DateTime<Utc>,
}

/// 进度事件的接收端
#[derive(Debug, Clone, Default)]
pub enum ProgressSink {
    /// 丢弃所有事件
    #[default]
    Discard,
    /// 发往通道
    Channel(mpsc::UnboundedSender<ProgressEvent>),
}

impl ProgressSink {
    /// 创建通道接收端，返回发送端和接收端
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProgressSink::Channel(tx), rx)
    }

    fn emit(&self, event: ProgressEvent) {
        if let ProgressSink::Channel(tx) = self {
            // 接收端已关闭时忽略
            let _ = tx.send(event);
        }
    }
}

/// 一次同步或变更任务的上下文
///
/// 携带任务 ID、取消信号和进度接收端，由调用方显式传入
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: Uuid,
    cancel: CancellationToken,
    progress: ProgressSink,
}

impl Default for TaskContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskContext {
    pub fn new() -> Self {
        Self {
            task_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            progress: ProgressSink::Discard,
        }
    }

    pub fn with_progress(mut self, progress: ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// 派生子任务上下文：新的任务 ID，父任务取消时一并取消
    pub fn child(&self) -> Self {
        Self {
            task_id: Uuid::new_v4(),
            cancel: self.cancel.child_token(),
            progress: self.progress.clone(),
        }
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn update_status(&self, phase: &str, status: impl Into<String>) {
        self.progress.emit(ProgressEvent {
            task_id: self.task_id,
            phase: phase.to_string(),
            status: status.into(),
            at: Utc::now(),
        });
    }
}
