//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了同步代理的运行指标。

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 单个代理的累计指标
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStats {
    /// 完成的同步轮数
    pub passes: u64,
    /// 失败的同步轮数
    pub failures: u64,
    /// 最近一次发布的条目数
    pub last_entries: usize,
    /// 累计发布的条目数
    pub entries_published: u64,
    /// 累计耗时（秒）
    pub total_duration_secs: f64,
    /// 最近一次失败原因
    pub last_error: Option<String>,
}

impl AgentStats {
    pub fn average_duration_secs(&self) -> f64 {
        let runs = self.passes + self.failures;
        if runs == 0 {
            0.0
        } else {
            self.total_duration_secs / runs as f64
        }
    }
}

/// 同步指标收集器
///
/// 以代理类型为键，可在多个代理之间共享
#[derive(Clone, Debug, Default)]
pub struct SyncMetrics {
    agents: Arc<Mutex<HashMap<String, AgentStats>>>,
}

impl SyncMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, agent_type: &str, entries: usize, duration: Duration) {
        let mut map = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        let stats = map.entry(agent_type.to_string()).or_default();
        stats.passes += 1;
        stats.last_entries = entries;
        stats.entries_published += entries as u64;
        stats.total_duration_secs += duration.as_secs_f64();
    }

    pub fn record_failure(&self, agent_type: &str, error: &str, duration: Duration) {
        let mut map = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        let stats = map.entry(agent_type.to_string()).or_default();
        stats.failures += 1;
        stats.total_duration_secs += duration.as_secs_f64();
        stats.last_error = Some(error.to_string());
    }

    pub fn get(&self, agent_type: &str) -> Option<AgentStats> {
        let map = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        map.get(agent_type).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, AgentStats> {
        let map = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        map.clone()
    }
}
