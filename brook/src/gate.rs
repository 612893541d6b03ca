//! # 完成闸门
//!
//! 计数阈值与截止时间两个触发源竞争同一个单次信号，先到者生效，后到者无效。

use serde::Serialize;
use tokio::time::{Duration, Instant};
use tracing::debug;

/// 闸门触发源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// 已收集记录数达到阈值
    Threshold,
    /// 到达截止时间
    Deadline,
}

/// 单次触发的完成闸门
#[derive(Debug)]
pub struct CompletionGate {
    threshold: usize,
    deadline: Instant,
    fired: Option<Trigger>,
}

impl CompletionGate {
    /// 自当前时刻起布设闸门
    pub fn arm(threshold: usize, timeout: Duration) -> Self {
        Self {
            threshold,
            deadline: Instant::now() + timeout,
            fired: None,
        }
    }

    /// 截止时刻
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// 观察已接收记录数，本次调用触发闸门时返回 `true`
    pub fn observe(&mut self, accepted: usize) -> bool {
        accepted >= self.threshold && self.fire(Trigger::Threshold)
    }

    /// 触发闸门，仅首次触发返回 `true`
    pub fn fire(&mut self, trigger: Trigger) -> bool {
        if let Some(first) = self.fired {
            debug!("闸门已由{first:?}触发，忽略{trigger:?}");
            return false;
        }
        debug!("闸门由{trigger:?}触发");
        self.fired = Some(trigger);
        true
    }

    /// 是否已触发
    pub fn is_resolved(&self) -> bool {
        self.fired.is_some()
    }

    /// 实际生效的触发源
    pub fn trigger(&self) -> Option<Trigger> {
        self.fired
    }
}
