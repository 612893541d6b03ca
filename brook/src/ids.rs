//! # 临时消费组 Id

use std::{
    sync::atomic::{AtomicU64, Ordering},
    time::{SystemTime, UNIX_EPOCH},
};
use uuid::Uuid;

/// 临时消费组 Id 生成特征
pub trait GroupIds: Send + Sync {
    /// 以前缀生成新的消费组 Id
    fn next_id(&self, prefix: &str) -> String;
}

/// 时间戳加随机后缀，形如 `{prefix}-{微秒}-{8位十六进制}`
#[derive(Debug, Clone, Copy, Default)]
pub struct TimestampIds;

impl GroupIds for TimestampIds {
    fn next_id(&self, prefix: &str) -> String {
        let micros = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros())
            .unwrap_or_default();
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{prefix}-{micros}-{}", &suffix[..8])
    }
}

/// 递增序号，供测试使用确定的 Id
#[derive(Debug, Default)]
pub struct SequenceIds {
    next: AtomicU64,
}

impl GroupIds for SequenceIds {
    fn next_id(&self, prefix: &str) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{prefix}-{n}")
    }
}
