//! # 测试工具
//!
//! 内存代理与记录构造，供本库及下游库的测试使用。

pub mod memory;

pub use memory::{MemoryBroker, MemorySubscription};

use crate::record::RawRecord;

/// 原始记录构造器
#[derive(Debug, Clone)]
pub struct RawRecordBuilder {
    raw: RawRecord,
}

impl RawRecordBuilder {
    /// 以主题、分区与偏移量构造
    pub fn new(topic: &str, partition: i32, offset: i64) -> Self {
        Self {
            raw: RawRecord {
                topic: topic.to_owned(),
                partition,
                offset,
                ..RawRecord::default()
            },
        }
    }

    /// 设置键
    pub fn key(mut self, key: &str) -> Self {
        self.raw.key = Some(key.as_bytes().to_vec());
        self
    }

    /// 设置值
    pub fn value(mut self, value: impl AsRef<[u8]>) -> Self {
        self.raw.value = Some(value.as_ref().to_vec());
        self
    }

    /// 追加消息头
    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.raw
            .headers
            .push((name.to_owned(), Some(value.as_bytes().to_vec())));
        self
    }

    /// 设置时间戳
    pub fn timestamp(mut self, millis: i64) -> Self {
        self.raw.timestamp = Some(millis);
        self
    }

    /// 完成构造
    pub fn build(self) -> RawRecord {
        self.raw
    }
}
