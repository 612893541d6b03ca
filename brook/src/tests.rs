//! 内部集成测试

mod aggregate_test;

use super::*;
use crate::{
    broker::GroupDescription,
    config::ConsumeConfig,
    test_utils::{MemoryBroker, RawRecordBuilder},
};
use rstest::*;
use std::sync::LazyLock;
use tokio::time::{Duration, Instant};
use tracing::{Level, info};
use tracing_subscriber::fmt;

static INTERNAL_SETUP: LazyLock<()> = LazyLock::new(|| {
    let _ = fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
    info!("启用 {} 测试日志输出", Level::DEBUG);
});

#[fixture]
fn broker() -> MemoryBroker {
    LazyLock::force(&INTERNAL_SETUP);
    MemoryBroker::new()
}

fn request(topics: &[&str], max_messages: usize, timeout_ms: u64) -> ConsumptionRequest {
    ConsumptionRequest::new(topics.iter().copied(), &ConsumeConfig::default())
        .max_messages(max_messages)
        .timeout(Duration::from_millis(timeout_ms))
}

fn json_record(topic: &str, offset: i64, value: &str) -> RawRecord {
    RawRecordBuilder::new(topic, 0, offset)
        .value(value)
        .timestamp(1_700_000_000_000 + offset)
        .build()
}
