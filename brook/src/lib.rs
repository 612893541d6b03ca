//! # **brook** 核心库
//!
//! 面向流式代理的有界消费、消费组延迟核对与流式聚合。
//! 代理访问通过 [`broker`] 中的特征抽象，Kafka 实现见 `brook-kafka`。

#![warn(missing_docs)]

pub mod aggregate;
pub mod broker;
pub mod config;
pub mod errors;
pub mod filter;
pub mod gate;
pub mod ids;
pub mod reconcile;
pub mod record;
pub mod session;
pub mod topics;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

#[cfg(test)]
mod tests;

pub use aggregate::{KeySource, Reducer, ReducerConfig, Summary, SummaryResult, aggregate, summarize};
pub use errors::{BrookError, ConfigError, Failure, FailureKind};
pub use filter::HeaderFilter;
pub use gate::{CompletionGate, Trigger};
pub use ids::{GroupIds, SequenceIds, TimestampIds};
pub use reconcile::{GroupLag, PartitionOffsetInfo, reconcile_lag};
pub use record::{ConsumedRecord, RawRecord, decode};
pub use session::{ConsumerSession, ConsumptionRequest, ConsumptionResult, consume};
