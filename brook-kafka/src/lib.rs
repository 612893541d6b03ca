//! # **brook** 的 Kafka 实现
//!
//! [`KafkaClients`] 实现 `brook` 的全部代理特征：订阅、偏移量核对、主题管理与发布。

pub mod admin;
pub mod client;
pub mod config;
pub mod consumer;
pub mod producer;

pub use client::KafkaClients;
pub use config::{KafkaConfig, TopicDefaults};
pub use consumer::KafkaSubscription;

use brook::broker::NewTopicSpec;

impl KafkaConfig {
    /// 以默认分区数与复制因子构造新建主题参数
    pub fn topic_spec(&self, name: impl Into<String>) -> NewTopicSpec {
        NewTopicSpec::new(name, self.topic.partitions, self.topic.replicas)
    }
}
