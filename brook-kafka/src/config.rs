//! Kafka 客户端配置

use brook::{
    config::{ConsumeConfig, build_config, load_section},
    errors::ConfigError,
};
use config::Config;
use serde::{Deserialize, de::DeserializeOwned};
use std::{collections::HashMap, path::PathBuf};
use tokio::time::Duration;
use validator::Validate;

/// 新建主题默认参数
#[derive(Debug, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct TopicDefaults {
    /// 分区数
    #[validate(range(min = 1))]
    pub partitions: i32,
    /// 复制因子
    #[validate(range(min = 1))]
    pub replicas: i32,
}

impl Default for TopicDefaults {
    fn default() -> Self {
        Self {
            partitions: 6,
            replicas: 3,
        }
    }
}

/// Kafka 配置
#[derive(Debug, Clone, PartialEq)]
pub struct KafkaConfig {
    /// 代理地址
    pub bootstrap: String,
    /// 管理与元数据操作超时
    pub timeout: Duration,
    /// 所有客户端共用的额外设置，如安全协议与认证
    pub client: HashMap<String, String>,
    /// 生产者设置
    pub producer: HashMap<String, String>,
    /// 消费会话默认配置
    pub consume: ConsumeConfig,
    /// 新建主题默认参数
    pub topic: TopicDefaults,
}

fn optional<T: DeserializeOwned>(config: &Config, key: &str) -> Result<Option<T>, ConfigError> {
    match config.get::<T>(key) {
        Ok(v) => Ok(Some(v)),
        Err(config::ConfigError::NotFound(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl KafkaConfig {
    /// 从本库 `config` 目录与环境变量加载
    pub fn load() -> Result<Self, ConfigError> {
        let config = build_config(PathBuf::from(env!("CARGO_MANIFEST_DIR")))?;
        Self::from_config(&config)
    }

    /// 从已构建的配置加载
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let bootstrap: String = optional(config, "bootstrap")?
            .filter(|b: &String| !b.trim().is_empty())
            .ok_or_else(|| ConfigError::Missing("bootstrap".to_owned()))?;
        let timeout = Duration::from_secs(optional(config, "timeout")?.unwrap_or(5));
        if timeout.is_zero() {
            return Err(ConfigError::ValidationError {
                section: "kafka".to_owned(),
                key: "timeout".to_owned(),
                message: "超时必须大于0".to_owned(),
            });
        }
        let client = optional(config, "client")?.unwrap_or_default();
        let mut producer = HashMap::from([("compression.type".to_owned(), "gzip".to_owned())]);
        producer.extend(optional::<HashMap<String, String>>(config, "producer")?.unwrap_or_default());

        Ok(Self {
            bootstrap,
            timeout,
            client,
            producer,
            consume: load_section(config, "consume")?,
            topic: load_section(config, "topic")?,
        })
    }
}
