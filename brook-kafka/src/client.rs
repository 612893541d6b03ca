//! Kafka 客户端持有者
//!
//! 启动时连接一次，会话、核对与发布共用；关闭时冲刷生产者。

use crate::config::KafkaConfig;
use brook::errors::BrookError;
use rdkafka::{
    ClientConfig,
    admin::AdminClient,
    client::DefaultClientContext,
    producer::{FutureProducer, Producer},
};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tracing::{info, instrument};

/// Kafka 客户端
pub struct KafkaClients {
    pub(crate) config: KafkaConfig,
    pub(crate) admin: Arc<AdminClient<DefaultClientContext>>,
    pub(crate) producer: FutureProducer,
}

impl KafkaClients {
    /// 创建管理客户端与生产者，并以元数据请求验证连通性
    #[instrument(name = "connect", skip_all, fields(bootstrap = %config.bootstrap))]
    pub async fn connect(config: KafkaConfig) -> Result<Self, BrookError> {
        let clients = Self::build(config)?;
        let brokers = clients.check_reachable().await?;
        info!(brokers, "连接 Kafka 集群");
        Ok(clients)
    }

    /// 仅创建客户端，不访问集群
    pub(crate) fn build(config: KafkaConfig) -> Result<Self, BrookError> {
        let base = client_config(&config);
        let admin: AdminClient<DefaultClientContext> = base
            .create()
            .map_err(|e| BrookError::Connection(format!("创建管理客户端失败：{e}")))?;
        let mut producer_config = base.clone();
        for (key, value) in &config.producer {
            producer_config.set(key, value);
        }
        let producer: FutureProducer = producer_config
            .create()
            .map_err(|e| BrookError::Connection(format!("创建生产者失败：{e}")))?;
        Ok(Self {
            config,
            admin: Arc::new(admin),
            producer,
        })
    }

    /// 请求集群元数据，返回代理节点数
    pub(crate) async fn check_reachable(&self) -> Result<usize, BrookError> {
        let admin = Arc::clone(&self.admin);
        let timeout = self.config.timeout;
        spawn_blocking(move || {
            admin
                .inner()
                .fetch_metadata(None, timeout)
                .map(|metadata| metadata.brokers().len())
        })
        .await
        .map_err(|e| BrookError::Connection(e.to_string()))?
        .map_err(|e| BrookError::Connection(format!("获取集群元数据失败：{e}")))
    }

    /// 配置
    pub fn config(&self) -> &KafkaConfig {
        &self.config
    }

    /// 冲刷生产者中尚未送达的记录
    #[instrument(name = "shutdown", skip_all)]
    pub async fn shutdown(self) -> Result<(), BrookError> {
        let Self {
            config, producer, ..
        } = self;
        spawn_blocking(move || producer.flush(config.timeout))
            .await
            .map_err(|e| BrookError::Publish(e.to_string()))?
            .map_err(|e| BrookError::Publish(format!("冲刷生产者失败：{e}")))?;
        info!("断开 Kafka 集群");
        Ok(())
    }

    /// 公共客户端设置
    pub(crate) fn client_config(&self) -> ClientConfig {
        client_config(&self.config)
    }
}

fn client_config(config: &KafkaConfig) -> ClientConfig {
    let mut cc = ClientConfig::new();
    cc.set("bootstrap.servers", &config.bootstrap);
    for (key, value) in &config.client {
        cc.set(key, value);
    }
    cc
}
