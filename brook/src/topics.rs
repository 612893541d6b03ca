//! # 主题辅助

use crate::{
    broker::{NewTopicSpec, TopicAdmin},
    errors::BrookError,
};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

impl NewTopicSpec {
    /// 以分区数与复制因子构造
    pub fn new(name: impl Into<String>, partitions: i32, replication: i32) -> Self {
        Self {
            name: name.into(),
            partitions,
            replication,
            configs: Vec::new(),
        }
    }

    /// 追加主题级配置
    pub fn config(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.configs.push((key.into(), value.into()));
        self
    }
}

/// 保留代理上已存在的主题，顺序不变
#[instrument(name = "retain_existing", skip_all)]
pub async fn retain_existing<A>(admin: &A, topics: &[String]) -> Result<Vec<String>, BrookError>
where
    A: TopicAdmin + ?Sized,
{
    let known: HashSet<String> = admin
        .list_topics()
        .await?
        .into_iter()
        .map(|t| t.name)
        .collect();
    let (present, missing): (Vec<String>, Vec<String>) =
        topics.iter().cloned().partition(|t| known.contains(t));
    if !missing.is_empty() {
        warn!(?missing, "忽略不存在的主题");
    }
    Ok(present)
}

/// 创建缺失的主题，返回新建的主题名
#[instrument(name = "ensure_topics", skip_all)]
pub async fn ensure_topics<A>(admin: &A, specs: &[NewTopicSpec]) -> Result<Vec<String>, BrookError>
where
    A: TopicAdmin + ?Sized,
{
    let mut created = Vec::new();
    for spec in specs {
        if admin.create_topic(spec).await? {
            info!(topic = %spec.name, "创建主题");
            created.push(spec.name.clone());
        }
    }
    Ok(created)
}
