//! Kafka 管理操作
//!
//! librdkafka 的元数据、偏移量与消费组查询均为阻塞调用，统一放入阻塞线程池执行。

use crate::client::KafkaClients;
use brook::{
    broker::{
        CommittedOffsets, GroupDescription, GroupMember, GroupSummary, NewTopicSpec, OffsetAdmin,
        TopicAdmin, TopicSummary, Watermarks,
    },
    errors::BrookError,
};
use rdkafka::{
    Offset, TopicPartitionList,
    admin::{AdminOptions, NewTopic, TopicReplication},
    consumer::{BaseConsumer, Consumer},
    error::KafkaResult,
    groups::GroupInfo,
    types::RDKafkaErrorCode,
};
use tokio::task::spawn_blocking;
use tracing::{debug, instrument};

const DEAD: &str = "Dead";

fn is_internal(topic: &str) -> bool {
    topic.starts_with("__")
}

async fn blocking<T, F>(f: F) -> Result<T, BrookError>
where
    F: FnOnce() -> Result<T, BrookError> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| BrookError::Admin(e.to_string()))?
}

/// 按主题整理已提交偏移量，仅保留至少一个分区已提交的主题
pub(crate) fn committed_by_topic(tpl: &TopicPartitionList) -> CommittedOffsets {
    let mut offsets = CommittedOffsets::new();
    for elem in tpl.elements() {
        let committed = match elem.offset() {
            Offset::Offset(n) => n,
            _ => -1,
        };
        offsets
            .entry(elem.topic().to_owned())
            .or_default()
            .insert(elem.partition(), committed);
    }
    offsets.retain(|_, partitions| partitions.values().any(|&o| o >= 0));
    offsets
}

fn describe(group_id: &str, info: Option<&GroupInfo>) -> GroupDescription {
    match info {
        Some(info) => GroupDescription {
            group_id: info.name().to_owned(),
            state: info.state().to_owned(),
            protocol: info.protocol().to_owned(),
            protocol_type: info.protocol_type().to_owned(),
            members: info
                .members()
                .iter()
                .map(|m| GroupMember {
                    member_id: m.id().to_owned(),
                    client_id: m.client_id().to_owned(),
                    client_host: m.client_host().to_owned(),
                })
                .collect(),
        },
        None => GroupDescription {
            group_id: group_id.to_owned(),
            state: DEAD.to_owned(),
            protocol: String::new(),
            protocol_type: String::new(),
            members: Vec::new(),
        },
    }
}

impl KafkaClients {
    fn admin_options(&self) -> AdminOptions {
        AdminOptions::new()
            .operation_timeout(Some(self.config.timeout))
            .request_timeout(Some(self.config.timeout))
    }
}

impl OffsetAdmin for KafkaClients {
    #[instrument(name = "fetch_committed_offsets", skip(self))]
    async fn fetch_committed_offsets(&self, group_id: &str) -> Result<CommittedOffsets, BrookError> {
        let consumer: BaseConsumer = self
            .client_config()
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .create()
            .map_err(|e| BrookError::Connection(format!("创建偏移量查询客户端失败：{e}")))?;
        let timeout = self.config.timeout;
        blocking(move || {
            let query = || -> KafkaResult<TopicPartitionList> {
                let metadata = consumer.fetch_metadata(None, timeout)?;
                let mut tpl = TopicPartitionList::new();
                for topic in metadata.topics().iter().filter(|t| !is_internal(t.name())) {
                    for partition in topic.partitions() {
                        tpl.add_partition(topic.name(), partition.id());
                    }
                }
                consumer.committed_offsets(tpl, timeout)
            };
            query()
                .map(|tpl| committed_by_topic(&tpl))
                .map_err(|e| BrookError::Admin(format!("获取已提交偏移量失败：{e}")))
        })
        .await
    }

    #[instrument(name = "fetch_high_watermarks", skip(self))]
    async fn fetch_high_watermarks(&self, topic: &str) -> Result<Watermarks, BrookError> {
        let admin = self.admin.clone();
        let timeout = self.config.timeout;
        let name = topic.to_owned();
        blocking(move || {
            let fail = |message: String| BrookError::Watermark {
                topic: name.clone(),
                message,
            };
            let client = admin.inner();
            let metadata = client
                .fetch_metadata(Some(name.as_str()), timeout)
                .map_err(|e| fail(e.to_string()))?;
            let meta = metadata
                .topics()
                .iter()
                .find(|t| t.name() == name)
                .ok_or_else(|| fail("主题不存在".to_owned()))?;
            if let Some(e) = meta.error() {
                return Err(fail(format!("{:?}", RDKafkaErrorCode::from(e))));
            }
            let mut watermarks = Watermarks::new();
            for partition in meta.partitions() {
                let (_, high) = client
                    .fetch_watermarks(&name, partition.id(), timeout)
                    .map_err(|e| fail(e.to_string()))?;
                watermarks.insert(partition.id(), high);
            }
            debug!(partitions = watermarks.len(), "获取主题高水位");
            Ok(watermarks)
        })
        .await
    }

    #[instrument(name = "describe_group", skip(self))]
    async fn describe_group(&self, group_id: &str) -> Result<GroupDescription, BrookError> {
        let admin = self.admin.clone();
        let timeout = self.config.timeout;
        let group_id = group_id.to_owned();
        blocking(move || {
            let list = admin
                .inner()
                .fetch_group_list(Some(group_id.as_str()), timeout)
                .map_err(|e| BrookError::Admin(format!("描述消费组失败：{e}")))?;
            let info = list.groups().iter().find(|g| g.name() == group_id);
            Ok(describe(&group_id, info))
        })
        .await
    }
}

impl TopicAdmin for KafkaClients {
    #[instrument(name = "list_topics", skip(self))]
    async fn list_topics(&self) -> Result<Vec<TopicSummary>, BrookError> {
        let admin = self.admin.clone();
        let timeout = self.config.timeout;
        blocking(move || {
            let metadata = admin
                .inner()
                .fetch_metadata(None, timeout)
                .map_err(|e| BrookError::Admin(format!("列出主题失败：{e}")))?;
            let mut topics: Vec<TopicSummary> = metadata
                .topics()
                .iter()
                .filter(|t| !is_internal(t.name()))
                .map(|t| TopicSummary {
                    name: t.name().to_owned(),
                    partitions: t.partitions().len(),
                })
                .collect();
            topics.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(topics)
        })
        .await
    }

    #[instrument(name = "create_topic", skip_all, fields(topic = %spec.name))]
    async fn create_topic(&self, spec: &NewTopicSpec) -> Result<bool, BrookError> {
        let mut topic = NewTopic::new(
            &spec.name,
            spec.partitions,
            TopicReplication::Fixed(spec.replication),
        );
        for (key, value) in &spec.configs {
            topic = topic.set(key, value);
        }
        let results = self
            .admin
            .create_topics([&topic], &self.admin_options())
            .await
            .map_err(|e| BrookError::Admin(format!("创建主题失败：{e}")))?;
        match results.into_iter().next() {
            Some(Ok(_)) => Ok(true),
            Some(Err((_, RDKafkaErrorCode::TopicAlreadyExists))) => Ok(false),
            Some(Err((name, code))) => Err(BrookError::Admin(format!("创建主题{name}失败：{code}"))),
            None => Err(BrookError::Admin("创建主题无返回结果".to_owned())),
        }
    }

    #[instrument(name = "list_groups", skip(self))]
    async fn list_groups(&self) -> Result<Vec<GroupSummary>, BrookError> {
        let admin = self.admin.clone();
        let timeout = self.config.timeout;
        blocking(move || {
            let list = admin
                .inner()
                .fetch_group_list(None, timeout)
                .map_err(|e| BrookError::Admin(format!("列出消费组失败：{e}")))?;
            Ok(list
                .groups()
                .iter()
                .map(|g| GroupSummary {
                    group_id: g.name().to_owned(),
                    state: g.state().to_owned(),
                    protocol_type: g.protocol_type().to_owned(),
                })
                .collect())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn committed_offsets_group_by_topic() {
        let mut tpl = TopicPartitionList::new();
        tpl.add_partition_offset("google-search-results", 0, Offset::Offset(10))
            .unwrap();
        tpl.add_partition_offset("google-search-results", 1, Offset::Invalid)
            .unwrap();
        tpl.add_partition_offset("youtube-search-results", 0, Offset::Invalid)
            .unwrap();

        let offsets = committed_by_topic(&tpl);

        assert_eq!(offsets.len(), 1);
        let google = &offsets["google-search-results"];
        assert_eq!(google[&0], 10);
        assert_eq!(google[&1], -1);
    }

    #[test]
    fn unknown_group_is_dead() {
        let group = describe("mcp-consumer-group-1", None);

        assert_eq!(group.state, DEAD);
        assert!(group.members.is_empty());
    }

    #[test]
    fn internal_topics_are_hidden() {
        assert!(is_internal("__consumer_offsets"));
        assert!(!is_internal("naver-search-results"));
    }
}
