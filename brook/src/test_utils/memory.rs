//! ## 内存代理
//!
//! 按订阅时刻回放预设时间线的代理实现，配合 `tokio::time::pause` 可得到确定的时序。

use crate::{
    broker::{
        Broker, CommittedOffsets, Delivery, GroupDescription, GroupSummary, NewTopicSpec,
        OffsetAdmin, OutgoingRecord, Publisher, Subscription, TopicAdmin, TopicSummary,
        Watermarks,
    },
    errors::BrookError,
    record::RawRecord,
};
use std::{
    collections::{BTreeMap, HashSet, VecDeque},
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::time::{Duration, Instant, sleep_until};
use tracing::debug;

#[derive(Default)]
struct State {
    backlog: Vec<RawRecord>,
    live: Vec<(Duration, RawRecord)>,
    receive_error_after: Option<usize>,
    fail_subscribe: bool,
    fail_describe: bool,
    failing_watermarks: HashSet<String>,
    committed: BTreeMap<String, CommittedOffsets>,
    watermarks: BTreeMap<String, Watermarks>,
    groups: BTreeMap<String, GroupDescription>,
    topics: BTreeMap<String, usize>,
    subscriptions: Vec<(String, Vec<String>, bool)>,
    open: usize,
}

/// 内存代理，克隆后共享同一状态
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    /// 构造空代理
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// 写入已有记录，仅从头读取的订阅可见
    pub fn publish_existing(&self, raw: RawRecord) -> &Self {
        self.state().backlog.push(raw);
        self
    }

    /// 安排订阅建立 `at` 之后到达的记录
    pub fn schedule(&self, at: Duration, raw: RawRecord) -> &Self {
        self.state().live.push((at, raw));
        self
    }

    /// 交付 `n` 条记录后接收报错
    pub fn fail_receive_after(&self, n: usize) -> &Self {
        self.state().receive_error_after = Some(n);
        self
    }

    /// 订阅失败
    pub fn fail_subscribe(&self) -> &Self {
        self.state().fail_subscribe = true;
        self
    }

    /// 描述消费组失败
    pub fn fail_describe(&self) -> &Self {
        self.state().fail_describe = true;
        self
    }

    /// 指定主题的高水位获取失败
    pub fn fail_watermarks(&self, topic: &str) -> &Self {
        self.state().failing_watermarks.insert(topic.to_owned());
        self
    }

    /// 设置已提交偏移量
    pub fn commit(&self, group_id: &str, topic: &str, partition: i32, offset: i64) -> &Self {
        self.state()
            .committed
            .entry(group_id.to_owned())
            .or_default()
            .entry(topic.to_owned())
            .or_default()
            .insert(partition, offset);
        self
    }

    /// 设置分区高水位
    pub fn set_high_watermark(&self, topic: &str, partition: i32, high: i64) -> &Self {
        self.state()
            .watermarks
            .entry(topic.to_owned())
            .or_default()
            .insert(partition, high);
        self
    }

    /// 注册消费组描述
    pub fn register_group(&self, group: GroupDescription) -> &Self {
        self.state().groups.insert(group.group_id.clone(), group);
        self
    }

    /// 注册主题
    pub fn register_topic(&self, name: &str, partitions: usize) -> &Self {
        self.state().topics.insert(name.to_owned(), partitions);
        self
    }

    /// 历次订阅：消费组 Id、主题、是否从头读取
    pub fn subscriptions(&self) -> Vec<(String, Vec<String>, bool)> {
        self.state().subscriptions.clone()
    }

    /// 尚未断开的订阅数
    pub fn open_subscriptions(&self) -> usize {
        self.state().open
    }
}

impl Broker for MemoryBroker {
    type Subscription = MemorySubscription;

    async fn subscribe(
        &self,
        group_id: &str,
        topics: &[String],
        from_beginning: bool,
    ) -> Result<MemorySubscription, BrookError> {
        let mut state = self.state();
        if state.fail_subscribe {
            return Err(BrookError::Connection("内存代理拒绝订阅".to_owned()));
        }
        let mut queue: VecDeque<(Duration, RawRecord)> = VecDeque::new();
        if from_beginning {
            queue.extend(
                state
                    .backlog
                    .iter()
                    .filter(|raw| topics.contains(&raw.topic))
                    .map(|raw| (Duration::ZERO, raw.clone())),
            );
        }
        let mut live: Vec<(Duration, RawRecord)> = state
            .live
            .iter()
            .filter(|(_, raw)| topics.contains(&raw.topic))
            .cloned()
            .collect();
        live.sort_by_key(|(at, _)| *at);
        queue.extend(live);

        state
            .subscriptions
            .push((group_id.to_owned(), topics.to_vec(), from_beginning));
        state.open += 1;
        debug!(group_id, queued = queue.len(), "内存代理建立订阅");

        Ok(MemorySubscription {
            state: Arc::clone(&self.state),
            start: Instant::now(),
            queue,
            delivered: 0,
            fail_after: state.receive_error_after,
            closed: false,
        })
    }
}

/// 内存订阅
pub struct MemorySubscription {
    state: Arc<Mutex<State>>,
    start: Instant,
    queue: VecDeque<(Duration, RawRecord)>,
    delivered: usize,
    fail_after: Option<usize>,
    closed: bool,
}

impl Subscription for MemorySubscription {
    async fn next_record(&mut self) -> Option<Result<RawRecord, BrookError>> {
        if self.closed {
            return None;
        }
        if self.fail_after.is_some_and(|n| self.delivered >= n) {
            return Some(Err(BrookError::Receive("内存代理模拟接收失败".to_owned())));
        }
        let at = self.queue.front()?.0;
        sleep_until(self.start + at).await;
        let (_, raw) = self.queue.pop_front()?;
        self.delivered += 1;
        Some(Ok(raw))
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        state.open = state.open.saturating_sub(1);
    }
}

impl Drop for MemorySubscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl OffsetAdmin for MemoryBroker {
    async fn fetch_committed_offsets(&self, group_id: &str) -> Result<CommittedOffsets, BrookError> {
        Ok(self.state().committed.get(group_id).cloned().unwrap_or_default())
    }

    async fn fetch_high_watermarks(&self, topic: &str) -> Result<Watermarks, BrookError> {
        let state = self.state();
        if state.failing_watermarks.contains(topic) {
            return Err(BrookError::Watermark {
                topic: topic.to_owned(),
                message: "内存代理模拟高水位获取失败".to_owned(),
            });
        }
        state
            .watermarks
            .get(topic)
            .cloned()
            .ok_or_else(|| BrookError::Watermark {
                topic: topic.to_owned(),
                message: "主题不存在".to_owned(),
            })
    }

    async fn describe_group(&self, group_id: &str) -> Result<GroupDescription, BrookError> {
        let state = self.state();
        if state.fail_describe {
            return Err(BrookError::Admin("内存代理模拟描述消费组失败".to_owned()));
        }
        Ok(state
            .groups
            .get(group_id)
            .cloned()
            .unwrap_or_else(|| GroupDescription {
                group_id: group_id.to_owned(),
                state: "Dead".to_owned(),
                protocol: String::new(),
                protocol_type: String::new(),
                members: Vec::new(),
            }))
    }
}

impl TopicAdmin for MemoryBroker {
    async fn list_topics(&self) -> Result<Vec<TopicSummary>, BrookError> {
        Ok(self
            .state()
            .topics
            .iter()
            .map(|(name, &partitions)| TopicSummary {
                name: name.clone(),
                partitions,
            })
            .collect())
    }

    async fn create_topic(&self, spec: &NewTopicSpec) -> Result<bool, BrookError> {
        if spec.partitions <= 0 {
            return Err(BrookError::Admin(format!("主题{}分区数无效", spec.name)));
        }
        let mut state = self.state();
        if state.topics.contains_key(&spec.name) {
            return Ok(false);
        }
        state.topics.insert(spec.name.clone(), spec.partitions as usize);
        Ok(true)
    }

    async fn list_groups(&self) -> Result<Vec<GroupSummary>, BrookError> {
        Ok(self
            .state()
            .groups
            .values()
            .map(|g| GroupSummary {
                group_id: g.group_id.clone(),
                state: g.state.clone(),
                protocol_type: g.protocol_type.clone(),
            })
            .collect())
    }
}

impl Publisher for MemoryBroker {
    async fn publish(
        &self,
        topic: &str,
        records: &[OutgoingRecord],
    ) -> Result<Vec<Delivery>, BrookError> {
        let mut state = self.state();
        if !state.topics.contains_key(topic) {
            return Err(BrookError::Publish(format!("主题{topic}不存在")));
        }
        let mut deliveries = Vec::with_capacity(records.len());
        for record in records {
            let high = state
                .watermarks
                .entry(topic.to_owned())
                .or_default()
                .entry(0)
                .or_insert(0);
            let offset = *high;
            *high += 1;
            state.backlog.push(RawRecord {
                topic: topic.to_owned(),
                partition: 0,
                offset,
                key: record.key.as_ref().map(|k| k.as_bytes().to_vec()),
                value: Some(record.value.as_bytes().to_vec()),
                headers: record
                    .headers
                    .iter()
                    .map(|(k, v)| (k.clone(), Some(v.as_bytes().to_vec())))
                    .collect(),
                timestamp: None,
            });
            deliveries.push(Delivery {
                partition: 0,
                offset,
            });
        }
        Ok(deliveries)
    }
}
