//! # 有界消费会话
//!
//! 每次调用独占一个临时消费组订阅，收集到指定条数或到达超时即结束，
//! 无论以何种方式结束都会断开订阅。

use crate::{
    broker::{Broker, Subscription},
    config::ConsumeConfig,
    errors::BrookError,
    filter::HeaderFilter,
    gate::{CompletionGate, Trigger},
    ids::GroupIds,
    record::{ConsumedRecord, decode},
};
use serde::Serialize;
use tokio::time::{Duration, sleep_until};
use tracing::{Span, debug, error, info, instrument, trace};

/// 记录去向
pub trait RecordSink {
    /// 接收一条通过过滤的记录
    fn accept(&mut self, record: ConsumedRecord);
}

impl RecordSink for Vec<ConsumedRecord> {
    fn accept(&mut self, record: ConsumedRecord) {
        self.push(record);
    }
}

/// 消费请求
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumptionRequest {
    /// 订阅主题
    pub topics: Vec<String>,
    /// 临时消费组前缀
    pub group_prefix: String,
    /// 最多收集的记录数
    pub max_messages: usize,
    /// 是否从头读取
    pub from_beginning: bool,
    /// 超时
    pub timeout: Duration,
    /// 可选消息头过滤器
    pub filter: Option<HeaderFilter>,
}

impl ConsumptionRequest {
    /// 以默认配置构造请求，重复主题只保留首次出现
    pub fn new<I, T>(topics: I, cfg: &ConsumeConfig) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for topic in topics {
            let topic = topic.into();
            if !unique.contains(&topic) {
                unique.push(topic);
            }
        }
        Self {
            topics: unique,
            group_prefix: cfg.group_prefix.clone(),
            max_messages: cfg.max_messages,
            from_beginning: cfg.from_beginning,
            timeout: Duration::from_millis(cfg.timeout_ms),
            filter: None,
        }
    }

    /// 设置最多收集的记录数
    pub fn max_messages(mut self, max_messages: usize) -> Self {
        self.max_messages = max_messages;
        self
    }

    /// 设置超时
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 设置是否从头读取
    pub fn from_beginning(mut self, from_beginning: bool) -> Self {
        self.from_beginning = from_beginning;
        self
    }

    /// 设置消费组前缀
    pub fn group_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.group_prefix = prefix.into();
        self
    }

    /// 设置过滤器，空过滤器等同于不过滤
    pub fn filter(mut self, filter: HeaderFilter) -> Self {
        self.filter = (!filter.is_empty()).then_some(filter);
        self
    }

    /// 验证请求
    pub fn validate(&self) -> Result<(), BrookError> {
        if self.topics.is_empty() || self.topics.iter().any(String::is_empty) {
            return Err("订阅主题不能为空".into());
        }
        if self.max_messages == 0 {
            return Err("最大消息数至少为1".into());
        }
        if self.timeout.is_zero() {
            return Err("超时必须大于0".into());
        }
        Ok(())
    }
}

/// 消费结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionResult {
    /// 实际使用的临时消费组 Id
    pub group_id: String,
    /// 记录数
    pub count: usize,
    /// 按到达顺序排列的记录
    pub records: Vec<ConsumedRecord>,
    /// 结束会话的触发源
    pub trigger: Trigger,
}

/// 消费会话
pub struct ConsumerSession<S: Subscription> {
    group_id: String,
    subscription: Option<S>,
}

impl<S: Subscription> ConsumerSession<S> {
    /// 建立订阅
    #[instrument(name = "open_session", skip(broker, topics), fields(?topics))]
    pub async fn open<B>(
        broker: &B,
        group_id: String,
        topics: &[String],
        from_beginning: bool,
    ) -> Result<Self, BrookError>
    where
        B: Broker<Subscription = S>,
    {
        let subscription = broker.subscribe(&group_id, topics, from_beginning).await?;
        info!("开启消费会话");
        Ok(Self {
            group_id,
            subscription: Some(subscription),
        })
    }

    /// 临时消费组 Id
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.subscription.is_none()
    }

    /// 接收记录直至闸门触发，返回送入 `sink` 的记录数
    ///
    /// 记录依次经过解码、过滤后送入 `sink`，过滤掉的记录不计数。
    /// 订阅没有更多记录时继续等待截止时间。闸门触发后不再接收新记录。
    #[instrument(name = "run_session", skip_all, fields(group_id = %self.group_id, accepted))]
    pub async fn run<K>(
        &mut self,
        gate: &mut CompletionGate,
        filter: Option<&HeaderFilter>,
        sink: &mut K,
    ) -> Result<usize, BrookError>
    where
        K: RecordSink + ?Sized,
    {
        let subscription = self
            .subscription
            .as_mut()
            .ok_or_else(|| BrookError::InvalidRequest("消费会话已关闭".to_owned()))?;
        let deadline = sleep_until(gate.deadline());
        tokio::pin!(deadline);
        let mut accepted = 0;
        let mut drained = false;

        while !gate.is_resolved() {
            tokio::select! {
                biased;
                _ = &mut deadline => {
                    gate.fire(Trigger::Deadline);
                }
                next = subscription.next_record(), if !drained => match next {
                    Some(Ok(raw)) => {
                        let record = decode(raw);
                        if filter.is_some_and(|f| !f.matches(&record.headers)) {
                            trace!(partition = record.partition, offset = %record.offset, "记录未通过过滤");
                            continue;
                        }
                        debug!(partition = record.partition, offset = %record.offset, "接收记录");
                        sink.accept(record);
                        accepted += 1;
                        gate.observe(accepted);
                    }
                    Some(Err(e)) => return Err(e),
                    None => {
                        debug!("订阅暂无更多记录，等待截止时间");
                        drained = true;
                    }
                }
            }
        }

        Span::current().record("accepted", accepted);
        Ok(accepted)
    }

    /// 断开订阅，可重复调用
    pub fn close(&mut self) {
        if let Some(mut subscription) = self.subscription.take() {
            subscription.close();
            info!(group_id = %self.group_id, "关闭消费会话");
        }
    }
}

impl<S: Subscription> Drop for ConsumerSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}

/// 运行一次完整的有界消费：开启会话、收集、关闭
pub(crate) async fn collect<B, G, K>(
    broker: &B,
    ids: &G,
    request: &ConsumptionRequest,
    sink: &mut K,
) -> Result<(String, usize, Trigger), BrookError>
where
    B: Broker,
    G: GroupIds + ?Sized,
    K: RecordSink + ?Sized,
{
    request.validate()?;
    let group_id = ids.next_id(&request.group_prefix);
    let mut session =
        ConsumerSession::open(broker, group_id, &request.topics, request.from_beginning).await?;
    let mut gate = CompletionGate::arm(request.max_messages, request.timeout);
    let outcome = session.run(&mut gate, request.filter.as_ref(), sink).await;
    session.close();
    let accepted = outcome
        .inspect_err(|e| error!(group_id = %session.group_id(), "消费会话中止：{e}"))?;
    let trigger = gate.trigger().unwrap_or(Trigger::Deadline);
    Ok((session.group_id().to_owned(), accepted, trigger))
}

/// 有界消费，返回按到达顺序收集的记录
#[instrument(name = "consume", skip_all, fields(topics = ?request.topics, max = request.max_messages))]
pub async fn consume<B, G>(
    broker: &B,
    ids: &G,
    request: ConsumptionRequest,
) -> Result<ConsumptionResult, BrookError>
where
    B: Broker,
    G: GroupIds + ?Sized,
{
    let mut records = Vec::with_capacity(request.max_messages.min(1024));
    let (group_id, count, trigger) = collect(broker, ids, &request, &mut records).await?;
    info!(%group_id, count, ?trigger, "消费完成");
    Ok(ConsumptionResult {
        group_id,
        count,
        records,
        trigger,
    })
}
