//! # 流式聚合
//!
//! 对解码后的记录做左折叠：按分组键计数，并维护按分值降序、按条目去重的有界排行。

use crate::{
    broker::Broker,
    errors::BrookError,
    gate::Trigger,
    ids::GroupIds,
    record::ConsumedRecord,
    session::{ConsumptionRequest, RecordSink, collect},
};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{info, instrument};

/// 取值来源
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeySource {
    /// 值中的点分路径字段
    Field(String),
    /// 消息头
    Header(String),
    /// 记录所属主题
    Topic,
}

impl KeySource {
    /// 值字段
    pub fn field(path: impl Into<String>) -> Self {
        KeySource::Field(path.into())
    }

    /// 消息头
    pub fn header(name: impl Into<String>) -> Self {
        KeySource::Header(name.into())
    }

    fn value<'r>(&self, record: &'r ConsumedRecord) -> Option<Extracted<'r>> {
        match self {
            KeySource::Field(path) => record.field(path).map(Extracted::Json),
            KeySource::Header(name) => record.header(name).map(Extracted::Text),
            KeySource::Topic => Some(Extracted::Text(&record.topic)),
        }
    }

    /// 提取文本，空串视为缺失
    fn text(&self, record: &ConsumedRecord) -> Option<String> {
        let text = match self.value(record)? {
            Extracted::Text(s) => s.to_owned(),
            Extracted::Json(Value::String(s)) => s.clone(),
            Extracted::Json(Value::Number(n)) => n.to_string(),
            Extracted::Json(Value::Bool(b)) => b.to_string(),
            Extracted::Json(_) => return None,
        };
        (!text.is_empty()).then_some(text)
    }

    /// 提取分值，缺失时为 `None`，格式错误时为 0
    fn score(&self, record: &ConsumedRecord) -> Option<f64> {
        let score = match self.value(record)? {
            Extracted::Text(s) => s.trim().parse().unwrap_or(0.0),
            Extracted::Json(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
            Extracted::Json(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
            Extracted::Json(_) => 0.0,
        };
        Some(if score.is_finite() { score } else { 0.0 })
    }
}

enum Extracted<'r> {
    Text(&'r str),
    Json(&'r Value),
}

/// 聚合配置
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReducerConfig {
    /// 分组键来源
    pub group_by: KeySource,
    /// 条目标识来源
    pub item_id: Option<KeySource>,
    /// 分值来源
    pub score: Option<KeySource>,
    /// 条目展示名来源
    pub label: Option<KeySource>,
    /// 排行上限
    pub top_k: usize,
    /// 缺失分组键时使用的哨兵值
    pub sentinel: String,
    /// 只折叠这些主题的记录，为空时不限
    pub topics: Vec<String>,
}

impl ReducerConfig {
    /// 按指定来源分组
    pub fn group_by(source: KeySource) -> Self {
        Self {
            group_by: source,
            item_id: None,
            score: None,
            label: None,
            top_k: 10,
            sentinel: "unknown".to_owned(),
            topics: Vec::new(),
        }
    }

    /// 启用排行
    pub fn rank_by(mut self, item_id: KeySource, score: KeySource, top_k: usize) -> Self {
        self.item_id = Some(item_id);
        self.score = Some(score);
        self.top_k = top_k;
        self
    }

    /// 设置条目展示名来源
    pub fn label(mut self, label: KeySource) -> Self {
        self.label = Some(label);
        self
    }

    /// 设置哨兵值
    pub fn sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// 限定主题，其他主题的记录既不分组也不计入总数
    pub fn topics<I, S>(mut self, topics: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.topics = topics.into_iter().map(Into::into).collect();
        self
    }

    fn covers(&self, topic: &str) -> bool {
        self.topics.is_empty() || self.topics.iter().any(|t| t == topic)
    }
}

/// 排行条目
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedItem {
    /// 条目标识
    pub id: String,
    /// 分值
    pub score: f64,
    /// 展示名
    pub label: Option<String>,
}

/// 有界排行：分值降序，同分先到者在前，条目不重复
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopItems {
    bound: usize,
    items: Vec<RankedItem>,
}

impl TopItems {
    /// 构造指定上限的排行
    pub fn new(bound: usize) -> Self {
        Self {
            bound,
            items: Vec::with_capacity(bound.min(64)),
        }
    }

    /// 提交条目
    ///
    /// 已在榜的条目仅在新分值更高时被替换。
    pub fn offer(&mut self, id: String, score: f64, label: Option<String>) {
        if self.bound == 0 {
            return;
        }
        if let Some(pos) = self.items.iter().position(|item| item.id == id) {
            if self.items[pos].score >= score {
                return;
            }
            self.items.remove(pos);
        }
        let at = self.items.partition_point(|item| item.score >= score);
        if at >= self.bound {
            return;
        }
        self.items.insert(at, RankedItem { id, score, label });
        self.items.truncate(self.bound);
    }

    /// 条目列表
    pub fn items(&self) -> &[RankedItem] {
        &self.items
    }

    /// 条目数
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// 正分值统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ScoreStats {
    /// 最小值
    pub min: f64,
    /// 最大值
    pub max: f64,
    /// 总和
    pub sum: f64,
    /// 样本数
    pub samples: usize,
}

impl ScoreStats {
    fn record(&mut self, score: f64) {
        if score <= 0.0 {
            return;
        }
        if self.samples == 0 {
            self.min = score;
            self.max = score;
        } else {
            self.min = self.min.min(score);
            self.max = self.max.max(score);
        }
        self.sum += score;
        self.samples += 1;
    }

    /// 平均值
    pub fn mean(&self) -> Option<f64> {
        (self.samples > 0).then(|| self.sum / self.samples as f64)
    }
}

/// 聚合桶
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregationBucket {
    /// 分组键
    pub group_key: String,
    /// 记录数
    pub count: usize,
    /// 排行
    pub top_items: TopItems,
    /// 正分值统计
    pub score_stats: ScoreStats,
}

/// 聚合器
#[derive(Debug, Clone)]
pub struct Reducer {
    config: ReducerConfig,
    total: usize,
    buckets: HashMap<String, AggregationBucket>,
}

impl Reducer {
    /// 构造聚合器
    pub fn new(config: ReducerConfig) -> Self {
        Self {
            config,
            total: 0,
            buckets: HashMap::new(),
        }
    }

    /// 折叠一条记录
    pub fn fold(&mut self, record: &ConsumedRecord) {
        if !self.config.covers(&record.topic) {
            return;
        }
        self.total += 1;
        let ReducerConfig {
            group_by,
            item_id,
            score,
            label,
            top_k,
            sentinel,
            ..
        } = &self.config;
        let group_key = group_by
            .text(record)
            .unwrap_or_else(|| sentinel.clone());
        let bucket = self
            .buckets
            .entry(group_key)
            .or_insert_with_key(|key| AggregationBucket {
                group_key: key.clone(),
                count: 0,
                top_items: TopItems::new(*top_k),
                score_stats: ScoreStats::default(),
            });
        bucket.count += 1;

        let Some(score_source) = score else {
            return;
        };
        let value = score_source.score(record);
        if let Some(v) = value {
            bucket.score_stats.record(v);
        }
        if let Some(id) = item_id.as_ref().and_then(|source| source.text(record)) {
            let label = label.as_ref().and_then(|source| source.text(record));
            bucket.top_items.offer(id, value.unwrap_or(0.0), label);
        }
    }

    /// 结束折叠
    pub fn finish(self) -> Summary {
        Summary {
            total: self.total,
            buckets: self.buckets.into_iter().collect(),
        }
    }
}

impl RecordSink for Reducer {
    fn accept(&mut self, record: ConsumedRecord) {
        self.fold(&record);
    }
}

impl RecordSink for Vec<Reducer> {
    fn accept(&mut self, record: ConsumedRecord) {
        for reducer in self.iter_mut() {
            reducer.fold(&record);
        }
    }
}

/// 聚合结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// 折叠的记录总数
    pub total: usize,
    /// 分组键 → 聚合桶
    pub buckets: BTreeMap<String, AggregationBucket>,
}

impl Summary {
    /// 按记录数降序排列的聚合桶，同数按键排序
    pub fn ranked(&self) -> Vec<&AggregationBucket> {
        let mut buckets: Vec<&AggregationBucket> = self.buckets.values().collect();
        buckets.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.group_key.cmp(&b.group_key)));
        buckets
    }

    /// 记录数最多的前 `n` 个聚合桶
    pub fn top(&self, n: usize) -> Vec<&AggregationBucket> {
        let mut ranked = self.ranked();
        ranked.truncate(n);
        ranked
    }

    /// 读取聚合桶
    pub fn bucket(&self, group_key: &str) -> Option<&AggregationBucket> {
        self.buckets.get(group_key)
    }
}

/// 聚合记录流
pub fn aggregate<I>(records: I, config: ReducerConfig) -> Summary
where
    I: IntoIterator<Item = ConsumedRecord>,
{
    let mut reducer = Reducer::new(config);
    for record in records {
        reducer.fold(&record);
    }
    reducer.finish()
}

/// 汇总消费结果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResult {
    /// 实际使用的临时消费组 Id
    pub group_id: String,
    /// 折叠的记录总数
    pub total: usize,
    /// 与聚合配置一一对应的结果
    pub summaries: Vec<Summary>,
    /// 结束会话的触发源
    pub trigger: Trigger,
}

/// 以一次有界消费会话驱动多个聚合器
#[instrument(name = "summarize", skip_all, fields(topics = ?request.topics, reducers = configs.len()))]
pub async fn summarize<B, G>(
    broker: &B,
    ids: &G,
    request: ConsumptionRequest,
    configs: Vec<ReducerConfig>,
) -> Result<SummaryResult, BrookError>
where
    B: Broker,
    G: GroupIds + ?Sized,
{
    let mut reducers: Vec<Reducer> = configs.into_iter().map(Reducer::new).collect();
    let (group_id, total, trigger) = collect(broker, ids, &request, &mut reducers).await?;
    info!(%group_id, total, ?trigger, "汇总完成");
    Ok(SummaryResult {
        group_id,
        total,
        summaries: reducers.into_iter().map(Reducer::finish).collect(),
        trigger,
    })
}
