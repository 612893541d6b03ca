//! # 代理协作者特征
//!
//! 会话、核对器与发布通过这些特征访问代理，具体实现见 `brook-kafka`。

use crate::{errors::BrookError, record::RawRecord};
use serde::Serialize;
use std::{collections::BTreeMap, future::Future};

/// 消费组已提交偏移量：主题 → 分区 → 偏移量（未提交为 -1）
pub type CommittedOffsets = BTreeMap<String, BTreeMap<i32, i64>>;

/// 主题各分区高水位：分区 → 高水位
pub type Watermarks = BTreeMap<i32, i64>;

/// 一次订阅
pub trait Subscription: Send {
    /// 等待下一条记录，订阅不再有记录时返回 `None`
    fn next_record(&mut self) -> impl Future<Output = Option<Result<RawRecord, BrookError>>> + Send;
    /// 断开订阅，可重复调用
    fn close(&mut self);
}

/// 代理订阅特征
pub trait Broker: Send + Sync {
    /// 订阅类型
    type Subscription: Subscription;

    /// 以指定消费组订阅主题
    fn subscribe(
        &self,
        group_id: &str,
        topics: &[String],
        from_beginning: bool,
    ) -> impl Future<Output = Result<Self::Subscription, BrookError>> + Send;
}

/// 消费组成员
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    /// 成员 Id
    pub member_id: String,
    /// 客户端 Id
    pub client_id: String,
    /// 客户端主机
    pub client_host: String,
}

/// 消费组描述
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDescription {
    /// 消费组 Id
    pub group_id: String,
    /// 状态
    pub state: String,
    /// 分配协议
    pub protocol: String,
    /// 协议类型
    pub protocol_type: String,
    /// 成员
    pub members: Vec<GroupMember>,
}

/// 偏移量管理特征
pub trait OffsetAdmin: Send + Sync {
    /// 获取消费组已提交偏移量
    fn fetch_committed_offsets(
        &self,
        group_id: &str,
    ) -> impl Future<Output = Result<CommittedOffsets, BrookError>> + Send;
    /// 获取主题当前高水位
    fn fetch_high_watermarks(
        &self,
        topic: &str,
    ) -> impl Future<Output = Result<Watermarks, BrookError>> + Send;
    /// 描述消费组
    fn describe_group(
        &self,
        group_id: &str,
    ) -> impl Future<Output = Result<GroupDescription, BrookError>> + Send;
}

/// 主题概要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicSummary {
    /// 主题名
    pub name: String,
    /// 分区数
    pub partitions: usize,
}

/// 消费组概要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    /// 消费组 Id
    pub group_id: String,
    /// 状态
    pub state: String,
    /// 协议类型
    pub protocol_type: String,
}

/// 新建主题参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTopicSpec {
    /// 主题名
    pub name: String,
    /// 分区数
    pub partitions: i32,
    /// 复制因子
    pub replication: i32,
    /// 主题级配置
    pub configs: Vec<(String, String)>,
}

/// 主题管理特征
pub trait TopicAdmin: Send + Sync {
    /// 列出主题
    fn list_topics(&self) -> impl Future<Output = Result<Vec<TopicSummary>, BrookError>> + Send;
    /// 创建主题，主题已存在时返回 `false`
    fn create_topic(
        &self,
        spec: &NewTopicSpec,
    ) -> impl Future<Output = Result<bool, BrookError>> + Send;
    /// 列出消费组
    fn list_groups(&self) -> impl Future<Output = Result<Vec<GroupSummary>, BrookError>> + Send;
}

/// 待发布记录
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutgoingRecord {
    /// 键
    pub key: Option<String>,
    /// 值
    pub value: String,
    /// 消息头
    pub headers: Vec<(String, String)>,
}

impl OutgoingRecord {
    /// 以值构造记录
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    /// 设置键
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// 追加消息头
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// 发布结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Delivery {
    /// 写入分区
    pub partition: i32,
    /// 写入偏移量
    pub offset: i64,
}

/// 发布特征
pub trait Publisher: Send + Sync {
    /// 发布记录，结果顺序与输入一致
    fn publish(
        &self,
        topic: &str,
        records: &[OutgoingRecord],
    ) -> impl Future<Output = Result<Vec<Delivery>, BrookError>> + Send;
}
