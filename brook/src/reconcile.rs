//! # 偏移量与延迟核对
//!
//! 将消费组已提交偏移量与各主题实时高水位按分区合并。
//! 单个主题高水位获取失败只影响该主题的延迟，其余主题照常计算。

use crate::{
    broker::{GroupDescription, GroupMember, OffsetAdmin, Watermarks},
    errors::BrookError,
};
use futures::future::join_all;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

/// 分区偏移量信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionOffsetInfo {
    /// 主题
    pub topic: String,
    /// 分区
    pub partition: i32,
    /// 已提交偏移量，未提交为 -1
    pub committed_offset: i64,
    /// 高水位，获取失败时缺失
    pub high_watermark: Option<i64>,
    /// 延迟，无法确定时缺失
    pub lag: Option<i64>,
}

/// 消费组延迟报告
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupLag {
    /// 消费组 Id
    pub group_id: String,
    /// 状态
    pub state: String,
    /// 分配协议
    pub protocol: String,
    /// 成员
    pub members: Vec<GroupMember>,
    /// 各分区偏移量
    pub partitions: Vec<PartitionOffsetInfo>,
}

impl GroupLag {
    /// 已知延迟之和
    pub fn total_lag(&self) -> i64 {
        self.partitions.iter().filter_map(|p| p.lag).sum()
    }

    /// 存在高水位缺失分区的主题
    pub fn degraded_topics(&self) -> Vec<&str> {
        let mut topics: Vec<&str> = self
            .partitions
            .iter()
            .filter(|p| p.high_watermark.is_none())
            .map(|p| p.topic.as_str())
            .collect();
        topics.dedup();
        topics
    }
}

/// 计算延迟，仅在已提交偏移量非负且高水位为正时有值，且不为负
pub fn compute_lag(committed: i64, high_watermark: Option<i64>) -> Option<i64> {
    let high = high_watermark?;
    if committed < 0 || high <= 0 {
        return None;
    }
    let lag = high - committed;
    (lag >= 0).then_some(lag)
}

fn join_partitions(
    topic: &str,
    committed: &BTreeMap<i32, i64>,
    watermarks: Option<&Watermarks>,
) -> Vec<PartitionOffsetInfo> {
    committed
        .iter()
        .map(|(&partition, &committed_offset)| {
            let high_watermark = watermarks.and_then(|w| w.get(&partition).copied());
            PartitionOffsetInfo {
                topic: topic.to_owned(),
                partition,
                committed_offset,
                high_watermark,
                lag: compute_lag(committed_offset, high_watermark),
            }
        })
        .collect()
}

/// 核对消费组延迟
///
/// 消费组描述或已提交偏移量获取失败时整体失败；
/// 主题高水位按主题分别并发获取，失败的主题延迟记为未知。
#[instrument(name = "reconcile_lag", skip(admin))]
pub async fn reconcile_lag<A>(admin: &A, group_id: &str) -> Result<GroupLag, BrookError>
where
    A: OffsetAdmin + ?Sized,
{
    let (group, committed) = tokio::try_join!(
        admin.describe_group(group_id),
        admin.fetch_committed_offsets(group_id)
    )
    .inspect_err(|e| error!("消费组{group_id}核对失败：{e}"))?;
    debug!("消费组{group_id}已提交偏移量涉及{}个主题", committed.len());

    let topics = committed.iter().map(|(topic, partitions)| async move {
        let watermarks = match admin.fetch_high_watermarks(topic).await {
            Ok(w) => Some(w),
            Err(e) => {
                warn!("主题{topic}高水位获取失败，延迟记为未知：{e}");
                None
            }
        };
        join_partitions(topic, partitions, watermarks.as_ref())
    });
    let partitions: Vec<PartitionOffsetInfo> = join_all(topics).await.into_iter().flatten().collect();

    let GroupDescription {
        state,
        protocol,
        members,
        ..
    } = group;
    let report = GroupLag {
        group_id: group_id.to_owned(),
        state,
        protocol,
        members,
        partitions,
    };
    info!(
        total_lag = report.total_lag(),
        degraded = report.degraded_topics().len(),
        "完成消费组延迟核对"
    );
    Ok(report)
}
