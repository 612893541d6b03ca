//! Kafka 订阅

use crate::client::KafkaClients;
use brook::{
    broker::{Broker, Subscription},
    errors::BrookError,
    record::RawRecord,
};
use rdkafka::{
    Message,
    consumer::{Consumer, StreamConsumer},
    message::Headers,
};
use tracing::{debug, instrument};

/// 将 Kafka 消息转换为原始记录
pub(crate) fn raw_record<M: Message>(msg: &M) -> RawRecord {
    let headers = msg
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|h| (h.key.to_owned(), h.value.map(<[u8]>::to_vec)))
                .collect()
        })
        .unwrap_or_default();
    RawRecord {
        topic: msg.topic().to_owned(),
        partition: msg.partition(),
        offset: msg.offset(),
        key: msg.key().map(<[u8]>::to_vec),
        value: msg.payload().map(<[u8]>::to_vec),
        headers,
        timestamp: msg.timestamp().to_millis(),
    }
}

impl Broker for KafkaClients {
    type Subscription = KafkaSubscription;

    #[instrument(name = "subscribe", skip(self))]
    async fn subscribe(
        &self,
        group_id: &str,
        topics: &[String],
        from_beginning: bool,
    ) -> Result<KafkaSubscription, BrookError> {
        self.check_reachable().await?;
        let reset = if from_beginning { "earliest" } else { "latest" };
        let consumer: StreamConsumer = self
            .client_config()
            .set("group.id", group_id)
            .set("auto.offset.reset", reset)
            .set("enable.auto.commit", "false")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| BrookError::Connection(format!("创建消费者失败：{e}")))?;
        let names: Vec<&str> = topics.iter().map(String::as_str).collect();
        consumer
            .subscribe(&names)
            .map_err(|e| BrookError::Connection(format!("订阅主题失败：{e}")))?;
        debug!("建立 Kafka 订阅");
        Ok(KafkaSubscription {
            consumer: Some(consumer),
        })
    }
}

/// Kafka 订阅
pub struct KafkaSubscription {
    consumer: Option<StreamConsumer>,
}

impl Subscription for KafkaSubscription {
    async fn next_record(&mut self) -> Option<Result<RawRecord, BrookError>> {
        let consumer = self.consumer.as_ref()?;
        Some(
            consumer
                .recv()
                .await
                .map(|msg| raw_record(&msg))
                .map_err(|e| BrookError::Receive(e.to_string())),
        )
    }

    fn close(&mut self) {
        if let Some(consumer) = self.consumer.take() {
            consumer.unsubscribe();
            debug!("断开 Kafka 订阅");
        }
    }
}

impl Drop for KafkaSubscription {
    fn drop(&mut self) {
        self.close();
    }
}
