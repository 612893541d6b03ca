//! Kafka 发布

use crate::client::KafkaClients;
use brook::{
    broker::{Delivery, OutgoingRecord, Publisher},
    errors::BrookError,
};
use futures::future::join_all;
use rdkafka::{
    message::{Header, OwnedHeaders},
    producer::{FutureRecord, future_producer},
};
use tracing::{debug, instrument};

fn headers(record: &OutgoingRecord) -> OwnedHeaders {
    record.headers.iter().fold(
        OwnedHeaders::new_with_capacity(record.headers.len()),
        |headers, (key, value)| {
            headers.insert(Header {
                key,
                value: Some(value.as_bytes()),
            })
        },
    )
}

impl Publisher for KafkaClients {
    #[instrument(name = "publish", skip(self, records), fields(count = records.len()))]
    async fn publish(
        &self,
        topic: &str,
        records: &[OutgoingRecord],
    ) -> Result<Vec<Delivery>, BrookError> {
        let timeout = self.config.timeout;
        let sends = records.iter().map(|record| {
            let mut message = FutureRecord::to(topic)
                .payload(record.value.as_bytes())
                .headers(headers(record));
            if let Some(key) = &record.key {
                message = message.key(key.as_bytes());
            }
            self.producer.send(message, timeout)
        });

        join_all(sends)
            .await
            .into_iter()
            .map(|result| {
                result
                    .map(
                        |future_producer::Delivery {
                             partition,
                             offset,
                             timestamp: _timestamp,
                         }| {
                            debug!("记录写入分区 {partition} 偏移 {offset}");
                            Delivery { partition, offset }
                        },
                    )
                    .map_err(|(e, _)| BrookError::Publish(e.to_string()))
            })
            .collect()
    }
}
