#![allow(dead_code)]

use brook_kafka::{KafkaClients, KafkaConfig};
use config::{Config, File, FileFormat};
use std::sync::LazyLock;
use tokio::sync::OnceCell;
use tracing::{Level, info};
use tracing_subscriber::fmt;

pub(crate) static EXTERNAL_SETUP: LazyLock<()> = LazyLock::new(|| {
    let _ = fmt()
        .with_test_writer()
        .with_max_level(Level::DEBUG)
        .try_init();
    info!("启用 {} 测试日志输出", Level::DEBUG);
});

pub(crate) fn init() {
    LazyLock::force(&EXTERNAL_SETUP);
}

pub(crate) fn from_toml(content: &str) -> Config {
    Config::builder()
        .add_source(File::from_str(content, FileFormat::Toml))
        .build()
        .unwrap()
}

pub(crate) async fn clients() -> &'static KafkaClients {
    static CLIENTS: OnceCell<KafkaClients> = OnceCell::const_new();
    init();
    CLIENTS
        .get_or_init(|| async {
            let cfg = KafkaConfig::load().unwrap();
            KafkaClients::connect(cfg).await.unwrap()
        })
        .await
}
