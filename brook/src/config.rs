//! # **brook** 配置

use crate::errors::ConfigError;
use config::{Config, Environment, File};
use serde::{Deserialize, de::DeserializeOwned};
use std::path::PathBuf;
use validator::Validate;

/// 构建分层配置
///
/// 依次叠加 `config/default`、`config/{BROOK_ENV}` 与 `BROOK` 前缀的环境变量。
/// 配置根目录可由 `BROOK_CONFIG_ROOT` 覆盖。
pub fn build_config(crate_dir: PathBuf) -> Result<Config, ConfigError> {
    let config_root = std::env::var("BROOK_CONFIG_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| crate_dir.join("config"));
    let env = std::env::var("BROOK_ENV").unwrap_or_else(|_| "dev".to_string());
    let config = Config::builder()
        .add_source(File::from(config_root.join("default")).required(false))
        .add_source(File::from(config_root.join(env)).required(false))
        .add_source(
            Environment::with_prefix("BROOK")
                .separator("__")
                .list_separator(","),
        )
        .build()?;
    Ok(config)
}

/// 加载并验证配置节，配置节不存在时取默认值
pub fn load_section<T>(config: &Config, section: &str) -> Result<T, ConfigError>
where
    T: DeserializeOwned + Validate + Default,
{
    let cfg = match config.get::<T>(section) {
        Ok(cfg) => cfg,
        Err(config::ConfigError::NotFound(_)) => T::default(),
        Err(e) => return Err(e.into()),
    };

    cfg.validate().map_err(|e| ConfigError::ValidationError {
        section: section.to_string(),
        key: validation_keys(&e),
        message: e.to_string(),
    })?;

    Ok(cfg)
}

fn validation_keys(errors: &validator::ValidationErrors) -> String {
    let fields = errors.field_errors();
    let mut keys: Vec<&str> = fields.keys().map(|k| k.as_ref()).collect();
    keys.sort_unstable();
    keys.join(",")
}

/// 消费会话默认配置
#[derive(Debug, Deserialize, Validate, Clone, PartialEq)]
#[serde(default)]
pub struct ConsumeConfig {
    /// 临时消费组前缀
    #[validate(length(min = 1))]
    pub group_prefix: String,
    /// 单次会话最多收集的记录数
    #[validate(range(min = 1))]
    pub max_messages: usize,
    /// 会话超时（毫秒）
    #[validate(range(min = 1))]
    pub timeout_ms: u64,
    /// 是否从头读取
    pub from_beginning: bool,
}

impl Default for ConsumeConfig {
    fn default() -> Self {
        Self {
            group_prefix: "brook-consumer-group".to_string(),
            max_messages: 10,
            timeout_ms: 10_000,
            from_beginning: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    fn from_toml(content: &str) -> Config {
        Config::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()
            .unwrap()
    }

    #[test]
    fn missing_section_falls_back_to_default() {
        let config = from_toml("bootstrap = \"localhost:9092\"");

        let cfg: ConsumeConfig = load_section(&config, "consume").unwrap();

        assert_eq!(cfg, ConsumeConfig::default());
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = from_toml("[consume]\nmax_messages = 3\nfrom_beginning = true");

        let cfg: ConsumeConfig = load_section(&config, "consume").unwrap();

        assert_eq!(cfg.max_messages, 3);
        assert!(cfg.from_beginning);
        assert_eq!(cfg.timeout_ms, 10_000);
        assert_eq!(cfg.group_prefix, "brook-consumer-group");
    }

    #[test]
    fn zero_max_messages_is_rejected() {
        let config = from_toml("[consume]\nmax_messages = 0");

        let result = load_section::<ConsumeConfig>(&config, "consume");

        match result {
            Err(ConfigError::ValidationError { section, key, .. }) => {
                assert_eq!(section, "consume");
                assert_eq!(key, "max_messages");
            }
            other => panic!("预期验证错误，实际为：{other:?}"),
        }
    }

    #[test]
    fn every_invalid_key_is_reported() {
        let config = from_toml("[consume]\nmax_messages = 0\ntimeout_ms = 0\ngroup_prefix = \"\"");

        let result = load_section::<ConsumeConfig>(&config, "consume");

        match result {
            Err(ConfigError::ValidationError { key, .. }) => {
                assert_eq!(key, "group_prefix,max_messages,timeout_ms");
            }
            other => panic!("预期验证错误，实际为：{other:?}"),
        }
    }
}
