//! # **brook** 错误定义

use serde::Serialize;
use thiserror::Error;

/// 配置错误枚举
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 配置源加载错误
    #[error("加载配置失败：{0}")]
    Load(#[from] config::ConfigError),
    /// 配置项验证错误
    #[error("配置'{section}.{key}'验证失败：{message}")]
    ValidationError {
        /// 配置节
        section: String,
        /// 配置键
        key: String,
        /// 验证信息
        message: String,
    },
    /// 缺少必需配置项
    #[error("缺少必需配置'{0}'")]
    Missing(String),
}

/// **brook** 错误枚举
#[derive(Debug, Error)]
pub enum BrookError {
    /// 无法建立代理连接或订阅
    #[error("代理连接错误：{0}")]
    Connection(String),
    /// 会话接收记录时代理报错
    #[error("接收记录错误：{0}")]
    Receive(String),
    /// 管理操作错误
    #[error("管理操作错误：{0}")]
    Admin(String),
    /// 获取主题高水位错误
    #[error("获取主题{topic}高水位错误：{message}")]
    Watermark {
        /// 主题
        topic: String,
        /// 错误信息
        message: String,
    },
    /// 发布记录错误
    #[error("发布记录错误：{0}")]
    Publish(String),
    /// 请求参数错误
    #[error("请求参数错误：{0}")]
    InvalidRequest(String),
    /// 配置错误
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// 失败类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// 连接失败
    Connection,
    /// 接收失败
    Receive,
    /// 管理操作失败
    Admin,
    /// 发布失败
    Publish,
    /// 请求无效
    InvalidRequest,
    /// 配置无效
    Config,
}

/// 面向调用者的结构化失败结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    /// 失败类别
    pub kind: FailureKind,
    /// 可读的错误信息
    pub message: String,
}

impl BrookError {
    /// 转换成结构化失败结果
    pub fn failure(&self) -> Failure {
        let kind = match self {
            BrookError::Connection(_) => FailureKind::Connection,
            BrookError::Receive(_) => FailureKind::Receive,
            BrookError::Admin(_) | BrookError::Watermark { .. } => FailureKind::Admin,
            BrookError::Publish(_) => FailureKind::Publish,
            BrookError::InvalidRequest(_) => FailureKind::InvalidRequest,
            BrookError::Config(_) => FailureKind::Config,
        };
        Failure {
            kind,
            message: self.to_string(),
        }
    }
}

impl From<&str> for BrookError {
    fn from(s: &str) -> Self {
        BrookError::InvalidRequest(s.to_owned())
    }
}
