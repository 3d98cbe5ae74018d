//! 全局错误处理机制

use thiserror::Error;

/// RedLight 统一错误类型
#[derive(Error, Debug)]
pub enum RedLightError {
    /// 消息无法解析或类型未知
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// 链路断开或不可达
    #[error("Link error: {0}")]
    Link(String),

    /// 图像或 base64 解码失败
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Vision error: {0}")]
    Vision(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 非法的阶段跳转
    #[error("Invalid phase transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 统一 Result 类型别名
pub type Result<T> = std::result::Result<T, RedLightError>;
