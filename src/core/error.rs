//! Agent 错误类型
//!
//! 外部工具的非零退出码不是错误（见 `RunOutput`），这里只覆盖真正无法继续的情况：
//! 文件读写、JSON 解析、进程无法启动、网络、配置、非法 key、控制面板。

use thiserror::Error;

/// Agent 运行过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to spawn '{tool}': {reason}")]
    Spawn { tool: String, reason: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Config error: {0}")]
    Config(String),

    /// 存储 key 越界（绝对路径、`..` 等）
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Panel error: {0}")]
    Panel(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(e: reqwest::Error) -> Self {
        AgentError::Network(e.to_string())
    }
}

impl From<config::ConfigError> for AgentError {
    fn from(e: config::ConfigError) -> Self {
        AgentError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AgentError>;
