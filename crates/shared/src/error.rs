//! 统一错误处理模块
//!
//! 基础设施层（配置加载、配置校验）的错误类型，使用 thiserror 提供良好的错误信息。

use thiserror::Error;

/// 共享层错误类型
#[derive(Debug, Error)]
pub enum SharedError {
    #[error("配置加载失败: {0}")]
    Config(#[from] config::ConfigError),

    #[error("配置校验失败: {0}")]
    InvalidConfig(#[from] validator::ValidationErrors),
}

/// 错误结果类型别名
pub type Result<T> = std::result::Result<T, SharedError>;

impl SharedError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG_ERROR",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
        }
    }
}
