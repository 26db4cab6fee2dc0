//! 共享库
//!
//! 包含校验引擎与宿主应用共用的配置加载、错误类型以及日志/指标初始化代码。

pub mod config;
pub mod error;
pub mod observability;

pub use config::{AppConfig, MessageMode, ValidationConfig};
pub use error::{Result, SharedError};
