//! 配置管理模块
//!
//! 支持多格式配置文件加载，环境变量覆盖，以及类型安全的配置访问。

use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::Path;
use validator::{Validate, ValidationError};

use crate::error::Result;

/// 校验消息模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageMode {
    /// 直接返回规则字面量（如 `required`、`range:0-150`）
    #[default]
    Raw,
    /// 使用内置模板渲染可读消息
    Template,
}

/// 校验引擎配置
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ValidationConfig {
    /// 自排除占位符，更新时会被替换为当前记录标识
    #[validate(length(min = 1), custom(function = "validate_placeholder"))]
    pub self_placeholder: String,
    /// 更新阶段是否自动为 unique 规则追加当前记录标识
    pub auto_exclude_self: bool,
    /// 持久化前是否剔除确认字段（如 password_confirmation）
    pub purge_confirmations: bool,
    /// 确认字段后缀
    #[validate(length(min = 1))]
    pub confirmation_suffix: String,
    pub message_mode: MessageMode,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            self_placeholder: "{id}".to_string(),
            auto_exclude_self: false,
            purge_confirmations: true,
            confirmation_suffix: "_confirmation".to_string(),
            message_mode: MessageMode::Raw,
        }
    }
}

/// 占位符会出现在规则参数里，不能包含参数分隔符
fn validate_placeholder(placeholder: &str) -> std::result::Result<(), ValidationError> {
    if placeholder.contains([',', '|', ':']) {
        return Err(ValidationError::new("placeholder_separator"));
    }
    Ok(())
}

/// 可观测性配置
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ObservabilityConfig {
    #[validate(length(min = 1))]
    pub log_level: String,
    /// 日志输出格式：json（结构化）或 pretty（人类可读）
    pub log_format: String,
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            metrics_enabled: false,
        }
    }
}

impl ObservabilityConfig {
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// 应用配置
#[derive(Debug, Clone, Deserialize, Default, Validate)]
#[serde(default)]
pub struct AppConfig {
    pub environment: String,
    #[validate(nested)]
    pub validation: ValidationConfig,
    #[validate(nested)]
    pub observability: ObservabilityConfig,
}

impl AppConfig {
    /// 从配置文件和环境变量加载配置
    ///
    /// 加载顺序（后加载的会覆盖先加载的同名配置项）：
    /// 1. config/default.toml（默认配置）
    /// 2. config/{environment}.toml（环境特定配置）
    /// 3. 环境变量（FERVENT_ 前缀，如 FERVENT_VALIDATION__SELF_PLACEHOLDER -> validation.self_placeholder）
    pub fn load() -> Result<Self> {
        let env = std::env::var("FERVENT_ENV").unwrap_or_else(|_| "development".to_string());
        let config_dir = std::env::var("CONFIG_DIR").unwrap_or_else(|_| "config".to_string());

        Self::load_from(Path::new(&config_dir), &env)
    }

    /// 从指定目录加载配置
    pub fn load_from(config_dir: &Path, env: &str) -> Result<Self> {
        let builder = Config::builder()
            .set_default("environment", env)?
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            .add_source(File::from(config_dir.join(format!("{}.toml", env))).required(false))
            .add_source(
                Environment::with_prefix("FERVENT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// 是否为生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
